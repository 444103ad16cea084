//! HTTP probe for a running stack
//!
//! Used after `compose up` to confirm the backend finished its startup
//! sequence and is answering requests.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, StackError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct EndpointProbe {
    client: reqwest::Client,
    base_url: String,
}

/// Outcome of a successful probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub code: u16,
    /// `status` field of a JSON body, when the endpoint sends one
    pub status: Option<String>,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.status {
            Some(status) => write!(f, "{} ({})", status, self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

impl EndpointProbe {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Single GET; non-2xx statuses are errors
    pub async fn check(&self, path: &str) -> Result<HealthStatus> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?;

        let code = response.status().as_u16();
        let body = response.text().await?;
        let status = serde_json::from_str::<StatusBody>(&body)
            .ok()
            .map(|b| b.status);

        Ok(HealthStatus { code, status })
    }

    /// Polls `path` with a fixed delay until it answers
    pub async fn wait_until_healthy(
        &self,
        path: &str,
        attempts: u32,
        delay: Duration,
    ) -> Result<HealthStatus> {
        let attempts = attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.check(path).await {
                Ok(status) => {
                    tracing::info!(attempt, %status, "{}{} is up", self.base_url, path);
                    return Ok(status);
                }
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Endpoint not ready");
                    last_error = e.to_string();
                }
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }

        Err(StackError::NotHealthy {
            url: format!("{}{}", self.base_url, path),
            attempts,
            last_error,
        })
    }
}

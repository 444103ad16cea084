use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::app::RetryPolicy;
use crate::error::ConfigError;
use crate::telemetry::LogFormat;

/// Port the backend binds when `PORT` is not set
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Address the HTTP server binds (all interfaces by default)
    pub bind_addr: SocketAddr,
    /// Origin allowed to call the API from a browser (the frontend)
    pub cors_allowed_origin: String,
    /// Readiness wait before migrating
    pub retry: RetryPolicy,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = match lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            Some(url) => url,
            None => database_url_from_parts(&lookup)?,
        };

        let bind_ip: IpAddr = parse_or(&lookup, "BIND_ADDR", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_or(&lookup, "PORT", DEFAULT_PORT)?;

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "DB_CONNECT_ATTEMPTS", defaults.max_attempts)?,
            initial_delay: Duration::from_millis(parse_or(
                &lookup,
                "DB_CONNECT_INITIAL_DELAY_MS",
                defaults.initial_delay.as_millis() as u64,
            )?),
            max_delay: Duration::from_millis(parse_or(
                &lookup,
                "DB_CONNECT_MAX_DELAY_MS",
                defaults.max_delay.as_millis() as u64,
            )?),
            multiplier: defaults.multiplier,
        };
        if retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "DB_CONNECT_ATTEMPTS".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if retry.max_delay < retry.initial_delay {
            return Err(ConfigError::Invalid {
                name: "DB_CONNECT_MAX_DELAY_MS".to_string(),
                value: retry.max_delay.as_millis().to_string(),
                reason: "must not be below DB_CONNECT_INITIAL_DELAY_MS".to_string(),
            });
        }

        Ok(Self {
            database_url,
            bind_addr: SocketAddr::new(bind_ip, port),
            cors_allowed_origin: lookup("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            retry,
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Pretty)?,
        })
    }
}

/// Compose a PostgreSQL URL from the variables the database container's env file provides
fn database_url_from_parts<F>(lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |name: &str| {
        lookup(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::Missing(format!("DATABASE_URL or {}", name)))
    };

    let user = required("POSTGRES_USER")?;
    let password = required("POSTGRES_PASSWORD")?;
    let database = required("POSTGRES_DB")?;
    let host = lookup("POSTGRES_HOST").unwrap_or_else(|| "db".to_string());
    let port: u16 = parse_or(lookup, "POSTGRES_PORT", 5432)?;

    Ok(format!(
        "postgres://{}:{}@{}:{}/{}",
        urlencoding::encode(&user),
        urlencoding::encode(&password),
        host,
        port,
        database
    ))
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name: name.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_bind_all_interfaces_on_8000() {
        let config = config_from(&[("DATABASE_URL", "postgres://u:p@db:5432/app")]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8000".parse().unwrap());
        assert_eq!(config.cors_allowed_origin, "http://localhost:3000");
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn database_url_composed_from_postgres_vars() {
        let config = config_from(&[
            ("POSTGRES_USER", "scitrend"),
            ("POSTGRES_PASSWORD", "p@ss word"),
            ("POSTGRES_DB", "papers"),
        ])
        .unwrap();
        assert_eq!(
            config.database_url,
            "postgres://scitrend:p%40ss%20word@db:5432/papers"
        );
    }

    #[test]
    fn explicit_database_url_wins() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://a:b@localhost:5433/x"),
            ("POSTGRES_USER", "ignored"),
        ])
        .unwrap();
        assert_eq!(config.database_url, "postgres://a:b@localhost:5433/x");
    }

    #[test]
    fn missing_database_settings_is_an_error() {
        let err = config_from(&[("POSTGRES_USER", "scitrend")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing("DATABASE_URL or POSTGRES_PASSWORD".to_string())
        );
    }

    #[test]
    fn invalid_port_is_rejected_not_defaulted() {
        let err = config_from(&[("DATABASE_URL", "postgres://db/app"), ("PORT", "eighty")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref name, .. } if name == "PORT"));
    }

    #[test]
    fn zero_connect_attempts_rejected() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://db/app"),
            ("DB_CONNECT_ATTEMPTS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref name, .. } if name == "DB_CONNECT_ATTEMPTS"));
    }

    #[test]
    fn max_delay_below_initial_delay_rejected() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://db/app"),
            ("DB_CONNECT_INITIAL_DELAY_MS", "2000"),
            ("DB_CONNECT_MAX_DELAY_MS", "100"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref name, .. } if name == "DB_CONNECT_MAX_DELAY_MS"));
    }

    #[test]
    fn unknown_log_format_is_rejected_not_defaulted() {
        let err = config_from(&[("DATABASE_URL", "postgres://db/app"), ("LOG_FORMAT", "xml")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref name, .. } if name == "LOG_FORMAT"));
    }

    #[test]
    fn retry_overrides_are_read() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://db/app"),
            ("DB_CONNECT_ATTEMPTS", "3"),
            ("DB_CONNECT_INITIAL_DELAY_MS", "100"),
            ("DB_CONNECT_MAX_DELAY_MS", "400"),
            ("LOG_FORMAT", "json"),
            ("PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(100));
        assert_eq!(config.retry.max_delay, Duration::from_millis(400));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.bind_addr.port(), 9000);
    }
}

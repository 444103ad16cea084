//! Deployment manifest for the scitrend stack
//!
//! Describes the backend, frontend and database services, the networks that
//! isolate them, and checks the isolation and ordering rules before anything
//! is rendered for compose.

pub mod client;
pub mod error;
pub mod model;
pub mod order;
pub mod parser;
pub mod render;
pub mod topology;
pub mod validate;

pub use client::EndpointProbe;
pub use error::{Result, StackError};
pub use model::{ServiceRole, StackManifest};
pub use order::start_order;
pub use parser::{load, parse, DEFAULT_MANIFEST};
pub use render::render_compose;
pub use topology::Topology;
pub use validate::{validate, Profile, ValidationReport, Violation, Warning};

//! Test utilities
//!
//! Manual mock implementations and test fixtures for unit testing.
//!
//! The schema store mock is scripted across calls (fail N pings, then
//! succeed), which is simpler to express by hand than with mockall.

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

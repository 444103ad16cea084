//! PostgreSQL adapters
//!
//! Implementations of port traits using SeaORM and PostgreSQL.

pub mod schema_store;


pub use schema_store::PostgresSchemaStore;

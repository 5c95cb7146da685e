//! Postgres/TimescaleDB access: schema definitions and the `Store`
//! implementation backing the workers in production.

pub mod models;
pub mod repositories;

pub use models::{initialize_database_schema, DatabaseError};
pub use repositories::PostgresStore;

//! Error types for the PostgreSQL store.

use tenants_cache::StoreError;
use thiserror::Error;

/// Errors that can occur while connecting to PostgreSQL.
#[derive(Error, Debug)]
pub enum PostgreSQLStoreError {
    /// PostgreSQL connection or query error.
    #[error("PostgreSQL error: {0}")]
    PostgreSQL(#[from] tokio_postgres::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<PostgreSQLStoreError> for StoreError {
    fn from(e: PostgreSQLStoreError) -> Self {
        StoreError::connection(e)
    }
}

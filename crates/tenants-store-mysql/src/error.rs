//! Error types for the MySQL store.

use tenants_cache::StoreError;
use thiserror::Error;

/// Errors that can occur while connecting to MySQL.
#[derive(Error, Debug)]
pub enum MySQLStoreError {
    /// MySQL connection or query error.
    #[error("MySQL error: {0}")]
    MySQL(#[from] mysql_async::Error),

    /// Malformed connection string.
    #[error("Invalid MySQL connection string: {0}")]
    Url(#[from] mysql_async::UrlError),
}

impl From<MySQLStoreError> for StoreError {
    fn from(e: MySQLStoreError) -> Self {
        StoreError::connection(e)
    }
}

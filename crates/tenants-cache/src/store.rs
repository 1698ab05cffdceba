//! Backing store trait and its error type.
//!
//! The store is the durable copy of the hierarchy. The cache only ever asks it
//! to create tables, run all-or-nothing insert batches and read rows back.

use crate::schema::{Dialect, InsertBatch, Migration, Row, SelectQuery};
use async_trait::async_trait;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors reported by a [`BackingStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Migration of table '{table}' failed: {source}")]
    Migration {
        table: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Insert into '{table}' failed: {source}")]
    Insert {
        table: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Transaction failed: {0}")]
    Transaction(#[source] BoxError),

    #[error("Query failed: {0}")]
    Query(#[source] BoxError),

    #[error("Connection error: {0}")]
    Connection(#[source] BoxError),
}

impl StoreError {
    pub fn migration(table: &'static str, source: impl Into<BoxError>) -> Self {
        StoreError::Migration {
            table,
            source: source.into(),
        }
    }

    pub fn insert(table: &'static str, source: impl Into<BoxError>) -> Self {
        StoreError::Insert {
            table,
            source: source.into(),
        }
    }

    pub fn transaction(source: impl Into<BoxError>) -> Self {
        StoreError::Transaction(source.into())
    }

    pub fn query(source: impl Into<BoxError>) -> Self {
        StoreError::Query(source.into())
    }

    pub fn connection(source: impl Into<BoxError>) -> Self {
        StoreError::Connection(source.into())
    }
}

/// Trait for the relational source of truth behind the cache.
///
/// Implementations:
/// - `MemoryStore` (this crate) for dry runs and tests
/// - `PostgreSQLStore` (tenants-store-postgresql)
/// - `MySQLStore` (tenants-store-mysql)
#[async_trait]
pub trait BackingStore: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn table_exists(&self, table: &str) -> Result<bool, StoreError>;

    async fn apply_migration(&self, migration: &Migration) -> Result<(), StoreError>;

    /// Insert every batch in a single transaction. Either all rows are
    /// committed or none are.
    async fn run_in_transaction(&self, batches: &[InsertBatch]) -> Result<(), StoreError>;

    async fn query(&self, query: SelectQuery) -> Result<Vec<Row>, StoreError>;
}

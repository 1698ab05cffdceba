//! PostgreSQL backing store for the tenants cache.
//!
//! All SQL comes from `tenants_cache::schema`; this crate only binds values,
//! runs statements and decodes rows.

pub mod args;
pub mod error;
pub mod store;

pub use args::PostgreSQLStoreArgs;
pub use error::PostgreSQLStoreError;
pub use store::PostgreSQLStore;

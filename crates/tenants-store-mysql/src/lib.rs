//! MySQL backing store for the tenants cache.

pub mod args;
pub mod error;
pub mod store;

pub use args::MySQLStoreArgs;
pub use error::MySQLStoreError;
pub use store::MySQLStore;

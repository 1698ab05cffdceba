//! Tenant hierarchy cache and synthetic tenant generator.
//!
//! This crate keeps an in-memory copy of a multi-tenant closure-table hierarchy
//! and grows it with synthetic tenants whose kind/level distribution follows a
//! weighted structure table. Many workers use one cache concurrently.
//!
//! # Architecture
//!
//! ```text
//!  StructureTable (YAML)
//!        │
//!        ▼
//! ┌──────────────────────────┐   ┌────────────────────┐
//! │ WeightedStructureSampler │   │  LevelKindIndex    │
//! │ (kind, level) by weight  │   │  level → kind → ids│
//! └────────────┬─────────────┘   └─────────┬──────────┘
//!              └──────────┬────────────────┘
//!                         ▼
//!               ┌───────────────────┐
//!               │ TenantSynthesizer │  parent search with level back-off
//!               └─────────┬─────────┘
//!                         ▼
//!               ┌───────────────────┐       ┌──────────────┐
//!               │   TenantsCache    │──────▶│ BackingStore │
//!               │ uuid lists,       │◀──────│ (source of   │
//!               │ lineages, lookups │ boot- │  truth)      │
//!               └───────────────────┘ strap └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tenants_cache::{MemoryStore, StructureTable, TenantFilter, TenantsCache};
//!
//! # tokio_test_block(async {
//! let store = Arc::new(MemoryStore::new());
//! let structure = StructureTable::embedded().unwrap();
//! let cache = TenantsCache::init(store, &structure).await.unwrap();
//!
//! let uuid = cache.create_tenant().await.unwrap();
//! assert_eq!(cache.parent_chain(&uuid).unwrap().len(), 1);
//! let _any = cache.get_random_tenant_uuid(0, TenantFilter::All).unwrap();
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod bootstrap;
pub mod bucket;
pub mod cache;
pub mod cti;
pub mod error;
pub mod index;
pub mod kind;
pub mod memory;
pub mod model;
pub mod random;
pub mod sampler;
pub mod schema;
pub mod store;
pub mod structure;
pub mod synthesizer;

// Re-exports for convenience
pub use bootstrap::PopulateSummary;
pub use cache::{CacheStats, TenantFilter, TenantsCache};
pub use error::{Result, TenantsCacheError};
pub use index::LevelKindIndex;
pub use kind::TenantKind;
pub use memory::MemoryStore;
pub use model::{Ancestor, ClosureEdge, CtiEntity, Lineage, TenantNode};
pub use sampler::{StructureSlot, WeightedStructureSampler};
pub use schema::{ColumnType, Dialect, InsertBatch, Migration, Row, SelectQuery, SqlValue};
pub use store::{BackingStore, StoreError};
pub use structure::{StructureEntry, StructureError, StructureTable};
pub use synthesizer::TenantSynthesizer;

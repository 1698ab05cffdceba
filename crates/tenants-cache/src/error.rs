//! Error types for the tenants cache.

use crate::kind::TenantKind;
use crate::schema::Dialect;
use crate::store::StoreError;
use crate::structure::StructureError;
use thiserror::Error;

/// Errors surfaced by [`crate::TenantsCache`] operations.
///
/// Every variant is fatal for the call that produced it; the cache never
/// substitutes a default value.
#[derive(Error, Debug)]
pub enum TenantsCacheError {
    #[error("Unsupported database dialect for the tenants cache: {0}")]
    UnsupportedDialect(Dialect),

    /// Backing store failure (migration, insert, transaction or query).
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Structure(#[from] StructureError),

    /// The back-off search reached level 0 without finding a parent.
    #[error(
        "No eligible parent found for a new tenant (last attempt: {kind} at level {level}, \
         starting level ceiling {ceiling}); the tenant hierarchy is empty or misconfigured"
    )]
    NoEligibleParent {
        kind: TenantKind,
        level: u32,
        ceiling: u32,
    },

    #[error("No {entity} found in the cache; run the `{workload}` workload first")]
    EmptyPopulation {
        entity: &'static str,
        workload: &'static str,
    },

    #[error(
        "Only {available} {entity} available but the working set requires {required}; \
         lower the working set size or create more {entity}"
    )]
    WorkingSetTooLarge {
        entity: &'static str,
        available: usize,
        required: usize,
    },

    /// A row read from the backing store does not decode.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// A synthesized tenant references a parent the cache has no lineage for.
    #[error("Parent tenant {0} is not cached")]
    UnknownParent(i64),
}

impl TenantsCacheError {
    /// Whether this error reports a population too small for the requested lookup.
    pub fn is_insufficient_population(&self) -> bool {
        matches!(
            self,
            TenantsCacheError::EmptyPopulation { .. } | TenantsCacheError::WorkingSetTooLarge { .. }
        )
    }
}

pub type Result<T, E = TenantsCacheError> = std::result::Result<T, E>;

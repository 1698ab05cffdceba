//! The closed set of tenant kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a node in the tenant hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantKind {
    Root,
    Partner,
    Folder,
    Customer,
    Unit,
}

/// Parents allowed for units.
const UNIT_PARENTS: &[TenantKind] = &[TenantKind::Customer, TenantKind::Unit];

/// Parents allowed for every other kind.
const ORGANIZATION_PARENTS: &[TenantKind] =
    &[TenantKind::Root, TenantKind::Partner, TenantKind::Folder];

impl TenantKind {
    pub const ALL: [TenantKind; 5] = [
        TenantKind::Root,
        TenantKind::Partner,
        TenantKind::Folder,
        TenantKind::Customer,
        TenantKind::Unit,
    ];

    /// Name stored in the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantKind::Root => "root",
            TenantKind::Partner => "partner",
            TenantKind::Folder => "folder",
            TenantKind::Customer => "customer",
            TenantKind::Unit => "unit",
        }
    }

    /// Kinds a node of this kind may be attached to.
    pub fn parent_kinds(&self) -> &'static [TenantKind] {
        match self {
            TenantKind::Unit => UNIT_PARENTS,
            _ => ORGANIZATION_PARENTS,
        }
    }

    pub fn accepts_parent(&self, parent: TenantKind) -> bool {
        self.parent_kinds().contains(&parent)
    }
}

impl fmt::Display for TenantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown kind name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown tenant kind: '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for TenantKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TenantKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

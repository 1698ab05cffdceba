//! Weighted tenant structure table.
//!
//! The table lists `(kind, level, weight)` tuples describing how a production
//! tenant population is spread over kinds and nesting levels. It is loaded once
//! from YAML and never mutated afterwards.

use crate::kind::TenantKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const EMBEDDED_STRUCTURE: &str = include_str!("../data/tenant_structure.yaml");

/// Error type for structure table loading.
#[derive(Debug, thiserror::Error)]
pub enum StructureError {
    /// Error reading the structure file
    #[error("Failed to read structure file: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse structure YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Structure table is empty")]
    Empty,

    #[error("Entry {kind} at level {level} has non-positive weight")]
    InvalidWeight { kind: TenantKind, level: u32 },

    #[error("Structure weights add up to more than {}", u64::MAX)]
    WeightOverflow,

    /// Level 0 must hold the root and nothing else.
    #[error("Entry {kind} at level {level}: the root kind belongs exactly to level 0")]
    MisplacedRoot { kind: TenantKind, level: u32 },
}

/// One weighted slot of the structure table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureEntry {
    pub kind: TenantKind,
    pub level: u32,
    pub weight: u64,
}

/// Validated, immutable structure table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureTable {
    entries: Vec<StructureEntry>,
}

impl StructureTable {
    /// Build a table from entries, validating weights and root placement.
    pub fn new(entries: Vec<StructureEntry>) -> Result<Self, StructureError> {
        if entries.is_empty() {
            return Err(StructureError::Empty);
        }
        entries
            .iter()
            .try_fold(0u64, |total, entry| total.checked_add(entry.weight))
            .ok_or(StructureError::WeightOverflow)?;
        for entry in &entries {
            if entry.weight == 0 {
                return Err(StructureError::InvalidWeight {
                    kind: entry.kind,
                    level: entry.level,
                });
            }
            if (entry.kind == TenantKind::Root) != (entry.level == 0) {
                return Err(StructureError::MisplacedRoot {
                    kind: entry.kind,
                    level: entry.level,
                });
            }
        }
        Ok(Self { entries })
    }

    /// Parse a table from a YAML sequence of entries.
    pub fn from_yaml(yaml: &str) -> Result<Self, StructureError> {
        let entries: Vec<StructureEntry> = serde_yaml::from_str(yaml)?;
        Self::new(entries)
    }

    /// Load a table from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StructureError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// The table shipped with the crate.
    pub fn embedded() -> Result<Self, StructureError> {
        Self::from_yaml(EMBEDDED_STRUCTURE)
    }

    pub fn entries(&self) -> &[StructureEntry] {
        &self.entries
    }

    pub fn max_level(&self) -> u32 {
        self.entries.iter().map(|e| e.level).max().unwrap_or(0)
    }
}

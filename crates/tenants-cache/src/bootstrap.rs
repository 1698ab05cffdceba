//! Populating the cache from rows already in the backing store.

use crate::cache::TenantsCache;
use crate::error::{Result, TenantsCacheError};
use crate::kind::TenantKind;
use crate::model::{Ancestor, Lineage, TenantNode};
use crate::schema::{Row, SelectQuery};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Totals observed while populating the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateSummary {
    pub tenants: usize,
    pub ctis: usize,
    pub max_id: i64,
    pub level_ceiling: u32,
}

fn decode_tenant(row: &Row) -> Result<TenantNode> {
    let kind = row
        .text(3)?
        .parse::<TenantKind>()
        .map_err(|e| TenantsCacheError::InvalidRow(e.to_string()))?;
    let nesting_level = u32::try_from(row.int(5)?).map_err(|_| {
        TenantsCacheError::InvalidRow(format!("negative nesting level in row {row:?}"))
    })?;

    Ok(TenantNode {
        id: row.big_int(0)?,
        uuid: row.text(1)?.to_string(),
        name: row.text(2)?.to_string(),
        kind,
        parent_id: row.big_int(4)?,
        nesting_level,
        is_deleted: row.bool(6)?,
        parent_has_access: row.bool(7)?,
    })
}

impl TenantsCache {
    /// Load tenants, their ancestor chains and CTI entities from the store.
    ///
    /// Tenants are cached only after both tenant queries succeed, so a failure
    /// there leaves the tenant side empty rather than half-linked.
    pub(crate) async fn populate(&self) -> Result<PopulateSummary> {
        let nodes: Vec<TenantNode> = self
            .store
            .query(SelectQuery::Tenants)
            .await?
            .iter()
            .map(decode_tenant)
            .collect::<Result<_>>()?;
        debug!("Loaded {} tenant rows", nodes.len());

        // Rows arrive grouped by descendant, nearest ancestor first.
        let mut chains: HashMap<i64, Vec<(i64, i32)>> = HashMap::new();
        for row in self.store.query(SelectQuery::Ancestry).await? {
            chains
                .entry(row.big_int(0)?)
                .or_default()
                .push((row.big_int(1)?, row.int(2)?));
        }

        let by_id: HashMap<i64, &TenantNode> = nodes.iter().map(|n| (n.id, n)).collect();
        let mut lineages = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let ancestors = chains
                .remove(&node.id)
                .unwrap_or_default()
                .into_iter()
                .map(|(ancestor_id, barrier)| -> Result<Ancestor> {
                    let ancestor = by_id.get(&ancestor_id).ok_or_else(|| {
                        TenantsCacheError::InvalidRow(format!(
                            "closure edge of tenant {} references unknown ancestor {}",
                            node.id, ancestor_id
                        ))
                    })?;
                    Ok(Ancestor {
                        id: ancestor.id,
                        uuid: ancestor.uuid.clone(),
                        kind: ancestor.kind,
                        barrier,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            if ancestors.len() != node.nesting_level as usize {
                warn!(
                    "Tenant {} at level {} has {} ancestors in the closure table",
                    node.id,
                    node.nesting_level,
                    ancestors.len()
                );
            }

            lineages.push(Lineage {
                id: node.id,
                uuid: node.uuid.clone(),
                kind: node.kind,
                nesting_level: node.nesting_level,
                ancestors,
            });
        }

        // Ids are ascending, so every parent is registered before its children.
        for (node, lineage) in nodes.iter().zip(lineages) {
            self.register_tenant(node, Arc::new(lineage));
        }

        let max_id = nodes.iter().map(|n| n.id).max().unwrap_or(0);
        let deepest = nodes.iter().map(|n| n.nesting_level).max().unwrap_or(0);
        if !nodes.is_empty() {
            self.synthesizer.seed(max_id, deepest);
        }

        for row in self.store.query(SelectQuery::CtiUuids).await? {
            self.ctis.push(row.text(0)?.to_string());
        }

        Ok(PopulateSummary {
            tenants: nodes.len(),
            ctis: self.ctis.len(),
            max_id,
            level_ceiling: self.synthesizer.current_max_level(),
        })
    }
}

//! In-process backing store.
//!
//! Keeps rows in memory and evaluates the bootstrap queries directly. Used for
//! dry runs of the CLI and by tests, which can also inject transaction and
//! query failures.

use crate::schema::{
    Dialect, InsertBatch, Migration, Row, SelectQuery, SqlValue, TENANTS_TABLE,
    TENANT_CLOSURE_TABLE,
};
use crate::store::{BackingStore, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

type MemoryRow = HashMap<&'static str, SqlValue>;

#[derive(Default)]
struct MemoryState {
    tables: HashMap<&'static str, Vec<MemoryRow>>,
}

impl MemoryState {
    fn rows(&self, table: &str) -> Result<&[MemoryRow], StoreError> {
        self.tables
            .get(table)
            .map(Vec::as_slice)
            .ok_or_else(|| StoreError::query(format!("table '{table}' does not exist")))
    }
}

pub struct MemoryStore {
    dialect: Dialect,
    state: Mutex<MemoryState>,
    fail_transactions: AtomicBool,
    failing_queries: Mutex<HashSet<SelectQuery>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// A store that reports the PostgreSQL dialect.
    pub fn new() -> Self {
        Self::with_dialect(Dialect::PostgreSQL)
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            state: Mutex::new(MemoryState::default()),
            fail_transactions: AtomicBool::new(false),
            failing_queries: Mutex::new(HashSet::new()),
        }
    }

    /// Make every following transaction fail (or succeed again).
    pub fn fail_transactions(&self, fail: bool) {
        self.fail_transactions.store(fail, Ordering::Release);
    }

    /// Make `query` fail (or succeed again).
    pub fn fail_query(&self, query: SelectQuery, fail: bool) {
        let mut failing = self.failing_queries.lock();
        if fail {
            failing.insert(query);
        } else {
            failing.remove(&query);
        }
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.state.lock().tables.get(table).map_or(0, Vec::len)
    }
}

fn project(row: &MemoryRow, query: SelectQuery) -> Row {
    Row(query
        .columns()
        .iter()
        .map(|(name, _)| row.get(name).cloned().unwrap_or(SqlValue::Null))
        .collect())
}

fn big_int(row: &MemoryRow, column: &str) -> i64 {
    match row.get(column) {
        Some(SqlValue::BigInt(v)) => *v,
        Some(SqlValue::Int(v)) => i64::from(*v),
        _ => 0,
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        Ok(self.state.lock().tables.contains_key(table))
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<(), StoreError> {
        self.state.lock().tables.entry(migration.table).or_default();
        Ok(())
    }

    async fn run_in_transaction(&self, batches: &[InsertBatch]) -> Result<(), StoreError> {
        if self.fail_transactions.load(Ordering::Acquire) {
            return Err(StoreError::transaction("injected transaction failure"));
        }

        let mut state = self.state.lock();
        if let Some(missing) = batches
            .iter()
            .find(|b| !state.tables.contains_key(b.table))
        {
            return Err(StoreError::insert(missing.table, "table does not exist"));
        }

        for batch in batches {
            let rows = batch.rows.iter().map(|values| {
                batch
                    .columns
                    .iter()
                    .copied()
                    .zip(values.iter().cloned())
                    .collect::<MemoryRow>()
            });
            let table = state.tables.entry(batch.table).or_default();
            table.extend(rows);
        }
        Ok(())
    }

    async fn query(&self, query: SelectQuery) -> Result<Vec<Row>, StoreError> {
        if self.failing_queries.lock().contains(&query) {
            return Err(StoreError::query(format!("injected failure for {query:?}")));
        }

        let state = self.state.lock();
        match query {
            SelectQuery::Tenants => {
                let mut rows: Vec<&MemoryRow> = state.rows(TENANTS_TABLE)?.iter().collect();
                rows.sort_by_key(|row| big_int(row, "id"));
                Ok(rows.into_iter().map(|row| project(row, query)).collect())
            }
            SelectQuery::Ancestry => {
                let levels: HashMap<i64, i64> = state
                    .rows(TENANTS_TABLE)?
                    .iter()
                    .map(|row| (big_int(row, "id"), big_int(row, "nesting_level")))
                    .collect();

                let mut edges: Vec<(i64, i64, &MemoryRow)> = state
                    .rows(TENANT_CLOSURE_TABLE)?
                    .iter()
                    .filter_map(|row| {
                        let ancestor = big_int(row, "ancestor_id");
                        let descendant = big_int(row, "descendant_id");
                        let level = *levels.get(&ancestor)?;
                        (ancestor != descendant).then_some((descendant, level, row))
                    })
                    .collect();
                edges.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

                Ok(edges
                    .into_iter()
                    .map(|(_, _, row)| project(row, query))
                    .collect())
            }
            SelectQuery::CtiUuids => Ok(state
                .rows(crate::schema::CTI_ENTITIES_TABLE)?
                .iter()
                .map(|row| project(row, query))
                .collect()),
            SelectQuery::RootTenant => Ok(state
                .rows(TENANTS_TABLE)?
                .iter()
                .filter(|row| big_int(row, "nesting_level") == 0)
                .map(|row| project(row, query))
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::TenantKind;
    use crate::model::{Lineage, TenantNode};
    use crate::schema::{closure_batch, migrations, tenant_batch};

    async fn migrated() -> MemoryStore {
        let store = MemoryStore::new();
        for migration in migrations(Dialect::PostgreSQL).unwrap() {
            store.apply_migration(&migration).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_transaction_requires_tables() {
        let store = MemoryStore::new();
        let root = TenantNode::root("r".to_string());
        let err = store
            .run_in_transaction(&[tenant_batch(&[root])])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Insert { table: "tenants", .. }));
    }

    #[tokio::test]
    async fn test_injected_failure_writes_nothing() {
        let store = migrated().await;
        store.fail_transactions(true);
        let root = TenantNode::root("r".to_string());
        assert!(store
            .run_in_transaction(&[tenant_batch(&[root])])
            .await
            .is_err());
        assert_eq!(store.row_count(TENANTS_TABLE), 0);
    }

    #[tokio::test]
    async fn test_ancestry_is_nearest_first() {
        let store = migrated().await;
        let root = TenantNode::root("r".to_string());
        let folder = TenantNode {
            id: 2,
            uuid: "f".to_string(),
            name: "folder-2".to_string(),
            kind: TenantKind::Folder,
            parent_id: 1,
            nesting_level: 1,
            is_deleted: false,
            parent_has_access: true,
        };
        let customer = TenantNode {
            id: 3,
            uuid: "c".to_string(),
            name: "customer-3".to_string(),
            kind: TenantKind::Customer,
            parent_id: 2,
            nesting_level: 2,
            ..folder.clone()
        };
        let root_lineage = Lineage::of_root(&root);
        let folder_lineage = Lineage::child_of(&root_lineage, &folder);
        let customer_lineage = Lineage::child_of(&folder_lineage, &customer);

        let mut edges = root_lineage.closure_edges();
        edges.extend(customer_lineage.closure_edges());
        edges.extend(folder_lineage.closure_edges());
        store
            .run_in_transaction(&[
                tenant_batch(&[customer, root, folder]),
                closure_batch(&edges),
            ])
            .await
            .unwrap();

        let tenants = store.query(SelectQuery::Tenants).await.unwrap();
        let ids: Vec<i64> = tenants.iter().map(|r| r.big_int(0).unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let ancestry = store.query(SelectQuery::Ancestry).await.unwrap();
        let pairs: Vec<(i64, i64)> = ancestry
            .iter()
            .map(|r| (r.big_int(0).unwrap(), r.big_int(1).unwrap()))
            .collect();
        assert_eq!(pairs, vec![(2, 1), (3, 2), (3, 1)]);

        let roots = store.query(SelectQuery::RootTenant).await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].big_int(0).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_injected_query_failure() {
        let store = migrated().await;
        store.fail_query(SelectQuery::CtiUuids, true);
        assert!(store.query(SelectQuery::CtiUuids).await.is_err());
        store.fail_query(SelectQuery::CtiUuids, false);
        assert!(store.query(SelectQuery::CtiUuids).await.unwrap().is_empty());
    }
}

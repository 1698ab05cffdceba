//! `BackingStore` over a small set of `tokio-postgres` clients.

use crate::error::PostgreSQLStoreError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tenants_cache::{
    BackingStore, ColumnType, Dialect, InsertBatch, Migration, Row, SelectQuery, SqlValue,
    StoreError,
};
use tokio::sync::Mutex;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, info};

const TABLE_EXISTS_SQL: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
     WHERE table_schema = current_schema() AND table_name = $1)";

/// PostgreSQL store. Each client serves one statement or transaction at a
/// time; callers are spread over the clients round-robin.
pub struct PostgreSQLStore {
    clients: Vec<Mutex<Client>>,
    next: AtomicUsize,
}

impl PostgreSQLStore {
    /// Open `pool_size` connections.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = PostgreSQLStore::connect(
    ///     "host=localhost user=postgres password=postgres dbname=testdb",
    ///     8,
    /// ).await?;
    /// ```
    pub async fn connect(
        connection_string: &str,
        pool_size: usize,
    ) -> Result<Self, PostgreSQLStoreError> {
        if pool_size == 0 {
            return Err(PostgreSQLStoreError::Config(
                "pool size must be at least 1".to_string(),
            ));
        }

        let mut clients = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let (client, connection) = tokio_postgres::connect(connection_string, NoTls).await?;

            // Spawn the connection task
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!("PostgreSQL connection error: {}", e);
                }
            });

            client.simple_query("SELECT 1").await?;
            clients.push(Mutex::new(client));
        }
        info!("Connected to PostgreSQL with {} clients", pool_size);

        Ok(Self {
            clients,
            next: AtomicUsize::new(0),
        })
    }

    fn client(&self) -> &Mutex<Client> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[idx]
    }
}

/// Convert a value to a boxed ToSql trait object.
fn value_to_boxed(value: &SqlValue) -> Box<dyn ToSql + Sync + Send> {
    match value {
        SqlValue::BigInt(v) => Box::new(*v),
        SqlValue::Int(v) => Box::new(*v),
        SqlValue::Text(v) => Box::new(v.clone()),
        SqlValue::Bool(v) => Box::new(*v),
        SqlValue::Null => Box::new(None::<String>),
    }
}

fn batch_params(batch: &InsertBatch) -> Vec<Box<dyn ToSql + Sync + Send>> {
    batch.params().map(value_to_boxed).collect()
}

fn decode_row(
    row: &tokio_postgres::Row,
    columns: &[(&str, ColumnType)],
) -> Result<Row, StoreError> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, (_, column_type))| {
            let value = match column_type {
                ColumnType::BigInt => row
                    .try_get::<_, Option<i64>>(idx)
                    .map(|v| v.map_or(SqlValue::Null, SqlValue::BigInt)),
                ColumnType::Int => row
                    .try_get::<_, Option<i32>>(idx)
                    .map(|v| v.map_or(SqlValue::Null, SqlValue::Int)),
                ColumnType::VarChar(_) | ColumnType::Text => row
                    .try_get::<_, Option<String>>(idx)
                    .map(|v| v.map_or(SqlValue::Null, SqlValue::Text)),
                ColumnType::Bool => row
                    .try_get::<_, Option<bool>>(idx)
                    .map(|v| v.map_or(SqlValue::Null, SqlValue::Bool)),
            };
            value.map_err(StoreError::query)
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Row)
}

#[async_trait]
impl BackingStore for PostgreSQLStore {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSQL
    }

    async fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let client = self.client().lock().await;
        let row = client
            .query_one(TABLE_EXISTS_SQL, &[&table])
            .await
            .map_err(StoreError::query)?;
        row.try_get(0).map_err(StoreError::query)
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<(), StoreError> {
        let client = self.client().lock().await;
        for statement in &migration.statements {
            client
                .batch_execute(statement)
                .await
                .map_err(|e| StoreError::migration(migration.table, e))?;
        }
        Ok(())
    }

    async fn run_in_transaction(&self, batches: &[InsertBatch]) -> Result<(), StoreError> {
        let mut client = self.client().lock().await;
        let tx = client.transaction().await.map_err(StoreError::transaction)?;

        for batch in batches.iter().filter(|b| !b.is_empty()) {
            let sql = batch.to_sql(Dialect::PostgreSQL);
            let params = batch_params(batch);
            let param_refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();

            debug!("Inserting {} rows into '{}'", batch.rows.len(), batch.table);
            // Dropping `tx` on error rolls the transaction back.
            tx.execute(&sql, &param_refs)
                .await
                .map_err(|e| StoreError::insert(batch.table, e))?;
        }

        tx.commit().await.map_err(StoreError::transaction)
    }

    async fn query(&self, query: SelectQuery) -> Result<Vec<Row>, StoreError> {
        let client = self.client().lock().await;
        let rows = client
            .query(query.sql(), &[])
            .await
            .map_err(StoreError::query)?;
        rows.iter()
            .map(|row| decode_row(row, query.columns()))
            .collect()
    }
}

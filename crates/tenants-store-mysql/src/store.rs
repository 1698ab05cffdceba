//! `BackingStore` over a `mysql_async` pool.

use crate::error::MySQLStoreError;
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, Params, Pool, TxOpts, Value};
use tenants_cache::{
    BackingStore, ColumnType, Dialect, InsertBatch, Migration, Row, SelectQuery, SqlValue,
    StoreError,
};
use tracing::{debug, info};

const TABLE_EXISTS_SQL: &str = "SELECT COUNT(*) FROM information_schema.tables \
     WHERE table_schema = DATABASE() AND table_name = ?";

pub struct MySQLStore {
    pool: Pool,
}

impl MySQLStore {
    /// Create the pool and check that a connection can be opened.
    pub async fn connect(connection_string: &str) -> Result<Self, MySQLStoreError> {
        let opts = Opts::from_url(connection_string)?;
        let pool = Pool::new(opts);

        let mut conn = pool.get_conn().await?;
        conn.query_drop("SELECT 1").await?;
        info!("Connected to MySQL");

        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<Conn, StoreError> {
        self.pool.get_conn().await.map_err(StoreError::connection)
    }
}

fn to_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::BigInt(v) => Value::Int(*v),
        SqlValue::Int(v) => Value::Int(i64::from(*v)),
        SqlValue::Text(v) => Value::Bytes(v.as_bytes().to_vec()),
        SqlValue::Bool(v) => Value::Int(i64::from(*v)),
        SqlValue::Null => Value::NULL,
    }
}

fn batch_params(batch: &InsertBatch) -> Params {
    Params::Positional(batch.params().map(to_value).collect())
}

fn column<T: FromValue>(
    row: &mysql_async::Row,
    idx: usize,
    wrap: fn(T) -> SqlValue,
) -> Result<SqlValue, StoreError> {
    match row.get_opt::<Option<T>, usize>(idx) {
        Some(Ok(value)) => Ok(value.map_or(SqlValue::Null, wrap)),
        Some(Err(e)) => Err(StoreError::query(e)),
        None => Err(StoreError::query(format!("missing column {idx}"))),
    }
}

fn decode_row(row: &mysql_async::Row, columns: &[(&str, ColumnType)]) -> Result<Row, StoreError> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, (_, column_type))| match column_type {
            ColumnType::BigInt => column(row, idx, SqlValue::BigInt),
            ColumnType::Int => column(row, idx, SqlValue::Int),
            ColumnType::VarChar(_) | ColumnType::Text => column(row, idx, SqlValue::Text),
            ColumnType::Bool => column(row, idx, SqlValue::Bool),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Row)
}

#[async_trait]
impl BackingStore for MySQLStore {
    fn dialect(&self) -> Dialect {
        Dialect::MySQL
    }

    async fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let count: Option<u64> = conn
            .exec_first(TABLE_EXISTS_SQL, (table,))
            .await
            .map_err(StoreError::query)?;
        Ok(count.unwrap_or(0) > 0)
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        for statement in &migration.statements {
            conn.query_drop(statement)
                .await
                .map_err(|e| StoreError::migration(migration.table, e))?;
        }
        Ok(())
    }

    async fn run_in_transaction(&self, batches: &[InsertBatch]) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let mut tx = conn
            .start_transaction(TxOpts::default())
            .await
            .map_err(StoreError::transaction)?;

        for batch in batches.iter().filter(|b| !b.is_empty()) {
            let sql = batch.to_sql(Dialect::MySQL);
            debug!("Inserting {} rows into '{}'", batch.rows.len(), batch.table);
            // An uncommitted transaction is rolled back when dropped.
            tx.exec_drop(&sql, batch_params(batch))
                .await
                .map_err(|e| StoreError::insert(batch.table, e))?;
        }

        tx.commit().await.map_err(StoreError::transaction)
    }

    async fn query(&self, query: SelectQuery) -> Result<Vec<Row>, StoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<mysql_async::Row> =
            conn.query(query.sql()).await.map_err(StoreError::query)?;
        rows.iter()
            .map(|row| decode_row(row, query.columns()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenants_cache::schema::cti_batch;
    use tenants_cache::CtiEntity;

    #[test]
    fn test_values_are_positional() {
        let batch = cti_batch(&[
            CtiEntity {
                uuid: "a".to_string(),
                cti: "cti.a.p.x.v1.0".to_string(),
                is_final: true,
            },
            CtiEntity {
                uuid: "b".to_string(),
                cti: "cti.a.p.y.v1.0".to_string(),
                is_final: false,
            },
        ]);

        assert_eq!(
            batch.to_sql(Dialect::MySQL),
            "INSERT INTO cti_entities (uuid, cti, is_final) VALUES (?, ?, ?), (?, ?, ?)"
        );
        match batch_params(&batch) {
            Params::Positional(values) => {
                assert_eq!(values.len(), 6);
                assert_eq!(values[0], Value::Bytes(b"a".to_vec()));
                assert_eq!(values[2], Value::Int(1));
                assert_eq!(values[5], Value::Int(0));
            }
            other => panic!("expected positional params, got {other:?}"),
        }
    }

    #[test]
    fn test_null_maps_to_null() {
        assert_eq!(to_value(&SqlValue::Null), Value::NULL);
        assert_eq!(to_value(&SqlValue::Int(-3)), Value::Int(-3));
    }
}

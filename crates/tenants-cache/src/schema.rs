//! Tables owned by the tenants cache and their SQL rendering.
//!
//! All dialect-specific SQL is produced here: store drivers execute the
//! rendered statements and never build SQL of their own for these tables.

use crate::error::{Result, TenantsCacheError};
use crate::model::{ClosureEdge, CtiEntity, TenantNode};
use std::fmt;

pub const TENANTS_TABLE: &str = "tenants";
pub const TENANT_CLOSURE_TABLE: &str = "tenant_closure";
pub const CTI_ENTITIES_TABLE: &str = "cti_entities";
pub const CTI_PROVISIONING_TABLE: &str = "cti_provisioning";

/// Database dialect reported by a backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    PostgreSQL,
    MySQL,
    SQLite,
    ClickHouse,
    Cassandra,
}

impl Dialect {
    /// Whether the tenant tables can be created on this dialect.
    pub fn supports_tenants(&self) -> bool {
        matches!(self, Dialect::PostgreSQL | Dialect::MySQL)
    }

    /// Bind placeholder for the 1-based parameter `position`.
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Dialect::PostgreSQL => format!("${position}"),
            _ => "?".to_string(),
        }
    }

    fn column_type(&self, column_type: ColumnType) -> String {
        match (self, column_type) {
            (_, ColumnType::BigInt) => "BIGINT".to_string(),
            (Dialect::MySQL, ColumnType::Int) => "INT".to_string(),
            (_, ColumnType::Int) => "INTEGER".to_string(),
            (_, ColumnType::VarChar(len)) => format!("VARCHAR({len})"),
            (_, ColumnType::Text) => "TEXT".to_string(),
            (Dialect::MySQL, ColumnType::Bool) => "TINYINT(1)".to_string(),
            (_, ColumnType::Bool) => "BOOLEAN".to_string(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::PostgreSQL => "postgresql",
            Dialect::MySQL => "mysql",
            Dialect::SQLite => "sqlite",
            Dialect::ClickHouse => "clickhouse",
            Dialect::Cassandra => "cassandra",
        };
        f.write_str(name)
    }
}

/// Column types used by the tenant tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Int,
    VarChar(u16),
    Text,
    Bool,
}

/// A value bound into, or read from, a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    BigInt(i64),
    Int(i32),
    Text(String),
    Bool(bool),
    Null,
}

/// One result row, decoded according to the query's declared column types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row(pub Vec<SqlValue>);

impl Row {
    fn value(&self, idx: usize) -> Result<&SqlValue> {
        self.0
            .get(idx)
            .ok_or_else(|| TenantsCacheError::InvalidRow(format!("missing column {idx}")))
    }

    pub fn big_int(&self, idx: usize) -> Result<i64> {
        match self.value(idx)? {
            SqlValue::BigInt(v) => Ok(*v),
            SqlValue::Int(v) => Ok(i64::from(*v)),
            other => Err(unexpected(idx, "integer", other)),
        }
    }

    pub fn int(&self, idx: usize) -> Result<i32> {
        match self.value(idx)? {
            SqlValue::Int(v) => Ok(*v),
            SqlValue::BigInt(v) => i32::try_from(*v)
                .map_err(|_| TenantsCacheError::InvalidRow(format!("column {idx} overflows: {v}"))),
            other => Err(unexpected(idx, "integer", other)),
        }
    }

    pub fn text(&self, idx: usize) -> Result<&str> {
        match self.value(idx)? {
            SqlValue::Text(v) => Ok(v),
            other => Err(unexpected(idx, "text", other)),
        }
    }

    pub fn bool(&self, idx: usize) -> Result<bool> {
        match self.value(idx)? {
            SqlValue::Bool(v) => Ok(*v),
            SqlValue::Int(v) => Ok(*v != 0),
            other => Err(unexpected(idx, "boolean", other)),
        }
    }
}

fn unexpected(idx: usize, expected: &str, got: &SqlValue) -> TenantsCacheError {
    TenantsCacheError::InvalidRow(format!("column {idx}: expected {expected}, got {got:?}"))
}

/// DDL needed to create one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub table: &'static str,
    pub statements: Vec<String>,
}

struct IndexDef {
    name: &'static str,
    columns: &'static [&'static str],
    unique: bool,
}

struct TableDef {
    name: &'static str,
    columns: &'static [(&'static str, ColumnType)],
    primary_key: &'static [&'static str],
    indexes: &'static [IndexDef],
}

const TENANT_COLUMNS: &[(&str, ColumnType)] = &[
    ("id", ColumnType::BigInt),
    ("uuid", ColumnType::VarChar(36)),
    ("name", ColumnType::VarChar(255)),
    ("kind", ColumnType::VarChar(16)),
    ("parent_id", ColumnType::BigInt),
    ("nesting_level", ColumnType::Int),
    ("is_deleted", ColumnType::Bool),
    ("parent_has_access", ColumnType::Bool),
];

const CLOSURE_COLUMNS: &[(&str, ColumnType)] = &[
    ("ancestor_id", ColumnType::BigInt),
    ("descendant_id", ColumnType::BigInt),
    ("ancestor_kind", ColumnType::VarChar(16)),
    ("barrier", ColumnType::Int),
];

const CTI_COLUMNS: &[(&str, ColumnType)] = &[
    ("uuid", ColumnType::VarChar(36)),
    ("cti", ColumnType::Text),
    ("is_final", ColumnType::Bool),
];

/// Tables in creation order.
const TABLES: &[TableDef] = &[
    TableDef {
        name: TENANTS_TABLE,
        columns: TENANT_COLUMNS,
        primary_key: &["id"],
        indexes: &[
            IndexDef {
                name: "tenants_uuid_idx",
                columns: &["uuid"],
                unique: true,
            },
            IndexDef {
                name: "tenants_parent_id_idx",
                columns: &["parent_id"],
                unique: false,
            },
        ],
    },
    TableDef {
        name: TENANT_CLOSURE_TABLE,
        columns: CLOSURE_COLUMNS,
        primary_key: &["ancestor_id", "descendant_id"],
        indexes: &[IndexDef {
            name: "tenant_closure_descendant_idx",
            columns: &["descendant_id"],
            unique: false,
        }],
    },
    TableDef {
        name: CTI_ENTITIES_TABLE,
        columns: CTI_COLUMNS,
        primary_key: &["uuid"],
        indexes: &[],
    },
    TableDef {
        name: CTI_PROVISIONING_TABLE,
        columns: &[
            ("tenant_id", ColumnType::BigInt),
            ("cti_entity_uuid", ColumnType::VarChar(36)),
            ("state", ColumnType::VarChar(32)),
        ],
        primary_key: &["tenant_id", "cti_entity_uuid"],
        indexes: &[],
    },
];

impl TableDef {
    fn migration(&self, dialect: Dialect) -> Migration {
        let mut body: Vec<String> = self
            .columns
            .iter()
            .map(|(name, ty)| format!("{name} {} NOT NULL", dialect.column_type(*ty)))
            .collect();
        body.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));

        let mut statements = Vec::new();
        match dialect {
            Dialect::MySQL => {
                body.extend(self.indexes.iter().map(|idx| {
                    let unique = if idx.unique { "UNIQUE " } else { "" };
                    format!("{unique}INDEX {} ({})", idx.name, idx.columns.join(", "))
                }));
                statements.push(format!(
                    "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE=InnoDB",
                    self.name,
                    body.join(", ")
                ));
            }
            _ => {
                statements.push(format!(
                    "CREATE TABLE IF NOT EXISTS {} ({})",
                    self.name,
                    body.join(", ")
                ));
                statements.extend(self.indexes.iter().map(|idx| {
                    let unique = if idx.unique { "UNIQUE " } else { "" };
                    format!(
                        "CREATE {unique}INDEX IF NOT EXISTS {} ON {} ({})",
                        idx.name,
                        self.name,
                        idx.columns.join(", ")
                    )
                }));
            }
        }

        Migration {
            table: self.name,
            statements,
        }
    }
}

/// Migrations for every table, in dependency order.
///
/// Returns `None` for dialects that cannot host the tenant tables.
pub fn migrations(dialect: Dialect) -> Option<Vec<Migration>> {
    dialect
        .supports_tenants()
        .then(|| TABLES.iter().map(|t| t.migration(dialect)).collect())
}

/// Rows to insert into one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertBatch {
    pub table: &'static str,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl InsertBatch {
    fn new(table: &'static str, columns: &[(&'static str, ColumnType)]) -> Self {
        Self {
            table,
            columns: columns.iter().map(|(name, _)| *name).collect(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Multi-row `INSERT` with one placeholder per value, in row-major order.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut position = 0;
        let rows: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let placeholders: Vec<String> = row
                    .iter()
                    .map(|_| {
                        position += 1;
                        dialect.placeholder(position)
                    })
                    .collect();
                format!("({})", placeholders.join(", "))
            })
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table,
            self.columns.join(", "),
            rows.join(", ")
        )
    }

    /// Bind values in placeholder order.
    pub fn params(&self) -> impl Iterator<Item = &SqlValue> {
        self.rows.iter().flatten()
    }
}

pub fn tenant_batch(nodes: &[TenantNode]) -> InsertBatch {
    let mut batch = InsertBatch::new(TENANTS_TABLE, TENANT_COLUMNS);
    batch.rows = nodes
        .iter()
        .map(|node| {
            vec![
                SqlValue::BigInt(node.id),
                SqlValue::Text(node.uuid.clone()),
                SqlValue::Text(node.name.clone()),
                SqlValue::Text(node.kind.as_str().to_string()),
                SqlValue::BigInt(node.parent_id),
                SqlValue::Int(node.nesting_level as i32),
                SqlValue::Bool(node.is_deleted),
                SqlValue::Bool(node.parent_has_access),
            ]
        })
        .collect();
    batch
}

pub fn closure_batch(edges: &[ClosureEdge]) -> InsertBatch {
    let mut batch = InsertBatch::new(TENANT_CLOSURE_TABLE, CLOSURE_COLUMNS);
    batch.rows = edges
        .iter()
        .map(|edge| {
            vec![
                SqlValue::BigInt(edge.ancestor_id),
                SqlValue::BigInt(edge.descendant_id),
                SqlValue::Text(edge.ancestor_kind.as_str().to_string()),
                SqlValue::Int(edge.barrier),
            ]
        })
        .collect();
    batch
}

pub fn cti_batch(entities: &[CtiEntity]) -> InsertBatch {
    let mut batch = InsertBatch::new(CTI_ENTITIES_TABLE, CTI_COLUMNS);
    batch.rows = entities
        .iter()
        .map(|entity| {
            vec![
                SqlValue::Text(entity.uuid.clone()),
                SqlValue::Text(entity.cti.clone()),
                SqlValue::Bool(entity.is_final),
            ]
        })
        .collect();
    batch
}

/// Read queries issued during bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectQuery {
    /// All tenants, ordered by id.
    Tenants,
    /// Non-self closure edges, grouped by descendant, nearest ancestor first.
    Ancestry,
    /// All CTI entity uuids.
    CtiUuids,
    /// Ids of level-0 tenants.
    RootTenant,
}

impl SelectQuery {
    pub fn sql(&self) -> &'static str {
        match self {
            SelectQuery::Tenants => {
                "SELECT id, uuid, name, kind, parent_id, nesting_level, is_deleted, parent_has_access \
                 FROM tenants ORDER BY id"
            }
            SelectQuery::Ancestry => {
                "SELECT c.descendant_id, c.ancestor_id, c.barrier \
                 FROM tenant_closure c JOIN tenants t ON t.id = c.ancestor_id \
                 WHERE c.ancestor_id <> c.descendant_id \
                 ORDER BY c.descendant_id, t.nesting_level DESC"
            }
            SelectQuery::CtiUuids => "SELECT uuid FROM cti_entities",
            SelectQuery::RootTenant => "SELECT id FROM tenants WHERE nesting_level = 0",
        }
    }

    /// Result columns and the types drivers must decode them as.
    pub fn columns(&self) -> &'static [(&'static str, ColumnType)] {
        match self {
            SelectQuery::Tenants => TENANT_COLUMNS,
            SelectQuery::Ancestry => &[
                ("descendant_id", ColumnType::BigInt),
                ("ancestor_id", ColumnType::BigInt),
                ("barrier", ColumnType::Int),
            ],
            SelectQuery::CtiUuids => &[("uuid", ColumnType::VarChar(36))],
            SelectQuery::RootTenant => &[("id", ColumnType::BigInt)],
        }
    }
}

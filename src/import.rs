//! Remote schema introspection.
//!
//! Reads `system_schema.columns` for one keyspace and turns every table
//! into a `RelationDescriptor` the host can build table definitions from.

use crate::codec;
use crate::connection::{ConnectionProvider, RowCursor, Session};
use crate::core::{BridgeError, Column, CodecError, DataType, RelationDescriptor, Value};
use crate::options::{ConnectionConfig, Consistency};
use crate::planner::render_literal;
use std::collections::BTreeMap;

/// `IMPORT FOREIGN SCHEMA` table selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TableFilter {
    #[default]
    All,
    LimitTo(Vec<String>),
    Except(Vec<String>),
}

impl TableFilter {
    #[must_use]
    pub fn includes(&self, table: &str) -> bool {
        match self {
            Self::All => true,
            Self::LimitTo(names) => names.iter().any(|n| n == table),
            Self::Except(names) => !names.iter().any(|n| n == table),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ColumnKind {
    PartitionKey,
    Clustering,
    Regular,
}

impl ColumnKind {
    fn parse(kind: &str) -> Self {
        match kind {
            "partition_key" => Self::PartitionKey,
            "clustering" => Self::Clustering,
            // regular and static
            _ => Self::Regular,
        }
    }
}

struct SchemaRow {
    table: String,
    column: String,
    cql_type: String,
    kind: ColumnKind,
    position: i32,
}

const SCHEMA_TYPES: [DataType; 5] = [
    DataType::Text,
    DataType::Text,
    DataType::Text,
    DataType::Text,
    DataType::Integer,
];

/// The introspection query for `keyspace`.
pub fn schema_query(keyspace: &str) -> Result<String, BridgeError> {
    Ok(format!(
        "SELECT table_name, column_name, type, kind, position FROM system_schema.columns WHERE keyspace_name = {}",
        render_literal(&Value::Text(keyspace.to_string()))?
    ))
}

fn schema_row(wire: &[codec::WireValue]) -> Result<SchemaRow, BridgeError> {
    if wire.len() != SCHEMA_TYPES.len() {
        return Err(CodecError::Malformed(format!("schema row has {} columns", wire.len())).into());
    }
    let mut values = wire
        .iter()
        .zip(SCHEMA_TYPES)
        .map(|(w, ty)| codec::decode(w, ty))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    let mut text = || match values.next() {
        Some(Value::Text(s)) => Ok(s),
        Some(other) => Err(CodecError::mismatch("text", other.type_name())),
        None => Err(CodecError::Malformed("schema row ended early".to_string())),
    };
    let table = text()?;
    let column = text()?;
    let cql_type = text()?;
    let kind = ColumnKind::parse(&text()?);
    let position = match values.next() {
        Some(Value::Integer(p)) => p,
        _ => -1,
    };
    Ok(SchemaRow {
        table,
        column,
        cql_type,
        kind,
        position,
    })
}

fn descriptor(keyspace: &str, table: &str, mut rows: Vec<SchemaRow>) -> RelationDescriptor {
    // Stable: regular columns keep the server's order
    rows.sort_by_key(|r| (r.kind, r.position));
    let keys = |kind: ColumnKind| -> Vec<String> {
        rows.iter().filter(|r| r.kind == kind).map(|r| r.column.clone()).collect()
    };
    let partition_key = keys(ColumnKind::PartitionKey);
    let clustering_key = keys(ColumnKind::Clustering);
    let columns = rows
        .iter()
        .map(|r| Column::new(r.column.clone(), DataType::from_cql(&r.cql_type)))
        .collect();
    RelationDescriptor::new(keyspace, table, columns)
        .with_partition_key(&partition_key)
        .with_clustering_key(&clustering_key)
}

/// Describe every table of `keyspace` selected by `filter`, in name order.
pub fn import_schema<S: Session>(
    session: &mut S,
    keyspace: &str,
    filter: &TableFilter,
    consistency: Consistency,
) -> Result<Vec<RelationDescriptor>, BridgeError> {
    let cql = schema_query(keyspace)?;
    tracing::debug!(%keyspace, "importing schema");
    let mut cursor = session.execute(&cql, consistency)?;

    let mut tables: BTreeMap<String, Vec<SchemaRow>> = BTreeMap::new();
    while let Some(wire) = cursor.next_row()? {
        let row = schema_row(&wire)?;
        if filter.includes(&row.table) {
            tables.entry(row.table.clone()).or_default().push(row);
        }
    }

    let relations: Vec<_> = tables
        .into_iter()
        .map(|(table, rows)| descriptor(keyspace, &table, rows))
        .collect();
    tracing::debug!(%keyspace, tables = relations.len(), "schema imported");
    Ok(relations)
}

/// Open a session, import at consistency ONE and close it again.
pub fn import_with<P: ConnectionProvider>(
    provider: &P,
    config: &ConnectionConfig,
    keyspace: &str,
    filter: &TableFilter,
) -> Result<Vec<RelationDescriptor>, BridgeError> {
    let mut session = provider.connect(config)?;
    let result = import_schema(&mut session, keyspace, filter, Consistency::One);
    session.close();
    result
}

//! In-memory cluster for tests and dry runs.
//!
//! Tables are keyed by keyspace and name and hold rows as wire values.
//! Statements are parsed with the same CQL grammar the deparser emits and
//! evaluated like a single-node server would: a SELECT that needs
//! `ALLOW FILTERING` and lacks it is rejected with the server's message,
//! writes upsert by primary key, and `system_schema.columns` is served from
//! the stored table definitions.

use super::{BoundStatement, ConnectionProvider, PreparedStatement, RowCursor, Session};
use crate::codec::{self, WireValue};
use crate::core::{BridgeError, CodecError, DataType, RelationDescriptor, Value, WireError};
use crate::executor::evaluate::Evaluator;
use crate::options::{ConnectionConfig, Consistency};
use crate::parser::{parse_cql, CompareOp, CqlRelation, CqlStatement, CqlTerm, Expr};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const ALLOW_FILTERING_MESSAGE: &str = "Cannot execute this query as it might involve data \
filtering and thus may have unpredictable performance. If you want to execute this query despite \
the performance unpredictability, use ALLOW FILTERING";

const SYSTEM_KEYSPACE: &str = "system_schema";
const SYSTEM_COLUMNS: &str = "columns";

/// One request as the cluster received it
#[derive(Debug, Clone, PartialEq)]
pub enum Submitted {
    Execute { cql: String, consistency: Consistency },
    Prepare { cql: String },
    ExecuteBound {
        cql: String,
        values: Vec<WireValue>,
        consistency: Consistency,
    },
}

impl Submitted {
    #[must_use]
    pub fn cql(&self) -> &str {
        match self {
            Self::Execute { cql, .. } | Self::Prepare { cql } | Self::ExecuteBound { cql, .. } => cql,
        }
    }
}

/// CQL type name for a semantic type
#[must_use]
pub const fn cql_type_name(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Boolean => "boolean",
        DataType::SmallInt => "smallint",
        DataType::Integer => "int",
        DataType::BigInt => "bigint",
        DataType::Real => "float",
        DataType::DoublePrecision => "double",
        DataType::Numeric => "decimal",
        DataType::Bytea => "blob",
        DataType::Uuid => "uuid",
        DataType::Inet => "inet",
        DataType::Timestamp | DataType::TimestampTz => "timestamp",
        DataType::Date => "date",
        DataType::Time => "time",
        DataType::Text | DataType::Varchar | DataType::Char | DataType::Json | DataType::Other => "text",
    }
}

#[derive(Debug, Clone)]
struct StoredTable {
    relation: RelationDescriptor,
    cql_types: Vec<String>,
    rows: Vec<Vec<WireValue>>,
}

impl StoredTable {
    fn new(mut relation: RelationDescriptor) -> Self {
        relation.columns.retain(|c| !c.dropped);
        let cql_types = relation
            .columns
            .iter()
            .map(|c| cql_type_name(c.data_type).to_string())
            .collect();
        Self {
            relation,
            cql_types,
            rows: Vec::new(),
        }
    }

    fn column(&self, name: &str) -> Result<(usize, DataType), String> {
        self.relation
            .column_index(name)
            .map(|idx| (idx, self.relation.columns[idx].data_type))
            .ok_or_else(|| format!("Undefined column name {name}"))
    }

    fn decode_row(&self, row: &[WireValue]) -> Result<Vec<Value>, CodecError> {
        self.relation
            .columns
            .iter()
            .zip(row)
            .map(|(column, wire)| codec::decode(wire, column.data_type))
            .collect()
    }

    fn matching(&self, filters: &[Expr]) -> Result<Vec<usize>, String> {
        let mut hits = Vec::new();
        for (idx, row) in self.rows.iter().enumerate() {
            let values = self.decode_row(row).map_err(|e| e.to_string())?;
            let passes = Evaluator::new(&self.relation, &values)
                .matches_all(filters)
                .map_err(|e| e.to_string())?;
            if passes {
                hits.push(idx);
            }
        }
        Ok(hits)
    }

    /// Full primary key from `pairs`; every key column must be present and non-null.
    fn key(&self, pairs: &[(usize, WireValue)]) -> Result<Vec<(usize, WireValue)>, String> {
        let mut key = Vec::new();
        for name in self.relation.primary_key() {
            let (idx, _) = self.column(name)?;
            let value = pairs
                .iter()
                .find(|(i, _)| *i == idx)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| format!("Some primary key parts are missing: {name}"))?;
            if value.is_null() {
                return Err(format!("Invalid null value for primary key part {name}"));
            }
            key.push((idx, value));
        }
        Ok(key)
    }

    fn upsert(&mut self, key: &[(usize, WireValue)], assigned: &[(usize, WireValue)]) {
        let existing = self
            .rows
            .iter()
            .position(|row| key.iter().all(|(idx, value)| row[*idx] == *value));
        let row_idx = match existing {
            Some(idx) => idx,
            None => {
                let mut row = vec![WireValue::Null; self.relation.columns.len()];
                for (idx, value) in key {
                    row[*idx] = value.clone();
                }
                self.rows.push(row);
                self.rows.len() - 1
            }
        };
        for (idx, value) in assigned {
            self.rows[row_idx][*idx] = value.clone();
        }
    }
}

/// Supplies bind-marker values in statement order
struct Terms<'a> {
    bound: std::slice::Iter<'a, WireValue>,
}

impl<'a> Terms<'a> {
    fn new(bound: &'a [WireValue]) -> Self {
        Self { bound: bound.iter() }
    }

    fn wire(&mut self, term: &CqlTerm, data_type: DataType) -> Result<WireValue, String> {
        match term {
            CqlTerm::Marker => self
                .bound
                .next()
                .cloned()
                .ok_or_else(|| "Invalid amount of bind variables".to_string()),
            CqlTerm::Value(value) => value
                .cast_to(data_type)
                .and_then(|v| codec::encode(&v, data_type))
                .map_err(|e| format!("Invalid literal {value}: {e}")),
        }
    }

    fn value(&mut self, term: &CqlTerm, data_type: DataType) -> Result<Value, String> {
        let wire = self.wire(term, data_type)?;
        codec::decode(&wire, data_type).map_err(|e| e.to_string())
    }

    fn finish(self) -> Result<(), String> {
        if self.bound.len() == 0 {
            Ok(())
        } else {
            Err("Invalid amount of bind variables".to_string())
        }
    }
}

fn filters(table: &StoredTable, relations: &[CqlRelation], terms: &mut Terms<'_>) -> Result<Vec<Expr>, String> {
    let mut exprs = Vec::new();
    for relation in relations {
        let (_, data_type) = table.column(relation.column())?;
        let column = Expr::col(relation.column());
        let expr = match relation {
            CqlRelation::Compare { op, term, .. } => {
                Expr::compare(*op, column, Expr::lit(terms.value(term, data_type)?))
            }
            CqlRelation::In { terms: list, .. } => {
                let values = list
                    .iter()
                    .map(|t| terms.value(t, data_type).map(Expr::lit))
                    .collect::<Result<Vec<_>, _>>()?;
                Expr::in_list(column, values)
            }
        };
        exprs.push(expr);
    }
    Ok(exprs)
}

/// Server-side rule for rejecting a SELECT that lacks `ALLOW FILTERING`:
/// every partition key column pinned by `=` or `IN`, clustering relations
/// forming a prefix that only the last restricted column may slice, and no
/// relation on a regular column or with `!=`.
fn requires_filtering(table: &RelationDescriptor, relations: &[CqlRelation]) -> bool {
    fn on<'a>(relations: &'a [CqlRelation], column: &str) -> Vec<&'a CqlRelation> {
        relations.iter().filter(|r| r.column() == column).collect()
    }
    fn pins(rels: &[&CqlRelation]) -> bool {
        !rels.is_empty()
            && rels.iter().all(|r| {
                matches!(
                    r,
                    CqlRelation::In { .. } | CqlRelation::Compare { op: CompareOp::Eq, .. }
                )
            })
    }

    if relations.is_empty() {
        return false;
    }
    if table.partition_key.is_empty() || !table.partition_key.iter().all(|pk| pins(&on(relations, pk))) {
        return true;
    }
    if relations.iter().any(|r| {
        !table.is_key_column(r.column()) || matches!(r, CqlRelation::Compare { op: CompareOp::NotEq, .. })
    }) {
        return true;
    }

    let mut prefix_open = true;
    for ck in &table.clustering_key {
        let rels = on(relations, ck);
        if rels.is_empty() {
            prefix_open = false;
        } else if !prefix_open {
            return true;
        } else if !pins(&rels) {
            prefix_open = false;
        }
    }
    false
}

/// Key columns pinned by equality relations in a write's WHERE clause
fn key_pairs(
    table: &StoredTable,
    relations: &[CqlRelation],
    terms: &mut Terms<'_>,
) -> Result<Vec<(usize, WireValue)>, String> {
    let mut pairs = Vec::new();
    for relation in relations {
        let name = relation.column();
        if !table.relation.is_key_column(name) {
            table.column(name)?;
            return Err(format!("Non PRIMARY KEY columns found in where clause: {name}"));
        }
        let (idx, data_type) = table.column(name)?;
        match relation {
            CqlRelation::Compare {
                op: CompareOp::Eq,
                term,
                ..
            } => pairs.push((idx, terms.wire(term, data_type)?)),
            _ => return Err(format!("Only EQ relations are supported on primary key part {name}")),
        }
    }
    Ok(pairs)
}

#[derive(Debug, Default)]
struct ClusterState {
    tables: BTreeMap<(String, String), StoredTable>,
    submitted: Vec<Submitted>,
    refusal: Option<String>,
    failures: Vec<(String, String)>,
    fail_bound_after: Option<(usize, String)>,
    bound_executions: usize,
    open_sessions: usize,
    connects: usize,
}

impl ClusterState {
    fn table(&self, keyspace: &str, table: &str) -> Result<&StoredTable, String> {
        self.tables
            .get(&(keyspace.to_string(), table.to_string()))
            .ok_or_else(|| format!("unconfigured table {table}"))
    }

    fn table_mut(&mut self, keyspace: &str, table: &str) -> Result<&mut StoredTable, String> {
        self.tables
            .get_mut(&(keyspace.to_string(), table.to_string()))
            .ok_or_else(|| format!("unconfigured table {table}"))
    }

    fn injected_failure(&self, cql: &str) -> Option<String> {
        self.failures
            .iter()
            .find(|(pattern, _)| cql.contains(pattern.as_str()))
            .map(|(_, message)| message.clone())
    }

    fn system_columns(&self) -> StoredTable {
        let relation = RelationDescriptor::new(
            SYSTEM_KEYSPACE,
            SYSTEM_COLUMNS,
            vec![
                crate::core::Column::new("keyspace_name", DataType::Text),
                crate::core::Column::new("table_name", DataType::Text),
                crate::core::Column::new("column_name", DataType::Text),
                crate::core::Column::new("kind", DataType::Text),
                crate::core::Column::new("position", DataType::Integer),
                crate::core::Column::new("type", DataType::Text),
            ],
        )
        .with_partition_key(&["keyspace_name"])
        .with_clustering_key(&["table_name", "column_name"]);

        let mut system = StoredTable::new(relation);
        for ((keyspace, name), table) in &self.tables {
            for (column, cql_type) in table.relation.columns.iter().zip(&table.cql_types) {
                let partition = table.relation.partition_key.iter().position(|k| *k == column.name);
                let clustering = table.relation.clustering_key.iter().position(|k| *k == column.name);
                let (kind, position) = match (partition, clustering) {
                    (Some(p), _) => ("partition_key", p as i32),
                    (None, Some(p)) => ("clustering", p as i32),
                    (None, None) => ("regular", -1),
                };
                system.rows.push(vec![
                    WireValue::Text(keyspace.clone()),
                    WireValue::Text(name.clone()),
                    WireValue::Text(column.name.clone()),
                    WireValue::Text(kind.to_string()),
                    WireValue::Int(position),
                    WireValue::Text(cql_type.clone()),
                ]);
            }
        }
        system
    }

    /// Check that the target table and every named column exist.
    fn check(&self, statement: &CqlStatement) -> Result<(), String> {
        let (keyspace, name) = statement.target();
        if keyspace == SYSTEM_KEYSPACE && name == SYSTEM_COLUMNS {
            return Ok(());
        }
        let table = self.table(keyspace, name)?;
        let names: Vec<&str> = match statement {
            CqlStatement::Select { columns, relations, .. } => columns
                .iter()
                .map(String::as_str)
                .chain(relations.iter().map(CqlRelation::column))
                .collect(),
            CqlStatement::Insert { columns, .. } => columns.iter().map(String::as_str).collect(),
            CqlStatement::Update {
                assignments,
                relations,
                ..
            } => assignments
                .iter()
                .map(|(c, _)| c.as_str())
                .chain(relations.iter().map(CqlRelation::column))
                .collect(),
            CqlStatement::Delete { relations, .. } => relations.iter().map(CqlRelation::column).collect(),
        };
        for name in names {
            table.column(name)?;
        }
        Ok(())
    }

    fn run(&mut self, statement: &CqlStatement, bound: &[WireValue]) -> Result<Vec<Vec<WireValue>>, String> {
        self.check(statement)?;
        let mut terms = Terms::new(bound);
        let rows = match statement {
            CqlStatement::Select {
                columns,
                keyspace,
                table,
                relations,
                allow_filtering,
            } => self.select(columns, keyspace, table, relations, *allow_filtering, &mut terms)?,
            CqlStatement::Insert {
                keyspace,
                table,
                columns,
                values,
            } => {
                let stored = self.table_mut(keyspace, table)?;
                let mut assigned = Vec::new();
                for (column, term) in columns.iter().zip(values) {
                    let (idx, data_type) = stored.column(column)?;
                    assigned.push((idx, terms.wire(term, data_type)?));
                }
                let key = stored.key(&assigned)?;
                stored.upsert(&key, &assigned);
                Vec::new()
            }
            CqlStatement::Update {
                keyspace,
                table,
                assignments,
                relations,
            } => {
                let stored = self.table_mut(keyspace, table)?;
                let mut assigned = Vec::new();
                for (column, term) in assignments {
                    if stored.relation.is_key_column(column) {
                        return Err(format!("PRIMARY KEY part {column} found in SET part"));
                    }
                    let (idx, data_type) = stored.column(column)?;
                    assigned.push((idx, terms.wire(term, data_type)?));
                }
                let pairs = key_pairs(stored, relations, &mut terms)?;
                let key = stored.key(&pairs)?;
                stored.upsert(&key, &assigned);
                Vec::new()
            }
            CqlStatement::Delete {
                keyspace,
                table,
                relations,
            } => {
                let stored = self.table_mut(keyspace, table)?;
                let pairs = key_pairs(stored, relations, &mut terms)?;
                for name in &stored.relation.partition_key {
                    let (idx, _) = stored.column(name)?;
                    if !pairs.iter().any(|(i, _)| *i == idx) {
                        return Err(format!("Some partition key parts are missing: {name}"));
                    }
                }
                stored
                    .rows
                    .retain(|row| !pairs.iter().all(|(idx, value)| row[*idx] == *value));
                Vec::new()
            }
        };
        terms.finish()?;
        Ok(rows)
    }

    fn select(
        &self,
        columns: &[String],
        keyspace: &str,
        table: &str,
        relations: &[CqlRelation],
        allow_filtering: bool,
        terms: &mut Terms<'_>,
    ) -> Result<Vec<Vec<WireValue>>, String> {
        let system;
        let stored = if keyspace == SYSTEM_KEYSPACE && table == SYSTEM_COLUMNS {
            system = self.system_columns();
            &system
        } else {
            self.table(keyspace, table)?
        };

        let projection: Vec<usize> = if columns.is_empty() {
            stored.relation.live_columns().collect()
        } else {
            columns
                .iter()
                .map(|c| stored.column(c).map(|(idx, _)| idx))
                .collect::<Result<_, _>>()?
        };

        let filters = filters(stored, relations, terms)?;
        if !allow_filtering && requires_filtering(&stored.relation, relations) {
            return Err(ALLOW_FILTERING_MESSAGE.to_string());
        }

        Ok(stored
            .matching(&filters)?
            .into_iter()
            .map(|row| projection.iter().map(|&c| stored.rows[row][c].clone()).collect())
            .collect())
    }
}

/// Shared handle to an in-memory cluster; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl MemoryCluster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create (or replace) a table shaped like `relation`. Dropped columns
    /// are not created.
    pub fn create_table(&self, relation: RelationDescriptor) {
        let key = (relation.keyspace.clone(), relation.table.clone());
        self.lock().tables.insert(key, StoredTable::new(relation));
    }

    /// Report `cql_type` for `column` in `system_schema.columns`, for types
    /// the bridge stores as text (collections, user-defined types).
    pub fn set_cql_type(&self, keyspace: &str, table: &str, column: &str, cql_type: &str) -> Result<(), BridgeError> {
        let mut state = self.lock();
        let stored = state.table_mut(keyspace, table).map_err(WireError::Execution)?;
        let (idx, _) = stored.column(column).map_err(WireError::Execution)?;
        stored.cql_types[idx] = cql_type.to_string();
        Ok(())
    }

    /// Store one row given in the table's column order.
    pub fn insert_row(&self, keyspace: &str, table: &str, values: Vec<Value>) -> Result<(), BridgeError> {
        let mut state = self.lock();
        let stored = state.table_mut(keyspace, table).map_err(WireError::Execution)?;
        if values.len() != stored.relation.columns.len() {
            return Err(WireError::Execution(format!(
                "expected {} values, got {}",
                stored.relation.columns.len(),
                values.len()
            ))
            .into());
        }
        let row = stored
            .relation
            .columns
            .iter()
            .zip(&values)
            .map(|(column, value)| codec::encode(value, column.data_type))
            .collect::<Result<Vec<_>, _>>()?;

        if stored.relation.has_primary_key() {
            let pairs: Vec<_> = row.into_iter().enumerate().collect();
            let key = stored.key(&pairs).map_err(WireError::Execution)?;
            stored.upsert(&key, &pairs);
        } else {
            stored.rows.push(row);
        }
        Ok(())
    }

    /// Decoded rows of a table, in storage order.
    pub fn rows(&self, keyspace: &str, table: &str) -> Result<Vec<Vec<Value>>, BridgeError> {
        let state = self.lock();
        let stored = state.table(keyspace, table).map_err(WireError::Execution)?;
        let mut rows = Vec::new();
        for row in &stored.rows {
            rows.push(stored.decode_row(row)?);
        }
        Ok(rows)
    }

    #[must_use]
    pub fn submitted(&self) -> Vec<Submitted> {
        self.lock().submitted.clone()
    }

    /// CQL text of every execute and prepare request, in order
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.lock()
            .submitted
            .iter()
            .filter(|s| !matches!(s, Submitted::ExecuteBound { .. }))
            .map(|s| s.cql().to_string())
            .collect()
    }

    pub fn clear_log(&self) {
        self.lock().submitted.clear();
    }

    /// Refuse every following connection attempt with `message`.
    pub fn refuse_connections(&self, message: &str) {
        self.lock().refusal = Some(message.to_string());
    }

    /// Fail any execution whose CQL contains `pattern`.
    pub fn fail_statements_containing(&self, pattern: &str, message: &str) {
        self.lock().failures.push((pattern.to_string(), message.to_string()));
    }

    /// Let `count` more bound executions succeed, then fail the rest.
    pub fn fail_bound_after(&self, count: usize, message: &str) {
        let mut state = self.lock();
        let done = state.bound_executions;
        state.fail_bound_after = Some((done + count, message.to_string()));
    }

    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    #[must_use]
    pub fn connects(&self) -> usize {
        self.lock().connects
    }
}

impl ConnectionProvider for MemoryCluster {
    type Session = MemorySession;

    fn connect(&self, config: &ConnectionConfig) -> Result<MemorySession, WireError> {
        let mut state = self.lock();
        if let Some(message) = &state.refusal {
            return Err(WireError::Connection(message.clone()));
        }
        if config.hosts.is_empty() {
            return Err(WireError::Connection("no contact points given".to_string()));
        }
        state.open_sessions += 1;
        state.connects += 1;
        tracing::debug!(hosts = ?config.hosts, port = config.port, "memory session opened");
        Ok(MemorySession {
            cluster: self.clone(),
            open: true,
        })
    }
}

#[derive(Debug)]
pub struct MemorySession {
    cluster: MemoryCluster,
    open: bool,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<(), WireError> {
        if self.open {
            Ok(())
        } else {
            Err(WireError::Connection("session is closed".to_string()))
        }
    }
}

#[derive(Debug)]
pub struct MemoryCursor {
    rows: VecDeque<Vec<WireValue>>,
}

impl RowCursor for MemoryCursor {
    fn next_row(&mut self) -> Result<Option<Vec<WireValue>>, WireError> {
        Ok(self.rows.pop_front())
    }
}

#[derive(Debug, Clone)]
pub struct MemoryPrepared {
    cql: String,
    statement: CqlStatement,
}

impl PreparedStatement for MemoryPrepared {
    fn bind_marker_count(&self) -> usize {
        self.statement.marker_count()
    }
}

impl Session for MemorySession {
    type Cursor = MemoryCursor;
    type Prepared = MemoryPrepared;

    fn execute(&mut self, cql: &str, consistency: Consistency) -> Result<MemoryCursor, WireError> {
        self.ensure_open()?;
        let mut state = self.cluster.lock();
        state.submitted.push(Submitted::Execute {
            cql: cql.to_string(),
            consistency,
        });
        if let Some(message) = state.injected_failure(cql) {
            return Err(WireError::Execution(message));
        }
        let statement = parse_cql(cql).map_err(|e| WireError::Execution(format!("line 1: syntax error: {e}")))?;
        let rows = state.run(&statement, &[]).map_err(WireError::Execution)?;
        Ok(MemoryCursor { rows: rows.into() })
    }

    fn prepare(&mut self, cql: &str) -> Result<MemoryPrepared, WireError> {
        self.ensure_open()?;
        let mut state = self.cluster.lock();
        state.submitted.push(Submitted::Prepare { cql: cql.to_string() });
        let statement = parse_cql(cql).map_err(|e| WireError::Prepare(format!("line 1: syntax error: {e}")))?;
        if matches!(statement, CqlStatement::Select { .. }) {
            return Err(WireError::Prepare("only INSERT, UPDATE and DELETE can be prepared".to_string()));
        }
        state.check(&statement).map_err(WireError::Prepare)?;
        Ok(MemoryPrepared {
            cql: cql.to_string(),
            statement,
        })
    }

    fn execute_bound(
        &mut self,
        prepared: &MemoryPrepared,
        statement: &BoundStatement,
        consistency: Consistency,
    ) -> Result<(), WireError> {
        self.ensure_open()?;
        let values: Vec<WireValue> = statement.values()?.into_iter().cloned().collect();
        let mut state = self.cluster.lock();
        state.submitted.push(Submitted::ExecuteBound {
            cql: prepared.cql.clone(),
            values: values.clone(),
            consistency,
        });
        state.bound_executions += 1;
        if let Some((limit, message)) = &state.fail_bound_after {
            if state.bound_executions > *limit {
                return Err(WireError::Execution(message.clone()));
            }
        }
        if let Some(message) = state.injected_failure(&prepared.cql) {
            return Err(WireError::Execution(message));
        }
        state.run(&prepared.statement, &values).map_err(WireError::Execution)?;
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            let mut state = self.cluster.lock();
            state.open_sessions = state.open_sessions.saturating_sub(1);
            tracing::debug!("memory session closed");
        }
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Column;

    fn cluster() -> MemoryCluster {
        let cluster = MemoryCluster::new();
        cluster.create_table(
            RelationDescriptor::new(
                "ks",
                "events",
                vec![
                    Column::new("pk", DataType::Integer),
                    Column::new("ck", DataType::Integer),
                    Column::new("body", DataType::Text),
                ],
            )
            .with_partition_key(&["pk"])
            .with_clustering_key(&["ck"]),
        );
        for (pk, ck, body) in [(1, 1, "a"), (1, 2, "b"), (2, 1, "c")] {
            cluster
                .insert_row("ks", "events", vec![Value::Integer(pk), Value::Integer(ck), Value::from(body)])
                .unwrap();
        }
        cluster
    }

    fn select(session: &mut MemorySession, cql: &str) -> Result<Vec<Vec<WireValue>>, WireError> {
        let mut cursor = session.execute(cql, Consistency::One)?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }

    #[test]
    fn test_select_by_partition() {
        let cluster = cluster();
        let mut session = cluster.connect(&ConnectionConfig::default()).unwrap();
        let rows = select(&mut session, "SELECT body FROM ks.events WHERE pk = 1 AND ck > 1").unwrap();
        assert_eq!(rows, vec![vec![WireValue::Text("b".to_string())]]);
        assert_eq!(select(&mut session, "SELECT * FROM ks.events").unwrap().len(), 3);
    }

    #[test]
    fn test_filtering_needs_the_clause() {
        let cluster = cluster();
        let mut session = cluster.connect(&ConnectionConfig::default()).unwrap();
        let err = select(&mut session, "SELECT pk FROM ks.events WHERE body = 'c'").unwrap_err();
        assert_eq!(err, WireError::Execution(ALLOW_FILTERING_MESSAGE.to_string()));
        let rows = select(&mut session, "SELECT pk FROM ks.events WHERE body = 'c' ALLOW FILTERING").unwrap();
        assert_eq!(rows, vec![vec![WireValue::Int(2)]]);
    }

    #[test]
    fn test_server_filtering_rule() {
        let cluster = cluster();
        let mut session = cluster.connect(&ConnectionConfig::default()).unwrap();
        for cql in [
            "SELECT body FROM ks.events WHERE ck = 1",
            "SELECT body FROM ks.events WHERE pk > 1",
            "SELECT body FROM ks.events WHERE pk = 1 AND ck != 2",
        ] {
            assert_eq!(
                select(&mut session, cql),
                Err(WireError::Execution(ALLOW_FILTERING_MESSAGE.to_string())),
                "{cql}"
            );
        }
        let rows = select(&mut session, "SELECT body FROM ks.events WHERE pk IN (1, 2) AND ck = 1").unwrap();
        assert_eq!(rows.len(), 2);
        let rows = select(&mut session, "SELECT body FROM ks.events WHERE pk = 1 AND ck >= 1 AND ck < 2").unwrap();
        assert_eq!(rows, vec![vec![WireValue::Text("a".to_string())]]);
    }

    #[test]
    fn test_unknown_names() {
        let cluster = cluster();
        let mut session = cluster.connect(&ConnectionConfig::default()).unwrap();
        assert_eq!(
            session.prepare("DELETE FROM ks.nope WHERE pk = ?").unwrap_err(),
            WireError::Prepare("unconfigured table nope".to_string())
        );
        assert_eq!(
            session.prepare("UPDATE ks.events SET nope = ? WHERE pk = ? AND ck = ?").unwrap_err(),
            WireError::Prepare("Undefined column name nope".to_string())
        );
    }

    #[test]
    fn test_prepared_writes() {
        let cluster = cluster();
        let mut session = cluster.connect(&ConnectionConfig::default()).unwrap();
        let update = session.prepare("UPDATE ks.events SET body = ? WHERE pk = ? AND ck = ?").unwrap();
        assert_eq!(update.bind_marker_count(), 3);
        let mut stmt = update.bind();
        stmt.set(0, WireValue::Text("z".to_string())).unwrap();
        stmt.set(1, WireValue::Int(2)).unwrap();
        stmt.set(2, WireValue::Int(1)).unwrap();
        session.execute_bound(&update, &stmt, Consistency::Quorum).unwrap();

        let delete = session.prepare("DELETE FROM ks.events WHERE pk = ? AND ck = ?").unwrap();
        let mut stmt = delete.bind();
        stmt.set(0, WireValue::Int(1)).unwrap();
        stmt.set(1, WireValue::Int(1)).unwrap();
        session.execute_bound(&delete, &stmt, Consistency::Quorum).unwrap();

        let rows = cluster.rows("ks", "events").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![Value::Integer(2), Value::Integer(1), Value::from("z")]);
    }

    #[test]
    fn test_system_schema_columns() {
        let cluster = cluster();
        let mut session = cluster.connect(&ConnectionConfig::default()).unwrap();
        let rows = select(
            &mut session,
            "SELECT column_name, kind, position, type FROM system_schema.columns WHERE keyspace_name = 'ks'",
        )
        .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            vec![
                WireValue::Text("pk".to_string()),
                WireValue::Text("partition_key".to_string()),
                WireValue::Int(0),
                WireValue::Text("int".to_string()),
            ]
        );
    }

    #[test]
    fn test_session_accounting() {
        let cluster = cluster();
        let mut session = cluster.connect(&ConnectionConfig::default()).unwrap();
        assert_eq!(cluster.open_sessions(), 1);
        session.close();
        session.close();
        assert_eq!(cluster.open_sessions(), 0);
        assert!(session.execute("SELECT * FROM ks.events", Consistency::One).is_err());

        cluster.refuse_connections("Connection refused");
        assert_eq!(
            cluster.connect(&ConnectionConfig::default()).unwrap_err(),
            WireError::Connection("Connection refused".to_string())
        );
    }
}

use super::evaluate::{EvalError, Evaluator};
use crate::codec;
use crate::codec::WireValue;
use crate::connection::{CancelFlag, ConnectionProvider, RowCursor, Session};
use crate::core::{CodecError, ExecutorError, RelationDescriptor, Value};
use crate::options::ConnectionConfig;
use crate::planner::QueryPlan;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Unopened,
    Connected,
    /// Statement not yet submitted (first fetch or after a rescan)
    Executing,
    Streaming,
    Exhausted,
    Closed,
}

type CursorOf<P> = <<P as ConnectionProvider>::Session as Session>::Cursor;

/// Streams the rows of one planned scan.
///
/// Owns its session exclusively. The statement is submitted on the first
/// `next`, so a scan that is opened and closed without fetching never sends
/// anything.
pub struct ScanExecutor<P: ConnectionProvider> {
    provider: P,
    config: ConnectionConfig,
    relation: Arc<RelationDescriptor>,
    plan: Arc<QueryPlan>,
    state: ScanState,
    session: Option<P::Session>,
    cursor: Option<CursorOf<P>>,
    cancel: CancelFlag,
    local_filter: bool,
    rows_returned: u64,
}

impl<P: ConnectionProvider> ScanExecutor<P> {
    pub fn new(provider: P, config: ConnectionConfig, relation: Arc<RelationDescriptor>, plan: Arc<QueryPlan>) -> Self {
        Self {
            provider,
            config,
            relation,
            plan,
            state: ScanState::Unopened,
            session: None,
            cursor: None,
            cancel: CancelFlag::new(),
            local_filter: true,
            rows_returned: 0,
        }
    }

    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Whether `next` applies the plan's local predicates itself.
    #[must_use]
    pub fn with_local_filter(mut self, enabled: bool) -> Self {
        self.local_filter = enabled;
        self
    }

    #[must_use]
    pub const fn state(&self) -> ScanState {
        self.state
    }

    #[must_use]
    pub const fn rows_returned(&self) -> u64 {
        self.rows_returned
    }

    pub fn open(&mut self) -> Result<(), ExecutorError> {
        if self.state != ScanState::Unopened {
            return Err(ExecutorError::InvalidState("scan is already open"));
        }
        match self.provider.connect(&self.config) {
            Ok(session) => {
                tracing::debug!(table = %self.relation.table, "scan connected");
                self.session = Some(session);
                self.state = ScanState::Connected;
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "scan connect failed");
                self.state = ScanState::Closed;
                Err(e.into())
            }
        }
    }

    /// Next row, full relation width; `None` at end of data.
    pub fn next(&mut self) -> Result<Option<Vec<Value>>, ExecutorError> {
        match self.state {
            ScanState::Unopened => return Err(ExecutorError::InvalidState("scan is not open")),
            ScanState::Closed => return Err(ExecutorError::InvalidState("scan is closed")),
            ScanState::Exhausted => return Ok(None),
            _ => {}
        }

        loop {
            if self.cancel.is_cancelled() {
                self.close();
                return Err(ExecutorError::Cancelled);
            }
            if self.cursor.is_none() {
                self.submit()?;
            }
            let Some(cursor) = self.cursor.as_mut() else {
                return Err(ExecutorError::InvalidState("no result cursor"));
            };
            let Some(wire) = cursor.next_row()? else {
                tracing::debug!(rows = self.rows_returned, "scan exhausted");
                self.state = ScanState::Exhausted;
                return Ok(None);
            };

            let row = self.decode_row(&wire)?;
            if self.passes(&row)? {
                self.rows_returned += 1;
                return Ok(Some(row));
            }
        }
    }

    fn submit(&mut self) -> Result<(), ExecutorError> {
        let session = self
            .session
            .as_mut()
            .ok_or(ExecutorError::InvalidState("scan has no session"))?;
        self.state = ScanState::Executing;
        tracing::debug!(cql = %self.plan.cql, consistency = %self.config.consistency, "executing scan");
        let cursor = session.execute(&self.plan.cql, self.config.consistency)?;
        self.cursor = Some(cursor);
        self.state = ScanState::Streaming;
        Ok(())
    }

    fn decode_row(&self, wire: &[WireValue]) -> Result<Vec<Value>, ExecutorError> {
        if wire.len() != self.plan.retrieved.len() {
            return Err(CodecError::Malformed(format!(
                "expected {} columns, remote sent {}",
                self.plan.retrieved.len(),
                wire.len()
            ))
            .into());
        }
        let mut row = vec![Value::Null; self.relation.columns.len()];
        for (value, &attr) in wire.iter().zip(&self.plan.retrieved) {
            let column = self
                .relation
                .columns
                .get(attr)
                .ok_or_else(|| CodecError::Malformed(format!("no column at attribute {attr}")))?;
            row[attr] = codec::decode(value, column.data_type)?;
        }
        Ok(row)
    }

    fn passes(&self, row: &[Value]) -> Result<bool, ExecutorError> {
        if !self.local_filter || self.plan.local.is_empty() {
            return Ok(true);
        }
        match Evaluator::new(&self.relation, row).matches_all(&self.plan.local) {
            Ok(passes) => Ok(passes),
            // Left for the host to re-check
            Err(EvalError::Unsupported(expr)) => {
                tracing::trace!(%expr, "local filter deferred to host");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(error = %e, table = %self.relation.table, "local filter failed");
                Err(ExecutorError::LocalFilter(e.to_string()))
            }
        }
    }

    /// Restart from the first row on the same session and statement.
    pub fn rescan(&mut self) -> Result<(), ExecutorError> {
        match self.state {
            ScanState::Connected | ScanState::Executing => Ok(()),
            ScanState::Streaming | ScanState::Exhausted => {
                tracing::debug!(table = %self.relation.table, "rescan");
                self.cursor = None;
                self.rows_returned = 0;
                self.state = ScanState::Executing;
                Ok(())
            }
            ScanState::Unopened => Err(ExecutorError::InvalidState("scan is not open")),
            ScanState::Closed => Err(ExecutorError::InvalidState("scan is closed")),
        }
    }

    /// Release the cursor, then the session. Safe to call more than once.
    pub fn close(&mut self) {
        if self.state == ScanState::Closed {
            return;
        }
        self.cursor = None;
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        tracing::debug!(table = %self.relation.table, rows = self.rows_returned, "scan closed");
        self.state = ScanState::Closed;
    }
}

impl<P: ConnectionProvider> Drop for ScanExecutor<P> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MemoryCluster;
    use crate::core::{Column, DataType};
    use crate::parser::parse_restriction;
    use crate::planner::Planner;

    fn relation() -> RelationDescriptor {
        RelationDescriptor::new(
            "ks",
            "tbl",
            vec![
                Column::new("pk", DataType::Integer),
                Column::new("ck", DataType::Integer),
                Column::new("name", DataType::Text),
            ],
        )
        .with_partition_key(&["pk"])
        .with_clustering_key(&["ck"])
    }

    fn setup(restriction: &str) -> (MemoryCluster, ScanExecutor<MemoryCluster>) {
        let rel = relation();
        let cluster = MemoryCluster::new();
        cluster.create_table(rel.clone());
        for (pk, ck, name) in [(5, 1, "ann"), (5, 20, "bob"), (6, 30, "cat")] {
            cluster
                .insert_row("ks", "tbl", vec![Value::Integer(pk), Value::Integer(ck), Value::from(name)])
                .unwrap();
        }
        let expr = parse_restriction(restriction).unwrap();
        let plan = Planner::new(&rel).plan_scan(&[2], Some(&expr)).unwrap();
        let scan = ScanExecutor::new(cluster.clone(), ConnectionConfig::default(), Arc::new(rel), Arc::new(plan));
        (cluster, scan)
    }

    #[test]
    fn test_states() {
        let (cluster, mut scan) = setup("pk = 5 AND ck > 10");
        assert_eq!(scan.state(), ScanState::Unopened);
        assert!(scan.next().is_err());
        scan.open().unwrap();
        assert_eq!(scan.state(), ScanState::Connected);
        assert!(cluster.statements().is_empty());

        let row = scan.next().unwrap().unwrap();
        assert_eq!(scan.state(), ScanState::Streaming);
        assert_eq!(row, vec![Value::Null, Value::Null, Value::from("bob")]);
        assert_eq!(scan.next().unwrap(), None);
        assert_eq!(scan.state(), ScanState::Exhausted);
        assert_eq!(scan.next().unwrap(), None);
    }

    #[test]
    fn test_local_filter_skips_rows() {
        let (_, mut scan) = setup("pk = 5 AND name LIKE 'a%'");
        scan.open().unwrap();
        let row = scan.next().unwrap().unwrap();
        assert_eq!(row[2], Value::from("ann"));
        assert_eq!(scan.next().unwrap(), None);
    }

    #[test]
    fn test_local_filter_can_be_disabled() {
        let (_, scan) = setup("pk = 5 AND name LIKE 'a%'");
        let mut scan = scan.with_local_filter(false);
        scan.open().unwrap();
        assert!(scan.next().unwrap().is_some());
        assert!(scan.next().unwrap().is_some());
        assert_eq!(scan.next().unwrap(), None);
    }

    #[test]
    fn test_close_releases_session() {
        let (cluster, mut scan) = setup("pk = 5");
        scan.open().unwrap();
        assert_eq!(cluster.open_sessions(), 1);
        scan.close();
        scan.close();
        assert_eq!(cluster.open_sessions(), 0);
        assert_eq!(scan.state(), ScanState::Closed);
        assert!(scan.next().is_err());
    }

    #[test]
    fn test_local_filter_error_is_surfaced() {
        let rel = relation();
        let cluster = MemoryCluster::new();
        cluster.create_table(rel.clone());
        cluster
            .insert_row("ks", "tbl", vec![Value::Integer(5), Value::Integer(1), Value::from("ann")])
            .unwrap();
        let mut plan = Planner::new(&rel).plan_scan(&[2], None).unwrap();
        plan.local.push(parse_restriction("ghost = 1").unwrap());

        let mut scan = ScanExecutor::new(cluster, ConnectionConfig::default(), Arc::new(rel), Arc::new(plan));
        scan.open().unwrap();
        assert_eq!(
            scan.next(),
            Err(ExecutorError::LocalFilter("Column 'ghost' not found".to_string()))
        );
    }

    #[test]
    fn test_drop_closes() {
        let (cluster, mut scan) = setup("pk = 5");
        scan.open().unwrap();
        drop(scan);
        assert_eq!(cluster.open_sessions(), 0);
    }
}

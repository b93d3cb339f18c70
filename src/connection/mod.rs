//! Session collaborators consumed by the executors.
//!
//! The bridge never talks to a socket itself. A `ConnectionProvider` opens
//! a `Session`; executors own that session exclusively for their lifetime
//! and release it on close. Anything that can move CQL text and
//! `WireValue`s (a native-protocol driver, a proxy, `MemoryCluster`) can sit
//! behind these traits.

pub mod memory;

pub use memory::MemoryCluster;

use crate::codec::WireValue;
use crate::core::WireError;
use crate::options::{ConnectionConfig, Consistency};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Forward-only result cursor
pub trait RowCursor {
    /// Next row in SELECT-list order, `None` once exhausted
    fn next_row(&mut self) -> Result<Option<Vec<WireValue>>, WireError>;
}

pub trait PreparedStatement {
    /// Number of `?` markers the remote found in the statement
    fn bind_marker_count(&self) -> usize;

    /// A fresh statement with every marker unset
    fn bind(&self) -> BoundStatement {
        BoundStatement::new(self.bind_marker_count())
    }
}

pub trait Session {
    type Cursor: RowCursor;
    type Prepared: PreparedStatement;

    fn execute(&mut self, cql: &str, consistency: Consistency) -> Result<Self::Cursor, WireError>;
    fn prepare(&mut self, cql: &str) -> Result<Self::Prepared, WireError>;
    fn execute_bound(
        &mut self,
        prepared: &Self::Prepared,
        statement: &BoundStatement,
        consistency: Consistency,
    ) -> Result<(), WireError>;
    fn close(&mut self);
}

pub trait ConnectionProvider {
    type Session: Session;

    fn connect(&self, config: &ConnectionConfig) -> Result<Self::Session, WireError>;
}

/// Per-row values for one execution of a prepared statement
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    values: Vec<Option<WireValue>>,
}

impl BoundStatement {
    #[must_use]
    pub fn new(markers: usize) -> Self {
        Self {
            values: vec![None; markers],
        }
    }

    pub fn set(&mut self, index: usize, value: WireValue) -> Result<(), WireError> {
        let markers = self.values.len();
        let slot = self.values.get_mut(index).ok_or_else(|| {
            WireError::Execution(format!("bind index {index} out of range for {markers} markers"))
        })?;
        *slot = Some(value);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bound values in marker order; errors if any marker was left unset.
    pub fn values(&self) -> Result<Vec<&WireValue>, WireError> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| v.as_ref().ok_or_else(|| WireError::Execution(format!("bind marker {i} is unset"))))
            .collect()
    }
}

/// Cancellation request shared between the host and an executor
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_statement_requires_every_marker() {
        let mut stmt = BoundStatement::new(2);
        stmt.set(0, WireValue::Int(7)).unwrap();
        assert!(stmt.values().is_err());
        stmt.set(1, WireValue::Null).unwrap();
        assert_eq!(stmt.values().unwrap(), vec![&WireValue::Int(7), &WireValue::Null]);
        assert!(stmt.set(2, WireValue::Int(1)).is_err());
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let host = flag.clone();
        assert!(!flag.is_cancelled());
        host.cancel();
        assert!(flag.is_cancelled());
    }
}

use crate::codec;
use crate::connection::{CancelFlag, ConnectionProvider, PreparedStatement, Session};
use crate::core::{ExecutorError, Value};
use crate::options::ConnectionConfig;
use crate::planner::{ModifyPlan, OpKind, ParamSlot, SlotSource};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyState {
    Unopened,
    Prepared,
    Ready,
    Closed,
}

/// Row images handed over for one affected row. Each image is a full-width
/// row indexed by attribute number.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModifyRow<'a> {
    pub new_values: Option<&'a [Value]>,
    /// Old image carrying the primary key; UPDATE falls back to
    /// `new_values` when absent.
    pub key_values: Option<&'a [Value]>,
}

impl<'a> ModifyRow<'a> {
    #[must_use]
    pub const fn insert(new_values: &'a [Value]) -> Self {
        Self {
            new_values: Some(new_values),
            key_values: None,
        }
    }

    #[must_use]
    pub const fn update(new_values: &'a [Value], key_values: &'a [Value]) -> Self {
        Self {
            new_values: Some(new_values),
            key_values: Some(key_values),
        }
    }

    #[must_use]
    pub const fn delete(key_values: &'a [Value]) -> Self {
        Self {
            new_values: None,
            key_values: Some(key_values),
        }
    }

    fn image(&self, source: SlotSource) -> Result<&'a [Value], ExecutorError> {
        match source {
            SlotSource::NewValue => self.new_values.ok_or(ExecutorError::MissingRowImage("new values")),
            SlotSource::KeyValue => self
                .key_values
                .or(self.new_values)
                .ok_or(ExecutorError::MissingRowImage("key values")),
        }
    }
}

type PreparedOf<P> = <<P as ConnectionProvider>::Session as Session>::Prepared;

/// Executes one planned INSERT, UPDATE or DELETE per affected row.
///
/// Each row is a separate synchronous round trip; a failure on one row
/// leaves earlier rows applied.
pub struct ModifyExecutor<P: ConnectionProvider> {
    provider: P,
    config: ConnectionConfig,
    plan: Arc<ModifyPlan>,
    state: ModifyState,
    session: Option<P::Session>,
    prepared: Option<PreparedOf<P>>,
    slots: Vec<ParamSlot>,
    cancel: CancelFlag,
    rows_affected: u64,
}

impl<P: ConnectionProvider> ModifyExecutor<P> {
    pub fn new(provider: P, config: ConnectionConfig, plan: Arc<ModifyPlan>) -> Self {
        Self {
            provider,
            config,
            plan,
            state: ModifyState::Unopened,
            session: None,
            prepared: None,
            slots: Vec::new(),
            cancel: CancelFlag::new(),
            rows_affected: 0,
        }
    }

    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub const fn state(&self) -> ModifyState {
        self.state
    }

    #[must_use]
    pub fn kind(&self) -> OpKind {
        self.plan.kind
    }

    #[must_use]
    pub const fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Connect, prepare the statement and fix the bind order.
    pub fn open(&mut self) -> Result<(), ExecutorError> {
        if self.state != ModifyState::Unopened {
            return Err(ExecutorError::InvalidState("modify is already open"));
        }
        let mut session = match self.provider.connect(&self.config) {
            Ok(session) => session,
            Err(e) => {
                self.state = ModifyState::Closed;
                return Err(e.into());
            }
        };

        tracing::debug!(kind = %self.plan.kind, cql = %self.plan.cql, "preparing");
        let prepared = match session.prepare(&self.plan.cql) {
            Ok(prepared) => prepared,
            Err(e) => {
                session.close();
                self.state = ModifyState::Closed;
                return Err(e.into());
            }
        };
        if prepared.bind_marker_count() != self.plan.slots.len() {
            session.close();
            self.state = ModifyState::Closed;
            return Err(ExecutorError::InvalidState("prepared statement markers do not match bind slots"));
        }
        self.session = Some(session);
        self.prepared = Some(prepared);
        self.state = ModifyState::Prepared;

        self.slots.clone_from(&self.plan.slots);
        self.state = ModifyState::Ready;
        Ok(())
    }

    /// Bind and execute the statement for one row.
    pub fn execute(&mut self, row: &ModifyRow<'_>) -> Result<(), ExecutorError> {
        match self.state {
            ModifyState::Ready => {}
            ModifyState::Closed => return Err(ExecutorError::InvalidState("modify is closed")),
            _ => return Err(ExecutorError::InvalidState("modify is not open")),
        }
        if self.cancel.is_cancelled() {
            self.close();
            return Err(ExecutorError::Cancelled);
        }
        let (Some(session), Some(prepared)) = (self.session.as_mut(), self.prepared.as_ref()) else {
            return Err(ExecutorError::InvalidState("modify has no prepared statement"));
        };

        let mut statement = prepared.bind();
        for (index, slot) in self.slots.iter().enumerate() {
            let image = row.image(slot.source)?;
            let value = image
                .get(slot.attr)
                .ok_or(ExecutorError::MissingRowImage("row image narrower than the relation"))?;
            statement.set(index, codec::encode(value, slot.data_type)?)?;
        }
        session.execute_bound(prepared, &statement, self.config.consistency)?;
        self.rows_affected += 1;
        tracing::trace!(kind = %self.plan.kind, rows = self.rows_affected, "row executed");
        Ok(())
    }

    /// Release the prepared handle, then the session. Safe to call more than once.
    pub fn close(&mut self) {
        if self.state == ModifyState::Closed {
            return;
        }
        self.prepared = None;
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        tracing::debug!(kind = %self.plan.kind, rows = self.rows_affected, "modify closed");
        self.state = ModifyState::Closed;
    }
}

impl<P: ConnectionProvider> Drop for ModifyExecutor<P> {
    fn drop(&mut self) {
        self.close();
    }
}

//! The action log engine: the only writer of log entries and item status.
//!
//! Registering an action runs in one unit of work:
//!
//! 1. Insert the log row (provisional until commit).
//! 2. For each referenced item, if the action has a transition rule, issue a
//!    conditional status update guarded by the rule's required statuses.
//! 3. If any guarded update matched no row, roll everything back and report
//!    a [`Conflict`], naming each item's status as read after the rollback.
//! 4. Otherwise read the entry back with its labels and commit.
//!
//! A committed entry that names an item under a transition-driving action
//! always has a matching status change on that item.

use std::fmt;

use jiff::Timestamp;
use tracing::{debug, error, info, warn};

use crate::model::{
    ActionRequest, ItemRef, ItemStatus, LogDetail, NewLogEntry, RawActionRequest, ValidationError,
};
use crate::storage::{Store, StorageError, UnitOfWork};
use crate::transition::{Transition, transition};

/// What the diagnostic read found for an item whose update did not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observed {
    pub item: ItemRef,

    /// `None` when the item does not exist.
    pub status: Option<ItemStatus>,
}

/// The requested transition was not allowed for at least one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Every item whose guarded update matched no row.
    pub failed: Vec<ItemRef>,

    /// What the post-rollback read found. Items whose read failed are absent.
    pub observed: Vec<Observed>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("action not performed: item status does not permit this action")?;
        for item in &self.failed {
            match self.observed.iter().find(|o| o.item == *item) {
                Some(Observed { status: Some(status), .. }) => {
                    write!(f, "; {item} is currently \"{status}\"")?;
                }
                Some(Observed { status: None, .. }) => write!(f, "; {item} not found")?,
                None => write!(f, "; {item} (status unknown)")?,
            }
        }
        Ok(())
    }
}

/// Why an action was not registered. Nothing is committed in any case.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{0}")]
    Conflict(Conflict),

    /// The store rejected a reference (unknown operator, action, or status).
    #[error("data error: {0}")]
    Constraint(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ActionError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Constraint(detail) => Self::Constraint(detail),
            other => Self::Storage(other),
        }
    }
}

/// Registers actions against a [`Store`].
#[derive(Debug, Clone)]
pub struct Engine<S> {
    store: S,
}

impl<S: Store> Engine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validates a raw request, then registers it.
    pub fn register_raw(&self, raw: RawActionRequest) -> Result<LogDetail, ActionError> {
        let request = ActionRequest::try_from(raw)?;
        self.register(&request)
    }

    /// Registers a validated action, returning the committed entry.
    pub fn register(&self, request: &ActionRequest) -> Result<LogDetail, ActionError> {
        let result = self.try_register(request);
        if let Err(ActionError::Storage(e)) = &result {
            error!(error = %e, operator = request.operator_id, action = request.action.id(), "action registration failed");
        }
        result
    }

    fn try_register(&self, request: &ActionRequest) -> Result<LogDetail, ActionError> {
        let mut session = self.store.begin()?;
        let log_id = session.insert_log(&NewLogEntry::from_request(request, Timestamp::now()))?;

        let mut failed = Vec::new();
        let rule = transition(request.action);
        if let Some(rule) = rule {
            for &item in request.items() {
                if !session.conditional_update(item, rule.required, rule.result)? {
                    failed.push(item);
                }
            }
        }

        if let Some(rule) = rule.filter(|_| !failed.is_empty()) {
            session.rollback()?;
            let conflict = self.diagnose(failed, rule);
            warn!(action = request.action.id(), %conflict, "action rolled back");
            return Err(ActionError::Conflict(conflict));
        }

        let log = session
            .load_log(log_id)?
            .ok_or_else(|| StorageError::Corrupt(format!("log {log_id} not readable after insert")))?;
        session.commit()?;

        info!(
            log_id,
            action = request.action.id(),
            items = ?request.items(),
            "action registered"
        );
        Ok(log)
    }

    /// Best-effort read of each failed item's current status.
    fn diagnose(&self, failed: Vec<ItemRef>, rule: Transition) -> Conflict {
        let observed = failed
            .iter()
            .filter_map(|&item| match self.store.current_status(item) {
                Ok(status) => {
                    if let Some(now) = status
                        && rule.allows(now)
                    {
                        debug!(%item, status = %now, "status changed after the failed update");
                    }
                    Some(Observed { item, status })
                }
                Err(e) => {
                    warn!(%item, error = %e, "could not read status for conflict report");
                    None
                }
            })
            .collect();
        Conflict { failed, observed }
    }
}

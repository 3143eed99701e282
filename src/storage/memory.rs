//! In-memory [`Store`] for exercising the engine without a database file.
//!
//! A session holds the store's mutex for its whole lifetime and stages
//! writes on a copy of the state, published only on commit. Storage
//! failures can be injected per operation with [`MemoryStore::fail_at`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use jiff::Timestamp;

use crate::model::{ItemRef, ItemStatus, LogDetail, NewLogEntry};

use super::{Result, Store, StorageError, UnitOfWork};

#[derive(Debug, Clone)]
struct StoredItem {
    name: String,
    status: ItemStatus,
}

#[derive(Debug, Clone)]
struct StoredLog {
    time: Timestamp,
    operator_id: i64,
    action_id: i64,
    weapon_id: Option<i64>,
    special_device_id: Option<i64>,
    comment: Option<String>,
    status_id: i64,
}

/// An operation that can be made to fail with [`StorageError::Corrupt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailPoint {
    InsertLog,
    ConditionalUpdate,
    StatusRead,
}

#[derive(Debug, Clone, Default)]
struct State {
    operators: BTreeMap<i64, String>,
    actions: BTreeMap<i64, String>,
    log_statuses: BTreeMap<i64, String>,
    items: BTreeMap<ItemRef, StoredItem>,
    logs: BTreeMap<i64, StoredLog>,
    next_log_id: i64,
    fail_at: BTreeSet<FailPoint>,
}

impl State {
    fn check(&self, point: FailPoint) -> Result<()> {
        if self.fail_at.contains(&point) {
            return Err(StorageError::Corrupt(format!("injected failure at {point:?}")));
        }
        Ok(())
    }

    fn item_name(&self, item: Option<ItemRef>) -> Option<String> {
        item.and_then(|r| self.items.get(&r)).map(|i| i.name.clone())
    }
}

/// Mutex-guarded store with the same seeded catalogues as `init`.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut state = State {
            next_log_id: 1,
            ..State::default()
        };
        for status in ItemStatus::ALL {
            state.log_statuses.insert(status.id(), status.label().to_string());
        }
        for (id, name) in [(1, "Taken"), (2, "Returned"), (3, "Maintenance")] {
            state.actions.insert(id, name.to_string());
        }
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_operator(&self, id: i64, name: &str) {
        self.lock().operators.insert(id, name.to_string());
    }

    pub fn add_action(&self, id: i64, name: &str) {
        self.lock().actions.insert(id, name.to_string());
    }

    pub fn add_item(&self, item: ItemRef, name: &str, status: ItemStatus) {
        self.lock().items.insert(
            item,
            StoredItem {
                name: name.to_string(),
                status,
            },
        );
    }

    pub fn fail_at(&self, point: FailPoint) {
        self.lock().fail_at.insert(point);
    }

    pub fn status(&self, item: ItemRef) -> Option<ItemStatus> {
        self.lock().items.get(&item).map(|i| i.status)
    }

    pub fn log_count(&self) -> usize {
        self.lock().logs.len()
    }
}

impl Store for MemoryStore {
    type Session<'a> = MemorySession<'a>;

    fn begin(&self) -> Result<MemorySession<'_>> {
        let guard = self.lock();
        let staged = guard.clone();
        Ok(MemorySession { guard, staged })
    }

    fn current_status(&self, item: ItemRef) -> Result<Option<ItemStatus>> {
        let state = self.lock();
        state.check(FailPoint::StatusRead)?;
        Ok(state.items.get(&item).map(|i| i.status))
    }
}

pub struct MemorySession<'a> {
    guard: MutexGuard<'a, State>,
    staged: State,
}

impl UnitOfWork for MemorySession<'_> {
    fn insert_log(&mut self, entry: &NewLogEntry) -> Result<i64> {
        let s = &mut self.staged;
        s.check(FailPoint::InsertLog)?;
        if !s.operators.contains_key(&entry.operator_id) {
            return Err(StorageError::Constraint(format!(
                "unknown operator {}",
                entry.operator_id
            )));
        }
        if !s.actions.contains_key(&entry.action.id()) {
            return Err(StorageError::Constraint(format!(
                "unknown action {}",
                entry.action.id()
            )));
        }
        if !s.log_statuses.contains_key(&entry.status_id) {
            return Err(StorageError::Constraint(format!(
                "unknown log status {}",
                entry.status_id
            )));
        }
        let id = s.next_log_id;
        s.next_log_id += 1;
        s.logs.insert(
            id,
            StoredLog {
                time: entry.action_time,
                operator_id: entry.operator_id,
                action_id: entry.action.id(),
                weapon_id: entry.weapon_id,
                special_device_id: entry.special_device_id,
                comment: entry.comment.clone(),
                status_id: entry.status_id,
            },
        );
        Ok(id)
    }

    fn conditional_update(
        &mut self,
        item: ItemRef,
        allowed: &[ItemStatus],
        next: ItemStatus,
    ) -> Result<bool> {
        self.staged.check(FailPoint::ConditionalUpdate)?;
        match self.staged.items.get_mut(&item) {
            Some(stored) if allowed.contains(&stored.status) => {
                stored.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn load_log(&mut self, id: i64) -> Result<Option<LogDetail>> {
        let s = &self.staged;
        let Some(log) = s.logs.get(&id) else {
            return Ok(None);
        };
        let weapon = s.item_name(log.weapon_id.map(ItemRef::weapon));
        let special_device = s.item_name(log.special_device_id.map(ItemRef::special_device));
        Ok(Some(LogDetail {
            id,
            time: log.time,
            operator: s.operators[&log.operator_id].clone(),
            action: s.actions[&log.action_id].clone(),
            item: weapon.clone().or_else(|| special_device.clone()),
            weapon,
            special_device,
            comment: log.comment.clone(),
            status: s.log_statuses[&log.status_id].clone(),
        }))
    }

    fn commit(mut self) -> Result<()> {
        // Deferred item references are checked here, as in SQLite.
        let dangling = self.staged.logs.values().find_map(|log| {
            [
                log.weapon_id.map(ItemRef::weapon),
                log.special_device_id.map(ItemRef::special_device),
            ]
            .into_iter()
            .flatten()
            .find(|r| !self.staged.items.contains_key(r))
        });
        if let Some(item) = dangling {
            return Err(StorageError::Constraint(format!("log refers to missing {item}")));
        }
        *self.guard = std::mem::take(&mut self.staged);
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        Ok(())
    }
}

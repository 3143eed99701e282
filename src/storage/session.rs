//! `SQLite` unit of work.

use rusqlite::{Connection, params, params_from_iter};
use tracing::debug;

use crate::model::{ItemRef, ItemStatus, LogDetail, NewLogEntry};

use super::{Result, UnitOfWork, inventory, logbook};

/// An open `BEGIN IMMEDIATE` transaction on a connection it owns.
///
/// The write lock is taken up front, so two sessions racing on the same item
/// serialize at `begin` and the loser sees the winner's committed status.
pub struct SqliteSession {
    conn: Connection,
    open: bool,
}

impl SqliteSession {
    pub(super) fn begin(conn: Connection) -> Result<Self> {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self { conn, open: true })
    }
}

impl UnitOfWork for SqliteSession {
    fn insert_log(&mut self, entry: &NewLogEntry) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO logs
                (action_time, operator_id, action_id, weapon_id, special_device_id, comment, status_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.action_time.as_millisecond(),
                entry.operator_id,
                entry.action.id(),
                entry.weapon_id,
                entry.special_device_id,
                entry.comment,
                entry.status_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn conditional_update(
        &mut self,
        item: ItemRef,
        allowed: &[ItemStatus],
        next: ItemStatus,
    ) -> Result<bool> {
        if allowed.is_empty() {
            return Ok(false);
        }
        let placeholders = (0..allowed.len())
            .map(|i| format!("?{}", i + 3))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET status_id = ?1 WHERE id = ?2 AND status_id IN ({placeholders})",
            inventory::table(item.kind)
        );
        let values = [next.id(), item.id]
            .into_iter()
            .chain(allowed.iter().map(|s| s.id()));
        let rows = self.conn.execute(&sql, params_from_iter(values))?;
        debug!(%item, next = %next, matched = rows > 0, "conditional status update");
        Ok(rows > 0)
    }

    fn load_log(&mut self, id: i64) -> Result<Option<LogDetail>> {
        logbook::load_log(&self.conn, id)
    }

    fn commit(mut self) -> Result<()> {
        // On failure the transaction is still open; drop rolls it back.
        self.conn.execute_batch("COMMIT")?;
        self.open = false;
        Ok(())
    }

    fn rollback(mut self) -> Result<()> {
        self.open = false;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if self.open
            && let Err(e) = self.conn.execute_batch("ROLLBACK")
        {
            debug!(error = %e, "rollback on drop failed; closing the connection discards the transaction");
        }
    }
}

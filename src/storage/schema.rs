//! Schema creation and catalogue seeding.

use rusqlite::{Connection, params};

use crate::model::ItemStatus;

use super::Result;

/// Item references on `logs` are deferred so a transition against a missing
/// item fails at the conditional update, not at the insert.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS item_statuses (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS weapon_types (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS special_types (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS weapons (
    id               INTEGER PRIMARY KEY,
    name             TEXT NOT NULL,
    type_id          INTEGER NOT NULL REFERENCES weapon_types (id),
    status_id        INTEGER NOT NULL REFERENCES item_statuses (id),
    description      TEXT,
    last_maintenance TEXT
);

CREATE TABLE IF NOT EXISTS special_devices (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    type_id     INTEGER NOT NULL REFERENCES special_types (id),
    status_id   INTEGER NOT NULL REFERENCES item_statuses (id),
    description TEXT
);

CREATE TABLE IF NOT EXISTS operators (
    id            INTEGER PRIMARY KEY,
    name          TEXT NOT NULL,
    surname       TEXT NOT NULL,
    lastname      TEXT,
    qualification TEXT
);

CREATE TABLE IF NOT EXISTS actions (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS log_statuses (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS logs (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    action_time       INTEGER NOT NULL,
    operator_id       INTEGER NOT NULL REFERENCES operators (id),
    action_id         INTEGER NOT NULL REFERENCES actions (id),
    weapon_id         INTEGER REFERENCES weapons (id) DEFERRABLE INITIALLY DEFERRED,
    special_device_id INTEGER REFERENCES special_devices (id) DEFERRABLE INITIALLY DEFERRED,
    comment           TEXT,
    status_id         INTEGER NOT NULL REFERENCES log_statuses (id)
);

CREATE INDEX IF NOT EXISTS logs_action_time ON logs (action_time);
";

const ACTIONS: [(i64, &str, &str); 3] = [
    (1, "Taken", "Item taken out of stock"),
    (2, "Returned", "Item returned to stock"),
    (3, "Maintenance", "Item sent for maintenance"),
];

const DEFAULT_TYPE: &str = "General";

/// Creates tables and seeds fixed catalogues. Safe to run repeatedly.
pub(super) fn init(conn: &Connection) -> Result<()> {
    // Readers keep going while a writer holds the lock.
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.execute_batch(SCHEMA)?;

    for status in ItemStatus::ALL {
        conn.execute(
            "INSERT OR IGNORE INTO item_statuses (id, name) VALUES (?1, ?2)",
            params![status.id(), status.label()],
        )?;
        // The log records the requested target status, so it shares labels.
        conn.execute(
            "INSERT OR IGNORE INTO log_statuses (id, name) VALUES (?1, ?2)",
            params![status.id(), status.label()],
        )?;
    }

    for (id, name, description) in ACTIONS {
        conn.execute(
            "INSERT OR IGNORE INTO actions (id, name, description) VALUES (?1, ?2, ?3)",
            params![id, name, description],
        )?;
    }

    for table in ["weapon_types", "special_types"] {
        conn.execute(
            &format!("INSERT OR IGNORE INTO {table} (id, name) VALUES (1, ?1)"),
            [DEFAULT_TYPE],
        )?;
    }

    Ok(())
}

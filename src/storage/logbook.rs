//! Log reads: single entries and filtered listings.

use jiff::Timestamp;
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter, types::Value};

use crate::model::{LogDetail, LogFilter};

use super::{Result, Storage, StorageError};

const SELECT_LOG: &str = "
SELECT l.id,
       l.action_time,
       o.name || ' ' || o.surname || COALESCE(' ' || NULLIF(o.lastname, ''), ''),
       a.name,
       w.name,
       s.name,
       l.comment,
       ls.name
FROM logs l
JOIN operators o ON l.operator_id = o.id
JOIN actions a ON l.action_id = a.id
LEFT JOIN weapons w ON l.weapon_id = w.id
LEFT JOIN special_devices s ON l.special_device_id = s.id
JOIN log_statuses ls ON l.status_id = ls.id";

/// A joined log row before its timestamp is decoded.
struct LogRow {
    id: i64,
    action_time: i64,
    operator: String,
    action: String,
    weapon: Option<String>,
    special_device: Option<String>,
    comment: Option<String>,
    status: String,
}

impl LogRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            action_time: row.get(1)?,
            operator: row.get(2)?,
            action: row.get(3)?,
            weapon: row.get(4)?,
            special_device: row.get(5)?,
            comment: row.get(6)?,
            status: row.get(7)?,
        })
    }

    fn decode(self) -> Result<LogDetail> {
        let time = Timestamp::from_millisecond(self.action_time)
            .map_err(|e| StorageError::Corrupt(format!("invalid action_time: {e}")))?;
        Ok(LogDetail {
            id: self.id,
            time,
            operator: self.operator,
            action: self.action,
            item: self.weapon.clone().or_else(|| self.special_device.clone()),
            weapon: self.weapon,
            special_device: self.special_device,
            comment: self.comment,
            status: self.status,
        })
    }
}

/// Loads one log entry with its labels on an existing connection.
pub(super) fn load_log(conn: &Connection, id: i64) -> Result<Option<LogDetail>> {
    let row = conn
        .query_row(&format!("{SELECT_LOG} WHERE l.id = ?1"), [id], LogRow::from_row)
        .optional()?;
    row.map(LogRow::decode).transpose()
}

/// Builds the WHERE clause for a filter, with positional parameters.
fn filter_clause(filter: &LogFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(start) = filter.start {
        values.push(Value::Integer(start.as_millisecond()));
        conditions.push(format!("l.action_time >= ?{}", values.len()));
    }
    if let Some(end) = filter.end {
        values.push(Value::Integer(end.as_millisecond()));
        conditions.push(format!("l.action_time <= ?{}", values.len()));
    }
    if let Some(action) = &filter.action {
        values.push(Value::Text(action.clone()));
        conditions.push(format!("a.name = ?{}", values.len()));
    }
    if let Some(item) = &filter.item {
        values.push(Value::Text(item.clone()));
        let n = values.len();
        conditions.push(format!("(w.name = ?{n} OR s.name = ?{n})"));
    }
    if let Some(status) = &filter.status {
        values.push(Value::Text(status.clone()));
        conditions.push(format!("ls.name = ?{}", values.len()));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

impl Storage {
    /// Loads one log entry with its labels.
    pub fn load_log(&self, id: i64) -> Result<Option<LogDetail>> {
        load_log(&self.connect()?, id)
    }

    /// Lists log entries matching `filter`, newest first.
    pub fn list_logs(&self, filter: &LogFilter) -> Result<Vec<LogDetail>> {
        let conn = self.connect()?;
        let (clause, values) = filter_clause(filter);
        let sql = format!("{SELECT_LOG}{clause} ORDER BY l.action_time DESC, l.id DESC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), LogRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(LogRow::decode).collect()
    }
}

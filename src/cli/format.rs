//! Output formatting for CLI display.

use jiff::{Timestamp, tz::TimeZone};

use crate::model::{Item, LogDetail, Operator};

/// Minute precision in UTC, e.g. `2025-03-01 14:05`.
fn format_time(ts: Timestamp) -> String {
    ts.to_zoned(TimeZone::UTC).strftime("%Y-%m-%d %H:%M").to_string()
}

/// One log entry per line: time, action, item, operator, status, comment.
pub(super) fn format_log(log: &LogDetail) -> String {
    let mut line = format!(
        "#{:<5} {}  {:<12} {:<20} {:<24} {}",
        log.id,
        format_time(log.time),
        log.action,
        log.item.as_deref().unwrap_or("-"),
        log.operator,
        log.status,
    );
    if let Some(comment) = log.comment.as_deref().filter(|c| !c.is_empty()) {
        line.push_str(&format!("  ({comment})"));
    }
    line
}

pub(super) fn format_item(item: &Item) -> String {
    let mut line = format!(
        "{:<6} {:<24} {:<12} {}",
        item.id, item.name, item.type_name, item.status
    );
    if let Some(at) = item.last_maintenance {
        line.push_str(&format!("  maintained {}", format_time(at)));
    }
    line
}

pub(super) fn format_operator(operator: &Operator) -> String {
    match operator.qualification.as_deref().filter(|q| !q.is_empty()) {
        Some(q) => format!("{:<6} {} [{q}]", operator.id, operator.full_name()),
        None => format!("{:<6} {}", operator.id, operator.full_name()),
    }
}

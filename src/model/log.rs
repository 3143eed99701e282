//! Log entries and the reference data they point at.

use jiff::{Timestamp, civil::Date, tz::TimeZone};
use serde::{Deserialize, Serialize};

use super::action::{ActionKind, ActionRequest, ValidationError};

/// A log row about to be inserted. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
    pub action_time: Timestamp,
    pub operator_id: i64,
    pub action: ActionKind,
    pub weapon_id: Option<i64>,
    pub special_device_id: Option<i64>,
    pub comment: Option<String>,
    pub status_id: i64,
}

impl NewLogEntry {
    /// Builds the row for a validated request, stamped with `at`.
    pub fn from_request(request: &ActionRequest, at: Timestamp) -> Self {
        Self {
            action_time: at,
            operator_id: request.operator_id,
            action: request.action,
            weapon_id: request.weapon_id(),
            special_device_id: request.special_device_id(),
            comment: request.comment.clone(),
            status_id: request.status_goal,
        }
    }
}

/// A log entry joined with human-readable labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogDetail {
    pub id: i64,
    pub time: Timestamp,

    /// Operator display name: name, surname, and lastname when present.
    pub operator: String,
    pub action: String,
    pub weapon: Option<String>,
    pub special_device: Option<String>,

    /// The weapon name, else the special device name.
    pub item: Option<String>,
    pub comment: Option<String>,
    pub status: String,
}

/// The short form shown in log listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSummary {
    pub id: i64,
    pub time: Timestamp,
    pub operator: String,
    pub action: String,
    pub item: Option<String>,
    pub status: String,
}

impl From<&LogDetail> for LogSummary {
    fn from(log: &LogDetail) -> Self {
        Self {
            id: log.id,
            time: log.time,
            operator: log.operator.clone(),
            action: log.action.clone(),
            item: log.item.clone(),
            status: log.status.clone(),
        }
    }
}

/// Narrows a log listing. Every bound is inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,

    /// Action name.
    pub action: Option<String>,

    /// Weapon or special device name.
    pub item: Option<String>,

    /// Log status name.
    pub status: Option<String>,
}

impl LogFilter {
    /// Builds a filter from loosely typed query values.
    ///
    /// Bounds accept an RFC 3339 timestamp or a bare `YYYY-MM-DD` date
    /// (UTC). A bare end date covers the whole day. Blank values are ignored.
    pub fn parse(
        start: Option<&str>,
        end: Option<&str>,
        action: Option<&str>,
        item: Option<&str>,
        status: Option<&str>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            start: non_blank(start)
                .map(|s| parse_bound(s, "start", false))
                .transpose()?,
            end: non_blank(end)
                .map(|s| parse_bound(s, "end", true))
                .transpose()?,
            action: non_blank(action).map(String::from),
            item: non_blank(item).map(String::from),
            status: non_blank(status).map(String::from),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_bound(value: &str, field: &'static str, end_of_day: bool) -> Result<Timestamp, ValidationError> {
    if let Ok(ts) = value.parse::<Timestamp>() {
        return Ok(ts);
    }
    let invalid = |reason: String| ValidationError::Invalid { field, reason };
    let date: Date = value
        .parse()
        .map_err(|_| invalid(format!("must be an RFC 3339 timestamp or YYYY-MM-DD, got {value:?}")))?;
    let zoned = if end_of_day {
        date.at(23, 59, 59, 999_999_999).to_zoned(TimeZone::UTC)
    } else {
        date.to_zoned(TimeZone::UTC)
    };
    zoned
        .map(|z| z.timestamp())
        .map_err(|e| invalid(e.to_string()))
}

/// A person who can take, return, or service items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    pub id: i64,
    pub name: String,
    pub surname: String,
    pub lastname: Option<String>,
    pub qualification: Option<String>,
}

impl Operator {
    pub fn full_name(&self) -> String {
        let mut full = format!("{} {}", self.name, self.surname);
        if let Some(last) = self.lastname.as_deref().filter(|l| !l.is_empty()) {
            full.push(' ');
            full.push_str(last);
        }
        full
    }
}

/// A row of a static lookup table (actions, log statuses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

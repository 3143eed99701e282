//! Action requests: what an operator asks to do to an item.
//!
//! Requests arrive untyped (JSON from the HTTP surface, flags from the CLI)
//! and are validated into an [`ActionRequest`] before any storage is touched.

use serde::Deserialize;

use super::item::ItemRef;

/// The kind of action being logged.
///
/// Three kinds drive status transitions. Any other action id is still
/// logged but never mutates an item. Built only through [`ActionKind::from_id`],
/// so an id with a rule can never arrive as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Taken,
    Returned,
    Maintenance,
    Other(OtherAction),
}

/// An action id with no transition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OtherAction(i64);

impl OtherAction {
    pub fn id(self) -> i64 {
        self.0
    }
}

impl ActionKind {
    pub fn from_id(id: i64) -> Self {
        match id {
            1 => Self::Taken,
            2 => Self::Returned,
            3 => Self::Maintenance,
            other => Self::Other(OtherAction(other)),
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Self::Taken => 1,
            Self::Returned => 2,
            Self::Maintenance => 3,
            Self::Other(other) => other.id(),
        }
    }
}

/// Reasons a request is rejected before a transaction is opened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field(s): {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("{field} {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("malformed request body: {0}")]
    Malformed(String),
}

/// An identifier as it appears on the wire: a JSON integer or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdField {
    Number(i64),
    Text(String),
    Other(serde_json::Value),
}

impl From<i64> for IdField {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

/// The request body exactly as received.
///
/// The legacy field names (`soldier`, `action_type`, `status`, `gun_taken`,
/// `specials_taken`) are accepted as aliases. Unknown keys are rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawActionRequest {
    #[serde(alias = "soldier")]
    pub operator_id: Option<IdField>,

    #[serde(alias = "action_type")]
    pub action_kind: Option<IdField>,

    #[serde(alias = "status")]
    pub status_goal: Option<IdField>,

    #[serde(alias = "gun_taken")]
    pub weapon_id: Option<IdField>,

    #[serde(alias = "specials_taken")]
    pub special_device_id: Option<IdField>,

    pub comment: Option<String>,
}

/// A validated request to register an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub operator_id: i64,
    pub action: ActionKind,

    /// Recorded on the log row as given. Not derived from the transition rules.
    pub status_goal: i64,

    pub comment: Option<String>,

    /// At most one reference per item kind, weapon first.
    items: Vec<ItemRef>,
}

impl ActionRequest {
    /// Parses and validates a JSON request body.
    pub fn from_json(body: &[u8]) -> Result<Self, ValidationError> {
        let raw: RawActionRequest = serde_json::from_slice(body)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        raw.try_into()
    }

    /// Items this action refers to.
    pub fn items(&self) -> &[ItemRef] {
        &self.items
    }

    pub fn weapon_id(&self) -> Option<i64> {
        self.items
            .iter()
            .find(|i| i.kind == super::ItemKind::Weapon)
            .map(|i| i.id)
    }

    pub fn special_device_id(&self) -> Option<i64> {
        self.items
            .iter()
            .find(|i| i.kind == super::ItemKind::SpecialDevice)
            .map(|i| i.id)
    }
}

impl TryFrom<RawActionRequest> for ActionRequest {
    type Error = ValidationError;

    fn try_from(raw: RawActionRequest) -> Result<Self, Self::Error> {
        let operator_id = parse_id(raw.operator_id, "operatorId")?;
        let action_kind = parse_id(raw.action_kind, "actionKind")?;
        let status_goal = parse_id(raw.status_goal, "statusGoal")?;

        let missing: Vec<&'static str> = [
            ("operatorId", operator_id),
            ("actionKind", action_kind),
            ("statusGoal", status_goal),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect();

        let (Some(operator_id), Some(action_kind), Some(status_goal)) =
            (operator_id, action_kind, status_goal)
        else {
            return Err(ValidationError::Missing(missing));
        };

        let weapon = parse_id(raw.weapon_id, "weaponId")?.map(ItemRef::weapon);
        let special = parse_id(raw.special_device_id, "specialDeviceId")?.map(ItemRef::special_device);

        Ok(Self {
            operator_id,
            action: ActionKind::from_id(action_kind),
            status_goal,
            comment: raw.comment.filter(|c| !c.is_empty()),
            items: weapon.into_iter().chain(special).collect(),
        })
    }
}

/// Parses an optional wire id. Absent, `null`, and blank strings are `None`.
fn parse_id(field: Option<IdField>, name: &'static str) -> Result<Option<i64>, ValidationError> {
    let id = match field {
        None => return Ok(None),
        Some(IdField::Number(n)) => n,
        Some(IdField::Text(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<i64>().map_err(|_| ValidationError::Invalid {
                field: name,
                reason: format!("must be a number, got {s:?}"),
            })?
        }
        Some(IdField::Other(value)) => {
            return Err(ValidationError::Invalid {
                field: name,
                reason: format!("must be a number, got {value}"),
            });
        }
    };
    if id <= 0 {
        return Err(ValidationError::Invalid {
            field: name,
            reason: format!("must be a positive id, got {id}"),
        });
    }
    Ok(Some(id))
}

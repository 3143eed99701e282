//! Inventory items and their status.

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Which inventory table an item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Weapon,
    SpecialDevice,
}

impl ItemKind {
    /// Human-readable name used in diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            Self::Weapon => "weapon",
            Self::SpecialDevice => "special device",
        }
    }
}

/// A reference to a single item: its kind plus its row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub id: i64,
}

impl ItemRef {
    pub fn weapon(id: i64) -> Self {
        Self {
            kind: ItemKind::Weapon,
            id,
        }
    }

    pub fn special_device(id: i64) -> Self {
        Self {
            kind: ItemKind::SpecialDevice,
            id,
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.label(), self.id)
    }
}

/// Where an item physically is.
///
/// The set is closed. Ids match the rows seeded into `item_statuses`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    InStock,
    Issued,
    Taken,
    UnderRepair,
}

impl ItemStatus {
    pub const ALL: [Self; 4] = [Self::InStock, Self::Issued, Self::Taken, Self::UnderRepair];

    pub fn id(self) -> i64 {
        match self {
            Self::InStock => 1,
            Self::Issued => 2,
            Self::Taken => 3,
            Self::UnderRepair => 4,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::InStock => "In stock",
            Self::Issued => "Issued",
            Self::Taken => "Taken",
            Self::UnderRepair => "Under repair",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An inventory item as listed to operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    pub kind: ItemKind,
    pub name: String,
    pub type_name: String,
    pub status: ItemStatus,
    pub description: Option<String>,

    /// Only weapons track maintenance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_maintenance: Option<Timestamp>,
}

//! Status transition rules.
//!
//! A pure lookup from action kind to the statuses an item must be in and the
//! status it moves to. Action kinds without a rule are log-only.

use crate::model::{ActionKind, ItemStatus};

/// The effect an action has on an item's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The item must currently be in one of these.
    pub required: &'static [ItemStatus],

    /// Where the item ends up.
    pub result: ItemStatus,
}

impl Transition {
    pub fn allows(&self, current: ItemStatus) -> bool {
        self.required.contains(&current)
    }
}

const TAKEN: Transition = Transition {
    required: &[ItemStatus::InStock],
    result: ItemStatus::Taken,
};

const RETURNED: Transition = Transition {
    required: &[ItemStatus::Taken, ItemStatus::Issued, ItemStatus::UnderRepair],
    result: ItemStatus::InStock,
};

const MAINTENANCE: Transition = Transition {
    required: &[ItemStatus::InStock, ItemStatus::Issued, ItemStatus::Taken],
    result: ItemStatus::UnderRepair,
};

/// Looks up the rule for an action kind.
///
/// The rule depends on the action alone; the status recorded on the log row
/// plays no part. `None` means the action never touches item status.
pub fn transition(action: ActionKind) -> Option<Transition> {
    match action {
        ActionKind::Taken => Some(TAKEN),
        ActionKind::Returned => Some(RETURNED),
        ActionKind::Maintenance => Some(MAINTENANCE),
        ActionKind::Other(_) => None,
    }
}

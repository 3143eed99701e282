//! Core data model for the armory.
//!
//! Items (weapons and special devices) carry a status that only changes as a
//! side effect of a logged action. Log entries are append-only records of
//! who did what to which item.

mod action;
mod item;
mod log;

pub use action::{ActionKind, ActionRequest, IdField, RawActionRequest, ValidationError};
pub use item::{Item, ItemKind, ItemRef, ItemStatus};
pub use log::{CatalogEntry, LogDetail, LogFilter, LogSummary, NewLogEntry, Operator};

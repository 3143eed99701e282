//! Inventory and catalogue reads.

use jiff::Timestamp;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::model::{CatalogEntry, Item, ItemKind, ItemRef, ItemStatus, Operator};

use super::{Result, Storage, StorageError};

/// The table holding items of `kind`.
pub(super) fn table(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Weapon => "weapons",
        ItemKind::SpecialDevice => "special_devices",
    }
}

fn type_table(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Weapon => "weapon_types",
        ItemKind::SpecialDevice => "special_types",
    }
}

pub(super) fn current_status(conn: &Connection, item: ItemRef) -> Result<Option<ItemStatus>> {
    let sql = format!("SELECT status_id FROM {} WHERE id = ?1", table(item.kind));
    let status_id: Option<i64> = conn
        .query_row(&sql, [item.id], |row| row.get(0))
        .optional()?;
    status_id.map(decode_status).transpose()
}

fn decode_status(id: i64) -> Result<ItemStatus> {
    ItemStatus::from_id(id).ok_or_else(|| StorageError::Corrupt(format!("unknown item status id: {id}")))
}

fn select_items(kind: ItemKind) -> String {
    // Special devices have no maintenance column.
    let maintenance = match kind {
        ItemKind::Weapon => "i.last_maintenance",
        ItemKind::SpecialDevice => "NULL",
    };
    format!(
        "SELECT i.id, i.name, t.name, i.status_id, i.description, {maintenance}
         FROM {} i
         JOIN {} t ON i.type_id = t.id",
        table(kind),
        type_table(kind)
    )
}

/// An item row before its status and timestamp are decoded.
struct ItemRow {
    id: i64,
    name: String,
    type_name: String,
    status_id: i64,
    description: Option<String>,
    last_maintenance: Option<String>,
}

impl ItemRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            type_name: row.get(2)?,
            status_id: row.get(3)?,
            description: row.get(4)?,
            last_maintenance: row.get(5)?,
        })
    }

    fn decode(self, kind: ItemKind) -> Result<Item> {
        let last_maintenance = self
            .last_maintenance
            .map(|m| {
                m.parse::<Timestamp>()
                    .map_err(|e| StorageError::Corrupt(format!("invalid last_maintenance: {e}")))
            })
            .transpose()?;
        Ok(Item {
            id: self.id,
            kind,
            name: self.name,
            type_name: self.type_name,
            status: decode_status(self.status_id)?,
            description: self.description,
            last_maintenance,
        })
    }
}

impl Storage {
    /// Lists all items of one kind, ordered by id.
    pub fn list_items(&self, kind: ItemKind) -> Result<Vec<Item>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY i.id", select_items(kind)))?;
        let rows = stmt
            .query_map([], ItemRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(|row| row.decode(kind)).collect()
    }

    /// Loads a single item, or `None` if it doesn't exist.
    pub fn load_item(&self, item: ItemRef) -> Result<Option<Item>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                &format!("{} WHERE i.id = ?1", select_items(item.kind)),
                [item.id],
                ItemRow::from_row,
            )
            .optional()?;
        row.map(|row| row.decode(item.kind)).transpose()
    }

    pub fn list_operators(&self) -> Result<Vec<Operator>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, surname, lastname, qualification FROM operators ORDER BY id",
        )?;
        let operators = stmt
            .query_map([], |row| {
                Ok(Operator {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    surname: row.get(2)?,
                    lastname: row.get(3)?,
                    qualification: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(operators)
    }

    pub fn list_actions(&self) -> Result<Vec<CatalogEntry>> {
        self.list_catalog("SELECT id, name, description FROM actions ORDER BY id")
    }

    pub fn list_log_statuses(&self) -> Result<Vec<CatalogEntry>> {
        self.list_catalog("SELECT id, name, NULL FROM log_statuses ORDER BY name")
    }

    fn list_catalog(&self, sql: &str) -> Result<Vec<CatalogEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let entries = stmt
            .query_map([], |row| {
                Ok(CatalogEntry {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rusqlite::params;

    use crate::storage::fixtures::*;

    #[test]
    fn list_items_joins_type_names() {
        let (_dir, storage) = storage();
        add_weapon(&storage, 2, "PKM #2", ItemStatus::Issued);
        add_weapon(&storage, 1, "AK-12 #1", ItemStatus::InStock);

        let weapons = storage.list_items(ItemKind::Weapon).unwrap();

        assert_eq!(weapons.len(), 2);
        assert_eq!(weapons[0].name, "AK-12 #1");
        assert_eq!(weapons[0].type_name, "General");
        assert_eq!(weapons[1].status, ItemStatus::Issued);
        assert_eq!(weapons[1].description.as_deref(), Some("test rifle"));
    }

    #[test]
    fn load_item_reads_maintenance_date() {
        let (_dir, storage) = storage();
        add_weapon(&storage, 1, "AK-12 #1", ItemStatus::InStock);
        storage
            .connect()
            .unwrap()
            .execute(
                "UPDATE weapons SET last_maintenance = ?1 WHERE id = 1",
                params!["2024-05-01T08:00:00Z"],
            )
            .unwrap();

        let weapon = storage.load_item(ItemRef::weapon(1)).unwrap().unwrap();

        assert_eq!(
            weapon.last_maintenance,
            Some("2024-05-01T08:00:00Z".parse().unwrap())
        );
    }

    #[test]
    fn load_missing_item_is_none() {
        let (_dir, storage) = storage();

        assert!(storage.load_item(ItemRef::special_device(3)).unwrap().is_none());
    }

    #[test]
    fn special_devices_have_no_maintenance() {
        let (_dir, storage) = storage();
        add_special(&storage, 3, "NVG #3", ItemStatus::Taken);

        let specials = storage.list_items(ItemKind::SpecialDevice).unwrap();

        assert_eq!(specials.len(), 1);
        assert_eq!(specials[0].kind, ItemKind::SpecialDevice);
        assert_eq!(specials[0].last_maintenance, None);
    }

    #[test]
    fn catalogues_are_seeded() {
        let (_dir, storage) = storage();
        add_operator(&storage, 1, "Ivan", "Petrov");

        assert_eq!(storage.list_actions().unwrap().len(), 3);
        assert_eq!(storage.list_log_statuses().unwrap().len(), 4);
        assert_eq!(storage.list_operators().unwrap()[0].full_name(), "Ivan Petrov");
    }
}

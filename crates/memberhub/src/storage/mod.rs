//! Storage layer for memberhub.
//!
//! This module provides `SQLite`-based persistent storage standing in for the
//! hosted database: built pages, flat menu items per menu type, and the
//! key-value slots that back member sessions.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::menu::MenuRecord;

/// A built page that menu items can link to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Page identifier.
    pub id: i64,
    /// Page title.
    pub title: String,
    /// URL slug, unique across pages.
    pub slug: String,
}

/// Number of stored items for one menu type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuTypeSummary {
    /// The menu category key.
    pub menu_type: String,
    /// Items stored under it.
    pub items: i64,
}

/// Storage engine for menus, pages and session slots.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // Several processes may share one database file.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // === Pages ===

    /// Insert a page or update the title and slug of an existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails, including when the
    /// slug already belongs to another page.
    pub fn upsert_page(&self, page: &Page) -> Result<()> {
        self.conn.execute(
            r"
            INSERT INTO pages (id, title, slug) VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET title = excluded.title, slug = excluded.slug
            ",
            params![page.id, page.title, page.slug],
        )?;
        Ok(())
    }

    /// Get a page by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_page(&self, id: i64) -> Result<Option<Page>> {
        let page = self
            .conn
            .query_row(
                "SELECT id, title, slug FROM pages WHERE id = ?1",
                [id],
                |row| {
                    Ok(Page {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        slug: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(page)
    }

    // === Menus ===

    /// Replace every item of `menu_type` with `records`.
    ///
    /// Records carrying a page slug also upsert that page. A page id with no
    /// slug is kept only if the page already exists. Runs in one transaction.
    /// Returns the number of items stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails, for example when an
    /// id is already used by another menu type.
    pub fn replace_menu(&self, menu_type: &str, records: &[MenuRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;

        let removed = tx.execute("DELETE FROM menu_items WHERE menu_type = ?1", [menu_type])?;
        if removed > 0 {
            debug!(menu_type, removed, "cleared menu before import");
        }

        for record in records {
            let page_id = match (record.page_id, record.page_slug.as_deref()) {
                (Some(id), Some(slug)) => {
                    tx.execute(
                        r"
                        INSERT INTO pages (id, title, slug) VALUES (?1, ?2, ?3)
                        ON CONFLICT(id) DO UPDATE SET title = excluded.title, slug = excluded.slug
                        ",
                        params![id, record.page_title.as_deref().unwrap_or(slug), slug],
                    )?;
                    Some(id)
                }
                (Some(id), None) => {
                    let exists: bool = tx
                        .query_row("SELECT 1 FROM pages WHERE id = ?1", [id], |_| Ok(true))
                        .optional()?
                        .unwrap_or(false);
                    if !exists {
                        warn!(item = record.id, page_id = id, "unknown page, unlinking");
                    }
                    exists.then_some(id)
                }
                (None, _) => None,
            };

            tx.execute(
                r"
                INSERT INTO menu_items
                    (id, menu_type, name, href, parent_id, sort_order, depth,
                     icon, description, open_in_new_tab, page_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ",
                params![
                    record.id,
                    menu_type,
                    record.name,
                    record.href,
                    record.parent_id,
                    record.sort_order,
                    record.depth,
                    record.icon,
                    record.description,
                    record.open_in_new_tab,
                    page_id,
                ],
            )?;
        }

        tx.commit()?;
        info!(menu_type, items = records.len(), "menu replaced");
        Ok(records.len())
    }

    /// Read the flat records of `menu_type`, joined with their linked pages.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn menu_records(&self, menu_type: &str) -> Result<Vec<MenuRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT m.id, m.name, m.href, m.parent_id, m.sort_order, m.depth,
                   m.icon, m.description, m.open_in_new_tab, m.page_id, p.title, p.slug
            FROM menu_items m LEFT JOIN pages p ON p.id = m.page_id
            WHERE m.menu_type = ?1
            ORDER BY m.id
            ",
        )?;

        let records = stmt
            .query_map([menu_type], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// List stored menu types with their item counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn menu_types(&self) -> Result<Vec<MenuTypeSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT menu_type, COUNT(*) FROM menu_items GROUP BY menu_type ORDER BY menu_type",
        )?;
        let types = stmt
            .query_map([], |row| {
                Ok(MenuTypeSummary {
                    menu_type: row.get(0)?,
                    items: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(types)
    }

    /// Delete every item of `menu_type`. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_menu(&self, menu_type: &str) -> Result<usize> {
        let affected = self
            .conn
            .execute("DELETE FROM menu_items WHERE menu_type = ?1", [menu_type])?;
        Ok(affected)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<MenuRecord> {
        Ok(MenuRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            href: row.get(2)?,
            parent_id: row.get(3)?,
            sort_order: row.get(4)?,
            depth: row.get(5)?,
            icon: row.get(6)?,
            description: row.get(7)?,
            open_in_new_tab: row.get(8)?,
            page_id: row.get(9)?,
            page_title: row.get(10)?,
            page_slug: row.get(11)?,
        })
    }

    // === Slots ===

    /// Read a slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn slot_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM slots WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Write a slot, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn slot_set(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.conn.execute(
            "INSERT OR REPLACE INTO slots (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now],
        )?;
        Ok(())
    }

    /// Delete a slot. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn slot_remove(&self, key: &str) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM slots WHERE key = ?1", [key])?;
        Ok(affected > 0)
    }

    // === Stats ===

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count = |sql: &str| -> Result<i64> {
            Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
        };

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            pages: count("SELECT COUNT(*) FROM pages")?,
            menu_items: count("SELECT COUNT(*) FROM menu_items")?,
            menu_types: count("SELECT COUNT(DISTINCT menu_type) FROM menu_items")?,
            slots: count("SELECT COUNT(*) FROM slots")?,
            db_size_bytes,
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Number of pages.
    pub pages: i64,
    /// Number of menu items across all menu types.
    pub menu_items: i64,
    /// Number of distinct menu types.
    pub menu_types: i64,
    /// Number of occupied slots.
    pub slots: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn sample_menu() -> Vec<MenuRecord> {
        vec![
            MenuRecord::new(1, "Events").with_sort_order(0),
            MenuRecord::new(2, "Calendar").with_parent(1),
            MenuRecord::new(3, "About").with_page(10, "About us", "about-us"),
        ]
    }

    #[test]
    fn test_open_in_memory() {
        assert!(Storage::open_in_memory().is_ok());
    }

    #[test]
    fn test_replace_and_read_menu() {
        let storage = create_test_storage();
        let stored = storage.replace_menu("main", &sample_menu()).unwrap();
        assert_eq!(stored, 3);

        let records = storage.menu_records("main").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].parent_id, Some(1));
        assert_eq!(records[2].page_slug.as_deref(), Some("about-us"));
        assert_eq!(records[2].page_title.as_deref(), Some("About us"));
    }

    #[test]
    fn test_replace_menu_removes_previous_items() {
        let storage = create_test_storage();
        storage.replace_menu("main", &sample_menu()).unwrap();
        storage
            .replace_menu("main", &[MenuRecord::new(4, "Only")])
            .unwrap();

        let records = storage.menu_records("main").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Only");
    }

    #[test]
    fn test_replace_menu_keeps_other_types() {
        let storage = create_test_storage();
        storage.replace_menu("main", &sample_menu()).unwrap();
        storage
            .replace_menu("footer", &[MenuRecord::new(20, "Contact")])
            .unwrap();

        assert_eq!(storage.menu_records("main").unwrap().len(), 3);
        let types = storage.menu_types().unwrap();
        assert_eq!(
            types,
            vec![
                MenuTypeSummary {
                    menu_type: "footer".to_string(),
                    items: 1
                },
                MenuTypeSummary {
                    menu_type: "main".to_string(),
                    items: 3
                },
            ]
        );
    }

    #[test]
    fn test_replace_menu_id_clash_rolls_back() {
        let storage = create_test_storage();
        storage.replace_menu("main", &sample_menu()).unwrap();

        let clash = [MenuRecord::new(30, "Fine"), MenuRecord::new(1, "Taken")];
        assert!(storage.replace_menu("footer", &clash).is_err());
        assert!(storage.menu_records("footer").unwrap().is_empty());
    }

    #[test]
    fn test_orphan_parent_is_stored() {
        let storage = create_test_storage();
        storage
            .replace_menu("main", &[MenuRecord::new(5, "Lost").with_parent(404)])
            .unwrap();
        assert_eq!(storage.menu_records("main").unwrap()[0].parent_id, Some(404));
    }

    #[test]
    fn test_unknown_page_id_without_slug_is_unlinked() {
        let storage = create_test_storage();
        let mut record = MenuRecord::new(1, "Ghost page");
        record.page_id = Some(77);
        storage.replace_menu("main", &[record]).unwrap();

        let records = storage.menu_records("main").unwrap();
        assert_eq!(records[0].page_id, None);
    }

    #[test]
    fn test_known_page_id_without_slug_is_linked() {
        let storage = create_test_storage();
        storage
            .upsert_page(&Page {
                id: 8,
                title: "Venues".to_string(),
                slug: "venues".to_string(),
            })
            .unwrap();
        let mut record = MenuRecord::new(1, "Venues");
        record.page_id = Some(8);
        storage.replace_menu("main", &[record]).unwrap();

        let records = storage.menu_records("main").unwrap();
        assert_eq!(records[0].page_slug.as_deref(), Some("venues"));
    }

    #[test]
    fn test_upsert_and_get_page() {
        let storage = create_test_storage();
        let mut page = Page {
            id: 1,
            title: "Home".to_string(),
            slug: "home".to_string(),
        };
        storage.upsert_page(&page).unwrap();
        page.title = "Welcome".to_string();
        storage.upsert_page(&page).unwrap();

        assert_eq!(storage.get_page(1).unwrap(), Some(page));
        assert!(storage.get_page(2).unwrap().is_none());
    }

    #[test]
    fn test_delete_menu() {
        let storage = create_test_storage();
        storage.replace_menu("main", &sample_menu()).unwrap();
        assert_eq!(storage.delete_menu("main").unwrap(), 3);
        assert!(storage.menu_records("main").unwrap().is_empty());
    }

    #[test]
    fn test_slot_round_trip() {
        let storage = create_test_storage();
        assert!(storage.slot_get("k").unwrap().is_none());

        storage.slot_set("k", "v1").unwrap();
        storage.slot_set("k", "v2").unwrap();
        assert_eq!(storage.slot_get("k").unwrap().as_deref(), Some("v2"));

        assert!(storage.slot_remove("k").unwrap());
        assert!(!storage.slot_remove("k").unwrap());
        assert!(storage.slot_get("k").unwrap().is_none());
    }

    #[test]
    fn test_stats() {
        let storage = create_test_storage();
        storage.replace_menu("main", &sample_menu()).unwrap();
        storage.slot_set("session", "{}").unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.menu_items, 3);
        assert_eq!(stats.menu_types, 1);
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.slots, 1);
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = std::env::temp_dir();
        let root = temp_dir.join(format!("memberhub_test_{}", std::process::id()));
        let nested_path = root.join("nested/db.sqlite");
        let _ = std::fs::remove_dir_all(&root);

        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());
        assert_eq!(storage.path(), nested_path);

        drop(storage);
        let _ = std::fs::remove_dir_all(&root);
    }
}

//! Where flat menu records come from.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::MenuRecord;
use crate::error::{Error, Result};
use crate::storage::Storage;

/// A remote or local source of flat menu records.
///
/// `menu_type` is an opaque category key passed through unchanged. A source
/// may answer `None` when it has nothing for the key; callers treat that the
/// same as an empty list.
#[async_trait]
pub trait MenuSource: Send + Sync {
    /// The name of this source (for logging).
    fn name(&self) -> &'static str;

    /// Fetch the unordered records for `menu_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be reached or answers badly.
    async fn fetch_menu(&self, menu_type: &str) -> Result<Option<Vec<MenuRecord>>>;
}

#[async_trait]
impl<T: MenuSource + ?Sized> MenuSource for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn fetch_menu(&self, menu_type: &str) -> Result<Option<Vec<MenuRecord>>> {
        (**self).fetch_menu(menu_type).await
    }
}

/// Menu records read from the local `SQLite` database.
#[derive(Debug, Clone)]
pub struct SqliteMenuSource {
    storage: Arc<Mutex<Storage>>,
}

impl SqliteMenuSource {
    /// Create a source over shared storage.
    #[must_use]
    pub fn new(storage: Arc<Mutex<Storage>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl MenuSource for SqliteMenuSource {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn fetch_menu(&self, menu_type: &str) -> Result<Option<Vec<MenuRecord>>> {
        let storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        let records = storage
            .menu_records(menu_type)
            .map_err(|e| Error::menu_source(menu_type, e.to_string()))?;
        debug!(menu_type, count = records.len(), "read menu records");
        Ok(Some(records))
    }
}

/// A fixed set of menus held in memory.
///
/// Unknown menu types answer `None`.
#[derive(Debug, Clone, Default)]
pub struct StaticMenuSource {
    menus: HashMap<String, Vec<MenuRecord>>,
}

impl StaticMenuSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the records for a menu type.
    #[must_use]
    pub fn with_menu(mut self, menu_type: impl Into<String>, records: Vec<MenuRecord>) -> Self {
        self.menus.insert(menu_type.into(), records);
        self
    }
}

#[async_trait]
impl MenuSource for StaticMenuSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_menu(&self, menu_type: &str) -> Result<Option<Vec<MenuRecord>>> {
        Ok(self.menus.get(menu_type).cloned())
    }
}

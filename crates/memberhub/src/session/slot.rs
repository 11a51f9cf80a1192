//! Persistent key-value slots.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::storage::Storage;

/// A key-value store shared by every context on the same device.
///
/// Writes are last-writer-wins; there is no compare-and-swap.
pub trait SlotStore: Send + Sync {
    /// Read a slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a slot. Deleting a missing slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: SlotStore + ?Sized> SlotStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// Slots kept in process memory.
///
/// Clones share the same map, so several contexts in one process can share a
/// store the way browser tabs share local storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySlotStore {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySlotStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SlotStore for MemorySlotStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(key);
        Ok(())
    }
}

/// Slots persisted in the `SQLite` `slots` table.
#[derive(Debug, Clone)]
pub struct SqliteSlotStore {
    storage: Arc<Mutex<Storage>>,
}

impl SqliteSlotStore {
    /// Create a slot store over shared storage.
    #[must_use]
    pub fn new(storage: Arc<Mutex<Storage>>) -> Self {
        Self { storage }
    }

    fn with_storage<T>(&self, key: &str, op: impl FnOnce(&Storage) -> Result<T>) -> Result<T> {
        let storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        op(&storage).map_err(|e| Error::slot_backend(key, e.to_string()))
    }
}

impl SlotStore for SqliteSlotStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_storage(key, |s| s.slot_get(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_storage(key, |s| s.slot_set(key, value))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_storage(key, |s| s.slot_remove(key).map(|_| ()))
    }
}

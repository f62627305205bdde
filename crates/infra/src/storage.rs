//! In-memory credential storage
//!
//! Default `ScopedStorage` backing: both scopes live in process memory, so
//! the durable/session distinction is preserved for the mutual-exclusion
//! invariant while actual persistence remains an integration concern. Apps
//! that need credentials to survive a restart implement the port over their
//! platform's storage.

use std::collections::HashMap;

use beacon_core::ports::ScopedStorage;
use beacon_domain::{Result, StorageScope};
use parking_lot::RwLock;

/// `ScopedStorage` over a process-local map
#[derive(Debug, Default)]
pub struct MemoryStorage {
    cells: RwLock<HashMap<(StorageScope, String), String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScopedStorage for MemoryStorage {
    fn get(&self, scope: StorageScope, key: &str) -> Result<Option<String>> {
        Ok(self.cells.read().get(&(scope, key.to_owned())).cloned())
    }

    fn set(&self, scope: StorageScope, key: &str, value: &str) -> Result<()> {
        self.cells.write().insert((scope, key.to_owned()), value.to_owned());
        Ok(())
    }

    fn remove(&self, scope: StorageScope, key: &str) -> Result<()> {
        self.cells.write().remove(&(scope, key.to_owned()));
        Ok(())
    }
}

//! Persistence of secrets between sessions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Result, TangemSdkError};

/// Key/value store for small secrets
pub trait SecureStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Fails when `key` is taken and `overwrite` is not set
    fn store(&self, data: &[u8], key: &str, overwrite: bool) -> Result<()>;

    fn delete(&self, key: &str);
}

/// Process-local storage, for tests and command line tools
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStorage for InMemoryStorage {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().get(key).cloned()
    }

    fn store(&self, data: &[u8], key: &str, overwrite: bool) -> Result<()> {
        let mut entries = self.entries.lock();
        if !overwrite && entries.contains_key(key) {
            return Err(TangemSdkError::Underlying(format!("{key} is already stored")));
        }
        entries.insert(key.to_owned(), data.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

/// Access code hashes remembered per card
#[derive(Clone)]
pub struct AccessCodeRepository {
    storage: Arc<dyn SecureStorage>,
}

impl AccessCodeRepository {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    fn key(card_id: &str) -> String {
        format!("access_code_{card_id}")
    }

    pub fn save(&self, card_id: &str, access_code_hash: &[u8]) -> Result<()> {
        debug!(card_id, "Saving access code");
        self.storage.store(access_code_hash, &Self::key(card_id), true)
    }

    pub fn get(&self, card_id: &str) -> Option<Vec<u8>> {
        self.storage.get(&Self::key(card_id))
    }

    pub fn delete(&self, card_id: &str) {
        self.storage.delete(&Self::key(card_id));
    }

    pub fn contains(&self, card_id: &str) -> bool {
        self.get(card_id).is_some()
    }
}

impl fmt::Debug for AccessCodeRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCodeRepository").finish_non_exhaustive()
    }
}

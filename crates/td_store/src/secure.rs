//! The secure-storage seam.
//!
//! `SecureStore` holds small secret blobs (key material only — nothing else
//! belongs here). The production implementation is the OS keyring; tests use
//! the in-memory implementation. Every failure maps to
//! [`StoreError::Unavailable`]: if the secure store cannot be reached there
//! is no acceptable fallback.

use std::collections::HashMap;
use std::sync::Mutex;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use keyring::Entry;

use crate::error::StoreError;

/// Small-blob secret storage. Implementations must be safe to share across
/// tasks (`Send + Sync`).
pub trait SecureStore: Send + Sync {
    /// Fetch an entry; `Ok(None)` when it has never been written.
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Create or overwrite an entry.
    fn put(&self, name: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove an entry; removing a missing entry is not an error.
    fn delete(&self, name: &str) -> Result<(), StoreError>;
}

// ── OS keyring implementation ────────────────────────────────────────────────

/// Secure store backed by the OS keychain / credential manager.
///
/// Binary values are base64-encoded because keyring entries are strings on
/// every platform backend.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// `service` namespaces all entries (e.g. `"TandemJournal"`), so two
    /// installs of different Tandem-based apps never collide.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, name: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service, name).map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl SecureStore for KeyringStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let entry = self.entry(name)?;
        match entry.get_password() {
            Ok(encoded) => {
                let bytes = URL_SAFE_NO_PAD
                    .decode(encoded)
                    .map_err(|e| StoreError::Corrupted(e.to_string()))?;
                Ok(Some(bytes))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }

    fn put(&self, name: &str, value: &[u8]) -> Result<(), StoreError> {
        let entry = self.entry(name)?;
        entry
            .set_password(&URL_SAFE_NO_PAD.encode(value))
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let entry = self.entry(name)?;
        match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }
}

// ── In-memory implementation (tests, previews) ───────────────────────────────

/// Deterministic in-memory secure store for tests. Not for production use.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStore for MemoryStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".into()))?
            .get(name)
            .cloned())
    }

    fn put(&self, name: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".into()))?
            .insert(name.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".into()))?
            .remove(name);
        Ok(())
    }
}

//! Per-couple symmetric key ring.
//!
//! Exactly one key per couple id per device; both partners independently
//! derive and store the same key value. Keys live in the injected secure
//! store as small JSON records (key material base64, plus the derivation
//! timestamp) and never leave the device in any form.
//!
//! The keyring backends cannot enumerate entries, so a separate index entry
//! tracks which couple ids have keys — that is what makes `clear_all`
//! (sign-out, account deletion) possible.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::Zeroizing;

use td_crypto::CoupleKey;

use crate::{error::StoreError, secure::SecureStore};

const COUPLE_INDEX_ENTRY: &str = "couple_key_index";

fn entry_name(couple_id: &str) -> String {
    format!("couple_key:{couple_id}")
}

/// A couple key plus its derivation metadata.
pub struct StoredCoupleKey {
    pub key: CoupleKey,
    pub derived_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct KeyRecord {
    key_b64: String,
    derived_at: DateTime<Utc>,
}

/// All couple keys known to this device.
pub struct CoupleKeyRing {
    store: Arc<dyn SecureStore>,
}

impl CoupleKeyRing {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self { store }
    }

    /// Persist a freshly derived key, stamping `derived_at` now. Overwrites
    /// any previous key for the couple (re-pairing).
    pub fn store(&self, couple_id: &str, key: &CoupleKey) -> Result<(), StoreError> {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let record = KeyRecord {
            key_b64: URL_SAFE_NO_PAD.encode(key.as_bytes()),
            derived_at: Utc::now(),
        };
        let json = Zeroizing::new(serde_json::to_vec(&record)?);
        self.store.put(&entry_name(couple_id), &json)?;
        self.index_add(couple_id)?;
        info!(couple_id, "couple key stored");
        Ok(())
    }

    /// The cached key, or `None` if this device has not completed
    /// derivation for that couple yet.
    pub fn get(&self, couple_id: &str) -> Result<Option<StoredCoupleKey>, StoreError> {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let Some(raw) = self.store.get(&entry_name(couple_id))? else {
            return Ok(None);
        };
        let record: KeyRecord = serde_json::from_slice(&raw)
            .map_err(|e| StoreError::Corrupted(e.to_string()))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(&record.key_b64)
            .map_err(|e| StoreError::Corrupted(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| StoreError::Corrupted("couple key is not 32 bytes".into()))?;
        Ok(Some(StoredCoupleKey {
            key: CoupleKey::from_bytes(arr),
            derived_at: record.derived_at,
        }))
    }

    /// Remove one couple's key (explicit unlink). The device keypair is
    /// untouched, so re-pairing only needs a fresh public-key exchange.
    pub fn remove(&self, couple_id: &str) -> Result<(), StoreError> {
        self.store.delete(&entry_name(couple_id))?;
        self.index_remove(couple_id)?;
        info!(couple_id, "couple key removed");
        Ok(())
    }

    /// Remove every couple key (sign-out / account deletion).
    pub fn clear_all(&self) -> Result<(), StoreError> {
        for couple_id in self.index()? {
            self.store.delete(&entry_name(&couple_id))?;
        }
        self.store.delete(COUPLE_INDEX_ENTRY)?;
        info!("all couple keys cleared");
        Ok(())
    }

    /// Couple ids that currently have a stored key.
    pub fn index(&self) -> Result<Vec<String>, StoreError> {
        match self.store.get(COUPLE_INDEX_ENTRY)? {
            Some(raw) => serde_json::from_slice(&raw)
                .map_err(|e| StoreError::Corrupted(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    fn index_add(&self, couple_id: &str) -> Result<(), StoreError> {
        let mut ids = self.index()?;
        if !ids.iter().any(|id| id == couple_id) {
            ids.push(couple_id.to_string());
            self.store
                .put(COUPLE_INDEX_ENTRY, &serde_json::to_vec(&ids)?)?;
        }
        Ok(())
    }

    fn index_remove(&self, couple_id: &str) -> Result<(), StoreError> {
        let mut ids = self.index()?;
        ids.retain(|id| id != couple_id);
        self.store
            .put(COUPLE_INDEX_ENTRY, &serde_json::to_vec(&ids)?)?;
        Ok(())
    }
}

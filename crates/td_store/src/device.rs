//! Device keypair persistence.
//!
//! One X25519 keypair per install, created lazily on first use and never
//! rotated. Get-or-create, not get-or-replace: concurrent pairing attempts
//! on the same device must observe the same keypair, so first creation is
//! serialised behind a mutex.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use td_crypto::{DeviceKeypair, DevicePublicKey};

use crate::{error::StoreError, secure::SecureStore};

const DEVICE_KEY_ENTRY: &str = "device_keypair";

/// Owns the device's long-lived keypair inside the injected secure store.
pub struct DeviceKeyStore {
    store: Arc<dyn SecureStore>,
    // Held across the load-check-generate-persist window only.
    create_guard: Mutex<()>,
}

impl DeviceKeyStore {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self {
            store,
            create_guard: Mutex::new(()),
        }
    }

    /// Return the device public key, generating and persisting a fresh
    /// keypair on first call. Idempotent: every later call returns the same
    /// key for the lifetime of the install.
    pub fn get_or_create_public_key(&self) -> Result<DevicePublicKey, StoreError> {
        Ok(self.get_or_create_keypair()?.public().clone())
    }

    /// Full keypair, secret half included. Exclusively for the couple-key
    /// derivation step — the secret must never reach a networked code path.
    pub fn keypair_for_derivation(&self) -> Result<DeviceKeypair, StoreError> {
        self.get_or_create_keypair()
    }

    /// Whether a keypair has been generated on this install yet.
    pub fn has_keypair(&self) -> Result<bool, StoreError> {
        Ok(self.store.get(DEVICE_KEY_ENTRY)?.is_some())
    }

    /// Erase the device keypair. Only for full app-data wipe / account
    /// deletion — after this, every existing couple key is unreachable by
    /// re-derivation and the device must pair from scratch.
    pub fn clear(&self) -> Result<(), StoreError> {
        info!("erasing device keypair");
        self.store.delete(DEVICE_KEY_ENTRY)
    }

    fn get_or_create_keypair(&self) -> Result<DeviceKeypair, StoreError> {
        let _guard = self
            .create_guard
            .lock()
            .map_err(|_| StoreError::Unavailable("device key mutex poisoned".into()))?;

        if let Some(secret) = self.store.get(DEVICE_KEY_ENTRY)? {
            return DeviceKeypair::from_secret_bytes(&secret)
                .map_err(|e| StoreError::Corrupted(e.to_string()));
        }

        let keypair = DeviceKeypair::generate();
        self.store.put(DEVICE_KEY_ENTRY, &keypair.secret_bytes())?;
        info!(fingerprint = %keypair.public().fingerprint(), "generated device keypair");
        debug!("device keypair persisted to secure storage");
        Ok(keypair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secure::MemoryStore;

    fn fresh() -> DeviceKeyStore {
        DeviceKeyStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let store = fresh();
        let first = store.get_or_create_public_key().unwrap();
        let second = store.get_or_create_public_key().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn keypair_for_derivation_matches_public() {
        let store = fresh();
        let public = store.get_or_create_public_key().unwrap();
        let keypair = store.keypair_for_derivation().unwrap();
        assert_eq!(keypair.public(), &public);
    }

    #[test]
    fn clear_forces_a_new_keypair() {
        let store = fresh();
        let first = store.get_or_create_public_key().unwrap();
        store.clear().unwrap();
        assert!(!store.has_keypair().unwrap());
        let second = store.get_or_create_public_key().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn corrupted_entry_is_reported_not_replaced() {
        let backing = Arc::new(MemoryStore::new());
        backing.put(DEVICE_KEY_ENTRY, b"not-32-bytes").unwrap();
        let store = DeviceKeyStore::new(backing);
        assert!(matches!(
            store.get_or_create_public_key(),
            Err(StoreError::Corrupted(_))
        ));
    }

    #[test]
    fn concurrent_first_use_yields_one_keypair() {
        let store = Arc::new(fresh());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&store);
                std::thread::spawn(move || s.get_or_create_public_key().unwrap())
            })
            .collect();
        let keys: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
    }
}

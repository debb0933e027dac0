//! Capability traits over the sync backend.
//!
//! The backend is a DUMB RELAY for the cryptographic core: it stores each
//! member's uploaded public key under `(coupleId, userId)` and opaque blobs
//! under `(coupleId, logicalKey)`. Server-side access control (couple
//! members only) is the backend's job; nothing here depends on it for
//! confidentiality — blobs are ciphertext before they leave the device.
//!
//! Configurations without a backend get [`OfflineBackend`] instead of
//! runtime existence checks scattered through the pairing code. Tests use
//! [`MemoryBackend`], shared between two simulated devices.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::PairingError;

/// Publish/fetch of pairing public keys, keyed by `(coupleId, userId)`.
#[async_trait]
pub trait PairingDirectory: Send + Sync {
    /// Upload this device's public key (base64) under the couple record.
    /// Overwrites any previous upload by the same user (retried handshake).
    async fn publish_public_key(
        &self,
        couple_id: &str,
        user_id: &str,
        public_key_b64: &str,
    ) -> Result<(), PairingError>;

    /// The partner's public key (base64), or `None` if they have not
    /// published yet. `user_id` is the *local* user — the directory returns
    /// the key of the other couple member.
    async fn fetch_partner_key(
        &self,
        couple_id: &str,
        user_id: &str,
    ) -> Result<Option<String>, PairingError>;
}

/// Read/write of opaque couple-shared values, keyed by `(coupleId, logicalKey)`.
///
/// Values are JSON: either an `EncryptedEnvelope` or, for records written
/// before encryption shipped, legacy plaintext. The store does not care
/// which — the channel layer does.
#[async_trait]
pub trait EncryptedBlobStore: Send + Sync {
    async fn put(
        &self,
        couple_id: &str,
        logical_key: &str,
        value: &Value,
    ) -> Result<(), PairingError>;

    async fn get(
        &self,
        couple_id: &str,
        logical_key: &str,
    ) -> Result<Option<Value>, PairingError>;
}

// ── Offline (no backend configured) ──────────────────────────────────────────

/// No-op backend for offline-only builds: publishes vanish, every fetch is
/// empty. Pairing can never complete against it, which is the correct
/// behavior — the gate layer reports sync as unavailable long before.
pub struct OfflineBackend;

#[async_trait]
impl PairingDirectory for OfflineBackend {
    async fn publish_public_key(&self, _: &str, _: &str, _: &str) -> Result<(), PairingError> {
        Ok(())
    }

    async fn fetch_partner_key(&self, _: &str, _: &str) -> Result<Option<String>, PairingError> {
        Ok(None)
    }
}

#[async_trait]
impl EncryptedBlobStore for OfflineBackend {
    async fn put(&self, _: &str, _: &str, _: &Value) -> Result<(), PairingError> {
        Ok(())
    }

    async fn get(&self, _: &str, _: &str) -> Result<Option<Value>, PairingError> {
        Ok(None)
    }
}

// ── In-memory backend (tests) ────────────────────────────────────────────────

#[derive(Default)]
struct MemoryBackendInner {
    /// (couple_id, user_id) → public key b64
    keys: HashMap<(String, String), String>,
    /// (couple_id, logical_key) → stored value
    blobs: HashMap<(String, String), Value>,
}

/// Shared in-memory backend. Clone it into two `Handshake`s to simulate two
/// devices talking through the same relay.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<RwLock<MemoryBackendInner>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PairingDirectory for MemoryBackend {
    async fn publish_public_key(
        &self,
        couple_id: &str,
        user_id: &str,
        public_key_b64: &str,
    ) -> Result<(), PairingError> {
        self.inner.write().await.keys.insert(
            (couple_id.to_string(), user_id.to_string()),
            public_key_b64.to_string(),
        );
        Ok(())
    }

    async fn fetch_partner_key(
        &self,
        couple_id: &str,
        user_id: &str,
    ) -> Result<Option<String>, PairingError> {
        let inner = self.inner.read().await;
        Ok(inner
            .keys
            .iter()
            .find(|((cid, uid), _)| cid.as_str() == couple_id && uid.as_str() != user_id)
            .map(|(_, key)| key.clone()))
    }
}

#[async_trait]
impl EncryptedBlobStore for MemoryBackend {
    async fn put(
        &self,
        couple_id: &str,
        logical_key: &str,
        value: &Value,
    ) -> Result<(), PairingError> {
        self.inner
            .write()
            .await
            .blobs
            .insert((couple_id.to_string(), logical_key.to_string()), value.clone());
        Ok(())
    }

    async fn get(
        &self,
        couple_id: &str,
        logical_key: &str,
    ) -> Result<Option<Value>, PairingError> {
        Ok(self
            .inner
            .read()
            .await
            .blobs
            .get(&(couple_id.to_string(), logical_key.to_string()))
            .cloned())
    }
}

//! The two-phase couple pairing handshake.
//!
//! Inviter side:
//!   1. `create_invite` — get-or-create the device keypair, publish the
//!      public key under the couple id, return the QR payload string.
//!   2. `await_partner` — poll the directory until the partner's key
//!      appears, then derive and store the couple key. Bounded by a
//!      deadline; resolves to [`PairingError::Timeout`] rather than hanging.
//!      Dropping the future cancels cleanly: derivation only happens once
//!      the full partner key is in hand, so there is no partial state.
//!
//! Scanner side:
//!   `accept_invite` — decode and validate the scanned payload, publish our
//!   own public key, derive and store immediately (the inviter's key is
//!   right there in the payload — no polling).
//!
//! Couple *membership* (who is linked, owned by the backend) and couple
//! *key material* (whether encryption works yet, owned here) are
//! independent state machines; [`Handshake::pairing_status`] reports the
//! combined view so the UI can render "linked, waiting for partner's key".

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use td_crypto::derive_couple_key;
use td_proto::{decode_payload, encode_payload};
use td_store::{CoupleKeyRing, DeviceKeyStore};

use crate::{backend::PairingDirectory, error::PairingError, gate::SyncGate};

/// Polling knobs for the inviter's wait loop.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// How often to re-query the directory for the partner key.
    pub interval: Duration,
    /// Give up after this long and resolve to `Timeout`.
    pub deadline: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            deadline: Duration::from_secs(180),
        }
    }
}

/// Where a couple stands on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingStatus {
    /// Nothing happened yet for this couple on this device.
    NotPaired,
    /// We published our key but have not derived a couple key — "linked
    /// but not yet encrypted".
    LinkedAwaitingKey,
    /// Couple key derived and stored; the encrypted channel is usable.
    Encrypted,
}

/// Orchestrates the pairing handshake for one device.
pub struct Handshake {
    device_keys: Arc<DeviceKeyStore>,
    ring: Arc<CoupleKeyRing>,
    directory: Arc<dyn PairingDirectory>,
    gate: Arc<dyn SyncGate>,
    /// The local user's backend identity — the directory needs it to return
    /// the *other* member's key.
    user_id: String,
}

impl Handshake {
    pub fn new(
        device_keys: Arc<DeviceKeyStore>,
        ring: Arc<CoupleKeyRing>,
        directory: Arc<dyn PairingDirectory>,
        gate: Arc<dyn SyncGate>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            device_keys,
            ring,
            directory,
            gate,
            user_id: user_id.into(),
        }
    }

    /// Inviter phase 1: publish our public key and produce the QR payload.
    ///
    /// Safe to call repeatedly for the same couple — the keypair is
    /// idempotent and re-publishing overwrites our own directory row.
    pub async fn create_invite(&self, couple_id: &str) -> Result<String, PairingError> {
        self.check_gate()?;
        let public = self.device_keys.get_or_create_public_key()?;
        self.directory
            .publish_public_key(couple_id, &self.user_id, &public.to_b64())
            .await?;
        info!(couple_id, "invite created; public key published");
        Ok(encode_payload(couple_id, &public))
    }

    /// Inviter phase 2: wait for the partner's key, then derive and store.
    ///
    /// Returns `Ok(())` once the couple key is persisted. Resolves to
    /// [`PairingError::Timeout`] if the partner never publishes within
    /// `config.deadline`. Cancel by dropping the future.
    pub async fn await_partner(
        &self,
        couple_id: &str,
        config: PollConfig,
    ) -> Result<(), PairingError> {
        self.check_gate()?;

        // Already derived (e.g. a previous wait completed) — nothing to do.
        if self.ring.get(couple_id)?.is_some() {
            debug!(couple_id, "couple key already present; skipping wait");
            return Ok(());
        }

        let poll = async {
            loop {
                if let Some(key_b64) = self
                    .directory
                    .fetch_partner_key(couple_id, &self.user_id)
                    .await?
                {
                    return self.derive_and_store(couple_id, &key_b64);
                }
                debug!(couple_id, "partner key not published yet");
                tokio::time::sleep(config.interval).await;
            }
        };

        match tokio::time::timeout(config.deadline, poll).await {
            Ok(result) => result,
            Err(_) => {
                warn!(couple_id, deadline_secs = config.deadline.as_secs(), "pairing timed out");
                Err(PairingError::Timeout {
                    waited_secs: config.deadline.as_secs(),
                })
            }
        }
    }

    /// Scanner side: consume a scanned/entered payload, publish our key,
    /// derive and store. Returns the couple id from the payload.
    pub async fn accept_invite(&self, raw_payload: &str) -> Result<String, PairingError> {
        self.check_gate()?;

        let payload = decode_payload(raw_payload)?;
        let public = self.device_keys.get_or_create_public_key()?;
        self.directory
            .publish_public_key(&payload.couple_id, &self.user_id, &public.to_b64())
            .await?;

        let keypair = self.device_keys.keypair_for_derivation()?;
        let couple_key = derive_couple_key(&keypair, &payload.public_key)?;
        self.ring.store(&payload.couple_id, &couple_key)?;
        info!(couple_id = %payload.couple_id, "invite accepted; couple key derived");
        Ok(payload.couple_id)
    }

    /// Combined membership/key-material view for the UI.
    pub fn pairing_status(&self, couple_id: &str) -> Result<PairingStatus, PairingError> {
        if self.ring.get(couple_id)?.is_some() {
            return Ok(PairingStatus::Encrypted);
        }
        if self.device_keys.has_keypair()? {
            return Ok(PairingStatus::LinkedAwaitingKey);
        }
        Ok(PairingStatus::NotPaired)
    }

    /// Explicit unlink: drop the couple key. The device keypair survives,
    /// so re-pairing is just a fresh public-key exchange.
    pub fn unlink(&self, couple_id: &str) -> Result<(), PairingError> {
        self.ring.remove(couple_id)?;
        Ok(())
    }

    fn derive_and_store(&self, couple_id: &str, partner_key_b64: &str) -> Result<(), PairingError> {
        let partner = td_crypto::DevicePublicKey::from_b64(partner_key_b64)?;
        let keypair = self.device_keys.keypair_for_derivation()?;
        let couple_key = derive_couple_key(&keypair, &partner)?;
        self.ring.store(couple_id, &couple_key)?;
        info!(couple_id, "partner key observed; couple key derived");
        Ok(())
    }

    fn check_gate(&self) -> Result<(), PairingError> {
        if self.gate.sync_allowed() {
            Ok(())
        } else {
            Err(PairingError::SyncUnavailable)
        }
    }
}

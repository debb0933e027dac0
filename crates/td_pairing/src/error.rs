use thiserror::Error;

#[derive(Debug, Error)]
pub enum PairingError {
    /// The premium/sync/session gate is closed — pairing and sync entry
    /// points are unavailable until it opens.
    #[error("sync is not available (premium, sync toggle, or session missing)")]
    SyncUnavailable,

    #[error("secure storage error: {0}")]
    Store(#[from] td_store::StoreError),

    #[error("invalid pairing payload: {0}")]
    Payload(#[from] td_proto::PayloadError),

    #[error("crypto error: {0}")]
    Crypto(#[from] td_crypto::CryptoError),

    /// Encrypt/decrypt attempted before derivation completed for this
    /// couple. Surfaced to the user as "waiting for partner", not a crash.
    #[error("no couple key available yet for couple {couple_id}")]
    KeyNotAvailable { couple_id: String },

    /// The partner never published their public key within the deadline.
    /// Recoverable by retrying the whole handshake.
    #[error("pairing timed out after {waited_secs}s waiting for partner key")]
    Timeout { waited_secs: u64 },

    #[error("sync backend error: {0}")]
    Backend(String),
}

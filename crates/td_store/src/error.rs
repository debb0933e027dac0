use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Secure storage is inaccessible. Fatal for any pairing or decryption
    /// operation — callers must never fall back to an insecure store.
    #[error("secure key storage unavailable: {0}")]
    Unavailable(String),

    /// A stored entry exists but its contents do not parse.
    #[error("secure storage entry corrupted: {0}")]
    Corrupted(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] td_crypto::CryptoError),

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

//! The sync availability gate.
//!
//! Whether pairing/sync is available is decided elsewhere (premium
//! entitlement + sync toggle + auth session present) and injected here as a
//! plain predicate. The handshake entry points consult it and fail with
//! [`crate::PairingError::SyncUnavailable`] when closed.

/// Externally-supplied "is sync allowed right now" predicate.
pub trait SyncGate: Send + Sync {
    fn sync_allowed(&self) -> bool;
}

/// Any `Fn() -> bool` closure works as a gate.
impl<F> SyncGate for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn sync_allowed(&self) -> bool {
        self()
    }
}

/// Gate that is always open — offline tests and single-player previews.
pub struct AlwaysAllowed;

impl SyncGate for AlwaysAllowed {
    fn sync_allowed(&self) -> bool {
        true
    }
}

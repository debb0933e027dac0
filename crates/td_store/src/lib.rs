//! td_store — secure local storage for Tandem key material
//!
//! Two kinds of secrets live here, both behind the OS secure store (keychain
//! / credential manager) in production:
//! - the device's long-lived X25519 keypair (one per install, never rotated)
//! - the per-couple derived symmetric key
//!
//! # Modules
//! - `secure` — the `SecureStore` seam: OS-keyring impl + in-memory test impl
//! - `device` — idempotent get-or-create of the device keypair
//! - `couple` — the per-couple symmetric key ring
//! - `error`  — unified error type
//!
//! Storage is injected (never a hidden global), so tests run against
//! [`MemoryStore`] deterministically and the production wiring passes
//! [`KeyringStore`].

pub mod couple;
pub mod device;
pub mod error;
pub mod secure;

pub use couple::{CoupleKeyRing, StoredCoupleKey};
pub use device::DeviceKeyStore;
pub use error::StoreError;
pub use secure::{KeyringStore, MemoryStore, SecureStore};

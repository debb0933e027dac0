//! td_proto — Wire types and serialisation for Tandem couple pairing
//!
//! Two small formats live here:
//! - `payload`  — the QR / invite-code handshake payload (couple id +
//!   device public key), the only data that crosses the out-of-band channel
//! - `envelope` — the at-rest JSON form of one encrypted couple-shared
//!   record (a note, a memory, a mood signal)
//!
//! Both are versioned JSON; unknown keys are ignored for forward
//! compatibility.

pub mod envelope;
pub mod payload;

pub use envelope::{EncryptedEnvelope, ENVELOPE_ALG};
pub use payload::{decode_payload, encode_payload, PairingPayload, PayloadError};

//! # casetrail-cipher
//!
//! Content cipher adapter for sealed event payloads.
//!
//! [`KeyringCipher`] implements
//! [`ContentCipher`](casetrail_core::traits::ContentCipher) with
//! XChaCha20-Poly1305; [`payload::seal`] and [`payload::open`] move JSON
//! payloads in and out of their at-rest `EventData` form.

pub mod keyring;
pub mod payload;

pub use keyring::KeyringCipher;

// ── Tests ─────────────────────────────────────────────────────────────────────

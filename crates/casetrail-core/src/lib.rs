//! # casetrail-core
//!
//! Capability traits and the report state machine for the CASETRAIL case
//! record.
//!
//! This crate provides:
//! - The collaborator traits (`ReportStore`, `PackStore`, `ContentCipher`,
//!   `PackSigner`, `ArtifactStore`, `TextGenerator`)
//! - Status/priority derivation over a chain snapshot
//!
//! ## Usage
//!
//! ```rust,ignore
//! use casetrail_core::{state, traits::ReportStore};
//!
//! let events = store.snapshot(&report_id)?;
//! let derived = state::derive(&events);
//! ```

pub mod state;
pub mod traits;

// ── Tests ─────────────────────────────────────────────────────────────────────

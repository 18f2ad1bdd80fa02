//! # casetrail-service
//!
//! The case service façade over the CASETRAIL case record.
//!
//! [`CaseService`] wires the event chain, verifier, state machine, triage
//! validator, content cipher and defense pack builder behind one API,
//! configured by a TOML [`CaseConfig`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = CaseConfig::from_file(Path::new("casetrail.toml"))?;
//! let service = CaseService::new(config.clone(), Collaborators::local(&config)?)?;
//!
//! let report = service.open_report(intake)?;
//! service.transition(&report.id, ReportStatus::Investigating, ActorRole::Admin)?;
//! let pack = service.build_defense_pack(&report.id, "legal-request")?;
//! ```

pub mod config;
pub mod offline;
pub mod service;

pub use config::CaseConfig;
pub use offline::KeywordTextGenerator;
pub use service::{tracking_code_hash, CaseService, Collaborators};

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Capability traits for the CASETRAIL case record.
//!
//! Every collaborator the core depends on is injected through one of these
//! traits so chain, verification and pack logic run without network access:
//!
//! - `ReportStore`: report registry and per-report append-only chain
//! - `PackStore`: defense pack records
//! - `ContentCipher`: key-by-id payload encryption
//! - `PackSigner`: signs and checks pack manifests
//! - `ArtifactStore`: persists rendered pack documents
//! - `TextGenerator`: external text generation (triage, assessments, policy text)
//!
//! All traits are object safe and `Send + Sync`; callers hold them as
//! `Arc<dyn Trait>`.

use zeroize::Zeroizing;

use casetrail_contracts::{
    error::CaseResult,
    event::{ChainHead, ReportId, TimelineEvent},
    pack::{DefensePack, PackId},
    report::Report,
    verification::ChainVerification,
};

use crate::state::DerivedState;

/// The persistent home of reports and their event chains.
///
/// A report exclusively owns its chain. The only way to extend a chain is
/// `compare_and_append`, which must be atomic: an event is either fully
/// visible with its hash or not visible at all.
pub trait ReportStore: Send + Sync {
    /// Register a new report with an empty chain.
    ///
    /// Fails with `DuplicateReport` when the id or the tracking-code digest
    /// is already registered. The check and the insert are one atomic step.
    fn insert_report(&self, report: Report) -> CaseResult<()>;

    /// Fetch a report with its cached fields.
    fn report(&self, id: &ReportId) -> CaseResult<Report>;

    /// Resolve a reporter tracking-code digest to its report.
    fn find_by_code_hash(&self, code_hash: &str) -> CaseResult<Option<ReportId>>;

    /// The current tip of the report's chain.
    fn head(&self, id: &ReportId) -> CaseResult<ChainHead>;

    /// Append `event` only if the chain head still equals `observed_head`.
    ///
    /// Fails with `ChainWriteConflict` when another writer got there first
    /// and with `IntegrityBroken` when the chain is frozen. On success the
    /// report's cached `evidence_head_hash` becomes `event.event_hash`.
    fn compare_and_append(
        &self,
        id: &ReportId,
        observed_head: &str,
        event: TimelineEvent,
    ) -> CaseResult<ChainHead>;

    /// A consistent copy of the full chain, in append order.
    fn snapshot(&self, id: &ReportId) -> CaseResult<Vec<TimelineEvent>>;

    /// Cache status, priority and category derived from the chain.
    fn record_derived(&self, id: &ReportId, derived: &DerivedState) -> CaseResult<()>;

    /// Cache a verification result. A broken result freezes the chain.
    fn record_verification(&self, id: &ReportId, result: &ChainVerification) -> CaseResult<()>;

    /// Stamp the report as viewed now.
    fn record_view(&self, id: &ReportId) -> CaseResult<()>;
}

/// Storage for defense pack records.
pub trait PackStore: Send + Sync {
    fn insert(&self, pack: DefensePack) -> CaseResult<()>;

    fn get(&self, id: &PackId) -> CaseResult<DefensePack>;

    /// Replace a stored pack. Implementations reject updates that would move
    /// a terminal pack back to `Queued` or to a different terminal status.
    fn update(&self, pack: &DefensePack) -> CaseResult<()>;

    /// All packs of a report, oldest first.
    fn list_for_report(&self, report_id: &ReportId) -> CaseResult<Vec<DefensePack>>;
}

/// Key-by-id payload encryption.
///
/// Key material is never visible here. Unknown ids fail with
/// `KeyUnavailable`.
pub trait ContentCipher: Send + Sync {
    fn encrypt(&self, plaintext: &[u8], key_id: &str) -> CaseResult<Vec<u8>>;

    /// Plaintext is wiped when the returned buffer drops.
    fn decrypt(&self, ciphertext: &[u8], key_id: &str) -> CaseResult<Zeroizing<Vec<u8>>>;
}

/// The private signing capability used for defense packs.
pub trait PackSigner: Send + Sync {
    /// Identifier recorded on packs signed by this signer.
    fn key_id(&self) -> &str;

    /// Hex public key auditors use to check signatures offline.
    fn verifying_key_hex(&self) -> String;

    /// Sign `bytes`. Fails with `SigningUnavailable` when the capability
    /// cannot be reached.
    fn sign(&self, bytes: &[u8]) -> CaseResult<Vec<u8>>;

    fn verify_signature(&self, bytes: &[u8], signature: &[u8]) -> CaseResult<bool>;
}

/// Persists rendered defense pack documents.
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `name` and return a retrievable reference.
    fn put(&self, name: &str, bytes: &[u8]) -> CaseResult<String>;

    fn get(&self, reference: &str) -> CaseResult<Vec<u8>>;
}

/// The external text-generation collaborator.
///
/// Results are opaque to the core. Only the triage classification is
/// admitted to a chain, and only after structural validation.
pub trait TextGenerator: Send + Sync {
    /// Anti-harassment policy clauses for a company's employment rules.
    fn employment_rule(&self, company_name: &str) -> CaseResult<String>;

    /// Narrative risk-assessment document for a report's content.
    fn risk_assessment(&self, content: &str) -> CaseResult<String>;

    /// Raw triage classification JSON
    /// (`{"priority": .., "reason": .., "category": ..}`).
    fn classify(&self, content: &str) -> CaseResult<serde_json::Value>;
}

//! Error types for the CASETRAIL case record.
//!
//! All fallible operations return `CaseResult<T>`. Variants carry enough
//! context for an operator to act on them without re-reading the chain.

use thiserror::Error;

/// The unified error type for the CASETRAIL crates.
#[derive(Debug, Error)]
pub enum CaseError {
    /// A concurrent append advanced the chain head past the head the caller
    /// observed. Refetch the head and retry.
    #[error("chain write conflict on report {report_id}: observed head {observed}, current head {current}")]
    ChainWriteConflict {
        report_id: String,
        observed: String,
        current: String,
    },

    /// Verification found a mismatch. The chain is frozen as evidence and
    /// never repaired.
    #[error("chain integrity broken for report {report_id} at event {broken_at}")]
    IntegrityBroken { report_id: String, broken_at: String },

    /// The content cipher could not resolve the requested key.
    #[error("encryption key '{key_id}' is unavailable")]
    KeyUnavailable { key_id: String },

    /// An illegal lifecycle move was requested. Nothing was written.
    #[error("invalid transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    /// The signing collaborator could not produce or check a signature.
    #[error("signing unavailable: {reason}")]
    SigningUnavailable { reason: String },

    #[error("report {report_id} not found")]
    ReportNotFound { report_id: String },

    #[error("report {report_id} already exists")]
    DuplicateReport { report_id: String },

    #[error("defense pack {pack_id} not found")]
    PackNotFound { pack_id: String },

    /// A triage classification failed structural validation and was not
    /// admitted to the chain.
    #[error("triage classification rejected: {reason}")]
    InvalidTriage { reason: String },

    /// Ciphertext was present and the key resolved, but the payload could
    /// not be opened (corrupt blob, wrong key material).
    #[error("payload unreadable: {reason}")]
    PayloadUnreadable { reason: String },

    /// An event's payload is not in the at-rest form its kind requires
    /// (sealed kinds must arrive sealed, plain kinds plain).
    #[error("payload policy violated for '{kind}': {reason}")]
    PayloadPolicy { kind: String, reason: String },

    #[error("artifact store error: {reason}")]
    ArtifactStore { reason: String },

    /// The text-generation collaborator failed or returned nothing usable.
    #[error("text generation failed: {reason}")]
    Generation { reason: String },

    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// The backing store is unusable (for example a poisoned lock).
    #[error("store error: {reason}")]
    Store { reason: String },
}

impl CaseError {
    /// True for failures the caller is expected to retry: head races and
    /// transient signer outages.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CaseError::ChainWriteConflict { .. } | CaseError::SigningUnavailable { .. }
        )
    }
}

impl From<serde_json::Error> for CaseError {
    fn from(e: serde_json::Error) -> Self {
        CaseError::Serialization {
            reason: e.to_string(),
        }
    }
}

/// Convenience alias used throughout the CASETRAIL crates.
pub type CaseResult<T> = Result<T, CaseError>;

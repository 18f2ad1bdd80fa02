//! Timeline event types.
//!
//! A `TimelineEvent` is one link in a report's hash chain. Every field is
//! persisted verbatim; dropping any of them makes the chain impossible to
//! recompute.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a report, and therefore of its event chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportId(pub uuid::Uuid);

impl ReportId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier of a single timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub uuid::Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The closed set of event kinds a chain may contain.
///
/// The set is exhaustive so the canonical hash encoding is stable: an
/// unknown kind cannot be deserialized, let alone verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// Intake. Carries the sealed subject, content and category.
    ReportCreated,
    /// Drives `received -> investigating`.
    InvestigationStarted,
    /// Any other forward status move; plain payload `{"from": .., "to": ..}`.
    StatusChanged,
    CommentAdded,
    EvidenceAttached,
    /// A validated triage classification.
    TriageAssigned,
    /// Amends an earlier event; payload references the original event id.
    Correction,
    /// System bookkeeping (pack requested, assessment generated, ...).
    AuditMarker,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ReportCreated => "report-created",
            EventKind::InvestigationStarted => "investigation-started",
            EventKind::StatusChanged => "status-changed",
            EventKind::CommentAdded => "comment-added",
            EventKind::EvidenceAttached => "evidence-attached",
            EventKind::TriageAssigned => "triage-assigned",
            EventKind::Correction => "correction",
            EventKind::AuditMarker => "audit-marker",
        }
    }

    /// Whether payloads of this kind are sealed with the report's key at
    /// rest. Status, triage and audit markers stay readable so lifecycle
    /// state can be derived without the cipher.
    pub fn is_sealed(&self) -> bool {
        matches!(
            self,
            EventKind::ReportCreated
                | EventKind::CommentAdded
                | EventKind::EvidenceAttached
                | EventKind::Correction
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who caused an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    User,
    Admin,
    Partner,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::User => "user",
            ActorRole::Admin => "admin",
            ActorRole::Partner => "partner",
            ActorRole::System => "system",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The at-rest representation of an event payload.
///
/// The chain hashes this representation, not the plaintext, so integrity
/// can be checked without any key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "body", rename_all = "snake_case")]
pub enum EventData {
    /// Readable JSON.
    Plain(serde_json::Value),
    /// Cipher output, hex-encoded, with the id of the key that sealed it.
    Sealed { key_id: String, ciphertext: String },
}

impl EventData {
    /// The plain JSON payload, or `None` for sealed data.
    pub fn as_plain(&self) -> Option<&serde_json::Value> {
        match self {
            EventData::Plain(value) => Some(value),
            EventData::Sealed { .. } => None,
        }
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self, EventData::Sealed { .. })
    }
}

/// A single entry in a report's hash chain.
///
/// `event_hash` commits to `prev_event_hash` and the canonical encoding of
/// (`kind`, `actor_role`, `data`, `created_at`). Editing any of them, or
/// re-linking the event, is detected by the chain verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: EventId,

    #[serde(rename = "type")]
    pub kind: EventKind,

    pub actor_role: ActorRole,

    pub data: EventData,

    /// SHA-256 hex of the preceding event, or `GENESIS_HASH` for the first.
    pub prev_event_hash: String,

    /// SHA-256 hex of this event's canonical content.
    pub event_hash: String,

    /// Non-decreasing within a chain.
    pub created_at: DateTime<Utc>,
}

impl TimelineEvent {
    /// The sentinel `prev_event_hash` of the first event in every chain,
    /// and the head digest of an empty chain.
    ///
    /// 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// The observed tip of a chain, used as the compare-and-swap token for
/// appends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    /// `event_hash` of the last event, or `GENESIS_HASH` when empty.
    pub hash: String,
    /// Number of events in the chain.
    pub len: usize,
    /// `created_at` of the last event.
    pub last_created_at: Option<DateTime<Utc>>,
}

impl ChainHead {
    pub fn empty() -> Self {
        Self {
            hash: TimelineEvent::GENESIS_HASH.to_string(),
            len: 0,
            last_created_at: None,
        }
    }

    pub fn of(events: &[TimelineEvent]) -> Self {
        match events.last() {
            Some(last) => Self {
                hash: last.event_hash.clone(),
                len: events.len(),
                last_created_at: Some(last.created_at),
            },
            None => Self::empty(),
        }
    }
}

/// A report's chain as handed to an external auditor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainExport {
    pub report_id: ReportId,
    pub exported_at: DateTime<Utc>,
    pub events: Vec<TimelineEvent>,
}

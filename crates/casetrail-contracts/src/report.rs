//! Report aggregate, lifecycle vocabulary, and triage classification.
//!
//! Status, priority and category on a `Report` are derived from its chain;
//! the stored values are caches, never the source of truth.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{EventId, ReportId};

/// Lifecycle state of a report. Progression is forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Received,
    Investigating,
    InProgress,
    Closed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Received => "received",
            ReportStatus::Investigating => "investigating",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity classification assigned by triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    /// Assumed until the first triage event lands.
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Harassment category assigned by triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Verbal Abuse")]
    VerbalAbuse,
    #[serde(rename = "Sexual Harassment")]
    SexualHarassment,
    #[serde(rename = "Power Abuse")]
    PowerAbuse,
    #[serde(rename = "Retaliation")]
    Retaliation,
    #[serde(rename = "General Complaint")]
    GeneralComplaint,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::VerbalAbuse,
        Category::SexualHarassment,
        Category::PowerAbuse,
        Category::Retaliation,
        Category::GeneralComplaint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::VerbalAbuse => "Verbal Abuse",
            Category::SexualHarassment => "Sexual Harassment",
            Category::PowerAbuse => "Power Abuse",
            Category::Retaliation => "Retaliation",
            Category::GeneralComplaint => "General Complaint",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structurally validated triage result, as recorded in a
/// `triage-assigned` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageClassification {
    pub priority: Priority,
    pub reason: String,
    pub category: Category,
}

/// What a reporter submits through the intake form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportIntake {
    pub tenant_id: String,
    pub subject: Option<String>,
    pub content: String,
    /// Reporter-chosen category, free text. Triage may later override it.
    pub category: Option<String>,
    /// Secret the reporter keeps to look the report up later. Only its
    /// digest is stored.
    pub tracking_code: String,
}

/// A report and its cached, chain-derived fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub tenant_id: String,
    /// SHA-256 hex of the reporter's tracking code.
    pub public_code_hash: String,
    /// Key the report's sealed payloads are encrypted under.
    pub encryption_key_id: String,
    pub created_at: DateTime<Utc>,
    pub status: ReportStatus,
    pub priority: Priority,
    pub category: Option<Category>,
    /// Digest of the latest event as of the last append. An optimization
    /// hint; the verifier's recomputed head wins on disagreement.
    pub evidence_head_hash: String,
    /// Result of the last verification run.
    pub integrity_ok: bool,
    pub last_verified_at: Option<DateTime<Utc>>,
    /// When the decrypted report was last opened.
    #[serde(default)]
    pub last_viewed_at: Option<DateTime<Utc>>,
    /// Set once verification finds a break. A frozen chain accepts no
    /// further appends.
    pub frozen_at: Option<EventId>,
}

impl Report {
    /// A freshly registered report with an empty chain.
    pub fn new(
        tenant_id: impl Into<String>,
        public_code_hash: impl Into<String>,
        encryption_key_id: impl Into<String>,
    ) -> Self {
        Self {
            id: ReportId::new(),
            tenant_id: tenant_id.into(),
            public_code_hash: public_code_hash.into(),
            encryption_key_id: encryption_key_id.into(),
            created_at: Utc::now(),
            status: ReportStatus::Received,
            priority: Priority::default(),
            category: None,
            evidence_head_hash: crate::event::TimelineEvent::GENESIS_HASH.to_string(),
            integrity_ok: true,
            last_verified_at: None,
            last_viewed_at: None,
            frozen_at: None,
        }
    }
}

/// Decrypted view over a report's intake payload.
///
/// Fields are `None` when the payload could not be opened; `unreadable`
/// then carries the reason. Readability never affects chain integrity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportView {
    pub report_id: ReportId,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub unreadable: Option<String>,
}

//! The report state machine.
//!
//! Status and priority are never stored authoritatively. They are derived
//! by scanning a chain:
//!
//!   received → investigating → in_progress → closed
//!
//! The most recent status-defining event decides the status; the most
//! recent triage event decides priority and category. Moves are
//! forward-only. A backward or same-state request is an
//! `InvalidTransition` and nothing is appended.

use serde_json::json;
use tracing::debug;

use casetrail_contracts::{
    error::{CaseError, CaseResult},
    event::{EventId, EventKind, TimelineEvent},
    report::{Category, Priority, ReportStatus, TriageClassification},
};

/// Lifecycle fields derived from one chain snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedState {
    pub status: ReportStatus,
    pub priority: Priority,
    pub category: Option<Category>,
    /// Event that set the current status, if any did.
    pub status_event: Option<EventId>,
    /// Triage event that set the current priority, if any did.
    pub triage_event: Option<EventId>,
}

impl Default for DerivedState {
    fn default() -> Self {
        Self {
            status: ReportStatus::Received,
            priority: Priority::default(),
            category: None,
            status_event: None,
            triage_event: None,
        }
    }
}

/// The status an event moves its report into, if it is status-defining.
///
/// `status-changed` payloads are plain `{"from": .., "to": ..}`; a payload
/// that does not name a known status defines nothing.
pub fn status_target(event: &TimelineEvent) -> Option<ReportStatus> {
    match event.kind {
        EventKind::ReportCreated => Some(ReportStatus::Received),
        EventKind::InvestigationStarted => Some(ReportStatus::Investigating),
        EventKind::StatusChanged => event
            .data
            .as_plain()
            .and_then(|v| v.get("to"))
            .and_then(|to| serde_json::from_value(to.clone()).ok()),
        _ => None,
    }
}

/// The triage classification an event carries, if it is a readable
/// `triage-assigned` event.
pub fn triage_of(event: &TimelineEvent) -> Option<TriageClassification> {
    if event.kind != EventKind::TriageAssigned {
        return None;
    }
    event
        .data
        .as_plain()
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Derive status, priority and category from a chain snapshot.
pub fn derive(events: &[TimelineEvent]) -> DerivedState {
    let mut state = DerivedState::default();

    for event in events {
        if let Some(status) = status_target(event) {
            state.status = status;
            state.status_event = Some(event.id);
        }
        if let Some(triage) = triage_of(event) {
            state.priority = triage.priority;
            state.category = Some(triage.category);
            state.triage_event = Some(event.id);
        }
    }

    debug!(
        status = %state.status,
        priority = %state.priority,
        events = events.len(),
        "derived report state"
    );
    state
}

/// Reject any move that is not strictly forward.
pub fn check_transition(from: ReportStatus, to: ReportStatus) -> CaseResult<()> {
    if to <= from {
        return Err(CaseError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

/// The event kind and plain payload that record a move from `from` to `to`.
///
/// `received → investigating` has its own event kind; every other move is a
/// `status-changed` event.
pub fn transition_event(from: ReportStatus, to: ReportStatus) -> CaseResult<(EventKind, serde_json::Value)> {
    check_transition(from, to)?;
    let kind = if from == ReportStatus::Received && to == ReportStatus::Investigating {
        EventKind::InvestigationStarted
    } else {
        EventKind::StatusChanged
    };
    Ok((kind, json!({ "from": from, "to": to })))
}

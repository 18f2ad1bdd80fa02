//! The event chain writer.
//!
//! An append is two steps: `prepare` observes the head and builds a fully
//! hashed event linked to it; `commit` hands it to the store's
//! compare-and-swap. Splitting them lets callers decide against an observed
//! snapshot (a status check, say) and commit only if nothing moved since.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use casetrail_contracts::{
    error::{CaseError, CaseResult},
    event::{ActorRole, ChainHead, EventData, EventId, EventKind, ReportId, TimelineEvent},
};
use casetrail_core::traits::ReportStore;

use crate::chain::hash_event;

/// A hashed event waiting to be committed on top of `observed_head`.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub report_id: ReportId,
    pub observed_head: String,
    pub event: TimelineEvent,
}

/// Appends events to report chains held by a `ReportStore`.
#[derive(Clone)]
pub struct EventChain {
    store: Arc<dyn ReportStore>,
}

impl EventChain {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Build an event linked to `head` without touching any store.
    ///
    /// `data` must already be in the at-rest form `kind` requires.
    /// `created_at` is clamped so it never precedes the head's timestamp.
    pub fn prepare_on(
        head: &ChainHead,
        report_id: ReportId,
        kind: EventKind,
        actor_role: ActorRole,
        data: EventData,
    ) -> CaseResult<PendingEvent> {
        if kind.is_sealed() != data.is_sealed() {
            return Err(CaseError::PayloadPolicy {
                kind: kind.to_string(),
                reason: if kind.is_sealed() {
                    "payload must be sealed before it is appended".to_string()
                } else {
                    "payload of this kind is never sealed".to_string()
                },
            });
        }

        let now = Utc::now();
        let created_at = match head.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };
        let event_hash = hash_event(&head.hash, kind, actor_role, &data, &created_at);

        Ok(PendingEvent {
            report_id,
            observed_head: head.hash.clone(),
            event: TimelineEvent {
                id: EventId::new(),
                kind,
                actor_role,
                data,
                prev_event_hash: head.hash.clone(),
                event_hash,
                created_at,
            },
        })
    }

    /// Observe the current head of `report_id` and build an event on it.
    pub fn prepare(
        &self,
        report_id: ReportId,
        kind: EventKind,
        actor_role: ActorRole,
        data: EventData,
    ) -> CaseResult<PendingEvent> {
        let head = self.store.head(&report_id)?;
        Self::prepare_on(&head, report_id, kind, actor_role, data)
    }

    /// Commit a prepared event. Fails with `ChainWriteConflict` if the head
    /// moved since it was observed.
    pub fn commit(&self, pending: PendingEvent) -> CaseResult<TimelineEvent> {
        let PendingEvent {
            report_id,
            observed_head,
            event,
        } = pending;

        let head = self
            .store
            .compare_and_append(&report_id, &observed_head, event.clone())?;

        debug!(
            report_id = %report_id,
            event_id = %event.id,
            kind = %event.kind,
            chain_len = head.len,
            head = %head.hash,
            "event appended"
        );
        Ok(event)
    }

    /// Single-attempt append against the head observed right now.
    pub fn append(
        &self,
        report_id: ReportId,
        kind: EventKind,
        actor_role: ActorRole,
        data: EventData,
    ) -> CaseResult<TimelineEvent> {
        let pending = self.prepare(report_id, kind, actor_role, data)?;
        self.commit(pending)
    }

    /// Append, refetching the head and retrying on `ChainWriteConflict` up to
    /// `max_attempts` times in total. Any other error returns immediately.
    pub fn append_with_retry(
        &self,
        report_id: ReportId,
        kind: EventKind,
        actor_role: ActorRole,
        data: EventData,
        max_attempts: u32,
    ) -> CaseResult<TimelineEvent> {
        let mut attempt = 1;
        loop {
            match self.append(report_id, kind, actor_role, data.clone()) {
                Err(CaseError::ChainWriteConflict { .. }) if attempt < max_attempts => {
                    warn!(report_id = %report_id, attempt, "chain head moved; retrying append");
                    attempt += 1;
                }
                Err(e) => return Err(e),
                Ok(event) => {
                    if attempt > 1 {
                        info!(report_id = %report_id, attempt, "append succeeded after retry");
                    }
                    return Ok(event);
                }
            }
        }
    }
}

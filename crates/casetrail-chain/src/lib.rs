//! # casetrail-chain
//!
//! Append-only, SHA-256 hash-chained report timelines.
//!
//! ## Overview
//!
//! Every event appended to a report links to the previous one through its
//! hash. Changing any stored event, even one byte of a sealed payload,
//! breaks the chain and `verify_chain` reports the first event it can no
//! longer trust.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use casetrail_chain::{ChainVerifier, EventChain, InMemoryReportStore};
//!
//! let store = Arc::new(InMemoryReportStore::new());
//! let chain = EventChain::new(store.clone());
//! chain.append(report_id, EventKind::AuditMarker, ActorRole::System, data)?;
//!
//! let result = ChainVerifier::new(store).verify(&report_id)?;
//! assert!(result.integrity_ok);
//! ```

pub mod chain;
pub mod memory;
pub mod verifier;
pub mod writer;

pub use chain::{canonical_content, hash_event, rehash, verify_chain};
pub use memory::InMemoryReportStore;
pub use verifier::ChainVerifier;
pub use writer::{EventChain, PendingEvent};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use chrono::Duration;
    use serde_json::json;

    use casetrail_contracts::{
        error::CaseError,
        event::{ActorRole, EventData, EventKind, ReportId, TimelineEvent},
        report::Report,
        verification::BreakReason,
    };
    use casetrail_core::traits::ReportStore;

    use super::{verify_chain, ChainVerifier, EventChain, InMemoryReportStore};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn setup() -> (Arc<InMemoryReportStore>, EventChain, ReportId) {
        let store = Arc::new(InMemoryReportStore::new());
        let report = Report::new("tenant-1", "code-hash", "key-1");
        let id = report.id;
        store.insert_report(report).unwrap();
        let chain = EventChain::new(store.clone());
        (store, chain, id)
    }

    fn marker(n: u64) -> EventData {
        EventData::Plain(json!({ "marker": n }))
    }

    fn sealed(blob: &str) -> EventData {
        EventData::Sealed {
            key_id: "key-1".to_string(),
            ciphertext: blob.to_string(),
        }
    }

    fn append_markers(chain: &EventChain, id: ReportId, n: u64) -> Vec<TimelineEvent> {
        (0..n)
            .map(|i| {
                chain
                    .append(id, EventKind::AuditMarker, ActorRole::System, marker(i))
                    .unwrap()
            })
            .collect()
    }

    // ── Append ────────────────────────────────────────────────────────────────

    /// The first event links to the sentinel; each later one to its parent.
    #[test]
    fn test_events_link_to_parent() {
        let (store, chain, id) = setup();
        let events = append_markers(&chain, id, 3);

        assert_eq!(events[0].prev_event_hash, TimelineEvent::GENESIS_HASH);
        assert_eq!(events[1].prev_event_hash, events[0].event_hash);
        assert_eq!(events[2].prev_event_hash, events[1].event_hash);
        assert_eq!(store.snapshot(&id).unwrap(), events);
    }

    /// Appending updates the cached evidence head.
    #[test]
    fn test_append_updates_cached_head() {
        let (store, chain, id) = setup();
        assert_eq!(
            store.report(&id).unwrap().evidence_head_hash,
            TimelineEvent::GENESIS_HASH
        );
        let events = append_markers(&chain, id, 2);
        assert_eq!(store.report(&id).unwrap().evidence_head_hash, events[1].event_hash);
    }

    /// Timestamps never go backwards, even if the clock does.
    #[test]
    fn test_created_at_is_clamped_to_head() {
        let (_store, chain, id) = setup();
        let first = append_markers(&chain, id, 1).remove(0);

        let mut future_head = casetrail_contracts::event::ChainHead::of(&[first.clone()]);
        let ahead = first.created_at + Duration::hours(1);
        future_head.last_created_at = Some(ahead);

        let pending = EventChain::prepare_on(
            &future_head,
            id,
            EventKind::AuditMarker,
            ActorRole::System,
            marker(9),
        )
        .unwrap();
        assert_eq!(pending.event.created_at, ahead);
    }

    /// Sealed kinds must arrive sealed; plain kinds must not be sealed.
    #[test]
    fn test_payload_policy_is_enforced() {
        let (store, chain, id) = setup();

        let err = chain
            .append(id, EventKind::CommentAdded, ActorRole::Admin, marker(0))
            .unwrap_err();
        assert!(matches!(err, CaseError::PayloadPolicy { .. }));

        let err = chain
            .append(id, EventKind::TriageAssigned, ActorRole::System, sealed("00"))
            .unwrap_err();
        assert!(matches!(err, CaseError::PayloadPolicy { .. }));

        assert!(store.snapshot(&id).unwrap().is_empty(), "rejected appends write nothing");
    }

    #[test]
    fn test_append_to_unknown_report() {
        let (_store, chain, _id) = setup();
        let err = chain
            .append(ReportId::new(), EventKind::AuditMarker, ActorRole::System, marker(0))
            .unwrap_err();
        assert!(matches!(err, CaseError::ReportNotFound { .. }));
    }

    /// Tracking-code digests are unique across reports, checked inside the
    /// insert itself.
    #[test]
    fn test_duplicate_code_hash_is_rejected() {
        let (store, _chain, id) = setup();
        let err = store
            .insert_report(Report::new("tenant-2", "code-hash", "key-2"))
            .unwrap_err();
        assert!(matches!(err, CaseError::DuplicateReport { ref report_id } if *report_id == id.to_string()));
        assert_eq!(store.find_by_code_hash("code-hash").unwrap(), Some(id));

        store
            .insert_report(Report::new("tenant-2", "other-hash", "key-2"))
            .unwrap();
    }

    /// Concurrent inserts with one code hash register exactly one report.
    #[test]
    fn test_concurrent_inserts_with_one_code_hash() {
        for _ in 0..20 {
            let store = Arc::new(InMemoryReportStore::new());
            let barrier = Arc::new(Barrier::new(8));
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = store.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        store.insert_report(Report::new("tenant-1", "same", "key-1")).is_ok()
                    })
                })
                .collect();
            let registered = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count();
            assert_eq!(registered, 1);
        }
    }

    #[test]
    fn test_record_view_stamps_report() {
        let (store, _chain, id) = setup();
        assert!(store.report(&id).unwrap().last_viewed_at.is_none());
        store.record_view(&id).unwrap();
        assert!(store.report(&id).unwrap().last_viewed_at.is_some());
        assert!(matches!(
            store.record_view(&ReportId::new()).unwrap_err(),
            CaseError::ReportNotFound { .. }
        ));
    }

    // ── Concurrency ───────────────────────────────────────────────────────────

    /// Two writers observing the same head: one wins, one conflicts, and the
    /// loser succeeds after refetching.
    #[test]
    fn test_concurrent_append_conflict_and_retry() {
        let (store, chain, id) = setup();
        append_markers(&chain, id, 1);

        let a = chain
            .prepare(id, EventKind::AuditMarker, ActorRole::System, marker(10))
            .unwrap();
        let b = chain
            .prepare(id, EventKind::AuditMarker, ActorRole::Admin, marker(11))
            .unwrap();
        assert_eq!(a.observed_head, b.observed_head);

        let winner = chain.commit(a).unwrap();
        let err = chain.commit(b).unwrap_err();
        match err {
            CaseError::ChainWriteConflict { observed, current, .. } => {
                assert_ne!(observed, current);
                assert_eq!(current, winner.event_hash);
            }
            other => panic!("expected ChainWriteConflict, got {:?}", other),
        }

        let retried = chain
            .append(id, EventKind::AuditMarker, ActorRole::Admin, marker(11))
            .unwrap();
        assert_eq!(retried.prev_event_hash, winner.event_hash);

        let events = store.snapshot(&id).unwrap();
        assert_eq!(events.len(), 3);
        assert!(verify_chain(&events).integrity_ok);
    }

    /// Many threads appending with retry produce one linear, valid chain.
    #[test]
    fn test_threaded_appends_stay_linear() {
        let (store, chain, id) = setup();
        let writers = 8;
        let per_writer = 10;
        let barrier = Arc::new(Barrier::new(writers));

        let handles: Vec<_> = (0..writers)
            .map(|w| {
                let chain = chain.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..per_writer {
                        chain
                            .append_with_retry(
                                id,
                                EventKind::AuditMarker,
                                ActorRole::System,
                                marker((w * 100 + i) as u64),
                                u32::MAX,
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let events = store.snapshot(&id).unwrap();
        assert_eq!(events.len(), writers * per_writer);
        let result = verify_chain(&events);
        assert!(result.integrity_ok);
        assert_eq!(result.head_hash, events.last().unwrap().event_hash);
    }

    /// A frozen chain is not a conflict; retrying must not mask it.
    #[test]
    fn test_retry_does_not_mask_frozen_chain() {
        let (store, chain, id) = setup();
        append_markers(&chain, id, 1);

        let snapshot = store.snapshot(&id).unwrap();
        let mut broken = verify_chain(&snapshot);
        broken.integrity_ok = false;
        broken.broken_at = Some(snapshot[0].id);
        store.record_verification(&id, &broken).unwrap();

        let err = chain
            .append_with_retry(id, EventKind::AuditMarker, ActorRole::System, marker(1), 5)
            .unwrap_err();
        assert!(matches!(err, CaseError::IntegrityBroken { .. }));
    }

    // ── Verification ──────────────────────────────────────────────────────────

    /// Empty chains verify with the sentinel head.
    #[test]
    fn test_verify_empty() {
        let result = verify_chain(&[]);
        assert!(result.integrity_ok);
        assert_eq!(result.head_hash, TimelineEvent::GENESIS_HASH);
        assert!(result.broken_at.is_none());
    }

    /// A valid chain verifies and its head is the last event's hash.
    #[test]
    fn test_hash_chain_integrity() {
        let (store, chain, id) = setup();
        let events = append_markers(&chain, id, 3);

        let result = ChainVerifier::new(store).verify(&id).unwrap();
        assert!(result.integrity_ok);
        assert_eq!(result.head_hash, events[2].event_hash);
        assert_eq!(result.verified_count, 3);
    }

    /// Replacing B's payload while leaving its hash and C's link untouched
    /// breaks the chain at B.
    #[test]
    fn test_tampered_payload_breaks_at_that_event() {
        let (store, chain, id) = setup();
        let a = chain
            .append(id, EventKind::ReportCreated, ActorRole::User, sealed("aa"))
            .unwrap();
        let b = chain
            .append(id, EventKind::CommentAdded, ActorRole::Admin, sealed("bb"))
            .unwrap();
        chain
            .append(id, EventKind::CommentAdded, ActorRole::Admin, sealed("cc"))
            .unwrap();

        store
            .tamper(&id, 1, |event| event.data = sealed("ff"))
            .unwrap();

        let result = ChainVerifier::new(store).verify(&id).unwrap();
        assert!(!result.integrity_ok);
        assert_eq!(result.broken_at, Some(b.id));
        assert_eq!(result.break_reason, Some(BreakReason::HashMismatch));
        assert_eq!(result.verified_count, 1);
        assert_eq!(result.trusted_head, a.event_hash);
    }

    /// Mutating any single field of any event is detected at that event,
    /// however many events follow it.
    #[test]
    fn test_every_field_mutation_is_detected() {
        type Mutation = fn(&mut TimelineEvent);
        let mutations: [(&str, Mutation); 5] = [
            ("kind", |e| e.kind = EventKind::Correction),
            ("actor_role", |e| e.actor_role = ActorRole::Partner),
            ("data", |e| e.data = EventData::Plain(json!({ "marker": "forged" }))),
            ("created_at", |e| e.created_at = e.created_at + Duration::nanoseconds(1)),
            ("event_hash", |e| e.event_hash = "ab".repeat(32)),
        ];

        for target in 0..5 {
            for (field, mutate) in mutations.iter() {
                let (store, chain, id) = setup();
                let events = append_markers(&chain, id, 5);
                store.tamper(&id, target, *mutate).unwrap();

                let result = verify_chain(&store.snapshot(&id).unwrap());
                assert!(!result.integrity_ok, "{field} at {target} undetected");
                assert_eq!(
                    result.broken_at,
                    Some(events[target].id),
                    "{field} at {target} blamed the wrong event"
                );
            }
        }
    }

    /// Re-linking an event is reported as a link break; re-linking the first
    /// event as a genesis break.
    #[test]
    fn test_link_tampering() {
        let (store, chain, id) = setup();
        let events = append_markers(&chain, id, 3);

        store
            .tamper(&id, 2, |e| e.prev_event_hash = "cd".repeat(32))
            .unwrap();
        let result = verify_chain(&store.snapshot(&id).unwrap());
        assert_eq!(result.broken_at, Some(events[2].id));
        assert_eq!(result.break_reason, Some(BreakReason::LinkMismatch));

        let (store, chain, id) = setup();
        let events = append_markers(&chain, id, 2);
        store
            .tamper(&id, 0, |e| e.prev_event_hash = "cd".repeat(32))
            .unwrap();
        let result = verify_chain(&store.snapshot(&id).unwrap());
        assert_eq!(result.broken_at, Some(events[0].id));
        assert_eq!(result.break_reason, Some(BreakReason::GenesisMismatch));
    }

    /// Ids are not hashed: the chain verifies the same after ids are
    /// reassigned, and only position and content decide the head.
    #[test]
    fn test_event_ids_are_outside_the_digest() {
        let (store, chain, id) = setup();
        let events = append_markers(&chain, id, 3);
        let (first, last) = (events[0].id, events[2].id);

        store.tamper(&id, 0, |e| e.id = last).unwrap();
        store.tamper(&id, 2, |e| e.id = first).unwrap();

        let result = verify_chain(&store.snapshot(&id).unwrap());
        assert!(result.integrity_ok);
        assert_eq!(result.head_hash, events[2].event_hash);
        assert_eq!(store.snapshot(&id).unwrap()[0].event_hash, events[0].event_hash);
    }

    /// Verification is deterministic and side-effect free.
    #[test]
    fn test_verify_is_idempotent() {
        let (store, chain, id) = setup();
        append_markers(&chain, id, 4);
        let verifier = ChainVerifier::new(store.clone());

        let first = verifier.verify(&id).unwrap();
        let second = verifier.verify(&id).unwrap();
        assert_eq!(first, second);
        assert!(store.report(&id).unwrap().last_verified_at.is_none());
    }

    /// Prefix verification ignores later appends and reports short chains.
    #[test]
    fn test_verify_prefix() {
        let (store, chain, id) = setup();
        let events = append_markers(&chain, id, 3);
        let verifier = ChainVerifier::new(store);

        let prefix = verifier.verify_prefix(&id, 2).unwrap().unwrap();
        assert!(prefix.integrity_ok);
        assert_eq!(prefix.head_hash, events[1].event_hash);

        append_markers(&chain, id, 2);
        let again = verifier.verify_prefix(&id, 2).unwrap().unwrap();
        assert_eq!(again.head_hash, prefix.head_hash);

        assert!(verifier.verify_prefix(&id, 10).unwrap().is_none());
    }

    /// Recording a broken result freezes the chain against further appends.
    #[test]
    fn test_broken_chain_is_frozen() {
        let (store, chain, id) = setup();
        let events = append_markers(&chain, id, 2);
        store.tamper(&id, 0, |e| e.data = marker(99)).unwrap();

        let result = ChainVerifier::new(store.clone()).verify(&id).unwrap();
        store.record_verification(&id, &result).unwrap();

        let report = store.report(&id).unwrap();
        assert!(!report.integrity_ok);
        assert_eq!(report.frozen_at, Some(events[0].id));

        let err = chain
            .append(id, EventKind::AuditMarker, ActorRole::System, marker(3))
            .unwrap_err();
        assert!(matches!(err, CaseError::IntegrityBroken { .. }));
    }
}

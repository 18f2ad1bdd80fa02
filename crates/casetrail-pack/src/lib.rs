//! # casetrail-pack
//!
//! Signed, re-verifiable defense packs.
//!
//! A defense pack freezes a verified prefix of a report's chain: the
//! builder verifies the chain, signs a manifest binding the head digest to
//! the report, the snapshot size and the request reason, renders an
//! auditable document, and stores it. Anyone holding the document, the
//! exported chain and the public key can re-run the check with
//! [`audit::audit_export`].
//!
//! ```rust,ignore
//! let builder = DefensePackBuilder::new(reports, packs, signer, artifacts);
//! let pack = builder.build(&report_id, "legal-request")?;
//! assert!(builder.reverify(&pack.id)?);
//! ```

pub mod artifact;
pub mod audit;
pub mod builder;
pub mod render;
pub mod signer;
pub mod store;

pub use artifact::{FsArtifactStore, InMemoryArtifactStore};
pub use audit::{audit_export, AuditOutcome};
pub use builder::DefensePackBuilder;
pub use signer::{verify_detached, Ed25519PackSigner};
pub use store::InMemoryPackStore;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use serde_json::json;

    use casetrail_chain::{verify_chain, EventChain, InMemoryReportStore};
    use casetrail_contracts::{
        error::{CaseError, CaseResult},
        event::{ActorRole, EventData, EventKind, ReportId},
        pack::PackStatus,
        report::Report,
    };
    use casetrail_core::traits::{ArtifactStore, PackSigner, PackStore, ReportStore};

    use super::*;

    // ── Fakes ─────────────────────────────────────────────────────────────────

    /// Deterministic signer that counts calls and can be switched off.
    struct CountingSigner {
        inner: Ed25519PackSigner,
        calls: AtomicUsize,
        available: bool,
    }

    impl CountingSigner {
        fn new(available: bool) -> Self {
            Self {
                inner: Ed25519PackSigner::from_seed("pack-signer-test", [42u8; 32]),
                calls: AtomicUsize::new(0),
                available,
            }
        }
    }

    impl PackSigner for CountingSigner {
        fn key_id(&self) -> &str {
            self.inner.key_id()
        }

        fn verifying_key_hex(&self) -> String {
            self.inner.verifying_key_hex()
        }

        fn sign(&self, bytes: &[u8]) -> CaseResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.available {
                return Err(CaseError::SigningUnavailable {
                    reason: "hsm offline".to_string(),
                });
            }
            self.inner.sign(bytes)
        }

        fn verify_signature(&self, bytes: &[u8], signature: &[u8]) -> CaseResult<bool> {
            self.inner.verify_signature(bytes, signature)
        }
    }

    struct BrokenArtifactStore;

    impl ArtifactStore for BrokenArtifactStore {
        fn put(&self, _name: &str, _bytes: &[u8]) -> CaseResult<String> {
            Err(CaseError::ArtifactStore {
                reason: "disk full".to_string(),
            })
        }

        fn get(&self, reference: &str) -> CaseResult<Vec<u8>> {
            Err(CaseError::ArtifactStore {
                reason: format!("no artifact at '{}'", reference),
            })
        }
    }

    // ── Harness ───────────────────────────────────────────────────────────────

    struct Harness {
        reports: Arc<InMemoryReportStore>,
        packs: Arc<InMemoryPackStore>,
        signer: Arc<CountingSigner>,
        artifacts: Arc<InMemoryArtifactStore>,
        chain: EventChain,
        report_id: ReportId,
    }

    impl Harness {
        fn new(events: u64) -> Self {
            Self::with_signer(events, true)
        }

        fn with_signer(events: u64, signer_available: bool) -> Self {
            let reports = Arc::new(InMemoryReportStore::new());
            let report = Report::new("tenant-1", "code-hash", "key-1");
            let report_id = report.id;
            reports.insert_report(report).unwrap();
            let chain = EventChain::new(reports.clone());

            let harness = Self {
                reports,
                packs: Arc::new(InMemoryPackStore::new()),
                signer: Arc::new(CountingSigner::new(signer_available)),
                artifacts: Arc::new(InMemoryArtifactStore::new()),
                chain,
                report_id,
            };
            harness.append(events);
            harness
        }

        fn append(&self, n: u64) {
            for i in 0..n {
                self.chain
                    .append(
                        self.report_id,
                        EventKind::AuditMarker,
                        ActorRole::System,
                        EventData::Plain(json!({ "step": i })),
                    )
                    .unwrap();
            }
        }

        fn builder(&self) -> DefensePackBuilder {
            DefensePackBuilder::new(
                self.reports.clone(),
                self.packs.clone(),
                self.signer.clone(),
                self.artifacts.clone(),
            )
        }
    }

    // ── Build ─────────────────────────────────────────────────────────────────

    /// A valid five-event chain yields a generated, verifiable pack.
    #[test]
    fn test_build_on_valid_chain() {
        let h = Harness::new(5);
        let pack = h.builder().build(&h.report_id, "legal-request").unwrap();

        let verification = verify_chain(&h.reports.snapshot(&h.report_id).unwrap());
        assert_eq!(pack.status, PackStatus::Generated);
        assert_eq!(pack.events_count, 5);
        assert_eq!(pack.stored_head, verification.head_hash);
        assert!(pack.verify_ok);

        let manifest = pack.manifest().unwrap();
        let signature = hex::decode(pack.signature.as_deref().unwrap()).unwrap();
        assert!(h
            .signer
            .verify_signature(&manifest.signing_bytes().unwrap(), &signature)
            .unwrap());

        assert_eq!(h.packs.get(&pack.id).unwrap().status, PackStatus::Generated);
    }

    /// The stored document embeds the head, the signature and every event.
    #[test]
    fn test_document_is_stored_and_auditable() {
        let h = Harness::new(3);
        let pack = h.builder().build(&h.report_id, "audit").unwrap();

        let document = h.artifacts.get(pack.pdf_path.as_deref().unwrap()).unwrap();
        let document = String::from_utf8(document).unwrap();
        assert!(document.contains(&pack.stored_head));
        assert!(document.contains(pack.signature.as_deref().unwrap()));
        assert!(document.contains(&h.signer.verifying_key_hex()));
        for event in h.reports.snapshot(&h.report_id).unwrap() {
            assert!(document.contains(&event.event_hash));
        }
    }

    /// A broken chain yields a failed pack and the signer is never called.
    #[test]
    fn test_build_on_broken_chain_never_signs() {
        let h = Harness::new(4);
        let events = h.reports.snapshot(&h.report_id).unwrap();
        h.reports
            .tamper(&h.report_id, 2, |e| e.data = EventData::Plain(json!({ "step": "forged" })))
            .unwrap();

        let pack = h.builder().build(&h.report_id, "legal-request").unwrap();
        assert_eq!(pack.status, PackStatus::Failed);
        assert!(pack.signature.is_none());
        assert!(pack.failure.as_deref().unwrap().contains(&events[2].id.to_string()));
        assert_eq!(h.signer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.packs.get(&pack.id).unwrap().status, PackStatus::Failed);
    }

    /// An unavailable signer surfaces as an error and leaves the pack failed.
    #[test]
    fn test_signing_unavailable_leaves_pack_failed() {
        let h = Harness::with_signer(2, false);
        let err = h.builder().build(&h.report_id, "legal-request").unwrap_err();
        assert!(matches!(err, CaseError::SigningUnavailable { .. }));

        let packs = h.packs.list_for_report(&h.report_id).unwrap();
        assert_eq!(packs.len(), 1);
        assert_eq!(packs[0].status, PackStatus::Failed);
        assert!(packs[0].signature.is_none());
    }

    #[test]
    fn test_artifact_failure_leaves_pack_failed() {
        let h = Harness::new(2);
        let builder = DefensePackBuilder::new(
            h.reports.clone(),
            h.packs.clone(),
            h.signer.clone(),
            Arc::new(BrokenArtifactStore),
        );
        let err = builder.build(&h.report_id, "audit").unwrap_err();
        assert!(matches!(err, CaseError::ArtifactStore { .. }));
        let packs = h.packs.list_for_report(&h.report_id).unwrap();
        assert_eq!(packs[0].status, PackStatus::Failed);
    }

    #[test]
    fn test_unknown_report_creates_no_pack() {
        let h = Harness::new(1);
        let stranger = ReportId::new();
        let err = h.builder().build(&stranger, "audit").unwrap_err();
        assert!(matches!(err, CaseError::ReportNotFound { .. }));
        assert!(h.packs.list_for_report(&stranger).unwrap().is_empty());
    }

    // ── Re-verification ───────────────────────────────────────────────────────

    /// Appends after the pack do not change its re-verification result.
    #[test]
    fn test_reverify_is_stable_across_appends() {
        let h = Harness::new(3);
        let builder = h.builder();
        let pack = builder.build(&h.report_id, "legal-request").unwrap();

        assert!(builder.reverify(&pack.id).unwrap());
        h.append(4);
        assert!(builder.reverify(&pack.id).unwrap());

        let stored = h.packs.get(&pack.id).unwrap();
        assert_eq!(stored.computed_head, stored.stored_head);
        assert_eq!(stored.events_count, 3);
    }

    /// Tampering inside the boundary flips verify_ok but not the status;
    /// tampering beyond it is irrelevant to the pack.
    #[test]
    fn test_reverify_detects_tampering_inside_boundary_only() {
        let h = Harness::new(3);
        let builder = h.builder();
        let pack = builder.build(&h.report_id, "legal-request").unwrap();
        h.append(2);

        h.reports
            .tamper(&h.report_id, 4, |e| e.data = EventData::Plain(json!({ "late": true })))
            .unwrap();
        assert!(builder.reverify(&pack.id).unwrap());

        h.reports
            .tamper(&h.report_id, 1, |e| e.data = EventData::Plain(json!({ "early": true })))
            .unwrap();
        assert!(!builder.reverify(&pack.id).unwrap());

        let stored = h.packs.get(&pack.id).unwrap();
        assert!(!stored.verify_ok);
        assert_ne!(stored.computed_head, stored.stored_head);
        assert_eq!(stored.status, PackStatus::Generated);
    }

    #[test]
    fn test_reverify_of_failed_pack_is_false() {
        let h = Harness::with_signer(2, false);
        let _ = h.builder().build(&h.report_id, "audit");
        let pack = h.packs.list_for_report(&h.report_id).unwrap().remove(0);
        assert!(!h.builder().reverify(&pack.id).unwrap());
    }

    #[test]
    fn test_reverify_unknown_pack() {
        let h = Harness::new(1);
        let err = h
            .builder()
            .reverify(&casetrail_contracts::pack::PackId::new())
            .unwrap_err();
        assert!(matches!(err, CaseError::PackNotFound { .. }));
    }

    // ── Offline audit ─────────────────────────────────────────────────────────

    #[test]
    fn test_offline_audit_of_export() {
        let h = Harness::new(4);
        let pack = h.builder().build(&h.report_id, "legal-request").unwrap();
        h.append(1);
        let mut events = h.reports.snapshot(&h.report_id).unwrap();
        let key = h.signer.verifying_key_hex();

        let outcome = audit_export(&events, &pack, &key).unwrap();
        assert!(outcome.ok, "problems: {:?}", outcome.problems);

        let other_key = Ed25519PackSigner::from_seed("other", [1u8; 32]).verifying_key_hex();
        let outcome = audit_export(&events, &pack, &other_key).unwrap();
        assert!(!outcome.ok);
        assert!(!outcome.signature_valid);
        assert!(outcome.head_matches);

        events[0].actor_role = ActorRole::Admin;
        let outcome = audit_export(&events, &pack, &key).unwrap();
        assert!(!outcome.ok);
        assert!(!outcome.head_matches);

        let outcome = audit_export(&events[..2], &pack, &key).unwrap();
        assert!(outcome.chain.is_none());
        assert!(!outcome.ok);
    }

    // ── Signer ────────────────────────────────────────────────────────────────

    #[test]
    fn test_detached_verification() {
        let signer = Ed25519PackSigner::generate("k");
        let sig = hex::encode(signer.sign(b"payload").unwrap());
        let key = signer.verifying_key_hex();

        assert!(verify_detached(&key, b"payload", &sig).unwrap());
        assert!(!verify_detached(&key, b"payload!", &sig).unwrap());
        assert!(!verify_detached(&key, b"payload", "zz").unwrap());
        assert!(matches!(
            verify_detached("abcd", b"payload", &sig).unwrap_err(),
            CaseError::SigningUnavailable { .. }
        ));
    }

    #[test]
    fn test_seeded_signer_is_deterministic() {
        let a = Ed25519PackSigner::from_hex_seed("k", &"07".repeat(32)).unwrap();
        let b = Ed25519PackSigner::from_seed("k", [7u8; 32]);
        assert_eq!(a.verifying_key_hex(), b.verifying_key_hex());
        assert!(Ed25519PackSigner::from_hex_seed("k", "07").is_err());
    }

    // ── Stores ────────────────────────────────────────────────────────────────

    #[test]
    fn test_pack_store_freezes_terminal_packs() {
        let h = Harness::new(2);
        let pack = h.builder().build(&h.report_id, "audit").unwrap();

        let mut regressed = pack.clone();
        regressed.status = PackStatus::Queued;
        assert!(matches!(
            h.packs.update(&regressed).unwrap_err(),
            CaseError::InvalidTransition { .. }
        ));

        let mut rewritten = pack.clone();
        rewritten.stored_head = "00".repeat(32);
        assert!(h.packs.update(&rewritten).is_err());

        let mut reverified = pack.clone();
        reverified.record_reverification(pack.stored_head.clone(), true);
        h.packs.update(&reverified).unwrap();
    }

    #[test]
    fn test_packs_listed_per_report() {
        let h = Harness::new(2);
        let builder = h.builder();
        let first = builder.build(&h.report_id, "audit").unwrap();
        h.append(1);
        let second = builder.build(&h.report_id, "legal-request").unwrap();

        let packs = h.packs.list_for_report(&h.report_id).unwrap();
        assert_eq!(packs.len(), 2);
        assert!(packs[0].created_at <= packs[1].created_at);
        let find = |id| packs.iter().find(|p| p.id == id).unwrap();
        assert_eq!(find(first.id).events_count, 2);
        assert_eq!(find(second.id).events_count, 3);
    }

    #[test]
    fn test_fs_artifact_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("packs")).unwrap();

        let reference = store.put("defense-pack-1.txt", b"document").unwrap();
        assert_eq!(store.get(&reference).unwrap(), b"document");
        assert!(store.put("../escape.txt", b"x").is_err());
        assert!(store.get("/etc/hostname").is_err());
    }

    /// A reference that starts under the root but climbs out with `..` is
    /// refused, even though the file it names exists.
    #[test]
    fn test_fs_artifact_store_refuses_parent_segments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"outside root").unwrap();
        let root = dir.path().join("packs");
        let store = FsArtifactStore::new(&root).unwrap();

        let escaping = format!("{}/../secret.txt", root.display());
        assert!(matches!(store.get(&escaping), Err(CaseError::ArtifactStore { .. })));

        let reference = store.put("kept.txt", b"inside").unwrap();
        assert_eq!(store.get(&reference).unwrap(), b"inside");
    }

    #[test]
    fn test_build_with_fs_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let h = Harness::new(2);
        let artifacts = Arc::new(FsArtifactStore::new(dir.path()).unwrap());
        let builder =
            DefensePackBuilder::new(h.reports.clone(), h.packs.clone(), h.signer.clone(), artifacts.clone());

        let pack = builder.build(&h.report_id, "audit").unwrap();
        let path = pack.pdf_path.clone().unwrap();
        assert!(std::path::Path::new(&path).starts_with(dir.path()));
        let document = String::from_utf8(artifacts.get(&path).unwrap()).unwrap();
        assert!(document.contains(&pack.stored_head));
    }
}

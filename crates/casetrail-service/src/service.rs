//! The case service façade.
//!
//! `CaseService` is the only entry point the portal needs. It owns no
//! state of its own: reports, chains and packs live in the injected stores,
//! and status, priority and category are re-derived from the chain after
//! every write.
//!
//! Per-call pipeline for a write:
//!
//!   1. Build the payload (sealed with the report's key when the kind requires it)
//!   2. Append through the event chain, retrying lost head races
//!   3. Re-derive and cache status / priority / category

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use casetrail_chain::{ChainVerifier, EventChain};
use casetrail_cipher::{payload, KeyringCipher};
use casetrail_contracts::{
    error::{CaseError, CaseResult},
    event::{ActorRole, ChainExport, ChainHead, EventData, EventId, EventKind, ReportId, TimelineEvent},
    pack::{DefensePack, PackId, PackStatus},
    report::{Report, ReportIntake, ReportStatus, ReportView, TriageClassification},
    verification::ChainVerification,
};
use casetrail_core::{
    state::{derive, transition_event, DerivedState},
    traits::{ArtifactStore, ContentCipher, PackSigner, PackStore, ReportStore, TextGenerator},
};
use casetrail_pack::{
    DefensePackBuilder, Ed25519PackSigner, FsArtifactStore, InMemoryArtifactStore, InMemoryPackStore,
};
use casetrail_triage::TriageValidator;

use crate::{config::CaseConfig, offline::KeywordTextGenerator};

// ── Collaborators ─────────────────────────────────────────────────────────────

/// Everything the service delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub reports: Arc<dyn ReportStore>,
    pub packs: Arc<dyn PackStore>,
    pub cipher: Arc<dyn ContentCipher>,
    pub signer: Arc<dyn PackSigner>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub generator: Arc<dyn TextGenerator>,
}

impl Collaborators {
    /// In-process collaborators built from `config`: in-memory stores, a
    /// keyring cipher over `[cipher.keys]`, an Ed25519 signer and the
    /// offline text generator.
    pub fn local(config: &CaseConfig) -> CaseResult<Self> {
        let mut cipher = KeyringCipher::new();
        for (key_id, key_hex) in &config.cipher.keys {
            cipher = cipher.with_hex_key(key_id.clone(), key_hex)?;
        }

        let signer = match &config.pack.signer_seed_hex {
            Some(seed) => Ed25519PackSigner::from_hex_seed(config.pack.signer_key_id.clone(), seed)?,
            None => Ed25519PackSigner::generate(config.pack.signer_key_id.clone()),
        };

        let artifacts: Arc<dyn ArtifactStore> = match &config.pack.artifact_dir {
            Some(dir) => Arc::new(FsArtifactStore::new(dir.clone())?),
            None => Arc::new(InMemoryArtifactStore::new()),
        };

        Ok(Self {
            reports: Arc::new(casetrail_chain::InMemoryReportStore::new()),
            packs: Arc::new(InMemoryPackStore::new()),
            cipher: Arc::new(cipher),
            signer: Arc::new(signer),
            artifacts,
            generator: Arc::new(KeywordTextGenerator::new()),
        })
    }
}

/// SHA-256 hex of a reporter's tracking code, the only form it is stored in.
pub fn tracking_code_hash(tracking_code: &str) -> String {
    hex::encode(Sha256::digest(tracking_code.as_bytes()))
}

// ── Service ───────────────────────────────────────────────────────────────────

pub struct CaseService {
    config: CaseConfig,
    reports: Arc<dyn ReportStore>,
    packs: Arc<dyn PackStore>,
    cipher: Arc<dyn ContentCipher>,
    signer: Arc<dyn PackSigner>,
    generator: Arc<dyn TextGenerator>,
    chain: EventChain,
    verifier: ChainVerifier,
    builder: DefensePackBuilder,
    triage: TriageValidator,
}

impl CaseService {
    pub fn new(config: CaseConfig, collaborators: Collaborators) -> CaseResult<Self> {
        config.validate()?;
        let Collaborators {
            reports,
            packs,
            cipher,
            signer,
            artifacts,
            generator,
        } = collaborators;

        Ok(Self {
            chain: EventChain::new(reports.clone()),
            verifier: ChainVerifier::new(reports.clone()),
            builder: DefensePackBuilder::new(reports.clone(), packs.clone(), signer.clone(), artifacts),
            triage: TriageValidator::new()?,
            config,
            reports,
            packs,
            cipher,
            signer,
            generator,
        })
    }

    pub fn config(&self) -> &CaseConfig {
        &self.config
    }

    /// Key id recorded on packs this service signs.
    pub fn signer_key_id(&self) -> &str {
        self.signer.key_id()
    }

    /// Public key external auditors check pack signatures with.
    pub fn verifying_key_hex(&self) -> String {
        self.signer.verifying_key_hex()
    }

    // ── Intake ────────────────────────────────────────────────────────────────

    /// Register a report and record its sealed `report-created` event.
    ///
    /// The payload is sealed before anything is stored, so a missing key
    /// leaves no half-registered report behind.
    pub fn open_report(&self, intake: ReportIntake) -> CaseResult<Report> {
        let kind = EventKind::ReportCreated;
        if intake.content.trim().is_empty() {
            return Err(CaseError::PayloadPolicy {
                kind: kind.to_string(),
                reason: "report content is empty".to_string(),
            });
        }
        if intake.tracking_code.trim().is_empty() {
            return Err(CaseError::PayloadPolicy {
                kind: kind.to_string(),
                reason: "tracking code is empty".to_string(),
            });
        }

        // Early exit before sealing. The store re-checks under its own lock,
        // which is what keeps concurrent intakes from sharing a code.
        let code_hash = tracking_code_hash(&intake.tracking_code);
        if let Some(existing) = self.reports.find_by_code_hash(&code_hash)? {
            return Err(CaseError::DuplicateReport {
                report_id: existing.to_string(),
            });
        }

        let key_id = self.config.cipher.default_key_id.clone();
        let data = payload::seal(
            self.cipher.as_ref(),
            &key_id,
            &json!({
                "subject": intake.subject,
                "content": intake.content,
                "category": intake.category,
            }),
        )?;

        let report = Report::new(intake.tenant_id, code_hash, key_id);
        let report_id = report.id;
        self.reports.insert_report(report)?;
        self.append(report_id, kind, ActorRole::User, data)?;

        info!(report_id = %report_id, "report opened");
        self.reports.report(&report_id)
    }

    /// Look a report up by the reporter's tracking code.
    pub fn find_by_tracking_code(&self, tracking_code: &str) -> CaseResult<Option<Report>> {
        match self.reports.find_by_code_hash(&tracking_code_hash(tracking_code))? {
            Some(id) => self.reports.report(&id).map(Some),
            None => Ok(None),
        }
    }

    // ── Timeline writes ───────────────────────────────────────────────────────

    pub fn add_comment(&self, report_id: &ReportId, actor: ActorRole, text: &str) -> CaseResult<TimelineEvent> {
        let data = self.seal_for(report_id, &json!({ "text": text }))?;
        self.append(*report_id, EventKind::CommentAdded, actor, data)
    }

    /// Record an evidence file by name and SHA-256 fingerprint. The file
    /// itself is stored elsewhere; the chain binds its digest.
    pub fn attach_evidence(
        &self,
        report_id: &ReportId,
        actor: ActorRole,
        name: &str,
        bytes: &[u8],
    ) -> CaseResult<TimelineEvent> {
        let data = self.seal_for(
            report_id,
            &json!({
                "name": name,
                "sha256": hex::encode(Sha256::digest(bytes)),
                "size": bytes.len(),
            }),
        )?;
        self.append(*report_id, EventKind::EvidenceAttached, actor, data)
    }

    /// Amend an earlier event. The original stays in the chain untouched;
    /// the correction references it by id.
    pub fn add_correction(
        &self,
        report_id: &ReportId,
        actor: ActorRole,
        corrects: EventId,
        note: &str,
    ) -> CaseResult<TimelineEvent> {
        let events = self.reports.snapshot(report_id)?;
        if !events.iter().any(|e| e.id == corrects) {
            return Err(CaseError::PayloadPolicy {
                kind: EventKind::Correction.to_string(),
                reason: format!("event {} is not part of report {}", corrects, report_id),
            });
        }
        let data = self.seal_for(report_id, &json!({ "corrects": corrects, "note": note }))?;
        self.append(*report_id, EventKind::Correction, actor, data)
    }

    // ── Triage ────────────────────────────────────────────────────────────────

    /// Validate a raw classification and record it as `triage-assigned`.
    /// Rejected input never reaches the chain.
    pub fn record_triage(&self, report_id: &ReportId, raw: &Value) -> CaseResult<TriageClassification> {
        let classification = self.triage.validate(raw)?;
        let body = serde_json::to_value(&classification)?;
        self.append(*report_id, EventKind::TriageAssigned, ActorRole::System, EventData::Plain(body))?;
        info!(
            report_id = %report_id,
            priority = %classification.priority,
            category = %classification.category,
            "triage recorded"
        );
        Ok(classification)
    }

    /// Ask the text generator to classify the report's content, then record
    /// the result through `record_triage`.
    pub fn triage_with_generator(&self, report_id: &ReportId) -> CaseResult<TriageClassification> {
        let content = self.readable_content(report_id)?;
        let raw = self.generator.classify(&content)?;
        self.record_triage(report_id, &raw)
    }

    /// Generate a risk assessment. The text itself is not stored; an
    /// `audit-marker` records its digest.
    pub fn risk_assessment(&self, report_id: &ReportId) -> CaseResult<String> {
        let content = self.readable_content(report_id)?;
        let text = self.generator.risk_assessment(&content)?;
        let digest = hex::encode(Sha256::digest(text.as_bytes()));
        self.append(
            *report_id,
            EventKind::AuditMarker,
            ActorRole::System,
            EventData::Plain(json!({
                "action": "risk-assessment-generated",
                "sha256": digest,
            })),
        )?;
        Ok(text)
    }

    /// Generate anti-harassment clauses for `company_name`'s employment
    /// rules.
    ///
    /// The document belongs to the tenant rather than to any report, so
    /// there is no chain to mark; its digest is logged instead.
    pub fn employment_rule(&self, company_name: &str) -> CaseResult<String> {
        let company_name = company_name.trim();
        if company_name.is_empty() {
            return Err(CaseError::Generation {
                reason: "company name is empty".to_string(),
            });
        }
        let text = self.generator.employment_rule(company_name)?;
        let digest = hex::encode(Sha256::digest(text.as_bytes()));
        info!(company = %company_name, sha256 = %digest, "employment rule generated");
        Ok(text)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Move a report forward to `target`.
    ///
    /// The current status is derived from a snapshot and the event is
    /// committed against that snapshot's head, so a concurrent move cannot
    /// slip in between the check and the write. On a lost race the check is
    /// redone against the new chain.
    pub fn transition(
        &self,
        report_id: &ReportId,
        target: ReportStatus,
        actor: ActorRole,
    ) -> CaseResult<TimelineEvent> {
        let limit = self.config.chain.append_retry_limit;
        let mut attempt = 1;
        loop {
            let events = self.reports.snapshot(report_id)?;
            let current = derive(&events).status;
            let (kind, body) = transition_event(current, target)?;
            let pending =
                EventChain::prepare_on(&ChainHead::of(&events), *report_id, kind, actor, EventData::Plain(body))?;

            match self.chain.commit(pending) {
                Err(CaseError::ChainWriteConflict { .. }) if attempt < limit => {
                    warn!(report_id = %report_id, attempt, "status moved underneath transition; rechecking");
                    attempt += 1;
                }
                Err(e) => return Err(e),
                Ok(event) => {
                    self.refresh_derived(report_id)?;
                    info!(report_id = %report_id, from = %current, to = %target, "report status changed");
                    return Ok(event);
                }
            }
        }
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// The report with its chain-derived fields refreshed.
    pub fn report(&self, report_id: &ReportId) -> CaseResult<Report> {
        self.refresh_derived(report_id)?;
        self.reports.report(report_id)
    }

    /// Decrypted view of the intake payload.
    ///
    /// A payload that cannot be opened yields a view with `unreadable` set
    /// rather than an error, and leaves integrity state alone.
    pub fn report_view(&self, report_id: &ReportId) -> CaseResult<ReportView> {
        let events = self.reports.snapshot(report_id)?;
        self.reports.record_view(report_id)?;
        let mut view = ReportView {
            report_id: *report_id,
            subject: None,
            content: None,
            category: None,
            unreadable: None,
        };

        let Some(intake) = events.iter().find(|e| e.kind == EventKind::ReportCreated) else {
            view.unreadable = Some("chain has no report-created event".to_string());
            return Ok(view);
        };

        match payload::open(self.cipher.as_ref(), &intake.data) {
            Ok(value) => {
                let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
                view.subject = field("subject");
                view.content = field("content");
                view.category = field("category");
            }
            Err(e @ (CaseError::KeyUnavailable { .. } | CaseError::PayloadUnreadable { .. })) => {
                warn!(report_id = %report_id, error = %e, "intake payload unreadable");
                view.unreadable = Some(e.to_string());
            }
            Err(e) => return Err(e),
        }
        Ok(view)
    }

    /// Plaintext payload of any event, decrypting sealed ones.
    pub fn read_payload(&self, event: &TimelineEvent) -> CaseResult<Value> {
        payload::open(self.cipher.as_ref(), &event.data)
    }

    pub fn export_chain(&self, report_id: &ReportId) -> CaseResult<ChainExport> {
        let events = self.reports.snapshot(report_id)?;
        info!(report_id = %report_id, events = events.len(), "chain exported");
        Ok(ChainExport {
            report_id: *report_id,
            exported_at: Utc::now(),
            events,
        })
    }

    // ── Integrity ─────────────────────────────────────────────────────────────

    /// Verify the chain and cache the result on the report. A break freezes
    /// the chain against further appends.
    pub fn check_integrity(&self, report_id: &ReportId) -> CaseResult<ChainVerification> {
        let result = self.verifier.verify(report_id)?;
        self.reports.record_verification(report_id, &result)?;
        Ok(result)
    }

    /// `check_integrity`, failing with `IntegrityBroken` on a break.
    pub fn require_intact(&self, report_id: &ReportId) -> CaseResult<ChainVerification> {
        let result = self.check_integrity(report_id)?;
        match result.broken_at {
            Some(broken_at) => Err(CaseError::IntegrityBroken {
                report_id: report_id.to_string(),
                broken_at: broken_at.to_string(),
            }),
            None => Ok(result),
        }
    }

    // ── Defense packs ─────────────────────────────────────────────────────────

    /// Build a defense pack.
    ///
    /// A generated pack is followed by an `audit-marker` beyond its
    /// boundary. If that marker cannot be appended the error is returned;
    /// the pack itself stays stored and is listed by `list_packs`. A pack
    /// that failed on a broken chain also records the verification,
    /// freezing the chain.
    pub fn build_defense_pack(&self, report_id: &ReportId, reason_code: &str) -> CaseResult<DefensePack> {
        let pack = self.builder.build(report_id, reason_code)?;

        if pack.status == PackStatus::Generated {
            let marker = json!({
                "action": "defense-pack-generated",
                "pack_id": pack.id.to_string(),
                "stored_head": pack.stored_head,
                "events_count": pack.events_count,
                "reason_code": reason_code,
            });
            if let Err(e) = self.append(*report_id, EventKind::AuditMarker, ActorRole::System, EventData::Plain(marker)) {
                warn!(report_id = %report_id, pack_id = %pack.id, error = %e, "pack generated but its audit marker was not recorded");
                return Err(e);
            }
        } else {
            self.check_integrity(report_id)?;
        }
        Ok(pack)
    }

    pub fn reverify_pack(&self, pack_id: &PackId) -> CaseResult<bool> {
        self.builder.reverify(pack_id)
    }

    pub fn pack(&self, pack_id: &PackId) -> CaseResult<DefensePack> {
        self.packs.get(pack_id)
    }

    pub fn list_packs(&self, report_id: &ReportId) -> CaseResult<Vec<DefensePack>> {
        self.packs.list_for_report(report_id)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn append(
        &self,
        report_id: ReportId,
        kind: EventKind,
        actor: ActorRole,
        data: EventData,
    ) -> CaseResult<TimelineEvent> {
        let event =
            self.chain
                .append_with_retry(report_id, kind, actor, data, self.config.chain.append_retry_limit)?;
        self.refresh_derived(&report_id)?;
        Ok(event)
    }

    fn refresh_derived(&self, report_id: &ReportId) -> CaseResult<DerivedState> {
        let derived = derive(&self.reports.snapshot(report_id)?);
        self.reports.record_derived(report_id, &derived)?;
        Ok(derived)
    }

    fn seal_for(&self, report_id: &ReportId, value: &Value) -> CaseResult<EventData> {
        let report = self.reports.report(report_id)?;
        payload::seal(self.cipher.as_ref(), &report.encryption_key_id, value)
    }

    fn readable_content(&self, report_id: &ReportId) -> CaseResult<String> {
        let view = self.report_view(report_id)?;
        match (view.content, view.unreadable) {
            (Some(content), _) => Ok(content),
            (None, reason) => Err(CaseError::PayloadUnreadable {
                reason: reason.unwrap_or_else(|| "intake payload has no content".to_string()),
            }),
        }
    }
}

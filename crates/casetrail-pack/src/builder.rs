//! The defense pack builder.
//!
//! `build` runs, in order:
//!
//!   queue → verify snapshot → freeze boundary + head → sign → render/store → generated
//!
//! A pack is never signed over a chain that fails self-verification, and
//! never marked generated without a real signature. Any failure after the
//! pack is queued leaves it `failed`, never half-generated.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use casetrail_chain::{verify_chain, ChainVerifier};
use casetrail_contracts::{
    error::{CaseError, CaseResult},
    event::ReportId,
    pack::{DefensePack, PackId, PackManifest, PackStatus},
};
use casetrail_core::traits::{ArtifactStore, PackSigner, PackStore, ReportStore};

use crate::render::{artifact_name, render_document, SignatureBlock};

pub struct DefensePackBuilder {
    reports: Arc<dyn ReportStore>,
    packs: Arc<dyn PackStore>,
    signer: Arc<dyn PackSigner>,
    artifacts: Arc<dyn ArtifactStore>,
    verifier: ChainVerifier,
}

impl DefensePackBuilder {
    pub fn new(
        reports: Arc<dyn ReportStore>,
        packs: Arc<dyn PackStore>,
        signer: Arc<dyn PackSigner>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        let verifier = ChainVerifier::new(reports.clone());
        Self {
            reports,
            packs,
            signer,
            artifacts,
            verifier,
        }
    }

    /// Build a defense pack for `report_id`.
    ///
    /// # Outcomes
    ///
    /// - Intact chain, signer and store available → `Ok`, status `generated`.
    /// - Broken chain → `Ok`, status `failed`, `failure` naming the break
    ///   point. The signer is never called.
    /// - Signer failure → pack left `failed`, `Err(SigningUnavailable)`.
    /// - Artifact store failure → pack left `failed`, the store's error.
    pub fn build(&self, report_id: &ReportId, reason_code: &str) -> CaseResult<DefensePack> {
        // Unknown reports get no pack record at all.
        self.reports.report(report_id)?;

        let mut pack = DefensePack::new_queued(*report_id, reason_code);
        self.packs.insert(pack.clone())?;
        info!(pack_id = %pack.id, report_id = %report_id, reason_code, "defense pack queued");

        // One snapshot serves both verification and the pack boundary, so a
        // concurrent append can never slip between them.
        let events = self.reports.snapshot(report_id)?;
        let verification = verify_chain(&events);

        if !verification.integrity_ok {
            let broken_at = verification
                .broken_at
                .map(|id| id.to_string())
                .unwrap_or_default();
            pack.events_count = events.len();
            pack.computed_head = verification.head_hash.clone();
            let reason = format!(
                "chain integrity broken at event {} ({:?}); {} of {} events verified",
                broken_at,
                verification.break_reason,
                verification.verified_count,
                verification.events_checked
            );
            warn!(pack_id = %pack.id, report_id = %report_id, broken_at = %broken_at, "refusing to sign a broken chain");
            self.fail(&mut pack, reason)?;
            return Ok(pack);
        }

        let manifest = PackManifest {
            pack_id: pack.id,
            report_id: *report_id,
            stored_head: verification.head_hash.clone(),
            events_count: events.len(),
            reason_code: reason_code.to_string(),
            generated_at: Utc::now(),
        };

        let signature = match manifest
            .signing_bytes()
            .and_then(|bytes| self.signer.sign(&bytes))
        {
            Ok(signature) => hex::encode(signature),
            Err(e) => {
                warn!(pack_id = %pack.id, error = %e, "signing failed; pack left failed");
                self.fail(&mut pack, format!("signing failed: {}", e))?;
                return Err(match e {
                    CaseError::SigningUnavailable { .. } => e,
                    other => CaseError::SigningUnavailable {
                        reason: other.to_string(),
                    },
                });
            }
        };

        let key_id = self.signer.key_id().to_string();
        let verifying_key_hex = self.signer.verifying_key_hex();
        let document = render_document(
            &manifest,
            &events,
            &SignatureBlock {
                signature_hex: &signature,
                key_id: &key_id,
                verifying_key_hex: &verifying_key_hex,
            },
        );
        let pdf_path = match self.artifacts.put(&artifact_name(&manifest), document.as_bytes()) {
            Ok(reference) => reference,
            Err(e) => {
                warn!(pack_id = %pack.id, error = %e, "artifact store failed; pack left failed");
                self.fail(&mut pack, format!("artifact store failed: {}", e))?;
                return Err(e);
            }
        };

        pack.mark_generated(&manifest, signature, key_id, pdf_path)?;
        self.packs.update(&pack)?;

        info!(
            pack_id = %pack.id,
            report_id = %report_id,
            events_count = pack.events_count,
            stored_head = %pack.stored_head,
            "defense pack generated"
        );
        Ok(pack)
    }

    /// Re-check a pack against the chain as it existed at the pack's
    /// boundary, and re-check its signature.
    ///
    /// Only events with index `< events_count` are considered, so later
    /// appends never change the result. The outcome is recorded on the pack
    /// (`computed_head`, `verify_ok`); its status is untouched. Packs that
    /// never reached `generated` have nothing to re-verify and return
    /// `false` unchanged.
    pub fn reverify(&self, pack_id: &PackId) -> CaseResult<bool> {
        let mut pack = self.packs.get(pack_id)?;
        if pack.status != PackStatus::Generated {
            warn!(pack_id = %pack_id, status = %pack.status, "pack was never generated; nothing to re-verify");
            return Ok(false);
        }

        let (computed_head, chain_ok) = match self.verifier.verify_prefix(&pack.report_id, pack.events_count)? {
            Some(result) => (result.head_hash, result.integrity_ok),
            None => (String::new(), false),
        };
        let head_ok = computed_head == pack.stored_head;
        let signature_ok = self.signature_valid(&pack)?;
        let ok = chain_ok && head_ok && signature_ok;

        pack.record_reverification(computed_head, ok);
        self.packs.update(&pack)?;

        if ok {
            info!(pack_id = %pack_id, "defense pack re-verified");
        } else {
            warn!(pack_id = %pack_id, chain_ok, head_ok, signature_ok, "defense pack failed re-verification");
        }
        Ok(ok)
    }

    fn signature_valid(&self, pack: &DefensePack) -> CaseResult<bool> {
        let (Some(manifest), Some(signature)) = (pack.manifest(), pack.signature.as_deref()) else {
            return Ok(false);
        };
        if pack.signer_key_id.as_deref() != Some(self.signer.key_id()) {
            warn!(
                pack_id = %pack.id,
                signer_key_id = ?pack.signer_key_id,
                current_key_id = %self.signer.key_id(),
                "pack was signed by a different key"
            );
            return Ok(false);
        }
        let Ok(signature) = hex::decode(signature) else {
            return Ok(false);
        };
        self.signer.verify_signature(&manifest.signing_bytes()?, &signature)
    }

    fn fail(&self, pack: &mut DefensePack, reason: String) -> CaseResult<()> {
        pack.mark_failed(reason)?;
        self.packs.update(pack)
    }
}

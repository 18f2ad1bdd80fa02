//! Defense pack types.
//!
//! A `DefensePack` freezes a verified prefix of a report's chain. It is
//! created `Queued`, reaches exactly one terminal status, and afterwards
//! only its re-verification fields change.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{CaseError, CaseResult},
    event::ReportId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackId(pub uuid::Uuid);

impl PackId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for PackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackStatus {
    Queued,
    Generated,
    Failed,
}

impl PackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackStatus::Queued => "queued",
            PackStatus::Generated => "generated",
            PackStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The exact statement a pack signature commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackManifest {
    pub pack_id: PackId,
    pub report_id: ReportId,
    pub stored_head: String,
    pub events_count: usize,
    pub reason_code: String,
    pub generated_at: DateTime<Utc>,
}

impl PackManifest {
    /// Domain separator prepended to the signed bytes.
    pub const DOMAIN: &'static [u8] = b"casetrail:defense-pack:v1\n";

    /// The byte string handed to the signer: the domain separator followed
    /// by compact JSON of the manifest (field order fixed by the struct).
    pub fn signing_bytes(&self) -> CaseResult<Vec<u8>> {
        let mut bytes = Self::DOMAIN.to_vec();
        bytes.extend(serde_json::to_vec(self)?);
        Ok(bytes)
    }
}

/// An immutable, signed export bound to one report at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefensePack {
    pub id: PackId,
    pub report_id: ReportId,
    pub status: PackStatus,
    /// Why the pack was requested (e.g. `"legal-request"`).
    pub reason_code: String,
    /// Snapshot boundary: events with index `< events_count` are covered.
    pub events_count: usize,
    /// Head digest recorded at generation.
    pub stored_head: String,
    /// Head digest recomputed by the last (re-)verification.
    pub computed_head: String,
    pub verify_ok: bool,
    /// Hex signature over `PackManifest::signing_bytes`. Present only on
    /// generated packs.
    pub signature: Option<String>,
    pub signer_key_id: Option<String>,
    /// Reference returned by the artifact store.
    pub pdf_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub generated_at: Option<DateTime<Utc>>,
    pub last_verified_at: Option<DateTime<Utc>>,
    /// Why the pack failed, including the chain break point if any.
    pub failure: Option<String>,
}

impl DefensePack {
    pub fn new_queued(report_id: ReportId, reason_code: impl Into<String>) -> Self {
        Self {
            id: PackId::new(),
            report_id,
            status: PackStatus::Queued,
            reason_code: reason_code.into(),
            events_count: 0,
            stored_head: String::new(),
            computed_head: String::new(),
            verify_ok: false,
            signature: None,
            signer_key_id: None,
            pdf_path: None,
            created_at: Utc::now(),
            generated_at: None,
            last_verified_at: None,
            failure: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != PackStatus::Queued
    }

    /// Rebuild the signed statement of a generated pack.
    pub fn manifest(&self) -> Option<PackManifest> {
        let generated_at = self.generated_at?;
        Some(PackManifest {
            pack_id: self.id,
            report_id: self.report_id,
            stored_head: self.stored_head.clone(),
            events_count: self.events_count,
            reason_code: self.reason_code.clone(),
            generated_at,
        })
    }

    fn ensure_queued(&self, to: PackStatus) -> CaseResult<()> {
        if self.is_terminal() {
            return Err(CaseError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    /// Move a queued pack to `Generated`. The manifest must be the one the
    /// signature was produced over.
    pub fn mark_generated(
        &mut self,
        manifest: &PackManifest,
        signature: String,
        signer_key_id: String,
        pdf_path: String,
    ) -> CaseResult<()> {
        self.ensure_queued(PackStatus::Generated)?;
        self.status = PackStatus::Generated;
        self.events_count = manifest.events_count;
        self.stored_head = manifest.stored_head.clone();
        self.computed_head = manifest.stored_head.clone();
        self.verify_ok = true;
        self.signature = Some(signature);
        self.signer_key_id = Some(signer_key_id);
        self.pdf_path = Some(pdf_path);
        self.generated_at = Some(manifest.generated_at);
        self.last_verified_at = Some(manifest.generated_at);
        Ok(())
    }

    /// Move a queued pack to `Failed`.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> CaseResult<()> {
        self.ensure_queued(PackStatus::Failed)?;
        self.status = PackStatus::Failed;
        self.verify_ok = false;
        self.failure = Some(reason.into());
        Ok(())
    }

    /// Attach a re-verification result. Never touches `status`.
    pub fn record_reverification(&mut self, computed_head: String, ok: bool) {
        self.computed_head = computed_head;
        self.verify_ok = ok;
        self.last_verified_at = Some(Utc::now());
    }
}

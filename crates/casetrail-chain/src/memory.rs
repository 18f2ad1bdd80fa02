//! In-memory implementation of `ReportStore`.
//!
//! `InMemoryReportStore` keeps every report and its chain in a `HashMap`
//! behind an `RwLock`. Appends take the write lock for the whole
//! compare-and-swap, so an event is either fully visible with its hash or
//! not at all. Snapshots take the read lock only long enough to clone.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::Utc;
use tracing::{debug, warn};

use casetrail_contracts::{
    error::{CaseError, CaseResult},
    event::{ChainHead, ReportId, TimelineEvent},
    report::Report,
    verification::ChainVerification,
};
use casetrail_core::{state::DerivedState, traits::ReportStore};

// ── Internal state ────────────────────────────────────────────────────────────

pub(crate) struct ReportEntry {
    pub(crate) report: Report,
    /// Append order; index `i` is the `i`-th event of the chain.
    pub(crate) events: Vec<TimelineEvent>,
}

// ── Public store ──────────────────────────────────────────────────────────────

/// An in-memory report registry with one append-only chain per report.
///
/// Cloning is cheap and every clone observes the same reports.
#[derive(Clone, Default)]
pub struct InMemoryReportStore {
    pub(crate) state: Arc<RwLock<HashMap<ReportId, ReportEntry>>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> CaseResult<RwLockReadGuard<'_, HashMap<ReportId, ReportEntry>>> {
        self.state.read().map_err(|e| CaseError::Store {
            reason: format!("report store lock poisoned: {}", e),
        })
    }

    fn write(&self) -> CaseResult<RwLockWriteGuard<'_, HashMap<ReportId, ReportEntry>>> {
        self.state.write().map_err(|e| CaseError::Store {
            reason: format!("report store lock poisoned: {}", e),
        })
    }

    /// Mutate a stored event in place, bypassing the chain.
    ///
    /// Nothing in the append path calls this. It reproduces storage-level
    /// tampering for drills and tests.
    pub fn tamper(
        &self,
        id: &ReportId,
        index: usize,
        f: impl FnOnce(&mut TimelineEvent),
    ) -> CaseResult<()> {
        let mut state = self.write()?;
        let entry = state.get_mut(id).ok_or_else(|| not_found(id))?;
        let event = entry.events.get_mut(index).ok_or_else(|| CaseError::Store {
            reason: format!("report {} has no event at index {}", id, index),
        })?;
        f(event);
        warn!(report_id = %id, index, "stored event mutated outside the append path");
        Ok(())
    }
}

fn not_found(id: &ReportId) -> CaseError {
    CaseError::ReportNotFound {
        report_id: id.to_string(),
    }
}

// ── ReportStore impl ──────────────────────────────────────────────────────────

impl ReportStore for InMemoryReportStore {
    fn insert_report(&self, report: Report) -> CaseResult<()> {
        let mut state = self.write()?;
        if state.contains_key(&report.id) {
            return Err(CaseError::DuplicateReport {
                report_id: report.id.to_string(),
            });
        }
        // Tracking codes are unique. Checked under the same write lock as the
        // insert so two intakes with one code cannot both register.
        if let Some(existing) = state
            .values()
            .find(|entry| entry.report.public_code_hash == report.public_code_hash)
        {
            return Err(CaseError::DuplicateReport {
                report_id: existing.report.id.to_string(),
            });
        }
        debug!(report_id = %report.id, tenant_id = %report.tenant_id, "report registered");
        state.insert(
            report.id,
            ReportEntry {
                report,
                events: Vec::new(),
            },
        );
        Ok(())
    }

    fn report(&self, id: &ReportId) -> CaseResult<Report> {
        let state = self.read()?;
        state
            .get(id)
            .map(|entry| entry.report.clone())
            .ok_or_else(|| not_found(id))
    }

    fn find_by_code_hash(&self, code_hash: &str) -> CaseResult<Option<ReportId>> {
        let state = self.read()?;
        Ok(state
            .values()
            .find(|entry| entry.report.public_code_hash == code_hash)
            .map(|entry| entry.report.id))
    }

    fn head(&self, id: &ReportId) -> CaseResult<ChainHead> {
        let state = self.read()?;
        let entry = state.get(id).ok_or_else(|| not_found(id))?;
        Ok(ChainHead::of(&entry.events))
    }

    fn compare_and_append(
        &self,
        id: &ReportId,
        observed_head: &str,
        event: TimelineEvent,
    ) -> CaseResult<ChainHead> {
        let mut state = self.write()?;
        let entry = state.get_mut(id).ok_or_else(|| not_found(id))?;

        if let Some(broken_at) = entry.report.frozen_at {
            return Err(CaseError::IntegrityBroken {
                report_id: id.to_string(),
                broken_at: broken_at.to_string(),
            });
        }

        let current = ChainHead::of(&entry.events);
        if current.hash != observed_head || event.prev_event_hash != observed_head {
            debug!(
                report_id = %id,
                observed = %observed_head,
                current = %current.hash,
                "append lost the head race"
            );
            return Err(CaseError::ChainWriteConflict {
                report_id: id.to_string(),
                observed: observed_head.to_string(),
                current: current.hash,
            });
        }

        entry.report.evidence_head_hash = event.event_hash.clone();
        entry.events.push(event);
        Ok(ChainHead::of(&entry.events))
    }

    fn snapshot(&self, id: &ReportId) -> CaseResult<Vec<TimelineEvent>> {
        let state = self.read()?;
        state
            .get(id)
            .map(|entry| entry.events.clone())
            .ok_or_else(|| not_found(id))
    }

    fn record_derived(&self, id: &ReportId, derived: &DerivedState) -> CaseResult<()> {
        let mut state = self.write()?;
        let entry = state.get_mut(id).ok_or_else(|| not_found(id))?;
        entry.report.status = derived.status;
        entry.report.priority = derived.priority;
        entry.report.category = derived.category;
        Ok(())
    }

    fn record_verification(&self, id: &ReportId, result: &ChainVerification) -> CaseResult<()> {
        let mut state = self.write()?;
        let entry = state.get_mut(id).ok_or_else(|| not_found(id))?;
        entry.report.integrity_ok = result.integrity_ok;
        entry.report.last_verified_at = Some(Utc::now());
        if entry.report.frozen_at.is_none() {
            entry.report.frozen_at = result.broken_at;
        }
        Ok(())
    }

    fn record_view(&self, id: &ReportId) -> CaseResult<()> {
        let mut state = self.write()?;
        let entry = state.get_mut(id).ok_or_else(|| not_found(id))?;
        entry.report.last_viewed_at = Some(Utc::now());
        Ok(())
    }
}

//! Store-backed chain verification.
//!
//! `ChainVerifier` loads a read snapshot and hands it to `verify_chain`.
//! It never writes: recording the result is the caller's decision.

use std::sync::Arc;

use tracing::{info, warn};

use casetrail_contracts::{error::CaseResult, event::ReportId, verification::ChainVerification};
use casetrail_core::traits::ReportStore;

use crate::chain::verify_chain;

#[derive(Clone)]
pub struct ChainVerifier {
    store: Arc<dyn ReportStore>,
}

impl ChainVerifier {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Verify the full chain of `report_id` as of now.
    pub fn verify(&self, report_id: &ReportId) -> CaseResult<ChainVerification> {
        let events = self.store.snapshot(report_id)?;
        let result = verify_chain(&events);
        log_result(report_id, &result);
        Ok(result)
    }

    /// Verify only the first `count` events, the boundary a defense pack
    /// was built at. `None` when the chain holds fewer than `count` events.
    pub fn verify_prefix(
        &self,
        report_id: &ReportId,
        count: usize,
    ) -> CaseResult<Option<ChainVerification>> {
        let events = self.store.snapshot(report_id)?;
        if events.len() < count {
            warn!(
                report_id = %report_id,
                expected = count,
                actual = events.len(),
                "chain is shorter than the requested prefix"
            );
            return Ok(None);
        }
        let result = verify_chain(&events[..count]);
        log_result(report_id, &result);
        Ok(Some(result))
    }
}

fn log_result(report_id: &ReportId, result: &ChainVerification) {
    match result.broken_at {
        None => info!(
            report_id = %report_id,
            events = result.events_checked,
            head = %result.head_hash,
            "chain verified"
        ),
        Some(broken_at) => warn!(
            report_id = %report_id,
            broken_at = %broken_at,
            reason = ?result.break_reason,
            trusted = result.verified_count,
            "chain integrity broken"
        ),
    }
}

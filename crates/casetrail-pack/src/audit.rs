//! Offline audit of an exported chain against a defense pack.
//!
//! Needs no store and no signing key: only the exported events, the pack
//! record and the signer's public key.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use casetrail_chain::verify_chain;
use casetrail_contracts::{
    error::CaseResult,
    event::TimelineEvent,
    pack::{DefensePack, PackStatus},
    verification::ChainVerification,
};

use crate::signer::verify_detached;

/// Result of an offline audit. `ok` holds only if every check passed;
/// `problems` lists the ones that did not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditOutcome {
    pub ok: bool,
    /// Verification of the covered prefix, if the export was long enough.
    pub chain: Option<ChainVerification>,
    pub head_matches: bool,
    pub signature_valid: bool,
    pub problems: Vec<String>,
}

/// Audit `events` (a full or longer-than-needed export) against `pack`.
pub fn audit_export(
    events: &[TimelineEvent],
    pack: &DefensePack,
    verifying_key_hex: &str,
) -> CaseResult<AuditOutcome> {
    let mut problems = Vec::new();

    if pack.status != PackStatus::Generated {
        problems.push(format!("pack status is '{}', not 'generated'", pack.status));
    }

    let chain = if events.len() < pack.events_count {
        problems.push(format!(
            "export holds {} events but the pack covers {}",
            events.len(),
            pack.events_count
        ));
        None
    } else {
        Some(verify_chain(&events[..pack.events_count]))
    };

    if let Some(result) = &chain {
        if let Some(broken_at) = result.broken_at {
            problems.push(format!(
                "chain broken at event {} ({:?})",
                broken_at, result.break_reason
            ));
        }
    }

    let head_matches = chain
        .as_ref()
        .is_some_and(|result| result.head_hash == pack.stored_head);
    if chain.is_some() && !head_matches {
        problems.push("recomputed head does not match the pack's stored head".to_string());
    }

    let signature_valid = match (pack.manifest(), pack.signature.as_deref()) {
        (Some(manifest), Some(signature)) => {
            verify_detached(verifying_key_hex, &manifest.signing_bytes()?, signature)?
        }
        _ => false,
    };
    if !signature_valid {
        problems.push("signature does not verify under the supplied key".to_string());
    }

    let ok = problems.is_empty();
    if ok {
        info!(pack_id = %pack.id, events = pack.events_count, "offline audit passed");
    } else {
        warn!(pack_id = %pack.id, problems = problems.len(), "offline audit failed");
    }

    Ok(AuditOutcome {
        ok,
        chain,
        head_matches,
        signature_valid,
        problems,
    })
}

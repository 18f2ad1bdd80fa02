//! Chain verification results.

use serde::{Deserialize, Serialize};

use crate::event::EventId;

/// Why the verifier stopped trusting a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakReason {
    /// The first event does not link to the sentinel.
    GenesisMismatch,
    /// `prev_event_hash` differs from the recomputed hash of the previous
    /// event.
    LinkMismatch,
    /// The stored `event_hash` differs from the hash recomputed from the
    /// event's own fields.
    HashMismatch,
    /// `created_at` is earlier than the previous event's.
    TimestampRegression,
}

/// Outcome of walking a chain.
///
/// On a broken chain the prefix before `broken_at` is still trustworthy:
/// `verified_count` events, ending at `trusted_head`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub integrity_ok: bool,
    /// Head recomputed over the whole sequence. Equals the stored head of
    /// an intact chain; the sentinel for an empty one.
    pub head_hash: String,
    pub broken_at: Option<EventId>,
    pub break_reason: Option<BreakReason>,
    /// Events verified before the first break (all of them when intact).
    pub verified_count: usize,
    /// Head of the verified prefix.
    pub trusted_head: String,
    pub events_checked: usize,
}

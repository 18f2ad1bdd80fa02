//! Hash-chain primitives: canonical encoding, hashing, and verification.
//!
//! Hash input layout (bytes, in order):
//!   1. prev_event_hash as UTF-8 bytes (64 ASCII hex chars)
//!   2. canonical JSON of `{actor_role, created_at, data, type}`
//!
//! Canonical JSON is compact with object keys sorted at every depth, and
//! `created_at` is RFC 3339 UTC with lossless sub-second digits. Key order
//! is imposed here rather than inherited from `serde_json`'s map type, so
//! the digest does not depend on how the workspace is compiled.
//!
//! The event `id` is not part of the hash input. Ids are storage handles:
//! two stored events can trade ids without changing any digest, so anything
//! that names an event by id (a correction's `corrects`, a verification's
//! `broken_at`) is only as trustworthy as the store that resolves it. The
//! chain position and `event_hash` are what the digest binds.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use casetrail_contracts::{
    event::{ActorRole, EventData, EventKind, TimelineEvent},
    verification::{BreakReason, ChainVerification},
};

/// Canonical text of the hashed fields of an event: everything except
/// `id`, `event_hash` and `prev_event_hash` (the last is fed to the hasher
/// separately).
pub fn canonical_content(
    kind: EventKind,
    actor_role: ActorRole,
    data: &EventData,
    created_at: &DateTime<Utc>,
) -> String {
    let data = match data {
        EventData::Plain(body) => json!({ "encoding": "plain", "body": body }),
        EventData::Sealed { key_id, ciphertext } => json!({
            "encoding": "sealed",
            "body": { "key_id": key_id, "ciphertext": ciphertext },
        }),
    };
    let content = json!({
        "type": kind.as_str(),
        "actor_role": actor_role.as_str(),
        "data": data,
        "created_at": created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    });

    let mut out = String::new();
    write_canonical(&content, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Compute the SHA-256 event hash.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_event(
    prev_event_hash: &str,
    kind: EventKind,
    actor_role: ActorRole,
    data: &EventData,
    created_at: &DateTime<Utc>,
) -> String {
    let content = canonical_content(kind, actor_role, data, created_at);

    let mut hasher = Sha256::new();
    hasher.update(prev_event_hash.as_bytes());
    hasher.update(content.as_bytes());

    hex::encode(hasher.finalize())
}

/// Recompute an event's hash from its stored fields, linked to `prev`.
pub fn rehash(event: &TimelineEvent, prev: &str) -> String {
    hash_event(prev, event.kind, event.actor_role, &event.data, &event.created_at)
}

/// Verify a chain snapshot.
///
/// Walks from the first event recomputing each hash from the event's stored
/// fields and the previous event's *recomputed* hash. Per event, in order:
///
/// 1. **Linkage**: the stored `prev_event_hash` equals the recomputed hash
///    of the previous event (the sentinel for event 0).
/// 2. **Time**: `created_at` does not precede the previous event's.
/// 3. **Hash**: the stored `event_hash` equals the recomputed one.
///
/// The first failure sets `broken_at`; the walk continues only to produce
/// the full recomputed head. An empty chain is intact with the sentinel as
/// its head.
pub fn verify_chain(events: &[TimelineEvent]) -> ChainVerification {
    let mut expected_prev = TimelineEvent::GENESIS_HASH.to_string();
    let mut prev_created_at: Option<DateTime<Utc>> = None;
    let mut first_break = None;
    let mut verified_count = 0;
    let mut trusted_head = TimelineEvent::GENESIS_HASH.to_string();

    for (index, event) in events.iter().enumerate() {
        let recomputed = rehash(event, &expected_prev);

        if first_break.is_none() {
            let reason = if event.prev_event_hash != expected_prev {
                Some(if index == 0 {
                    BreakReason::GenesisMismatch
                } else {
                    BreakReason::LinkMismatch
                })
            } else if prev_created_at.is_some_and(|prev| event.created_at < prev) {
                Some(BreakReason::TimestampRegression)
            } else if event.event_hash != recomputed {
                Some(BreakReason::HashMismatch)
            } else {
                None
            };

            match reason {
                Some(reason) => first_break = Some((event.id, reason)),
                None => {
                    verified_count += 1;
                    trusted_head = event.event_hash.clone();
                }
            }
        }

        prev_created_at = Some(event.created_at);
        expected_prev = recomputed;
    }

    ChainVerification {
        integrity_ok: first_break.is_none(),
        head_hash: expected_prev,
        broken_at: first_break.map(|(id, _)| id),
        break_reason: first_break.map(|(_, reason)| reason),
        verified_count,
        trusted_head,
        events_checked: events.len(),
    }
}

//! Human-readable defense pack document.
//!
//! The document embeds everything an outside auditor needs to re-check the
//! pack: the chain summary, the head digest, the signed manifest, the
//! signature and the verifying key. Sealed payload contents are never
//! reproduced; only their at-rest encoding is named.

use chrono::SecondsFormat;

use casetrail_contracts::{
    event::{EventData, TimelineEvent},
    pack::PackManifest,
};

/// Signature material printed in the document.
pub struct SignatureBlock<'a> {
    pub signature_hex: &'a str,
    pub key_id: &'a str,
    pub verifying_key_hex: &'a str,
}

/// File name under which a pack's document is stored.
pub fn artifact_name(manifest: &PackManifest) -> String {
    format!("defense-pack-{}.txt", manifest.pack_id)
}

/// Render the document for a generated pack. `events` must be exactly the
/// snapshot the manifest covers.
pub fn render_document(
    manifest: &PackManifest,
    events: &[TimelineEvent],
    signature: &SignatureBlock<'_>,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push("CASETRAIL DEFENSE PACK".to_string());
    lines.push("======================".to_string());
    lines.push(format!("Pack ID:          {}", manifest.pack_id));
    lines.push(format!("Report ID:        {}", manifest.report_id));
    lines.push(format!("Reason code:      {}", manifest.reason_code));
    lines.push(format!(
        "Generated at:     {}",
        manifest.generated_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    ));
    lines.push(format!("Events covered:   {}", manifest.events_count));
    lines.push(String::new());

    lines.push("CHAIN SUMMARY".to_string());
    lines.push("-------------".to_string());
    lines.push(format!(
        "{:<4} {:<32} {:<22} {:<8} {:<7} {}",
        "#", "Created at (UTC)", "Type", "Actor", "Payload", "Event hash"
    ));
    for (index, event) in events.iter().enumerate() {
        let payload = match event.data {
            EventData::Plain(_) => "plain",
            EventData::Sealed { .. } => "sealed",
        };
        lines.push(format!(
            "{:<4} {:<32} {:<22} {:<8} {:<7} {}",
            index,
            event.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            event.kind.as_str(),
            event.actor_role.as_str(),
            payload,
            event.event_hash
        ));
    }
    if events.is_empty() {
        lines.push("(no events)".to_string());
    }
    lines.push(String::new());

    lines.push("INTEGRITY".to_string());
    lines.push("---------".to_string());
    lines.push(format!("Genesis sentinel: {}", TimelineEvent::GENESIS_HASH));
    lines.push(format!("Head digest:      {}", manifest.stored_head));
    lines.push(format!("Signer key id:    {}", signature.key_id));
    lines.push(format!("Verifying key:    {}", signature.verifying_key_hex));
    lines.push(format!("Signature:        {}", signature.signature_hex));
    lines.push(String::new());

    lines.push("SIGNED MANIFEST".to_string());
    lines.push("---------------".to_string());
    lines.push(serde_json::to_string_pretty(manifest).unwrap_or_else(|e| format!("(unavailable: {e})")));
    lines.push(String::new());

    lines.push("VERIFICATION PROCEDURE".to_string());
    lines.push("----------------------".to_string());
    lines.push("1. Obtain the exported chain for the report above.".to_string());
    lines.push(format!(
        "2. Recompute SHA-256(prev_event_hash || canonical content) for events 0..{}, starting from the genesis sentinel.",
        manifest.events_count
    ));
    lines.push("3. The final digest must equal the head digest above.".to_string());
    lines.push(
        "4. Check the Ed25519 signature over the domain separator followed by the compact manifest JSON."
            .to_string(),
    );
    lines.push(String::new());

    lines.join("\n")
}

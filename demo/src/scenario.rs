//! End-to-end walkthrough of a single harassment report.
//!
//!   1. Intake: employment-rule draft, sealed report-created event, tracking-code lookup
//!   2. Triage via the offline generator, then lifecycle moves
//!   3. Comments, evidence and a risk assessment
//!   4. Integrity check and a signed defense pack
//!   5. Appends after the pack; the pack still re-verifies
//!   6. Tamper drill: a stored event is edited behind the chain's back

use std::{path::Path, sync::Arc};

use casetrail_chain::InMemoryReportStore;
use casetrail_contracts::{
    error::{CaseError, CaseResult},
    event::{ActorRole, EventData},
    report::{ReportIntake, ReportStatus},
};
use casetrail_service::{CaseConfig, CaseService, Collaborators};

pub fn run_scenario(config: CaseConfig, out_dir: Option<&Path>) -> CaseResult<()> {
    let store = InMemoryReportStore::new();
    let mut collaborators = Collaborators::local(&config)?;
    collaborators.reports = Arc::new(store.clone());
    let service = CaseService::new(config, collaborators)?;

    // ── 1. Intake ─────────────────────────────────────────────────────────────
    section("1. Intake");
    let rule = service.employment_rule("Acme Logistics")?;
    println!("  policy draft:     {}", rule.lines().next().unwrap_or(""));
    let report = service.open_report(ReportIntake {
        tenant_id: "acme".to_string(),
        subject: Some("Weekly planning meeting".to_string()),
        content: "My manager yelled at me in front of the team again and threatened my job \
                  when I asked about overtime pay."
            .to_string(),
        category: Some("Power Abuse".to_string()),
        tracking_code: "ACME-7F3K-29QX".to_string(),
    })?;
    println!("  report id:        {}", report.id);
    println!("  sealed under key: {}", report.encryption_key_id);
    let found = service.find_by_tracking_code("ACME-7F3K-29QX")?;
    println!("  tracking lookup:  {}", if found.is_some() { "found" } else { "missing" });

    // ── 2. Triage and lifecycle ───────────────────────────────────────────────
    section("2. Triage and lifecycle");
    let triage = service.triage_with_generator(&report.id)?;
    println!("  triage:           {} / {} ({})", triage.priority, triage.category, triage.reason);
    service.transition(&report.id, ReportStatus::Investigating, ActorRole::Admin)?;
    match service.transition(&report.id, ReportStatus::Received, ActorRole::Admin) {
        Err(CaseError::InvalidTransition { from, to }) => {
            println!("  backward move {} -> {} rejected, chain untouched", from, to)
        }
        other => println!("  unexpected outcome for backward move: {:?}", other.map(|e| e.id)),
    }

    // ── 3. Case work ──────────────────────────────────────────────────────────
    section("3. Case work");
    service.add_comment(&report.id, ActorRole::Admin, "Interview with the reporter scheduled.")?;
    let evidence = service.attach_evidence(&report.id, ActorRole::User, "chat-export.txt", b"[09:14] ...")?;
    println!("  evidence event:   {}", evidence.id);
    let assessment = service.risk_assessment(&report.id)?;
    for line in assessment.lines() {
        println!("  | {}", line);
    }
    service.transition(&report.id, ReportStatus::InProgress, ActorRole::Admin)?;
    let current = service.report(&report.id)?;
    println!("  status / priority: {} / {}", current.status, current.priority);

    // ── 4. Integrity and defense pack ─────────────────────────────────────────
    section("4. Integrity and defense pack");
    let verification = service.require_intact(&report.id)?;
    println!("  chain intact:     {} events, head {}", verification.events_checked, verification.head_hash);
    let pack = service.build_defense_pack(&report.id, "legal-request")?;
    println!("  pack {}: {}", pack.id, pack.status);
    println!("  events covered:   {}", pack.events_count);
    println!("  stored head:      {}", pack.stored_head);
    println!("  artifact:         {}", pack.pdf_path.as_deref().unwrap_or("(none)"));

    // ── 5. Later appends ──────────────────────────────────────────────────────
    section("5. Appends after the pack");
    service.add_comment(&report.id, ActorRole::Partner, "External counsel reviewed the pack.")?;
    println!("  re-verify after append: {}", service.reverify_pack(&pack.id)?);

    if let Some(dir) = out_dir {
        write_exports(&service, &report.id, &pack, dir)?;
    }

    // ── 6. Tamper drill ───────────────────────────────────────────────────────
    section("6. Tamper drill");
    store.tamper(&report.id, 3, |event| {
        event.data = EventData::Plain(serde_json::json!({ "text": "nothing happened" }));
    })?;
    println!("  event 3 (a sealed comment) rewritten directly in storage");

    let verification = service.check_integrity(&report.id)?;
    match (verification.broken_at, verification.break_reason) {
        (Some(at), Some(reason)) => println!(
            "  chain broken at {} ({:?}); {} events still trusted",
            at, reason, verification.verified_count
        ),
        _ => println!("  chain unexpectedly intact"),
    }
    println!("  re-verify pack:   {}", service.reverify_pack(&pack.id)?);
    match service.add_comment(&report.id, ActorRole::Admin, "after tampering") {
        Err(e @ CaseError::IntegrityBroken { .. }) => println!("  append refused:   {}", e),
        other => println!("  unexpected append outcome: {:?}", other.map(|e| e.id)),
    }
    let refused = service.build_defense_pack(&report.id, "legal-request")?;
    println!(
        "  new pack {}: {} ({})",
        refused.id,
        refused.status,
        refused.failure.as_deref().unwrap_or("")
    );
    println!();
    Ok(())
}

fn write_exports(
    service: &CaseService,
    report_id: &casetrail_contracts::event::ReportId,
    pack: &casetrail_contracts::pack::DefensePack,
    dir: &Path,
) -> CaseResult<()> {
    let io_err = |e: std::io::Error| CaseError::ArtifactStore {
        reason: format!("failed to write export to '{}': {}", dir.display(), e),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let export = service.export_chain(report_id)?;
    std::fs::write(dir.join("chain.json"), serde_json::to_vec_pretty(&export)?).map_err(io_err)?;
    std::fs::write(dir.join("pack.json"), serde_json::to_vec_pretty(pack)?).map_err(io_err)?;
    std::fs::write(dir.join("verifying-key.txt"), service.verifying_key_hex()).map_err(io_err)?;

    println!("  exported chain, pack and verifying key to {}", dir.display());
    println!(
        "  audit with: casetrail verify-export --chain {0}/chain.json --pack {0}/pack.json --key {0}/verifying-key.txt",
        dir.display()
    );
    Ok(())
}

fn section(title: &str) {
    println!();
    println!("{}", title);
    println!("{}", "-".repeat(title.len()));
}

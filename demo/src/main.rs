//! CASETRAIL: Case Record Demo CLI
//!
//! Walks one report through intake, triage, case work, a signed defense
//! pack and a tamper drill, and audits exported chains offline.
//!
//! Usage:
//!   cargo run -p demo -- scenario
//!   cargo run -p demo -- scenario --out ./out
//!   cargo run -p demo -- verify-export --chain out/chain.json --pack out/pack.json --key out/verifying-key.txt

mod scenario;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use casetrail_contracts::{
    error::{CaseError, CaseResult},
    event::ChainExport,
    pack::DefensePack,
};
use casetrail_pack::audit_export;
use casetrail_service::CaseConfig;

/// Demo configuration used when `--config` is not given.
const DEMO_CONFIG: &str = include_str!("../config/casetrail.toml");

// ── CLI definition ────────────────────────────────────────────────────────────

/// CASETRAIL: tamper-evident case records and signed defense packs.
#[derive(Parser)]
#[command(
    name = "casetrail",
    about = "CASETRAIL case record demo and offline auditor",
    long_about = "Runs the CASETRAIL case record scenario (hash-chained timeline,\n\
                  state machine, defense packs, tamper drill) and audits exported\n\
                  chains against signed defense packs without access to any store."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the end-to-end report scenario.
    Scenario {
        /// TOML configuration file. Defaults to the bundled demo config.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory to write the exported chain, pack and verifying key to.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Audit an exported chain against a defense pack offline.
    VerifyExport {
        /// Exported chain JSON.
        #[arg(long)]
        chain: PathBuf,
        /// Defense pack JSON.
        #[arg(long)]
        pack: PathBuf,
        /// File holding the signer's hex verifying key.
        #[arg(long)]
        key: PathBuf,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Scenario { config, out } => run_scenario(config.as_deref(), out.as_deref()),
        Command::VerifyExport { chain, pack, key } => verify_export(&chain, &pack, &key),
    };

    if let Err(e) = result {
        eprintln!("casetrail error: {}", e);
        std::process::exit(1);
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn run_scenario(config_path: Option<&Path>, out_dir: Option<&Path>) -> CaseResult<()> {
    let config = match config_path {
        Some(path) => CaseConfig::from_file(path)?,
        None => CaseConfig::from_toml_str(DEMO_CONFIG)?,
    };
    print_banner();
    scenario::run_scenario(config, out_dir)?;
    println!("Scenario completed.");
    Ok(())
}

fn verify_export(chain_path: &Path, pack_path: &Path, key_path: &Path) -> CaseResult<()> {
    let export: ChainExport = serde_json::from_str(&read(chain_path)?)?;
    let pack: DefensePack = serde_json::from_str(&read(pack_path)?)?;
    let key = read(key_path)?;
    info!(report_id = %export.report_id, events = export.events.len(), pack_id = %pack.id, "export loaded");

    let outcome = audit_export(&export.events, &pack, key.trim())?;

    println!("Report:          {}", export.report_id);
    println!("Pack:            {} ({})", pack.id, pack.status);
    println!("Events exported: {}", export.events.len());
    println!("Events covered:  {}", pack.events_count);
    println!("Head matches:    {}", outcome.head_matches);
    println!("Signature valid: {}", outcome.signature_valid);
    for problem in &outcome.problems {
        println!("  problem: {}", problem);
    }

    if outcome.ok {
        println!("AUDIT PASSED");
        Ok(())
    } else {
        let broken_at = outcome
            .chain
            .and_then(|c| c.broken_at)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        Err(CaseError::IntegrityBroken {
            report_id: export.report_id.to_string(),
            broken_at,
        })
    }
}

fn read(path: &Path) -> CaseResult<String> {
    std::fs::read_to_string(path).map_err(|e| CaseError::ConfigError {
        reason: format!("failed to read '{}': {}", path.display(), e),
    })
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("CASETRAIL: Tamper-evident Case Record");
    println!("=====================================");
    println!();
    println!("Every report event is hash-chained:");
    println!("  event_hash = SHA-256(prev_event_hash || canonical event content)");
    println!("Defense packs sign the verified head digest with Ed25519 and stay");
    println!("re-verifiable against the events they cover.");
}

//! Agora Node - Command-line driver for the governance engine.
//!
//! Loads the persisted governance state, replays operation logs against it
//! and answers queries.

pub mod config;
pub mod replay;
pub mod telemetry;

use agora_governance::{GovernanceEngine, GovernanceSnapshot, ManualHeight};
use agora_storage::StateFile;
use agora_types::Address;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::NodeConfig;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "agora-node")]
#[command(about = "Agora Node - token-weighted governance and treasury engine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Config file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// State file (overrides the config file)
    #[arg(short, long, value_name = "FILE", global = true)]
    state: Option<PathBuf>,

    /// Log level (overrides the config file)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// JSON log output
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a JSON-lines operation log ("-" reads stdin)
    Apply {
        /// Operation log
        log: PathBuf,

        /// Do not write the resulting state back
        #[arg(long)]
        dry_run: bool,
    },

    /// Print governance statistics
    Stats,

    /// Print a proposal and its current status
    Proposal {
        /// Proposal id
        id: u64,
    },

    /// Print an account's voting record, effective power and delegation
    Account {
        /// Address (0x… or agora1…)
        address: Address,
    },

    /// List all proposals with their status
    Proposals,

    /// Write a default configuration file
    InitConfig {
        /// Output path
        #[arg(default_value = "agora.toml")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load or create config
    let mut config = match &args.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };

    // Override with CLI args
    if let Some(state) = args.state {
        config.storage.state_file = state;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.logging.json |= args.json_logs;

    config.validate()?;
    telemetry::init_telemetry(&config.logging.level, config.logging.json)?;

    match args.command {
        Command::InitConfig { output } => {
            config.to_file(&output)?;
            info!(path = %output.display(), "configuration written");
        }
        Command::Apply { log, dry_run } => {
            let (state_file, engine) = open_state(&config)?;
            let stdout = io::stdout();
            let summary = if log.as_os_str() == "-" {
                replay::replay(&engine, io::stdin().lock(), stdout.lock())?
            } else {
                let file = File::open(&log)
                    .map_err(|e| anyhow::anyhow!("Failed to open log '{}': {}", log.display(), e))?;
                replay::replay(&engine, BufReader::new(file), stdout.lock())?
            };
            info!(applied = summary.applied, rejected = summary.rejected, "operation log applied");

            if config.storage.save_on_apply && !dry_run {
                state_file.save(&engine.snapshot())?;
                info!(path = %state_file.path().display(), "state saved");
            }
        }
        Command::Stats => {
            let (_, engine) = open_state(&config)?;
            print_json(&engine.stats())?;
        }
        Command::Proposal { id } => {
            let (_, engine) = open_state(&config)?;
            let proposal = engine
                .proposal(id)
                .ok_or_else(|| anyhow::anyhow!("Proposal not found: {}", id))?;
            let status = engine.proposal_status(id)?;
            print_json(&ProposalView { proposal, status })?;
        }
        Command::Account { address } => {
            let (_, engine) = open_state(&config)?;
            let view = AccountView {
                address,
                record: engine.account(&address),
                effective_power: engine.effective_power(&address)?,
                delegation: engine.delegation(&address),
                delegated_power: engine.delegated_power(&address),
            };
            print_json(&view)?;
        }
        Command::Proposals => {
            let (_, engine) = open_state(&config)?;
            let views: Vec<ProposalView> = engine
                .list_proposals()?
                .into_iter()
                .map(|(proposal, status)| ProposalView { proposal, status })
                .collect();
            print_json(&views)?;
        }
    }

    Ok(())
}

fn open_state(config: &NodeConfig) -> anyhow::Result<(StateFile, GovernanceEngine)> {
    let state_file = StateFile::new(&config.storage.state_file)?;
    let engine = open_engine(config, &state_file)?;
    Ok((state_file, engine))
}

/// Restore the engine from the state file, or start empty.
fn open_engine(config: &NodeConfig, state_file: &StateFile) -> anyhow::Result<GovernanceEngine> {
    match state_file.load::<GovernanceSnapshot>()? {
        Some(snapshot) => {
            if snapshot.config != config.governance {
                warn!("governance parameters differ from the configuration; keeping the persisted ones");
            }
            let height = ManualHeight::new(snapshot.state.last_height);
            Ok(GovernanceEngine::restore(snapshot, height)?)
        }
        None => {
            info!(path = %state_file.path().display(), "no state file, starting empty");
            Ok(GovernanceEngine::new(config.governance.clone(), ManualHeight::new(0))?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

#[derive(Serialize)]
struct ProposalView {
    proposal: agora_governance::Proposal,
    status: agora_governance::ProposalStatus,
}

#[derive(Serialize)]
struct AccountView {
    address: Address,
    record: agora_governance::AccountRecord,
    effective_power: agora_types::Amount,
    delegation: Option<agora_governance::Delegation>,
    delegated_power: agora_governance::DelegatedPower,
}

//! hts-sim: runs contract calls through the token service system contract.
//!
//! Loads a ledger snapshot and a list of calls from JSON files, executes the
//! calls in order and prints every outcome together with the final ledger.

#![allow(missing_docs, rustdoc::missing_crate_level_docs)]

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use hts_precompiles::{abi::FUNCTIONS, CallOutcome, ContractCall, HtsConfig, HtsEngine, Ledger};
use hts_primitives::ResponseCode;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Offline simulator for the HTS system contract.
#[derive(Parser, Debug)]
#[command(name = "hts-sim", about = "Run contract calls against an HTS ledger snapshot")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute calls and print their outcomes and the resulting ledger
    Run {
        /// Ledger snapshot (JSON)
        #[arg(long)]
        ledger: PathBuf,

        /// One call or a list of calls (JSON)
        #[arg(long)]
        calls: PathBuf,

        /// Configuration file (JSON). Defaults come from the environment
        #[arg(long, env = "HTS_CONFIG")]
        config: Option<PathBuf>,

        /// Print only the outcomes
        #[arg(long, default_value_t = false)]
        no_ledger: bool,
    },
    /// List the supported functions and their selectors
    Selectors,
}

/// A calls file holds either one call or many.
#[derive(Deserialize)]
#[serde(untagged)]
enum CallsFile {
    Many(Vec<ContractCall>),
    One(Box<ContractCall>),
}

impl CallsFile {
    fn into_calls(self) -> Vec<ContractCall> {
        match self {
            Self::Many(calls) => calls,
            Self::One(call) => vec![*call],
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> eyre::Result<HtsConfig> {
    let config = match path {
        Some(path) => HtsConfig::from_file(path)?,
        None => HtsConfig::from_env()?,
    };
    Ok(config)
}

fn run(ledger: &Path, calls: &Path, config: Option<&Path>, no_ledger: bool) -> eyre::Result<()> {
    let config = load_config(config).wrap_err("failed to load configuration")?;
    let raw = fs::read_to_string(ledger)
        .wrap_err_with(|| format!("failed to read ledger {}", ledger.display()))?;
    let ledger: Ledger = serde_json::from_str(&raw).wrap_err("invalid ledger snapshot")?;
    let raw = fs::read_to_string(calls)
        .wrap_err_with(|| format!("failed to read calls {}", calls.display()))?;
    let calls = serde_json::from_str::<CallsFile>(&raw).wrap_err("invalid calls file")?.into_calls();

    info!(calls = calls.len(), address = %config.precompile_address, "running calls");
    let mut engine = HtsEngine::new(config, ledger);
    let outcomes: Vec<CallOutcome> = calls.iter().map(|call| engine.execute(call)).collect();
    let committed = outcomes.iter().filter(|o| o.status == ResponseCode::Success).count();
    info!(committed, reverted = outcomes.len() - committed, "done");

    let report = if no_ledger {
        serde_json::json!({ "outcomes": outcomes })
    } else {
        serde_json::json!({ "outcomes": outcomes, "ledger": engine.ledger() })
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_selectors() {
    for function in FUNCTIONS {
        println!(
            "{}  {:<28} {}",
            alloy_primitives::hex::encode_prefixed(function.selector),
            function.kind.name(),
            function.signature
        );
    }
}

fn main() -> eyre::Result<()> {
    init_tracing();

    match Cli::parse().command {
        Command::Run { ledger, calls, config, no_ledger } => {
            run(&ledger, &calls, config.as_deref(), no_ledger)
        }
        Command::Selectors => {
            print_selectors();
            Ok(())
        }
    }
}

//! Test-then-deploy assistant for agent repositories.
//!
//! Each operation is exposed as a subcommand that prints its result as JSON;
//! `deployer session` runs the whole conversation interactively.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use deployer::core::confirmation::parse_confirmation;
use deployer::core::platform::select_platform;
use deployer::core::session::{Completion, SessionState};
use deployer::core::types::Checkout;
use deployer::deploy::deploy_checkout;
use deployer::exit_codes;
use deployer::io::config::{DEFAULT_CONFIG_FILE, DeployerConfig, load_config, write_config};
use deployer::io::process::SystemRunner;
use deployer::logging;
use deployer::session::{Session, run_dialogue};
use deployer::tester::clone_and_test;

#[derive(Parser)]
#[command(
    name = "deployer",
    version,
    about = "Clone, test and deploy agent repositories to Cloud Run"
)]
struct Cli {
    /// Config file (missing file means defaults).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// More diagnostics on stderr (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a free-text cloud platform choice.
    Platform { choice: String },
    /// Classify a free-text deployment confirmation.
    Confirm { response: String },
    /// Clone a repository and run its test_*.py files.
    Test { url: String },
    /// Deploy a local checkout to Cloud Run.
    Deploy {
        /// Checkout directory (as reported by `test`).
        clone_path: PathBuf,
        /// Repository name the service name is derived from.
        repo_name: String,
        /// Override the configured GCP project.
        #[arg(long)]
        project: Option<String>,
        /// Override the configured region.
        #[arg(long)]
        region: Option<String>,
    },
    /// Run the guided conversation on stdin/stdout.
    Session,
    /// Write the default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Platform { choice } => {
            let selection = select_platform(&choice);
            print_json(&selection)?;
            Ok(exit_codes::for_status(selection.status))
        }
        Command::Confirm { response } => {
            let confirmation = parse_confirmation(&response);
            print_json(&confirmation)?;
            Ok(exit_codes::for_status(confirmation.status))
        }
        Command::Test { url } => {
            let cfg = resolve_config(&cli.config)?;
            let runner = SystemRunner::new(cfg.output_limit_bytes);
            let report = clone_and_test(&runner, &cfg, &url);
            print_json(&report)?;
            Ok(exit_codes::for_status(report.status))
        }
        Command::Deploy {
            clone_path,
            repo_name,
            project,
            region,
        } => {
            let mut cfg = resolve_config(&cli.config)?;
            if let Some(project) = project {
                cfg.gcp.project = project;
            }
            if let Some(region) = region {
                cfg.gcp.region = region;
            }
            cfg.validate()?;
            let checkout = Checkout {
                clone_path,
                repo_name,
            };
            let runner = SystemRunner::new(cfg.output_limit_bytes);
            let report = deploy_checkout(&runner, &cfg, &cfg.gcp, &checkout);
            print_json(&report)?;
            Ok(exit_codes::for_status(report.status))
        }
        Command::Session => cmd_session(&cli.config),
        Command::Init { force } => cmd_init(&cli.config, force),
    }
}

fn cmd_session(config_path: &Path) -> Result<i32> {
    let cfg = resolve_config(config_path)?;
    let runner = SystemRunner::new(cfg.output_limit_bytes);
    let mut session = Session::new(&runner, &cfg);
    let end = run_dialogue(&mut session, io::stdin().lock(), io::stdout())?;
    info!(state = end.name(), "session ended");
    Ok(match end {
        SessionState::Done {
            completion: Completion::Deployed { .. },
        } => exit_codes::OK,
        SessionState::Failed { .. } => exit_codes::FAILED,
        _ => exit_codes::CANCELLED,
    })
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if !force && config_path.exists() {
        println!("{} already exists", config_path.display());
        return Ok(exit_codes::OK);
    }
    write_config(config_path, &DeployerConfig::default())?;
    println!("wrote {}", config_path.display());
    Ok(exit_codes::OK)
}

/// Load the config file, then apply environment overrides for the target.
fn resolve_config(path: &Path) -> Result<DeployerConfig> {
    let mut cfg = load_config(path).with_context(|| format!("load {}", path.display()))?;
    cfg.apply_env_overrides(|key| std::env::var(key).ok());
    cfg.validate()?;
    Ok(cfg)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

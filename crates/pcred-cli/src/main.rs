//! # pcred CLI entry point
//!
//! Parses command-line arguments, initializes tracing, and dispatches to
//! subcommand handlers. Handlers return a JSON document which is printed
//! here; logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pcred_core::CancellationSignal;
use tracing_subscriber::EnvFilter;

use pcred_cli::credential::{run_issue, run_validate, IssueArgs, ValidateArgs};
use pcred_cli::digest::{run_commit, run_hash, CommitArgs, HashArgs};
use pcred_cli::keys::{run_keygen, KeygenArgs};
use pcred_cli::presentation::{run_challenge, run_verify, ChallengeArgs, VerifyArgs};
use pcred_cli::{require_config, CommandOutput};

/// Policy credential toolchain.
///
/// Canonical hashing and commitments, signing-key generation, credential
/// issuance and validation, and presentation verification.
#[derive(Parser, Debug)]
#[command(name = "pcred", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to the YAML trust configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Canonical SHA-256 of a JSON document.
    Hash(HashArgs),

    /// Keyed HMAC-SHA-256 commitment to a JSON document.
    Commit(CommitArgs),

    /// Generate an Ed25519 signing key.
    Keygen(KeygenArgs),

    /// Issue a policy credential.
    Issue(IssueArgs),

    /// Validate a credential token.
    Validate(ValidateArgs),

    /// Issue a committed ZKP challenge.
    Challenge(ChallengeArgs),

    /// Verify a presentation.
    Verify(VerifyArgs),
}

fn init_tracing(verbose: u8, json: bool) {
    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn dispatch(cli: &Cli, cancel: &CancellationSignal) -> anyhow::Result<CommandOutput> {
    let config_path = cli.config.as_deref();
    match &cli.command {
        Commands::Hash(args) => run_hash(args),
        Commands::Commit(args) => run_commit(args),
        Commands::Keygen(args) => run_keygen(args),
        Commands::Issue(args) => run_issue(args, &require_config(config_path)?, cancel).await,
        Commands::Validate(args) => run_validate(args, &require_config(config_path)?, cancel).await,
        Commands::Challenge(args) => run_challenge(args, &require_config(config_path)?),
        Commands::Verify(args) => run_verify(args, &require_config(config_path)?, cancel).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);
    tracing::debug!("pcred starting");

    let cancel = CancellationSignal::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match dispatch(&cli, &cancel).await {
        Ok(output) => match serde_json::to_string_pretty(&output.body) {
            Ok(text) => {
                println!("{text}");
                ExitCode::from(output.exit_code)
            }
            Err(e) => {
                tracing::error!("failed to render output: {e}");
                ExitCode::from(1)
            }
        },
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

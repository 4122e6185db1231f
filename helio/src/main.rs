//! helio: command-line access to the butterfly observation store.
//!
//! Every invocation connects to the backing store, runs a tolerant bootstrap
//! (create namespace and table, seeding only a newly created table) and then
//! performs one store operation, printing the result as JSON on stdout.
//! Configuration comes from `HELIO_*` environment variables (see [`config`]).
//!
//! Exit status: `0` on success, `2` for malformed input, `4` when the
//! observation does not exist, `5` on a uniqueness conflict, `6` when the
//! operation timed out or was interrupted, `1` otherwise.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use helio_store::{ObservationStore, OpContext};

mod commands;
mod config;
mod error;
mod logging;
mod seed;

use commands::Command;
use error::CliError;

#[derive(Parser)]
#[command(name = "helio", about = "Store and search butterfly observations")]
struct Cli {
    /// Per-operation timeout in seconds; 0 disables it. Defaults to
    /// `HELIO_OP_TIMEOUT_SECS`.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

/// Context for one store call: the shared cancel signal plus a fresh
/// deadline.
fn op_context(base: &OpContext, timeout_secs: u64) -> OpContext {
    if timeout_secs == 0 {
        base.clone()
    } else {
        base.clone().with_timeout(Duration::from_secs(timeout_secs))
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let timeout_secs = cli.timeout_secs.unwrap_or_else(config::get_op_timeout_secs);
    let seed_path = config::get_seed_path();

    let (base, cancel) = OpContext::background().cancellable();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling the running operation");
            cancel.cancel();
        }
    });

    let store = ObservationStore::connect(&config::store_config()).await?;

    // The explicit bootstrap command reports its own failures.
    if !matches!(cli.command, Command::Bootstrap { .. }) {
        commands::bootstrap_tolerant(&store, &op_context(&base, timeout_secs), &seed_path).await;
    }

    let mut stdout = std::io::stdout().lock();
    let result = commands::execute(
        &store,
        &op_context(&base, timeout_secs),
        cli.command,
        &seed_path,
        &mut stdout,
    )
    .await;

    store.close().await;
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = logging::init(config::get_log_dir().as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

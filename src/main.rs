//! cutover - gateway cutover orchestrator

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use cutover::Cli;
use cutover_common::telemetry::init_logging;
use cutover_migration::MigrationError;

/// Exit status when a transition was applied but could not be recorded
const EXIT_UNPERSISTED: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current wait");
            on_signal.cancel();
        }
    });

    if let Err(e) = cli.run(cancel).await {
        if e.downcast_ref::<MigrationError>().is_some_and(MigrationError::is_fatal) {
            error!(error = %e, "migration state is no longer in sync with the state file");
            std::process::exit(EXIT_UNPERSISTED);
        }
        return Err(e);
    }
    Ok(())
}

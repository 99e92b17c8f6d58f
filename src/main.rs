//! nodeup CLI entry point
//!
//! Parses the arguments, installs logging, wires Ctrl-C to cancellation and
//! maps failures onto the exit status.

use clap::Parser;
use nodeup_cli::cli::Cli;
use nodeup_cli::core::{UpdaterError, find_updater_error, user_friendly_error};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli.init_logging();

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling pending waits (press Ctrl-C again to abort)");
            interrupt.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    if let Err(e) = cli.execute(cancel).await {
        let code = match find_updater_error(&e) {
            Some(UpdaterError::SelfTestFailed { code }) => *code,
            _ => 1,
        };
        user_friendly_error(e).display();
        std::process::exit(code);
    }
}

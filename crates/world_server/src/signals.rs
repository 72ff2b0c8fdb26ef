//! Signal handling for graceful server shutdown.
//!
//! The first SIGINT/SIGTERM (Ctrl+C on Windows) stops the tick loop after the
//! current tick; a second one exits the process immediately.

use tokio::signal;
use tracing::{error, info, warn};

/// Resolves when a termination signal arrives.
///
/// # Example
///
/// ```rust,no_run
/// use lib_world_server::signals::wait_for_shutdown_signal;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     wait_for_shutdown_signal().await?;
///     Ok(())
/// }
/// ```
pub async fn wait_for_shutdown_signal() -> Result<(), Box<dyn std::error::Error>> {
    wait_for_signal_silent().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    Ok(())
}

async fn wait_for_signal_silent() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}

/// Exits the process on the next signal, for when graceful shutdown hangs.
pub fn spawn_merciless_shutdown() {
    tokio::spawn(async move {
        if let Err(e) = wait_for_signal_silent().await {
            error!("Failed to set up merciless shutdown signal handler: {e}");
            return;
        }

        warn!("Shutdown signal received again! Exiting without cleanup.");
        std::process::exit(1);
    });
}

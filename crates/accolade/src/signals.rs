//! Signal handling for graceful shutdown.
//!
//! [`Application::run`](crate::Application::run) parks on
//! [`wait_for_shutdown`] once the engine is up, then stops the health
//! monitor and logs the final bus and cache statistics.

use tokio::signal;
use tracing::info;

/// Waits for a termination signal.
///
/// # Platform Support
///
/// * **Unix**: SIGINT or SIGTERM, whichever arrives first
/// * **Windows**: Ctrl+C
///
/// # Errors
///
/// Fails if the signal listeners cannot be installed.
pub async fn wait_for_shutdown() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("📡 Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("📡 Received SIGTERM");
            }
        }
    }

    #[cfg(windows)]
    {
        signal::ctrl_c().await?;
        info!("📡 Received Ctrl+C");
    }

    Ok(())
}

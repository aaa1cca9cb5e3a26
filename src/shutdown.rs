//! Signal handling for the client binary.

use std::future::Future;
use std::io;

use tokio::signal;
use tracing::info;

/// Signal that interrupted a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Ctrl+C / SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
}

/// Waits for SIGTERM or SIGINT.
///
/// # Errors
///
/// Returns error if a signal handler cannot be installed.
pub async fn wait_for_signal() -> io::Result<ShutdownSignal> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, abandoning run");
                Ok(ShutdownSignal::Interrupt)
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, abandoning run");
                Ok(ShutdownSignal::Terminate)
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, abandoning run");
        Ok(ShutdownSignal::Interrupt)
    }
}

/// Runs `task` until it finishes or `shutdown` resolves, whichever is first.
///
/// Returns `Ok(None)` when interrupted. Dropping `task` cancels any in-flight
/// gRPC calls.
///
/// # Errors
///
/// Returns the error of `shutdown`.
pub async fn run_until<F, S>(task: F, shutdown: S) -> io::Result<Option<F::Output>>
where
    F: Future,
    S: Future<Output = io::Result<ShutdownSignal>>,
{
    tokio::select! {
        output = task => Ok(Some(output)),
        signal = shutdown => signal.map(|_| None),
    }
}

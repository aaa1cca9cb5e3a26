//! OAuth Lifecycle Client - Main Entry Point
//!
//! Performs one handshake against the configured service, then introspects,
//! fetches user info for, and revokes the issued token.

use anyhow::{bail, Context};
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use oauth_lifecycle::observability::{self, LogSettings};
use oauth_lifecycle::shutdown::{run_until, wait_for_signal};
use oauth_lifecycle::{Config, GrpcOAuthService, LifecycleOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    observability::init(&LogSettings::from(&config)).context("initializing logging")?;

    let run_id = Uuid::new_v4();
    info!(%run_id, service_url = %config.service_url_str(), "Starting OAuth lifecycle run");

    let service = GrpcOAuthService::new(&config)?.with_correlation_id(run_id.to_string());

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(message) = progress_rx.recv().await {
            println!("{message}");
        }
    });

    let orchestrator = LifecycleOrchestrator::new(service)
        .with_run_id(run_id)
        .with_handshake_timeout(config.handshake_timeout)
        .with_progress_sink(progress_tx);

    let outcome = run_until(orchestrator.run_to_report(), wait_for_signal())
        .await
        .context("installing signal handlers")?;
    // Sender is gone once the orchestrator is dropped; drain what is left.
    printer.await.context("progress printer panicked")?;

    let Some(result) = outcome else {
        bail!("run {run_id} interrupted before completion");
    };
    let report = result.map_err(|e| {
        error!(error = %e, "lifecycle run failed");
        e
    })?;

    for line in report.lines() {
        println!("{line}");
    }
    match serde_json::to_string(&report.summary()) {
        Ok(summary) => info!(%summary, "run summary"),
        Err(e) => error!(error = %e, "failed to serialize run summary"),
    }

    report.into_result()?;
    info!(%run_id, "OAuth lifecycle run complete");
    Ok(())
}

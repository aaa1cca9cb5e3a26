//! Lifecycle Orchestrator
//!
//! Runs one full token lifecycle against an [`OAuthService`]:
//!
//! ```text
//! Authenticate (stream) ──gate──┬── Introspect
//!                               ├── UserInfo
//!                               └── Revoke ── Introspect (confirm)
//! ```
//!
//! Nothing after the gate is issued until the stream has closed cleanly.
//! The three branches run concurrently; only revoke and confirm are ordered.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::client::OAuthService;
use crate::error::{LifecycleError, Operation, OperationError};
use crate::handshake::{HandshakeDriver, HandshakeGate};
use crate::lifecycle::report::{IntrospectionOutcome, LifecycleReport, UserInfo};
use crate::token::{redact, TokenPair, TokenStore};

type Confirmation = Option<Result<IntrospectionOutcome, OperationError>>;

struct DependentOutcomes {
    tokens: TokenPair,
    introspection: Result<IntrospectionOutcome, OperationError>,
    user_info: Result<UserInfo, OperationError>,
    revocation: Result<(), OperationError>,
    confirmation: Confirmation,
}

/// Drives one handshake and its dependent operations.
pub struct LifecycleOrchestrator<S> {
    service: S,
    store: Arc<TokenStore>,
    run_id: Uuid,
    handshake_timeout: Option<Duration>,
    progress: Option<mpsc::UnboundedSender<String>>,
}

impl<S: OAuthService> LifecycleOrchestrator<S> {
    /// Creates an orchestrator with a fresh token store and run id.
    #[must_use]
    pub fn new(service: S) -> Self {
        Self {
            service,
            store: Arc::new(TokenStore::new()),
            run_id: Uuid::new_v4(),
            handshake_timeout: None,
            progress: None,
        }
    }

    /// Uses `run_id` to tag logs and the report.
    #[must_use]
    pub const fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// Bounds the Authenticate stream; `None` waits indefinitely.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Forwards handshake progress messages to `sink`.
    #[must_use]
    pub fn with_progress_sink(mut self, sink: mpsc::UnboundedSender<String>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// The store this run writes into.
    #[must_use]
    pub fn store(&self) -> Arc<TokenStore> {
        Arc::clone(&self.store)
    }

    /// The run id.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Runs the lifecycle and fails if the token could not be revoked.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The handshake fails
    /// - No access token was issued
    /// - Revoke fails
    pub async fn run(self) -> Result<LifecycleReport, LifecycleError> {
        self.run_to_report().await?.into_result()
    }

    /// Runs the lifecycle and reports every per-operation outcome.
    ///
    /// Failures of Introspect, UserInfo and Revoke are recorded in the report
    /// rather than returned.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Handshake` when the handshake fails and
    /// `PreconditionViolation` when it completes without an access token.
    /// No dependent call is issued in either case.
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    pub async fn run_to_report(self) -> Result<LifecycleReport, LifecycleError> {
        let started_at = Utc::now();

        let mut driver =
            HandshakeDriver::new(Arc::clone(&self.store)).with_timeout(self.handshake_timeout);
        if let Some(sink) = self.progress.clone() {
            driver = driver.with_progress_sink(sink);
        }
        let gate = driver.gate();

        let (handshake, dependents) =
            tokio::join!(driver.run(&self.service), self.run_dependents(gate));
        handshake?;
        let outcomes = dependents?;

        let report = LifecycleReport {
            run_id: self.run_id,
            started_at,
            finished_at: Utc::now(),
            tokens: outcomes.tokens,
            introspection: outcomes.introspection,
            user_info: outcomes.user_info,
            revocation: outcomes.revocation,
            confirmation: outcomes.confirmation,
        };
        info!(
            failures = report.failures().len(),
            revocation = ?report.revocation_status(),
            "lifecycle finished"
        );
        Ok(report)
    }

    async fn run_dependents(&self, mut gate: HandshakeGate) -> Result<DependentOutcomes, LifecycleError> {
        let tokens = gate.wait().await?;
        let token = tokens.require_access_token()?;

        let (introspection, user_info, revoked) = tokio::join!(
            self.introspect(token, Operation::Introspect),
            self.user_info(token),
            self.revoke_then_confirm(token),
        );
        let (revocation, confirmation) = revoked?;

        Ok(DependentOutcomes {
            introspection,
            user_info,
            revocation,
            confirmation,
            tokens,
        })
    }

    async fn introspect(
        &self,
        token: &str,
        operation: Operation,
    ) -> Result<IntrospectionOutcome, OperationError> {
        let revoked_locally = self.store.is_revoked();
        match self.service.introspect(token).await {
            Ok(server_active) => {
                let outcome = IntrospectionOutcome {
                    server_active,
                    revoked_locally,
                };
                if operation == Operation::Introspect {
                    info!(
                        "Introspect successful. Token {} is {}",
                        redact(token),
                        if outcome.is_active() { "active" } else { "inactive" }
                    );
                }
                Ok(outcome)
            }
            Err(status) => {
                let err = OperationError::from_status(operation, &status);
                error!(error = %err, "introspection failed");
                Err(err)
            }
        }
    }

    async fn user_info(&self, token: &str) -> Result<UserInfo, OperationError> {
        match self.service.user_info(token).await {
            Ok(raw) => {
                info!("Received User Info: {raw}");
                Ok(UserInfo::new(raw))
            }
            Err(status) => {
                let err = OperationError::from_status(Operation::UserInfo, &status);
                error!(error = %err, "user info failed");
                Err(err)
            }
        }
    }

    async fn revoke_then_confirm(
        &self,
        token: &str,
    ) -> Result<(Result<(), OperationError>, Confirmation), LifecycleError> {
        if let Err(status) = self.service.revoke(token).await {
            let err = OperationError::from_status(Operation::Revoke, &status);
            error!(error = %err, "revoke failed, confirmation skipped");
            return Ok((Err(err), None));
        }
        self.store.mark_revoked()?;

        let confirmation = self.introspect(token, Operation::ConfirmRevocation).await;
        if let Ok(outcome) = &confirmation {
            if outcome.server_active {
                warn!(
                    "Token {} was revoked. Introspect says token is active",
                    redact(token)
                );
            } else {
                info!(
                    "Token {} was revoked. Introspect says token is inactive",
                    redact(token)
                );
            }
        }
        Ok((Ok(()), Some(confirmation)))
    }
}

//! Handshake Driver
//!
//! Consumes the Authenticate stream end-to-end and publishes the outcome on a
//! completion gate. The gate is the only way dependent operations learn that
//! tokens are ready.
//!
//! States: `Idle -> Streaming -> {Complete | Failed}`, no back-transitions.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::client::OAuthService;
use crate::error::{HandshakeError, LifecycleError};
use crate::token::{TokenPair, TokenStore};

/// Coarse handshake phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Authenticate not yet issued
    Idle,
    /// Stream open, messages arriving
    Streaming,
    /// Stream closed cleanly; tokens are frozen
    Complete,
    /// Stream closed with an error
    Failed,
}

impl HandshakePhase {
    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Streaming)
                | (Self::Streaming, Self::Streaming)
                | (Self::Streaming, Self::Complete)
                | (Self::Streaming, Self::Failed)
        )
    }

    /// Complete or Failed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Handshake state published on the gate.
#[derive(Debug, Clone)]
pub enum HandshakeState {
    /// Authenticate not yet issued
    Idle,
    /// Stream open
    Streaming {
        /// Messages processed so far
        received: usize,
    },
    /// Stream closed cleanly with the frozen token pair
    Complete(TokenPair),
    /// Stream closed with an error
    Failed(HandshakeError),
}

impl HandshakeState {
    /// The coarse phase of this state.
    #[must_use]
    pub const fn phase(&self) -> HandshakePhase {
        match self {
            Self::Idle => HandshakePhase::Idle,
            Self::Streaming { .. } => HandshakePhase::Streaming,
            Self::Complete(_) => HandshakePhase::Complete,
            Self::Failed(_) => HandshakePhase::Failed,
        }
    }

    fn is_terminal(&self) -> bool {
        self.phase().is_terminal()
    }
}

/// One-shot completion signal for dependent operations.
#[derive(Debug, Clone)]
pub struct HandshakeGate {
    state: watch::Receiver<HandshakeState>,
}

impl HandshakeGate {
    /// Waits until the handshake is terminal.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Handshake` when the handshake failed or its
    /// driver was dropped before finishing.
    pub async fn wait(&mut self) -> Result<TokenPair, LifecycleError> {
        let state = match self.state.wait_for(HandshakeState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => return Err(HandshakeError::Abandoned.into()),
        };
        match state {
            HandshakeState::Complete(pair) => Ok(pair),
            HandshakeState::Failed(err) => Err(err.into()),
            HandshakeState::Idle | HandshakeState::Streaming { .. } => {
                Err(HandshakeError::Abandoned.into())
            }
        }
    }

    /// Current phase without waiting.
    #[must_use]
    pub fn phase(&self) -> HandshakePhase {
        self.state.borrow().phase()
    }
}

/// Drives the Authenticate stream into a [`TokenStore`].
pub struct HandshakeDriver {
    store: Arc<TokenStore>,
    state: watch::Sender<HandshakeState>,
    timeout: Option<Duration>,
    progress: Option<mpsc::UnboundedSender<String>>,
}

impl HandshakeDriver {
    /// Creates an idle driver writing into `store`.
    #[must_use]
    pub fn new(store: Arc<TokenStore>) -> Self {
        let (state, _) = watch::channel(HandshakeState::Idle);
        Self {
            store,
            state,
            timeout: None,
            progress: None,
        }
    }

    /// Fails the handshake if the stream stays open longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Forwards every progress message text to `sink`.
    #[must_use]
    pub fn with_progress_sink(mut self, sink: mpsc::UnboundedSender<String>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// A gate that opens when this driver reaches a terminal state.
    #[must_use]
    pub fn gate(&self) -> HandshakeGate {
        HandshakeGate {
            state: self.state.subscribe(),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> HandshakePhase {
        self.state.borrow().phase()
    }

    /// Issues Authenticate and consumes the stream until it closes.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Handshake` when the call is rejected, the
    /// stream errors, or the deadline passes. Returns `PreconditionViolation`
    /// when the driver has already run.
    #[instrument(skip_all)]
    pub async fn run<S>(&self, service: &S) -> Result<TokenPair, LifecycleError>
    where
        S: OAuthService + ?Sized,
    {
        self.transition(HandshakeState::Streaming { received: 0 })?;

        let consumed = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.consume(service))
                .await
                .unwrap_or_else(|_| Err(HandshakeError::TimedOut { timeout }.into())),
            None => self.consume(service).await,
        };

        match consumed {
            Ok(received) => {
                let pair = self.store.freeze();
                info!(
                    received,
                    access_token = %pair.access_token_redacted(),
                    refresh_token = pair.refresh_token().is_some(),
                    "handshake complete"
                );
                self.transition(HandshakeState::Complete(pair.clone()))?;
                Ok(pair)
            }
            Err(err) => {
                self.store.freeze();
                let failure = match &err {
                    LifecycleError::Handshake(failure) => failure.clone(),
                    _ => HandshakeError::Abandoned,
                };
                error!(error = %failure, "handshake failed");
                self.transition(HandshakeState::Failed(failure))?;
                Err(err)
            }
        }
    }

    async fn consume<S>(&self, service: &S) -> Result<usize, LifecycleError>
    where
        S: OAuthService + ?Sized,
    {
        let mut stream = service
            .authenticate()
            .await
            .map_err(|status| HandshakeError::rejected(&status))?;

        let mut received = 0;
        while let Some(item) = stream.next().await {
            let progress = item.map_err(|status| HandshakeError::stream_failed(received, &status))?;
            self.store.set_from_progress(&progress)?;
            received += 1;

            debug!(received, "{}", progress.message);
            if let Some(sink) = &self.progress {
                if sink.send(progress.message.clone()).is_err() {
                    warn!("progress receiver dropped");
                }
            }
            self.transition(HandshakeState::Streaming { received })?;
        }
        Ok(received)
    }

    fn transition(&self, next: HandshakeState) -> Result<(), LifecycleError> {
        let current = self.phase();
        if !current.can_advance_to(next.phase()) {
            return Err(LifecycleError::precondition(format!(
                "illegal handshake transition {current:?} -> {:?}",
                next.phase()
            )));
        }
        self.state.send_replace(next);
        Ok(())
    }
}

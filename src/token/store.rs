//! Token Store
//!
//! Single source of truth for the token pair of one orchestration run.
//! The handshake driver is the only writer; it freezes the store when the
//! stream closes. After that the store is read-only except for the revoked
//! flag.

use parking_lot::RwLock;
use tracing::debug;

use crate::error::LifecycleError;
use crate::token::pair::{HandshakeProgress, TokenPair};

#[derive(Debug, Default)]
struct TokenState {
    pair: TokenPair,
    frozen: bool,
    revoked: bool,
}

/// Holds the current token pair and its validity.
#[derive(Debug, Default)]
pub struct TokenStore {
    state: RwLock<TokenState>,
}

impl TokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites each token present in `progress`; absent fields keep their
    /// previous value.
    ///
    /// # Errors
    ///
    /// Returns `PreconditionViolation` once the store has been frozen.
    pub fn set_from_progress(&self, progress: &HandshakeProgress) -> Result<(), LifecycleError> {
        let mut state = self.state.write();
        if state.frozen {
            return Err(LifecycleError::precondition(
                "token store written after the handshake closed",
            ));
        }
        state.pair.apply(progress);
        if progress.carries_tokens() {
            debug!(
                access = progress.access_token.is_some(),
                refresh = progress.refresh_token.is_some(),
                "token store updated"
            );
        }
        Ok(())
    }

    /// Returns the current token pair.
    #[must_use]
    pub fn snapshot(&self) -> TokenPair {
        self.state.read().pair.clone()
    }

    /// Stops accepting writes and returns the final pair.
    pub fn freeze(&self) -> TokenPair {
        let mut state = self.state.write();
        state.frozen = true;
        state.pair.clone()
    }

    /// True once the handshake has closed.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.state.read().frozen
    }

    /// Marks the access token as logically inactive. The token value is kept.
    ///
    /// # Errors
    ///
    /// Returns `PreconditionViolation` when called before the store was
    /// frozen.
    pub fn mark_revoked(&self) -> Result<(), LifecycleError> {
        let mut state = self.state.write();
        if !state.frozen {
            return Err(LifecycleError::precondition(
                "revocation recorded before the handshake completed",
            ));
        }
        state.revoked = true;
        Ok(())
    }

    /// True after a successful revocation.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.state.read().revoked
    }
}

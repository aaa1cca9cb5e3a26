//! Token values produced by the handshake.

use secrecy::{ExposeSecret, SecretString};

use crate::error::LifecycleError;
use crate::proto::AuthResponse;

/// Number of leading characters kept when a token is logged.
const REDACTED_PREFIX_LEN: usize = 6;

/// Access and refresh token as issued by the handshake.
///
/// Values are held as secrets; `Debug` never prints them.
#[derive(Debug, Clone, Default)]
pub struct TokenPair {
    access_token: Option<SecretString>,
    refresh_token: Option<SecretString>,
}

impl TokenPair {
    /// Creates a pair from plain values.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: non_empty(Some(access_token.into())),
            refresh_token: non_empty(Some(refresh_token.into())),
        }
    }

    /// The access token, if one has been received.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_ref().map(|t| t.expose_secret().as_str())
    }

    /// The refresh token, if one has been received.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|t| t.expose_secret().as_str())
    }

    /// The access token, or a `PreconditionViolation` when it is missing.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::PreconditionViolation` if no access token was
    /// received.
    pub fn require_access_token(&self) -> Result<&str, LifecycleError> {
        self.access_token()
            .ok_or_else(|| LifecycleError::precondition("no access token was issued by the handshake"))
    }

    /// Short, log-safe form of the access token.
    #[must_use]
    pub fn access_token_redacted(&self) -> String {
        self.access_token().map_or_else(|| "<none>".to_string(), redact)
    }

    pub(crate) fn apply(&mut self, progress: &HandshakeProgress) {
        if let Some(token) = &progress.access_token {
            self.access_token = Some(SecretString::new(token.clone()));
        }
        if let Some(token) = &progress.refresh_token {
            self.refresh_token = Some(SecretString::new(token.clone()));
        }
    }
}

/// One progress message of the Authenticate stream.
///
/// Token fields are `None` when the message did not carry them. An empty
/// string on the wire counts as absent.
#[derive(Clone, PartialEq, Eq)]
pub struct HandshakeProgress {
    /// Human-readable progress text
    pub message: String,
    /// Access token, when this message carries one
    pub access_token: Option<String>,
    /// Refresh token, when this message carries one
    pub refresh_token: Option<String>,
}

impl HandshakeProgress {
    /// A message without tokens.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            access_token: None,
            refresh_token: None,
        }
    }

    /// Attaches an access token.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into()).filter(|t| !t.is_empty());
        self
    }

    /// Attaches a refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into()).filter(|t| !t.is_empty());
        self
    }

    /// True when the message carries at least one token.
    #[must_use]
    pub const fn carries_tokens(&self) -> bool {
        self.access_token.is_some() || self.refresh_token.is_some()
    }
}

impl std::fmt::Debug for HandshakeProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeProgress")
            .field("message", &self.message)
            .field("access_token", &self.access_token.as_deref().map(redact))
            .field("refresh_token", &self.refresh_token.as_deref().map(redact))
            .finish()
    }
}

impl From<AuthResponse> for HandshakeProgress {
    fn from(response: AuthResponse) -> Self {
        Self {
            message: response.message,
            access_token: response.access_token.filter(|t| !t.is_empty()),
            refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
        }
    }
}

/// Log-safe rendering of a token: a short prefix followed by an ellipsis.
#[must_use]
pub fn redact(token: &str) -> String {
    if token.chars().count() <= REDACTED_PREFIX_LEN {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(REDACTED_PREFIX_LEN).collect();
    format!("{prefix}...")
}

fn non_empty(value: Option<String>) -> Option<SecretString> {
    value.filter(|v| !v.is_empty()).map(SecretString::new)
}

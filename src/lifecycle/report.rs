//! Outcomes of one orchestration run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{LifecycleError, OperationError};
use crate::token::TokenPair;

/// Result of one Introspect call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntrospectionOutcome {
    /// What the server answered
    pub server_active: bool,
    /// Whether the token had already been revoked when the call was issued
    pub revoked_locally: bool,
}

impl IntrospectionOutcome {
    /// Effective liveness: a locally revoked token is never active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.server_active && !self.revoked_locally
    }

    const fn label(&self) -> &'static str {
        if self.is_active() {
            "active"
        } else {
            "inactive"
        }
    }
}

/// Identity information bound to the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    raw: String,
}

impl UserInfo {
    /// Wraps the raw payload.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The payload exactly as the service returned it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The payload parsed as a JSON object, when it is one.
    #[must_use]
    pub fn claims(&self) -> Option<Map<String, Value>> {
        match serde_json::from_str::<Value>(&self.raw).ok()? {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// The `sub` claim, when present.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.claims()?
            .get("sub")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// How the post-revoke introspection turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationStatus {
    /// Revoke failed; confirmation was not attempted
    NotRevoked,
    /// Revoke succeeded and the server reports the token inactive
    Confirmed,
    /// Revoke succeeded but the server still reports the token active
    Unconfirmed,
    /// Revoke succeeded but the confirming introspection failed
    ConfirmationFailed,
}

/// Everything one run observed.
#[derive(Debug, Clone)]
pub struct LifecycleReport {
    /// Correlation id of the run
    pub run_id: Uuid,
    /// When the handshake was issued
    pub started_at: DateTime<Utc>,
    /// When the last dependent call finished
    pub finished_at: DateTime<Utc>,
    /// Tokens issued by the handshake
    pub tokens: TokenPair,
    /// Pre-revoke introspection
    pub introspection: Result<IntrospectionOutcome, OperationError>,
    /// Identity lookup
    pub user_info: Result<UserInfo, OperationError>,
    /// Revocation acknowledgment
    pub revocation: Result<(), OperationError>,
    /// Post-revoke introspection; `None` when Revoke failed
    pub confirmation: Option<Result<IntrospectionOutcome, OperationError>>,
}

impl LifecycleReport {
    /// Outcome of the revoke-then-confirm branch.
    #[must_use]
    pub fn revocation_status(&self) -> RevocationStatus {
        match (&self.revocation, &self.confirmation) {
            (Err(_), _) | (Ok(()), None) => RevocationStatus::NotRevoked,
            (Ok(()), Some(Ok(outcome))) if outcome.server_active => RevocationStatus::Unconfirmed,
            (Ok(()), Some(Ok(_))) => RevocationStatus::Confirmed,
            (Ok(()), Some(Err(_))) => RevocationStatus::ConfirmationFailed,
        }
    }

    /// Every failed operation, in dependency order.
    #[must_use]
    pub fn failures(&self) -> Vec<&OperationError> {
        let confirmation = self.confirmation.as_ref().and_then(|c| c.as_ref().err());
        [
            self.introspection.as_ref().err(),
            self.user_info.as_ref().err(),
            self.revocation.as_ref().err(),
            confirmation,
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Promotes the first fatal operation failure to an error.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Operation` for the first failure whose
    /// operation [`is_fatal`](crate::error::Operation::is_fatal), i.e. a failed Revoke.
    pub fn into_result(self) -> Result<Self, LifecycleError> {
        let fatal = self
            .failures()
            .into_iter()
            .find(|err| err.operation.is_fatal())
            .cloned();
        match fatal {
            Some(err) => Err(err.into()),
            None => Ok(self),
        }
    }

    /// Operator-facing lines, one per finished operation.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let token = self.tokens.access_token_redacted();
        let mut lines = Vec::with_capacity(4);

        lines.push(match &self.introspection {
            Ok(outcome) => format!("Introspect successful. Token {token} is {}", outcome.label()),
            Err(err) => format!("Introspect failed: {err}"),
        });
        lines.push(match &self.user_info {
            Ok(info) => format!("Received User Info: {}", info.as_str()),
            Err(err) => format!("User info failed: {err}"),
        });
        match (&self.revocation, &self.confirmation) {
            (Err(err), _) => lines.push(format!("Revoke failed: {err}")),
            (Ok(()), Some(Ok(outcome))) => lines.push(format!(
                "Token {token} was revoked. Introspect says token is {}",
                if outcome.server_active { "active" } else { "inactive" }
            )),
            (Ok(()), Some(Err(err))) => {
                lines.push(format!("Token {token} was revoked. Confirmation failed: {err}"));
            }
            (Ok(()), None) => lines.push(format!("Token {token} was revoked.")),
        }
        lines
    }

    /// Serializable digest without token values.
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration_ms: (self.finished_at - self.started_at).num_milliseconds(),
            active_before_revoke: self.introspection.as_ref().ok().map(IntrospectionOutcome::is_active),
            user_subject: self.user_info.as_ref().ok().and_then(UserInfo::subject),
            revocation: self.revocation_status(),
            active_after_revoke: self
                .confirmation
                .as_ref()
                .and_then(|c| c.as_ref().ok())
                .map(|outcome| outcome.server_active),
            failures: self.failures().into_iter().map(FailureSummary::from).collect(),
        }
    }
}

/// JSON-friendly view of a [`LifecycleReport`].
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    /// Correlation id of the run
    pub run_id: Uuid,
    /// When the handshake was issued
    pub started_at: DateTime<Utc>,
    /// When the last dependent call finished
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration of the run
    pub duration_ms: i64,
    /// Effective liveness before revocation, when Introspect succeeded
    pub active_before_revoke: Option<bool>,
    /// `sub` claim of the user info
    pub user_subject: Option<String>,
    /// Revoke-then-confirm outcome
    pub revocation: RevocationStatus,
    /// Raw server answer of the confirming introspection
    pub active_after_revoke: Option<bool>,
    /// Failed operations
    pub failures: Vec<FailureSummary>,
}

/// One failed operation in a [`ReportSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    /// Operation name
    pub operation: &'static str,
    /// gRPC status code
    pub code: String,
    /// Status message
    pub message: String,
}

impl From<&OperationError> for FailureSummary {
    fn from(err: &OperationError) -> Self {
        Self {
            operation: err.operation.as_str(),
            code: format!("{:?}", err.code),
            message: err.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Operation;
    use tonic::{Code, Status};

    fn report() -> LifecycleReport {
        let now = Utc::now();
        LifecycleReport {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            tokens: TokenPair::new("access-token-value", "refresh-token-value"),
            introspection: Ok(IntrospectionOutcome {
                server_active: true,
                revoked_locally: false,
            }),
            user_info: Ok(UserInfo::new(r#"{"sub":"alice","email":"alice@example.com"}"#)),
            revocation: Ok(()),
            confirmation: Some(Ok(IntrospectionOutcome {
                server_active: false,
                revoked_locally: true,
            })),
        }
    }

    #[test]
    fn test_pre_and_post_revoke_are_reported_separately() {
        let report = report();
        let lines = report.lines();

        assert_eq!(lines[0], "Introspect successful. Token access... is active");
        assert_eq!(
            lines[2],
            "Token access... was revoked. Introspect says token is inactive"
        );
        assert_eq!(report.revocation_status(), RevocationStatus::Confirmed);
    }

    #[test]
    fn test_server_disagreement_is_unconfirmed() {
        let mut report = report();
        report.confirmation = Some(Ok(IntrospectionOutcome {
            server_active: true,
            revoked_locally: true,
        }));

        assert_eq!(report.revocation_status(), RevocationStatus::Unconfirmed);
        let confirmation = report.confirmation.unwrap().unwrap();
        assert!(!confirmation.is_active());
    }

    #[test]
    fn test_failed_revocation_is_fatal() {
        let mut report = report();
        report.revocation = Err(OperationError::from_status(
            Operation::Revoke,
            &Status::internal("revocation endpoint unavailable"),
        ));
        report.confirmation = None;

        assert_eq!(report.revocation_status(), RevocationStatus::NotRevoked);
        assert_eq!(report.failures().len(), 1);
        let err = report.into_result().unwrap_err();
        assert_eq!(err.operation(), Some(Operation::Revoke));
    }

    #[test]
    fn test_sibling_failure_is_not_fatal() {
        let mut report = report();
        report.user_info = Err(OperationError::from_status(
            Operation::UserInfo,
            &Status::internal("Failed to fetch user info"),
        ));

        let report = report.into_result().unwrap();
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].operation, Operation::UserInfo);
        assert_eq!(failures[0].code, Code::Internal);
        assert!(report.lines()[1].starts_with("User info failed"));
    }

    #[test]
    fn test_user_info_accessors() {
        let info = UserInfo::new(r#"{"sub":"alice"}"#);
        assert_eq!(info.subject().as_deref(), Some("alice"));

        let opaque = UserInfo::new("not json");
        assert!(opaque.claims().is_none());
        assert!(opaque.subject().is_none());
        assert_eq!(opaque.as_str(), "not json");
    }

    #[test]
    fn test_summary_omits_tokens() {
        let summary = report().summary();
        let json = serde_json::to_string(&summary).unwrap();

        assert!(!json.contains("access-token-value"));
        assert!(!json.contains("refresh-token-value"));
        assert_eq!(summary.user_subject.as_deref(), Some("alice"));
        assert_eq!(summary.revocation, RevocationStatus::Confirmed);
        assert_eq!(summary.active_before_revoke, Some(true));
        assert_eq!(summary.active_after_revoke, Some(false));
    }

    #[test]
    fn test_non_fatal_failures_pass_through() {
        let mut report = report();
        report.introspection = Err(OperationError::from_status(
            Operation::Introspect,
            &Status::unavailable("introspection backend down"),
        ));
        report.confirmation = Some(Err(OperationError::from_status(
            Operation::ConfirmRevocation,
            &Status::deadline_exceeded("timed out"),
        )));

        let report = report.into_result().unwrap();
        assert_eq!(report.failures().len(), 2);
        assert_eq!(report.revocation_status(), RevocationStatus::ConfirmationFailed);
    }
}

//! Typed success/failure envelope every operation resolves to.

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Tagged outcome published for each handled command. Callers match on the
/// tag; nothing ever throws across the workflow boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// Operation succeeded with a payload.
    Success {
        /// Operation-specific result.
        payload: T,
    },
    /// Operation failed with a structured description.
    Failure {
        /// Machine-readable failure.
        failure: OperationFailure,
    },
}

impl<T> Outcome<T> {
    /// Wrap a success payload.
    pub fn success(payload: T) -> Self {
        Outcome::Success { payload }
    }

    /// Wrap a service error.
    pub fn failure(err: &ServiceError) -> Self {
        Outcome::Failure {
            failure: OperationFailure::from_error(err),
        }
    }
}

/// Structured failure the presentation layer renders without parsing prose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationFailure {
    /// Human-readable description.
    pub message: String,
    /// Whether retrying the same command may succeed. False for
    /// validation failures and timeouts.
    pub retryable: bool,
    /// Stable failure code, set for import failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl OperationFailure {
    /// Build from a service error, carrying its retryability.
    pub fn from_error(err: &ServiceError) -> Self {
        Self {
            message: err.to_string(),
            retryable: err.is_retryable(),
            code: None,
        }
    }

    /// Attach a stable failure code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_envelope_carries_retryability() {
        let outcome: Outcome<()> = Outcome::failure(&ServiceError::InvalidInput("bad".into()));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["failure"]["retryable"], false);
    }

    #[test]
    fn success_envelope_is_tagged() {
        let outcome = Outcome::success(serde_json::json!({"round_id": "r"}));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["payload"]["round_id"], "r");
    }
}

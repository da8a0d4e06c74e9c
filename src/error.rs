use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    bus::{BusError, rpc::RpcError},
    dao::storage::StorageError,
    state::lifecycle::InvalidTransition,
};

/// Errors that can occur in service layer operations.
///
/// Validation problems (`InvalidInput`, `InvalidState`, `Unauthorized`,
/// `NotFound`) are domain outcomes and must not be retried. `Unavailable`,
/// `Degraded` and `Bus` are infrastructure faults the caller may retry.
/// `Timeout` means the eventual state of the operation is unknown.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current round state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
    /// Message bus publish or subscription failure.
    #[error("message bus failure")]
    Bus(#[source] BusError),
}

impl ServiceError {
    /// Whether the caller may retry the operation and hope for a different
    /// outcome. Timeouts are deliberately excluded: the remote side may
    /// still process the original request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::Unavailable(_) | ServiceError::Degraded | ServiceError::Bus(_)
        )
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { what } => ServiceError::NotFound(what),
            StorageError::Conflict { message } => ServiceError::InvalidState(message),
            err @ StorageError::Unavailable { .. } => ServiceError::Unavailable(err),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<BusError> for ServiceError {
    fn from(err: BusError) -> Self {
        match err {
            // A payload that does not decode is the caller's problem, not a
            // transport fault.
            err @ BusError::Decode { .. } => ServiceError::InvalidInput(err.to_string()),
            other => ServiceError::Bus(other),
        }
    }
}

impl From<RpcError> for ServiceError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Timeout { .. } => ServiceError::Timeout,
            RpcError::Bus(bus) => ServiceError::Bus(bus),
            RpcError::Decode { .. } => ServiceError::InvalidState(err.to_string()),
            RpcError::Remote(message) => ServiceError::InvalidState(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::storage::StorageError;

    #[test]
    fn infrastructure_errors_are_retryable() {
        let err = ServiceError::from(StorageError::unavailable(
            "connection reset".into(),
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
        ));
        assert!(err.is_retryable());
        assert!(ServiceError::Degraded.is_retryable());
    }

    #[test]
    fn domain_errors_and_timeouts_are_not_retryable() {
        assert!(!ServiceError::InvalidInput("bad".into()).is_retryable());
        assert!(!ServiceError::NotFound("round".into()).is_retryable());
        assert!(!ServiceError::Timeout.is_retryable());
    }

    #[test]
    fn storage_not_found_maps_to_not_found() {
        let err = ServiceError::from(StorageError::not_found("round `x`"));
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}

use serde::Serialize;
use thiserror::Error;

/// Errors returned by the section lock, the list store and the key-value stores
#[derive(Debug, Error)]
pub enum VaultError {
    /// Malformed input: non-4-digit PIN, blank name, bad import data, bad index
    #[error("{0}")]
    Validation(String),

    /// A list with the same (case-insensitive) name already exists
    #[error("A list named '{0}' already exists")]
    DuplicateName(String),

    /// Admin-only operation attempted by a user
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// PIN mismatch
    #[error("{0}")]
    Authentication(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    pub fn validation(msg: impl Into<String>) -> Self {
        VaultError::Validation(msg.into())
    }

    pub fn denied(action: impl Into<String>) -> Self {
        VaultError::PermissionDenied(action.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        VaultError::Authentication(msg.into())
    }
}

pub type VaultResult<T> = Result<T, VaultError>;

/// Structured `{ success, message }` result the UI can render without matching on errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }

    /// Collapse a result into an outcome, using `success_message` on `Ok`
    pub fn from_result<T>(result: VaultResult<T>, success_message: impl Into<String>) -> Self {
        match result {
            Ok(_) => Self::ok(success_message),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_error_keeps_message() {
        let result: VaultResult<()> = Err(VaultError::DuplicateName("Favorites".to_string()));
        let outcome = Outcome::from_result(result, "Created");
        assert!(!outcome.success);
        assert_eq!(outcome.message, "A list named 'Favorites' already exists");
    }

    #[test]
    fn test_outcome_from_ok_uses_success_message() {
        let outcome = Outcome::from_result(Ok::<_, VaultError>(3), "Imported 3 lists");
        assert!(outcome.success);
        assert_eq!(outcome.message, "Imported 3 lists");
    }

    #[test]
    fn test_outcome_serializes_to_success_message_shape() {
        let json = serde_json::to_value(Outcome::failed("Incorrect PIN")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "message": "Incorrect PIN" }));
    }
}

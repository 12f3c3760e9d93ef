//! Error taxonomy shared by every engine operation.
//!
//! | Variant | Cause | Who is at fault |
//! |---|---|---|
//! | [`UnsupportedFormat`](EngineError::UnsupportedFormat) | bytes or extension outside {PNG, JPEG} | caller |
//! | [`CorruptImage`](EngineError::CorruptImage) | bytes fail to decode | caller |
//! | [`UnknownAction`](EngineError::UnknownAction) | action name not registered | caller |
//! | [`InvalidParameter`](EngineError::InvalidParameter) | missing or malformed action parameter | caller |
//! | [`NotFound`](EngineError::NotFound) | image or generation id absent | caller |
//! | [`StorageFailure`](EngineError::StorageFailure) | blob or record store failed | system |
//!
//! None of these are retried automatically. The boundary layer (the CLI here,
//! an HTTP layer elsewhere) maps them to user-visible responses.

use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Upload a valid image. The file was either not an image or a corrupted image: {0}")]
    CorruptImage(String),
    #[error("The action {0} is not valid")]
    UnknownAction(String),
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },
    #[error("Storage failure: {0}")]
    StorageFailure(#[from] StoreError),
}

impl EngineError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error was caused by the request rather than by the system.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::StorageFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failure_is_system_error() {
        let err = EngineError::from(StoreError::Rejected("disk full".into()));
        assert!(!err.is_user_error());
    }

    #[test]
    fn decode_errors_are_user_errors() {
        assert!(EngineError::CorruptImage("truncated".into()).is_user_error());
        assert!(EngineError::UnsupportedFormat("gif".into()).is_user_error());
    }

    #[test]
    fn unknown_action_message_names_action() {
        let err = EngineError::UnknownAction("sharpen".into());
        assert_eq!(err.to_string(), "The action sharpen is not valid");
    }

    #[test]
    fn invalid_parameter_message() {
        let err = EngineError::invalid("mode", "missing");
        assert_eq!(err.to_string(), "Invalid parameter `mode`: missing");
    }
}

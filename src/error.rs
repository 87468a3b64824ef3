//! Error types for cats-ssr
//!
//! Configuration errors are the only failures that escape `StateSync::run`.
//! Request failures are captured into the `error` field of the observable
//! state, so every error type that can end up there must be `Clone`.

use thiserror::Error;

/// Invalid `StateConfig`, reported synchronously at setup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("transfer key cannot be used together with only_browser")]
    TransferKeyWithOnlyBrowser,

    #[error("transfer key must not be empty")]
    EmptyTransferKey,
}

/// Failures talking to the cat API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Cat API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode cat API response: {message}")]
    Decode { message: String },

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

impl ApiError {
    /// True when the API answered 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::EmptyTransferKey.to_string(),
            "transfer key must not be empty"
        );
        assert!(ConfigError::TransferKeyWithOnlyBrowser
            .to_string()
            .contains("only_browser"));
    }

    #[test]
    fn test_api_error_not_found() {
        let err = ApiError::Status {
            status: 404,
            body: "no such cat".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Cat API error 404: no such cat");

        let err = ApiError::Decode {
            message: "eof".to_string(),
        };
        assert!(!err.is_not_found());
    }
}

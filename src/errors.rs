use thiserror::Error;

use crate::history::store::StoreError;

#[derive(Debug, Error)]
pub enum CuratorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed record: {0}")]
    DataShape(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Implement From traits for common error types to simplify conversion

impl From<std::io::Error> for CuratorError {
    fn from(e: std::io::Error) -> Self {
        CuratorError::Store(e.to_string())
    }
}

impl From<reqwest::Error> for CuratorError {
    fn from(e: reqwest::Error) -> Self {
        CuratorError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for CuratorError {
    fn from(e: serde_json::Error) -> Self {
        CuratorError::Internal(format!("Serialization error: {}", e))
    }
}

impl From<StoreError> for CuratorError {
    fn from(e: StoreError) -> Self {
        CuratorError::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        let err = CuratorError::Config("start date is after end date".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: start date is after end date"
        );

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(CuratorError::from(io), CuratorError::Store(_)));
    }
}

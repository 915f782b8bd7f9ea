use std::fmt;

#[derive(Debug)]
pub enum FetchError {
    NetworkError(String),
    ParseError(String),
    HttpStatus(u16),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            FetchError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            FetchError::HttpStatus(code) => write!(f, "HTTP status {}", code),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::ParseError(err.to_string())
    }
}

//! Harness error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported fixture version {0} (expected 1)")]
    UnsupportedVersion(u32),
    #[error("fixture '{case}': {message}")]
    Fixture { case: String, message: String },
}

impl HarnessError {
    pub(crate) fn fixture(case: &str, message: impl Into<String>) -> Self {
        Self::Fixture {
            case: case.to_string(),
            message: message.into(),
        }
    }
}

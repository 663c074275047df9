//! Domain error types.

/// Top-level error type for regimefolio.
#[derive(Debug, thiserror::Error)]
pub enum AllocatorError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&AllocatorError> for std::process::ExitCode {
    fn from(err: &AllocatorError) -> Self {
        let code: u8 = match err {
            AllocatorError::Io(_) | AllocatorError::Serialization(_) => 1,
            AllocatorError::ConfigParse { .. }
            | AllocatorError::ConfigMissing { .. }
            | AllocatorError::ConfigInvalid { .. } => 2,
            AllocatorError::Data { .. }
            | AllocatorError::NoData { .. }
            | AllocatorError::InvalidInput { .. } => 3,
            AllocatorError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

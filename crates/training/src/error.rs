use thiserror::Error;

/// Result alias shared by every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, TrainingError>;

/// Coarse classification of [`TrainingError`] values, useful for callers that
/// only need to branch on the category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    IndexOutOfBounds,
    UnsupportedOption,
    Config,
    Io,
    Runtime,
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    ConfigFormat(String),

    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("index {index} out of bounds for dataset of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("unsupported option: {0}")]
    UnsupportedOption(String),

    #[error("training utility failed: {0}")]
    Runtime(String),
}

impl TrainingError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOption(message.into())
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    pub fn validation(messages: Vec<String>) -> Self {
        Self::Validation(messages)
    }

    pub fn out_of_bounds(index: i64, len: usize) -> Self {
        Self::IndexOutOfBounds { index, len }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TrainingError::Io(_) => ErrorKind::Io,
            TrainingError::ConfigFormat(_) | TrainingError::Validation(_) => ErrorKind::Config,
            TrainingError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            TrainingError::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
            TrainingError::UnsupportedOption(_) => ErrorKind::UnsupportedOption,
            TrainingError::Runtime(_) => ErrorKind::Runtime,
        }
    }
}

impl From<toml::de::Error> for TrainingError {
    fn from(value: toml::de::Error) -> Self {
        TrainingError::ConfigFormat(value.to_string())
    }
}

impl From<serde_json::Error> for TrainingError {
    fn from(value: serde_json::Error) -> Self {
        TrainingError::ConfigFormat(value.to_string())
    }
}

impl From<candle_core::Error> for TrainingError {
    fn from(value: candle_core::Error) -> Self {
        TrainingError::Runtime(value.to_string())
    }
}

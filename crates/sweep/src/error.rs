use parley_core::{CoreError, EngineError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("config error: {0}")]
    Config(String),
    #[error("trial error: {0}")]
    Trial(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("serialize error: {0}")]
    Serialize(String),
}

impl SweepError {
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<std::io::Error> for SweepError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for SweepError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value.to_string())
    }
}

impl From<CoreError> for SweepError {
    fn from(value: CoreError) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<EngineError> for SweepError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::EmptyRoster | EngineError::InvalidSetup(_) => {
                Self::Config(value.to_string())
            }
            EngineError::DeadlineExceeded { .. } => Self::Trial(value.to_string()),
        }
    }
}

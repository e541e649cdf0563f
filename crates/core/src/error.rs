use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown agent archetype: {0}")]
    UnknownArchetype(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("roster is empty")]
    EmptyRoster,
    #[error("invalid setup: {0}")]
    InvalidSetup(String),
    #[error("deadline exceeded at turn {turn} after {elapsed_ms}ms")]
    DeadlineExceeded { turn: usize, elapsed_ms: u64 },
}

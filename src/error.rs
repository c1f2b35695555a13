use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Rejected user input. Surfaced to callers as a 400.
    #[error("{0}")]
    InvalidInput(String),

    #[error("language model error: {0}")]
    LanguageModel(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl AgentError {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, AgentError::InvalidInput(_))
    }
}

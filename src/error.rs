use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("format error: {0}")]
    Format(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    InsufficientInstances(String),

    #[error("single-pass stream was already consumed")]
    StreamConsumed,

    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("missing stream '{0}'")]
    MissingStream(String),

    #[error("unknown artifact '{0}'")]
    UnknownArtifact(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = EvalError> = std::result::Result<T, E>;

impl EvalError {
    pub fn format(msg: impl Into<String>) -> Self {
        EvalError::Format(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        EvalError::Config(msg.into())
    }
}

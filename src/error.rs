use thiserror::Error;

/// Errors raised by the pipeline.
///
/// Configuration problems are raised as soon as a value is parsed or a component is
/// constructed. Data problems are raised when input does not satisfy the shape a
/// component needs. Scorer failures are passed through untouched.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid mode string, missing or unusable embedding source, bad numeric setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Input data that cannot be processed (empty corpus, ragged groups, zero totals).
    #[error("data error: {0}")]
    Data(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata blob could not be written or read back.
    #[error("persistence error: {0}")]
    Persist(#[from] serde_cbor::Error),

    /// Failure reported by the external scorer.
    #[error(transparent)]
    Scorer(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Configuration(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        PipelineError::Data(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

use collector::CollectError;
use thiserror::Error;

pub type ImportResult<T> = Result<T, ImportError>;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("download failed: {0}")]
    Transfer(#[from] CollectError),
    #[error("malformed CSV at line {line}: {message}")]
    Parse { line: u64, message: String },
    #[error("Dados do SES/SC não estão íntegros! ({0})")]
    DataIntegrity(String),
    #[error("summary store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("could not encode case records: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ImportError {
    pub fn data_integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity(message.into())
    }

    /// Errors caused by the upstream file itself rather than by our side.
    pub fn is_bad_data(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::DataIntegrity(_))
    }
}

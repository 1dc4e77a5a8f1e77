use thiserror::Error;

/// Failure while reading or writing one of the on-disk stores
/// (session ledger, predictor blob, config, corpus, csv export).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to replace store file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("csv export error: {0}")]
    Csv(#[from] csv::Error),
}

/// Failure inside the difficulty model. Always recovered by the
/// deterministic fallback rule, never surfaced to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error("model produced a non-finite value")]
    NonFinite,

    #[error("model shape mismatch: expected {expected} inputs, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("model unavailable: {0}")]
    Unavailable(String),
}

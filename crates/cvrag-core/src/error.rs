use thiserror::Error;

/// Failure taxonomy of the retrieval engine. Variants map to distinct
/// remedies: configuration needs operator intervention, validation is a
/// caller bug, precondition means "build or load first", corruption means
/// "rebuild the index", and backend failures may warrant a caller retry.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not ready: {0}")]
    Precondition(String),

    #[error("Corrupt index: {0}")]
    IndexCorrupt(String),

    #[error("Embedding backend failure: {0}")]
    EmbeddingBackend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

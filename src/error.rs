use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Collection already exists: {0}")]
    DuplicateCollection(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Record already exists: {0}")]
    DuplicateRecord(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Record embedder {record} does not match collection embedder {collection}")]
    EmbedderMismatch { record: String, collection: String },

    #[error("Record {0} has an empty embedding")]
    EmptyEmbedding(String),

    #[error("Unknown embedder: {0}")]
    UnknownEmbedder(String),

    #[error("Missing credential: {0} environment variable not set")]
    MissingCredential(String),

    #[error("Remote embedding call failed: {0}")]
    RemoteCallFailed(String),

    #[error("Dimension mismatch: {left} != {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Top-k selection picked {selected} records, expected {expected}")]
    SelectionSizeMismatch { selected: usize, expected: usize },

    #[error("Invalid k: {0} (k must be at least 1)")]
    InvalidK(usize),
}

pub type Result<T> = std::result::Result<T, EmbedStoreError>;

impl From<serde_json::Error> for EmbedStoreError {
    fn from(err: serde_json::Error) -> Self {
        EmbedStoreError::Serialization(err.to_string())
    }
}

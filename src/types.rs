use serde::{Deserialize, Serialize};

/// A vector embedding (array of f64 values)
pub type Embedding = Vec<f64>;

/// Identifier of a record within a collection
pub type RecordId = String;

/// Identifier of a collection within a database
pub type CollectionId = String;

/// Statistics about a collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Collection id
    pub id: CollectionId,

    /// Embedder every record in the collection was produced by
    pub embedder_id: String,

    /// Number of records in the collection
    pub record_count: usize,

    /// Dimensionality of stored embeddings (0 when the collection is empty)
    pub dimensions: usize,

    /// Memory held by record payloads, in bytes (approximate)
    pub memory_bytes: usize,
}

//! Records: one content blob plus its embedding and embedder identity

use crate::embedder::EmbedderRegistry;
use crate::error::Result;
use crate::types::{Embedding, RecordId};

use serde::{Deserialize, Serialize};
use std::fmt;

/// One piece of content with the vector it embeds to
///
/// Records are immutable once constructed; replacing one is a delete
/// followed by an add. The JSON wire format carries `blob` as text, so
/// non-UTF-8 content does not round-trip byte-for-byte through a persisted
/// database file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    id: RecordId,
    embedder_id: String,
    #[serde(with = "blob_text")]
    blob: Vec<u8>,
    embedding: Embedding,
}

impl Record {
    /// Construct a record by embedding `blob` with the embedder registered
    /// under `embedder_id`
    ///
    /// Fails when the identifier does not resolve or the embedding call
    /// fails; no record exists in either case.
    pub fn new(
        registry: &EmbedderRegistry,
        embedder_id: impl Into<String>,
        blob: impl Into<Vec<u8>>,
        id: impl Into<RecordId>,
    ) -> Result<Self> {
        let embedder_id = embedder_id.into();
        let blob = blob.into();
        let embedder = registry.resolve(&embedder_id)?;
        let embedding = embedder.embed(&blob)?;
        Ok(Self {
            id: id.into(),
            embedder_id,
            blob,
            embedding,
        })
    }

    /// Assemble a record from an embedding computed elsewhere
    pub fn from_parts(
        id: impl Into<RecordId>,
        embedder_id: impl Into<String>,
        blob: impl Into<Vec<u8>>,
        embedding: Embedding,
    ) -> Self {
        Self {
            id: id.into(),
            embedder_id: embedder_id.into(),
            blob: blob.into(),
            embedding,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    pub fn embedding(&self) -> &[f64] {
        &self.embedding
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview = self.blob.len().min(100);
        let mut blob = String::from_utf8_lossy(&self.blob[..preview]).into_owned();
        if self.blob.len() > 100 {
            blob.push_str("...");
        }

        let shown = self.embedding.len().min(5);
        let head: Vec<String> = self.embedding[..shown]
            .iter()
            .map(|v| format!("{:.2}", v))
            .collect();
        let tail = if self.embedding.len() > 5 { ", ..." } else { "" };

        write!(
            f,
            "Record{{id: {}, embedder: {}, embedding: [{}{}], blob: {}}}",
            self.id,
            self.embedder_id,
            head.join(", "),
            tail,
            blob
        )
    }
}

/// Blob bytes are carried as JSON text on the wire
mod blob_text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(blob: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(blob))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(deserializer)?.into_bytes())
    }
}

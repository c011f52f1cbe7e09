//! Collections of embedded records and exact top-K retrieval

use crate::embedder::EmbedderRegistry;
use crate::error::{EmbedStoreError, Result};
use crate::record::Record;
use crate::similarity::cosine_similarity;
use crate::types::{CollectionId, CollectionStats, RecordId};

use std::collections::HashMap;
use std::sync::Arc;

/// A named, single-embedder set of records
///
/// Every record in a collection carries the collection's embedder identity,
/// so one query embedding is comparable against all of them.
#[derive(Clone)]
pub struct Collection {
    id: CollectionId,
    embedder_id: String,
    records: HashMap<RecordId, Record>,
    registry: Arc<EmbedderRegistry>,
}

impl Collection {
    /// Create an empty collection bound to the embedder registered under
    /// `embedder_id`
    ///
    /// Fails with `UnknownEmbedder` when the identifier does not resolve in
    /// `registry`.
    pub fn new(
        id: impl Into<CollectionId>,
        embedder_id: impl Into<String>,
        registry: Arc<EmbedderRegistry>,
    ) -> Result<Self> {
        let embedder_id = embedder_id.into();
        registry.resolve(&embedder_id)?;
        Ok(Self {
            id: id.into(),
            embedder_id,
            records: HashMap::new(),
            registry,
        })
    }

    /// Rebuild a collection from persisted records, revalidating the
    /// construction invariants
    pub(crate) fn from_records(
        id: CollectionId,
        embedder_id: String,
        records: HashMap<RecordId, Record>,
        registry: Arc<EmbedderRegistry>,
    ) -> Result<Self> {
        registry.resolve(&embedder_id)?;
        for record in records.values() {
            if record.embedder_id() != embedder_id {
                return Err(EmbedStoreError::EmbedderMismatch {
                    record: record.embedder_id().to_string(),
                    collection: embedder_id,
                });
            }
            if record.embedding().is_empty() {
                return Err(EmbedStoreError::EmptyEmbedding(record.id().to_string()));
            }
        }
        Ok(Self {
            id,
            embedder_id,
            records,
            registry,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    /// Number of records in the collection
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids of all records, in no particular order
    pub fn record_ids(&self) -> Vec<&str> {
        self.records.keys().map(String::as_str).collect()
    }

    pub(crate) fn records(&self) -> &HashMap<RecordId, Record> {
        &self.records
    }

    /// Add a record
    ///
    /// The record id must be new to the collection, the record must carry
    /// this collection's embedder identity, and its embedding must be
    /// non-empty. On failure the record set is unchanged.
    pub fn add_record(&mut self, record: Record) -> Result<()> {
        if self.records.contains_key(record.id()) {
            return Err(EmbedStoreError::DuplicateRecord(record.id().to_string()));
        }
        if record.embedder_id() != self.embedder_id {
            return Err(EmbedStoreError::EmbedderMismatch {
                record: record.embedder_id().to_string(),
                collection: self.embedder_id.clone(),
            });
        }
        if record.embedding().is_empty() {
            return Err(EmbedStoreError::EmptyEmbedding(record.id().to_string()));
        }
        self.records.insert(record.id().to_string(), record);
        Ok(())
    }

    /// Copy of the record with the given id
    pub fn get_record(&self, id: &str) -> Result<Record> {
        self.records
            .get(id)
            .cloned()
            .ok_or_else(|| EmbedStoreError::RecordNotFound(id.to_string()))
    }

    /// Remove the record with the given id
    pub fn delete_record(&mut self, id: &str) -> Result<()> {
        self.records
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| EmbedStoreError::RecordNotFound(id.to_string()))
    }

    /// Retrieve the `k` records most similar to `query`
    ///
    /// The query blob is embedded with this collection's embedder and
    /// compared against every record by cosine similarity. When the
    /// collection holds `k` records or fewer, every record is returned.
    /// Otherwise exactly `k` come back: all records scoring strictly above
    /// the k-th largest similarity, then records tied at that score, in no
    /// particular order, until `k` are selected. `k == 0` fails fast with
    /// `InvalidK`.
    pub fn query(&self, query: &[u8], k: usize) -> Result<Vec<Record>> {
        if k == 0 {
            return Err(EmbedStoreError::InvalidK(k));
        }

        let embedder = self.registry.resolve(&self.embedder_id)?;
        let query_embedding = embedder.embed(query)?;

        if self.records.len() <= k {
            return Ok(self.records.values().cloned().collect());
        }

        let mut similarities: HashMap<&str, f64> = HashMap::with_capacity(self.records.len());
        for (id, record) in &self.records {
            let score = cosine_similarity(&query_embedding, record.embedding())?;
            similarities.insert(id, score);
        }

        let mut scores: Vec<f64> = similarities.values().copied().collect();
        scores.sort_unstable_by(|a, b| b.total_cmp(a));
        let threshold = scores[k - 1];

        let mut selected = Vec::with_capacity(k);
        if threshold == scores[k] {
            // A tie straddles the cutoff: take the unambiguous winners
            // first, then threshold-scored records until k are picked.
            for (id, score) in &similarities {
                if *score > threshold {
                    selected.push(self.records[*id].clone());
                }
            }
            for (id, score) in &similarities {
                if *score == threshold {
                    selected.push(self.records[*id].clone());
                    if selected.len() == k {
                        break;
                    }
                }
            }
        } else {
            for (id, score) in &similarities {
                if *score >= threshold {
                    selected.push(self.records[*id].clone());
                }
            }
        }

        if selected.len() != k {
            return Err(EmbedStoreError::SelectionSizeMismatch {
                selected: selected.len(),
                expected: k,
            });
        }
        Ok(selected)
    }

    /// Summary statistics for the collection
    pub fn stats(&self) -> CollectionStats {
        let dimensions = self
            .records
            .values()
            .next()
            .map(|r| r.embedding().len())
            .unwrap_or(0);
        let memory_bytes = self
            .records
            .values()
            .map(|r| r.embedding().len() * std::mem::size_of::<f64>() + r.blob().len())
            .sum();

        CollectionStats {
            id: self.id.clone(),
            embedder_id: self.embedder_id.clone(),
            record_count: self.records.len(),
            dimensions,
            memory_bytes,
        }
    }
}

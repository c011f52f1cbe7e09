//! EmbedStore: an in-memory vector record store
//!
//! Holds named collections of content records, each carrying the embedding
//! vector its content maps to, and answers exact top-K similarity queries
//! against them by brute-force cosine ranking. Built for single-process
//! workloads of hundreds to low thousands of vectors per collection, where
//! exact search beats the operational cost of an ANN index.
//!
//! # Example
//!
//! ```ignore
//! use embedstore::{Database, EmbedderRegistry, HashEmbedder, Record};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(EmbedderRegistry::new());
//! registry.register("hash", Arc::new(HashEmbedder::new(256)));
//!
//! let db = Database::new(registry.clone());
//! db.create_collection("notes", "hash")?;
//!
//! let record = Record::new(&registry, "hash", "the quick brown fox", "note-1")?;
//! db.add_record("notes", record)?;
//!
//! let hits = db.query("notes", b"a quick fox", 1)?;
//! assert_eq!(hits[0].id(), "note-1");
//! ```
//!
//! Embedders resolve through an explicit [`EmbedderRegistry`]; identifiers
//! of the form `remote/<model>` call out to a hosted inference endpoint.
//! The whole database persists to a flat JSON file via [`Database::save`]
//! and [`Database::load`].

pub mod collection;
pub mod embedder;
pub mod error;
pub mod record;
pub mod similarity;
pub mod types;

pub use collection::Collection;
pub use embedder::{Embedder, EmbedderRegistry, HashEmbedder, MockEmbedder, RemoteEmbedder};
pub use error::{EmbedStoreError, Result};
pub use record::Record;
pub use similarity::cosine_similarity;
pub use types::{CollectionId, CollectionStats, Embedding, RecordId};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Wire format of a persisted database file
#[derive(Serialize, Deserialize)]
struct DatabaseData {
    collections: HashMap<String, CollectionData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionData {
    id: String,
    embedder_id: String,
    embeddings: HashMap<String, Record>,
}

/// An owned set of collections routing record and query operations
///
/// Structural mutation of the collection map (adding or deleting a
/// collection) is serialized by one read/write lock, and reads of the map
/// take the same lock. Each collection carries its own lock, so record
/// operations and queries against one collection never wait on another.
/// Queries observe the record set as of lock acquisition; no snapshot
/// isolation is promised across concurrent record mutation.
pub struct Database {
    collections: RwLock<HashMap<String, Arc<RwLock<Collection>>>>,
    registry: Arc<EmbedderRegistry>,
}

impl Database {
    /// Create an empty database resolving embedders through `registry`
    pub fn new(registry: Arc<EmbedderRegistry>) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            registry,
        }
    }

    /// Registry this database resolves embedders through
    pub fn registry(&self) -> &Arc<EmbedderRegistry> {
        &self.registry
    }

    /// Add a collection
    ///
    /// Fails with `DuplicateCollection` when a collection with the same id
    /// already exists.
    pub fn add_collection(&self, collection: Collection) -> Result<()> {
        let mut collections = self.collections.write();
        if collections.contains_key(collection.id()) {
            return Err(EmbedStoreError::DuplicateCollection(
                collection.id().to_string(),
            ));
        }
        tracing::debug!(collection = %collection.id(), "adding collection");
        collections.insert(
            collection.id().to_string(),
            Arc::new(RwLock::new(collection)),
        );
        Ok(())
    }

    /// Create and add an empty collection bound to `embedder_id`
    pub fn create_collection(&self, id: &str, embedder_id: &str) -> Result<()> {
        let collection = Collection::new(id, embedder_id, self.registry.clone())?;
        self.add_collection(collection)
    }

    /// Remove a collection and all its records
    pub fn delete_collection(&self, id: &str) -> Result<()> {
        let mut collections = self.collections.write();
        match collections.remove(id) {
            Some(_) => {
                tracing::debug!(collection = %id, "deleted collection");
                Ok(())
            }
            None => Err(EmbedStoreError::CollectionNotFound(id.to_string())),
        }
    }

    /// Snapshot copy of a collection
    ///
    /// Later mutation of the stored collection is not visible through the
    /// returned value; re-fetch to observe it.
    pub fn get_collection(&self, id: &str) -> Result<Collection> {
        let handle = self.collection(id)?;
        let guard = handle.read();
        Ok(guard.clone())
    }

    /// Whether a collection with the given id exists
    pub fn contains_collection(&self, id: &str) -> bool {
        self.collections.read().contains_key(id)
    }

    /// All collection ids with their record counts
    pub fn list_collections(&self) -> Vec<(String, usize)> {
        self.collections
            .read()
            .iter()
            .map(|(id, handle)| (id.clone(), handle.read().len()))
            .collect()
    }

    /// Summary statistics for a collection
    pub fn collection_stats(&self, id: &str) -> Result<CollectionStats> {
        Ok(self.collection(id)?.read().stats())
    }

    /// Add a record to a collection
    pub fn add_record(&self, collection_id: &str, record: Record) -> Result<()> {
        self.collection(collection_id)?.write().add_record(record)
    }

    /// Embed `blob` with the collection's embedder and add the result as a
    /// new record
    ///
    /// The embedding call runs outside the collection lock, so a slow
    /// remote embedder does not block concurrent readers; a failed embed
    /// leaves the collection untouched.
    pub fn add_blob(&self, collection_id: &str, record_id: &str, blob: &[u8]) -> Result<()> {
        let handle = self.collection(collection_id)?;
        let embedder_id = handle.read().embedder_id().to_string();
        let record = Record::new(&self.registry, embedder_id, blob, record_id)?;
        let result = handle.write().add_record(record);
        result
    }

    /// Copy of a record from a collection
    pub fn get_record(&self, collection_id: &str, record_id: &str) -> Result<Record> {
        self.collection(collection_id)?.read().get_record(record_id)
    }

    /// Remove a record from a collection
    pub fn delete_record(&self, collection_id: &str, record_id: &str) -> Result<()> {
        self.collection(collection_id)?
            .write()
            .delete_record(record_id)
    }

    /// Top-K query against a collection (see [`Collection::query`])
    pub fn query(&self, collection_id: &str, query: &[u8], k: usize) -> Result<Vec<Record>> {
        self.collection(collection_id)?.read().query(query, k)
    }

    fn collection(&self, id: &str) -> Result<Arc<RwLock<Collection>>> {
        self.collections
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| EmbedStoreError::CollectionNotFound(id.to_string()))
    }

    /// Serialize the whole database to `path` as flat JSON
    ///
    /// The file is written to a temporary sibling and renamed into place,
    /// so a crash mid-write leaves any previous file intact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let data = self.to_data();
        let json = serde_json::to_vec(&data)?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        tracing::info!(
            path = %path.display(),
            collections = data.collections.len(),
            "saved database"
        );
        Ok(())
    }

    /// Load a database previously written by [`Database::save`]
    ///
    /// Fails fast on unreadable or malformed files. Every loaded
    /// collection's embedder id must resolve in `registry`, matching the
    /// construction invariant.
    pub fn load<P: AsRef<Path>>(path: P, registry: Arc<EmbedderRegistry>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read(path)?;
        let data: DatabaseData = serde_json::from_slice(&json)?;

        let mut collections = HashMap::with_capacity(data.collections.len());
        for (id, collection_data) in data.collections {
            let collection = Collection::from_records(
                collection_data.id,
                collection_data.embedder_id,
                collection_data.embeddings,
                registry.clone(),
            )?;
            collections.insert(id, Arc::new(RwLock::new(collection)));
        }

        tracing::info!(
            path = %path.display(),
            collections = collections.len(),
            "loaded database"
        );
        Ok(Self {
            collections: RwLock::new(collections),
            registry,
        })
    }

    fn to_data(&self) -> DatabaseData {
        let collections = self.collections.read();
        DatabaseData {
            collections: collections
                .iter()
                .map(|(id, handle)| {
                    let guard = handle.read();
                    (
                        id.clone(),
                        CollectionData {
                            id: guard.id().to_string(),
                            embedder_id: guard.embedder_id().to_string(),
                            embeddings: guard.records().clone(),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn registry() -> Arc<EmbedderRegistry> {
        let registry = EmbedderRegistry::new();
        registry.register("mock", Arc::new(MockEmbedder::new()));
        registry.register("hash", Arc::new(HashEmbedder::new(128)));
        Arc::new(registry)
    }

    #[test]
    fn test_collection_lifecycle() {
        let db = Database::new(registry());

        db.create_collection("notes", "mock").unwrap();
        assert!(db.contains_collection("notes"));
        assert!(matches!(
            db.create_collection("notes", "mock"),
            Err(EmbedStoreError::DuplicateCollection(_))
        ));

        let snapshot = db.get_collection("notes").unwrap();
        assert_eq!(snapshot.id(), "notes");
        assert_eq!(snapshot.embedder_id(), "mock");

        db.delete_collection("notes").unwrap();
        assert!(!db.contains_collection("notes"));
        assert!(matches!(
            db.delete_collection("notes"),
            Err(EmbedStoreError::CollectionNotFound(_))
        ));
        assert!(matches!(
            db.get_collection("notes"),
            Err(EmbedStoreError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn test_create_collection_unknown_embedder() {
        let db = Database::new(registry());
        assert!(matches!(
            db.create_collection("notes", "missing"),
            Err(EmbedStoreError::UnknownEmbedder(_))
        ));
        assert!(!db.contains_collection("notes"));
    }

    #[test]
    fn test_get_collection_is_a_snapshot() {
        let db = Database::new(registry());
        db.create_collection("notes", "mock").unwrap();

        let before = db.get_collection("notes").unwrap();
        db.add_blob("notes", "r1", b"some content").unwrap();

        assert_eq!(before.len(), 0);
        assert_eq!(db.get_collection("notes").unwrap().len(), 1);
    }

    #[test]
    fn test_record_delegation() {
        let db = Database::new(registry());
        db.create_collection("notes", "mock").unwrap();

        let record = Record::new(db.registry(), "mock", &b"hello"[..], "r1").unwrap();
        db.add_record("notes", record.clone()).unwrap();

        assert_eq!(db.get_record("notes", "r1").unwrap(), record);
        db.delete_record("notes", "r1").unwrap();
        assert!(matches!(
            db.get_record("notes", "r1"),
            Err(EmbedStoreError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_missing_collection_dominates() {
        let db = Database::new(registry());
        let record = Record::new(db.registry(), "mock", &b"hello"[..], "r1").unwrap();

        assert!(matches!(
            db.add_record("nope", record),
            Err(EmbedStoreError::CollectionNotFound(_))
        ));
        assert!(matches!(
            db.get_record("nope", "also-missing"),
            Err(EmbedStoreError::CollectionNotFound(_))
        ));
        assert!(matches!(
            db.delete_record("nope", "also-missing"),
            Err(EmbedStoreError::CollectionNotFound(_))
        ));
        assert!(matches!(
            db.query("nope", b"query", 0),
            Err(EmbedStoreError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn test_add_blob_and_query() {
        let db = Database::new(registry());
        db.create_collection("docs", "hash").unwrap();

        db.add_blob("docs", "rust", b"rust is a systems programming language")
            .unwrap();
        db.add_blob("docs", "ml", b"machine learning with neural networks")
            .unwrap();

        let hits = db.query("docs", b"systems programming in rust", 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), "rust");
    }

    #[test]
    fn test_list_collections() {
        let db = Database::new(registry());
        db.create_collection("a", "mock").unwrap();
        db.create_collection("b", "mock").unwrap();
        db.add_blob("b", "r1", b"content").unwrap();

        let mut listing = db.list_collections();
        listing.sort();
        assert_eq!(listing, vec![("a".to_string(), 0), ("b".to_string(), 1)]);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let registry = registry();

        let db = Database::new(registry.clone());
        db.create_collection("notes", "mock").unwrap();
        for i in 0..10 {
            db.add_blob("notes", &format!("r{}", i), format!("content {}", i).as_bytes())
                .unwrap();
        }
        let expected = db.get_record("notes", "r3").unwrap();
        db.save(&path).unwrap();

        let reloaded = Database::load(&path, registry).unwrap();
        assert_eq!(reloaded.get_record("notes", "r3").unwrap(), expected);
        assert_eq!(reloaded.get_collection("notes").unwrap().len(), 10);
        assert_eq!(reloaded.query("notes", b"probe", 4).unwrap().len(), 4);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let db = Database::new(registry());
        db.create_collection("notes", "mock").unwrap();
        db.save(&path).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["store.json".to_string()]);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(
            Database::load(&path, registry()),
            Err(EmbedStoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_load_rejects_unresolvable_embedder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let db = Database::new(registry());
        db.create_collection("notes", "mock").unwrap();
        db.save(&path).unwrap();

        // A registry without "mock" cannot rebuild the collection.
        let empty = Arc::new(EmbedderRegistry::new());
        assert!(matches!(
            Database::load(&path, empty),
            Err(EmbedStoreError::UnknownEmbedder(_))
        ));
    }

    #[test]
    fn test_wire_format_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let db = Database::new(registry());
        db.create_collection("notes", "mock").unwrap();
        db.add_blob("notes", "r1", b"hello").unwrap();
        db.save(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let collection = &value["collections"]["notes"];
        assert_eq!(collection["id"], "notes");
        assert_eq!(collection["embedderId"], "mock");

        let record = &collection["embeddings"]["r1"];
        assert_eq!(record["id"], "r1");
        assert_eq!(record["embedderId"], "mock");
        assert_eq!(record["blob"], "hello");
        assert!(record["embedding"].is_array());
    }

    #[test]
    fn test_concurrent_queries_and_mutation() {
        let db = Arc::new(Database::new(registry()));
        db.create_collection("left", "mock").unwrap();
        db.create_collection("right", "mock").unwrap();
        for i in 0..20 {
            db.add_blob("left", &format!("l{}", i), b"content").unwrap();
        }

        std::thread::scope(|s| {
            let reader_db = db.clone();
            s.spawn(move || {
                for _ in 0..100 {
                    let hits = reader_db.query("left", b"probe", 5).unwrap();
                    assert_eq!(hits.len(), 5);
                }
            });

            let writer_db = db.clone();
            s.spawn(move || {
                for i in 0..100 {
                    writer_db
                        .add_blob("right", &format!("r{}", i), b"content")
                        .unwrap();
                }
            });
        });

        assert_eq!(db.get_collection("right").unwrap().len(), 100);
    }
}

//! Embedders and the embedder registry
//!
//! An embedder maps a content blob to a fixed-length vector. Embedders are
//! looked up by string identifier through an [`EmbedderRegistry`] that is
//! passed explicitly to the database and its collections; records and
//! collections store only the identifier, never the embedder itself.
//!
//! Identifiers of the form `remote/<model>` resolve to a [`RemoteEmbedder`]
//! bound to `<model>` without prior registration.

use crate::error::{EmbedStoreError, Result};
use crate::types::Embedding;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Identifier prefix that resolves to a remote embedder bound to the model
/// id that follows it
pub const REMOTE_PREFIX: &str = "remote/";

/// Default inference endpoint for remote embedding calls
const REMOTE_ENDPOINT: &str = "https://api-inference.huggingface.co/pipeline/feature-extraction";

/// Environment variable holding the bearer token for the remote endpoint
const REMOTE_API_KEY_ENV: &str = "HUGGING_FACE_API_KEY";

/// Timeout applied to each remote embedding call
const REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for embedding backends
pub trait Embedder: Send + Sync {
    /// Embed a content blob into a fixed-length vector
    fn embed(&self, blob: &[u8]) -> Result<Embedding>;
}

/// Registry resolving embedder identifiers to callable embedders
pub struct EmbedderRegistry {
    entries: RwLock<HashMap<String, Arc<dyn Embedder>>>,
}

impl EmbedderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite the embedder registered under `id` (last write wins)
    pub fn register(&self, id: impl Into<String>, embedder: Arc<dyn Embedder>) {
        let id = id.into();
        tracing::debug!(embedder = %id, "registering embedder");
        self.entries.write().insert(id, embedder);
    }

    /// Look up `id`, synthesizing a remote embedder for `remote/<model>`
    /// identifiers that have no explicit registration. Fails with
    /// `UnknownEmbedder` when neither resolves.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Embedder>> {
        if let Some(embedder) = self.entries.read().get(id) {
            return Ok(embedder.clone());
        }
        if let Some(model_id) = id.strip_prefix(REMOTE_PREFIX) {
            return Ok(Arc::new(RemoteEmbedder::new(model_id)));
        }
        Err(EmbedStoreError::UnknownEmbedder(id.to_string()))
    }
}

impl Default for EmbedderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-vector embedder for tests and offline smoke checks
///
/// Every blob embeds to the same vector, so all similarity scores in a
/// collection tie exactly.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    vector: Embedding,
}

impl MockEmbedder {
    /// Embedder returning the same five-component vector for every blob
    pub fn new() -> Self {
        Self {
            vector: vec![1.0, 2.0, 3.0, 4.0, 5.0],
        }
    }

    /// Embedder returning a constant vector of the given dimensionality
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            vector: (1..=dimensions).map(|i| i as f64).collect(),
        }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, _blob: &[u8]) -> Result<Embedding> {
        Ok(self.vector.clone())
    }
}

/// Token-hash term-frequency embedder (basic semantic search without ML)
///
/// Each whitespace-separated token is hashed to a dimension and counted;
/// the result is L2-normalized. Blobs sharing words embed to nearby
/// vectors, which is enough for offline relevance tests.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, blob: &[u8]) -> Result<Embedding> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let text = String::from_utf8_lossy(blob);
        let mut vector = vec![0.0f64; self.dimensions];

        for word in text.split_whitespace() {
            let word = word.to_lowercase();
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dimensions;
            vector[idx] += 1.0;
        }

        let norm: f64 = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }

        Ok(vector)
    }
}

/// Embedder backed by a hosted feature-extraction endpoint
///
/// Sends the blob as text over HTTPS and takes the first row of the
/// returned 2-D numeric array as the embedding. The bearer token comes
/// from the `HUGGING_FACE_API_KEY` environment variable; the call is
/// bounded by a request timeout. Failures surface as `MissingCredential`
/// or `RemoteCallFailed` and are never retried here.
pub struct RemoteEmbedder {
    model_id: String,
    endpoint: String,
    api_key_env: String,
}

impl RemoteEmbedder {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            endpoint: REMOTE_ENDPOINT.to_string(),
            api_key_env: REMOTE_API_KEY_ENV.to_string(),
        }
    }

    /// Override the endpoint, e.g. to target a self-hosted inference server
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the environment variable consulted for the bearer token
    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = var.into();
        self
    }
}

impl Embedder for RemoteEmbedder {
    fn embed(&self, blob: &[u8]) -> Result<Embedding> {
        let api_key = std::env::var(&self.api_key_env)
            .map_err(|_| EmbedStoreError::MissingCredential(self.api_key_env.clone()))?;

        let body = serde_json::json!({
            "inputs": [String::from_utf8_lossy(blob)],
            "options": { "use_cache": true, "wait_for_model": true },
        });
        let body_bytes = serde_json::to_vec(&body)?;

        let config = ureq::Agent::config_builder()
            .timeout_global(Some(REMOTE_TIMEOUT))
            .build();
        let agent = ureq::Agent::new_with_config(config);

        let url = format!("{}/{}", self.endpoint, self.model_id);
        let mut response = agent
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", api_key))
            .send(&body_bytes[..])
            .map_err(|e| {
                tracing::warn!(model = %self.model_id, error = %e, "remote embedding request failed");
                EmbedStoreError::RemoteCallFailed(e.to_string())
            })?;

        let text = response.body_mut().read_to_string().map_err(|e| {
            EmbedStoreError::RemoteCallFailed(format!("failed to read response: {}", e))
        })?;

        // The endpoint returns one embedding row per input; we send one input.
        let rows: Vec<Embedding> = serde_json::from_str(&text).map_err(|e| {
            EmbedStoreError::RemoteCallFailed(format!("response is not a numeric matrix: {}", e))
        })?;

        rows.into_iter().next().ok_or_else(|| {
            EmbedStoreError::RemoteCallFailed("response contained no embedding rows".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let registry = EmbedderRegistry::new();
        registry.register("mock", Arc::new(MockEmbedder::new()));

        let embedder = registry.resolve("mock").unwrap();
        assert_eq!(embedder.embed(b"anything").unwrap().len(), 5);
    }

    #[test]
    fn test_register_last_write_wins() {
        let registry = EmbedderRegistry::new();
        registry.register("mock", Arc::new(MockEmbedder::new()));
        registry.register("mock", Arc::new(MockEmbedder::with_dimensions(3)));

        let embedder = registry.resolve("mock").unwrap();
        assert_eq!(embedder.embed(b"anything").unwrap().len(), 3);
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = EmbedderRegistry::new();
        assert!(matches!(
            registry.resolve("nope"),
            Err(EmbedStoreError::UnknownEmbedder(id)) if id == "nope"
        ));
    }

    #[test]
    fn test_resolve_remote_prefix() {
        let registry = EmbedderRegistry::new();
        // No registration needed: the prefix convention synthesizes one.
        assert!(registry
            .resolve("remote/sentence-transformers/all-MiniLM-L12-v2")
            .is_ok());
    }

    #[test]
    fn test_explicit_registration_shadows_remote_prefix() {
        let registry = EmbedderRegistry::new();
        registry.register("remote/custom", Arc::new(MockEmbedder::new()));

        let embedder = registry.resolve("remote/custom").unwrap();
        assert_eq!(embedder.embed(b"x").unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_remote_missing_credential() {
        let embedder = RemoteEmbedder::new("some-model")
            .with_api_key_env("EMBEDSTORE_TEST_KEY_THAT_IS_NEVER_SET");

        assert!(matches!(
            embedder.embed(b"hello"),
            Err(EmbedStoreError::MissingCredential(var))
                if var == "EMBEDSTORE_TEST_KEY_THAT_IS_NEVER_SET"
        ));
    }

    #[test]
    fn test_mock_is_constant() {
        let embedder = MockEmbedder::new();
        assert_eq!(
            embedder.embed(b"one").unwrap(),
            embedder.embed(b"a completely different blob").unwrap()
        );
    }

    #[test]
    fn test_hash_embedder_is_normalized_and_deterministic() {
        let embedder = HashEmbedder::new(256);

        let e1 = embedder.embed(b"machine learning is great").unwrap();
        let e2 = embedder.embed(b"machine learning is great").unwrap();
        assert_eq!(e1, e2);

        let norm: f64 = e1.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_hash_embedder_word_overlap() {
        let embedder = HashEmbedder::new(256);

        let a = embedder.embed(b"machine learning is great").unwrap();
        let b = embedder.embed(b"deep learning is awesome").unwrap();

        // Shared words produce positive similarity.
        let dot: f64 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!(dot > 0.0);
    }
}

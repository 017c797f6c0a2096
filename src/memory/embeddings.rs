use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, EmbeddingProviderKind};

use super::error::MemoryError;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A provider that turns text into dense vector embeddings.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute embeddings for a batch of texts.
    ///
    /// Returns one vector per input text, each of length [`Self::dimensions`].
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;

    /// The model identifier used by this provider (e.g. `text-embedding-3-small`).
    fn model_name(&self) -> String;

    /// Dimensionality of the vectors produced by [`Self::embed`].
    fn dimensions(&self) -> usize;
}

/// Type-erased wrapper so we can store any provider behind a single type.
pub type EmbeddingProviderBox = Box<dyn EmbeddingProvider>;

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create an [`EmbeddingProviderBox`] from the application configuration.
///
/// Remote providers need an API key, taken from the config file or the
/// conventional environment variable. A missing key is a configuration
/// error: the caller decides whether that is fatal (admin rebuild) or just
/// means no grounding (chat paths).
pub fn create_provider(config: &Config) -> Result<EmbeddingProviderBox, MemoryError> {
    let emb = &config.embedding;

    match emb.provider {
        EmbeddingProviderKind::Openai => {
            let api_key = emb
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .ok_or_else(|| {
                    MemoryError::Configuration("OpenAI embeddings need OPENAI_API_KEY".into())
                })?;
            Ok(Box::new(OpenAiEmbeddingProvider::new(
                api_key,
                emb.model.clone(),
            )))
        }
        EmbeddingProviderKind::Mistral => {
            let api_key = emb
                .api_key
                .clone()
                .or_else(|| std::env::var("MISTRAL_API_KEY").ok())
                .ok_or_else(|| {
                    MemoryError::Configuration("Mistral embeddings need MISTRAL_API_KEY".into())
                })?;
            Ok(Box::new(MistralEmbeddingProvider::new(
                api_key,
                emb.model.clone(),
            )))
        }
        EmbeddingProviderKind::Local => {
            Ok(Box::new(LocalEmbeddingProvider::new(emb.dimensions)))
        }
    }
}

// ---------------------------------------------------------------------------
// OpenAI
// ---------------------------------------------------------------------------

/// Calls the OpenAI `/v1/embeddings` endpoint.
pub struct OpenAiEmbeddingProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiEmbeddingProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| "text-embedding-3-small".to_string()),
            base_url: "https://api.openai.com".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the provider at a different host (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct OpenAiEmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f64>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = OpenAiEmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let resp = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<OpenAiEmbeddingResponse>()
            .await?;

        Ok(resp.data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }

    fn dimensions(&self) -> usize {
        1536
    }
}

// ---------------------------------------------------------------------------
// Mistral
// ---------------------------------------------------------------------------

/// Calls the Mistral `/v1/embeddings` endpoint.
pub struct MistralEmbeddingProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl MistralEmbeddingProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| "mistral-embed".to_string()),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct MistralEmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct MistralEmbeddingResponse {
    data: Vec<MistralEmbeddingData>,
}

#[derive(Deserialize)]
struct MistralEmbeddingData {
    embedding: Vec<f64>,
}

#[async_trait]
impl EmbeddingProvider for MistralEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = MistralEmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let resp = self
            .client
            .post("https://api.mistral.ai/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<MistralEmbeddingResponse>()
            .await?;

        Ok(resp.data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }

    fn dimensions(&self) -> usize {
        1024
    }
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

/// Default dimensionality of the local provider.
const LOCAL_DEFAULT_DIMENSIONS: usize = 384;

/// An offline embedding provider: hashed bag-of-words.
///
/// Each lowercased alphanumeric token is hashed (FNV-1a) into one of
/// `dimensions` buckets and the resulting histogram is L2-normalised.
/// Deterministic across processes, so persisted vectors stay comparable
/// with freshly computed ones. Similarity under this provider tracks
/// lexical overlap, which also makes it the embedder of choice in tests.
pub struct LocalEmbeddingProvider {
    dimensions: usize,
}

impl LocalEmbeddingProvider {
    pub fn new(dimensions: Option<usize>) -> Self {
        Self {
            dimensions: dimensions.unwrap_or(LOCAL_DEFAULT_DIMENSIONS).max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f64> {
        let mut vector = vec![0.0f64; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a64(&token.to_lowercase()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn model_name(&self) -> String {
        format!("local-hash-{}", self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// FNV-1a, 64-bit. Stable across platforms and releases, which matters
/// because bucket assignments are baked into persisted vectors.
fn fnv1a64(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_local_provider_deterministic() {
        let provider = LocalEmbeddingProvider::new(None);
        let texts = vec!["cats are great pets".to_string()];
        let a = provider.embed(&texts).await.unwrap();
        let b = provider.embed(&texts).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 384);
    }

    #[tokio::test]
    async fn test_local_provider_unit_norm() {
        let provider = LocalEmbeddingProvider::new(Some(64));
        let vecs = provider
            .embed(&["the quick brown fox".to_string()])
            .await
            .unwrap();
        let norm: f64 = vecs[0].iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_local_provider_favours_lexical_overlap() {
        let provider = LocalEmbeddingProvider::new(None);
        let vecs = provider
            .embed(&[
                "pets".to_string(),
                "cats are great pets".to_string(),
                "dogs are loyal companions".to_string(),
            ])
            .await
            .unwrap();
        let with_overlap = cosine(&vecs[0], &vecs[1]);
        let without_overlap = cosine(&vecs[0], &vecs[2]);
        assert!(with_overlap > without_overlap);
    }

    #[tokio::test]
    async fn test_local_provider_empty_text_is_zero_vector() {
        let provider = LocalEmbeddingProvider::new(Some(16));
        let vecs = provider.embed(&["...".to_string()]).await.unwrap();
        assert!(vecs[0].iter().all(|v| *v == 0.0));
    }
}

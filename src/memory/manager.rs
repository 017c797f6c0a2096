use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::Config;

use super::chunking::{chunk_document, Chunk};
use super::context::{assemble_context, overfetch_limit};
use super::embeddings::{create_provider, EmbeddingProviderBox};
use super::error::MemoryError;
use super::loader::load_corpus;
use super::record::IndexRecord;
use super::stats::{self, StatsSnapshot};
use super::store::{now_epoch, IndexStore};

/// Outcome of a full corpus rebuild.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RebuildReport {
    /// Corpus documents read.
    pub documents: usize,
    /// Chunks embedded and indexed.
    pub chunks: usize,
    /// Chunks whose embeddings came from the cache instead of the provider.
    pub reused_embeddings: usize,
}

/// Wires the loader, chunker, embedding provider, and index store into the
/// retrieval-augmented memory surface the chat layer talks to.
///
/// Cheaply cloneable; clones share the underlying store and provider. There
/// is no hidden global instance — construct one per process (or per test)
/// with [`MemoryManager::open`].
#[derive(Clone)]
pub struct MemoryManager {
    store: IndexStore,
    embedder: Arc<EmbeddingProviderBox>,
    corpus_dir: PathBuf,
    chunk_max_tokens: u32,
    chunk_overlap: u32,
}

impl MemoryManager {
    /// Open the index store and construct the configured embedding provider.
    ///
    /// Fails with [`MemoryError::Configuration`] when the provider cannot be
    /// built and [`MemoryError::Persistence`] when the index directory is
    /// unusable.
    pub fn open(config: &Config) -> Result<Self, MemoryError> {
        let embedder = create_provider(config)?;
        Self::with_provider(config, embedder)
    }

    /// Like [`MemoryManager::open`] but with an explicit provider. Used by
    /// tests and by embedders that manage provider lifecycle themselves.
    pub fn with_provider(
        config: &Config,
        embedder: EmbeddingProviderBox,
    ) -> Result<Self, MemoryError> {
        let store = IndexStore::open(&config.index_dir())?;

        info!(
            corpus = %config.corpus_dir().display(),
            index = %store.location().display(),
            provider = embedder.model_name(),
            "memory manager ready"
        );

        Ok(Self {
            store,
            embedder: Arc::new(embedder),
            corpus_dir: config.corpus_dir(),
            chunk_max_tokens: config.chunking.max_tokens,
            chunk_overlap: config.chunking.overlap,
        })
    }

    /// Whether a previously persisted index exists and is usable.
    pub fn load(&self) -> Result<bool, MemoryError> {
        self.store.load()
    }

    /// Direct access to the underlying store.
    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Rebuild the index from the corpus directory.
    ///
    /// Scans, chunks, embeds (reusing cached embeddings for unchanged
    /// chunks), and atomically replaces the entire store. This is the
    /// explicit admin action: every failure surfaces. Prior conversational
    /// memories are discarded with the old index; a warning records how
    /// many.
    pub async fn rebuild(&self) -> Result<RebuildReport, MemoryError> {
        let documents = load_corpus(&self.corpus_dir);
        let mut chunks: Vec<Chunk> = Vec::new();
        for doc in &documents {
            chunks.extend(chunk_document(doc, self.chunk_max_tokens, self.chunk_overlap));
        }

        let model = self.embedder.model_name();
        let mut vectors: Vec<Option<Vec<f64>>> = Vec::with_capacity(chunks.len());
        let mut pending: Vec<String> = Vec::new();
        let mut pending_slots: Vec<usize> = Vec::new();
        let mut reused = 0usize;

        for (i, chunk) in chunks.iter().enumerate() {
            match self.store.cached_embedding(&content_hash(&chunk.text), &model) {
                Some(vector) => {
                    vectors.push(Some(vector));
                    reused += 1;
                }
                None => {
                    vectors.push(None);
                    pending.push(chunk.text.clone());
                    pending_slots.push(i);
                }
            }
        }

        if !pending.is_empty() {
            let embedded = self
                .embedder
                .embed(&pending)
                .await
                .map_err(MemoryError::Embedding)?;
            if embedded.len() != pending.len() {
                return Err(MemoryError::embedding(anyhow::anyhow!(
                    "provider returned {} vectors for {} inputs",
                    embedded.len(),
                    pending.len()
                )));
            }
            for (slot, vector) in pending_slots.into_iter().zip(embedded) {
                self.store
                    .cache_embedding(&content_hash(&chunks[slot].text), &model, &vector);
                vectors[slot] = Some(vector);
            }
        }

        let discarded_memories = self.store.conversation_count().unwrap_or(0);
        let mut records: Vec<IndexRecord> = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let Some(vector) = vector else {
                return Err(MemoryError::embedding(anyhow::anyhow!(
                    "missing embedding for chunk of {}",
                    chunk.source_id
                )));
            };
            records.push(IndexRecord::knowledge(
                vector,
                chunk.text.clone(),
                chunk.source_id.clone(),
            ));
        }

        let report = RebuildReport {
            documents: documents.len(),
            chunks: records.len(),
            reused_embeddings: reused,
        };

        if discarded_memories > 0 {
            warn!(
                memories = discarded_memories,
                "rebuild discards prior conversational memories along with the old index"
            );
        }
        self.store.build(records)?;

        info!(
            documents = report.documents,
            chunks = report.chunks,
            reused = report.reused_embeddings,
            "corpus rebuild complete"
        );
        Ok(report)
    }

    /// Record one user/assistant exchange as a conversational memory.
    ///
    /// Failures (embedding or persistence) are swallowed after a warning:
    /// the exchange is simply not remembered and the chat turn proceeds.
    pub async fn remember(&self, user_id: i64, user_message: &str, assistant_reply: &str) {
        let text = format!("User said: {user_message}\nAssistant replied: {assistant_reply}");

        let vector = match self.embedder.embed(std::slice::from_ref(&text)).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) => {
                warn!(user_id, "embedding provider returned no vector, memory dropped");
                return;
            }
            Err(e) => {
                warn!(user_id, error = %e, "failed to embed exchange, memory dropped");
                return;
            }
        };

        let record = IndexRecord::conversation(vector, text, user_id, now_epoch());
        if let Err(e) = self.store.add(record) {
            warn!(user_id, error = %e, "failed to persist memory, exchange forgotten");
        }
    }

    /// Assemble a grounding context for `query` on behalf of `user_id`.
    ///
    /// Over-fetches candidates, drops other users' memories, reorders the
    /// caller's memories newest first, and fills the remaining budget with
    /// corpus knowledge. Never fails: any error degrades to `""` so the
    /// assistant can answer ungrounded rather than not at all.
    pub async fn context_for_query(&self, query: &str, user_id: i64, k: usize) -> String {
        if k == 0 {
            return String::new();
        }

        let query_vector = match self.embedder.embed(&[query.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) => return String::new(),
            Err(e) => {
                debug!(error = %e, "query embedding failed, returning empty context");
                return String::new();
            }
        };

        let hits = match self.store.search(&query_vector, overfetch_limit(k)) {
            Ok(hits) => hits,
            Err(e) => {
                debug!(error = %e, "index search failed, returning empty context");
                return String::new();
            }
        };

        assemble_context(&hits, user_id, k)
    }

    /// Read-only stats for operational reporting.
    pub fn stats(&self) -> StatsSnapshot {
        let stats = stats::read_stats(self.store.location());
        StatsSnapshot {
            doc_count: stats.doc_count,
            last_rebuild_time: stats.last_rebuild_time,
            index_location: self.store.location().to_path_buf(),
        }
    }
}

/// Cache key for one chunk of text: sha256 over the UTF-8 bytes.
fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

//! Retrieval-augmented memory: a static knowledge corpus plus per-user
//! conversational memory behind one similarity index.
//!
//! The chat layer interacts with [`MemoryManager`] only: `remember` to
//! append an exchange, `context_for_query` to fetch a grounding string, and
//! `rebuild` as the explicit admin action that re-indexes the corpus.

mod chunking;
mod context;
mod embeddings;
mod error;
mod loader;
mod manager;
mod record;
mod schema;
mod stats;
mod store;

pub use chunking::{chunk_document, chunk_text, Chunk};
pub use context::{assemble_context, overfetch_limit, OVERFETCH_CAP};
pub use embeddings::{
    create_provider, EmbeddingProvider, EmbeddingProviderBox, LocalEmbeddingProvider,
    MistralEmbeddingProvider, OpenAiEmbeddingProvider,
};
pub use error::MemoryError;
pub use loader::{load_corpus, Document};
pub use manager::{MemoryManager, RebuildReport};
pub use record::{IndexRecord, SourceTag};
pub use stats::{IndexStats, StatsSnapshot};
pub use store::{now_epoch, IndexStore, ScoredRecord};

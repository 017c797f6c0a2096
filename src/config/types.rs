use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Corpus
// ---------------------------------------------------------------------------

/// Where the static knowledge corpus lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusConfig {
    /// Directory of `.txt` units. Defaults to `<state_dir>/corpus`.
    pub dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

/// How corpus documents are split before embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkingConfig {
    /// Maximum chunk size in whitespace tokens.
    #[serde(default = "default_chunk_max_tokens")]
    pub max_tokens: u32,
    /// Trailing tokens shared with the previous chunk.
    #[serde(default = "default_chunk_overlap")]
    pub overlap: u32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_chunk_max_tokens(),
            overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_max_tokens() -> u32 {
    256
}

fn default_chunk_overlap() -> u32 {
    32
}

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Openai,
    Mistral,
    #[default]
    Local,
}

impl std::str::FromStr for EmbeddingProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::Openai),
            "mistral" => Ok(Self::Mistral),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown embedding provider: {other}")),
        }
    }
}

/// Embedding backend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,
    /// Model override; each provider has its own default.
    pub model: Option<String>,
    /// API key; usually supplied via environment instead.
    pub api_key: Option<String>,
    /// Dimensionality override for the local provider.
    pub dimensions: Option<usize>,
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Where the persisted index and its stats sidecar live.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexConfig {
    /// Defaults to `<state_dir>/index`.
    pub dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Retrieval
// ---------------------------------------------------------------------------

/// Context assembly defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Default context budget when the caller does not pass one.
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            context_budget: default_context_budget(),
        }
    }
}

fn default_context_budget() -> usize {
    6
}

use thiserror::Error;

/// Errors produced by the memory subsystem.
///
/// Only the explicit admin path (`open`, `rebuild`) surfaces these to
/// callers; the chat-facing read and write paths degrade silently (see
/// [`crate::memory::MemoryManager`]).
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The embedding backend is unavailable or missing credentials.
    #[error("embedding backend not configured: {0}")]
    Configuration(String),

    /// A single embedding call failed (network, quota, malformed input).
    #[error("embedding request failed")]
    Embedding(#[source] anyhow::Error),

    /// The index or stats file could not be read or written.
    #[error("index persistence failed")]
    Persistence(#[source] anyhow::Error),
}

impl MemoryError {
    pub fn embedding(err: impl Into<anyhow::Error>) -> Self {
        Self::Embedding(err.into())
    }

    pub fn persistence(err: impl Into<anyhow::Error>) -> Self {
        Self::Persistence(err.into())
    }
}

impl From<rusqlite::Error> for MemoryError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Persistence(err.into())
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SourceTag
// ---------------------------------------------------------------------------

/// Provenance of an index record.
///
/// A closed enum rather than free-form metadata so the partitioning step in
/// context assembly is exhaustive: a record is either ownerless corpus
/// knowledge or a conversational memory owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceTag {
    /// A chunk of the static knowledge corpus. No owner.
    Knowledge { source_id: String },
    /// One captured user/assistant exchange.
    ConversationMemory { user_id: i64, timestamp: f64 },
}

impl SourceTag {
    /// Whether this tag marks a conversational memory belonging to `user_id`.
    pub fn is_memory_of(&self, user_id: i64) -> bool {
        matches!(self, SourceTag::ConversationMemory { user_id: owner, .. } if *owner == user_id)
    }

    /// Epoch-seconds timestamp for conversational memories, `None` for knowledge.
    pub fn timestamp(&self) -> Option<f64> {
        match self {
            SourceTag::ConversationMemory { timestamp, .. } => Some(*timestamp),
            SourceTag::Knowledge { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// IndexRecord
// ---------------------------------------------------------------------------

/// The unit stored in the index: an embedded text segment plus provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    /// Globally unique record identity.
    pub id: Uuid,
    /// Embedding vector. Every vector in one store shares the same length.
    pub vector: Vec<f64>,
    /// The original text segment the vector was computed from.
    pub text: String,
    /// Where the segment came from.
    pub tag: SourceTag,
}

impl IndexRecord {
    /// Build a knowledge record from a corpus chunk.
    pub fn knowledge(vector: Vec<f64>, text: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            vector,
            text: text.into(),
            tag: SourceTag::Knowledge {
                source_id: source_id.into(),
            },
        }
    }

    /// Build a conversational memory record stamped with `timestamp`.
    pub fn conversation(
        vector: Vec<f64>,
        text: impl Into<String>,
        user_id: i64,
        timestamp: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            vector,
            text: text.into(),
            tag: SourceTag::ConversationMemory { user_id, timestamp },
        }
    }
}

use super::loader::Document;

/// A bounded segment of a source document, ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// The chunk text.
    pub text: String,
    /// File name of the originating document.
    pub source_id: String,
    /// 0-based position of this chunk within its document.
    pub sequence: u32,
}

/// Split `content` into pieces of at most `max_tokens` tokens with
/// `overlap` tokens shared between consecutive pieces.
///
/// Tokenisation is a whitespace split (word count). For production accuracy
/// this should be replaced with a proper tokeniser, but the whitespace
/// heuristic is good enough for chunking decisions. The overlap carries the
/// tail of each chunk into the next so information on a boundary is not
/// lost.
pub fn chunk_text(content: &str, max_tokens: u32, overlap: u32) -> Vec<String> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let max_tokens = max_tokens.max(1) as usize;
    let overlap = (overlap as usize).min(max_tokens.saturating_sub(1));

    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in content.split_whitespace() {
        current.push(word);

        if current.len() >= max_tokens {
            chunks.push(current.join(" "));

            // Retain the last `overlap` words for the next chunk.
            let keep_from = current.len().saturating_sub(overlap);
            current = current[keep_from..].to_vec();
        }
    }

    // Flush remaining words unless they are exactly the carried-over overlap.
    if !current.is_empty() && (chunks.is_empty() || current.len() > overlap) {
        chunks.push(current.join(" "));
    }

    chunks
}

/// Chunk one document, attributing each piece to its source with an
/// increasing sequence number.
pub fn chunk_document(doc: &Document, max_tokens: u32, overlap: u32) -> Vec<Chunk> {
    chunk_text(&doc.raw_text, max_tokens, overlap)
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            text,
            source_id: doc.source_id.clone(),
            sequence: i as u32,
        })
        .collect()
}

use std::path::Path;

use tracing::debug;

/// A raw text unit read from the knowledge corpus. Ephemeral input to
/// chunking; never persisted itself.
#[derive(Debug, Clone)]
pub struct Document {
    /// File name the text came from.
    pub source_id: String,
    /// Full file contents.
    pub raw_text: String,
}

/// Read every `.txt` file in `dir` into a [`Document`].
///
/// Unreadable or blank files are skipped without failing the scan, and a
/// missing directory yields an empty list. Results are sorted by file name
/// so repeated loads produce the same document order.
pub fn load_corpus(dir: &Path) -> Vec<Document> {
    let mut documents = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => {
            debug!(dir = %dir.display(), "corpus directory missing, nothing to load");
            return documents;
        }
    };

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("txt"))
        .collect();
    paths.sort();

    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match std::fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => {
                documents.push(Document {
                    source_id: name,
                    raw_text: text,
                });
            }
            Ok(_) => {
                debug!(file = %name, "skipping empty corpus file");
            }
            Err(e) => {
                debug!(file = %name, error = %e, "skipping unreadable corpus file");
            }
        }
    }

    documents
}

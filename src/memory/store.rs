use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use ndarray::ArrayView1;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use super::error::MemoryError;
use super::record::{IndexRecord, SourceTag};
use super::schema;
use super::stats::{self, IndexStats};

/// File name of the SQLite index inside the index directory.
const INDEX_FILE: &str = "index.db";

/// Meta key holding the embedding dimension every stored vector must match.
const META_DIMENSIONS: &str = "embedding_dimensions";

/// A search hit: the stored record plus its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: IndexRecord,
    pub score: f64,
}

/// The persisted collection of embedded records, with nearest-neighbor
/// search.
///
/// One SQLite database holds all records; a single coarse mutex around the
/// connection serialises mutations so concurrent appends cannot produce a
/// lost update or a half-written row. Cheaply cloneable — clones share the
/// same connection.
#[derive(Clone)]
pub struct IndexStore {
    db: Arc<Mutex<Connection>>,
    index_dir: PathBuf,
}

impl IndexStore {
    /// Open (or create) the index under `index_dir` and run migrations.
    ///
    /// Explicit construction: there is no lazy global store, so tests and
    /// embedders can create isolated instances. Dropping the last clone
    /// closes the database.
    pub fn open(index_dir: &Path) -> Result<Self, MemoryError> {
        std::fs::create_dir_all(index_dir).map_err(MemoryError::persistence)?;

        let db_path = index_dir.join(INDEX_FILE);
        let conn = Connection::open(&db_path)?;
        schema::run_migrations(&conn).map_err(MemoryError::Persistence)?;

        info!(index = %db_path.display(), "index store ready");
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            index_dir: index_dir.to_path_buf(),
        })
    }

    /// Directory this store persists into.
    pub fn location(&self) -> &Path {
        &self.index_dir
    }

    /// Replace the entire index with `records` in one transaction, then
    /// persist fresh stats with `last_rebuild_time = now`.
    ///
    /// This is the explicit admin action: errors propagate. Note that prior
    /// conversational memories are discarded along with old knowledge rows.
    pub fn build(&self, records: Vec<IndexRecord>) -> Result<(), MemoryError> {
        let dimensions = check_uniform_dimensions(&records)?;

        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM records", [])?;
        for record in &records {
            insert_record(&tx, record)?;
        }
        if let Some(dim) = dimensions {
            schema::set_meta(&tx, META_DIMENSIONS, &dim.to_string())
                .map_err(MemoryError::Persistence)?;
        }
        tx.commit()?;

        let stats = IndexStats {
            doc_count: records.len() as u64,
            last_rebuild_time: Some(now_epoch()),
        };
        stats::write_stats(&self.index_dir, &stats)?;

        info!(records = records.len(), "index rebuilt");
        Ok(())
    }

    /// Append one record and bump `doc_count`. `last_rebuild_time` is
    /// untouched — appends are not rebuilds.
    ///
    /// Errors propagate to the caller; the memory-write path catches and
    /// logs them so a chat turn never fails on a lost memory.
    pub fn add(&self, record: IndexRecord) -> Result<(), MemoryError> {
        let conn = self.db.lock();

        match self.dimensions_locked(&conn) {
            Some(dim) if dim != record.vector.len() => {
                return Err(MemoryError::persistence(anyhow!(
                    "record dimension {} does not match index dimension {}",
                    record.vector.len(),
                    dim
                )));
            }
            Some(_) => {}
            None => {
                schema::set_meta(&conn, META_DIMENSIONS, &record.vector.len().to_string())
                    .map_err(MemoryError::Persistence)?;
            }
        }

        insert_record(&conn, &record)?;

        let mut stats = stats::read_stats(&self.index_dir);
        stats.doc_count += 1;
        stats::write_stats(&self.index_dir, &stats)?;

        debug!(id = %record.id, "record appended");
        Ok(())
    }

    /// Verify a previously persisted snapshot is present and usable.
    ///
    /// With SQLite as the snapshot format the data is already attached by
    /// [`IndexStore::open`]; this checks that the records table decodes and
    /// reports whether anything was ever persisted. Idempotent.
    pub fn load(&self) -> Result<bool, MemoryError> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        let has_dimensions = schema::get_meta(&conn, META_DIMENSIONS).is_some();
        Ok(count > 0 || has_dimensions)
    }

    /// Return up to `limit` records ordered by descending cosine similarity
    /// to `query`. Ties break by insertion order. An empty index yields an
    /// empty vec.
    pub fn search(&self, query: &[f64], limit: usize) -> Result<Vec<ScoredRecord>, MemoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.db.lock();
        if let Some(dim) = self.dimensions_locked(&conn) {
            if dim != query.len() {
                return Err(MemoryError::persistence(anyhow!(
                    "query dimension {} does not match index dimension {}",
                    query.len(),
                    dim
                )));
            }
        }

        let mut stmt = conn.prepare(
            "SELECT id, kind, source_id, user_id, timestamp, text, embedding
             FROM records ORDER BY seq",
        )?;
        let rows = stmt.query_map([], row_to_record)?;

        let mut hits: Vec<ScoredRecord> = Vec::new();
        for row in rows {
            let record = row?.map_err(MemoryError::Persistence)?;
            let score = cosine_similarity(query, &record.vector);
            hits.push(ScoredRecord { record, score });
        }

        // Stable sort keeps insertion order between equal scores.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Number of records currently stored.
    pub fn len(&self) -> Result<u64, MemoryError> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool, MemoryError> {
        Ok(self.len()? == 0)
    }

    /// Number of conversational memory records currently stored.
    pub fn conversation_count(&self) -> Result<u64, MemoryError> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE kind = 'conversation_memory'",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Look up a cached embedding by content hash.
    pub fn cached_embedding(&self, hash: &str, model: &str) -> Option<Vec<f64>> {
        let conn = self.db.lock();
        conn.query_row(
            "SELECT embedding FROM embedding_cache WHERE hash = ?1 AND model = ?2",
            params![hash, model],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()
        .ok()
        .flatten()
        .and_then(|blob| decode_vector(&blob).ok())
    }

    /// Store an embedding in the cache. Failures are ignored — the cache is
    /// an optimisation, not part of the index contract.
    pub fn cache_embedding(&self, hash: &str, model: &str, vector: &[f64]) {
        let conn = self.db.lock();
        let _ = conn.execute(
            "INSERT OR REPLACE INTO embedding_cache (hash, model, dimensions, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                hash,
                model,
                vector.len() as i64,
                encode_vector(vector),
                chrono::Utc::now().to_rfc3339(),
            ],
        );
    }

    fn dimensions_locked(&self, conn: &Connection) -> Option<usize> {
        schema::get_meta(conn, META_DIMENSIONS).and_then(|v| v.parse().ok())
    }
}

/// Current time as fractional Unix epoch seconds.
pub fn now_epoch() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn insert_record(conn: &Connection, record: &IndexRecord) -> Result<(), MemoryError> {
    let (kind, source_id, user_id, timestamp) = match &record.tag {
        SourceTag::Knowledge { source_id } => ("knowledge", Some(source_id.as_str()), None, None),
        SourceTag::ConversationMemory { user_id, timestamp } => {
            ("conversation_memory", None, Some(*user_id), Some(*timestamp))
        }
    };

    conn.execute(
        "INSERT INTO records (id, kind, source_id, user_id, timestamp, text, embedding)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.id.to_string(),
            kind,
            source_id,
            user_id,
            timestamp,
            record.text,
            encode_vector(&record.vector),
        ],
    )?;
    Ok(())
}

type RecordRow = Result<IndexRecord, anyhow::Error>;

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    let id: String = row.get(0)?;
    let kind: String = row.get(1)?;
    let source_id: Option<String> = row.get(2)?;
    let user_id: Option<i64> = row.get(3)?;
    let timestamp: Option<f64> = row.get(4)?;
    let text: String = row.get(5)?;
    let blob: Vec<u8> = row.get(6)?;

    Ok((|| {
        let tag = match kind.as_str() {
            "knowledge" => SourceTag::Knowledge {
                source_id: source_id.unwrap_or_default(),
            },
            "conversation_memory" => SourceTag::ConversationMemory {
                user_id: user_id.ok_or_else(|| anyhow!("conversation record missing user_id"))?,
                timestamp: timestamp
                    .ok_or_else(|| anyhow!("conversation record missing timestamp"))?,
            },
            other => return Err(anyhow!("unknown record kind: {other}")),
        };

        Ok(IndexRecord {
            id: Uuid::parse_str(&id).map_err(|e| anyhow!("bad record id {id}: {e}"))?,
            vector: decode_vector(&blob)?,
            text,
            tag,
        })
    })())
}

// ---------------------------------------------------------------------------
// Vector encoding & scoring
// ---------------------------------------------------------------------------

/// Vectors are stored as little-endian f64 bytes.
fn encode_vector(vector: &[f64]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 8);
    for v in vector {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

fn decode_vector(blob: &[u8]) -> Result<Vec<f64>, anyhow::Error> {
    if blob.len() % 8 != 0 {
        return Err(anyhow!("embedding blob length {} not a multiple of 8", blob.len()));
    }
    Ok(blob
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes(c.try_into().expect("chunks_exact yields 8 bytes")))
        .collect())
}

fn cosine_similarity(query: &[f64], candidate: &[f64]) -> f64 {
    if query.len() != candidate.len() {
        return 0.0;
    }
    let query = ArrayView1::from(query);
    let candidate = ArrayView1::from(candidate);
    let denom = query.dot(&query).sqrt() * candidate.dot(&candidate).sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    query.dot(&candidate) / denom
}

fn check_uniform_dimensions(records: &[IndexRecord]) -> Result<Option<usize>, MemoryError> {
    let mut dimensions = None;
    for record in records {
        match dimensions {
            None => dimensions = Some(record.vector.len()),
            Some(dim) if dim != record.vector.len() => {
                return Err(MemoryError::persistence(anyhow!(
                    "mixed embedding dimensions in build: {} vs {}",
                    dim,
                    record.vector.len()
                )));
            }
            Some(_) => {}
        }
    }
    Ok(dimensions)
}

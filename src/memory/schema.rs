use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;

/// Current schema version.  Increment when adding new migrations.
const SCHEMA_VERSION: u32 = 1;

/// Apply all pending migrations to `conn`.
///
/// Migrations are idempotent — tables are created with `IF NOT EXISTS` and the
/// `meta` table tracks which version has been applied so we only run new ones.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Enable WAL mode for better concurrent read performance.
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;

    // ------------------------------------------------------------------
    // meta — schema version plus store-level facts such as the embedding
    // dimension every stored vector must match.
    // ------------------------------------------------------------------
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    let current_version = get_schema_version(conn);

    if current_version >= SCHEMA_VERSION {
        debug!(version = current_version, "index schema up to date");
        return Ok(());
    }

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    debug!(version = SCHEMA_VERSION, "index schema migrated");
    Ok(())
}

// ---------------------------------------------------------------------------
// v1 — initial tables
// ---------------------------------------------------------------------------

fn migrate_v1(conn: &Connection) -> Result<()> {
    // ------------------------------------------------------------------
    // records — one row per embedded segment. `seq` preserves insertion
    // order, which doubles as the deterministic tie-break in search.
    // ------------------------------------------------------------------
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS records (
            seq       INTEGER PRIMARY KEY AUTOINCREMENT,
            id        TEXT    NOT NULL UNIQUE,
            kind      TEXT    NOT NULL CHECK (kind IN ('knowledge', 'conversation_memory')),
            source_id TEXT,
            user_id   INTEGER,
            timestamp REAL,
            text      TEXT    NOT NULL,
            embedding BLOB    NOT NULL
        );",
    )?;

    conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_records_kind ON records(kind);")?;

    // ------------------------------------------------------------------
    // embedding_cache — caches raw embedding vectors keyed by content
    // hash so rebuilds avoid redundant API calls for unchanged chunks.
    // ------------------------------------------------------------------
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS embedding_cache (
            hash       TEXT PRIMARY KEY,
            model      TEXT NOT NULL,
            dimensions INTEGER NOT NULL,
            embedding  BLOB NOT NULL,
            created_at TEXT NOT NULL
        );",
    )?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn get_schema_version(conn: &Connection) -> u32 {
    conn.query_row(
        "SELECT value FROM meta WHERE key = 'schema_version'",
        [],
        |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<u32>().unwrap_or(0))
        },
    )
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: u32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?1)",
        [version.to_string()],
    )?;
    Ok(())
}

/// Read an arbitrary value from the `meta` table.
pub fn get_meta(conn: &Connection, key: &str) -> Option<String> {
    conn.query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
        row.get(0)
    })
    .ok()
}

/// Write an arbitrary value into the `meta` table.
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

//! SQL DDL for the song catalog.

/// Connection pragmas.
pub const PRAGMAS: &str = r"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
";

/// Table and index definitions.
pub const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS songs (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    artist TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_songs_title ON songs(title COLLATE NOCASE);
";

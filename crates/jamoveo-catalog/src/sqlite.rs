//! SQLite-backed catalog.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use jamoveo_core::{SongId, SongRef, SongSummary};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::SongCatalog;
use crate::document::{SongDocument, escape_like, query_words};
use crate::error::{CatalogError, Result};
use crate::schema;

/// Default maximum number of search results.
pub const SEARCH_LIMIT: usize = 50;

/// Song catalog stored in a single SQLite table.
/// Uses `parking_lot::Mutex` for synchronous access; async callers go
/// through `spawn_blocking`.
#[derive(Clone)]
pub struct SqliteCatalog {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    search_limit: usize,
}

impl SqliteCatalog {
    /// Open or create a catalog at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CatalogError::Io(format!("create dir: {e}")))?;
        }

        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        info!(path = %path.display(), "song catalog opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_owned(),
            search_limit: SEARCH_LIMIT,
        })
    }

    /// Open an in-memory catalog (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
            search_limit: SEARCH_LIMIT,
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch(schema::PRAGMAS)
            .map_err(|e| CatalogError::Database(format!("pragmas: {e}")))?;
        conn.execute_batch(schema::CREATE_TABLES)
            .map_err(|e| CatalogError::Database(format!("schema: {e}")))?;
        Ok(())
    }

    /// Override the maximum number of search results.
    #[must_use]
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    /// Execute a closure with the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Location of the database file (`:memory:` for in-memory catalogs).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a song, replacing any existing song with the same id.
    pub fn insert(&self, doc: SongDocument) -> Result<SongSummary> {
        self.with_conn(|conn| insert_document(conn, doc))
    }

    /// Import every song in a JSON file (one document or an array).
    /// All-or-nothing: a bad document leaves the catalog untouched.
    pub fn import_file(&self, path: &Path) -> Result<Vec<SongSummary>> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Io(format!("{}: {e}", path.display())))?;
        let docs = SongDocument::parse_many(&text)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut imported = Vec::with_capacity(docs.len());
        for doc in docs {
            imported.push(insert_document(&tx, doc)?);
        }
        tx.commit()?;

        info!(path = %path.display(), count = imported.len(), "songs imported");
        Ok(imported)
    }

    /// Number of songs in the catalog.
    pub fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM songs", [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or_default())
        })
    }

    /// Blocking search; see [`SongCatalog::search`].
    pub fn search_blocking(&self, query: &str) -> Result<Vec<SongSummary>> {
        let patterns: Vec<String> = query_words(query)
            .iter()
            .map(|w| format!("%{}%", escape_like(w)))
            .collect();

        let mut sql = String::from("SELECT id, title, artist FROM songs");
        for i in 0..patterns.len() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            let _ = write!(sql, "title LIKE ?{} ESCAPE '\\'", i + 1);
        }
        let _ = write!(
            sql,
            " ORDER BY title COLLATE NOCASE, id LIMIT {}",
            self.search_limit
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(patterns.iter()), |row| {
                Ok(SongSummary {
                    id: SongId::from_raw(row.get::<_, String>(0)?),
                    title: row.get(1)?,
                    artist: row.get(2)?,
                })
            })?;
            let songs = rows.collect::<std::result::Result<Vec<_>, _>>()?;
            debug!(query, results = songs.len(), "catalog search");
            Ok(songs)
        })
    }

    /// Blocking lookup; see [`SongCatalog::get`].
    pub fn get_blocking(&self, id: &SongId) -> Result<Option<SongRef>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT title, artist, content FROM songs WHERE id = ?1",
                    [id.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;
            row.map(|(title, artist, content)| {
                let content: Map<String, Value> = serde_json::from_str(&content)?;
                Ok(SongRef::new(id.clone(), title, artist, content))
            })
            .transpose()
        })
    }
}

fn insert_document(conn: &Connection, doc: SongDocument) -> Result<SongSummary> {
    let id = doc.id.unwrap_or_default();
    let content = serde_json::to_string(&doc.content)?;
    let _ = conn.execute(
        "INSERT OR REPLACE INTO songs (id, title, artist, content) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id.as_str(), doc.title, doc.artist, content],
    )?;
    Ok(SongSummary {
        id,
        title: doc.title,
        artist: doc.artist,
    })
}

#[async_trait]
impl SongCatalog for SqliteCatalog {
    async fn search(&self, query: &str) -> Result<Vec<SongSummary>> {
        let this = self.clone();
        let query = query.to_owned();
        tokio::task::spawn_blocking(move || this.search_blocking(&query))
            .await
            .map_err(|e| CatalogError::Database(format!("search task: {e}")))?
    }

    async fn get(&self, id: &SongId) -> Result<Option<SongRef>> {
        let this = self.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || this.get_blocking(&id))
            .await
            .map_err(|e| CatalogError::Database(format!("lookup task: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(title: &str, artist: &str) -> SongDocument {
        SongDocument {
            id: None,
            title: title.into(),
            artist: artist.into(),
            content: Map::new(),
        }
    }

    fn seeded() -> SqliteCatalog {
        let catalog = SqliteCatalog::in_memory().unwrap();
        for (title, artist) in [
            ("Hey Jude", "The Beatles"),
            ("Hey You", "Pink Floyd"),
            ("Jude's Song", "Someone"),
            ("100% Pure", "Test"),
        ] {
            let _ = catalog.insert(doc(title, artist)).unwrap();
        }
        catalog
    }

    #[test]
    fn open_in_memory() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        assert_eq!(catalog.path(), Path::new(":memory:"));
        assert_eq!(catalog.count().unwrap(), 0);
    }

    #[test]
    fn open_on_disk_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/catalog.db");
        let catalog = SqliteCatalog::open(&path).unwrap();
        let _ = catalog.insert(doc("Song", "Artist")).unwrap();
        drop(catalog);

        let reopened = SqliteCatalog::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[test]
    fn blank_query_lists_everything_by_title() {
        let catalog = seeded();
        let all = catalog.search_blocking("   ").unwrap();
        let titles: Vec<_> = all.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["100% Pure", "Hey Jude", "Hey You", "Jude's Song"]);
    }

    #[test]
    fn every_word_must_match_case_insensitively() {
        let catalog = seeded();
        let hits = catalog.search_blocking("jude HEY").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Hey Jude");

        let hits = catalog.search_blocking("jude").unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn wildcards_are_literal() {
        let catalog = seeded();
        let hits = catalog.search_blocking("%").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "100% Pure");
        assert!(catalog.search_blocking("_").unwrap().is_empty());
    }

    #[test]
    fn search_limit_applies() {
        let catalog = SqliteCatalog::in_memory().unwrap().with_search_limit(3);
        for i in 0..10 {
            let _ = catalog.insert(doc(&format!("Song {i}"), "A")).unwrap();
        }
        assert_eq!(catalog.search_blocking("").unwrap().len(), 3);
        assert_eq!(catalog.search_blocking("song").unwrap().len(), 3);
    }

    #[test]
    fn get_returns_content() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let mut content = Map::new();
        let _ = content.insert("language".into(), json!("he"));
        let summary = catalog
            .insert(SongDocument {
                id: Some(SongId::from_raw("s1")),
                title: "Veech Shelo".into(),
                artist: "Ariel Zilber".into(),
                content,
            })
            .unwrap();
        assert_eq!(summary.id.as_str(), "s1");

        let song = catalog.get_blocking(&summary.id).unwrap().unwrap();
        assert_eq!(song.title, "Veech Shelo");
        assert_eq!(song.content["language"], "he");
        assert!(catalog.get_blocking(&SongId::from_raw("missing")).unwrap().is_none());
    }

    #[test]
    fn insert_with_same_id_replaces() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let mut first = doc("Old", "A");
        first.id = Some(SongId::from_raw("fixed"));
        let mut second = doc("New", "A");
        second.id = Some(SongId::from_raw("fixed"));
        let _ = catalog.insert(first).unwrap();
        let _ = catalog.insert(second).unwrap();
        assert_eq!(catalog.count().unwrap(), 1);
        let song = catalog.get_blocking(&SongId::from_raw("fixed")).unwrap().unwrap();
        assert_eq!(song.title, "New");
    }

    #[test]
    fn import_file_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("songs.json");
        std::fs::write(
            &path,
            r#"[
                {"title": "Hey Jude", "artist": "The Beatles", "language": "en", "chords": []},
                {"_id": {"$oid": "abc"}, "title": "Veech Shelo", "artist": "Ariel Zilber"}
            ]"#,
        )
        .unwrap();
        let catalog = SqliteCatalog::in_memory().unwrap();
        let imported = catalog.import_file(&path).unwrap();
        assert_eq!(imported.len(), 2);
        assert_eq!(imported[1].id.as_str(), "abc");
        assert_eq!(catalog.count().unwrap(), 2);
    }

    #[test]
    fn import_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("songs.json");
        std::fs::write(
            &path,
            r#"[{"title": "Good", "artist": "A"}, {"title": "No artist"}]"#,
        )
        .unwrap();
        let catalog = SqliteCatalog::in_memory().unwrap();
        assert!(matches!(
            catalog.import_file(&path),
            Err(CatalogError::InvalidDocument(_))
        ));
        assert_eq!(catalog.count().unwrap(), 0);
    }

    #[test]
    fn import_missing_file_is_io_error() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        assert!(matches!(
            catalog.import_file(Path::new("/nonexistent/songs.json")),
            Err(CatalogError::Io(_))
        ));
    }

    #[tokio::test]
    async fn trait_methods_run_off_thread() {
        let catalog = seeded();
        let hits = SongCatalog::search(&catalog, "hey").await.unwrap();
        assert_eq!(hits.len(), 2);
        let song = SongCatalog::get(&catalog, &hits[0].id).await.unwrap().unwrap();
        assert_eq!(song.summary(), hits[0]);
    }
}

//! In-memory catalog.

use async_trait::async_trait;
use jamoveo_core::{SongId, SongRef, SongSummary};
use parking_lot::RwLock;

use crate::SongCatalog;
use crate::document::{SongDocument, query_words, title_matches};
use crate::error::Result;
use crate::sqlite::SEARCH_LIMIT;

/// Catalog held entirely in memory. Same matching rules as the SQLite one.
#[derive(Default)]
pub struct InMemoryCatalog {
    songs: RwLock<Vec<SongRef>>,
}

impl InMemoryCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-filled with `songs`.
    pub fn with_songs(songs: impl IntoIterator<Item = SongRef>) -> Self {
        Self {
            songs: RwLock::new(songs.into_iter().collect()),
        }
    }

    /// Insert a song, replacing any existing song with the same id.
    pub fn insert(&self, doc: SongDocument) -> SongSummary {
        let song = SongRef::new(doc.id.unwrap_or_default(), doc.title, doc.artist, doc.content);
        let summary = song.summary();
        let mut songs = self.songs.write();
        songs.retain(|s| s.id != song.id);
        songs.push(song);
        summary
    }

    /// Number of songs.
    pub fn len(&self) -> usize {
        self.songs.read().len()
    }

    /// Whether the catalog holds no songs.
    pub fn is_empty(&self) -> bool {
        self.songs.read().is_empty()
    }
}

#[async_trait]
impl SongCatalog for InMemoryCatalog {
    async fn search(&self, query: &str) -> Result<Vec<SongSummary>> {
        let words = query_words(query);
        let mut hits: Vec<SongSummary> = self
            .songs
            .read()
            .iter()
            .filter(|s| title_matches(&s.title, &words))
            .map(SongRef::summary)
            .collect();
        hits.sort_by(|a, b| {
            a.title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(SEARCH_LIMIT);
        Ok(hits)
    }

    async fn get(&self, id: &SongId) -> Result<Option<SongRef>> {
        Ok(self.songs.read().iter().find(|s| &s.id == id).cloned())
    }
}

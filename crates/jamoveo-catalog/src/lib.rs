//! # jamoveo-catalog
//!
//! The song lookup collaborator.
//!
//! The session core depends only on [`SongCatalog`]. [`SqliteCatalog`] is the
//! production store (`songs(id, title, artist, content)`); [`InMemoryCatalog`]
//! backs tests.
//!
//! Search semantics: a blank query lists the first songs by title; otherwise
//! every whitespace-separated word must appear in the title, ignoring case.

#![deny(unsafe_code)]

pub mod document;
pub mod error;
pub mod memory;
mod schema;
pub mod sqlite;

use async_trait::async_trait;
use jamoveo_core::{SongId, SongRef, SongSummary};

pub use document::SongDocument;
pub use error::{CatalogError, Result};
pub use memory::InMemoryCatalog;
pub use sqlite::{SEARCH_LIMIT, SqliteCatalog};

/// Read access to the song catalog.
#[async_trait]
pub trait SongCatalog: Send + Sync {
    /// Songs whose title contains every word of `query`.
    async fn search(&self, query: &str) -> Result<Vec<SongSummary>>;

    /// Full song, including its performable content.
    async fn get(&self, id: &SongId) -> Result<Option<SongRef>>;
}

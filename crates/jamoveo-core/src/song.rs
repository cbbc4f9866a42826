//! Song references as seen by the session core.
//!
//! The core never interprets performable content (lyrics, chords, language).
//! It is carried as an opaque JSON object and flattened next to the
//! identifying fields on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::SongId;

/// Keys owned by [`SongRef`] itself; never allowed inside the opaque content.
const RESERVED_KEYS: [&str; 4] = ["id", "_id", "title", "artist"];

/// Search result entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongSummary {
    /// Catalog id.
    pub id: SongId,
    /// Song title.
    pub title: String,
    /// Performing artist.
    pub artist: String,
}

/// The song currently in play, including its opaque performable content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SongRef {
    /// Catalog id.
    pub id: SongId,
    /// Song title.
    pub title: String,
    /// Performing artist.
    pub artist: String,
    /// Opaque payload forwarded verbatim to observers.
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl SongRef {
    /// Build a song reference, dropping any content keys that would shadow
    /// the identifying fields.
    pub fn new(
        id: SongId,
        title: impl Into<String>,
        artist: impl Into<String>,
        mut content: Map<String, Value>,
    ) -> Self {
        for key in RESERVED_KEYS {
            let _ = content.remove(key);
        }
        Self {
            id,
            title: title.into(),
            artist: artist.into(),
            content,
        }
    }

    /// Identifying fields only.
    pub fn summary(&self) -> SongSummary {
        SongSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn content_is_flattened_on_the_wire() {
        let song = SongRef::new(
            SongId::from_raw("s1"),
            "Hey Jude",
            "The Beatles",
            content(json!({"language": "en", "chords": [[{"lyrics": "Hey", "chords": "F"}]]})),
        );
        let wire = serde_json::to_value(&song).unwrap();
        assert_eq!(wire["id"], "s1");
        assert_eq!(wire["title"], "Hey Jude");
        assert_eq!(wire["language"], "en");
        assert_eq!(wire["chords"][0][0]["chords"], "F");
    }

    #[test]
    fn reserved_keys_are_stripped_from_content() {
        let song = SongRef::new(
            SongId::from_raw("s1"),
            "Real",
            "Artist",
            content(json!({"title": "Shadow", "_id": "x", "language": "he"})),
        );
        assert!(!song.content.contains_key("title"));
        assert!(!song.content.contains_key("_id"));
        let wire = serde_json::to_value(&song).unwrap();
        assert_eq!(wire["title"], "Real");
    }

    #[test]
    fn unknown_keys_land_in_content_when_parsed() {
        let song: SongRef = serde_json::from_value(json!({
            "id": "s2",
            "title": "Veech Shelo",
            "artist": "Ariel Zilber",
            "language": "he",
        }))
        .unwrap();
        assert_eq!(song.content["language"], "he");
        assert_eq!(song.summary().title, "Veech Shelo");
    }
}

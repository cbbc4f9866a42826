//! Song documents as imported from JSON and query word handling.

use jamoveo_core::SongId;
use serde_json::{Map, Value};

use crate::error::{CatalogError, Result};

/// A song as found in an import file: `{title, artist, ...content}`.
///
/// `id` (or a Mongo-style `_id`, either a string or `{"$oid": "..."}`) is
/// kept when present so re-importing the same file replaces rather than
/// duplicates.
#[derive(Clone, Debug, PartialEq)]
pub struct SongDocument {
    /// Explicit id, if the document carried one.
    pub id: Option<SongId>,
    /// Song title.
    pub title: String,
    /// Performing artist.
    pub artist: String,
    /// Everything else, forwarded verbatim to observers.
    pub content: Map<String, Value>,
}

impl SongDocument {
    /// Build a document from a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(CatalogError::InvalidDocument(
                "expected a JSON object".into(),
            ));
        };
        let title = take_string(&mut map, "title")?;
        let artist = take_string(&mut map, "artist")?;
        let id = take_id(&mut map, "id").or_else(|| take_id(&mut map, "_id"));
        let _ = map.remove("id");
        let _ = map.remove("_id");
        Ok(Self {
            id,
            title,
            artist,
            content: map,
        })
    }

    /// Parse a file body holding either one document or an array of them.
    pub fn parse_many(text: &str) -> Result<Vec<Self>> {
        match serde_json::from_str::<Value>(text)? {
            Value::Array(items) => items.into_iter().map(Self::from_value).collect(),
            other => Ok(vec![Self::from_value(other)?]),
        }
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Result<String> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(CatalogError::InvalidDocument(format!(
            "missing or empty \"{key}\""
        ))),
    }
}

fn take_id(map: &mut Map<String, Value>, key: &str) -> Option<SongId> {
    let raw = match map.get(key)? {
        Value::String(s) => s.clone(),
        Value::Object(inner) => inner.get("$oid")?.as_str()?.to_string(),
        _ => return None,
    };
    let raw = raw.trim();
    (!raw.is_empty()).then(|| SongId::from_raw(raw))
}

/// Split a search query into lowercase words. Blank queries yield none.
pub fn query_words(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

/// Every word must occur somewhere in the title, ignoring case.
pub fn title_matches(title: &str, words: &[String]) -> bool {
    let title = title.to_lowercase();
    words.iter().all(|w| title.contains(w.as_str()))
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
pub fn escape_like(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for c in word.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn document_splits_identity_and_content() {
        let doc = SongDocument::from_value(json!({
            "title": "Hey Jude",
            "artist": "The Beatles",
            "language": "en",
            "chords": [[{"lyrics": "Hey", "chords": "F"}]],
        }))
        .unwrap();
        assert_eq!(doc.title, "Hey Jude");
        assert_eq!(doc.artist, "The Beatles");
        assert!(doc.id.is_none());
        assert_eq!(doc.content["language"], "en");
        assert!(doc.content.get("title").is_none());
    }

    #[test]
    fn mongo_object_id_is_kept() {
        let doc = SongDocument::from_value(json!({
            "_id": {"$oid": "65a1"},
            "title": "Veech Shelo",
            "artist": "Ariel Zilber",
        }))
        .unwrap();
        assert_eq!(doc.id, Some(SongId::from_raw("65a1")));
        assert!(doc.content.is_empty());
    }

    #[test]
    fn missing_title_rejected() {
        let err = SongDocument::from_value(json!({"artist": "x"})).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidDocument(_)));
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn non_object_rejected() {
        assert!(SongDocument::from_value(json!(42)).is_err());
    }

    #[test]
    fn parse_many_accepts_object_or_array() {
        let one = SongDocument::parse_many(r#"{"title":"A","artist":"B"}"#).unwrap();
        assert_eq!(one.len(), 1);
        let many = SongDocument::parse_many(
            r#"[{"title":"A","artist":"B"},{"title":"C","artist":"D"}]"#,
        )
        .unwrap();
        assert_eq!(many.len(), 2);
        assert!(SongDocument::parse_many("[{\"title\":\"A\"}]").is_err());
    }

    #[test]
    fn words_and_matching() {
        let words = query_words("  hey   JUDE ");
        assert_eq!(words, vec!["hey", "jude"]);
        assert!(title_matches("Hey Jude", &words));
        assert!(title_matches("JUDE, hey!", &words));
        assert!(!title_matches("Hey You", &words));
        assert!(query_words("   ").is_empty());
        assert!(title_matches("anything", &[]));
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }
}

//! Normalization of external catalog metadata.
//!
//! Gutendex records are loosely shaped: authors come as plain strings or as
//! objects, translators carry birth years nobody asked for, some format URLs
//! are not strings at all. Everything that reaches storage goes through
//! [`normalize`] first and comes out as a [`NewBook`].

use serde::de::IgnoredAny;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::{default_media_type, Author, BookContent, BookData, BookSource, GutenbergId, NewBook};
use crate::InvalidInput;

/// A person entry as found in the wild.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPerson {
    Name(String),
    Record {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        birth_year: Option<Value>,
        #[serde(default)]
        death_year: Option<Value>,
    },
    Other(IgnoredAny),
}

impl RawPerson {
    fn into_author(self) -> Option<Author> {
        match self {
            RawPerson::Name(name) => non_empty(name).map(|name| Author {
                name,
                birth_year: None,
                death_year: None,
            }),
            RawPerson::Record {
                name,
                birth_year,
                death_year,
            } => name.and_then(non_empty).map(|name| Author {
                name,
                birth_year: birth_year.as_ref().and_then(year),
                death_year: death_year.as_ref().and_then(year),
            }),
            RawPerson::Other(_) => None,
        }
    }

    fn into_name(self) -> Option<String> {
        self.into_author().map(|a| a.name)
    }
}

/// The `data` block of a record, every field optional and untyped.
#[derive(Debug, Default, Deserialize)]
pub struct RawBookData {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub authors: Option<Value>,
    #[serde(default)]
    pub summaries: Option<Value>,
    #[serde(default)]
    pub editors: Option<Value>,
    #[serde(default)]
    pub translators: Option<Value>,
    #[serde(default)]
    pub subjects: Option<Value>,
    #[serde(default)]
    pub bookshelves: Option<Value>,
    #[serde(default)]
    pub languages: Option<Value>,
    #[serde(default)]
    pub copyright: Option<Value>,
    #[serde(default)]
    pub media_type: Option<Value>,
    #[serde(default)]
    pub formats: Option<Value>,
    #[serde(default)]
    pub download_count: Option<Value>,
}

/// The two record shapes accepted on input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRecord {
    /// `{gutenberg_id, source, data: {...}, content}` as produced by our own exports.
    Wrapped {
        #[serde(default)]
        gutenberg_id: Option<Value>,
        #[serde(default)]
        id: Option<Value>,
        #[serde(default)]
        source: Option<String>,
        data: RawBookData,
        #[serde(default)]
        content: Option<BookContent>,
    },
    /// A bare Gutendex book object.
    Bare(RawBookData),
}

pub fn normalize(value: Value) -> Result<NewBook, InvalidInput> {
    let record: RawRecord = serde_json::from_value(value)
        .map_err(|e| InvalidInput::new(format!("malformed book record: {e}")))?;

    let (id, source, data, content) = match record {
        RawRecord::Wrapped {
            gutenberg_id,
            id,
            source,
            data,
            content,
        } => {
            let id = gutenberg_id.or_else(|| data.id.clone()).or(id);
            (id, source, data, content)
        }
        RawRecord::Bare(data) => (data.id.clone(), None, data, None),
    };

    let gutenberg_id = id
        .as_ref()
        .and_then(parse_id)
        .ok_or_else(|| InvalidInput::new("gutenberg_id must be a positive integer"))?;

    let source = match source {
        Some(s) => s.parse()?,
        None => BookSource::default(),
    };

    Ok(NewBook {
        gutenberg_id,
        source,
        data: normalize_data(data, gutenberg_id)?,
        content,
    })
}

/// Builds the fixed metadata shape. `data.id` always mirrors `gutenberg_id`.
pub fn normalize_data(raw: RawBookData, gutenberg_id: GutenbergId) -> Result<BookData, InvalidInput> {
    let title = match raw.title {
        Some(Value::String(t)) if !t.trim().is_empty() => t,
        _ => return Err(InvalidInput::new("data.title is required")),
    };

    Ok(BookData {
        id: gutenberg_id,
        title,
        authors: people(raw.authors)
            .into_iter()
            .filter_map(RawPerson::into_author)
            .collect(),
        summaries: strings(raw.summaries),
        editors: people(raw.editors)
            .into_iter()
            .filter_map(RawPerson::into_name)
            .collect(),
        translators: people(raw.translators)
            .into_iter()
            .filter_map(RawPerson::into_name)
            .collect(),
        subjects: strings(raw.subjects),
        bookshelves: strings(raw.bookshelves),
        languages: strings(raw.languages),
        copyright: raw.copyright.and_then(|v| v.as_bool()).unwrap_or(false),
        media_type: match raw.media_type {
            Some(Value::String(m)) => m,
            _ => default_media_type(),
        },
        formats: formats(raw.formats),
        download_count: raw.download_count.and_then(|v| v.as_u64()).unwrap_or(0),
    })
}

/// Accepts a positive JSON integer, an integral float, or a numeric string.
/// Ids must fit the signed 64-bit storage key.
pub fn parse_id(value: &Value) -> Option<GutenbergId> {
    let id = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 1.0 && *f <= u32::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (id > 0 && id <= i64::MAX as u64).then_some(id)
}

fn year(value: &Value) -> Option<i32> {
    value.as_i64().and_then(|y| i32::try_from(y).ok())
}

fn non_empty(s: String) -> Option<String> {
    (!s.trim().is_empty()).then_some(s)
}

fn people(value: Option<Value>) -> Vec<RawPerson> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or(RawPerson::Other(IgnoredAny)))
            .collect(),
        _ => Vec::new(),
    }
}

fn strings(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn formats(value: Option<Value>) -> BTreeMap<String, String> {
    match value {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter(|(key, _)| !key.contains('.'))
            .filter_map(|(key, url)| match url {
                Value::String(url) => Some((key, url)),
                _ => None,
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_bare_gutendex_record() {
        let book = normalize(json!({
            "id": 1342,
            "title": "Pride and Prejudice",
            "authors": [
                {"name": "Austen, Jane", "birth_year": 1775, "death_year": 1817},
                "Anonymous",
                {"birth_year": 1900},
                42
            ],
            "translators": [{"name": "Nobody", "birth_year": null}],
            "subjects": ["Courtship -- Fiction", 7],
            "bookshelves": ["Best Books Ever Listings"],
            "languages": ["en"],
            "formats": {
                "text/html": "https://example.org/1342.html",
                "application/x-mobipocket-ebook": "https://example.org/1342.mobi",
                "text/plain; charset=us-ascii": {"nested": true},
                "image/jpeg.cover": "https://example.org/cover.jpg"
            },
            "download_count": 50000
        }))
        .unwrap();

        assert_eq!(book.gutenberg_id, 1342);
        assert_eq!(book.source, BookSource::Gutendex);
        assert_eq!(book.data.id, 1342);
        assert_eq!(book.data.authors.len(), 2);
        assert_eq!(book.data.authors[0].birth_year, Some(1775));
        assert_eq!(book.data.authors[1].name, "Anonymous");
        assert_eq!(book.data.translators, vec!["Nobody"]);
        assert_eq!(book.data.subjects, vec!["Courtship -- Fiction"]);
        assert_eq!(book.data.formats.len(), 2);
        assert!(!book.data.formats.contains_key("image/jpeg.cover"));
        assert_eq!(book.data.media_type, "Text");
        assert_eq!(book.data.download_count, 50000);
    }

    #[test]
    fn normalizes_wrapped_record() {
        let book = normalize(json!({
            "gutenberg_id": "84",
            "source": "manual",
            "data": {"title": "Frankenstein", "editors": ["Someone", {"name": "Else"}]},
            "content": {"base_path": "/books/84"}
        }))
        .unwrap();

        assert_eq!(book.gutenberg_id, 84);
        assert_eq!(book.source, BookSource::Manual);
        assert_eq!(book.data.id, 84);
        assert_eq!(book.data.editors, vec!["Someone", "Else"]);
        assert_eq!(book.content.unwrap().base_path.as_deref(), Some("/books/84"));
    }

    #[test]
    fn wrapped_record_falls_back_to_data_id() {
        let book = normalize(json!({"data": {"id": 11, "title": "Alice"}})).unwrap();
        assert_eq!(book.gutenberg_id, 11);
    }

    #[test]
    fn wrapped_record_falls_back_to_top_level_id() {
        let book = normalize(json!({"id": 5, "data": {"title": "T"}})).unwrap();
        assert_eq!(book.gutenberg_id, 5);
        assert_eq!(book.data.id, 5);

        let book = normalize(json!({"id": 5, "data": {"id": 6, "title": "T"}})).unwrap();
        assert_eq!(book.gutenberg_id, 6);
    }

    #[test]
    fn rejects_missing_title() {
        let err = normalize(json!({"gutenberg_id": 5, "data": {"title": "  "}})).unwrap_err();
        assert!(err.0.contains("title"));
        assert!(normalize(json!({"id": 5})).is_err());
    }

    #[test]
    fn rejects_bad_identifiers() {
        for id in [json!(0), json!(-3), json!(2.5), json!("abc"), json!(null), json!([1])] {
            let result = normalize(json!({"gutenberg_id": id, "data": {"title": "T"}}));
            assert!(result.is_err(), "{id} should be rejected");
        }
    }

    #[test]
    fn rejects_unknown_source() {
        assert!(normalize(json!({"gutenberg_id": 1, "source": "scraped", "data": {"title": "T"}})).is_err());
    }

    #[test]
    fn non_array_lists_become_empty() {
        let book = normalize(json!({"id": 3, "title": "T", "authors": "Jane", "subjects": {"a": 1}})).unwrap();
        assert!(book.data.authors.is_empty());
        assert!(book.data.subjects.is_empty());
    }
}

//! Keyword rules that group raw Gutenberg bookshelves and subjects into a
//! small set of reader-facing genres.
//!
//! A [`GenreTable`] is built once at startup and shared read-only. It is used
//! in two directions: [`GenreTable::classify`] tags a book from its labels, and
//! [`GenreTable::filter_for`] turns a genre name back into a label filter for
//! catalog queries. Both sides fold case the same way, so every genre a book is
//! classified under also selects that book.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::utils::fold;
use crate::InvalidInput;

pub const FALLBACK_GENRE: &str = "Other & Miscellaneous";

const DEFAULT_RULES: &[(&str, &[&str])] = &[
    (
        "Fiction",
        &["fiction", "short stories", "story", "novel", "romance"],
    ),
    (
        "Mystery & Thrillers",
        &["mystery", "detective", "thriller", "crime"],
    ),
    (
        "Science Fiction & Fantasy",
        &[
            "science fiction",
            "sci-fi",
            "fantasy",
            "fairy tales",
            "ghost",
            "horror",
            "weird",
        ],
    ),
    ("Poetry", &["poetry", "poems", "verse"]),
    ("Drama & Plays", &["drama", "plays", "theatre", "theater"]),
    (
        "Children & Young Readers",
        &["children", "juvenile", "fairy tales", "young readers"],
    ),
    (
        "History & Politics",
        &[
            "history",
            "historical",
            "war",
            "military",
            "politics",
            "government",
        ],
    ),
    (
        "Biography & Memoir",
        &["biography", "autobiography", "memoir", "letters"],
    ),
    (
        "Religion & Spirituality",
        &["religion", "theology", "bible", "sermons", "spiritual"],
    ),
    (
        "Science & Mathematics",
        &[
            "science",
            "mathematics",
            "physics",
            "chemistry",
            "biology",
            "astronomy",
            "medicine",
        ],
    ),
    ("Philosophy & Essays", &["philosophy", "ethics", "essays"]),
    ("Travel & Adventure", &["travel", "adventure", "exploration"]),
    (
        "Art, Music & Design",
        &["art", "architecture", "music", "design"],
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreRule {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GenreTableError {
    #[error("failed to read genre table: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse genre table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid genre table: {0}")]
    Invalid(String),
}

#[derive(Deserialize)]
struct GenreTableFile {
    fallback: Option<String>,
    rules: Vec<GenreRule>,
}

/// Label filter produced by expanding a genre name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenreFilter<'a> {
    /// Some label contains at least one of the keywords.
    AnyKeyword(Vec<&'a str>),
    /// The label list is non-empty and no label contains any of the keywords.
    /// Selects books that classify under the fallback genre.
    NoKeyword(Vec<&'a str>),
}

impl GenreFilter<'_> {
    pub fn keywords(&self) -> &[&str] {
        match self {
            GenreFilter::AnyKeyword(k) | GenreFilter::NoKeyword(k) => k,
        }
    }

    /// In-memory evaluation, equivalent to what storage does in SQL.
    pub fn matches<S: AsRef<str>>(&self, labels: &[S]) -> bool {
        let any_hit = labels.iter().any(|label| {
            let folded = fold(label.as_ref());
            self.keywords().iter().any(|kw| folded.contains(kw))
        });
        match self {
            GenreFilter::AnyKeyword(_) => any_hit,
            GenreFilter::NoKeyword(_) => !labels.is_empty() && !any_hit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreTable {
    rules: Vec<GenreRule>,
    fallback: String,
}

impl Default for GenreTable {
    fn default() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(name, keywords)| GenreRule {
                name: name.to_string(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            })
            .collect();
        Self {
            rules,
            fallback: FALLBACK_GENRE.to_string(),
        }
    }
}

impl GenreTable {
    pub fn new(rules: Vec<GenreRule>, fallback: impl Into<String>) -> Result<Self, GenreTableError> {
        let fallback = fallback.into();
        if fallback.trim().is_empty() {
            return Err(GenreTableError::Invalid("fallback genre is empty".into()));
        }

        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(rules.len());
        for rule in rules {
            if rule.name.trim().is_empty() {
                return Err(GenreTableError::Invalid("rule with an empty name".into()));
            }
            if rule.name == fallback {
                return Err(GenreTableError::Invalid(format!(
                    "rule `{}` shadows the fallback genre",
                    rule.name
                )));
            }
            if !seen.insert(rule.name.clone()) {
                return Err(GenreTableError::Invalid(format!(
                    "duplicate rule `{}`",
                    rule.name
                )));
            }
            let mut keywords = Vec::with_capacity(rule.keywords.len());
            for kw in rule.keywords {
                if kw.is_empty() {
                    return Err(GenreTableError::Invalid(format!(
                        "rule `{}` has an empty keyword",
                        rule.name
                    )));
                }
                keywords.push(fold(&kw));
            }
            normalized.push(GenreRule {
                name: rule.name,
                keywords,
            });
        }

        Ok(Self {
            rules: normalized,
            fallback,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, GenreTableError> {
        let file: GenreTableFile = toml::from_str(contents)?;
        let fallback = file.fallback.unwrap_or_else(|| FALLBACK_GENRE.to_string());
        Self::new(file.rules, fallback)
    }

    pub fn load(path: &Path) -> Result<Self, GenreTableError> {
        let contents = std::fs::read_to_string(path)?;
        let table = Self::from_toml_str(&contents)?;
        tracing::info!(
            "Loaded {} genre rules from {}",
            table.rules.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn rules(&self) -> &[GenreRule] {
        &self.rules
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Genres whose keywords occur (case-insensitively) in at least one label.
    ///
    /// Non-empty input that matches nothing yields only the fallback genre;
    /// empty input yields the empty set.
    pub fn classify<S: AsRef<str>>(&self, labels: &[S]) -> BTreeSet<&str> {
        let mut genres = BTreeSet::new();
        for label in labels {
            let label = label.as_ref();
            if label.is_empty() {
                continue;
            }
            let folded = fold(label);
            for rule in &self.rules {
                if rule.keywords.iter().any(|kw| folded.contains(kw.as_str())) {
                    genres.insert(rule.name.as_str());
                }
            }
        }
        if genres.is_empty() && !labels.is_empty() {
            genres.insert(self.fallback.as_str());
        }
        genres
    }

    pub fn filter_for(&self, genre: &str) -> Result<GenreFilter<'_>, InvalidInput> {
        if genre == self.fallback {
            let mut all: Vec<&str> = self
                .rules
                .iter()
                .flat_map(|r| r.keywords.iter().map(String::as_str))
                .collect();
            all.sort_unstable();
            all.dedup();
            return Ok(GenreFilter::NoKeyword(all));
        }

        self.rules
            .iter()
            .find(|r| r.name == genre)
            .map(|r| GenreFilter::AnyKeyword(r.keywords.iter().map(String::as_str).collect()))
            .ok_or_else(|| InvalidInput::new(format!("unknown genre `{genre}`")))
    }
}

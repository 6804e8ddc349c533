use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::InvalidInput;

pub type GutenbergId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookSource {
    #[default]
    Gutendex,
    Manual,
}

impl BookSource {
    pub fn as_str(self) -> &'static str {
        match self {
            BookSource::Gutendex => "gutendex",
            BookSource::Manual => "manual",
        }
    }
}

impl FromStr for BookSource {
    type Err = InvalidInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gutendex" => Ok(BookSource::Gutendex),
            "manual" => Ok(BookSource::Manual),
            other => Err(InvalidInput::new(format!("unknown book source `{other}`"))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_year: Option<i32>,
}

/// Catalog metadata as imported from the external catalog.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct BookData {
    pub id: GutenbergId,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub summaries: Vec<String>,
    #[serde(default)]
    pub editors: Vec<String>,
    #[serde(default)]
    pub translators: Vec<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub bookshelves: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub copyright: bool,
    #[serde(default = "default_media_type")]
    pub media_type: String,
    #[serde(default)]
    pub formats: BTreeMap<String, String>,
    #[serde(default)]
    pub download_count: u64,
}

pub fn default_media_type() -> String {
    "Text".to_string()
}

impl BookData {
    /// Bookshelves followed by subjects, the label list the genre classifier reads.
    pub fn labels(&self) -> Vec<&str> {
        self.bookshelves
            .iter()
            .chain(self.subjects.iter())
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct BookContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_format: Option<String>,
}

/// A normalized book ready to be written to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub gutenberg_id: GutenbergId,
    pub source: BookSource,
    pub data: BookData,
    pub content: Option<BookContent>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Book {
    pub gutenberg_id: GutenbergId,
    pub source: BookSource,
    pub data: BookData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<BookContent>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Compact view of a book attached to progress listings.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct BookSummary {
    pub title: String,
    pub authors: Vec<String>,
    pub languages: Vec<String>,
    pub labels: Vec<String>,
    pub genres: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = InvalidInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(InvalidInput::new(format!("unknown role `{other}`"))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    #[default]
    InProgress,
    Completed,
    Abandoned,
}

impl FromStr for ReadingStatus {
    type Err = InvalidInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(ReadingStatus::InProgress),
            "completed" => Ok(ReadingStatus::Completed),
            "abandoned" => Ok(ReadingStatus::Abandoned),
            other => Err(InvalidInput::new(format!(
                "status must be one of in_progress, completed, abandoned (got `{other}`)"
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    #[serde(rename = "gutenberg_id")]
    pub gutenberg_id: GutenbergId,
    pub status: ReadingStatus,
    pub progress_percent: f64,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_percent: Option<f64>,
    pub last_visited_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub total_visits: u64,
}

/// A progress entry joined with the book it refers to.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct ProgressView {
    #[serde(flatten)]
    pub entry: ProgressEntry,
    pub book: Option<BookSummary>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenreStat {
    pub genre: String,
    pub visits: u64,
    pub completed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub preferred_genres: Vec<String>,
    #[serde(default)]
    pub preferred_languages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub preferences: Preferences,
    pub reading_progress: Vec<ProgressEntry>,
    pub genre_stats: Vec<GenreStat>,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
}

/// What the API returns for a user. Never carries the password hash.
#[derive(Debug, Serialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub role: Role,
    pub preferences: Preferences,
    pub reading_progress: Vec<ProgressEntry>,
    pub genre_stats: Vec<GenreStat>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role,
            preferences: user.preferences.clone(),
            reading_progress: user.reading_progress.clone(),
            genre_stats: user.genre_stats.clone(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone)]
pub struct Shelf {
    pub name: String,
    pub count: u64,
}

/// One page of a listing, in the `{data, page, limit, total}` wire shape.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct Page<T> {
    #[serde(rename = "data")]
    pub items: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
}

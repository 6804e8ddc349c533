use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::genre::GenreTable;
use crate::models::{Book, GenreStat, ProgressEntry, ReadingStatus, User};
use crate::InvalidInput;

pub const DEFAULT_FILE_PATH: &str = "index.html";

/// Body of a progress write, as sent by the reader.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_percent")]
    pub progress_percent: Option<f64>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub anchor_id: Option<String>,
    #[serde(default)]
    pub scroll_percent: Option<f64>,
}

/// Accepts a number or a numeric string. Anything else reads as 0.
fn lenient_percent<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let percent = match Option::<Value>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|p| p.is_finite()),
        Some(_) => None,
    };
    Ok(Some(percent.unwrap_or(0.0)))
}

/// A progress write that passed validation, with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Visit {
    pub status: ReadingStatus,
    /// Unclamped; a value of 100 or more marks the book completed.
    pub raw_percent: f64,
    pub file_path: String,
    pub anchor_id: Option<String>,
    pub scroll_percent: Option<f64>,
}

impl Visit {
    pub fn is_completed(&self) -> bool {
        self.status == ReadingStatus::Completed || self.raw_percent >= 100.0
    }

    fn clamped_percent(&self) -> f64 {
        if self.raw_percent.is_finite() {
            self.raw_percent.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

impl ProgressUpdate {
    pub fn validate(self) -> Result<Visit, InvalidInput> {
        let status = match self.status.as_deref() {
            Some(s) => s.parse()?,
            None => ReadingStatus::InProgress,
        };

        if let Some(scroll) = self.scroll_percent {
            if !(0.0..=100.0).contains(&scroll) {
                return Err(InvalidInput::new("scrollPercent must be between 0 and 100"));
            }
        }

        Ok(Visit {
            status,
            raw_percent: self.progress_percent.unwrap_or(0.0),
            file_path: self
                .file_path
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_FILE_PATH.to_string()),
            anchor_id: self.anchor_id,
            scroll_percent: self.scroll_percent,
        })
    }
}

/// Upserts the user's entry for `book` and bumps the per-genre counters.
///
/// Returns true when this visit is the first completion of the entry.
pub fn record_visit(
    user: &mut User,
    book: &Book,
    visit: &Visit,
    genres: &GenreTable,
    now: DateTime<Utc>,
) -> bool {
    let completed = visit.is_completed();
    let status = if completed {
        ReadingStatus::Completed
    } else {
        visit.status
    };
    let percent = visit.clamped_percent();

    let newly_completed = match user
        .reading_progress
        .iter_mut()
        .find(|p| p.gutenberg_id == book.gutenberg_id)
    {
        Some(entry) => {
            entry.status = status;
            entry.progress_percent = percent;
            entry.file_path = visit.file_path.clone();
            entry.anchor_id = visit.anchor_id.clone();
            entry.scroll_percent = visit.scroll_percent;
            entry.last_visited_at = now;
            entry.total_visits += 1;

            let first = completed && entry.completed_at.is_none();
            if first {
                entry.completed_at = Some(now);
            }
            first
        }
        None => {
            user.reading_progress.push(ProgressEntry {
                gutenberg_id: book.gutenberg_id,
                status,
                progress_percent: percent,
                file_path: visit.file_path.clone(),
                anchor_id: visit.anchor_id.clone(),
                scroll_percent: visit.scroll_percent,
                last_visited_at: now,
                started_at: now,
                completed_at: completed.then_some(now),
                total_visits: 1,
            });
            completed
        }
    };

    bump_genre_stats(user, book, genres, completed, now);
    newly_completed
}

/// Every completed write counts towards `completed`, not only the first.
fn bump_genre_stats(
    user: &mut User,
    book: &Book,
    genres: &GenreTable,
    completed: bool,
    now: DateTime<Utc>,
) {
    let completed = u64::from(completed);
    for genre in genres.classify(&book.data.labels()) {
        match user.genre_stats.iter_mut().find(|g| g.genre == genre) {
            Some(stat) => {
                stat.visits += 1;
                stat.completed += completed;
                stat.last_visited_at = Some(now);
            }
            None => user.genre_stats.push(GenreStat {
                genre: genre.to_string(),
                visits: 1,
                completed,
                last_visited_at: Some(now),
            }),
        }
    }
}

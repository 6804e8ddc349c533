use chrono::Utc;
use gutenshelf_common::progress::{record_visit, ProgressUpdate};
use gutenshelf_common::{Book, BookSummary, GutenbergId, ProgressEntry, ProgressView, User};
use std::collections::HashMap;

use crate::error::{Result, ServiceError};
use crate::App;

impl App {
    /// Records one visit of `user_id` to a book and returns the user's progress
    /// entries as stored.
    pub async fn record_progress(
        &self,
        user_id: &str,
        gutenberg_id: GutenbergId,
        update: ProgressUpdate,
    ) -> Result<Vec<ProgressEntry>> {
        let visit = update.validate()?;
        let book = self.get_book(gutenberg_id).await?;
        let now = Utc::now();
        let genres = &self.genres;

        let (user, newly_completed) = self
            .storage
            .update_user(user_id, |user| {
                Ok::<_, ServiceError>(record_visit(user, &book, &visit, genres, now))
            })
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))?;

        if newly_completed {
            tracing::info!("User {} completed book {}", user.id, gutenberg_id);
        } else {
            tracing::debug!("User {} visited book {}", user.id, gutenberg_id);
        }
        Ok(user.reading_progress)
    }

    /// All of the user's entries, most recently visited first.
    pub async fn list_progress(&self, user: &User) -> Result<Vec<ProgressView>> {
        let ids: Vec<GutenbergId> = user.reading_progress.iter().map(|p| p.gutenberg_id).collect();
        let books: HashMap<GutenbergId, Book> = self
            .storage
            .get_books(&ids)
            .await?
            .into_iter()
            .map(|b| (b.gutenberg_id, b))
            .collect();

        let mut views: Vec<ProgressView> = user
            .reading_progress
            .iter()
            .map(|entry| ProgressView {
                entry: entry.clone(),
                book: books.get(&entry.gutenberg_id).map(|b| self.summarize(b)),
            })
            .collect();
        views.sort_by(|a, b| b.entry.last_visited_at.cmp(&a.entry.last_visited_at));
        Ok(views)
    }

    pub async fn get_progress(&self, user: &User, gutenberg_id: GutenbergId) -> Result<ProgressView> {
        let entry = user
            .reading_progress
            .iter()
            .find(|p| p.gutenberg_id == gutenberg_id)
            .ok_or_else(|| ServiceError::NotFound(format!("No progress for book {gutenberg_id}")))?;
        let book = self.storage.get_book(gutenberg_id).await?;
        Ok(ProgressView {
            entry: entry.clone(),
            book: book.as_ref().map(|b| self.summarize(b)),
        })
    }

    fn summarize(&self, book: &Book) -> BookSummary {
        let labels = book.data.labels();
        BookSummary {
            title: book.data.title.clone(),
            authors: book.data.authors.iter().map(|a| a.name.clone()).collect(),
            languages: book.data.languages.clone(),
            genres: self
                .genres
                .classify(labels.as_slice())
                .into_iter()
                .map(str::to_string)
                .collect(),
            labels: labels.into_iter().map(str::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gutenshelf_common::genre::GenreTable;
    use gutenshelf_common::{NewUser, ReadingStatus};
    use gutenshelf_storage::Storage;
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup() -> (App, User, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path()).await.unwrap();
        let app = App::new(storage, GenreTable::default());
        let user = app
            .storage
            .create_user(&NewUser {
                email: "reader@example.com".into(),
                password_hash: "x".into(),
                display_name: None,
            })
            .await
            .unwrap();
        app.create_book(json!({
            "id": 1,
            "title": "The Hound of the Baskervilles",
            "authors": [{"name": "Doyle, Arthur Conan"}],
            "bookshelves": ["Detective Fiction"],
            "languages": ["en"],
        }))
        .await
        .unwrap();
        app.create_book(json!({"id": 2, "title": "Leaves of Grass", "subjects": ["Poetry"]}))
            .await
            .unwrap();
        (app, user, dir)
    }

    fn update(body: serde_json::Value) -> ProgressUpdate {
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn every_completed_write_counts_for_genres() {
        let (app, user, _dir) = setup().await;
        let done = update(json!({"status": "completed"}));

        let first = app.record_progress(&user.id, 1, done.clone()).await.unwrap();
        let entries = app.record_progress(&user.id, 1, done).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].completed_at, first[0].completed_at);
        assert_eq!(entries[0].status, ReadingStatus::Completed);
        assert_eq!(entries[0].total_visits, 2);

        let stored = app.storage.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.genre_stats.len(), 2);
        assert!(stored.genre_stats.iter().all(|g| g.visits == 2 && g.completed == 2));
    }

    #[tokio::test]
    async fn missing_book_or_user() {
        let (app, user, _dir) = setup().await;
        let err = app
            .record_progress(&user.id, 404, ProgressUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err = app
            .record_progress("nobody", 1, ProgressUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn invalid_fields_are_rejected() {
        let (app, user, _dir) = setup().await;
        let err = app
            .record_progress(&user.id, 1, update(json!({"scrollPercent": 120})))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn list_is_most_recent_first_with_summaries() {
        let (app, user, _dir) = setup().await;
        app.record_progress(&user.id, 1, ProgressUpdate::default()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        app.record_progress(&user.id, 2, ProgressUpdate::default()).await.unwrap();
        app.delete_book(2).await.unwrap();

        let user = app.storage.get_user(&user.id).await.unwrap().unwrap();
        let views = app.list_progress(&user).await.unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].entry.gutenberg_id, 2);
        assert!(views[0].book.is_none());

        let summary = views[1].book.as_ref().unwrap();
        assert_eq!(summary.title, "The Hound of the Baskervilles");
        assert_eq!(summary.authors, vec!["Doyle, Arthur Conan"]);
        assert_eq!(summary.labels, vec!["Detective Fiction"]);
        assert_eq!(summary.genres, vec!["Fiction", "Mystery & Thrillers"]);

        let one = app.get_progress(&user, 1).await.unwrap();
        assert_eq!(one.entry.gutenberg_id, 1);
        assert!(matches!(
            app.get_progress(&user, 3).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}

use gutenshelf_common::import::{self, normalize_data, parse_id, RawBookData};
use gutenshelf_common::utils::paging::Pagination;
use gutenshelf_common::{Book, BookContent, GutenbergId, NewBook, Page, Shelf};
use gutenshelf_storage::BookFilter;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Result, ServiceError};
use crate::App;

/// Raw catalog query parameters. Everything stays a string so that bad
/// numbers fall back to defaults instead of rejecting the request.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub bookshelf: Option<String>,
    pub genre: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub random: Option<String>,
}

impl ListQuery {
    fn pagination(&self, max_limit: u64) -> Pagination {
        Pagination::parse(self.page.as_deref(), self.limit.as_deref(), max_limit)
    }

    fn is_random(&self) -> bool {
        matches!(self.random.as_deref(), Some("true") | Some("1"))
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl App {
    /// An unknown genre name applies no genre filter.
    fn book_filter(&self, query: &ListQuery) -> BookFilter<'_> {
        let genre = present(&query.genre).and_then(|name| match self.genres.filter_for(name) {
            Ok(filter) => Some(filter),
            Err(e) => {
                tracing::debug!("Ignoring genre filter: {}", e);
                None
            }
        });
        BookFilter {
            title: present(&query.q).map(str::to_string),
            bookshelf: present(&query.bookshelf).map(str::to_string),
            genre,
        }
    }

    pub async fn list_books(&self, query: &ListQuery) -> Result<Page<Book>> {
        let filter = self.book_filter(query);
        let pagination = query.pagination(self.max_page_size);
        let total = self.storage.count_books(&filter).await?;

        if query.is_random() {
            let items = self.storage.sample_books(&filter, pagination.limit).await?;
            return Ok(Page {
                items,
                page: 1,
                limit: pagination.limit,
                total,
            });
        }

        let items = self.storage.find_books(&filter, pagination).await?;
        Ok(Page {
            items,
            page: pagination.page,
            limit: pagination.limit,
            total,
        })
    }

    /// Title search and paging only.
    pub async fn admin_list_books(&self, query: &ListQuery) -> Result<Page<Book>> {
        let filter = BookFilter {
            title: present(&query.q).map(str::to_string),
            ..Default::default()
        };
        let pagination = query.pagination(self.max_page_size);
        let total = self.storage.count_books(&filter).await?;
        let items = self.storage.find_books(&filter, pagination).await?;
        Ok(Page {
            items,
            page: pagination.page,
            limit: pagination.limit,
            total,
        })
    }

    /// Number of books per genre, sorted by genre name.
    pub async fn bookshelves(&self) -> Result<Vec<Shelf>> {
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        let labels = self.storage.book_labels().await?;
        for book_labels in &labels {
            for genre in self.genres.classify(book_labels.as_slice()) {
                *counts.entry(genre).or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .map(|(name, count)| Shelf {
                name: name.to_string(),
                count,
            })
            .collect())
    }

    pub async fn get_book(&self, gutenberg_id: GutenbergId) -> Result<Book> {
        self.storage
            .get_book(gutenberg_id)
            .await?
            .ok_or_else(|| book_not_found(gutenberg_id))
    }

    pub async fn create_book(&self, payload: Value) -> Result<Book> {
        let book = import::normalize(payload)?;
        let created = self.storage.insert_book(&book).await?;
        tracing::info!("Created book {} ({})", created.gutenberg_id, created.data.title);
        Ok(created)
    }

    /// Replaces any of `source`, `data` and `content`. The id cannot change.
    pub async fn update_book(&self, gutenberg_id: GutenbergId, patch: Value) -> Result<Book> {
        let Value::Object(mut patch) = patch else {
            return Err(ServiceError::Validation("body must be a JSON object".into()));
        };
        let existing = self.get_book(gutenberg_id).await?;

        if let Some(raw) = patch.remove("gutenberg_id") {
            if parse_id(&raw) != Some(gutenberg_id) {
                return Err(ServiceError::Validation("gutenberg_id cannot be changed".into()));
            }
        }

        let source = match patch.remove("source") {
            Some(Value::String(s)) => s.parse()?,
            Some(Value::Null) | None => existing.source,
            Some(_) => return Err(ServiceError::Validation("source must be a string".into())),
        };

        let data = match patch.remove("data") {
            Some(raw) => {
                let raw: RawBookData = serde_json::from_value(raw)
                    .map_err(|e| ServiceError::Validation(format!("malformed data: {e}")))?;
                if let Some(id) = &raw.id {
                    if parse_id(id) != Some(gutenberg_id) {
                        return Err(ServiceError::Validation("data.id cannot be changed".into()));
                    }
                }
                normalize_data(raw, gutenberg_id)?
            }
            None => existing.data,
        };

        let content = match patch.remove("content") {
            Some(Value::Null) => None,
            Some(raw) => Some(
                serde_json::from_value::<BookContent>(raw)
                    .map_err(|e| ServiceError::Validation(format!("malformed content: {e}")))?,
            ),
            None => existing.content,
        };

        let book = NewBook {
            gutenberg_id,
            source,
            data,
            content,
        };
        let updated = self
            .storage
            .replace_book(&book)
            .await?
            .ok_or_else(|| book_not_found(gutenberg_id))?;
        tracing::info!("Updated book {}", gutenberg_id);
        Ok(updated)
    }

    pub async fn delete_book(&self, gutenberg_id: GutenbergId) -> Result<()> {
        if !self.storage.delete_book(gutenberg_id).await? {
            return Err(book_not_found(gutenberg_id));
        }
        tracing::info!("Deleted book {}", gutenberg_id);
        Ok(())
    }
}

fn book_not_found(gutenberg_id: GutenbergId) -> ServiceError {
    ServiceError::NotFound(format!("Book {gutenberg_id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gutenshelf_common::genre::GenreTable;
    use gutenshelf_storage::Storage;
    use serde_json::json;
    use tempfile::TempDir;

    async fn app() -> (App, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path()).await.unwrap();
        (App::new(storage, GenreTable::default()), dir)
    }

    fn query(pairs: &[(&str, &str)]) -> ListQuery {
        let mut q = ListQuery::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "q" => q.q = value,
                "bookshelf" => q.bookshelf = value,
                "genre" => q.genre = value,
                "page" => q.page = value,
                "limit" => q.limit = value,
                "random" => q.random = value,
                other => panic!("unknown key {other}"),
            }
        }
        q
    }

    #[tokio::test]
    async fn pride_example() {
        let (app, _dir) = app().await;
        app.create_book(json!({"id": 1342, "title": "Pride and Prejudice"}))
            .await
            .unwrap();
        app.create_book(json!({"id": 84, "title": "Frankenstein"}))
            .await
            .unwrap();

        let page = app.list_books(&query(&[("q", "pride")])).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 20);
        assert_eq!(page.items[0].gutenberg_id, 1342);
    }

    #[tokio::test]
    async fn random_keeps_total_and_reports_first_page() {
        let (app, _dir) = app().await;
        for id in 1..=6 {
            app.create_book(json!({"id": id, "title": format!("Book {id}")}))
                .await
                .unwrap();
        }
        let page = app
            .list_books(&query(&[("random", "true"), ("limit", "4"), ("page", "9")]))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 4);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 4);
        assert_eq!(page.total, 6);
    }

    #[tokio::test]
    async fn unknown_genre_is_ignored() {
        let (app, _dir) = app().await;
        app.create_book(json!({"id": 1, "title": "A", "bookshelves": ["Poetry"]}))
            .await
            .unwrap();
        app.create_book(json!({"id": 2, "title": "B"}))
            .await
            .unwrap();

        let page = app
            .list_books(&query(&[("genre", "Cookbooks")]))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 2);

        let page = app
            .list_books(&query(&[("genre", "Cookbooks"), ("q", "b")]))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn limit_is_capped() {
        let (app, _dir) = app().await;
        let app = app.with_max_page_size(10);
        let page = app.list_books(&query(&[("limit", "50")])).await.unwrap();
        assert_eq!(page.limit, 10);
        let page = app.admin_list_books(&query(&[("limit", "50")])).await.unwrap();
        assert_eq!(page.limit, 10);
    }

    #[tokio::test]
    async fn shelves_count_books_per_genre() {
        let (app, _dir) = app().await;
        app.create_book(json!({
            "id": 1,
            "title": "A",
            "bookshelves": ["Detective Fiction"],
        }))
        .await
        .unwrap();
        app.create_book(json!({"id": 2, "title": "B", "subjects": ["Poetry"]}))
            .await
            .unwrap();
        app.create_book(json!({"id": 3, "title": "C", "subjects": ["Cookery"]}))
            .await
            .unwrap();
        app.create_book(json!({"id": 4, "title": "D"})).await.unwrap();

        let shelves = app.bookshelves().await.unwrap();
        let as_pairs: Vec<(&str, u64)> =
            shelves.iter().map(|s| (s.name.as_str(), s.count)).collect();
        assert_eq!(
            as_pairs,
            vec![
                ("Fiction", 1),
                ("Mystery & Thrillers", 1),
                ("Other & Miscellaneous", 1),
                ("Poetry", 1),
            ]
        );
    }

    #[tokio::test]
    async fn create_validates_and_conflicts() {
        let (app, _dir) = app().await;
        let missing_title = app.create_book(json!({"gutenberg_id": 5, "data": {}})).await;
        assert!(matches!(missing_title, Err(ServiceError::Validation(_))));

        let bad_id = app.create_book(json!({"gutenberg_id": -1, "data": {"title": "X"}})).await;
        assert!(matches!(bad_id, Err(ServiceError::Validation(_))));

        app.create_book(json!({"gutenberg_id": 5, "data": {"title": "X"}}))
            .await
            .unwrap();
        let dup = app.create_book(json!({"gutenberg_id": 5, "data": {"title": "Y"}})).await;
        assert!(matches!(dup, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn update_replaces_parts_and_keeps_id() {
        let (app, _dir) = app().await;
        app.create_book(json!({
            "gutenberg_id": 11,
            "data": {"title": "Alice"},
            "content": {"base_path": "/books/11"},
        }))
        .await
        .unwrap();

        let updated = app
            .update_book(11, json!({"source": "manual", "data": {"title": "Alice in Wonderland"}}))
            .await
            .unwrap();
        assert_eq!(updated.data.title, "Alice in Wonderland");
        assert_eq!(updated.data.id, 11);
        assert_eq!(updated.source.as_str(), "manual");
        assert_eq!(
            updated.content.and_then(|c| c.base_path).as_deref(),
            Some("/books/11")
        );

        let moved = app.update_book(11, json!({"gutenberg_id": 12})).await;
        assert!(matches!(moved, Err(ServiceError::Validation(_))));

        let missing = app.update_book(99, json!({"data": {"title": "Z"}})).await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_then_not_found() {
        let (app, _dir) = app().await;
        app.create_book(json!({"id": 7, "title": "Gone"})).await.unwrap();
        app.delete_book(7).await.unwrap();
        assert!(matches!(app.delete_book(7).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(app.get_book(7).await, Err(ServiceError::NotFound(_))));
    }
}

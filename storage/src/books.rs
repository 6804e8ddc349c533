use gutenshelf_common::genre::GenreFilter;
use gutenshelf_common::utils::fold;
use gutenshelf_common::utils::paging::Pagination;
use gutenshelf_common::{Book, BookContent, BookData, GutenbergId, NewBook};
use sqlx::{FromRow, QueryBuilder, Sqlite};

use crate::error::{is_unique_violation, Error, Result};
use crate::Storage;

const BOOK_COLUMNS: &str = "gutenberg_id, source, data, content, created_at, updated_at";

/// Predicate over the book collection. Absent fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct BookFilter<'a> {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    /// Exact element of the bookshelf list.
    pub bookshelf: Option<String>,
    pub genre: Option<GenreFilter<'a>>,
}

#[derive(FromRow)]
struct BookRow {
    gutenberg_id: i64,
    source: String,
    data: String,
    content: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<BookRow> for Book {
    type Error = Error;

    fn try_from(row: BookRow) -> Result<Self> {
        let content = match row.content {
            Some(raw) => serde_json::from_str::<Option<BookContent>>(&raw)?,
            None => None,
        };
        Ok(Book {
            gutenberg_id: u64::try_from(row.gutenberg_id)
                .map_err(|_| Error::Corrupt(format!("negative book id {}", row.gutenberg_id)))?,
            source: row
                .source
                .parse()
                .map_err(|e| Error::Corrupt(format!("book {}: {e}", row.gutenberg_id)))?,
            data: serde_json::from_str::<BookData>(&row.data)?,
            content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Column values derived from a book's metadata.
struct BookColumns {
    title_folded: String,
    bookshelves: String,
    labels: String,
    labels_folded: String,
    data: String,
    content: Option<String>,
}

impl BookColumns {
    fn encode(book: &NewBook) -> Result<Self> {
        let labels = book.data.labels();
        let folded: Vec<String> = labels.iter().map(|l| fold(l)).collect();
        Ok(Self {
            title_folded: fold(&book.data.title),
            bookshelves: serde_json::to_string(&book.data.bookshelves)?,
            labels: serde_json::to_string(&labels)?,
            labels_folded: serde_json::to_string(&folded)?,
            data: serde_json::to_string(&book.data)?,
            content: book
                .content
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        })
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &BookFilter<'_>) {
    qb.push(" WHERE 1 = 1");

    if let Some(title) = &filter.title {
        qb.push(" AND instr(books.title_folded, ")
            .push_bind(fold(title))
            .push(") > 0");
    }

    if let Some(shelf) = &filter.bookshelf {
        qb.push(" AND EXISTS (SELECT 1 FROM json_each(books.bookshelves) AS shelf WHERE shelf.value = ")
            .push_bind(shelf.clone())
            .push(")");
    }

    match &filter.genre {
        Some(GenreFilter::AnyKeyword(keywords)) => {
            qb.push(" AND ");
            push_keyword_match(qb, keywords);
        }
        Some(GenreFilter::NoKeyword(keywords)) => {
            qb.push(" AND json_array_length(books.labels_folded) > 0 AND NOT ");
            push_keyword_match(qb, keywords);
        }
        None => {}
    }
}

/// True when some folded label contains one of `keywords`.
fn push_keyword_match(qb: &mut QueryBuilder<'_, Sqlite>, keywords: &[&str]) {
    if keywords.is_empty() {
        qb.push("0");
        return;
    }
    qb.push("EXISTS (SELECT 1 FROM json_each(books.labels_folded) AS label WHERE ");
    let mut any = qb.separated(" OR ");
    for kw in keywords {
        any.push("instr(label.value, ")
            .push_bind_unseparated(kw.to_string())
            .push_unseparated(") > 0");
    }
    qb.push(")");
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl Storage {
    pub async fn get_book(&self, gutenberg_id: GutenbergId) -> Result<Option<Book>> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE gutenberg_id = ?"
        ))
        .bind(to_i64(gutenberg_id))
        .fetch_optional(&self.pool)
        .await?;
        row.map(Book::try_from).transpose()
    }

    pub async fn get_books(&self, ids: &[GutenbergId]) -> Result<Vec<Book>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE gutenberg_id IN ("
        ));
        let mut list = qb.separated(", ");
        for id in ids {
            list.push_bind(to_i64(*id));
        }
        qb.push(")");

        let rows = qb.build_query_as::<BookRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(Book::try_from).collect()
    }

    /// Page of matching books, ordered by title then id.
    pub async fn find_books(&self, filter: &BookFilter<'_>, pagination: Pagination) -> Result<Vec<Book>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {BOOK_COLUMNS} FROM books"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY books.title ASC, books.gutenberg_id ASC LIMIT ")
            .push_bind(to_i64(pagination.limit))
            .push(" OFFSET ")
            .push_bind(to_i64(pagination.offset()));

        let rows = qb.build_query_as::<BookRow>().fetch_all(&self.pool).await?;
        tracing::trace!("DB: find_books returned {} rows", rows.len());
        rows.into_iter().map(Book::try_from).collect()
    }

    pub async fn count_books(&self, filter: &BookFilter<'_>) -> Result<u64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM books");
        push_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    /// Up to `size` matching books in random order.
    pub async fn sample_books(&self, filter: &BookFilter<'_>, size: u64) -> Result<Vec<Book>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {BOOK_COLUMNS} FROM books"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY RANDOM() LIMIT ").push_bind(to_i64(size));

        let rows = qb.build_query_as::<BookRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(Book::try_from).collect()
    }

    /// Bookshelves followed by subjects, for every stored book.
    pub async fn book_labels(&self) -> Result<Vec<Vec<String>>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT labels FROM books")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|(raw,)| serde_json::from_str(&raw).map_err(Error::from))
            .collect()
    }

    /// Inserts a new book; `Conflict` if the id is taken.
    pub async fn insert_book(&self, book: &NewBook) -> Result<Book> {
        if self.get_book(book.gutenberg_id).await?.is_some() {
            return Err(Error::Conflict(format!(
                "Book with gutenberg_id {} already exists",
                book.gutenberg_id
            )));
        }

        let columns = BookColumns::encode(book)?;
        let now = chrono::Utc::now().timestamp();

        tracing::trace!("DB: inserting book {}", book.gutenberg_id);
        let result = sqlx::query(
            "INSERT INTO books (gutenberg_id, source, title, title_folded, bookshelves, labels, labels_folded, data, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(to_i64(book.gutenberg_id))
        .bind(book.source.as_str())
        .bind(&book.data.title)
        .bind(&columns.title_folded)
        .bind(&columns.bookshelves)
        .bind(&columns.labels)
        .bind(&columns.labels_folded)
        .bind(&columns.data)
        .bind(&columns.content)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(Error::Conflict(format!(
                    "Book with gutenberg_id {} already exists",
                    book.gutenberg_id
                )))
            }
            Err(e) => return Err(e.into()),
        }

        self.require_book(book.gutenberg_id).await
    }

    /// Inserts or overwrites by id, keeping the original creation time.
    pub async fn upsert_book(&self, book: &NewBook) -> Result<Book> {
        let columns = BookColumns::encode(book)?;
        let now = chrono::Utc::now().timestamp();

        tracing::trace!("DB: upserting book {}", book.gutenberg_id);
        sqlx::query(
            "INSERT INTO books (gutenberg_id, source, title, title_folded, bookshelves, labels, labels_folded, data, content, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(gutenberg_id) DO UPDATE SET
                source = excluded.source,
                title = excluded.title,
                title_folded = excluded.title_folded,
                bookshelves = excluded.bookshelves,
                labels = excluded.labels,
                labels_folded = excluded.labels_folded,
                data = excluded.data,
                content = excluded.content,
                updated_at = excluded.updated_at",
        )
        .bind(to_i64(book.gutenberg_id))
        .bind(book.source.as_str())
        .bind(&book.data.title)
        .bind(&columns.title_folded)
        .bind(&columns.bookshelves)
        .bind(&columns.labels)
        .bind(&columns.labels_folded)
        .bind(&columns.data)
        .bind(&columns.content)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.require_book(book.gutenberg_id).await
    }

    /// Overwrites an existing book. `None` if there is nothing to overwrite.
    pub async fn replace_book(&self, book: &NewBook) -> Result<Option<Book>> {
        let columns = BookColumns::encode(book)?;
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "UPDATE books SET source = ?, title = ?, title_folded = ?, bookshelves = ?, labels = ?, labels_folded = ?, data = ?, content = ?, updated_at = ? WHERE gutenberg_id = ?"
        )
        .bind(book.source.as_str())
        .bind(&book.data.title)
        .bind(&columns.title_folded)
        .bind(&columns.bookshelves)
        .bind(&columns.labels)
        .bind(&columns.labels_folded)
        .bind(&columns.data)
        .bind(&columns.content)
        .bind(now)
        .bind(to_i64(book.gutenberg_id))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_book(book.gutenberg_id).await
    }

    /// True if a book was removed.
    pub async fn delete_book(&self, gutenberg_id: GutenbergId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM books WHERE gutenberg_id = ?")
            .bind(to_i64(gutenberg_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn require_book(&self, gutenberg_id: GutenbergId) -> Result<Book> {
        self.get_book(gutenberg_id)
            .await?
            .ok_or_else(|| Error::Corrupt(format!("book {gutenberg_id} vanished after write")))
    }
}

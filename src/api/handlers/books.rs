use crate::api::types::{book_id, AppError, AppState};
use crate::catalog::ListQuery;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use gutenshelf_common::{Book, Page};
use serde_json::json;

pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Book>>, AppError> {
    Ok(Json(state.app.list_books(&query).await?))
}

pub async fn list_bookshelves(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let shelves = state.app.bookshelves().await?;
    Ok(Json(json!({ "data": shelves })))
}

pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    let id = book_id(&id)?;
    Ok(Json(state.app.get_book(id).await?))
}

use crate::api::types::{book_id, AdminUser, AppError, AppState};
use crate::catalog::ListQuery;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use gutenshelf_common::{Book, Page};
use serde_json::Value;

pub async fn list_books(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Book>>, AppError> {
    Ok(Json(state.app.admin_list_books(&query).await?))
}

pub async fn create_book(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let Json(payload) = payload?;
    let book = state.app.create_book(payload).await?;
    tracing::info!("Admin {} created book {}", admin.id, book.gutenberg_id);
    Ok((StatusCode::CREATED, Json(book)))
}

pub async fn update_book(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Book>, AppError> {
    let id = book_id(&id)?;
    let Json(patch) = payload?;
    Ok(Json(state.app.update_book(id, patch).await?))
}

pub async fn delete_book(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = book_id(&id)?;
    state.app.delete_book(id).await?;
    tracing::info!("Admin {} deleted book {}", admin.id, id);
    Ok(StatusCode::NO_CONTENT)
}

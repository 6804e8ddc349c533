use crate::api::types::{book_id, AppError, AppState, CurrentUser};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use gutenshelf_common::progress::ProgressUpdate;
use serde_json::{json, Value};

pub async fn list_progress(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let progress = state.app.list_progress(&user).await?;
    Ok(Json(json!({ "progress": progress })))
}

pub async fn get_progress(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = book_id(&id)?;
    let progress = state.app.get_progress(&user, id).await?;
    Ok(Json(json!({ "progress": progress })))
}

pub async fn upsert_progress(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ProgressUpdate>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let id = book_id(&id)?;
    let Json(update) = payload?;
    let progress = state.app.record_progress(&user.id, id, update).await?;
    Ok(Json(json!({ "progress": progress })))
}

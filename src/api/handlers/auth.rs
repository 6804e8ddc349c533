use crate::accounts::{Credentials, Registration};
use crate::api::types::{AppError, AppState, CurrentUser};
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use gutenshelf_common::UserProfile;
use serde_json::{json, Value};

fn profile_body(profile: UserProfile) -> Json<Value> {
    Json(json!({ "user": profile }))
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Registration>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(registration) = payload?;
    let user = state.app.register(registration).await?;
    Ok((StatusCode::CREATED, profile_body(UserProfile::from(&user))))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(credentials) = payload?;
    let user = state.app.login(credentials).await?;
    Ok(profile_body(UserProfile::from(&user)))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<Value> {
    profile_body(UserProfile::from(&user))
}

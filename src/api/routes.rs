use super::handlers::{admin, auth, books, progress};
use super::types::AppState;
use crate::App;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn create_router(app: App) -> Router {
    let state = AppState { app };
    Router::new()
        .route("/health", get(health_check))
        .route("/api/books", get(books::list_books))
        .route("/api/books/bookshelves", get(books::list_bookshelves))
        .route("/api/books/:id", get(books::get_book))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/users/me/progress", get(progress::list_progress))
        .route(
            "/api/users/me/progress/:id",
            get(progress::get_progress).put(progress::upsert_progress),
        )
        .route(
            "/api/admin/books",
            get(admin::list_books).post(admin::create_book),
        )
        .route(
            "/api/admin/books/:id",
            put(admin::update_book)
                .patch(admin::update_book)
                .delete(admin::delete_book),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

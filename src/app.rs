use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/entries/add", post(handlers::add_entry_form))
        .route("/entries/delete", post(handlers::delete_entry_form))
        .route("/history/save", post(handlers::save_result_form))
        .route("/token", post(handlers::save_token_form))
        .route("/api/today", get(handlers::get_today))
        .route("/api/entries", post(handlers::add_entry))
        .route("/api/entries/delete", post(handlers::delete_entry))
        .route("/api/reset", post(handlers::reset))
        .route("/api/history", get(handlers::get_history))
        .route("/api/history/save", post(handlers::save_result))
        .route("/api/token", post(handlers::save_token))
        .with_state(state)
}

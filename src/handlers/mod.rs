pub mod health;
pub mod patients;
pub mod session;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/patients", get(patients::list_patients))
        .route("/api/session/start", post(session::start_session))
        .route(
            "/api/session/:id",
            get(session::get_session).delete(session::delete_session),
        )
        .route("/api/session/:id/message", post(session::post_message))
        .route("/api/session/:id/restart", post(session::restart_session))
        .with_state(state)
}

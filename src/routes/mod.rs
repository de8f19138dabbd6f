use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

pub mod assistant;
pub mod public;
pub mod tags;
pub mod todos;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(public::router())
        .merge(todos::router(state.clone()))
        .merge(tags::router(state.clone()))
        .merge(assistant::router(state))
}

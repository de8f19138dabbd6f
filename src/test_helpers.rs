use axum::Router;
use sea_orm::{DatabaseBackend, MockDatabase};

use crate::{config::AppConfig, routes::router, state::AppState};

/// Router over a mock connection, for exercising request paths that fail
/// validation before ever touching the database.
pub fn test_router() -> Router {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let cfg = AppConfig::from_env().expect("load app config");
    let state = AppState::new(cfg, db);
    router(state)
}

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub cfg: AppConfig,
    pub db: DatabaseConnection,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(cfg: AppConfig, db: DatabaseConnection) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            db,
            http: reqwest::Client::new(),
        })
    }
}

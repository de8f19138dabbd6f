use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{Router, http::HeaderValue};
use sea_orm::{ConnectOptions, Database};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use todo_server::{config::AppConfig, logging::init_tracing, routes::router, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!("server failed: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env().context("failed to load config")?;
    init_tracing(&cfg.log_level);

    let mut opt = ConnectOptions::new(cfg.database_url.clone());
    opt.max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_idle)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    tracing::info!("syncing database schema from entities");
    db.get_schema_registry("todo_server::db::entities::*")
        .sync(&db)
        .await?;

    let cors = cors_layer(&cfg.cors_allow_origin)?;
    let state = AppState::new(cfg, db);

    let app = Router::new()
        .merge(router(Arc::clone(&state)))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", state.cfg.host, state.cfg.port)
        .parse()
        .context("invalid host/port")?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    Ok(if origin == "*" {
        layer.allow_origin(Any)
    } else {
        let origin = origin
            .parse::<HeaderValue>()
            .context("CORS_ALLOW_ORIGIN must be a valid origin")?;
        layer.allow_origin(origin)
    })
}

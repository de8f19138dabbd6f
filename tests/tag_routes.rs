use std::{sync::Arc, time::Duration};

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use sea_orm::{ConnectOptions, Database};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use todo_server::{config::AppConfig, routes::router, state::AppState};

async fn app_state() -> Arc<AppState> {
    let cfg = AppConfig::from_env().expect("load app config");
    let mut opt = ConnectOptions::new(cfg.database_url.clone());
    opt.max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_idle)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    let db = Database::connect(opt).await.expect("connect to database");
    db.get_schema_registry("todo_server::db::entities::*")
        .sync(&db)
        .await
        .expect("sync schema");

    AppState::new(cfg, db)
}

async fn send(state: &Arc<AppState>, request: Request<Body>) -> axum::response::Response {
    router(state.clone()).oneshot(request).await.unwrap()
}

async fn json_response(
    state: &Arc<AppState>,
    request: Request<Body>,
) -> (StatusCode, serde_json::Value) {
    let response = send(state, request).await;
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn patch_json(uri: &str, payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
#[ignore = "requires Postgres database"]
async fn tag_crud_flow() {
    let state = app_state().await;
    let name = format!("work-{}", Uuid::new_v4());

    let (status, tag) = json_response(&state, post_json("/tags", json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tag["name"].as_str().unwrap(), name);
    assert_eq!(tag["color"].as_str(), Some("#3B82F6"));
    let id = Uuid::parse_str(tag["id"].as_str().unwrap()).unwrap();

    let (status, tags) = json_response(&state, get("/tags")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(tags
        .as_array()
        .unwrap()
        .iter()
        .any(|entry| entry["id"].as_str() == Some(id.to_string().as_str())));

    let renamed = format!("home-{}", Uuid::new_v4());
    let (status, updated) = json_response(
        &state,
        patch_json(
            &format!("/tags/{id}"),
            json!({ "name": renamed, "color": "#EF4444" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"].as_str().unwrap(), renamed);
    assert_eq!(updated["color"].as_str(), Some("#EF4444"));

    let (status, fetched) = json_response(&state, get(&format!("/tags/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"].as_str().unwrap(), renamed);

    let (status, body) = json_response(&state, delete(&format!("/tags/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"].as_str(), Some("Tag deleted successfully"));

    let response = send(&state, get(&format!("/tags/{id}"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires Postgres database"]
async fn tag_names_are_unique() {
    let state = app_state().await;
    let name = format!("dup-{}", Uuid::new_v4());

    let (status, _) = json_response(&state, post_json("/tags", json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = json_response(&state, post_json("/tags", json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already exists"));

    let other = format!("other-{}", Uuid::new_v4());
    let (status, tag) = json_response(&state, post_json("/tags", json!({ "name": other }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let other_id = tag["id"].as_str().unwrap();

    let (status, _) = json_response(
        &state,
        patch_json(&format!("/tags/{other_id}"), json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Renaming a tag to its own name is not a conflict.
    let (status, _) = json_response(
        &state,
        patch_json(&format!("/tags/{other_id}"), json!({ "name": other })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires Postgres database"]
async fn deleting_either_side_only_removes_the_join() {
    let state = app_state().await;
    let marker = Uuid::new_v4();

    let (_, tag) = json_response(
        &state,
        post_json("/tags", json!({ "name": format!("tag-{marker}") })),
    )
    .await;
    let tag_id = Uuid::parse_str(tag["id"].as_str().unwrap()).unwrap();

    let (status, todo) = json_response(
        &state,
        post_json(
            "/todos",
            json!({
                "title": format!("alpha {marker}"),
                "priority": "medium",
                "tags": [tag_id]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let todo_id = Uuid::parse_str(todo["id"].as_str().unwrap()).unwrap();

    // Deleting the tag detaches it but keeps the todo.
    let (status, _) = json_response(&state, delete(&format!("/tags/{tag_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, todo) = json_response(&state, get(&format!("/todos/{todo_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(todo["tags"].as_array().unwrap().is_empty());

    // And the other way around: deleting a todo keeps its tags.
    let (_, tag) = json_response(
        &state,
        post_json("/tags", json!({ "name": format!("tag2-{marker}") })),
    )
    .await;
    let tag_id = Uuid::parse_str(tag["id"].as_str().unwrap()).unwrap();
    let (_, todo) = json_response(
        &state,
        post_json(
            "/todos",
            json!({
                "title": format!("bravo {marker}"),
                "priority": "medium",
                "tags": [tag_id]
            }),
        ),
    )
    .await;
    let todo_id = todo["id"].as_str().unwrap();

    let (status, _) = json_response(&state, delete(&format!("/todos/{todo_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = json_response(&state, get(&format!("/tags/{tag_id}"))).await;
    assert_eq!(status, StatusCode::OK);
}

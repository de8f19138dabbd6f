use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use sea_orm::prelude::{Date, DateTimeWithTimeZone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{
        entities::{Priority, Status},
        todo_repo::{
            self, DEFAULT_PER_PAGE, MAX_PER_PAGE, NewTodo, Sort, TodoFilter, TodoPage, TodoPatch,
            TodoWithTags,
        },
    },
    error::AppError,
    routes::tags::TagResponse,
    state::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Date>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Uuid>,
}

/// Partial update. Absent fields are left unchanged; a supplied `tags`
/// array replaces the todo's tag set wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTodoRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Date>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub due_date: Option<Date>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub tags: Vec<TagResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: u64,
    pub last_page: u64,
    pub per_page: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoPageResponse {
    pub data: Vec<TodoResponse>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListTodosQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkStatusRequest {
    pub ids: Vec<Uuid>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkPriorityRequest {
    pub ids: Vec<Uuid>,
    pub priority: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDeleteResponse {
    pub message: String,
    pub deleted_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkUpdateResponse {
    pub message: String,
    pub updated_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/todos", post(create_todo).get(list_todos))
        .route("/todos/bulk-delete", post(bulk_delete))
        .route("/todos/bulk-update-status", post(bulk_update_status))
        .route("/todos/bulk-update-priority", post(bulk_update_priority))
        .route(
            "/todos/{id}",
            get(get_todo).patch(update_todo).delete(delete_todo),
        )
        .with_state(state)
}

async fn list_todos(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTodosQuery>,
) -> Result<Json<TodoPageResponse>, AppError> {
    let filter = parse_filter(query)?;
    let page = todo_repo::list(&state.db, &filter).await?;
    Ok(Json(page.into()))
}

async fn get_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TodoResponse>, AppError> {
    let todo = todo_repo::find(&state.db, id).await?;
    Ok(Json(todo.into()))
}

async fn create_todo(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTodoRequest>,
) -> Result<(StatusCode, Json<TodoResponse>), AppError> {
    let input = NewTodo {
        title: validate_title(&body.title)?,
        description: body.description,
        priority: parse_priority(&body.priority)?,
        due_date: body.due_date,
        tag_ids: body.tags,
    };
    let created = todo_repo::create(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn update_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTodoRequest>,
) -> Result<Json<TodoResponse>, AppError> {
    let patch = TodoPatch {
        title: body.title.as_deref().map(validate_title).transpose()?,
        description: body.description,
        status: body.status.as_deref().map(parse_status).transpose()?,
        priority: body.priority.as_deref().map(parse_priority).transpose()?,
        due_date: body.due_date,
        tags: body.tags,
    };
    let updated = todo_repo::update(&state.db, id, patch).await?;
    Ok(Json(updated.into()))
}

async fn delete_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    todo_repo::delete(&state.db, id).await?;
    Ok(Json(MessageResponse {
        message: "Todo deleted successfully".to_string(),
    }))
}

async fn bulk_delete(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, AppError> {
    require_ids(&body.ids)?;
    let deleted = todo_repo::bulk_delete(&state.db, &body.ids).await?;
    Ok(Json(BulkDeleteResponse {
        message: format!("{deleted} todo(s) deleted successfully"),
        deleted_count: deleted,
    }))
}

async fn bulk_update_status(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkStatusRequest>,
) -> Result<Json<BulkUpdateResponse>, AppError> {
    require_ids(&body.ids)?;
    let status = parse_status(&body.status)?;
    let updated = todo_repo::bulk_update_status(&state.db, &body.ids, status).await?;
    Ok(Json(BulkUpdateResponse {
        message: format!("{updated} todo(s) status updated to {}", status.as_str()),
        updated_count: updated,
    }))
}

async fn bulk_update_priority(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkPriorityRequest>,
) -> Result<Json<BulkUpdateResponse>, AppError> {
    require_ids(&body.ids)?;
    let priority = parse_priority(&body.priority)?;
    let updated = todo_repo::bulk_update_priority(&state.db, &body.ids, priority).await?;
    Ok(Json(BulkUpdateResponse {
        message: format!("{updated} todo(s) priority updated to {}", priority.as_str()),
        updated_count: updated,
    }))
}

fn parse_filter(query: ListTodosQuery) -> Result<TodoFilter, AppError> {
    let mut filter = TodoFilter::default();
    if let Some(raw) = query.status.as_deref() {
        filter.statuses = parse_csv(raw, parse_status)?;
    }
    if let Some(raw) = query.priority.as_deref() {
        filter.priorities = parse_csv(raw, parse_priority)?;
    }
    filter.search = query.search;
    if let Some(raw) = query.sort.as_deref() {
        filter.sort = Sort::parse(raw);
    }
    if let Some(raw) = query.tags.as_deref() {
        filter.tag_ids = parse_csv(raw, |v| {
            Uuid::parse_str(v).map_err(|_| AppError::validation(format!("Invalid tag id: {v}")))
        })?;
    }
    filter.page = query.page.unwrap_or(1).max(1);
    filter.per_page = query.limit.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    Ok(filter)
}

fn parse_csv<T>(
    raw: &str,
    parse: impl Fn(&str) -> Result<T, AppError>,
) -> Result<Vec<T>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(parse)
        .collect()
}

fn parse_status(raw: &str) -> Result<Status, AppError> {
    Status::try_from(raw)
        .map_err(|_| AppError::validation(format!("Invalid status value: {raw}")))
}

fn parse_priority(raw: &str) -> Result<Priority, AppError> {
    Priority::try_from(raw)
        .map_err(|_| AppError::validation(format!("Invalid priority value: {raw}")))
}

fn validate_title(title: &str) -> Result<String, AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    if trimmed.chars().count() > 255 {
        return Err(AppError::validation("Title must be at most 255 characters"));
    }
    Ok(trimmed.to_string())
}

fn require_ids(ids: &[Uuid]) -> Result<(), AppError> {
    if ids.is_empty() {
        return Err(AppError::validation("At least one id is required"));
    }
    Ok(())
}

impl From<TodoWithTags> for TodoResponse {
    fn from(hydrated: TodoWithTags) -> Self {
        let TodoWithTags { todo, tags } = hydrated;
        Self {
            id: todo.id,
            title: todo.title,
            description: todo.description,
            status: todo.status,
            priority: todo.priority,
            due_date: todo.due_date,
            created_at: todo.created_at,
            updated_at: todo.updated_at,
            tags: tags.into_iter().map(TagResponse::from).collect(),
        }
    }
}

impl From<TodoPage> for TodoPageResponse {
    fn from(page: TodoPage) -> Self {
        Self {
            data: page.items.into_iter().map(TodoResponse::from).collect(),
            meta: PageMeta {
                current_page: page.current_page,
                last_page: page.last_page,
                per_page: page.per_page,
                total: page.total,
            },
        }
    }
}

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{entities::tag, tag_repo},
    error::AppError,
    routes::todos::MessageResponse,
    state::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTagRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagResponse {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tags", get(list_tags).post(create_tag))
        .route(
            "/tags/{id}",
            get(get_tag).patch(update_tag).delete(delete_tag),
        )
        .with_state(state)
}

async fn list_tags(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TagResponse>>, AppError> {
    let tags = tag_repo::list(&state.db).await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

async fn get_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TagResponse>, AppError> {
    let tag = tag_repo::find(&state.db, id).await?;
    Ok(Json(tag.into()))
}

async fn create_tag(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<TagResponse>), AppError> {
    let name = validate_name(&body.name)?;
    let color = body.color.as_deref().map(validate_color).transpose()?;
    let tag = tag_repo::create(&state.db, &name, color).await?;
    Ok((StatusCode::CREATED, Json(tag.into())))
}

async fn update_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTagRequest>,
) -> Result<Json<TagResponse>, AppError> {
    let name = body.name.as_deref().map(validate_name).transpose()?;
    let color = body.color.as_deref().map(validate_color).transpose()?;
    let tag = tag_repo::update(&state.db, id, name, color).await?;
    Ok(Json(tag.into()))
}

async fn delete_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    tag_repo::delete(&state.db, id).await?;
    Ok(Json(MessageResponse {
        message: "Tag deleted successfully".to_string(),
    }))
}

fn validate_name(name: &str) -> Result<String, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("Tag name is required"));
    }
    if trimmed.chars().count() > 255 {
        return Err(AppError::validation(
            "Tag name must be at most 255 characters",
        ));
    }
    Ok(trimmed.to_string())
}

// Hex color codes, `#RRGGBB` at the longest.
fn validate_color(color: &str) -> Result<String, AppError> {
    let trimmed = color.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 7 {
        return Err(AppError::validation("Color must be a hex color code"));
    }
    Ok(trimmed.to_string())
}

impl From<tag::Model> for TagResponse {
    fn from(model: tag::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            color: model.color,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation_enforces_bounds() {
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"n".repeat(256)).is_err());
        assert_eq!(validate_name(" work ").unwrap(), "work");
    }

    #[test]
    fn color_validation_enforces_length() {
        assert!(validate_color("#3B82F6").is_ok());
        assert!(validate_color("#3B82F6FF").is_err());
        assert!(validate_color("").is_err());
    }
}

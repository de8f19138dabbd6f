use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::prelude::Tag;
use super::entities::tag;
use crate::error::AppError;

pub const DEFAULT_COLOR: &str = "#3B82F6";

pub async fn list(db: &DatabaseConnection) -> Result<Vec<tag::Model>, AppError> {
    Ok(Tag::find()
        .order_by_asc(tag::Column::Name)
        .all(db)
        .await?)
}

pub async fn find(db: &DatabaseConnection, id: Uuid) -> Result<tag::Model, AppError> {
    Tag::find_by_id(id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Tag not found"))
}

pub async fn create(
    db: &DatabaseConnection,
    name: &str,
    color: Option<String>,
) -> Result<tag::Model, AppError> {
    require_name_free(db, name, None).await?;
    let model = tag::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        color: Set(color.unwrap_or_else(|| DEFAULT_COLOR.to_string())),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

pub async fn update(
    db: &DatabaseConnection,
    id: Uuid,
    name: Option<String>,
    color: Option<String>,
) -> Result<tag::Model, AppError> {
    let existing = find(db, id).await?;
    if let Some(name) = name.as_deref() {
        if name != existing.name {
            require_name_free(db, name, Some(id)).await?;
        }
    }
    let mut active: tag::ActiveModel = existing.into();
    if let Some(name) = name {
        active.name = Set(name);
    }
    if let Some(color) = color {
        active.color = Set(color);
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    Ok(active.update(db).await?)
}

/// Removes the tag and, through the join-table cascade, its associations.
/// The todos carrying the tag are untouched.
pub async fn delete(db: &DatabaseConnection, id: Uuid) -> Result<(), AppError> {
    let result = Tag::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Tag not found"));
    }
    Ok(())
}

/// Tag names are globally unique, case-sensitive, enforced at write time.
async fn require_name_free(
    db: &DatabaseConnection,
    name: &str,
    exclude: Option<Uuid>,
) -> Result<(), AppError> {
    let mut query = Tag::find().filter(tag::Column::Name.eq(name));
    if let Some(id) = exclude {
        query = query.filter(tag::Column::Id.ne(id));
    }
    let taken = query.count(db).await?;
    if taken > 0 {
        return Err(AppError::Conflict("Tag name already exists".to_string()));
    }
    Ok(())
}

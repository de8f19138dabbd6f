use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::sea_query::{Expr, extension::postgres::PgExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    Order, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
    prelude::Date,
};
use uuid::Uuid;

use super::entities::prelude::{Tag, Todo, TodoTag};
use super::entities::{Priority, Status, tag, todo, todo_tag};
use crate::error::AppError;

pub const DEFAULT_PER_PAGE: u64 = 12;
pub const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Title,
    CreatedAt,
    DueDate,
}

impl SortField {
    fn parse(value: &str) -> Option<Self> {
        // The original web client sent camelCase field names, so both
        // spellings are accepted.
        match value {
            "title" => Some(SortField::Title),
            "created_at" | "createdAt" => Some(SortField::CreatedAt),
            "due_date" | "dueDate" => Some(SortField::DueDate),
            _ => None,
        }
    }

    fn column(self) -> todo::Column {
        match self {
            SortField::Title => todo::Column::Title,
            SortField::CreatedAt => todo::Column::CreatedAt,
            SortField::DueDate => todo::Column::DueDate,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::CreatedAt => "created_at",
            SortField::DueDate => "due_date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub dir: SortDir,
}

impl Default for Sort {
    fn default() -> Self {
        Sort {
            field: SortField::CreatedAt,
            dir: SortDir::Desc,
        }
    }
}

impl Sort {
    /// Lenient parse of a `field:direction` pair. An unrecognized field
    /// falls back to the default sort; a missing or unrecognized direction
    /// falls back to ascending.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.splitn(2, ':');
        let field = parts.next().unwrap_or("").trim();
        let dir = parts.next().unwrap_or("asc").trim();
        let Some(field) = SortField::parse(field) else {
            return Sort::default();
        };
        let dir = if dir.eq_ignore_ascii_case("desc") {
            SortDir::Desc
        } else {
            SortDir::Asc
        };
        Sort { field, dir }
    }
}

/// Filter input for the todo list. Dimensions combine with AND; multiple
/// values within a dimension combine with OR.
#[derive(Debug, Clone)]
pub struct TodoFilter {
    pub statuses: Vec<Status>,
    pub priorities: Vec<Priority>,
    pub search: Option<String>,
    pub tag_ids: Vec<Uuid>,
    pub sort: Sort,
    pub page: u64,
    pub per_page: u64,
}

impl Default for TodoFilter {
    fn default() -> Self {
        TodoFilter {
            statuses: Vec::new(),
            priorities: Vec::new(),
            search: None,
            tag_ids: Vec::new(),
            sort: Sort::default(),
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TodoWithTags {
    pub todo: todo::Model,
    pub tags: Vec<tag::Model>,
}

#[derive(Debug, Clone)]
pub struct TodoPage {
    pub items: Vec<TodoWithTags>,
    pub current_page: u64,
    pub last_page: u64,
    pub per_page: u64,
    pub total: u64,
}

impl TodoPage {
    fn empty(page: u64, per_page: u64) -> Self {
        TodoPage {
            items: Vec::new(),
            current_page: page,
            // Empty results report a single page so pagination controls
            // can stay hidden when last_page <= 1.
            last_page: 1,
            per_page,
            total: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<Date>,
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub due_date: Option<Date>,
    pub tags: Option<Vec<Uuid>>,
}

pub async fn list(db: &DatabaseConnection, filter: &TodoFilter) -> Result<TodoPage, AppError> {
    let page = filter.page.max(1);
    let per_page = filter.per_page.clamp(1, MAX_PER_PAGE);

    let mut query = Todo::find();

    if !filter.statuses.is_empty() {
        query = query.filter(
            todo::Column::Status.is_in(filter.statuses.iter().map(Status::as_str)),
        );
    }
    if !filter.priorities.is_empty() {
        query = query.filter(
            todo::Column::Priority.is_in(filter.priorities.iter().map(Priority::as_str)),
        );
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        query = query.filter(
            Condition::any()
                .add(Expr::col(todo::Column::Title).ilike(pattern.clone()))
                .add(Expr::col(todo::Column::Description).ilike(pattern)),
        );
    }
    if !filter.tag_ids.is_empty() {
        let tagged: HashSet<Uuid> = TodoTag::find()
            .filter(todo_tag::Column::TagId.is_in(filter.tag_ids.iter().copied()))
            .all(db)
            .await?
            .into_iter()
            .map(|link| link.todo_id)
            .collect();
        if tagged.is_empty() {
            return Ok(TodoPage::empty(page, per_page));
        }
        query = query.filter(todo::Column::Id.is_in(tagged));
    }

    let order = match filter.sort.dir {
        SortDir::Asc => Order::Asc,
        SortDir::Desc => Order::Desc,
    };
    // Id as tiebreaker keeps pagination stable when sort keys collide.
    let query = query
        .order_by(filter.sort.field.column(), order)
        .order_by(todo::Column::Id, Order::Asc);

    let paginator = query.paginate(db, per_page);
    let totals = paginator.num_items_and_pages().await?;
    let models = paginator.fetch_page(page.saturating_sub(1)).await?;
    let items = attach_tags(db, models).await?;

    Ok(TodoPage {
        items,
        current_page: page,
        last_page: totals.number_of_pages.max(1),
        per_page,
        total: totals.number_of_items,
    })
}

pub async fn find(db: &DatabaseConnection, id: Uuid) -> Result<TodoWithTags, AppError> {
    let Some(model) = Todo::find_by_id(id).one(db).await? else {
        return Err(AppError::NotFound("Todo not found"));
    };
    hydrate_one(db, model).await
}

/// Unfiltered, unpaginated listing used as the assistant's context.
pub async fn snapshot(db: &DatabaseConnection) -> Result<Vec<TodoWithTags>, AppError> {
    let models = Todo::find()
        .order_by(todo::Column::CreatedAt, Order::Desc)
        .all(db)
        .await?;
    attach_tags(db, models).await
}

pub async fn create(db: &DatabaseConnection, input: NewTodo) -> Result<TodoWithTags, AppError> {
    let NewTodo {
        title,
        description,
        priority,
        due_date,
        tag_ids,
    } = input;
    let tag_ids = dedupe(tag_ids);

    let created = db
        .transaction::<_, todo::Model, AppError>(|txn| {
            Box::pin(async move {
                require_tags_exist(txn, &tag_ids).await?;
                let model = todo::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    title: Set(title),
                    description: Set(description),
                    status: Set(Status::Todo.as_str().to_string()),
                    priority: Set(priority.as_str().to_string()),
                    due_date: Set(due_date),
                    ..Default::default()
                };
                let created = model.insert(txn).await?;
                link_tags(txn, created.id, &tag_ids).await?;
                Ok(created)
            })
        })
        .await?;

    hydrate_one(db, created).await
}

pub async fn update(
    db: &DatabaseConnection,
    id: Uuid,
    patch: TodoPatch,
) -> Result<TodoWithTags, AppError> {
    let updated = db
        .transaction::<_, todo::Model, AppError>(|txn| {
            Box::pin(async move {
                let Some(existing) = Todo::find_by_id(id).one(txn).await? else {
                    return Err(AppError::NotFound("Todo not found"));
                };
                let mut active: todo::ActiveModel = existing.into();
                if let Some(title) = patch.title {
                    active.title = Set(title);
                }
                if let Some(description) = patch.description {
                    active.description = Set(Some(description));
                }
                if let Some(status) = patch.status {
                    active.status = Set(status.as_str().to_string());
                }
                if let Some(priority) = patch.priority {
                    active.priority = Set(priority.as_str().to_string());
                }
                if let Some(due_date) = patch.due_date {
                    active.due_date = Set(Some(due_date));
                }
                active.updated_at = Set(Utc::now().fixed_offset());
                let updated = active.update(txn).await?;

                // A supplied tag set replaces the existing one wholesale.
                if let Some(tag_ids) = patch.tags {
                    let tag_ids = dedupe(tag_ids);
                    require_tags_exist(txn, &tag_ids).await?;
                    TodoTag::delete_many()
                        .filter(todo_tag::Column::TodoId.eq(id))
                        .exec(txn)
                        .await?;
                    link_tags(txn, id, &tag_ids).await?;
                }
                Ok(updated)
            })
        })
        .await?;

    hydrate_one(db, updated).await
}

pub async fn delete(db: &DatabaseConnection, id: Uuid) -> Result<(), AppError> {
    let result = Todo::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Todo not found"));
    }
    Ok(())
}

/// Deletes every todo in `ids` that exists; missing ids are silently
/// ignored. Returns the number of rows actually deleted.
pub async fn bulk_delete(db: &DatabaseConnection, ids: &[Uuid]) -> Result<u64, AppError> {
    let result = Todo::delete_many()
        .filter(todo::Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn bulk_update_status(
    db: &DatabaseConnection,
    ids: &[Uuid],
    status: Status,
) -> Result<u64, AppError> {
    let result = Todo::update_many()
        .col_expr(todo::Column::Status, Expr::value(status.as_str()))
        .col_expr(todo::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(todo::Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn bulk_update_priority(
    db: &DatabaseConnection,
    ids: &[Uuid],
    priority: Priority,
) -> Result<u64, AppError> {
    let result = Todo::update_many()
        .col_expr(todo::Column::Priority, Expr::value(priority.as_str()))
        .col_expr(todo::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(todo::Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

async fn hydrate_one<C: ConnectionTrait>(
    conn: &C,
    model: todo::Model,
) -> Result<TodoWithTags, AppError> {
    let mut hydrated = attach_tags(conn, vec![model]).await?;
    hydrated
        .pop()
        .ok_or_else(|| AppError::Internal("hydration dropped a todo".to_string()))
}

async fn attach_tags<C: ConnectionTrait>(
    conn: &C,
    todos: Vec<todo::Model>,
) -> Result<Vec<TodoWithTags>, AppError> {
    if todos.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = todos.iter().map(|t| t.id).collect();
    let links = TodoTag::find()
        .filter(todo_tag::Column::TodoId.is_in(ids))
        .all(conn)
        .await?;

    let tag_ids: HashSet<Uuid> = links.iter().map(|link| link.tag_id).collect();
    let tags = if tag_ids.is_empty() {
        Vec::new()
    } else {
        Tag::find()
            .filter(tag::Column::Id.is_in(tag_ids))
            .all(conn)
            .await?
    };
    let tags_by_id: HashMap<Uuid, tag::Model> =
        tags.into_iter().map(|tag| (tag.id, tag)).collect();

    let mut tags_by_todo: HashMap<Uuid, Vec<tag::Model>> = HashMap::new();
    for link in links {
        if let Some(tag) = tags_by_id.get(&link.tag_id) {
            tags_by_todo.entry(link.todo_id).or_default().push(tag.clone());
        }
    }

    Ok(todos
        .into_iter()
        .map(|todo| {
            let tags = tags_by_todo.remove(&todo.id).unwrap_or_default();
            TodoWithTags { todo, tags }
        })
        .collect())
}

async fn require_tags_exist<C: ConnectionTrait>(
    conn: &C,
    tag_ids: &[Uuid],
) -> Result<(), AppError> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    let found = Tag::find()
        .filter(tag::Column::Id.is_in(tag_ids.iter().copied()))
        .count(conn)
        .await?;
    if found != tag_ids.len() as u64 {
        return Err(AppError::validation("One or more tag ids do not exist"));
    }
    Ok(())
}

async fn link_tags<C: ConnectionTrait>(
    conn: &C,
    todo_id: Uuid,
    tag_ids: &[Uuid],
) -> Result<(), AppError> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    let rows: Vec<todo_tag::ActiveModel> = tag_ids
        .iter()
        .map(|tag_id| todo_tag::ActiveModel {
            id: Set(Uuid::new_v4()),
            todo_id: Set(todo_id),
            tag_id: Set(*tag_id),
            ..Default::default()
        })
        .collect();
    TodoTag::insert_many(rows).exec(conn).await?;
    Ok(())
}

fn dedupe(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

//! Client-side bridge to the todo server: a thin HTTP wrapper and a view
//! state container implementing the fetch-on-mount / refetch-after-mutation
//! strategy.

pub mod api;
pub mod store;

pub use api::ApiClient;
pub use store::{TodoStore, ViewState};

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::entities::{Priority, Status};
use crate::db::todo_repo::TodoFilter;
use crate::routes::todos::{
    CreateTodoRequest, TodoPageResponse, TodoResponse, UpdateTodoRequest,
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The server rejected the request; `message` is display-ready.
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

/// Transport seam between [`store::TodoStore`] and the server. Implemented
/// by [`api::ApiClient`] over HTTP and by in-memory fakes in tests.
#[async_trait]
pub trait TodoBackend: Send + Sync + 'static {
    async fn list_todos(&self, filter: &TodoFilter) -> Result<TodoPageResponse, ClientError>;
    async fn create_todo(&self, request: CreateTodoRequest) -> Result<TodoResponse, ClientError>;
    async fn update_todo(
        &self,
        id: Uuid,
        request: UpdateTodoRequest,
    ) -> Result<TodoResponse, ClientError>;
    async fn delete_todo(&self, id: Uuid) -> Result<(), ClientError>;
    async fn bulk_delete(&self, ids: Vec<Uuid>) -> Result<u64, ClientError>;
    async fn bulk_update_status(&self, ids: Vec<Uuid>, status: Status)
    -> Result<u64, ClientError>;
    async fn bulk_update_priority(
        &self,
        ids: Vec<Uuid>,
        priority: Priority,
    ) -> Result<u64, ClientError>;
}

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::watch;
use uuid::Uuid;

use super::{ClientError, TodoBackend};
use crate::db::entities::{Priority, Status};
use crate::db::todo_repo::TodoFilter;
use crate::routes::todos::{CreateTodoRequest, PageMeta, TodoResponse, UpdateTodoRequest};

/// Snapshot of the list view as the UI sees it. The UI never observes a
/// torn state: every transition is published as one whole snapshot.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub todos: Vec<TodoResponse>,
    pub meta: Option<PageMeta>,
    pub loading: bool,
    pub error: Option<String>,
}

/// State container for one filter context. Mutations refetch the list with
/// the unchanged filter on success; overlapping fetches resolve
/// last-request-wins, so a stale response is discarded rather than applied
/// out of order.
pub struct TodoStore<B> {
    backend: Arc<B>,
    state: watch::Sender<ViewState>,
    filter: Mutex<TodoFilter>,
    generation: AtomicU64,
}

impl<B: TodoBackend> TodoStore<B> {
    pub fn new(backend: B) -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            backend: Arc::new(backend),
            state,
            filter: Mutex::new(TodoFilter::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn filter(&self) -> TodoFilter {
        self.filter.lock().unwrap().clone()
    }

    pub async fn set_filter(&self, filter: TodoFilter) {
        *self.filter.lock().unwrap() = filter;
        self.refetch().await;
    }

    /// Re-runs the query with the current filter. Only the most recently
    /// started fetch may publish its result.
    pub async fn refetch(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let filter = self.filter.lock().unwrap().clone();
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = self.backend.list_todos(&filter).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            // Superseded while in flight; a newer fetch owns the state now.
            return;
        }
        self.state.send_modify(|state| {
            state.loading = false;
            match result {
                Ok(page) => {
                    state.todos = page.data;
                    state.meta = Some(page.meta);
                    state.error = None;
                }
                Err(err) => {
                    // Keep whatever was last loaded; only record the failure.
                    state.error = Some(err.to_string());
                }
            }
        });
    }

    pub async fn create(&self, request: CreateTodoRequest) -> Result<TodoResponse, ClientError> {
        let result = self.backend.create_todo(request).await;
        self.after_mutation(result).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateTodoRequest,
    ) -> Result<TodoResponse, ClientError> {
        let result = self.backend.update_todo(id, request).await;
        self.after_mutation(result).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ClientError> {
        let result = self.backend.delete_todo(id).await;
        self.after_mutation(result).await
    }

    pub async fn bulk_delete(&self, ids: Vec<Uuid>) -> Result<u64, ClientError> {
        let result = self.backend.bulk_delete(ids).await;
        self.after_mutation(result).await
    }

    pub async fn bulk_update_status(
        &self,
        ids: Vec<Uuid>,
        status: Status,
    ) -> Result<u64, ClientError> {
        let result = self.backend.bulk_update_status(ids, status).await;
        self.after_mutation(result).await
    }

    pub async fn bulk_update_priority(
        &self,
        ids: Vec<Uuid>,
        priority: Priority,
    ) -> Result<u64, ClientError> {
        let result = self.backend.bulk_update_priority(ids, priority).await;
        self.after_mutation(result).await
    }

    /// On success the list is refetched with the unchanged filter; on
    /// failure the failure is recorded for display and handed back to the
    /// caller, leaving the loaded list as it was.
    async fn after_mutation<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        match result {
            Ok(value) => {
                self.refetch().await;
                Ok(value)
            }
            Err(err) => {
                self.state
                    .send_modify(|state| state.error = Some(err.to_string()));
                Err(err)
            }
        }
    }
}

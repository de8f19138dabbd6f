use async_trait::async_trait;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{ClientError, TodoBackend};
use crate::db::entities::{Priority, Status};
use crate::db::todo_repo::TodoFilter;
use crate::error::ErrorBody;
use crate::routes::tags::{CreateTagRequest, TagResponse, UpdateTagRequest};
use crate::routes::todos::{
    BulkDeleteRequest, BulkDeleteResponse, BulkPriorityRequest, BulkStatusRequest,
    BulkUpdateResponse, CreateTodoRequest, MessageResponse, TodoPageResponse, TodoResponse,
    UpdateTodoRequest,
};

/// HTTP client for the todo server's REST surface.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn get_todo(&self, id: Uuid) -> Result<TodoResponse, ClientError> {
        let response = self.http.get(self.url(&format!("/todos/{id}"))).send().await?;
        Self::decode(response).await
    }

    pub async fn list_tags(&self) -> Result<Vec<TagResponse>, ClientError> {
        let response = self.http.get(self.url("/tags")).send().await?;
        Self::decode(response).await
    }

    pub async fn create_tag(&self, request: CreateTagRequest) -> Result<TagResponse, ClientError> {
        let response = self
            .http
            .post(self.url("/tags"))
            .json(&request)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn update_tag(
        &self,
        id: Uuid,
        request: UpdateTagRequest,
    ) -> Result<TagResponse, ClientError> {
        let response = self
            .http
            .patch(self.url(&format!("/tags/{id}")))
            .json(&request)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn delete_tag(&self, id: Uuid) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/tags/{id}")))
            .send()
            .await?;
        Self::decode::<MessageResponse>(response).await?;
        Ok(())
    }
}

fn query_pairs(filter: &TodoFilter) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if !filter.statuses.is_empty() {
        pairs.push((
            "status",
            filter
                .statuses
                .iter()
                .map(Status::as_str)
                .collect::<Vec<_>>()
                .join(","),
        ));
    }
    if !filter.priorities.is_empty() {
        pairs.push((
            "priority",
            filter
                .priorities
                .iter()
                .map(Priority::as_str)
                .collect::<Vec<_>>()
                .join(","),
        ));
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        pairs.push(("search", search.to_string()));
    }
    pairs.push((
        "sort",
        format!("{}:{}", filter.sort.field.as_str(), filter.sort.dir.as_str()),
    ));
    if !filter.tag_ids.is_empty() {
        pairs.push((
            "tags",
            filter
                .tag_ids
                .iter()
                .map(Uuid::to_string)
                .collect::<Vec<_>>()
                .join(","),
        ));
    }
    pairs.push(("page", filter.page.to_string()));
    pairs.push(("limit", filter.per_page.to_string()));
    pairs
}

#[async_trait]
impl TodoBackend for ApiClient {
    async fn list_todos(&self, filter: &TodoFilter) -> Result<TodoPageResponse, ClientError> {
        let response = self
            .http
            .get(self.url("/todos"))
            .query(&query_pairs(filter))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn create_todo(&self, request: CreateTodoRequest) -> Result<TodoResponse, ClientError> {
        let response = self
            .http
            .post(self.url("/todos"))
            .json(&request)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn update_todo(
        &self,
        id: Uuid,
        request: UpdateTodoRequest,
    ) -> Result<TodoResponse, ClientError> {
        let response = self
            .http
            .patch(self.url(&format!("/todos/{id}")))
            .json(&request)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn delete_todo(&self, id: Uuid) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/todos/{id}")))
            .send()
            .await?;
        Self::decode::<MessageResponse>(response).await?;
        Ok(())
    }

    async fn bulk_delete(&self, ids: Vec<Uuid>) -> Result<u64, ClientError> {
        let response = self
            .http
            .post(self.url("/todos/bulk-delete"))
            .json(&BulkDeleteRequest { ids })
            .send()
            .await?;
        let body: BulkDeleteResponse = Self::decode(response).await?;
        Ok(body.deleted_count)
    }

    async fn bulk_update_status(
        &self,
        ids: Vec<Uuid>,
        status: Status,
    ) -> Result<u64, ClientError> {
        let response = self
            .http
            .post(self.url("/todos/bulk-update-status"))
            .json(&BulkStatusRequest {
                ids,
                status: status.as_str().to_string(),
            })
            .send()
            .await?;
        let body: BulkUpdateResponse = Self::decode(response).await?;
        Ok(body.updated_count)
    }

    async fn bulk_update_priority(
        &self,
        ids: Vec<Uuid>,
        priority: Priority,
    ) -> Result<u64, ClientError> {
        let response = self
            .http
            .post(self.url("/todos/bulk-update-priority"))
            .json(&BulkPriorityRequest {
                ids,
                priority: priority.as_str().to_string(),
            })
            .send()
            .await?;
        let body: BulkUpdateResponse = Self::decode(response).await?;
        Ok(body.updated_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::todo_repo::Sort;

    #[test]
    fn query_pairs_serialize_the_filter() {
        let filter = TodoFilter {
            statuses: vec![Status::Todo, Status::Done],
            priorities: vec![Priority::High],
            search: Some("milk".to_string()),
            tag_ids: vec![Uuid::nil()],
            sort: Sort::parse("title:desc"),
            page: 2,
            per_page: 24,
        };
        let pairs = query_pairs(&filter);
        assert!(pairs.contains(&("status", "todo,done".to_string())));
        assert!(pairs.contains(&("priority", "high".to_string())));
        assert!(pairs.contains(&("search", "milk".to_string())));
        assert!(pairs.contains(&("sort", "title:desc".to_string())));
        assert!(pairs.contains(&("tags", Uuid::nil().to_string())));
        assert!(pairs.contains(&("page", "2".to_string())));
        assert!(pairs.contains(&("limit", "24".to_string())));
    }

    #[test]
    fn empty_dimensions_are_omitted() {
        let pairs = query_pairs(&TodoFilter::default());
        assert!(pairs.iter().all(|(key, _)| *key != "status"));
        assert!(pairs.iter().all(|(key, _)| *key != "search"));
        assert!(pairs.iter().all(|(key, _)| *key != "tags"));
        assert!(pairs.contains(&("sort", "created_at:desc".to_string())));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = ApiClient::new("http://localhost:3000/");
        assert_eq!(client.url("/todos"), "http://localhost:3000/todos");
    }
}

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    db::todo_repo, error::AppError, routes::todos::TodoResponse, state::AppState,
};

const UNCONFIGURED_REPLY: &str =
    "The assistant is currently unavailable. Set ASSISTANT_API_KEY to enable it.";
const EMPTY_REPLY: &str = "Sorry, the assistant could not produce a reply.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Callers may ship their own todo snapshot; without one the server
/// snapshots the store itself before forwarding the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todos: Option<Vec<TodoResponse>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conversation_history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new().route("/chat", post(chat)).with_state(state)
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let Some(api_key) = state.cfg.assistant.api_key.clone() else {
        return Ok(Json(ChatResponse {
            message: UNCONFIGURED_REPLY.to_string(),
        }));
    };

    let todos = match body.todos {
        Some(todos) => todos,
        None => todo_repo::snapshot(&state.db)
            .await?
            .into_iter()
            .map(TodoResponse::from)
            .collect(),
    };

    let mut messages = vec![json!({
        "role": "system",
        "content": build_system_prompt(&todos),
    })];
    for entry in &body.conversation_history {
        messages.push(json!({ "role": entry.role, "content": entry.content }));
    }
    messages.push(json!({ "role": "user", "content": body.message }));

    let payload = json!({
        "model": state.cfg.assistant.model,
        "messages": messages,
        "max_tokens": 500,
        "temperature": 0.7,
    });

    let response = state
        .http
        .post(&state.cfg.assistant.api_url)
        .bearer_auth(api_key)
        .json(&payload)
        .send()
        .await
        .map_err(|err| AppError::Internal(format!("assistant request failed: {err}")))?;
    if !response.status().is_success() {
        return Err(AppError::Internal(format!(
            "assistant upstream returned {}",
            response.status()
        )));
    }

    let completion: serde_json::Value = response
        .json()
        .await
        .map_err(|err| AppError::Internal(format!("assistant reply unreadable: {err}")))?;
    let message = completion["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or(EMPTY_REPLY)
        .to_string();

    Ok(Json(ChatResponse { message }))
}

fn build_system_prompt(todos: &[TodoResponse]) -> String {
    let listing = todos
        .iter()
        .map(|todo| {
            let due = todo
                .due_date
                .map(|date| format!("due {date}"))
                .unwrap_or_else(|| "no due date".to_string());
            format!(
                "- {} ({} priority, {} status, {})",
                todo.title, todo.priority, todo.status, due
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a todo management assistant helping the user with their tasks.\n\n\
         The user's current todos:\n{listing}\n\n\
         Rules:\n\
         - Keep answers short and concrete\n\
         - Order suggestions by priority\n\
         - Point out overdue or imminent due dates\n\
         - Only discuss the todos listed above"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};
    use uuid::Uuid;

    fn sample(title: &str, due: Option<NaiveDate>) -> TodoResponse {
        let now = DateTime::parse_from_rfc3339("2026-01-15T10:00:00+00:00").unwrap();
        TodoResponse {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: None,
            status: "todo".to_string(),
            priority: "medium".to_string(),
            due_date: due,
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
        }
    }

    #[test]
    fn system_prompt_lists_todos_with_metadata() {
        let due = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let prompt = build_system_prompt(&[
            sample("Buy milk", Some(due)),
            sample("Write report", None),
        ]);
        assert!(prompt.contains("- Buy milk (medium priority, todo status, due 2026-02-01)"));
        assert!(prompt.contains("- Write report (medium priority, todo status, no due date)"));
    }
}

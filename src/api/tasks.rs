//! Task and dashboard handlers.

use super::{ApiJson, AppState};
use crate::auth::gate::ensure_admin;
use crate::auth::{AdminOnly, Authenticated};
use crate::db::dashboard::{DashboardData, DashboardScope};
use crate::error::{ApiError, ApiResult};
use crate::types::{
    ChecklistItem, NewTask, Priority, Task, TaskChanges, TaskDetail, TaskListing, TaskStatus,
    parse_due_date,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

/// Body for creating or editing a task.
///
/// `assignedTo` is taken as raw JSON so a scalar can be rejected with a
/// precise message instead of a generic body error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
    pub assigned_to: Option<Value>,
    pub todo_checklist: Option<Vec<ChecklistItem>>,
    pub attachments: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistRequest {
    pub todo_checklist: Option<Vec<ChecklistItem>>,
}

/// `{message, task}` response envelope.
#[derive(Debug, Serialize)]
pub struct TaskEnvelope<T> {
    pub message: &'static str,
    pub task: T,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn invalid_assignees() -> ApiError {
    ApiError::invalid_input("assignedTo", "assignedTo must be an array of user IDs")
}

/// Accept an array of user id strings. JSON null counts as absent.
fn parse_assignees(value: Option<Value>) -> ApiResult<Option<Vec<String>>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(id) => Ok(id),
                _ => Err(invalid_assignees()),
            })
            .collect::<ApiResult<Vec<_>>>()
            .map(Some),
        Some(_) => Err(invalid_assignees()),
    }
}

fn parse_due(value: Option<String>) -> ApiResult<Option<DateTime<Utc>>> {
    match value.filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => parse_due_date(&raw)
            .map(Some)
            .ok_or_else(|| ApiError::invalid_input("dueDate", format!("Invalid due date: {}", raw))),
    }
}

fn parse_status_filter(value: Option<String>) -> ApiResult<Option<TaskStatus>> {
    match value.filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ApiError::invalid_input("status", format!("Invalid status: {}", raw))),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TaskRequest {
    fn into_new_task(self) -> ApiResult<NewTask> {
        let title = non_blank(self.title).ok_or_else(|| ApiError::missing_field("title"))?;
        let due_date = parse_due(self.due_date)?.ok_or_else(|| ApiError::missing_field("dueDate"))?;

        Ok(NewTask {
            title,
            description: non_blank(self.description),
            priority: self.priority.unwrap_or_default(),
            due_date,
            assigned_to: parse_assignees(self.assigned_to)?.ok_or_else(invalid_assignees)?,
            todo_checklist: self.todo_checklist.unwrap_or_default(),
            attachments: self.attachments.unwrap_or_default(),
        })
    }

    fn into_changes(self) -> ApiResult<TaskChanges> {
        Ok(TaskChanges {
            title: non_blank(self.title),
            description: non_blank(self.description),
            priority: self.priority,
            due_date: parse_due(self.due_date)?,
            assigned_to: parse_assignees(self.assigned_to)?,
            todo_checklist: self.todo_checklist,
            attachments: self.attachments,
        })
    }
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<TaskListing>> {
    let status = parse_status_filter(query.status)?;
    Ok(Json(state.db.list_tasks(&caller, status)?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Authenticated(_caller): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskDetail>> {
    let task = state
        .db
        .get_task_detail(&id)?
        .ok_or_else(|| ApiError::task_not_found(&id))?;
    Ok(Json(task))
}

pub async fn create_task(
    State(state): State<AppState>,
    AdminOnly(caller): AdminOnly,
    ApiJson(req): ApiJson<TaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskEnvelope<Task>>)> {
    let task = state.db.create_task(&caller.id, req.into_new_task()?)?;
    info!("Task {} created by {}", task.id, caller.id);

    Ok((
        StatusCode::CREATED,
        Json(TaskEnvelope {
            message: "Task created successfully",
            task,
        }),
    ))
}

pub async fn update_task(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<TaskRequest>,
) -> ApiResult<Json<TaskEnvelope<Task>>> {
    if state.config.policy.admin_only_task_updates {
        ensure_admin(&caller)?;
    }

    let task = state.db.update_task(&caller, &id, req.into_changes()?)?;
    info!("Task {} updated by {}", task.id, caller.id);

    Ok(Json(TaskEnvelope {
        message: "Task updated successfully",
        task,
    }))
}

pub async fn delete_task(
    State(state): State<AppState>,
    AdminOnly(caller): AdminOnly,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.db.delete_task(&id)?;
    info!("Task {} deleted by {}", id, caller.id);

    Ok(Json(MessageResponse {
        message: "Task deleted successfully",
    }))
}

pub async fn update_task_status(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> ApiResult<Json<TaskEnvelope<Task>>> {
    let task = state.db.update_task_status(&caller, &id, req.status)?;
    info!("Task {} status set to {} by {}", task.id, task.status, caller.id);

    Ok(Json(TaskEnvelope {
        message: "Task status updated",
        task,
    }))
}

pub async fn update_task_checklist(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ChecklistRequest>,
) -> ApiResult<Json<TaskEnvelope<TaskDetail>>> {
    let checklist = req
        .todo_checklist
        .ok_or_else(|| ApiError::missing_field("todoChecklist"))?;

    let task = state.db.update_task_checklist(&caller, &id, checklist)?;
    info!("Task {} checklist updated by {} ({}%)", task.id, caller.id, task.progress);

    Ok(Json(TaskEnvelope {
        message: "Task checklist updated",
        task,
    }))
}

/// Dashboard over every task. Restricted to admins; other callers get
/// their own assignments from `user_dashboard_data`.
pub async fn dashboard_data(
    State(state): State<AppState>,
    AdminOnly(_caller): AdminOnly,
) -> ApiResult<Json<DashboardData>> {
    Ok(Json(state.db.dashboard_data(DashboardScope::Everyone, Utc::now())?))
}

pub async fn user_dashboard_data(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<Json<DashboardData>> {
    let scope = DashboardScope::AssignedTo(&caller.id);
    Ok(Json(state.db.dashboard_data(scope, Utc::now())?))
}

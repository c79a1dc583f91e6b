//! Task CRUD and lifecycle operations.

use super::dashboard::status_counts;
use super::{Database, from_ms, now_ms};
use crate::auth::gate;
use crate::error::ApiError;
use crate::types::{
    AssigneeSummary, Caller, ChecklistItem, NewTask, StatusSummary, Task, TaskChanges, TaskDetail,
    TaskListEntry, TaskListing, TaskStatus,
};
use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, title, description, priority, status, due_date, progress, \
     todo_checklist, attachments, created_by, created_at, updated_at";

/// Restricts a `tasks` query to tasks assigned to `?1`; NULL matches everything.
pub(crate) const ASSIGNEE_SCOPE: &str = "(?1 IS NULL OR EXISTS (
    SELECT 1 FROM task_assignees a WHERE a.task_id = tasks.id AND a.user_id = ?1))";

/// Decode a JSON text column. Corrupt content is a conversion error, not an empty value.
fn json_column<T: DeserializeOwned>(row: &Row, column: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    let index = row.as_ref().column_index(column)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

/// Parse a task row. Assignee ids live in `task_assignees` and are loaded separately.
pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let priority: String = row.get("priority")?;
    let status: String = row.get("status")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority: priority.parse().unwrap_or_default(),
        status: status.parse().unwrap_or_default(),
        due_date: from_ms(row.get("due_date")?),
        progress: row.get("progress")?,
        assigned_to: Vec::new(),
        todo_checklist: json_column(row, "todo_checklist")?,
        attachments: json_column(row, "attachments")?,
        created_by: row.get("created_by")?,
        created_at: from_ms(row.get("created_at")?),
        updated_at: from_ms(row.get("updated_at")?),
    })
}

fn load_assignee_ids(conn: &Connection, task_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM task_assignees WHERE task_id = ?1 ORDER BY position",
    )?;
    let ids = stmt
        .query_map(params![task_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

fn load_assignee_summaries(conn: &Connection, task_id: &str) -> Result<Vec<AssigneeSummary>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.email, u.profile_image_url
         FROM task_assignees a
         JOIN users u ON u.id = a.user_id
         WHERE a.task_id = ?1
         ORDER BY a.position",
    )?;
    let assignees = stmt
        .query_map(params![task_id], |row| {
            Ok(AssigneeSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                profile_image_url: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(assignees)
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS))?;

    let result = stmt.query_row(params![task_id], parse_task_row);

    match result {
        Ok(mut task) => {
            task.assigned_to = load_assignee_ids(conn, task_id)?;
            Ok(Some(task))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn require_task_internal(conn: &Connection, task_id: &str) -> Result<Task> {
    get_task_internal(conn, task_id)?.ok_or_else(|| ApiError::task_not_found(task_id).into())
}

fn resolve_internal(conn: &Connection, task: Task) -> Result<TaskDetail> {
    let assignees = load_assignee_summaries(conn, &task.id)?;
    Ok(task.with_assignees(assignees))
}

/// Drop repeated ids and reject ids that name no account.
fn validate_assignees(conn: &Connection, ids: Vec<String>) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let ids: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();

    let mut stmt = conn.prepare("SELECT 1 FROM users WHERE id = ?1")?;
    for id in &ids {
        if !stmt.exists(params![id])? {
            return Err(ApiError::invalid_input("assignedTo", format!("Unknown user ID: {}", id)).into());
        }
    }
    Ok(ids)
}

/// Replace the task's assignee rows, preserving order.
fn sync_assignees(conn: &Connection, task_id: &str, user_ids: &[String]) -> Result<()> {
    conn.execute("DELETE FROM task_assignees WHERE task_id = ?1", params![task_id])?;
    for (position, user_id) in user_ids.iter().enumerate() {
        conn.execute(
            "INSERT INTO task_assignees (task_id, user_id, position) VALUES (?1, ?2, ?3)",
            params![task_id, user_id, position as i64],
        )?;
    }
    Ok(())
}

fn insert_task(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        "INSERT INTO tasks (
            id, title, description, priority, status, due_date, progress,
            todo_checklist, attachments, created_by, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            &task.id,
            &task.title,
            &task.description,
            task.priority.as_str(),
            task.status.as_str(),
            task.due_date.timestamp_millis(),
            task.progress,
            serde_json::to_string(&task.todo_checklist)?,
            serde_json::to_string(&task.attachments)?,
            &task.created_by,
            task.created_at.timestamp_millis(),
            task.updated_at.timestamp_millis(),
        ],
    )?;
    sync_assignees(conn, &task.id, &task.assigned_to)
}

/// Write every mutable column back. Assignees are synced separately.
fn save_task(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET
            title = ?1, description = ?2, priority = ?3, status = ?4, due_date = ?5,
            progress = ?6, todo_checklist = ?7, attachments = ?8, updated_at = ?9
         WHERE id = ?10",
        params![
            &task.title,
            &task.description,
            task.priority.as_str(),
            task.status.as_str(),
            task.due_date.timestamp_millis(),
            task.progress,
            serde_json::to_string(&task.todo_checklist)?,
            serde_json::to_string(&task.attachments)?,
            task.updated_at.timestamp_millis(),
            &task.id,
        ],
    )?;
    Ok(())
}

fn query_tasks(conn: &Connection, assignee: Option<&str>, status: Option<TaskStatus>) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tasks WHERE {} AND (?2 IS NULL OR status = ?2) ORDER BY rowid",
        TASK_COLUMNS, ASSIGNEE_SCOPE
    ))?;
    let mut tasks = stmt
        .query_map(params![assignee, status.map(|s| s.as_str())], parse_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for task in &mut tasks {
        task.assigned_to = load_assignee_ids(conn, &task.id)?;
    }
    Ok(tasks)
}

impl Database {
    /// Create a task owned by `created_by`. Progress and status follow the
    /// supplied checklist (empty means 0 / Todo).
    pub fn create_task(&self, created_by: &str, input: NewTask) -> Result<Task> {
        let now = from_ms(now_ms());
        let mut task = Task {
            id: Uuid::now_v7().to_string(),
            title: input.title,
            description: input.description,
            priority: input.priority,
            status: TaskStatus::Todo,
            due_date: input.due_date,
            progress: 0,
            assigned_to: Vec::new(),
            todo_checklist: Vec::new(),
            attachments: input.attachments,
            created_by: Some(created_by.to_string()),
            created_at: now,
            updated_at: now,
        };
        task.replace_checklist(input.todo_checklist);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            task.assigned_to = validate_assignees(&tx, input.assigned_to)?;
            insert_task(&tx, &task)?;
            tx.commit()?;
            Ok(task)
        })
    }

    /// Get a task by ID with assignee ids.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Get a task by ID with assignees resolved.
    pub fn get_task_detail(&self, task_id: &str) -> Result<Option<TaskDetail>> {
        self.with_conn(|conn| match get_task_internal(conn, task_id)? {
            Some(task) => Ok(Some(resolve_internal(conn, task)?)),
            None => Ok(None),
        })
    }

    /// List the tasks visible to `caller`.
    ///
    /// Admins see every task, others only tasks they are assigned to. The
    /// status summary covers the same visibility and ignores `status`.
    pub fn list_tasks(&self, caller: &Caller, status: Option<TaskStatus>) -> Result<TaskListing> {
        let scope = (!caller.is_admin()).then_some(caller.id.as_str());

        self.with_conn(|conn| {
            let tasks = query_tasks(conn, scope, status)?
                .into_iter()
                .map(|task| {
                    let completed_todo_count = task.completed_todo_count();
                    Ok(TaskListEntry {
                        task: resolve_internal(conn, task)?,
                        completed_todo_count,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let counts = status_counts(conn, scope)?;
            Ok(TaskListing {
                tasks,
                status_summary: StatusSummary {
                    all: counts.total(),
                    pending_tasks: counts.todo,
                    in_progress_tasks: counts.in_progress,
                    completed_tasks: counts.done,
                },
            })
        })
    }

    /// Every task with assignee ids, in document order.
    pub fn list_all_tasks(&self) -> Result<Vec<Task>> {
        self.with_conn(|conn| query_tasks(conn, None, None))
    }

    /// Every task with assignees resolved, in document order.
    pub fn list_all_task_details(&self) -> Result<Vec<TaskDetail>> {
        self.with_conn(|conn| {
            query_tasks(conn, None, None)?
                .into_iter()
                .map(|task| resolve_internal(conn, task))
                .collect()
        })
    }

    /// Partially update a task. Only supplied fields change; a supplied
    /// checklist re-derives progress and status and, like the checklist
    /// route, needs an assignee or an admin.
    pub fn update_task(&self, caller: &Caller, task_id: &str, changes: TaskChanges) -> Result<Task> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut task = require_task_internal(&tx, task_id)?;
            if changes.todo_checklist.is_some() {
                gate::ensure_assignee_or_admin(caller, &task.assigned_to)?;
            }

            if let Some(title) = changes.title {
                task.title = title;
            }
            if let Some(description) = changes.description {
                task.description = Some(description);
            }
            if let Some(priority) = changes.priority {
                task.priority = priority;
            }
            if let Some(due_date) = changes.due_date {
                task.due_date = due_date;
            }
            if let Some(attachments) = changes.attachments {
                task.attachments = attachments;
            }
            if let Some(items) = changes.todo_checklist {
                task.replace_checklist(items);
            }
            if let Some(ids) = changes.assigned_to {
                task.assigned_to = validate_assignees(&tx, ids)?;
                sync_assignees(&tx, &task.id, &task.assigned_to)?;
            }

            task.updated_at = from_ms(now_ms());
            save_task(&tx, &task)?;
            tx.commit()?;
            Ok(task)
        })
    }

    /// Delete a task and its assignment rows.
    pub fn delete_task(&self, task_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            if deleted == 0 {
                return Err(ApiError::task_not_found(task_id).into());
            }
            Ok(())
        })
    }

    /// Set a task's status. The caller must be an assignee or an admin.
    /// `None` re-applies the current status.
    pub fn update_task_status(
        &self,
        caller: &Caller,
        task_id: &str,
        status: Option<TaskStatus>,
    ) -> Result<Task> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut task = require_task_internal(&tx, task_id)?;
            gate::ensure_assignee_or_admin(caller, &task.assigned_to)?;

            task.set_status(status.unwrap_or(task.status));
            task.updated_at = from_ms(now_ms());
            save_task(&tx, &task)?;
            tx.commit()?;
            Ok(task)
        })
    }

    /// Replace a task's checklist. The caller must be an assignee or an admin.
    pub fn update_task_checklist(
        &self,
        caller: &Caller,
        task_id: &str,
        checklist: Vec<ChecklistItem>,
    ) -> Result<TaskDetail> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut task = require_task_internal(&tx, task_id)?;
            gate::ensure_assignee_or_admin(caller, &task.assigned_to)?;

            task.replace_checklist(checklist);
            task.updated_at = from_ms(now_ms());
            save_task(&tx, &task)?;
            let detail = resolve_internal(&tx, task)?;
            tx.commit()?;
            Ok(detail)
        })
    }
}

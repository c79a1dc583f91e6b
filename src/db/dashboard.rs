//! Dashboard aggregates: counts, chart buckets and recent tasks.

use super::tasks::ASSIGNEE_SCOPE;
use super::{Database, from_ms};
use crate::types::{Priority, TaskStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;

/// Number of tasks returned in `recentTasks`.
pub const RECENT_TASK_LIMIT: usize = 10;

/// Which tasks a dashboard covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardScope<'a> {
    Everyone,
    AssignedTo(&'a str),
}

impl<'a> DashboardScope<'a> {
    fn assignee(self) -> Option<&'a str> {
        match self {
            DashboardScope::Everyone => None,
            DashboardScope::AssignedTo(user_id) => Some(user_id),
        }
    }
}

/// Task counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub todo: i64,
    pub in_progress: i64,
    pub done: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.todo + self.in_progress + self.done
    }
}

/// Count tasks per status, optionally restricted to one assignee.
pub(crate) fn status_counts(conn: &Connection, assignee: Option<&str>) -> Result<StatusCounts> {
    let mut stmt = conn.prepare(&format!(
        "SELECT status, COUNT(*) FROM tasks WHERE {} GROUP BY status",
        ASSIGNEE_SCOPE
    ))?;
    let rows = stmt.query_map(params![assignee], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = StatusCounts::default();
    for row in rows {
        let (status, count) = row?;
        match status.parse::<TaskStatus>() {
            Ok(TaskStatus::Todo) => counts.todo = count,
            Ok(TaskStatus::InProgress) => counts.in_progress = count,
            Ok(TaskStatus::Done) => counts.done = count,
            Err(_) => {}
        }
    }
    Ok(counts)
}

fn priority_counts(conn: &Connection, assignee: Option<&str>) -> Result<PriorityLevels> {
    let mut stmt = conn.prepare(&format!(
        "SELECT priority, COUNT(*) FROM tasks WHERE {} GROUP BY priority",
        ASSIGNEE_SCOPE
    ))?;
    let rows = stmt.query_map(params![assignee], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut levels = PriorityLevels::default();
    for row in rows {
        let (priority, count) = row?;
        match priority.parse::<Priority>() {
            Ok(Priority::Low) => levels.low = count,
            Ok(Priority::Medium) => levels.medium = count,
            Ok(Priority::High) => levels.high = count,
            Err(_) => {}
        }
    }
    Ok(levels)
}

fn overdue_count(conn: &Connection, assignee: Option<&str>, now: DateTime<Utc>) -> Result<i64> {
    let count = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM tasks WHERE {} AND status != 'Done' AND due_date < ?2",
            ASSIGNEE_SCOPE
        ),
        params![assignee, now.timestamp_millis()],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn recent_tasks(conn: &Connection, assignee: Option<&str>) -> Result<Vec<RecentTask>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, title, status, priority, due_date, created_at FROM tasks
         WHERE {}
         ORDER BY created_at DESC, rowid ASC
         LIMIT ?2",
        ASSIGNEE_SCOPE
    ))?;
    let tasks = stmt
        .query_map(params![assignee, RECENT_TASK_LIMIT as i64], |row| {
            let status: String = row.get(2)?;
            let priority: String = row.get(3)?;
            Ok(RecentTask {
                id: row.get(0)?,
                title: row.get(1)?,
                status: status.parse().unwrap_or_default(),
                priority: priority.parse().unwrap_or_default(),
                due_date: from_ms(row.get(4)?),
                created_at: from_ms(row.get(5)?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

/// Dashboard payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub stats: DashboardStats,
    pub charts: DashboardCharts,
    pub recent_tasks: Vec<RecentTask>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_tasks: i64,
    pub pending_tasks: i64,
    pub completed_tasks: i64,
    pub overdue_tasks: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCharts {
    pub task_distribution: TaskDistribution,
    pub task_priority_levels: PriorityLevels,
}

/// Counts keyed by status; `All` is their sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskDistribution {
    #[serde(rename = "Todo")]
    pub todo: i64,
    #[serde(rename = "InProgress")]
    pub in_progress: i64,
    #[serde(rename = "Done")]
    pub done: i64,
    #[serde(rename = "All")]
    pub all: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityLevels {
    #[serde(rename = "Low")]
    pub low: i64,
    #[serde(rename = "Medium")]
    pub medium: i64,
    #[serde(rename = "High")]
    pub high: i64,
}

/// Summary row for the recent tasks list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTask {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Database {
    /// Build the dashboard for `scope` as of `now`.
    pub fn dashboard_data(&self, scope: DashboardScope<'_>, now: DateTime<Utc>) -> Result<DashboardData> {
        let assignee = scope.assignee();

        self.with_conn(|conn| {
            let counts = status_counts(conn, assignee)?;
            let overdue = overdue_count(conn, assignee, now)?;

            Ok(DashboardData {
                stats: DashboardStats {
                    total_tasks: counts.total(),
                    pending_tasks: counts.todo,
                    completed_tasks: counts.done,
                    overdue_tasks: overdue,
                },
                charts: DashboardCharts {
                    task_distribution: TaskDistribution {
                        todo: counts.todo,
                        in_progress: counts.in_progress,
                        done: counts.done,
                        all: counts.total(),
                    },
                    task_priority_levels: priority_counts(conn, assignee)?,
                },
                recent_tasks: recent_tasks(conn, assignee)?,
            })
        })
    }
}

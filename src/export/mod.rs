//! Spreadsheet reports.
//!
//! Task and user collections are flattened into [`ReportRow`]s and written
//! into a single-sheet `.xlsx` workbook held in memory. The HTTP layer serves
//! the bytes as an attachment; the CLI writes them to disk.

use crate::db::Database;
use crate::types::{Role, Task, TaskDetail, TaskStatus, UserProfile};
use anyhow::Result;
use clap::ValueEnum;
use rust_xlsxwriter::{Format, Workbook};
use std::collections::HashMap;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A worksheet column.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub header: &'static str,
    pub width: f64,
}

const fn column(header: &'static str, width: f64) -> Column {
    Column { header, width }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

/// One row of a report.
pub trait ReportRow {
    const SHEET_NAME: &'static str;
    const COLUMNS: &'static [Column];

    fn cells(&self) -> Vec<Cell>;
}

/// Tasks report row.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReportRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub due_date: String,
    pub assigned_to: String,
}

impl From<&TaskDetail> for TaskReportRow {
    fn from(task: &TaskDetail) -> Self {
        let assigned_to = if task.assigned_to.is_empty() {
            "Unassigned".to_string()
        } else {
            task.assigned_to
                .iter()
                .map(|user| format!("{} ({})", user.name, user.email))
                .collect::<Vec<_>>()
                .join(", ")
        };

        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            priority: task.priority.to_string(),
            status: task.status.to_string(),
            due_date: task.due_date.format("%Y-%m-%d").to_string(),
            assigned_to,
        }
    }
}

impl ReportRow for TaskReportRow {
    const SHEET_NAME: &'static str = "Tasks Report";
    const COLUMNS: &'static [Column] = &[
        column("Task ID", 40.0),
        column("Title", 30.0),
        column("Description", 50.0),
        column("Priority", 15.0),
        column("Status", 20.0),
        column("Due Date", 20.0),
        column("Assigned To", 30.0),
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.id.clone()),
            Cell::Text(self.title.clone()),
            Cell::Text(self.description.clone()),
            Cell::Text(self.priority.clone()),
            Cell::Text(self.status.clone()),
            Cell::Text(self.due_date.clone()),
            Cell::Text(self.assigned_to.clone()),
        ]
    }
}

/// Users report row: assignment counts for one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserReportRow {
    pub name: String,
    pub email: String,
    pub task_count: u32,
    pub pending: u32,
    pub in_progress: u32,
    pub completed: u32,
}

impl ReportRow for UserReportRow {
    const SHEET_NAME: &'static str = "Users Task Report";
    const COLUMNS: &'static [Column] = &[
        column("User Name", 30.0),
        column("Email", 40.0),
        column("Total Assigned Tasks", 20.0),
        column("Todo Tasks", 20.0),
        column("In Progress Tasks", 20.0),
        column("Completed Tasks", 20.0),
    ];

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.name.clone()),
            Cell::Text(self.email.clone()),
            Cell::Number(f64::from(self.task_count)),
            Cell::Number(f64::from(self.pending)),
            Cell::Number(f64::from(self.in_progress)),
            Cell::Number(f64::from(self.completed)),
        ]
    }
}

/// Tally assignments per role=user account by scanning every task.
///
/// Each assignee of each task bumps that account's total and the bucket for
/// the task's status. Assignees that are not role=user accounts are skipped.
pub fn user_rows(users: &[UserProfile], tasks: &[Task]) -> Vec<UserReportRow> {
    let mut rows: Vec<UserReportRow> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for user in users.iter().filter(|u| u.role == Role::User) {
        index.insert(user.id.as_str(), rows.len());
        rows.push(UserReportRow {
            name: user.name.clone(),
            email: user.email.clone(),
            ..UserReportRow::default()
        });
    }

    for task in tasks {
        for assignee in &task.assigned_to {
            let Some(&i) = index.get(assignee.as_str()) else {
                continue;
            };
            let row = &mut rows[i];
            row.task_count += 1;
            match task.status {
                TaskStatus::Todo => row.pending += 1,
                TaskStatus::InProgress => row.in_progress += 1,
                TaskStatus::Done => row.completed += 1,
            }
        }
    }

    rows
}

/// Write rows into a one-sheet workbook with a bold header row.
pub fn write_workbook<R: ReportRow>(rows: &[R]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(R::SHEET_NAME)?;

    for (col, column) in R::COLUMNS.iter().enumerate() {
        let col = col as u16;
        worksheet.set_column_width(col, column.width)?;
        worksheet.write_string_with_format(0, col, column.header, &header)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.cells().into_iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(text) => worksheet.write_string(r, col, text)?,
                Cell::Number(n) => worksheet.write_number(r, col, n)?,
            };
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Which report to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    Tasks,
    Users,
}

impl ReportKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ReportKind::Tasks => "tasks_report.xlsx",
            ReportKind::Users => "users_report.xlsx",
        }
    }
}

/// Build a report workbook from the current database contents.
pub fn build_report(db: &Database, kind: ReportKind) -> Result<Vec<u8>> {
    match kind {
        ReportKind::Tasks => {
            let rows: Vec<TaskReportRow> = db
                .list_all_task_details()?
                .iter()
                .map(TaskReportRow::from)
                .collect();
            write_workbook(&rows)
        }
        ReportKind::Users => {
            let users = db.list_users_by_role(Role::User)?;
            let tasks = db.list_all_tasks()?;
            write_workbook(&user_rows(&users, &tasks))
        }
    }
}

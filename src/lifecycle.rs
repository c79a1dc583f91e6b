//! Checklist progress and status derivation.
//!
//! Progress is the rounded percentage of completed checklist items (0 for an
//! empty checklist). Whenever the checklist changes, status follows progress:
//! 0 is Todo, 100 is Done, anything between is In Progress.

use crate::types::{ChecklistItem, Task, TaskStatus};

/// Number of completed checklist items.
pub fn completed_count(items: &[ChecklistItem]) -> usize {
    items.iter().filter(|item| item.completed).count()
}

/// Completed percentage rounded half-up.
pub fn checklist_progress(items: &[ChecklistItem]) -> u8 {
    let total = items.len();
    if total == 0 {
        return 0;
    }
    let completed = completed_count(items);
    // round(100 * c / t) without floats
    ((200 * completed + total) / (2 * total)) as u8
}

/// Status implied by a progress value.
pub fn status_for_progress(progress: u8) -> TaskStatus {
    match progress {
        0 => TaskStatus::Todo,
        100.. => TaskStatus::Done,
        _ => TaskStatus::InProgress,
    }
}

impl<A> Task<A> {
    /// Replace the checklist wholesale and re-derive progress and status.
    pub fn replace_checklist(&mut self, items: Vec<ChecklistItem>) {
        self.progress = checklist_progress(&items);
        self.status = status_for_progress(self.progress);
        self.todo_checklist = items;
    }

    /// Move the task to `status`.
    ///
    /// Done completes every checklist item and pins progress at 100. Other
    /// statuses leave the checklist as is and progress tracks it.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        if status == TaskStatus::Done {
            for item in &mut self.todo_checklist {
                item.completed = true;
            }
            self.progress = 100;
        } else {
            self.progress = checklist_progress(&self.todo_checklist);
        }
    }

    pub fn completed_todo_count(&self) -> usize {
        completed_count(&self.todo_checklist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;
    use chrono::Utc;

    fn items(flags: &[bool]) -> Vec<ChecklistItem> {
        flags
            .iter()
            .enumerate()
            .map(|(i, done)| ChecklistItem::new(format!("step {}", i + 1), *done))
            .collect()
    }

    fn blank_task() -> Task {
        let now = Utc::now();
        Task {
            id: "task".into(),
            title: "Ship release".into(),
            description: None,
            priority: Priority::Medium,
            status: TaskStatus::Todo,
            due_date: now,
            progress: 0,
            assigned_to: vec![],
            todo_checklist: vec![],
            attachments: vec![],
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn progress_of_empty_checklist_is_zero() {
        assert_eq!(checklist_progress(&[]), 0);
    }

    #[test]
    fn progress_rounds_half_up() {
        assert_eq!(checklist_progress(&items(&[true, false])), 50);
        assert_eq!(checklist_progress(&items(&[true, false, false])), 33);
        assert_eq!(checklist_progress(&items(&[true, true, false])), 67);
        // 12.5 rounds up
        assert_eq!(
            checklist_progress(&items(&[true, false, false, false, false, false, false, false])),
            13
        );
        assert_eq!(checklist_progress(&items(&[true, true])), 100);
    }

    #[test]
    fn status_follows_progress() {
        assert_eq!(status_for_progress(0), TaskStatus::Todo);
        assert_eq!(status_for_progress(1), TaskStatus::InProgress);
        assert_eq!(status_for_progress(99), TaskStatus::InProgress);
        assert_eq!(status_for_progress(100), TaskStatus::Done);
    }

    #[test]
    fn replacing_checklist_derives_progress_and_status() {
        let mut task = blank_task();

        task.replace_checklist(items(&[true, false]));
        assert_eq!(task.progress, 50);
        assert_eq!(task.status, TaskStatus::InProgress);

        task.replace_checklist(items(&[true, true]));
        assert_eq!(task.progress, 100);
        assert_eq!(task.status, TaskStatus::Done);

        task.replace_checklist(vec![]);
        assert_eq!(task.progress, 0);
        assert_eq!(task.status, TaskStatus::Todo);
    }

    #[test]
    fn done_status_completes_checklist() {
        let mut task = blank_task();
        task.replace_checklist(items(&[false, true, false]));

        task.set_status(TaskStatus::Done);

        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.progress, 100);
        assert!(task.todo_checklist.iter().all(|item| item.completed));
        assert_eq!(task.completed_todo_count(), 3);
    }

    #[test]
    fn other_statuses_leave_checklist_untouched() {
        let mut task = blank_task();
        task.replace_checklist(items(&[true, false, false, false]));

        task.set_status(TaskStatus::Todo);

        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.todo_checklist, items(&[true, false, false, false]));
        assert_eq!(task.progress, 25);
    }

    #[test]
    fn done_with_empty_checklist_reports_full_progress() {
        let mut task = blank_task();
        task.set_status(TaskStatus::Done);
        assert_eq!(task.progress, 100);
        assert!(task.todo_checklist.is_empty());
    }
}

//! Integration tests for the database layer.
//!
//! These tests verify the core database operations using an in-memory SQLite database.
//! Tests are organized by module and functionality.

use chrono::{Duration, Utc};
use taskdeck::db::Database;
use taskdeck::db::dashboard::{DashboardScope, RECENT_TASK_LIMIT};
use taskdeck::db::users::{NewUser, ProfileChanges};
use taskdeck::error::{ApiError, ErrorCode};
use taskdeck::types::{
    Caller, ChecklistItem, NewTask, Priority, Role, TaskChanges, TaskStatus, UserProfile,
    parse_due_date,
};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn add_user(db: &Database, name: &str, role: Role) -> UserProfile {
    db.create_user(NewUser {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        password_hash: "hash".to_string(),
        role,
        profile_image_url: None,
    })
    .expect("Failed to create user")
}

fn new_task(title: &str, assigned_to: Vec<String>) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: None,
        priority: Priority::Medium,
        due_date: parse_due_date("2030-01-01").unwrap(),
        assigned_to,
        todo_checklist: vec![],
        attachments: vec![],
    }
}

fn error_code(err: anyhow::Error) -> ErrorCode {
    ApiError::from(err).code
}

mod user_tests {
    use super::*;

    #[test]
    fn create_user_rejects_duplicate_email() {
        let db = setup_db();
        add_user(&db, "Ada", Role::User);

        let err = db
            .create_user(NewUser {
                name: "Other".into(),
                email: "ada@example.com".into(),
                password_hash: "hash".into(),
                role: Role::User,
                profile_image_url: None,
            })
            .unwrap_err();
        let api_err = ApiError::from(err);
        assert_eq!(api_err.code, ErrorCode::InvalidInput);
        assert_eq!(api_err.message, "User already exists");
    }

    #[test]
    fn find_by_email_returns_hash() {
        let db = setup_db();
        let user = add_user(&db, "Ada", Role::Admin);

        let record = db.find_user_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(record.profile, user);
        assert_eq!(record.password_hash, "hash");
        assert!(db.find_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn require_user_not_found() {
        let db = setup_db();
        let err = db.require_user("missing").unwrap_err();
        assert_eq!(error_code(err), ErrorCode::NotFound);
    }

    #[test]
    fn update_profile_changes_only_supplied_fields() {
        let db = setup_db();
        let user = add_user(&db, "Ada", Role::User);

        let updated = db
            .update_user_profile(
                &user.id,
                ProfileChanges {
                    name: Some("Ada L.".into()),
                    ..ProfileChanges::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Ada L.");
        assert_eq!(updated.email, "ada@example.com");
        assert_eq!(updated.role, Role::User);

        db.update_user_profile(
            &user.id,
            ProfileChanges {
                password_hash: Some("new-hash".into()),
                ..ProfileChanges::default()
            },
        )
        .unwrap();
        let record = db.find_user_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(record.password_hash, "new-hash");
    }

    #[test]
    fn update_profile_rejects_taken_email() {
        let db = setup_db();
        let ada = add_user(&db, "Ada", Role::User);
        add_user(&db, "Bob", Role::User);

        let err = db
            .update_user_profile(
                &ada.id,
                ProfileChanges {
                    email: Some("bob@example.com".into()),
                    ..ProfileChanges::default()
                },
            )
            .unwrap_err();
        assert_eq!(error_code(err), ErrorCode::InvalidInput);

        // Keeping your own email is fine
        let same = db
            .update_user_profile(
                &ada.id,
                ProfileChanges {
                    email: Some("ada@example.com".into()),
                    ..ProfileChanges::default()
                },
            )
            .unwrap();
        assert_eq!(same.email, "ada@example.com");
    }

    #[test]
    fn list_users_with_counts_excludes_admins() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        let ada = add_user(&db, "Ada", Role::User);
        let bob = add_user(&db, "Bob", Role::User);

        let t1 = db.create_task(&admin.id, new_task("one", vec![ada.id.clone()])).unwrap();
        db.create_task(&admin.id, new_task("two", vec![ada.id.clone(), bob.id.clone()]))
            .unwrap();
        let caller = Caller::from(admin.clone());
        db.update_task_status(&caller, &t1.id, Some(TaskStatus::Done)).unwrap();

        let users = db.list_users_with_task_counts().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].user.id, ada.id);
        assert_eq!((users[0].pending_tasks, users[0].in_progress_tasks, users[0].completed_tasks), (1, 0, 1));
        assert_eq!(users[1].user.id, bob.id);
        assert_eq!((users[1].pending_tasks, users[1].completed_tasks), (1, 0));
    }
}

mod task_tests {
    use super::*;

    #[test]
    fn create_task_derives_progress_from_checklist() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);

        let mut input = new_task("Write docs", vec![]);
        input.todo_checklist = vec![
            ChecklistItem::new("outline", true),
            ChecklistItem::new("draft", false),
            ChecklistItem::new("review", false),
        ];
        let task = db.create_task(&admin.id, input).unwrap();

        assert_eq!(task.progress, 33);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.created_by.as_deref(), Some(admin.id.as_str()));

        let stored = db.get_task(&task.id).unwrap().unwrap();
        assert_eq!(stored, task);
    }

    #[test]
    fn create_task_dedupes_and_validates_assignees() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        let ada = add_user(&db, "Ada", Role::User);
        let bob = add_user(&db, "Bob", Role::User);

        let task = db
            .create_task(
                &admin.id,
                new_task("pair", vec![bob.id.clone(), ada.id.clone(), bob.id.clone()]),
            )
            .unwrap();
        assert_eq!(task.assigned_to, vec![bob.id.clone(), ada.id.clone()]);

        let detail = db.get_task_detail(&task.id).unwrap().unwrap();
        let names: Vec<_> = detail.assigned_to.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Ada"]);

        let err = db
            .create_task(&admin.id, new_task("ghost", vec!["no-such-user".into()]))
            .unwrap_err();
        assert_eq!(error_code(err), ErrorCode::InvalidInput);
        assert_eq!(db.list_all_tasks().unwrap().len(), 1);
    }

    #[test]
    fn list_tasks_is_scoped_by_role() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        let ada = add_user(&db, "Ada", Role::User);
        let bob = add_user(&db, "Bob", Role::User);

        db.create_task(&admin.id, new_task("ada-1", vec![ada.id.clone()])).unwrap();
        let done = db.create_task(&admin.id, new_task("ada-2", vec![ada.id.clone()])).unwrap();
        db.create_task(&admin.id, new_task("bob-1", vec![bob.id.clone()])).unwrap();
        let admin_caller = Caller::from(admin);
        db.update_task_status(&admin_caller, &done.id, Some(TaskStatus::Done)).unwrap();

        let all = db.list_tasks(&admin_caller, None).unwrap();
        assert_eq!(all.tasks.len(), 3);
        assert_eq!(all.status_summary.all, 3);
        assert_eq!(all.status_summary.completed_tasks, 1);

        let ada_caller = Caller::from(ada);
        let mine = db.list_tasks(&ada_caller, None).unwrap();
        let titles: Vec<_> = mine.tasks.iter().map(|t| t.task.title.as_str()).collect();
        assert_eq!(titles, vec!["ada-1", "ada-2"]);
        assert_eq!(mine.status_summary.all, 2);
        assert_eq!(mine.status_summary.pending_tasks, 1);

        // The summary ignores the status filter
        let pending = db.list_tasks(&ada_caller, Some(TaskStatus::Todo)).unwrap();
        assert_eq!(pending.tasks.len(), 1);
        assert_eq!(pending.status_summary.all, 2);
    }

    #[test]
    fn list_entries_count_completed_items() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);

        let mut input = new_task("checklist", vec![]);
        input.todo_checklist = vec![ChecklistItem::new("a", true), ChecklistItem::new("b", true)];
        db.create_task(&admin.id, input).unwrap();

        let listing = db.list_tasks(&Caller::from(admin), None).unwrap();
        assert_eq!(listing.tasks[0].completed_todo_count, 2);
        assert_eq!(listing.tasks[0].task.status, TaskStatus::Done);
    }

    #[test]
    fn update_task_applies_partial_changes() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        let ada = add_user(&db, "Ada", Role::User);
        let task = db.create_task(&admin.id, new_task("old", vec![ada.id.clone()])).unwrap();
        let admin = Caller::from(admin);

        let updated = db
            .update_task(
                &admin,
                &task.id,
                TaskChanges {
                    title: Some("new".into()),
                    priority: Some(Priority::High),
                    ..TaskChanges::default()
                },
            )
            .unwrap();
        assert_eq!(updated.title, "new");
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.assigned_to, vec![ada.id.clone()]);
        assert_eq!(updated.due_date, task.due_date);

        let cleared = db
            .update_task(
                &admin,
                &task.id,
                TaskChanges {
                    assigned_to: Some(vec![]),
                    todo_checklist: Some(vec![ChecklistItem::new("x", false), ChecklistItem::new("y", true)]),
                    ..TaskChanges::default()
                },
            )
            .unwrap();
        assert!(cleared.assigned_to.is_empty());
        assert_eq!(cleared.progress, 50);
        assert_eq!(cleared.status, TaskStatus::InProgress);
    }

    #[test]
    fn corrupt_checklist_column_is_an_error() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        let task = db.create_task(&admin.id, new_task("broken", vec![])).unwrap();

        db.with_conn(|conn| {
            conn.execute(
                "UPDATE tasks SET todo_checklist = 'not json' WHERE id = ?1",
                rusqlite::params![task.id],
            )?;
            Ok(())
        })
        .unwrap();

        let err = db.get_task(&task.id).unwrap_err();
        assert_eq!(error_code(err), ErrorCode::Internal);
        assert!(db.update_task_status(&Caller::from(admin), &task.id, None).is_err());
    }

    #[test]
    fn update_missing_task_is_not_found() {
        let db = setup_db();
        let admin = Caller::from(add_user(&db, "Admin", Role::Admin));
        let err = db.update_task(&admin, "missing", TaskChanges::default()).unwrap_err();
        assert_eq!(error_code(err), ErrorCode::NotFound);
    }

    #[test]
    fn update_task_checklist_requires_assignee_or_admin() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        let ada = add_user(&db, "Ada", Role::User);
        let bob = add_user(&db, "Bob", Role::User);
        let mut fields = new_task("gated", vec![ada.id.clone()]);
        fields.todo_checklist = vec![ChecklistItem::new("x", false)];
        let task = db.create_task(&admin.id, fields).unwrap();

        let bob = Caller::from(bob);
        let err = db
            .update_task(
                &bob,
                &task.id,
                TaskChanges {
                    todo_checklist: Some(vec![ChecklistItem::new("x", true)]),
                    ..TaskChanges::default()
                },
            )
            .unwrap_err();
        assert_eq!(error_code(err), ErrorCode::Forbidden);

        let unchanged = db.get_task(&task.id).unwrap().unwrap();
        assert_eq!(unchanged.progress, 0);
        assert_eq!(unchanged.status, TaskStatus::Todo);

        let renamed = db
            .update_task(
                &bob,
                &task.id,
                TaskChanges {
                    title: Some("renamed".into()),
                    ..TaskChanges::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.title, "renamed");

        let done = db
            .update_task(
                &Caller::from(ada),
                &task.id,
                TaskChanges {
                    todo_checklist: Some(vec![ChecklistItem::new("x", true)]),
                    ..TaskChanges::default()
                },
            )
            .unwrap();
        assert_eq!(done.progress, 100);
        assert_eq!(done.status, TaskStatus::Done);
    }

    #[test]
    fn delete_task_removes_it() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        let ada = add_user(&db, "Ada", Role::User);
        let task = db.create_task(&admin.id, new_task("gone", vec![ada.id.clone()])).unwrap();

        db.delete_task(&task.id).unwrap();
        assert!(db.get_task(&task.id).unwrap().is_none());
        assert_eq!(db.list_users_with_task_counts().unwrap()[0].pending_tasks, 0);

        let err = db.delete_task(&task.id).unwrap_err();
        assert_eq!(error_code(err), ErrorCode::NotFound);
    }

    #[test]
    fn status_update_requires_assignee_or_admin() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        let ada = add_user(&db, "Ada", Role::User);
        let bob = add_user(&db, "Bob", Role::User);

        let mut input = new_task("gated", vec![ada.id.clone()]);
        input.todo_checklist = vec![ChecklistItem::new("a", false), ChecklistItem::new("b", false)];
        let task = db.create_task(&admin.id, input).unwrap();

        let err = db
            .update_task_status(&Caller::from(bob), &task.id, Some(TaskStatus::Done))
            .unwrap_err();
        assert_eq!(error_code(err), ErrorCode::Forbidden);

        let done = db
            .update_task_status(&Caller::from(ada.clone()), &task.id, Some(TaskStatus::Done))
            .unwrap();
        assert_eq!(done.progress, 100);
        assert!(done.todo_checklist.iter().all(|item| item.completed));

        // Leaving Done keeps the checklist and re-derives progress from it
        let reopened = db
            .update_task_status(&Caller::from(ada), &task.id, Some(TaskStatus::InProgress))
            .unwrap();
        assert_eq!(reopened.status, TaskStatus::InProgress);
        assert_eq!(reopened.progress, 100);
    }

    #[test]
    fn status_update_without_status_keeps_current() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        let task = db.create_task(&admin.id, new_task("same", vec![])).unwrap();

        let same = db.update_task_status(&Caller::from(admin), &task.id, None).unwrap();
        assert_eq!(same.status, TaskStatus::Todo);
        assert_eq!(same.progress, 0);
    }

    #[test]
    fn checklist_update_drives_status() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        let ada = add_user(&db, "Ada", Role::User);
        let bob = add_user(&db, "Bob", Role::User);
        let task = db.create_task(&admin.id, new_task("steps", vec![ada.id.clone()])).unwrap();
        let ada = Caller::from(ada);

        let half = db
            .update_task_checklist(
                &ada,
                &task.id,
                vec![ChecklistItem::new("a", true), ChecklistItem::new("b", false)],
            )
            .unwrap();
        assert_eq!(half.progress, 50);
        assert_eq!(half.status, TaskStatus::InProgress);
        assert_eq!(half.assigned_to[0].name, "Ada");

        let full = db
            .update_task_checklist(
                &ada,
                &task.id,
                vec![ChecklistItem::new("a", true), ChecklistItem::new("b", true)],
            )
            .unwrap();
        assert_eq!(full.progress, 100);
        assert_eq!(full.status, TaskStatus::Done);

        let empty = db.update_task_checklist(&ada, &task.id, vec![]).unwrap();
        assert_eq!(empty.progress, 0);
        assert_eq!(empty.status, TaskStatus::Todo);

        let err = db
            .update_task_checklist(&Caller::from(bob), &task.id, vec![])
            .unwrap_err();
        assert_eq!(error_code(err), ErrorCode::Forbidden);

        let err = db.update_task_checklist(&ada, "missing", vec![]).unwrap_err();
        assert_eq!(error_code(err), ErrorCode::NotFound);
    }
}

mod dashboard_tests {
    use super::*;

    #[test]
    fn admin_dashboard_counts_everything() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        let ada = add_user(&db, "Ada", Role::User);

        let mut high = new_task("high", vec![ada.id.clone()]);
        high.priority = Priority::High;
        db.create_task(&admin.id, high).unwrap();
        let low = db.create_task(&admin.id, new_task("medium", vec![])).unwrap();
        db.update_task_status(&Caller::from(admin), &low.id, Some(TaskStatus::Done))
            .unwrap();

        let data = db.dashboard_data(DashboardScope::Everyone, Utc::now()).unwrap();
        assert_eq!(data.stats.total_tasks, 2);
        assert_eq!(data.stats.pending_tasks, 1);
        assert_eq!(data.stats.completed_tasks, 1);
        assert_eq!(data.stats.overdue_tasks, 0);

        let dist = data.charts.task_distribution;
        assert_eq!(dist.all, dist.todo + dist.in_progress + dist.done);
        assert_eq!(dist.all, data.stats.total_tasks);
        assert_eq!(data.charts.task_priority_levels.high, 1);
        assert_eq!(data.charts.task_priority_levels.medium, 1);
        assert_eq!(data.charts.task_priority_levels.low, 0);
    }

    #[test]
    fn user_dashboard_is_scoped_to_assignments() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        let ada = add_user(&db, "Ada", Role::User);
        let bob = add_user(&db, "Bob", Role::User);

        db.create_task(&admin.id, new_task("ada", vec![ada.id.clone()])).unwrap();
        db.create_task(&admin.id, new_task("both", vec![ada.id.clone(), bob.id.clone()]))
            .unwrap();
        db.create_task(&admin.id, new_task("bob", vec![bob.id.clone()])).unwrap();

        let data = db
            .dashboard_data(DashboardScope::AssignedTo(&ada.id), Utc::now())
            .unwrap();
        assert_eq!(data.stats.total_tasks, 2);
        assert_eq!(data.charts.task_distribution.all, 2);
        let titles: Vec<_> = data.recent_tasks.iter().map(|t| t.title.as_str()).collect();
        assert!(titles.contains(&"ada"));
        assert!(titles.contains(&"both"));
        assert!(!titles.contains(&"bob"));
    }

    #[test]
    fn overdue_excludes_done_tasks() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        db.create_task(&admin.id, new_task("late", vec![])).unwrap();
        let done = db.create_task(&admin.id, new_task("finished", vec![])).unwrap();
        db.update_task_status(&Caller::from(admin), &done.id, Some(TaskStatus::Done))
            .unwrap();

        let later = parse_due_date("2030-01-01").unwrap() + Duration::days(1);
        let data = db.dashboard_data(DashboardScope::Everyone, later).unwrap();
        assert_eq!(data.stats.overdue_tasks, 1);
    }

    #[test]
    fn recent_tasks_are_capped_and_newest_first() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        for i in 0..(RECENT_TASK_LIMIT + 2) {
            db.create_task(&admin.id, new_task(&format!("task-{}", i), vec![])).unwrap();
        }

        let data = db.dashboard_data(DashboardScope::Everyone, Utc::now()).unwrap();
        assert_eq!(data.recent_tasks.len(), RECENT_TASK_LIMIT);
        assert!(
            data.recent_tasks
                .windows(2)
                .all(|pair| pair[0].created_at >= pair[1].created_at)
        );
    }

    #[test]
    fn recent_tasks_with_equal_timestamps_keep_insertion_order() {
        let db = setup_db();
        let admin = add_user(&db, "Admin", Role::Admin);
        let ids: Vec<String> = ["first", "second", "third", "latest"]
            .iter()
            .map(|title| db.create_task(&admin.id, new_task(title, vec![])).unwrap().id)
            .collect();

        let stamp = Utc::now().timestamp_millis() - 60_000;
        db.with_conn(|conn| {
            conn.execute("UPDATE tasks SET created_at = ?1", rusqlite::params![stamp])?;
            conn.execute(
                "UPDATE tasks SET created_at = ?1 WHERE id = ?2",
                rusqlite::params![stamp + 1_000, ids[3]],
            )?;
            Ok(())
        })
        .unwrap();

        let data = db.dashboard_data(DashboardScope::Everyone, Utc::now()).unwrap();
        let titles: Vec<&str> = data.recent_tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["latest", "first", "second", "third"]);
    }

    #[test]
    fn empty_database_has_zero_counts() {
        let db = setup_db();
        let data = db.dashboard_data(DashboardScope::Everyone, Utc::now()).unwrap();
        assert_eq!(data.stats.total_tasks, 0);
        assert_eq!(data.charts.task_distribution.all, 0);
        assert!(data.recent_tasks.is_empty());
    }
}

//! User account storage.

use super::{Database, from_ms, now_ms};
use crate::error::ApiError;
use crate::types::{Role, UserProfile, UserWithTaskCounts};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, profile_image_url, created_at, updated_at";

/// A stored account including its password hash.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub profile: UserProfile,
    pub password_hash: String,
}

/// Fields for a new account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub profile_image_url: Option<String>,
}

/// Self-service profile changes. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

fn parse_user_row(row: &Row) -> rusqlite::Result<UserRecord> {
    let role: String = row.get("role")?;
    Ok(UserRecord {
        profile: UserProfile {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            role: role.parse().unwrap_or_default(),
            profile_image_url: row.get("profile_image_url")?,
            created_at: from_ms(row.get("created_at")?),
            updated_at: from_ms(row.get("updated_at")?),
        },
        password_hash: row.get("password_hash")?,
    })
}

fn get_user_internal(conn: &Connection, user_id: &str) -> Result<Option<UserRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![user_id],
            parse_user_row,
        )
        .optional()?;
    Ok(record)
}

fn find_by_email_internal(conn: &Connection, email: &str) -> Result<Option<UserRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            params![email],
            parse_user_row,
        )
        .optional()?;
    Ok(record)
}

impl Database {
    /// Create an account. Fails with `InvalidInput` if the email is taken.
    pub fn create_user(&self, user: NewUser) -> Result<UserProfile> {
        let id = Uuid::now_v7().to_string();
        let now = now_ms();

        self.with_conn(|conn| {
            if find_by_email_internal(conn, &user.email)?.is_some() {
                return Err(ApiError::invalid_input("email", "User already exists").into());
            }

            conn.execute(
                "INSERT INTO users (id, name, email, password_hash, role, profile_image_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    &id,
                    &user.name,
                    &user.email,
                    &user.password_hash,
                    user.role.as_str(),
                    &user.profile_image_url,
                    now,
                    now,
                ],
            )?;

            Ok(UserProfile {
                id,
                name: user.name,
                email: user.email,
                role: user.role,
                profile_image_url: user.profile_image_url,
                created_at: from_ms(now),
                updated_at: from_ms(now),
            })
        })
    }

    /// Look up an account (with its hash) by email, for login.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        self.with_conn(|conn| find_by_email_internal(conn, email))
    }

    /// Get an account by ID.
    pub fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.with_conn(|conn| Ok(get_user_internal(conn, user_id)?.map(|r| r.profile)))
    }

    /// Get an account by ID, failing with `NotFound`.
    pub fn require_user(&self, user_id: &str) -> Result<UserProfile> {
        self.get_user(user_id)?
            .ok_or_else(|| ApiError::user_not_found(user_id).into())
    }

    /// Apply self-service profile changes.
    pub fn update_user_profile(&self, user_id: &str, changes: ProfileChanges) -> Result<UserProfile> {
        self.with_conn(|conn| {
            let mut record = get_user_internal(conn, user_id)?
                .ok_or_else(|| ApiError::user_not_found(user_id))?;

            if let Some(email) = changes.email {
                if let Some(other) = find_by_email_internal(conn, &email)?
                    && other.profile.id != user_id
                {
                    return Err(ApiError::invalid_input("email", "Email already in use").into());
                }
                record.profile.email = email;
            }
            if let Some(name) = changes.name {
                record.profile.name = name;
            }
            if let Some(hash) = changes.password_hash {
                record.password_hash = hash;
            }

            let now = now_ms();
            conn.execute(
                "UPDATE users SET name = ?1, email = ?2, password_hash = ?3, updated_at = ?4 WHERE id = ?5",
                params![
                    &record.profile.name,
                    &record.profile.email,
                    &record.password_hash,
                    now,
                    user_id,
                ],
            )?;
            record.profile.updated_at = from_ms(now);

            Ok(record.profile)
        })
    }

    /// All accounts with the given role, in registration order.
    pub fn list_users_by_role(&self, role: Role) -> Result<Vec<UserProfile>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users WHERE role = ?1 ORDER BY rowid",
                USER_COLUMNS
            ))?;
            let users = stmt
                .query_map(params![role.as_str()], parse_user_row)?
                .map(|r| r.map(|record| record.profile))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }

    /// Every role=user account with its assignment counts per status.
    pub fn list_users_with_task_counts(&self) -> Result<Vec<UserWithTaskCounts>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id AS id, u.name AS name, u.email AS email,
                        u.password_hash AS password_hash, u.role AS role,
                        u.profile_image_url AS profile_image_url,
                        u.created_at AS created_at, u.updated_at AS updated_at,
                        COALESCE(SUM(CASE WHEN t.status = 'Todo' THEN 1 ELSE 0 END), 0) AS pending,
                        COALESCE(SUM(CASE WHEN t.status = 'In Progress' THEN 1 ELSE 0 END), 0) AS in_progress,
                        COALESCE(SUM(CASE WHEN t.status = 'Done' THEN 1 ELSE 0 END), 0) AS completed
                 FROM users u
                 LEFT JOIN task_assignees a ON a.user_id = u.id
                 LEFT JOIN tasks t ON t.id = a.task_id
                 WHERE u.role = 'user'
                 GROUP BY u.id
                 ORDER BY u.rowid",
            )?;

            let users = stmt
                .query_map([], |row| {
                    let record = parse_user_row(row)?;
                    Ok(UserWithTaskCounts {
                        user: record.profile,
                        pending_tasks: row.get("pending")?,
                        in_progress_tasks: row.get("in_progress")?,
                        completed_tasks: row.get("completed")?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }
}

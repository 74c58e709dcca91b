use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use parley_types::models::{NewUser, User};
use parley_types::patch::UserPatch;

use super::{limit_offset, parse_json, parse_ts};
use crate::Database;

const USER_COLS: &str =
    "id, username, password, email, default_preset, created_time, last_login_time, preferences";

impl Database {
    pub fn add_user(&self, new: &NewUser) -> Result<User> {
        let now = Utc::now();
        let preferences = new
            .preferences
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));

        let id = self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users
                     (username, password, email, default_preset,
                      created_time, last_login_time, preferences)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    new.username,
                    new.password,
                    new.email,
                    new.default_preset,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                    preferences.to_string(),
                ],
            )
            .with_context(|| format!("inserting user {}", new.username))?;
            Ok(conn.last_insert_rowid())
        })?;

        info!("Added user {} with id {}", new.username, id);
        Ok(User {
            id,
            username: new.username.clone(),
            password: new.password.clone(),
            email: new.email.clone(),
            default_preset: new.default_preset.clone(),
            created_time: now,
            last_login_time: Some(now),
            preferences,
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        debug!("Retrieving user with id {}", id);
        self.with_conn(|conn| query_user(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        debug!("Retrieving user with username {}", username);
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLS} FROM users WHERE username = ?1");
            let row = conn
                .query_row(&sql, [username], map_user_row)
                .optional()?;
            Ok(row)
        })
    }

    /// All users, ordered by username.
    pub fn get_users(&self, limit: Option<u32>, offset: Option<u32>) -> Result<Vec<User>> {
        debug!("Retrieving users");
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLS} FROM users ORDER BY username{}",
                limit_offset(limit, offset)
            );
            let mut stmt = conn.prepare(&sql)?;
            let users = stmt
                .query_map([], map_user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    /// Apply the patch's set fields and persist the full row.
    pub fn edit_user(&self, id: i64, patch: &UserPatch) -> Result<User> {
        let user = self.with_conn_mut(|conn| {
            let mut user = query_user(conn, id)?
                .with_context(|| format!("user {} not found", id))?;

            if let Some(username) = &patch.username {
                user.username = username.clone();
            }
            if let Some(password) = &patch.password {
                user.password = password.clone();
            }
            if let Some(email) = &patch.email {
                user.email = email.clone();
            }
            if let Some(default_preset) = &patch.default_preset {
                user.default_preset = default_preset.clone();
            }
            if let Some(last_login_time) = patch.last_login_time {
                user.last_login_time = last_login_time;
            }
            if let Some(preferences) = &patch.preferences {
                user.preferences = preferences.clone();
            }

            conn.execute(
                "UPDATE users SET username = ?1, password = ?2, email = ?3,
                     default_preset = ?4, last_login_time = ?5, preferences = ?6
                 WHERE id = ?7",
                params![
                    user.username,
                    user.password,
                    user.email,
                    user.default_preset,
                    user.last_login_time.map(|t| t.to_rfc3339()),
                    user.preferences.to_string(),
                    id,
                ],
            )?;
            Ok(user)
        })?;

        info!("Edited user with id {}", id);
        Ok(user)
    }

    /// Refresh `last_login_time` to now.
    pub fn touch_user_login(&self, id: i64) -> Result<User> {
        let now = Utc::now();
        let user = self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET last_login_time = ?1 WHERE id = ?2",
                params![now.to_rfc3339(), id],
            )?;
            if n == 0 {
                bail!("user {} not found", id);
            }
            query_user(conn, id)?.with_context(|| format!("user {} not found", id))
        })?;

        info!("Recorded login for user with id {}", id);
        Ok(user)
    }

    /// Cascades to the user's conversations and their messages.
    pub fn delete_user(&self, id: i64) -> Result<()> {
        let n = self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])?)
        })?;
        if n == 0 {
            bail!("user {} not found", id);
        }
        info!("Deleted user with id {}", id);
        Ok(())
    }
}

fn query_user(conn: &Connection, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLS} FROM users WHERE id = ?1");
    let row = conn.query_row(&sql, [id], map_user_row).optional()?;
    Ok(row)
}

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created: String = row.get(5)?;
    let last_login: Option<String> = row.get(6)?;
    let preferences: String = row.get(7)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        email: row.get(3)?,
        default_preset: row.get(4)?,
        created_time: parse_ts(5, &created)?,
        last_login_time: last_login.as_deref().map(|s| parse_ts(6, s)).transpose()?,
        preferences: parse_json(7, &preferences)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            password: None,
            email: None,
            default_preset: "default".to_string(),
            preferences: None,
        }
    }

    #[test]
    fn users_ordered_by_username() {
        let db = Database::open_in_memory().unwrap();
        db.add_user(&user("carol")).unwrap();
        db.add_user(&user("alice")).unwrap();
        db.add_user(&user("bob")).unwrap();

        let names: Vec<String> = db
            .get_users(None, None)
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
    }

    #[test]
    fn lookup_by_username() {
        let db = Database::open_in_memory().unwrap();
        let added = db.add_user(&user("alice")).unwrap();

        let found = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(found.id, added.id);
        assert!(db.get_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.add_user(&user("alice")).unwrap();
        assert!(db.add_user(&user("alice")).is_err());
    }

    #[test]
    fn patch_clears_nullable_field() {
        let db = Database::open_in_memory().unwrap();
        let mut new = user("alice");
        new.email = Some("alice@example.com".to_string());
        let added = db.add_user(&new).unwrap();

        let patch = UserPatch {
            email: Some(None),
            ..Default::default()
        };
        let edited = db.edit_user(added.id, &patch).unwrap();
        assert_eq!(edited.email, None);

        let fetched = db.get_user(added.id).unwrap().unwrap();
        assert_eq!(fetched.email, None);
        assert_eq!(fetched.username, "alice");
    }
}

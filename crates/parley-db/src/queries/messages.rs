use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use parley_types::models::{Message, NewMessage};
use parley_types::patch::MessagePatch;

use super::{limit_offset, parse_ts};
use crate::Database;

const MESSAGE_COLS: &str = "id, conversation_id, role, body, message_type, \
                            message_metadata, model, provider, preset, created_time";

impl Database {
    /// Append a message and refresh the parent conversation's
    /// `updated_time` to the message's `created_time`, in one transaction.
    pub fn add_message(&self, conversation_id: i64, new: &NewMessage) -> Result<Message> {
        let now = Utc::now();
        let id = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages
                     (conversation_id, role, body, message_type, message_metadata,
                      model, provider, preset, created_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    conversation_id,
                    new.role,
                    new.body,
                    new.message_type,
                    new.message_metadata,
                    new.model,
                    new.provider,
                    new.preset,
                    now.to_rfc3339(),
                ],
            )
            .with_context(|| format!("inserting message into conversation {}", conversation_id))?;
            let id = tx.last_insert_rowid();
            tx.execute(
                "UPDATE conversations SET updated_time = ?1 WHERE id = ?2",
                params![now.to_rfc3339(), conversation_id],
            )?;
            tx.commit()?;
            Ok(id)
        })?;

        info!(
            "Added {} message {} to conversation {}",
            new.role, id, conversation_id
        );
        Ok(Message {
            id,
            conversation_id,
            role: new.role.clone(),
            body: new.body.clone(),
            message_type: new.message_type.clone(),
            message_metadata: new.message_metadata.clone(),
            model: new.model.clone(),
            provider: new.provider.clone(),
            preset: new.preset.clone(),
            created_time: now,
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<Message>> {
        debug!("Retrieving message with id {}", id);
        self.with_conn(|conn| query_message(conn, id))
    }

    /// A conversation's messages ordered by id ascending. `target_id`, when
    /// given, restricts results to ids at or below it.
    pub fn get_messages(
        &self,
        conversation_id: i64,
        limit: Option<u32>,
        offset: Option<u32>,
        target_id: Option<i64>,
    ) -> Result<Vec<Message>> {
        debug!("Retrieving messages for conversation with id {}", conversation_id);
        self.with_conn(|conn| {
            let suffix = limit_offset(limit, offset);
            let messages = match target_id {
                Some(target) => {
                    let sql = format!(
                        "SELECT {MESSAGE_COLS} FROM messages
                         WHERE conversation_id = ?1 AND id <= ?2 ORDER BY id{suffix}"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.query_map(params![conversation_id, target], map_message_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                }
                None => {
                    let sql = format!(
                        "SELECT {MESSAGE_COLS} FROM messages
                         WHERE conversation_id = ?1 ORDER BY id{suffix}"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.query_map([conversation_id], map_message_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                }
            };
            Ok(messages)
        })
    }

    /// The most recent message in a conversation, if any.
    pub fn get_last_message(&self, conversation_id: i64) -> Result<Option<Message>> {
        debug!(
            "Retrieving last message for conversation with id {}",
            conversation_id
        );
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLS} FROM messages
                 WHERE conversation_id = ?1 ORDER BY id DESC LIMIT 1"
            );
            let row = conn
                .query_row(&sql, [conversation_id], map_message_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn edit_message(&self, id: i64, patch: &MessagePatch) -> Result<Message> {
        let message = self.with_conn_mut(|conn| {
            let mut message =
                query_message(conn, id)?.with_context(|| format!("message {} not found", id))?;

            if let Some(role) = &patch.role {
                message.role = role.clone();
            }
            if let Some(body) = &patch.body {
                message.body = body.clone();
            }
            if let Some(message_type) = &patch.message_type {
                message.message_type = message_type.clone();
            }
            if let Some(message_metadata) = &patch.message_metadata {
                message.message_metadata = message_metadata.clone();
            }
            if let Some(model) = &patch.model {
                message.model = model.clone();
            }
            if let Some(provider) = &patch.provider {
                message.provider = provider.clone();
            }
            if let Some(preset) = &patch.preset {
                message.preset = preset.clone();
            }

            conn.execute(
                "UPDATE messages SET role = ?1, body = ?2, message_type = ?3,
                     message_metadata = ?4, model = ?5, provider = ?6, preset = ?7
                 WHERE id = ?8",
                params![
                    message.role,
                    message.body,
                    message.message_type,
                    message.message_metadata,
                    message.model,
                    message.provider,
                    message.preset,
                    id,
                ],
            )?;
            Ok(message)
        })?;

        info!("Edited message with id {}", id);
        Ok(message)
    }

    pub fn delete_message(&self, id: i64) -> Result<()> {
        let n = self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM messages WHERE id = ?1", [id])?)
        })?;
        if n == 0 {
            bail!("message {} not found", id);
        }
        info!("Deleted message with id {}", id);
        Ok(())
    }
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<Message>> {
    let sql = format!("SELECT {MESSAGE_COLS} FROM messages WHERE id = ?1");
    let row = conn.query_row(&sql, [id], map_message_row).optional()?;
    Ok(row)
}

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let created: String = row.get(9)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: row.get(2)?,
        body: row.get(3)?,
        message_type: row.get(4)?,
        message_metadata: row.get(5)?,
        model: row.get(6)?,
        provider: row.get(7)?,
        preset: row.get(8)?,
        created_time: parse_ts(9, &created)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::models::NewUser;

    fn seed_conversation(db: &Database) -> i64 {
        let user = db
            .add_user(&NewUser {
                username: "alice".to_string(),
                password: None,
                email: None,
                default_preset: "default".to_string(),
                preferences: None,
            })
            .unwrap();
        db.add_conversation(user.id, Some("chat"), false).unwrap().id
    }

    fn message(body: &str) -> NewMessage {
        NewMessage {
            role: "user".to_string(),
            body: body.to_string(),
            message_type: "content".to_string(),
            message_metadata: None,
            model: "gpt-4o".to_string(),
            provider: "openai".to_string(),
            preset: "default".to_string(),
        }
    }

    #[test]
    fn last_message_of_empty_conversation_is_none() {
        let db = Database::open_in_memory().unwrap();
        let conversation_id = seed_conversation(&db);
        assert!(db.get_last_message(conversation_id).unwrap().is_none());
    }

    #[test]
    fn last_message_is_highest_id() {
        let db = Database::open_in_memory().unwrap();
        let conversation_id = seed_conversation(&db);

        db.add_message(conversation_id, &message("first")).unwrap();
        let second = db.add_message(conversation_id, &message("second")).unwrap();

        let last = db.get_last_message(conversation_id).unwrap().unwrap();
        assert_eq!(last.id, second.id);
        assert_eq!(last.body, "second");
    }

    #[test]
    fn message_requires_existing_conversation() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.add_message(42, &message("orphan")).is_err());
    }
}

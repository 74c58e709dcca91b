use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use parley_types::models::Conversation;
use parley_types::patch::ConversationPatch;

use super::{limit_offset, parse_ts};
use crate::{DEFAULT_HISTORY_LIMIT, Database};

const CONVERSATION_COLS: &str = "id, user_id, title, created_time, updated_time, hidden";

impl Database {
    pub fn add_conversation(
        &self,
        user_id: i64,
        title: Option<&str>,
        hidden: bool,
    ) -> Result<Conversation> {
        let now = Utc::now();
        let id = self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO conversations (user_id, title, created_time, updated_time, hidden)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user_id, title, now.to_rfc3339(), now.to_rfc3339(), hidden],
            )
            .with_context(|| format!("inserting conversation for user {}", user_id))?;
            Ok(conn.last_insert_rowid())
        })?;

        info!("Added conversation {} for user {}", id, user_id);
        Ok(Conversation {
            id,
            user_id,
            title: title.map(str::to_string),
            created_time: now,
            updated_time: now,
            hidden,
        })
    }

    pub fn get_conversation(&self, id: i64) -> Result<Option<Conversation>> {
        debug!("Retrieving conversation with id {}", id);
        self.with_conn(|conn| query_conversation(conn, id))
    }

    /// A user's conversations ordered by id, most recent first when
    /// `order_desc` is set.
    pub fn get_conversations(
        &self,
        user_id: i64,
        limit: Option<u32>,
        offset: Option<u32>,
        order_desc: bool,
    ) -> Result<Vec<Conversation>> {
        debug!("Retrieving conversations for user with id {}", user_id);
        self.with_conn(|conn| {
            let order = if order_desc { "DESC" } else { "ASC" };
            let sql = format!(
                "SELECT {CONVERSATION_COLS} FROM conversations
                 WHERE user_id = ?1 ORDER BY id {order}{}",
                limit_offset(limit, offset)
            );
            let mut stmt = conn.prepare(&sql)?;
            let conversations = stmt
                .query_map([user_id], map_conversation_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(conversations)
        })
    }

    /// The default history window: latest [`DEFAULT_HISTORY_LIMIT`]
    /// conversations, newest first.
    pub fn get_recent_conversations(&self, user_id: i64) -> Result<Vec<Conversation>> {
        self.get_conversations(user_id, Some(DEFAULT_HISTORY_LIMIT), None, true)
    }

    pub fn edit_conversation(&self, id: i64, patch: &ConversationPatch) -> Result<Conversation> {
        let conversation = self.with_conn_mut(|conn| {
            let mut conversation = query_conversation(conn, id)?
                .with_context(|| format!("conversation {} not found", id))?;

            if let Some(title) = &patch.title {
                conversation.title = title.clone();
            }
            if let Some(hidden) = patch.hidden {
                conversation.hidden = hidden;
            }

            conn.execute(
                "UPDATE conversations SET title = ?1, hidden = ?2 WHERE id = ?3",
                params![conversation.title, conversation.hidden, id],
            )?;
            Ok(conversation)
        })?;

        info!("Edited conversation with id {}", id);
        Ok(conversation)
    }

    /// Cascades to the conversation's messages.
    pub fn delete_conversation(&self, id: i64) -> Result<()> {
        let n = self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM conversations WHERE id = ?1", [id])?)
        })?;
        if n == 0 {
            bail!("conversation {} not found", id);
        }
        info!("Deleted conversation with id {}", id);
        Ok(())
    }
}

fn query_conversation(conn: &Connection, id: i64) -> Result<Option<Conversation>> {
    let sql = format!("SELECT {CONVERSATION_COLS} FROM conversations WHERE id = ?1");
    let row = conn
        .query_row(&sql, [id], map_conversation_row)
        .optional()?;
    Ok(row)
}

fn map_conversation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let created: String = row.get(3)?;
    let updated: String = row.get(4)?;
    Ok(Conversation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        created_time: parse_ts(3, &created)?,
        updated_time: parse_ts(4, &updated)?,
        hidden: row.get(5)?,
    })
}

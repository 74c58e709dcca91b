use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            username        TEXT NOT NULL UNIQUE,
            password        TEXT,
            email           TEXT UNIQUE,
            default_preset  TEXT NOT NULL,
            created_time    TEXT NOT NULL,
            last_login_time TEXT,
            preferences     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_users_username
            ON users(username);
        CREATE INDEX IF NOT EXISTS idx_users_email
            ON users(email);
        CREATE INDEX IF NOT EXISTS idx_users_created_time
            ON users(created_time);
        CREATE INDEX IF NOT EXISTS idx_users_last_login_time
            ON users(last_login_time);

        CREATE TABLE IF NOT EXISTS conversations (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id         INTEGER NOT NULL
                            REFERENCES users(id) ON DELETE CASCADE,
            title           TEXT,
            created_time    TEXT NOT NULL,
            updated_time    TEXT NOT NULL,
            hidden          INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_user
            ON conversations(user_id);
        CREATE INDEX IF NOT EXISTS idx_conversations_created_time
            ON conversations(created_time);
        CREATE INDEX IF NOT EXISTS idx_conversations_updated_time
            ON conversations(updated_time);
        CREATE INDEX IF NOT EXISTS idx_conversations_hidden
            ON conversations(hidden);

        CREATE TABLE IF NOT EXISTS messages (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id  INTEGER NOT NULL
                             REFERENCES conversations(id) ON DELETE CASCADE,
            role             TEXT NOT NULL,
            body             TEXT NOT NULL,
            message_type     TEXT NOT NULL,
            message_metadata TEXT,
            model            TEXT NOT NULL,
            provider         TEXT NOT NULL,
            preset           TEXT NOT NULL,
            created_time     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id);
        CREATE INDEX IF NOT EXISTS idx_messages_created_time
            ON messages(created_time);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}

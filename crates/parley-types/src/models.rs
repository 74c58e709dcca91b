use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: Option<String>,
    pub email: Option<String>,
    pub default_preset: String,
    pub created_time: DateTime<Utc>,
    pub last_login_time: Option<DateTime<Utc>>,
    /// Free-form per-user settings blob, stored as JSON text.
    pub preferences: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub user_id: i64,
    pub title: Option<String>,
    pub created_time: DateTime<Utc>,
    /// Refreshed whenever a message is added to the conversation.
    pub updated_time: DateTime<Utc>,
    pub hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub role: String,
    pub body: String,
    pub message_type: String,
    pub message_metadata: Option<String>,
    pub model: String,
    pub provider: String,
    pub preset: String,
    pub created_time: DateTime<Utc>,
}

/// Fields supplied by the caller when creating a user. Timestamps are set
/// by the store at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: Option<String>,
    pub email: Option<String>,
    pub default_preset: String,
    /// Defaults to an empty JSON object when omitted.
    pub preferences: Option<serde_json::Value>,
}

/// Fields supplied by the caller when appending a message to a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: String,
    pub body: String,
    pub message_type: String,
    pub message_metadata: Option<String>,
    pub model: String,
    pub provider: String,
    pub preset: String,
}

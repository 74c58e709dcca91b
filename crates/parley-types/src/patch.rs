//! Partial-update types applied by the store's `edit_*` operations.
//!
//! `None` fields are left unchanged. For nullable columns the field is a
//! nested `Option`: `Some(None)` clears the column, `Some(Some(v))` sets it.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub password: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub default_preset: Option<String>,
    pub last_login_time: Option<Option<DateTime<Utc>>>,
    pub preferences: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct ConversationPatch {
    pub title: Option<Option<String>>,
    pub hidden: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub role: Option<String>,
    pub body: Option<String>,
    pub message_type: Option<String>,
    pub message_metadata: Option<Option<String>>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub preset: Option<String>,
}

//! Chat message persistence.
//!
//! The store owns messages once appended; they are immutable from then
//! on. Listing returns creation-time order with insertion order breaking
//! ties.

use sqlx::SqlitePool;

/// Message role in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    User,
    Assistant,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageKind::User),
            "assistant" => Some(MessageKind::Assistant),
            _ => None,
        }
    }
}

/// A persisted chat message row.
#[derive(Debug, sqlx::FromRow)]
pub struct StoredMessage {
    /// Caller-supplied unique id.
    pub message_id: String,
    pub content: String,
    pub kind: String,
}

/// A message to append, before it has a timestamp.
#[derive(Debug)]
pub struct NewMessage {
    pub message_id: String,
    pub content: String,
    pub kind: MessageKind,
}

/// Handle to the chat history table.
///
/// Holds the injected pool handle; constructed once at startup and passed
/// down, so tests can supply an in-memory pool.
#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List all messages ordered by creation time ascending, ties broken
    /// by insertion order.
    pub async fn list(&self) -> Result<Vec<StoredMessage>, sqlx::Error> {
        sqlx::query_as::<_, StoredMessage>(
            "SELECT message_id, content, kind FROM messages ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Append one message. Fails if `message_id` already exists.
    pub async fn append(&self, message: NewMessage) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO messages (message_id, content, kind, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&message.message_id)
        .bind(&message.content)
        .bind(message.kind.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips() {
        assert_eq!(MessageKind::parse("user"), Some(MessageKind::User));
        assert_eq!(MessageKind::parse("assistant"), Some(MessageKind::Assistant));
        assert_eq!(MessageKind::parse("system"), None);
        assert_eq!(MessageKind::User.as_str(), "user");
        assert_eq!(MessageKind::Assistant.as_str(), "assistant");
    }
}

//! `Database` trait: single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DatabaseError;

/// A conversation message from the database.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub role: String,
    /// Plain text as the model sees it.
    pub content: String,
    /// Structured chat payload, when the message has one.
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic database trait for conversations.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Ensure a conversation exists, creating it if needed.
    async fn ensure_conversation(
        &self,
        conversation_id: Uuid,
        channel: &str,
        user_id: &str,
    ) -> Result<(), DatabaseError>;

    async fn conversation_exists(&self, conversation_id: Uuid) -> Result<bool, DatabaseError>;

    /// Add a message to a conversation and return it as stored.
    async fn add_conversation_message(
        &self,
        conversation_id: Uuid,
        role: &str,
        content: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<ConversationMessage, DatabaseError>;

    /// List messages in a conversation, oldest first.
    async fn list_conversation_messages(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<ConversationMessage>, DatabaseError>;

    /// Get conversation metadata as JSON. `None` if the conversation is unknown.
    async fn get_conversation_metadata(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<serde_json::Value>, DatabaseError>;

    /// Update a single field in conversation metadata.
    async fn update_conversation_metadata_field(
        &self,
        conversation_id: Uuid,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError>;
}

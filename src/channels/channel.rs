//! Channel trait and the message types that cross it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ChannelError;
use crate::onboarding::message::{InboundPayload, OutboundMessage};
use crate::store::ConversationMessage;

/// A message received from a user on some channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Unique message ID.
    pub id: Uuid,
    /// Channel this message came from.
    pub channel: String,
    /// Conversation the message belongs to.
    pub conversation_id: Uuid,
    /// User identifier within the channel.
    pub user_id: String,
    pub payload: InboundPayload,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(
        channel: impl Into<String>,
        conversation_id: Uuid,
        user_id: impl Into<String>,
        payload: InboundPayload,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            conversation_id,
            user_id: user_id.into(),
            payload,
            received_at: Utc::now(),
        }
    }
}

/// A stored message on its way out to a client.
///
/// Covers both bot messages and echoes of what the user sent, so clients
/// can render the full conversation from one event stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub is_bot: bool,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl OutgoingMessage {
    /// Build from a persisted message. Rows without a structured payload
    /// go out as plain text.
    pub fn from_stored(conversation_id: Uuid, stored: &ConversationMessage) -> Self {
        let payload = stored.payload.clone().unwrap_or_else(|| {
            serde_json::to_value(OutboundMessage::text(&stored.content)).unwrap_or_default()
        });
        Self {
            id: stored.id,
            conversation_id,
            is_bot: stored.role == "assistant",
            payload,
            created_at: stored.created_at,
        }
    }

    /// A bot message that was never persisted.
    pub fn ephemeral(conversation_id: Uuid, message: &OutboundMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            is_bot: true,
            payload: serde_json::to_value(message).unwrap_or_default(),
            created_at: Utc::now(),
        }
    }

    /// The bot message this carries, if it is one.
    pub fn bot_message(&self) -> Option<OutboundMessage> {
        if !self.is_bot {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}

/// Stream of incoming messages from a channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A source of user messages and a sink for replies.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name, used to route replies back.
    fn name(&self) -> &str;

    /// Start receiving messages. Can only be called once.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Deliver a message to the client holding `message.conversation_id`.
    async fn send(&self, message: &OutgoingMessage) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::message::ChoiceOption;

    fn stored(role: &str, payload: Option<serde_json::Value>) -> ConversationMessage {
        ConversationMessage {
            id: Uuid::new_v4(),
            role: role.to_string(),
            content: "hello".to_string(),
            payload,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn bot_rows_carry_their_payload() {
        let choice = OutboundMessage::choice("Pick one", vec![ChoiceOption::new("A", "a")]);
        let row = stored("assistant", Some(serde_json::to_value(&choice).unwrap()));
        let out = OutgoingMessage::from_stored(Uuid::new_v4(), &row);
        assert!(out.is_bot);
        assert_eq!(out.bot_message(), Some(choice));
    }

    #[test]
    fn user_rows_are_not_bot_messages() {
        let row = stored("user", None);
        let out = OutgoingMessage::from_stored(Uuid::new_v4(), &row);
        assert!(!out.is_bot);
        assert_eq!(out.payload["text"], "hello");
        assert!(out.bot_message().is_none());
    }

    #[test]
    fn wire_shape() {
        let id = Uuid::new_v4();
        let out = OutgoingMessage::ephemeral(id, &OutboundMessage::text("hi"));
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["conversation_id"], id.to_string());
        assert_eq!(json["is_bot"], true);
        assert_eq!(json["payload"]["type"], "text");
        assert!(json["created_at"].is_string());
    }
}

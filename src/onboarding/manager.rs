//! OnboardingManager: connects the dialogue engine to storage.
//!
//! The engine is pure; this is where its commands become metadata writes
//! and persisted assistant messages.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::channels::{IncomingMessage, OutgoingMessage};
use crate::error::{DatabaseError, Error, OnboardingError};
use crate::llm::{ChatMessage, Role};
use crate::store::{ConversationMessage, Database};

use super::engine::{Command, DialogueEngine, TurnEnd};
use super::message::OutboundMessage;
use super::state::{ConversationState, Phase};

/// Conversation metadata key holding the onboarding state.
pub const STATE_KEY: &str = "onboarding";

/// Snapshot of one conversation's onboarding progress.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingStatus {
    pub conversation_id: Uuid,
    pub phase: Phase,
    pub extracted: serde_json::Value,
}

pub struct OnboardingManager {
    db: Arc<dyn Database>,
    engine: DialogueEngine,
}

impl OnboardingManager {
    pub fn new(db: Arc<dyn Database>, engine: DialogueEngine) -> Self {
        Self { db, engine }
    }

    /// Persist an inbound message and run a turn. Returns the bot messages
    /// in send order.
    pub async fn handle_inbound(
        &self,
        message: &IncomingMessage,
    ) -> Result<Vec<OutboundMessage>, Error> {
        self.record_inbound(message).await?;
        let mut delivered = Vec::new();
        self.respond(message.conversation_id, &mut delivered).await?;
        Ok(delivered.iter().filter_map(|m| m.bot_message()).collect())
    }

    /// Store the user's message, creating the conversation and its initial
    /// state on first contact. Returns the stored message for echoing.
    pub async fn record_inbound(&self, message: &IncomingMessage) -> Result<OutgoingMessage, Error> {
        let conversation_id = message.conversation_id;
        self.db
            .ensure_conversation(conversation_id, &message.channel, &message.user_id)
            .await?;

        // Unreadable metadata is left alone so the turn can suspend on it.
        match self.metadata(conversation_id).await {
            Ok(metadata) if stored_state(metadata.as_ref()).is_none() => {
                self.commit(conversation_id, &ConversationState::default())
                    .await?;
            }
            Ok(_) | Err(Error::Onboarding(OnboardingError::CorruptState { .. })) => {}
            Err(e) => return Err(e),
        }

        let payload = serde_json::to_value(&message.payload)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let stored = self
            .db
            .add_conversation_message(
                conversation_id,
                Role::User.as_str(),
                &message.payload.transcript_text(),
                Some(&payload),
            )
            .await?;

        tracing::debug!(
            %conversation_id,
            channel = %message.channel,
            inbound_id = %message.id,
            latency_ms = (stored.created_at - message.received_at).num_milliseconds(),
            "Inbound message stored"
        );
        Ok(OutgoingMessage::from_stored(conversation_id, &stored))
    }

    /// Run one engine turn over the stored transcript and apply its commands.
    ///
    /// Every message persisted during the turn is pushed to `delivered`,
    /// including those produced before a model failure. The failure is then
    /// returned as `Error::Llm`.
    pub async fn respond(
        &self,
        conversation_id: Uuid,
        delivered: &mut Vec<OutgoingMessage>,
    ) -> Result<(), Error> {
        let metadata = match self.metadata(conversation_id).await {
            Ok(metadata) => metadata,
            Err(Error::Onboarding(e @ OnboardingError::CorruptState { .. })) => {
                tracing::warn!(
                    %conversation_id,
                    "Conversation suspended until its onboarding state is reset: {}",
                    e
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let stored = stored_state(metadata.as_ref());
        let transcript = self.transcript(conversation_id).await?;

        let turn = self.engine.handle(stored, transcript).await;

        for command in turn.commands {
            match command {
                Command::Commit(state) => self.commit(conversation_id, &state).await?,
                Command::Send(message) => {
                    let payload = serde_json::to_value(&message)
                        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
                    let stored = self
                        .db
                        .add_conversation_message(
                            conversation_id,
                            Role::Assistant.as_str(),
                            &message.transcript_text(),
                            Some(&payload),
                        )
                        .await?;
                    delivered.push(OutgoingMessage::from_stored(conversation_id, &stored));
                }
            }
        }

        match turn.end {
            TurnEnd::ModelFailed(e) => Err(e.into()),
            TurnEnd::CorruptState | TurnEnd::TransitionLimit => {
                tracing::warn!(
                    %conversation_id,
                    "Conversation suspended until its onboarding state is reset"
                );
                Ok(())
            }
            TurnEnd::AwaitingUser | TurnEnd::Responded | TurnEnd::ContractViolation => Ok(()),
        }
    }

    /// Current onboarding progress. `None` when the conversation has no state.
    pub async fn status(&self, conversation_id: Uuid) -> Result<Option<OnboardingStatus>, Error> {
        let metadata = self.metadata(conversation_id).await?;
        let Some(raw) = stored_state(metadata.as_ref()) else {
            return Ok(None);
        };
        let state = ConversationState::decode(Some(raw))?;
        Ok(Some(OnboardingStatus {
            conversation_id,
            phase: state.phase,
            extracted: state.extracted,
        }))
    }

    /// Put a conversation back at the initial phase, clearing what was
    /// collected. Also recovers conversations with corrupt state.
    pub async fn reset(&self, conversation_id: Uuid) -> Result<OnboardingStatus, Error> {
        let state = ConversationState::default();
        self.commit(conversation_id, &state).await?;
        tracing::info!(%conversation_id, "Onboarding state reset");
        Ok(OnboardingStatus {
            conversation_id,
            phase: state.phase,
            extracted: state.extracted,
        })
    }

    /// Stored messages, oldest first. Errors with `NotFound` for unknown
    /// conversations.
    pub async fn history(&self, conversation_id: Uuid) -> Result<Vec<ConversationMessage>, Error> {
        if !self.db.conversation_exists(conversation_id).await? {
            return Err(DatabaseError::NotFound {
                entity: "conversation".to_string(),
                id: conversation_id.to_string(),
            }
            .into());
        }
        Ok(self.db.list_conversation_messages(conversation_id).await?)
    }

    /// Conversation metadata. A column that does not parse is reported as
    /// corrupt onboarding state.
    async fn metadata(&self, conversation_id: Uuid) -> Result<Option<serde_json::Value>, Error> {
        match self.db.get_conversation_metadata(conversation_id).await {
            Err(DatabaseError::Serialization(raw)) => {
                Err(OnboardingError::CorruptState { raw }.into())
            }
            other => Ok(other?),
        }
    }

    async fn transcript(&self, conversation_id: Uuid) -> Result<Vec<ChatMessage>, Error> {
        let messages = self.db.list_conversation_messages(conversation_id).await?;
        Ok(messages
            .into_iter()
            .filter_map(|m| match Role::from_db(&m.role) {
                Some(Role::User) => Some(ChatMessage::user(m.content)),
                Some(Role::Assistant) => Some(ChatMessage::assistant(m.content)),
                _ => None,
            })
            .collect())
    }

    async fn commit(&self, conversation_id: Uuid, state: &ConversationState) -> Result<(), Error> {
        let value = serde_json::to_value(state)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.db
            .update_conversation_metadata_field(conversation_id, STATE_KEY, &value)
            .await?;
        Ok(())
    }
}

fn stored_state(metadata: Option<&serde_json::Value>) -> Option<&serde_json::Value> {
    metadata
        .and_then(|m| m.get(STATE_KEY))
        .filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::onboarding::execution::{Execution, ExitSelection};
    use crate::onboarding::exits;
    use crate::onboarding::message::InboundPayload;
    use crate::onboarding::testing::ScriptedExecutor;
    use crate::store::LibSqlBackend;

    async fn setup(executor: Arc<ScriptedExecutor>) -> (OnboardingManager, Arc<dyn Database>) {
        let (manager, db) = setup_backend(executor).await;
        (manager, db as Arc<dyn Database>)
    }

    async fn setup_backend(
        executor: Arc<ScriptedExecutor>,
    ) -> (OnboardingManager, Arc<LibSqlBackend>) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let manager = OnboardingManager::new(db.clone(), DialogueEngine::new(executor));
        (manager, db)
    }

    fn inbound(conversation_id: Uuid, text: &str) -> IncomingMessage {
        IncomingMessage::new("test", conversation_id, "user-1", InboundPayload::text(text))
    }

    #[tokio::test]
    async fn first_message_creates_state_and_stores_transcript() {
        let executor = Arc::new(ScriptedExecutor::new([Execution::awaiting(vec![
            OutboundMessage::text("Hi! What brings you here?"),
        ])]));
        let (manager, _db) = setup(Arc::clone(&executor)).await;
        let id = Uuid::new_v4();

        let replies = manager.handle_inbound(&inbound(id, "hello")).await.unwrap();
        assert_eq!(replies, vec![OutboundMessage::text("Hi! What brings you here?")]);

        let status = manager.status(id).await.unwrap().unwrap();
        assert_eq!(status.phase, Phase::IntentClassification);

        let history = manager.history(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].role, "assistant");
        assert_eq!(history[1].payload.as_ref().unwrap()["type"], "text");

        // The model saw the user's message.
        let requests = executor.requests();
        assert_eq!(requests[0].transcript.len(), 1);
        assert_eq!(requests[0].transcript[0].content, "hello");
    }

    #[tokio::test]
    async fn transitions_are_committed() {
        let executor = Arc::new(ScriptedExecutor::new([Execution::exited(
            ExitSelection::bare(exits::EXPLORING.name),
        )]));
        let (manager, _db) = setup(executor).await;
        let id = Uuid::new_v4();

        // Exploring ends straight away with its canned intro.
        let replies = manager
            .handle_inbound(&inbound(id, "just looking"))
            .await
            .unwrap();
        assert!(!replies.is_empty());

        let status = manager.status(id).await.unwrap().unwrap();
        assert_eq!(status.phase, Phase::Exploring);
    }

    #[tokio::test]
    async fn transcript_includes_previous_turns() {
        let executor = Arc::new(ScriptedExecutor::new([
            Execution::awaiting(vec![OutboundMessage::text("What describes you?")]),
            Execution::awaiting(vec![OutboundMessage::text("Tell me more.")]),
        ]));
        let (manager, _db) = setup(Arc::clone(&executor)).await;
        let id = Uuid::new_v4();

        manager.handle_inbound(&inbound(id, "hi")).await.unwrap();
        manager
            .handle_inbound(&inbound(id, "I have a use case"))
            .await
            .unwrap();

        let requests = executor.requests();
        let contents: Vec<&str> = requests[1]
            .transcript
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["hi", "What describes you?", "I have a use case"]);
        assert_eq!(requests[1].transcript[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn model_failure_surfaces_after_persisting() {
        let executor = Arc::new(ScriptedExecutor::default());
        executor.push(Err(LlmError::RequestFailed {
            provider: "test".into(),
            reason: "boom".into(),
        }));
        let (manager, _db) = setup(executor).await;
        let id = Uuid::new_v4();

        let mut delivered = Vec::new();
        let echo = manager.record_inbound(&inbound(id, "hi")).await.unwrap();
        assert!(!echo.is_bot);
        let err = manager.respond(id, &mut delivered).await.unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
        assert!(delivered.is_empty());

        // The user's message is still there for the next attempt.
        assert_eq!(manager.history(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_state_is_silent_until_reset() {
        let executor = Arc::new(ScriptedExecutor::new([Execution::awaiting(vec![
            OutboundMessage::text("Welcome back"),
        ])]));
        let (manager, db) = setup(Arc::clone(&executor)).await;
        let id = Uuid::new_v4();
        db.ensure_conversation(id, "test", "user-1").await.unwrap();
        db.update_conversation_metadata_field(id, STATE_KEY, &serde_json::json!({"phase": "nope"}))
            .await
            .unwrap();

        let replies = manager.handle_inbound(&inbound(id, "hello?")).await.unwrap();
        assert!(replies.is_empty());
        assert!(executor.requests().is_empty());
        assert!(matches!(
            manager.status(id).await,
            Err(Error::Onboarding(OnboardingError::CorruptState { .. }))
        ));

        let status = manager.reset(id).await.unwrap();
        assert_eq!(status.phase, Phase::IntentClassification);
        let replies = manager.handle_inbound(&inbound(id, "hello?")).await.unwrap();
        assert_eq!(replies, vec![OutboundMessage::text("Welcome back")]);
    }

    #[tokio::test]
    async fn unreadable_metadata_is_not_overwritten() {
        let executor = Arc::new(ScriptedExecutor::new([Execution::awaiting(vec![
            OutboundMessage::text("Welcome back"),
        ])]));
        let (manager, db) = setup_backend(Arc::clone(&executor)).await;
        let id = Uuid::new_v4();
        db.ensure_conversation(id, "test", "user-1").await.unwrap();
        db.update_conversation_metadata_field(
            id,
            STATE_KEY,
            &serde_json::json!({"phase": "completed"}),
        )
        .await
        .unwrap();
        db.write_raw_metadata(id, "not json{").await;

        let replies = manager.handle_inbound(&inbound(id, "hi")).await.unwrap();
        assert!(replies.is_empty());
        assert!(executor.requests().is_empty());
        assert!(matches!(
            manager.status(id).await,
            Err(Error::Onboarding(OnboardingError::CorruptState { .. }))
        ));
        // Still corrupt: nothing wrote a fresh state over it.
        assert!(matches!(
            db.get_conversation_metadata(id).await,
            Err(DatabaseError::Serialization(_))
        ));
        // The message itself was kept.
        assert_eq!(manager.history(id).await.unwrap().len(), 1);

        let status = manager.reset(id).await.unwrap();
        assert_eq!(status.phase, Phase::IntentClassification);
        let replies = manager.handle_inbound(&inbound(id, "hi")).await.unwrap();
        assert_eq!(replies, vec![OutboundMessage::text("Welcome back")]);
    }

    #[tokio::test]
    async fn unknown_conversations() {
        let (manager, _db) = setup(Arc::new(ScriptedExecutor::default())).await;
        let id = Uuid::new_v4();
        assert!(manager.status(id).await.unwrap().is_none());
        assert!(matches!(
            manager.history(id).await,
            Err(Error::Database(DatabaseError::NotFound { .. }))
        ));
        assert!(matches!(
            manager.reset(id).await,
            Err(Error::Database(DatabaseError::NotFound { .. }))
        ));
    }
}

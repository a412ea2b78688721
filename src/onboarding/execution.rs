//! The delegated model step.
//!
//! A phase hands the model its instructions, its legal exits and the
//! transcript. The model may send messages and may select one exit.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::ChatMessage;

use super::exits::Exit;
use super::message::OutboundMessage;
use super::state::Phase;

/// Input to one execute call.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub phase: Phase,
    pub instructions: String,
    pub exits: &'static [&'static Exit],
    /// User and assistant turns so far, oldest first.
    pub transcript: Vec<ChatMessage>,
}

/// The exit the model selected, with its raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitSelection {
    pub name: String,
    pub payload: serde_json::Value,
}

impl ExitSelection {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// An exit without payload.
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, serde_json::json!({}))
    }
}

/// Result of one execute call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    /// Messages the model sent this turn, in order.
    pub messages: Vec<OutboundMessage>,
    /// `None` means the phase is still waiting on the user.
    pub exit: Option<ExitSelection>,
}

impl Execution {
    pub fn awaiting(messages: Vec<OutboundMessage>) -> Self {
        Self {
            messages,
            exit: None,
        }
    }

    pub fn exited(exit: ExitSelection) -> Self {
        Self {
            messages: Vec::new(),
            exit: Some(exit),
        }
    }
}

/// Runs the model for one phase.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: ExecuteRequest) -> Result<Execution, LlmError>;
}

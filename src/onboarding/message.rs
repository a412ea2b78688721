//! Chat message payloads exchanged with the client.

use serde::{Deserialize, Serialize};

/// One selectable option of a choice widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub label: String,
    pub value: String,
}

impl ChoiceOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A message sent by the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text {
        text: String,
    },
    Choice {
        text: String,
        options: Vec<ChoiceOption>,
    },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn choice(text: impl Into<String>, options: Vec<ChoiceOption>) -> Self {
        Self::Choice {
            text: text.into(),
            options,
        }
    }

    /// How the message reads in the model's transcript.
    pub fn transcript_text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Choice { text, options } => {
                let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
                format!("{text}\n[Options: {}]", labels.join(" | "))
            }
        }
    }
}

/// A message sent by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundPayload {
    Text {
        text: String,
    },
    /// A click on a choice option.
    Choice {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
}

impl InboundPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// How the message reads in the model's transcript. A choice reads as
    /// its label when the client sent one.
    pub fn transcript_text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Choice {
                label: Some(label),
                ..
            } => label.clone(),
            Self::Choice { value, .. } => value.clone(),
        }
    }
}

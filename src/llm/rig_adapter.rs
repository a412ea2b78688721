//! Bridge from rig-core's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{CompletionError, CompletionModel};
use rig::message::{AssistantContent, Message};
use rust_decimal::Decimal;

use crate::error::LlmError;
use crate::llm::costs;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
    ToolCall, ToolCompletionRequest, ToolCompletionResponse, ToolDefinition,
};

/// Anthropic rejects requests without `max_tokens`, so always send one.
const DEFAULT_MAX_TOKENS: u64 = 1024;

/// Wraps any rig completion model.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }

    fn provider_label(&self) -> String {
        if self.model_name.starts_with("claude") {
            "anthropic".to_string()
        } else {
            "openai".to_string()
        }
    }

    async fn send(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<Collected, LlmError> {
        let (preamble, history, prompt) = split_messages(messages);

        let mut builder = self.model.completion_request(prompt).messages(history);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if !tools.is_empty() {
            builder = builder.tools(
                tools
                    .into_iter()
                    .map(|t| rig::completion::ToolDefinition {
                        name: t.name,
                        description: t.description,
                        parameters: t.parameters,
                    })
                    .collect(),
            );
        }
        if let Some(temperature) = temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        builder = builder.max_tokens(max_tokens.map(u64::from).unwrap_or(DEFAULT_MAX_TOKENS));

        let response = builder
            .send()
            .await
            .map_err(|e| map_error(&self.provider_label(), e))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for content in response.choice.iter() {
            match content {
                AssistantContent::Text(t) => {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&t.text);
                }
                AssistantContent::ToolCall(call) => tool_calls.push(ToolCall {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments: call.function.arguments.clone(),
                }),
                _ => {}
            }
        }

        Ok(Collected {
            text,
            tool_calls,
            input_tokens: u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX),
            output_tokens: u32::try_from(response.usage.output_tokens).unwrap_or(u32::MAX),
        })
    }
}

struct Collected {
    text: String,
    tool_calls: Vec<ToolCall>,
    input_tokens: u32,
    output_tokens: u32,
}

/// Split our flat message list into (preamble, history, prompt).
///
/// rig takes the newest user turn as the prompt; system messages become the
/// preamble. If the transcript ends on an assistant turn a short nudge is
/// used as the prompt instead.
fn split_messages(messages: Vec<ChatMessage>) -> (Option<String>, Vec<Message>, Message) {
    let mut system = Vec::new();
    let mut turns = Vec::new();
    for msg in messages {
        match msg.role {
            Role::System => system.push(msg.content),
            Role::User | Role::Assistant => turns.push(msg),
        }
    }

    let prompt = match turns.last() {
        Some(last) if last.role == Role::User => {
            let last = turns.pop().map(|m| m.content).unwrap_or_default();
            Message::user(last)
        }
        _ => Message::user("(continue)"),
    };

    let history = turns
        .into_iter()
        .map(|m| match m.role {
            Role::Assistant => Message::assistant(m.content),
            _ => Message::user(m.content),
        })
        .collect();

    let preamble = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };

    (preamble, history, prompt)
}

fn map_error(provider: &str, err: CompletionError) -> LlmError {
    let reason = err.to_string();
    let lower = reason.to_lowercase();
    if lower.contains("429") || lower.contains("rate limit") {
        LlmError::RateLimited {
            provider: provider.to_string(),
            retry_after: None,
        }
    } else if lower.contains("401") || lower.contains("unauthorized") {
        LlmError::AuthFailed {
            provider: provider.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason,
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        costs::model_cost(&self.model_name)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let collected = self
            .send(
                request.messages,
                Vec::new(),
                request.max_tokens,
                request.temperature,
            )
            .await?;
        Ok(CompletionResponse {
            content: collected.text,
            input_tokens: collected.input_tokens,
            output_tokens: collected.output_tokens,
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        let collected = self
            .send(
                request.messages,
                request.tools,
                request.max_tokens,
                request.temperature,
            )
            .await?;
        let finish_reason = if collected.tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolUse
        };
        Ok(ToolCompletionResponse {
            content: (!collected.text.trim().is_empty()).then_some(collected.text),
            tool_calls: collected.tool_calls,
            input_tokens: collected.input_tokens,
            output_tokens: collected.output_tokens,
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_uses_last_user_turn_as_prompt() {
        let (preamble, history, prompt) = split_messages(vec![
            ChatMessage::system("be nice"),
            ChatMessage::assistant("Hi!"),
            ChatMessage::user("I have a use case"),
        ]);
        assert_eq!(preamble.as_deref(), Some("be nice"));
        assert_eq!(history.len(), 1);
        assert_eq!(
            serde_json::to_value(&prompt).unwrap(),
            serde_json::to_value(Message::user("I have a use case")).unwrap()
        );
    }

    #[test]
    fn split_nudges_when_transcript_ends_on_assistant() {
        let (preamble, history, prompt) = split_messages(vec![
            ChatMessage::user("hello"),
            ChatMessage::assistant("What describes you best?"),
        ]);
        assert!(preamble.is_none());
        assert_eq!(history.len(), 2);
        assert_eq!(
            serde_json::to_value(&prompt).unwrap(),
            serde_json::to_value(Message::user("(continue)")).unwrap()
        );
    }
}

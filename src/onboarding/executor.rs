//! `LlmExecutor`: runs a phase through an `LlmProvider` with tool calling.
//!
//! Each exit is offered as a tool. One extra tool, `send_choice`, lets the
//! model show a choice widget. Plain text content becomes a text message.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::LlmError;
use crate::llm::{ChatMessage, LlmProvider, ToolCall, ToolCompletionRequest, ToolDefinition, costs};

use super::execution::{ExecuteRequest, Execution, ExitSelection, Executor};
use super::message::{ChoiceOption, OutboundMessage};

pub const SEND_CHOICE_TOOL: &str = "send_choice";

const MAX_TOKENS: u32 = 1024;
const TEMPERATURE: f32 = 0.3;

#[derive(Debug, Deserialize)]
struct ChoiceArgs {
    text: String,
    options: Vec<ChoiceOption>,
}

fn send_choice_tool() -> ToolDefinition {
    ToolDefinition {
        name: SEND_CHOICE_TOOL.to_string(),
        description: "Show the user a question with clickable options. The question text is \
                      displayed above the options; do not repeat it in a text message."
            .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The question shown above the options"
                },
                "options": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "label": { "type": "string" },
                            "value": { "type": "string" }
                        },
                        "required": ["label", "value"]
                    }
                }
            },
            "required": ["text", "options"]
        }),
    }
}

/// Some backends hand tool arguments back as a JSON string.
fn arguments_value(call: &ToolCall) -> serde_json::Value {
    match &call.arguments {
        serde_json::Value::String(raw) => {
            serde_json::from_str(raw).unwrap_or_else(|_| call.arguments.clone())
        }
        other => other.clone(),
    }
}

/// Executor backed by a real model.
pub struct LlmExecutor {
    llm: Arc<dyn LlmProvider>,
}

impl LlmExecutor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Executor for LlmExecutor {
    async fn execute(&self, request: ExecuteRequest) -> Result<Execution, LlmError> {
        let mut messages = vec![ChatMessage::system(&request.instructions)];
        messages.extend(request.transcript);

        let mut tools: Vec<ToolDefinition> = request
            .exits
            .iter()
            .map(|exit| ToolDefinition {
                name: exit.name.to_string(),
                description: exit.description.to_string(),
                parameters: exit.parameters(),
            })
            .collect();
        tools.push(send_choice_tool());

        let mut tool_request = ToolCompletionRequest::new(messages, tools)
            .with_max_tokens(MAX_TOKENS)
            .with_temperature(TEMPERATURE);
        tool_request.metadata = HashMap::from([("phase".to_string(), request.phase.to_string())]);

        let response = self.llm.complete_with_tools(tool_request).await?;

        let cost = costs::estimate(
            self.llm.model_name(),
            response.input_tokens,
            response.output_tokens,
        );
        tracing::info!(
            phase = %request.phase,
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cost_usd = %cost,
            tool_calls = response.tool_calls.len(),
            "Execute call finished"
        );

        let mut execution = Execution::default();
        if let Some(text) = response.content {
            let text = text.trim();
            if !text.is_empty() {
                execution.messages.push(OutboundMessage::text(text));
            }
        }

        for call in &response.tool_calls {
            let args = arguments_value(call);
            if call.name == SEND_CHOICE_TOOL {
                match serde_json::from_value::<ChoiceArgs>(args) {
                    Ok(choice) => execution
                        .messages
                        .push(OutboundMessage::choice(choice.text, choice.options)),
                    Err(e) => {
                        tracing::warn!(phase = %request.phase, "Malformed send_choice call: {}", e);
                    }
                }
                continue;
            }

            // Anything else is an exit attempt. Undeclared names are passed
            // through so the phase handler can reject them.
            if let Some(ref first) = execution.exit {
                tracing::warn!(
                    phase = %request.phase,
                    kept = %first.name,
                    ignored = %call.name,
                    "Model selected more than one exit; keeping the first"
                );
                continue;
            }
            execution.exit = Some(ExitSelection::new(call.name.clone(), args));
        }

        Ok(execution)
    }
}

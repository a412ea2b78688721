//! CLI channel: stdin/stdout REPL for local testing.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingMessage};
use crate::error::ChannelError;
use crate::onboarding::markers::render_plain;
use crate::onboarding::message::{ChoiceOption, InboundPayload, OutboundMessage};

/// A CLI channel that reads from stdin and writes to stdout.
///
/// The whole process is one conversation. Typing the number of an option
/// from the last choice shown picks that option.
pub struct CliChannel {
    conversation_id: Uuid,
    last_options: Arc<Mutex<Vec<ChoiceOption>>>,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            conversation_id: Uuid::new_v4(),
            last_options: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a typed line into a payload, resolving option numbers.
fn parse_line(line: &str, options: &[ChoiceOption]) -> InboundPayload {
    if let Ok(n) = line.parse::<usize>() {
        if let Some(option) = n.checked_sub(1).and_then(|i| options.get(i)) {
            return InboundPayload::Choice {
                value: option.value.clone(),
                label: Some(option.label.clone()),
            };
        }
    }
    InboundPayload::text(line)
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let conversation_id = self.conversation_id;
        let last_options = Arc::clone(&self.last_options);

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            // Print prompt
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let payload = {
                            let options = last_options.lock().unwrap_or_else(|e| e.into_inner());
                            parse_line(&line, &options)
                        };
                        let msg = IncomingMessage::new("cli", conversation_id, "local-user", payload);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), ChannelError> {
        // The user already sees what they typed.
        let Some(bot) = message.bot_message() else {
            return Ok(());
        };

        if let OutboundMessage::Choice { options, .. } = &bot {
            *self.last_options.lock().unwrap_or_else(|e| e.into_inner()) = options.clone();
        }

        println!("\n{}\n", render_plain(&bot));
        eprint!("> ");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<ChoiceOption> {
        vec![
            ChoiceOption::new("I'm exploring", "exploring"),
            ChoiceOption::new("I have a use case", "use_case"),
        ]
    }

    #[test]
    fn numbers_pick_options() {
        assert_eq!(
            parse_line("2", &options()),
            InboundPayload::Choice {
                value: "use_case".into(),
                label: Some("I have a use case".into()),
            }
        );
    }

    #[test]
    fn out_of_range_numbers_stay_text() {
        assert_eq!(parse_line("0", &options()), InboundPayload::text("0"));
        assert_eq!(parse_line("3", &options()), InboundPayload::text("3"));
        assert_eq!(parse_line("1", &[]), InboundPayload::text("1"));
    }

    #[test]
    fn words_stay_text() {
        assert_eq!(
            parse_line("we have 50 people", &options()),
            InboundPayload::text("we have 50 people")
        );
    }

    #[tokio::test]
    async fn choices_are_remembered() {
        let channel = CliChannel::new();
        let choice = OutboundMessage::choice("Pick", options());
        channel
            .send(&OutgoingMessage::ephemeral(channel.conversation_id(), &choice))
            .await
            .unwrap();
        assert_eq!(channel.last_options.lock().unwrap().len(), 2);
    }
}

//! Main agent loop: reads every channel and dispatches messages to one
//! worker task per conversation.
//!
//! A worker handles its conversation's messages strictly in arrival order.
//! Different conversations run concurrently. A worker that sits idle for
//! `conversation_idle_timeout` closes its queue, drains what is left and
//! exits; the next message for that conversation starts a fresh worker
//! that waits for the old one before touching the conversation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::channels::{ChannelManager, IncomingMessage, OutgoingMessage};
use crate::config::AgentConfig;
use crate::error::Error;
use crate::onboarding::canned::CannedResponse;
use crate::onboarding::manager::OnboardingManager;

struct Worker {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    handle: JoinHandle<()>,
}

/// The main agent that ties channels to the onboarding manager.
pub struct Agent {
    config: AgentConfig,
    manager: Arc<OnboardingManager>,
    channels: Arc<ChannelManager>,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        manager: Arc<OnboardingManager>,
        channels: ChannelManager,
    ) -> Self {
        Self {
            config,
            manager,
            channels: Arc::new(channels),
        }
    }

    /// Run until Ctrl+C or until every channel stream ends.
    pub async fn run(self) -> Result<(), Error> {
        let mut message_stream = self.channels.start_all().await?;
        let mut workers: HashMap<Uuid, Worker> = HashMap::new();

        tracing::info!(
            channels = ?self.channels.names(),
            "Agent {} ready and listening",
            self.config.name
        );

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            self.dispatch(&mut workers, message);
        }

        // Cleanup: closing every queue lets workers finish what they hold.
        tracing::info!("Agent shutting down...");
        let handles: Vec<JoinHandle<()>> = workers.into_values().map(|w| w.handle).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Conversation worker ended abnormally: {}", e);
            }
        }
        self.channels.shutdown_all().await?;

        Ok(())
    }

    fn dispatch(&self, workers: &mut HashMap<Uuid, Worker>, message: IncomingMessage) {
        let conversation_id = message.conversation_id;

        let message = match workers.get(&conversation_id) {
            Some(worker) => match worker.tx.send(message) {
                Ok(()) => return,
                // The worker went idle and closed its queue.
                Err(mpsc::error::SendError(message)) => message,
            },
            None => message,
        };

        workers.retain(|id, w| *id == conversation_id || !w.handle.is_finished());
        let previous = workers.remove(&conversation_id).map(|w| w.handle);

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(message).is_err() {
            return;
        }

        tracing::debug!(%conversation_id, active = workers.len() + 1, "Starting conversation worker");
        let handle = tokio::spawn(conversation_worker(
            Arc::clone(&self.manager),
            Arc::clone(&self.channels),
            conversation_id,
            rx,
            previous,
            self.config.conversation_idle_timeout,
        ));
        workers.insert(conversation_id, Worker { tx, handle });
    }
}

async fn conversation_worker(
    manager: Arc<OnboardingManager>,
    channels: Arc<ChannelManager>,
    conversation_id: Uuid,
    mut rx: mpsc::UnboundedReceiver<IncomingMessage>,
    previous: Option<JoinHandle<()>>,
    idle_timeout: Duration,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    loop {
        match tokio::time::timeout(idle_timeout, rx.recv()).await {
            Ok(Some(message)) => handle_message(&manager, &channels, message).await,
            Ok(None) => return,
            Err(_) => {
                tracing::debug!(%conversation_id, "Conversation worker idle, exiting");
                rx.close();
                break;
            }
        }
    }

    // Anything that slipped in before the close still belongs to us.
    while let Some(message) = rx.recv().await {
        handle_message(&manager, &channels, message).await;
    }
}

async fn handle_message(
    manager: &OnboardingManager,
    channels: &ChannelManager,
    message: IncomingMessage,
) {
    let conversation_id = message.conversation_id;

    match manager.record_inbound(&message).await {
        Ok(echo) => deliver(channels, &message.channel, &echo).await,
        Err(e) => {
            tracing::error!(%conversation_id, "Error storing message: {}", e);
            send_failure(channels, &message).await;
            return;
        }
    }

    let mut delivered = Vec::new();
    let result = manager.respond(conversation_id, &mut delivered).await;
    for reply in &delivered {
        deliver(channels, &message.channel, reply).await;
    }

    if let Err(e) = result {
        tracing::error!(%conversation_id, "Error handling message: {}", e);
        send_failure(channels, &message).await;
    }
}

async fn send_failure(channels: &ChannelManager, message: &IncomingMessage) {
    for reply in CannedResponse::GenericFailure.messages() {
        let reply = OutgoingMessage::ephemeral(message.conversation_id, &reply);
        deliver(channels, &message.channel, &reply).await;
    }
}

async fn deliver(channels: &ChannelManager, channel: &str, message: &OutgoingMessage) {
    if let Err(e) = channels.send(channel, message).await {
        tracing::warn!(
            conversation_id = %message.conversation_id,
            channel,
            "Failed to deliver message: {}",
            e
        );
    }
}

//! Dialogue engine: runs one turn of the onboarding state machine.
//!
//! The engine never touches storage or channels. It takes the current
//! state and transcript and returns the new state plus an ordered list of
//! commands for the caller to apply. Applying them in order commits every
//! transition before any message that follows it.

use std::sync::Arc;

use crate::error::{LlmError, OnboardingError};
use crate::llm::ChatMessage;

use super::canned::CannedResponse;
use super::execution::{ExecuteRequest, Executor};
use super::message::OutboundMessage;
use super::phases::{self, Step};
use super::state::{ConversationState, Phase};

/// A side effect for the caller to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Persist this state.
    Commit(ConversationState),
    /// Deliver this message.
    Send(OutboundMessage),
}

/// Why the turn stopped.
#[derive(Debug)]
pub enum TurnEnd {
    /// The phase is waiting on the user.
    AwaitingUser,
    /// A terminal response was sent.
    Responded,
    /// The model picked an exit the phase does not allow, or a bad payload.
    ContractViolation,
    /// The stored state could not be decoded. Nothing was done.
    CorruptState,
    /// Too many immediate transitions in one turn.
    TransitionLimit,
    /// The model call failed. Commands produced before the failure stand.
    ModelFailed(LlmError),
}

/// Output of one turn.
#[derive(Debug)]
pub struct Turn {
    pub state: ConversationState,
    pub commands: Vec<Command>,
    pub end: TurnEnd,
}

impl Turn {
    /// Messages in send order.
    pub fn messages(&self) -> impl Iterator<Item = &OutboundMessage> {
        self.commands.iter().filter_map(|c| match c {
            Command::Send(m) => Some(m),
            Command::Commit(_) => None,
        })
    }
}

pub struct DialogueEngine {
    executor: Arc<dyn Executor>,
    transition_limit: usize,
}

impl DialogueEngine {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            transition_limit: Phase::ALL.len(),
        }
    }

    /// Override the per-turn cap on immediate transitions.
    pub fn with_transition_limit(mut self, limit: usize) -> Self {
        self.transition_limit = limit;
        self
    }

    /// Decode the stored state, then run a turn.
    pub async fn handle(
        &self,
        stored: Option<&serde_json::Value>,
        transcript: Vec<ChatMessage>,
    ) -> Turn {
        match ConversationState::decode(stored) {
            Ok(state) => self.run_turn(state, transcript).await,
            Err(e) => {
                tracing::error!("Suspending conversation: {}", e);
                Turn {
                    state: ConversationState::default(),
                    commands: Vec::new(),
                    end: TurnEnd::CorruptState,
                }
            }
        }
    }

    /// Run the state machine until it needs the user or reaches a response.
    pub async fn run_turn(
        &self,
        mut state: ConversationState,
        mut transcript: Vec<ChatMessage>,
    ) -> Turn {
        let mut commands = Vec::new();
        let mut transitions = 0usize;

        loop {
            let phase = state.phase;

            if phase.is_terminal() {
                send_all(&mut commands, CannedResponse::Closing.messages());
                return Turn {
                    state,
                    commands,
                    end: TurnEnd::Responded,
                };
            }

            let request = ExecuteRequest {
                phase,
                instructions: phases::instructions_for(phase),
                exits: phases::exits_for(phase),
                transcript: transcript.clone(),
            };
            let execution = match self.executor.execute(request).await {
                Ok(execution) => execution,
                Err(e) => {
                    tracing::warn!(%phase, "Execute call failed: {}", e);
                    return Turn {
                        state,
                        commands,
                        end: TurnEnd::ModelFailed(e),
                    };
                }
            };

            // Later phases in this turn see what was said.
            for message in &execution.messages {
                transcript.push(ChatMessage::assistant(message.transcript_text()));
            }
            send_all(&mut commands, execution.messages);

            let Some(selection) = execution.exit else {
                return Turn {
                    state,
                    commands,
                    end: TurnEnd::AwaitingUser,
                };
            };

            let step = match phases::resolve(phase, &selection) {
                Ok(step) => step,
                Err(e) => {
                    report_violation(phase, &e);
                    send_all(&mut commands, CannedResponse::GenericFailure.messages());
                    return Turn {
                        state,
                        commands,
                        end: TurnEnd::ContractViolation,
                    };
                }
            };

            let next = step.next();
            tracing::info!(from = %phase, to = %next, exit = %selection.name, "Phase transition");
            state.record(&selection.name, &selection.payload);
            state.phase = next;
            commands.push(Command::Commit(state.clone()));

            match step {
                Step::Respond { messages, .. } => {
                    send_all(&mut commands, messages);
                    return Turn {
                        state,
                        commands,
                        end: TurnEnd::Responded,
                    };
                }
                Step::Advance { .. } => {
                    transitions += 1;
                    if transitions > self.transition_limit {
                        tracing::error!(
                            limit = self.transition_limit,
                            phase = %next,
                            "Too many transitions in one turn; suspending"
                        );
                        return Turn {
                            state,
                            commands,
                            end: TurnEnd::TransitionLimit,
                        };
                    }
                }
            }
        }
    }
}

fn send_all(commands: &mut Vec<Command>, messages: Vec<OutboundMessage>) {
    commands.extend(messages.into_iter().map(Command::Send));
}

fn report_violation(phase: Phase, error: &OnboardingError) {
    if error.is_contract_violation() {
        tracing::error!(%phase, "Exit contract violated: {}", error);
    } else {
        tracing::error!(%phase, "Failed to resolve exit: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::execution::{Execution, ExitSelection};
    use crate::onboarding::message::ChoiceOption;
    use crate::onboarding::testing::ScriptedExecutor;
    use crate::llm::Role;

    fn engine(executor: &Arc<ScriptedExecutor>) -> DialogueEngine {
        DialogueEngine::new(executor.clone())
    }

    fn at(phase: Phase) -> ConversationState {
        ConversationState::default().with_phase(phase)
    }

    fn commits(turn: &Turn) -> Vec<Phase> {
        turn.commands
            .iter()
            .filter_map(|c| match c {
                Command::Commit(s) => Some(s.phase),
                Command::Send(_) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn greeting_waits_for_user() {
        let executor = Arc::new(ScriptedExecutor::new([Execution::awaiting(vec![
            OutboundMessage::text("Hi! Welcome to Botpress. Let's get you started."),
            OutboundMessage::choice(
                "What describes you best?",
                vec![
                    ChoiceOption::new("I have a specific use case in mind", "use_case"),
                    ChoiceOption::new("I'm exploring what's possible", "exploring"),
                ],
            ),
        ])]));
        let turn = engine(&executor).handle(None, vec![ChatMessage::user("hi")]).await;

        assert!(matches!(turn.end, TurnEnd::AwaitingUser));
        assert_eq!(turn.state.phase, Phase::IntentClassification);
        assert!(commits(&turn).is_empty());
        assert_eq!(turn.messages().count(), 2);
    }

    #[tokio::test]
    async fn exploring_sends_intro_and_waits() {
        let executor = Arc::new(ScriptedExecutor::new([Execution::exited(
            ExitSelection::bare("exploring"),
        )]));
        let turn = engine(&executor)
            .run_turn(ConversationState::default(), vec![])
            .await;

        assert!(matches!(turn.end, TurnEnd::Responded));
        assert_eq!(turn.state.phase, Phase::Exploring);
        let sent: Vec<OutboundMessage> = turn.messages().cloned().collect();
        assert_eq!(sent, CannedResponse::ExploringIntro.messages());
        // Commit lands before the intro.
        assert!(matches!(turn.commands[0], Command::Commit(ref s) if s.phase == Phase::Exploring));
    }

    #[tokio::test]
    async fn has_use_case_runs_use_case_in_same_turn() {
        let executor = Arc::new(ScriptedExecutor::new([
            Execution {
                messages: vec![OutboundMessage::text("Great!")],
                exit: Some(ExitSelection::bare("has_use_case")),
            },
            Execution::awaiting(vec![OutboundMessage::text(
                "I'd love to hear more about your use case.",
            )]),
        ]));
        let turn = engine(&executor)
            .run_turn(ConversationState::default(), vec![ChatMessage::user("I have a use case")])
            .await;

        assert!(matches!(turn.end, TurnEnd::AwaitingUser));
        assert_eq!(turn.state.phase, Phase::UseCase);
        assert_eq!(commits(&turn), [Phase::UseCase]);

        let requests = executor.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].phase, Phase::UseCase);
        let last = requests[1].transcript.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Great!");
    }

    #[tokio::test]
    async fn call_confirmation_completes() {
        let executor = Arc::new(ScriptedExecutor::new([Execution::exited(ExitSelection::new(
            "build_for_me_qualified",
            serde_json::json!({
                "timeline": "asap",
                "budget": "over_2000",
                "contactPreference": "call",
                "phone": "555-0100"
            }),
        ))]));
        let turn = engine(&executor).run_turn(at(Phase::BuildForMe), vec![]).await;

        assert!(matches!(turn.end, TurnEnd::Responded));
        assert_eq!(turn.state.phase, Phase::Completed);
        let sent: Vec<OutboundMessage> = turn.messages().cloned().collect();
        assert_eq!(
            sent,
            vec![
                OutboundMessage::text("Perfect! Our team will call you at 555-0100 shortly. Talk soon!"),
                OutboundMessage::text("{{EXPLORE_CTA}}"),
            ]
        );
        assert_eq!(turn.state.extracted["build_for_me_qualified"]["phone"], "555-0100");
    }

    #[tokio::test]
    async fn not_interested_in_partner_continues_to_how_to_build() {
        let executor = Arc::new(ScriptedExecutor::new([
            Execution::exited(ExitSelection::new(
                "build_for_me_not_qualified",
                serde_json::json!({
                    "timeline": "exploring",
                    "budget": "under_500",
                    "interestedInPartner": false
                }),
            )),
            Execution::awaiting(vec![OutboundMessage::choice(
                "There are two ways to build - with code for full control, or visually for speed. Which sounds more like you?",
                vec![
                    ChoiceOption::new("With Code (ADK)", "code"),
                    ChoiceOption::new("Visual Builder (Studio)", "studio"),
                ],
            )]),
        ]));
        let turn = engine(&executor).run_turn(at(Phase::BuildForMe), vec![]).await;

        assert!(matches!(turn.end, TurnEnd::AwaitingUser));
        assert_eq!(turn.state.phase, Phase::HowToBuild);
        assert_eq!(commits(&turn), [Phase::HowToBuild]);
        // Only the model's choice is sent; no canned message in between.
        assert_eq!(turn.messages().count(), 1);
    }

    #[tokio::test]
    async fn completed_closes_without_model() {
        let executor = Arc::new(ScriptedExecutor::default());
        let engine = engine(&executor);

        for _ in 0..2 {
            let turn = engine.run_turn(at(Phase::Completed), vec![]).await;
            assert!(matches!(turn.end, TurnEnd::Responded));
            assert_eq!(turn.state.phase, Phase::Completed);
            assert_eq!(
                turn.commands,
                vec![Command::Send(OutboundMessage::text("Conversation has concluded."))]
            );
        }
        assert!(executor.requests().is_empty());
    }

    #[tokio::test]
    async fn foreign_exit_is_a_contract_violation() {
        let executor = Arc::new(ScriptedExecutor::new([Execution::exited(
            ExitSelection::bare("build_with_code"),
        )]));
        let turn = engine(&executor)
            .run_turn(ConversationState::default(), vec![])
            .await;

        assert!(matches!(turn.end, TurnEnd::ContractViolation));
        assert_eq!(turn.state.phase, Phase::IntentClassification);
        assert_eq!(
            turn.commands,
            CannedResponse::GenericFailure
                .messages()
                .into_iter()
                .map(Command::Send)
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_a_contract_violation() {
        let executor = Arc::new(ScriptedExecutor::new([Execution::exited(ExitSelection::new(
            "use_case_collected",
            serde_json::json!({ "channel": "website" }),
        ))]));
        let turn = engine(&executor).run_turn(at(Phase::UseCase), vec![]).await;
        assert!(matches!(turn.end, TurnEnd::ContractViolation));
        assert_eq!(turn.state.phase, Phase::UseCase);
    }

    #[tokio::test]
    async fn corrupt_state_suspends_silently() {
        let executor = Arc::new(ScriptedExecutor::default());
        let stored = serde_json::json!({ "phase": "haggling" });
        let turn = engine(&executor).handle(Some(&stored), vec![]).await;

        assert!(matches!(turn.end, TurnEnd::CorruptState));
        assert!(turn.commands.is_empty());
        assert!(executor.requests().is_empty());
    }

    #[tokio::test]
    async fn model_failure_keeps_earlier_commits() {
        let executor = Arc::new(ScriptedExecutor::new([Execution::exited(
            ExitSelection::bare("has_use_case"),
        )]));
        executor.push(Err(LlmError::RequestFailed {
            provider: "test".into(),
            reason: "connection reset".into(),
        }));
        let turn = engine(&executor)
            .run_turn(ConversationState::default(), vec![])
            .await;

        assert!(matches!(turn.end, TurnEnd::ModelFailed(LlmError::RequestFailed { .. })));
        assert_eq!(turn.state.phase, Phase::UseCase);
        assert_eq!(commits(&turn), [Phase::UseCase]);
    }

    #[tokio::test]
    async fn transition_limit_stops_the_loop() {
        let executor = Arc::new(ScriptedExecutor::new([
            Execution::exited(ExitSelection::bare("has_use_case")),
            Execution::exited(ExitSelection::new(
                "use_case_self_build",
                serde_json::json!({ "description": "internal FAQ" }),
            )),
        ]));
        let turn = engine(&executor)
            .with_transition_limit(1)
            .run_turn(ConversationState::default(), vec![])
            .await;

        assert!(matches!(turn.end, TurnEnd::TransitionLimit));
        assert_eq!(turn.state.phase, Phase::HowToBuild);
        assert_eq!(executor.requests().len(), 2);
    }

    #[tokio::test]
    async fn default_limit_allows_longest_path() {
        // intent -> use_case -> build_for_me -> how_to_build -> completed
        let executor = Arc::new(ScriptedExecutor::new([
            Execution::exited(ExitSelection::bare("has_use_case")),
            Execution::exited(ExitSelection::new(
                "use_case_collected",
                serde_json::json!({ "description": "lead gen bot" }),
            )),
            Execution::exited(ExitSelection::new(
                "build_for_me_not_qualified",
                serde_json::json!({
                    "timeline": "few_months",
                    "budget": "under_500",
                    "interestedInPartner": false
                }),
            )),
            Execution::exited(ExitSelection::bare("build_with_studio")),
        ]));
        let turn = engine(&executor)
            .run_turn(ConversationState::default(), vec![])
            .await;

        assert!(matches!(turn.end, TurnEnd::Responded));
        assert_eq!(
            commits(&turn),
            [Phase::UseCase, Phase::BuildForMe, Phase::HowToBuild, Phase::Completed]
        );
        let sent: Vec<OutboundMessage> = turn.messages().cloned().collect();
        assert_eq!(sent, CannedResponse::StudioResources.messages());
    }
}

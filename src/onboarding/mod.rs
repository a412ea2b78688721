//! Onboarding dialogue: a phase state machine driven by model-chosen exits.
//!
//! Each turn the engine asks the model to act within the current phase and
//! either wait for the user or pick one of the phase's exits. Phase handlers
//! turn the chosen exit into a transition, a canned reply, or both. The
//! manager persists the result; routes expose it over HTTP.

pub mod canned;
pub mod engine;
pub mod execution;
pub mod executor;
pub mod exits;
pub mod manager;
pub mod markers;
pub mod message;
pub mod phases;
pub mod prompts;
pub mod routes;
pub mod state;
pub mod testing;

pub use engine::{Command, DialogueEngine, Turn, TurnEnd};
pub use execution::{ExecuteRequest, Execution, Executor, ExitSelection};
pub use executor::LlmExecutor;
pub use manager::{OnboardingManager, OnboardingStatus};
pub use message::{ChoiceOption, InboundPayload, OutboundMessage};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::{ConversationState, Phase};

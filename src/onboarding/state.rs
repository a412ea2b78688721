//! Conversation state: which phase of onboarding a conversation is in.

use serde::{Deserialize, Serialize};

use crate::error::OnboardingError;

/// The phases of the onboarding conversation.
///
/// Entry is `IntentClassification`; every path ends in `Completed`, which
/// is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    IntentClassification,
    Exploring,
    ConsultationQualification,
    UseCase,
    BuildForMe,
    HowToBuild,
    Completed,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::IntentClassification,
        Phase::Exploring,
        Phase::ConsultationQualification,
        Phase::UseCase,
        Phase::BuildForMe,
        Phase::HowToBuild,
        Phase::Completed,
    ];

    /// Whether this phase is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntentClassification => "intent_classification",
            Self::Exploring => "exploring",
            Self::ConsultationQualification => "consultation_qualification",
            Self::UseCase => "use_case",
            Self::BuildForMe => "build_for_me",
            Self::HowToBuild => "how_to_build",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted per-conversation state.
///
/// Stored in the conversation's metadata under key `"onboarding"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Current phase.
    #[serde(default)]
    pub phase: Phase,
    /// Payloads of every exit that carried one, keyed by exit name.
    #[serde(default = "empty_object")]
    pub extracted: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::json!({})
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            phase: Phase::default(),
            extracted: empty_object(),
        }
    }
}

impl ConversationState {
    /// Decode the stored metadata value. Absent means a fresh conversation.
    pub fn decode(stored: Option<&serde_json::Value>) -> Result<Self, OnboardingError> {
        match stored {
            None | Some(serde_json::Value::Null) => Ok(Self::default()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|_| {
                OnboardingError::CorruptState {
                    raw: value.to_string(),
                }
            }),
        }
    }

    /// Move to `next`, returning the new state.
    pub fn with_phase(mut self, next: Phase) -> Self {
        self.phase = next;
        self
    }

    /// Remember an exit payload. Payload-less exits are not recorded.
    pub fn record(&mut self, exit: &str, payload: &serde_json::Value) {
        if payload.as_object().is_none_or(|o| o.is_empty()) {
            return;
        }
        if !self.extracted.is_object() {
            self.extracted = empty_object();
        }
        if let Some(obj) = self.extracted.as_object_mut() {
            obj.insert(exit.to_string(), payload.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_phase_is_intent_classification() {
        assert_eq!(Phase::default(), Phase::IntentClassification);
        assert_eq!(ConversationState::default().extracted, serde_json::json!({}));
    }

    #[test]
    fn is_terminal() {
        for phase in Phase::ALL {
            assert_eq!(phase.is_terminal(), phase == Phase::Completed);
        }
    }

    #[test]
    fn display_matches_serde() {
        for phase in Phase::ALL {
            let display = format!("{phase}");
            let json = serde_json::to_string(&phase).unwrap();
            // JSON wraps in quotes
            assert_eq!(
                format!("\"{display}\""),
                json,
                "Display and serde should match for {phase:?}"
            );
        }
    }

    #[test]
    fn decode_absent_is_default() {
        assert_eq!(
            ConversationState::decode(None).unwrap(),
            ConversationState::default()
        );
        assert_eq!(
            ConversationState::decode(Some(&serde_json::Value::Null)).unwrap(),
            ConversationState::default()
        );
    }

    #[test]
    fn decode_stored_phase() {
        let stored = serde_json::json!({ "phase": "build_for_me" });
        let state = ConversationState::decode(Some(&stored)).unwrap();
        assert_eq!(state.phase, Phase::BuildForMe);
        assert_eq!(state.extracted, serde_json::json!({}));
    }

    #[test]
    fn decode_unknown_phase_is_corrupt() {
        let stored = serde_json::json!({ "phase": "negotiating" });
        let err = ConversationState::decode(Some(&stored)).unwrap_err();
        assert!(matches!(err, OnboardingError::CorruptState { .. }));
    }

    #[test]
    fn record_skips_empty_payloads() {
        let mut state = ConversationState::default();
        state.record("exploring", &serde_json::json!({}));
        state.record("use_case_collected", &serde_json::json!({ "description": "FAQ bot" }));
        assert_eq!(
            state.extracted,
            serde_json::json!({ "use_case_collected": { "description": "FAQ bot" } })
        );
    }

    #[test]
    fn state_serde_roundtrip() {
        let mut state = ConversationState::default().with_phase(Phase::HowToBuild);
        state.record("use_case_self_build", &serde_json::json!({ "description": "x" }));
        let json = serde_json::to_value(&state).unwrap();
        let parsed = ConversationState::decode(Some(&json)).unwrap();
        assert_eq!(parsed, state);
    }
}

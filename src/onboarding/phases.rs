//! Phase handlers: one per non-terminal phase.
//!
//! A handler declares which exits its phase may end with, decodes the exit
//! the model picked into a typed outcome, and maps that outcome to a step.
//! `transition` is pure: every outcome a handler can produce has a step.

use serde::de::DeserializeOwned;

use crate::error::OnboardingError;

use super::canned::CannedResponse;
use super::execution::ExitSelection;
use super::exits::{
    self, BuildForMeNotQualified, BuildForMeQualified, ConsultationQualified, ContactPreference,
    Exit, UseCaseDetails,
};
use super::message::OutboundMessage;
use super::prompts;
use super::state::Phase;

/// What the engine does after a phase ends.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Send `messages`, move to `next` and wait for the user.
    Respond {
        next: Phase,
        messages: Vec<OutboundMessage>,
    },
    /// Move to `next` and run it right away.
    Advance { next: Phase },
}

impl Step {
    fn respond(next: Phase, reply: CannedResponse) -> Self {
        Self::Respond {
            next,
            messages: reply.messages(),
        }
    }

    pub fn next(&self) -> Phase {
        match self {
            Self::Respond { next, .. } | Self::Advance { next } => *next,
        }
    }
}

pub trait PhaseHandler {
    const PHASE: Phase;

    /// Tagged union over this phase's exits.
    type Outcome: std::fmt::Debug;

    fn exits() -> &'static [&'static Exit];

    fn instructions() -> String {
        prompts::instructions(Self::PHASE)
    }

    fn decode(selection: &ExitSelection) -> Result<Self::Outcome, OnboardingError>;

    fn transition(outcome: Self::Outcome) -> Step;
}

fn unknown_exit<H: PhaseHandler>(selection: &ExitSelection) -> OnboardingError {
    OnboardingError::UnknownExit {
        phase: H::PHASE.to_string(),
        exit: selection.name.clone(),
    }
}

fn payload<T: DeserializeOwned>(selection: &ExitSelection) -> Result<T, OnboardingError> {
    serde_json::from_value(selection.payload.clone()).map_err(|e| {
        OnboardingError::MalformedPayload {
            exit: selection.name.clone(),
            reason: e.to_string(),
        }
    })
}

// ── intent_classification ──────────────────────────────────────────

pub struct IntentClassification;

#[derive(Debug)]
pub enum IntentOutcome {
    Exploring,
    HasUseCase,
}

impl PhaseHandler for IntentClassification {
    const PHASE: Phase = Phase::IntentClassification;
    type Outcome = IntentOutcome;

    fn exits() -> &'static [&'static Exit] {
        static EXITS: [&Exit; 2] = [&exits::EXPLORING, &exits::HAS_USE_CASE];
        &EXITS
    }

    fn decode(selection: &ExitSelection) -> Result<Self::Outcome, OnboardingError> {
        match selection.name.as_str() {
            "exploring" => Ok(IntentOutcome::Exploring),
            "has_use_case" => Ok(IntentOutcome::HasUseCase),
            _ => Err(unknown_exit::<Self>(selection)),
        }
    }

    fn transition(outcome: Self::Outcome) -> Step {
        match outcome {
            IntentOutcome::Exploring => Step::respond(Phase::Exploring, CannedResponse::ExploringIntro),
            IntentOutcome::HasUseCase => Step::Advance {
                next: Phase::UseCase,
            },
        }
    }
}

// ── exploring ──────────────────────────────────────────────────────

pub struct Exploring;

#[derive(Debug)]
pub enum ExploringOutcome {
    WantsConsultation,
    SelfServe,
}

impl PhaseHandler for Exploring {
    const PHASE: Phase = Phase::Exploring;
    type Outcome = ExploringOutcome;

    fn exits() -> &'static [&'static Exit] {
        static EXITS: [&Exit; 2] = [&exits::WANTS_CONSULTATION, &exits::SELF_SERVE];
        &EXITS
    }

    fn decode(selection: &ExitSelection) -> Result<Self::Outcome, OnboardingError> {
        match selection.name.as_str() {
            "wants_consultation" => Ok(ExploringOutcome::WantsConsultation),
            "self_serve" => Ok(ExploringOutcome::SelfServe),
            _ => Err(unknown_exit::<Self>(selection)),
        }
    }

    fn transition(outcome: Self::Outcome) -> Step {
        match outcome {
            ExploringOutcome::WantsConsultation => Step::Advance {
                next: Phase::ConsultationQualification,
            },
            ExploringOutcome::SelfServe => Step::Advance {
                next: Phase::HowToBuild,
            },
        }
    }
}

// ── consultation_qualification ─────────────────────────────────────

pub struct ConsultationQualification;

#[derive(Debug)]
pub enum ConsultationOutcome {
    Qualified(ConsultationQualified),
    NotQualified,
}

impl PhaseHandler for ConsultationQualification {
    const PHASE: Phase = Phase::ConsultationQualification;
    type Outcome = ConsultationOutcome;

    fn exits() -> &'static [&'static Exit] {
        static EXITS: [&Exit; 2] = [
            &exits::CONSULTATION_QUALIFIED,
            &exits::CONSULTATION_NOT_QUALIFIED,
        ];
        &EXITS
    }

    fn decode(selection: &ExitSelection) -> Result<Self::Outcome, OnboardingError> {
        match selection.name.as_str() {
            "consultation_qualified" => Ok(ConsultationOutcome::Qualified(payload(selection)?)),
            "consultation_not_qualified" => Ok(ConsultationOutcome::NotQualified),
            _ => Err(unknown_exit::<Self>(selection)),
        }
    }

    fn transition(outcome: Self::Outcome) -> Step {
        match outcome {
            ConsultationOutcome::Qualified(lead) => {
                tracing::info!(
                    company_size = ?lead.company_size,
                    has_use_case = lead.has_use_case,
                    ready_to_start = lead.ready_to_start,
                    "Consultation lead qualified"
                );
                Step::respond(Phase::Completed, CannedResponse::ConsultationBooking)
            }
            ConsultationOutcome::NotQualified => {
                Step::respond(Phase::Completed, CannedResponse::SoftLanding)
            }
        }
    }
}

// ── use_case ───────────────────────────────────────────────────────

pub struct UseCase;

#[derive(Debug)]
pub enum UseCaseOutcome {
    Collected(UseCaseDetails),
    SelfBuild(UseCaseDetails),
}

impl PhaseHandler for UseCase {
    const PHASE: Phase = Phase::UseCase;
    type Outcome = UseCaseOutcome;

    fn exits() -> &'static [&'static Exit] {
        static EXITS: [&Exit; 2] = [&exits::USE_CASE_COLLECTED, &exits::USE_CASE_SELF_BUILD];
        &EXITS
    }

    fn decode(selection: &ExitSelection) -> Result<Self::Outcome, OnboardingError> {
        match selection.name.as_str() {
            "use_case_collected" => Ok(UseCaseOutcome::Collected(payload(selection)?)),
            "use_case_self_build" => Ok(UseCaseOutcome::SelfBuild(payload(selection)?)),
            _ => Err(unknown_exit::<Self>(selection)),
        }
    }

    fn transition(outcome: Self::Outcome) -> Step {
        match outcome {
            UseCaseOutcome::Collected(details) => {
                tracing::info!(kind = ?details.kind, channel = ?details.channel, "Use case collected");
                Step::Advance {
                    next: Phase::BuildForMe,
                }
            }
            UseCaseOutcome::SelfBuild(details) => {
                tracing::info!(kind = ?details.kind, channel = ?details.channel, "Use case for self-build");
                Step::Advance {
                    next: Phase::HowToBuild,
                }
            }
        }
    }
}

// ── build_for_me ───────────────────────────────────────────────────

pub struct BuildForMe;

#[derive(Debug)]
pub enum BuildForMeOutcome {
    Qualified(BuildForMeQualified),
    NotQualified(BuildForMeNotQualified),
}

impl PhaseHandler for BuildForMe {
    const PHASE: Phase = Phase::BuildForMe;
    type Outcome = BuildForMeOutcome;

    fn exits() -> &'static [&'static Exit] {
        static EXITS: [&Exit; 2] = [
            &exits::BUILD_FOR_ME_QUALIFIED,
            &exits::BUILD_FOR_ME_NOT_QUALIFIED,
        ];
        &EXITS
    }

    fn decode(selection: &ExitSelection) -> Result<Self::Outcome, OnboardingError> {
        match selection.name.as_str() {
            "build_for_me_qualified" => Ok(BuildForMeOutcome::Qualified(payload(selection)?)),
            "build_for_me_not_qualified" => {
                Ok(BuildForMeOutcome::NotQualified(payload(selection)?))
            }
            _ => Err(unknown_exit::<Self>(selection)),
        }
    }

    fn transition(outcome: Self::Outcome) -> Step {
        match outcome {
            BuildForMeOutcome::Qualified(lead) => {
                tracing::info!(timeline = ?lead.timeline, budget = ?lead.budget, "Build-for-me lead qualified");
                match lead.contact_preference {
                    ContactPreference::Call => {
                        if lead.phone.is_none() {
                            tracing::warn!("Call requested without a phone number");
                        }
                        Step::respond(
                            Phase::Completed,
                            CannedResponse::CallConfirmation { phone: lead.phone },
                        )
                    }
                    ContactPreference::Booking => {
                        Step::respond(Phase::Completed, CannedResponse::BookingConfirmation)
                    }
                }
            }
            BuildForMeOutcome::NotQualified(lead) if lead.interested_in_partner => {
                tracing::info!(timeline = ?lead.timeline, budget = ?lead.budget, "Referred to partners");
                Step::respond(Phase::Completed, CannedResponse::PartnerInfo)
            }
            BuildForMeOutcome::NotQualified(_) => Step::Advance {
                next: Phase::HowToBuild,
            },
        }
    }
}

// ── how_to_build ───────────────────────────────────────────────────

pub struct HowToBuild;

#[derive(Debug)]
pub enum HowToBuildOutcome {
    Code,
    Studio,
}

impl PhaseHandler for HowToBuild {
    const PHASE: Phase = Phase::HowToBuild;
    type Outcome = HowToBuildOutcome;

    fn exits() -> &'static [&'static Exit] {
        static EXITS: [&Exit; 2] = [&exits::BUILD_WITH_CODE, &exits::BUILD_WITH_STUDIO];
        &EXITS
    }

    fn decode(selection: &ExitSelection) -> Result<Self::Outcome, OnboardingError> {
        match selection.name.as_str() {
            "build_with_code" => Ok(HowToBuildOutcome::Code),
            "build_with_studio" => Ok(HowToBuildOutcome::Studio),
            _ => Err(unknown_exit::<Self>(selection)),
        }
    }

    fn transition(outcome: Self::Outcome) -> Step {
        match outcome {
            HowToBuildOutcome::Code => Step::respond(Phase::Completed, CannedResponse::AdkResources),
            HowToBuildOutcome::Studio => {
                Step::respond(Phase::Completed, CannedResponse::StudioResources)
            }
        }
    }
}

// ── Dispatch by runtime phase ──────────────────────────────────────

fn resolve_with<H: PhaseHandler>(selection: &ExitSelection) -> Result<Step, OnboardingError> {
    let phase = H::PHASE;
    let outcome = H::decode(selection)?;
    tracing::debug!(%phase, ?outcome, "Decoded exit");
    Ok(H::transition(outcome))
}

/// Exits legal in `phase`. `Completed` has none.
pub fn exits_for(phase: Phase) -> &'static [&'static Exit] {
    match phase {
        Phase::IntentClassification => IntentClassification::exits(),
        Phase::Exploring => Exploring::exits(),
        Phase::ConsultationQualification => ConsultationQualification::exits(),
        Phase::UseCase => UseCase::exits(),
        Phase::BuildForMe => BuildForMe::exits(),
        Phase::HowToBuild => HowToBuild::exits(),
        Phase::Completed => &[],
    }
}

pub fn instructions_for(phase: Phase) -> String {
    match phase {
        Phase::IntentClassification => IntentClassification::instructions(),
        Phase::Exploring => Exploring::instructions(),
        Phase::ConsultationQualification => ConsultationQualification::instructions(),
        Phase::UseCase => UseCase::instructions(),
        Phase::BuildForMe => BuildForMe::instructions(),
        Phase::HowToBuild => HowToBuild::instructions(),
        Phase::Completed => prompts::instructions(Phase::Completed),
    }
}

/// Map the exit selected in `phase` to the next step.
pub fn resolve(phase: Phase, selection: &ExitSelection) -> Result<Step, OnboardingError> {
    match phase {
        Phase::IntentClassification => resolve_with::<IntentClassification>(selection),
        Phase::Exploring => resolve_with::<Exploring>(selection),
        Phase::ConsultationQualification => resolve_with::<ConsultationQualification>(selection),
        Phase::UseCase => resolve_with::<UseCase>(selection),
        Phase::BuildForMe => resolve_with::<BuildForMe>(selection),
        Phase::HowToBuild => resolve_with::<HowToBuild>(selection),
        Phase::Completed => Err(OnboardingError::UnknownExit {
            phase: Phase::Completed.to_string(),
            exit: selection.name.clone(),
        }),
    }
}

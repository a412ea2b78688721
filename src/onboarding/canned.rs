//! Canned responses: fixed messages the engine sends on transitions.
//!
//! These never go through the model. The only substitution is the phone
//! number in the call confirmation.

use super::markers::ControlMarker;
use super::message::{ChoiceOption, OutboundMessage};

const EXPLORING_INTRO: &str = "With Botpress, you can build support bots, sales assistants, internal tools, and seamlessly integrate them with your products. Explore live examples here:";

const EXPLORING_CHOICE: &str = "Would you like to see if you qualify for a free consultation, or prefer to start building on your own?";

const CONSULTATION_BOOKING: &str =
    "Great news - you qualify for a free consultation! Book a time with our team here-";

const CONSULTATION_OUTRO: &str = "We're excited to help you build something amazing!";

const SOFT_LANDING: &str = "Thanks for your interest! While our consultation slots are currently reserved for teams ready to build, here are some great resources to get you started:

**Self-serve resources:**
- Documentation: https://botpress.com/docs
- Free templates: https://botpress.com/templates
- Community Discord: https://discord.gg/botpress
- YouTube tutorials: https://youtube.com/botpress

Feel free to come back when you're ready to dive deeper!";

const CALL_CONFIRMATION: &str = "Perfect! Our team will call you at {phone} shortly. Talk soon!";

const CALL_CONFIRMATION_NO_PHONE: &str = "Perfect! Our team will call you shortly. Talk soon!";

const BOOKING_CONFIRMATION: &str = "Excellent! You can book a time with our team here-";

const BOOKING_OUTRO: &str =
    "We'll dive into your use case and show you how we can help build it. Looking forward to it!";

const PARTNER_INFO: &str = "Thanks for sharing! While our team focuses on larger projects, we have amazing certified partners who'd love to help you out. Check them out at botpress.com/partners - good luck with your project!";

const ADK_RESOURCES: &str = "Awesome choice! The **Botpress ADK** gives you full control with TypeScript.

Let's get you started!";

const STUDIO_RESOURCES: &str = "Great choice! **Botpress Studio** lets you build visually - no coding required.

Let's get you started!";

pub const CLOSING: &str = "Conversation has concluded.";

const GENERIC_FAILURE: &str =
    "Sorry, something went wrong on our side. Could you send that again?";

/// Label for a fixed message sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CannedResponse {
    ExploringIntro,
    ConsultationBooking,
    SoftLanding,
    /// `None` when the model exited without collecting a number.
    CallConfirmation { phone: Option<String> },
    BookingConfirmation,
    PartnerInfo,
    AdkResources,
    StudioResources,
    Closing,
    GenericFailure,
}

impl CannedResponse {
    pub fn messages(&self) -> Vec<OutboundMessage> {
        let marker = |m: ControlMarker| OutboundMessage::text(m.token());
        match self {
            Self::ExploringIntro => vec![
                OutboundMessage::text(EXPLORING_INTRO),
                marker(ControlMarker::DemosCarousel),
                OutboundMessage::choice(
                    EXPLORING_CHOICE,
                    vec![
                        ChoiceOption::new("I'm interested in a consultation", "consultation"),
                        ChoiceOption::new("I'll start building", "self_build"),
                    ],
                ),
            ],
            Self::ConsultationBooking => vec![
                OutboundMessage::text(CONSULTATION_BOOKING),
                marker(ControlMarker::BookingCard),
                OutboundMessage::text(CONSULTATION_OUTRO),
                marker(ControlMarker::ExploreCta),
            ],
            Self::SoftLanding => vec![
                OutboundMessage::text(SOFT_LANDING),
                marker(ControlMarker::ExploreCta),
            ],
            Self::CallConfirmation { phone } => {
                let text = match phone {
                    Some(phone) => CALL_CONFIRMATION.replace("{phone}", phone),
                    None => CALL_CONFIRMATION_NO_PHONE.to_string(),
                };
                vec![
                    OutboundMessage::text(text),
                    marker(ControlMarker::ExploreCta),
                ]
            }
            Self::BookingConfirmation => vec![
                OutboundMessage::text(BOOKING_CONFIRMATION),
                marker(ControlMarker::BookingCard),
                OutboundMessage::text(BOOKING_OUTRO),
                marker(ControlMarker::ExploreCta),
            ],
            Self::PartnerInfo => vec![OutboundMessage::text(PARTNER_INFO)],
            Self::AdkResources => vec![
                OutboundMessage::text(ADK_RESOURCES),
                marker(ControlMarker::AdkCta),
            ],
            Self::StudioResources => vec![
                OutboundMessage::text(STUDIO_RESOURCES),
                marker(ControlMarker::StudioCta),
            ],
            Self::Closing => vec![OutboundMessage::text(CLOSING)],
            Self::GenericFailure => vec![OutboundMessage::text(GENERIC_FAILURE)],
        }
    }
}

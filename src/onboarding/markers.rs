//! Control markers and plain-text rendering.
//!
//! A text message whose whole body is `{{NAME}}` is a control marker: the
//! browser client swaps it for a widget or a call-to-action button. Terminal
//! channels render it as a one-line link instead.

use std::sync::LazyLock;

use regex::Regex;

use super::message::OutboundMessage;

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{([A-Z][A-Z0-9_]*)\}\}$").expect("valid marker regex"));

/// Known control markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMarker {
    DemosCarousel,
    BookingCard,
    ExploreCta,
    AdkCta,
    StudioCta,
}

/// Result of inspecting a text payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerParse<'a> {
    Known(ControlMarker),
    /// Looks like a marker but is not one we know.
    Unknown(&'a str),
    NotAMarker,
}

impl ControlMarker {
    pub const ALL: [ControlMarker; 5] = [
        Self::DemosCarousel,
        Self::BookingCard,
        Self::ExploreCta,
        Self::AdkCta,
        Self::StudioCta,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::DemosCarousel => "DEMOS_CAROUSEL",
            Self::BookingCard => "BOOKING_CARD",
            Self::ExploreCta => "EXPLORE_CTA",
            Self::AdkCta => "ADK_CTA",
            Self::StudioCta => "STUDIO_CTA",
        }
    }

    /// The exact text payload, e.g. `{{BOOKING_CARD}}`.
    pub fn token(&self) -> String {
        format!("{{{{{}}}}}", self.name())
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::DemosCarousel => "Explore live examples",
            Self::BookingCard => "Talk to a Product Expert",
            Self::ExploreCta => "Continue exploring Botpress",
            Self::AdkCta => "Get started with the Botpress ADK",
            Self::StudioCta => "Get started with Botpress Studio",
        }
    }

    pub fn link(&self) -> &'static str {
        match self {
            Self::DemosCarousel => "https://botpress.com/demos",
            Self::BookingCard => "https://calendly.com/botpress-sales/demo",
            Self::ExploreCta => "https://botpress.com",
            Self::AdkCta => "https://botpress.com/docs/adk",
            Self::StudioCta => "https://studio.botpress.cloud",
        }
    }

    /// CTA markers replace the input area; the rest are inline widgets.
    pub fn is_cta(&self) -> bool {
        matches!(self, Self::ExploreCta | Self::AdkCta | Self::StudioCta)
    }

    pub fn parse(text: &str) -> MarkerParse<'_> {
        let Some(caps) = MARKER_RE.captures(text) else {
            return MarkerParse::NotAMarker;
        };
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        match Self::ALL.into_iter().find(|m| m.name() == name) {
            Some(marker) => MarkerParse::Known(marker),
            None => MarkerParse::Unknown(name),
        }
    }
}

/// Render a message for a plain-text terminal.
pub fn render_plain(message: &OutboundMessage) -> String {
    match message {
        OutboundMessage::Text { text } => match ControlMarker::parse(text) {
            MarkerParse::Known(marker) => format!("[{}] {}", marker.title(), marker.link()),
            MarkerParse::Unknown(name) => {
                tracing::warn!(marker = name, "Unknown control marker");
                text.clone()
            }
            MarkerParse::NotAMarker => text.clone(),
        },
        OutboundMessage::Choice { text, options } => {
            let mut out = text.clone();
            for (i, option) in options.iter().enumerate() {
                out.push_str(&format!("\n  {}. {}", i + 1, option.label));
            }
            out
        }
    }
}

//! Exit catalog: the closed set of outcomes a phase can end with.
//!
//! Each exit is offered to the model as a tool. When the model calls one,
//! the phase is over and the engine decides where to go next. Exits are
//! global and immutable; handlers refer to them by `&'static Exit`.

use serde::{Deserialize, Serialize};

/// A named outcome the model may select.
#[derive(Debug)]
pub struct Exit {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON Schema for the payload, when the exit carries one.
    pub schema: Option<fn() -> serde_json::Value>,
}

impl Exit {
    /// Tool parameter schema. Exits without a payload take an empty object.
    pub fn parameters(&self) -> serde_json::Value {
        match self.schema {
            Some(schema) => schema(),
            None => serde_json::json!({ "type": "object", "properties": {} }),
        }
    }
}

impl PartialEq for Exit {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Exit {}

// ── Intent classification ──────────────────────────────────────────

pub static EXPLORING: Exit = Exit {
    name: "exploring",
    description: "User is exploring what Botpress can do, no specific use case yet",
    schema: None,
};

pub static HAS_USE_CASE: Exit = Exit {
    name: "has_use_case",
    description: "User has a specific use case or project in mind",
    schema: None,
};

// ── Exploring ──────────────────────────────────────────────────────

pub static WANTS_CONSULTATION: Exit = Exit {
    name: "wants_consultation",
    description: "User wants to see if they qualify for a free consultation",
    schema: None,
};

pub static SELF_SERVE: Exit = Exit {
    name: "self_serve",
    description: "User wants to explore on their own without consultation",
    schema: None,
};

// ── Consultation qualification ─────────────────────────────────────

pub static CONSULTATION_QUALIFIED: Exit = Exit {
    name: "consultation_qualified",
    description: "User qualifies for a free consultation",
    schema: Some(consultation_qualified_schema),
};

pub static CONSULTATION_NOT_QUALIFIED: Exit = Exit {
    name: "consultation_not_qualified",
    description: "User does not qualify for consultation, provide soft landing",
    schema: None,
};

// ── Use case ───────────────────────────────────────────────────────

pub static USE_CASE_COLLECTED: Exit = Exit {
    name: "use_case_collected",
    description: "Use case details have been gathered, user wants help building",
    schema: Some(use_case_schema),
};

pub static USE_CASE_SELF_BUILD: Exit = Exit {
    name: "use_case_self_build",
    description: "Use case details gathered, user wants to build it themselves",
    schema: Some(use_case_schema),
};

// ── Build for me ───────────────────────────────────────────────────

pub static BUILD_FOR_ME_QUALIFIED: Exit = Exit {
    name: "build_for_me_qualified",
    description: "User qualifies for sales assistance and contact method has been determined",
    schema: Some(build_for_me_qualified_schema),
};

pub static BUILD_FOR_ME_NOT_QUALIFIED: Exit = Exit {
    name: "build_for_me_not_qualified",
    description: "User does not qualify for sales, offer alternatives",
    schema: Some(build_for_me_not_qualified_schema),
};

// ── How to build ───────────────────────────────────────────────────

pub static BUILD_WITH_CODE: Exit = Exit {
    name: "build_with_code",
    description: "User wants to build with code using the ADK",
    schema: None,
};

pub static BUILD_WITH_STUDIO: Exit = Exit {
    name: "build_with_studio",
    description: "User wants to build visually using Botpress Studio",
    schema: None,
};

/// Every exit, in declaration order.
pub static CATALOG: [&Exit; 12] = [
    &EXPLORING,
    &HAS_USE_CASE,
    &WANTS_CONSULTATION,
    &SELF_SERVE,
    &CONSULTATION_QUALIFIED,
    &CONSULTATION_NOT_QUALIFIED,
    &USE_CASE_COLLECTED,
    &USE_CASE_SELF_BUILD,
    &BUILD_FOR_ME_QUALIFIED,
    &BUILD_FOR_ME_NOT_QUALIFIED,
    &BUILD_WITH_CODE,
    &BUILD_WITH_STUDIO,
];

/// Look up an exit by name.
pub fn find(name: &str) -> Option<&'static Exit> {
    CATALOG.iter().copied().find(|e| e.name == name)
}

// ── Schemas ────────────────────────────────────────────────────────

const TIMELINES: [&str; 4] = ["asap", "month", "few_months", "exploring"];
const BUDGETS: [&str; 4] = ["under_500", "500_to_2000", "over_2000", "not_sure"];

fn consultation_qualified_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "companySize": {
                "type": "string",
                "enum": ["startup", "smb", "enterprise"]
            },
            "hasUseCase": { "type": "boolean" },
            "readyToStart": { "type": "boolean" }
        },
        "required": ["companySize", "hasUseCase", "readyToStart"]
    })
}

fn use_case_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "description": {
                "type": "string",
                "description": "Summary of what the user wants to build"
            },
            "channel": {
                "type": "string",
                "enum": ["website", "whatsapp", "slack", "other", "unknown"],
                "description": "Primary channel where the bot will live"
            },
            "integrations": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Systems to integrate with (CRM, helpdesk, etc.) - empty if none/unknown"
            },
            "size": {
                "type": "string",
                "enum": ["small", "medium", "large", "unknown"],
                "description": "Expected monthly conversations: small (<1k), medium (1k-10k), large (10k+)"
            },
            "type": {
                "type": "string",
                "enum": ["cx", "lead_gen", "internal", "other", "unknown"],
                "description": "Primary use case type"
            }
        },
        "required": ["description"]
    })
}

fn build_for_me_qualified_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "timeline": { "type": "string", "enum": TIMELINES },
            "budget": { "type": "string", "enum": BUDGETS },
            "contactPreference": {
                "type": "string",
                "enum": ["call", "booking"],
                "description": "How they want to be contacted"
            },
            "phone": {
                "type": "string",
                "description": "Phone number if they chose call - must be collected before exiting"
            }
        },
        "required": ["timeline", "budget", "contactPreference"]
    })
}

fn build_for_me_not_qualified_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "timeline": { "type": "string", "enum": TIMELINES },
            "budget": { "type": "string", "enum": BUDGETS },
            "interestedInPartner": {
                "type": "boolean",
                "description": "Whether they want partner program info"
            }
        },
        "required": ["timeline", "budget", "interestedInPartner"]
    })
}

// ── Payloads ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanySize {
    Startup,
    Smb,
    Enterprise,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationQualified {
    pub company_size: CompanySize,
    pub has_use_case: bool,
    pub ready_to_start: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotChannel {
    Website,
    Whatsapp,
    Slack,
    Other,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeSize {
    Small,
    Medium,
    Large,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCaseKind {
    Cx,
    LeadGen,
    Internal,
    Other,
    Unknown,
}

/// What the user wants to build, as summarised by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseCaseDetails {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<BotChannel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub integrations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<VolumeSize>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<UseCaseKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeline {
    Asap,
    Month,
    FewMonths,
    Exploring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Budget {
    #[serde(rename = "under_500")]
    Under500,
    #[serde(rename = "500_to_2000")]
    From500To2000,
    #[serde(rename = "over_2000")]
    Over2000,
    #[serde(rename = "not_sure")]
    NotSure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactPreference {
    Call,
    Booking,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildForMeQualified {
    pub timeline: Timeline,
    pub budget: Budget,
    pub contact_preference: ContactPreference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildForMeNotQualified {
    pub timeline: Timeline,
    pub budget: Budget,
    pub interested_in_partner: bool,
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_are_unique() {
        let names: HashSet<&str> = CATALOG.iter().map(|e| e.name).collect();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn find_by_name() {
        assert_eq!(find("has_use_case"), Some(&HAS_USE_CASE));
        assert!(find("hang_up").is_none());
    }

    #[test]
    fn schemas_list_existing_required_fields() {
        for exit in CATALOG {
            let params = exit.parameters();
            assert_eq!(params["type"], "object", "{}", exit.name);
            let props = params["properties"].as_object().unwrap();
            if let Some(required) = params.get("required").and_then(|r| r.as_array()) {
                for field in required {
                    let field = field.as_str().unwrap();
                    assert!(props.contains_key(field), "{}: {field}", exit.name);
                }
            }
        }
    }

    #[test]
    fn payloadless_exits_take_empty_object() {
        assert_eq!(
            BUILD_WITH_CODE.parameters(),
            serde_json::json!({ "type": "object", "properties": {} })
        );
    }

    #[test]
    fn build_for_me_payload_uses_wire_names() {
        let payload: BuildForMeQualified = serde_json::from_value(serde_json::json!({
            "timeline": "few_months",
            "budget": "500_to_2000",
            "contactPreference": "call",
            "phone": "555-0100"
        }))
        .unwrap();
        assert_eq!(payload.timeline, Timeline::FewMonths);
        assert_eq!(payload.budget, Budget::From500To2000);
        assert_eq!(payload.contact_preference, ContactPreference::Call);
        assert_eq!(payload.phone.as_deref(), Some("555-0100"));
    }

    #[test]
    fn use_case_optional_fields_default() {
        let details: UseCaseDetails =
            serde_json::from_value(serde_json::json!({ "description": "FAQ bot", "type": "cx" }))
                .unwrap();
        assert_eq!(details.kind, Some(UseCaseKind::Cx));
        assert!(details.channel.is_none());
        assert!(details.integrations.is_empty());
    }

    #[test]
    fn not_qualified_requires_partner_flag() {
        let result = serde_json::from_value::<BuildForMeNotQualified>(serde_json::json!({
            "timeline": "exploring",
            "budget": "under_500"
        }));
        assert!(result.is_err());
    }
}

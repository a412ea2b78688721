//! Onboarding agent: an LLM-driven onboarding conversation served over
//! web chat and the terminal.

pub mod agent;
pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod onboarding;
pub mod store;

//! Agent module: the dispatch loop between channels and the onboarding
//! manager.

mod agent_loop;

pub use agent_loop::Agent;

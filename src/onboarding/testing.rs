//! Deterministic executor for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LlmError;

use super::execution::{ExecuteRequest, Execution, Executor};

/// Replays scripted executions in order and records every request.
///
/// Once the script runs out every call returns an empty execution, which
/// reads as "waiting on the user".
#[derive(Default)]
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Result<Execution, LlmError>>>,
    requests: Mutex<Vec<ExecuteRequest>>,
}

impl ScriptedExecutor {
    pub fn new(script: impl IntoIterator<Item = Execution>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue another step.
    pub fn push(&self, step: Result<Execution, LlmError>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(step);
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<ExecuteRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn execute(&self, request: ExecuteRequest) -> Result<Execution, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(Execution::default()))
    }
}

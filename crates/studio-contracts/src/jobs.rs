use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A long-running video operation as last reported by the remote service.
///
/// Only the poller replaces it; `done == true` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoJob {
    pub operation: String,
    pub done: bool,
    pub result_uri: Option<String>,
    pub error: Option<String>,
}

impl VideoJob {
    pub fn submitted(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            done: false,
            result_uri: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.done
    }
}

/// Reported after every status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTick {
    pub cycle: u32,
    pub waited: Duration,
    pub job: VideoJob,
}

const PROGRESS_MESSAGES: &[&str] = &[
    "Analyzing the scenario...",
    "Sketching the first scenes...",
    "Generating cinematic motion...",
    "Refining light and shadow...",
    "Adding the finishing touches...",
    "Almost there...",
];

/// Rotating status line shown while a video job is still running.
pub fn progress_message(cycle: u32) -> &'static str {
    PROGRESS_MESSAGES[cycle as usize % PROGRESS_MESSAGES.len()]
}

//! In-memory doubles for the transport and pause seams.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use crate::error::{MediaError, StudioResult};
use crate::poller::{CancelToken, Pause};
use crate::transport::{HttpReply, MediaTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Pause(Duration),
    Query(String),
    Post(String),
    Get(String),
}

/// Ordered record of every pause and request, shared by the doubles.
#[derive(Debug, Clone, Default)]
pub struct StepLog(Arc<Mutex<Vec<Step>>>);

impl StepLog {
    pub fn push(&self, step: Step) {
        if let Ok(mut steps) = self.0.lock() {
            steps.push(step);
        }
    }

    pub fn steps(&self) -> Vec<Step> {
        self.0.lock().map(|steps| steps.clone()).unwrap_or_default()
    }

    pub fn pauses(&self) -> usize {
        self.steps()
            .iter()
            .filter(|step| matches!(step, Step::Pause(_)))
            .count()
    }
}

pub struct RecordingPause {
    log: StepLog,
    calls: AtomicUsize,
    cancel_on: Option<usize>,
}

impl RecordingPause {
    pub fn new(log: &StepLog) -> Self {
        Self {
            log: log.clone(),
            calls: AtomicUsize::new(0),
            cancel_on: None,
        }
    }

    /// Reports cancellation on the `nth` pause (1-based).
    pub fn cancel_on_pause(mut self, nth: usize) -> Self {
        self.cancel_on = Some(nth);
        self
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration, cancel: &CancelToken) -> bool {
        self.log.push(Step::Pause(duration));
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.cancel_on == Some(call) {
            cancel.cancel();
            return true;
        }
        false
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub payload: Option<Value>,
}

/// Replays canned replies in order and records what was asked.
pub struct ScriptedTransport {
    log: StepLog,
    replies: Mutex<VecDeque<HttpReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new(log: &StepLog, replies: Vec<HttpReply>) -> Self {
        Self {
            log: log.clone(),
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn next(&self, request: RecordedRequest) -> StudioResult<HttpReply> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .ok_or_else(|| MediaError::InvalidRequest("script exhausted".to_string()))
    }
}

impl MediaTransport for ScriptedTransport {
    fn post_json(&self, url: &str, payload: &Value) -> StudioResult<HttpReply> {
        self.log.push(Step::Post(strip_key(url)));
        self.next(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            payload: Some(payload.clone()),
        })
    }

    fn get(&self, url: &str) -> StudioResult<HttpReply> {
        self.log.push(Step::Get(strip_key(url)));
        self.next(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            payload: None,
        })
    }
}

fn strip_key(url: &str) -> String {
    url.split(['?', '&'])
        .next()
        .unwrap_or_default()
        .to_string()
}

pub fn json_reply(status: u16, body: Value) -> HttpReply {
    HttpReply {
        status,
        content_type: Some("application/json".to_string()),
        body: serde_json::to_vec(&body).unwrap_or_default(),
    }
}

pub fn bytes_reply(status: u16, content_type: &str, body: &[u8]) -> HttpReply {
    HttpReply {
        status,
        content_type: Some(content_type.to_string()),
        body: body.to_vec(),
    }
}

pub fn image_response(mime_type: &str, data: &str) -> Value {
    json!({
        "candidates": [{
            "content": {
                "parts": [
                    {"text": "Here is your image."},
                    {"inlineData": {"mimeType": mime_type, "data": data}}
                ]
            }
        }]
    })
}

pub fn operation(name: &str, done: bool, uri: Option<&str>) -> Value {
    let mut value = json!({ "name": name, "done": done });
    if let Some(uri) = uri {
        value["response"] = json!({
            "generateVideoResponse": {
                "generatedSamples": [{ "video": { "uri": uri } }]
            }
        });
    }
    value
}

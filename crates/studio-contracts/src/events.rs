use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Payload from a `json!` object; anything else becomes an empty payload.
pub fn event_payload(value: Value) -> EventPayload {
    match value {
        Value::Object(payload) => payload,
        _ => EventPayload::new(),
    }
}

/// Append-only `events.jsonl` log shared by every surface of a session.
///
/// Each line is one compact object: `type`, `session_id` and `ts`, then the
/// payload, whose keys win on collision. Clones append through the same
/// handle, so lines from different surfaces never interleave.
#[derive(Debug, Clone)]
pub struct EventWriter {
    log: Arc<SessionLog>,
}

#[derive(Debug)]
struct SessionLog {
    path: PathBuf,
    session_id: String,
    file: Mutex<Option<File>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            log: Arc::new(SessionLog {
                path: path.into(),
                session_id: session_id.into(),
                file: Mutex::new(None),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.log.path
    }

    pub fn session_id(&self) -> &str {
        &self.log.session_id
    }

    /// Appends one event and returns it as written.
    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let event = self.envelope(event_type, payload);
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');

        let mut file = self
            .log
            .file
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        // A failed write drops the handle; the next event reopens the file.
        let mut handle = match file.take() {
            Some(handle) => handle,
            None => open_append(&self.log.path)?,
        };
        handle
            .write_all(&line)
            .with_context(|| format!("failed appending to {}", self.log.path.display()))?;
        *file = Some(handle);
        Ok(event)
    }

    fn envelope(&self, event_type: &str, payload: EventPayload) -> Value {
        let mut event = Map::with_capacity(payload.len() + 3);
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.log.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        event.extend(payload);
        Value::Object(event)
    }
}

fn open_append(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed creating {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed opening {}", path.display()))
}

/// Reads every event line back, skipping lines that are not JSON objects.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<Map<String, Value>>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    Ok(content
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|value| match value {
            Value::Object(event) => Some(event),
            _ => None,
        })
        .collect())
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde_json::Value;

use crate::error::{MediaError, StudioResult};

/// Status, content type and raw body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self, context: &'static str) -> StudioResult<Value> {
        serde_json::from_slice(&self.body)
            .map_err(|source| MediaError::InvalidJson { context, source })
    }
}

/// The network seam of the generation client.
///
/// URLs passed in already carry the credential; implementations must not log
/// them verbatim.
pub trait MediaTransport: Send + Sync {
    fn post_json(&self, url: &str, payload: &Value) -> StudioResult<HttpReply>;
    fn get(&self, url: &str) -> StudioResult<HttpReply>;
}

pub struct ReqwestTransport {
    http: HttpClient,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: HttpClient::new(),
            timeout,
        }
    }

    fn reply(response: reqwest::blocking::Response) -> StudioResult<HttpReply> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .map_err(|err| MediaError::Transport(err.without_url()))?
            .to_vec();
        Ok(HttpReply {
            status,
            content_type,
            body,
        })
    }
}

impl MediaTransport for ReqwestTransport {
    fn post_json(&self, url: &str, payload: &Value) -> StudioResult<HttpReply> {
        let response = self
            .http
            .post(url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .map_err(|err| MediaError::Transport(err.without_url()))?;
        Self::reply(response)
    }

    fn get(&self, url: &str) -> StudioResult<HttpReply> {
        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .map_err(|err| MediaError::Transport(err.without_url()))?;
        Self::reply(response)
    }
}

/// Appends `key=<api_key>` as a query parameter, keeping any existing query.
pub fn with_api_key(url: &str, api_key: &str) -> StudioResult<String> {
    let mut parsed = Url::parse(url)
        .map_err(|err| MediaError::InvalidRequest(format!("invalid URL '{url}': {err}")))?;
    parsed.query_pairs_mut().append_pair("key", api_key);
    Ok(parsed.into())
}

/// Pulls `error.message` out of a Google-style JSON error body.
pub fn remote_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| truncate_text(body.trim(), 512))
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

use std::sync::Arc;

use serde_json::{json, Value};
use studio_contracts::jobs::{PollTick, VideoJob};
use studio_contracts::media::{
    AspectRatio, InlineImage, MediaRequest, MediaResult, DEFAULT_IMAGE_MIME, DEFAULT_VIDEO_MIME,
};

use crate::config::StudioConfig;
use crate::credentials::ApiCredential;
use crate::error::{MediaError, StudioResult};
use crate::objects::ObjectUrlStore;
use crate::poller::{CancelToken, CancellableSleep, JobPoller, Pause};
use crate::transport::{remote_error_message, with_api_key, HttpReply, MediaTransport, ReqwestTransport};

pub const ENHANCEMENT_PROMPT: &str = "Please enhance this image. Improve the resolution, remove \
pixelation and compression artifacts, make the details sharp and clear while preserving the \
original artistic style and content. The final output should be high definition and professional.";

const KEY_REQUIRED_MARKER: &str = "Requested entity was not found";

/// Calls the Gemini image and Veo video endpoints.
///
/// The client holds no credential: every operation takes the key to use for
/// that call, so a newly selected key applies to the very next request.
pub struct GeminiMediaClient {
    config: StudioConfig,
    transport: Arc<dyn MediaTransport>,
    pause: Arc<dyn Pause>,
    objects: ObjectUrlStore,
}

impl GeminiMediaClient {
    pub fn new(config: StudioConfig, objects: ObjectUrlStore) -> Self {
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout));
        Self::with_transport(config, transport, objects)
    }

    pub fn with_transport(
        config: StudioConfig,
        transport: Arc<dyn MediaTransport>,
        objects: ObjectUrlStore,
    ) -> Self {
        Self {
            config,
            transport,
            pause: Arc::new(CancellableSleep),
            objects,
        }
    }

    pub fn with_pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.pause = pause;
        self
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut StudioConfig {
        &mut self.config
    }

    pub fn objects(&self) -> &ObjectUrlStore {
        &self.objects
    }

    pub fn transport(&self) -> &dyn MediaTransport {
        self.transport.as_ref()
    }

    fn endpoint_for_model(&self, model: &str, method: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:{}", self.config.api_base, model_path, method)
    }

    /// Text-to-image, or image-to-image when `request.source` is set.
    pub fn generate_image(
        &self,
        credential: &ApiCredential,
        request: &MediaRequest,
    ) -> StudioResult<MediaResult> {
        if !request.has_prompt() {
            return Err(MediaError::InvalidRequest(
                "Please enter a prompt first.".to_string(),
            ));
        }
        let mut parts = vec![json!({ "text": request.prompt })];
        if let Some(source) = request.source.as_ref() {
            parts.push(inline_part(source));
        }
        // Image surfaces always render square, whatever the request carries.
        let payload = image_payload(parts, AspectRatio::Square.as_str());
        let response = self.post_generate_content(credential, &payload)?;
        let url = extract_inline_image(&response, MediaError::NoImageInResponse)?;
        tracing::info!(model = %self.config.image_model, "image generated");
        Ok(MediaResult::image(url))
    }

    /// Sends `source` with the fixed enhancement instruction.
    pub fn enhance_image(
        &self,
        credential: &ApiCredential,
        source: &InlineImage,
    ) -> StudioResult<MediaResult> {
        if source.data.trim().is_empty() {
            return Err(MediaError::InvalidRequest(
                "Please upload an image to enhance first.".to_string(),
            ));
        }
        let parts = vec![inline_part(source), json!({ "text": ENHANCEMENT_PROMPT })];
        let payload = image_payload(parts, AspectRatio::Square.as_str());
        let response = self.post_generate_content(credential, &payload)?;
        let url = extract_inline_image(&response, MediaError::NoEnhancedImageFound)?;
        tracing::info!(model = %self.config.image_model, "image enhanced");
        Ok(MediaResult::image(url))
    }

    /// Submits a video job, polls it to completion and registers the rendered
    /// file as an object URL.
    pub fn generate_video(
        &self,
        credential: &ApiCredential,
        request: &MediaRequest,
        cancel: &CancelToken,
        on_tick: &mut dyn FnMut(&PollTick),
    ) -> StudioResult<MediaResult> {
        let job = self.submit_video(credential, request)?;
        let job = self.await_video(credential, job, cancel, on_tick)?;
        self.fetch_video(credential, &job)
    }

    /// Polls `job` at the configured interval until the service reports it done.
    pub fn await_video(
        &self,
        credential: &ApiCredential,
        job: VideoJob,
        cancel: &CancelToken,
        on_tick: &mut dyn FnMut(&PollTick),
    ) -> StudioResult<VideoJob> {
        let poller = JobPoller::new(self.config.poll, self.pause.as_ref(), cancel);
        let job = poller.run(job, |current| self.query_video(credential, current), on_tick)?;
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        Ok(job)
    }

    pub fn submit_video(
        &self,
        credential: &ApiCredential,
        request: &MediaRequest,
    ) -> StudioResult<VideoJob> {
        if !request.has_prompt() {
            return Err(MediaError::InvalidRequest(
                "Please enter a prompt first.".to_string(),
            ));
        }
        if !request.aspect_ratio.supports_video() {
            return Err(MediaError::InvalidRequest(format!(
                "Video supports 16:9 or 9:16, not {}.",
                request.aspect_ratio
            )));
        }
        let payload = video_payload(request);
        let endpoint = self.endpoint_for_model(&self.config.video_model, "predictLongRunning");
        let reply = self
            .transport
            .post_json(&with_api_key(&endpoint, credential.expose())?, &payload)?;
        let value = expect_success("video submission", &reply)?;
        let job = parse_operation(&value, None)?;
        tracing::info!(
            model = %self.config.video_model,
            operation = %job.operation,
            "video job submitted"
        );
        Ok(job)
    }

    pub fn query_video(&self, credential: &ApiCredential, job: &VideoJob) -> StudioResult<VideoJob> {
        let url = format!(
            "{}/{}",
            self.config.api_base,
            job.operation.trim_start_matches('/')
        );
        let reply = self
            .transport
            .get(&with_api_key(&url, credential.expose())?)?;
        let value = expect_success("video status", &reply)?;
        parse_operation(&value, Some(job))
    }

    /// Downloads the finished video. The URI needs the key appended.
    pub fn fetch_video(&self, credential: &ApiCredential, job: &VideoJob) -> StudioResult<MediaResult> {
        if let Some(message) = job.error.as_ref() {
            return Err(MediaError::VideoJobFailed(message.clone()));
        }
        let Some(uri) = job
            .result_uri
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        else {
            return Err(MediaError::VideoLinkMissing);
        };
        let reply = self.transport.get(&with_api_key(uri, credential.expose())?)?;
        if !reply.is_success() {
            let err = classify_download_failure(reply.status, &reply.text());
            tracing::warn!(status = reply.status, error = %err, "video download rejected");
            return Err(err);
        }
        let mime_type = reply
            .content_type
            .as_deref()
            .filter(|value| value.starts_with("video/"))
            .unwrap_or(DEFAULT_VIDEO_MIME);
        let bytes = reply.body.len();
        let url = self.objects.create(reply.body, mime_type);
        tracing::info!(operation = %job.operation, bytes, "video downloaded");
        Ok(MediaResult::video(url))
    }

    fn post_generate_content(
        &self,
        credential: &ApiCredential,
        payload: &Value,
    ) -> StudioResult<Value> {
        let endpoint = self.endpoint_for_model(&self.config.image_model, "generateContent");
        let reply = self
            .transport
            .post_json(&with_api_key(&endpoint, credential.expose())?, payload)?;
        expect_success("image generation", &reply)
    }
}

fn inline_part(image: &InlineImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.data,
        }
    })
}

fn image_payload(parts: Vec<Value>, aspect_ratio: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": parts,
        }],
        "generationConfig": {
            "candidateCount": 1,
            "responseModalities": ["IMAGE"],
            "imageConfig": {
                "aspectRatio": aspect_ratio,
            },
        },
    })
}

fn video_payload(request: &MediaRequest) -> Value {
    let mut instance = json!({ "prompt": request.prompt });
    if let Some(source) = request.source.as_ref() {
        instance["image"] = json!({
            "bytesBase64Encoded": source.data,
            "mimeType": source.mime_type,
        });
    }
    let mut parameters = json!({
        "aspectRatio": request.aspect_ratio.as_str(),
        "sampleCount": 1,
    });
    if let Some(resolution) = request.resolution {
        parameters["resolution"] = Value::String(resolution.as_str().to_string());
    }
    json!({
        "instances": [instance],
        "parameters": parameters,
    })
}

fn expect_success(context: &'static str, reply: &HttpReply) -> StudioResult<Value> {
    if !reply.is_success() {
        return Err(MediaError::RemoteRejected {
            context,
            status: reply.status,
            message: remote_error_message(&reply.text()),
        });
    }
    reply.json(context)
}

/// First inline image of the first candidate, as a data URL.
///
/// No `candidates[0].content.parts` array is [`MediaError::EmptyResponse`];
/// parts without image data yield `missing`.
fn extract_inline_image(response: &Value, missing: MediaError) -> StudioResult<String> {
    let Some(parts) = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
    else {
        return Err(MediaError::EmptyResponse);
    };

    for part in parts {
        let Some(inline) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_IMAGE_MIME);
        return Ok(InlineImage::new(data, mime_type).to_data_url());
    }
    Err(missing)
}

fn parse_operation(value: &Value, previous: Option<&VideoJob>) -> StudioResult<VideoJob> {
    let operation = value
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| previous.map(|job| job.operation.clone()))
        .ok_or_else(|| MediaError::VideoJobFailed("operation handle missing".to_string()))?;
    let done = value.get("done").and_then(Value::as_bool).unwrap_or(false);
    let error = value.get("error").map(|error| {
        error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string())
    });
    let response = value.get("response");
    let result_uri = response
        .and_then(|response| {
            response
                .pointer("/generateVideoResponse/generatedSamples/0/video/uri")
                .or_else(|| response.pointer("/generatedVideos/0/video/uri"))
        })
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(VideoJob {
        operation,
        done,
        result_uri,
        error,
    })
}

/// Decides whether a failed video download means the key must be re-selected.
///
/// Structured `error.status` codes win; the message substring is a fallback
/// for bodies that are not JSON.
pub fn classify_download_failure(status: u16, body: &str) -> MediaError {
    let structured = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        value
            .pointer("/error/status")
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    if matches!(
        structured.as_deref(),
        Some("NOT_FOUND") | Some("PERMISSION_DENIED")
    ) {
        return MediaError::ApiKeyRequired;
    }
    if body.contains(KEY_REQUIRED_MARKER) {
        return MediaError::ApiKeyRequired;
    }
    MediaError::VideoDownloadFailed { status }
}

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use studio_contracts::events::{event_payload, EventWriter};
use studio_contracts::jobs::PollTick;
use studio_contracts::media::{
    AspectRatio, InlineImage, MediaKind, MediaRequest, MediaResult, Resolution, VideoOptions,
};

use crate::client::GeminiMediaClient;
use crate::codec::{inline_from_data_url, read_inline_image};
use crate::credentials::{ApiCredential, KeySelector};
use crate::download::{download_media, SaveSink};
use crate::error::{MediaError, StudioResult};
use crate::poller::CancelToken;

/// Event-log side of a surface. Logging failures never fail the operation.
#[derive(Debug, Clone, Default)]
struct SurfaceEvents {
    writer: Option<EventWriter>,
}

impl SurfaceEvents {
    fn emit(&self, event_type: &str, payload: Value) {
        let Some(writer) = self.writer.as_ref() else {
            return;
        };
        if let Err(err) = writer.emit(event_type, event_payload(payload)) {
            tracing::warn!(event_type, error = %err, "failed to append event");
        }
    }

    fn failed(&self, surface: &str, action: &str, err: &MediaError) {
        tracing::error!(surface, action, error = %err, "generation failed");
        self.emit(
            "generation_failed",
            json!({
                "surface": surface,
                "action": action,
                "error": err.to_string(),
                "message": err.user_message(),
                "api_key_required": err.is_api_key_required(),
            }),
        );
    }

    fn uploaded(&self, surface: &str, path: &Path, image: &InlineImage) {
        self.emit(
            "source_uploaded",
            json!({
                "surface": surface,
                "path": path.to_string_lossy(),
                "mime_type": image.mime_type,
                "payload_len": image.data.len(),
            }),
        );
    }

    fn saved(&self, surface: &str, kind: MediaKind, path: &Path) {
        self.emit(
            "media_saved",
            json!({
                "surface": surface,
                "kind": kind.as_str(),
                "path": path.to_string_lossy(),
            }),
        );
    }
}

fn require_key(keys: &dyn KeySelector) -> StudioResult<ApiCredential> {
    keys.current_key().ok_or(MediaError::MissingCredential)
}

/// Stores `result` in `slot`, revoking the object URL it replaces.
fn replace_result(
    client: &GeminiMediaClient,
    slot: &mut Option<MediaResult>,
    result: MediaResult,
) {
    if let Some(previous) = slot.replace(result) {
        if slot.as_ref().is_some_and(|current| current.url != previous.url) {
            client.objects().revoke(&previous.url);
        }
    }
}

fn save_result(
    client: &GeminiMediaClient,
    result: Option<&MediaResult>,
    sink: &dyn SaveSink,
    filename: Option<&str>,
) -> StudioResult<(MediaKind, PathBuf)> {
    let result = result.ok_or_else(|| {
        MediaError::InvalidRequest("Nothing to save yet. Generate something first.".to_string())
    })?;
    let filename = filename
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(result.kind.default_filename());
    let path = download_media(
        client.objects(),
        client.transport(),
        &result.url,
        filename,
        sink,
    )?;
    Ok((result.kind, path))
}

/// The image surface: optional source upload, text/image-to-image
/// generation, enhancement and saving.
#[derive(Debug, Default)]
pub struct ImageStudio {
    source: Option<InlineImage>,
    result: Option<MediaResult>,
    events: SurfaceEvents,
}

impl ImageStudio {
    pub fn new(events: Option<EventWriter>) -> Self {
        Self {
            source: None,
            result: None,
            events: SurfaceEvents { writer: events },
        }
    }

    pub fn source(&self) -> Option<&InlineImage> {
        self.source.as_ref()
    }

    pub fn result(&self) -> Option<&MediaResult> {
        self.result.as_ref()
    }

    pub fn upload(&mut self, path: &Path) -> StudioResult<&InlineImage> {
        let image = read_inline_image(path)
            .inspect_err(|err| self.events.failed("image", "upload", err))?;
        self.events.uploaded("image", path, &image);
        Ok(self.source.insert(image))
    }

    pub fn clear_source(&mut self) {
        self.source = None;
    }

    /// Generates from `prompt`, using the uploaded source image when present.
    /// A failure leaves the previous result in place.
    pub fn generate(
        &mut self,
        client: &GeminiMediaClient,
        keys: &dyn KeySelector,
        prompt: &str,
    ) -> StudioResult<MediaResult> {
        let outcome = require_key(keys).and_then(|credential| {
            let request = MediaRequest::image(prompt.trim(), self.source.clone());
            client.generate_image(&credential, &request)
        });
        match outcome {
            Ok(result) => {
                self.events.emit(
                    "image_generated",
                    json!({
                        "model": client.config().image_model,
                        "prompt": prompt.trim(),
                        "with_source": self.source.is_some(),
                    }),
                );
                replace_result(client, &mut self.result, result.clone());
                Ok(result)
            }
            Err(err) => {
                self.events.failed("image", "generate", &err);
                Err(err)
            }
        }
    }

    /// Enhances the current result if there is one, otherwise the uploaded
    /// source.
    pub fn enhance(
        &mut self,
        client: &GeminiMediaClient,
        keys: &dyn KeySelector,
    ) -> StudioResult<MediaResult> {
        let outcome = self.enhancement_input().and_then(|(input, origin)| {
            let credential = require_key(keys)?;
            client
                .enhance_image(&credential, &input)
                .map(|result| (result, origin))
        });
        match outcome {
            Ok((result, origin)) => {
                self.events.emit(
                    "image_enhanced",
                    json!({
                        "model": client.config().image_model,
                        "input": origin,
                    }),
                );
                replace_result(client, &mut self.result, result.clone());
                Ok(result)
            }
            Err(err) => {
                self.events.failed("image", "enhance", &err);
                Err(err)
            }
        }
    }

    fn enhancement_input(&self) -> StudioResult<(InlineImage, &'static str)> {
        if let Some(result) = self.result.as_ref() {
            return Ok((inline_from_data_url(&result.url)?, "result"));
        }
        if let Some(source) = self.source.as_ref() {
            return Ok((source.clone(), "source"));
        }
        Err(MediaError::InvalidRequest(
            "Please upload an image to enhance first.".to_string(),
        ))
    }

    pub fn save(
        &self,
        client: &GeminiMediaClient,
        sink: &dyn SaveSink,
        filename: Option<&str>,
    ) -> StudioResult<PathBuf> {
        let (kind, path) = save_result(client, self.result.as_ref(), sink, filename)
            .inspect_err(|err| self.events.failed("image", "save", err))?;
        self.events.saved("image", kind, &path);
        Ok(path)
    }
}

/// The video surface: options, optional first-frame upload, job submission
/// with key checks, polling and saving.
#[derive(Debug, Default)]
pub struct VideoStudio {
    options: VideoOptions,
    source: Option<InlineImage>,
    result: Option<MediaResult>,
    events: SurfaceEvents,
}

impl VideoStudio {
    pub fn new(events: Option<EventWriter>) -> Self {
        Self {
            events: SurfaceEvents { writer: events },
            ..Self::default()
        }
    }

    pub fn options(&self) -> VideoOptions {
        self.options
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) -> StudioResult<()> {
        if !aspect_ratio.supports_video() {
            return Err(MediaError::InvalidRequest(format!(
                "Video supports 16:9 or 9:16, not {aspect_ratio}."
            )));
        }
        self.options.aspect_ratio = aspect_ratio;
        Ok(())
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.options.resolution = resolution;
    }

    pub fn source(&self) -> Option<&InlineImage> {
        self.source.as_ref()
    }

    pub fn result(&self) -> Option<&MediaResult> {
        self.result.as_ref()
    }

    pub fn upload(&mut self, path: &Path) -> StudioResult<&InlineImage> {
        let image = read_inline_image(path)
            .inspect_err(|err| self.events.failed("video", "upload", err))?;
        self.events.uploaded("video", path, &image);
        Ok(self.source.insert(image))
    }

    pub fn clear_source(&mut self) {
        self.source = None;
    }

    /// Generates a video for `prompt`.
    ///
    /// Opens key selection first when no key is selected. When the download
    /// reports the key unusable, key selection is opened again and
    /// [`MediaError::ApiKeyRequired`] is returned; the request is not retried.
    pub fn generate(
        &mut self,
        client: &GeminiMediaClient,
        keys: &dyn KeySelector,
        prompt: &str,
        cancel: &CancelToken,
        on_tick: &mut dyn FnMut(&PollTick),
    ) -> StudioResult<MediaResult> {
        let request = MediaRequest::video(prompt.trim(), self.options, self.source.clone());
        if !request.has_prompt() {
            let err = MediaError::InvalidRequest("Please enter a prompt first.".to_string());
            self.events.failed("video", "generate", &err);
            return Err(err);
        }

        if !keys.has_selected_key() {
            self.prompt_for_key(keys, "no_key_selected");
        }

        match self.run_video(client, keys, &request, cancel, on_tick) {
            Ok(result) => {
                replace_result(client, &mut self.result, result.clone());
                Ok(result)
            }
            Err(err) => {
                self.events.failed("video", "generate", &err);
                if err.is_api_key_required() {
                    self.prompt_for_key(keys, "api_key_required");
                }
                Err(err)
            }
        }
    }

    fn run_video(
        &self,
        client: &GeminiMediaClient,
        keys: &dyn KeySelector,
        request: &MediaRequest,
        cancel: &CancelToken,
        on_tick: &mut dyn FnMut(&PollTick),
    ) -> StudioResult<MediaResult> {
        let credential = require_key(keys)?;
        let job = client.submit_video(&credential, request)?;
        self.events.emit(
            "video_job_submitted",
            json!({
                "model": client.config().video_model,
                "operation": job.operation,
                "aspect_ratio": request.aspect_ratio.as_str(),
                "resolution": request.resolution.map(|value| value.as_str()),
                "with_source": request.source.is_some(),
            }),
        );

        let events = &self.events;
        let job = client.await_video(&credential, job, cancel, &mut |tick: &PollTick| {
            events.emit(
                "video_job_polled",
                json!({
                    "operation": tick.job.operation,
                    "cycle": tick.cycle,
                    "waited_s": tick.waited.as_secs(),
                    "done": tick.job.done,
                }),
            );
            on_tick(tick);
        })?;

        let result = client.fetch_video(&credential, &job)?;
        self.events.emit(
            "video_ready",
            json!({
                "operation": job.operation,
                "url": result.url,
            }),
        );
        Ok(result)
    }

    fn prompt_for_key(&self, keys: &dyn KeySelector, reason: &str) {
        self.events
            .emit("api_key_prompted", json!({ "reason": reason }));
        if let Err(err) = keys.open_select_key() {
            tracing::warn!(error = %err, "key selection failed");
        }
    }

    pub fn save(
        &self,
        client: &GeminiMediaClient,
        sink: &dyn SaveSink,
        filename: Option<&str>,
    ) -> StudioResult<PathBuf> {
        let (kind, path) = save_result(client, self.result.as_ref(), sink, filename)
            .inspect_err(|err| self.events.failed("video", "save", err))?;
        self.events.saved("video", kind, &path);
        Ok(path)
    }
}

use std::env;
use std::time::Duration;

use studio_contracts::models::{Capability, ModelSelector};

use crate::credentials::non_empty_env;
use crate::poller::PollPolicy;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Engine settings resolved from `GEMINI_API_BASE` and the `MEDIA_STUDIO_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    pub api_base: String,
    pub image_model: String,
    pub video_model: String,
    pub request_timeout: Duration,
    pub poll: PollPolicy,
    /// Reasons a requested model was replaced by the registry default.
    pub warnings: Vec<String>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self::resolve(None, None, None, None, None, None)
    }
}

impl StudioConfig {
    pub fn from_env() -> Self {
        Self::resolve(
            env::var("GEMINI_API_BASE").ok(),
            non_empty_env("MEDIA_STUDIO_IMAGE_MODEL"),
            non_empty_env("MEDIA_STUDIO_VIDEO_MODEL"),
            non_empty_env("MEDIA_STUDIO_POLL_INTERVAL"),
            non_empty_env("MEDIA_STUDIO_POLL_TIMEOUT"),
            non_empty_env("MEDIA_STUDIO_REQUEST_TIMEOUT"),
        )
    }

    fn resolve(
        api_base: Option<String>,
        image_model: Option<String>,
        video_model: Option<String>,
        poll_interval: Option<String>,
        poll_timeout: Option<String>,
        request_timeout: Option<String>,
    ) -> Self {
        let mut config = Self {
            api_base: api_base
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            image_model: String::new(),
            video_model: String::new(),
            request_timeout: seconds_from(request_timeout.as_deref(), 120.0, 10.0, 600.0),
            poll: PollPolicy {
                interval: seconds_from(poll_interval.as_deref(), 10.0, 1.0, 60.0),
                deadline: Some(seconds_from(poll_timeout.as_deref(), 900.0, 30.0, 3600.0)),
            },
            warnings: Vec::new(),
        };
        config.set_image_model(image_model.as_deref());
        config.set_video_model(video_model.as_deref());
        config
    }

    pub fn set_image_model(&mut self, requested: Option<&str>) {
        self.image_model = self.select_model(requested, Capability::Image);
    }

    pub fn set_video_model(&mut self, requested: Option<&str>) {
        self.video_model = self.select_model(requested, Capability::Video);
    }

    fn select_model(&mut self, requested: Option<&str>, capability: Capability) -> String {
        match ModelSelector::new(None).select(requested, capability) {
            Ok(selection) => {
                if selection.requested.is_some() {
                    if let Some(reason) = selection.fallback_reason {
                        push_unique_warning(&mut self.warnings, reason);
                    }
                }
                selection.model.name
            }
            // An empty registry still lets callers pass through an explicit model.
            Err(reason) => {
                push_unique_warning(&mut self.warnings, reason.to_string());
                requested.unwrap_or_default().trim().to_string()
            }
        }
    }
}

fn seconds_from(raw: Option<&str>, default: f64, min: f64, max: f64) -> Duration {
    let parsed = raw.and_then(|value| value.trim().parse::<f64>().ok());
    Duration::from_secs_f64(parsed.unwrap_or(default).clamp(min, max))
}

fn push_unique_warning(warnings: &mut Vec<String>, message: String) {
    if message.trim().is_empty() {
        return;
    }
    if warnings.iter().any(|existing| existing == &message) {
        return;
    }
    warnings.push(message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_hosted_api() {
        let config = StudioConfig::default();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.image_model, "gemini-2.5-flash-image");
        assert_eq!(config.video_model, "veo-3.1-fast-generate-preview");
        assert_eq!(config.poll.interval, Duration::from_secs(10));
        assert_eq!(config.poll.deadline, Some(Duration::from_secs(900)));
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn timings_are_parsed_and_clamped() {
        let config = StudioConfig::resolve(
            Some("https://proxy.test/v1beta/".to_string()),
            None,
            None,
            Some("0.2".to_string()),
            Some("99999".to_string()),
            Some("not-a-number".to_string()),
        );
        assert_eq!(config.api_base, "https://proxy.test/v1beta");
        assert_eq!(config.poll.interval, Duration::from_secs(1));
        assert_eq!(config.poll.deadline, Some(Duration::from_secs(3600)));
        assert_eq!(config.request_timeout, Duration::from_secs(120));
    }

    #[test]
    fn unknown_models_fall_back_with_warning() {
        let config = StudioConfig::resolve(
            None,
            Some("veo-3.1-generate-preview".to_string()),
            Some("veo-3.1-generate-preview".to_string()),
            None,
            None,
            None,
        );
        assert_eq!(config.image_model, "gemini-2.5-flash-image");
        assert_eq!(config.video_model, "veo-3.1-generate-preview");
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains("unavailable for capability 'image'"));
    }
}

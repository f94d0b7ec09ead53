use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_IMAGE_MIME: &str = "image/png";
pub const DEFAULT_VIDEO_MIME: &str = "video/mp4";

/// Base64 payload plus MIME type, as sent in an inline data part.
///
/// `data` never carries the `data:<mime>;base64,` prefix.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    pub data: String,
    pub mime_type: String,
}

impl InlineImage {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

// Payloads can be megabytes of base64; keep debug output readable.
impl fmt::Debug for InlineImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineImage")
            .field("mime_type", &self.mime_type)
            .field("data_len", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
        }
    }

    /// Video models only render 16:9 and 9:16.
    pub fn supports_video(&self) -> bool {
        matches!(self, AspectRatio::Landscape | AspectRatio::Portrait)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "square" => return Ok(AspectRatio::Square),
            "landscape" | "wide" => return Ok(AspectRatio::Landscape),
            "portrait" | "tall" => return Ok(AspectRatio::Portrait),
            _ => {}
        }
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == normalized)
            .ok_or_else(|| {
                format!("unsupported aspect ratio '{raw}' (expected 1:1, 16:9, 9:16, 3:4 or 4:3)")
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Resolution {
    #[default]
    #[serde(rename = "720p")]
    Hd,
    #[serde(rename = "1080p")]
    FullHd,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Hd => "720p",
            Resolution::FullHd => "1080p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "720p" | "720" | "hd" => Ok(Resolution::Hd),
            "1080p" | "1080" | "fullhd" | "full_hd" => Ok(Resolution::FullHd),
            _ => Err(format!(
                "unsupported resolution '{raw}' (expected 720p or 1080p)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOptions {
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::Landscape,
            resolution: Resolution::Hd,
        }
    }
}

/// One user action against the remote API. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequest {
    pub prompt: String,
    pub source: Option<InlineImage>,
    pub aspect_ratio: AspectRatio,
    pub resolution: Option<Resolution>,
}

impl MediaRequest {
    /// Image operations always ask for a single square output.
    pub fn image(prompt: impl Into<String>, source: Option<InlineImage>) -> Self {
        Self {
            prompt: prompt.into(),
            source,
            aspect_ratio: AspectRatio::Square,
            resolution: None,
        }
    }

    pub fn video(
        prompt: impl Into<String>,
        options: VideoOptions,
        source: Option<InlineImage>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            source,
            aspect_ratio: options.aspect_ratio,
            resolution: Some(options.resolution),
        }
    }

    pub fn has_prompt(&self) -> bool {
        !self.prompt.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn default_filename(&self) -> &'static str {
        match self {
            MediaKind::Image => "studio-image.png",
            MediaKind::Video => "studio-video.mp4",
        }
    }
}

/// A displayable result: a `data:` URL for images, an object URL for videos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaResult {
    pub url: String,
    pub kind: MediaKind,
}

impl MediaResult {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Image,
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Video,
        }
    }

    pub fn is_data_url(&self) -> bool {
        self.url.starts_with("data:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_parses_literals_and_keywords() {
        assert_eq!("16:9".parse::<AspectRatio>(), Ok(AspectRatio::Landscape));
        assert_eq!(" 9:16 ".parse::<AspectRatio>(), Ok(AspectRatio::Portrait));
        assert_eq!("tall".parse::<AspectRatio>(), Ok(AspectRatio::Portrait));
        assert_eq!("4:3".parse::<AspectRatio>(), Ok(AspectRatio::Landscape4x3));
        assert!("2:1".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn only_widescreen_ratios_support_video() {
        let video: Vec<&str> = AspectRatio::ALL
            .into_iter()
            .filter(AspectRatio::supports_video)
            .map(|ratio| ratio.as_str())
            .collect();
        assert_eq!(video, vec!["16:9", "9:16"]);
    }

    #[test]
    fn resolution_accepts_short_forms() {
        assert_eq!("1080".parse::<Resolution>(), Ok(Resolution::FullHd));
        assert_eq!("720P".parse::<Resolution>(), Ok(Resolution::Hd));
        assert!("4k".parse::<Resolution>().is_err());
    }

    #[test]
    fn image_requests_are_square_without_resolution() {
        let request = MediaRequest::image("a red cube", None);
        assert_eq!(request.aspect_ratio, AspectRatio::Square);
        assert_eq!(request.resolution, None);
        assert!(request.has_prompt());
        assert!(!MediaRequest::image("   ", None).has_prompt());
    }

    #[test]
    fn video_request_serializes_wire_strings() -> anyhow::Result<()> {
        let request = MediaRequest::video(
            "waves at dusk",
            VideoOptions {
                aspect_ratio: AspectRatio::Portrait,
                resolution: Resolution::FullHd,
            },
            None,
        );
        let value = serde_json::to_value(&request)?;
        assert_eq!(value["aspect_ratio"], "9:16");
        assert_eq!(value["resolution"], "1080p");
        Ok(())
    }

    #[test]
    fn inline_image_debug_omits_payload() {
        let image = InlineImage::new("QUJD", "image/jpeg");
        let rendered = format!("{image:?}");
        assert!(rendered.contains("image/jpeg"));
        assert!(!rendered.contains("QUJD"));
        assert_eq!(image.to_data_url(), "data:image/jpeg;base64,QUJD");
    }
}

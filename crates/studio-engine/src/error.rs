use std::path::PathBuf;
use std::time::Duration;

pub type StudioResult<T> = std::result::Result<T, MediaError>;

/// Every way a studio operation can fail.
///
/// Only [`MediaError::ApiKeyRequired`] has its own recovery path (re-select a
/// key, then let the user retry); everything else ends the attempt.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("failed reading {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no API key selected")]
    MissingCredential,

    #[error("empty response from model")]
    EmptyResponse,

    #[error("no image found in response")]
    NoImageInResponse,

    #[error("no enhanced image found in response")]
    NoEnhancedImageFound,

    #[error("{context} rejected ({status}): {message}")]
    RemoteRejected {
        context: &'static str,
        status: u16,
        message: String,
    },

    #[error("video generation failed: {0}")]
    VideoJobFailed(String),

    #[error("video generation failed: download link missing")]
    VideoLinkMissing,

    #[error("API key required: select a key with billing enabled and retry")]
    ApiKeyRequired,

    #[error("video download failed ({status})")]
    VideoDownloadFailed { status: u16 },

    #[error("video job still running after {}s", .waited.as_secs())]
    PollTimeout { waited: Duration },

    #[error("operation cancelled")]
    Cancelled,

    #[error("object URL not found: {0}")]
    ObjectUrlNotFound(String),

    #[error("failed saving {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{context} returned invalid JSON payload")]
    InvalidJson {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl MediaError {
    pub fn is_api_key_required(&self) -> bool {
        matches!(self, MediaError::ApiKeyRequired)
    }

    /// Short alert text for the person at the keyboard.
    pub fn user_message(&self) -> String {
        match self {
            MediaError::Read { .. } => {
                "Could not read the selected file. Please choose it again.".to_string()
            }
            MediaError::InvalidDataUrl(_) => "The image data is not a valid data URL.".to_string(),
            MediaError::InvalidRequest(reason) => reason.clone(),
            MediaError::MissingCredential => {
                "No API key selected. Use /key or set GEMINI_API_KEY.".to_string()
            }
            MediaError::EmptyResponse | MediaError::NoImageInResponse => {
                "An error occurred while generating the image.".to_string()
            }
            MediaError::NoEnhancedImageFound => {
                "An error occurred while enhancing the image.".to_string()
            }
            MediaError::ApiKeyRequired => "Please select an API key from a GCP project with \
                billing enabled to use video generation."
                .to_string(),
            MediaError::VideoJobFailed(_)
            | MediaError::VideoLinkMissing
            | MediaError::VideoDownloadFailed { .. }
            | MediaError::PollTimeout { .. } => {
                "An error occurred while generating the video. Check that your API key is valid."
                    .to_string()
            }
            MediaError::Cancelled => "The operation was cancelled.".to_string(),
            MediaError::ObjectUrlNotFound(_) | MediaError::Save { .. } => {
                "The file could not be downloaded.".to_string()
            }
            MediaError::RemoteRejected { .. }
            | MediaError::InvalidJson { .. }
            | MediaError::Transport(_) => {
                "The media service request failed. Check your API key and connection.".to_string()
            }
        }
    }
}

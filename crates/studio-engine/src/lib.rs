//! Media studio engine: Gemini image generation and enhancement, Veo video
//! jobs, object URLs and the two studio surfaces built on top of them.

pub mod client;
pub mod codec;
pub mod config;
pub mod credentials;
pub mod download;
pub mod error;
pub mod objects;
pub mod poller;
pub mod studio;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use client::{classify_download_failure, GeminiMediaClient, ENHANCEMENT_PROMPT};
pub use config::StudioConfig;
pub use credentials::{ApiCredential, EnvKeySelector, KeySelector};
pub use download::{download_media, DirectorySink, SaveSink};
pub use error::{MediaError, StudioResult};
pub use objects::ObjectUrlStore;
pub use poller::{CancelToken, PollPolicy};
pub use studio::{ImageStudio, VideoStudio};

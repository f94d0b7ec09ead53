mod registry;
mod selectors;

pub use registry::{
    Capability, ModelRegistry, ModelSpec, DEFAULT_IMAGE_MODEL, DEFAULT_VIDEO_MODEL,
};
pub use selectors::{ModelSelection, ModelSelector, NoModelAvailable};

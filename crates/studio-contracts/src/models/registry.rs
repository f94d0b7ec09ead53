use std::fmt;

use indexmap::IndexMap;

pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Image,
    Edit,
    Video,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Image => "image",
            Capability::Edit => "edit",
            Capability::Video => "video",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub family: String,
    pub capabilities: Vec<Capability>,
}

impl ModelSpec {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name.trim().trim_start_matches("models/"))
    }

    /// Models supporting `capability`, in registration order (first is the default).
    pub fn by_capability(&self, capability: Capability) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, family: &str, capabilities: &[Capability]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                family: family.to_string(),
                capabilities: capabilities.to_vec(),
            },
        );
    };

    insert(
        DEFAULT_IMAGE_MODEL,
        "gemini",
        &[Capability::Image, Capability::Edit],
    );
    insert(
        "gemini-3-pro-image-preview",
        "gemini",
        &[Capability::Image, Capability::Edit],
    );
    insert(DEFAULT_VIDEO_MODEL, "veo", &[Capability::Video]);
    insert("veo-3.1-generate-preview", "veo", &[Capability::Video]);
    insert("veo-3.0-fast-generate-001", "veo", &[Capability::Video]);
    insert("veo-3.0-generate-001", "veo", &[Capability::Video]);

    map
}

use std::fmt;

use super::registry::{Capability, ModelRegistry, ModelSpec};

/// Outcome of resolving a requested model name for one capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    /// Set whenever the default stands in for what was asked.
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoModelAvailable(pub Capability);

impl fmt::Display for NoModelAvailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No models available for capability '{}'.", self.0)
    }
}

impl std::error::Error for NoModelAvailable {}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn select(
        &self,
        requested: Option<&str>,
        capability: Capability,
    ) -> Result<ModelSelection, NoModelAvailable> {
        let requested = requested
            .map(|value| value.trim().trim_start_matches("models/"))
            .filter(|value| !value.is_empty());
        let Some(name) = requested else {
            return self.default_for(
                capability,
                None,
                "No model specified; using default.".to_string(),
            );
        };

        let resolved = match self.registry.get(name) {
            Some(known) => known.supports(capability).then(|| known.clone()),
            None => unlisted(name, capability),
        };
        match resolved {
            Some(model) => Ok(ModelSelection {
                model,
                requested: Some(name.to_string()),
                fallback_reason: None,
            }),
            None => self.default_for(
                capability,
                Some(name.to_string()),
                format!("Requested model '{name}' unavailable for capability '{capability}'."),
            ),
        }
    }

    fn default_for(
        &self,
        capability: Capability,
        requested: Option<String>,
        reason: String,
    ) -> Result<ModelSelection, NoModelAvailable> {
        let model = self
            .registry
            .by_capability(capability)
            .into_iter()
            .next()
            .ok_or(NoModelAvailable(capability))?;
        Ok(ModelSelection {
            model,
            requested,
            fallback_reason: Some(reason),
        })
    }
}

/// Releases newer than the registry still resolve when the name belongs to
/// the family serving `capability`.
fn unlisted(name: &str, capability: Capability) -> Option<ModelSpec> {
    let family = match capability {
        Capability::Image | Capability::Edit
            if name.starts_with("gemini-") && name.contains("-image") =>
        {
            "gemini"
        }
        Capability::Video if name.starts_with("veo-") => "veo",
        _ => return None,
    };
    Some(ModelSpec {
        name: name.to_string(),
        family: family.to_string(),
        capabilities: vec![capability],
    })
}

use std::env;
use std::fmt;

use crate::error::StudioResult;

pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

/// The API key for one call. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential(String);

impl ApiCredential {
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return None;
        }
        Some(Self(key))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiCredential(<redacted>)")
    }
}

/// Host-provided key selection.
///
/// `current_key` is consulted right before every remote call so a freshly
/// selected key takes effect without rebuilding anything.
pub trait KeySelector {
    fn has_selected_key(&self) -> bool {
        self.current_key().is_some()
    }

    /// Asks the user to pick a key. Returning `Ok` does not guarantee a key
    /// was chosen.
    fn open_select_key(&self) -> StudioResult<()>;

    fn current_key(&self) -> Option<ApiCredential>;
}

/// Reads the key from the environment on every call.
#[derive(Debug, Clone, Default)]
pub struct EnvKeySelector;

impl KeySelector for EnvKeySelector {
    fn open_select_key(&self) -> StudioResult<()> {
        tracing::warn!(
            vars = API_KEY_ENV_VARS.join(", "),
            "no interactive key selection available; set one of the environment variables"
        );
        Ok(())
    }

    fn current_key(&self) -> Option<ApiCredential> {
        API_KEY_ENV_VARS
            .iter()
            .find_map(|key| non_empty_env(key))
            .and_then(ApiCredential::new)
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_keys_are_rejected() {
        assert!(ApiCredential::new("   ").is_none());
        assert_eq!(
            ApiCredential::new(" abc ").map(|key| key.expose().to_string()),
            Some("abc".to_string())
        );
    }

    #[test]
    fn debug_output_is_redacted() {
        let key = ApiCredential::new("super-secret").unwrap();
        assert!(!format!("{key:?}").contains("super-secret"));
    }
}

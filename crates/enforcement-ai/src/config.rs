use std::env;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_RECOMMENDATION_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_SUMMARY_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];
const ENDPOINT_VAR: &str = "NCENF_AI_ENDPOINT";
const RECOMMENDATION_MODEL_VAR: &str = "NCENF_AI_RECOMMENDATION_MODEL";
const SUMMARY_MODEL_VAR: &str = "NCENF_AI_SUMMARY_MODEL";
const TIMEOUT_VAR: &str = "NCENF_AI_TIMEOUT_MS";

#[derive(Clone, PartialEq, Eq)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub recommendation_model: String,
    pub summary_model: String,
    pub timeout_ms: u64,
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("recommendation_model", &self.recommendation_model)
            .field("summary_model", &self.summary_model)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            recommendation_model: DEFAULT_RECOMMENDATION_MODEL.to_string(),
            summary_model: DEFAULT_SUMMARY_MODEL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl AiConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolve settings through `lookup`; blank values count as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name).map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        Self {
            api_key: API_KEY_VARS.iter().find_map(|&name| read(name)),
            endpoint: read(ENDPOINT_VAR)
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.endpoint),
            recommendation_model: read(RECOMMENDATION_MODEL_VAR)
                .unwrap_or(defaults.recommendation_model),
            summary_model: read(SUMMARY_MODEL_VAR).unwrap_or(defaults.summary_model),
            timeout_ms: read(TIMEOUT_VAR)
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(defaults.timeout_ms),
        }
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<HashMap<_, _>>();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = AiConfig::from_lookup(|_| None);
        assert_eq!(config, AiConfig::default());
        assert!(!config.has_credentials());
    }

    #[test]
    fn gemini_key_wins_over_legacy_api_key() {
        let config =
            AiConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "primary"), ("API_KEY", "legacy")]));
        assert_eq!(config.api_key.as_deref(), Some("primary"));

        let legacy =
            AiConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "  "), ("API_KEY", "legacy")]));
        assert_eq!(legacy.api_key.as_deref(), Some("legacy"));
    }

    #[test]
    fn overrides_and_invalid_timeout() {
        let config = AiConfig::from_lookup(lookup(&[
            ("NCENF_AI_ENDPOINT", "http://127.0.0.1:9000/v1beta/"),
            ("NCENF_AI_SUMMARY_MODEL", "local-summary"),
            ("NCENF_AI_TIMEOUT_MS", "not-a-number"),
        ]));
        assert_eq!(config.endpoint, "http://127.0.0.1:9000/v1beta");
        assert_eq!(config.summary_model, "local-summary");
        assert_eq!(config.recommendation_model, DEFAULT_RECOMMENDATION_MODEL);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let config = AiConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "secret-value")]));
        assert!(!format!("{config:?}").contains("secret-value"));
    }
}

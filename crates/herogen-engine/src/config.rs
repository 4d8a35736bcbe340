use std::env;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Credential variables, checked in order.
pub const API_KEY_VARS: &[&str] = &["API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"];

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl GenerationConfig {
    /// Endpoint and model from the environment. The credential is not part of
    /// the config; it is looked up on every call.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base: non_empty_env("HEROGEN_API_BASE")
                .or_else(|| non_empty_env("GEMINI_API_BASE"))
                .map(|value| normalize_api_base(&value))
                .unwrap_or(defaults.api_base),
            model: non_empty_env("HEROGEN_MODEL").unwrap_or(defaults.model),
            temperature: defaults.temperature,
        }
    }

    pub fn with_overrides(mut self, api_base: Option<&str>, model: Option<&str>) -> Self {
        if let Some(api_base) = api_base.map(str::trim).filter(|value| !value.is_empty()) {
            self.api_base = normalize_api_base(api_base);
        }
        if let Some(model) = model.map(str::trim).filter(|value| !value.is_empty()) {
            self.model = model.to_string();
        }
        self
    }

    pub fn endpoint(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

pub fn resolve_api_key() -> Option<String> {
    API_KEY_VARS.iter().find_map(|key| non_empty_env(key))
}

pub fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn normalize_api_base(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

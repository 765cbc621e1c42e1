use crate::error::{AppError, Result};
use dotenvy::dotenv;
use std::env;

/// Model used when `GEMINI_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Clone, Debug)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub model_name: String,
}

impl Config {
    /// Loads configuration from the environment (and `.env`, if present).
    ///
    /// A missing API key is not an error here; it fails each generation
    /// attempt instead, see [`Config::api_key`].
    pub fn load() -> Self {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();

        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let model_name = env::var("GEMINI_MODEL")
            .ok()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Self {
            gemini_api_key: api_key,
            model_name,
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Returns the API key, or a configuration error if none is set.
    pub fn api_key(&self) -> Result<&str> {
        self.gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                AppError::config("GEMINI_API_KEY is not set. Add it to your environment or .env file.")
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model_name: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Builder for [`Config`], used for CLI overrides and tests.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    api_key: Option<String>,
    model: Option<String>,
}

impl ConfigBuilder {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Starts from an existing config so only the overridden fields change.
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.gemini_api_key.clone(),
            model: Some(config.model_name.clone()),
        }
    }

    pub fn build(self) -> Result<Config> {
        let model_name = match self.model {
            Some(model) if model.trim().is_empty() => {
                return Err(AppError::config("Model name must not be empty"));
            }
            Some(model) => model,
            None => DEFAULT_MODEL.to_string(),
        };

        Ok(Config {
            gemini_api_key: self.api_key.filter(|key| !key.trim().is_empty()),
            model_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_model() {
        let config = Config::builder().with_api_key("key").build().unwrap();
        assert_eq!(config.model_name, DEFAULT_MODEL);
        assert_eq!(config.api_key().unwrap(), "key");
    }

    #[test]
    fn blank_key_is_treated_as_missing() {
        let config = Config::builder().with_api_key("   ").build().unwrap();
        assert!(config.gemini_api_key.is_none());
        assert!(matches!(config.api_key(), Err(AppError::Config(_))));
    }

    #[test]
    fn missing_key_message_names_the_variable() {
        let err = Config::default().api_key().unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn empty_model_override_is_rejected() {
        let result = Config::builder().with_model("").build();
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn from_config_keeps_untouched_fields() {
        let base = Config::builder()
            .with_api_key("key")
            .with_model("gemini-2.5-flash-image")
            .build()
            .unwrap();
        let overridden = ConfigBuilder::from_config(&base)
            .with_model("nano-banana-pro-preview")
            .build()
            .unwrap();
        assert_eq!(overridden.gemini_api_key.as_deref(), Some("key"));
        assert_eq!(overridden.model_name, "nano-banana-pro-preview");
    }
}

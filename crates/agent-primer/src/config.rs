//! Settings read from the environment.

use std::env;

use primer_openai_model::{OpenAIConfig, OpenAIConfigBuilder, OpenAIProvider};
use thiserror::Error;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_OPENROUTER_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://pizza_order_agent_data.db";

/// A required setting is missing.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    MissingVar(&'static str),
}

/// Which models to talk to and where the pizza orders are stored.
#[derive(Clone, Debug, Default)]
pub struct ModelSettings {
    google_api_key: Option<String>,
    gemini_base_url: Option<String>,
    gemini_model: Option<String>,
    openrouter_api_key: Option<String>,
    openrouter_model: Option<String>,
    database_url: Option<String>,
}

impl ModelSettings {
    /// Reads the settings from process environment variables.
    #[inline]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the settings through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        Self {
            google_api_key: var("GOOGLE_API_KEY"),
            gemini_base_url: var("GEMINI_BASE_URL"),
            gemini_model: var("GEMINI_MODEL"),
            openrouter_api_key: var("OPENROUTER_API_KEY"),
            openrouter_model: var("OPENROUTER_MODEL"),
            database_url: var("PIZZA_DATABASE_URL"),
        }
    }

    /// Configuration for Gemini through its OpenAI-compatible endpoint.
    pub fn gemini_config(&self) -> Result<OpenAIConfig, ConfigError> {
        let api_key = self
            .google_api_key
            .as_deref()
            .ok_or(ConfigError::MissingVar("GOOGLE_API_KEY"))?;
        let mut builder = OpenAIConfigBuilder::gemini(api_key).with_model(
            self.gemini_model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL),
        );
        if let Some(base_url) = &self.gemini_base_url {
            builder = builder.with_base_url(base_url);
        }
        Ok(builder.build())
    }

    /// Configuration for OpenRouter.
    pub fn openrouter_config(&self) -> Result<OpenAIConfig, ConfigError> {
        let api_key = self
            .openrouter_api_key
            .as_deref()
            .ok_or(ConfigError::MissingVar("OPENROUTER_API_KEY"))?;
        let model = self
            .openrouter_model
            .as_deref()
            .unwrap_or(DEFAULT_OPENROUTER_MODEL);
        Ok(OpenAIConfigBuilder::openrouter(api_key)
            .with_model(model)
            .build())
    }

    #[inline]
    pub fn gemini_provider(&self) -> Result<OpenAIProvider, ConfigError> {
        self.gemini_config().map(OpenAIProvider::new)
    }

    #[inline]
    pub fn openrouter_provider(&self) -> Result<OpenAIProvider, ConfigError> {
        self.openrouter_config().map(OpenAIProvider::new)
    }

    /// Returns the database the pizza orders are stored in.
    #[inline]
    pub fn database_url(&self) -> &str {
        self.database_url.as_deref().unwrap_or(DEFAULT_DATABASE_URL)
    }
}

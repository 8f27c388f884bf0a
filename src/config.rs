//! Application settings: stored values from the settings table, overridden
//! by environment variables, and turned into an LLM provider.

use crate::context::DEFAULT_MAX_CONTEXT_CHARS;
use crate::db::Database;
use crate::llm::{self, ModelInfo, Provider};
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "gemini/gemini-2.5-flash";

pub const SETTING_KEYS: &[&str] = &[
    "gemini_api_key",
    "openai_api_key",
    "openai_base_url",
    "claude_api_key",
    "claude_base_url",
    "ollama_host",
    "default_model",
    "max_context_chars",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Settings database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Unknown setting key: {0}")]
    UnknownKey(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("{0} API key not configured")]
    MissingApiKey(&'static str),
}

impl serde::Serialize for ConfigError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Directory holding the settings database when no app handle provides one
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("preppal"))
        .unwrap_or_else(|| PathBuf::from(".preppal"))
}

fn env_var_for(key: &str) -> Option<&'static str> {
    match key {
        "gemini_api_key" => Some("GEMINI_API_KEY"),
        "openai_api_key" => Some("OPENAI_API_KEY"),
        "claude_api_key" => Some("ANTHROPIC_API_KEY"),
        "default_model" => Some("PREPPAL_MODEL"),
        _ => None,
    }
}

/// Resolves settings against the database with an environment override
pub struct Settings<'a> {
    db: &'a Database,
    env: Box<dyn Fn(&str) -> Option<String> + 'a>,
}

impl<'a> Settings<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self::with_env(db, |name| std::env::var(name).ok())
    }

    pub fn with_env(db: &'a Database, env: impl Fn(&str) -> Option<String> + 'a) -> Self {
        Self {
            db,
            env: Box::new(env),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        if let Some(value) = env_var_for(key)
            .and_then(|name| (self.env)(name))
            .filter(|v| !v.trim().is_empty())
        {
            return Ok(Some(value));
        }
        Ok(self.db.get_setting(key)?)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        if !SETTING_KEYS.contains(&key) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        if key == "max_context_chars" && value.trim().parse::<usize>().map_or(true, |n| n == 0) {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        self.db.set_setting(key, value.trim())?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), ConfigError> {
        if !SETTING_KEYS.contains(&key) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        self.db.delete_setting(key)?;
        Ok(())
    }

    pub fn default_model(&self) -> Result<String, ConfigError> {
        Ok(self
            .get("default_model")?
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()))
    }

    pub fn max_context_chars(&self) -> Result<usize, ConfigError> {
        Ok(self
            .get("max_context_chars")?
            .and_then(|v| v.trim().parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONTEXT_CHARS))
    }

    /// All stored settings, API keys masked for display
    pub fn masked(&self) -> Result<HashMap<String, String>, ConfigError> {
        let mut map = HashMap::new();
        for key in SETTING_KEYS {
            if let Some(value) = self.get(key)? {
                map.insert(key.to_string(), mask(key, &value));
            }
        }
        Ok(map)
    }

    /// Resolve an LLM provider from a model string like "gemini/...", "openai/...", "claude/...", "ollama/..."
    pub fn resolve_provider(&self, model: &str) -> Result<(Provider, String), ConfigError> {
        if let Some(model_id) = model.strip_prefix("ollama/") {
            let host = self
                .get("ollama_host")?
                .unwrap_or_else(|| "http://localhost:11434".to_string());
            Ok((Provider::ollama(host), model_id.to_string()))
        } else if let Some(model_id) = model.strip_prefix("claude/") {
            let api_key = self
                .get("claude_api_key")?
                .ok_or(ConfigError::MissingApiKey("Claude"))?;
            let base_url = self
                .get("claude_base_url")?
                .unwrap_or_else(|| "https://api.anthropic.com".to_string());
            Ok((
                Provider::Claude(llm::claude::ClaudeConfig { api_key, base_url }),
                model_id.to_string(),
            ))
        } else if let Some(model_id) = model.strip_prefix("openai/") {
            let api_key = self
                .get("openai_api_key")?
                .ok_or(ConfigError::MissingApiKey("OpenAI"))?;
            let base_url = self
                .get("openai_base_url")?
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
            Ok((
                Provider::OpenAi(llm::openai::OpenAiConfig { api_key, base_url }),
                model_id.to_string(),
            ))
        } else {
            let model_id = model.strip_prefix("gemini/").unwrap_or(model);
            let api_key = self
                .get("gemini_api_key")?
                .ok_or(ConfigError::MissingApiKey("Gemini"))?;
            Ok((Provider::gemini(api_key), model_id.to_string()))
        }
    }

    pub fn available_models(&self) -> Result<Vec<ModelInfo>, ConfigError> {
        let mut models = Vec::new();

        if self.get("gemini_api_key")?.is_some() {
            models.extend([
                model_info("gemini/gemini-2.5-flash", "Gemini 2.5 Flash", "Google"),
                model_info("gemini/gemini-2.5-pro", "Gemini 2.5 Pro", "Google"),
            ]);
        }

        if self.get("openai_api_key")?.is_some() {
            models.extend([
                model_info("openai/gpt-4o", "GPT-4o", "OpenAI"),
                model_info("openai/gpt-4o-mini", "GPT-4o Mini", "OpenAI"),
                model_info("openai/gpt-4.1", "GPT-4.1", "OpenAI"),
            ]);
        }

        if self.get("claude_api_key")?.is_some() {
            models.extend([
                model_info("claude/claude-sonnet-4-20250514", "Claude Sonnet 4", "Anthropic"),
                model_info("claude/claude-haiku-3-5-20241022", "Claude Haiku 3.5", "Anthropic"),
            ]);
        }

        // Ollama models (always available, local)
        models.extend([
            model_info("ollama/llama3", "Llama 3", "Ollama"),
            model_info("ollama/qwen2.5", "Qwen 2.5", "Ollama"),
        ]);

        Ok(models)
    }
}

fn model_info(id: &str, name: &str, provider: &str) -> ModelInfo {
    ModelInfo {
        id: id.into(),
        name: name.into(),
        provider: provider.into(),
    }
}

fn mask(key: &str, value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if key.ends_with("_api_key") && chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        value.to_string()
    }
}

use crate::errors::{GeminiError, GeminiResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// System instruction given to every chat session
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
* You are the chat bot for Alaska's Department of Snow (ADS).
* You are friendly, but brief.
* You answer questions related to the department and weather in Alaska, if a
client asks a question about something else remind them that you are \"only the
agent for ADS, and can not speak for topics outside of that.
* Reference Rag tool when answering FAQ about the department, there may be
information related to the topic that can be mentioned as well.";

/// Configuration struct for Gemini API
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    pub model_name: Option<String>,
    pub api_base: Option<String>,
    pub temperature: Option<f32>,
    pub request_timeout_secs: Option<u64>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            model_name: Some(DEFAULT_MODEL.to_string()),
            api_base: Some(DEFAULT_API_BASE.to_string()),
            temperature: None,
            request_timeout_secs: Some(60),
        }
    }
}

impl GeminiConfig {
    /// Merges this config with another config, preferring values from the other config if present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            api_key: other.api_key.clone().or_else(|| self.api_key.clone()),
            system_prompt: other
                .system_prompt
                .clone()
                .or_else(|| self.system_prompt.clone()),
            model_name: other.model_name.clone().or_else(|| self.model_name.clone()),
            api_base: other.api_base.clone().or_else(|| self.api_base.clone()),
            temperature: other.temperature.or(self.temperature),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model_name.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn api_base(&self) -> &str {
        self.api_base
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
    }
}

/// Reads a TOML file into `T`, returning `T::default()` when the file does not exist
pub fn load_toml_file<T>(path: &Path) -> GeminiResult<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| GeminiError::ConfigError(format!("Failed to read config file: {}", e)))?;

    toml::from_str(&content)
        .map_err(|e| GeminiError::ConfigError(format!("Failed to parse config file: {}", e)))
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> GeminiResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        GeminiError::ConfigError("Could not determine home directory".to_string())
    })?;

    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> GeminiResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_merge_prefers_other() {
        let base = GeminiConfig::default();
        let other = GeminiConfig {
            api_key: Some("key".to_string()),
            system_prompt: None,
            model_name: Some("gemini-2.0-flash".to_string()),
            api_base: None,
            temperature: Some(0.2),
            request_timeout_secs: None,
        };

        let merged = base.merge(&other);
        assert_eq!(merged.api_key.as_deref(), Some("key"));
        assert_eq!(merged.model_name(), "gemini-2.0-flash");
        assert_eq!(merged.system_prompt.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(merged.temperature, Some(0.2));
        assert_eq!(merged.request_timeout_secs, Some(60));
    }

    #[test]
    fn test_api_base_trims_trailing_slash() {
        let config = GeminiConfig {
            api_base: Some("http://localhost:9000/v1beta/".to_string()),
            ..GeminiConfig::default()
        };
        assert_eq!(config.api_base(), "http://localhost:9000/v1beta");
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let dir = tempdir().unwrap();
        let config: GeminiConfig = load_toml_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, GeminiConfig::default());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gemini.toml");
        fs::write(&path, "api_key = \"abc\"\n").unwrap();

        let config: GeminiConfig = load_toml_file(&path).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert_eq!(config.model_name(), DEFAULT_MODEL);
    }

    #[test]
    fn test_load_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "api_key = [").unwrap();

        let result: GeminiResult<GeminiConfig> = load_toml_file(&path);
        assert!(matches!(result, Err(GeminiError::ConfigError(_))));
    }
}

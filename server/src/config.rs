use ads_core::config::{get_default_config_file, load_toml_file, GeminiConfig};
use ads_core::errors::GeminiError;
use ads_lookup::faq::{DEFAULT_BIGQUERY_BASE, DEFAULT_TOP_K};
use ads_lookup::weather::{DEFAULT_GEOCODE_BASE, DEFAULT_NWS_BASE, DEFAULT_REGION, DEFAULT_USER_AGENT};
use ads_lookup::VectorSearchTable;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

pub const APP_NAME: &str = "ads-chat";
/// Longest accepted conversation idle timeout: 30 days
pub const MAX_SESSION_IDLE_TIMEOUT_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Load(#[from] GeminiError),
}

/// Weather lookup settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WeatherConfig {
    pub geocoding_api_key: Option<String>,
    pub region: String,
    pub geocode_base: String,
    pub nws_base: String,
    pub user_agent: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            geocoding_api_key: None,
            region: DEFAULT_REGION.to_string(),
            geocode_base: DEFAULT_GEOCODE_BASE.to_string(),
            nws_base: DEFAULT_NWS_BASE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// FAQ warehouse settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WarehouseConfig {
    pub project_id: Option<String>,
    pub dataset: String,
    pub embedding_table: String,
    pub embedding_model: String,
    pub top_k: usize,
    pub fraction_lists_to_search: f64,
    pub api_base: String,
    pub access_token: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            dataset: "alaska_dept_faq_db".to_string(),
            embedding_table: "withEmbedding".to_string(),
            embedding_model: "sql_connected_model".to_string(),
            top_k: DEFAULT_TOP_K,
            fraction_lists_to_search: 0.01,
            api_base: DEFAULT_BIGQUERY_BASE.to_string(),
            access_token: None,
            timeout_ms: Some(10_000),
        }
    }
}

impl WarehouseConfig {
    pub fn vector_search_table(&self) -> Result<VectorSearchTable, ConfigError> {
        let table = VectorSearchTable {
            project: self
                .project_id
                .clone()
                .ok_or(ConfigError::Missing("warehouse.project_id"))?,
            dataset: self.dataset.clone(),
            embedding_table: self.embedding_table.clone(),
            embedding_model: self.embedding_model.clone(),
            top_k: self.top_k,
            fraction_lists_to_search: self.fraction_lists_to_search,
        };
        table
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(table)
    }
}

/// Prompt/response screening; disabled unless a template is set.
/// The project is shared with the warehouse section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GuardConfig {
    pub template: Option<String>,
    pub location: String,
    pub api_base: Option<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            template: None,
            location: "us-central1".to_string(),
            api_base: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub max_history_turns: usize,
    pub session_idle_timeout_secs: u64,
    pub max_conversations: usize,
    pub lookup_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            max_history_turns: ads_core::chat::DEFAULT_MAX_TURNS,
            session_idle_timeout_secs: 60 * 60,
            max_conversations: 1000,
            lookup_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Idle timeout as a chrono duration, clamped to the accepted range
    pub fn idle_timeout(&self) -> chrono::Duration {
        let secs = self
            .session_idle_timeout_secs
            .clamp(1, MAX_SESSION_IDLE_TIMEOUT_SECS);
        chrono::Duration::seconds(secs as i64)
    }
}

/// Whole-application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub gemini: GeminiConfig,
    pub weather: WeatherConfig,
    pub warehouse: WarehouseConfig,
    pub guard: GuardConfig,
    pub server: ServerConfig,
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

impl AppConfig {
    /// Load from `path`, or from the default config file when `path` is `None`.
    /// A missing file yields the defaults.
    pub fn load_from_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Ok(load_toml_file(path)?),
            None => {
                let path = get_default_config_file(APP_NAME)?;
                Ok(load_toml_file(&path)?)
            }
        }
    }

    /// Overlay environment variables read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GEMINI_API_KEY") {
            self.gemini.api_key = Some(v);
        }
        if let Some(v) = get("MODEL_NAME") {
            self.gemini.model_name = Some(v);
        }
        if let Some(v) = get("GCP_PROJECT_ID") {
            self.warehouse.project_id = Some(v);
        }
        if let Some(v) = get("GCP_LOCATION") {
            self.guard.location = v;
        }
        if let Some(v) = get("DATASET_NAME") {
            self.warehouse.dataset = v;
        }
        if let Some(v) = get("GOOGLE_ACCESS_TOKEN") {
            self.warehouse.access_token = Some(v);
        }
        if let Some(v) = get("GOOGLE_MAPS_API_KEY") {
            self.weather.geocoding_api_key = Some(v);
        }
        if let Some(v) = get("MODEL_ARMOR_TEMPLATE") {
            self.guard.template = Some(v);
        }
        if let Some(v) = get("ADS_HTTP_ADDR") {
            self.server.http_addr = parse_env("ADS_HTTP_ADDR", v)?;
        }
        if let Some(v) = get("ADS_MAX_HISTORY_TURNS") {
            self.server.max_history_turns = parse_env("ADS_MAX_HISTORY_TURNS", v)?;
        }
        Ok(())
    }

    /// Overlay the process environment
    pub fn apply_process_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env(|name| std::env::var(name).ok())
    }

    /// Check everything needed to start serving
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gemini.api_key.is_none() {
            return Err(ConfigError::Missing("gemini.api_key"));
        }
        if self.server.max_history_turns == 0 {
            return Err(ConfigError::Invalid(
                "server.max_history_turns must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_SESSION_IDLE_TIMEOUT_SECS).contains(&self.server.session_idle_timeout_secs) {
            return Err(ConfigError::Invalid(format!(
                "server.session_idle_timeout_secs must be between 1 and {}",
                MAX_SESSION_IDLE_TIMEOUT_SECS
            )));
        }
        if self.server.max_conversations == 0 {
            return Err(ConfigError::Invalid(
                "server.max_conversations must be at least 1".to_string(),
            ));
        }
        self.warehouse.vector_search_table()?;
        Ok(())
    }
}

//! Configuration loading, validation, and management for Taskloom.
//!
//! Loads configuration from `taskloom.toml` in the project data directory
//! with `TASKLOOM_*` environment variable overrides. Validates all settings
//! at load time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `taskloom.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the database, namespace file, and artifacts
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// SQLite database file name inside `data_dir`
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Namespace marker file name inside `data_dir`
    #[serde(default = "default_namespace_file")]
    pub namespace_file: String,

    /// Generative provider configuration
    #[serde(default)]
    pub generative: GenerativeConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Dispatch loop configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Context assembly bounds
    #[serde(default)]
    pub context: ContextConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".taskloom")
}
fn default_database_file() -> String {
    "taskloom.db".into()
}
fn default_namespace_file() -> String {
    "namespace".into()
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("data_dir", &self.data_dir)
            .field("database_file", &self.database_file)
            .field("namespace_file", &self.namespace_file)
            .field("generative", &self.generative)
            .field("embedding", &self.embedding)
            .field("dispatch", &self.dispatch)
            .field("context", &self.context)
            .finish()
    }
}

/// Generative provider settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct GenerativeConfig {
    /// Base URL of an OpenAI-compatible completions endpoint
    #[serde(default = "default_generative_url")]
    pub api_url: String,

    /// API key (env override: TASKLOOM_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier sent with each request
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Hard deadline for one completion call, in seconds
    #[serde(default = "default_generative_timeout")]
    pub timeout_secs: u64,
}

fn default_generative_url() -> String {
    "http://localhost:8080/v1".into()
}
fn default_model() -> String {
    "claude-sonnet-4".into()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_generative_timeout() -> u64 {
    600
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            api_url: default_generative_url(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_generative_timeout(),
        }
    }
}

impl std::fmt::Debug for GenerativeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativeConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Embedding provider settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings endpoint.
    /// Empty string selects the deterministic in-process embedder.
    #[serde(default)]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Fixed vector dimensionality. Changing this without rebuilding the
    /// vector collections corrupts them.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_dimension() -> usize {
    384
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: None,
            model: default_embedding_model(),
            dimension: default_dimension(),
        }
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish()
    }
}

/// Dispatch loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Seconds between queue polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum tasks drained per poll tick
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_poll_interval() -> u64 {
    5
}
fn default_batch_size() -> usize {
    8
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
        }
    }
}

/// Context assembly bounds — keep prompts finite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Most recent N history records included per run
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Top-K vector search results
    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    /// Character cap per included context entry
    #[serde(default = "default_excerpt_chars")]
    pub max_excerpt_chars: usize,

    /// Total context entries included in one prompt
    #[serde(default = "default_max_entries")]
    pub max_context_entries: usize,
}

fn default_history_window() -> usize {
    10
}
fn default_search_top_k() -> usize {
    5
}
fn default_excerpt_chars() -> usize {
    600
}
fn default_max_entries() -> usize {
    8
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            search_top_k: default_search_top_k(),
            max_excerpt_chars: default_excerpt_chars(),
            max_context_entries: default_max_entries(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            namespace_file: default_namespace_file(),
            generative: GenerativeConfig::default(),
            embedding: EmbeddingConfig::default(),
            dispatch: DispatchConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the default location (`taskloom.toml` in the current
    /// directory), falling back to defaults if the file is absent.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Path::new("taskloom.toml");
        if path.exists() {
            Self::load_from(path)
        } else {
            let mut config = Self::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut config: AppConfig = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables beat file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("TASKLOOM_API_KEY") {
            if !key.is_empty() {
                self.generative.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("TASKLOOM_API_URL") {
            if !url.is_empty() {
                self.generative.api_url = url;
            }
        }
        if let Ok(dir) = std::env::var("TASKLOOM_DATA_DIR") {
            if !dir.is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimension must be positive".into(),
            ));
        }
        if self.generative.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "generative.timeout_secs must be positive".into(),
            ));
        }
        if self.context.max_context_entries == 0 {
            return Err(ConfigError::Invalid(
                "context.max_context_entries must be positive".into(),
            ));
        }
        if self.dispatch.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.batch_size must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Absolute-ish path to the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// Path to the namespace marker file.
    pub fn namespace_path(&self) -> PathBuf {
        self.data_dir.join(&self.namespace_file)
    }

    /// A commented sample config for `taskloom init`.
    pub fn default_toml() -> String {
        r#"# Taskloom configuration

# Directory holding the database, namespace marker, and artifacts
data_dir = ".taskloom"
database_file = "taskloom.db"
namespace_file = "namespace"

[generative]
api_url = "http://localhost:8080/v1"
# api_key = "sk-..."            # or TASKLOOM_API_KEY
model = "claude-sonnet-4"
max_tokens = 4096
timeout_secs = 600

[embedding]
# api_url = ""                  # empty selects the in-process embedder
model = "text-embedding-3-small"
dimension = 384

[dispatch]
poll_interval_secs = 5
batch_size = 8

[context]
history_window = 10
search_top_k = 5
max_excerpt_chars = 600
max_context_entries = 8
"#
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

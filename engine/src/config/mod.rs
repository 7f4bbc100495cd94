//! Configuration management
//!
//! This module handles loading, validation, and management of the Docent configuration.
//! Configuration is stored in TOML format at ~/.docent/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level
//! - **llm**: Completion service settings (Ollama)
//! - **embeddings**: Query embedding model
//! - **store**: Vector store location and result count
//! - **conductor**: Plan limits enforced on the router
//! - **shell**: Interactive shell settings
//!
//! # Examples
//!
//! ```no_run
//! use docent_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Model: {}", config.llm.ollama.model);
//! println!("Collection: {}", config.store.collection);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::conductor::types::PlanLimits;

/// Largest number of documents a single search may return
pub const MAX_TOP_K: usize = 5;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Completion service configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    /// Vector store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Plan limits
    #[serde(default)]
    pub conductor: ConductorConfig,

    /// Interactive shell configuration
    #[serde(default)]
    pub shell: ShellConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Completion service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,

    /// Sampling temperature (0.0-2.0)
    #[serde(default)]
    pub temperature: f64,

    /// Per-request timeout in seconds, including the streamed body
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Base URL for the Ollama instance serving embeddings
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL for the Chroma server
    #[serde(default = "default_store_base_url")]
    pub base_url: String,

    /// Collection holding the ingested chunks
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Documents returned per search (1-5)
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// Plan limits applied to every routed plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductorConfig {
    /// Maximum instructions in one plan
    #[serde(default = "default_max_instructions")]
    pub max_instructions: usize,

    /// Maximum consecutive document searches in one plan
    #[serde(default = "default_max_consecutive_searches")]
    pub max_consecutive_searches: usize,
}

impl ConductorConfig {
    /// Plan limits described by this section
    pub fn plan_limits(&self) -> PlanLimits {
        PlanLimits {
            max_instructions: self.max_instructions,
            max_consecutive_searches: self.max_consecutive_searches,
        }
    }
}

/// Interactive shell configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Input prompt
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

// Default value functions
fn default_log_level() -> String {
    "warn".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_store_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_collection() -> String {
    "langchain".to_string()
}

fn default_top_k() -> usize {
    MAX_TOP_K
}

fn default_max_instructions() -> usize {
    6
}

fn default_max_consecutive_searches() -> usize {
    3
}

fn default_prompt() -> String {
    ">>> ".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_embedding_model(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_base_url(),
            collection: default_collection(),
            top_k: default_top_k(),
        }
    }
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            max_instructions: default_max_instructions(),
            max_consecutive_searches: default_max_consecutive_searches(),
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            llm: LLMConfig::default(),
            embeddings: EmbeddingsConfig::default(),
            store: StoreConfig::default(),
            conductor: ConductorConfig::default(),
            shell: ShellConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.docent/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or written
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    ///
    /// `~` in the path is expanded to the home directory.
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let path = expand_path(path)?;
        let contents = fs::read_to_string(&path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config = Self::default();
        config.validate()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)?;

        tracing::info!("Created default configuration at {}", path.display());

        Ok(config)
    }

    /// Get the default configuration file path (~/.docent/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".docent").join("config.toml"))
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The log level is unknown
    /// - A base URL is not http(s)
    /// - `temperature` is outside 0.0-2.0 or `timeout_secs` is zero
    /// - `top_k` is outside 1-5
    /// - A plan limit is zero
    pub fn validate(&self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        for (section, url) in [
            ("llm.ollama", &self.llm.ollama.base_url),
            ("embeddings", &self.embeddings.base_url),
            ("store", &self.store.base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(EngineError::Config(format!(
                    "{}.base_url must start with http:// or https:// (got '{}')",
                    section, url
                )));
            }
        }

        if self.llm.ollama.model.trim().is_empty() {
            return Err(EngineError::Config("llm.ollama.model must not be empty".to_string()));
        }
        if self.embeddings.model.trim().is_empty() {
            return Err(EngineError::Config("embeddings.model must not be empty".to_string()));
        }
        if self.store.collection.trim().is_empty() {
            return Err(EngineError::Config("store.collection must not be empty".to_string()));
        }

        if !(0.0..=2.0).contains(&self.llm.ollama.temperature) {
            return Err(EngineError::Config(
                "llm.ollama.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if self.llm.ollama.timeout_secs == 0 {
            return Err(EngineError::Config(
                "llm.ollama.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.store.top_k == 0 || self.store.top_k > MAX_TOP_K {
            return Err(EngineError::Config(format!(
                "store.top_k must be between 1 and {}",
                MAX_TOP_K
            )));
        }

        if self.conductor.max_instructions == 0 {
            return Err(EngineError::Config(
                "conductor.max_instructions must be at least 1".to_string(),
            ));
        }
        if self.conductor.max_consecutive_searches == 0 {
            return Err(EngineError::Config(
                "conductor.max_consecutive_searches must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

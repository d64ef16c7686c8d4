use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// OpenAI-compatible API host, scheme optional
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Bearer token for the API
    #[serde(default)]
    pub api_key: String,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Source language code (ISO) or free-form name
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO) or free-form name
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Translation behavior
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Subtitle segmentation and output shaping
    #[serde(default)]
    pub subtitle: SubtitleConfig,

    /// User-defined terms that always win over extracted ones
    #[serde(default)]
    pub custom_terminology: BTreeMap<String, String>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation pipeline settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Cues per batch request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Sampling temperature for the standard pipeline
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Pause between consecutive requests, in seconds
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,

    /// Use the three-phase pipeline instead of the standard one
    #[serde(default)]
    pub multi_phase: bool,

    /// Ask the model to keep term translations consistent
    #[serde(default = "default_true")]
    pub terminology_consistency: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            temperature: default_temperature(),
            delay_secs: default_delay_secs(),
            multi_phase: false,
            terminology_consistency: true,
        }
    }
}

/// Configuration for subtitle processing and output
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SubtitleConfig {
    /// Append the source text under each translation
    #[serde(default = "default_true")]
    pub show_original: bool,

    /// Replace sentence punctuation with spaces in the output
    #[serde(default)]
    pub clean_punctuation: bool,

    /// Apply Netflix-style segmentation (length balancing, short-cue
    /// merging) before translation
    #[serde(default = "default_true")]
    pub netflix_style: bool,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            show_original: true,
            clean_punctuation: false,
            netflix_style: true,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_api_host() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "zh".to_string()
}

fn default_batch_size() -> usize {
    40
}

fn default_temperature() -> f32 {
    0.5
}

fn default_delay_secs() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_host: default_api_host(),
            api_key: String::new(),
            model: default_model(),
            source_language: default_source_language(),
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            subtitle: SubtitleConfig::default(),
            custom_terminology: BTreeMap::new(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, or write and return the
    /// defaults when the file does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid config JSON in {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            log::info!("Created default config at {}", path.display());
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// Default config location under the user's config directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lingosub")
            .join("config.json")
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(anyhow!("API key is required"));
        }
        if self.model.trim().is_empty() {
            return Err(anyhow!("Model name is required"));
        }
        if self.source_language.trim().is_empty() || self.target_language.trim().is_empty() {
            return Err(anyhow!("Source and target languages are required"));
        }
        if self.translation.batch_size == 0 {
            return Err(anyhow!("Batch size must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.translation.temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
        }
        if self.translation.delay_secs < 0.0 {
            return Err(anyhow!("Request delay cannot be negative"));
        }

        Ok(())
    }
}

//! Application configuration.
//!
//! Loaded from `~/.cram/config.toml` (or an explicit path). Provider API
//! keys may also come from the environment (`GROQ_API_KEY`,
//! `GEMINI_API_KEY`), which takes precedence over the file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which completion provider a key/model pair belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Groq,
    Gemini,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Groq => write!(f, "groq"),
            ProviderKind::Gemini => write!(f, "gemini"),
        }
    }
}

/// One configured completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    pub model: String,
}

/// Completion provider settings. Groq is preferred; Gemini is attempted
/// only when no Groq key is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
}

/// Cloud file store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    /// Hard cap on items collected during recursive folder listing.
    #[serde(default = "default_folder_item_cap")]
    pub folder_item_cap: usize,
}

/// Size caps for generation and extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Cap on generated starter topics. `None` means uncapped.
    #[serde(default)]
    pub topic_cap: Option<usize>,

    /// Character budget for stored text excerpts.
    #[serde(default = "default_excerpt_budget")]
    pub excerpt_budget: usize,

    /// Kept code lines per notebook.
    #[serde(default = "default_notebook_line_cap")]
    pub notebook_line_cap: usize,

    /// Files considered per flashcard compilation run.
    #[serde(default = "default_flashcard_max_files")]
    pub flashcard_max_files: usize,

    /// Total cards per deck.
    #[serde(default = "default_flashcard_max_cards")]
    pub flashcard_max_cards: usize,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Hierarchical topic configuration file (JSON). May be absent.
    #[serde(default = "default_topics_file")]
    pub topics_file: PathBuf,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub drive: DriveConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

fn default_groq_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_gemini_model() -> String {
    "gemini-pro".to_string()
}

fn default_folder_item_cap() -> usize {
    500
}

fn default_excerpt_budget() -> usize {
    12_000
}

fn default_notebook_line_cap() -> usize {
    80
}

fn default_flashcard_max_files() -> usize {
    12
}

fn default_flashcard_max_cards() -> usize {
    60
}

fn config_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".cram")
}

fn default_db_path() -> PathBuf {
    config_dir().join("cram.db")
}

fn default_topics_file() -> PathBuf {
    config_dir().join("topics.json")
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            groq_api_key: None,
            groq_model: default_groq_model(),
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            folder_item_cap: default_folder_item_cap(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            topic_cap: None,
            excerpt_budget: default_excerpt_budget(),
            notebook_line_cap: default_notebook_line_cap(),
            flashcard_max_files: default_flashcard_max_files(),
            flashcard_max_cards: default_flashcard_max_cards(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            topics_file: default_topics_file(),
            providers: ProvidersConfig::default(),
            drive: DriveConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Default config file path.
    pub fn path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Load configuration, falling back to defaults when the file is
    /// absent, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::path);
        let mut config = if path.exists() {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content).map_err(|e| Error::config(e.to_string()))?
        } else {
            AppConfig::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Environment variables override file-provided keys.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            if !key.is_empty() {
                self.providers.groq_api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                self.providers.gemini_api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var("DRIVE_API_KEY") {
            if !key.is_empty() {
                self.drive.api_key = Some(key);
            }
        }
    }
}

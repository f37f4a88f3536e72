//! Configuration management for turath
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! Every path in the file is resolved relative to the directory holding
//! `config.toml` unless it is absolute.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Storage and side-state locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Ingestion engine tuning
    #[serde(default)]
    pub engine: EngineConfig,

    /// Domain classifier rules
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Legacy archive reader
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Bundled JSON editions
    #[serde(default)]
    pub editions: EditionsConfig,

    /// Remote API client
    #[serde(default)]
    pub api: ApiConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default = "default_database_file")]
    pub database: PathBuf,

    /// Resume cursor JSON document
    #[serde(default = "default_cursor_file")]
    pub cursor_file: PathBuf,

    /// Change ledger JSON document
    #[serde(default = "default_ledger_file")]
    pub ledger_file: PathBuf,

    /// Container catalog (TOML)
    #[serde(default = "default_catalog_file")]
    pub catalog_file: PathBuf,
}

/// Ingestion engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Records per committed batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Rows whose trimmed primary text is shorter than this are dropped
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,

    /// Placeholder texts meaning "blank page"
    #[serde(default = "default_blank_markers")]
    pub blank_markers: Vec<String>,

    /// Number of body characters used for classification
    #[serde(default = "default_classify_prefix_chars")]
    pub classify_prefix_chars: usize,

    /// Maximum stored chapter hint length
    #[serde(default = "default_chapter_hint_chars")]
    pub chapter_hint_chars: usize,
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Tag returned when no rule matches
    #[serde(default = "default_fallback_tag")]
    pub fallback: String,

    /// Ordered rules; empty means the built-in taxonomy
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// One classifier rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub tag: String,
    pub pattern: String,
}

/// Legacy archive reader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory holding extracted `N.mdb` archives
    #[serde(default = "default_archive_dir")]
    pub dir: PathBuf,

    /// `mdb-tables` executable
    #[serde(default = "default_mdb_tables_bin")]
    pub mdb_tables_bin: String,

    /// `mdb-export` executable
    #[serde(default = "default_mdb_export_bin")]
    pub mdb_export_bin: String,
}

/// JSON editions configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditionsConfig {
    /// Directory holding `{edition}.json` files
    #[serde(default = "default_editions_dir")]
    pub dir: PathBuf,

    /// Download mirrors, tried in order; `{edition}` is substituted
    #[serde(default = "default_edition_mirrors")]
    pub mirrors: Vec<String>,
}

/// Remote API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API base URL
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Environment variable name for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,

    /// Minimum delay between two requests, in milliseconds
    #[serde(default = "default_api_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Page size for listing endpoints
    #[serde(default = "default_api_page_limit")]
    pub page_limit: u32,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry/backoff policy for transient HTTP failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_retry_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_retry_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

/// Resolved paths (internal)
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for turath data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,

    /// Path to resume cursor document
    pub cursor_file: PathBuf,

    /// Path to change ledger document
    pub ledger_file: PathBuf,

    /// Path to catalog
    pub catalog_file: PathBuf,

    /// Directory of extracted archives
    pub archive_dir: PathBuf,

    /// Directory of JSON editions
    pub editions_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            engine: EngineConfig::default(),
            classifier: ClassifierConfig::default(),
            archive: ArchiveConfig::default(),
            editions: EditionsConfig::default(),
            api: ApiConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_file(),
            cursor_file: default_cursor_file(),
            ledger_file: default_ledger_file(),
            catalog_file: default_catalog_file(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            min_text_chars: default_min_text_chars(),
            blank_markers: default_blank_markers(),
            classify_prefix_chars: default_classify_prefix_chars(),
            chapter_hint_chars: default_chapter_hint_chars(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            fallback: default_fallback_tag(),
            rules: Vec::new(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            dir: default_archive_dir(),
            mdb_tables_bin: default_mdb_tables_bin(),
            mdb_export_bin: default_mdb_export_bin(),
        }
    }
}

impl Default for EditionsConfig {
    fn default() -> Self {
        Self {
            dir: default_editions_dir(),
            mirrors: default_edition_mirrors(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            api_key_env: default_api_key_env(),
            user_agent: default_user_agent(),
            timeout_secs: default_api_timeout(),
            min_delay_ms: default_api_min_delay_ms(),
            page_limit: default_api_page_limit(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            initial_backoff_ms: default_retry_initial_backoff_ms(),
            multiplier: default_retry_multiplier(),
            max_backoff_ms: default_retry_max_backoff_ms(),
        }
    }
}

impl ApiConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        if self.api_key_env.is_empty() {
            return None;
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

impl Config {
    /// Get the default base directory for turath (~/.turath, or $TURATH_HOME)
    pub fn default_base_dir() -> PathBuf {
        if let Ok(home) = std::env::var("TURATH_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".turath")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Resolve every configured path against a base directory
    fn init_paths(&mut self, base: PathBuf, config_file: PathBuf) {
        self.paths = PathsConfig {
            config_file,
            db_file: resolve(&base, &self.storage.database),
            cursor_file: resolve(&base, &self.storage.cursor_file),
            ledger_file: resolve(&base, &self.storage.ledger_file),
            catalog_file: resolve(&base, &self.storage.catalog_file),
            archive_dir: resolve(&base, &self.archive.dir),
            editions_dir: resolve(&base, &self.editions.dir),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.init_paths(base, config_path.to_path_buf());

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        let config_file = base.join("config.toml");

        let mut config = if config_file.exists() {
            debug!("Loading config from {:?}", config_file);
            let content = std::fs::read_to_string(&config_file)?;
            toml::from_str(&content)?
        } else {
            debug!("No config file found, using defaults");
            Config::default()
        };
        config.init_paths(base, config_file);

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if turath is initialized (config and catalog exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.catalog_file.exists()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.engine.batch_size == 0 {
            return Err(Error::Config("engine.batch_size must be > 0".to_string()));
        }

        if self.engine.classify_prefix_chars == 0 {
            return Err(Error::Config(
                "engine.classify_prefix_chars must be > 0".to_string(),
            ));
        }

        if self.engine.blank_markers.iter().any(|m| m.trim().is_empty()) {
            return Err(Error::Config(
                "engine.blank_markers must not contain empty markers".to_string(),
            ));
        }

        if self.classifier.fallback.trim().is_empty() {
            return Err(Error::Config(
                "classifier.fallback must not be empty".to_string(),
            ));
        }

        if self.api.retry.max_attempts == 0 {
            return Err(Error::Config(
                "api.retry.max_attempts must be >= 1".to_string(),
            ));
        }

        if self.api.retry.multiplier < 1.0 {
            return Err(Error::Config(
                "api.retry.multiplier must be >= 1.0".to_string(),
            ));
        }

        if self.api.retry.max_backoff_ms < self.api.retry.initial_backoff_ms {
            return Err(Error::Config(
                "api.retry.max_backoff_ms must be >= api.retry.initial_backoff_ms".to_string(),
            ));
        }

        url::Url::parse(&self.api.base_url)?;

        if let Some(mirror) = self
            .editions
            .mirrors
            .iter()
            .find(|m| !m.contains("{edition}"))
        {
            return Err(Error::Config(format!(
                "editions mirror '{}' has no {{edition}} placeholder",
                mirror
            )));
        }

        Ok(())
    }
}

//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/tagshelf/config.toml)
//! 3. Environment variables (TAGSHELF_* prefix)
//!
//! Environment variables take precedence over config file values.
//! Settings that belong to one library live in its preferences table, not here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::search::DEFAULT_PAGE_SIZE;

/// Environment variable prefix
const ENV_PREFIX: &str = "TAGSHELF";

/// Number of libraries kept in `recent_libraries`
pub const MAX_RECENT_LIBRARIES: usize = 10;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Library opened most recently
    #[serde(default)]
    pub last_library: Option<PathBuf>,

    /// Reopen `last_library` when no library is given
    #[serde(default = "default_true")]
    pub open_last_library: bool,

    /// Most recent first
    #[serde(default)]
    pub recent_libraries: Vec<PathBuf>,

    /// Upgrade storage through migrations instead of direct table creation
    #[serde(default = "default_true")]
    pub use_migrations: bool,

    /// Search page size used by front ends
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Write logs here instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            last_library: None,
            open_last_library: true,
            recent_libraries: Vec::new(),
            use_migrations: true,
            page_size: DEFAULT_PAGE_SIZE,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (TAGSHELF_LAST_LIBRARY, TAGSHELF_USE_MIGRATIONS, TAGSHELF_PAGE_SIZE)
    /// 2. Config file (~/.config/tagshelf/config.toml or TAGSHELF_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // TAGSHELF_LAST_LIBRARY
        if let Ok(val) = std::env::var(format!("{}_LAST_LIBRARY", ENV_PREFIX)) {
            self.last_library = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        // TAGSHELF_USE_MIGRATIONS
        if let Ok(val) = std::env::var(format!("{}_USE_MIGRATIONS", ENV_PREFIX)) {
            self.use_migrations = val.eq_ignore_ascii_case("true") || val == "1";
        }

        // TAGSHELF_PAGE_SIZE; unparsable or zero values are ignored
        if let Ok(val) = std::env::var(format!("{}_PAGE_SIZE", ENV_PREFIX)) {
            if let Ok(size) = val.parse::<usize>() {
                if size > 0 {
                    self.page_size = size;
                }
            }
        }
    }

    /// Record `path` as the most recently opened library
    pub fn remember_library(&mut self, path: &Path) {
        let path = path.to_path_buf();
        self.recent_libraries.retain(|p| p != &path);
        self.recent_libraries.insert(0, path.clone());
        self.recent_libraries.truncate(MAX_RECENT_LIBRARIES);
        self.last_library = Some(path);
    }

    /// Library to open when none is given explicitly
    pub fn startup_library(&self) -> Option<&Path> {
        if self.open_last_library {
            self.last_library.as_deref()
        } else {
            None
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with TAGSHELF_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tagshelf")
            .join("config.toml")
    }
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

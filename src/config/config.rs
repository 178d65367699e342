use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_paths::AppPaths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub layout: LayoutConfig,
    pub loader: LoaderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Width given to columns built from CSV headers
    pub default_column_width: f64,

    /// Height given to rows built from CSV records
    pub default_row_height: f64,

    /// Smallest width a column can be dragged to
    pub min_column_width: f64,

    /// Smallest height a row can be dragged to
    pub min_row_height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Base URL of the remote data service, without trailing slash
    pub base_url: String,

    /// Size of the first page, kept small so rows appear quickly
    pub first_page_size: usize,

    /// Size of every following page
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is not set, e.g. "info" or
    /// "virtual_grid=debug"
    pub level: String,

    /// How many log lines to keep in memory
    pub capture_capacity: usize,

    /// Also write logs to a timestamped file in the log directory
    pub log_to_file: bool,

    /// Also write logs to stderr
    pub log_to_stderr: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            default_column_width: 108.0,
            default_row_height: 22.0,
            min_column_width: 60.0,
            min_row_height: 22.0,
        }
    }
}

impl LayoutConfig {
    /// Floor a dragged column width at the minimum
    pub fn clamp_column_width(&self, width: f64) -> f64 {
        width.max(self.min_column_width)
    }

    /// Floor a dragged row height at the minimum
    pub fn clamp_row_height(&self, height: f64) -> f64 {
        height.max(self.min_row_height)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api/v1".to_string(),
            first_page_size: 250,
            page_size: 5000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            capture_capacity: 1000,
            log_to_file: false,
            log_to_stderr: false,
        }
    }
}

impl Config {
    /// Load config from the default location, writing defaults there if the
    /// file does not exist yet
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            let default_config = Self::default();
            default_config.save()?;
            return Ok(default_config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {:?}", path))?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        Ok(AppPaths::config_dir()?.join("config.toml"))
    }

    /// Default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# Virtual Grid Configuration File
# Location: ~/.config/virtual-grid/config.toml (Linux)
#           ~/Library/Application Support/virtual-grid/config.toml (macOS)
#           %APPDATA%\virtual-grid\config.toml (Windows)

[layout]
# Size of columns and rows built from CSV files, in pixels
default_column_width = 108.0
default_row_height = 22.0

# Resize floors applied while dragging
min_column_width = 60.0
min_row_height = 22.0

[loader]
# Remote data service: GET {base_url}/{segment} and {base_url}/{segment}/data
base_url = "http://localhost:3000/api/v1"

# First page is small so rows show up quickly, later pages are large
first_page_size = 250
page_size = 5000

[logging]
# Overridden by RUST_LOG when set
level = "info"
capture_capacity = 1000
log_to_file = false
log_to_stderr = false
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.layout.default_column_width, 108.0);
        assert_eq!(config.layout.default_row_height, 22.0);
        assert_eq!(config.loader.first_page_size, 250);
        assert_eq!(config.loader.page_size, 5000);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.loader.base_url, parsed.loader.base_url);
        assert_eq!(config.layout.min_column_width, parsed.layout.min_column_width);
    }

    #[test]
    fn test_commented_default_matches_defaults() {
        let parsed: Config = toml::from_str(&Config::create_default_with_comments()).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.loader.page_size, defaults.loader.page_size);
        assert_eq!(parsed.layout.min_row_height, defaults.layout.min_row_height);
        assert_eq!(parsed.logging.level, defaults.logging.level);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("[loader]\npage_size = 100\n").unwrap();
        assert_eq!(parsed.loader.page_size, 100);
        assert_eq!(parsed.loader.first_page_size, 250);
        assert_eq!(parsed.layout.default_row_height, 22.0);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.loader.base_url = "http://example.test/api".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.loader.base_url, "http://example.test/api");
    }

    #[test]
    fn test_clamps() {
        let layout = LayoutConfig::default();
        assert_eq!(layout.clamp_column_width(10.0), 60.0);
        assert_eq!(layout.clamp_column_width(200.0), 200.0);
        assert_eq!(layout.clamp_row_height(5.0), 22.0);
    }
}

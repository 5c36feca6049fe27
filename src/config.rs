//! Catalog configuration
//!
//! Stored as JSON next to the user's other config files. Every field has a
//! default, so a partial or missing file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::state::data::ViewState;

const APP_DIR: &str = "tsundoku";

/// Bounds and quality for stored cover thumbnails
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct CoverSettings {
    /// Minimum width the decoded cover must keep
    pub max_width: u32,
    /// Minimum height the decoded cover must keep
    pub max_height: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for CoverSettings {
    fn default() -> Self {
        Self {
            max_width: 300,
            max_height: 450,
            quality: 80,
        }
    }
}

impl CoverSettings {
    /// Copy with zero bounds raised to 1 and quality clamped to 1..=100
    pub fn normalized(&self) -> Self {
        Self {
            max_width: self.max_width.max(1),
            max_height: self.max_height.max(1),
            quality: self.quality.clamp(1, 100),
        }
    }
}

/// Everything needed to bring up a catalog
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub database_path: PathBuf,
    /// BCP-47 tag used to collate titles and authors
    pub collation_locale: String,
    pub cover: CoverSettings,
    /// Sort order and filter the list starts with
    pub initial_view: ViewState,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            collation_locale: "ja".to_string(),
            cover: CoverSettings::default(),
            initial_view: ViewState::default(),
        }
    }
}

impl CatalogConfig {
    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Convert to a JSON string for saving
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => {
                info!(path = %path.display(), "loaded catalog config");
                Self::from_json(&json)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Write to `path`, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Where the config file lives by default
    /// - Linux: ~/.config/tsundoku/config.json
    /// - macOS: ~/Library/Application Support/tsundoku/config.json
    /// - Windows: %APPDATA%\tsundoku\config.json
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push("config.json");
        path
    }
}

/// Get the path where the database should be stored
/// - Linux: ~/.local/share/tsundoku/tsundoku.db
/// - macOS: ~/Library/Application Support/tsundoku/tsundoku.db
/// - Windows: %APPDATA%\tsundoku\tsundoku.db
fn default_database_path() -> PathBuf {
    let mut path = dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push("tsundoku.db");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::{BookStatus, SortOrder};

    #[test]
    fn test_defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.collation_locale, "ja");
        assert_eq!(config.cover, CoverSettings { max_width: 300, max_height: 450, quality: 80 });
        assert_eq!(config.initial_view, ViewState::default());
        assert!(config.database_path.ends_with("tsundoku/tsundoku.db"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = CatalogConfig::from_json(
            r#"{
                "collation_locale": "de",
                "cover": { "quality": 60 },
                "initial_view": { "sort_order": "TITLE_ASC", "filter_status": "UNREAD" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.collation_locale, "de");
        assert_eq!(config.cover.quality, 60);
        assert_eq!(config.cover.max_width, 300);
        assert_eq!(
            config.initial_view,
            ViewState::new(SortOrder::TitleAsc, Some(BookStatus::Unread))
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("config.json");

        let mut config = CatalogConfig::default();
        config.database_path = dir.path().join("books.db");
        config.cover.max_width = 120;
        config.save(&path).unwrap();

        assert_eq!(CatalogConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CatalogConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, CatalogConfig::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(CatalogConfig::load(&path), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_cover_settings_normalized() {
        let settings = CoverSettings { max_width: 0, max_height: 0, quality: 0 }.normalized();
        assert_eq!(settings, CoverSettings { max_width: 1, max_height: 1, quality: 1 });
        assert_eq!(CoverSettings { quality: 200, ..Default::default() }.normalized().quality, 100);
    }
}

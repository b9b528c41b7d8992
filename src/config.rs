use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "GEOSNAP_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default)]
    pub geocoder: GeocoderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory that holds archived captures.
    #[serde(default = "default_archive_path")]
    pub path: PathBuf,

    /// Prepended to the timestamp token of every archived file name.
    #[serde(default = "default_file_prefix")]
    pub prefix: String,

    /// Extension given to archived files (without the dot).
    #[serde(default = "default_file_extension")]
    pub extension: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            path: default_archive_path(),
            prefix: default_file_prefix(),
            extension: default_file_extension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_enabled")]
    pub enabled: bool,

    #[serde(default = "default_geocoder_endpoint")]
    pub endpoint: String,

    /// Nominatim's usage policy requires an identifying User-Agent.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: default_geocoder_enabled(),
            endpoint: default_geocoder_endpoint(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `warn,geosnap::archive=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Send records to systemd's journal when it is available (Linux only).
    #[serde(default = "default_journald")]
    pub journald: bool,

    /// Directory for the rolling log file; platform data dir when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            journald: default_journald(),
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_journald() -> bool {
    true
}

fn data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("geosnap")
}

fn default_db_path() -> PathBuf {
    data_root().join("UserDatabase.db")
}

fn default_archive_path() -> PathBuf {
    data_root().join("GalleryApp")
}

fn default_file_prefix() -> String {
    "image_".to_string()
}

fn default_file_extension() -> String {
    "jpg".to_string()
}

fn default_geocoder_enabled() -> bool {
    true
}

fn default_geocoder_endpoint() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    format!("geosnap/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    10
}

impl Config {
    /// Load from `GEOSNAP_CONFIG` if set, otherwise from the default location.
    /// A missing default config is written out with default values.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }

        let config_path = Self::config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("geosnap")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [archive]
            path = "/var/lib/photos"
            "#,
        )
        .unwrap();

        assert_eq!(config.archive.path, PathBuf::from("/var/lib/photos"));
        assert_eq!(config.archive.prefix, "image_");
        assert_eq!(config.archive.extension, "jpg");
        assert!(config.geocoder.enabled);
        assert_eq!(config.geocoder.timeout_secs, 10);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.journald);
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.database.path = dir.path().join("images.db");
        config.geocoder.enabled = false;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.database.path, config.database.path);
        assert!(!loaded.geocoder.enabled);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(Config::load_from(&dir.path().join("absent.toml")).is_err());
    }
}

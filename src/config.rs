//! Layered tracker configuration
//!
//! Priority, highest first:
//! 1. Explicit overrides passed to [`TrackerConfig::load`]
//! 2. Environment variables prefixed `TRUENO_EXP_` (`__` separates sections,
//!    e.g. `TRUENO_EXP_HTTP__BASE_URL`)
//! 3. The TOML file (default `<config dir>/trueno-exp/config.toml`)
//! 4. Built-in defaults

use std::fs;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "TRUENO_EXP_";

/// Settings of the local file repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalBackendConfig {
    /// Repository root.
    pub root_dir: PathBuf,
    /// Commit every write with git.
    pub versioned: bool,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        let root_dir = directories::BaseDirs::new()
            .map_or_else(|| PathBuf::from("."), |dirs| dirs.home_dir().to_path_buf())
            .join(".trueno-exp");
        Self {
            root_dir,
            versioned: true,
        }
    }
}

/// Settings of the remote HTTP repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpBackendConfig {
    /// Server base URL.
    pub base_url: String,
    /// User name reported to the server.
    pub user: Option<String>,
    /// Bearer token.
    pub token: Option<String>,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            user: None,
            token: None,
        }
    }
}

/// General settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Skip the remote repository.
    pub offline: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { offline: true }
    }
}

/// Complete tracker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Local repository.
    pub local: LocalBackendConfig,
    /// Remote repository.
    pub http: HttpBackendConfig,
    /// General settings.
    pub general: GeneralConfig,
}

impl TrackerConfig {
    /// Default location of the configuration file.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "paiml", "trueno-exp")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from defaults, `file` (or the default path), the environment and `overrides`.
    ///
    /// A missing file is skipped.
    ///
    /// # Errors
    ///
    /// Malformed TOML or values of the wrong type.
    pub fn load(file: Option<&Path>, overrides: Option<&Self>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let path = file.map(Path::to_path_buf).or_else(Self::default_path);
        if let Some(path) = path.filter(|p| p.is_file()) {
            tracing::debug!(path = %path.display(), "loading configuration file");
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(overrides) = overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        figment.extract().map_err(|e| Error::from(Box::new(e)))
    }

    /// Write the TOML form to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Serialization or IO failures.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert!(config.general.offline);
        assert!(config.local.root_dir.ends_with(".trueno-exp"));
        assert_eq!(config.http.base_url, "http://localhost:8080/api");
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/config.toml");
        let mut config = TrackerConfig::default();
        config.local.root_dir = tmp.path().join("repo");
        config.http.token = Some("secret".into());
        config.general.offline = false;

        config.save(&path).unwrap();
        let loaded = TrackerConfig::load(Some(&path), None).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[http]\nbase_url = \"https://tracker.example/api\"\n").unwrap();

        let loaded = TrackerConfig::load(Some(&path), None).unwrap();
        assert_eq!(loaded.http.base_url, "https://tracker.example/api");
        assert!(loaded.general.offline);
        assert_eq!(loaded.local, LocalBackendConfig::default());
    }

    #[test]
    fn test_overrides_win() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[general]\noffline = true\n").unwrap();

        let mut overrides = TrackerConfig::default();
        overrides.general.offline = false;
        let loaded = TrackerConfig::load(Some(&path), Some(&overrides)).unwrap();
        assert!(!loaded.general.offline);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[general]\noffline = \"sometimes\"\n").unwrap();
        assert!(matches!(TrackerConfig::load(Some(&path), None), Err(Error::Figment(_))));
    }
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::utils::read_data_from_yaml;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub query_timeout_ms: u64,
    pub status_timeout_ms: u64,
    pub broadcast_timeout_ms: u64,
    pub cache_ttl_ms: u64,
    pub cache_schema_version: u32,
    /// Replaces the bundled chain catalog when set.
    pub chains_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            query_timeout_ms: 8_000,
            status_timeout_ms: 10_000,
            broadcast_timeout_ms: 15_000,
            cache_ttl_ms: 10_000,
            cache_schema_version: 1,
            chains_path: None,
        }
    }
}

impl Settings {
    /// `config.yaml` in the platform config directory, defaults when absent or unreadable.
    pub fn load() -> Result<Self> {
        let config_path = project_dirs()?.config_dir().join("config.yaml");
        let config_path_str = config_path.to_str().context("config path")?;
        Ok(Self::from_file(config_path_str))
    }

    pub fn from_file(path: &str) -> Self {
        read_data_from_yaml(path).unwrap_or_default()
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_millis(self.broadcast_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// User catalog: `chains_path`, then `chains.yaml` in the data directory,
    /// then the one bundled with the crate.
    pub fn catalog_path(&self) -> Result<String> {
        if let Some(path) = &self.chains_path {
            return Ok(path.clone());
        }
        let user_catalog: PathBuf = project_dirs()?.data_local_dir().join("chains.yaml");
        if user_catalog.exists() {
            return Ok(user_catalog
                .to_str()
                .context("catalog path")?
                .to_owned());
        }
        Ok(crate::CHAIN_DATA_PATH.to_owned())
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("systems", "deck", "deck").context("project dir")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let settings = Settings::from_file("/nonexistent/deck/config.yaml");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.query_timeout(), Duration::from_secs(8));
        assert_eq!(settings.broadcast_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings: Settings = serde_yaml::from_str("cache_ttl_ms: 2500\n").unwrap();
        assert_eq!(settings.cache_ttl(), Duration::from_millis(2500));
        assert_eq!(settings.status_timeout_ms, 10_000);
    }

    #[test]
    fn explicit_catalog_wins() {
        let settings = Settings {
            chains_path: Some("/tmp/chains.yaml".into()),
            ..Default::default()
        };
        assert_eq!(settings.catalog_path().unwrap(), "/tmp/chains.yaml");
    }
}

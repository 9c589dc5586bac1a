//! Runtime configuration
//!
//! Loaded from an optional JSON file, then overridden by environment variables:
//!
//! | Variable                            | Field                 |
//! |-------------------------------------|-----------------------|
//! | `ZIP_RELAY_ZIP`                     | `zipProgram`          |
//! | `ZIP_RELAY_UNZIP`                   | `unzipProgram`        |
//! | `ZIP_RELAY_TEMP_ROOT`               | `tempRoot`            |
//! | `ZIP_RELAY_PROCESS_TIMEOUT_SECS`    | `processTimeoutSecs`  |
//! | `ZIP_RELAY_DOWNLOAD_TIMEOUT_SECS`   | `downloadTimeoutSecs` |

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{ZipError, ZipResult};
use crate::temp::TempPathManager;

/// Environment variable naming a JSON config file (read by the CLI)
pub const CONFIG_PATH_ENV: &str = "ZIP_RELAY_CONFIG";

pub const DEFAULT_ZIP_PROGRAM: &str = "zip";
pub const DEFAULT_UNZIP_PROGRAM: &str = "unzip";
pub const DEFAULT_USER_AGENT: &str = concat!("zip-relay/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ZipConfig {
    /// Archiver executable
    pub zip_program: String,
    /// Extractor executable
    pub unzip_program: String,
    /// Root for temp paths whose affix carries no directory (system temp dir if unset)
    pub temp_root: Option<PathBuf>,
    /// Deadline for each archiver/extractor run; unset waits forever
    pub process_timeout_secs: Option<u64>,
    /// Deadline for a whole download
    pub download_timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for ZipConfig {
    fn default() -> Self {
        Self {
            zip_program: DEFAULT_ZIP_PROGRAM.to_string(),
            unzip_program: DEFAULT_UNZIP_PROGRAM.to_string(),
            temp_root: None,
            process_timeout_secs: None,
            download_timeout_secs: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ZipConfig {
    /// Load a JSON config file
    pub fn load(path: &Path) -> ZipResult<Self> {
        info!("Loading config from: {}", path.display());
        let json = fs::read_to_string(path)
            .map_err(|e| ZipError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json)
            .map_err(|e| ZipError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> ZipResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `ZIP_RELAY_*` overrides from `lookup`
    pub fn with_overrides<F>(mut self, lookup: F) -> ZipResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(program) = lookup("ZIP_RELAY_ZIP") {
            self.zip_program = program;
        }
        if let Some(program) = lookup("ZIP_RELAY_UNZIP") {
            self.unzip_program = program;
        }
        if let Some(root) = lookup("ZIP_RELAY_TEMP_ROOT") {
            self.temp_root = Some(PathBuf::from(root));
        }
        if let Some(secs) = lookup("ZIP_RELAY_PROCESS_TIMEOUT_SECS") {
            self.process_timeout_secs = Some(parse_secs("ZIP_RELAY_PROCESS_TIMEOUT_SECS", &secs)?);
        }
        if let Some(secs) = lookup("ZIP_RELAY_DOWNLOAD_TIMEOUT_SECS") {
            self.download_timeout_secs = Some(parse_secs("ZIP_RELAY_DOWNLOAD_TIMEOUT_SECS", &secs)?);
        }
        Ok(self)
    }

    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_secs.map(Duration::from_secs)
    }

    pub fn download_timeout(&self) -> Option<Duration> {
        self.download_timeout_secs.map(Duration::from_secs)
    }

    /// Temp path manager rooted at `temp_root`
    pub fn temp_manager(&self) -> TempPathManager {
        match &self.temp_root {
            Some(root) => TempPathManager::with_root(root),
            None => TempPathManager::new(),
        }
    }
}

fn parse_secs(key: &str, value: &str) -> ZipResult<u64> {
    value.trim().parse::<u64>().map_err(|e| {
        warn!(key, value, "Invalid timeout override");
        ZipError::Config(format!("{} must be a whole number of seconds: {}", key, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ZipConfig::default();
        assert_eq!(config.zip_program, "zip");
        assert_eq!(config.unzip_program, "unzip");
        assert!(config.process_timeout().is_none());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("ZIP_RELAY_ZIP", "/opt/bin/zip"),
            ("ZIP_RELAY_PROCESS_TIMEOUT_SECS", " 30 "),
            ("ZIP_RELAY_TEMP_ROOT", "/scratch"),
        ]
        .into_iter()
        .collect();

        let config = ZipConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.zip_program, "/opt/bin/zip");
        assert_eq!(config.unzip_program, "unzip");
        assert_eq!(config.process_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.temp_manager().root(), Path::new("/scratch"));
    }

    #[test]
    fn test_bad_timeout_override() {
        let result = ZipConfig::default().with_overrides(|key| {
            (key == "ZIP_RELAY_DOWNLOAD_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ZipError::Config(_))));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zip-relay.json");
        fs::write(&path, r#"{"unzipProgram": "bsdunzip", "downloadTimeoutSecs": 5}"#).unwrap();

        let config = ZipConfig::load(&path).unwrap();
        assert_eq!(config.unzip_program, "bsdunzip");
        assert_eq!(config.zip_program, "zip");
        assert_eq!(config.download_timeout(), Some(Duration::from_secs(5)));
    }
}

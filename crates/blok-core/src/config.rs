//! blok configuration
//!
//! ## Configuration Resolution
//!
//! 1. Embedded defaults (compiled into binary from `config/blok.toml`)
//! 2. Override file in data dir (~/.local/share/blok/config/blok.toml), or an
//!    explicit path
//! 3. Environment: `BLOK_FS_API_URL`, `BLOK_FS_TIMEOUT_SECS`
//!
//! Later layers only replace the fields they set.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/blok.toml");

pub const ENV_FS_API_URL: &str = "BLOK_FS_API_URL";
pub const ENV_FS_TIMEOUT_SECS: &str = "BLOK_FS_TIMEOUT_SECS";

pub const DEFAULT_FS_API_URL: &str = "https://ekasa.financnasprava.sk/mdu/api/v1/opd/receipt/find";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_LIST_LIMIT_MAX: u32 = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamConfig {
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptsConfig {
    pub list_limit_max: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub receipts: ReceiptsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig {
                url: DEFAULT_FS_API_URL.to_string(),
                timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            },
            receipts: ReceiptsConfig {
                list_limit_max: DEFAULT_LIST_LIMIT_MAX,
            },
        }
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("blok").join("config").join("blok.toml"))
}

impl Config {
    /// Load all layers, reading the process environment
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(override_path, |key| std::env::var(key).ok())
    }

    /// Load all layers with a custom environment lookup
    pub fn load_with_env<F>(override_path: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_toml(DEFAULT_CONFIG)?;

        let path = match override_path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path(),
        };
        if let Some(path) = path.filter(|p| p.exists()) {
            debug!(path = %path.display(), "Loading config override");
            let content = fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
            config.apply_toml(&content)?;
        }

        config.apply_env(env)?;
        Ok(config)
    }

    /// Apply a TOML layer on top of the current values
    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        if let Some(upstream) = raw.upstream {
            if let Some(url) = upstream.url {
                self.upstream.url = url;
            }
            if let Some(secs) = upstream.timeout_secs {
                self.upstream.timeout = timeout_from_secs(secs)?;
            }
        }

        if let Some(receipts) = raw.receipts {
            if let Some(max) = receipts.list_limit_max {
                if max == 0 {
                    return Err(Error::Config(
                        "receipts.list_limit_max must be at least 1".to_string(),
                    ));
                }
                self.receipts.list_limit_max = max;
            }
        }

        Ok(())
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = env(ENV_FS_API_URL).filter(|v| !v.trim().is_empty()) {
            self.upstream.url = url.trim().to_string();
        }

        if let Some(secs) = env(ENV_FS_TIMEOUT_SECS).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                Error::Config(format!("{} must be a whole number of seconds", ENV_FS_TIMEOUT_SECS))
            })?;
            self.upstream.timeout = timeout_from_secs(secs)?;
        }

        Ok(())
    }
}

fn timeout_from_secs(secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(Error::Config(
            "upstream timeout must be at least 1 second".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    upstream: Option<RawUpstream>,
    receipts: Option<RawReceipts>,
}

#[derive(Debug, Deserialize)]
struct RawUpstream {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawReceipts {
    list_limit_max: Option<u32>,
}

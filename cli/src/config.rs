// Configuration management for the padsync CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/padsync/config.json
// - Linux: ~/.config/padsync/config.json
// - Windows: %APPDATA%\padsync\config.json

use anyhow::{Context, Result};
use padsync_core::transport::{DATA_PORT, DISCOVERY_PORT};
use padsync_core::{PatchConfig, SyncConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Receiver to send to (HOST:PORT); discovered on the LAN when unset
    pub receiver_addr: Option<String>,

    /// TCP port the receiver listens on
    pub data_port: u16,

    /// UDP port for discovery probes
    pub discovery_port: u16,

    /// Timing and patch settings
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Sender settle time and polling interval in milliseconds
    pub debounce_ms: u64,

    /// Receiver per-frame read timeout in seconds
    pub read_timeout_secs: u64,

    /// Sender connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Pause between sender reconnect attempts in seconds
    pub reconnect_interval_secs: u64,

    /// Changed-line share above which the full text is sent
    pub max_patch_ratio: f64,

    /// How far past the end an inserted line may land
    pub growth_slack: usize,

    /// Largest frame the receiver accepts; 0 means no limit
    pub max_frame_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            receiver_addr: None,
            data_port: DATA_PORT,
            discovery_port: DISCOVERY_PORT,
            sync: SyncSettings::default(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        let core = SyncConfig::default();
        Self {
            debounce_ms: core.debounce.as_millis() as u64,
            read_timeout_secs: core.read_timeout.as_secs(),
            connect_timeout_secs: core.connect_timeout.as_secs(),
            reconnect_interval_secs: 2,
            max_patch_ratio: core.patch.max_ratio,
            growth_slack: core.patch.growth_slack,
            max_frame_bytes: core.max_frame_len.unwrap_or(0),
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("padsync");

        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file()?)
    }

    /// Load config from `path`, writing the defaults there if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            let config: Config =
                serde_json::from_str(&contents).context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Set a config value. Does not save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "receiver_addr" => {
                self.receiver_addr = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "data_port" => {
                self.data_port = value.parse().context("Invalid port number")?;
            }
            "discovery_port" => {
                self.discovery_port = value.parse().context("Invalid port number")?;
            }
            "debounce_ms" => {
                self.sync.debounce_ms = parse_nonzero(key, value)?;
            }
            "read_timeout_secs" => {
                self.sync.read_timeout_secs = parse_nonzero(key, value)?;
            }
            "connect_timeout_secs" => {
                self.sync.connect_timeout_secs = parse_nonzero(key, value)?;
            }
            "reconnect_interval_secs" => {
                self.sync.reconnect_interval_secs = value.parse().context("Invalid number")?;
            }
            "max_patch_ratio" => {
                let ratio: f64 = value.parse().context("Invalid ratio")?;
                if !(0.0..=1.0).contains(&ratio) {
                    anyhow::bail!("max_patch_ratio must be between 0 and 1");
                }
                self.sync.max_patch_ratio = ratio;
            }
            "growth_slack" => {
                self.sync.growth_slack = value.parse().context("Invalid number")?;
            }
            "max_frame_bytes" => {
                self.sync.max_frame_bytes = value.parse().context("Invalid number")?;
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        Ok(())
    }

    /// Get a config value
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "receiver_addr" => self.receiver_addr.clone(),
            "data_port" => Some(self.data_port.to_string()),
            "discovery_port" => Some(self.discovery_port.to_string()),
            "debounce_ms" => Some(self.sync.debounce_ms.to_string()),
            "read_timeout_secs" => Some(self.sync.read_timeout_secs.to_string()),
            "connect_timeout_secs" => Some(self.sync.connect_timeout_secs.to_string()),
            "reconnect_interval_secs" => Some(self.sync.reconnect_interval_secs.to_string()),
            "max_patch_ratio" => Some(self.sync.max_patch_ratio.to_string()),
            "growth_slack" => Some(self.sync.growth_slack.to_string()),
            "max_frame_bytes" => Some(self.sync.max_frame_bytes.to_string()),
            _ => None,
        }
    }

    /// List all config values
    pub fn list(&self) -> Vec<(String, String)> {
        vec![
            (
                "receiver_addr".to_string(),
                self.receiver_addr
                    .clone()
                    .unwrap_or_else(|| "(discover)".to_string()),
            ),
            ("data_port".to_string(), self.data_port.to_string()),
            ("discovery_port".to_string(), self.discovery_port.to_string()),
            ("debounce_ms".to_string(), format!("{}ms", self.sync.debounce_ms)),
            ("read_timeout_secs".to_string(), format!("{}s", self.sync.read_timeout_secs)),
            ("connect_timeout_secs".to_string(), format!("{}s", self.sync.connect_timeout_secs)),
            (
                "reconnect_interval_secs".to_string(),
                format!("{}s", self.sync.reconnect_interval_secs),
            ),
            ("max_patch_ratio".to_string(), self.sync.max_patch_ratio.to_string()),
            ("growth_slack".to_string(), self.sync.growth_slack.to_string()),
            (
                "max_frame_bytes".to_string(),
                match self.sync.max_frame_bytes {
                    0 => "(unlimited)".to_string(),
                    n => n.to_string(),
                },
            ),
        ]
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.sync.reconnect_interval_secs)
    }

    /// Runtime settings for the core library
    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig {
            patch: PatchConfig::default()
                .with_max_ratio(self.sync.max_patch_ratio)
                .with_growth_slack(self.sync.growth_slack),
            // A hand-edited 0 would stall the ticker or time out every read
            debounce: Duration::from_millis(self.sync.debounce_ms.max(1)),
            read_timeout: Duration::from_secs(self.sync.read_timeout_secs.max(1)),
            connect_timeout: Duration::from_secs(self.sync.connect_timeout_secs.max(1)),
            max_frame_len: match self.sync.max_frame_bytes {
                0 => None,
                n => Some(n),
            },
        }
    }
}

fn parse_nonzero(key: &str, value: &str) -> Result<u64> {
    let n: u64 = value.parse().context("Invalid number")?;
    if n == 0 {
        anyhow::bail!("{} must be at least 1", key);
    }
    Ok(n)
}

//! Configuration for bbsterm nodes.
//!
//! Settings are read from `~/.bbsterm/config.toml`. Every key is optional;
//! anything missing takes its default.
//!
//! ```toml
//! [terminal]
//! width = 80
//! height = 25
//! pause_on_page = true
//! edit_color = 31          # 0x1F, bright white on blue
//!
//! [transport]
//! binary_mode = false
//! poll_interval_ms = 100
//! high_water_mark = 16384
//! queue_capacity = 65536
//! shutdown_timeout_ms = 2000
//! escape_timeout_ms = 250
//!
//! [node]
//! listen = "0.0.0.0:2323"
//! local_console = true
//! ```

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tracing::warn;

use crate::core::channel::{ChannelSettings, READ_CHUNK};
use crate::core::session::SessionSettings;
use crate::core::term::Attribute;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote screen settings
    pub terminal: TerminalConfig,
    /// Channel tuning
    pub transport: TransportConfig,
    /// Listener settings
    pub node: NodeConfig,
}

/// Remote screen configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub width: u16,
    pub height: u16,
    pub pause_on_page: bool,
    /// Attribute byte for fields being edited
    pub edit_color: u8,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            width: 80,
            height: 25,
            pause_on_page: true,
            edit_color: 0x1F,
        }
    }
}

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub binary_mode: bool,
    pub poll_interval_ms: u64,
    pub high_water_mark: usize,
    pub queue_capacity: usize,
    pub shutdown_timeout_ms: u64,
    pub escape_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            binary_mode: false,
            poll_interval_ms: 100,
            high_water_mark: 16 * 1024,
            queue_capacity: 64 * 1024,
            shutdown_timeout_ms: 2000,
            escape_timeout_ms: 250,
        }
    }
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address the telnet listener binds
    pub listen: String,
    /// Mirror the first caller on the local console
    pub local_console: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:2323".to_string(),
            local_console: true,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    match toml::from_str(&content) {
                        Ok(config) => return config,
                        Err(e) => warn!("Ignoring {}: {}", path.display(), e),
                    }
                }
            }
        }
        Self::default()
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), String> {
        if let Some(path) = Self::get_config_path() {
            let content = toml::to_string_pretty(self)
                .map_err(|e| format!("Failed to serialize config: {}", e))?;
            fs::write(&path, content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
            Ok(())
        } else {
            Err("Could not determine config path".to_string())
        }
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        if let Some(dir) = config_dir() {
            if !dir.exists() {
                let _ = fs::create_dir_all(&dir);
            }
            return Some(dir.join("config.toml"));
        }
        None
    }

    /// Channel tuning, adjusted so one read always fits below the queue
    /// bound once the reader stops at the high-water mark
    pub fn channel_settings(&self) -> ChannelSettings {
        let t = &self.transport;

        let queue_capacity = t.queue_capacity.max(READ_CHUNK);
        if queue_capacity != t.queue_capacity {
            warn!(
                "queue_capacity {} is below one read of {} bytes, using {}",
                t.queue_capacity, READ_CHUNK, queue_capacity
            );
        }
        let high_water_limit = queue_capacity - READ_CHUNK;
        let high_water_mark = t.high_water_mark.min(high_water_limit);
        if high_water_mark != t.high_water_mark {
            warn!(
                "high_water_mark {} leaves no room for a read in a queue of {}, using {}",
                t.high_water_mark, queue_capacity, high_water_mark
            );
        }

        ChannelSettings {
            binary_mode: t.binary_mode,
            poll_interval: Duration::from_millis(t.poll_interval_ms.max(1)),
            high_water_mark,
            queue_capacity,
            shutdown_timeout: Duration::from_millis(t.shutdown_timeout_ms),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            width: self.terminal.width,
            height: self.terminal.height,
            pause_on_page: self.terminal.pause_on_page,
            edit_attribute: Attribute::from_bits_retain(self.terminal.edit_color),
            escape_timeout: Duration::from_millis(self.transport.escape_timeout_ms),
            channel: self.channel_settings(),
        }
    }
}

/// `~/.bbsterm`, also where the log file goes
pub fn config_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".bbsterm"))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.terminal.width, 80);
        assert_eq!(config.terminal.height, 25);
        assert_eq!(config.node.listen, "0.0.0.0:2323");
        assert_eq!(config.transport.escape_timeout_ms, 250);
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [terminal]
            height = 24
            pause_on_page = false

            [transport]
            binary_mode = true
            "#,
        )
        .unwrap();
        assert_eq!(config.terminal.width, 80);
        assert_eq!(config.terminal.height, 24);
        assert!(!config.terminal.pause_on_page);
        assert!(config.transport.binary_mode);
        assert_eq!(config.transport.queue_capacity, 64 * 1024);
    }

    #[test]
    fn test_session_settings_conversion() {
        let mut config = Config::default();
        config.terminal.edit_color = 0x4E;
        config.transport.poll_interval_ms = 0;
        config.transport.escape_timeout_ms = 100;

        let settings = config.session_settings();
        assert_eq!(settings.edit_attribute.bits(), 0x4E);
        assert_eq!(settings.escape_timeout, Duration::from_millis(100));
        assert_eq!(settings.channel.poll_interval, Duration::from_millis(1));
        assert_eq!(settings.channel.shutdown_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_high_water_mark_leaves_room_for_a_read() {
        let mut config = Config::default();
        config.transport.queue_capacity = 8 * 1024;
        config.transport.high_water_mark = 16 * 1024;

        let settings = config.channel_settings();
        assert_eq!(settings.queue_capacity, 8 * 1024);
        assert_eq!(settings.high_water_mark, 8 * 1024 - READ_CHUNK);

        config.transport.queue_capacity = 16;
        let settings = config.channel_settings();
        assert_eq!(settings.queue_capacity, READ_CHUNK);
        assert_eq!(settings.high_water_mark, 0);

        // Defaults already fit
        let settings = Config::default().channel_settings();
        assert_eq!(settings.high_water_mark, 16 * 1024);
        assert_eq!(settings.queue_capacity, 64 * 1024);
    }

    #[test]
    fn test_serialized_form_reloads() {
        let mut config = Config::default();
        config.node.local_console = false;
        let text = toml::to_string_pretty(&config).unwrap();
        let loaded: Config = toml::from_str(&text).unwrap();
        assert!(!loaded.node.local_console);
        assert_eq!(loaded.terminal.edit_color, 0x1F);
    }
}

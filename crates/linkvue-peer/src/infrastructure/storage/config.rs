//! TOML-based configuration persistence for the peer.
//!
//! Reads [`AppConfig`] from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\LinkVue\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/linkvue/config.toml` or `~/.config/linkvue/config.toml`
//! - macOS:    `~/Library/Application Support/LinkVue/config.toml`
//!
//! Example file:
//!
//! ```toml
//! [peer]
//! log_level = "debug"
//!
//! [network]
//! role = "client"
//! host_address = "192.168.1.20"
//! port = 5000
//!
//! [session]
//! history_limit = 100
//! ```
//!
//! Every field has a `#[serde(default = "...")]`, so a missing file, a missing
//! section or a missing key all fall back to the built-in defaults.  Values
//! that parse but are out of range are rejected by [`AppConfig::validate`].

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::connection_manager::NetworkConfig as ManagerConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is outside its allowed range.
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Lowest port a peer may listen on or connect to; below it are the
/// privileged ports.
pub const MIN_PORT: u16 = 1024;

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level peer configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub peer: PeerConfig,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub session: SessionSection,
}

/// General peer behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Which side of a session this peer starts as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PeerRoleSetting {
    Host,
    Client,
}

/// Connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    #[serde(default = "default_role")]
    pub role: PeerRoleSetting,
    /// TCP port the host listens on and the client connects to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Dotted-quad IPv4 address of the host (client role only).
    #[serde(default = "default_host_address")]
    pub host_address: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// How often the host's accept loop polls for new peers.
    #[serde(default = "default_accept_poll_ms")]
    pub accept_poll_ms: u64,
}

/// Document/session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    /// Interval between sync ticks (drain + publish).
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Maximum undo/redo snapshots kept per stack.  `0` keeps everything.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_role() -> PeerRoleSetting {
    PeerRoleSetting::Host
}
fn default_port() -> u16 {
    5000
}
fn default_host_address() -> String {
    "127.0.0.1".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_accept_poll_ms() -> u64 {
    50
}
fn default_tick_ms() -> u64 {
    16
}
fn default_history_limit() -> usize {
    256
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            role: default_role(),
            port: default_port(),
            host_address: default_host_address(),
            connect_timeout_ms: default_connect_timeout_ms(),
            accept_poll_ms: default_accept_poll_ms(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            history_limit: default_history_limit(),
        }
    }
}

impl AppConfig {
    /// Checks the values serde cannot range-check on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.port < MIN_PORT {
            return Err(ConfigError::InvalidValue {
                field: "network.port",
                reason: format!(
                    "{} is outside {MIN_PORT}-{}",
                    self.network.port,
                    u16::MAX
                ),
            });
        }
        Ok(())
    }
}

impl NetworkSection {
    /// Converts the file settings into connection manager tunables.
    ///
    /// Zero poll intervals are raised to 1 ms so the accept loop never spins.
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            bind_address: Ipv4Addr::UNSPECIFIED,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms.max(1)),
            accept_poll_interval: Duration::from_millis(self.accept_poll_ms.max(1)),
            ..ManagerConfig::default()
        }
    }
}

impl SessionSection {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the platform config file, returning
/// `AppConfig::default()` if the file does not yet exist.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning defaults if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::InvalidValue`] if a value is out of range.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let config: AppConfig = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Resolves the platform config base directory including the `LinkVue` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("LinkVue"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("linkvue"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("LinkVue")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("linkvue-config-{}", Uuid::new_v4()))
            .join("config.toml")
    }

    #[test]
    fn test_app_config_default_values() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.peer.log_level, "info");
        assert_eq!(cfg.network.role, PeerRoleSetting::Host);
        assert_eq!(cfg.network.port, 5000);
        assert_eq!(cfg.session.history_limit, 256);
        assert_eq!(cfg.session.tick_ms, 16);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_network_section_overrides_only_given_keys() {
        // Arrange
        let toml_str = r#"
[network]
role = "client"
host_address = "10.0.0.7"
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.network.role, PeerRoleSetting::Client);
        assert_eq!(cfg.network.host_address, "10.0.0.7");
        assert_eq!(cfg.network.port, 5000);
    }

    #[test]
    fn test_unknown_role_is_a_parse_error() {
        let result: Result<AppConfig, toml::de::Error> =
            toml::from_str("[network]\nrole = \"relay\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_manager_config_clamps_zero_intervals() {
        let section = NetworkSection {
            connect_timeout_ms: 0,
            accept_poll_ms: 0,
            ..NetworkSection::default()
        };

        let mgr = section.manager_config();

        assert_eq!(mgr.connect_timeout, Duration::from_millis(1));
        assert_eq!(mgr.accept_poll_interval, Duration::from_millis(1));
        assert_eq!(mgr.bind_address, Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let cfg = load_config_from(&scratch_path()).expect("missing file is fine");
        assert_eq!(cfg, AppConfig::default());
    }

    /// Writes `content` to a fresh scratch file and returns its path.
    fn scratch_file(content: &str) -> PathBuf {
        let path = scratch_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_written_file_loads_back_unchanged() {
        // Arrange
        let mut cfg = AppConfig::default();
        cfg.network.role = PeerRoleSetting::Client;
        cfg.network.port = 6123;
        cfg.session.history_limit = 0;
        let path = scratch_file(&toml::to_string_pretty(&cfg).expect("serialize"));

        // Act
        let restored = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(restored, cfg);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_rejects_privileged_and_zero_ports() {
        for port in [0, 80, MIN_PORT - 1] {
            // Arrange
            let path = scratch_file(&format!("[network]\nport = {port}\n"));

            // Act
            let result = load_config_from(&path);

            // Assert
            assert!(
                matches!(
                    result,
                    Err(ConfigError::InvalidValue { field: "network.port", .. })
                ),
                "port {port} should be rejected"
            );
            let _ = std::fs::remove_dir_all(path.parent().unwrap());
        }
    }

    #[test]
    fn test_validate_accepts_port_range_bounds() {
        let mut cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.network.port = MIN_PORT;
        assert!(cfg.validate().is_ok());

        cfg.network.port = u16::MAX;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_malformed_file_returns_parse_error() {
        let path = scratch_file("[[[ not valid toml");

        let result = load_config_from(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}

// Server configuration.
//
// `ServerConfig` holds every tunable the server reads: the session listener
// address, the transport kind, lobby capacity, and the discovery broadcaster
// settings. It loads from JSON (every field optional, defaults filled in by
// `#[serde(default)]`), and the `lobby-server` binary layers CLI flags on
// top. `validate()` must pass before any socket is opened; `start_server`
// calls it first, so configuration mistakes are fatal at startup and never
// leave a half-started server behind.
//
// See also: `main.rs` for the CLI overrides, `server.rs` for where the
// validated values are used.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use lanlobby_protocol::{DEFAULT_DISCOVERY_PORT, DEFAULT_SESSION_PORT};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default number of roster entries (pending and accepted) per lobby.
pub const DEFAULT_MAX_PLAYERS: u32 = 4;

/// Default discovery broadcast cadence.
pub const DEFAULT_BROADCAST_INTERVAL_MS: u64 = 1000;

/// Session transport. Only TCP carries sessions; UDP is recognized so that
/// asking for it fails with a clear error instead of a parse error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    Udp,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TCP" => Ok(Self::Tcp),
            "UDP" => Ok(Self::Udp),
            _ => Err(ConfigError::UnsupportedTransport(s.to_string())),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("TCP"),
            Self::Udp => f.write_str("UDP"),
        }
    }
}

/// Top-level server configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the session listener binds to.
    pub bind_address: String,
    /// Session listener port. `0` lets the OS pick one.
    pub port: u16,
    /// Session transport name, case-insensitive.
    pub transport: String,
    /// Lobby capacity reported in `LOBBY_LIST` and enforced on join.
    pub max_players: u32,
    pub discovery: DiscoveryConfig,
}

/// Discovery broadcaster settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    /// UDP port announcements are sent to.
    pub port: u16,
    pub interval_ms: u64,
    /// Override for the announcement destination. Defaults to the limited
    /// broadcast address on `port`.
    pub target: Option<SocketAddr>,
    /// IP put in announcements. Defaults to the detected LAN address.
    pub advertise_ip: Option<IpAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: DEFAULT_SESSION_PORT,
            transport: "TCP".into(),
            max_players: DEFAULT_MAX_PLAYERS,
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: DEFAULT_DISCOVERY_PORT,
            interval_ms: DEFAULT_BROADCAST_INTERVAL_MS,
            target: None,
            advertise_ip: None,
        }
    }
}

impl ServerConfig {
    /// Parse a config from a JSON string. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Load a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check every field and return the session listener address.
    pub fn validate(&self) -> Result<SocketAddr, ConfigError> {
        match self.transport.parse::<TransportKind>()? {
            TransportKind::Tcp => {}
            TransportKind::Udp => {
                return Err(ConfigError::UnsupportedTransport(self.transport.clone()));
            }
        }
        let ip: IpAddr = self
            .bind_address
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.bind_address.clone()))?;
        if self.max_players == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.discovery.enabled && self.discovery.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl DiscoveryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Where announcements are sent.
    pub fn target(&self) -> SocketAddr {
        self.target
            .unwrap_or_else(|| SocketAddr::from(([255, 255, 255, 255], self.port)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_lan_ports() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5555);
        assert_eq!(config.discovery.port, 37020);
        assert_eq!(config.discovery.interval(), Duration::from_secs(1));
        assert_eq!(
            config.discovery.target(),
            "255.255.255.255:37020".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            config.validate().unwrap(),
            "0.0.0.0:5555".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            ServerConfig::from_json_str(r#"{"port": 6000, "discovery": {"interval_ms": 250}}"#)
                .unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.discovery.interval_ms, 250);
        assert_eq!(config.discovery.port, DEFAULT_DISCOVERY_PORT);
        assert!(config.discovery.enabled);
    }

    #[test]
    fn transport_is_case_insensitive_but_tcp_only() {
        assert_eq!(" tcp ".parse::<TransportKind>().unwrap(), TransportKind::Tcp);
        assert_eq!("Udp".parse::<TransportKind>().unwrap(), TransportKind::Udp);
        assert!(matches!(
            "sctp".parse::<TransportKind>(),
            Err(ConfigError::UnsupportedTransport(_))
        ));

        let config = ServerConfig {
            transport: "udp".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedTransport(t)) if t == "udp"
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_addr = ServerConfig {
            bind_address: "not-an-ip".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            bad_addr.validate(),
            Err(ConfigError::InvalidBindAddress(_))
        ));

        let zero_capacity = ServerConfig {
            max_players: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(
            zero_capacity.validate(),
            Err(ConfigError::ZeroCapacity)
        ));

        let mut zero_interval = ServerConfig::default();
        zero_interval.discovery.interval_ms = 0;
        assert!(matches!(
            zero_interval.validate(),
            Err(ConfigError::ZeroInterval)
        ));
        zero_interval.discovery.enabled = false;
        assert!(zero_interval.validate().is_ok());
    }

    #[test]
    fn load_reads_file_and_reports_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"bind_address": "127.0.0.1", "max_players": 8}}"#).unwrap();
        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.max_players, 8);

        let mut broken = tempfile::NamedTempFile::new().unwrap();
        write!(broken, "{{ not json").unwrap();
        assert!(matches!(
            ServerConfig::load(broken.path()),
            Err(ConfigError::Parse { .. })
        ));

        assert!(matches!(
            ServerConfig::load(Path::new("/definitely/not/here.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}

// LAN discovery packets.
//
// A host announces its lobby by broadcasting one JSON datagram per interval
// to the discovery port. Unlike session traffic there is no envelope and no
// newline: the datagram boundary is the frame. The packet is internally
// tagged with `"type": "Init Lobby"` and carries only what a browsing client
// needs to connect. The lobby password and roster never go out over UDP.
//
// See also: `lanlobby_server::discovery` for the broadcaster and listener
// threads that send and receive these.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Default UDP port for lobby announcements.
pub const DEFAULT_DISCOVERY_PORT: u16 = 37020;

/// Default TCP port for lobby sessions.
pub const DEFAULT_SESSION_PORT: u16 = 5555;

/// Largest datagram the listener accepts: the UDP payload limit over IPv4,
/// so any announcement the broadcaster can send is received whole.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// What a host advertises about its lobby.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyAnnouncement {
    pub lobby_name: String,
    pub host_name: String,
    pub ip: IpAddr,
    pub port: u16,
}

/// Datagram sent on the discovery port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiscoveryPacket {
    #[serde(rename = "Init Lobby")]
    InitLobby(LobbyAnnouncement),
}

impl DiscoveryPacket {
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parse one datagram. Unknown fields (older hosts also sent the
    /// password) are ignored; anything else that doesn't match is an error.
    pub fn decode(datagram: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(datagram)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use serde_json::json;

    use super::*;

    fn announcement() -> LobbyAnnouncement {
        LobbyAnnouncement {
            lobby_name: "Alpha".into(),
            host_name: "Marla".into(),
            ip: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
            port: DEFAULT_SESSION_PORT,
        }
    }

    #[test]
    fn packet_wire_shape() {
        let bytes = DiscoveryPacket::InitLobby(announcement()).encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "Init Lobby",
                "lobby_name": "Alpha",
                "host_name": "Marla",
                "ip": "192.168.1.20",
                "port": 5555
            })
        );
    }

    #[test]
    fn decode_ignores_extra_fields() {
        let datagram = br#"{"type":"Init Lobby","lobby_name":"Alpha","host_name":"Marla",
            "lobby_password":"secret","ip":"192.168.1.20","port":5555}"#;
        let DiscoveryPacket::InitLobby(parsed) = DiscoveryPacket::decode(datagram).unwrap();
        assert_eq!(parsed, announcement());
    }

    #[test]
    fn decode_rejects_other_types_and_garbage() {
        assert!(DiscoveryPacket::decode(br#"{"type":"Ping"}"#).is_err());
        assert!(DiscoveryPacket::decode(br#"{"type":"Init Lobby","ip":"x","port":1}"#).is_err());
        assert!(DiscoveryPacket::decode(b"\x00\x01hello").is_err());
    }
}

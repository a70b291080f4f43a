// lanlobby_server: LAN lobby server, discovery, and client session.
//
// Hosts find each other over UDP broadcast and meet on a TCP session server
// that tracks who is connected and runs the lobby handshake: a host creates
// a lobby, other players ask to join, the host accepts or declines. The
// server never runs game logic; it only brokers lobby state and roster
// snapshots.
//
// Module overview:
// - `server.rs`:    TCP listener, reader threads (one per session), and the
//                   central event loop that owns all state. Thread-per-reader
//                   with an `mpsc` channel funnelling into a single owner.
// - `roster.rs`:    Connected-session table, player-ID assignment, roster
//                   fan-out, and the `Outbox` delivery trait.
// - `lobby.rs`:     `LobbyManager`: lobby table, rosters, join handshake,
//                   disconnect cleanup.
// - `discovery.rs`: UDP broadcaster (host side) and listener (client side).
// - `client.rs`:    `LobbyClient`, the client half of a session.
// - `config.rs`:    `ServerConfig` loading and validation.
// - `error.rs`:     Error types.
//
// Dependencies: `lanlobby_protocol` for the wire types and framing.
//
// The server can run as a standalone binary (`main.rs`) or be embedded in a
// game process via the library API (`start_server`).

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod lobby;
pub mod roster;
pub mod server;

pub use client::LobbyClient;
pub use config::ServerConfig;
pub use discovery::{DiscoveryListener, DiscoveryRecord};
pub use error::{ClientError, ConfigError, ServerError};
pub use server::{ServerHandle, start_server};

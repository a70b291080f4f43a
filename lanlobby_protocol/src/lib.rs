// lanlobby_protocol: wire protocol for LAN lobby discovery and sessions.
//
// This crate defines the message types, framing, and discovery packets used
// by the lobby server (`lanlobby_server`) and game clients. It is shared
// between both sides and opens no sockets of its own.
//
// Module overview:
// - `types.rs`:     ID newtypes (`PlayerId`, `LobbyId`, `RequestId`,
//                   `SessionId`), `Position`, and the `Roster` map.
// - `message.rs`:   Closed `ClientMessage` / `ServerMessage` enums with their
//                   `{"type", "payload"}` wire tags, plus `LobbySummary`,
//                   `JoinOutcome`, and profile display-name extraction.
// - `framing.rs`:   Newline-delimited JSON framing: `write_message`, the
//                   incremental `LineDecoder`, envelope validation, and a
//                   blocking `FrameReader` for reader threads.
// - `discovery.rs`: The UDP "Init Lobby" announcement datagram.
//
// Design decisions:
// - **JSON lines.** Matches the existing game clients, which speak one JSON
//   object per line with no length prefix.
// - **Closed enums.** Message dispatch is an exhaustive `match`; adding a
//   message kind is a compile-checked change on both sides.
// - **No async runtime.** Framing works on `std::io::Read`/`Write`, so it
//   fits blocking thread-per-connection servers and in-memory tests alike.

pub mod discovery;
pub mod framing;
pub mod message;
pub mod types;

pub use discovery::{
    DEFAULT_DISCOVERY_PORT, DEFAULT_SESSION_PORT, DiscoveryPacket, LobbyAnnouncement,
};
pub use framing::{
    Envelope, Frame, FrameError, FrameReader, LineDecoder, MAX_LINE_LENGTH, decode_line,
    decode_message, write_message,
};
pub use message::{
    ClientMessage, JoinOutcome, LobbySummary, ServerMessage, Tagged, display_name_from_profile,
};
pub use types::{LobbyId, PlayerId, Position, RequestId, Roster, SessionId};

// Core ID and roster types for the lobby protocol.
//
// These are lightweight newtypes shared by `message.rs` (wire messages) and
// the server's session and lobby bookkeeping (`lanlobby_server::roster`,
// `lanlobby_server::lobby`). Each ID space is separate: a `PlayerId` is the
// roster slot a connection receives on accept, a `RequestId` names one join
// handshake inside a lobby, and a `SessionId` is the server's private handle
// for a connection (it never goes on the wire).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned roster ID for a connected session. Starts at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

/// Lobby ID, unique for the lifetime of the lobby manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LobbyId(pub u64);

/// Join request ID, unique within its lobby.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// Opaque server-side handle for one accepted connection. Stable and
/// hashable independent of the socket object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

/// A player's position. Serialized as a two-element array, `[x, y]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position(pub i32, pub i32);

/// Roster snapshot: player ID to position. Serialized as a JSON object keyed
/// by the decimal player ID.
pub type Roster = BTreeMap<PlayerId, Position>;

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lobby#{}", self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request#{}", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

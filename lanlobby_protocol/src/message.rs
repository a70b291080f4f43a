// Protocol messages for client-server lobby communication.
//
// Two closed enums define the full session vocabulary:
// - `ClientMessage`: sent by game clients to the lobby server.
// - `ServerMessage`: sent by the lobby server to game clients.
//
// Both are adjacently tagged, so each variant goes on the wire as
// `{"type": <tag>, "payload": <body>}`, the envelope that `framing.rs`
// validates before the typed decode. The tag strings are fixed by existing
// clients: lowercase for session traffic, SCREAMING_CASE for lobby replies.
//
// `Tagged::KINDS` lists every tag an enum accepts, which lets the decoder
// tell an unknown message type (a protocol error, logged and dropped) apart
// from a known type with a bad payload (a malformed message).
//
// Supporting structs (`LobbySummary`) and enums (`JoinOutcome`) live here
// too. The host profile is an opaque `serde_json::Value`: the server only
// pulls a display name out of it (see `display_name_from_profile`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{LobbyId, PlayerId, Position, RequestId, Roster};

/// Display name used when a host profile carries no usable name.
pub const DEFAULT_HOST_NAME: &str = "Host";

/// Messages whose wire tags are known up front.
pub trait Tagged {
    /// Every `type` tag this message enum decodes.
    const KINDS: &'static [&'static str];

    /// The `type` tag of this message.
    fn kind(&self) -> &'static str;
}

/// Messages sent by a client to the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Create a lobby hosted by this session.
    #[serde(rename = "lobby_create")]
    CreateLobby {
        lobby_name: String,
        #[serde(default)]
        lobby_password: Option<String>,
        #[serde(default)]
        host_profile: Value,
    },
    /// Ask for the lobby list.
    #[serde(rename = "get_lobbies")]
    GetLobbies {},
    /// Ask to join a lobby. `None` means "the only lobby on this server".
    #[serde(rename = "join_request")]
    JoinRequest {
        #[serde(default)]
        lobby_id: Option<LobbyId>,
        player_name: String,
    },
    /// Host's answer to a pending join request.
    #[serde(rename = "join_decision")]
    JoinDecision {
        lobby_id: LobbyId,
        request_id: RequestId,
        accepted: bool,
    },
    /// Reserved for in-game movement; the server accepts and ignores it.
    #[serde(rename = "move")]
    Move(Value),
}

/// Messages sent by the server to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// First message on every connection: your ID and the current roster.
    #[serde(rename = "init")]
    Init { player_id: PlayerId, players: Roster },
    /// Full roster snapshot, pushed to every session on change.
    #[serde(rename = "update_players")]
    UpdatePlayers(Roster),
    /// One player's position changed.
    #[serde(rename = "update_position")]
    UpdatePosition {
        player_id: PlayerId,
        position: Position,
    },
    /// Confirmation sent to the creator of a lobby.
    #[serde(rename = "LOBBY_CREATED")]
    LobbyCreated { lobby_id: LobbyId, lobby_name: String },
    /// Answer to `get_lobbies`.
    #[serde(rename = "LOBBY_LIST")]
    LobbyList(Vec<LobbySummary>),
    /// Sent to a lobby's host when someone asks to join.
    #[serde(rename = "JOIN_REQUEST")]
    JoinRequest {
        lobby_id: LobbyId,
        request_id: RequestId,
        player_name: String,
    },
    /// Outcome of a join request, sent to the joining session.
    #[serde(rename = "JOIN_RESULT")]
    JoinResult {
        result: JoinOutcome,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lobby_id: Option<LobbyId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// The lobby's host went away; the lobby no longer exists.
    #[serde(rename = "LOBBY_CLOSED")]
    LobbyClosed { lobby_id: LobbyId },
}

/// Host decision on a join request, as seen by the joining player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinOutcome {
    Accepted,
    Declined,
}

/// One row of a `LOBBY_LIST` reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySummary {
    pub id: LobbyId,
    pub name: String,
    /// Roster entries, pending and accepted.
    pub occupancy: u32,
    pub capacity: u32,
    #[serde(default)]
    pub has_password: bool,
}

impl Tagged for ClientMessage {
    const KINDS: &'static [&'static str] = &[
        "lobby_create",
        "get_lobbies",
        "join_request",
        "join_decision",
        "move",
    ];

    fn kind(&self) -> &'static str {
        match self {
            Self::CreateLobby { .. } => "lobby_create",
            Self::GetLobbies {} => "get_lobbies",
            Self::JoinRequest { .. } => "join_request",
            Self::JoinDecision { .. } => "join_decision",
            Self::Move(_) => "move",
        }
    }
}

impl Tagged for ServerMessage {
    const KINDS: &'static [&'static str] = &[
        "init",
        "update_players",
        "update_position",
        "LOBBY_CREATED",
        "LOBBY_LIST",
        "JOIN_REQUEST",
        "JOIN_RESULT",
        "LOBBY_CLOSED",
    ];

    fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::UpdatePlayers(_) => "update_players",
            Self::UpdatePosition { .. } => "update_position",
            Self::LobbyCreated { .. } => "LOBBY_CREATED",
            Self::LobbyList(_) => "LOBBY_LIST",
            Self::JoinRequest { .. } => "JOIN_REQUEST",
            Self::JoinResult { .. } => "JOIN_RESULT",
            Self::LobbyClosed { .. } => "LOBBY_CLOSED",
        }
    }
}

/// Pull a display name out of an opaque profile record.
///
/// Accepts an object with a `name` (or `username`) field, a profile row
/// laid out as `[local_id, name, ...]`, or a bare string. Anything else
/// falls back to `DEFAULT_HOST_NAME`.
pub fn display_name_from_profile(profile: &Value) -> String {
    let name = match profile {
        Value::Object(fields) => fields
            .get("name")
            .or_else(|| fields.get("username"))
            .and_then(Value::as_str),
        Value::Array(row) => row.get(1).and_then(Value::as_str),
        Value::String(name) => Some(name.as_str()),
        _ => None,
    };
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => DEFAULT_HOST_NAME.to_string(),
    }
}

// Connected-session table and roster synchronization.
//
// `SessionTable` owns one entry per accepted connection: its opaque
// `SessionId`, its roster `PlayerId`, its position, and the write half of
// its socket. All mutation happens from the server's single event loop
// (`server.rs`), so there is no internal locking; the table is never shared
// between threads.
//
// Registration sends the newcomer `init` (its player ID plus the full
// roster, itself included) and then pushes an `update_players` snapshot to
// every session. Removal pushes a fresh snapshot to the sessions that remain.
//
// Writing to client sockets: each entry holds a boxed `Write` (a cloned
// `TcpStream` with a write timeout in production, an in-memory sink in
// tests). A write error on one session, timeouts included, is logged and the
// fan-out continues with the next. The session is marked failed: later
// sends to it are skipped without touching the socket, and the event loop
// collects it through `take_failed` and disconnects it. A peer that stops
// reading therefore stalls the server for at most one write timeout. No
// delivery is retried.
//
// The `Outbox` trait is the seam between the lobby manager and the sockets:
// `lobby.rs` only ever addresses sessions through it.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use lanlobby_protocol::framing::write_message;
use lanlobby_protocol::{PlayerId, Position, Roster, ServerMessage, SessionId, Tagged};
use tracing::{debug, info, warn};

/// Delivery of server messages to individual sessions.
pub trait Outbox {
    /// Send `msg` to `session`. Returns whether it was written; unknown or
    /// failing sessions are logged and skipped.
    fn send_to(&mut self, session: SessionId, msg: &ServerMessage) -> bool;
}

struct SessionEntry {
    player_id: PlayerId,
    position: Position,
    writer: Box<dyn Write + Send>,
}

/// Every connected session, keyed by session handle.
pub struct SessionTable {
    sessions: BTreeMap<SessionId, SessionEntry>,
    // Sessions whose last write failed, awaiting disconnect.
    failed: BTreeSet<SessionId>,
    next_session_id: u64,
    next_player_id: u32,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            sessions: BTreeMap::new(),
            failed: BTreeSet::new(),
            next_session_id: 0,
            next_player_id: 1,
        }
    }

    /// Add a newly accepted connection, send it `init`, and broadcast the
    /// updated roster to everyone (the newcomer included).
    pub fn register(&mut self, writer: Box<dyn Write + Send>) -> (SessionId, PlayerId) {
        let session = SessionId(self.next_session_id);
        self.next_session_id += 1;
        let player_id = PlayerId(self.next_player_id);
        self.next_player_id += 1;

        self.sessions.insert(
            session,
            SessionEntry {
                player_id,
                position: Position::default(),
                writer,
            },
        );
        info!(%session, %player_id, "session registered");

        let init = ServerMessage::Init {
            player_id,
            players: self.roster(),
        };
        self.send_to(session, &init);
        self.broadcast(&ServerMessage::UpdatePlayers(self.roster()));

        (session, player_id)
    }

    /// Drop a session and push the shrunken roster to the rest. Returns the
    /// departed player's ID, or `None` if the session was already gone.
    pub fn remove(&mut self, session: SessionId) -> Option<PlayerId> {
        self.failed.remove(&session);
        let entry = self.sessions.remove(&session)?;
        info!(%session, player_id = %entry.player_id, "session removed");
        self.broadcast(&ServerMessage::UpdatePlayers(self.roster()));
        Some(entry.player_id)
    }

    /// Current roster snapshot.
    pub fn roster(&self) -> Roster {
        self.sessions
            .values()
            .map(|entry| (entry.player_id, entry.position))
            .collect()
    }

    pub fn player_id(&self, session: SessionId) -> Option<PlayerId> {
        self.sessions.get(&session).map(|entry| entry.player_id)
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.sessions.contains_key(&session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions whose writes failed since the last call. They stay in the
    /// table until removed.
    pub fn take_failed(&mut self) -> Vec<SessionId> {
        std::mem::take(&mut self.failed).into_iter().collect()
    }

    /// Send to every session. Returns how many writes succeeded.
    pub fn broadcast(&mut self, msg: &ServerMessage) -> usize {
        let ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        ids.into_iter()
            .filter(|&session| self.send_to(session, msg))
            .count()
    }
}

impl Outbox for SessionTable {
    fn send_to(&mut self, session: SessionId, msg: &ServerMessage) -> bool {
        let Some(entry) = self.sessions.get_mut(&session) else {
            debug!(%session, kind = msg.kind(), "no such session, message dropped");
            return false;
        };
        if self.failed.contains(&session) {
            debug!(%session, kind = msg.kind(), "session failed earlier, message dropped");
            return false;
        }
        match write_message(&mut entry.writer, msg) {
            Ok(()) => true,
            Err(e) => {
                warn!(%session, "send failed: {e}");
                self.failed.insert(session);
                false
            }
        }
    }
}

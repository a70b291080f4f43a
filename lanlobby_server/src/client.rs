// TCP client for a lobby server.
//
// `LobbyClient` is what a game front end holds. Architecture:
// - `connect()` opens the TCP stream on the calling thread and spawns a
//   background reader thread.
// - The reader thread drives a `FrameReader`, applies every decoded
//   `ServerMessage` to the shared `ClientState`, then offers it to a bounded
//   `mpsc` inbox of `INBOX_CAPACITY` messages. When the inbox is full the
//   message is dropped from the event stream only: the state has already
//   absorbed it, so a caller that never polls still sees current snapshots
//   and memory stays bounded. Malformed lines are logged and skipped.
// - The owning thread holds a `BufWriter<TcpStream>` for the typed senders
//   and reads state through snapshot accessors, so it never blocks on
//   network input.
// - `poll()` drains the inbox without blocking, for callers that want the
//   raw event stream instead of (or as well as) the snapshots.
//
// `ClientState::apply` is the whole inbound interpreter and is pure, so the
// UI-facing semantics are unit-tested without sockets.
//
// See also: `server.rs` for the other end, `discovery.rs` for
// `DiscoveryListener`, which a client uses to find servers before connecting.

use std::io::{self, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use lanlobby_protocol::{
    ClientMessage, Frame, FrameReader, JoinOutcome, LobbyId, LobbySummary, PlayerId, RequestId,
    Roster, ServerMessage, Tagged, write_message,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::discovery::{DiscoveryListener, DiscoveryRecord};
use crate::error::ClientError;

/// Server messages held for `poll` before new ones are dropped.
pub const INBOX_CAPACITY: usize = 1024;

/// The lobby this client created, as confirmed by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedLobby {
    pub id: LobbyId,
    pub name: String,
}

/// A join request awaiting this client's decision as host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingJoin {
    pub lobby_id: LobbyId,
    pub request_id: RequestId,
    pub player_name: String,
}

/// The server's answer to this client's last join request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinResultInfo {
    pub outcome: JoinOutcome,
    pub lobby_id: Option<LobbyId>,
    pub reason: Option<String>,
}

/// Everything the client has learned from the server so far.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClientState {
    pub player_id: Option<PlayerId>,
    pub players: Roster,
    pub created_lobby: Option<CreatedLobby>,
    pub lobby_list: Vec<LobbySummary>,
    pub pending_joins: Vec<PendingJoin>,
    pub join_result: Option<JoinResultInfo>,
}

impl ClientState {
    /// Fold one server message into the state.
    pub fn apply(&mut self, msg: &ServerMessage) {
        match msg {
            ServerMessage::Init { player_id, players } => {
                self.player_id = Some(*player_id);
                self.players = players.clone();
            }
            ServerMessage::UpdatePlayers(players) => self.players = players.clone(),
            ServerMessage::UpdatePosition {
                player_id,
                position,
            } => {
                self.players.insert(*player_id, *position);
            }
            ServerMessage::LobbyCreated {
                lobby_id,
                lobby_name,
            } => {
                self.created_lobby = Some(CreatedLobby {
                    id: *lobby_id,
                    name: lobby_name.clone(),
                });
            }
            ServerMessage::LobbyList(lobbies) => self.lobby_list = lobbies.clone(),
            ServerMessage::JoinRequest {
                lobby_id,
                request_id,
                player_name,
            } => self.pending_joins.push(PendingJoin {
                lobby_id: *lobby_id,
                request_id: *request_id,
                player_name: player_name.clone(),
            }),
            ServerMessage::JoinResult {
                result,
                lobby_id,
                reason,
            } => {
                self.join_result = Some(JoinResultInfo {
                    outcome: *result,
                    lobby_id: *lobby_id,
                    reason: reason.clone(),
                });
            }
            ServerMessage::LobbyClosed { lobby_id } => {
                self.lobby_list.retain(|lobby| lobby.id != *lobby_id);
                self.pending_joins.retain(|join| join.lobby_id != *lobby_id);
                if self
                    .join_result
                    .as_ref()
                    .is_some_and(|result| result.lobby_id == Some(*lobby_id))
                {
                    self.join_result = None;
                }
                if self
                    .created_lobby
                    .as_ref()
                    .is_some_and(|lobby| lobby.id == *lobby_id)
                {
                    self.created_lobby = None;
                }
            }
        }
    }

    fn forget_pending(&mut self, lobby_id: LobbyId, request_id: RequestId) {
        self.pending_joins
            .retain(|join| !(join.lobby_id == lobby_id && join.request_id == request_id));
    }
}

/// Client side of one session with a lobby server.
pub struct LobbyClient {
    writer: BufWriter<TcpStream>,
    stream: TcpStream,
    peer: SocketAddr,
    connected: Arc<AtomicBool>,
    state: Arc<Mutex<ClientState>>,
    inbox: Receiver<ServerMessage>,
    reader_thread: Option<JoinHandle<()>>,
}

impl LobbyClient {
    /// Connect to a lobby server and start the reader thread.
    pub fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        let stream =
            TcpStream::connect(addr).map_err(|source| ClientError::Connect { addr, source })?;
        let reader_stream = stream.try_clone()?;
        let writer = BufWriter::new(stream.try_clone()?);

        let connected = Arc::new(AtomicBool::new(true));
        let state = Arc::new(Mutex::new(ClientState::default()));
        let (tx, rx) = mpsc::sync_channel(INBOX_CAPACITY);

        let reader_connected = connected.clone();
        let reader_state = state.clone();
        let reader_thread = thread::Builder::new()
            .name("lobby-client-reader".into())
            .spawn(move || reader_loop(reader_stream, &tx, &reader_state, &reader_connected))?;

        info!(%addr, "connected to lobby server");
        Ok(Self {
            writer,
            stream,
            peer: addr,
            connected,
            state,
            inbox: rx,
            reader_thread: Some(reader_thread),
        })
    }

    /// Connect to a server found by discovery.
    pub fn connect_to(record: &DiscoveryRecord) -> Result<Self, ClientError> {
        Self::connect(record.session_addr())
    }

    /// Start listening for lobby announcements on `addr` (normally
    /// `0.0.0.0:37020`).
    pub fn start_discovery(addr: SocketAddr) -> io::Result<DiscoveryListener> {
        DiscoveryListener::bind(addr)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Whether the session is still open. Turns false once the server closes
    /// it or `disconnect()` is called.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    pub fn send_get_lobbies(&mut self) -> Result<(), ClientError> {
        self.send(&ClientMessage::GetLobbies {})
    }

    /// Ask the server to create a lobby hosted by this client. An empty
    /// passcode means no password.
    pub fn send_create_lobby(
        &mut self,
        host_profile: Value,
        lobby_name: &str,
        passcode: &str,
    ) -> Result<(), ClientError> {
        self.send(&ClientMessage::CreateLobby {
            lobby_name: lobby_name.into(),
            lobby_password: (!passcode.is_empty()).then(|| passcode.to_string()),
            host_profile,
        })
    }

    /// Ask to join a lobby. `None` targets the server's only lobby.
    pub fn send_join_request(
        &mut self,
        lobby_id: Option<LobbyId>,
        player_name: &str,
    ) -> Result<(), ClientError> {
        self.send(&ClientMessage::JoinRequest {
            lobby_id,
            player_name: player_name.into(),
        })
    }

    /// Answer a join request on a lobby this client hosts. The request is
    /// dropped from `pending_joins()` once sent.
    pub fn send_join_decision(
        &mut self,
        lobby_id: LobbyId,
        request_id: RequestId,
        accepted: bool,
    ) -> Result<(), ClientError> {
        self.send(&ClientMessage::JoinDecision {
            lobby_id,
            request_id,
            accepted,
        })?;
        self.lock_state().forget_pending(lobby_id, request_id);
        Ok(())
    }

    pub fn send_move(&mut self, payload: Value) -> Result<(), ClientError> {
        self.send(&ClientMessage::Move(payload))
    }

    fn send(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        write_message(&mut self.writer, msg).map_err(|e| {
            warn!(peer = %self.peer, "send failed: {e}");
            ClientError::Io(e)
        })
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    pub fn player_id(&self) -> Option<PlayerId> {
        self.lock_state().player_id
    }

    pub fn players(&self) -> Roster {
        self.lock_state().players.clone()
    }

    pub fn pending_joins(&self) -> Vec<PendingJoin> {
        self.lock_state().pending_joins.clone()
    }

    pub fn lobby_list(&self) -> Vec<LobbySummary> {
        self.lock_state().lobby_list.clone()
    }

    pub fn created_lobby(&self) -> Option<CreatedLobby> {
        self.lock_state().created_lobby.clone()
    }

    pub fn join_result(&self) -> Option<JoinResultInfo> {
        self.lock_state().join_result.clone()
    }

    /// A copy of the whole state.
    pub fn state(&self) -> ClientState {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Drain all queued server messages (non-blocking). At most
    /// `INBOX_CAPACITY` are kept between calls.
    pub fn poll(&self) -> Vec<ServerMessage> {
        self.inbox.try_iter().collect()
    }

    /// Wait up to `timeout` for the next server message.
    pub fn next_message(&self, timeout: Duration) -> Option<ServerMessage> {
        self.inbox.recv_timeout(timeout).ok()
    }

    /// Close the session. Safe to call more than once.
    pub fn disconnect(&mut self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!(peer = %self.peer, "disconnecting");
        }
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LobbyClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Reader thread: decode frames, update state, forward to the inbox.
fn reader_loop(
    stream: TcpStream,
    tx: &SyncSender<ServerMessage>,
    state: &Mutex<ClientState>,
    connected: &AtomicBool,
) {
    let mut reader = FrameReader::new(stream);
    loop {
        match reader.next_frame::<ServerMessage>() {
            Frame::Message(msg) => {
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .apply(&msg);
                if !offer(tx, msg) {
                    break;
                }
            }
            Frame::Dropped(err) => warn!("dropped line from server: {err}"),
            Frame::Closed(None) => {
                debug!("server closed connection");
                break;
            }
            Frame::Closed(Some(e)) => {
                warn!("read from server failed: {e}");
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
}

/// Queue `msg` for `poll` without blocking. Returns false once the client
/// is gone.
fn offer(tx: &SyncSender<ServerMessage>, msg: ServerMessage) -> bool {
    match tx.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(msg)) => {
            debug!(kind = msg.kind(), "inbox full, event dropped");
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

// TCP server and central event loop for the lobby server.
//
// Architecture: thread-per-reader with a central `mpsc` channel.
//
// - **Accept thread**: nonblocking `accept()` loop that forwards each new
//   stream as `InternalEvent::NewConnection` and naps briefly when idle, so
//   it notices the running flag.
// - **Reader threads** (one per session): drive a `FrameReader` over the
//   session's socket and forward each decoded `ClientMessage` as
//   `InternalEvent::MessageFrom`. Malformed lines are logged and skipped; the
//   session stays open. On EOF, reset, or any other read error they send
//   `InternalEvent::Disconnected` and exit.
// - **Event-loop thread**: owns the `SessionTable` and the `LobbyManager`
//   and handles events one at a time, so lobby state needs no locks. It is
//   the only writer to client sockets; reader threads only read. Writes
//   carry a timeout, and a session whose write fails is disconnected right
//   after the event that hit the failure, so one peer that stops reading
//   can't wedge the loop for everyone else.
//
// Shutdown: `ServerHandle::stop` clears the running flag. The event loop
// notices within one `recv_timeout` tick, shuts down every session socket
// (which unblocks the blocked readers), stops the discovery broadcaster,
// and exits. The handle then joins the accept thread too, so the listener
// is closed once `stop` returns.
//
// Disconnect order matters: the lobby manager runs first so LOBBY_CLOSED
// still reaches the departing host's entrants, then the session table
// removes the session and broadcasts the shrunken roster.

use std::collections::BTreeMap;
use std::io;
use std::net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use lanlobby_protocol::{ClientMessage, Frame, FrameReader, SessionId, Tagged};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::discovery::{Announcer, BroadcasterConfig, DiscoveryBroadcaster, detect_lan_ip};
use crate::error::ServerError;
use crate::lobby::LobbyManager;
use crate::roster::SessionTable;

/// How long idle loops sleep or block before re-checking the running flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Longest a single write to a client socket may block.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Events sent from the accept and reader threads to the event loop.
enum InternalEvent {
    NewConnection {
        stream: TcpStream,
        peer: SocketAddr,
    },
    MessageFrom {
        session: SessionId,
        message: ClientMessage,
    },
    Disconnected {
        session: SessionId,
    },
}

/// Handle returned by `start_server` to control the running server.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    accept_thread: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl ServerHandle {
    /// The address the session listener is actually bound to (useful when
    /// port 0 let the OS pick).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal the server to stop and wait for it to shut down.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// Block until the server exits on its own.
    pub fn wait(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if self.thread.take().is_some_and(|handle| handle.join().is_err()) {
            error!("event loop panicked");
        }
        // The accept loop only exits on the flag.
        self.keep_running.store(false, Ordering::SeqCst);
        if self.accept_thread.take().is_some_and(|handle| handle.join().is_err()) {
            error!("accept loop panicked");
        }
    }
}

/// Validate `config`, bind the session listener, start discovery
/// broadcasting if enabled, and run the server on background threads.
///
/// Configuration errors are returned before any socket is opened.
pub fn start_server(config: ServerConfig) -> Result<ServerHandle, ServerError> {
    let bind_addr = config.validate()?;
    let listener = TcpListener::bind(bind_addr).map_err(|source| ServerError::Bind {
        addr: bind_addr,
        source,
    })?;
    let local_addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let announcer = Announcer::new();
    let broadcaster = if config.discovery.enabled {
        let session_ip = config
            .discovery
            .advertise_ip
            .unwrap_or_else(|| advertised_ip(local_addr.ip()));
        let broadcaster_config = BroadcasterConfig {
            target: config.discovery.target(),
            interval: config.discovery.interval(),
            session_ip,
            session_port: local_addr.port(),
        };
        info!(
            broadcast_to = %broadcaster_config.target,
            advertise = %session_ip,
            "discovery broadcasting enabled"
        );
        Some(
            DiscoveryBroadcaster::start(broadcaster_config, announcer.clone())
                .map_err(ServerError::Discovery)?,
        )
    } else {
        None
    };

    let keep_running = Arc::new(AtomicBool::new(true));
    let (tx, rx) = mpsc::channel();

    let accept_running = keep_running.clone();
    let accept_tx = tx.clone();
    let accept_thread = thread::Builder::new()
        .name("lobby-accept".into())
        .spawn(move || accept_loop(&listener, &accept_tx, &accept_running))?;

    let lobbies = LobbyManager::new(config.max_players, announcer);
    let loop_running = keep_running.clone();
    // On failure the closure, and the broadcaster with it, is dropped here.
    let spawned = thread::Builder::new()
        .name("lobby-events".into())
        .spawn(move || {
            let mut server = EventLoop {
                table: SessionTable::new(),
                lobbies,
                sockets: BTreeMap::new(),
                tx,
            };
            server.run(&rx, &loop_running);
            server.shutdown();
            if let Some(broadcaster) = broadcaster {
                broadcaster.stop();
            }
        });
    let thread = match spawned {
        Ok(thread) => thread,
        Err(e) => {
            keep_running.store(false, Ordering::SeqCst);
            let _ = accept_thread.join();
            return Err(e.into());
        }
    };

    info!(%local_addr, transport = "TCP", "lobby server listening");
    Ok(ServerHandle {
        keep_running,
        thread: Some(thread),
        accept_thread: Some(accept_thread),
        local_addr,
    })
}

/// The IP put in discovery announcements when none is configured.
fn advertised_ip(bound: IpAddr) -> IpAddr {
    if bound.is_unspecified() {
        detect_lan_ip()
    } else {
        bound
    }
}

fn accept_loop(listener: &TcpListener, tx: &Sender<InternalEvent>, keep_running: &AtomicBool) {
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nonblocking(false) {
                    warn!(%peer, "cannot make stream blocking, dropping it: {e}");
                    continue;
                }
                if tx.send(InternalEvent::NewConnection { stream, peer }).is_err() {
                    break;
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                warn!("accept failed: {e}");
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
    debug!("accept loop stopped");
}

/// State owned by the event-loop thread.
struct EventLoop {
    table: SessionTable,
    lobbies: LobbyManager,
    /// Read halves kept for shutdown.
    sockets: BTreeMap<SessionId, TcpStream>,
    tx: Sender<InternalEvent>,
}

impl EventLoop {
    fn run(&mut self, rx: &Receiver<InternalEvent>, keep_running: &AtomicBool) {
        while keep_running.load(Ordering::SeqCst) {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(event) => {
                    self.handle_event(event);
                    while let Ok(event) = rx.try_recv() {
                        self.handle_event(event);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn handle_event(&mut self, event: InternalEvent) {
        match event {
            InternalEvent::NewConnection { stream, peer } => self.accept(stream, peer),
            InternalEvent::MessageFrom { session, message } => {
                debug!(%session, kind = message.kind(), "message received");
                self.lobbies.handle(session, message, &mut self.table);
            }
            InternalEvent::Disconnected { session } => self.disconnect(session),
        }
        self.drop_failed_sessions();
    }

    /// Disconnect sessions whose writes failed. Each disconnect broadcasts,
    /// which can fail further sessions, so repeat until none are left.
    fn drop_failed_sessions(&mut self) {
        loop {
            let failed = self.table.take_failed();
            if failed.is_empty() {
                return;
            }
            for session in failed {
                warn!(%session, "write failed, closing session");
                self.disconnect(session);
            }
        }
    }

    /// Register a new session and start its reader thread.
    fn accept(&mut self, stream: TcpStream, peer: SocketAddr) {
        let (writer, reader) = match clone_halves(&stream) {
            Ok(halves) => halves,
            Err(e) => {
                warn!(%peer, "cannot clone stream, dropping connection: {e}");
                return;
            }
        };

        let (session, player_id) = self.table.register(Box::new(writer));
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("session-reader-{}", session.0))
            .spawn(move || reader_loop(reader, session, &tx));
        if let Err(e) = spawned {
            warn!(%session, "cannot spawn reader thread: {e}");
            self.table.remove(session);
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }
        info!(%session, %player_id, %peer, "client connected");
        self.sockets.insert(session, stream);
    }

    /// Tear down a session. A second call for the same session, such as the
    /// reader's report after a failed write already closed it, is a no-op.
    fn disconnect(&mut self, session: SessionId) {
        let Some(stream) = self.sockets.remove(&session) else {
            return;
        };
        self.lobbies.session_closed(session, &mut self.table);
        self.table.remove(session);
        let _ = stream.shutdown(Shutdown::Both);
        info!(%session, "client disconnected");
    }

    /// Close every session socket so reader threads unblock and exit.
    fn shutdown(&mut self) {
        for (session, stream) in std::mem::take(&mut self.sockets) {
            debug!(%session, "closing session socket");
            let _ = stream.shutdown(Shutdown::Both);
        }
        info!("lobby server stopped");
    }
}

/// Separate handles for the session table's writer and the reader thread.
/// The write timeout is set on the socket, so it covers every clone.
fn clone_halves(stream: &TcpStream) -> io::Result<(TcpStream, TcpStream)> {
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    Ok((stream.try_clone()?, stream.try_clone()?))
}

/// Reader loop for a single session. Runs in its own thread.
fn reader_loop(stream: TcpStream, session: SessionId, tx: &Sender<InternalEvent>) {
    let mut reader = FrameReader::new(stream);
    loop {
        match reader.next_frame::<ClientMessage>() {
            Frame::Message(message) => {
                if tx.send(InternalEvent::MessageFrom { session, message }).is_err() {
                    return;
                }
            }
            Frame::Dropped(err) => warn!(%session, "dropped line: {err}"),
            Frame::Closed(None) => {
                debug!(%session, "peer closed connection");
                break;
            }
            Frame::Closed(Some(e)) => {
                warn!(%session, "read failed: {e}");
                break;
            }
        }
    }
    let _ = tx.send(InternalEvent::Disconnected { session });
}

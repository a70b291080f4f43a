// LAN discovery: the host-side broadcaster and the client-side listener.
//
// Broadcaster: a background thread that, once per interval, sends one
// `DiscoveryPacket::InitLobby` datagram to the discovery port, but only
// while an `Advert` is set. The advert lives in an `Announcer`, a cloneable
// handle over a mutex-guarded slot, so the lobby manager can swap it while
// the thread runs. The thread clones the advert out of the slot and releases
// the lock before touching the socket. Send failures are logged and the loop
// keeps going: broadcast is best-effort.
//
// Listener: a background thread bound to the discovery port (with address
// reuse, so several clients on one machine can browse at once). Every
// well-formed announcement is upserted into a `DiscoveryRegistry` keyed by
// the advertised (ip, port). Last writer wins, records are never
// duplicated. `get_lobbies()` hands out a snapshot copy. Datagrams that
// don't parse are ignored. The receive loop never evicts records on its own;
// `DiscoveryRegistry::prune_older_than` is there for callers that want to.
//
// Both threads check a running flag each iteration (the listener via a short
// read timeout) and are stopped through their handles' `stop()`, or when the
// handle is dropped.
//
// See also: `lanlobby_protocol::discovery` for the packet format, `lobby.rs`
// for where adverts are set and cleared.

use std::collections::BTreeMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use lanlobby_protocol::discovery::MAX_DATAGRAM_SIZE;
use lanlobby_protocol::{DiscoveryPacket, LobbyAnnouncement};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, trace, warn};

/// How often stopped threads notice their running flag.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Lobby details a host advertises. Never includes the password.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Advert {
    pub lobby_name: String,
    pub host_name: String,
}

/// Shared handle to the broadcaster's current advert. Starts empty.
#[derive(Clone, Debug, Default)]
pub struct Announcer {
    slot: Arc<Mutex<Option<Advert>>>,
}

impl Announcer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the advert.
    pub fn announce(&self, advert: Advert) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(advert);
    }

    /// Stop advertising.
    pub fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn current(&self) -> Option<Advert> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Best-effort LAN address of this machine, found by "connecting" a UDP
/// socket toward a public address (no packet is sent). Falls back to
/// loopback when there is no route.
pub fn detect_lan_ip() -> IpAddr {
    let probe = || -> io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
        Ok(socket.local_addr()?.ip())
    };
    probe().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// Where and how often to announce, and what session address to advertise.
#[derive(Clone, Debug)]
pub struct BroadcasterConfig {
    pub target: SocketAddr,
    pub interval: Duration,
    pub session_ip: IpAddr,
    pub session_port: u16,
}

/// Handle to a running broadcaster thread.
pub struct DiscoveryBroadcaster {
    keep_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DiscoveryBroadcaster {
    /// Open a broadcast-enabled UDP socket and start announcing whatever
    /// `announcer` holds.
    pub fn start(config: BroadcasterConfig, announcer: Announcer) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_broadcast(true)?;

        let keep_running = Arc::new(AtomicBool::new(true));
        let keep_running_thread = keep_running.clone();
        let thread = thread::Builder::new()
            .name("discovery-broadcast".into())
            .spawn(move || broadcast_loop(&socket, &config, &announcer, &keep_running_thread))?;

        Ok(Self {
            keep_running,
            thread: Some(thread),
        })
    }

    /// Signal the thread to stop and wait for it.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DiscoveryBroadcaster {
    fn drop(&mut self) {
        self.halt();
    }
}

fn broadcast_loop(
    socket: &UdpSocket,
    config: &BroadcasterConfig,
    announcer: &Announcer,
    keep_running: &AtomicBool,
) {
    info!(target_addr = %config.target, "discovery broadcaster started");
    while keep_running.load(Ordering::SeqCst) {
        if let Some(advert) = announcer.current() {
            let packet = DiscoveryPacket::InitLobby(LobbyAnnouncement {
                lobby_name: advert.lobby_name,
                host_name: advert.host_name,
                ip: config.session_ip,
                port: config.session_port,
            });
            match packet.encode() {
                Ok(bytes) if bytes.len() > MAX_DATAGRAM_SIZE => {
                    warn!(len = bytes.len(), "announcement too large for one datagram");
                }
                Ok(bytes) => match socket.send_to(&bytes, config.target) {
                    Ok(_) => trace!(target_addr = %config.target, "announcement sent"),
                    Err(e) => warn!(target_addr = %config.target, "announcement send failed: {e}"),
                },
                Err(e) => warn!("announcement encode failed: {e}"),
            }
        }

        let started = Instant::now();
        while keep_running.load(Ordering::SeqCst) && started.elapsed() < config.interval {
            thread::sleep(STOP_POLL.min(config.interval));
        }
    }
    debug!("discovery broadcaster stopped");
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// A lobby seen on the LAN.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryRecord {
    pub ip: IpAddr,
    pub port: u16,
    pub lobby_name: String,
    pub host_name: String,
    pub last_seen: Instant,
}

impl DiscoveryRecord {
    /// Session address to connect to.
    pub fn session_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// Lobbies seen so far, keyed by advertised (ip, port). Cloning shares the
/// same underlying table.
#[derive(Clone, Debug, Default)]
pub struct DiscoveryRegistry {
    records: Arc<Mutex<BTreeMap<(IpAddr, u16), DiscoveryRecord>>>,
}

impl DiscoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for the announcement's (ip, port).
    pub fn upsert(&self, announcement: LobbyAnnouncement) {
        let key = (announcement.ip, announcement.port);
        let record = DiscoveryRecord {
            ip: announcement.ip,
            port: announcement.port,
            lobby_name: announcement.lobby_name,
            host_name: announcement.host_name,
            last_seen: Instant::now(),
        };
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, record);
    }

    /// Snapshot copy of every known lobby, ordered by address.
    pub fn snapshot(&self) -> Vec<DiscoveryRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Drop records not refreshed within `max_age`. Returns how many went.
    pub fn prune_older_than(&self, max_age: Duration) -> usize {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|_, record| record.last_seen.elapsed() <= max_age);
        before - records.len()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to a running listener thread.
pub struct DiscoveryListener {
    registry: DiscoveryRegistry,
    local_addr: SocketAddr,
    keep_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DiscoveryListener {
    /// Bind with address reuse and start receiving announcements.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
        socket.set_broadcast(true)?;
        socket.bind(&addr.into())?;
        let socket: UdpSocket = socket.into();
        socket.set_read_timeout(Some(STOP_POLL))?;
        let local_addr = socket.local_addr()?;

        let registry = DiscoveryRegistry::new();
        let keep_running = Arc::new(AtomicBool::new(true));
        let registry_thread = registry.clone();
        let keep_running_thread = keep_running.clone();
        let thread = thread::Builder::new()
            .name("discovery-listen".into())
            .spawn(move || receive_loop(&socket, &registry_thread, &keep_running_thread))?;

        info!(%local_addr, "discovery listener started");
        Ok(Self {
            registry,
            local_addr,
            keep_running,
            thread: Some(thread),
        })
    }

    /// Snapshot of discovered lobbies. Safe to call while receiving.
    pub fn get_lobbies(&self) -> Vec<DiscoveryRecord> {
        self.registry.snapshot()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal the thread to stop and wait for it.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DiscoveryListener {
    fn drop(&mut self) {
        self.halt();
    }
}

fn receive_loop(socket: &UdpSocket, registry: &DiscoveryRegistry, keep_running: &AtomicBool) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    while keep_running.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((n, from)) => match DiscoveryPacket::decode(&buf[..n]) {
                Ok(DiscoveryPacket::InitLobby(announcement)) => {
                    trace!(%from, lobby = %announcement.lobby_name, "lobby announcement");
                    registry.upsert(announcement);
                }
                Err(e) => trace!(%from, "ignoring datagram: {e}"),
            },
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) => {
                debug!("discovery receive error: {e}");
                thread::sleep(STOP_POLL);
            }
        }
    }
    debug!("discovery listener stopped");
}

// Error types for the lobby server and client.
//
// Only startup can fail hard: `ConfigError` and `ServerError` are returned
// from `start_server` before (or while) sockets are opened, and the binary
// exits on them. Everything after startup is recovered locally: a broken
// session ends that session, a bad line is dropped (`FrameError` in the
// protocol crate), a bad lobby reference is a logged no-op. None of
// those paths surface as errors here.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Invalid configuration. Always detected before any socket is opened.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported transport {0:?}: sessions run over TCP only")]
    UnsupportedTransport(String),
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),
    #[error("discovery broadcast interval must be non-zero")]
    ZeroInterval,
    #[error("max_players must be at least 1")]
    ZeroCapacity,
    #[error("cannot read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Failure to start the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },
    #[error("failed to start discovery broadcaster: {0}")]
    Discovery(#[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failure on the client side of a session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not connected")]
    NotConnected,
    #[error("connect to {addr} failed: {source}")]
    Connect { addr: SocketAddr, source: io::Error },
    #[error("send failed: {0}")]
    Io(#[from] io::Error),
}

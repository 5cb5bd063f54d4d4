//! Tracker and collaborator errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// The caller's cancellation fired before both background tasks finished.
    #[error("stop aborted before background tasks finished")]
    StopAborted,
}

/// Failures reported by the network host or connection gater.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("subscribing to connectivity events: {0}")]
    Subscribe(String),
    #[error("closing connection: {0}")]
    ClosePeer(String),
    #[error("blocking peer: {0}")]
    BlockPeer(String),
}

/// Failures reported by the peer-ID store.
#[derive(Debug, Error)]
pub enum PeerStoreError {
    #[error("Storage error: {0}")]
    Storage(String),
}

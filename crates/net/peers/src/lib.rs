//! Peer reputation and lifecycle tracking for header exchange.
//!
//! [`PeerTracker`] keeps the set of connected peers worth sending header requests
//! to, remembers the score of recently disconnected peers, and evicts both on a
//! fixed GC cycle.

pub mod config;
pub mod error;
pub mod events;
pub mod stat;
pub mod traits;
pub mod tracker;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::PeerTrackerConfig;
pub use error::{NetworkError, PeerStoreError, TrackerError};
pub use events::{ConnectivityEvent, EventEmitter, PruneReason, TrackerEvent};
pub use stat::PeerStat;
pub use traits::{ConnectionGater, NetPeerId, NetworkHost, PeerIdStore};
pub use tracker::{PeerTracker, PeerTrackerBuilder};

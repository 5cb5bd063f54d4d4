//! Peer tracker configuration.

use std::time::Duration;

/// Score given to newly connected peers.
pub const DEFAULT_SCORE: f64 = 1.0;
/// Maximum number of connected and disconnected peers kept together.
pub const DEFAULT_MAX_PEERS: usize = 100;
/// How long a disconnected peer may take to come back before its score is dropped.
pub const DEFAULT_MAX_AWAITING_TIME: Duration = Duration::from_secs(60 * 60);
/// Period of the garbage collection cycle.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(60);

const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Peer tracker configuration.
#[derive(Debug, Clone)]
pub struct PeerTrackerConfig {
    /// Soft cap on tracked plus disconnected peers.
    pub max_peers: usize,
    /// Grace period for disconnected peers.
    pub max_awaiting_time: Duration,
    /// GC cycle period.
    pub gc_interval: Duration,
    /// Score of new peers. Tracked peers at or below it are evicted on GC.
    pub default_score: f64,
    /// Broadcast channel capacity for tracker events.
    pub event_channel_capacity: usize,
}

impl Default for PeerTrackerConfig {
    fn default() -> Self {
        Self {
            max_peers: DEFAULT_MAX_PEERS,
            max_awaiting_time: DEFAULT_MAX_AWAITING_TIME,
            gc_interval: DEFAULT_GC_INTERVAL,
            default_score: DEFAULT_SCORE,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl PeerTrackerConfig {
    pub fn with_max_peers(mut self, max_peers: usize) -> Self {
        self.max_peers = max_peers;
        self
    }

    pub fn with_max_awaiting_time(mut self, max_awaiting_time: Duration) -> Self {
        self.max_awaiting_time = max_awaiting_time;
        self
    }

    pub fn with_gc_interval(mut self, gc_interval: Duration) -> Self {
        self.gc_interval = gc_interval;
        self
    }

    pub fn with_default_score(mut self, default_score: f64) -> Self {
        self.default_score = default_score;
        self
    }
}

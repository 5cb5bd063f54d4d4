//! Connectivity events consumed by the tracker and tracker events it emits.

use tokio::sync::broadcast;

use crate::traits::NetPeerId;

/// Connectedness change reported by the network host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityEvent<Id> {
    Connected { peer: Id },
    Disconnected { peer: Id },
}

impl<Id> ConnectivityEvent<Id> {
    pub fn peer(&self) -> &Id {
        match self {
            Self::Connected { peer } | Self::Disconnected { peer } => peer,
        }
    }
}

/// Why the GC cycle dropped a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneReason {
    /// Disconnected for longer than the grace period.
    Expired,
    /// Connected but never scored above the default.
    LowScore,
}

/// Peer tracker events.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent<Id: NetPeerId> {
    Tracked {
        peer: Id,
        score: f64,
        /// Score carried over from an earlier connection.
        restored: bool,
    },
    Disconnected {
        peer: Id,
    },
    Pruned {
        peer: Id,
        reason: PruneReason,
    },
    Blocked {
        peer: Id,
        reason: String,
    },
}

impl<Id: NetPeerId> TrackerEvent<Id> {
    pub fn peer(&self) -> &Id {
        match self {
            Self::Tracked { peer, .. }
            | Self::Disconnected { peer }
            | Self::Pruned { peer, .. }
            | Self::Blocked { peer, .. } => peer,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, Self::Pruned { .. } | Self::Blocked { .. })
    }
}

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Non-blocking broadcast emitter. Slow subscribers drop events independently.
#[derive(Debug)]
pub struct EventEmitter<Id: NetPeerId> {
    tx: broadcast::Sender<TrackerEvent<Id>>,
}

impl<Id: NetPeerId> Clone for EventEmitter<Id> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<Id: NetPeerId> Default for EventEmitter<Id> {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl<Id: NetPeerId> EventEmitter<Id> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn emit(&self, event: TrackerEvent<Id>) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent<Id>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<Id: NetPeerId> EventEmitter<Id> {
    pub fn peer_tracked(&self, peer: Id, score: f64, restored: bool) {
        self.emit(TrackerEvent::Tracked {
            peer,
            score,
            restored,
        });
    }

    pub fn peer_disconnected(&self, peer: Id) {
        self.emit(TrackerEvent::Disconnected { peer });
    }

    pub fn peer_pruned(&self, peer: Id, reason: PruneReason) {
        self.emit(TrackerEvent::Pruned { peer, reason });
    }

    pub fn peer_blocked(&self, peer: Id, reason: String) {
        self.emit(TrackerEvent::Blocked { peer, reason });
    }
}

//! In-memory collaborators for exercising the tracker without a network.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::error::{NetworkError, PeerStoreError};
use crate::events::ConnectivityEvent;
use crate::traits::{ConnectionGater, NetPeerId, NetworkHost, PeerIdStore};

const EVENT_CAPACITY: usize = 1024;

/// Scripted network host. `connect`/`disconnect` update the open connections and
/// publish the matching connectivity event.
#[derive(Debug)]
pub struct MockNetwork<Id: NetPeerId> {
    local: Id,
    connected: RwLock<HashSet<Id>>,
    transient: RwLock<HashSet<Id>>,
    closed: RwLock<Vec<Id>>,
    events: broadcast::Sender<ConnectivityEvent<Id>>,
    fail_subscribe: AtomicBool,
    fail_close: AtomicBool,
}

impl<Id: NetPeerId> MockNetwork<Id> {
    pub fn new(local: Id) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            local,
            connected: RwLock::new(HashSet::new()),
            transient: RwLock::new(HashSet::new()),
            closed: RwLock::new(Vec::new()),
            events,
            fail_subscribe: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
        }
    }

    pub fn connect(&self, peer: Id) {
        self.connected.write().insert(peer.clone());
        let _ = self.events.send(ConnectivityEvent::Connected { peer });
    }

    /// Connect over a transient link only.
    pub fn connect_transient(&self, peer: Id) {
        self.transient.write().insert(peer.clone());
        self.connect(peer);
    }

    pub fn disconnect(&self, peer: Id) {
        self.connected.write().remove(&peer);
        self.transient.write().remove(&peer);
        let _ = self.events.send(ConnectivityEvent::Disconnected { peer });
    }

    /// Peers that `close_peer` was called for, in call order.
    pub fn closed_peers(&self) -> Vec<Id> {
        self.closed.read().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::Relaxed);
    }
}

impl<Id: NetPeerId> NetworkHost<Id> for MockNetwork<Id> {
    fn local_peer_id(&self) -> Id {
        self.local.clone()
    }

    fn connected_peers(&self) -> Vec<Id> {
        self.connected.read().iter().cloned().collect()
    }

    fn has_transient_connection(&self, peer: &Id) -> bool {
        self.transient.read().contains(peer)
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<ConnectivityEvent<Id>>, NetworkError> {
        if self.fail_subscribe.load(Ordering::Relaxed) {
            return Err(NetworkError::Subscribe("event bus closed".to_string()));
        }
        Ok(self.events.subscribe())
    }

    fn close_peer(&self, peer: &Id) -> Result<(), NetworkError> {
        self.closed.write().push(peer.clone());
        if self.fail_close.load(Ordering::Relaxed) {
            return Err(NetworkError::ClosePeer("connection reset".to_string()));
        }
        self.disconnect(peer.clone());
        Ok(())
    }
}

/// Denylist kept in memory.
#[derive(Debug)]
pub struct MockGater<Id: NetPeerId> {
    blocked: RwLock<HashSet<Id>>,
    fail: AtomicBool,
}

impl<Id: NetPeerId> MockGater<Id> {
    pub fn new() -> Self {
        Self {
            blocked: RwLock::new(HashSet::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn is_blocked(&self, peer: &Id) -> bool {
        self.blocked.read().contains(peer)
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

impl<Id: NetPeerId> Default for MockGater<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: NetPeerId> ConnectionGater<Id> for MockGater<Id> {
    fn block_peer(&self, peer: &Id) -> Result<(), NetworkError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(NetworkError::BlockPeer("gater unavailable".to_string()));
        }
        self.blocked.write().insert(peer.clone());
        Ok(())
    }
}

/// Peer-ID store that keeps the last written set in memory.
#[derive(Debug)]
pub struct MemoryPeerIdStore<Id: NetPeerId> {
    peers: RwLock<Vec<Id>>,
    puts: AtomicUsize,
    fail: AtomicBool,
}

impl<Id: NetPeerId> MemoryPeerIdStore<Id> {
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(Vec::new()),
            puts: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn peers(&self) -> Vec<Id> {
        self.peers.read().clone()
    }

    /// Number of `put` calls, failed ones included.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

impl<Id: NetPeerId> Default for MemoryPeerIdStore<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: NetPeerId> PeerIdStore<Id> for MemoryPeerIdStore<Id> {
    fn put(&self, peers: &[Id]) -> Result<(), PeerStoreError> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        if self.fail.load(Ordering::Relaxed) {
            return Err(PeerStoreError::Storage("disk full".to_string()));
        }
        *self.peers.write() = peers.to_vec();
        Ok(())
    }
}

//! Peer identity bound and the collaborators the tracker talks to.

use std::fmt::Debug;
use std::hash::Hash;

use auto_impl::auto_impl;
use tokio::sync::broadcast;

use crate::error::{NetworkError, PeerStoreError};
use crate::events::ConnectivityEvent;

/// Blanket-implemented for any type with Clone + Eq + Hash + Send + Sync + Debug.
pub trait NetPeerId: Clone + Eq + Hash + Send + Sync + Debug + 'static {}

impl<T> NetPeerId for T where T: Clone + Eq + Hash + Send + Sync + Debug + 'static {}

/// The network host: connectivity feed, open connections, and connection teardown.
#[auto_impl(&, Box, Arc)]
pub trait NetworkHost<Id: NetPeerId>: Send + Sync {
    /// Identity of the local node. Never tracked.
    fn local_peer_id(&self) -> Id;

    /// Peers with at least one open connection right now.
    fn connected_peers(&self) -> Vec<Id>;

    /// Whether any open connection to `peer` is transient (relayed or otherwise limited).
    fn has_transient_connection(&self, peer: &Id) -> bool;

    /// Subscribe to connectedness changes. Dropping the receiver closes the subscription.
    fn subscribe(&self) -> Result<broadcast::Receiver<ConnectivityEvent<Id>>, NetworkError>;

    /// Close every connection to `peer`.
    fn close_peer(&self, peer: &Id) -> Result<(), NetworkError>;
}

/// Denylist preventing future connections.
#[auto_impl(&, Box, Arc)]
pub trait ConnectionGater<Id: NetPeerId>: Send + Sync {
    fn block_peer(&self, peer: &Id) -> Result<(), NetworkError>;
}

/// Persistence for the identities of useful peers, refreshed after every GC cycle.
#[auto_impl(&, Box, Arc)]
pub trait PeerIdStore<Id: NetPeerId>: Send + Sync {
    /// Replace the stored set with `peers`.
    fn put(&self, peers: &[Id]) -> Result<(), PeerStoreError>;
}

//! Peer tracker: which peers are worth sending header requests to.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Duration;

use hdrx_primitives::PeerId;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, Span, debug, error, trace, warn};

use crate::config::PeerTrackerConfig;
use crate::error::TrackerError;
use crate::events::{ConnectivityEvent, EventEmitter, PruneReason, TrackerEvent};
use crate::stat::PeerStat;
use crate::traits::{ConnectionGater, NetPeerId, NetworkHost, PeerIdStore};

/// Smallest GC period; `tokio::time::interval` rejects zero.
const MIN_GC_INTERVAL: Duration = Duration::from_millis(1);

/// Connected and disconnected peers. A peer is in at most one of the two.
#[derive(Debug)]
struct PeerMaps<Id: NetPeerId> {
    /// Connected peers that requests can go to.
    tracked: HashMap<Id, PeerStat<Id>>,
    /// Peers that left recently. Dropped with their score once the deadline passes.
    disconnected: HashMap<Id, PeerStat<Id>>,
}

impl<Id: NetPeerId> PeerMaps<Id> {
    fn new() -> Self {
        Self {
            tracked: HashMap::new(),
            disconnected: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.tracked.len() + self.disconnected.len()
    }
}

/// State shared between the tracker handle and its background tasks.
struct Shared<Id: NetPeerId> {
    config: PeerTrackerConfig,
    host: Arc<dyn NetworkHost<Id>>,
    gater: Arc<dyn ConnectionGater<Id>>,
    store: Option<Arc<dyn PeerIdStore<Id>>>,
    /// Held for single map operations only, never across an await.
    peers: RwLock<PeerMaps<Id>>,
    events: EventEmitter<Id>,
    span: Span,
}

impl<Id: NetPeerId> Shared<Id> {
    fn connected(&self, peer: Id) {
        let _span = self.span.enter();

        if peer == self.host.local_peer_id() {
            return;
        }
        if self.host.has_transient_connection(&peer) {
            trace!(?peer, "skipping peer with transient connection");
            return;
        }

        let (score, restored) = {
            let mut peers = self.peers.write();
            // Prefer disconnected peers that may come back with a score over unknown ones.
            if peers.len() > self.config.max_peers
                && peers.tracked.len() > peers.disconnected.len()
            {
                debug!(?peer, tracked = peers.tracked.len(), "peer tracker full, skipping peer");
                return;
            }
            if peers.tracked.contains_key(&peer) {
                return;
            }

            let (stat, restored) = match peers.disconnected.remove(&peer) {
                Some(mut stat) => {
                    stat.mark_reconnected();
                    (stat, true)
                }
                None => (PeerStat::new(peer.clone(), self.config.default_score), false),
            };
            let score = stat.score();
            peers.tracked.insert(peer.clone(), stat);
            (score, restored)
        };

        debug!(?peer, score, restored, "tracking peer");
        self.events.peer_tracked(peer, score, restored);
    }

    fn disconnected(&self, peer: Id) {
        let _span = self.span.enter();

        {
            let mut peers = self.peers.write();
            let Some(mut stat) = peers.tracked.remove(&peer) else {
                return;
            };
            stat.mark_disconnected(Instant::now() + self.config.max_awaiting_time);
            peers.disconnected.insert(peer.clone(), stat);
        }

        debug!(?peer, "peer disconnected");
        self.events.peer_disconnected(peer);
    }

    /// One GC sweep. Returns the identities still tracked afterwards.
    fn gc(&self) -> Vec<Id> {
        let _span = self.span.enter();
        let now = Instant::now();
        let default_score = self.config.default_score;

        let mut pruned = Vec::new();
        let survivors: Vec<Id> = {
            let mut peers = self.peers.write();
            let PeerMaps {
                tracked,
                disconnected,
            } = &mut *peers;

            pruned.extend(
                disconnected
                    .extract_if(|_, stat| stat.is_expired(now))
                    .map(|(peer, _)| (peer, PruneReason::Expired)),
            );
            pruned.extend(
                tracked
                    .extract_if(|_, stat| {
                        stat.score().partial_cmp(&default_score) != Some(Ordering::Greater)
                    })
                    .map(|(peer, _)| (peer, PruneReason::LowScore)),
            );

            tracked.keys().cloned().collect()
        };

        if !pruned.is_empty() {
            debug!(pruned = pruned.len(), tracked = survivors.len(), "pruned peers");
        }
        for (peer, reason) in pruned {
            self.events.peer_pruned(peer, reason);
        }

        self.persist(&survivors);
        survivors
    }

    fn persist(&self, peers: &[Id]) {
        let Some(store) = &self.store else {
            return;
        };
        match store.put(peers) {
            Ok(()) => trace!(count = peers.len(), "persisted tracked peers"),
            Err(e) => error!(error = %e, "persisting updated peer list"),
        }
    }

    fn block_peer(&self, peer: Id, reason: String) {
        let _span = self.span.enter();

        // Keep the peer from coming back.
        if let Err(e) = self.gater.block_peer(&peer) {
            error!(?peer, error = %e, "blocking peer failed");
        }
        if let Err(e) = self.host.close_peer(&peer) {
            error!(?peer, error = %e, "closing connection with peer failed");
        }

        warn!(?peer, %reason, "blocked peer");

        {
            let mut peers = self.peers.write();
            peers.tracked.remove(&peer);
            peers.disconnected.remove(&peer);
        }
        self.events.peer_blocked(peer, reason);
    }

    fn update_score(&self, peer: &Id, update: impl FnOnce(&mut PeerStat<Id>)) -> bool {
        match self.peers.write().tracked.get_mut(peer) {
            Some(stat) => {
                update(stat);
                true
            }
            None => false,
        }
    }
}

/// Follow connectivity changes until cancelled.
async fn track<Id: NetPeerId>(shared: Arc<Shared<Id>>, cancel: CancellationToken) {
    // Subscribe before seeding so no change between the two is lost.
    let subscription = shared.host.subscribe();

    for peer in shared.host.connected_peers() {
        shared.connected(peer);
    }

    let mut events = match subscription {
        Ok(events) => events,
        Err(e) => {
            error!(error = %e, "subscribing to connectivity events");
            return;
        }
    };

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("connectivity tracking stopped");
                break;
            }

            event = events.recv() => match event {
                Ok(ConnectivityEvent::Connected { peer }) => shared.connected(peer),
                Ok(ConnectivityEvent::Disconnected { peer }) => shared.disconnected(peer),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "connectivity events lagged, tracked peers may be stale");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("connectivity event feed closed");
                    break;
                }
            }
        }
    }
}

/// Sweep the peer maps every GC interval until cancelled.
async fn collect_garbage<Id: NetPeerId>(shared: Arc<Shared<Id>>, cancel: CancellationToken) {
    let period = shared.config.gc_interval.max(MIN_GC_INTERVAL);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("peer gc stopped");
                break;
            }

            _ = ticker.tick() => {
                shared.gc();
            }
        }
    }
}

/// Builder for [`PeerTracker`].
pub struct PeerTrackerBuilder<Id: NetPeerId = PeerId> {
    host: Arc<dyn NetworkHost<Id>>,
    gater: Arc<dyn ConnectionGater<Id>>,
    store: Option<Arc<dyn PeerIdStore<Id>>>,
    config: PeerTrackerConfig,
    span: Span,
}

impl<Id: NetPeerId> PeerTrackerBuilder<Id> {
    pub fn with_store(mut self, store: Arc<dyn PeerIdStore<Id>>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_config(mut self, config: PeerTrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Span that every record of the tracker and its tasks is emitted under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn build(self) -> PeerTracker<Id> {
        PeerTracker {
            shared: Arc::new(Shared {
                events: EventEmitter::new(self.config.event_channel_capacity),
                config: self.config,
                host: self.host,
                gater: self.gater,
                store: self.store,
                peers: RwLock::new(PeerMaps::new()),
                span: self.span,
            }),
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
            started: AtomicBool::new(false),
        }
    }
}

/// Tracks connected peers and the score they earned, for picking request targets.
///
/// New peers start at the default score. Peers that disconnect keep their score
/// for `max_awaiting_time`; a GC cycle drops expired ones together with connected
/// peers that never scored above the default. Dispatch code rewards useful peers
/// with [`PeerTracker::add_score`].
///
/// [`PeerTracker::start`] runs two tasks on the current tokio runtime: one
/// following the host's connectivity feed and one running GC.
/// [`PeerTracker::stop`] cancels and joins both.
pub struct PeerTracker<Id: NetPeerId = PeerId> {
    shared: Arc<Shared<Id>>,
    cancel: CancellationToken,
    tasks: TaskTracker,
    started: AtomicBool,
}

impl<Id: NetPeerId> PeerTracker<Id> {
    pub fn builder(
        host: Arc<dyn NetworkHost<Id>>,
        gater: Arc<dyn ConnectionGater<Id>>,
    ) -> PeerTrackerBuilder<Id> {
        PeerTrackerBuilder {
            host,
            gater,
            store: None,
            config: PeerTrackerConfig::default(),
            span: Span::none(),
        }
    }

    pub fn new(
        host: Arc<dyn NetworkHost<Id>>,
        gater: Arc<dyn ConnectionGater<Id>>,
        store: Option<Arc<dyn PeerIdStore<Id>>>,
        config: PeerTrackerConfig,
    ) -> Self {
        let builder = Self::builder(host, gater).with_config(config);
        match store {
            Some(store) => builder.with_store(store).build(),
            None => builder.build(),
        }
    }

    pub fn config(&self) -> &PeerTrackerConfig {
        &self.shared.config
    }

    /// Spawn the connectivity and GC tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let _span = self.shared.span.enter();

        if self.cancel.is_cancelled() {
            warn!("peer tracker already stopped");
            return;
        }
        if self.started.swap(true, AtomicOrdering::AcqRel) {
            warn!("peer tracker already started");
            return;
        }

        self.tasks.spawn(
            track(Arc::clone(&self.shared), self.cancel.clone())
                .instrument(self.shared.span.clone()),
        );
        self.tasks.spawn(
            collect_garbage(Arc::clone(&self.shared), self.cancel.clone())
                .instrument(self.shared.span.clone()),
        );

        debug!("peer tracker started");
    }

    /// Cancel both background tasks and wait for them to finish.
    ///
    /// Returns [`TrackerError::StopAborted`] if `cancel` fires first. The tasks are
    /// still cancelled in that case and a later call can wait for them again. Any
    /// number of calls may wait at once; each returns `Ok` only after both tasks
    /// have exited.
    pub async fn stop(&self, cancel: &CancellationToken) -> Result<(), TrackerError> {
        self.cancel.cancel();
        self.tasks.close();

        tokio::select! {
            biased;

            _ = self.tasks.wait() => {
                debug!(parent: &self.shared.span, "peer tracker stopped");
                Ok(())
            }

            _ = cancel.cancelled() => Err(TrackerError::StopAborted),
        }
    }

    /// Record that `peer` became reachable.
    pub fn connected(&self, peer: Id) {
        self.shared.connected(peer);
    }

    /// Record that `peer` went away. Its score is kept for `max_awaiting_time`.
    pub fn disconnected(&self, peer: Id) {
        self.shared.disconnected(peer);
    }

    /// Run one GC sweep now and persist the survivors. Returns the surviving peers.
    pub fn gc(&self) -> Vec<Id> {
        self.shared.gc()
    }

    /// Ban `peer`: deny future connections, close live ones, forget its score.
    ///
    /// Failures of the gater or the host are logged; the peer is removed from
    /// the tracker regardless.
    pub fn block_peer(&self, peer: Id, reason: impl Display) {
        self.shared.block_peer(peer, reason.to_string());
    }

    /// Adjust the score of a tracked peer.
    ///
    /// Returns `false` if the peer is not tracked or `delta` is not finite.
    pub fn add_score(&self, peer: &Id, delta: f64) -> bool {
        delta.is_finite() && self.shared.update_score(peer, |stat| stat.add_score(delta))
    }

    /// Overwrite the score of a tracked peer.
    ///
    /// Returns `false` if the peer is not tracked or `score` is not finite.
    pub fn set_score(&self, peer: &Id, score: f64) -> bool {
        score.is_finite() && self.shared.update_score(peer, |stat| stat.set_score(score))
    }

    /// Copy of every tracked peer.
    pub fn peers(&self) -> Vec<PeerStat<Id>> {
        self.shared.peers.read().tracked.values().cloned().collect()
    }

    /// Up to `limit` tracked peers, highest score first.
    pub fn best_peers(&self, limit: usize) -> Vec<PeerStat<Id>> {
        let mut peers = self.peers();
        peers.sort_by(|a, b| b.score().total_cmp(&a.score()));
        peers.truncate(limit);
        peers
    }

    /// Copy of every disconnected peer still within its grace period.
    pub fn disconnected_peers(&self) -> Vec<PeerStat<Id>> {
        self.shared
            .peers
            .read()
            .disconnected
            .values()
            .cloned()
            .collect()
    }

    pub fn tracked_count(&self) -> usize {
        self.shared.peers.read().tracked.len()
    }

    pub fn disconnected_count(&self) -> usize {
        self.shared.peers.read().disconnected.len()
    }

    pub fn is_tracked(&self, peer: &Id) -> bool {
        self.shared.peers.read().tracked.contains_key(peer)
    }

    pub fn is_disconnected(&self, peer: &Id) -> bool {
        self.shared.peers.read().disconnected.contains_key(peer)
    }

    /// Score of a tracked or disconnected peer.
    pub fn score(&self, peer: &Id) -> Option<f64> {
        let peers = self.shared.peers.read();
        peers
            .tracked
            .get(peer)
            .or_else(|| peers.disconnected.get(peer))
            .map(PeerStat::score)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent<Id>> {
        self.shared.events.subscribe()
    }
}

impl<Id: NetPeerId> Drop for PeerTracker<Id> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryPeerIdStore, MockGater, MockNetwork};

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    struct TestId(u64);

    const LOCAL: TestId = TestId(0);

    struct Harness {
        network: Arc<MockNetwork<TestId>>,
        gater: Arc<MockGater<TestId>>,
        store: Arc<MemoryPeerIdStore<TestId>>,
        tracker: PeerTracker<TestId>,
    }

    fn harness(config: PeerTrackerConfig) -> Harness {
        let network = Arc::new(MockNetwork::new(LOCAL));
        let gater = Arc::new(MockGater::new());
        let store = Arc::new(MemoryPeerIdStore::new());
        let tracker = PeerTracker::<TestId>::builder(network.clone(), gater.clone())
            .with_store(store.clone())
            .with_config(config)
            .build();
        Harness {
            network,
            gater,
            store,
            tracker,
        }
    }

    fn default_harness() -> Harness {
        harness(PeerTrackerConfig::default())
    }

    #[test]
    fn test_connect_creates_default_stat() {
        let h = default_harness();

        h.tracker.connected(TestId(1));

        let peers = h.tracker.peers();
        assert_eq!(peers.len(), 1);
        assert_eq!(*peers[0].peer_id(), TestId(1));
        assert!((peers[0].score() - 1.0).abs() < f64::EPSILON);
        assert!(peers[0].prune_deadline().is_none());
    }

    #[test]
    fn test_connect_ignores_self_and_transient() {
        let h = default_harness();

        h.tracker.connected(LOCAL);
        h.network.connect_transient(TestId(1));
        h.tracker.connected(TestId(1));

        assert_eq!(h.tracker.tracked_count(), 0);
        assert_eq!(h.tracker.disconnected_count(), 0);
    }

    #[test]
    fn test_duplicate_connect_keeps_score() {
        let h = default_harness();

        h.tracker.connected(TestId(1));
        assert!(h.tracker.add_score(&TestId(1), 4.0));
        h.tracker.connected(TestId(1));

        assert_eq!(h.tracker.tracked_count(), 1);
        assert_eq!(h.tracker.score(&TestId(1)), Some(5.0));
    }

    #[test]
    fn test_disconnect_moves_peer_with_deadline() {
        let h = default_harness();
        h.tracker.connected(TestId(1));

        let before = Instant::now();
        h.tracker.disconnected(TestId(1));

        assert!(!h.tracker.is_tracked(&TestId(1)));
        assert!(h.tracker.is_disconnected(&TestId(1)));
        assert!(h.tracker.peers().is_empty());

        let stat = &h.tracker.disconnected_peers()[0];
        let deadline = stat.prune_deadline().unwrap();
        assert!(deadline >= before + h.tracker.config().max_awaiting_time);
    }

    #[test]
    fn test_disconnect_unknown_peer_is_noop() {
        let h = default_harness();
        h.tracker.disconnected(TestId(1));
        assert_eq!(h.tracker.disconnected_count(), 0);
    }

    #[test]
    fn test_reconnect_restores_score() {
        let h = default_harness();
        h.tracker.connected(TestId(1));
        h.tracker.add_score(&TestId(1), 2.0);

        h.tracker.disconnected(TestId(1));
        assert_eq!(h.tracker.score(&TestId(1)), Some(3.0));
        // Disconnected peers can't be rewarded.
        assert!(!h.tracker.add_score(&TestId(1), 1.0));

        h.tracker.connected(TestId(1));
        assert!(h.tracker.is_tracked(&TestId(1)));
        assert!(!h.tracker.is_disconnected(&TestId(1)));
        let stat = &h.tracker.peers()[0];
        assert_eq!(stat.score(), 3.0);
        assert!(stat.prune_deadline().is_none());
    }

    #[test]
    fn test_capacity_rejects_new_peer() {
        let h = harness(PeerTrackerConfig::default().with_max_peers(3));

        for i in 1..=4 {
            h.tracker.connected(TestId(i));
        }
        assert_eq!(h.tracker.tracked_count(), 4);

        // 4 > 3 and all of them connected.
        h.tracker.connected(TestId(5));
        assert!(!h.tracker.is_tracked(&TestId(5)));
        assert!(!h.tracker.is_disconnected(&TestId(5)));
        assert_eq!(h.tracker.tracked_count(), 4);
    }

    #[test]
    fn test_capacity_admits_when_disconnected_dominate() {
        let h = harness(PeerTrackerConfig::default().with_max_peers(3));

        for i in 1..=4 {
            h.tracker.connected(TestId(i));
        }
        for i in 1..=3 {
            h.tracker.disconnected(TestId(i));
        }

        // Over capacity, but only 1 connected against 3 disconnected.
        h.tracker.connected(TestId(5));
        assert!(h.tracker.is_tracked(&TestId(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gc_evicts_unrewarded_peer() {
        let h = default_harness();
        let mut events = h.tracker.subscribe();

        h.tracker.connected(TestId(1));
        let survivors = h.tracker.gc();

        assert!(survivors.is_empty());
        assert_eq!(h.tracker.tracked_count(), 0);
        assert!(matches!(events.recv().await.unwrap(), TrackerEvent::Tracked { .. }));
        assert_eq!(
            events.recv().await.unwrap(),
            TrackerEvent::Pruned {
                peer: TestId(1),
                reason: PruneReason::LowScore
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_gc_keeps_rewarded_and_persists() {
        let h = default_harness();

        h.tracker.connected(TestId(1));
        h.tracker.connected(TestId(2));
        h.tracker.add_score(&TestId(1), 0.5);
        h.tracker.set_score(&TestId(2), 1.0);

        let survivors = h.tracker.gc();
        assert_eq!(survivors, vec![TestId(1)]);
        assert_eq!(h.store.peers(), vec![TestId(1)]);
        assert_eq!(h.store.put_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gc_prunes_expired_disconnected() {
        let h = harness(
            PeerTrackerConfig::default().with_max_awaiting_time(Duration::from_secs(10)),
        );

        h.tracker.connected(TestId(1));
        h.tracker.connected(TestId(2));
        h.tracker.disconnected(TestId(1));
        tokio::time::advance(Duration::from_secs(5)).await;
        h.tracker.disconnected(TestId(2));

        tokio::time::advance(Duration::from_secs(6)).await;
        h.tracker.gc();
        assert!(!h.tracker.is_disconnected(&TestId(1)));
        assert!(h.tracker.is_disconnected(&TestId(2)));

        tokio::time::advance(Duration::from_secs(5)).await;
        h.tracker.gc();
        assert_eq!(h.tracker.disconnected_count(), 0);
        assert_eq!(h.tracker.score(&TestId(2)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gc_store_failure_is_not_fatal() {
        let h = default_harness();
        h.store.set_fail(true);

        h.tracker.connected(TestId(1));
        h.tracker.add_score(&TestId(1), 1.0);

        assert_eq!(h.tracker.gc(), vec![TestId(1)]);
        assert_eq!(h.store.put_count(), 1);
        assert!(h.tracker.is_tracked(&TestId(1)));
    }

    #[test]
    fn test_gc_without_store() {
        let network = Arc::new(MockNetwork::new(LOCAL));
        let gater = Arc::new(MockGater::new());
        let tracker =
            PeerTracker::<TestId>::new(network, gater, None, PeerTrackerConfig::default());

        tracker.connected(TestId(1));
        tracker.add_score(&TestId(1), 1.0);
        assert_eq!(tracker.gc(), vec![TestId(1)]);
    }

    #[test]
    fn test_block_peer_removes_from_both_maps() {
        let h = default_harness();
        h.tracker.connected(TestId(1));
        h.tracker.connected(TestId(2));
        h.tracker.disconnected(TestId(2));

        h.tracker.block_peer(TestId(1), "invalid header");
        h.tracker.block_peer(TestId(2), "invalid header");

        assert_eq!(h.tracker.tracked_count(), 0);
        assert_eq!(h.tracker.disconnected_count(), 0);
        assert!(h.gater.is_blocked(&TestId(1)));
        assert!(h.gater.is_blocked(&TestId(2)));
        assert_eq!(h.network.closed_peers(), vec![TestId(1), TestId(2)]);
    }

    #[test]
    fn test_block_peer_when_collaborators_fail() {
        let h = default_harness();
        h.gater.set_fail(true);
        h.network.set_fail_close(true);
        h.tracker.connected(TestId(1));

        h.tracker.block_peer(TestId(1), "timeout");

        assert!(!h.tracker.is_tracked(&TestId(1)));
        assert!(!h.gater.is_blocked(&TestId(1)));
    }

    #[test]
    fn test_non_finite_scores_rejected() {
        let h = default_harness();
        h.tracker.connected(TestId(1));
        h.tracker.connected(TestId(2));

        assert!(!h.tracker.add_score(&TestId(1), f64::NAN));
        assert!(!h.tracker.add_score(&TestId(1), f64::INFINITY));
        assert!(!h.tracker.set_score(&TestId(1), f64::NEG_INFINITY));
        assert_eq!(h.tracker.score(&TestId(1)), Some(1.0));
        assert!(h.tracker.add_score(&TestId(2), 100.0));

        assert_eq!(h.tracker.gc(), vec![TestId(2)]);
        assert_eq!(*h.tracker.best_peers(1)[0].peer_id(), TestId(2));
    }

    #[test]
    fn test_gc_evicts_unordered_score() {
        let h = default_harness();
        h.tracker.connected(TestId(1));
        h.tracker
            .shared
            .update_score(&TestId(1), |stat| stat.set_score(f64::NAN));

        assert!(h.tracker.gc().is_empty());
        assert!(!h.tracker.is_tracked(&TestId(1)));
    }

    #[test]
    fn test_best_peers_sorted_by_score() {
        let h = default_harness();
        for i in 1..=4 {
            h.tracker.connected(TestId(i));
            h.tracker.set_score(&TestId(i), i as f64);
        }

        let best: Vec<_> = h
            .tracker
            .best_peers(2)
            .into_iter()
            .map(|stat| *stat.peer_id())
            .collect();
        assert_eq!(best, vec![TestId(4), TestId(3)]);
    }

    #[test]
    fn test_peers_snapshot_is_a_copy() {
        let h = default_harness();
        h.tracker.connected(TestId(1));

        let snapshot = h.tracker.peers();
        h.tracker.add_score(&TestId(1), 10.0);

        assert_eq!(snapshot[0].score(), 1.0);
        assert_eq!(h.tracker.score(&TestId(1)), Some(11.0));
    }

    #[tokio::test]
    async fn test_concurrent_connects() {
        let h = default_harness();
        let tracker = Arc::new(h.tracker);

        let mut handles = Vec::new();
        for worker in 0..4u64 {
            let tracker = Arc::clone(&tracker);
            handles.push(tokio::spawn(async move {
                for i in 0..20 {
                    let peer = TestId(1 + worker * 20 + i);
                    tracker.connected(peer);
                    tracker.add_score(&peer, 1.0);
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(tracker.tracked_count(), 80);
        assert!(tracker.peers().iter().all(|stat| stat.score() == 2.0));
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let h = default_harness();
        h.tracker.stop(&CancellationToken::new()).await.unwrap();

        // Starting after stop is refused.
        h.tracker.start();
        assert_eq!(h.network.subscriber_count(), 0);
    }
}

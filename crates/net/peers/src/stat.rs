//! Per-peer reputation record.

use tokio::time::Instant;

use crate::traits::NetPeerId;

/// Score and disconnect deadline of one peer.
///
/// Only the tracker mutates these, under its peer-map lock. Everything handed
/// out by the tracker is a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerStat<Id: NetPeerId> {
    peer_id: Id,
    score: f64,
    /// Set while the peer sits in the disconnected set.
    prune_deadline: Option<Instant>,
}

impl<Id: NetPeerId> PeerStat<Id> {
    pub fn new(peer_id: Id, score: f64) -> Self {
        Self {
            peer_id,
            score,
            prune_deadline: None,
        }
    }

    pub fn peer_id(&self) -> &Id {
        &self.peer_id
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn prune_deadline(&self) -> Option<Instant> {
        self.prune_deadline
    }

    /// Whether the grace period of a disconnected peer is over.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.prune_deadline.is_some_and(|deadline| deadline <= now)
    }

    pub(crate) fn add_score(&mut self, delta: f64) {
        self.score += delta;
    }

    pub(crate) fn set_score(&mut self, score: f64) {
        self.score = score;
    }

    pub(crate) fn mark_disconnected(&mut self, deadline: Instant) {
        self.prune_deadline = Some(deadline);
    }

    pub(crate) fn mark_reconnected(&mut self) {
        self.prune_deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_peer_stat_new() {
        let stat = PeerStat::new(7u64, 1.0);
        assert_eq!(*stat.peer_id(), 7);
        assert!((stat.score() - 1.0).abs() < f64::EPSILON);
        assert!(stat.prune_deadline().is_none());
        assert!(!stat.is_expired(Instant::now()));
    }

    #[test]
    fn test_score_operations() {
        let mut stat = PeerStat::new(1u64, 1.0);
        stat.add_score(2.5);
        assert!((stat.score() - 3.5).abs() < f64::EPSILON);
        stat.add_score(-4.0);
        assert!((stat.score() + 0.5).abs() < f64::EPSILON);
        stat.set_score(10.0);
        assert!((stat.score() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_prune_deadline() {
        let now = Instant::now();
        let mut stat = PeerStat::new(1u64, 1.0);

        stat.mark_disconnected(now + Duration::from_secs(60));
        assert!(!stat.is_expired(now));
        assert!(stat.is_expired(now + Duration::from_secs(60)));
        assert!(stat.is_expired(now + Duration::from_secs(61)));

        stat.mark_reconnected();
        assert!(stat.prune_deadline().is_none());
        assert!(!stat.is_expired(now + Duration::from_secs(61)));
    }
}

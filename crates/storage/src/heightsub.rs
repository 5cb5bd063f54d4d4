//! Wait until the header at a given height becomes locally available.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use hdrx_primitives::{Header, is_contiguous};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, error, trace};

use crate::error::HeightSubError;

/// Pending waiters keyed by the height they wait for.
type HeightReqs<H> = HashMap<u64, Vec<Waiter<H>>>;

/// Single-slot result channel of one `sub` call.
#[derive(Debug)]
struct Waiter<H> {
    id: u64,
    tx: oneshot::Sender<H>,
}

/// Height-indexed wait/notify primitive.
///
/// `height` is the latest header that has been verified and inserted locally.
/// Callers park on [`HeightSub::sub`] for a future height; the ingestion
/// pipeline announces new headers through [`HeightSub::publish`].
///
/// `publish` must only be called from one task at a time. `sub` can be called
/// from any number of tasks.
#[derive(Debug)]
pub struct HeightSub<H: Header> {
    height: AtomicU64,
    height_reqs: Mutex<HeightReqs<H>>,
    next_waiter_id: AtomicU64,
    span: Span,
}

impl<H: Header> Default for HeightSub<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Header> HeightSub<H> {
    pub fn new() -> Self {
        Self {
            height: AtomicU64::new(0),
            height_reqs: Mutex::new(HashMap::new()),
            next_waiter_id: AtomicU64::new(0),
            span: Span::none(),
        }
    }

    /// Attach a span that all records of this subscriber are emitted under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    /// Overwrite the current height, e.g. with the head of an existing store.
    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Number of distinct heights somebody is waiting for.
    pub fn pending_heights(&self) -> usize {
        self.height_reqs.lock().len()
    }

    /// Number of parked `sub` calls across all heights.
    pub fn pending_requests(&self) -> usize {
        self.height_reqs.lock().values().map(Vec::len).sum()
    }

    /// Wait for the header at `height`.
    ///
    /// Fails with [`HeightSubError::ElapsedHeight`] if that header was already
    /// published; the caller has to fetch it from the store. Fails with
    /// [`HeightSubError::Cancelled`] once `cancel` fires. The registration is
    /// removed on cancellation and also when the returned future is dropped.
    pub async fn sub(&self, height: u64, cancel: &CancellationToken) -> Result<H, HeightSubError> {
        self.check_pending(height)?;

        let (rx, mut registration) = {
            let mut reqs = self.height_reqs.lock();
            // Publish may have advanced the height while we waited for the lock.
            self.check_pending(height)?;

            let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = oneshot::channel();
            reqs.entry(height).or_default().push(Waiter { id, tx });

            (rx, Registration::new(self, height, id))
        };

        trace!(parent: &self.span, height, "waiting for header");

        tokio::select! {
            biased;

            res = rx => {
                // The bucket was taken by publish, nothing left to clean up.
                registration.disarm();
                res.map_err(|_| HeightSubError::Dropped { height })
            }
            _ = cancel.cancelled() => {
                debug!(parent: &self.span, height, "wait for header cancelled");
                Err(HeightSubError::Cancelled { height })
            }
        }
    }

    /// Fulfil every waiter whose height is covered by `headers`.
    ///
    /// `headers` must be contiguous and start right after [`HeightSub::height`].
    ///
    /// # Panics
    ///
    /// If the first header does not follow the current height. Headers arriving
    /// out of order mean the ingestion pipeline is broken, and continuing would
    /// desynchronize the height from the pending requests.
    pub fn publish(&self, headers: &[H]) {
        let (Some(first), Some(last)) = (headers.first(), headers.last()) else {
            return;
        };

        let height = self.height();
        let (from, to) = (first.height(), last.height());
        if height.checked_add(1) != Some(from) {
            error!(
                parent: &self.span,
                height,
                from,
                to,
                "headers given to the height subscriber are in the wrong order"
            );
            panic!(
                "headers published out of order: current height {height}, first header {from}. \
                 Please file a bug report"
            );
        }
        debug_assert!(is_contiguous(headers), "published headers must be contiguous");

        self.set_height(to);

        let mut reqs = self.height_reqs.lock();

        if let [header] = headers {
            if let Some(waiters) = reqs.remove(&from) {
                fulfil(waiters, header);
            }
            return;
        }

        // Usually far fewer pending heights than published headers, so walk the requests.
        for (h, waiters) in reqs.extract_if(|h, _| (from..=to).contains(h)) {
            let header = usize::try_from(h - from)
                .ok()
                .and_then(|offset| headers.get(offset));
            match header {
                Some(header) => fulfil(waiters, header),
                None => error!(parent: &self.span, height = h, "no header for pending height"),
            }
        }

        trace!(parent: &self.span, from, to, pending = reqs.len(), "published headers");
    }

    fn check_pending(&self, requested: u64) -> Result<(), HeightSubError> {
        let current = self.height();
        if current >= requested {
            return Err(HeightSubError::ElapsedHeight { requested, current });
        }
        Ok(())
    }

    fn remove_waiter(&self, height: u64, id: u64) {
        let mut reqs = self.height_reqs.lock();
        if let Some(waiters) = reqs.get_mut(&height) {
            waiters.retain(|waiter| waiter.id != id);
            if waiters.is_empty() {
                reqs.remove(&height);
            }
        }
    }
}

/// Slots are single-use oneshots, so delivery never blocks.
fn fulfil<H: Header>(waiters: Vec<Waiter<H>>, header: &H) {
    for waiter in waiters {
        // Receiver gone means the caller gave up between the scan and now.
        let _ = waiter.tx.send(header.clone());
    }
}

/// Removes a `sub` registration unless the header was delivered.
struct Registration<'a, H: Header> {
    sub: &'a HeightSub<H>,
    height: u64,
    id: u64,
    armed: bool,
}

impl<'a, H: Header> Registration<'a, H> {
    fn new(sub: &'a HeightSub<H>, height: u64, id: u64) -> Self {
        Self {
            sub,
            height,
            id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<H: Header> Drop for Registration<'_, H> {
    fn drop(&mut self) {
        if self.armed {
            self.sub.remove_waiter(self.height, self.id);
        }
    }
}

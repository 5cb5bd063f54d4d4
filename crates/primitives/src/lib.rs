//! Core primitive types for header exchange.
//!
//! # Types
//!
//! - [`Header`] - Anything placed at a height in the synchronized chain
//! - [`PeerId`] - libp2p peer identifier (remote participants)

use auto_impl::auto_impl;

// Re-export libp2p PeerId for peer identity
pub use libp2p::PeerId;

/// A chain header as seen by the exchange machinery.
///
/// Only the position in the chain matters here; validation and encoding live with
/// the concrete header type. Headers are cloned once per waiter when published, so
/// large headers should be wrapped in an [`Arc`](std::sync::Arc) (which implements this trait).
#[auto_impl(Arc, Box)]
pub trait Header: Clone + Send + Sync + 'static {
    /// Height of this header in the chain.
    fn height(&self) -> u64;
}

impl Header for u64 {
    fn height(&self) -> u64 {
        *self
    }
}

/// Returns `true` when `headers` is a strictly increasing run with no gaps.
pub fn is_contiguous<H: Header>(headers: &[H]) -> bool {
    headers
        .windows(2)
        .all(|pair| matches!(pair, [a, b] if a.height().checked_add(1) == Some(b.height())))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct TestHeader {
        height: u64,
        payload: Vec<u8>,
    }

    impl Header for TestHeader {
        fn height(&self) -> u64 {
            self.height
        }
    }

    #[test]
    fn test_header_through_smart_pointers() {
        let header = TestHeader {
            height: 7,
            payload: vec![1, 2, 3],
        };

        assert_eq!(Arc::new(header.clone()).height(), 7);
        assert_eq!(Box::new(header).height(), 7);
        assert_eq!(42u64.height(), 42);
    }

    #[test]
    fn test_is_contiguous() {
        assert!(is_contiguous::<u64>(&[]));
        assert!(is_contiguous(&[5u64]));
        assert!(is_contiguous(&[5u64, 6, 7]));
        assert!(!is_contiguous(&[5u64, 7]));
        assert!(!is_contiguous(&[5u64, 5]));
        assert!(!is_contiguous(&[6u64, 5]));
        assert!(!is_contiguous(&[u64::MAX, 0]));
    }

    proptest! {
        #[test]
        fn test_is_contiguous_runs(
            start in 0u64..u64::MAX / 2,
            len in 0usize..64,
        ) {
            let headers: Vec<u64> = (start..).take(len).collect();
            prop_assert!(is_contiguous(&headers));
        }

        #[test]
        fn test_is_contiguous_rejects_bumped_height(
            start in 0u64..u64::MAX / 2,
            len in 2usize..64,
            index in any::<prop::sample::Index>(),
            bump in 1u64..1_000,
        ) {
            let mut headers: Vec<u64> = (start..).take(len).collect();
            let i = index.index(len);
            headers[i] += bump;
            prop_assert!(!is_contiguous(&headers));
        }
    }
}

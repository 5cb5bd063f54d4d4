use thiserror::Error;

/// Errors returned when waiting for a header at a given height.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeightSubError {
    /// The requested header was already published. Look it up in the store instead.
    #[error("elapsed height: requested {requested}, current height {current}")]
    ElapsedHeight { requested: u64, current: u64 },
    /// The caller cancelled the wait.
    #[error("wait for height {height} cancelled")]
    Cancelled { height: u64 },
    /// The waiter slot was discarded without a header. Only happens when `publish`
    /// is given a non-contiguous run, which is a bug in the caller.
    #[error("wait for height {height} dropped without a header")]
    Dropped { height: u64 },
}

impl HeightSubError {
    pub fn is_elapsed(&self) -> bool {
        matches!(self, Self::ElapsedHeight { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

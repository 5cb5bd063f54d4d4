//! Local header store primitives.

mod error;
pub mod heightsub;

pub use error::HeightSubError;
pub use heightsub::HeightSub;

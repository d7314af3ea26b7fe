//! Error types for ring arithmetic.

use num_bigint::BigInt;

use crate::token::TokenRange;

/// Errors that can occur during ring arithmetic and partitioning.
#[derive(Debug, thiserror::Error)]
pub enum RingError {
    /// A token value lay more than one full rotation outside the ring.
    #[error("token {value} lies outside the ring and cannot be wrapped")]
    OutOfRing {
        /// The value that could not be reduced onto the ring.
        value: BigInt,
    },

    /// Splitting a range produced sub-ranges whose sizes do not sum to the
    /// size of the original range.
    #[error("sub-ranges generated for {range} differ from its size by {difference}")]
    PartitionInvariant {
        /// The range that was being split.
        range: TokenRange,
        /// Absolute difference between the range size and the sub-range sum.
        difference: BigInt,
    },
}

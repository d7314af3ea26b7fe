//! Half-open token ranges on the signed 64-bit ring.

use std::fmt;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::error::RingError;

/// Total number of tokens on the ring: `2^64`.
///
/// Does not fit in 64 bits, which is why all size arithmetic is done with
/// [`BigInt`].
pub fn full_range() -> BigInt {
    BigInt::from(1u8) << 64
}

/// A half-open interval `[start, end)` on the token ring.
///
/// When `start >= end` the range wraps through the ring minimum;
/// `start == end` denotes the full ring.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRange {
    /// First token covered by the range.
    pub start: i64,
    /// First token after the range.
    pub end: i64,
}

impl TokenRange {
    /// Create the range `[start, end)`.
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Number of tokens covered by the range, in `[1, 2^64]`.
    pub fn size(&self) -> BigInt {
        if self.start < self.end {
            BigInt::from(self.end) - BigInt::from(self.start)
        } else {
            full_range() - (BigInt::from(self.start) - BigInt::from(self.end))
        }
    }

    /// Whether the range wraps through the ring minimum.
    pub fn is_wrapping(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for TokenRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl fmt::Debug for TokenRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenRange{self}")
    }
}

/// Reduce a token value back onto the ring.
///
/// Values already in `[i64::MIN, i64::MAX]` pass through unchanged. Values
/// that exceeded `i64::MAX` by at most one full rotation are brought back by
/// subtracting [`full_range`]. Anything else is [`RingError::OutOfRing`];
/// given the partitioner's invariants that should never happen, but it is
/// asserted rather than assumed.
pub fn wrap_to_token(value: &BigInt) -> Result<i64, RingError> {
    if let Ok(token) = i64::try_from(value) {
        return Ok(token);
    }
    i64::try_from(&(value - full_range())).map_err(|_| RingError::OutOfRing {
        value: value.clone(),
    })
}

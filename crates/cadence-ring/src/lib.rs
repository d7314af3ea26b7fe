//! Token arithmetic and range partitioning for Cadence.
//!
//! This crate provides:
//!
//! - [`TokenRange`] — a half-open interval on the signed 64-bit token ring,
//!   with wrap-around through the ring minimum.
//! - [`full_range`] / [`wrap_to_token`] — ring-size arithmetic. The full
//!   ring holds `2^64` tokens, so sizes and offsets use [`BigInt`].
//! - [`partition`] — splits or combines an ordered sequence of ranges into
//!   repair units of a wanted token count.
//!
//! [`BigInt`]: num_bigint::BigInt

pub mod error;
pub mod partitioner;
pub mod token;

pub use error::RingError;
pub use partitioner::partition;
pub use token::{TokenRange, full_range, wrap_to_token};

//! Splitting and combining of token ranges into repair units.
//!
//! [`partition`] turns an ordered sequence of token ranges into an ordered
//! list of repair units, each unit at most `tokens_per_task` tokens wide:
//!
//! - With a target of zero, every input range becomes its own unit
//!   (compatibility mode for configurations without a target repair size).
//! - When the first input range is wider than the target, every range is
//!   split into sub-ranges of the target size.
//! - Otherwise consecutive ranges are packed greedily into units.
//!
//! The split/combine decision looks at the first range only: callers hand
//! over ring-ordered vnode ranges of uniform size, so the first range is
//! representative.

use num_bigint::BigInt;
use tracing::{error, trace};

use crate::error::RingError;
use crate::token::{TokenRange, wrap_to_token};

/// Partition `ranges` into repair units of at most `tokens_per_task` tokens.
///
/// The outer index of the result is the unit index; each unit lists its
/// ranges in input order. Ranges are never reordered across units: a range
/// always lands in a unit at or after the unit of its predecessor.
pub fn partition(
    ranges: &[TokenRange],
    tokens_per_task: &BigInt,
) -> Result<Vec<Vec<TokenRange>>, RingError> {
    let zero = BigInt::from(0u8);
    if *tokens_per_task == zero {
        trace!("no target size, returning ranges as they are");
        return Ok(ranges.iter().map(|range| vec![*range]).collect());
    }

    match ranges.first() {
        None => Ok(Vec::new()),
        Some(first) if first.size() > *tokens_per_task => {
            trace!("splitting ranges");
            let mut units = Vec::new();
            for range in ranges {
                for sub_range in split_range(range, tokens_per_task)? {
                    units.push(vec![sub_range]);
                }
            }
            Ok(units)
        }
        Some(_) => {
            trace!("combining ranges");
            Ok(combine_ranges(ranges, tokens_per_task))
        }
    }
}

/// Pack ranges greedily: seal the current unit as soon as the next range
/// would push its accumulated size past the target. A range wider than the
/// target therefore sits alone in its unit.
fn combine_ranges(ranges: &[TokenRange], tokens_per_task: &BigInt) -> Vec<Vec<TokenRange>> {
    let mut units: Vec<Vec<TokenRange>> = Vec::new();
    let mut current: Vec<TokenRange> = Vec::new();
    let mut accumulated = BigInt::from(0u8);

    for range in ranges {
        let size = range.size();
        if !current.is_empty() && &accumulated + &size > *tokens_per_task {
            units.push(std::mem::take(&mut current));
            accumulated = BigInt::from(0u8);
        }
        current.push(*range);
        accumulated += size;
    }
    if !current.is_empty() {
        units.push(current);
    }

    units
}

/// Split one range into sub-ranges of `tokens_per_task` tokens.
///
/// The first `n - 1` sub-ranges have exactly the target size; the last one
/// runs from the previous end to the original end so the sub-range sizes sum
/// to the range size even when the target does not divide it.
fn split_range(
    range: &TokenRange,
    tokens_per_task: &BigInt,
) -> Result<Vec<TokenRange>, RingError> {
    let total_size = range.size();
    if total_size <= *tokens_per_task {
        return Ok(vec![*range]);
    }

    let mut sub_range_count = &total_size / tokens_per_task;
    if &total_size % tokens_per_task > BigInt::from(0u8) {
        sub_range_count += 1u8;
    }

    // At least two sub-ranges from here on: emit all but the last at the
    // exact target size, wrapping endpoints back onto the ring.
    let start = BigInt::from(range.start);
    let head_count = sub_range_count - 1u8;
    let mut sub_ranges = Vec::new();
    let mut index = BigInt::from(0u8);
    while index < head_count {
        let sub_start = wrap_to_token(&(&start + &index * tokens_per_task))?;
        let sub_end = wrap_to_token(&(&start + (&index + 1u8) * tokens_per_task))?;
        sub_ranges.push(TokenRange::new(sub_start, sub_end));
        index += 1u8;
    }
    if let Some(last) = sub_ranges.last() {
        sub_ranges.push(TokenRange::new(last.end, range.end));
    }

    validate_sub_range_sizes(&total_size, range, &sub_ranges)?;
    Ok(sub_ranges)
}

/// Split post-condition: the sub-range sizes must sum to the range size.
fn validate_sub_range_sizes(
    total_size: &BigInt,
    range: &TokenRange,
    sub_ranges: &[TokenRange],
) -> Result<(), RingError> {
    let sum: BigInt = sub_ranges.iter().map(TokenRange::size).sum();
    if sum != *total_size {
        let difference = if sum > *total_size {
            &sum - total_size
        } else {
            total_size - &sum
        };
        error!(
            %range,
            %difference,
            sub_ranges = sub_ranges.len(),
            "unexpected sub-range generation"
        );
        return Err(RingError::PartitionInvariant {
            range: *range,
            difference,
        });
    }
    Ok(())
}

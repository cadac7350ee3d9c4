//! `Range: bytes=...` handling for video playback.
//!
//! Only single ranges of the forms `start-` and `start-end` are understood.
//! Suffix ranges (`-len`) and multi-range lists are not satisfiable.

use thiserror::Error;

/// What to send for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// No usable `Range` header: the whole object with 200.
    Full,
    /// Inclusive `[start, end]` with 206.
    Partial { start: u64, end: u64 },
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("Range not satisfiable for object of {total_size} bytes")]
    NotSatisfiable { total_size: u64 },
}

/// Resolve a `Range` header value against an object of `total_size` bytes.
///
/// A missing header, or one without the `bytes=` unit prefix, selects the whole
/// object. An end past the object is clamped to the last byte.
pub fn resolve(header: Option<&str>, total_size: u64) -> Result<ByteRange, RangeError> {
    let range_set = match header.and_then(|h| h.trim().strip_prefix("bytes=")) {
        Some(range_set) => range_set.trim(),
        None => return Ok(ByteRange::Full),
    };

    let unsatisfiable = RangeError::NotSatisfiable { total_size };

    if range_set.contains(',') {
        return Err(unsatisfiable);
    }

    let (start, end) = range_set.split_once('-').ok_or(unsatisfiable)?;
    let start: u64 = start.trim().parse().map_err(|_| unsatisfiable)?;
    if start >= total_size {
        return Err(unsatisfiable);
    }

    let last = total_size - 1;
    let end = match end.trim() {
        "" => last,
        value => value
            .parse::<u64>()
            .map_err(|_| unsatisfiable)?
            .min(last),
    };

    if end < start || end >= total_size {
        return Err(unsatisfiable);
    }

    Ok(ByteRange::Partial { start, end })
}

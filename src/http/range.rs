//! `Range: bytes=...` parsing and multipart/byteranges framing.
//!
//! Accepted forms per range: `start-end`, `start-`, `-suffix`. A range that
//! cannot be parsed or satisfied is skipped; the rest of the list is kept.
//! Callers serve the full body when nothing usable is left.
//!
//! A list longer than [`MAX_RANGES`] is refused outright and overlapping
//! ranges are merged, so a ranged body stays within the resource size plus
//! part headers.

use std::fmt;

use tracing::debug;

use crate::container::{AllocError, DynamicList};

/// Separator between the parts of a multi-range body.
pub const MULTIPART_BOUNDARY: &str = "lantern-byteranges-5f1c9e2a";

/// Most ranges accepted in one `Range` header.
pub const MAX_RANGES: usize = 16;

/// An inclusive byte range already validated against a resource size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value for a `Content-Range` header, e.g. `bytes 0-499/1000`.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("range unit is not bytes")]
    UnsupportedUnit,
    #[error("malformed range spec")]
    InvalidSyntax,
    #[error("range not satisfiable for a resource of {0} bytes")]
    NotSatisfiable(u64),
    #[error("more than {0} ranges requested")]
    TooManyRanges(usize),
    #[error(transparent)]
    Alloc(#[from] AllocError),
}

fn parse_offset(s: &str) -> Result<u64, RangeError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::InvalidSyntax);
    }
    s.parse().map_err(|_| RangeError::InvalidSyntax)
}

/// Resolves one range spec (the part between commas) against `total`.
pub fn parse_range_spec(spec: &str, total: u64) -> Result<ByteRange, RangeError> {
    let (first, last) = spec.trim().split_once('-').ok_or(RangeError::InvalidSyntax)?;
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // bytes=-N: the final N bytes
        let suffix = parse_offset(last)?;
        if suffix == 0 || total == 0 {
            return Err(RangeError::NotSatisfiable(total));
        }
        return Ok(ByteRange {
            start: total.saturating_sub(suffix),
            end: total - 1,
        });
    }

    let start = parse_offset(first)?;
    let end = if last.is_empty() {
        None
    } else {
        Some(parse_offset(last)?)
    };

    if let Some(end) = end {
        if end < start {
            return Err(RangeError::InvalidSyntax);
        }
    }
    if start >= total {
        return Err(RangeError::NotSatisfiable(total));
    }

    Ok(ByteRange {
        start,
        end: end.map_or(total - 1, |e| e.min(total - 1)),
    })
}

/// Parses a whole `Range` header value.
///
/// A wrong unit, a missing `=` or more than [`MAX_RANGES`] ranges fail the
/// header as a whole; bad individual ranges are dropped. Overlapping ranges
/// are merged. The returned list may be empty.
pub fn parse_range_header(header: &str, total: u64) -> Result<DynamicList<ByteRange>, RangeError> {
    let (unit, set) = header.trim().split_once('=').ok_or(RangeError::InvalidSyntax)?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return Err(RangeError::UnsupportedUnit);
    }

    let specs = || set.split(',').filter(|s| !s.trim().is_empty());
    if specs().count() > MAX_RANGES {
        return Err(RangeError::TooManyRanges(MAX_RANGES));
    }

    let mut ranges = DynamicList::with_increment(4);
    for spec in specs() {
        match parse_range_spec(spec, total) {
            Ok(range) => ranges.append(range)?,
            Err(e) => debug!(spec = spec.trim(), error = %e, "Ignoring byte range"),
        }
    }
    coalesce(ranges)
}

/// Merges overlapping ranges into ascending order. A list without overlaps
/// keeps the order it was requested in.
fn coalesce(ranges: DynamicList<ByteRange>) -> Result<DynamicList<ByteRange>, RangeError> {
    let mut sorted: Vec<ByteRange> = ranges.iter().copied().collect();
    sorted.sort_by_key(|r| r.start);
    if sorted.windows(2).all(|w| w[0].end < w[1].start) {
        return Ok(ranges);
    }

    let mut merged = DynamicList::with_increment(4);
    let mut rest = sorted.into_iter();
    let Some(mut current) = rest.next() else {
        return Ok(merged);
    };
    for range in rest {
        if range.start <= current.end {
            current.end = current.end.max(range.end);
        } else {
            merged.append(current)?;
            current = range;
        }
    }
    merged.append(current)?;
    Ok(merged)
}

/// Entity headers opening one part of a multipart/byteranges body.
pub fn multipart_part_header(content_type: &str, range: &ByteRange, total: u64) -> String {
    format!(
        "\r\n--{}\r\nContent-type: {}\r\nContent-range: {}\r\nContent-length: {}\r\n\r\n",
        MULTIPART_BOUNDARY,
        content_type,
        range.content_range(total),
        range.len()
    )
}

/// Closing delimiter after the last part.
pub fn multipart_trailer() -> String {
    format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY)
}

pub fn multipart_content_type() -> String {
    format!("multipart/byteranges; boundary={}", MULTIPART_BOUNDARY)
}

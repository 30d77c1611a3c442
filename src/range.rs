use crate::error::RangeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const RANGE_UNIT_PREFIX: &str = "bytes=";

/// Inclusive byte interval `[start, end]`.
///
/// Encoded as `bytes=START-END`, the form used both for upload progress and
/// for ranged downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// The end must be below `u64::MAX` so that `next_offset` stays
    /// representable.
    pub fn new(start: u64, end: u64) -> Result<Self, RangeError> {
        if end < start {
            return Err(RangeError::EndBeforeStart { start, end });
        }
        if end == u64::MAX {
            return Err(RangeError::EndTooLarge(end));
        }
        Ok(Self { start, end })
    }

    /// Translate a half-open `[start, end)` pair from the public read API into
    /// an inclusive range.
    pub fn from_half_open(start: i64, end: i64) -> Result<Self, RangeError> {
        if start < 0 {
            return Err(RangeError::NegativeStart(start));
        }
        if end <= start {
            return Err(RangeError::EndNotAfterStart { start, end });
        }
        Ok(Self {
            start: start as u64,
            end: (end - 1) as u64,
        })
    }

    /// Range covering the first `len` bytes. `len` must be positive.
    pub fn first(len: u64) -> Result<Self, RangeError> {
        if len == 0 {
            return Err(RangeError::EndNotAfterStart { start: 0, end: 0 });
        }
        Ok(Self {
            start: 0,
            end: len - 1,
        })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Offset of the first byte after this range.
    pub fn next_offset(&self) -> u64 {
        self.end + 1
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}-{}", RANGE_UNIT_PREFIX, self.start, self.end)
    }
}

impl FromStr for ByteRange {
    type Err = RangeError;

    /// Parse `bytes=START-END`. The `bytes=` prefix is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RangeError::Malformed(s.to_string());
        let body = s.trim().strip_prefix(RANGE_UNIT_PREFIX).unwrap_or(s.trim());
        let (start, end) = body.split_once('-').ok_or_else(malformed)?;
        let start = start.parse::<u64>().map_err(|_| malformed())?;
        let end = end.parse::<u64>().map_err(|_| malformed())?;
        Self::new(start, end)
    }
}

impl TryFrom<String> for ByteRange {
    type Error = RangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ByteRange> for String {
    fn from(range: ByteRange) -> Self {
        range.to_string()
    }
}

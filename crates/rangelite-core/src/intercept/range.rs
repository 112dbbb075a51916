//! Byte ranges, `Content-Range` parsing and the progressive byte target.

/// Inclusive byte range `[start, end]`, as written in a `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// End offset (inclusive).
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Range from the first byte up to and including `end`.
    pub fn prefix(end: u64) -> Self {
        Self { start: 0, end }
    }

    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    /// HTTP Range header value: `bytes=start-end`.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// The probe range for a probe of `probe_bytes` bytes: `[0, probe_bytes - 1]`.
pub fn probe_range(probe_bytes: u64) -> ByteRange {
    ByteRange::prefix(probe_bytes.saturating_sub(1))
}

/// Total object length from a `Content-Range` value such as `bytes 0-2047/40000`.
///
/// Returns `None` when the value is malformed or the length is unknown (`*`).
pub fn content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse::<u64>().ok()
}

/// Bytes to request in the progressive fetch: `floor(total * fraction)`.
pub fn target_bytes(total: u64, fraction: f64) -> u64 {
    (total as f64 * fraction).floor() as u64
}

/// Target when no total length is known: the last byte the probe itself returned.
pub fn fallback_target(probe_body_len: Option<u64>, probe_bytes: u64) -> u64 {
    match probe_body_len {
        Some(len) if len > 0 => len - 1,
        _ => probe_bytes.saturating_sub(1),
    }
}

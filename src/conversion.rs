//! Internal helpers for moving between FFmpeg's representation and ours.
//!
//! Timestamp rescaling and stride-stripping for decoded frames.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

use crate::metadata::FrameSize;

/// `AV_NOPTS_VALUE`: FFmpeg's "no timestamp" sentinel.
pub(crate) const NO_TIMESTAMP: i64 = i64::MIN;

const BYTES_PER_RGBA_PIXEL: usize = 4;

/// Copy the first plane of an RGBA frame into a tightly packed buffer.
///
/// Decoded planes are usually padded (`stride > width * 4`); rows are copied
/// one by one in that case.
pub(crate) fn packed_rgba(frame: &VideoFrame, size: FrameSize) -> Vec<u8> {
    let row_bytes = size.width as usize * BYTES_PER_RGBA_PIXEL;
    let rows = size.height as usize;
    let stride = frame.stride(0);
    let plane = frame.data(0);

    if stride == row_bytes {
        return plane[..row_bytes * rows].to_vec();
    }

    plane
        .chunks(stride)
        .take(rows)
        .flat_map(|row| &row[..row_bytes])
        .copied()
        .collect()
}

/// A stream timestamp in seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Seconds to a container-level seek target in `AV_TIME_BASE` (microseconds).
///
/// `Input::seek` with no stream index expects this unit, not the stream's
/// own time base.
pub(crate) fn seconds_to_seek_timestamp(seconds: f64) -> i64 {
    (seconds.max(0.0) * 1_000_000.0) as i64
}

/// Frame rate as a float, or `None` for an unset `0/0` rational.
pub(crate) fn rational_to_rate(rate: Rational) -> Option<f64> {
    if rate.numerator() > 0 && rate.denominator() > 0 {
        Some(rate.numerator() as f64 / rate.denominator() as f64)
    } else {
        None
    }
}

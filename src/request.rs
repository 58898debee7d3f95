//! Conversion request parameters.
//!
//! [`ConversionRequest`] holds what the user picked in the form: trim range,
//! output frame rate, resize width, speed factor, loop count and the
//! optimization flag. [`ConversionRequest::validate`] performs every check
//! that does not need the source, so malformed requests are rejected before
//! anything is opened or decoded.

use crate::configuration::ConversionLimits;
use crate::error::ClipgifError;

/// Caller-supplied conversion parameters.
///
/// Times are in seconds. An `end_seconds` of zero (or less) means "to the
/// end of the source". A `target_width` of zero keeps the source width.
///
/// # Example
///
/// ```
/// use clipgif::ConversionRequest;
///
/// let request = ConversionRequest::new()
///     .with_range(2.0, 7.0)
///     .with_frames_per_second(10)
///     .with_target_width(320)
///     .with_loop_count(0);
/// assert!(request.optimize);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    /// Start of the trim window, in seconds. Negative values clamp to zero.
    pub start_seconds: f64,
    /// End of the trim window, in seconds. `<= 0` means "to the end".
    pub end_seconds: f64,
    /// Output frame rate.
    pub frames_per_second: u32,
    /// Output width in pixels; `0` keeps the source width.
    pub target_width: u32,
    /// Playback speed factor (`2.0` plays twice as fast).
    pub speed: f64,
    /// Number of loops; `0` loops forever.
    pub loop_count: u16,
    /// Spend more encode time for a smaller file.
    pub optimize: bool,
}

impl Default for ConversionRequest {
    fn default() -> Self {
        Self {
            start_seconds: 0.0,
            end_seconds: 0.0,
            frames_per_second: 10,
            target_width: 0,
            speed: 1.0,
            loop_count: 0,
            optimize: true,
        }
    }
}

impl ConversionRequest {
    /// Defaults: whole clip, 10 fps, source width, normal speed, infinite
    /// loop, optimized.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trim window in seconds.
    #[must_use]
    pub fn with_range(mut self, start_seconds: f64, end_seconds: f64) -> Self {
        self.start_seconds = start_seconds;
        self.end_seconds = end_seconds;
        self
    }

    /// Set the output frame rate.
    #[must_use]
    pub fn with_frames_per_second(mut self, fps: u32) -> Self {
        self.frames_per_second = fps;
        self
    }

    /// Set the output width (`0` keeps the source width).
    #[must_use]
    pub fn with_target_width(mut self, width: u32) -> Self {
        self.target_width = width;
        self
    }

    /// Set the speed factor.
    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Set the loop count (`0` loops forever).
    #[must_use]
    pub fn with_loop_count(mut self, loop_count: u16) -> Self {
        self.loop_count = loop_count;
        self
    }

    /// Enable or disable size optimization.
    #[must_use]
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Start of the window after clamping negatives to zero.
    pub(crate) fn clamped_start(&self) -> f64 {
        self.start_seconds.max(0.0)
    }

    /// Whether the request trims to the end of the source.
    pub(crate) fn runs_to_end(&self) -> bool {
        self.end_seconds <= 0.0
    }

    /// Check everything that can be checked without opening the source.
    ///
    /// # Errors
    ///
    /// - [`ClipgifError::InvalidParameter`] for a frame rate outside
    ///   `1..=limits.max_frames_per_second`, a width above
    ///   `limits.max_width`, a non-positive or non-finite speed, or
    ///   non-finite times.
    /// - [`ClipgifError::InvalidRange`] when an explicit end is not after
    ///   the start.
    pub fn validate(&self, limits: &ConversionLimits) -> Result<(), ClipgifError> {
        if self.frames_per_second == 0 {
            return Err(ClipgifError::invalid("fps", "must be a positive integer"));
        }
        if self.frames_per_second > limits.max_frames_per_second {
            return Err(ClipgifError::invalid(
                "fps",
                format!(
                    "{} exceeds the maximum of {}",
                    self.frames_per_second, limits.max_frames_per_second
                ),
            ));
        }
        if self.target_width > limits.max_width {
            return Err(ClipgifError::invalid(
                "width",
                format!(
                    "{} exceeds the maximum of {}",
                    self.target_width, limits.max_width
                ),
            ));
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(ClipgifError::invalid(
                "speed",
                format!("{} is not a positive number", self.speed),
            ));
        }
        if !self.start_seconds.is_finite() {
            return Err(ClipgifError::invalid("start time", "must be a finite number"));
        }
        if !self.end_seconds.is_finite() {
            return Err(ClipgifError::invalid("end time", "must be a finite number"));
        }

        let start = self.clamped_start();
        if !self.runs_to_end() && self.end_seconds <= start {
            return Err(ClipgifError::InvalidRange {
                start,
                end: self.end_seconds,
            });
        }

        Ok(())
    }
}

/// Parse a time given as seconds (`12.5`), `MM:SS` or `HH:MM:SS(.fff)`.
///
/// An empty string parses as zero, which for an end time means "to the end".
///
/// ```
/// use clipgif::parse_timecode;
///
/// assert_eq!(parse_timecode("7").unwrap(), 7.0);
/// assert_eq!(parse_timecode("01:30").unwrap(), 90.0);
/// assert_eq!(parse_timecode("1:00:02.5").unwrap(), 3602.5);
/// ```
///
/// # Errors
///
/// Returns [`ClipgifError::InvalidParameter`] for anything else.
pub fn parse_timecode(value: &str) -> Result<f64, ClipgifError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0.0);
    }

    let invalid = || {
        ClipgifError::invalid(
            "time",
            format!("{value:?} is not seconds, MM:SS or HH:MM:SS"),
        )
    };

    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() > 3 {
        return Err(invalid());
    }

    let (last, leading) = parts.split_last().ok_or_else(invalid)?;
    let seconds: f64 = last.parse().map_err(|_| invalid())?;
    if !seconds.is_finite() || (!leading.is_empty() && !(0.0..60.0).contains(&seconds)) {
        return Err(invalid());
    }

    let mut total = seconds;
    for (position, part) in leading.iter().rev().enumerate() {
        let unit: u32 = part.parse().map_err(|_| invalid())?;
        // Minutes are bounded when hours are present.
        if position == 0 && leading.len() == 2 && unit >= 60 {
            return Err(invalid());
        }
        total += f64::from(unit) * 60_f64.powi(position as i32 + 1);
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(ConversionRequest::new().validate(&ConversionLimits::default()).is_ok());
    }

    #[test]
    fn reversed_range_is_rejected() {
        let request = ConversionRequest::new().with_range(7.0, 2.0);
        assert!(matches!(
            request.validate(&ConversionLimits::default()),
            Err(ClipgifError::InvalidRange { .. })
        ));
    }

    #[test]
    fn negative_start_is_clamped_before_range_check() {
        let request = ConversionRequest::new().with_range(-5.0, 1.0);
        assert!(request.validate(&ConversionLimits::default()).is_ok());
        assert_eq!(request.clamped_start(), 0.0);
    }

    #[test]
    fn out_of_domain_parameters_are_named() {
        let limits = ConversionLimits::default();
        let cases = [
            (ConversionRequest::new().with_frames_per_second(0), "fps"),
            (ConversionRequest::new().with_frames_per_second(60), "fps"),
            (ConversionRequest::new().with_target_width(5000), "width"),
            (ConversionRequest::new().with_speed(0.0), "speed"),
            (ConversionRequest::new().with_speed(f64::NAN), "speed"),
            (ConversionRequest::new().with_range(f64::INFINITY, 0.0), "start time"),
        ];
        for (request, expected) in cases {
            match request.validate(&limits) {
                Err(ClipgifError::InvalidParameter { name, .. }) => assert_eq!(name, expected),
                other => panic!("expected invalid {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn timecodes_parse() {
        assert_eq!(parse_timecode("").unwrap(), 0.0);
        assert_eq!(parse_timecode("2.5").unwrap(), 2.5);
        assert_eq!(parse_timecode("00:07").unwrap(), 7.0);
        assert_eq!(parse_timecode("02:00:00").unwrap(), 7200.0);
    }

    #[test]
    fn malformed_timecodes_are_rejected() {
        for value in ["abc", "1:2:3:4", "01:75", "1:60:00", "::"] {
            assert!(parse_timecode(value).is_err(), "{value} should not parse");
        }
    }
}

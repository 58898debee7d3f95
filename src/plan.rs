//! Conversion planning.
//!
//! A [`ConversionPlan`] turns a validated [`ConversionRequest`] and the
//! source's [`SourceInfo`] into concrete numbers: the normalized time
//! window, the output frame size, how many frames to emit, which source
//! timestamp each output frame samples, and each frame's GIF delay.
//!
//! Everything here is pure arithmetic, so the same request against the same
//! source always yields the same plan.

use std::time::Duration;

use crate::configuration::ConversionLimits;
use crate::error::ClipgifError;
use crate::metadata::{FrameSize, SourceInfo};
use crate::request::ConversionRequest;

/// Absorbs float noise in `ceil`, so 5 s at 10 fps is 50 frames, not 51.
const FRAME_COUNT_EPSILON: f64 = 1e-9;

/// A half-open window `[start, end)` over the source timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    /// Inclusive start, in seconds.
    pub start: f64,
    /// Exclusive end, in seconds.
    pub end: f64,
}

impl TimeWindow {
    /// Normalize the request's range against the source duration.
    ///
    /// `t0 = max(0, start)`; `t1` is the duration when the request runs to
    /// the end, otherwise `min(end, duration)`.
    ///
    /// # Errors
    ///
    /// Returns [`ClipgifError::InvalidRange`] if the window is empty.
    pub fn normalize(request: &ConversionRequest, duration: Duration) -> Result<Self, ClipgifError> {
        let duration = duration.as_secs_f64();
        let start = request.clamped_start();
        let end = if request.runs_to_end() {
            duration
        } else {
            request.end_seconds.min(duration)
        };

        if end <= start {
            return Err(ClipgifError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Length of the window in seconds.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Resolve the output size for `target_width` (0 keeps the source size).
///
/// The height keeps the source aspect ratio and is rounded to the nearest
/// even number, never below 2.
pub fn resolve_output_size(source: FrameSize, target_width: u32) -> FrameSize {
    if target_width == 0 || source.width == 0 {
        return source;
    }
    let exact = target_width as f64 * source.height as f64 / source.width as f64;
    let height = ((exact / 2.0).round() as u32 * 2).max(2);
    FrameSize::new(target_width, height)
}

/// `ceil(window / speed * fps)`, at least one frame.
pub fn output_frame_count(window: &TimeWindow, speed: f64, frames_per_second: u32) -> u64 {
    let exact = window.length() / speed * frames_per_second as f64;
    ((exact - FRAME_COUNT_EPSILON).ceil() as u64).max(1)
}

/// Everything the pipeline needs to render one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionPlan {
    /// Normalized source window.
    pub window: TimeWindow,
    /// Dimensions of every output frame.
    pub output_size: FrameSize,
    /// Output frame rate.
    pub frames_per_second: u32,
    /// Source seconds consumed per output second.
    pub speed: f64,
    /// Number of frames the GIF will contain.
    pub frame_count: u64,
}

impl ConversionPlan {
    /// Build a plan for `request` against `info`.
    ///
    /// The request is expected to have passed
    /// [`ConversionRequest::validate`]; this adds the checks that need the
    /// source.
    ///
    /// # Errors
    ///
    /// - [`ClipgifError::InvalidRange`] if the normalized window is empty.
    /// - [`ClipgifError::InvalidParameter`] if the output would exceed the
    ///   GIF dimension limit or `limits.max_frames`.
    /// - [`ClipgifError::VideoDecodeError`] if the source reports zero-sized
    ///   frames.
    pub fn resolve(
        request: &ConversionRequest,
        info: &SourceInfo,
        limits: &ConversionLimits,
    ) -> Result<Self, ClipgifError> {
        if info.frame_size.width == 0 || info.frame_size.height == 0 {
            return Err(ClipgifError::VideoDecodeError(format!(
                "source reports invalid frame size {}",
                info.frame_size
            )));
        }

        let window = TimeWindow::normalize(request, info.duration)?;
        let output_size = resolve_output_size(info.frame_size, request.target_width);
        if output_size.width > u16::MAX as u32 || output_size.height > u16::MAX as u32 {
            return Err(ClipgifError::invalid(
                "width",
                format!("output size {output_size} exceeds the GIF limit of 65535 pixels"),
            ));
        }

        let frame_count = output_frame_count(&window, request.speed, request.frames_per_second);
        if frame_count > limits.max_frames {
            return Err(ClipgifError::invalid(
                "range",
                format!(
                    "would produce {frame_count} frames, more than the limit of {}",
                    limits.max_frames
                ),
            ));
        }

        Ok(Self {
            window,
            output_size,
            frames_per_second: request.frames_per_second,
            speed: request.speed,
            frame_count,
        })
    }

    /// Source timestamp sampled by output frame `index`.
    ///
    /// Output time `index / fps` maps to source time
    /// `start + index / fps * speed`, kept inside the window.
    pub fn source_timestamp(&self, index: u64) -> Duration {
        let offset = index as f64 / self.frames_per_second as f64 * self.speed;
        let seconds = (self.window.start + offset).min(self.window.end);
        Duration::from_secs_f64(seconds.max(0.0))
    }

    /// Iterate over the source timestamps of every output frame, in order.
    pub fn timestamps(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.frame_count).map(|index| self.source_timestamp(index))
    }

    /// GIF delay of output frame `index` in hundredths of a second.
    ///
    /// Delays are derived from cumulative rounded presentation times, so
    /// they sum to the exact playback duration even when `100 / fps` is not
    /// an integer.
    pub fn frame_delay(&self, index: u64) -> u16 {
        let at = |i: u64| (i as f64 * 100.0 / self.frames_per_second as f64).round() as u64;
        (at(index + 1) - at(index)).min(u16::MAX as u64) as u16
    }

    /// Playback duration of the rendered GIF.
    pub fn output_duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count as f64 / self.frames_per_second as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32, seconds: f64) -> SourceInfo {
        SourceInfo {
            duration: Duration::from_secs_f64(seconds),
            frame_size: FrameSize::new(width, height),
            frames_per_second: 30.0,
            codec: "test".to_string(),
            format: "test".to_string(),
        }
    }

    #[test]
    fn window_runs_to_end_when_end_is_zero() {
        let request = ConversionRequest::new().with_range(3.0, 0.0);
        let window = TimeWindow::normalize(&request, Duration::from_secs(20)).unwrap();
        assert_eq!(window, TimeWindow { start: 3.0, end: 20.0 });
    }

    #[test]
    fn window_clamps_end_to_duration_and_negative_start() {
        let request = ConversionRequest::new().with_range(-4.0, 99.0);
        let window = TimeWindow::normalize(&request, Duration::from_secs(8)).unwrap();
        assert_eq!(window, TimeWindow { start: 0.0, end: 8.0 });
    }

    #[test]
    fn window_past_duration_is_empty() {
        let request = ConversionRequest::new().with_range(12.0, 0.0);
        let result = TimeWindow::normalize(&request, Duration::from_secs(10));
        assert!(matches!(result, Err(ClipgifError::InvalidRange { .. })));
    }

    #[test]
    fn resize_keeps_aspect_with_even_height() {
        assert_eq!(
            resolve_output_size(FrameSize::new(640, 480), 320),
            FrameSize::new(320, 240)
        );
        // 500 * 1080 / 1920 = 281.25 -> nearest even is 282
        assert_eq!(
            resolve_output_size(FrameSize::new(1920, 1080), 500),
            FrameSize::new(500, 282)
        );
        assert_eq!(
            resolve_output_size(FrameSize::new(640, 480), 0),
            FrameSize::new(640, 480)
        );
    }

    #[test]
    fn resize_never_collapses_height() {
        assert_eq!(
            resolve_output_size(FrameSize::new(4000, 10), 100),
            FrameSize::new(100, 2)
        );
    }

    #[test]
    fn frame_count_law() {
        let window = TimeWindow { start: 0.0, end: 5.0 };
        assert_eq!(output_frame_count(&window, 1.0, 10), 50);
        assert_eq!(output_frame_count(&window, 2.0, 10), 25);
        assert_eq!(output_frame_count(&window, 0.5, 10), 100);

        let odd = TimeWindow { start: 0.0, end: 1.05 };
        assert_eq!(output_frame_count(&odd, 1.0, 10), 11);

        // 0.1 + 0.2 style noise must not add a frame
        let noisy = TimeWindow { start: 0.1, end: 0.1 + 0.2 };
        assert_eq!(output_frame_count(&noisy, 1.0, 10), 2);
    }

    #[test]
    fn timestamps_are_monotonic_and_inside_window() {
        let request = ConversionRequest::new()
            .with_range(2.0, 7.0)
            .with_frames_per_second(10)
            .with_speed(1.5);
        let plan =
            ConversionPlan::resolve(&request, &info(640, 480, 20.0), &ConversionLimits::default())
                .unwrap();

        let stamps: Vec<Duration> = plan.timestamps().collect();
        assert_eq!(stamps.len() as u64, plan.frame_count);
        assert_eq!(stamps[0], Duration::from_secs(2));
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(stamps.iter().all(|t| t.as_secs_f64() < 7.0));
    }

    #[test]
    fn delays_sum_to_playback_duration() {
        let request = ConversionRequest::new().with_frames_per_second(30);
        let plan =
            ConversionPlan::resolve(&request, &info(64, 48, 3.0), &ConversionLimits::default())
                .unwrap();
        assert_eq!(plan.frame_count, 90);

        let total: u64 = (0..plan.frame_count).map(|i| plan.frame_delay(i) as u64).sum();
        assert_eq!(total, 300);
        assert!((0..plan.frame_count).all(|i| (3..=4).contains(&plan.frame_delay(i))));
    }

    #[test]
    fn frame_limit_is_enforced() {
        let request = ConversionRequest::new()
            .with_frames_per_second(50)
            .with_speed(0.01);
        let result =
            ConversionPlan::resolve(&request, &info(64, 48, 10.0), &ConversionLimits::default());
        assert!(matches!(
            result,
            Err(ClipgifError::InvalidParameter { name: "range", .. })
        ));
    }
}

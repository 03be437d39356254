//! Frame capture. While a capture session is live, the incoming point stream is segmented into
//! time-boxed frames of `1000 / frame_rate` milliseconds each. Finished frames are retained in a
//! FIFO of at most `max_frames` (oldest evicted first) until they are exported or cleared. The
//! session is a small state machine: Idle, Capturing, Stopped, with clear returning to Idle from
//! anywhere.

use crate::errors::InvalidConfig;
use crate::{POINT_STRIDE, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Capture session parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Frames finalized per second of capture time.
    pub frame_rate: f64,

    /// Maximum number of finalized frames retained; the oldest is evicted beyond this.
    pub max_frames: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_rate: 10.0,
            max_frames: 600,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.frame_rate > 0.0 && self.frame_rate.is_finite()) {
            return Err(InvalidConfig::BadFrameRate(self.frame_rate).into());
        }
        if self.max_frames == 0 {
            return Err(InvalidConfig::ZeroFrameLimit.into());
        }
        Ok(())
    }

    /// Duration of one capture frame in milliseconds.
    pub fn frame_duration_ms(&self) -> f64 {
        1000.0 / self.frame_rate
    }
}

/// Session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Idle,
    Capturing,
    Stopped,
}

/// One finalized capture frame: a compact flat buffer of four values per point, the time the
/// frame opened, and its sequential number within the session.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    points: Vec<f64>,
    start_time_ms: f64,
    frame_number: u64,
}

impl CapturedFrame {
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn point_count(&self) -> usize {
        self.points.len() / POINT_STRIDE
    }

    pub fn start_time_ms(&self) -> f64 {
        self.start_time_ms
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }
}

/// Aggregate counters over the retained frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStatistics {
    pub frame_count: usize,
    pub total_points: usize,
    pub mean_points_per_frame: f64,
}

/// The capture session manager.
#[derive(Debug)]
pub struct FrameCapture {
    config: CaptureConfig,
    status: CaptureStatus,
    frames: VecDeque<CapturedFrame>,
    open_points: Vec<f64>,
    open_start_ms: f64,
    next_frame_number: u64,
}

impl FrameCapture {
    pub fn try_new(config: CaptureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            status: CaptureStatus::Idle,
            frames: VecDeque::new(),
            open_points: Vec::new(),
            open_start_ms: 0.0,
            next_frame_number: 0,
        })
    }

    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// The finalized frames currently retained, oldest first.
    pub fn frames(&self) -> impl Iterator<Item = &CapturedFrame> {
        self.frames.iter()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Begin a new capture session at the given time. Any frames retained from a previous
    /// session are discarded and frame numbering restarts at zero.
    pub fn start_capture(&mut self, now_ms: f64) {
        self.frames.clear();
        self.open_points.clear();
        self.open_start_ms = now_ms;
        self.next_frame_number = 0;
        self.status = CaptureStatus::Capturing;
    }

    /// Feed a batch of points (flat, four values per point) into the open frame. A no-op unless
    /// the session is capturing. When the open frame's time budget has elapsed it is finalized
    /// and the next frame opens at the current time.
    pub fn add_points(&mut self, batch: &[f64], now_ms: f64) {
        if self.status != CaptureStatus::Capturing {
            return;
        }

        self.open_points.extend_from_slice(batch);

        if now_ms - self.open_start_ms >= self.config.frame_duration_ms() {
            self.finalize_open(now_ms);
        }
    }

    /// End the session, retaining any partial trailing frame that holds points.
    pub fn stop_capture(&mut self, now_ms: f64) {
        if self.status != CaptureStatus::Capturing {
            return;
        }
        if !self.open_points.is_empty() {
            self.finalize_open(now_ms);
        }
        self.status = CaptureStatus::Stopped;
    }

    /// Drop all retained frames and return to the Idle baseline. Safe to call at any time,
    /// including mid-capture.
    pub fn clear_frames(&mut self) {
        self.frames.clear();
        self.open_points.clear();
        self.next_frame_number = 0;
        self.status = CaptureStatus::Idle;
    }

    /// Counts over the retained frames; all zeros when nothing has been captured.
    pub fn statistics(&self) -> FrameStatistics {
        let frame_count = self.frames.len();
        let total_points: usize = self.frames.iter().map(|f| f.point_count()).sum();
        let mean_points_per_frame = if frame_count == 0 {
            0.0
        } else {
            total_points as f64 / frame_count as f64
        };
        FrameStatistics {
            frame_count,
            total_points,
            mean_points_per_frame,
        }
    }

    /// Serialize every retained frame to the ASCII point-cloud format and bundle them into a
    /// zip archive at `path`, one file per frame. With no retained frames this reports a
    /// "nothing to export" outcome and creates no file.
    pub fn export_zip(&self, path: &std::path::Path) -> Result<crate::io::ExportSummary> {
        crate::io::export_frames_zip(path, self.frames.iter())
    }

    fn finalize_open(&mut self, next_start_ms: f64) {
        let mut points = std::mem::take(&mut self.open_points);
        points.shrink_to_fit();

        self.frames.push_back(CapturedFrame {
            points,
            start_time_ms: self.open_start_ms,
            frame_number: self.next_frame_number,
        });
        self.next_frame_number += 1;
        self.open_start_ms = next_start_ms;

        while self.frames.len() > self.config.max_frames {
            let evicted = self.frames.pop_front();
            if let Some(frame) = evicted {
                log::debug!(
                    "evicting capture frame {} to stay within the {} frame limit",
                    frame.frame_number(),
                    self.config.max_frames
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64) -> [f64; 4] {
        [x, 0.0, 0.0, 1.0]
    }

    fn capture(rate: f64, max_frames: usize) -> FrameCapture {
        FrameCapture::try_new(CaptureConfig {
            frame_rate: rate,
            max_frames,
        })
        .unwrap()
    }

    #[test]
    fn rejects_bad_config() {
        assert!(
            FrameCapture::try_new(CaptureConfig {
                frame_rate: 0.0,
                max_frames: 10
            })
            .is_err()
        );
        assert!(
            FrameCapture::try_new(CaptureConfig {
                frame_rate: 10.0,
                max_frames: 0
            })
            .is_err()
        );
    }

    #[test]
    fn points_are_ignored_unless_capturing() {
        let mut capture = capture(10.0, 10);
        capture.add_points(&point(1.0), 0.0);
        assert_eq!(capture.statistics().total_points, 0);

        capture.start_capture(0.0);
        capture.add_points(&point(1.0), 10.0);
        capture.stop_capture(20.0);
        assert_eq!(capture.statistics().total_points, 1);

        // Stopped session must not accumulate anything further
        capture.add_points(&point(2.0), 30.0);
        assert_eq!(capture.statistics().total_points, 1);
    }

    #[test]
    fn segments_stream_into_time_boxed_frames() {
        // 10 fps = 100ms budget; feed points every 10ms for one simulated second
        let mut capture = capture(10.0, 100);
        capture.start_capture(0.0);

        let mut t = 0.0;
        while t < 1000.0 {
            t += 10.0;
            capture.add_points(&point(t), t);
        }
        capture.stop_capture(t);

        // floor(1000 / 100) finalized frames, plus or minus the trailing partial
        let n = capture.frame_count();
        assert!((10..=11).contains(&n), "got {} frames", n);

        // Frame numbers are sequential from zero
        for (i, frame) in capture.frames().enumerate() {
            assert_eq!(frame.frame_number(), i as u64);
        }

        // Start times are non-decreasing and roughly one budget apart
        let starts: Vec<f64> = capture.frames().map(|f| f.start_time_ms()).collect();
        for pair in starts.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn stop_retains_partial_trailing_frame() {
        let mut capture = capture(10.0, 10);
        capture.start_capture(0.0);
        capture.add_points(&point(1.0), 10.0);
        capture.add_points(&point(2.0), 20.0);
        capture.stop_capture(30.0);

        assert_eq!(capture.status(), CaptureStatus::Stopped);
        assert_eq!(capture.frame_count(), 1);
        assert_eq!(capture.frames().next().unwrap().point_count(), 2);
    }

    #[test]
    fn stop_discards_nothing_but_empty_frames() {
        let mut capture = capture(10.0, 10);
        capture.start_capture(0.0);
        capture.stop_capture(50.0);
        assert_eq!(capture.frame_count(), 0);
    }

    #[test]
    fn evicts_oldest_beyond_frame_limit() {
        let mut capture = capture(10.0, 3);
        capture.start_capture(0.0);

        let mut t = 0.0;
        for _ in 0..8 {
            t += 100.0;
            capture.add_points(&point(t), t);
        }
        capture.stop_capture(t);

        assert!(capture.frame_count() <= 3);
        let first = capture.frames().next().unwrap().frame_number();
        assert!(first > 0, "oldest frames should have been evicted");
    }

    #[test]
    fn clear_is_safe_mid_capture() {
        let mut capture = capture(10.0, 10);
        capture.start_capture(0.0);
        capture.add_points(&point(1.0), 150.0);
        capture.clear_frames();

        assert_eq!(capture.status(), CaptureStatus::Idle);
        assert_eq!(capture.frame_count(), 0);
        assert_eq!(capture.statistics().total_points, 0);
    }

    #[test]
    fn restart_resets_frame_numbering() {
        let mut capture = capture(10.0, 10);
        capture.start_capture(0.0);
        capture.add_points(&point(1.0), 150.0);
        capture.stop_capture(200.0);
        assert!(capture.frame_count() > 0);

        capture.start_capture(1000.0);
        capture.add_points(&point(2.0), 1150.0);
        capture.stop_capture(1200.0);

        assert_eq!(capture.frames().next().unwrap().frame_number(), 0);
    }

    #[test]
    fn statistics_on_empty_session_are_zero() {
        let capture = capture(10.0, 10);
        let stats = capture.statistics();
        assert_eq!(stats.frame_count, 0);
        assert_eq!(stats.total_points, 0);
        assert_eq!(stats.mean_points_per_frame, 0.0);
    }

    #[test]
    fn statistics_average_points() {
        let mut capture = capture(10.0, 10);
        capture.start_capture(0.0);
        capture.add_points(&point(1.0), 10.0);
        capture.add_points(&point(2.0), 110.0); // closes frame 0 with 2 points
        capture.add_points(&point(3.0), 120.0);
        capture.stop_capture(130.0); // frame 1 with 1 point

        let stats = capture.statistics();
        assert_eq!(stats.frame_count, 2);
        assert_eq!(stats.total_points, 3);
        assert!((stats.mean_points_per_frame - 1.5).abs() < 1.0e-12);
    }
}

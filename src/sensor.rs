//! Sensor orchestration. A `LidarSensor` owns the scan state, the ray-casting engine, the
//! circular visualization buffer, and the capture session, and advances all of them from a
//! single `tick` call driven by the host's simulation loop. Everything inside a tick runs
//! synchronously; the sensor's state is touched from nowhere else.

use crate::Result;
use crate::buffer::CircularPointBuffer;
use crate::capture::{CaptureConfig, FrameCapture};
use crate::caster::{CastFrame, FrameStats, RayCaster};
use crate::config::LidarConfig;
use crate::geom::Iso3;
use crate::intensity::IntensityModel;
use crate::scan::{ScanState, update_scan_angle};
use crate::scene::SceneSurface;
use crate::scene::culling::CullingStats;

/// Caps how often the core actually runs, independent of the host's render rate. A skipped tick
/// leaves the scan state completely untouched.
#[derive(Debug, Clone, Copy)]
pub struct TickThrottle {
    min_interval_ms: f64,
    last_run_ms: Option<f64>,
}

impl TickThrottle {
    /// Allow at most `max_rate_hz` core invocations per second.
    pub fn new(max_rate_hz: f64) -> Self {
        Self {
            min_interval_ms: 1000.0 / max_rate_hz,
            last_run_ms: None,
        }
    }

    /// Run the core on every tick offered by the host.
    pub fn unlimited() -> Self {
        Self {
            min_interval_ms: 0.0,
            last_run_ms: None,
        }
    }

    /// Returns true when enough time has passed since the last accepted tick, and records the
    /// acceptance.
    pub fn should_run(&mut self, now_ms: f64) -> bool {
        match self.last_run_ms {
            Some(last) if now_ms - last < self.min_interval_ms => false,
            _ => {
                self.last_run_ms = Some(now_ms);
                true
            }
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickReport {
    /// True when the throttle skipped the core this tick.
    pub skipped: bool,

    pub points_emitted: usize,
    pub culling: Option<CullingStats>,
    pub stats: Option<FrameStats>,
}

/// A complete simulated LiDAR unit.
#[derive(Debug)]
pub struct LidarSensor {
    config: LidarConfig,
    state: ScanState,
    caster: RayCaster,
    buffer: CircularPointBuffer,
    capture: FrameCapture,
    throttle: TickThrottle,
    enable_culling: bool,
}

impl LidarSensor {
    /// Build a sensor from validated configuration.
    ///
    /// # Arguments
    ///
    /// * `config`: sensor operating parameters
    /// * `capture_config`: capture session parameters
    /// * `buffer_capacity`: point capacity of the live visualization buffer
    ///
    /// returns: Result<LidarSensor, Box<dyn Error, Global>>
    ///
    /// # Examples
    ///
    /// ```
    /// use lidarsim::config::LidarConfig;
    /// use lidarsim::capture::CaptureConfig;
    /// use lidarsim::sensor::LidarSensor;
    /// let sensor = LidarSensor::try_new(
    ///     LidarConfig::default(),
    ///     CaptureConfig::default(),
    ///     100_000,
    /// ).unwrap();
    /// assert_eq!(sensor.buffer().len(), 0);
    /// ```
    pub fn try_new(
        config: LidarConfig,
        capture_config: CaptureConfig,
        buffer_capacity: usize,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: ScanState::new(&config),
            caster: RayCaster::new(IntensityModel::default()),
            buffer: CircularPointBuffer::try_new(buffer_capacity, crate::POINT_STRIDE)?,
            capture: FrameCapture::try_new(capture_config)?,
            throttle: TickThrottle::unlimited(),
            enable_culling: true,
            config,
        })
    }

    /// Run one simulation tick: advance the scan state, cast the frame's rays, feed the live
    /// buffer, and feed the capture session when one is active. When the throttle skips the
    /// tick, nothing advances.
    ///
    /// # Arguments
    ///
    /// * `pose`: sensor world pose for this tick
    /// * `surfaces`: the scene's intersectable surfaces
    /// * `delta_seconds`: elapsed simulation time since the last tick that ran
    /// * `now_ms`: current simulation time in milliseconds
    ///
    /// returns: TickReport
    pub fn tick(
        &mut self,
        pose: &Iso3,
        surfaces: &[SceneSurface],
        delta_seconds: f64,
        now_ms: f64,
    ) -> TickReport {
        if !self.throttle.should_run(now_ms) {
            return TickReport {
                skipped: true,
                ..TickReport::default()
            };
        }

        update_scan_angle(delta_seconds, &mut self.state, self.config.scan_rate);
        self.state.sync_channel_table(&self.config);

        let frame: CastFrame<'_> = self.caster.cast_frame(
            pose,
            surfaces,
            &self.state,
            &self.config,
            now_ms,
            self.enable_culling,
        );

        self.buffer
            .insert(frame.points)
            .expect("the cast scratch always emits whole points");
        self.capture.add_points(frame.points, now_ms);

        TickReport {
            skipped: false,
            points_emitted: frame.point_count(),
            culling: frame.culling,
            stats: Some(frame.stats),
        }
    }

    pub fn config(&self) -> &LidarConfig {
        &self.config
    }

    /// Swap in a new configuration. The scan angle and phase carry over so the sweep stays
    /// continuous; the vertical channel table is rebuilt only if its inputs changed.
    pub fn set_config(&mut self, config: LidarConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.state.sync_channel_table(&self.config);
        Ok(())
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// The live visualization buffer.
    pub fn buffer(&self) -> &CircularPointBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut CircularPointBuffer {
        &mut self.buffer
    }

    /// The capture session handle, for starting, stopping, clearing, and exporting from outside
    /// the tick loop.
    pub fn capture(&self) -> &FrameCapture {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut FrameCapture {
        &mut self.capture
    }

    pub fn intensity(&self) -> &IntensityModel {
        self.caster.intensity()
    }

    pub fn intensity_mut(&mut self) -> &mut IntensityModel {
        self.caster.intensity_mut()
    }

    pub fn set_throttle(&mut self, throttle: TickThrottle) {
        self.throttle = throttle;
    }

    pub fn set_enable_culling(&mut self, enabled: bool) {
        self.enable_culling = enabled;
    }

    /// Chronological copy of the live buffer's points for rendering.
    pub fn snapshot_points(&self) -> Vec<f64> {
        self.buffer.read_all_linearized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureStatus;

    fn test_sensor() -> LidarSensor {
        let config = LidarConfig {
            points_per_frame: 300,
            max_range: 50.0,
            ..LidarConfig::default()
        };
        LidarSensor::try_new(config, CaptureConfig::default(), 10_000).unwrap()
    }

    fn walls() -> Vec<SceneSurface> {
        let color = Some([200, 200, 200]);
        vec![
            SceneSurface::create_box(1.0, 30.0, 10.0, Iso3::translation(12.0, 0.0, 0.0), color),
            SceneSurface::create_box(1.0, 30.0, 10.0, Iso3::translation(-12.0, 0.0, 0.0), color),
        ]
    }

    #[test]
    fn ticks_accumulate_points_in_buffer() {
        let mut sensor = test_sensor();
        let surfaces = walls();

        let mut now = 0.0;
        for _ in 0..5 {
            now += 16.0;
            let report = sensor.tick(&Iso3::identity(), &surfaces, 0.016, now);
            assert!(!report.skipped);
        }

        assert!(sensor.buffer().len() > 0);
        assert_eq!(sensor.state().frame_count, 5);
    }

    #[test]
    fn throttled_ticks_do_not_advance_state() {
        let mut sensor = test_sensor();
        sensor.set_throttle(TickThrottle::new(10.0)); // at most every 100ms
        let surfaces = walls();

        let a = sensor.tick(&Iso3::identity(), &surfaces, 0.016, 0.0);
        assert!(!a.skipped);
        let angle_after_first = sensor.state().horizontal_angle;

        // 16ms later: inside the throttle window
        let b = sensor.tick(&Iso3::identity(), &surfaces, 0.016, 16.0);
        assert!(b.skipped);
        assert_eq!(sensor.state().frame_count, 1);
        assert_eq!(sensor.state().horizontal_angle, angle_after_first);

        let c = sensor.tick(&Iso3::identity(), &surfaces, 0.116, 116.0);
        assert!(!c.skipped);
        assert_eq!(sensor.state().frame_count, 2);
    }

    #[test]
    fn capture_session_collects_frames_through_ticks() {
        let mut sensor = test_sensor();
        let surfaces = walls();

        sensor.capture_mut().start_capture(0.0);
        let mut now = 0.0;
        for _ in 0..30 {
            now += 16.0;
            sensor.tick(&Iso3::identity(), &surfaces, 0.016, now);
        }
        sensor.capture_mut().stop_capture(now);

        assert_eq!(sensor.capture().status(), CaptureStatus::Stopped);
        assert!(sensor.capture().frame_count() >= 4);
        assert!(sensor.capture().statistics().total_points > 0);
    }

    #[test]
    fn stopping_capture_blocks_later_points_immediately() {
        let mut sensor = test_sensor();
        let surfaces = walls();

        sensor.capture_mut().start_capture(0.0);
        sensor.tick(&Iso3::identity(), &surfaces, 0.016, 16.0);
        sensor.capture_mut().stop_capture(16.0);
        let before = sensor.capture().statistics().total_points;

        sensor.tick(&Iso3::identity(), &surfaces, 0.016, 32.0);
        assert_eq!(sensor.capture().statistics().total_points, before);
    }

    #[test]
    fn set_config_revalidates() {
        let mut sensor = test_sensor();
        let mut bad = *sensor.config();
        bad.num_channels = 1;
        assert!(sensor.set_config(bad).is_err());

        let mut good = *sensor.config();
        good.num_channels = 32;
        assert!(sensor.set_config(good).is_ok());
        assert_eq!(sensor.state().vertical_angles().len(), 32);
    }

    #[test]
    fn attenuation_is_tunable_through_the_sensor() {
        let mut sensor = test_sensor();
        sensor.intensity_mut().set_attenuation_rate(0.5);
        assert_eq!(sensor.intensity().attenuation_rate, 0.5);
    }
}

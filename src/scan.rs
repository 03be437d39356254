//! Scan pattern generation. Each simulation tick samples a budget of ray directions from a
//! golden-angle spiral in the horizontal plane combined with a hashed, density-biased vertical
//! distribution. The pattern is a pure function of the scan state, so a frame can be re-sampled
//! reproducibly for testing, and concurrent sensors are decorrelated by a per-sensor offset
//! folded into the sample index.

use crate::common::{angle_to_2pi, linear_space, wrap_unit};
use crate::config::LidarConfig;
use crate::geom::{UnitVec3, unit_from_angles, within_horizontal_fov};
use std::f64::consts::PI;

/// The golden angle in radians, `pi * (3 - sqrt(5))`, roughly 137.5 degrees. Repeated rotation
/// by this value packs samples maximally evenly around a circle, the same principle that governs
/// phyllotaxis packing.
pub const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

/// The spiral's normalized index folds back into [0, 1) with this period.
const PATTERN_PERIOD: u64 = 1000;

/// Rate at which the scan phase accumulator advances, in cycles per second.
const PHASE_RATE: f64 = 0.5;

/// Exponent applied to the hashed vertical sample. Values below one bias beam density toward the
/// upper end of the vertical field of view, emulating the asymmetric beam packing of real
/// asymmetric-FOV sensors.
const VERTICAL_BIAS: f64 = 0.8;

/// Mutable per-sensor scan state. The angular fields advance once per tick that actually runs
/// the core (skipped ticks leave the state untouched), and the vertical channel table is
/// recomputed only when the channel-related configuration fields change.
#[derive(Debug, Clone)]
pub struct ScanState {
    /// Current rotation of the scan head in radians, always in [0, 2pi).
    pub horizontal_angle: f64,

    /// Slow phase accumulator in [0, 1), available to pattern variations.
    pub scan_phase: f64,

    /// Number of ticks that have run the core since the sensor was created.
    pub frame_count: u64,

    pattern_offset: u64,
    vertical_angles: Vec<f64>,
    channel_fingerprint: (usize, u64, u64),
}

impl ScanState {
    /// Create the state for a new sensor, drawing a random pattern offset so that multiple
    /// sensors created from the same configuration do not sample identical directions.
    pub fn new(config: &LidarConfig) -> Self {
        Self::with_offset(config, rand::random::<u64>() % 100_000)
    }

    /// Create the state with an explicit pattern offset. Two states built with the same offset
    /// and configuration produce identical sample sequences.
    pub fn with_offset(config: &LidarConfig, pattern_offset: u64) -> Self {
        Self {
            horizontal_angle: 0.0,
            scan_phase: 0.0,
            frame_count: 0,
            pattern_offset,
            vertical_angles: channel_table(config),
            channel_fingerprint: config.channel_fingerprint(),
        }
    }

    /// The per-channel vertical beam angles in degrees, ordered from the lowest channel to the
    /// highest. The table length equals the configured channel count.
    pub fn vertical_angles(&self) -> &[f64] {
        &self.vertical_angles
    }

    pub fn pattern_offset(&self) -> u64 {
        self.pattern_offset
    }

    /// Recompute the vertical channel table if the channel count or vertical FOV changed since
    /// the table was last built. A no-op otherwise.
    pub fn sync_channel_table(&mut self, config: &LidarConfig) {
        let fingerprint = config.channel_fingerprint();
        if fingerprint != self.channel_fingerprint {
            self.vertical_angles = channel_table(config);
            self.channel_fingerprint = fingerprint;
        }
    }
}

fn channel_table(config: &LidarConfig) -> Vec<f64> {
    linear_space(
        config.vertical_fov_min,
        config.vertical_fov_max,
        config.num_channels,
    )
}

/// Advances the scan state by one tick: the horizontal angle moves by `delta_seconds *
/// scan_rate` and wraps into [0, 2pi) without ever resetting (so the sweep has no angular
/// discontinuity), the scan phase advances and wraps at one, and the frame counter increments.
/// This is a pure function of its inputs with no effect beyond the state object.
///
/// # Arguments
///
/// * `delta_seconds`: elapsed simulation time since the previous tick that ran
/// * `state`: the scan state to advance
/// * `scan_rate`: rotation rate in radians per second
pub fn update_scan_angle(delta_seconds: f64, state: &mut ScanState, scan_rate: f64) {
    state.horizontal_angle = angle_to_2pi(state.horizontal_angle + delta_seconds * scan_rate);
    state.scan_phase = wrap_unit(state.scan_phase + delta_seconds * PHASE_RATE);
    state.frame_count += 1;
}

/// One sampled beam direction.
#[derive(Debug, Clone, Copy)]
pub struct ScanSample {
    /// Azimuth of the beam in radians, in [0, 2pi).
    pub horizontal_angle: f64,

    /// Elevation of the beam in degrees, within the configured vertical FOV.
    pub vertical_angle: f64,

    /// Index of the channel this beam belongs to, in [0, num_channels).
    pub channel: usize,

    /// Unit direction in the sensor's local frame.
    pub direction: UnitVec3,
}

/// Samples ray directions for one frame into a reusable scratch vector, avoiding a fresh
/// allocation per tick once the scratch has grown to the ray budget.
#[derive(Debug, Default)]
pub struct ScanPattern {
    scratch: Vec<ScanSample>,
}

impl ScanPattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample up to `points_per_frame` beam directions for the current frame. Samples whose
    /// azimuth falls outside a sub-360-degree horizontal FOV are skipped, so the returned slice
    /// may be shorter than the budget.
    ///
    /// The sequence is deterministic given `(state, config)`: sample `i` derives from the base
    /// index `frame_count * points_per_frame + i + pattern_offset`, whose low decimal digits
    /// spread the azimuth around the circle while the golden-angle term fills the gaps between
    /// successive frames, and whose hash picks the elevation.
    ///
    /// # Arguments
    ///
    /// * `state`: current scan state
    /// * `config`: configuration snapshot for this tick
    ///
    /// returns: &[ScanSample]
    pub fn sample_frame(&mut self, state: &ScanState, config: &LidarConfig) -> &[ScanSample] {
        self.scratch.clear();
        self.scratch.reserve(config.points_per_frame);

        let v_min = config.vertical_fov_min;
        let v_range = config.vertical_range();
        let channel_span = (config.num_channels - 1) as f64;

        for i in 0..config.points_per_frame {
            let base = state
                .frame_count
                .wrapping_mul(config.points_per_frame as u64)
                .wrapping_add(i as u64)
                .wrapping_add(state.pattern_offset);

            let normalized = (base % PATTERN_PERIOD) as f64 / PATTERN_PERIOD as f64;
            let h_angle = angle_to_2pi(
                state.horizontal_angle + normalized * 2.0 * PI + GOLDEN_ANGLE * base as f64,
            );
            if !within_horizontal_fov(h_angle, config.horizontal_fov) {
                continue;
            }

            let v_unit = hash_unit(base).powf(VERTICAL_BIAS);
            let v_angle = v_min + v_unit * v_range;

            let channel = (((v_angle - v_min) / v_range) * channel_span)
                .floor()
                .clamp(0.0, channel_span) as usize;

            self.scratch.push(ScanSample {
                horizontal_angle: h_angle,
                vertical_angle: v_angle,
                channel,
                direction: unit_from_angles(h_angle, v_angle.to_radians()),
            });
        }

        &self.scratch
    }
}

/// Maps an integer to a deterministic pseudo-random value in [0, 1) using the splitmix64
/// finalizer. Cheap enough to run once per sampled ray.
fn hash_unit(mut x: u64) -> f64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^= x >> 31;
    (x >> 11) as f64 / (1u64 << 53) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;
    use test_case::test_case;

    fn config() -> LidarConfig {
        LidarConfig {
            points_per_frame: 500,
            ..LidarConfig::default()
        }
    }

    #[test]
    fn angle_advance_wraps_without_reset() {
        let config = config();
        let mut state = ScanState::with_offset(&config, 0);
        let mut rng = rand::rng();

        for _ in 0..1000 {
            let dt = rng.random_range(0.0..0.5);
            let before = state.horizontal_angle;
            update_scan_angle(dt, &mut state, config.scan_rate);
            assert!(
                (0.0..2.0 * PI).contains(&state.horizontal_angle),
                "angle {} left the wrap range after dt {} from {}",
                state.horizontal_angle,
                dt,
                before
            );
        }
        assert_eq!(state.frame_count, 1000);
    }

    #[test]
    fn phase_wraps_at_one() {
        let config = config();
        let mut state = ScanState::with_offset(&config, 0);
        for _ in 0..100 {
            update_scan_angle(0.13, &mut state, config.scan_rate);
            assert!((0.0..1.0).contains(&state.scan_phase));
        }
    }

    #[test]
    fn sampling_is_deterministic() {
        let config = config();
        let mut state = ScanState::with_offset(&config, 42);
        update_scan_angle(0.01, &mut state, config.scan_rate);

        let mut pattern_a = ScanPattern::new();
        let mut pattern_b = ScanPattern::new();
        let a: Vec<_> = pattern_a.sample_frame(&state, &config).to_vec();
        let b: Vec<_> = pattern_b.sample_frame(&state, &config).to_vec();

        assert_eq!(a.len(), b.len());
        for (sa, sb) in a.iter().zip(b.iter()) {
            assert_eq!(sa.horizontal_angle, sb.horizontal_angle);
            assert_eq!(sa.vertical_angle, sb.vertical_angle);
            assert_eq!(sa.channel, sb.channel);
            assert_eq!(sa.direction, sb.direction);
        }
    }

    #[test]
    fn samples_stay_within_fov() {
        let config = config();
        let state = ScanState::with_offset(&config, 7);
        let mut pattern = ScanPattern::new();

        for sample in pattern.sample_frame(&state, &config) {
            assert!((0.0..2.0 * PI).contains(&sample.horizontal_angle));
            assert!(sample.vertical_angle >= config.vertical_fov_min);
            assert!(sample.vertical_angle <= config.vertical_fov_max);
            assert!(sample.channel < config.num_channels);
            assert_relative_eq!(sample.direction.norm(), 1.0, epsilon = 1.0e-12);
        }
    }

    #[test]
    fn narrow_fov_drops_out_of_sector_samples() {
        let config = LidarConfig {
            horizontal_fov: 90.0,
            ..config()
        };
        let state = ScanState::with_offset(&config, 0);
        let mut pattern = ScanPattern::new();
        let samples = pattern.sample_frame(&state, &config);

        assert!(samples.len() < config.points_per_frame);
        for sample in samples {
            assert!(sample.horizontal_angle <= config.horizontal_fov.to_radians());
        }
    }

    #[test]
    fn offsets_decorrelate_sensors() {
        let config = config();
        let state_a = ScanState::with_offset(&config, 0);
        let state_b = ScanState::with_offset(&config, 1);
        let mut pattern = ScanPattern::new();

        let first_a = pattern.sample_frame(&state_a, &config)[0];
        let first_b = pattern.sample_frame(&state_b, &config)[0];
        assert_ne!(first_a.horizontal_angle, first_b.horizontal_angle);
    }

    #[test]
    fn channel_table_matches_channel_count() {
        let config = config();
        let state = ScanState::with_offset(&config, 0);
        assert_eq!(state.vertical_angles().len(), config.num_channels);
        assert_relative_eq!(state.vertical_angles()[0], config.vertical_fov_min);
        assert_relative_eq!(
            *state.vertical_angles().last().unwrap(),
            config.vertical_fov_max
        );
    }

    #[test]
    fn channel_table_recomputes_only_on_change() {
        let config = config();
        let mut state = ScanState::with_offset(&config, 0);
        let before = state.vertical_angles().to_vec();

        // Range and rate changes do not touch the table
        let tweaked = LidarConfig {
            max_range: 500.0,
            scan_rate: 1.0,
            ..config
        };
        state.sync_channel_table(&tweaked);
        assert_eq!(state.vertical_angles(), before.as_slice());

        let rechanneled = LidarConfig {
            num_channels: 64,
            ..config
        };
        state.sync_channel_table(&rechanneled);
        assert_eq!(state.vertical_angles().len(), 64);
    }

    #[test_case(0)]
    #[test_case(1)]
    #[test_case(u64::MAX)]
    fn hash_stays_in_unit_range(x: u64) {
        let h = hash_unit(x);
        assert!((0.0..1.0).contains(&h));
    }

    #[test]
    fn hash_spreads_values() {
        // Coarse uniformity check over ten bins
        let mut bins = [0usize; 10];
        for i in 0..10_000u64 {
            bins[(hash_unit(i) * 10.0) as usize] += 1;
        }
        for count in bins {
            assert!(count > 500, "bin count {} suggests a badly skewed hash", count);
        }
    }
}

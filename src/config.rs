//! Sensor configuration. A `LidarConfig` is an immutable-per-tick snapshot of the sensor's
//! operating parameters; the simulation reads it fresh on every tick and derived tables are
//! recomputed only when the fields that feed them actually change.

use crate::Result;
use crate::errors::InvalidConfig;
use serde::{Deserialize, Serialize};

/// Operating parameters for a simulated multi-channel scanning LiDAR.
///
/// The invariants enforced by [`LidarConfig::validate`] are: at least two channels, a non-empty
/// vertical field of view, a horizontal field of view in (0, 360] degrees, `0 < min_range <
/// max_range`, a positive finite scan rate, and a ray budget of at least one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LidarConfig {
    /// Number of discrete vertical beams.
    pub num_channels: usize,

    /// Lower edge of the vertical field of view, in degrees.
    pub vertical_fov_min: f64,

    /// Upper edge of the vertical field of view, in degrees.
    pub vertical_fov_max: f64,

    /// Horizontal field of view in degrees, typically 360 for a rotating sensor.
    pub horizontal_fov: f64,

    /// Minimum measurable range in meters.
    pub min_range: f64,

    /// Maximum measurable range in meters.
    pub max_range: f64,

    /// Rotation rate of the scan head in radians per second.
    pub scan_rate: f64,

    /// Ray budget per simulation tick.
    pub points_per_frame: usize,
}

impl Default for LidarConfig {
    fn default() -> Self {
        // A 16 channel, +/-15 degree sensor spinning at 10 revolutions per second.
        Self {
            num_channels: 16,
            vertical_fov_min: -15.0,
            vertical_fov_max: 15.0,
            horizontal_fov: 360.0,
            min_range: 0.5,
            max_range: 100.0,
            scan_rate: 20.0 * std::f64::consts::PI,
            points_per_frame: 2000,
        }
    }
}

impl LidarConfig {
    /// Checks every construction invariant, returning a descriptive error for the first failure
    /// found. Call this before handing the configuration to a sensor; the sensor constructors do
    /// the same internally.
    pub fn validate(&self) -> Result<()> {
        if self.num_channels < 2 {
            return Err(InvalidConfig::TooFewChannels(self.num_channels).into());
        }
        if !(self.vertical_fov_max > self.vertical_fov_min) {
            return Err(InvalidConfig::EmptyVerticalFov {
                min: self.vertical_fov_min,
                max: self.vertical_fov_max,
            }
            .into());
        }
        if !(self.horizontal_fov > 0.0 && self.horizontal_fov <= 360.0) {
            return Err(InvalidConfig::BadHorizontalFov(self.horizontal_fov).into());
        }
        if !(self.min_range > 0.0 && self.min_range < self.max_range) {
            return Err(InvalidConfig::BadRangeLimits {
                min: self.min_range,
                max: self.max_range,
            }
            .into());
        }
        if !(self.scan_rate > 0.0 && self.scan_rate.is_finite()) {
            return Err(InvalidConfig::BadScanRate(self.scan_rate).into());
        }
        if self.points_per_frame == 0 {
            return Err(InvalidConfig::ZeroRayBudget.into());
        }
        Ok(())
    }

    /// The total vertical angular span in degrees.
    pub fn vertical_range(&self) -> f64 {
        self.vertical_fov_max - self.vertical_fov_min
    }

    /// Replace the vertical FOV limits with a single span centered on zero, for sensors
    /// specified by total vertical FOV rather than explicit min/max edges.
    pub fn with_symmetric_vertical_fov(mut self, fov_deg: f64) -> Self {
        self.vertical_fov_min = -fov_deg / 2.0;
        self.vertical_fov_max = fov_deg / 2.0;
        self
    }

    /// A comparable fingerprint of the fields that feed the per-channel vertical angle table.
    /// Two configurations with equal fingerprints produce identical tables, so the table is
    /// recomputed only when the fingerprint changes.
    pub fn channel_fingerprint(&self) -> (usize, u64, u64) {
        (
            self.num_channels,
            self.vertical_fov_min.to_bits(),
            self.vertical_fov_max.to_bits(),
        )
    }

    /// Parse and validate a configuration from a JSON string.
    ///
    /// # Arguments
    ///
    /// * `text`: JSON object with the same field names as the struct
    ///
    /// returns: Result<LidarConfig, Box<dyn Error, Global>>
    ///
    /// # Examples
    ///
    /// ```
    ///
    /// ```
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

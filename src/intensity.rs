//! The return-signal model. A hit becomes a point only if its distance passes the blind zone and
//! a reflectivity-dependent maximum range; the surviving points get an intensity in [0, 1] built
//! from exponential atmospheric attenuation, Lambertian incidence falloff, the surface's
//! reflectivity, and a per-channel power weight. The numbers here are illustrative tuning
//! defaults, not derived constants, so every one of them is an overridable field.

use crate::geom::{Point3, UnitVec3, dist};
use serde::{Deserialize, Serialize};

/// Tunable parameters of the intensity and range-gating model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityModel {
    /// Atmospheric attenuation rate in 1/m, applied as `exp(-rate * distance)`.
    pub attenuation_rate: f64,

    /// Hits closer than this distance in meters are never detected.
    pub blind_zone: f64,

    /// Reflectivity at or below this value uses `low_reflectivity_range` as the max range.
    pub low_reflectivity: f64,

    /// Reflectivity at or above this value uses `high_reflectivity_range` as the max range.
    pub high_reflectivity: f64,

    /// Maximum detection range in meters for dark surfaces.
    pub low_reflectivity_range: f64,

    /// Maximum detection range in meters for bright surfaces.
    pub high_reflectivity_range: f64,

    /// Weight applied to channel zero; the weight rises linearly toward one with the channel
    /// index to emulate per-beam emitter power variation.
    pub channel_weight_min: f64,
}

impl Default for IntensityModel {
    fn default() -> Self {
        Self {
            attenuation_rate: 0.1,
            blind_zone: 0.1,
            low_reflectivity: 0.1,
            high_reflectivity: 0.8,
            low_reflectivity_range: 40.0,
            high_reflectivity_range: 70.0,
            channel_weight_min: 0.8,
        }
    }
}

impl IntensityModel {
    /// Replace the atmospheric attenuation rate, in 1/m.
    pub fn set_attenuation_rate(&mut self, rate: f64) {
        self.attenuation_rate = rate;
    }

    /// Derives a [0, 1] reflectivity from a surface's base color as the mean of its RGB
    /// channels, standing in for a physical reflectance measurement. Surfaces without color
    /// information get 0.5.
    pub fn reflectivity_from_color(color: Option<[u8; 3]>) -> f64 {
        match color {
            Some([r, g, b]) => (r as f64 + g as f64 + b as f64) / (3.0 * 255.0),
            None => 0.5,
        }
    }

    /// The maximum detection range for a surface of the given reflectivity: dark surfaces cap at
    /// `low_reflectivity_range`, bright ones at `high_reflectivity_range`, with linear
    /// interpolation between the two breakpoints.
    ///
    /// # Arguments
    ///
    /// * `reflectivity`: surface reflectivity in [0, 1]
    ///
    /// returns: f64
    ///
    /// # Examples
    ///
    /// ```
    /// use lidarsim::intensity::IntensityModel;
    /// let model = IntensityModel::default();
    /// assert_eq!(model.max_range_for(0.05), 40.0);
    /// assert_eq!(model.max_range_for(0.9), 70.0);
    /// ```
    pub fn max_range_for(&self, reflectivity: f64) -> f64 {
        if reflectivity <= self.low_reflectivity {
            self.low_reflectivity_range
        } else if reflectivity >= self.high_reflectivity {
            self.high_reflectivity_range
        } else {
            let t = (reflectivity - self.low_reflectivity)
                / (self.high_reflectivity - self.low_reflectivity);
            self.low_reflectivity_range
                + t * (self.high_reflectivity_range - self.low_reflectivity_range)
        }
    }

    /// Computes the return intensity for a hit, or `None` if the hit is range-gated away. The
    /// near gate is the larger of the fixed blind zone and the sensor's configured minimum
    /// range; the reflectivity-dependent max range is clamped by the sensor's configured
    /// `max_range`. A non-finite result is rejected rather than propagated.
    ///
    /// # Arguments
    ///
    /// * `origin`: sensor position in world space
    /// * `hit_point`: hit position in world space
    /// * `ray_direction`: unit direction the ray was cast along
    /// * `surface_normal`: surface normal at the hit, when the geometry provides one
    /// * `reflectivity`: surface reflectivity in [0, 1]
    /// * `channel`: index of the channel that fired the ray
    /// * `num_channels`: total channel count
    /// * `sensor_min_range`: the configured minimum range of the sensor
    /// * `sensor_max_range`: the configured maximum range of the sensor
    ///
    /// returns: Option<f64>
    #[allow(clippy::too_many_arguments)]
    pub fn calculate(
        &self,
        origin: &Point3,
        hit_point: &Point3,
        ray_direction: &UnitVec3,
        surface_normal: Option<&UnitVec3>,
        reflectivity: f64,
        channel: usize,
        num_channels: usize,
        sensor_min_range: f64,
        sensor_max_range: f64,
    ) -> Option<f64> {
        let distance = dist(origin, hit_point);
        if !distance.is_finite() || distance < self.blind_zone.max(sensor_min_range) {
            return None;
        }

        let max_range = self.max_range_for(reflectivity).min(sensor_max_range);
        if distance > max_range {
            return None;
        }

        let mut intensity = (-self.attenuation_rate * distance).exp() * reflectivity;

        if let Some(normal) = surface_normal {
            intensity *= normal.dot(ray_direction).abs();
        }

        let weight = self.channel_weight_min
            + (1.0 - self.channel_weight_min) * (channel as f64 / num_channels as f64);
        intensity *= weight;

        if !intensity.is_finite() {
            return None;
        }
        Some(intensity.clamp(0.0, 1.0))
    }
}

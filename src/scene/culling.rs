//! Distance-based pre-filtering of scene surfaces. Before the per-ray intersection loop runs,
//! each surface's cached world bounding sphere is tested against the sensor's range limits in a
//! single O(1)-per-surface pass, so surfaces that cannot possibly return a point never reach the
//! ray caster.

use super::SceneSurface;
use crate::config::LidarConfig;
use crate::geom::{Point3, dist};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// The default slack in meters added beyond the nominal max range. Surfaces sitting just outside
/// the nominal range stay in the candidate set instead of flickering in and out between frames.
pub const DEFAULT_BUFFER_DISTANCE: f64 = 10.0;

/// Range limits used by the culling pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CullingParams {
    pub min_range: f64,
    pub max_range: f64,
    pub buffer_distance: f64,
}

impl CullingParams {
    pub fn new(min_range: f64, max_range: f64, buffer_distance: f64) -> Self {
        Self {
            min_range,
            max_range,
            buffer_distance,
        }
    }

    /// Derive the culling limits from a sensor configuration, using the default slack.
    pub fn from_config(config: &LidarConfig) -> Self {
        Self::new(config.min_range, config.max_range, DEFAULT_BUFFER_DISTANCE)
    }
}

/// Counters describing one culling pass. Purely observational.
#[derive(Debug, Clone, Copy, Default)]
pub struct CullingStats {
    pub total: usize,
    pub visible: usize,
    pub too_close: usize,
    pub too_far: usize,
    pub elapsed: Duration,
}

/// The surfaces that survived the distance filter, plus the pass counters.
#[derive(Debug)]
pub struct CullResult<'a> {
    pub visible: Vec<&'a SceneSurface>,
    pub stats: CullingStats,
}

/// Partition the scene's surfaces by distance from the sensor. A surface is too close when its
/// entire bounding sphere sits inside the minimum range, too far when the sphere sits entirely
/// beyond `max_range + buffer_distance`, and visible otherwise.
///
/// # Arguments
///
/// * `surfaces`: all candidate surfaces in the scene
/// * `sensor_position`: sensor origin in world space
/// * `params`: range limits for the pass
///
/// returns: CullResult
pub fn cull<'a>(
    surfaces: &'a [SceneSurface],
    sensor_position: &Point3,
    params: &CullingParams,
) -> CullResult<'a> {
    let started = Instant::now();
    let mut stats = CullingStats {
        total: surfaces.len(),
        ..CullingStats::default()
    };

    let far_limit = params.max_range + params.buffer_distance;
    let mut visible = Vec::with_capacity(surfaces.len());

    for surface in surfaces {
        let sphere = surface.bounding_sphere();
        let distance = dist(sensor_position, sphere.center());
        let radius = sphere.radius();

        if distance + radius < params.min_range {
            stats.too_close += 1;
        } else if distance - radius > far_limit {
            stats.too_far += 1;
        } else {
            stats.visible += 1;
            visible.push(surface);
        }
    }

    stats.elapsed = started.elapsed();
    CullResult { visible, stats }
}

//! The per-tick ray-casting engine. For every sampled beam direction the engine intersects the
//! candidate surfaces with nearest-hit semantics, runs the hit through the intensity model, and
//! packs the surviving points into a preallocated flat scratch buffer of four values per point.
//! Misses and numerical anomalies are silently dropped; a bad ray never aborts the frame.

use crate::POINT_STRIDE;
use crate::config::LidarConfig;
use crate::geom::{Iso3, Point3, UnitVec3};
use crate::intensity::IntensityModel;
use crate::scan::{ScanPattern, ScanSample, ScanState};
use crate::scene::culling::{CullingParams, CullingStats, DEFAULT_BUFFER_DISTANCE, cull};
use crate::scene::{SceneSurface, nearest_hit};
use parry3d_f64::query::Ray;
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// A single emitted point. The flat buffers used by the pipeline carry the first four values
/// (x, y, z, intensity); the timestamp is shared by every point of a tick and tracked at the
/// frame level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub position: Point3,
    pub intensity: f64,
    pub timestamp: f64,
}

impl Point {
    /// The point's flat-buffer representation.
    pub fn components(&self) -> [f64; 4] {
        [
            self.position.x,
            self.position.y,
            self.position.z,
            self.intensity,
        ]
    }
}

/// Timing and throughput counters for one cast frame. Purely observational; nothing in the
/// pipeline changes behavior based on these.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub elapsed: Duration,
    pub rays_cast: usize,
    pub points_generated: usize,
    pub surfaces_processed: usize,
}

/// The output of one tick's worth of ray casting. The point slice borrows the engine's scratch
/// buffer and is valid until the next cast.
#[derive(Debug)]
pub struct CastFrame<'a> {
    /// Flat x, y, z, intensity runs for every emitted point.
    pub points: &'a [f64],

    /// Timestamp shared by the frame's points, in microseconds.
    pub timestamp: f64,

    /// Culling counters when the culling pass ran.
    pub culling: Option<CullingStats>,

    pub stats: FrameStats,
}

impl CastFrame<'_> {
    pub fn point_count(&self) -> usize {
        self.points.len() / POINT_STRIDE
    }

    /// Iterate the emitted points as values.
    pub fn iter_points(&self) -> impl Iterator<Item = Point> + '_ {
        let timestamp = self.timestamp;
        self.points.chunks_exact(POINT_STRIDE).map(move |c| Point {
            position: Point3::new(c[0], c[1], c[2]),
            intensity: c[3],
            timestamp,
        })
    }
}

/// The ray-casting engine. Owns the scan pattern scratch, the per-ray result cells, and the
/// output buffer, all reused across ticks so the steady state allocates nothing per frame.
#[derive(Debug)]
pub struct RayCaster {
    pattern: ScanPattern,
    intensity: IntensityModel,
    culling_slack: f64,
    cells: Vec<Option<[f64; POINT_STRIDE]>>,
    out: Vec<f64>,
}

impl RayCaster {
    pub fn new(intensity: IntensityModel) -> Self {
        Self {
            pattern: ScanPattern::new(),
            intensity,
            culling_slack: DEFAULT_BUFFER_DISTANCE,
            cells: Vec::new(),
            out: Vec::new(),
        }
    }

    pub fn intensity(&self) -> &IntensityModel {
        &self.intensity
    }

    pub fn intensity_mut(&mut self) -> &mut IntensityModel {
        &mut self.intensity
    }

    /// Slack added beyond the nominal max range during culling.
    pub fn set_culling_slack(&mut self, slack: f64) {
        self.culling_slack = slack;
    }

    /// Cast one frame of rays from the sensor pose into the scene.
    ///
    /// Sample directions come from the scan pattern (a pure function of `state` and `config`,
    /// so a frame can be re-cast reproducibly), each ray takes the nearest hit among the
    /// candidate surfaces, and hits that survive the intensity model's range gating become
    /// points stamped with `now_ms * 1000` (the microsecond convention of the output format).
    ///
    /// # Arguments
    ///
    /// * `pose`: world pose of the sensor; rays originate at its translation
    /// * `surfaces`: all intersectable surfaces in the scene
    /// * `state`: current scan state
    /// * `config`: configuration snapshot for this tick
    /// * `now_ms`: current simulation time in milliseconds
    /// * `enable_culling`: run the bounding-sphere distance filter before intersecting
    ///
    /// returns: CastFrame
    pub fn cast_frame(
        &mut self,
        pose: &Iso3,
        surfaces: &[SceneSurface],
        state: &ScanState,
        config: &LidarConfig,
        now_ms: f64,
        enable_culling: bool,
    ) -> CastFrame<'_> {
        let started = Instant::now();
        let origin = Point3::from(pose.translation.vector);

        let mut culling_stats = None;
        let candidates: Vec<&SceneSurface> = if enable_culling {
            let params = CullingParams::new(config.min_range, config.max_range, self.culling_slack);
            let result = cull(surfaces, &origin, &params);
            culling_stats = Some(result.stats);
            result.visible
        } else {
            surfaces.iter().collect()
        };

        let samples = self.pattern.sample_frame(state, config);

        self.cells.clear();
        self.cells.resize(samples.len(), None);

        let intensity = &self.intensity;
        let num_channels = config.num_channels;
        let min_range = config.min_range;
        let max_range = config.max_range;
        let rotation = pose.rotation;

        samples
            .par_iter()
            .zip(self.cells.par_iter_mut())
            .for_each(|(sample, cell)| {
                *cell = cast_one(
                    &origin,
                    &rotation,
                    sample,
                    &candidates,
                    intensity,
                    num_channels,
                    min_range,
                    max_range,
                );
            });

        self.out.clear();
        for cell in self.cells.iter().flatten() {
            self.out.extend_from_slice(cell);
        }

        let stats = FrameStats {
            elapsed: started.elapsed(),
            rays_cast: samples.len(),
            points_generated: self.out.len() / POINT_STRIDE,
            surfaces_processed: candidates.len(),
        };

        CastFrame {
            points: &self.out,
            timestamp: now_ms * 1000.0,
            culling: culling_stats,
            stats,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cast_one(
    origin: &Point3,
    rotation: &parry3d_f64::na::UnitQuaternion<f64>,
    sample: &ScanSample,
    candidates: &[&SceneSurface],
    intensity: &IntensityModel,
    num_channels: usize,
    min_range: f64,
    max_range: f64,
) -> Option<[f64; POINT_STRIDE]> {
    let world_direction: UnitVec3 = rotation * sample.direction;
    let ray = Ray::new(*origin, world_direction.into_inner());

    let hit = nearest_hit(candidates, &ray, max_range)?;
    let reflectivity = IntensityModel::reflectivity_from_color(hit.base_color);

    let value = intensity.calculate(
        origin,
        &hit.point,
        &world_direction,
        hit.normal.as_ref(),
        reflectivity,
        sample.channel,
        num_channels,
        min_range,
        max_range,
    )?;

    let components = [hit.point.x, hit.point.y, hit.point.z, value];
    if components.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(components)
}

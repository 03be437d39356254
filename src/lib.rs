//! Simulation of a rotating or solid-state LiDAR sensor inside a 3D scene. Every tick the
//! sensor samples a deterministic scan pattern, casts the rays against the scene's triangle
//! meshes, turns hits into intensity-valued points through a reflectivity-based signal model,
//! and accumulates the results into a fixed-capacity circular buffer for visualization and,
//! when a capture session is active, into time-boxed frames for point-cloud export.

use std::error::Error;

pub mod buffer;
pub mod capture;
pub mod caster;
pub mod common;
pub mod config;
pub mod errors;
pub mod geom;
pub mod intensity;
pub mod io;
pub mod scan;
pub mod scene;
pub mod sensor;

pub type Result<T> = std::result::Result<T, Box<dyn Error>>;

/// Values per point in the pipeline's flat buffers: x, y, z, intensity.
pub const POINT_STRIDE: usize = 4;

pub use buffer::CircularPointBuffer;
pub use capture::{CaptureConfig, CaptureStatus, CapturedFrame, FrameCapture, FrameStatistics};
pub use caster::{CastFrame, FrameStats, Point, RayCaster};
pub use config::LidarConfig;
pub use geom::{Iso3, Point3, UnitVec3, Vector3};
pub use intensity::IntensityModel;
pub use io::ExportSummary;
pub use scan::{GOLDEN_ANGLE, ScanPattern, ScanSample, ScanState, update_scan_angle};
pub use scene::culling::{CullResult, CullingParams, CullingStats, cull};
pub use scene::{SceneSurface, SurfaceHit, nearest_hit};
pub use sensor::{LidarSensor, TickReport, TickThrottle};

//! Type aliases for the 3D primitives used throughout the crate. The underlying types come from
//! `parry3d-f64` and the `nalgebra` version it re-exports, so scene geometry built from parry
//! shapes can be passed in without conversion.

pub type Point3 = parry3d_f64::na::Point3<f64>;
pub type Vector3 = parry3d_f64::na::Vector3<f64>;
pub type UnitVec3 = parry3d_f64::na::Unit<Vector3>;
pub type Iso3 = parry3d_f64::na::Isometry3<f64>;

/// Returns the distance between two points.
///
/// # Arguments
///
/// * `a`: the first point
/// * `b`: the second point
///
/// returns: f64
///
/// # Examples
///
/// ```
/// use lidarsim::geom::{dist, Point3};
/// let a = Point3::new(1.0, 2.0, 0.0);
/// let b = Point3::new(4.0, 2.0, 0.0);
/// assert_eq!(dist(&a, &b), 3.0);
/// ```
pub fn dist(a: &Point3, b: &Point3) -> f64 {
    (a - b).norm()
}

/// Builds the unit direction vector for a beam at the given horizontal and vertical angles, in
/// the sensor's local frame. The convention is z-up: the horizontal angle sweeps the XY plane
/// counter-clockwise from +X, and the vertical angle elevates out of it.
///
/// # Arguments
///
/// * `h_angle`: horizontal (azimuth) angle in radians
/// * `v_angle`: vertical (elevation) angle in radians
///
/// returns: Unit<Matrix<f64, Const<3>, Const<1>, ArrayStorage<f64, 3, 1>>>
pub fn unit_from_angles(h_angle: f64, v_angle: f64) -> UnitVec3 {
    let (sv, cv) = v_angle.sin_cos();
    let (sh, ch) = h_angle.sin_cos();
    UnitVec3::new_unchecked(Vector3::new(cv * ch, cv * sh, sv))
}

/// Returns true if the angle, in radians, lies within a horizontal field of view of `fov_deg`
/// degrees centered so that the sector starts at zero. A full 360 degree field of view accepts
/// everything.
pub fn within_horizontal_fov(angle: f64, fov_deg: f64) -> bool {
    fov_deg >= 360.0 || angle <= fov_deg.to_radians()
}

//! Scene geometry visible to the sensor. A `SceneSurface` wraps a triangle mesh from the host
//! engine together with its world pose and an optional base color, and caches a world-space
//! bounding sphere so the per-frame culling pass never has to touch the triangles.

pub mod culling;

use crate::geom::{Iso3, Point3, UnitVec3};
use crate::{Result, geom};
use parry3d_f64::bounding_volume::BoundingSphere;
use parry3d_f64::query::{Ray, RayCast};
use parry3d_f64::shape::{Shape, TriMesh};

/// One intersectable surface in the scene.
#[derive(Clone)]
pub struct SceneSurface {
    shape: TriMesh,
    pose: Iso3,
    base_color: Option<[u8; 3]>,
    bounding: BoundingSphere,
}

/// The result of intersecting one ray with the scene: the hit position, its distance from the
/// ray origin, the surface normal when the geometry provides one, and the hit surface's base
/// color.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceHit {
    pub point: Point3,
    pub distance: f64,
    pub normal: Option<UnitVec3>,
    pub base_color: Option<[u8; 3]>,
}

impl SceneSurface {
    /// Wrap an existing parry triangle mesh as a scene surface.
    pub fn new(shape: TriMesh, pose: Iso3, base_color: Option<[u8; 3]>) -> Self {
        let bounding = world_bounding_sphere(&shape, &pose);
        Self {
            shape,
            pose,
            base_color,
            bounding,
        }
    }

    /// Build a surface from raw vertex and face data.
    ///
    /// # Arguments
    ///
    /// * `vertices`: mesh vertices in the surface's local frame
    /// * `faces`: triangle vertex indices
    /// * `pose`: world pose of the surface
    /// * `base_color`: optional base color used to derive reflectivity
    ///
    /// returns: Result<SceneSurface, Box<dyn Error, Global>>
    pub fn try_new(
        vertices: Vec<Point3>,
        faces: Vec<[u32; 3]>,
        pose: Iso3,
        base_color: Option<[u8; 3]>,
    ) -> Result<Self> {
        let shape =
            TriMesh::new(vertices, faces).map_err(|e| format!("invalid surface mesh: {:?}", e))?;
        Ok(Self::new(shape, pose, base_color))
    }

    /// Build an axis-aligned box surface with the given full extents, centered on its pose.
    ///
    /// # Examples
    ///
    /// ```
    /// use lidarsim::scene::SceneSurface;
    /// use lidarsim::geom::Iso3;
    /// let surface = SceneSurface::create_box(2.0, 2.0, 2.0, Iso3::identity(), None);
    /// assert!(surface.bounding_sphere().radius() > 1.0);
    /// ```
    pub fn create_box(x: f64, y: f64, z: f64, pose: Iso3, base_color: Option<[u8; 3]>) -> Self {
        let cuboid = parry3d_f64::shape::Cuboid::new(geom::Vector3::new(x, y, z) * 0.5);
        let (vertices, faces) = cuboid.to_trimesh();
        let shape = TriMesh::new(vertices, faces)
            .expect("a cuboid tessellation is always a valid mesh");
        Self::new(shape, pose, base_color)
    }

    /// Load a surface from an STL file.
    #[cfg(feature = "stl")]
    pub fn load_stl(
        path: &std::path::Path,
        pose: Iso3,
        base_color: Option<[u8; 3]>,
    ) -> Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let stl = stl_io::read_stl(&mut file)?;

        let vertices = stl
            .vertices
            .iter()
            .map(|v| Point3::new(v[0] as f64, v[1] as f64, v[2] as f64))
            .collect::<Vec<_>>();
        let faces = stl
            .faces
            .iter()
            .map(|f| {
                [
                    f.vertices[0] as u32,
                    f.vertices[1] as u32,
                    f.vertices[2] as u32,
                ]
            })
            .collect::<Vec<_>>();

        Self::try_new(vertices, faces, pose, base_color)
    }

    pub fn pose(&self) -> &Iso3 {
        &self.pose
    }

    /// Move the surface, recomputing the cached world bounding sphere.
    pub fn set_pose(&mut self, pose: Iso3) {
        self.pose = pose;
        self.bounding = world_bounding_sphere(&self.shape, &self.pose);
    }

    pub fn base_color(&self) -> Option<[u8; 3]> {
        self.base_color
    }

    pub fn set_base_color(&mut self, color: Option<[u8; 3]>) {
        self.base_color = color;
    }

    /// The surface's bounding sphere in world space.
    pub fn bounding_sphere(&self) -> &BoundingSphere {
        &self.bounding
    }

    pub fn tri_mesh(&self) -> &TriMesh {
        &self.shape
    }

    /// Intersect a world-space ray with this surface, returning the nearest hit within
    /// `max_range` of the ray origin.
    pub fn cast_ray(&self, ray: &Ray, max_range: f64) -> Option<SurfaceHit> {
        self.shape
            .cast_ray_and_get_normal(&self.pose, ray, max_range, false)
            .map(|ri| SurfaceHit {
                point: ray.point_at(ri.time_of_impact),
                distance: ri.time_of_impact,
                normal: Some(UnitVec3::new_normalize(ri.normal)),
                base_color: self.base_color,
            })
    }
}

impl std::fmt::Debug for SceneSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneSurface")
            .field("triangles", &self.shape.indices().len())
            .field("pose", &self.pose)
            .field("base_color", &self.base_color)
            .finish()
    }
}

/// Intersect a ray against a set of candidate surfaces with nearest-hit semantics. An empty
/// candidate set is not an error, it simply produces no hit.
///
/// # Arguments
///
/// * `candidates`: the surfaces to test, typically the output of the culling pass
/// * `ray`: world-space ray
/// * `max_range`: farthest time of impact to consider
///
/// returns: Option<SurfaceHit>
pub fn nearest_hit(candidates: &[&SceneSurface], ray: &Ray, max_range: f64) -> Option<SurfaceHit> {
    let mut best: Option<SurfaceHit> = None;
    for surface in candidates {
        let limit = best.map(|b| b.distance).unwrap_or(max_range);
        if let Some(hit) = surface.cast_ray(ray, limit) {
            if best.map(|b| hit.distance < b.distance).unwrap_or(true) {
                best = Some(hit);
            }
        }
    }
    best
}

fn world_bounding_sphere(shape: &TriMesh, pose: &Iso3) -> BoundingSphere {
    let aabb = shape.compute_local_aabb();
    BoundingSphere::new(pose * aabb.center(), aabb.half_extents().norm())
}

use crawl_common::{CUBE_SIZE, HALF_CUBE};
use glam::Vec3;

/// Result of a volume test against the frustum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    Outside,
    Intersect,
    Inside,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Plane {
    normal: Vec3,
    d: f32,
}

impl Plane {
    /// Plane through three points, normal following `(c - b) x (a - b)`.
    fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Self {
        let normal = (c - b).cross(a - b).normalize_or_zero();
        Self {
            normal,
            d: -normal.dot(b),
        }
    }

    /// Signed distance; positive on the inner side.
    fn distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.d
    }
}

/// Six-plane view volume built from camera internals and a look-at definition.
#[derive(Debug, Clone, Default)]
pub struct Frustum {
    planes: [Plane; 6],
    near: f32,
    far: f32,
    near_half: (f32, f32),
    far_half: (f32, f32),
}

impl Frustum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Projection parameters; `fov` is the vertical angle in degrees.
    pub fn set_internals(&mut self, fov: f32, aspect: f32, near: f32, far: f32) {
        let tang = (fov.to_radians() * 0.5).tan();
        let nh = near * tang;
        let fh = far * tang;
        self.near = near;
        self.far = far;
        self.near_half = (nh * aspect, nh);
        self.far_half = (fh * aspect, fh);
    }

    /// Place the frustum: camera at `eye` looking at `target` with `up`.
    pub fn set_view(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        let z = (eye - target).normalize_or_zero();
        let x = up.cross(z).normalize_or_zero();
        let y = z.cross(x);

        let nc = eye - z * self.near;
        let fc = eye - z * self.far;
        let (nw, nh) = self.near_half;
        let (fw, fh) = self.far_half;

        let ntl = nc + y * nh - x * nw;
        let ntr = nc + y * nh + x * nw;
        let nbl = nc - y * nh - x * nw;
        let nbr = nc - y * nh + x * nw;
        let ftl = fc + y * fh - x * fw;
        let ftr = fc + y * fh + x * fw;
        let fbl = fc - y * fh - x * fw;
        let fbr = fc - y * fh + x * fw;

        self.planes = [
            Plane::from_points(ntr, ntl, ftl), // top
            Plane::from_points(nbl, nbr, fbr), // bottom
            Plane::from_points(ntl, nbl, fbl), // left
            Plane::from_points(nbr, ntr, fbr), // right
            Plane::from_points(ntl, ntr, nbr), // near
            Plane::from_points(ftr, ftl, fbl), // far
        ];
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        self.planes.iter().all(|pl| pl.distance(p) >= 0.0)
    }

    pub fn sphere(&self, center: Vec3, radius: f32) -> Containment {
        let mut result = Containment::Inside;
        for pl in &self.planes {
            let dist = pl.distance(center);
            if dist < -radius {
                return Containment::Outside;
            }
            if dist < radius {
                result = Containment::Intersect;
            }
        }
        result
    }

    /// Axis-aligned box given by its minimum corner and size.
    pub fn aabox(&self, min: Vec3, size: Vec3) -> Containment {
        let mut result = Containment::Inside;
        for pl in &self.planes {
            let n = pl.normal;
            let positive = min + Vec3::select(n.cmpgt(Vec3::ZERO), size, Vec3::ZERO);
            let negative = min + Vec3::select(n.cmplt(Vec3::ZERO), size, Vec3::ZERO);
            if pl.distance(positive) < 0.0 {
                return Containment::Outside;
            }
            if pl.distance(negative) < 0.0 {
                result = Containment::Intersect;
            }
        }
        result
    }

    /// Box test for the cube of a cell centered at `center`.
    pub fn cell_visible(&self, center: Vec3) -> bool {
        self.aabox(center - Vec3::splat(HALF_CUBE), Vec3::splat(CUBE_SIZE)) != Containment::Outside
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_down_neg_z() -> Frustum {
        let mut f = Frustum::new();
        f.set_internals(60.0, 1.0, 0.5, 100.0);
        f.set_view(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        f
    }

    #[test]
    fn points() {
        let f = looking_down_neg_z();
        assert!(f.contains_point(Vec3::new(0.0, 0.0, -5.0)));
        assert!(!f.contains_point(Vec3::new(0.0, 0.0, 5.0)));
        assert!(!f.contains_point(Vec3::new(0.0, 0.0, -0.1)));
        assert!(!f.contains_point(Vec3::new(0.0, 0.0, -150.0)));
        assert!(!f.contains_point(Vec3::new(50.0, 0.0, -5.0)));
    }

    #[test]
    fn box_containment() {
        let f = looking_down_neg_z();
        let size = Vec3::splat(2.0);
        assert_eq!(f.aabox(Vec3::new(-1.0, -1.0, -11.0), size), Containment::Inside);
        // Beyond the far plane by more than the half extent.
        assert_eq!(f.aabox(Vec3::new(-1.0, -1.0, -110.0), size), Containment::Outside);
        // Straddles the far plane only.
        assert_eq!(f.aabox(Vec3::new(-1.0, -1.0, -101.0), size), Containment::Intersect);
        assert_eq!(f.aabox(Vec3::new(-1.0, -1.0, 5.0), size), Containment::Outside);
    }

    #[test]
    fn sphere_containment() {
        let f = looking_down_neg_z();
        assert_eq!(f.sphere(Vec3::new(0.0, 0.0, -20.0), 1.0), Containment::Inside);
        assert_eq!(f.sphere(Vec3::new(0.0, 0.0, 0.0), 1.0), Containment::Intersect);
        assert_eq!(f.sphere(Vec3::new(0.0, 0.0, 10.0), 1.0), Containment::Outside);
    }

    #[test]
    fn cell_box_uses_cube_extent() {
        let f = looking_down_neg_z();
        // Center behind the camera but the cube reaches in front of it.
        assert!(f.cell_visible(Vec3::new(0.0, 0.0, 0.5)));
        assert!(!f.cell_visible(Vec3::new(0.0, 0.0, 3.0)));
    }
}

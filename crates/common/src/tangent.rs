use glam::{Vec2, Vec3};

/// Below this UV determinant a triangle has no usable texture-space basis.
const MIN_UV_DETERMINANT: f32 = 1e-8;

/// Vertex types that carry a tangent for normal mapping.
pub trait TangentVertex {
    fn position(&self) -> Vec3;
    fn uv(&self) -> Vec2;
    fn normal(&self) -> Vec3;
    fn set_tangent(&mut self, tangent: Vec3);
}

/// Compute per-triangle tangents for a triangle list and write them to all three vertices.
///
/// Triangles with a degenerate UV mapping get a tangent perpendicular to the
/// first vertex normal instead of Inf/NaN. Returns how many triangles fell back.
/// Trailing vertices that do not form a full triangle are left untouched.
pub fn generate_tangents<V: TangentVertex>(vertices: &mut [V]) -> usize {
    let mut degenerate = 0;
    for tri in vertices.chunks_exact_mut(3) {
        let edge1 = tri[1].position() - tri[0].position();
        let edge2 = tri[2].position() - tri[0].position();
        let duv1 = tri[1].uv() - tri[0].uv();
        let duv2 = tri[2].uv() - tri[0].uv();

        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        let tangent = if det.abs() > MIN_UV_DETERMINANT {
            let f = 1.0 / det;
            (f * (duv2.y * edge1 - duv1.y * edge2)).try_normalize()
        } else {
            None
        };

        let tangent = match tangent {
            Some(t) if t.is_finite() => t,
            _ => {
                degenerate += 1;
                fallback_tangent(tri[0].normal())
            }
        };

        for v in tri.iter_mut() {
            v.set_tangent(tangent);
        }
    }
    degenerate
}

fn fallback_tangent(normal: Vec3) -> Vec3 {
    match normal.try_normalize() {
        Some(n) => n.any_orthonormal_vector(),
        None => Vec3::X,
    }
}

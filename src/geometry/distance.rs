//! Distance queries used by cursor picking and face removal
//!
//! All functions are total for finite inputs. Degenerate (near-zero-area)
//! triangles report `interior = false` and fall back to the edge minimum.

use super::math::Vec3;

/// Closest point on a segment plus the distance to it
#[derive(Debug, Clone, Copy)]
pub struct SegmentHit {
    pub point: Vec3,
    pub distance: f32,
}

/// Closest point on a triangle plus the distance to it
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    pub point: Vec3,
    pub distance: f32,
    /// True when the plane projection of the query point lands inside the
    /// triangle (all barycentric weights non-negative)
    pub interior: bool,
}

/// A cheap enclosing sphere (centroid center, not minimal)
#[derive(Debug, Clone, Copy)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

/// Denominator threshold below which a triangle is treated as degenerate
const DEGENERATE_EPSILON: f32 = 1e-12;

/// Closest point on segment `ab` to `p` (clamped projection)
pub fn closest_point_on_segment(p: Vec3, a: Vec3, b: Vec3) -> SegmentHit {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    let t = if len_sq <= DEGENERATE_EPSILON {
        0.0
    } else {
        ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0)
    };
    let point = a + ab * t;
    SegmentHit {
        point,
        distance: p.distance(point),
    }
}

/// Closest point on triangle `abc` to `p`.
///
/// Projects `p` onto the triangle's plane via barycentric coordinates. If all
/// weights are non-negative the projection is interior and the distance is
/// the perpendicular plane distance; otherwise the answer is the minimum over
/// the three edge segments (which covers the vertices too).
pub fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> TriangleHit {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d00 = ab.dot(ab);
    let d01 = ab.dot(ac);
    let d11 = ac.dot(ac);
    let d20 = ap.dot(ab);
    let d21 = ap.dot(ac);

    let denom = d00 * d11 - d01 * d01;
    if denom.abs() > DEGENERATE_EPSILON {
        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        let u = 1.0 - v - w;
        if u >= 0.0 && v >= 0.0 && w >= 0.0 {
            let point = a + ab * v + ac * w;
            return TriangleHit {
                point,
                distance: p.distance(point),
                interior: true,
            };
        }
    }

    // Exterior projection or degenerate triangle: best of the three edges
    let mut best = closest_point_on_segment(p, a, b);
    for hit in [
        closest_point_on_segment(p, b, c),
        closest_point_on_segment(p, c, a),
    ] {
        if hit.distance < best.distance {
            best = hit;
        }
    }
    TriangleHit {
        point: best.point,
        distance: best.distance,
        interior: false,
    }
}

/// Cheap enclosing sphere for a triangle: centroid center, radius = max
/// centroid-to-vertex distance. Used only as a rejection test before the
/// exact triangle query.
pub fn bounding_sphere(a: Vec3, b: Vec3, c: Vec3) -> BoundingSphere {
    let center = (a + b + c) * (1.0 / 3.0);
    let radius = center
        .distance(a)
        .max(center.distance(b))
        .max(center.distance(c));
    BoundingSphere { center, radius }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_interior_projection() {
        let hit = closest_point_on_segment(
            Vec3::new(5.0, 3.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
        );
        assert!((hit.point.x - 5.0).abs() < 0.001);
        assert!((hit.distance - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_segment_clamps_to_endpoint() {
        let hit = closest_point_on_segment(
            Vec3::new(-4.0, 3.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
        );
        assert!((hit.point.x - 0.0).abs() < 0.001);
        assert!((hit.distance - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_segment_zero_length() {
        let a = Vec3::new(2.0, 0.0, 0.0);
        let hit = closest_point_on_segment(Vec3::new(0.0, 0.0, 0.0), a, a);
        assert!((hit.distance - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_triangle_interior() {
        let hit = closest_point_on_triangle(
            Vec3::new(2.0, 2.0, 5.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        );
        assert!(hit.interior);
        assert!((hit.distance - 5.0).abs() < 0.001);
        assert!((hit.point.x - 2.0).abs() < 0.001);
        assert!((hit.point.y - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_triangle_exterior_falls_back_to_edge() {
        let hit = closest_point_on_triangle(
            Vec3::new(5.0, -3.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        );
        assert!(!hit.interior);
        assert!((hit.distance - 3.0).abs() < 0.001);
        assert!((hit.point.x - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_triangle_degenerate_is_not_interior() {
        // All three vertices collinear
        let hit = closest_point_on_triangle(
            Vec3::new(5.0, 4.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
        );
        assert!(!hit.interior);
        assert!((hit.distance - 4.0).abs() < 0.001);
    }

    #[test]
    fn test_bounding_sphere_contains_vertices() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(12.0, 0.0, 0.0);
        let c = Vec3::new(0.0, 9.0, 0.0);
        let sphere = bounding_sphere(a, b, c);
        for v in [a, b, c] {
            assert!(sphere.center.distance(v) <= sphere.radius + 0.001);
        }
    }
}

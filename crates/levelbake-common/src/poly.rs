// poly.rs — convex polygons and plane splitting

use crate::q_shared::*;

/// Maximum vertices a polygon may carry.
pub const MAX_POLY_VERTICES: usize = 16;
/// Fragments at or above this count are split in half before further clipping.
pub const VERTEX_THRESHOLD: usize = MAX_POLY_VERTICES - 2;

/// Points within this distance of a plane count as on it.
pub const THRESH_SPLIT_POLY_WITH_PLANE: f32 = 0.25;
/// Consecutive vertices closer than this are welded.
pub const THRESH_POINTS_ARE_SAME: f32 = 0.002;

/// Convex, planar polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Poly {
    pub vertices: Vec<Vec3>,
    pub normal: Vec3,
    pub base: Vec3,
    /// Brush polygon this came from, `None` for synthesized faces.
    pub i_brush_poly: Option<usize>,
    pub poly_flags: PolyFlags,
}

/// Outcome of `Poly::split_with_plane`.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitResult {
    Coplanar,
    Front,
    Back,
    Split(Poly, Poly),
}

impl Poly {
    /// Polygon from counter-clockwise vertices (as seen from the normal side).
    pub fn new(vertices: Vec<Vec3>) -> Self {
        let mut p = Poly {
            base: vertices.first().copied().unwrap_or(VEC3_ORIGIN),
            vertices,
            normal: [0.0, 0.0, 1.0],
            i_brush_poly: None,
            poly_flags: PolyFlags::empty(),
        };
        p.calc_normal();
        p
    }

    /// Huge quad lying on `plane`, facing along its normal.
    pub fn infinite(plane: &Plane) -> Self {
        let n = plane.normal;
        let u = perpendicular_vector(&n);
        let v = cross_product(&n, &u);
        let c = plane.base();
        let corner = |su: f32, sv: f32| {
            let p = vector_ma(&c, su * WORLD_MAX, &u);
            vector_ma(&p, sv * WORLD_MAX, &v)
        };
        Poly {
            vertices: vec![
                corner(1.0, 1.0),
                corner(-1.0, 1.0),
                corner(-1.0, -1.0),
                corner(1.0, -1.0),
            ],
            normal: n,
            base: c,
            i_brush_poly: None,
            poly_flags: PolyFlags::empty(),
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn plane(&self) -> Plane {
        Plane::from_point(&self.base, &self.normal)
    }

    /// Recompute the normal from the winding. Returns false if degenerate.
    pub fn calc_normal(&mut self) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }
        let v0 = self.vertices[0];
        let mut sum = VEC3_ORIGIN;
        for i in 1..self.vertices.len() - 1 {
            let a = vector_subtract(&self.vertices[i], &v0);
            let b = vector_subtract(&self.vertices[i + 1], &v0);
            sum = vector_add(&sum, &cross_product(&a, &b));
        }
        if vector_normalize(&mut sum) < 1e-6 {
            return false;
        }
        self.normal = sum;
        self.base = v0;
        true
    }

    pub fn area(&self) -> f32 {
        if self.vertices.len() < 3 {
            return 0.0;
        }
        let v0 = self.vertices[0];
        let mut sum = VEC3_ORIGIN;
        for i in 1..self.vertices.len() - 1 {
            let a = vector_subtract(&self.vertices[i], &v0);
            let b = vector_subtract(&self.vertices[i + 1], &v0);
            sum = vector_add(&sum, &cross_product(&a, &b));
        }
        0.5 * vector_length(&sum)
    }

    pub fn center(&self) -> Vec3 {
        if self.vertices.is_empty() {
            return self.base;
        }
        let mut c = VEC3_ORIGIN;
        for v in &self.vertices {
            c = vector_add(&c, v);
        }
        vector_scale(&c, 1.0 / self.vertices.len() as f32)
    }

    /// Weld near-duplicate neighbours. Returns the remaining vertex count.
    pub fn fix(&mut self) -> usize {
        let mut out: Vec<Vec3> = Vec::with_capacity(self.vertices.len());
        for v in &self.vertices {
            if let Some(prev) = out.last() {
                if vector_distance_squared(prev, v) < THRESH_POINTS_ARE_SAME * THRESH_POINTS_ARE_SAME {
                    continue;
                }
            }
            out.push(*v);
        }
        while out.len() > 1 {
            let first = out[0];
            let last = out[out.len() - 1];
            if vector_distance_squared(&first, &last) < THRESH_POINTS_ARE_SAME * THRESH_POINTS_ARE_SAME {
                out.pop();
            } else {
                break;
            }
        }
        self.vertices = out;
        self.vertices.len()
    }

    fn with_vertices(&self, vertices: Vec<Vec3>) -> Poly {
        Poly {
            vertices,
            normal: self.normal,
            base: self.base,
            i_brush_poly: self.i_brush_poly,
            poly_flags: self.poly_flags,
        }
    }

    /// Classify against `plane` and split if it straddles. Fragments with
    /// fewer than three vertices are dropped, so a sliver straddle reports
    /// the side holding the rest of the polygon.
    pub fn split_with_plane(&self, plane: &Plane) -> SplitResult {
        let dists: Vec<f32> = self.vertices.iter().map(|v| plane.plane_dot(v)).collect();

        let num_front = dists.iter().filter(|&&d| d > THRESH_SPLIT_POLY_WITH_PLANE).count();
        let num_back = dists.iter().filter(|&&d| d < -THRESH_SPLIT_POLY_WITH_PLANE).count();

        if num_front == 0 && num_back == 0 {
            return SplitResult::Coplanar;
        }
        if num_back == 0 {
            return SplitResult::Front;
        }
        if num_front == 0 {
            return SplitResult::Back;
        }

        let n = self.vertices.len();
        let mut front = Vec::with_capacity(n + 1);
        let mut back = Vec::with_capacity(n + 1);

        for i in 0..n {
            let j = (i + 1) % n;
            let p = self.vertices[i];
            let q = self.vertices[j];
            let dp = dists[i];
            let dq = dists[j];

            if dp.abs() <= THRESH_SPLIT_POLY_WITH_PLANE {
                front.push(p);
                back.push(p);
                continue;
            }
            if dp > 0.0 {
                front.push(p);
            } else {
                back.push(p);
            }
            // edge crosses strictly to the other side
            if dq.abs() > THRESH_SPLIT_POLY_WITH_PLANE && (dp > 0.0) != (dq > 0.0) {
                let t = dp / (dp - dq);
                let mid = vector_lerp(&p, &q, t);
                front.push(mid);
                back.push(mid);
            }
        }

        let mut front = self.with_vertices(front);
        let mut back = self.with_vertices(back);
        let nf = front.fix();
        let nb = back.fix();

        match (nf >= 3, nb >= 3) {
            (true, true) => SplitResult::Split(front, back),
            (true, false) => SplitResult::Front,
            (false, true) => SplitResult::Back,
            (false, false) => SplitResult::Coplanar,
        }
    }

    /// Keep the part of the polygon on the front side of `plane` (on-plane
    /// counts as front). `None` when nothing survives.
    pub fn clip_front(&self, plane: &Plane) -> Option<Poly> {
        match self.split_with_plane(plane) {
            SplitResult::Coplanar | SplitResult::Front => Some(self.clone()),
            SplitResult::Back => None,
            SplitResult::Split(front, _) => Some(front),
        }
    }

    /// Cut along the chord from vertex 0 to the middle vertex.
    pub fn split_in_half(&self) -> (Poly, Poly) {
        let n = self.vertices.len();
        let mid = n / 2;
        let first = self.vertices[..=mid].to_vec();
        let mut second = self.vertices[mid..].to_vec();
        second.push(self.vertices[0]);
        (self.with_vertices(first), self.with_vertices(second))
    }

    pub fn reversed(&self) -> Poly {
        let mut p = self.clone();
        p.vertices.reverse();
        p.normal = vector_negate(&self.normal);
        p
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn square(size: f32) -> Poly {
        Poly::new(vec![
            [0.0, 0.0, 0.0],
            [size, 0.0, 0.0],
            [size, size, 0.0],
            [0.0, size, 0.0],
        ])
    }

    #[test]
    fn test_square_normal_and_area() {
        let p = square(10.0);
        assert_eq!(p.normal, [0.0, 0.0, 1.0]);
        assert!((p.area() - 100.0).abs() < 1e-3);
        assert_eq!(p.center(), [5.0, 5.0, 0.0]);
    }

    #[test]
    fn test_split_classifies() {
        let p = square(10.0);
        let above = Plane::new([0.0, 0.0, 1.0], -5.0);
        assert_eq!(p.split_with_plane(&above), SplitResult::Front);
        assert_eq!(p.split_with_plane(&above.flip()), SplitResult::Back);
        let on = Plane::new([0.0, 0.0, 1.0], 0.1);
        assert_eq!(p.split_with_plane(&on), SplitResult::Coplanar);

        let cut = Plane::new([1.0, 0.0, 0.0], 4.0);
        match p.split_with_plane(&cut) {
            SplitResult::Split(f, b) => {
                assert!((f.area() - 60.0).abs() < 1e-3);
                assert!((b.area() - 40.0).abs() < 1e-3);
                assert!(f.vertices.iter().all(|v| v[0] >= 4.0 - 1e-4));
                assert!(b.vertices.iter().all(|v| v[0] <= 4.0 + 1e-4));
            }
            other => panic!("expected split, got {:?}", other),
        }
    }

    #[test]
    fn test_split_through_vertex_keeps_both_triangles() {
        let p = square(10.0);
        // diagonal through vertices 0 and 2
        let mut n = [1.0, -1.0, 0.0];
        vector_normalize(&mut n);
        let diag = Plane::new(n, 0.0);
        match p.split_with_plane(&diag) {
            SplitResult::Split(f, b) => {
                assert_eq!(f.num_vertices(), 3);
                assert_eq!(b.num_vertices(), 3);
            }
            other => panic!("expected split, got {:?}", other),
        }
    }

    #[test]
    fn test_near_plane_vertices_count_as_on() {
        let p = square(10.0);
        // vertices at x=10 are within the split threshold of x=9.8
        let plane = Plane::new([1.0, 0.0, 0.0], 9.8);
        assert_eq!(p.split_with_plane(&plane), SplitResult::Back);
        assert!(p.clip_front(&plane).is_none());
        assert!(p.clip_front(&plane.flip()).is_some());
    }

    #[test]
    fn test_infinite_quad_lies_on_plane() {
        let plane = Plane::new([0.0, 0.6, 0.8], 100.0);
        let q = Poly::infinite(&plane);
        for v in &q.vertices {
            assert!(plane.plane_dot(v).abs() < 0.05);
        }
        let mut check = q.clone();
        assert!(check.calc_normal());
        assert!(dot_product(&check.normal, &plane.normal) > 0.999);
    }

    #[test]
    fn test_split_in_half_preserves_area() {
        let mut verts = Vec::new();
        for i in 0..15 {
            let a = i as f32 * 24.0 * DEG_TO_RAD;
            verts.push([a.cos() * 100.0, a.sin() * 100.0, 0.0]);
        }
        let p = Poly::new(verts);
        assert!(p.num_vertices() >= VERTEX_THRESHOLD);
        let (a, b) = p.split_in_half();
        assert!(a.num_vertices() < p.num_vertices());
        assert!(b.num_vertices() < p.num_vertices());
        assert!((a.area() + b.area() - p.area()).abs() < 0.5);
    }

    #[test]
    fn test_random_splits_preserve_area() {
        let mut rng = rand::thread_rng();
        let p = square(256.0);
        for _ in 0..200 {
            let yaw: f32 = rng.gen_range(0.0..360.0);
            let dir = yaw_vector(yaw);
            let dist = dot_product(&dir, &[128.0, 128.0, 0.0]) + rng.gen_range(-100.0..100.0);
            let plane = Plane::new(dir, dist);
            let total = match p.split_with_plane(&plane) {
                SplitResult::Split(f, b) => f.area() + b.area(),
                SplitResult::Front | SplitResult::Back => p.area(),
                SplitResult::Coplanar => panic!("vertical plane cannot be coplanar"),
            };
            // slivers under the threshold may be dropped
            assert!((total - p.area()).abs() < 256.0, "area drift {}", total - p.area());
        }
    }
}

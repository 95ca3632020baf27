// q_shared.rs — foundational types and math shared by both build pipelines

// ============================================================
// Basic types
// ============================================================

pub type Vec3 = [f32; 3];

pub const VEC3_ORIGIN: Vec3 = [0.0, 0.0, 0.0];

pub const DEG_TO_RAD: f32 = std::f32::consts::PI / 180.0;
pub const RAD_TO_DEG: f32 = 180.0 / std::f32::consts::PI;

// ============================================================
// World limits
// ============================================================

/// Edge length of the quad used as a stand-in for an entire splitting plane.
pub const WORLD_MAX: f32 = 65536.0;
/// Half extent of the cube that bounds every level.
pub const HALF_WORLD_MAX: f32 = 32768.0;

/// Zones are numbered 1..=63; 0 is the ambient zone.
pub const MAX_ZONES: usize = 64;

/// Sentinel for "no brush polygon" in persisted hull lists.
pub const INDEX_NONE: i32 = -1;

// ============================================================
// Surface flags
// ============================================================

bitflags::bitflags! {
    /// Per-surface polygon flags carried on every BSP surface.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PolyFlags: u32 {
        /// Surface does not make the space behind it solid.
        const NOT_SOLID = 0x0000_0008;
        /// Explicit zone divider (doorway plane).
        const PORTAL    = 0x0400_0000;
        /// Surface straddles several zones and must stay split.
        const NO_MERGE  = 0x0000_0100;
        /// Surface is never drawn.
        const INVISIBLE = 0x0000_0001;
        /// Surface belongs to a semisolid brush.
        const SEMISOLID = 0x0000_0020;
    }
}

// ============================================================
// Vector math
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn vector_negate(v: &Vec3) -> Vec3 {
    [-v[0], -v[1], -v[2]]
}

/// veca + scale * vecb
#[inline]
pub fn vector_ma(veca: &Vec3, scale: f32, vecb: &Vec3) -> Vec3 {
    [
        veca[0] + scale * vecb[0],
        veca[1] + scale * vecb[1],
        veca[2] + scale * vecb[2],
    ]
}

#[inline]
pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

#[inline]
pub fn vector_lerp(a: &Vec3, b: &Vec3, frac: f32) -> Vec3 {
    [
        a[0] + frac * (b[0] - a[0]),
        a[1] + frac * (b[1] - a[1]),
        a[2] + frac * (b[2] - a[2]),
    ]
}

pub fn vector_length(v: &Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[inline]
pub fn vector_length_squared(v: &Vec3) -> f32 {
    v[0] * v[0] + v[1] * v[1] + v[2] * v[2]
}

#[inline]
pub fn vector_distance_squared(a: &Vec3, b: &Vec3) -> f32 {
    vector_length_squared(&vector_subtract(a, b))
}

/// Horizontal (xy) distance between two points.
pub fn vector_distance_2d(a: &Vec3, b: &Vec3) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

/// Normalize in place, returns original length.
pub fn vector_normalize(v: &mut Vec3) -> f32 {
    let length = vector_length(v);
    if length != 0.0 {
        let ilength = 1.0 / length;
        v[0] *= ilength;
        v[1] *= ilength;
        v[2] *= ilength;
    }
    length
}

pub fn cross_product(v1: &Vec3, v2: &Vec3) -> Vec3 {
    [
        v1[1] * v2[2] - v1[2] * v2[1],
        v1[2] * v2[0] - v1[0] * v2[2],
        v1[0] * v2[1] - v1[1] * v2[0],
    ]
}

pub fn project_point_on_plane(p: &Vec3, normal: &Vec3) -> Vec3 {
    let inv_denom = 1.0 / dot_product(normal, normal);
    let d = dot_product(normal, p) * inv_denom;
    vector_ma(p, -d * inv_denom, normal)
}

/// Find a unit vector perpendicular to `src` (assumed normalized).
pub fn perpendicular_vector(src: &Vec3) -> Vec3 {
    let mut min_elem: f32 = 1.0;
    let mut pos = 0;
    for i in 0..3 {
        if src[i].abs() < min_elem {
            pos = i;
            min_elem = src[i].abs();
        }
    }
    let mut tempvec = [0.0f32; 3];
    tempvec[pos] = 1.0;

    let mut dst = project_point_on_plane(&tempvec, src);
    vector_normalize(&mut dst);
    dst
}

// ============================================================
// Yaw helpers (right-handed, +x = yaw 0, +y = yaw 90)
// ============================================================

/// Unit horizontal vector for a yaw in degrees.
pub fn yaw_vector(yaw: f32) -> Vec3 {
    let r = yaw * DEG_TO_RAD;
    [r.cos(), r.sin(), 0.0]
}

/// Yaw in degrees of a horizontal direction, in [0, 360).
pub fn vectoyaw(vec: &Vec3) -> f32 {
    if vec[0] == 0.0 && vec[1] == 0.0 {
        return 0.0;
    }
    let mut yaw = vec[1].atan2(vec[0]) * RAD_TO_DEG;
    if yaw < 0.0 {
        yaw += 360.0;
    }
    yaw
}

/// Rotate a horizontal direction 90 degrees counter-clockwise (to the left).
#[inline]
pub fn left_of(dir: &Vec3) -> Vec3 {
    [-dir[1], dir[0], 0.0]
}

/// Rotate a horizontal direction 90 degrees clockwise (to the right).
#[inline]
pub fn right_of(dir: &Vec3) -> Vec3 {
    [dir[1], -dir[0], 0.0]
}

// ============================================================
// Plane
// ============================================================

/// Plane in `normal . p = dist` form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f32,
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            normal: [0.0, 0.0, 1.0],
            dist: 0.0,
        }
    }
}

impl Plane {
    pub fn new(normal: Vec3, dist: f32) -> Self {
        Self { normal, dist }
    }

    /// Plane through `base` with the given normal.
    pub fn from_point(base: &Vec3, normal: &Vec3) -> Self {
        Self {
            normal: *normal,
            dist: dot_product(base, normal),
        }
    }

    /// Signed distance of `p` above the plane.
    #[inline]
    pub fn plane_dot(&self, p: &Vec3) -> f32 {
        dot_product(&self.normal, p) - self.dist
    }

    pub fn flip(&self) -> Plane {
        Plane {
            normal: vector_negate(&self.normal),
            dist: -self.dist,
        }
    }

    /// A point lying on the plane.
    pub fn base(&self) -> Vec3 {
        vector_scale(&self.normal, self.dist)
    }
}

// ============================================================
// Axis-aligned box
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min: Vec3,
    pub max: Vec3,
    pub is_valid: bool,
}

impl Default for BBox {
    fn default() -> Self {
        Self::cleared()
    }
}

impl BBox {
    pub fn cleared() -> Self {
        Self {
            min: [f32::MAX; 3],
            max: [f32::MIN; 3],
            is_valid: false,
        }
    }

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min,
            max,
            is_valid: true,
        }
    }

    pub fn add_point(&mut self, v: &Vec3) {
        for i in 0..3 {
            if v[i] < self.min[i] {
                self.min[i] = v[i];
            }
            if v[i] > self.max[i] {
                self.max[i] = v[i];
            }
        }
        self.is_valid = true;
    }

    pub fn add_box(&mut self, other: &BBox) {
        if other.is_valid {
            self.add_point(&other.min);
            self.add_point(&other.max);
        }
    }

    pub fn contains(&self, p: &Vec3) -> bool {
        self.is_valid && (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    pub fn center(&self) -> Vec3 {
        vector_lerp(&self.min, &self.max, 0.5)
    }

    /// Six floats in min-then-max order, the persisted hull layout.
    pub fn to_floats(&self) -> [f32; 6] {
        [
            self.min[0], self.min[1], self.min[2], self.max[0], self.max[1], self.max[2],
        ]
    }
}

// ============================================================
// Tests
// ============================================================

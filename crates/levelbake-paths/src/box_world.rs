// box_world.rs — axis-aligned solid boxes as a reference movement oracle

use levelbake_common::q_shared::*;

use crate::pb_scout::{MoveOracle, Trace};

/// Gap kept between a stopped box and the surface it hit.
pub const DIST_EPSILON: f32 = 0.03125;
/// Slack for a start point lying on a face; must stay below DIST_EPSILON.
const ON_FACE_EPSILON: f32 = 0.01;
/// Thickness of generated walls, floors and ceilings.
pub const WALL_THICKNESS: f32 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolidBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl SolidBox {
    /// Grown by a box of half extents `ext`.
    fn expanded(&self, ext: &Vec3) -> SolidBox {
        SolidBox {
            min: vector_subtract(&self.min, ext),
            max: vector_add(&self.max, ext),
        }
    }

    fn strictly_contains(&self, p: &Vec3) -> bool {
        (0..3).all(|k| p[k] > self.min[k] + ON_FACE_EPSILON && p[k] < self.max[k] - ON_FACE_EPSILON)
    }

    /// Entry fraction and face normal of the segment `start + t * delta`.
    fn sweep(&self, start: &Vec3, delta: &Vec3) -> Option<(f32, Vec3)> {
        let mut t_enter = f32::MIN;
        let mut t_exit = f32::MAX;
        let mut normal = [0.0f32; 3];
        for k in 0..3 {
            if delta[k].abs() < 1e-6 {
                if start[k] <= self.min[k] + ON_FACE_EPSILON || start[k] >= self.max[k] - ON_FACE_EPSILON {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / delta[k];
            let t1 = (self.min[k] - start[k]) * inv;
            let t2 = (self.max[k] - start[k]) * inv;
            let (near, far, side) = if t1 < t2 { (t1, t2, -1.0) } else { (t2, t1, 1.0) };
            if near > t_enter {
                t_enter = near;
                normal = [0.0; 3];
                normal[k] = side;
            }
            t_exit = t_exit.min(far);
        }
        if t_enter >= t_exit || t_enter > 1.0 || t_exit <= 0.0 {
            return None;
        }
        // ending on the face is not entering the box
        if (1.0 - t_enter) * vector_length(delta) < ON_FACE_EPSILON {
            return None;
        }
        Some((t_enter.max(0.0), normal))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoxWorld {
    pub solids: Vec<SolidBox>,
}

impl BoxWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_solid(&mut self, min: Vec3, max: Vec3) -> &mut Self {
        self.solids.push(SolidBox { min, max });
        self
    }

    /// Closed room whose empty interior is `min..max`.
    pub fn room(min: Vec3, max: Vec3) -> Self {
        let t = WALL_THICKNESS;
        let mut world = Self::new();
        world
            .add_solid([min[0] - t, min[1] - t, min[2] - t], [max[0] + t, max[1] + t, min[2]])
            .add_solid([min[0] - t, min[1] - t, max[2]], [max[0] + t, max[1] + t, max[2] + t])
            .add_solid([min[0] - t, min[1] - t, min[2]], [max[0] + t, min[1], max[2]])
            .add_solid([min[0] - t, max[1], min[2]], [max[0] + t, max[1] + t, max[2]])
            .add_solid([min[0] - t, min[1], min[2]], [min[0], max[1], max[2]])
            .add_solid([max[0], min[1], min[2]], [max[0] + t, max[1], max[2]]);
        world
    }

    /// Room with a solid divider standing on the floor, running from the
    /// `min.y` wall at `x0..x1` and stopping at `y_end`.
    pub fn room_with_divider(min: Vec3, max: Vec3, x0: f32, x1: f32, y_end: f32) -> Self {
        let mut world = Self::room(min, max);
        world.add_solid([x0, min[1], min[2]], [x1, y_end, max[2]]);
        world
    }

    /// Room cut by a full-height wall at `x0..x1` with a doorway of
    /// `width` centered on `door_y`.
    pub fn doorway_rooms(min: Vec3, max: Vec3, x0: f32, x1: f32, door_y: f32, width: f32) -> Self {
        let mut world = Self::room(min, max);
        let half = width * 0.5;
        world
            .add_solid([x0, min[1], min[2]], [x1, door_y - half, max[2]])
            .add_solid([x0, door_y + half, min[2]], [x1, max[1], max[2]]);
        world
    }

    pub fn is_solid(&self, p: &Vec3) -> bool {
        self.solids.iter().any(|b| b.strictly_contains(p))
    }
}

impl MoveOracle for BoxWorld {
    fn trace(&self, start: &Vec3, end: &Vec3, radius: f32, height: f32) -> Trace {
        let ext = [radius, radius, height];
        let delta = vector_subtract(end, start);
        let mut trace = Trace {
            endpos: *end,
            ..Trace::default()
        };

        for solid in &self.solids {
            let grown = solid.expanded(&ext);
            if grown.strictly_contains(start) {
                trace.startsolid = true;
                trace.allsolid = grown.strictly_contains(end);
                trace.fraction = 0.0;
                trace.endpos = *start;
                return trace;
            }
            if let Some((t, normal)) = grown.sweep(start, &delta) {
                if t < trace.fraction {
                    trace.fraction = t;
                    trace.normal = normal;
                }
            }
        }

        if trace.fraction < 1.0 {
            let len = vector_length(&delta);
            let back = if len > 0.0 { DIST_EPSILON / len } else { 0.0 };
            let adjusted = (trace.fraction - back).max(0.0);
            trace.endpos = vector_ma(start, adjusted, &delta);
        }
        trace
    }
}

// ============================================================
// Tests
// ============================================================

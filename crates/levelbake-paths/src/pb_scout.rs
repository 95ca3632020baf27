// pb_scout.rs — the Scout pawn and the movement oracle it walks in
//
// The Scout is a synthetic pawn used only to ask movement questions. Its
// location is the center of a collision box `radius` wide and `height` tall
// on each side of center, so a standing human Scout sits 39 units above the
// floor.

use std::ops::{Deref, DerefMut};

use levelbake_common::common::com_dprintf;
use levelbake_common::level::Movement;
use levelbake_common::q_shared::*;

pub const HUMAN_RADIUS: f32 = 18.0;
pub const HUMAN_HEIGHT: f32 = 39.0;
pub const MAX_COMMON_RADIUS: f32 = 70.0;
pub const MAX_COMMON_HEIGHT: f32 = 70.0;

/// Distance covered by one walk step.
pub const MOVE_STEP: f32 = 16.0;
/// Steepest contact still counted as floor.
pub const MIN_FLOOR_Z: f32 = 0.7;
/// Contacts tried while settling onto a floor.
pub const MAX_FLOOR_CONTACTS: usize = 50;
/// Longest fall followed before a move is refused.
pub const MAX_FALL: f32 = 1024.0;
/// Moves shorter than this count as blocked.
pub const MIN_WALK_DIST: f32 = 1.0;

// ============================================================
// Oracle
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trace {
    pub startsolid: bool,
    pub allsolid: bool,
    pub fraction: f32,
    pub endpos: Vec3,
    /// Normal of the surface hit, zero when nothing was hit.
    pub normal: Vec3,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            startsolid: false,
            allsolid: false,
            fraction: 1.0,
            endpos: [0.0; 3],
            normal: [0.0; 3],
        }
    }
}

/// Collision world the Scout moves through.
pub trait MoveOracle {
    /// Sweep a box of half extents (radius, radius, height) from `start` to `end`.
    fn trace(&self, start: &Vec3, end: &Vec3, radius: f32, height: f32) -> Trace;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkResult {
    /// Covered the whole delta.
    Full,
    /// Moved, then ran into something.
    Partial,
    /// Did not move.
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub result: WalkResult,
    /// Horizontal distance covered.
    pub distance: f32,
    /// How far the Scout ended up below where it started.
    pub drop_z: f32,
}

impl Step {
    fn blocked() -> Self {
        Self {
            result: WalkResult::Blocked,
            distance: 0.0,
            drop_z: 0.0,
        }
    }
}

// ============================================================
// Scout
// ============================================================

pub struct Scout<'w, W: MoveOracle + ?Sized> {
    world: &'w W,
    pub location: Vec3,
    radius: f32,
    height: f32,
    pub movement: Movement,
}

impl<'w, W: MoveOracle + ?Sized> Scout<'w, W> {
    /// Human-sized walker with jumping disabled.
    pub fn new(world: &'w W) -> Self {
        Self {
            world,
            location: [0.0; 3],
            radius: HUMAN_RADIUS,
            height: HUMAN_HEIGHT,
            movement: Movement {
                can_walk: true,
                can_jump: false,
                can_fly: false,
                jump_z: 0.0,
                max_step_height: 18.0,
            },
        }
    }

    pub fn world(&self) -> &'w W {
        self.world
    }

    pub fn extent(&self) -> (f32, f32) {
        (self.radius, self.height)
    }

    /// Resize, keeping the bottom of the box where it was.
    pub fn set_extent(&mut self, radius: f32, height: f32) {
        self.location[2] += height - self.height;
        self.radius = radius;
        self.height = height;
    }

    /// Resize until the returned guard drops.
    pub fn with_extent(&mut self, radius: f32, height: f32) -> ExtentGuard<'_, 'w, W> {
        let saved = self.extent();
        self.set_extent(radius, height);
        ExtentGuard { scout: self, saved }
    }

    pub fn trace(&self, start: &Vec3, end: &Vec3) -> Trace {
        self.world.trace(start, end, self.radius, self.height)
    }

    pub fn fits(&self, p: &Vec3) -> bool {
        !self.trace(p, p).startsolid
    }

    /// Move regardless of what lies between. Fails only if `p` is solid.
    pub fn teleport(&mut self, p: &Vec3) -> bool {
        if !self.fits(p) {
            return false;
        }
        self.location = *p;
        true
    }

    /// Put the Scout near `p` and settle it onto a floor, sliding off
    /// slopes too steep to stand on.
    pub fn find_start(&mut self, p: &Vec3) -> bool {
        if !self.teleport(p) {
            let raised = [p[0], p[1], p[2] + self.movement.max_step_height];
            if !self.teleport(&raised) {
                com_dprintf(&format!("Scout does not fit at {:?}\n", p));
                return false;
            }
        }

        for _ in 0..MAX_FLOOR_CONTACTS {
            let below = [self.location[0], self.location[1], self.location[2] - MAX_FALL];
            let trace = self.trace(&self.location, &below);
            if trace.startsolid || trace.fraction >= 1.0 {
                com_dprintf(&format!("no floor below {:?}\n", self.location));
                return false;
            }
            self.location = trace.endpos;
            if trace.normal[2] >= MIN_FLOOR_Z {
                return true;
            }

            // slide down the slope
            let down = [0.0, 0.0, -MOVE_STEP];
            let mut slide = [0.0f32; 3];
            clip_velocity(&down, &trace.normal, &mut slide, 1.01);
            if vector_length(&slide) < 0.1 {
                break;
            }
            let end = vector_add(&self.location, &slide);
            self.location = self.trace(&self.location, &end).endpos;
        }
        com_dprintf(&format!("no floor found near {:?}\n", p));
        false
    }

    /// Walk horizontally by `delta`, stepping up ledges up to the step
    /// height and following drops down to the next floor.
    pub fn walk_by(&mut self, delta: &Vec3) -> Step {
        let start = self.location;
        let step = self.movement.max_step_height;

        let up = self.trace(&start, &[start[0], start[1], start[2] + step]);
        let raised = up.endpos;
        let dest = [raised[0] + delta[0], raised[1] + delta[1], raised[2]];
        let forward = self.trace(&raised, &dest);
        if forward.startsolid {
            return Step::blocked();
        }
        let moved = forward.endpos;

        let lift = raised[2] - start[2];
        let down = self.trace(&moved, &[moved[0], moved[1], moved[2] - lift - step]);
        let land = if down.fraction < 1.0 {
            if down.normal[2] < MIN_FLOOR_Z {
                return Step::blocked();
            }
            down.endpos
        } else {
            // off a ledge
            let from = down.endpos;
            let fall = self.trace(&from, &[from[0], from[1], from[2] - MAX_FALL]);
            if fall.fraction >= 1.0 || fall.normal[2] < MIN_FLOOR_Z {
                return Step::blocked();
            }
            fall.endpos
        };

        let distance = vector_distance_2d(&start, &land);
        if distance < MIN_WALK_DIST {
            return Step::blocked();
        }
        self.location = land;
        Step {
            result: if forward.fraction >= 1.0 { WalkResult::Full } else { WalkResult::Partial },
            distance,
            drop_z: (start[2] - land[2]).max(0.0),
        }
    }

    fn walk_to(&mut self, dest: &Vec3, allow_fall: bool) -> bool {
        if !self.fits(&self.location) {
            return false;
        }
        let step_height = self.movement.max_step_height;
        let max_steps = (vector_distance_2d(&self.location, dest) / MOVE_STEP) as usize * 2 + 4;
        for _ in 0..max_steps {
            let to = [dest[0] - self.location[0], dest[1] - self.location[1], 0.0];
            let d = vector_length(&to);
            if d <= MIN_WALK_DIST {
                return (dest[2] - self.location[2]).abs() <= self.height + step_height;
            }
            let delta = if d > MOVE_STEP { vector_scale(&to, MOVE_STEP / d) } else { to };
            let s = self.walk_by(&delta);
            if s.result != WalkResult::Full {
                return false;
            }
            if !allow_fall && s.drop_z > step_height {
                return false;
            }
        }
        false
    }

    /// Can the Scout get from where it stands to `dest`, falls allowed.
    /// The Scout is left where it was.
    pub fn point_reachable(&mut self, dest: &Vec3) -> bool {
        let saved = self.location;
        let ok = self.walk_to(dest, true);
        self.location = saved;
        ok
    }

    /// Like `point_reachable` but without dropping further than a step.
    pub fn walk_reachable(&mut self, dest: &Vec3) -> bool {
        let saved = self.location;
        let ok = self.walk_to(dest, false);
        self.location = saved;
        ok
    }

    /// `point_reachable` from another spot.
    pub fn reachable_between(&mut self, from: &Vec3, dest: &Vec3) -> bool {
        let saved = self.location;
        let ok = self.teleport(from) && self.walk_to(dest, true);
        self.location = saved;
        ok
    }
}

/// Slide a velocity off a contact plane.
fn clip_velocity(inv: &Vec3, normal: &Vec3, out: &mut Vec3, overbounce: f32) {
    let backoff = dot_product(inv, normal) * overbounce;
    for i in 0..3 {
        out[i] = inv[i] - normal[i] * backoff;
    }
}

// ============================================================
// Scoped extent
// ============================================================

/// Restores the Scout's extent when dropped, early returns included.
pub struct ExtentGuard<'a, 'w, W: MoveOracle + ?Sized> {
    scout: &'a mut Scout<'w, W>,
    saved: (f32, f32),
}

impl<'a, 'w, W: MoveOracle + ?Sized> Deref for ExtentGuard<'a, 'w, W> {
    type Target = Scout<'w, W>;

    fn deref(&self) -> &Self::Target {
        self.scout
    }
}

impl<'a, 'w, W: MoveOracle + ?Sized> DerefMut for ExtentGuard<'a, 'w, W> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.scout
    }
}

impl<'a, 'w, W: MoveOracle + ?Sized> Drop for ExtentGuard<'a, 'w, W> {
    fn drop(&mut self) {
        let (radius, height) = self.saved;
        self.scout.set_extent(radius, height);
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::box_world::BoxWorld;

    fn room() -> BoxWorld {
        BoxWorld::room([0.0, 0.0, 0.0], [512.0, 512.0, 256.0])
    }

    #[test]
    fn test_find_start_lands_on_floor() {
        let world = room();
        let mut scout = Scout::new(&world);
        assert!(scout.find_start(&[256.0, 256.0, 200.0]));
        assert!((scout.location[2] - HUMAN_HEIGHT).abs() < 0.1);
        assert!(!scout.find_start(&[256.0, 256.0, -100.0]));
    }

    #[test]
    fn test_find_start_needs_floor() {
        let mut world = BoxWorld::default();
        world.add_solid([0.0, 0.0, -16.0], [64.0, 64.0, 0.0]);
        let mut scout = Scout::new(&world);
        assert!(!scout.find_start(&[500.0, 500.0, 100.0]));
        assert!(scout.find_start(&[32.0, 32.0, 100.0]));
    }

    #[test]
    fn test_walk_results() {
        let world = room();
        let mut scout = Scout::new(&world);
        assert!(scout.find_start(&[256.0, 256.0, 40.0]));
        let s = scout.walk_by(&[16.0, 0.0, 0.0]);
        assert_eq!(s.result, WalkResult::Full);
        assert!((s.distance - 16.0).abs() < 0.01);

        assert!(scout.teleport(&[480.0, 256.0, scout.location[2]]));
        let s = scout.walk_by(&[16.0, 0.0, 0.0]);
        assert_eq!(s.result, WalkResult::Partial);
        assert!(scout.location[0] < 512.0 - HUMAN_RADIUS);
        let s = scout.walk_by(&[16.0, 0.0, 0.0]);
        assert_eq!(s.result, WalkResult::Blocked);
    }

    #[test]
    fn test_steps_up_and_drops_off_ledges() {
        let mut world = room();
        world.add_solid([200.0, 0.0, 0.0], [512.0, 512.0, 12.0]);
        world.add_solid([300.0, 0.0, 0.0], [512.0, 512.0, 64.0]);
        let mut scout = Scout::new(&world);
        assert!(scout.find_start(&[150.0, 256.0, 40.0]));
        assert!(scout.point_reachable(&[250.0, 256.0, 12.0 + HUMAN_HEIGHT]));
        assert!(!scout.point_reachable(&[400.0, 256.0, 64.0 + HUMAN_HEIGHT]));

        assert!(scout.find_start(&[400.0, 256.0, 120.0]));
        assert!(scout.point_reachable(&[150.0, 256.0, HUMAN_HEIGHT]));
        assert!(!scout.walk_reachable(&[150.0, 256.0, HUMAN_HEIGHT]));
        // the query leaves the Scout in place
        assert!((scout.location[0] - 400.0).abs() < 0.01);
    }

    #[test]
    fn test_extent_guard_restores_on_early_return() {
        fn widest(scout: &mut Scout<BoxWorld>, dest: &Vec3) -> Option<f32> {
            let mut big = scout.with_extent(MAX_COMMON_RADIUS, MAX_COMMON_HEIGHT);
            if !big.point_reachable(dest) {
                return None;
            }
            Some(big.extent().0)
        }

        let mut world = room();
        world.add_solid([250.0, 0.0, 0.0], [262.0, 400.0, 256.0]);
        let mut scout = Scout::new(&world);
        assert!(scout.find_start(&[100.0, 100.0, 40.0]));
        let z = scout.location[2];
        assert_eq!(widest(&mut scout, &[100.0, 300.0, z]), Some(MAX_COMMON_RADIUS));
        assert_eq!(widest(&mut scout, &[400.0, 100.0, z]), None);
        assert_eq!(scout.extent(), (HUMAN_RADIUS, HUMAN_HEIGHT));
        assert!((scout.location[2] - z).abs() < 1e-4);
    }

    #[test]
    fn test_clip_velocity_removes_normal_part() {
        let mut out = [0.0; 3];
        clip_velocity(&[0.0, 0.0, -16.0], &[0.0, 0.6, 0.8], &mut out, 1.0);
        assert!(dot_product(&out, &[0.0, 0.6, 0.8]).abs() < 1e-4);
    }
}

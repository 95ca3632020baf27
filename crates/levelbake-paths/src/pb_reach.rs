// pb_reach.rs — defining reach specs between navigation points

use levelbake_common::common::{com_dprintf, com_warnf};
use levelbake_common::level::{AddPath, Level};
use levelbake_common::q_shared::*;
use levelbake_common::reach_spec::{ReachFlags, ReachSpec};

use crate::pb_scout::*;

/// Smallest radius step of the bisection.
pub const MIN_RADIUS_STEP: f32 = 2.0;
/// Smallest height step of the bisection.
pub const MIN_HEIGHT_STEP: f32 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReachStats {
    pub specs: usize,
    pub overflows: usize,
    /// Navigation points the Scout could not stand at.
    pub unplaced: usize,
}

pub struct ReachSpecBuilder<'b, 'w, W: MoveOracle + ?Sized> {
    pub scout: &'b mut Scout<'w, W>,
    pub max_dist: f32,
}

impl<'b, 'w, W: MoveOracle + ?Sized> ReachSpecBuilder<'b, 'w, W> {
    pub fn new(scout: &'b mut Scout<'w, W>, max_dist: f32) -> Self {
        Self { scout, max_dist }
    }

    /// Clear every node's lists and define specs for all ordered pairs of
    /// navigation points within range.
    pub fn define_all(&mut self, level: &mut Level) -> ReachStats {
        let mut stats = ReachStats::default();
        undefine(level);

        let points = level.navigation_points();
        let mut floors: Vec<Option<Vec3>> = Vec::with_capacity(points.len());
        for &p in &points {
            let at = level.actors[p].location;
            let floor = if self.scout.find_start(&at) { Some(self.scout.location) } else { None };
            if floor.is_none() {
                com_dprintf(&format!("no floor for {}\n", level.actors[p].name));
                stats.unplaced += 1;
            }
            floors.push(floor);
        }

        for (a, &start) in points.iter().enumerate() {
            let Some(from) = floors[a] else { continue };
            for (b, &end) in points.iter().enumerate() {
                if a == b {
                    continue;
                }
                let Some(to) = floors[b] else { continue };
                if vector_distance_squared(&from, &to) > self.max_dist * self.max_dist {
                    continue;
                }
                let Some(mut spec) = self.define_spec(&from, &to) else { continue };
                spec.start = start;
                spec.end = end;
                match level.add_reach_spec(spec) {
                    AddPath::Added(_) => stats.specs += 1,
                    AddPath::Overflow => {
                        com_warnf(&format!(
                            "path list full, dropped {} -> {}\n",
                            level.actors[start].name, level.actors[end].name
                        ));
                        stats.overflows += 1;
                    }
                }
            }
        }
        stats
    }

    /// Envelope for walking from `from` to `to`, both Scout centers at human
    /// height. Radius is searched first at human height, then height at the
    /// radius found. `None` when not even a human fits through.
    pub fn define_spec(&mut self, from: &Vec3, to: &Vec3) -> Option<ReachSpec> {
        let radius = if self.reach_at(from, to, MAX_COMMON_RADIUS, HUMAN_HEIGHT) {
            MAX_COMMON_RADIUS
        } else if self.reach_at(from, to, HUMAN_RADIUS, HUMAN_HEIGHT) {
            let mut r = HUMAN_RADIUS;
            let mut step = (MAX_COMMON_RADIUS - HUMAN_RADIUS) * 0.5;
            while step >= MIN_RADIUS_STEP {
                if self.reach_at(from, to, r + step, HUMAN_HEIGHT) {
                    r += step;
                }
                step *= 0.5;
            }
            r
        } else {
            return None;
        };

        let height = if self.reach_at(from, to, radius, MAX_COMMON_HEIGHT) {
            MAX_COMMON_HEIGHT
        } else {
            let mut h = HUMAN_HEIGHT;
            let mut step = (MAX_COMMON_HEIGHT - HUMAN_HEIGHT) * 0.5;
            while step >= MIN_HEIGHT_STEP {
                if self.reach_at(from, to, radius, h + step) {
                    h += step;
                }
                step *= 0.5;
            }
            h
        };

        let step_height = self.scout.movement.max_step_height;
        let dz = to[2] - from[2];
        Some(ReachSpec {
            distance: vector_length(&vector_subtract(to, from)),
            collision_radius: radius,
            collision_height: height,
            jump_z: if dz > step_height { dz } else { 0.0 },
            drop_z: if -dz > step_height { -dz } else { 0.0 },
            reach_flags: ReachFlags::WALK,
            ..ReachSpec::default()
        })
    }

    /// Reachability for a Scout of the given size. Both points are human
    /// centers and are lifted so the larger box keeps its feet on the floor.
    fn reach_at(&mut self, from: &Vec3, to: &Vec3, radius: f32, height: f32) -> bool {
        let lift = height - HUMAN_HEIGHT;
        let from = [from[0], from[1], from[2] + lift];
        let to = [to[0], to[1], to[2] + lift];
        let mut sized = self.scout.with_extent(radius, height);
        sized.reachable_between(&from, &to)
    }
}

/// Clear the reach-spec table and every navigation point's lists.
pub fn undefine(level: &mut Level) {
    level.reach_specs.clear();
    for actor in &mut level.actors {
        if let Some(nav) = actor.nav.as_mut() {
            nav.clear_paths();
        }
    }
}

// ============================================================
// Tests
// ============================================================

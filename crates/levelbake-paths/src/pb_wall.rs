// pb_wall.rs — left-hand wall following tours
//
// A tour walks the Scout forward in fixed steps. Once it has run into
// something it keeps the wall on its left: a successful step to the left
// turns it around an outside corner (and drops a left-turn marker), a
// blocked step turns it clockwise until it can move again (and drops a
// right-turn marker). Yaw follows the right-handed convention, so a left
// turn adds 90 degrees.
//
// The tour stays tied to an anchor: its start, or the last beacon it left
// behind. Right-turn markers are scaffolding for the obstruction pass and
// never anchor anything. Once the anchor drops out of straight-line reach,
// an obstruction marker goes down where it was last reachable.

use levelbake_common::common::com_dprintf;
use levelbake_common::q_shared::*;

use crate::pb_marker::*;
use crate::pb_scout::*;

/// Sideways distance of the left-turn test move.
pub const LEFT_STEP: f32 = 24.0;
/// Angular step of a right turn.
pub const TURN_STEP: f32 = 30.0;
/// Right-turn markers closer than this to the previous one may be stair steps.
pub const STAIR_STEP_DIST: f32 = 32.0;
/// Rotation that must separate two visits before a tour's own marker ends it.
pub const CLOSING_YAW: f32 = 315.0;
/// Obstruction passes before giving up on a level that keeps adding markers.
pub const MAX_OBSTRUCTION_PASSES: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TourResult {
    pub steps: usize,
    pub left_turns: usize,
    pub right_turns: usize,
    /// Markers dropped because the anchor was no longer reachable.
    pub obstructions: usize,
    /// Ended on a marker or a full loop rather than a stall or the step limit.
    pub closed: bool,
}

/// Where the tour must stay connected to.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    location: Vec3,
}

pub struct WallFollower<'b, 'w, W: MoveOracle + ?Sized> {
    pub scout: &'b mut Scout<'w, W>,
    pub markers: &'b mut MarkerTable,
    pub max_steps: usize,
}

impl<'b, 'w, W: MoveOracle + ?Sized> WallFollower<'b, 'w, W> {
    pub fn new(scout: &'b mut Scout<'w, W>, markers: &'b mut MarkerTable) -> Self {
        Self {
            scout,
            markers,
            max_steps: 4096,
        }
    }

    /// Tour from the Scout's current location, initially heading `yaw`.
    /// `origin` is the marker the tour starts from, if any; it is never
    /// taken as the end of the tour.
    pub fn tour(&mut self, yaw: f32, origin: Option<usize>) -> TourResult {
        let mut result = TourResult::default();
        let start = self.scout.location;
        let mut yaw = yaw;
        let mut cum_yaw = 0.0f32;
        let mut following = origin.is_some();
        let mut own: Vec<(usize, f32)> = Vec::new();
        let mut last_right: Option<usize> = None;
        let mut anchor = Anchor { location: start };
        let mut last_good = start;
        if origin.is_none() {
            let dir = yaw_vector(yaw);
            if self.markers.touching_beacon(&start, &dir).is_none() {
                if let Some(i) = self.markers.add(PathMarker::new(start, dir, MarkerFlags::BEACON)) {
                    own.push((i, cum_yaw));
                }
            }
        }

        while result.steps < self.max_steps {
            result.steps += 1;
            let heading = yaw_vector(yaw);

            if self.closes_tour(&heading, origin, &own, cum_yaw) {
                result.closed = true;
                break;
            }
            if cum_yaw.abs() > 360.0 {
                let away = vector_subtract(&self.scout.location, &start);
                if dot_product(&heading, &away) > 0.0 {
                    result.closed = true;
                    break;
                }
            }

            if following {
                let saved = self.scout.location;
                let sidestep = vector_scale(&left_of(&heading), LEFT_STEP);
                match self.scout.walk_by(&sidestep).result {
                    WalkResult::Full => {
                        yaw += 90.0;
                        cum_yaw += 90.0;
                        result.left_turns += 1;
                        let dir = yaw_vector(yaw);
                        let loc = self.scout.location;
                        anchor.location = match self.markers.touching_beacon(&loc, &dir) {
                            Some(b) => self.markers[b].location,
                            None => {
                                let flags = MarkerFlags::LEFT_TURN | MarkerFlags::BEACON;
                                if let Some(i) = self.markers.add(PathMarker::new(loc, dir, flags)) {
                                    own.push((i, cum_yaw));
                                }
                                loc
                            }
                        };
                        last_good = loc;
                        continue;
                    }
                    WalkResult::Partial => {}
                    WalkResult::Blocked => self.scout.location = saved,
                }
            }

            let step = self.scout.walk_by(&vector_scale(&heading, MOVE_STEP));
            if step.result != WalkResult::Full {
                following = true;
                let turn_at = self.scout.location;
                let Some(new_yaw) = self.right_turn(yaw) else {
                    com_dprintf(&format!("tour stuck at {:?}\n", turn_at));
                    break;
                };
                cum_yaw += new_yaw - yaw;
                yaw = new_yaw;
                result.right_turns += 1;
                if let Some(i) = self.drop_right_marker(turn_at, yaw_vector(yaw), last_right) {
                    own.push((i, cum_yaw));
                    last_right = Some(i);
                }
            }

            if self.need_path(&mut anchor, &mut last_good, &heading, &mut own, cum_yaw) {
                result.obstructions += 1;
            }
        }
        if !result.closed {
            com_dprintf(&format!("tour from {:?} ended after {} steps\n", start, result.steps));
        }
        result
    }

    /// Touching a compatible marker that ends the tour.
    fn closes_tour(&self, heading: &Vec3, origin: Option<usize>, own: &[(usize, f32)], cum_yaw: f32) -> bool {
        let loc = self.scout.location;
        self.markers.markers.iter().enumerate().any(|(i, m)| {
            if Some(i) == origin || !m.touches(&loc) || !m.compatible(heading) {
                return false;
            }
            match own.iter().find(|(j, _)| *j == i) {
                Some((_, at)) => (cum_yaw - at).abs() >= CLOSING_YAW,
                None => true,
            }
        })
    }

    /// Rotate clockwise from `yaw` until a test step moves. `yaw` is first
    /// snapped to the nearest multiple of the turn step; the first candidate
    /// is one step clockwise of that.
    pub fn right_turn(&mut self, yaw: f32) -> Option<f32> {
        let mut candidate = (yaw / TURN_STEP).round() * TURN_STEP - TURN_STEP;
        for _ in 0..(360.0 / TURN_STEP) as usize {
            let saved = self.scout.location;
            let step = self.scout.walk_by(&vector_scale(&yaw_vector(candidate), MOVE_STEP));
            if step.result != WalkResult::Blocked {
                log::trace!("right turn {} -> {} at {:?}", yaw, candidate, saved);
                return Some(candidate);
            }
            self.scout.location = saved;
            candidate -= TURN_STEP;
        }
        None
    }

    fn drop_right_marker(&mut self, at: Vec3, dir: Vec3, last_right: Option<usize>) -> Option<usize> {
        if let Some(prev) = last_right {
            let p = self.markers[prev].location;
            // stair steps repeat the same turn a little higher or lower
            if vector_distance_2d(&p, &at) < STAIR_STEP_DIST
                && (p[2] - at[2]).abs() > 1.0
                && self.scout.reachable_between(&p, &at)
            {
                return None;
            }
        }
        if self.markers.touching(&at, &dir).is_some() {
            return None;
        }
        self.markers.add(PathMarker::new(at, dir, MarkerFlags::MARKED))
    }

    /// Left-turn markers near the Scout that it can reach.
    pub fn mark_left_reachable(&mut self) -> Vec<MarkerAnnotation> {
        let mut ann = self.markers.annotations();
        let loc = self.scout.location;
        for i in 0..self.markers.len() {
            let m = self.markers[i];
            if !m.is_left_turn() || vector_distance_2d(&m.location, &loc) > 2.0 * MAX_COMMON_RADIUS {
                continue;
            }
            ann[i].visible = self.scout.point_reachable(&m.location);
        }
        ann
    }

    /// Keep the tour connected: when the anchor can no longer be reached
    /// from here and no nearby beacon can stand in for it, drop a marker
    /// where it last could. Returns whether a marker was dropped.
    fn need_path(
        &mut self,
        anchor: &mut Anchor,
        last_good: &mut Vec3,
        heading: &Vec3,
        own: &mut Vec<(usize, f32)>,
        cum_yaw: f32,
    ) -> bool {
        let here = self.scout.location;
        if self.scout.point_reachable(&anchor.location) {
            *last_good = here;
            return false;
        }

        let ann = self.mark_left_reachable();
        if let Some(i) = (0..ann.len()).find(|&i| ann[i].visible && self.markers[i].is_beacon()) {
            anchor.location = self.markers[i].location;
            *last_good = here;
            return false;
        }

        let mut flags = MarkerFlags::LEFT_TURN | MarkerFlags::BEACON | MarkerFlags::MARKED;
        if (last_good[2] - anchor.location[2]).abs() > 2.0 * self.scout.movement.max_step_height {
            flags |= MarkerFlags::STAIR;
        }
        let dropped = self.markers.add(PathMarker::new(*last_good, *heading, flags));
        if let Some(i) = dropped {
            own.push((i, cum_yaw));
        }
        com_dprintf(&format!("obstruction marker at {:?}\n", last_good));
        anchor.location = *last_good;
        *last_good = here;
        dropped.is_some()
    }

    /// Re-tour from markers that were dropped other than by a clean left
    /// turn. Level 0 makes one pass, level 1 repeats until no such marker
    /// remains, level 2 repeats but only re-tours markers that are not left
    /// turns. Returns the number of tours run.
    pub fn obstruction_pass(&mut self, optimization: u32) -> usize {
        let mut tours = 0;
        let mut passes = 0;
        loop {
            let pending = self.markers.with_flags(MarkerFlags::MARKED);
            if pending.is_empty() {
                break;
            }
            if passes >= MAX_OBSTRUCTION_PASSES {
                com_dprintf(&format!("{} markers left unmapped\n", pending.len()));
                break;
            }
            passes += 1;

            for i in pending {
                if !self.markers[i].flags.contains(MarkerFlags::MARKED) {
                    continue;
                }
                self.markers[i].flags.remove(MarkerFlags::MARKED);
                let m = self.markers[i];
                if optimization >= 2 && m.is_left_turn() {
                    continue;
                }
                if !self.scout.teleport(&m.location) {
                    com_dprintf(&format!("cannot re-walk marker {} at {:?}\n", i, m.location));
                    continue;
                }
                self.tour(vectoyaw(&m.direction), Some(i));
                tours += 1;
            }
            if optimization == 0 {
                break;
            }
        }
        self.markers.clear_flags(MarkerFlags::MARKED);
        tours
    }
}

// ============================================================
// Tests
// ============================================================

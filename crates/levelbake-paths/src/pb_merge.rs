// pb_merge.rs — collapsing redundant left-turn markers
//
// Two nearby left-turn markers may be replaced by one spot when every beacon
// either of them could reach stays reachable from that spot. Beacons are
// reachability witnesses only; a marker loses its beacon role when it is
// merged away.

use levelbake_common::common::{com_dprintf, com_warnf};
use levelbake_common::q_shared::*;

use crate::pb_marker::*;
use crate::pb_scout::*;

/// Spacing of merge candidates along the bisector.
pub const MERGE_STEP: f32 = 6.5;
/// Intermediate beacons a detour may pass through.
pub const PATH_BUDGET: i32 = 3;
/// Smallest offset step tried when pushing a marker off its corner.
pub const MIN_ADJUST_STEP: f32 = 2.0;

const NO_SKIP: (usize, usize) = (usize::MAX, usize::MAX);

/// A merge as it was made: both markers' locations before it, and the spot
/// the survivor moved to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeRecord {
    pub keep: usize,
    pub gone: usize,
    pub from: [Vec3; 2],
    pub spot: Vec3,
}

pub struct MarkerMerger<'b, 'w, W: MoveOracle + ?Sized> {
    pub scout: &'b mut Scout<'w, W>,
    pub markers: &'b mut MarkerTable,
    pub max_common_radius: f32,
    /// Re-check every merge right after it is made and undo the ones that
    /// lost a beacon.
    pub verify: bool,
    pub merged: Vec<MergeRecord>,
    /// Merges undone by verification.
    pub undone: usize,
    ann: Vec<MarkerAnnotation>,
}

impl<'b, 'w, W: MoveOracle + ?Sized> MarkerMerger<'b, 'w, W> {
    pub fn new(scout: &'b mut Scout<'w, W>, markers: &'b mut MarkerTable, max_common_radius: f32) -> Self {
        Self {
            scout,
            markers,
            max_common_radius,
            verify: false,
            merged: Vec::new(),
            undone: 0,
            ann: Vec::new(),
        }
    }

    fn reach(&mut self, from: &Vec3, to: &Vec3) -> bool {
        self.scout.reachable_between(from, to)
    }

    fn reach_at(&mut self, from: &Vec3, to: &Vec3, radius: f32) -> bool {
        if radius <= HUMAN_RADIUS {
            return self.scout.reachable_between(from, to);
        }
        let mut big = self.scout.with_extent(radius, HUMAN_HEIGHT);
        big.reachable_between(from, to)
    }

    fn strip(&mut self, i: usize) {
        self.markers[i].flags.remove(MarkerFlags::LEFT_TURN | MarkerFlags::BEACON);
    }

    // ============================================================
    // Pre-merge
    // ============================================================

    /// Absorb left-turn markers touching another one they can walk to and
    /// from. Returns the number absorbed.
    pub fn premerge(&mut self) -> usize {
        let lefts = self.markers.with_flags(MarkerFlags::LEFT_TURN);
        let mut absorbed = 0;
        for (a, &i) in lefts.iter().enumerate() {
            for &j in &lefts[a + 1..] {
                if !self.markers[i].is_left_turn() {
                    break;
                }
                let (mi, mj) = (self.markers[i], self.markers[j]);
                if !mj.is_left_turn() || !mi.touches(&mj.location) {
                    continue;
                }
                if mi.is_permanent() && mj.is_permanent() {
                    continue;
                }
                if !self.reach(&mi.location, &mj.location) || !self.reach(&mj.location, &mi.location) {
                    continue;
                }
                let gone = if mi.is_permanent() || !mj.is_permanent() { j } else { i };
                self.strip(gone);
                absorbed += 1;
            }
        }
        absorbed
    }

    // ============================================================
    // Adjust
    // ============================================================

    /// Push every movable left-turn marker away from its corner.
    pub fn adjust_all(&mut self) -> usize {
        let lefts = self.markers.with_flags(MarkerFlags::LEFT_TURN);
        lefts.into_iter().filter(|&i| self.adjust_path(i)).count()
    }

    /// Bisect the largest offset, forward and to the right of the marker's
    /// heading, at which the marker keeps its connections. Returns whether
    /// the marker moved.
    pub fn adjust_path(&mut self, i: usize) -> bool {
        let m = self.markers[i];
        if m.is_permanent() || !m.is_left_turn() {
            return false;
        }
        let max_offset = self.max_common_radius - HUMAN_RADIUS;
        if max_offset < MIN_ADJUST_STEP {
            return false;
        }
        let mut out = vector_add(&m.direction, &right_of(&m.direction));
        out[2] = 0.0;
        if vector_normalize(&mut out) == 0.0 {
            return false;
        }

        let mut visible = Vec::new();
        for k in 0..self.markers.len() {
            let loc = self.markers[k].location;
            if k != i && self.markers[k].is_beacon() && self.reach(&m.location, &loc) {
                visible.push(k);
            }
        }

        let mut best = 0.0;
        let mut offset = max_offset;
        let mut step = max_offset * 0.5;
        loop {
            let spot = vector_ma(&m.location, offset, &out);
            if self.adjust_ok(&m.location, &spot, &visible) {
                best = offset;
                if offset >= max_offset {
                    break;
                }
                offset += step;
            } else {
                offset -= step;
            }
            if step < MIN_ADJUST_STEP {
                break;
            }
            step *= 0.5;
        }
        if best <= 0.0 {
            return false;
        }
        let marker = &mut self.markers[i];
        marker.location = vector_ma(&m.location, best, &out);
        marker.radius = HUMAN_RADIUS + best;
        true
    }

    fn adjust_ok(&mut self, orig: &Vec3, spot: &Vec3, visible: &[usize]) -> bool {
        if !self.scout.fits(spot) || !self.reach(orig, spot) || !self.reach(spot, orig) {
            return false;
        }
        for &k in visible {
            let loc = self.markers[k].location;
            if !self.reach(spot, &loc) {
                return false;
            }
        }
        true
    }

    // ============================================================
    // Merge
    // ============================================================

    /// Merge left-turn pairs closer than twice the largest common radius.
    /// Returns the number of merges.
    pub fn merge(&mut self) -> usize {
        let limit = 4.0 * self.max_common_radius * self.max_common_radius;
        let lefts = self.markers.with_flags(MarkerFlags::LEFT_TURN);
        let mut merges = 0;
        for (a, &i) in lefts.iter().enumerate() {
            for &j in &lefts[a + 1..] {
                if !self.markers[i].is_left_turn() {
                    break;
                }
                if !self.markers[j].is_left_turn() {
                    continue;
                }
                if vector_distance_squared(&self.markers[i].location, &self.markers[j].location) >= limit {
                    continue;
                }
                if self.try_merge(i, j) {
                    merges += 1;
                }
            }
        }
        merges
    }

    /// Replace markers `i` and `j` by one spot if a safe one exists.
    pub fn try_merge(&mut self, i: usize, j: usize) -> bool {
        let (mi, mj) = (self.markers[i], self.markers[j]);
        if mi.is_permanent() && mj.is_permanent() {
            return false;
        }
        let big_radius = mi.radius.max(mj.radius);
        self.mark_reachable_from_two(i, j, big_radius);

        let candidates = if mi.is_permanent() {
            vec![mi.location]
        } else if mj.is_permanent() {
            vec![mj.location]
        } else {
            merge_candidates(&mi.location, &mj.location, self.max_common_radius)
        };

        for spot in candidates {
            if !self.check_merge_spot(i, j, &spot, big_radius) {
                continue;
            }
            let (keep, gone) = if mj.is_permanent() { (j, i) } else { (i, j) };
            let before = (self.markers[keep], self.markers[gone]);
            self.markers[keep].location = spot;
            self.markers[keep].radius = mi.radius.min(mj.radius);
            self.strip(gone);
            if self.verify && !self.verify_merge(&mi.location, &mj.location, &spot) {
                self.markers[keep] = before.0;
                self.markers[gone] = before.1;
                self.undone += 1;
                com_warnf(&format!("undid merge of markers {} and {} at {:?}\n", i, j, spot));
                continue;
            }
            self.merged.push(MergeRecord {
                keep,
                gone,
                from: [mi.location, mj.location],
                spot,
            });
            com_dprintf(&format!("merged markers {} and {} at {:?}\n", i, j, spot));
            return true;
        }
        false
    }

    /// Annotate beacons reachable from either marker at human radius, and
    /// left turns reachable at `big_radius`.
    pub fn mark_reachable_from_two(&mut self, i: usize, j: usize, big_radius: f32) {
        self.ann = self.markers.annotations();
        let (li, lj) = (self.markers[i].location, self.markers[j].location);
        for k in 0..self.markers.len() {
            if k == i || k == j {
                continue;
            }
            let m = self.markers[k];
            if m.is_beacon() {
                self.ann[k].visible = self.reach(&li, &m.location) || self.reach(&lj, &m.location);
            }
            if m.is_left_turn() && big_radius > HUMAN_RADIUS {
                self.ann[k].bigvisible =
                    self.reach_at(&li, &m.location, big_radius) || self.reach_at(&lj, &m.location, big_radius);
            }
        }
    }

    /// Whether `spot` can stand in for both markers.
    pub fn check_merge_spot(&mut self, i: usize, j: usize, spot: &Vec3, big_radius: f32) -> bool {
        if !self.scout.fits(spot) {
            return false;
        }
        for orig in [self.markers[i].location, self.markers[j].location] {
            if !self.reach(&orig, spot) || !self.reach(spot, &orig) {
                return false;
            }
        }
        for k in 0..self.ann.len() {
            let loc = self.markers[k].location;
            if self.ann[k].visible && !self.reach(spot, &loc) {
                self.reset_budgets();
                if !self.find_path_to(spot, k, PATH_BUDGET, (i, j)) {
                    return false;
                }
            }
            if self.ann[k].bigvisible && !self.reach_at(spot, &loc, big_radius) {
                return false;
            }
        }
        true
    }

    fn reset_budgets(&mut self) {
        self.ann.resize(self.markers.len(), MarkerAnnotation::default());
        for a in &mut self.ann {
            a.budget = 0;
        }
    }

    /// Reach beacon `target` from `from` through at most `budget` other
    /// beacons, never through the markers in `skip`.
    fn find_path_to(&mut self, from: &Vec3, target: usize, budget: i32, skip: (usize, usize)) -> bool {
        if budget <= 0 {
            return false;
        }
        for k in 0..self.markers.len() {
            if k == target || k == skip.0 || k == skip.1 || !self.markers[k].is_beacon() {
                continue;
            }
            if self.ann[k].budget >= budget {
                continue;
            }
            self.ann[k].budget = budget;
            if self.try_path_through(from, k, target, budget, skip) {
                return true;
            }
        }
        false
    }

    fn try_path_through(&mut self, from: &Vec3, via: usize, target: usize, budget: i32, skip: (usize, usize)) -> bool {
        let v = self.markers[via].location;
        if !self.reach(from, &v) {
            return false;
        }
        let t = self.markers[target].location;
        self.reach(&v, &t) || self.find_path_to(&v, target, budget - 1, skip)
    }

    /// Exhaustive check that every beacon reachable from either original
    /// location is still reachable from `spot`, directly or through other
    /// surviving beacons.
    pub fn verify_merge(&mut self, orig_i: &Vec3, orig_j: &Vec3, spot: &Vec3) -> bool {
        for k in 0..self.markers.len() {
            let m = self.markers[k];
            if !m.is_beacon() || m.location == *spot {
                continue;
            }
            if !self.reach(orig_i, &m.location) && !self.reach(orig_j, &m.location) {
                continue;
            }
            if self.reach(spot, &m.location) {
                continue;
            }
            self.reset_budgets();
            if !self.find_path_to(spot, k, PATH_BUDGET, NO_SKIP) {
                com_dprintf(&format!("merge at {:?} lost beacon {}\n", spot, k));
                return false;
            }
        }
        true
    }
}

/// Midpoint, then both ways along the perpendicular bisector, then each end.
pub fn merge_candidates(a: &Vec3, b: &Vec3, max_common_radius: f32) -> Vec<Vec3> {
    let mid = vector_lerp(a, b, 0.5);
    let mut perp = left_of(&vector_subtract(b, a));
    vector_normalize(&mut perp);

    let mut out = vec![mid];
    let mut k = 1.0;
    while MERGE_STEP * k <= max_common_radius {
        out.push(vector_ma(&mid, MERGE_STEP * k, &perp));
        out.push(vector_ma(&mid, -MERGE_STEP * k, &perp));
        k += 1.0;
    }
    out.push(*a);
    out.push(*b);
    out
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::box_world::BoxWorld;

    fn open_room() -> BoxWorld {
        BoxWorld::room([0.0; 3], [1024.0, 512.0, 256.0])
    }

    fn floor_z(world: &BoxWorld) -> f32 {
        let mut scout = Scout::new(world);
        assert!(scout.find_start(&[100.0, 100.0, 40.0]));
        scout.location[2]
    }

    fn left(table: &mut MarkerTable, x: f32, y: f32, z: f32) -> usize {
        let flags = MarkerFlags::LEFT_TURN | MarkerFlags::BEACON;
        table.add(PathMarker::new([x, y, z], [1.0, 0.0, 0.0], flags)).unwrap()
    }

    #[test]
    fn test_merge_keeps_beacons_reachable() {
        let world = open_room();
        let z = floor_z(&world);
        let mut table = MarkerTable::new();
        let a = left(&mut table, 200.0, 200.0, z);
        let b = left(&mut table, 240.0, 200.0, z);
        table.add(PathMarker::new([300.0, 100.0, z], [1.0, 0.0, 0.0], MarkerFlags::BEACON));
        table.add(PathMarker::new([700.0, 100.0, z], [1.0, 0.0, 0.0], MarkerFlags::BEACON));
        let (orig_a, orig_b) = (table[a].location, table[b].location);

        let mut scout = Scout::new(&world);
        let mut merger = MarkerMerger::new(&mut scout, &mut table, MAX_COMMON_RADIUS);
        merger.verify = true;
        assert_eq!(merger.merge(), 1);
        assert_eq!(merger.undone, 0);
        let spot = merger.markers[a].location;
        assert_eq!(spot, [220.0, 200.0, z]);
        assert_eq!(
            merger.merged,
            vec![MergeRecord {
                keep: a,
                gone: b,
                from: [orig_a, orig_b],
                spot,
            }]
        );
        assert!(merger.verify_merge(&orig_a, &orig_b, &spot));
        assert!(!table[b].is_left_turn() && !table[b].is_beacon());
        assert_eq!(table.count(MarkerFlags::LEFT_TURN), 1);
    }

    #[test]
    fn test_permanent_marker_does_not_move() {
        let world = open_room();
        let z = floor_z(&world);
        let mut table = MarkerTable::new();
        let a = left(&mut table, 200.0, 200.0, z);
        let p = table.add_permanent([240.0, 200.0, z], 0.0).unwrap();
        let q = table.add_permanent([600.0, 200.0, z], 0.0).unwrap();

        let mut scout = Scout::new(&world);
        let mut merger = MarkerMerger::new(&mut scout, &mut table, MAX_COMMON_RADIUS);
        assert!(merger.try_merge(a, p));
        assert!(!merger.try_merge(p, q));
        assert_eq!(table[p].location, [240.0, 200.0, z]);
        assert!(!table[a].is_left_turn());
        assert_eq!(table[q].location, [600.0, 200.0, z]);
    }

    #[test]
    fn test_merge_refused_around_a_corner() {
        let world = BoxWorld::room_with_divider([0.0; 3], [1024.0, 512.0, 256.0], 480.0, 544.0, 320.0);
        let z = floor_z(&world);
        let mut table = MarkerTable::new();
        let a = left(&mut table, 538.03, 338.03, z);
        let b = left(&mut table, 458.03, 314.03, z);

        let mut scout = Scout::new(&world);
        let mut merger = MarkerMerger::new(&mut scout, &mut table, MAX_COMMON_RADIUS);
        assert_eq!(merger.merge(), 0);
        assert!(table[a].is_left_turn() && table[b].is_left_turn());
    }

    #[test]
    fn test_premerge_absorbs_touching_markers() {
        let world = open_room();
        let z = floor_z(&world);
        let mut table = MarkerTable::new();
        let a = left(&mut table, 300.0, 300.0, z);
        let b = left(&mut table, 310.0, 300.0, z);
        let c = left(&mut table, 500.0, 300.0, z);

        let mut scout = Scout::new(&world);
        assert_eq!(MarkerMerger::new(&mut scout, &mut table, MAX_COMMON_RADIUS).premerge(), 1);
        assert!(table[a].is_left_turn());
        assert!(!table[b].is_left_turn());
        assert!(table[c].is_left_turn());
    }

    #[test]
    fn test_adjust_pushes_off_corner() {
        let world = BoxWorld::room_with_divider([0.0; 3], [1024.0, 512.0, 256.0], 480.0, 544.0, 320.0);
        let z = floor_z(&world);
        let mut table = MarkerTable::new();
        let flags = MarkerFlags::LEFT_TURN | MarkerFlags::BEACON;
        let a = table.add(PathMarker::new([538.03, 338.03, z], [-1.0, 0.0, 0.0], flags)).unwrap();

        let mut scout = Scout::new(&world);
        let mut merger = MarkerMerger::new(&mut scout, &mut table, MAX_COMMON_RADIUS);
        assert!(merger.adjust_path(a));
        let m = table[a];
        assert!(m.location[0] < 538.03 && m.location[1] > 338.03);
        assert!(m.radius > HUMAN_RADIUS && m.radius <= MAX_COMMON_RADIUS);
    }

    #[test]
    fn test_merge_candidates_order() {
        let c = merge_candidates(&[0.0, 0.0, 0.0], &[40.0, 0.0, 0.0], MAX_COMMON_RADIUS);
        assert_eq!(c[0], [20.0, 0.0, 0.0]);
        assert_eq!(c[1], [20.0, MERGE_STEP, 0.0]);
        assert_eq!(c[2], [20.0, -MERGE_STEP, 0.0]);
        assert_eq!(c.len(), 1 + 2 * 10 + 2);
        assert_eq!(c[c.len() - 2], [0.0, 0.0, 0.0]);
    }
}

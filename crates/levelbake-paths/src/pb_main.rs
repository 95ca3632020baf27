// pb_main.rs — path build entry points and options

use levelbake_common::check;
use levelbake_common::common::{com_dprintf, com_printf, SlowTask};
use levelbake_common::cvar::CvarContext;
use levelbake_common::error::BuildResult;
use levelbake_common::level::{ActorKind, Level};
use levelbake_common::q_shared::*;

use crate::pb_marker::*;
use crate::pb_merge::MarkerMerger;
use crate::pb_reach::{undefine, ReachSpecBuilder, ReachStats};
use crate::pb_scout::*;
use crate::pb_wall::WallFollower;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathBuildOptions {
    /// Obstruction pass strategy, 0 to 2.
    pub optimization: u32,
    pub max_common_radius: f32,
    /// Pairs farther apart get no reach spec.
    pub max_dist: f32,
    /// Push left-turn markers away from their corners.
    pub adjust: bool,
    /// Re-check every merge against the beacons it could see.
    pub verify_merges: bool,
}

impl Default for PathBuildOptions {
    fn default() -> Self {
        Self {
            optimization: 1,
            max_common_radius: MAX_COMMON_RADIUS,
            max_dist: 1000.0,
            adjust: true,
            verify_merges: false,
        }
    }
}

impl PathBuildOptions {
    pub fn from_cvars(cvars: &mut CvarContext) -> Self {
        let optimization = cvars.value_or_default("paths_optimization", "1").clamp(0.0, 2.0) as u32;
        Self {
            optimization,
            max_common_radius: cvars.value_or_default("paths_maxcommonradius", "70").max(HUMAN_RADIUS),
            max_dist: cvars.value_or_default("paths_maxdist", "1000"),
            adjust: cvars.value_or_default("paths_adjust", "1") != 0.0,
            verify_merges: cvars.value_or_default("paths_verifymerges", "0") != 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathBuildStats {
    pub markers: usize,
    pub tours: usize,
    pub merges: usize,
    /// Merges undone because verification found a lost beacon.
    pub unsafe_merges: usize,
    pub nodes_placed: usize,
    pub specs: usize,
    pub overflows: usize,
}

// ============================================================
// Path node emitter
// ============================================================

pub struct PathNodeEmitter;

impl PathNodeEmitter {
    /// Spawn an auto-placed PathNode for every surviving left-turn marker
    /// that does not already stand for a designer node.
    pub fn emit(level: &mut Level, markers: &MarkerTable) -> usize {
        let mut placed = 0;
        for m in &markers.markers {
            if !m.is_left_turn() || m.is_permanent() {
                continue;
            }
            let i = level.spawn(ActorKind::PathNode, m.location);
            let actor = &mut level.actors[i];
            actor.yaw = vectoyaw(&m.direction);
            if let Some(nav) = actor.nav.as_mut() {
                nav.auto_placed = true;
            }
            placed += 1;
        }
        placed
    }
}

// ============================================================
// Build
// ============================================================

/// Working state of one path build.
struct BuildContext<'l, 'w, W: MoveOracle + ?Sized> {
    level: &'l mut Level,
    scout: Scout<'w, W>,
    markers: MarkerTable,
    options: PathBuildOptions,
}

impl<'l, 'w, W: MoveOracle + ?Sized> BuildContext<'l, 'w, W> {
    fn seed_permanent(&mut self) -> BuildResult<()> {
        for i in self.level.path_nodes() {
            let actor = &self.level.actors[i];
            check!(State, actor.nav.is_some(), "path node {} has no navigation data", actor.name);
            let (location, yaw) = (actor.location, actor.yaw);
            if self.scout.find_start(&location) {
                self.markers.add_permanent(self.scout.location, yaw);
            } else {
                com_dprintf(&format!("path node {} is not standing on anything\n", self.level.actors[i].name));
            }
        }
        Ok(())
    }

    /// Tour from every actor that is not itself part of the path network.
    fn tour_actors(&mut self) -> usize {
        let starts: Vec<(Vec3, f32)> = self
            .level
            .alive()
            .filter(|(_, a)| !matches!(a.kind, ActorKind::PathNode | ActorKind::Scout))
            .map(|(_, a)| (a.location, a.yaw))
            .collect();

        let mut tours = 0;
        for (location, yaw) in starts {
            if !self.scout.find_start(&location) {
                continue;
            }
            WallFollower::new(&mut self.scout, &mut self.markers).tour(yaw, None);
            tours += 1;
        }
        tours
    }

    fn run(&mut self) -> BuildResult<PathBuildStats> {
        let mut stats = PathBuildStats::default();
        let mut task = SlowTask::begin("Building paths");

        self.seed_permanent()?;
        stats.tours = self.tour_actors();
        task.update(1, 5);

        stats.tours += WallFollower::new(&mut self.scout, &mut self.markers).obstruction_pass(self.options.optimization);
        task.update(2, 5);

        let mut merger = MarkerMerger::new(&mut self.scout, &mut self.markers, self.options.max_common_radius);
        merger.verify = self.options.verify_merges;
        stats.merges = merger.premerge();
        if self.options.adjust {
            merger.adjust_all();
        }
        stats.merges += merger.merge();
        stats.unsafe_merges = merger.undone;
        task.update(3, 5);

        stats.markers = self.markers.len();
        stats.nodes_placed = PathNodeEmitter::emit(self.level, &self.markers);
        task.update(4, 5);

        let reach = ReachSpecBuilder::new(&mut self.scout, self.options.max_dist).define_all(self.level);
        stats.specs = reach.specs;
        stats.overflows = reach.overflows;
        task.end();

        for spec in &self.level.reach_specs {
            let ends_alive = [spec.start, spec.end]
                .iter()
                .all(|&i| self.level.actors.get(i).map_or(false, |a| a.is_alive() && a.nav.is_some()));
            check!(Output, ends_alive, "reach spec {} -> {} has a dead end", spec.start, spec.end);
        }
        Ok(stats)
    }
}

/// Rebuild the path network: drop earlier auto-placed nodes, tour the level,
/// place new nodes and define reach specs between all navigation points.
pub fn build_paths<W: MoveOracle + ?Sized>(
    level: &mut Level,
    world: &W,
    options: &PathBuildOptions,
) -> BuildResult<PathBuildStats> {
    undefine_paths(level);
    remove_paths(level);

    let mut ctx = BuildContext {
        level,
        scout: Scout::new(world),
        markers: MarkerTable::new(),
        options: *options,
    };
    let stats = ctx.run()?;
    com_printf(&format!(
        "{} markers, {} merges, {} nodes placed, {} reach specs ({} dropped)\n",
        stats.markers, stats.merges, stats.nodes_placed, stats.specs, stats.overflows
    ));
    Ok(stats)
}

/// Define reach specs for the navigation points already in the level.
pub fn define_paths<W: MoveOracle + ?Sized>(level: &mut Level, world: &W, max_dist: f32) -> ReachStats {
    let mut scout = Scout::new(world);
    ReachSpecBuilder::new(&mut scout, max_dist).define_all(level)
}

pub fn undefine_paths(level: &mut Level) {
    undefine(level);
}

/// Destroy auto-placed path nodes; designer nodes stay. Returns how many
/// were removed.
pub fn remove_paths(level: &mut Level) -> usize {
    let auto: Vec<usize> = level
        .path_nodes()
        .into_iter()
        .filter(|&i| level.actors[i].nav.as_ref().map_or(false, |n| n.auto_placed))
        .collect();
    for &i in &auto {
        level.destroy(i);
    }
    auto.len()
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::box_world::BoxWorld;

    fn fixed() -> PathBuildOptions {
        PathBuildOptions {
            adjust: false,
            ..PathBuildOptions::default()
        }
    }

    #[test]
    fn test_convex_room_places_no_nodes() {
        let world = BoxWorld::room([0.0; 3], [512.0, 512.0, 256.0]);
        let mut level = Level::default();
        level.spawn(ActorKind::PlayerStart, [256.0, 256.0, 40.0]);
        let stats = build_paths(&mut level, &world, &PathBuildOptions::default()).unwrap();
        assert_eq!(stats.nodes_placed, 0);
        assert_eq!(stats.specs, 0);
        assert!(level.path_nodes().is_empty());
    }

    fn divider_room() -> BoxWorld {
        BoxWorld::room_with_divider([0.0; 3], [1024.0, 512.0, 256.0], 480.0, 544.0, 320.0)
    }

    fn node_near(level: &Level, x: f32, y: f32) -> usize {
        let found = level.path_nodes().into_iter().find(|&n| {
            let at = level.actors[n].location;
            (at[0] - x).abs() < 1.0 && (at[1] - y).abs() < 1.0
        });
        found.unwrap_or_else(|| panic!("no path node near ({}, {})", x, y))
    }

    /// Navigation points reachable from `from` by following reach specs.
    fn reached_from(level: &Level, from: usize) -> Vec<usize> {
        let mut seen = vec![from];
        let mut todo = vec![from];
        while let Some(i) = todo.pop() {
            for spec in level.paths_from(i) {
                if !seen.contains(&spec.end) {
                    seen.push(spec.end);
                    todo.push(spec.end);
                }
            }
        }
        seen
    }

    fn assert_connected(level: &Level) {
        let points = level.navigation_points();
        for &p in &points {
            let nav = level.actors[p].nav.as_ref().unwrap();
            assert!(!nav.paths.is_empty(), "{} has no outgoing spec", level.actors[p].name);
            assert!(!nav.upstream_paths.is_empty(), "{} has no incoming spec", level.actors[p].name);
        }
        for &p in &points {
            assert_eq!(reached_from(level, p).len(), points.len(), "not everything reachable from {}", p);
        }
    }

    #[test]
    fn test_divider_room_places_corner_nodes() {
        let world = divider_room();
        let mut level = Level::default();
        let start = level.spawn(ActorKind::PlayerStart, [200.0, 450.0, 40.0]);
        let stats = build_paths(&mut level, &world, &fixed()).unwrap();
        assert_eq!(stats.merges, 0);
        // both ends of the divider, plus one beacon on the east wall and one
        // on the north wall where the start drops out of sight
        assert_eq!(stats.nodes_placed, 4);

        let nodes = level.path_nodes();
        assert_eq!(nodes.len(), 4);
        for &n in &nodes {
            assert!(level.actors[n].nav.as_ref().unwrap().auto_placed);
            assert!(level.paths_from(start).iter().any(|s| s.end == n));
        }
        // the corner nodes cannot see each other
        let (a, b) = (node_near(&level, 538.03, 338.0), node_near(&level, 458.03, 314.0));
        assert!(!level.paths_from(a).iter().any(|s| s.end == b));
        assert!(!level.paths_from(b).iter().any(|s| s.end == a));
        node_near(&level, 1005.97, 210.0);
        node_near(&level, 482.03, 493.97);
        assert_connected(&level);
    }

    #[test]
    fn test_both_sides_of_the_divider_connect() {
        for options in [fixed(), PathBuildOptions::default()] {
            let world = divider_room();
            let mut level = Level::default();
            let start = level.spawn(ActorKind::PlayerStart, [200.0, 450.0, 40.0]);
            let pickup = level.spawn(ActorKind::Pickup, [800.0, 100.0, 40.0]);
            build_paths(&mut level, &world, &options).unwrap();
            assert_connected(&level);
            assert!(reached_from(&level, start).contains(&pickup));
            assert!(reached_from(&level, pickup).contains(&start));
        }
    }

    #[test]
    fn test_pipeline_merges_keep_beacons() {
        let world = divider_room();
        let mut level = Level::default();
        level.spawn(ActorKind::PlayerStart, [200.0, 450.0, 40.0]);
        level.spawn(ActorKind::Pickup, [800.0, 100.0, 40.0]);
        let options = PathBuildOptions {
            verify_merges: true,
            ..PathBuildOptions::default()
        };
        let stats = build_paths(&mut level, &world, &options).unwrap();
        // the pushed-out divider corners fold into one node
        assert!(stats.merges >= 1);
        assert_eq!(stats.unsafe_merges, 0);
        assert_eq!(stats.nodes_placed + stats.merges, 4);
        assert_connected(&level);
    }

    #[test]
    fn test_path_node_without_nav_is_rejected() {
        let world = divider_room();
        let mut level = Level::default();
        level.spawn(ActorKind::PlayerStart, [200.0, 450.0, 40.0]);
        let node = level.spawn(ActorKind::PathNode, [800.0, 300.0, 40.0]);
        level.actors[node].nav = None;
        let err = build_paths(&mut level, &world, &fixed()).unwrap_err();
        assert_eq!(err.kind(), levelbake_common::error::CheckKind::State);
    }

    #[test]
    fn test_rebuild_replaces_auto_nodes() {
        let world = divider_room();
        let mut level = Level::default();
        level.spawn(ActorKind::PlayerStart, [200.0, 450.0, 40.0]);
        let designer = level.spawn(ActorKind::PathNode, [800.0, 300.0, 40.0]);
        let first = build_paths(&mut level, &world, &fixed()).unwrap();
        let second = build_paths(&mut level, &world, &fixed()).unwrap();
        assert_eq!(first.nodes_placed, second.nodes_placed);
        assert_eq!(level.path_nodes().len(), 1 + second.nodes_placed);
        assert!(level.actors[designer].is_alive());

        undefine_paths(&mut level);
        assert!(level.reach_specs.is_empty());
        assert_eq!(remove_paths(&mut level), second.nodes_placed);
        assert_eq!(level.path_nodes(), vec![designer]);
        let reach = define_paths(&mut level, &world, 1000.0);
        assert_eq!(reach.specs, 2);
    }

    #[test]
    fn test_options_from_cvars() {
        let mut cvars = CvarContext::new();
        assert_eq!(PathBuildOptions::from_cvars(&mut cvars), PathBuildOptions::default());
        cvars.set("paths_optimization", "7");
        cvars.set("paths_adjust", "0");
        cvars.set("paths_maxdist", "512");
        cvars.set("paths_verifymerges", "1");
        let options = PathBuildOptions::from_cvars(&mut cvars);
        assert_eq!(options.optimization, 2);
        assert!(options.verify_merges);
        assert!(!options.adjust);
        assert_eq!(options.max_dist, 512.0);
    }

    #[test]
    fn test_emitter_skips_permanent_and_absorbed() {
        let mut level = Level::default();
        let mut table = MarkerTable::new();
        let lt = MarkerFlags::LEFT_TURN | MarkerFlags::BEACON;
        table.add(PathMarker::new([10.0, 0.0, 40.0], [0.0, 1.0, 0.0], lt));
        table.add(PathMarker::new([20.0, 0.0, 40.0], [1.0, 0.0, 0.0], MarkerFlags::MARKED));
        table.add_permanent([30.0, 0.0, 40.0], 0.0);
        assert_eq!(PathNodeEmitter::emit(&mut level, &table), 1);
        let node = &level.actors[0];
        assert_eq!(node.kind, ActorKind::PathNode);
        assert!((node.yaw - 90.0).abs() < 1e-3);
        assert!(node.nav.as_ref().unwrap().auto_placed);
    }
}

// zb_main.rs — zone build entry point and options

use levelbake_common::common::{com_error, com_printf, SlowTask, ERR_DROP, ERR_FATAL};
use levelbake_common::cvar::CvarContext;
use levelbake_common::error::BuildResult;
use levelbake_common::level::Level;

use crate::zb_bounds::BoundsBuilder;
use crate::zb_portal::PortalGraph;
use crate::zb_vis::{apply_zone_visibility, build_visibility, VisibilityMatrix};
use crate::zb_zone::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneBuildOptions {
    /// Visibility rows per zone instead of per leaf.
    pub vis_by_zone: bool,
    pub build_bounds: bool,
    pub build_vis: bool,
}

impl Default for ZoneBuildOptions {
    fn default() -> Self {
        Self {
            vis_by_zone: false,
            build_bounds: true,
            build_vis: true,
        }
    }
}

impl ZoneBuildOptions {
    pub fn from_cvars(cvars: &mut CvarContext) -> Self {
        Self {
            vis_by_zone: cvars.value_or_default("zone_vis_byzone", "0") != 0.0,
            build_bounds: cvars.value_or_default("zone_build_bounds", "1") != 0.0,
            build_vis: cvars.value_or_default("zone_build_vis", "1") != 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneBuildStats {
    pub portals: usize,
    pub blocked: usize,
    pub leaves: usize,
    pub zones: usize,
    /// Coplanar fragments added for multi-zone polygons.
    pub fragments: usize,
    pub visible_pairs: usize,
    pub bounds: usize,
    pub hulls: usize,
}

/// Run the whole zone pipeline on a level.
pub fn build_zones(level: &mut Level, options: &ZoneBuildOptions) -> BuildResult<(ZoneBuildStats, Option<VisibilityMatrix>)> {
    match build_zones2(level, options) {
        Ok(r) => Ok(r),
        Err(e) => {
            let code = if e.is_vital() { ERR_FATAL } else { ERR_DROP };
            com_error(code, &format!("zone build failed: {}\n", e));
            Err(e)
        }
    }
}

fn build_zones2(level: &mut Level, options: &ZoneBuildOptions) -> BuildResult<(ZoneBuildStats, Option<VisibilityMatrix>)> {
    let mut stats = ZoneBuildStats::default();
    level.model.validate()?;
    let mut task = SlowTask::begin("Building zones");

    level.model.clear_zones();
    stats.leaves = LeafAssigner::assign(&mut level.model);
    task.update(1, 6);

    let graph = PortalGraph::build(&level.model)?;
    stats.portals = graph.portals.len();
    stats.blocked = graph.portals.iter().filter(|p| p.blocked).count();
    task.update(2, 6);

    let mut merger = ZoneMerger::from_leaves(&level.model);
    merger.merge(&graph);
    stats.zones = merger.apply(&mut level.model);
    stats.fragments = ZoneAssigner::assign(&mut level.model);
    task.update(3, 6);

    build_connectivity(&mut level.model, &graph);
    build_zone_masks(&mut level.model);
    assign_actors(level);
    task.update(4, 6);

    let vis = if options.build_vis {
        let m = build_visibility(&mut level.model, &graph, options.vis_by_zone)?;
        apply_zone_visibility(&mut level.model, &m);
        stats.visible_pairs = m.visible_pairs();
        Some(m)
    } else {
        None
    };
    task.update(5, 6);

    if options.build_bounds {
        let (bounds, hulls) = BoundsBuilder::build(&mut level.model)?;
        stats.bounds = bounds;
        stats.hulls = hulls;
    }
    task.end();

    com_printf(&format!(
        "{} leaves, {} portals ({} blocked), {} zones, {} visible pairs\n",
        stats.leaves, stats.portals, stats.blocked, stats.zones, stats.visible_pairs
    ));
    Ok((stats, vis))
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use levelbake_common::error::CheckKind;
    use levelbake_common::level::ActorKind;
    use levelbake_common::prefab;

    fn doorway_level() -> Level {
        Level::new(prefab::split_room([0.0; 3], [512.0, 256.0, 128.0], 256.0, true))
    }

    #[test]
    fn test_doorway_room_end_to_end() {
        let mut level = doorway_level();
        let info = level.spawn(ActorKind::ZoneInfo, [100.0, 128.0, 64.0]);
        let (stats, vis) = build_zones(&mut level, &ZoneBuildOptions::default()).unwrap();
        assert_eq!(stats.leaves, 2);
        assert_eq!(stats.portals, 1);
        assert_eq!(stats.blocked, 1);
        assert_eq!(stats.zones, 2);
        assert_eq!(stats.visible_pairs, 1);
        assert_eq!(stats.bounds, level.model.nodes.len());

        let vis = vis.unwrap();
        assert!(vis.get(0, 1) && vis.get(1, 0));
        let zone = level.actors[info].region.unwrap().zone;
        assert_ne!(zone, 0);
        assert_eq!(level.model.zones[zone as usize].zone_actor, Some(info));
        for leaf in &level.model.leaves {
            let z = leaf.i_zone as usize;
            assert!((1..=63).contains(&z));
            assert_eq!(level.model.zones[z].visibility, (1 << 1) | (1 << 2));
        }
    }

    #[test]
    fn test_options_from_cvars() {
        let mut cvars = CvarContext::new();
        assert_eq!(ZoneBuildOptions::from_cvars(&mut cvars), ZoneBuildOptions::default());
        cvars.set("zone_vis_byzone", "1");
        cvars.set("zone_build_bounds", "0");
        let options = ZoneBuildOptions::from_cvars(&mut cvars);
        assert!(options.vis_by_zone && !options.build_bounds && options.build_vis);
    }

    #[test]
    fn test_skipped_stages() {
        let mut level = doorway_level();
        let options = ZoneBuildOptions {
            vis_by_zone: false,
            build_bounds: false,
            build_vis: false,
        };
        let (stats, vis) = build_zones(&mut level, &options).unwrap();
        assert!(vis.is_none());
        assert_eq!(stats.bounds, 0);
        assert!(level.model.bounds.is_empty());
        assert_eq!(stats.zones, 2);
    }

    #[test]
    fn test_rebuild_is_stable() {
        let mut level = doorway_level();
        let (first, _) = build_zones(&mut level, &ZoneBuildOptions::default()).unwrap();
        let zones: Vec<u8> = level.model.leaves.iter().map(|l| l.i_zone).collect();
        let (second, _) = build_zones(&mut level, &ZoneBuildOptions::default()).unwrap();
        assert_eq!(first.zones, second.zones);
        assert_eq!(zones, level.model.leaves.iter().map(|l| l.i_zone).collect::<Vec<u8>>());
    }

    #[test]
    fn test_invalid_model_is_rejected() {
        let mut level = doorway_level();
        level.model.nodes[0].i_back = Some(0);
        let err = build_zones(&mut level, &ZoneBuildOptions::default()).unwrap_err();
        assert!(!err.is_vital());
        assert_eq!(err.kind(), CheckKind::Input);
    }
}

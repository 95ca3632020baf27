// zb_zone.rs — leaf numbering, zone merging and zone propagation

use std::collections::HashMap;

use levelbake_common::bsp_model::*;
use levelbake_common::common::{com_dprintf, com_warnf};
use levelbake_common::level::{ActorKind, Level, ZoneMembership};
use levelbake_common::poly::Poly;
use levelbake_common::q_shared::*;

use crate::zb_portal::{filter_side, Fragment, PortalGraph};

/// Highest usable zone id; 0 is the ambient zone.
pub const MAX_ZONE_ID: usize = MAX_ZONES - 1;

// ============================================================
// Leaf numbering
// ============================================================

pub struct LeafAssigner;

impl LeafAssigner {
    /// Number every outside leaf in tree order. Returns the leaf count.
    pub fn assign(model: &mut BspModel) -> usize {
        model.leaves.clear();
        for node in &mut model.nodes {
            node.i_leaf = [None; 2];
        }
        for (i_node, side, outside) in model.leaf_sides() {
            if !outside {
                continue;
            }
            let i = model.leaves.len();
            model.leaves.push(Leaf {
                i_zone: 0,
                i_logical: i,
                i_node,
                side,
            });
            model.nodes[i_node].i_leaf[side] = Some(i);
        }
        model.leaves.len()
    }
}

// ============================================================
// Zone merging
// ============================================================

/// Working zone id per leaf, wider than the final 6-bit ids.
pub struct ZoneMerger {
    pub leaf_zones: Vec<usize>,
}

impl ZoneMerger {
    /// Every leaf starts as its own zone.
    pub fn from_leaves(model: &BspModel) -> Self {
        Self {
            leaf_zones: (0..model.leaves.len()).collect(),
        }
    }

    /// Start from the zones already stored on the leaves.
    pub fn from_zones(model: &BspModel) -> Self {
        Self {
            leaf_zones: model.leaves.iter().map(|l| l.i_zone as usize).collect(),
        }
    }

    /// Union leaves across every non-blocked portal.
    pub fn merge(&mut self, graph: &PortalGraph) -> usize {
        let mut unions = 0;
        for portal in graph.portals.iter().filter(|p| !p.blocked) {
            let target = self.leaf_zones[portal.front_leaf];
            let source = self.leaf_zones[portal.back_leaf];
            if target == source {
                continue;
            }
            for z in self.leaf_zones.iter_mut() {
                if *z == source {
                    *z = target;
                }
            }
            unions += 1;
        }
        unions
    }

    /// Renumber contiguously by first appearance, fold into 1..=63 and write
    /// back to leaves and leaf node slots. Returns `NumZones`.
    pub fn apply(&self, model: &mut BspModel) -> usize {
        let mut renumber: HashMap<usize, usize> = HashMap::new();
        let mut ids = Vec::with_capacity(self.leaf_zones.len());
        for &z in &self.leaf_zones {
            let next = renumber.len();
            let c = *renumber.entry(z).or_insert(next);
            ids.push(1 + (c % MAX_ZONE_ID));
        }
        let distinct = renumber.len();
        if distinct > MAX_ZONE_ID {
            com_warnf(&format!(
                "{} connected regions exceed {} zones; ids alias\n",
                distinct, MAX_ZONE_ID
            ));
        }

        for (i, &id) in ids.iter().enumerate() {
            let leaf = model.leaves[i];
            model.leaves[i].i_zone = id as u8;
            model.nodes[leaf.i_node].i_zone[leaf.side] = id as u8;
        }
        model.num_zones = distinct.clamp(1, MAX_ZONES);
        model.num_zones
    }
}

// ============================================================
// Zone propagation into the tree
// ============================================================

/// One filtered piece of a node polygon with the zones on each side.
struct ZonePiece {
    poly: Poly,
    front: u8,
    back: u8,
}

pub struct ZoneAssigner;

impl ZoneAssigner {
    /// Tag both zone slots of every node from its polygon. Polygons that
    /// straddle several zones on one side stay split into coplanar fragment
    /// nodes and their surface is flagged NO_MERGE. Returns fragments added.
    pub fn assign(model: &mut BspModel) -> usize {
        let heads = Self::plane_heads(model);
        let num_original = model.nodes.len();
        let mut added = 0;

        for i_node in 0..num_original {
            let poly = model.node_poly(i_node);
            if poly.num_vertices() < 3 {
                continue;
            }
            let i_head = heads[i_node];
            let same = dot_product(&model.nodes[i_node].plane.normal, &model.nodes[i_head].plane.normal) > 0.0;
            let (front_side, back_side) = if same {
                (SIDE_FRONT, SIDE_BACK)
            } else {
                (SIDE_BACK, SIDE_FRONT)
            };

            let pieces = Self::filter_pieces(model, poly, i_head, front_side, back_side);
            let mut front_zones: Vec<u8> = pieces.iter().map(|p| p.front).filter(|&z| z != 0).collect();
            let mut back_zones: Vec<u8> = pieces.iter().map(|p| p.back).filter(|&z| z != 0).collect();
            front_zones.sort_unstable();
            front_zones.dedup();
            back_zones.sort_unstable();
            back_zones.dedup();

            if front_zones.len() <= 1 && back_zones.len() <= 1 {
                let node = &mut model.nodes[i_node];
                node.i_zone[SIDE_FRONT] = front_zones.first().copied().unwrap_or(0);
                node.i_zone[SIDE_BACK] = back_zones.first().copied().unwrap_or(0);
                continue;
            }

            // keep the split: first piece stays on this node
            let i_surf = model.nodes[i_node].i_surf;
            model.surfs[i_surf].poly_flags |= PolyFlags::NO_MERGE;
            let plane = model.nodes[i_node].plane;
            for (k, piece) in pieces.into_iter().enumerate() {
                let target = if k == 0 {
                    let i_vert_pool = model.verts.len();
                    model.verts.extend_from_slice(&piece.poly.vertices);
                    let node = &mut model.nodes[i_node];
                    node.i_vert_pool = i_vert_pool;
                    node.num_vertices = piece.poly.vertices.len();
                    i_node
                } else {
                    let i_new = model.add_node_on_surf(plane, &piece.poly, i_surf);
                    model.link_coplanar(i_head, i_new);
                    added += 1;
                    i_new
                };
                model.nodes[target].i_zone[SIDE_FRONT] = piece.front;
                model.nodes[target].i_zone[SIDE_BACK] = piece.back;
            }
        }

        if added > 0 {
            com_dprintf(&format!("ZoneAssigner: {} multi-zone fragments\n", added));
        }
        added
    }

    /// Map every node to the head of its coplanar chain.
    fn plane_heads(model: &BspModel) -> Vec<usize> {
        let mut heads: Vec<usize> = (0..model.nodes.len()).collect();
        for i in 0..model.nodes.len() {
            if heads[i] != i {
                continue;
            }
            for j in model.coplanars(i).into_iter().skip(1) {
                heads[j] = i;
            }
        }
        heads
    }

    fn filter_pieces(model: &BspModel, poly: Poly, i_head: usize, front_side: usize, back_side: usize) -> Vec<ZonePiece> {
        let zone_of = |f: &Fragment| f.i_leaf.map_or(0, |l| model.leaves[l].i_zone);
        let mut pieces = Vec::new();
        let mut fronts = Vec::new();
        filter_side(model, poly, i_head, front_side, &mut fronts);
        for front in fronts {
            let front_zone = zone_of(&front);
            let mut backs = Vec::new();
            filter_side(model, front.poly, i_head, back_side, &mut backs);
            for back in backs {
                pieces.push(ZonePiece {
                    front: front_zone,
                    back: zone_of(&back),
                    poly: back.poly,
                });
            }
        }
        pieces
    }
}

// ============================================================
// Zone table, masks and membership
// ============================================================

/// Self bit plus the zones reachable through any portal, blocked or not.
pub fn build_connectivity(model: &mut BspModel, graph: &PortalGraph) {
    for (z, zone) in model.zones.iter_mut().enumerate() {
        zone.connectivity = 1u64 << z;
    }
    for portal in &graph.portals {
        let a = model.leaves[portal.front_leaf].i_zone as usize;
        let b = model.leaves[portal.back_leaf].i_zone as usize;
        model.zones[a].connectivity |= 1u64 << b;
        model.zones[b].connectivity |= 1u64 << a;
    }
}

/// Bottom-up union of every node's zone slots and its subtree.
pub fn build_zone_masks(model: &mut BspModel) -> u64 {
    if model.nodes.is_empty() {
        return 0;
    }
    zone_mask_r(model, 0)
}

fn zone_mask_r(model: &mut BspModel, i_node: usize) -> u64 {
    let mut mask = 0u64;
    for i_cop in model.coplanars(i_node) {
        for side in [SIDE_BACK, SIDE_FRONT] {
            let z = model.nodes[i_cop].i_zone[side];
            if z != 0 {
                mask |= 1u64 << z;
            }
        }
    }
    for side in [SIDE_FRONT, SIDE_BACK] {
        if let Some(child) = model.nodes[i_node].child(side) {
            mask |= zone_mask_r(model, child);
        }
    }
    for i_cop in model.coplanars(i_node) {
        model.nodes[i_cop].zone_mask = mask;
    }
    mask
}

/// Attach ZoneInfo actors to their zones and record every actor's zone.
/// Returns the number of zones that got an info actor.
pub fn assign_actors(level: &mut Level) -> usize {
    for zone in level.model.zones.iter_mut() {
        zone.zone_actor = None;
    }
    let mut attached = 0;
    for i in 0..level.actors.len() {
        if level.actors[i].deleted {
            continue;
        }
        let location = level.actors[i].location;
        let leaf = level.model.point_leaf(&location).and_then(|lp| lp.i_leaf);
        let zone = leaf.map_or(0, |l| level.model.leaves[l].i_zone);
        level.actors[i].region = Some(ZoneMembership { zone, leaf });

        if level.actors[i].kind == ActorKind::ZoneInfo && zone != 0 {
            let slot = &mut level.model.zones[zone as usize].zone_actor;
            match *slot {
                Some(prev) => com_warnf(&format!(
                    "zone {} already has info actor {}, ignoring {}\n",
                    zone, prev, i
                )),
                None => {
                    *slot = Some(i);
                    attached += 1;
                }
            }
        }
    }
    attached
}

// ============================================================
// Tests
// ============================================================

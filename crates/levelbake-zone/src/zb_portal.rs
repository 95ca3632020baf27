// zb_portal.rs — portal extraction between outside leaves

use levelbake_common::bsp_model::*;
use levelbake_common::check;
use levelbake_common::common::com_dprintf;
use levelbake_common::error::BuildResult;
use levelbake_common::poly::*;
use levelbake_common::q_shared::*;

/// Oriented polygon on a splitting plane joining two outside leaves. The
/// normal points into `front_leaf`.
#[derive(Debug, Clone)]
pub struct Portal {
    pub poly: Poly,
    pub i_node: usize,
    pub front_leaf: usize,
    pub back_leaf: usize,
    /// Lies on an explicit zone divider; excluded from zone merging.
    pub blocked: bool,
    /// How many times this fragment was split on its way down.
    pub fragment_count: usize,
}

/// Fragment left after filtering a polygon down a subtree.
pub struct Fragment {
    pub poly: Poly,
    /// Outside leaf it landed in, `None` for solid space.
    pub i_leaf: Option<usize>,
    pub splits: usize,
}

// ============================================================
// Subtree filtering
// ============================================================

/// Filter `poly`, lying on `i_head`'s plane, into the subtree on `side` of
/// that node. Fragments coplanar with a descendant follow the side facing
/// the tested half-space.
pub fn filter_side(model: &BspModel, poly: Poly, i_head: usize, side: usize, out: &mut Vec<Fragment>) {
    let head = &model.nodes[i_head];
    match head.child(side) {
        Some(child) => filter_r(model, poly, child, &head.plane.normal, side == SIDE_FRONT, 0, out),
        None => out.push(Fragment {
            poly,
            i_leaf: head.i_leaf[side],
            splits: 0,
        }),
    }
}

fn filter_r(
    model: &BspModel,
    poly: Poly,
    i_node: usize,
    gen_normal: &Vec3,
    keep_front: bool,
    splits: usize,
    out: &mut Vec<Fragment>,
) {
    if poly.num_vertices() >= VERTEX_THRESHOLD {
        let (a, b) = poly.split_in_half();
        filter_r(model, a, i_node, gen_normal, keep_front, splits + 1, out);
        filter_r(model, b, i_node, gen_normal, keep_front, splits + 1, out);
        return;
    }

    let node = &model.nodes[i_node];
    let go = |side: usize, p: Poly, splits: usize, out: &mut Vec<Fragment>| match node.child(side) {
        Some(child) => filter_r(model, p, child, gen_normal, keep_front, splits, out),
        None => out.push(Fragment {
            poly: p,
            i_leaf: node.i_leaf[side],
            splits,
        }),
    };

    match poly.split_with_plane(&node.plane) {
        SplitResult::Front => go(SIDE_FRONT, poly, splits, out),
        SplitResult::Back => go(SIDE_BACK, poly, splits, out),
        SplitResult::Coplanar => {
            let same = dot_product(&node.plane.normal, gen_normal) > 0.0;
            let side = if same == keep_front { SIDE_FRONT } else { SIDE_BACK };
            go(side, poly, splits, out);
        }
        SplitResult::Split(front, back) => {
            go(SIDE_FRONT, front, splits + 1, out);
            go(SIDE_BACK, back, splits + 1, out);
        }
    }
}

/// Pairs of (front leaf, back leaf) a polygon on `i_head`'s plane touches,
/// with the fragment for each pair. Fragments in solid space are dropped.
pub fn filter_both_sides(model: &BspModel, poly: Poly, i_head: usize) -> Vec<(Fragment, usize)> {
    let mut result = Vec::new();
    let mut fronts = Vec::new();
    filter_side(model, poly, i_head, SIDE_FRONT, &mut fronts);
    for front in fronts {
        let Some(front_leaf) = front.i_leaf else { continue };
        let mut backs = Vec::new();
        filter_side(model, front.poly, i_head, SIDE_BACK, &mut backs);
        for mut back in backs {
            if back.i_leaf.is_some() {
                back.splits += front.splits;
                result.push((back, front_leaf));
            }
        }
    }
    result
}

// ============================================================
// Portal graph
// ============================================================

/// Portal arena with index lists per generating node and per leaf.
#[derive(Debug, Clone, Default)]
pub struct PortalGraph {
    pub portals: Vec<Portal>,
    pub node_portals: Vec<Vec<usize>>,
    /// Portals whose front leaf is the index.
    pub front_leaf_portals: Vec<Vec<usize>>,
    /// Portals whose back leaf is the index.
    pub back_leaf_portals: Vec<Vec<usize>>,
    /// Nodes whose infinite quad survived the ancestor clip.
    pub num_seeded: usize,
}

impl PortalGraph {
    pub fn new(num_nodes: usize, num_leaves: usize) -> Self {
        Self {
            portals: Vec::new(),
            node_portals: vec![Vec::new(); num_nodes],
            front_leaf_portals: vec![Vec::new(); num_leaves],
            back_leaf_portals: vec![Vec::new(); num_leaves],
            num_seeded: 0,
        }
    }

    /// Extract every portal of a leaf-numbered model and tag blocked ones.
    pub fn build(model: &BspModel) -> BuildResult<PortalGraph> {
        let mut graph = PortalGraph::new(model.nodes.len(), model.leaves.len());
        if model.nodes.is_empty() {
            return Ok(graph);
        }
        let mut clip_stack: Vec<(usize, usize)> = Vec::new();
        graph.build_r(model, 0, &mut clip_stack)?;
        let blocked = graph.tag_blocked(model);
        com_dprintf(&format!(
            "PortalGraph: {} portals ({} blocked) from {} seeded nodes\n",
            graph.portals.len(),
            blocked,
            graph.num_seeded
        ));
        Ok(graph)
    }

    fn build_r(&mut self, model: &BspModel, i_node: usize, clip_stack: &mut Vec<(usize, usize)>) -> BuildResult<()> {
        self.make_node_portals(model, i_node, clip_stack)?;
        for side in [SIDE_FRONT, SIDE_BACK] {
            if let Some(child) = model.nodes[i_node].child(side) {
                clip_stack.push((i_node, side));
                let result = self.build_r(model, child, clip_stack);
                clip_stack.pop();
                result?;
            }
        }
        Ok(())
    }

    fn make_node_portals(&mut self, model: &BspModel, i_node: usize, clip_stack: &[(usize, usize)]) -> BuildResult<()> {
        let node = &model.nodes[i_node];
        let mut poly = Poly::infinite(&node.plane);

        // Cut the plane down to the convex region this node partitions.
        for &(i_anc, side) in clip_stack {
            let plane = if side == SIDE_FRONT {
                model.nodes[i_anc].plane
            } else {
                model.nodes[i_anc].plane.flip()
            };
            match poly.clip_front(&plane) {
                Some(p) => poly = p,
                None => return Ok(()),
            }
        }
        self.num_seeded += 1;

        for (frag, front_leaf) in filter_both_sides(model, poly, i_node) {
            if let Some(back_leaf) = frag.i_leaf {
                self.add_portal(frag.poly, i_node, front_leaf, back_leaf, frag.splits)?;
            }
        }
        Ok(())
    }

    /// Register a portal in every index list.
    pub fn add_portal(
        &mut self,
        poly: Poly,
        i_node: usize,
        front_leaf: usize,
        back_leaf: usize,
        fragment_count: usize,
    ) -> BuildResult<usize> {
        check!(Logic, front_leaf != back_leaf, "portal on node {} joins leaf {} to itself", i_node, front_leaf);
        let i = self.portals.len();
        if self.node_portals.len() <= i_node {
            self.node_portals.resize(i_node + 1, Vec::new());
        }
        let need = front_leaf.max(back_leaf) + 1;
        if self.front_leaf_portals.len() < need {
            self.front_leaf_portals.resize(need, Vec::new());
            self.back_leaf_portals.resize(need, Vec::new());
        }
        self.node_portals[i_node].push(i);
        self.front_leaf_portals[front_leaf].push(i);
        self.back_leaf_portals[back_leaf].push(i);
        self.portals.push(Portal {
            poly,
            i_node,
            front_leaf,
            back_leaf,
            blocked: false,
            fragment_count,
        });
        Ok(i)
    }

    /// Mark portals lying under PORTAL surfaces of their plane chain.
    fn tag_blocked(&mut self, model: &BspModel) -> usize {
        let mut count = 0;
        for i_node in 0..self.node_portals.len().min(model.nodes.len()) {
            if self.node_portals[i_node].is_empty() {
                continue;
            }
            for i_cop in model.coplanars(i_node) {
                if !model.node_flags(i_cop).contains(PolyFlags::PORTAL) {
                    continue;
                }
                let poly = model.node_poly(i_cop);
                if poly.num_vertices() < 3 {
                    continue;
                }
                for (frag, front_leaf) in filter_both_sides(model, poly, i_node) {
                    let Some(back_leaf) = frag.i_leaf else { continue };
                    for &ip in &self.node_portals[i_node] {
                        let p = &mut self.portals[ip];
                        let matches = (p.front_leaf == front_leaf && p.back_leaf == back_leaf)
                            || (p.front_leaf == back_leaf && p.back_leaf == front_leaf);
                        if matches && !p.blocked {
                            p.blocked = true;
                            count += 1;
                        }
                    }
                }
            }
        }
        count
    }

    pub fn num_leaves(&self) -> usize {
        self.front_leaf_portals.len()
    }

    /// Every portal touching a leaf, front memberships first.
    pub fn leaf_portals(&self, leaf: usize) -> impl Iterator<Item = usize> + '_ {
        self.front_leaf_portals[leaf]
            .iter()
            .chain(self.back_leaf_portals[leaf].iter())
            .copied()
    }

    /// Leaf across portal `ip` from `leaf`.
    pub fn other_leaf(&self, ip: usize, leaf: usize) -> BuildResult<usize> {
        let p = &self.portals[ip];
        check!(
            Logic,
            leaf == p.front_leaf || leaf == p.back_leaf,
            "leaf {} is on neither side of portal {} ({}, {})",
            leaf,
            ip,
            p.front_leaf,
            p.back_leaf
        );
        Ok(if leaf == p.front_leaf { p.back_leaf } else { p.front_leaf })
    }

    /// Portal polygon facing away from `from_leaf`.
    pub fn oriented_from(&self, ip: usize, from_leaf: usize) -> Poly {
        let p = &self.portals[ip];
        if from_leaf == p.back_leaf {
            p.poly.clone()
        } else {
            p.poly.reversed()
        }
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zb_zone::LeafAssigner;
    use levelbake_common::prefab;

    fn portals_of(mut model: BspModel) -> (BspModel, PortalGraph) {
        LeafAssigner::assign(&mut model);
        let graph = PortalGraph::build(&model).unwrap();
        (model, graph)
    }

    #[test]
    fn test_box_room_has_no_portals() {
        let (model, graph) = portals_of(prefab::box_room([0.0; 3], [256.0, 256.0, 128.0]));
        assert_eq!(model.leaves.len(), 1);
        assert!(graph.portals.is_empty());
    }

    #[test]
    fn test_split_room_portal() {
        let (model, graph) = portals_of(prefab::split_room([0.0; 3], [512.0, 256.0, 128.0], 256.0, true));
        assert_eq!(model.leaves.len(), 2);
        assert_eq!(graph.portals.len(), 1);
        let p = &graph.portals[0];
        assert_eq!(p.i_node, 0);
        assert!(p.blocked);
        assert_ne!(p.front_leaf, p.back_leaf);
        // cross-section of the room
        assert!((p.poly.area() - 256.0 * 128.0).abs() < 1.0);
        for v in &p.poly.vertices {
            assert!((v[0] - 256.0).abs() < 0.01);
        }
        // front leaf is on the +x side
        let right = model.point_leaf(&[400.0, 128.0, 64.0]).unwrap();
        assert_eq!(right.i_leaf, Some(p.front_leaf));
        assert_eq!(graph.leaf_portals(p.front_leaf).collect::<Vec<_>>(), vec![0]);
        assert_eq!(graph.leaf_portals(p.back_leaf).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_open_divider_not_blocked() {
        let (_, graph) = portals_of(prefab::split_room([0.0; 3], [512.0, 256.0, 128.0], 256.0, false));
        assert_eq!(graph.portals.len(), 1);
        assert!(!graph.portals[0].blocked);
    }

    #[test]
    fn test_room_row_portals_touch_neighbours() {
        let (model, graph) = portals_of(prefab::room_row(
            [0.0; 3],
            [768.0, 256.0, 128.0],
            &[(256.0, false), (512.0, true)],
        ));
        assert_eq!(model.leaves.len(), 3);
        assert_eq!(graph.portals.len(), 2);
        for p in &graph.portals {
            assert_ne!(p.front_leaf, p.back_leaf);
        }
        assert_eq!(graph.portals.iter().filter(|p| p.blocked).count(), 1);
    }

    #[test]
    fn test_other_leaf_checks_membership() {
        let mut graph = PortalGraph::new(1, 3);
        let square = Poly::new(vec![[0.0, 0.0, 0.0], [0.0, 8.0, 0.0], [0.0, 8.0, 8.0], [0.0, 0.0, 8.0]]);
        let ip = graph.add_portal(square.clone(), 0, 1, 2, 0).unwrap();
        assert_eq!(graph.other_leaf(ip, 1).unwrap(), 2);
        assert_eq!(graph.other_leaf(ip, 2).unwrap(), 1);
        assert!(graph.other_leaf(ip, 0).is_err());
        assert!(graph.add_portal(square, 0, 2, 2, 0).is_err());
        // facing away from the back leaf keeps the stored winding
        assert_eq!(graph.oriented_from(ip, 2).normal, graph.portals[ip].poly.normal);
    }
}

// bsp_model.rs — polygonal BSP tree shared by the zone and path builders

use crate::check;
use crate::error::BuildResult;
use crate::poly::Poly;
use crate::q_shared::*;

pub const SIDE_BACK: usize = 0;
pub const SIDE_FRONT: usize = 1;

// ============================================================
// Tree records
// ============================================================

/// One BSP node. Nodes reachable through `i_front`/`i_back` partition
/// space; nodes hanging off `i_plane` only add surfaces on the same plane.
#[derive(Debug, Clone)]
pub struct BspNode {
    pub plane: Plane,
    /// Zones touching this node or anything below it.
    pub zone_mask: u64,
    pub i_vert_pool: usize,
    pub num_vertices: usize,
    pub i_surf: usize,
    pub i_front: Option<usize>,
    pub i_back: Option<usize>,
    /// Next node in the coplanar chain.
    pub i_plane: Option<usize>,
    /// Zone on each side, indexed by SIDE_BACK / SIDE_FRONT.
    pub i_zone: [u8; 2],
    /// Outside leaf on each side, when that side is a leaf.
    pub i_leaf: [Option<usize>; 2],
    pub i_render_bound: Option<usize>,
    /// Collision hull of an inside leaf on each side.
    pub i_collision_bound: [Option<usize>; 2],
}

impl BspNode {
    pub fn child(&self, side: usize) -> Option<usize> {
        if side == SIDE_FRONT {
            self.i_front
        } else {
            self.i_back
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BspSurf {
    pub poly_flags: PolyFlags,
    pub i_brush_poly: Option<usize>,
}

/// A numbered convex outside volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leaf {
    pub i_zone: u8,
    /// Row of this leaf in the visibility matrix.
    pub i_logical: usize,
    pub i_node: usize,
    pub side: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneProperties {
    pub connectivity: u64,
    pub visibility: u64,
    pub zone_actor: Option<usize>,
}

/// Persisted collision hull of an inside leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvolutionHull {
    /// Contributing brush polygons, `INDEX_NONE` for synthesized faces.
    pub brush_polys: Vec<i32>,
    pub bbox: [f32; 6],
}

/// Where a point ended up after descending the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafPoint {
    pub i_node: usize,
    pub side: usize,
    pub outside: bool,
    pub i_leaf: Option<usize>,
}

// ============================================================
// Model
// ============================================================

#[derive(Debug, Clone)]
pub struct BspModel {
    pub nodes: Vec<BspNode>,
    pub surfs: Vec<BspSurf>,
    pub verts: Vec<Vec3>,
    pub leaves: Vec<Leaf>,
    pub zones: Vec<ZoneProperties>,
    pub num_zones: usize,
    pub bounds: Vec<BBox>,
    pub leaf_hulls: Vec<ConvolutionHull>,
    /// Whether space beyond every node is empty (true) or solid (false).
    pub root_outside: bool,
}

impl Default for BspModel {
    fn default() -> Self {
        Self::new(false)
    }
}

impl BspModel {
    pub fn new(root_outside: bool) -> Self {
        Self {
            nodes: Vec::new(),
            surfs: Vec::new(),
            verts: Vec::new(),
            leaves: Vec::new(),
            zones: vec![ZoneProperties::default(); MAX_ZONES],
            num_zones: 0,
            bounds: Vec::new(),
            leaf_hulls: Vec::new(),
            root_outside,
        }
    }

    /// Add a node with its own surface. Children are linked by the caller.
    pub fn add_node(&mut self, plane: Plane, poly: &Poly, poly_flags: PolyFlags) -> usize {
        let i_surf = self.surfs.len();
        self.surfs.push(BspSurf {
            poly_flags,
            i_brush_poly: poly.i_brush_poly,
        });
        self.add_node_on_surf(plane, poly, i_surf)
    }

    /// Add a node that shares an existing surface (split fragments).
    pub fn add_node_on_surf(&mut self, plane: Plane, poly: &Poly, i_surf: usize) -> usize {
        let i_vert_pool = self.verts.len();
        self.verts.extend_from_slice(&poly.vertices);
        let i = self.nodes.len();
        self.nodes.push(BspNode {
            plane,
            zone_mask: 0,
            i_vert_pool,
            num_vertices: poly.vertices.len(),
            i_surf,
            i_front: None,
            i_back: None,
            i_plane: None,
            i_zone: [0; 2],
            i_leaf: [None; 2],
            i_render_bound: None,
            i_collision_bound: [None; 2],
        });
        i
    }

    /// Append `i_new` to the end of `i_node`'s coplanar chain.
    pub fn link_coplanar(&mut self, i_node: usize, i_new: usize) {
        let mut i = i_node;
        while let Some(next) = self.nodes[i].i_plane {
            i = next;
        }
        self.nodes[i].i_plane = Some(i_new);
    }

    pub fn surf(&self, i_node: usize) -> &BspSurf {
        &self.surfs[self.nodes[i_node].i_surf]
    }

    pub fn node_flags(&self, i_node: usize) -> PolyFlags {
        self.surf(i_node).poly_flags
    }

    /// Node polygon rebuilt from the vertex pool.
    pub fn node_poly(&self, i_node: usize) -> Poly {
        let node = &self.nodes[i_node];
        let surf = &self.surfs[node.i_surf];
        let vertices = self.verts[node.i_vert_pool..node.i_vert_pool + node.num_vertices].to_vec();
        Poly {
            base: vertices.first().copied().unwrap_or_else(|| node.plane.base()),
            vertices,
            normal: node.plane.normal,
            i_brush_poly: surf.i_brush_poly,
            poly_flags: surf.poly_flags,
        }
    }

    /// Solid surfaces make their front empty and their back solid.
    pub fn is_csg(&self, i_node: usize) -> bool {
        !self.node_flags(i_node).contains(PolyFlags::NOT_SOLID)
    }

    /// Outsideness of `side` of a node given the outsideness above it.
    pub fn child_outside(&self, i_node: usize, side: usize, outside: bool) -> bool {
        let is_csg = self.is_csg(i_node);
        if side == SIDE_FRONT {
            outside || is_csg
        } else {
            outside && !is_csg
        }
    }

    /// Coplanar chain starting at `i_node` (inclusive).
    pub fn coplanars(&self, i_node: usize) -> Vec<usize> {
        let mut out = vec![i_node];
        let mut i = i_node;
        while let Some(next) = self.nodes[i].i_plane {
            out.push(next);
            i = next;
        }
        out
    }

    /// Walk from the root to the leaf containing `p`.
    pub fn point_leaf(&self, p: &Vec3) -> Option<LeafPoint> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut i = 0;
        let mut outside = self.root_outside;
        loop {
            let node = &self.nodes[i];
            let side = if node.plane.plane_dot(p) >= 0.0 { SIDE_FRONT } else { SIDE_BACK };
            let child_out = self.child_outside(i, side, outside);
            match node.child(side) {
                Some(next) => {
                    i = next;
                    outside = child_out;
                }
                None => {
                    return Some(LeafPoint {
                        i_node: i,
                        side,
                        outside: child_out,
                        i_leaf: node.i_leaf[side],
                    });
                }
            }
        }
    }

    /// Zone containing `p`, 0 when it is solid or unzoned.
    pub fn point_zone(&self, p: &Vec3) -> u8 {
        match self.point_leaf(p) {
            Some(lp) => lp.i_leaf.map_or(0, |l| self.leaves[l].i_zone),
            None => 0,
        }
    }

    /// Every leaf side in depth-first order (front before back), with its
    /// outsideness.
    pub fn leaf_sides(&self) -> Vec<(usize, usize, bool)> {
        let mut out = Vec::new();
        if self.nodes.is_empty() {
            return out;
        }
        let mut stack = vec![(0usize, self.root_outside)];
        while let Some((i, outside)) = stack.pop() {
            // back first on the stack so front is visited first
            for side in [SIDE_BACK, SIDE_FRONT] {
                let child_out = self.child_outside(i, side, outside);
                if let Some(child) = self.nodes[i].child(side) {
                    stack.push((child, child_out));
                }
            }
            for side in [SIDE_FRONT, SIDE_BACK] {
                if self.nodes[i].child(side).is_none() {
                    out.push((i, side, self.child_outside(i, side, outside)));
                }
            }
        }
        out
    }

    /// Leaf index on the given side, if that side is a numbered leaf.
    pub fn leaf_at(&self, i_node: usize, side: usize) -> Option<usize> {
        if self.nodes[i_node].child(side).is_some() {
            return None;
        }
        self.nodes[i_node].i_leaf[side]
    }

    /// Structural validation run before any build.
    pub fn validate(&self) -> BuildResult<()> {
        let n = self.nodes.len();
        let mut parents = vec![0u32; n];
        for (i, node) in self.nodes.iter().enumerate() {
            check!(Input, node.i_surf < self.surfs.len(), "node {} has bad surface {}", i, node.i_surf);
            check!(
                Input,
                node.i_vert_pool + node.num_vertices <= self.verts.len(),
                "node {} vertex range out of pool",
                i
            );
            let len = vector_length(&node.plane.normal);
            check!(Input, (len - 1.0).abs() < 0.01, "node {} plane normal not unit ({})", i, len);
            for child in [node.i_front, node.i_back, node.i_plane].into_iter().flatten() {
                check!(Input, child < n && child != 0, "node {} has bad child {}", i, child);
                parents[child] += 1;
            }
        }
        for (i, &count) in parents.iter().enumerate().skip(1) {
            check!(Input, count == 1, "node {} has {} parents", i, count);
        }
        Ok(())
    }

    /// Reset everything the zone builder writes.
    pub fn clear_zones(&mut self) {
        for node in &mut self.nodes {
            node.zone_mask = 0;
            node.i_zone = [0; 2];
            node.i_leaf = [None; 2];
            node.i_render_bound = None;
            node.i_collision_bound = [None; 2];
        }
        self.leaves.clear();
        self.zones = vec![ZoneProperties::default(); MAX_ZONES];
        self.num_zones = 0;
        self.bounds.clear();
        self.leaf_hulls.clear();
    }
}

// ============================================================
// Tests
// ============================================================

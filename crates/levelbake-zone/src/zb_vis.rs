// zb_vis.rs — mutual leaf/zone visibility through portals
//
// Visibility is found by flooding outward from every leaf through chains of
// portals. Each hop narrows the (source, pass, target) polygon triple by the
// separating planes of the maximal sheet wrapping; a chain dies when any of
// them is clipped away.

use levelbake_common::bsp_model::BspModel;
use levelbake_common::check;
use levelbake_common::common::{com_dprintf, SlowTask};
use levelbake_common::error::BuildResult;
use levelbake_common::poly::*;
use levelbake_common::q_shared::*;
use rayon::prelude::*;

use crate::zb_portal::PortalGraph;

/// Edges shorter than this cannot define a separating plane.
pub const MIN_CLIP_EDGE: f32 = 0.5;
/// Minimum sine between an edge and the vertex direction.
pub const MIN_CLIP_CROSS: f32 = 0.01;
/// Side classification slack for separating-plane tests.
pub const ON_EPSILON: f32 = 0.1;

// ============================================================
// Sheet wrapping
// ============================================================

/// Clip `poly` by the separating planes built from an edge of `a` and a
/// vertex of `b`, for planes that put `a` and `b` on opposite sides. The
/// `b` side is kept, or the `a` side when `flip` is set. Unreliable
/// candidate planes are skipped.
pub fn clip_to_sheet_wrapping(mut poly: Poly, a: &Poly, b: &Poly, flip: bool) -> Option<Poly> {
    let na = a.vertices.len();
    for i in 0..na {
        let l = (i + 1) % na;
        let v1 = a.vertices[i];
        let edge = vector_subtract(&a.vertices[l], &v1);
        let edge_len = vector_length(&edge);
        if edge_len < MIN_CLIP_EDGE {
            continue;
        }

        for (j, bv) in b.vertices.iter().enumerate() {
            let to_vertex = vector_subtract(bv, &v1);
            let vertex_len = vector_length(&to_vertex);
            if vertex_len < MIN_CLIP_EDGE {
                continue;
            }
            let mut normal = cross_product(&edge, &to_vertex);
            let len = vector_normalize(&mut normal);
            if len < MIN_CLIP_CROSS * edge_len * vertex_len {
                continue;
            }
            let mut plane = Plane::new(normal, dot_product(bv, &normal));

            // put `a` on the back side
            let mut a_side = 0.0;
            for (k, av) in a.vertices.iter().enumerate() {
                if k == i || k == l {
                    continue;
                }
                let d = plane.plane_dot(av);
                if d.abs() > ON_EPSILON {
                    a_side = d;
                    break;
                }
            }
            if a_side == 0.0 {
                continue; // coplanar with a
            }
            if a_side > 0.0 {
                plane = plane.flip();
            }

            // every vertex of b must be on or in front
            let mut in_front = 0;
            let mut separating = true;
            for (k, other) in b.vertices.iter().enumerate() {
                if k == j {
                    continue;
                }
                let d = plane.plane_dot(other);
                if d < -ON_EPSILON {
                    separating = false;
                    break;
                }
                if d > ON_EPSILON {
                    in_front += 1;
                }
            }
            if !separating || in_front == 0 {
                continue;
            }

            if flip {
                plane = plane.flip();
            }
            poly = poly.clip_front(&plane)?;
            break;
        }
    }
    Some(poly)
}

/// Narrow a (front, clip, back) triple in all four wrap orientations.
/// `None` when either end no longer sees the other past `clip`.
pub fn clip_portals(front: Poly, clip: &Poly, back: Poly) -> Option<(Poly, Poly)> {
    let back = clip_to_sheet_wrapping(back, &front, clip, false)?;
    let back = clip_to_sheet_wrapping(back, clip, &front, true)?;
    let front = clip_to_sheet_wrapping(front, &back, clip, false)?;
    let front = clip_to_sheet_wrapping(front, clip, &back, true)?;
    Some((front, back))
}

/// Part of `target` strictly beyond `plane`; coplanar targets are dropped.
fn beyond(target: Poly, plane: &Plane) -> Option<Poly> {
    match target.split_with_plane(plane) {
        SplitResult::Front => Some(target),
        SplitResult::Split(front, _) => Some(front),
        SplitResult::Back | SplitResult::Coplanar => None,
    }
}

// ============================================================
// Visibility matrix
// ============================================================

/// Dense symmetric bit matrix over logical leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityMatrix {
    pub size: usize,
    pub row_bytes: usize,
    pub bits: Vec<u8>,
}

impl VisibilityMatrix {
    /// Every entry false except the diagonal.
    pub fn new(size: usize) -> Self {
        let row_bytes = (size + 7) >> 3;
        let mut m = Self {
            size,
            row_bytes,
            bits: vec![0; size * row_bytes],
        };
        for i in 0..size {
            m.set(i, i);
        }
        m
    }

    pub fn get(&self, a: usize, b: usize) -> bool {
        self.bits[a * self.row_bytes + (b >> 3)] & (1 << (b & 7)) != 0
    }

    /// Sets both (a, b) and (b, a).
    pub fn set(&mut self, a: usize, b: usize) {
        self.bits[a * self.row_bytes + (b >> 3)] |= 1 << (b & 7);
        self.bits[b * self.row_bytes + (a >> 3)] |= 1 << (a & 7);
    }

    pub fn row(&self, a: usize) -> &[u8] {
        &self.bits[a * self.row_bytes..(a + 1) * self.row_bytes]
    }

    /// Unordered visible pairs, diagonal excluded.
    pub fn visible_pairs(&self) -> usize {
        let mut n = 0;
        for a in 0..self.size {
            for b in a + 1..self.size {
                if self.get(a, b) {
                    n += 1;
                }
            }
        }
        n
    }

    /// Size as little-endian u32, then every row zero-run compressed.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.bits.len());
        out.extend_from_slice(&(self.size as u32).to_le_bytes());
        for a in 0..self.size {
            out.extend_from_slice(&compress_row(self.row(a)));
        }
        out
    }

    pub fn from_bytes(data: &[u8]) -> BuildResult<VisibilityMatrix> {
        check!(Input, data.len() >= 4, "vis data too short ({} bytes)", data.len());
        let size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let row_bytes = (size + 7) >> 3;
        // a packed token covers at most 255 row bytes
        let min_row = row_bytes.div_ceil(255);
        let fits = size
            .checked_mul(min_row)
            .is_some_and(|need| need <= data.len() - 4);
        check!(Input, fits, "vis header claims {} rows, data holds {} bytes", size, data.len() - 4);
        let mut bits = Vec::with_capacity(size * row_bytes);
        let mut offset = 4;
        for _ in 0..size {
            let (row, used) = decompress_row(&data[offset..], row_bytes)?;
            bits.extend_from_slice(&row);
            offset += used;
        }
        check!(Input, offset == data.len(), "{} trailing bytes after vis rows", data.len() - offset);
        Ok(VisibilityMatrix { size, row_bytes, bits })
    }
}

/// Quake zero-run compression: literal non-zero bytes, zero runs as `0, count`.
pub fn compress_row(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(row.len());
    let mut j = 0;
    while j < row.len() {
        if row[j] != 0 {
            out.push(row[j]);
            j += 1;
            continue;
        }
        let mut rep = 1;
        j += 1;
        while j < row.len() && row[j] == 0 && rep < 255 {
            rep += 1;
            j += 1;
        }
        out.push(0);
        out.push(rep as u8);
    }
    out
}

/// Inverse of `compress_row`. Returns the row and the input bytes consumed.
pub fn decompress_row(input: &[u8], row_len: usize) -> BuildResult<(Vec<u8>, usize)> {
    let mut out = Vec::with_capacity(row_len);
    let mut inp = 0;
    while out.len() < row_len {
        check!(Input, inp < input.len(), "vis row truncated at {} of {}", out.len(), row_len);
        if input[inp] != 0 {
            out.push(input[inp]);
            inp += 1;
            continue;
        }
        check!(Input, inp + 1 < input.len(), "vis run length missing");
        let mut c = input[inp + 1] as usize;
        inp += 2;
        if out.len() + c > row_len {
            c = row_len - out.len();
            com_dprintf("warning: Vis decompression overrun\n");
        }
        out.resize(out.len() + c, 0);
    }
    Ok((out, inp))
}

// ============================================================
// Leaf flooding
// ============================================================

/// Leaf counts from which sources are flooded in parallel.
const PARALLEL_LEAF_THRESHOLD: usize = 64;

/// Everything one source leaf can see.
struct LeafRow {
    seen: Vec<usize>,
    hops: usize,
}

struct VisFlood<'a> {
    graph: &'a PortalGraph,
    /// Portals on the current recursion stack.
    testing: Vec<bool>,
    seen: Vec<usize>,
    hops: usize,
}

impl<'a> VisFlood<'a> {
    /// Flood from `src` out of every portal it owns.
    fn flood_leaf(graph: &'a PortalGraph, src: usize) -> BuildResult<LeafRow> {
        let mut flood = VisFlood {
            graph,
            testing: vec![false; graph.portals.len()],
            seen: Vec::new(),
            hops: 0,
        };
        let portals: Vec<usize> = graph.leaf_portals(src).collect();
        log::trace!("vis: leaf {} floods through {} portals", src, portals.len());
        for ip in portals {
            let other = graph.other_leaf(ip, src)?;
            flood.seen.push(other);
            let source = graph.oriented_from(ip, src);
            flood.testing[ip] = true;
            let result = flood.flood(&source, None, other);
            flood.testing[ip] = false;
            result?;
        }
        check!(Output, flood.testing.iter().all(|&t| !t), "recursion guard left set");
        Ok(LeafRow {
            seen: flood.seen,
            hops: flood.hops,
        })
    }

    /// `source` faces away from the source leaf, `pass` (if any) faces into `leaf`.
    fn flood(&mut self, source: &Poly, pass: Option<&Poly>, leaf: usize) -> BuildResult<()> {
        self.hops += 1;
        let portals: Vec<usize> = self.graph.leaf_portals(leaf).collect();
        for ip in portals {
            if self.testing[ip] {
                continue;
            }
            let other = self.graph.other_leaf(ip, leaf)?;

            let Some(mut target) = beyond(self.graph.oriented_from(ip, leaf), &source.plane()) else {
                continue;
            };
            if let Some(pass) = pass {
                match beyond(target, &pass.plane()) {
                    Some(t) => target = t,
                    None => continue,
                }
            }
            let source = match source.split_with_plane(&target.plane()) {
                SplitResult::Back => source.clone(),
                SplitResult::Split(_, back) => back,
                SplitResult::Front | SplitResult::Coplanar => continue,
            };

            let (source, target) = match pass {
                None => (source, target),
                Some(pass) => match clip_portals(source, pass, target) {
                    Some(pair) => pair,
                    None => continue,
                },
            };

            self.seen.push(other);
            self.testing[ip] = true;
            let result = self.flood(&source, Some(&target), other);
            self.testing[ip] = false;
            result?;
        }
        Ok(())
    }
}

/// Compute leaf or zone visibility. Writes each leaf's logical index.
pub fn build_visibility(model: &mut BspModel, graph: &PortalGraph, by_zone: bool) -> BuildResult<VisibilityMatrix> {
    let num_leaves = model.leaves.len();
    check!(
        Logic,
        graph.num_leaves() >= num_leaves,
        "portal graph knows {} leaves, model has {}",
        graph.num_leaves(),
        num_leaves
    );

    let (size, logical): (usize, Vec<usize>) = if by_zone {
        (MAX_ZONES, model.leaves.iter().map(|l| l.i_zone as usize).collect())
    } else {
        (num_leaves, (0..num_leaves).collect())
    };
    for (leaf, &l) in model.leaves.iter_mut().zip(logical.iter()) {
        leaf.i_logical = l;
    }

    let matrix = visibility_for_graph(graph, logical, size)?;
    com_dprintf(&format!(
        "Visibility: {} logical leaves, {} visible pairs\n",
        size,
        matrix.visible_pairs()
    ));
    Ok(matrix)
}

/// Flood every leaf of `graph` into a matrix indexed through `logical`.
pub fn visibility_for_graph(graph: &PortalGraph, logical: Vec<usize>, size: usize) -> BuildResult<VisibilityMatrix> {
    let n = logical.len();
    let rows: Vec<BuildResult<LeafRow>> = if n >= PARALLEL_LEAF_THRESHOLD {
        (0..n).into_par_iter().map(|src| VisFlood::flood_leaf(graph, src)).collect()
    } else {
        (0..n).map(|src| VisFlood::flood_leaf(graph, src)).collect()
    };

    let mut matrix = VisibilityMatrix::new(size);
    let mut hops = 0;
    let mut task = SlowTask::begin("Computing visibility");
    for (src, row) in rows.into_iter().enumerate() {
        task.update(src, n);
        let row = row?;
        hops += row.hops;
        for other in row.seen {
            matrix.set(logical[src], logical[other]);
        }
    }
    task.end();
    com_dprintf(&format!("Visibility: {} portal hops\n", hops));
    Ok(matrix)
}

/// Fill each zone's visibility mask from the matrix.
pub fn apply_zone_visibility(model: &mut BspModel, matrix: &VisibilityMatrix) {
    for (z, zone) in model.zones.iter_mut().enumerate() {
        zone.visibility = 1u64 << z;
    }
    let leaves = model.leaves.clone();
    for a in &leaves {
        for b in &leaves {
            if matrix.get(a.i_logical, b.i_logical) {
                model.zones[a.i_zone as usize].visibility |= 1u64 << b.i_zone;
            }
        }
    }
}

// ============================================================
// Point-source visibility
// ============================================================

/// Leaves a point light at `point` can reach through portals within `radius`.
pub fn point_visibility(model: &BspModel, graph: &PortalGraph, point: &Vec3, radius: f32) -> BuildResult<Vec<usize>> {
    match model.point_leaf(point).and_then(|lp| lp.i_leaf) {
        Some(leaf) => point_visibility_from(graph, leaf, point, radius),
        None => Ok(Vec::new()),
    }
}

pub fn point_visibility_from(graph: &PortalGraph, leaf: usize, point: &Vec3, radius: f32) -> BuildResult<Vec<usize>> {
    let mut lit = vec![false; graph.num_leaves()];
    let mut testing = vec![false; graph.portals.len()];
    lit[leaf] = true;
    point_flood(graph, point, radius, leaf, None, &mut lit, &mut testing)?;
    Ok(lit.iter().enumerate().filter(|(_, &l)| l).map(|(i, _)| i).collect())
}

fn point_flood(
    graph: &PortalGraph,
    point: &Vec3,
    radius: f32,
    leaf: usize,
    window: Option<&Poly>,
    lit: &mut Vec<bool>,
    testing: &mut Vec<bool>,
) -> BuildResult<()> {
    let portals: Vec<usize> = graph.leaf_portals(leaf).collect();
    for ip in portals {
        if testing[ip] {
            continue;
        }
        let other = graph.other_leaf(ip, leaf)?;
        let mut target = graph.oriented_from(ip, leaf);
        if target.plane().plane_dot(point) > -ON_EPSILON {
            continue; // point is not behind this portal
        }
        if point_poly_distance(point, &target) > radius {
            continue;
        }
        if let Some(w) = window {
            match clip_to_frustum(target, point, w) {
                Some(t) => target = t,
                None => continue,
            }
        }
        lit[other] = true;
        testing[ip] = true;
        let result = point_flood(graph, point, radius, other, Some(&target), lit, testing);
        testing[ip] = false;
        result?;
    }
    Ok(())
}

/// Clip `target` to the shadow volume cast from `point` through `window`.
fn clip_to_frustum(mut target: Poly, point: &Vec3, window: &Poly) -> Option<Poly> {
    let center = window.center();
    let n = window.vertices.len();
    for i in 0..n {
        let a = vector_subtract(&window.vertices[i], point);
        let b = vector_subtract(&window.vertices[(i + 1) % n], point);
        let mut normal = cross_product(&a, &b);
        if vector_normalize(&mut normal) < MIN_CLIP_CROSS {
            continue;
        }
        let mut plane = Plane::new(normal, dot_product(point, &normal));
        if plane.plane_dot(&center) < 0.0 {
            plane = plane.flip();
        }
        target = target.clip_front(&plane)?;
    }
    Some(target)
}

/// Distance from a point to the closest point of a convex polygon.
pub fn point_poly_distance(p: &Vec3, poly: &Poly) -> f32 {
    let plane = poly.plane();
    let d = plane.plane_dot(p);
    let q = vector_ma(p, -d, &plane.normal);

    let n = poly.vertices.len();
    let mut inside = n >= 3;
    let mut best = f32::MAX;
    for i in 0..n {
        let a = poly.vertices[i];
        let b = poly.vertices[(i + 1) % n];
        let edge = vector_subtract(&b, &a);
        let rel = vector_subtract(&q, &a);
        if dot_product(&cross_product(&edge, &rel), &plane.normal) < 0.0 {
            inside = false;
        }
        // closest point on the segment
        let len2 = vector_length_squared(&edge);
        let t = if len2 > 0.0 {
            (dot_product(&vector_subtract(p, &a), &edge) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let closest = vector_ma(&a, t, &edge);
        best = best.min(vector_distance_squared(p, &closest).sqrt());
    }
    if inside {
        d.abs()
    } else {
        best
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zb_portal::PortalGraph;
    use crate::zb_zone::{LeafAssigner, ZoneMerger};
    use levelbake_common::prefab;
    use rand::Rng;

    /// Square in the x = `x` plane facing +x.
    fn window(x: f32, y0: f32, y1: f32, z0: f32, z1: f32) -> Poly {
        Poly::new(vec![[x, y0, z0], [x, y1, z0], [x, y1, z1], [x, y0, z1]])
    }

    /// Leaves 0..3 in a row behind staggered windows.
    fn staggered_chain() -> PortalGraph {
        let mut graph = PortalGraph::new(1, 4);
        graph.add_portal(window(0.0, 0.0, 10.0, 0.0, 10.0), 0, 1, 0, 0).unwrap();
        graph.add_portal(window(100.0, 50.0, 60.0, 0.0, 10.0), 0, 2, 1, 0).unwrap();
        graph.add_portal(window(200.0, 200.0, 210.0, 0.0, 10.0), 0, 3, 2, 0).unwrap();
        graph
    }

    #[test]
    fn test_sheet_wrapping_culls_offset_target() {
        let source = window(0.0, 0.0, 10.0, 0.0, 10.0);
        let pass = window(100.0, 50.0, 60.0, 0.0, 10.0);
        let aligned = window(200.0, 100.0, 110.0, 0.0, 10.0);
        let offset = window(200.0, 200.0, 210.0, 0.0, 10.0);
        assert!(clip_portals(source.clone(), &pass, aligned).is_some());
        assert!(clip_portals(source, &pass, offset).is_none());
    }

    #[test]
    fn test_sheet_wrapping_keeps_straight_line() {
        let source = window(0.0, 0.0, 64.0, 0.0, 64.0);
        let pass = window(100.0, 0.0, 64.0, 0.0, 64.0);
        let target = window(200.0, 0.0, 64.0, 0.0, 64.0);
        let (front, back) = clip_portals(source.clone(), &pass, target.clone()).unwrap();
        assert!((front.area() - source.area()).abs() < 1.0);
        assert!((back.area() - target.area()).abs() < 1.0);
    }

    #[test]
    fn test_degenerate_edges_are_skipped() {
        // a sliver source offers no reliable separating plane
        let sliver = window(0.0, 0.0, 0.1, 0.0, 0.1);
        let pass = window(100.0, 0.0, 64.0, 0.0, 64.0);
        let target = window(200.0, 500.0, 564.0, 0.0, 64.0);
        let clipped = clip_to_sheet_wrapping(target.clone(), &sliver, &pass, false).unwrap();
        assert_eq!(clipped, target);
    }

    #[test]
    fn test_staggered_chain_visibility() {
        let graph = staggered_chain();
        let m = visibility_for_graph(&graph, (0..4).collect(), 4).unwrap();
        assert!(m.get(0, 1) && m.get(1, 2) && m.get(2, 3));
        assert!(m.get(0, 2));
        assert!(m.get(1, 3));
        assert!(!m.get(0, 3));
        for a in 0..4 {
            assert!(m.get(a, a));
            for b in 0..4 {
                assert_eq!(m.get(a, b), m.get(b, a));
            }
        }
        assert_eq!(m.visible_pairs(), 5);
    }

    #[test]
    fn test_straight_corridor_sees_through() {
        let mut graph = PortalGraph::new(1, 4);
        for (i, x) in [0.0, 100.0, 200.0].iter().enumerate() {
            graph.add_portal(window(*x, 0.0, 64.0, 0.0, 64.0), 0, i + 1, i, 0).unwrap();
        }
        let m = visibility_for_graph(&graph, (0..4).collect(), 4).unwrap();
        assert!(m.get(0, 3));
        assert_eq!(m.visible_pairs(), 6);
    }

    #[test]
    fn test_long_corridor_floods_in_parallel() {
        let n = PARALLEL_LEAF_THRESHOLD + 6;
        let mut graph = PortalGraph::new(1, n);
        for i in 0..n - 1 {
            graph.add_portal(window(100.0 * i as f32, 0.0, 64.0, 0.0, 64.0), 0, i + 1, i, 0).unwrap();
        }
        let m = visibility_for_graph(&graph, (0..n).collect(), n).unwrap();
        assert!(m.get(0, n - 1) && m.get(n - 1, 0));
        assert_eq!(m.visible_pairs(), n * (n - 1) / 2);
    }

    #[test]
    fn test_doorway_zones_mutually_visible() {
        let mut model = prefab::split_room([0.0; 3], [512.0, 256.0, 128.0], 256.0, true);
        LeafAssigner::assign(&mut model);
        let graph = PortalGraph::build(&model).unwrap();
        let mut merger = ZoneMerger::from_leaves(&model);
        merger.merge(&graph);
        merger.apply(&mut model);
        assert_eq!(model.num_zones, 2);

        let m = build_visibility(&mut model, &graph, true).unwrap();
        assert_eq!(m.size, MAX_ZONES);
        assert!(m.get(1, 2) && m.get(2, 1));
        assert!(!m.get(1, 3));
        apply_zone_visibility(&mut model, &m);
        assert_eq!(model.zones[1].visibility, (1 << 1) | (1 << 2));

        let by_leaf = build_visibility(&mut model, &graph, false).unwrap();
        assert_eq!(by_leaf.size, 2);
        assert!(by_leaf.get(0, 1));
    }

    #[test]
    fn test_random_chains_stay_symmetric() {
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let n = rng.gen_range(3..7);
            let mut graph = PortalGraph::new(1, n);
            for i in 0..n - 1 {
                let y = rng.gen_range(-200.0..200.0);
                let z = rng.gen_range(-200.0..200.0);
                let w = window(100.0 * i as f32, y, y + 32.0, z, z + 32.0);
                graph.add_portal(w, 0, i + 1, i, 0).unwrap();
            }
            let m = visibility_for_graph(&graph, (0..n).collect(), n).unwrap();
            for a in 0..n {
                assert!(m.get(a, a));
                if a + 2 <= n - 1 {
                    assert!(m.get(a, a + 2));
                }
                for b in 0..n {
                    assert_eq!(m.get(a, b), m.get(b, a));
                }
            }
        }
    }

    #[test]
    fn test_compress_roundtrip_and_errors() {
        let row = [0u8, 0, 0, 5, 0, 0xff, 0, 0];
        let packed = compress_row(&row);
        assert_eq!(packed, vec![0, 3, 5, 0, 1, 0xff, 0, 2]);
        let (unpacked, used) = decompress_row(&packed, row.len()).unwrap();
        assert_eq!(unpacked, row);
        assert_eq!(used, packed.len());
        assert!(decompress_row(&[0], 4).is_err());
        assert!(decompress_row(&[1, 2], 4).is_err());

        // long zero runs split at 255
        let zeros = vec![0u8; 600];
        assert_eq!(compress_row(&zeros), vec![0, 255, 0, 255, 0, 90]);
    }

    #[test]
    fn test_matrix_persistence() {
        let graph = staggered_chain();
        let m = visibility_for_graph(&graph, (0..4).collect(), 4).unwrap();
        let bytes = m.to_bytes();
        let back = VisibilityMatrix::from_bytes(&bytes).unwrap();
        assert_eq!(back, m);
        assert!(VisibilityMatrix::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        assert!(VisibilityMatrix::from_bytes(&[1, 0]).is_err());
    }

    #[test]
    fn test_matrix_rejects_oversized_header() {
        assert!(VisibilityMatrix::from_bytes(&[0xff, 0xff, 0xff, 0x7f]).is_err());
        assert!(VisibilityMatrix::from_bytes(&[0xff, 0xff, 0xff, 0xff, 0, 255]).is_err());
        // an empty matrix is just the header
        let empty = VisibilityMatrix::from_bytes(&[0, 0, 0, 0]).unwrap();
        assert_eq!(empty.size, 0);
    }

    #[test]
    fn test_point_light_radius_and_frustum() {
        let graph = staggered_chain();
        // behind the first window, the beam misses the second
        let lit = point_visibility_from(&graph, 0, &[-50.0, 5.0, 5.0], 10000.0).unwrap();
        assert_eq!(lit, vec![0, 1]);
        let lit = point_visibility_from(&graph, 0, &[-50.0, 5.0, 5.0], 20.0).unwrap();
        assert_eq!(lit, vec![0]);

        let mut model = prefab::split_room([0.0; 3], [512.0, 256.0, 128.0], 256.0, true);
        LeafAssigner::assign(&mut model);
        let graph = PortalGraph::build(&model).unwrap();
        assert_eq!(point_visibility(&model, &graph, &[100.0, 128.0, 64.0], 1000.0).unwrap().len(), 2);
        assert_eq!(point_visibility(&model, &graph, &[100.0, 128.0, 64.0], 100.0).unwrap().len(), 1);
        assert!(point_visibility(&model, &graph, &[100.0, 128.0, -64.0], 1000.0).unwrap().is_empty());
    }

    #[test]
    fn test_point_poly_distance() {
        let w = window(0.0, 0.0, 10.0, 0.0, 10.0);
        assert!((point_poly_distance(&[-5.0, 5.0, 5.0], &w) - 5.0).abs() < 1e-4);
        assert!((point_poly_distance(&[0.0, 13.0, 14.0], &w) - 5.0).abs() < 1e-4);
    }
}

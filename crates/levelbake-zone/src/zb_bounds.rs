// zb_bounds.rs — per-node render bounds and inside-leaf collision hulls

use levelbake_common::bsp_model::*;
use levelbake_common::check;
use levelbake_common::common::com_dprintf;
use levelbake_common::error::BuildResult;
use levelbake_common::poly::*;
use levelbake_common::q_shared::*;

/// Outward-facing faces of the world cube.
pub fn world_hull() -> Vec<Poly> {
    let min = [-HALF_WORLD_MAX; 3];
    let max = [HALF_WORLD_MAX; 3];
    let mut faces = Vec::with_capacity(6);
    for axis in 0..3 {
        let u = (axis + 1) % 3;
        let v = (axis + 2) % 3;
        for (positive, at) in [(false, min[axis]), (true, max[axis])] {
            let corner = |cu: f32, cv: f32| {
                let mut p = [0.0f32; 3];
                p[axis] = at;
                p[u] = cu;
                p[v] = cv;
                p
            };
            let mut vertices = vec![
                corner(min[u], min[v]),
                corner(max[u], min[v]),
                corner(max[u], max[v]),
                corner(min[u], max[v]),
            ];
            if !positive {
                vertices.reverse();
            }
            faces.push(Poly::new(vertices));
        }
    }
    faces
}

fn hull_bbox(hull: &[Poly]) -> BBox {
    let mut b = BBox::cleared();
    for face in hull {
        for v in &face.vertices {
            b.add_point(v);
        }
    }
    b
}

/// Face closing `hull` on `plane`, facing along the plane normal.
fn cap_face(hull: &[Poly], plane: &Plane) -> Option<Poly> {
    let mut cap = Poly::infinite(plane);
    for face in hull {
        cap = cap.clip_front(&face.plane().flip())?;
    }
    Some(cap)
}

pub struct BoundsBuilder;

impl BoundsBuilder {
    /// Filter the world cube through the tree. Returns (bounds, hulls).
    pub fn build(model: &mut BspModel) -> BuildResult<(usize, usize)> {
        model.bounds.clear();
        model.leaf_hulls.clear();
        for node in &mut model.nodes {
            node.i_render_bound = None;
            node.i_collision_bound = [None; 2];
        }
        if model.nodes.is_empty() {
            return Ok((0, 0));
        }

        let root_outside = model.root_outside;
        Self::filter_r(model, 0, world_hull(), root_outside, None);

        // nodes off the partition, coplanar fragments mostly
        for i in 0..model.nodes.len() {
            if model.nodes[i].i_render_bound.is_none() {
                let mut b = BBox::cleared();
                for v in &model.node_poly(i).vertices {
                    b.add_point(v);
                }
                model.nodes[i].i_render_bound = Some(model.bounds.len());
                model.bounds.push(b);
            }
        }

        check!(
            Output,
            model.bounds.len() == model.nodes.len(),
            "{} render bounds for {} nodes",
            model.bounds.len(),
            model.nodes.len()
        );
        com_dprintf(&format!(
            "Bounds: {} render bounds, {} collision hulls\n",
            model.bounds.len(),
            model.leaf_hulls.len()
        ));
        Ok((model.bounds.len(), model.leaf_hulls.len()))
    }

    fn filter_r(model: &mut BspModel, i_node: usize, hull: Vec<Poly>, outside: bool, parent: Option<usize>) {
        let ib = match model.nodes[i_node].i_render_bound {
            Some(ib) => ib,
            None => {
                model.bounds.push(BBox::cleared());
                let ib = model.bounds.len() - 1;
                model.nodes[i_node].i_render_bound = Some(ib);
                ib
            }
        };

        let plane = model.nodes[i_node].plane;
        let mut front = Vec::new();
        let mut back = Vec::new();
        for face in &hull {
            match face.split_with_plane(&plane) {
                SplitResult::Front => front.push(face.clone()),
                SplitResult::Back => back.push(face.clone()),
                SplitResult::Coplanar => {
                    if dot_product(&face.normal, &plane.normal) > 0.0 {
                        back.push(face.clone());
                    } else {
                        front.push(face.clone());
                    }
                }
                SplitResult::Split(f, b) => {
                    front.push(f);
                    back.push(b);
                }
            }
        }

        if !front.is_empty() && !back.is_empty() {
            if let Some(mut cap) = cap_face(&hull, &plane) {
                cap.i_brush_poly = model.surf(i_node).i_brush_poly;
                front.push(cap.reversed());
                back.push(cap);
            }
        }

        for (side, piece) in [(SIDE_FRONT, front), (SIDE_BACK, back)] {
            if piece.is_empty() {
                continue;
            }
            let child_out = model.child_outside(i_node, side, outside);
            match model.nodes[i_node].child(side) {
                Some(child) => Self::filter_r(model, child, piece, child_out, Some(i_node)),
                None if child_out => {
                    let b = hull_bbox(&piece);
                    model.bounds[ib].add_box(&b);
                }
                None => {
                    let mut brush_polys: Vec<i32> = Vec::new();
                    for face in &piece {
                        let id = face.i_brush_poly.map_or(INDEX_NONE, |p| p as i32);
                        if !brush_polys.contains(&id) {
                            brush_polys.push(id);
                        }
                    }
                    model.nodes[i_node].i_collision_bound[side] = Some(model.leaf_hulls.len());
                    model.leaf_hulls.push(ConvolutionHull {
                        brush_polys,
                        bbox: hull_bbox(&piece).to_floats(),
                    });
                }
            }
        }

        // parents only take the child minimum
        if let Some(ip) = parent {
            let Some(pb) = model.nodes[ip].i_render_bound else { return };
            let child = model.bounds[ib];
            let pbox = &mut model.bounds[pb];
            for k in 0..3 {
                pbox.min[k] = pbox.min[k].min(child.min[k]);
            }
            pbox.is_valid = true;
        }
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use levelbake_common::prefab;

    #[test]
    fn test_world_hull_faces_outward() {
        let hull = world_hull();
        assert_eq!(hull.len(), 6);
        for face in &hull {
            let c = face.center();
            assert!(dot_product(&face.normal, &c) > 0.0);
            assert!(face.i_brush_poly.is_none());
        }
        let b = hull_bbox(&hull);
        assert_eq!(b.min, [-HALF_WORLD_MAX; 3]);
    }

    #[test]
    fn test_box_room_bounds_and_hulls() {
        let mut model = prefab::box_room([0.0; 3], [512.0, 256.0, 128.0]);
        let (bounds, hulls) = BoundsBuilder::build(&mut model).unwrap();
        assert_eq!(bounds, 6);
        assert_eq!(hulls, 6);
        for node in &model.nodes {
            assert!(node.i_render_bound.is_some());
            assert!(node.i_collision_bound[SIDE_BACK].is_some());
            assert!(node.i_collision_bound[SIDE_FRONT].is_none());
        }

        // the room itself is the last front leaf
        let last = model.nodes.len() - 1;
        let room = model.bounds[model.nodes[last].i_render_bound.unwrap()];
        for k in 0..3 {
            assert!(room.min[k].abs() < 0.01);
        }
        assert!((room.max[0] - 512.0).abs() < 0.01);
        assert!((room.max[2] - 128.0).abs() < 0.01);

        // only the minimum climbs to the root
        let root = model.bounds[model.nodes[0].i_render_bound.unwrap()];
        assert!(root.is_valid);
        assert!(root.min[0].abs() < 0.01);
        assert_eq!(root.max, [f32::MIN; 3]);
    }

    #[test]
    fn test_hull_records_cap_brush_poly() {
        let mut model = prefab::box_room([0.0; 3], [512.0, 256.0, 128.0]);
        BoundsBuilder::build(&mut model).unwrap();

        let floor = &model.leaf_hulls[model.nodes[0].i_collision_bound[SIDE_BACK].unwrap()];
        assert!(floor.brush_polys.contains(&INDEX_NONE));
        assert!(floor.brush_polys.contains(&0));
        assert!(floor.bbox[5].abs() < 0.01);
        assert_eq!(floor.bbox[2], -HALF_WORLD_MAX);

        // the y wall hull is already capped by floor and ceiling
        let wall = &model.leaf_hulls[model.nodes[2].i_collision_bound[SIDE_BACK].unwrap()];
        assert!(wall.bbox[2].abs() < 0.01);
        assert!((wall.bbox[5] - 128.0).abs() < 0.01);
        assert!(wall.brush_polys.contains(&0) && wall.brush_polys.contains(&1));
    }

    #[test]
    fn test_divider_side_bounds() {
        let mut model = prefab::split_room([0.0; 3], [512.0, 256.0, 128.0], 256.0, true);
        BoundsBuilder::build(&mut model).unwrap();
        assert_eq!(model.bounds.len(), model.nodes.len());
        let outside_leaves = model.leaf_sides().iter().filter(|s| s.2).count();
        let inside_leaves = model.leaf_sides().len() - outside_leaves;
        assert_eq!(model.leaf_hulls.len(), inside_leaves);
    }

    #[test]
    fn test_rebuild_replaces_previous_bounds() {
        let mut model = prefab::box_room([0.0; 3], [64.0; 3]);
        let first = BoundsBuilder::build(&mut model).unwrap();
        let second = BoundsBuilder::build(&mut model).unwrap();
        assert_eq!(first, second);
    }
}

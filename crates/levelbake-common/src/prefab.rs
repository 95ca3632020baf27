// prefab.rs — hand-built BSPs for known room layouts

use crate::bsp_model::BspModel;
use crate::poly::Poly;
use crate::q_shared::*;

/// Axis-aligned rectangle on the plane `axis = at`, spanning `min..max` on
/// the other two axes, wound counter-clockwise around +axis or -axis.
pub fn face(min: &Vec3, max: &Vec3, axis: usize, positive: bool, at: f32) -> (Plane, Poly) {
    let u = (axis + 1) % 3;
    let v = (axis + 2) % 3;
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
    let mut normal = [0.0f32; 3];
    normal[axis] = 1.0;
    if !positive {
        vertices.reverse();
        normal[axis] = -1.0;
    }
    let plane = Plane::new(normal, dot_product(&normal, &corner(0.0, 0.0)));
    let mut poly = Poly::new(vertices);
    poly.normal = normal;
    (plane, poly)
}

/// Solid-world box room: six inward-facing faces chained through their
/// fronts, the room itself is the last front leaf.
pub fn box_room(min: Vec3, max: Vec3) -> BspModel {
    let mut model = BspModel::new(false);
    let mut brush_poly = 0;
    build_cell(&mut model, &min, &max, true, true, &mut brush_poly);
    model
}

/// Box room cut in two by a non-solid divider at `x`. A blocked divider
/// carries the PORTAL flag and separates zones.
pub fn split_room(min: Vec3, max: Vec3, x: f32, blocked: bool) -> BspModel {
    room_row(min, max, &[(x, blocked)])
}

/// Box room cut along x into consecutive cells by non-solid dividers.
pub fn room_row(min: Vec3, max: Vec3, cuts: &[(f32, bool)]) -> BspModel {
    let mut model = BspModel::new(false);
    let mut brush_poly = 0;
    build_row(&mut model, &min, &max, cuts, true, &mut brush_poly);
    model
}

fn build_row(
    model: &mut BspModel,
    min: &Vec3,
    max: &Vec3,
    cuts: &[(f32, bool)],
    outer_min: bool,
    brush_poly: &mut usize,
) -> usize {
    let Some(&(x, blocked)) = cuts.first() else {
        return build_cell(model, min, max, outer_min, true, brush_poly);
    };

    let (plane, mut poly) = face(min, max, 0, true, x);
    let mut flags = PolyFlags::NOT_SOLID | PolyFlags::INVISIBLE;
    if blocked {
        flags |= PolyFlags::PORTAL;
    }
    poly.i_brush_poly = Some(*brush_poly);
    *brush_poly += 1;
    let divider = model.add_node(plane, &poly, flags);

    let back = build_cell(model, min, &[x, max[1], max[2]], outer_min, false, brush_poly);
    let front = build_row(model, &[x, min[1], min[2]], max, &cuts[1..], false, brush_poly);
    model.nodes[divider].i_back = Some(back);
    model.nodes[divider].i_front = Some(front);
    divider
}

/// Chain of inward faces for one cell; x walls only on the outer ends.
fn build_cell(
    model: &mut BspModel,
    min: &Vec3,
    max: &Vec3,
    outer_min: bool,
    outer_max: bool,
    brush_poly: &mut usize,
) -> usize {
    let mut faces = vec![
        face(min, max, 2, true, min[2]),
        face(min, max, 2, false, max[2]),
        face(min, max, 1, true, min[1]),
        face(min, max, 1, false, max[1]),
    ];
    if outer_min {
        faces.push(face(min, max, 0, true, min[0]));
    }
    if outer_max {
        faces.push(face(min, max, 0, false, max[0]));
    }

    let mut first = None;
    let mut prev: Option<usize> = None;
    for (plane, mut poly) in faces {
        poly.i_brush_poly = Some(*brush_poly);
        *brush_poly += 1;
        let i = model.add_node(plane, &poly, PolyFlags::empty());
        match prev {
            Some(p) => model.nodes[p].i_front = Some(i),
            None => first = Some(i),
        }
        prev = Some(i);
    }
    first.unwrap_or(0)
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_winding_matches_normal() {
        let min = [0.0, 0.0, 0.0];
        let max = [64.0, 32.0, 16.0];
        for axis in 0..3 {
            for positive in [true, false] {
                let (plane, poly) = face(&min, &max, axis, positive, 8.0);
                let mut check = poly.clone();
                assert!(check.calc_normal());
                assert!(dot_product(&check.normal, &plane.normal) > 0.999);
                for v in &poly.vertices {
                    assert!(plane.plane_dot(v).abs() < 1e-4);
                }
            }
        }
    }

    #[test]
    fn test_room_row_structure() {
        let model = room_row([0.0; 3], [768.0, 256.0, 128.0], &[(256.0, true), (512.0, false)]);
        model.validate().unwrap();
        assert!(model.node_flags(0).contains(PolyFlags::PORTAL));
        let second = model.nodes[0].i_front.unwrap();
        assert!(!model.node_flags(second).contains(PolyFlags::PORTAL));
        assert!(model.node_flags(second).contains(PolyFlags::NOT_SOLID));
        let outside = model.leaf_sides().iter().filter(|s| s.2).count();
        assert_eq!(outside, 3);
        // every surface has its own brush polygon
        let mut ids: Vec<_> = model.surfs.iter().filter_map(|s| s.i_brush_poly).collect();
        ids.dedup();
        assert_eq!(ids.len(), model.surfs.len());
    }
}

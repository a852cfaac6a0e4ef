use earcutr::earcut;
use foundation::math::Vec3;
use scene::{GeometryGroup, MeshGeometry};

/// Material slot of cap triangles.
pub const CAP_MATERIAL: u32 = 0;
/// Material slot of wall triangles.
pub const SIDE_MATERIAL: u32 = 1;

/// Extrude one closed planar ring along +Z by `depth`.
///
/// Caps sit at `z = 0` (facing -Z) and `z = depth` (facing +Z); walls get flat
/// normals. Indices are ordered caps first (group 0), then walls (group 1).
/// Returns `None` for rings that cannot form a face.
pub fn extrude_ring(ring: &[[f64; 2]], depth: f64) -> Option<MeshGeometry> {
    let mut pts: Vec<[f64; 2]> = ring
        .iter()
        .copied()
        .filter(|p| p[0].is_finite() && p[1].is_finite())
        .collect();
    drop_closing_duplicate(&mut pts);
    pts.dedup_by(|a, b| (a[0] - b[0]).abs() < 1e-12 && (a[1] - b[1]).abs() < 1e-12);
    if pts.len() < 3 {
        return None;
    }
    if signed_area(&pts) < 0.0 {
        pts.reverse();
    }

    let coords: Vec<f64> = pts.iter().flat_map(|p| [p[0], p[1]]).collect();
    let cap = earcut(&coords, &[], 2).ok()?;
    if cap.is_empty() {
        return None;
    }

    let n = pts.len() as u32;
    let mut positions = Vec::with_capacity(pts.len() * 6);
    let mut normals = Vec::with_capacity(pts.len() * 6);
    let mut uvs = Vec::with_capacity(pts.len() * 6);
    let mut indices = Vec::with_capacity(cap.len() * 2 + pts.len() * 6);

    // Bottom cap: 0..n, top cap: n..2n.
    for (z, nz) in [(0.0, -1.0), (depth, 1.0)] {
        for p in &pts {
            positions.push(Vec3::new(p[0], p[1], z));
            normals.push(Vec3::new(0.0, 0.0, nz));
            uvs.push([p[0], p[1]]);
        }
    }
    let cap: Vec<[u32; 3]> = cap
        .chunks_exact(3)
        .map(|t| {
            let (a, b, c) = (t[0], t[1], t[2]);
            if signed_area(&[pts[a], pts[b], pts[c]]) < 0.0 {
                [a as u32, c as u32, b as u32]
            } else {
                [a as u32, b as u32, c as u32]
            }
        })
        .collect();
    for [a, b, c] in &cap {
        indices.extend_from_slice(&[*a, *c, *b]);
    }
    for [a, b, c] in &cap {
        indices.extend_from_slice(&[a + n, b + n, c + n]);
    }
    let cap_count = indices.len() as u32;

    let mut along = 0.0;
    for i in 0..pts.len() {
        let a = pts[i];
        let b = pts[(i + 1) % pts.len()];
        let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
        let len = (dx * dx + dy * dy).sqrt();
        // Counter-clockwise ring: outward normal is the edge rotated clockwise.
        let normal = Vec3::new(dy, -dx, 0.0).normalize().unwrap_or(Vec3::ZERO);
        let base = positions.len() as u32;
        for (p, z, u) in [
            (a, 0.0, along),
            (b, 0.0, along + len),
            (b, depth, along + len),
            (a, depth, along),
        ] {
            positions.push(Vec3::new(p[0], p[1], z));
            normals.push(normal);
            uvs.push([u, z]);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        along += len;
    }
    let side_count = indices.len() as u32 - cap_count;

    Some(
        MeshGeometry::new(positions, normals, uvs, indices).with_groups(vec![
            GeometryGroup {
                start: 0,
                count: cap_count,
                material_index: CAP_MATERIAL,
            },
            GeometryGroup {
                start: cap_count,
                count: side_count,
                material_index: SIDE_MATERIAL,
            },
        ]),
    )
}

/// Shoelace area; positive for counter-clockwise rings.
pub fn signed_area(points: &[[f64; 2]]) -> f64 {
    let mut sum = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        sum += a[0] * b[1] - b[0] * a[1];
    }
    sum / 2.0
}

fn drop_closing_duplicate(points: &mut Vec<[f64; 2]>) {
    if points.len() >= 2
        && let (Some(first), Some(last)) = (points.first(), points.last())
        && (first[0] - last[0]).abs() < 1e-9
        && (first[1] - last[1]).abs() < 1e-9
    {
        points.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::{CAP_MATERIAL, SIDE_MATERIAL, extrude_ring, signed_area};

    const SQUARE_CW: [[f64; 2]; 5] = [[0.0, 0.0], [0.0, 2.0], [2.0, 2.0], [2.0, 0.0], [0.0, 0.0]];

    #[test]
    fn square_prism_layout() {
        let g = extrude_ring(&SQUARE_CW, 5.0).expect("prism");
        // 2 cap triangles per cap, 2 per wall.
        assert_eq!(g.triangle_count(), 4 + 8);
        assert_eq!(g.groups.len(), 2);
        assert_eq!(g.groups[0].material_index, CAP_MATERIAL);
        assert_eq!(g.groups[0].count, 12);
        assert_eq!(g.groups[1].material_index, SIDE_MATERIAL);
        assert_eq!(g.groups[1].count, 24);
        assert_eq!(g.bounds.min, [0.0, 0.0, 0.0]);
        assert_eq!(g.bounds.max, [2.0, 2.0, 5.0]);
    }

    #[test]
    fn wall_normals_point_outward() {
        let g = extrude_ring(&SQUARE_CW, 1.0).expect("prism");
        let center = [1.0, 1.0];
        for (p, n) in g.positions.iter().zip(&g.normals) {
            if n.z != 0.0 {
                continue;
            }
            let out = (p.x - center[0]) * n.x + (p.y - center[1]) * n.y;
            assert!(out > 0.0, "inward wall normal at {p:?}");
        }
    }

    #[test]
    fn top_cap_faces_up() {
        let g = extrude_ring(&SQUARE_CW, 1.0).expect("prism");
        let top = g.groups[0].count as usize / 2;
        for tri in g.indices[top..g.groups[0].count as usize].chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| g.positions[i as usize]);
            assert!((b - a).cross(c - a).z > 0.0);
        }
    }

    #[test]
    fn degenerate_rings_are_rejected() {
        assert!(extrude_ring(&[[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]], 1.0).is_none());
        assert!(extrude_ring(&[], 1.0).is_none());
        assert!(signed_area(&SQUARE_CW[..4]) < 0.0);
    }
}

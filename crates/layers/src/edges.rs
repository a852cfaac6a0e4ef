use std::collections::BTreeMap;

use foundation::math::Vec3;
use scene::MeshGeometry;

const WELD_PRECISION: f64 = 1e4;

type VertexKey = [i64; 3];

fn key(p: Vec3) -> VertexKey {
    [
        (p.x * WELD_PRECISION).round() as i64,
        (p.y * WELD_PRECISION).round() as i64,
        (p.z * WELD_PRECISION).round() as i64,
    ]
}

/// Edges whose adjacent faces bend by more than `threshold_deg`, plus
/// boundary edges with a single face.
///
/// Vertices are welded by position first, so split-normal seams do not
/// count as boundaries.
///
/// Ordering contract:
/// - Output follows welded-edge key order (lexicographic by endpoint keys).
pub fn feature_edges(geometry: &MeshGeometry, threshold_deg: f64) -> Vec<[Vec3; 2]> {
    let cos_threshold = threshold_deg.to_radians().cos();
    // Edge key (ordered endpoint keys) -> (endpoints, first face normal, second face normal).
    let mut edges: BTreeMap<(VertexKey, VertexKey), ([Vec3; 2], Vec3, Option<Vec3>)> =
        BTreeMap::new();

    for [a, b, c] in geometry.triangles() {
        let Some(normal) = (b - a).cross(c - a).normalize() else {
            continue;
        };
        for (p, q) in [(a, b), (b, c), (c, a)] {
            let (kp, kq) = (key(p), key(q));
            if kp == kq {
                continue;
            }
            let edge_key = if kp < kq { (kp, kq) } else { (kq, kp) };
            edges
                .entry(edge_key)
                .and_modify(|e| {
                    if e.2.is_none() {
                        e.2 = Some(normal);
                    }
                })
                .or_insert(([p, q], normal, None));
        }
    }

    edges
        .into_values()
        .filter(|(_, n0, n1)| match n1 {
            None => true,
            Some(n1) => n0.dot(*n1) <= cos_threshold,
        })
        .map(|(segment, _, _)| segment)
        .collect()
}

/// Keep edges lying entirely on the `z = depth` plane.
pub fn top_edges(edges: &[[Vec3; 2]], depth: f64, tolerance: f64) -> Vec<[Vec3; 2]> {
    edges
        .iter()
        .filter(|[a, b]| (a.z - depth).abs() < tolerance && (b.z - depth).abs() < tolerance)
        .copied()
        .collect()
}

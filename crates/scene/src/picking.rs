use foundation::bounds::Aabb3;
use foundation::math::Vec3;
use foundation::math::precision::stable_total_cmp_f64;

use crate::graph::{NodeId, SceneGraph};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.dir * t
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickHit {
    pub node: NodeId,
    /// Position of the node in the candidate slice.
    pub candidate: usize,
    pub distance: f64,
    pub point: Vec3,
}

/// Ray picking against a candidate list of mesh nodes.
///
/// Ordering contract:
/// - The closest hit along the (normalized) ray wins.
/// - Equal distances resolve to the earlier candidate.
///
/// Notes:
/// - The ray is moved into each mesh's local frame; bounds are tested first, then triangles.
/// - Nodes that are not meshes, or hidden anywhere up the tree, are skipped.
pub fn pick_meshes(graph: &SceneGraph, candidates: &[NodeId], ray: Ray) -> Option<PickHit> {
    let dir = ray.dir.normalize()?;
    let ray = Ray::new(ray.origin, dir);
    let mut best: Option<PickHit> = None;

    for (candidate, id) in candidates.iter().enumerate() {
        let Some(mesh) = graph.get(*id).and_then(|n| n.as_mesh()) else {
            continue;
        };
        if !graph.is_visible_in_tree(*id) {
            continue;
        }
        let Some(world) = graph.world_matrix(*id) else {
            continue;
        };
        let Some(inv) = world.inverse() else {
            continue;
        };

        let local_origin = inv.transform_point(ray.origin);
        let local_dir = inv.transform_point(ray.origin + ray.dir) - local_origin;
        let Some(local_dir) = local_dir.normalize() else {
            continue;
        };
        if ray_aabb_hit_t(local_origin, local_dir, &mesh.geometry.bounds).is_none() {
            continue;
        }

        let mut nearest_local: Option<f64> = None;
        for tri in mesh.geometry.triangles() {
            if let Some(t) = ray_triangle_t(local_origin, local_dir, tri)
                && nearest_local.is_none_or(|n| t < n)
            {
                nearest_local = Some(t);
            }
        }
        let Some(t_local) = nearest_local else {
            continue;
        };

        let point = world.transform_point(local_origin + local_dir * t_local);
        let distance = point.distance(ray.origin);
        let hit = PickHit {
            node: *id,
            candidate,
            distance,
            point,
        };
        best = match best {
            None => Some(hit),
            Some(b) => {
                let ord = stable_total_cmp_f64(hit.distance, b.distance)
                    .then_with(|| hit.candidate.cmp(&b.candidate));
                if ord.is_lt() { Some(hit) } else { Some(b) }
            }
        };
    }

    best
}

fn ray_aabb_hit_t(origin: Vec3, dir: Vec3, bounds: &Aabb3) -> Option<f64> {
    if bounds.is_empty() {
        return None;
    }
    let o = origin.to_array();
    let d = dir.to_array();
    let mut t_min = 0.0_f64;
    let mut t_max = f64::INFINITY;

    // Slabs intersection; returns entry distance.
    for axis in 0..3 {
        let (min, max) = (bounds.min[axis], bounds.max[axis]);
        if d[axis].abs() < 1e-12 {
            if o[axis] < min || o[axis] > max {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d[axis];
        let mut t1 = (min - o[axis]) * inv;
        let mut t2 = (max - o[axis]) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_max < t_min {
            return None;
        }
    }

    Some(t_min)
}

/// Möller–Trumbore, both faces.
fn ray_triangle_t(origin: Vec3, dir: Vec3, [a, b, c]: [Vec3; 3]) -> Option<f64> {
    const EPS: f64 = 1e-12;
    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPS {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv_det;
    (t >= 0.0).then_some(t)
}

use std::f64::consts::TAU;

use foundation::math::Vec3;

use crate::mesh::MeshGeometry;

/// Procedural shapes used by decorative layers and markers.
///
/// Planar shapes are authored in the XY plane facing +Z; cylinders run along Y
/// and are centered on the origin.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Shape {
    Plane { width: f64, height: f64 },
    Circle { radius: f64, segments: u32 },
    Ring { inner: f64, outer: f64, segments: u32 },
    Cylinder { radius: f64, height: f64, segments: u32 },
}

impl Shape {
    pub fn square(size: f64) -> Self {
        Shape::Plane {
            width: size,
            height: size,
        }
    }

    pub fn tessellate(&self) -> MeshGeometry {
        match *self {
            Shape::Plane { width, height } => plane(width, height),
            Shape::Circle { radius, segments } => ring(0.0, radius, segments.max(3)),
            Shape::Ring {
                inner,
                outer,
                segments,
            } => ring(inner, outer, segments.max(3)),
            Shape::Cylinder {
                radius,
                height,
                segments,
            } => cylinder(radius, height, segments.max(3)),
        }
    }
}

fn plane(width: f64, height: f64) -> MeshGeometry {
    let (hw, hh) = (width / 2.0, height / 2.0);
    let positions = vec![
        Vec3::new(-hw, hh, 0.0),
        Vec3::new(hw, hh, 0.0),
        Vec3::new(-hw, -hh, 0.0),
        Vec3::new(hw, -hh, 0.0),
    ];
    let normals = vec![Vec3::new(0.0, 0.0, 1.0); 4];
    let uvs = vec![[0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0]];
    MeshGeometry::new(positions, normals, uvs, vec![0, 2, 1, 2, 3, 1])
}

/// Annulus; `inner == 0` degenerates into a disc.
fn ring(inner: f64, outer: f64, segments: u32) -> MeshGeometry {
    let mut positions = Vec::new();
    let mut uvs = Vec::new();
    for i in 0..=segments {
        let a = TAU * i as f64 / segments as f64;
        let (s, c) = a.sin_cos();
        for r in [inner, outer] {
            positions.push(Vec3::new(c * r, s * r, 0.0));
            uvs.push([(c * r / outer + 1.0) / 2.0, (s * r / outer + 1.0) / 2.0]);
        }
    }
    let mut indices = Vec::new();
    for i in 0..segments {
        let a = i * 2;
        let (b, c, d) = (a + 1, a + 2, a + 3);
        indices.extend_from_slice(&[a, b, d, a, d, c]);
    }
    let normals = vec![Vec3::new(0.0, 0.0, 1.0); positions.len()];
    MeshGeometry::new(positions, normals, uvs, indices)
}

fn cylinder(radius: f64, height: f64, segments: u32) -> MeshGeometry {
    let half = height / 2.0;
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    for i in 0..=segments {
        let u = i as f64 / segments as f64;
        let (s, c) = (TAU * u).sin_cos();
        for (y, v) in [(half, 1.0), (-half, 0.0)] {
            positions.push(Vec3::new(radius * s, y, radius * c));
            normals.push(Vec3::new(s, 0.0, c));
            uvs.push([u, v]);
        }
    }
    let mut indices = Vec::new();
    for i in 0..segments {
        let a = i * 2;
        let (b, c, d) = (a + 1, a + 2, a + 3);
        indices.extend_from_slice(&[a, b, c, b, d, c]);
    }
    MeshGeometry::new(positions, normals, uvs, indices)
}

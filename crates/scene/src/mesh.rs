use foundation::bounds::Aabb3;
use foundation::math::Vec3;

/// Index range drawn with one material slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GeometryGroup {
    pub start: u32,
    pub count: u32,
    pub material_index: u32,
}

/// Indexed triangle geometry in local space.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshGeometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<[f64; 2]>,
    pub indices: Vec<u32>,
    /// Empty means a single group covering every index with material 0.
    pub groups: Vec<GeometryGroup>,
    pub bounds: Aabb3,
}

impl MeshGeometry {
    pub fn new(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        uvs: Vec<[f64; 2]>,
        indices: Vec<u32>,
    ) -> Self {
        let mut bounds = Aabb3::empty();
        for p in &positions {
            bounds.extend(*p);
        }
        Self {
            positions,
            normals,
            uvs,
            indices,
            groups: Vec::new(),
            bounds,
        }
    }

    pub fn with_groups(mut self, groups: Vec<GeometryGroup>) -> Self {
        self.groups = groups;
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            Some([
                *self.positions.get(tri[0] as usize)?,
                *self.positions.get(tri[1] as usize)?,
                *self.positions.get(tri[2] as usize)?,
            ])
        })
    }

    /// Groups to draw; synthesizes the implicit single group.
    pub fn draw_groups(&self) -> Vec<GeometryGroup> {
        if self.groups.is_empty() {
            vec![GeometryGroup {
                start: 0,
                count: self.indices.len() as u32,
                material_index: 0,
            }]
        } else {
            self.groups.clone()
        }
    }
}

/// Line topology for outline nodes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LineTopology {
    /// Independent segments: points `(0,1), (2,3), ...`.
    Segments,
    /// Closed polyline.
    Loop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineGeometry {
    pub points: Vec<Vec3>,
    pub topology: LineTopology,
}

impl LineGeometry {
    pub fn segments(points: Vec<Vec3>) -> Self {
        Self {
            points,
            topology: LineTopology::Segments,
        }
    }

    pub fn closed(points: Vec<Vec3>) -> Self {
        Self {
            points,
            topology: LineTopology::Loop,
        }
    }

    /// Flattened `[a, b]` pairs regardless of topology.
    pub fn segment_pairs(&self) -> Vec<[Vec3; 2]> {
        match self.topology {
            LineTopology::Segments => self
                .points
                .chunks_exact(2)
                .map(|pair| [pair[0], pair[1]])
                .collect(),
            LineTopology::Loop => {
                let n = self.points.len();
                if n < 2 {
                    return Vec::new();
                }
                (0..n)
                    .map(|i| [self.points[i], self.points[(i + 1) % n]])
                    .collect()
            }
        }
    }
}

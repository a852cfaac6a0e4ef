use std::collections::HashMap;
use std::rc::Rc;

use controller::RenderFrame;
use foundation::color::Rgb;
use foundation::math::{Mat4, Vec3};
use scene::{
    Blending, Lighting, LineNode, MeshGeometry, MeshNode, NodeId, NodeKind, PrimitiveNode, Shape,
    SurfaceMaterial,
};

/// Position plus a fully shaded color; lighting and fog are resolved on the
/// CPU so one shader covers every pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

/// Vertex streams for one frame, in draw order per pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawBatches {
    /// Depth-writing triangles.
    pub opaque: Vec<ColorVertex>,
    /// Alpha-blended triangles, depth-tested only.
    pub blended: Vec<ColorVertex>,
    pub additive: Vec<ColorVertex>,
    /// Line list pairs.
    pub lines: Vec<ColorVertex>,
    pub clear: Rgb,
}

impl DrawBatches {
    pub fn new(clear: Rgb) -> Self {
        Self {
            opaque: Vec::new(),
            blended: Vec::new(),
            additive: Vec::new(),
            lines: Vec::new(),
            clear,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty()
            && self.blended.is_empty()
            && self.additive.is_empty()
            && self.lines.is_empty()
    }
}

/// Tessellated decorative primitives, kept until their node is released.
#[derive(Debug, Default)]
pub struct PrimitiveCache {
    shapes: HashMap<NodeId, (Shape, Rc<MeshGeometry>)>,
}

impl PrimitiveCache {
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    fn geometry(&mut self, id: NodeId, shape: &Shape) -> Rc<MeshGeometry> {
        if let Some((cached, geometry)) = self.shapes.get(&id)
            && cached == shape
        {
            return Rc::clone(geometry);
        }
        let geometry = Rc::new(shape.tessellate());
        self.shapes.insert(id, (*shape, Rc::clone(&geometry)));
        geometry
    }

    pub fn release(&mut self, nodes: &[NodeId]) {
        for id in nodes {
            self.shapes.remove(id);
        }
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
    }
}

struct Shading<'a> {
    lighting: &'a Lighting,
    eye: Vec3,
}

impl Shading<'_> {
    fn fogged(&self, color: Rgb, world: Vec3) -> Rgb {
        let fog = &self.lighting.fog;
        let amount = fog.factor((world - self.eye).length()) as f32;
        color.lerp(fog.color, amount)
    }

    fn lit(&self, material: &SurfaceMaterial, local: Vec3, normal: Vec3) -> Rgb {
        let base = match &material.edge_gradient {
            Some(gradient) => gradient.tint(material.color, local.z),
            None => material.color,
        };
        let irradiance = self.lighting.irradiance(normal);
        let diffuse = modulate(base, irradiance).scaled(self.lighting.exposure);
        let emissive = material.emissive.scaled(material.emissive_intensity);
        add(diffuse, emissive)
    }
}

/// Flatten the visible graph into per-pass vertex streams.
///
/// Nodes draw in ascending render order; ties keep graph order.
pub fn bake_frame(frame: RenderFrame<'_>, cache: &mut PrimitiveCache) -> DrawBatches {
    let mut visible: Vec<(i32, NodeId, Mat4)> = Vec::new();
    frame.graph.visit_visible(|id, node, world| {
        if !matches!(node.kind, NodeKind::Group | NodeKind::Label(_)) {
            visible.push((node.render_order, id, *world));
        }
    });
    visible.sort_by_key(|(order, _, _)| *order);

    let shading = Shading {
        lighting: frame.lighting,
        eye: frame.camera.position,
    };
    let mut out = DrawBatches::new(frame.lighting.clear_color);
    for (_, id, world) in &visible {
        let Some(node) = frame.graph.get(*id) else {
            continue;
        };
        match &node.kind {
            NodeKind::Mesh(mesh) => bake_mesh(mesh, world, &shading, &mut out),
            NodeKind::Lines(lines) => bake_lines(lines, world, &shading, &mut out),
            NodeKind::Primitive(primitive) => {
                let geometry = cache.geometry(*id, &primitive.shape);
                bake_primitive(primitive, &geometry, world, &shading, &mut out);
            }
            NodeKind::Group | NodeKind::Label(_) => {}
        }
    }
    out
}

fn bake_mesh(mesh: &MeshNode, world: &Mat4, shading: &Shading<'_>, out: &mut DrawBatches) {
    let geometry = &mesh.geometry;
    let origin = world.transform_point(Vec3::ZERO);
    for group in geometry.draw_groups() {
        let material = mesh.materials.slot(group.material_index);
        let blended = material.transparent || material.opacity < 1.0;
        let target = if blended {
            &mut out.blended
        } else {
            &mut out.opaque
        };
        let len = geometry.indices.len();
        let start = (group.start as usize).min(len);
        let end = (start + group.count as usize).min(len);
        for &index in &geometry.indices[start..end] {
            let Some(local) = geometry.positions.get(index as usize).copied() else {
                continue;
            };
            let normal = geometry
                .normals
                .get(index as usize)
                .map(|n| world.transform_point(*n) - origin)
                .unwrap_or(Vec3::Y);
            let position = world.transform_point(local);
            let color = shading.fogged(shading.lit(material, local, normal), position);
            target.push(vertex(position, color, material.opacity));
        }
    }
}

fn bake_lines(lines: &LineNode, world: &Mat4, shading: &Shading<'_>, out: &mut DrawBatches) {
    let material = &lines.material;
    for [a, b] in lines.geometry.segment_pairs() {
        for p in [a, b] {
            let position = world.transform_point(p);
            let color = shading.fogged(material.color, position);
            out.lines.push(vertex(position, color, material.opacity));
        }
    }
}

fn bake_primitive(
    primitive: &PrimitiveNode,
    geometry: &MeshGeometry,
    world: &Mat4,
    shading: &Shading<'_>,
    out: &mut DrawBatches,
) {
    let material = &primitive.material;
    let base = material.color.scaled(material.brightness);
    let target = match material.blending {
        Blending::Additive => &mut out.additive,
        Blending::Normal => &mut out.blended,
    };
    for &index in &geometry.indices {
        let Some(local) = geometry.positions.get(index as usize).copied() else {
            continue;
        };
        let (color, alpha) = match &primitive.ripple {
            Some(ripple) => {
                let radius = (local.x * local.x + local.y * local.y).sqrt();
                let sweep = ripple.intensity_at(radius) as f32;
                (base.lerp(ripple.color, sweep), (material.opacity + sweep).min(1.0))
            }
            None => (base, material.opacity),
        };
        let position = world.transform_point(local);
        target.push(vertex(position, shading.fogged(color, position), alpha));
    }
}

fn vertex(position: Vec3, color: Rgb, alpha: f32) -> ColorVertex {
    ColorVertex {
        position: [position.x as f32, position.y as f32, position.z as f32],
        color: color.to_rgba(alpha.clamp(0.0, 1.0)),
    }
}

fn modulate(a: Rgb, b: Rgb) -> Rgb {
    Rgb::new(a.r * b.r, a.g * b.g, a.b * b.b)
}

fn add(a: Rgb, b: Rgb) -> Rgb {
    Rgb::new(a.r + b.r, a.g + b.g, a.b + b.b)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use controller::RenderFrame;
    use foundation::color::Rgb;
    use foundation::math::Vec3;
    use scene::{
        BasicMaterial, Lighting, LineGeometry, LineMaterial, LineNode, MeshGeometry, MeshMaterials,
        MeshNode, Node, NodeKind, OrbitCamera, PrimitiveNode, SceneGraph, Shape, SurfaceMaterial,
        Transform,
    };

    use super::{PrimitiveCache, bake_frame};

    fn triangle_mesh(opacity: f32) -> NodeKind {
        let geometry = MeshGeometry::new(
            vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
            vec![Vec3::new(0.0, 0.0, 1.0); 3],
            vec![[0.0, 0.0]; 3],
            vec![0, 1, 2],
        );
        let top = SurfaceMaterial {
            opacity,
            ..SurfaceMaterial::default()
        };
        NodeKind::Mesh(MeshNode {
            geometry: Rc::new(geometry),
            materials: MeshMaterials {
                top: top.clone(),
                side: top,
            },
            region: None,
        })
    }

    fn camera() -> OrbitCamera {
        OrbitCamera::new(Vec3::new(0.0, 10.0, 10.0), Vec3::ZERO, 1.5)
    }

    #[test]
    fn splits_opaque_and_blended_triangles() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        graph.add(root, Node::new("solid", triangle_mesh(1.0)));
        graph.add(root, Node::new("glass", triangle_mesh(0.5)));
        let lighting = Lighting::default();
        let camera = camera();
        let mut cache = PrimitiveCache::default();

        let batches = bake_frame(
            RenderFrame {
                graph: &graph,
                camera: &camera,
                lighting: &lighting,
            },
            &mut cache,
        );
        assert_eq!(batches.opaque.len(), 3);
        assert_eq!(batches.blended.len(), 3);
        assert!(batches.blended.iter().all(|v| (v.color[3] - 0.5).abs() < 1e-6));
        assert_eq!(batches.clear, lighting.clear_color);
    }

    #[test]
    fn hidden_subtrees_are_skipped_and_transforms_applied() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let group = graph
            .add(root, Node::group("moved").with_transform(Transform::translate(Vec3::new(5.0, 0.0, 0.0))))
            .expect("group");
        graph.add(group, Node::new("tri", triangle_mesh(1.0)));
        let hidden = graph.add(root, Node::group("hidden")).expect("hidden");
        graph.add(hidden, Node::new("tri", triangle_mesh(1.0)));
        graph.set_visible(hidden, false);

        let lighting = Lighting::default();
        let camera = camera();
        let batches = bake_frame(
            RenderFrame {
                graph: &graph,
                camera: &camera,
                lighting: &lighting,
            },
            &mut PrimitiveCache::default(),
        );
        assert_eq!(batches.opaque.len(), 3);
        assert!((batches.opaque[0].position[0] - 5.0).abs() < 1e-5);
    }

    #[test]
    fn lines_and_primitives_land_in_their_passes() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        graph.add(
            root,
            Node::new(
                "outline",
                NodeKind::Lines(LineNode {
                    geometry: Rc::new(LineGeometry::segments(vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)])),
                    material: LineMaterial::new(Rgb::WHITE, 0.8, 1.0),
                }),
            ),
        );
        let glow = graph
            .add(
                root,
                Node::new(
                    "glow",
                    NodeKind::Primitive(PrimitiveNode {
                        shape: Shape::square(2.0),
                        material: BasicMaterial::new(Rgb::WHITE, 0.6).additive(),
                        ripple: None,
                    }),
                ),
            )
            .expect("glow");

        let lighting = Lighting::default();
        let camera = camera();
        let mut cache = PrimitiveCache::default();
        let frame = RenderFrame {
            graph: &graph,
            camera: &camera,
            lighting: &lighting,
        };
        let batches = bake_frame(frame, &mut cache);
        assert_eq!(batches.lines.len(), 2);
        assert_eq!(batches.additive.len(), 6);
        assert_eq!(cache.len(), 1);

        bake_frame(frame, &mut cache);
        assert_eq!(cache.len(), 1);
        cache.release(&[glow]);
        assert!(cache.is_empty());
    }

    #[test]
    fn fog_pulls_distant_vertices_toward_fog_color() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        graph.add(
            root,
            Node::new(
                "far",
                NodeKind::Lines(LineNode {
                    geometry: Rc::new(LineGeometry::segments(vec![
                        Vec3::new(0.0, 0.0, -2000.0),
                        Vec3::new(1.0, 0.0, -2000.0),
                    ])),
                    material: LineMaterial::new(Rgb::WHITE, 1.0, 1.0),
                }),
            ),
        );
        let lighting = Lighting::default();
        let camera = camera();
        let batches = bake_frame(
            RenderFrame {
                graph: &graph,
                camera: &camera,
                lighting: &lighting,
            },
            &mut PrimitiveCache::default(),
        );
        let fog = lighting.fog.color.to_rgba(1.0);
        for (got, want) in batches.lines[0].color.iter().zip(fog) {
            assert!((got - want).abs() < 1e-5);
        }
    }
}

use foundation::bounds::MapBounds;
use foundation::color::Rgb;
use foundation::math::{MercatorProjection, Vec3, lerp};
use formats::FeatureCollection;
use scene::{
    BasicMaterial, LineGeometry, LineMaterial, LineNode, Node, NodeId, NodeKind, PrimitiveNode,
    RippleUniforms, SceneGraph, Shape, TextureLoader, TextureSlot, Transform,
};

use crate::transformer::project_mapped;

/// Environment texture URLs; an empty string skips that sub-layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentTextures {
    pub background: String,
    pub water_ripple: String,
    pub blur: String,
    pub rotation_border1: String,
    pub rotation_border2: String,
    pub halo_primary: String,
    pub halo_secondary: String,
    pub top_glow: String,
}

#[derive(Debug, Clone)]
pub struct EnvironmentOptions<'a> {
    /// Province bounds; every sub-layer is sized and centered from these.
    pub bounds: MapBounds,
    pub float_height: f64,
    pub offset_z: f64,
    pub background_brightness: f32,
    pub textures: EnvironmentTextures,
    /// Province outline source, drawn with the absolute projection.
    pub boundary: Option<(&'a FeatureCollection, MercatorProjection)>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RotatingPlane {
    pub node: NodeId,
    /// Radians per frame around the plane normal.
    pub speed: f64,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PulsingHalo {
    pub node: NodeId,
    pub speed: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub opacity_range: [f32; 2],
    pub time: f64,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WaterRipple {
    pub node: NodeId,
    pub time_scale: f64,
}

pub const RIPPLE_TIME_WRAP: f64 = 1000.0;

/// Per-frame animation registrations.
///
/// Builders push into these lists; the owner steps them every frame and
/// clears them on teardown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentAnimations {
    pub rotating: Vec<RotatingPlane>,
    pub halos: Vec<PulsingHalo>,
    pub ripples: Vec<WaterRipple>,
}

impl EnvironmentAnimations {
    pub fn is_empty(&self) -> bool {
        self.rotating.is_empty() && self.halos.is_empty() && self.ripples.is_empty()
    }

    pub fn clear(&mut self) {
        self.rotating.clear();
        self.halos.clear();
        self.ripples.clear();
    }

    /// Advance one frame. Entries whose node is gone are skipped.
    pub fn step(&mut self, graph: &mut SceneGraph) {
        for plane in &self.rotating {
            if let Some(node) = graph.get_mut(plane.node) {
                node.transform.rotation.z += plane.speed;
            }
        }

        for halo in &mut self.halos {
            halo.time += halo.speed;
            let progress = (halo.time.sin() + 1.0) / 2.0;
            let scale = lerp(halo.min_scale, halo.max_scale, progress);
            let opacity = lerp(
                halo.opacity_range[0] as f64,
                halo.opacity_range[1] as f64,
                progress,
            ) as f32;
            if let Some(node) = graph.get_mut(halo.node) {
                node.transform.scale = Vec3::splat(scale);
                if let NodeKind::Primitive(p) = &mut node.kind {
                    p.material.opacity = opacity;
                }
            }
        }

        for ripple in &self.ripples {
            if let Some(node) = graph.get_mut(ripple.node)
                && let NodeKind::Primitive(p) = &mut node.kind
                && let Some(u) = p.ripple.as_mut()
            {
                u.time += ripple.time_scale;
                if u.time > RIPPLE_TIME_WRAP {
                    u.time -= RIPPLE_TIME_WRAP;
                }
            }
        }
    }
}

fn flat_plane(name: &str, width: f64, height: f64, material: BasicMaterial, at: Vec3, order: i32) -> Node {
    Node::new(
        name,
        NodeKind::Primitive(PrimitiveNode {
            shape: Shape::Plane { width, height },
            material,
            ripple: None,
        }),
    )
    .with_transform(Transform::lay_flat(at))
    .with_render_order(order)
}

fn load(loader: &mut dyn TextureLoader, url: &str) -> Option<scene::TextureId> {
    if url.is_empty() {
        return None;
    }
    loader.load_texture(url)
}

/// Build the decorative layer under `parent`.
///
/// Returns the environment group, or `None` when every sub-layer was skipped.
pub fn build_environment(
    graph: &mut SceneGraph,
    parent: NodeId,
    options: &EnvironmentOptions<'_>,
    loader: &mut dyn TextureLoader,
    animations: &mut EnvironmentAnimations,
) -> Option<NodeId> {
    let b = &options.bounds;
    let [cx, cz] = b.center();
    let max_dim = b.max_dimension();
    let at = |y: f64| Vec3::new(cx, y, cz);
    let tex = &options.textures;

    let group = graph.add(
        parent,
        Node::group("environment-layer").with_transform(Transform::translate(Vec3::new(
            0.0,
            options.float_height - 2.6,
            options.offset_z,
        ))),
    )?;

    if let Some(t) = load(loader, &tex.background) {
        let mut material = BasicMaterial::new(Rgb::WHITE, 1.0).with_map(TextureSlot::new(t));
        if options.background_brightness > 1.0 {
            material.brightness = options.background_brightness;
        }
        graph.add(
            group,
            flat_plane("environment-background", b.width + 100.0, b.height + 100.0, material, at(0.05), 0),
        );
    }

    if let Some(t) = load(loader, &tex.water_ripple) {
        let size = max_dim * 2.6;
        let material = BasicMaterial::new(Rgb::WHITE, 0.32)
            .with_map(TextureSlot::tiled(t, 2.4))
            .additive();
        graph.add(group, flat_plane("environment-water", size, size, material, at(-0.32), 2));
    }

    {
        let size = max_dim * 2.4;
        let mut node = flat_plane(
            "environment-ripple",
            size,
            size,
            BasicMaterial::new(Rgb::from_hex(0x71918E), 1.0),
            at(-0.24),
            3,
        );
        if let NodeKind::Primitive(p) = &mut node.kind {
            p.ripple = Some(RippleUniforms {
                time: 0.0,
                speed: 32.0,
                width: size * 0.08,
                opacity: 0.58,
                max_radius: size * std::f64::consts::SQRT_2 / 2.0,
                color: Rgb::from_hex(0x71918E),
            });
        }
        if let Some(id) = graph.add(group, node) {
            animations.ripples.push(WaterRipple {
                node: id,
                time_scale: 0.0085,
            });
        }
    }

    if let Some(t) = load(loader, &tex.blur) {
        let size = max_dim * 3.2;
        let material = BasicMaterial::new(Rgb::from_hex(0x3F82CD), 0.55)
            .with_map(TextureSlot::new(t))
            .additive();
        graph.add(group, flat_plane("environment-blur", size, size, material, at(-0.12), 1));
    }

    build_rotating_rings(graph, group, options, loader, animations);
    build_halos(graph, group, options, loader, animations);

    if let Some((collection, projection)) = options.boundary {
        build_boundary_outline(graph, group, collection, &projection);
    }

    if graph.children(group).is_empty() {
        graph.remove(group);
        return None;
    }
    tracing::debug!(
        sublayers = graph.children(group).len(),
        rotating = animations.rotating.len(),
        halos = animations.halos.len(),
        "built environment layer"
    );
    Some(group)
}

fn build_rotating_rings(
    graph: &mut SceneGraph,
    parent: NodeId,
    options: &EnvironmentOptions<'_>,
    loader: &mut dyn TextureLoader,
    animations: &mut EnvironmentAnimations,
) {
    let b = &options.bounds;
    let [cx, cz] = b.center();
    let base = b.max_dimension() * 1.42;
    let Some(group) = graph.add(parent, Node::group("environment-rotating-rings")) else {
        return;
    };

    let rings = [
        (&options.textures.rotation_border1, 0.0026, 0.28, 1.08, 0.32),
        (&options.textures.rotation_border2, -0.004, 0.42, 0.94, 0.34),
    ];
    for (url, speed, opacity, scale, y) in rings {
        let Some(t) = load(loader, url) else {
            continue;
        };
        let size = base * scale;
        let material = BasicMaterial::new(Rgb::from_hex(0x48AFFF), opacity)
            .with_map(TextureSlot::new(t))
            .additive();
        if let Some(node) = graph.add(
            group,
            flat_plane("environment-ring", size, size, material, Vec3::new(cx, y, cz), 5),
        ) {
            animations.rotating.push(RotatingPlane { node, speed });
        }
    }

    if graph.children(group).is_empty() {
        graph.remove(group);
    }
}

struct PulseSpec<'a> {
    url: &'a str,
    size: f64,
    y: f64,
    speed: f64,
    scale: [f64; 2],
    opacity: [f32; 2],
    initial_time: f64,
    tint: u32,
}

fn build_halos(
    graph: &mut SceneGraph,
    parent: NodeId,
    options: &EnvironmentOptions<'_>,
    loader: &mut dyn TextureLoader,
    animations: &mut EnvironmentAnimations,
) {
    let b = &options.bounds;
    let [cx, cz] = b.center();
    let max_dim = b.max_dimension();
    let Some(group) = graph.add(parent, Node::group("environment-halo-layer")) else {
        return;
    };

    if let Some(t) = load(loader, &options.textures.top_glow) {
        let size = max_dim * 1.6;
        let material = BasicMaterial::new(Rgb::from_hex(0x2FC8FF), 0.35)
            .with_map(TextureSlot::new(t))
            .additive();
        graph.add(
            group,
            flat_plane("environment-top-glow", size, size, material, Vec3::new(cx, 0.26, cz), 4),
        );
    }

    let pulses = [
        PulseSpec {
            url: &options.textures.halo_primary,
            size: 1.2,
            y: 0.35,
            speed: 0.015,
            scale: [0.88, 1.22],
            opacity: [0.18, 0.65],
            initial_time: 0.0,
            tint: 0x67EAFF,
        },
        PulseSpec {
            url: &options.textures.halo_secondary,
            size: 1.48,
            y: 0.37,
            speed: 0.011,
            scale: [0.65, 1.35],
            opacity: [0.1, 0.45],
            initial_time: std::f64::consts::PI / 3.0,
            tint: 0x2FBCFF,
        },
    ];
    for halo in pulses {
        let Some(t) = load(loader, halo.url) else {
            continue;
        };
        let size = max_dim * halo.size;
        let material = BasicMaterial::new(Rgb::from_hex(halo.tint), halo.opacity[0])
            .with_map(TextureSlot::new(t))
            .additive();
        let mut node = flat_plane(
            "environment-halo",
            size,
            size,
            material,
            Vec3::new(cx, halo.y, cz),
            6,
        );
        node.transform.scale = Vec3::splat(halo.scale[0]);
        if let Some(id) = graph.add(group, node) {
            animations.halos.push(PulsingHalo {
                node: id,
                speed: halo.speed,
                min_scale: halo.scale[0],
                max_scale: halo.scale[1],
                opacity_range: halo.opacity,
                time: halo.initial_time,
            });
        }
    }

    if graph.children(group).is_empty() {
        graph.remove(group);
    }
}

fn build_boundary_outline(
    graph: &mut SceneGraph,
    parent: NodeId,
    collection: &FeatureCollection,
    projection: &MercatorProjection,
) {
    let Some(group) = graph.add(parent, Node::group("geo-boundary-outline")) else {
        return;
    };
    let material = LineMaterial::new(Rgb::from_hex(0xFF9330), 0.95, 1.0);
    for ring in collection.features.iter().flat_map(|f| f.rings()) {
        if ring.is_empty() {
            continue;
        }
        let points: Vec<Vec3> = ring
            .iter()
            .map(|p| {
                let [x, y] = project_mapped(projection, p.to_array());
                Vec3::new(x, y, 0.0)
            })
            .collect();
        let node = Node::new(
            "boundary-line",
            NodeKind::Lines(LineNode {
                geometry: std::rc::Rc::new(LineGeometry::closed(points)),
                material,
            }),
        )
        .with_transform(Transform::lay_flat(Vec3::new(0.0, 0.2, 0.0)))
        .with_render_order(2);
        graph.add(group, node);
    }
}

#[cfg(test)]
mod tests {
    use super::{EnvironmentAnimations, EnvironmentOptions, EnvironmentTextures, build_environment};
    use crate::fixtures::square_collection;
    use foundation::bounds::MapBounds;
    use foundation::math::{MercatorProjection, Vec3};
    use scene::{NodeKind, SceneGraph, TextureRegistry};

    fn bounds() -> MapBounds {
        MapBounds::from_points([[-100.0, -50.0], [100.0, 50.0]])
    }

    fn full_textures() -> EnvironmentTextures {
        EnvironmentTextures {
            background: "bg.jpg".into(),
            water_ripple: "ocean.png".into(),
            rotation_border2: "ring1.png".into(),
            halo_primary: "ring2.png".into(),
            halo_secondary: "ring2.png".into(),
            ..EnvironmentTextures::default()
        }
    }

    #[test]
    fn missing_textures_skip_sublayers() {
        let mut graph = SceneGraph::new();
        let mut loader = TextureRegistry::new();
        let mut anim = EnvironmentAnimations::default();
        let options = EnvironmentOptions {
            bounds: bounds(),
            float_height: -13.6,
            offset_z: 100.0,
            background_brightness: 1.32,
            textures: EnvironmentTextures::default(),
            boundary: None,
        };
        let root = graph.root();
        let group = build_environment(&mut graph, root, &options, &mut loader, &mut anim)
            .expect("ripple plane is untextured");
        // Only the ripple plane survives.
        assert_eq!(graph.children(group).len(), 1);
        assert_eq!(anim.ripples.len(), 1);
        assert!(anim.rotating.is_empty());
        assert!(anim.halos.is_empty());
        assert_eq!(loader.total(), 0);
    }

    #[test]
    fn full_build_registers_animations() {
        let mut graph = SceneGraph::new();
        let mut loader = TextureRegistry::new();
        let mut anim = EnvironmentAnimations::default();
        let province = square_collection();
        let options = EnvironmentOptions {
            bounds: bounds(),
            float_height: -13.6,
            offset_z: 100.0,
            background_brightness: 1.32,
            textures: full_textures(),
            boundary: Some((&province, MercatorProjection::new([120.0, 29.0], 850.0))),
        };
        let root = graph.root();
        let group =
            build_environment(&mut graph, root, &options, &mut loader, &mut anim).expect("group");
        assert_eq!(anim.rotating.len(), 1);
        assert_eq!(anim.halos.len(), 2);
        // ring2.png is shared by both halos.
        assert_eq!(loader.total(), 4);
        let g = graph.get(group).expect("group");
        assert!((g.transform.position.y - (-16.2)).abs() < 1e-9);
        assert_eq!(g.transform.position.z, 100.0);
    }

    #[test]
    fn step_rotates_pulses_and_wraps_ripple_time() {
        let mut graph = SceneGraph::new();
        let mut loader = TextureRegistry::new();
        let mut anim = EnvironmentAnimations::default();
        let options = EnvironmentOptions {
            bounds: bounds(),
            float_height: 0.0,
            offset_z: 0.0,
            background_brightness: 1.0,
            textures: full_textures(),
            boundary: None,
        };
        let root = graph.root();
        build_environment(&mut graph, root, &options, &mut loader, &mut anim).expect("group");

        let ring = anim.rotating[0].node;
        let halo = anim.halos[0].node;
        let ripple = anim.ripples[0].node;
        if let Some(node) = graph.get_mut(ripple)
            && let NodeKind::Primitive(p) = &mut node.kind
            && let Some(u) = p.ripple.as_mut()
        {
            u.time = 999.999;
        }

        anim.step(&mut graph);

        let rz = graph.get(ring).expect("ring").transform.rotation.z;
        assert!((rz - (-0.004)).abs() < 1e-12);

        let h = graph.get(halo).expect("halo");
        let progress = (0.015f64.sin() + 1.0) / 2.0;
        let expected = 0.88 + (1.22 - 0.88) * progress;
        assert!((h.transform.scale.x - expected).abs() < 1e-9);
        assert_eq!(h.transform.scale, Vec3::splat(h.transform.scale.x));

        let NodeKind::Primitive(p) = &graph.get(ripple).expect("ripple").kind else {
            panic!("ripple is a primitive");
        };
        let t = p.ripple.expect("uniforms").time;
        assert!(t < 1.0 && t > 0.0);

        anim.clear();
        assert!(anim.is_empty());
    }
}

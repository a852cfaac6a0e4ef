use std::f64::consts::FRAC_PI_2;

use foundation::color::Rgb;
use foundation::math::{MercatorProjection, Vec3, lerp};
use formats::{CityDisplayDatum, ValueRange};
use scene::{
    BasicMaterial, Disposal, Node, NodeId, NodeKind, PrimitiveNode, SceneGraph, Shape, Transform,
};

use crate::labels::{
    LabelAction, LabelError, LabelKind, LabelRender, LabelSet, LabelTemplate, OverlaySurface,
    attach_label, detach_released, resolve_render,
};
use crate::transformer::project_mapped;

pub const MARKER_LIFT: f64 = 1.2;
pub const MARKER_LABEL_OFFSET_Y: f64 = 13.5;
pub const MARKER_LABEL_SCALE: f64 = 0.24;
pub const STEM_HEIGHT: f64 = 2.8;
pub const HALO_START_SCALE: f64 = 1.55;
pub const WAVE_STEP: f64 = 0.007;
pub const HALO_CLOCK_STEP: f64 = 0.007;
pub const BOB_FREQUENCY: f64 = 2.1;
pub const BOB_AMPLITUDE: f64 = 0.24;

/// Expanding halo: scale is `size * s`, with `s` cycling through `(1, 2]`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WaveMesh {
    pub node: NodeId,
    pub size: f64,
    pub s: f64,
}

impl WaveMesh {
    /// Triangle wave over `s - 1`: fades in for the first half, out for the second.
    pub fn opacity(&self) -> f64 {
        let t = self.s - 1.0;
        if t <= 0.5 { t * 2.0 } else { 1.0 - (t - 0.5) * 2.0 }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MarkerBob {
    pub group: NodeId,
    pub base_y: f64,
    pub phase: f64,
}

/// Marker groups, their labels, and per-frame motion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerLayer {
    pub groups: Vec<NodeId>,
    pub labels: LabelSet,
    pub waves: Vec<WaveMesh>,
    pub bobbing: Vec<MarkerBob>,
    /// Shared halo clock; survives rebuilds.
    pub clock: f64,
}

impl MarkerLayer {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Remove every marker group with its label and drop the animations.
    pub fn clear<O: OverlaySurface + ?Sized>(&mut self, graph: &mut SceneGraph, overlay: &mut O) {
        let mut disposal = Disposal::default();
        for group in self.groups.drain(..) {
            disposal.merge(graph.remove(group));
        }
        detach_released(overlay, &disposal);
        self.labels.clear(graph, overlay);
        self.waves.clear();
        self.bobbing.clear();
    }

    /// Grow the halo waves, advance the clock, then bob every group.
    pub fn step(&mut self, graph: &mut SceneGraph) {
        for wave in &mut self.waves {
            wave.s += WAVE_STEP;
            let scale = wave.size * wave.s;
            if wave.s > 2.0 {
                wave.s = 1.0;
            }
            let opacity = wave.opacity() as f32;
            if let Some(node) = graph.get_mut(wave.node) {
                node.transform.scale = Vec3::splat(scale);
                if let NodeKind::Primitive(p) = &mut node.kind {
                    p.material.opacity = opacity;
                }
            }
        }

        self.clock += HALO_CLOCK_STEP;
        for bob in &self.bobbing {
            if let Some(node) = graph.get_mut(bob.group) {
                node.transform.position.y =
                    bob.base_y + (self.clock * BOB_FREQUENCY + bob.phase).sin() * BOB_AMPLITUDE;
            }
        }
    }
}

/// Normalized marker values; a flat range saturates every marker.
pub fn normalized_values(data: &[CityDisplayDatum]) -> Vec<f64> {
    let range = ValueRange::from_values(data.iter().map(|c| c.value));
    data.iter()
        .map(|c| range.map(|r| r.normalize(c.value)).unwrap_or(1.0))
        .collect()
}

pub type CityRenderer<'a, E> = &'a dyn Fn(&CityDisplayDatum, f64) -> LabelRender<E>;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MarkerOptions {
    pub projection: MercatorProjection,
    pub extrusion_depth: f64,
    pub marker_scale: f64,
}

fn disc(name: &str, shape: Shape, material: BasicMaterial, y: f64, order: i32) -> Node {
    Node::new(
        name,
        NodeKind::Primitive(PrimitiveNode {
            shape,
            material,
            ripple: None,
        }),
    )
    .with_transform(Transform::translate(Vec3::new(0.0, y, 0.0)).with_rotation_x(FRAC_PI_2))
    .with_render_order(order)
}

fn build_marker_base(
    graph: &mut SceneGraph,
    group: NodeId,
    normalized: f64,
    waves: &mut Vec<WaveMesh>,
) -> Option<()> {
    let glow_color = Rgb::from_hsl(0.55, 0.9, lerp(0.52, 0.65, normalized) as f32);
    graph.add(
        group,
        disc(
            "marker-glow",
            Shape::Circle { radius: 1.2, segments: 64 },
            BasicMaterial::new(glow_color, 0.6),
            0.0,
            2,
        ),
    )?;

    let mut halo = disc(
        "marker-halo",
        Shape::Circle { radius: 1.2, segments: 64 },
        BasicMaterial::new(Rgb::from_hex(0x8EE5FF), 0.0),
        0.0,
        2,
    );
    halo.transform.scale = Vec3::splat(HALO_START_SCALE);
    let halo = graph.add(group, halo)?;
    waves.push(WaveMesh {
        node: halo,
        size: HALO_START_SCALE,
        s: 1.0,
    });

    graph.add(
        group,
        disc(
            "marker-ring",
            Shape::Ring { inner: 0.86, outer: 1.18, segments: 64 },
            BasicMaterial::new(Rgb::from_hex(0xBBEEFF), 0.72),
            0.035,
            2,
        ),
    )?;

    let mut stem_material =
        BasicMaterial::new(Rgb::from_hex(0x7CD0FF), lerp(0.55, 0.85, normalized) as f32).additive();
    stem_material.double_sided = false;
    graph.add(
        group,
        Node::new(
            "marker-stem",
            NodeKind::Primitive(PrimitiveNode {
                shape: Shape::Cylinder { radius: 0.1, height: STEM_HEIGHT, segments: 24 },
                material: stem_material,
                ripple: None,
            }),
        )
        .with_transform(Transform::translate(Vec3::new(0.0, STEM_HEIGHT / 2.0, 0.0)))
        .with_render_order(3),
    )?;

    graph.add(
        group,
        disc(
            "marker-cap",
            Shape::Circle { radius: 0.38, segments: 32 },
            BasicMaterial::new(Rgb::WHITE, 0.92),
            STEM_HEIGHT,
            3,
        ),
    )?;
    Some(())
}

/// One marker stack per datum, each with an optional label.
///
/// `phase` supplies the bobbing phase of each marker. Markers built before a
/// renderer error stay in `layer` so the caller can clear them.
#[allow(clippy::too_many_arguments)]
pub fn build_city_markers<O: OverlaySurface + ?Sized>(
    graph: &mut SceneGraph,
    parent: NodeId,
    overlay: &mut O,
    data: &[CityDisplayDatum],
    options: &MarkerOptions,
    renderer: Option<CityRenderer<'_, O::Element>>,
    mut phase: impl FnMut() -> f64,
    layer: &mut MarkerLayer,
) -> Result<(), LabelError> {
    if data.is_empty() {
        tracing::debug!("no display data; skipping markers");
        return Ok(());
    }
    tracing::debug!(
        cities = data.len(),
        custom = renderer.is_some(),
        "building city markers"
    );

    for (city, normalized) in data.iter().zip(normalized_values(data)) {
        let [x, mapped_y] = project_mapped(&options.projection, city.center);
        let base_y = options.extrusion_depth + MARKER_LIFT;
        let Some(group) = graph.add(
            parent,
            Node::group(format!("city-marker-{}", city.id)).with_transform(
                Transform::translate(Vec3::new(x, base_y, -mapped_y))
                    .with_uniform_scale(options.marker_scale),
            ),
        ) else {
            continue;
        };
        layer.groups.push(group);
        if build_marker_base(graph, group, normalized, &mut layer.waves).is_none() {
            continue;
        }

        let element = match renderer {
            Some(render) => resolve_render(render(city, normalized), LabelKind::City, &city.name)?,
            None => overlay.create_label(&LabelTemplate::city(
                &city.id,
                &city.name,
                city.value,
                city.rank,
                normalized,
            )),
        };
        if let Some(element) = element
            && let Some(label) = attach_label(
                graph,
                group,
                overlay,
                element,
                Vec3::new(0.0, MARKER_LABEL_OFFSET_Y, 0.0),
                MARKER_LABEL_SCALE,
                Some(city.name.clone()),
                LabelAction::City {
                    id: city.id.clone(),
                    name: city.name.clone(),
                },
            )
        {
            layer.labels.push(label);
        }

        layer.bobbing.push(MarkerBob {
            group,
            base_y,
            phase: phase(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        HALO_CLOCK_STEP, MarkerLayer, MarkerOptions, WaveMesh, build_city_markers,
        normalized_values,
    };
    use crate::labels::testing::RecordingOverlay;
    use crate::labels::{LabelError, LabelKind, LabelRender};
    use foundation::math::MercatorProjection;
    use formats::CityDisplayDatum;
    use foundation::handles::Handle;
    use pretty_assertions::assert_eq;
    use scene::{NodeId, SceneGraph};

    fn city(id: &str, value: f64, rank: usize) -> CityDisplayDatum {
        CityDisplayDatum {
            id: id.into(),
            name: format!("{id}-name"),
            value,
            districts: None,
            center: [120.0, 29.0],
            rank,
        }
    }

    fn options() -> MarkerOptions {
        MarkerOptions {
            projection: MercatorProjection::new([120.0, 29.0], 850.0),
            extrusion_depth: 5.0,
            marker_scale: 0.17,
        }
    }

    #[test]
    fn normalization_spans_range() {
        let data = [city("a", 10.0, 3), city("b", 50.0, 2), city("c", 90.0, 1)];
        assert_eq!(normalized_values(&data), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn flat_values_saturate() {
        let data = [city("a", 5.0, 1), city("b", 5.0, 2), city("c", 5.0, 3)];
        assert_eq!(normalized_values(&data), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn builds_stack_label_and_animations() {
        let mut graph = SceneGraph::new();
        let mut overlay = RecordingOverlay::default();
        let mut layer = MarkerLayer::default();
        let data = [city("a", 10.0, 2), city("b", 20.0, 1)];
        let root = graph.root();
        build_city_markers(&mut graph, root, &mut overlay, &data, &options(), None, || 0.0, &mut layer)
            .expect("markers");

        assert_eq!(layer.groups.len(), 2);
        assert_eq!(layer.labels.len(), 2);
        assert_eq!(layer.waves.len(), 2);
        assert_eq!(layer.bobbing.len(), 2);
        // glow, halo, ring, stem, cap, label
        assert_eq!(graph.children(layer.groups[0]).len(), 6);
        let group = graph.get(layer.groups[0]).expect("group");
        assert_eq!(group.name, "city-marker-a");
        assert!((group.transform.position.y - 6.2).abs() < 1e-12);
        assert!(group.transform.position.x.abs() < 1e-9);
        assert_eq!(overlay.texts, vec!["a-name10".to_string(), "b-name20".to_string()]);

        layer.clear(&mut graph, &mut overlay);
        assert!(layer.is_empty());
        assert!(layer.labels.is_empty());
        assert!(overlay.attached.is_empty());
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn suppressed_labels_keep_markers() {
        let mut graph = SceneGraph::new();
        let mut overlay = RecordingOverlay::default();
        let mut layer = MarkerLayer::default();
        let data = [city("a", 10.0, 1)];
        let render = |_: &CityDisplayDatum, _: f64| LabelRender::<String>::Suppress;
        let root = graph.root();
        build_city_markers(&mut graph, root, &mut overlay, &data, &options(), Some(&render), || 0.0, &mut layer)
            .expect("markers");
        assert_eq!(layer.groups.len(), 1);
        assert!(layer.labels.is_empty());
    }

    #[test]
    fn invalid_renderer_reports_city() {
        let mut graph = SceneGraph::new();
        let mut overlay = RecordingOverlay::default();
        let mut layer = MarkerLayer::default();
        let data = [city("a", 10.0, 1)];
        let render = |_: &CityDisplayDatum, _: f64| LabelRender::<String>::Invalid("0".into());
        let root = graph.root();
        let err = build_city_markers(&mut graph, root, &mut overlay, &data, &options(), Some(&render), || 0.0, &mut layer)
            .expect_err("invalid");
        assert_eq!(
            err,
            LabelError::Renderer {
                kind: LabelKind::City,
                name: "a-name".into(),
                reason: "0".into()
            }
        );
        assert_eq!(layer.groups.len(), 1);
    }

    #[test]
    fn wave_cycles_and_markers_bob() {
        let mut graph = SceneGraph::new();
        let mut overlay = RecordingOverlay::default();
        let mut layer = MarkerLayer::default();
        let root = graph.root();
        build_city_markers(&mut graph, root, &mut overlay, &[city("a", 1.0, 1)], &options(), None, || 1.0, &mut layer)
            .expect("markers");

        layer.waves[0].s = 1.999;
        layer.step(&mut graph);
        let halo = graph.get(layer.waves[0].node).expect("halo");
        // Scale is taken before the wrap.
        assert!((halo.transform.scale.x - 1.55 * 2.006).abs() < 1e-9);
        assert_eq!(layer.waves[0].s, 1.0);

        let y = graph.get(layer.groups[0]).expect("group").transform.position.y;
        let expected = 6.2 + (HALO_CLOCK_STEP * 2.1 + 1.0).sin() * 0.24;
        assert!((y - expected).abs() < 1e-9);
    }

    #[test]
    fn wave_opacity_is_triangular() {
        let w = |s| WaveMesh {
            node: NodeId(Handle::new(0, 0)),
            size: 1.55,
            s,
        };
        assert_eq!(w(1.0).opacity(), 0.0);
        assert!((w(1.25).opacity() - 0.5).abs() < 1e-12);
        assert!((w(1.5).opacity() - 1.0).abs() < 1e-12);
        assert!((w(1.75).opacity() - 0.5).abs() < 1e-12);
    }
}

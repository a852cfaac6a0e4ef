use std::fmt;

use foundation::math::Vec3;
use formats::{DistrictDatum, FeatureCollection, district_stats};
use scene::{Disposal, LabelElementId, LabelNode, Node, NodeId, NodeKind, SceneGraph, Transform};

use crate::transformer::SceneTransformer;

pub const DISTRICT_LABEL_BASE_SCALE: f64 = 0.028;
pub const DISTRICT_LABEL_LIFT: f64 = 3.4;
pub const DEFAULT_DISTRICT_STRENGTH: f64 = 0.65;
pub const CUSTOM_LABEL_SCALE: f64 = 0.24;

/// Outcome of a caller-supplied label renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelRender<E> {
    Render(E),
    /// Deliberately no label for this region.
    Suppress,
    /// The renderer broke its contract; reported, never rendered.
    Invalid(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LabelKind {
    City,
    District,
    Custom,
}

impl fmt::Display for LabelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LabelKind::City => "city",
            LabelKind::District => "district",
            LabelKind::Custom => "custom",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LabelError {
    Renderer {
        kind: LabelKind,
        name: String,
        reason: String,
    },
    Custom {
        id: String,
        reason: String,
    },
}

impl fmt::Display for LabelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelError::Renderer { kind, name, reason } => write!(
                f,
                "{kind} label renderer must return an element, null or false for {name}: {reason}"
            ),
            LabelError::Custom { id, reason } => {
                write!(f, "custom label renderer for {id} must return an element: {reason}")
            }
        }
    }
}

impl std::error::Error for LabelError {}

/// Unwrap a renderer result: `Ok(None)` suppresses the label.
pub fn resolve_render<E>(
    result: LabelRender<E>,
    kind: LabelKind,
    name: &str,
) -> Result<Option<E>, LabelError> {
    match result {
        LabelRender::Render(element) => Ok(Some(element)),
        LabelRender::Suppress => {
            tracing::debug!(%kind, label = name, "label renderer suppressed label");
            Ok(None)
        }
        LabelRender::Invalid(reason) => {
            tracing::warn!(%kind, label = name, %reason, "label renderer returned an invalid value");
            Err(LabelError::Renderer {
                kind,
                name: name.to_string(),
                reason,
            })
        }
    }
}

/// `--marker-strength` value for a normalized value.
pub fn marker_strength(normalized: f64) -> String {
    format!("{:.2}", 0.6 + normalized * 0.4)
}

/// Markup description of the built-in label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTemplate {
    pub classes: Vec<&'static str>,
    /// `data-*` attribute name and value.
    pub data: (&'static str, String),
    pub strength: String,
    pub text: String,
}

impl LabelTemplate {
    pub fn city(id: &str, name: &str, value: f64, rank: usize, normalized: f64) -> Self {
        let mut classes = vec!["map-marker"];
        if rank > 0 && rank <= 3 {
            classes.push("map-marker--top");
        }
        Self {
            classes,
            data: ("city", id.to_string()),
            strength: marker_strength(normalized),
            text: format!("{name}{value:.0}"),
        }
    }

    pub fn district(name: &str, input: DistrictLabelInput) -> Self {
        let strength = input
            .strength
            .map(|s| s.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_DISTRICT_STRENGTH);
        let value = input.value.map(|v| format!("{v:.0}")).unwrap_or_default();
        Self {
            classes: vec!["map-marker", "map-marker--district"],
            data: ("district", name.to_string()),
            strength: marker_strength(strength),
            text: format!("{name}{value}"),
        }
    }

    pub fn class_name(&self) -> String {
        self.classes.join(" ")
    }
}

/// What a label click or hover reports back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelAction {
    City { id: String, name: String },
    District { city: String, district: String },
    Custom { id: String },
}

/// Screen placement of an attached label, in viewport pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LabelPlacement {
    pub x: f64,
    pub y: f64,
    /// CSS scale factor.
    pub scale: f64,
    /// Larger is nearer the camera.
    pub z_order: i32,
}

/// DOM-overlay capability hosting label elements.
///
/// Hosts stop click propagation on attached elements and report clicks and
/// hovers back by `LabelElementId`.
pub trait OverlaySurface {
    type Element;

    /// Realize the built-in markup; `None` skips the label.
    fn create_label(&mut self, template: &LabelTemplate) -> Option<Self::Element>;
    /// Mount an element with pointer events enabled.
    fn attach_label(&mut self, element: Self::Element) -> LabelElementId;
    fn detach_label(&mut self, id: LabelElementId);
    /// `None` hides the element.
    fn place_label(&mut self, id: LabelElementId, placement: Option<LabelPlacement>);
}

/// Detach the overlay elements a graph removal released.
pub fn detach_released<O: OverlaySurface + ?Sized>(overlay: &mut O, disposal: &Disposal) {
    for id in &disposal.labels {
        overlay.detach_label(*id);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel {
    pub node: NodeId,
    pub element: LabelElementId,
    /// Region the label follows on hover; `None` for custom labels without one.
    pub region: Option<String>,
    pub action: LabelAction,
    pub base_y: f64,
}

/// Labels owned by one builder (markers, districts, custom).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelSet {
    labels: Vec<PlacedLabel>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn push(&mut self, label: PlacedLabel) {
        self.labels.push(label);
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedLabel> {
        self.labels.iter()
    }

    pub fn by_element(&self, element: LabelElementId) -> Option<&PlacedLabel> {
        self.labels.iter().find(|l| l.element == element)
    }

    pub fn matching_region<'a>(&'a self, region: &'a str) -> impl Iterator<Item = &'a PlacedLabel> {
        self.labels
            .iter()
            .filter(move |l| l.region.as_deref() == Some(region))
    }

    /// Remove every label node and detach its element.
    pub fn clear<O: OverlaySurface + ?Sized>(&mut self, graph: &mut SceneGraph, overlay: &mut O) {
        let mut disposal = Disposal::default();
        for label in self.labels.drain(..) {
            // Nodes already removed with an ancestor were detached then.
            disposal.merge(graph.remove(label.node));
        }
        detach_released(overlay, &disposal);
    }
}

/// Attach `element` as a label node under `parent`.
pub fn attach_label<O: OverlaySurface + ?Sized>(
    graph: &mut SceneGraph,
    parent: NodeId,
    overlay: &mut O,
    element: O::Element,
    position: Vec3,
    scale: f64,
    region: Option<String>,
    action: LabelAction,
) -> Option<PlacedLabel> {
    if !graph.contains(parent) {
        return None;
    }
    let id = overlay.attach_label(element);
    let node = Node::new(
        "label",
        NodeKind::Label(LabelNode {
            element: id,
            base_y: position.y,
        }),
    )
    .with_transform(Transform::translate(position).with_uniform_scale(scale));
    let Some(node) = graph.add(parent, node) else {
        overlay.detach_label(id);
        return None;
    };
    Some(PlacedLabel {
        node,
        element: id,
        region,
        action,
        base_y: position.y,
    })
}

/// What a district renderer is given.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct DistrictLabelInput {
    pub value: Option<f64>,
    pub strength: Option<f64>,
}

pub type DistrictRenderer<'a, E> = &'a dyn Fn(&str, DistrictLabelInput) -> LabelRender<E>;

pub fn district_label_scale(normalized_scale: f64) -> f64 {
    DISTRICT_LABEL_BASE_SCALE * normalized_scale.clamp(0.76, 1.6)
}

pub struct DistrictLabelContext<'a> {
    pub city: &'a str,
    pub transformer: &'a SceneTransformer,
    pub extrusion_depth: f64,
    pub districts: &'a [DistrictDatum],
}

/// One label per named district feature.
///
/// Features without a name or anchor are skipped. Labels built before a
/// renderer error stay in `out` so the caller can clear them.
pub fn build_district_labels<O: OverlaySurface + ?Sized>(
    graph: &mut SceneGraph,
    parent: NodeId,
    overlay: &mut O,
    collection: &FeatureCollection,
    ctx: &DistrictLabelContext<'_>,
    renderer: Option<DistrictRenderer<'_, O::Element>>,
    out: &mut LabelSet,
) -> Result<(), LabelError> {
    tracing::debug!(
        city = ctx.city,
        features = collection.len(),
        custom = renderer.is_some(),
        "building district labels"
    );
    let stats = district_stats(ctx.districts);
    let height = ctx.extrusion_depth + DISTRICT_LABEL_LIFT;
    let scale = district_label_scale(ctx.transformer.normalized_scale);

    for feature in &collection.features {
        let Some(name) = feature.name() else {
            continue;
        };
        let Some(lon_lat) = feature.label_lon_lat() else {
            continue;
        };
        let stat = stats.get(name);
        let input = DistrictLabelInput {
            value: stat
                .map(|s| s.value)
                .or_else(|| ctx.districts.iter().find(|d| d.name == name).and_then(|d| d.value)),
            strength: stat.map(|s| s.normalized),
        };
        let element = match renderer {
            Some(render) => match resolve_render(render(name, input), LabelKind::District, name)? {
                Some(element) => element,
                None => continue,
            },
            None => match overlay.create_label(&LabelTemplate::district(name, input)) {
                Some(element) => element,
                None => continue,
            },
        };

        let [x, mapped_y] = ctx.transformer.project(lon_lat);
        let action = LabelAction::District {
            city: ctx.city.to_string(),
            district: name.to_string(),
        };
        if let Some(label) = attach_label(
            graph,
            parent,
            overlay,
            element,
            Vec3::new(x, height, -mapped_y),
            scale,
            Some(name.to_string()),
            action,
        ) {
            out.push(label);
        }
    }
    Ok(())
}

/// Which regions custom labels may show for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VisibilityScope<'a> {
    /// Province level: every tagged label.
    All,
    /// The focused city or district name, if one is set.
    Only(Option<&'a str>),
}

/// Custom labels carry a comma-separated region list; untagged labels stay hidden.
pub fn custom_label_visible(region_names: Option<&str>, scope: VisibilityScope<'_>) -> bool {
    let Some(names) = region_names else {
        return false;
    };
    match scope {
        VisibilityScope::All => true,
        VisibilityScope::Only(Some(focus)) => names.split(',').any(|part| part.trim() == focus),
        VisibilityScope::Only(None) => false,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeSet;

    use scene::LabelElementId;

    use super::{LabelPlacement, LabelTemplate, OverlaySurface};

    /// Overlay double recording every attach, detach and placement.
    #[derive(Debug, Default)]
    pub struct RecordingOverlay {
        pub(crate) next: u64,
        pub attached: BTreeSet<u64>,
        pub texts: Vec<String>,
        pub detached: Vec<u64>,
        pub placed: Vec<(u64, Option<LabelPlacement>)>,
        /// Simulates a host that cannot create elements.
        pub refuse_markup: bool,
    }

    impl OverlaySurface for RecordingOverlay {
        type Element = String;

        fn create_label(&mut self, template: &LabelTemplate) -> Option<String> {
            (!self.refuse_markup).then(|| template.text.clone())
        }

        fn attach_label(&mut self, element: String) -> LabelElementId {
            self.next += 1;
            self.attached.insert(self.next);
            self.texts.push(element);
            LabelElementId(self.next)
        }

        fn detach_label(&mut self, id: LabelElementId) {
            self.attached.remove(&id.0);
            self.detached.push(id.0);
        }

        fn place_label(&mut self, id: LabelElementId, placement: Option<LabelPlacement>) {
            self.placed.push((id.0, placement));
        }
    }
}

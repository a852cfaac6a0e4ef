use std::collections::BTreeMap;
use std::rc::Rc;

use foundation::bounds::MapBounds;
use foundation::math::{MercatorProjection, Vec3};
use formats::FeatureCollection;
use scene::{
    LineGeometry, LineMaterial, LineNode, MeshNode, Node, NodeId, NodeKind, RegionTag, SceneGraph,
    TextureLoader, Transform,
};

use crate::edges::{feature_edges, top_edges};
use crate::extrude::extrude_ring;
use crate::symbology::{OUTLINE_GLOW, OUTLINE_INNER, OutlineStyle, RegionTextures, region_materials};
use crate::transformer::{PlacementMode, SceneTransformer};

pub const EDGE_THRESHOLD_DEG: f64 = 15.0;
pub const TOP_EDGE_TOLERANCE: f64 = 0.01;
pub const UNKNOWN_REGION: &str = "unknown";

/// Texture URLs for a region build; empty strings are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionTextureSources {
    pub color: String,
    pub normal: String,
    pub detail: String,
    pub emissive: String,
    pub roughness: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionBuildOptions {
    pub mode: PlacementMode,
    pub depth: f64,
    pub projection: MercatorProjection,
    /// Texture space of absolute placement (the province bounds).
    pub reference_bounds: MapBounds,
    pub textures: RegionTextureSources,
}

/// Meshes produced for one level, flat and grouped by region name.
///
/// Multi-ring regions (islands) share one entry in `by_region`, so hover and
/// click treat them as a single unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionMeshes {
    pub meshes: Vec<NodeId>,
    pub by_region: BTreeMap<String, Vec<NodeId>>,
}

impl RegionMeshes {
    pub fn clear(&mut self) {
        self.meshes.clear();
        self.by_region.clear();
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn region(&self, name: &str) -> &[NodeId] {
        self.by_region.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

fn load(loader: &mut dyn TextureLoader, url: &str) -> Option<scene::TextureId> {
    if url.is_empty() {
        return None;
    }
    loader.load_texture(url)
}

/// Extrude every ring of `collection` under `parent`.
///
/// Returns the level's transformer, or `None` when there is nothing to show.
pub fn build_region_geometry(
    graph: &mut SceneGraph,
    parent: NodeId,
    collection: &FeatureCollection,
    options: &RegionBuildOptions,
    loader: &mut dyn TextureLoader,
    out: &mut RegionMeshes,
) -> Option<SceneTransformer> {
    if collection.is_empty() {
        return None;
    }

    let transformer = SceneTransformer::new(collection, options.projection, options.mode);
    let texture_bounds = match options.mode {
        PlacementMode::Absolute => options.reference_bounds,
        PlacementMode::Centered { .. } => transformer.scaled_bounds,
    };

    let src = &options.textures;
    let textures = if options.mode.is_absolute() {
        RegionTextures {
            color: load(loader, &src.color),
            normal: load(loader, &src.normal),
            detail: load(loader, &src.detail),
            emissive: load(loader, &src.emissive),
            roughness: load(loader, &src.roughness),
        }
    } else {
        RegionTextures {
            color: load(loader, &src.color),
            normal: load(loader, &src.normal),
            ..RegionTextures::default()
        }
    };
    let materials = region_materials(options.mode, textures, &texture_bounds, options.depth);
    let clickable = options.mode.is_absolute();

    let before = out.meshes.len();
    for feature in &collection.features {
        let name = feature.name().unwrap_or(UNKNOWN_REGION);
        for ring in feature.rings() {
            let projected: Vec<[f64; 2]> = ring
                .iter()
                .map(|p| transformer.project(p.to_array()))
                .collect();
            let Some(geometry) = extrude_ring(&projected, options.depth) else {
                tracing::debug!(region = %name, vertices = ring.len(), "skipping degenerate ring");
                continue;
            };

            let edges = top_edges(
                &feature_edges(&geometry, EDGE_THRESHOLD_DEG),
                options.depth,
                TOP_EDGE_TOLERANCE,
            );
            let outline = Rc::new(LineGeometry::segments(
                edges.into_iter().flatten().collect(),
            ));

            let transform =
                Transform::identity().with_rotation_x(-std::f64::consts::FRAC_PI_2);
            let node = Node::new(
                format!("region-{name}"),
                NodeKind::Mesh(MeshNode {
                    geometry: Rc::new(geometry),
                    materials: materials.clone(),
                    region: Some(RegionTag {
                        region_name: name.to_string(),
                        original_y: transform.position.y,
                        is_hovered: false,
                        is_clickable: clickable,
                    }),
                }),
            )
            .with_transform(transform);
            let mesh = graph.add(parent, node)?;

            for style in [OUTLINE_GLOW, OUTLINE_INNER] {
                graph.add(mesh, outline_node(&outline, style));
            }

            out.meshes.push(mesh);
            out.by_region.entry(name.to_string()).or_default().push(mesh);
        }
    }

    tracing::debug!(
        meshes = out.meshes.len() - before,
        features = collection.len(),
        absolute = clickable,
        scale = transformer.normalized_scale,
        "built region geometry"
    );
    Some(transformer)
}

fn outline_node(geometry: &Rc<LineGeometry>, style: OutlineStyle) -> Node {
    // Lifted along local +Z, which is world up once the mesh is laid flat.
    Node::new(
        "region-outline",
        NodeKind::Lines(LineNode {
            geometry: Rc::clone(geometry),
            material: LineMaterial::new(style.color, style.opacity, style.width),
        }),
    )
    .with_transform(Transform::translate(Vec3::new(0.0, 0.0, style.lift)))
    .with_render_order(style.render_order)
}

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::rc::Rc;

use foundation::bounds::MapBounds;
use foundation::math::{MercatorProjection, Vec3};
use formats::{
    CityBoardDatum, CityDisplayDatum, DistrictDatum, FeatureCollection, build_city_display_data,
    default_city_boards, district_data_by_city,
};
use layers::{
    CUSTOM_LABEL_SCALE, DistrictLabelContext, EnvironmentAnimations, EnvironmentOptions,
    EnvironmentTextures, LabelAction, LabelPlacement, LabelSet, MARKER_LIFT, MarkerLayer,
    MarkerOptions, PlacementMode, RegionBuildOptions, RegionMeshes, RegionTextureSources,
    SceneTransformer, VisibilityScope, attach_label, build_city_markers, build_district_labels,
    build_environment, build_region_geometry, compute_bounds, custom_label_visible,
    detach_released, project_mapped,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use runtime::{Ease, EventBus, Frame, Throttle, TweenSet};
use scene::{
    LabelElementId, Lighting, Node, NodeId, NodeKind, OrbitCamera, SceneGraph, Transform,
    pick_meshes,
};
use streaming::{AssetResolver, GeoCache, LoadEpoch, LoadToken, RegionAssets};

use crate::camera_rig::{CameraRig, TweenTarget};
use crate::config::SceneConfig;
use crate::events::{SceneError, SceneEvent};
use crate::hover::{HoverAction, HoverState, HoverTarget};
use crate::input::{ClickTracker, RectCache};
use crate::level::{Level, TransitionGuard, TransitionState};
use crate::options::{CustomLabel, LabelRenderers};
use crate::progress::{
    PROGRESS_CAMERA_READY, PROGRESS_FIRST_FRAME, PROGRESS_LOOP_START, PROGRESS_MAP_INIT,
    PROGRESS_SURFACE_READY, ProgressTracker,
};
use crate::surface::{Cursor, RenderFrame, SceneSurface};

/// Share of the province extent a focused city fills.
const CITY_FIT: f64 = 0.82;
const DISTRICT_FIT: f64 = 0.86;
const GEO_CACHE_ENTRIES: usize = 32;

/// Navigation a click or an escape asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusRequest {
    Province,
    City(String),
    District { city: String, district: String },
}

/// First half of a city focus: the guard is held in `Loading` until
/// `finish_city_focus` runs.
#[derive(Debug, Clone)]
pub struct CityFocusPlan {
    pub city: String,
    token: LoadToken,
    cached: Option<Rc<FeatureCollection>>,
}

impl CityFocusPlan {
    /// Whether the geography has to be fetched first.
    pub fn needs_load(&self) -> bool {
        self.cached.is_none()
    }
}

#[derive(Debug, Copy, Clone)]
struct Stage {
    root: NodeId,
    map_group: NodeId,
    geometry_group: NodeId,
}

/// Drill-down map scene: province, city and district levels over one
/// scene graph, drawn through a host surface.
///
/// Synchronous; asynchronous geography loads are split into
/// `begin_city_focus` and `finish_city_focus` so the caller can await
/// between them without holding a borrow.
pub struct MapScene<S: SceneSurface> {
    config: SceneConfig,
    surface: S,
    renderers: LabelRenderers<S::Element>,
    assets: RegionAssets,
    projection: MercatorProjection,
    graph: SceneGraph,
    stage: Option<Stage>,
    env_anims: EnvironmentAnimations,

    province_geo: Rc<FeatureCollection>,
    province_bounds: MapBounds,
    province_group: Option<NodeId>,
    province_meshes: RegionMeshes,
    dynamic_group: Option<NodeId>,
    dynamic_meshes: RegionMeshes,

    level: Level,
    city: Option<String>,
    district: Option<String>,
    city_geo: Option<Rc<FeatureCollection>>,
    city_transformer: Option<SceneTransformer>,
    district_transformer: Option<SceneTransformer>,
    guard: TransitionGuard,
    epoch: LoadEpoch,
    geo_cache: GeoCache,

    city_data: Vec<CityDisplayDatum>,
    district_data: BTreeMap<String, Vec<DistrictDatum>>,
    markers: MarkerLayer,
    district_labels: LabelSet,
    custom_labels: LabelSet,
    custom_specs: Vec<CustomLabel<S::Element>>,

    rig: CameraRig,
    tweens: TweenSet<TweenTarget>,
    hover: HoverState,
    clicks: ClickTracker,
    rect: RectCache,
    hover_throttle: Throttle<[f64; 2]>,
    lighting: Lighting,
    frame: Option<Frame>,
    labels_dirty: bool,
    progress: ProgressTracker,
    events: EventBus<SceneEvent>,
    rng: StdRng,
    viewport: (f64, f64),
}

impl<S: SceneSurface> MapScene<S> {
    pub fn new(
        config: SceneConfig,
        surface: S,
        province: FeatureCollection,
        renderers: LabelRenderers<S::Element>,
    ) -> Self {
        let projection = config.layer.projection();
        let province_bounds = compute_bounds(&province, &projection);
        let mut resolver = AssetResolver::new();
        if let Some(base) = config.asset_base_path.as_deref() {
            resolver.set_base_path(base);
        }
        let interaction = &config.interaction;
        let layer = &config.layer;
        let rig = CameraRig::new(
            Vec3::from_array(layer.default_camera_position),
            Vec3::from_array(layer.default_camera_target),
            1.0,
            config.limits,
        );
        Self {
            assets: RegionAssets::new(resolver),
            projection,
            graph: SceneGraph::new(),
            stage: None,
            env_anims: EnvironmentAnimations::default(),
            province_geo: Rc::new(province),
            province_bounds,
            province_group: None,
            province_meshes: RegionMeshes::default(),
            dynamic_group: None,
            dynamic_meshes: RegionMeshes::default(),
            level: Level::Province,
            city: None,
            district: None,
            city_geo: None,
            city_transformer: None,
            district_transformer: None,
            guard: TransitionGuard::new(),
            epoch: LoadEpoch::new(),
            geo_cache: GeoCache::new(GEO_CACHE_ENTRIES),
            city_data: Vec::new(),
            district_data: BTreeMap::new(),
            markers: MarkerLayer::default(),
            district_labels: LabelSet::new(),
            custom_labels: LabelSet::new(),
            custom_specs: Vec::new(),
            rig,
            tweens: TweenSet::new(),
            hover: HoverState::new(),
            clicks: ClickTracker::new(interaction.click_distance_px, interaction.click_time_ms),
            rect: RectCache::new(interaction.rect_cache_ms),
            hover_throttle: Throttle::new(interaction.hover_throttle_ms),
            lighting: Lighting::default(),
            frame: None,
            labels_dirty: false,
            progress: ProgressTracker::new(),
            events: EventBus::new(),
            rng: StdRng::seed_from_u64(config.marker_seed),
            viewport: (0.0, 0.0),
            renderers,
            surface,
            config,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.rig.camera
    }

    pub fn is_mounted(&self) -> bool {
        self.stage.is_some()
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn district(&self) -> Option<&str> {
        self.district.as_deref()
    }

    pub fn transition_state(&self) -> TransitionState {
        self.guard.state()
    }

    pub fn city_data(&self) -> &[CityDisplayDatum] {
        &self.city_data
    }

    pub fn district_data(&self, city: &str) -> &[DistrictDatum] {
        self.district_data.get(city).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn province_group(&self) -> Option<NodeId> {
        self.province_group
    }

    pub fn province_meshes(&self) -> &RegionMeshes {
        &self.province_meshes
    }

    /// Meshes of the displayed level.
    pub fn active_meshes(&self) -> &RegionMeshes {
        if self.dynamic_group.is_some() {
            &self.dynamic_meshes
        } else {
            &self.province_meshes
        }
    }

    pub fn city_transformer(&self) -> Option<&SceneTransformer> {
        self.city_transformer.as_ref()
    }

    pub fn district_transformer(&self) -> Option<&SceneTransformer> {
        self.district_transformer.as_ref()
    }

    pub fn markers(&self) -> &MarkerLayer {
        &self.markers
    }

    pub fn district_labels(&self) -> &LabelSet {
        &self.district_labels
    }

    pub fn custom_labels(&self) -> &LabelSet {
        &self.custom_labels
    }

    pub fn custom_label(&self, id: &str) -> Option<&CustomLabel<S::Element>> {
        self.custom_specs.iter().find(|l| l.id == id)
    }

    pub fn hovered_region(&self) -> Option<&str> {
        self.hover.key()
    }

    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        self.events.drain().into_iter().map(|e| e.payload).collect()
    }

    fn emit(&mut self, event: SceneEvent) {
        let frame = self.frame.unwrap_or_else(|| Frame::new(0, 0.0));
        self.events.emit(frame, event);
    }

    fn report_progress(&mut self, value: u8) {
        if let Some(reported) = self.progress.set_manual(value) {
            self.emit(SceneEvent::Progress(reported));
        }
    }

    fn asset_url(&self, path: &str) -> String {
        if path.is_empty() {
            String::new()
        } else {
            self.assets.resolver().resolve(path)
        }
    }

    /// Build the stage, environment and province level. Remounting disposes
    /// first. Empty or absent `city_data` falls back to the built-in boards.
    pub fn mount(&mut self, city_data: Option<&[CityBoardDatum]>) -> Result<(), SceneError> {
        if self.is_mounted() {
            self.dispose();
        }
        tracing::info!(regions = self.province_geo.len(), "mounting map scene");
        self.set_city_data(city_data.filter(|d| !d.is_empty()));

        let zero = self.progress.reset();
        self.emit(SceneEvent::Progress(zero));

        let (width, height) = self.surface.viewport();
        self.viewport = (width, height);
        self.report_progress(PROGRESS_SURFACE_READY);

        let layer = &self.config.layer;
        self.rig = CameraRig::new(
            Vec3::from_array(layer.default_camera_position),
            Vec3::from_array(layer.default_camera_target),
            1.0,
            self.config.limits,
        );
        self.rig.camera.set_aspect(width, height);
        self.report_progress(PROGRESS_CAMERA_READY);

        self.report_progress(PROGRESS_MAP_INIT);
        let result = self.init_map();
        self.report_progress(PROGRESS_LOOP_START);
        result
    }

    fn init_map(&mut self) -> Result<(), SceneError> {
        let graph_root = self.graph.root();
        let root = self
            .graph
            .add(graph_root, Node::group("map-root"))
            .ok_or(SceneError::NotMounted)?;

        let layer = &self.config.layer;
        let textures = &self.config.textures;
        let env_textures = EnvironmentTextures {
            background: self.asset_url(&textures.background),
            water_ripple: self.asset_url(&textures.water_ripple),
            blur: self.asset_url(&textures.blur),
            rotation_border1: self.asset_url(&textures.rotation_border1),
            rotation_border2: self.asset_url(&textures.rotation_border2),
            halo_primary: self.asset_url(&textures.halo_primary),
            halo_secondary: self.asset_url(&textures.halo_secondary),
            top_glow: self.asset_url(&textures.top_glow),
        };
        let env_options = EnvironmentOptions {
            bounds: self.province_bounds,
            float_height: layer.float_height,
            offset_z: layer.offset_z,
            background_brightness: layer.background_brightness,
            textures: env_textures,
            boundary: Some((&*self.province_geo, self.projection)),
        };
        build_environment(
            &mut self.graph,
            root,
            &env_options,
            &mut self.surface,
            &mut self.env_anims,
        );

        let map_group = self
            .graph
            .add(
                root,
                Node::group("map-group").with_transform(Transform::translate(Vec3::new(
                    0.0,
                    layer.float_height,
                    layer.offset_z,
                ))),
            )
            .ok_or(SceneError::NotMounted)?;
        let geometry_group = self
            .graph
            .add(map_group, Node::group("map-geometry"))
            .ok_or(SceneError::NotMounted)?;
        self.stage = Some(Stage {
            root,
            map_group,
            geometry_group,
        });

        let province = self.build_province(false);
        let custom = self.rebuild_custom_labels();
        province.and(custom)
    }

    /// Tear everything down; the scene can be mounted again afterwards.
    pub fn dispose(&mut self) {
        let Some(stage) = self.stage.take() else {
            return;
        };
        tracing::info!("disposing map scene");
        self.hover = HoverState::new();
        self.markers.clear(&mut self.graph, &mut self.surface);
        self.markers = MarkerLayer::default();
        self.district_labels.clear(&mut self.graph, &mut self.surface);
        self.custom_labels.clear(&mut self.graph, &mut self.surface);
        let disposal = self.graph.remove(stage.root);
        detach_released(&mut self.surface, &disposal);

        self.province_group = None;
        self.province_meshes.clear();
        self.dynamic_group = None;
        self.dynamic_meshes.clear();
        self.env_anims.clear();
        self.tweens.clear();
        self.geo_cache.clear();
        self.city_geo = None;
        self.city_transformer = None;
        self.district_transformer = None;
        self.level = Level::Province;
        self.city = None;
        self.district = None;

        self.hover_throttle.cancel();
        self.clicks.reset();
        self.rect.invalidate();
        self.progress = ProgressTracker::new();
        self.frame = None;
        self.labels_dirty = false;
        self.epoch.bump_epoch();
        self.guard.release();

        let released = self.graph.drain_released();
        if !released.is_empty() {
            self.surface.release_nodes(&released);
        }
    }

    fn set_city_data(&mut self, data: Option<&[CityBoardDatum]>) {
        let source = data.map(<[CityBoardDatum]>::to_vec).unwrap_or_else(default_city_boards);
        self.city_data = build_city_display_data(&source, &self.province_geo);
        self.district_data = district_data_by_city(&self.city_data);
    }

    /// Replace the board data and refresh whatever the level shows of it.
    pub fn update_city_data(&mut self, data: Option<&[CityBoardDatum]>) -> Result<(), SceneError> {
        self.set_city_data(data);
        match self.level {
            Level::Province => self.refresh_markers(),
            Level::City => self.refresh_district_labels(),
            Level::District => Ok(()),
        }
    }

    /// Replace the custom labels. Before mount they are only stored.
    pub fn update_custom_labels(
        &mut self,
        labels: Vec<CustomLabel<S::Element>>,
    ) -> Result<(), SceneError> {
        self.custom_specs = labels;
        if !self.is_mounted() {
            return Ok(());
        }
        self.rebuild_custom_labels()
    }

    fn rebuild_custom_labels(&mut self) -> Result<(), SceneError> {
        let Some(stage) = self.stage else {
            return Ok(());
        };
        self.clear_custom_labels();
        if self.custom_specs.is_empty() {
            return Ok(());
        }
        tracing::debug!(labels = self.custom_specs.len(), "building custom labels");
        let default_height = self.config.layer.extrusion_depth + MARKER_LIFT;
        for spec in &self.custom_specs {
            let Some(element) = (spec.renderer)() else {
                tracing::warn!(id = %spec.id, "custom label renderer returned no element");
                return Err(SceneError::CustomLabelRenderer {
                    id: spec.id.clone(),
                    reason: "renderer returned no element".into(),
                });
            };
            let [x, mapped_y] = project_mapped(&self.projection, spec.position);
            let position = Vec3::new(x, spec.height.unwrap_or(default_height), -mapped_y);
            let placed = attach_label(
                &mut self.graph,
                stage.map_group,
                &mut self.surface,
                element,
                position,
                spec.scale.unwrap_or(CUSTOM_LABEL_SCALE),
                spec.region_name.clone(),
                LabelAction::Custom {
                    id: spec.id.clone(),
                },
            );
            if let Some(label) = placed {
                self.custom_labels.push(label);
            }
        }
        self.update_custom_label_visibility();
        Ok(())
    }

    fn update_custom_label_visibility(&mut self) {
        let scope = match self.level {
            Level::Province => VisibilityScope::All,
            Level::City => VisibilityScope::Only(self.city.as_deref()),
            Level::District => VisibilityScope::Only(self.district.as_deref()),
        };
        for label in self.custom_labels.iter() {
            let visible = custom_label_visible(label.region.as_deref(), scope);
            self.graph.set_visible(label.node, visible);
        }
        self.labels_dirty = true;
    }

    fn refresh_markers(&mut self) -> Result<(), SceneError> {
        let Some(stage) = self.stage else {
            return Ok(());
        };
        if self.level != Level::Province {
            return Ok(());
        }
        self.clear_markers();
        let layer = &self.config.layer;
        let options = MarkerOptions {
            projection: self.projection,
            extrusion_depth: layer.extrusion_depth,
            marker_scale: layer.city_marker_scale,
        };
        let rng = &mut self.rng;
        let result = build_city_markers(
            &mut self.graph,
            stage.map_group,
            &mut self.surface,
            &self.city_data,
            &options,
            self.renderers.city.as_deref(),
            || rng.random::<f64>() * TAU,
            &mut self.markers,
        );
        self.labels_dirty = true;
        result.map_err(SceneError::from)
    }

    fn refresh_district_labels(&mut self) -> Result<(), SceneError> {
        if self.level != Level::City {
            return Ok(());
        }
        let (Some(geo), Some(transformer), Some(city)) = (
            self.city_geo.clone(),
            self.city_transformer.clone(),
            self.city.clone(),
        ) else {
            return Ok(());
        };
        self.rebuild_district_labels(&geo, &transformer, &city)
    }

    fn rebuild_district_labels(
        &mut self,
        collection: &FeatureCollection,
        transformer: &SceneTransformer,
        city: &str,
    ) -> Result<(), SceneError> {
        let Some(stage) = self.stage else {
            return Ok(());
        };
        self.clear_district_labels();
        let ctx = DistrictLabelContext {
            city,
            transformer,
            extrusion_depth: self.config.layer.extrusion_depth,
            districts: self.district_data.get(city).map(Vec::as_slice).unwrap_or(&[]),
        };
        let result = build_district_labels(
            &mut self.graph,
            stage.map_group,
            &mut self.surface,
            collection,
            &ctx,
            self.renderers.district.as_deref(),
            &mut self.district_labels,
        );
        self.labels_dirty = true;
        result.map_err(SceneError::from)
    }

    fn clear_markers(&mut self) {
        self.markers.clear(&mut self.graph, &mut self.surface);
        self.prune_node_tweens();
        self.labels_dirty = true;
    }

    fn clear_district_labels(&mut self) {
        self.district_labels.clear(&mut self.graph, &mut self.surface);
        self.prune_node_tweens();
        self.labels_dirty = true;
    }

    fn clear_custom_labels(&mut self) {
        self.custom_labels.clear(&mut self.graph, &mut self.surface);
        self.prune_node_tweens();
        self.labels_dirty = true;
    }

    fn clear_dynamic_geometry(&mut self) {
        if let Some(group) = self.dynamic_group.take() {
            let disposal = self.graph.remove(group);
            detach_released(&mut self.surface, &disposal);
        }
        self.dynamic_meshes.clear();
        self.prune_node_tweens();
    }

    fn prune_node_tweens(&mut self) {
        let graph = &self.graph;
        self.tweens
            .kill_where(|key| matches!(key, TweenTarget::Node(id) if !graph.contains(*id)));
    }

    fn centered(&self, fit: f64) -> PlacementMode {
        PlacementMode::Centered {
            width: self.province_bounds.width * fit,
            height: self.province_bounds.height * fit,
        }
    }

    fn report_level_change(&mut self) {
        tracing::info!(
            level = %self.level,
            city = ?self.city,
            district = ?self.district,
            "level changed"
        );
        self.surface.set_level_marker(self.level);
        self.emit(SceneEvent::LevelChanged {
            level: self.level,
            city: self.city.clone(),
            district: self.district.clone(),
        });
    }

    /// Show the province level, building its geometry on first use.
    fn build_province(&mut self, animate: bool) -> Result<(), SceneError> {
        let Some(stage) = self.stage else {
            return Err(SceneError::NotMounted);
        };
        self.leave_hover();
        self.clear_dynamic_geometry();
        self.clear_markers();
        self.clear_district_labels();

        match self.province_group {
            Some(group) => self.graph.set_visible(group, true),
            None => {
                let group = self
                    .graph
                    .add(stage.geometry_group, Node::group("province-geometry"))
                    .ok_or(SceneError::NotMounted)?;
                let textures = &self.config.textures;
                let options = RegionBuildOptions {
                    mode: PlacementMode::Absolute,
                    depth: self.config.layer.extrusion_depth,
                    projection: self.projection,
                    reference_bounds: self.province_bounds,
                    textures: RegionTextureSources {
                        color: self.asset_url(&textures.base_color),
                        normal: self.asset_url(&textures.normal),
                        detail: self.asset_url(&textures.detail),
                        emissive: self.asset_url(&textures.emissive),
                        roughness: self.asset_url(&textures.roughness),
                    },
                };
                self.province_meshes.clear();
                build_region_geometry(
                    &mut self.graph,
                    group,
                    &self.province_geo,
                    &options,
                    &mut self.surface,
                    &mut self.province_meshes,
                );
                self.province_group = Some(group);
            }
        }

        self.level = Level::Province;
        self.city = None;
        self.district = None;
        self.city_geo = None;
        self.city_transformer = None;
        self.district_transformer = None;
        let markers = self.refresh_markers();
        self.report_level_change();
        self.update_custom_label_visibility();
        if animate {
            let layer = &self.config.layer;
            let position = Vec3::from_array(layer.default_camera_position);
            let target = Vec3::from_array(layer.default_camera_target);
            self.rig.apply_limits(self.config.limits);
            self.rig.transition(
                &mut self.tweens,
                position,
                target,
                self.config.interaction.camera_transition_s,
            );
        }
        markers
    }

    /// Claim the guard for a city focus.
    ///
    /// `Ok(None)` when a transition is already in flight or the name is
    /// empty. Every accepted call supersedes earlier pending loads.
    pub fn begin_city_focus(&mut self, city: &str) -> Result<Option<CityFocusPlan>, SceneError> {
        if !self.is_mounted() {
            return Err(SceneError::NotMounted);
        }
        if city.is_empty() || !self.guard.try_begin_loading(Level::City) {
            return Ok(None);
        }
        let token = self.epoch.issue();
        let cached = self.geo_cache.get(city);
        tracing::debug!(city, cached = cached.is_some(), "city focus started");
        Ok(Some(CityFocusPlan {
            city: city.to_string(),
            token,
            cached,
        }))
    }

    /// Complete a city focus with the fetched geography.
    ///
    /// `Ok(false)` when the load was superseded or produced nothing; the
    /// scene is then untouched. A label renderer error is reported after
    /// the level switch has happened.
    pub fn finish_city_focus(
        &mut self,
        plan: CityFocusPlan,
        loaded: Option<FeatureCollection>,
    ) -> Result<bool, SceneError> {
        if !self.epoch.is_current(plan.token) {
            tracing::debug!(city = %plan.city, "discarding superseded city load");
            return Ok(false);
        }
        let geo = match (plan.cached, loaded) {
            (Some(geo), _) => geo,
            (None, Some(collection)) => {
                let (geo, evicted) = self.geo_cache.insert(plan.city.clone(), collection);
                if !evicted.is_empty() {
                    tracing::debug!(?evicted, "geography cache evicted regions");
                }
                geo
            }
            (None, None) => {
                tracing::info!(city = %plan.city, "no geography for city; staying put");
                self.guard.release();
                return Ok(false);
            }
        };
        if !self.guard.promote(Level::City) {
            return Ok(false);
        }
        let result = self.apply_city(&plan.city, geo);
        self.guard.release();
        result.map(|()| true)
    }

    fn apply_city(&mut self, city: &str, geo: Rc<FeatureCollection>) -> Result<(), SceneError> {
        let Some(stage) = self.stage else {
            return Err(SceneError::NotMounted);
        };
        self.leave_hover();
        if let Some(group) = self.province_group {
            self.graph.set_visible(group, false);
        }
        self.clear_dynamic_geometry();
        self.clear_markers();
        self.clear_district_labels();

        let group = self
            .graph
            .add(stage.geometry_group, Node::group(format!("city-geometry-{city}")))
            .ok_or(SceneError::NotMounted)?;
        self.dynamic_group = Some(group);
        let options = RegionBuildOptions {
            mode: self.centered(CITY_FIT),
            depth: self.config.layer.extrusion_depth,
            projection: self.projection,
            reference_bounds: self.province_bounds,
            textures: RegionTextureSources {
                color: self.assets.city_texture(city).unwrap_or_default(),
                normal: self.assets.city_normal_texture(city).unwrap_or_default(),
                ..RegionTextureSources::default()
            },
        };
        let transformer = build_region_geometry(
            &mut self.graph,
            group,
            &geo,
            &options,
            &mut self.surface,
            &mut self.dynamic_meshes,
        );
        self.set_meshes_clickable(true);

        self.city_geo = Some(Rc::clone(&geo));
        self.city_transformer = transformer.clone();
        self.district_transformer = None;
        let labels = match &transformer {
            Some(t) => self.rebuild_district_labels(&geo, t, city),
            None => Ok(()),
        };

        self.level = Level::City;
        self.city = Some(city.to_string());
        self.district = None;
        self.report_level_change();
        self.update_custom_label_visibility();

        let view = &self.config.city_view;
        let position = Vec3::from_array(view.position);
        let target = view.target(self.config.layer.offset_z);
        self.rig.apply_limits(view.limits);
        self.rig.transition(
            &mut self.tweens,
            position,
            target,
            self.config.interaction.camera_transition_s,
        );
        tracing::debug!(city, meshes = self.dynamic_meshes.len(), "city geometry built");
        labels
    }

    fn set_meshes_clickable(&mut self, clickable: bool) {
        for mesh in &self.dynamic_meshes.meshes {
            if let Some(tag) = self.graph.get_mut(*mesh).and_then(|n| n.region_mut()) {
                tag.is_clickable = clickable;
            }
        }
    }

    /// Focus a district of the displayed city.
    ///
    /// `Ok(false)` for a no-op: busy guard, another city displayed, unknown
    /// district, or that district already focused.
    pub fn focus_district_now(&mut self, city: &str, district: &str) -> Result<bool, SceneError> {
        let Some(stage) = self.stage else {
            return Err(SceneError::NotMounted);
        };
        if !self.guard.is_idle() || city.is_empty() || district.is_empty() {
            return Ok(false);
        }
        if self.level == Level::District
            && self.city.as_deref() == Some(city)
            && self.district.as_deref() == Some(district)
        {
            return Ok(false);
        }
        if self.city.as_deref() != Some(city) {
            tracing::debug!(city, district, "district focus needs its city displayed");
            return Ok(false);
        }
        let Some(geo) = self.city_geo.clone() else {
            return Ok(false);
        };
        let Some(feature) = geo.find_by_name(district) else {
            tracing::debug!(city, district, "district not found in city geography");
            return Ok(false);
        };
        let single = FeatureCollection::singleton(feature);
        if !self.guard.try_begin(Level::District) {
            return Ok(false);
        }
        let result = self.apply_district(stage, city, district, &single);
        self.guard.release();
        result.map(|()| true)
    }

    fn apply_district(
        &mut self,
        stage: Stage,
        city: &str,
        district: &str,
        single: &FeatureCollection,
    ) -> Result<(), SceneError> {
        self.leave_hover();
        if let Some(group) = self.province_group {
            self.graph.set_visible(group, false);
        }
        self.clear_dynamic_geometry();
        self.clear_district_labels();

        let group = self
            .graph
            .add(
                stage.geometry_group,
                Node::group(format!("district-geometry-{city}-{district}")),
            )
            .ok_or(SceneError::NotMounted)?;
        self.dynamic_group = Some(group);
        let options = RegionBuildOptions {
            mode: self.centered(DISTRICT_FIT),
            depth: self.config.layer.extrusion_depth,
            projection: self.projection,
            reference_bounds: self.province_bounds,
            textures: RegionTextureSources {
                color: self.assets.district_texture(district).unwrap_or_default(),
                ..RegionTextureSources::default()
            },
        };
        let transformer = build_region_geometry(
            &mut self.graph,
            group,
            single,
            &options,
            &mut self.surface,
            &mut self.dynamic_meshes,
        );
        self.set_meshes_clickable(false);
        self.district_transformer = transformer.clone();
        let labels = match &transformer {
            Some(t) => self.rebuild_district_labels(single, t, city),
            None => Ok(()),
        };

        self.level = Level::District;
        self.city = Some(city.to_string());
        self.district = Some(district.to_string());
        self.report_level_change();
        self.update_custom_label_visibility();

        let framing = &self.config.district_view;
        let position = framing.position(transformer.as_ref().map(|t| t.normalized_scale));
        let target = framing.view.target(self.config.layer.offset_z);
        self.rig.apply_limits(framing.view.limits);
        self.rig.snap(&mut self.tweens, position, target);
        self.labels_dirty = true;
        labels
    }

    /// Return to the province level. `Ok(false)` when already there or busy.
    pub fn focus_province(&mut self) -> Result<bool, SceneError> {
        if !self.is_mounted() {
            return Err(SceneError::NotMounted);
        }
        if self.level == Level::Province || !self.guard.try_begin(Level::Province) {
            return Ok(false);
        }
        let result = self.build_province(true);
        self.guard.release();
        result.map(|()| true)
    }

    /// Where Escape leads: one level up, and nowhere while a transition
    /// is in flight.
    pub fn escape_target(&self) -> Option<FocusRequest> {
        if !self.guard.is_idle() {
            return None;
        }
        match self.level {
            Level::Province => None,
            Level::City => Some(FocusRequest::Province),
            Level::District => self.city.clone().map(FocusRequest::City),
        }
    }

    fn hit_test(&mut self, client: [f64; 2], now_ms: f64) -> Option<(String, bool)> {
        if self.active_meshes().is_empty() {
            return None;
        }
        let surface = &self.surface;
        let rect = self.rect.get_or_refresh(now_ms, || surface.container_rect());
        // Moves arrive from the whole window.
        if !rect.contains(client) {
            return None;
        }
        let [x, y] = rect.to_ndc(client)?;
        let ray = self.rig.camera.screen_ray(x, y)?;
        let hit = pick_meshes(&self.graph, &self.active_meshes().meshes, ray)?;
        let tag = self.graph.get(hit.node)?.region()?;
        Some((tag.region_name.clone(), tag.is_clickable))
    }

    /// Run the hover hit-test at a client position.
    pub fn hover_at(&mut self, client: [f64; 2], now_ms: f64) {
        let hit = self.hit_test(client, now_ms);
        let target = hit.as_ref().map(|(region, clickable)| HoverTarget {
            region,
            clickable: *clickable,
        });
        match self.hover.decide(target, self.level) {
            HoverAction::Ignore => {}
            HoverAction::Leave => self.leave_hover(),
            HoverAction::Enter { region } => {
                self.leave_hover();
                self.enter_hover(region);
            }
        }
    }

    fn enter_hover(&mut self, region: String) {
        let interaction = &self.config.interaction;
        let (lift, duration) = (interaction.mesh_hover_lift, interaction.mesh_hover_duration_s);
        let meshes = self.active_meshes().region(&region).to_vec();
        for mesh in &meshes {
            let Some(node) = self.graph.get_mut(*mesh) else {
                continue;
            };
            let from = node.transform.position;
            let Some(tag) = node.region_mut() else {
                continue;
            };
            tag.is_hovered = true;
            let to = Vec3::new(from.x, tag.original_y + lift, from.z);
            self.tweens
                .start(TweenTarget::Node(*mesh), from, to, duration, Ease::Power2Out);
        }
        self.surface.set_cursor(Cursor::Pointer);
        self.lift_region_labels(&region, true);
        tracing::trace!(region = %region, meshes = meshes.len(), "hover enter");
        self.hover.enter(region, meshes);
    }

    fn leave_hover(&mut self) {
        let Some((region, meshes)) = self.hover.take() else {
            return;
        };
        let duration = self.config.interaction.mesh_hover_duration_s;
        for mesh in &meshes {
            let Some(node) = self.graph.get_mut(*mesh) else {
                continue;
            };
            let from = node.transform.position;
            let Some(tag) = node.region_mut() else {
                continue;
            };
            tag.is_hovered = false;
            let to = Vec3::new(from.x, tag.original_y, from.z);
            self.tweens
                .start(TweenTarget::Node(*mesh), from, to, duration, Ease::Power2InOut);
        }
        self.surface.set_cursor(Cursor::Default);
        self.lift_region_labels(&region, false);
        tracing::trace!(region = %region, "hover leave");
    }

    fn lift_region_labels(&mut self, region: &str, hovering: bool) {
        let interaction = &self.config.interaction;
        let (level_labels, offset) = match self.level {
            Level::Province => (&self.markers.labels, interaction.city_label_hover_offset),
            Level::City => (&self.district_labels, interaction.district_label_hover_offset),
            Level::District => (&self.district_labels, 0.0),
        };
        let custom_offset = interaction.custom_label_hover_offset;
        let mut targets: Vec<(NodeId, f64, f64)> = Vec::new();
        if offset > 0.0 {
            targets.extend(
                level_labels
                    .matching_region(region)
                    .map(|l| (l.node, l.base_y, offset)),
            );
        }
        targets.extend(
            self.custom_labels
                .matching_region(region)
                .map(|l| (l.node, l.base_y, custom_offset)),
        );
        for (node, base_y, offset) in targets {
            self.tween_label(node, base_y, offset, hovering);
        }
    }

    fn tween_label(&mut self, node: NodeId, base_y: f64, offset: f64, raised: bool) {
        let Some(current) = self.graph.get(node) else {
            return;
        };
        let from = current.transform.position;
        let (y, ease) = if raised {
            (base_y + offset, Ease::Power2Out)
        } else {
            (base_y, Ease::Power2InOut)
        };
        self.tweens.start(
            TweenTarget::Node(node),
            from,
            Vec3::new(from.x, y, from.z),
            self.config.interaction.label_hover_duration_s,
            ease,
        );
        self.labels_dirty = true;
    }

    pub fn pointer_down(&mut self, client: [f64; 2], button: i16, now_ms: f64) {
        self.clicks.pointer_down(client, now_ms);
        self.rig.camera.on_pointer_down(client, button);
    }

    /// Hover is throttled; the trailing position is picked up by `frame`.
    pub fn pointer_move(&mut self, client: [f64; 2], now_ms: f64) {
        if self.rig.camera.on_pointer_move(client, self.viewport.1) {
            self.labels_dirty = true;
        }
        if let Some(position) = self.hover_throttle.offer(now_ms, client) {
            self.hover_at(position, now_ms);
        }
    }

    /// Releases that complete a primary-button click on a clickable mesh
    /// produce the focus to navigate to.
    pub fn pointer_up(&mut self, client: [f64; 2], button: i16, now_ms: f64) -> Option<FocusRequest> {
        self.rig.camera.on_pointer_up();
        let is_click = self.clicks.pointer_up(client, now_ms);
        if button != 0 || !is_click || !self.guard.is_idle() {
            return None;
        }
        let (region, clickable) = self.hit_test(client, now_ms)?;
        if !clickable {
            return None;
        }
        match self.level {
            Level::Province => Some(FocusRequest::City(region)),
            Level::City => self.city.clone().map(|city| FocusRequest::District {
                city,
                district: region,
            }),
            Level::District => None,
        }
    }

    pub fn wheel(&mut self, delta_y: f64) {
        self.rig.camera.on_wheel(delta_y);
        self.labels_dirty = true;
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        if self.viewport == (width, height) {
            return;
        }
        self.viewport = (width, height);
        self.rig.camera.set_aspect(width, height);
        self.surface.resize(width, height);
        self.rect.invalidate();
        self.labels_dirty = true;
    }

    /// A click on an overlay label element.
    pub fn label_clicked(&mut self, element: LabelElementId) {
        let action = [&self.markers.labels, &self.district_labels, &self.custom_labels]
            .into_iter()
            .find_map(|set| set.by_element(element))
            .map(|label| label.action.clone());
        let event = match action {
            Some(LabelAction::City { id, .. }) => self
                .city_data
                .iter()
                .find(|c| c.id == id)
                .cloned()
                .map(SceneEvent::CityLabelClicked),
            Some(LabelAction::District { city, district }) => {
                let datum = self
                    .district_data(&city)
                    .iter()
                    .find(|d| d.name == district)
                    .cloned();
                Some(SceneEvent::DistrictLabelClicked {
                    city,
                    district,
                    datum,
                })
            }
            Some(LabelAction::Custom { id }) => Some(SceneEvent::CustomLabelClicked { id }),
            None => None,
        };
        if let Some(event) = event {
            self.emit(event);
        }
    }

    /// Pointer entering or leaving a custom label element.
    pub fn label_hovered(&mut self, element: LabelElementId, entered: bool) {
        let Some(label) = self.custom_labels.by_element(element) else {
            return;
        };
        let LabelAction::Custom { id } = &label.action else {
            return;
        };
        let (node, base_y, id) = (label.node, label.base_y, id.clone());
        let offset = self.config.interaction.custom_label_hover_offset;
        self.tween_label(node, base_y, offset, entered);
        self.emit(SceneEvent::CustomLabelHovered {
            id,
            hovering: entered,
        });
    }

    /// Advance one display frame.
    pub fn frame(&mut self, dt_s: f64, now_ms: f64) {
        if !self.is_mounted() {
            return;
        }
        let frame = match self.frame {
            Some(previous) => previous.advance(dt_s),
            None => Frame::new(0, dt_s),
        };
        self.frame = Some(frame);
        if frame.is_first() {
            self.report_progress(PROGRESS_FIRST_FRAME);
        }

        if let Some(position) = self.hover_throttle.poll(now_ms) {
            self.hover_at(position, now_ms);
        }
        for sample in self.tweens.step(dt_s) {
            self.apply_tween(sample.key, sample.value);
        }
        self.rig.camera.update();
        if self.rig.take_moved() {
            self.labels_dirty = true;
        }
        self.env_anims.step(&mut self.graph);
        self.markers.step(&mut self.graph);
        self.poll_textures();

        let released = self.graph.drain_released();
        if !released.is_empty() {
            self.surface.release_nodes(&released);
        }
        self.surface.render(RenderFrame {
            graph: &self.graph,
            camera: &self.rig.camera,
            lighting: &self.lighting,
        });
        if self.labels_dirty {
            self.place_labels();
            self.labels_dirty = false;
        }
    }

    fn apply_tween(&mut self, key: TweenTarget, value: Vec3) {
        match key {
            TweenTarget::CameraPosition => self.rig.camera.position = value,
            TweenTarget::CameraTarget => self.rig.camera.target = value,
            TweenTarget::Node(id) => {
                if let Some(node) = self.graph.get_mut(id) {
                    node.transform.position = value;
                    if matches!(node.kind, NodeKind::Label(_)) {
                        self.labels_dirty = true;
                    }
                }
            }
        }
    }

    fn poll_textures(&mut self) {
        if self.progress.is_complete() {
            return;
        }
        let status = self.surface.texture_status();
        if let Some(value) = self.progress.set_assets(status.settled, status.total) {
            self.emit(SceneEvent::Progress(value));
        }
        if status.is_settled() && self.progress.complete() {
            tracing::info!(textures = status.total, "map scene loaded");
            self.emit(SceneEvent::Progress(100));
            self.emit(SceneEvent::Complete);
        }
    }

    fn place_labels(&mut self) {
        let (width, height) = self.viewport;
        let focal = height / (2.0 * (self.rig.camera.fov_y_deg.to_radians() / 2.0).tan());
        let labels: Vec<(NodeId, LabelElementId)> = self
            .markers
            .labels
            .iter()
            .chain(self.district_labels.iter())
            .chain(self.custom_labels.iter())
            .map(|l| (l.node, l.element))
            .collect();
        for (node, element) in labels {
            let placement = self.label_placement(node, width, height, focal);
            self.surface.place_label(element, placement);
        }
    }

    fn label_placement(
        &self,
        node: NodeId,
        width: f64,
        height: f64,
        focal: f64,
    ) -> Option<LabelPlacement> {
        if !self.graph.is_visible_in_tree(node) {
            return None;
        }
        let world = self.graph.world_matrix(node)?;
        let origin = world.transform_point(Vec3::ZERO);
        let world_scale = (world.transform_point(Vec3::new(1.0, 0.0, 0.0)) - origin).length();
        let screen = self.rig.camera.project_to_screen(origin, width, height)?;
        if !screen.in_view {
            return None;
        }
        let distance = (origin - self.rig.camera.position).length();
        if distance <= f64::EPSILON {
            return None;
        }
        Some(LabelPlacement {
            x: screen.x,
            y: screen.y,
            scale: world_scale * focal / distance,
            z_order: (100_000.0 - distance * 10.0).max(0.0) as i32,
        })
    }
}

#[cfg(test)]
mod tests {
    use formats::FeatureCollection;
    use foundation::math::Vec3;
    use layers::{LabelRender, UNKNOWN_REGION, project_mapped};
    use pretty_assertions::assert_eq;

    use super::{FocusRequest, MapScene};
    use crate::config::SceneConfig;
    use crate::events::{SceneError, SceneEvent};
    use crate::fixtures::{boards, hangzhou, province};
    use crate::level::{Level, TransitionState};
    use crate::options::{CustomLabel, LabelRenderers};
    use crate::surface::Cursor;
    use crate::surface::testing::RecordingSurface;

    type TestScene = MapScene<RecordingSurface>;

    fn scene() -> TestScene {
        scene_with(LabelRenderers::default())
    }

    fn scene_with(renderers: LabelRenderers<String>) -> TestScene {
        let mut scene = MapScene::new(
            SceneConfig::default(),
            RecordingSurface::default(),
            province(),
            renderers,
        );
        scene.mount(Some(&boards())).expect("mount");
        scene
    }

    fn focus_city(scene: &mut TestScene, city: &str, geo: FeatureCollection) -> bool {
        let plan = scene
            .begin_city_focus(city)
            .expect("mounted")
            .expect("guard idle");
        scene.finish_city_focus(plan, Some(geo)).expect("city focus")
    }

    fn level_changes(events: &[SceneEvent]) -> Vec<(Level, Option<String>)> {
        events
            .iter()
            .filter_map(|e| match e {
                SceneEvent::LevelChanged { level, city, .. } => Some((*level, city.clone())),
                _ => None,
            })
            .collect()
    }

    /// Client pixel over the top face of the region containing `lon_lat`.
    fn screen_point(scene: &TestScene, lon_lat: [f64; 2]) -> [f64; 2] {
        let layer = &scene.config().layer;
        let [x, mapped_y] = project_mapped(&layer.projection(), lon_lat);
        let world = Vec3::new(
            x,
            layer.float_height + layer.extrusion_depth,
            layer.offset_z - mapped_y,
        );
        let (w, h) = scene.surface().size;
        let p = scene
            .camera()
            .project_to_screen(world, w, h)
            .expect("projects");
        [p.x, p.y]
    }

    #[test]
    fn mount_reports_province_once_and_completes_after_textures() {
        let mut scene = scene();
        scene.frame(1.0 / 60.0, 0.0);
        scene.surface_mut().finish_textures();
        scene.frame(1.0 / 60.0, 16.0);
        scene.frame(1.0 / 60.0, 32.0);

        let events = scene.drain_events();
        assert_eq!(level_changes(&events), vec![(Level::Province, None)]);

        let progress: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                SceneEvent::Progress(v) => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(progress.first(), Some(&0));
        assert!(progress.windows(2).all(|w| w[0] < w[1]), "{progress:?}");
        assert_eq!(progress.iter().filter(|v| **v == 100).count(), 1);

        let hundred = events.iter().position(|e| *e == SceneEvent::Progress(100));
        let complete = events.iter().position(|e| *e == SceneEvent::Complete);
        assert!(hundred.is_some() && hundred < complete);
        assert_eq!(scene.surface().level_marker, Some(Level::Province));
        assert!(scene.surface().frames >= 3);
    }

    #[test]
    fn province_meshes_are_clickable_and_markers_follow_data() {
        let scene = scene();
        assert_eq!(scene.level(), Level::Province);
        assert_eq!(scene.province_meshes().region("Hangzhou").len(), 1);
        assert!(scene.province_meshes().region(UNKNOWN_REGION).is_empty());
        assert_eq!(scene.markers().groups.len(), 2);
        assert_eq!(scene.markers().labels.len(), 2);
        assert_eq!(scene.district_data("Hangzhou").len(), 2);
    }

    #[test]
    fn busy_guard_turns_requests_into_noops() {
        let mut scene = scene();
        let nodes = scene.graph().len();
        let plan = scene
            .begin_city_focus("Hangzhou")
            .expect("mounted")
            .expect("idle");
        assert_eq!(scene.transition_state(), TransitionState::Loading(Level::City));

        assert!(scene.begin_city_focus("Ningbo").expect("mounted").is_none());
        assert_eq!(scene.focus_province(), Ok(false));
        assert_eq!(scene.focus_district_now("Hangzhou", "Xihu"), Ok(false));
        assert_eq!(scene.escape_target(), None);
        assert_eq!(scene.graph().len(), nodes);
        assert_eq!(scene.level(), Level::Province);

        assert_eq!(scene.finish_city_focus(plan, Some(hangzhou())), Ok(true));
        assert_eq!(scene.transition_state(), TransitionState::Idle);
        assert_eq!(scene.level(), Level::City);
    }

    #[test]
    fn missing_geography_leaves_scene_untouched() {
        let mut scene = scene();
        scene.drain_events();
        let plan = scene
            .begin_city_focus("Atlantis")
            .expect("mounted")
            .expect("idle");
        assert_eq!(scene.finish_city_focus(plan, None), Ok(false));
        assert_eq!(scene.level(), Level::Province);
        assert!(scene.transition_state() == TransitionState::Idle);
        assert!(level_changes(&scene.drain_events()).is_empty());
    }

    #[test]
    fn superseded_load_is_discarded() {
        let mut scene = scene();
        let stale = scene
            .begin_city_focus("Hangzhou")
            .expect("mounted")
            .expect("idle");
        scene.mount(Some(&boards())).expect("remount");
        assert_eq!(scene.finish_city_focus(stale, Some(hangzhou())), Ok(false));
        assert_eq!(scene.level(), Level::Province);
        assert_eq!(scene.transition_state(), TransitionState::Idle);
    }

    #[test]
    fn city_round_trip_rebuilds_the_same_layout() {
        let mut scene = scene();
        let province_group = scene.province_group();
        assert!(focus_city(&mut scene, "Hangzhou", hangzhou()));
        let first_meshes = scene.active_meshes().len();
        let first_scale = scene.city_transformer().map(|t| t.normalized_scale);
        let first_labels = scene.district_labels().len();
        assert!(scene.markers().is_empty());
        assert_eq!(first_labels, 2);
        assert!(
            !scene
                .graph()
                .is_visible_in_tree(province_group.expect("province group"))
        );

        assert_eq!(scene.focus_province(), Ok(true));
        assert_eq!(scene.province_group(), province_group);
        assert!(scene.city_transformer().is_none());
        assert!(scene.district_labels().is_empty());

        // Cached: no geography needed the second time.
        let plan = scene
            .begin_city_focus("Hangzhou")
            .expect("mounted")
            .expect("idle");
        assert!(!plan.needs_load());
        assert_eq!(scene.finish_city_focus(plan, None), Ok(true));
        assert_eq!(scene.active_meshes().len(), first_meshes);
        assert_eq!(
            scene.city_transformer().map(|t| t.normalized_scale),
            first_scale
        );
        assert_eq!(scene.district_labels().len(), first_labels);
    }

    #[test]
    fn focusing_province_twice_is_idempotent() {
        let mut scene = scene();
        let group = scene.province_group();
        let meshes = scene.province_meshes().clone();
        let nodes = scene.graph().len();
        scene.drain_events();
        assert_eq!(scene.focus_province(), Ok(false));
        assert_eq!(scene.province_group(), group);
        assert_eq!(scene.province_meshes(), &meshes);
        assert_eq!(scene.graph().len(), nodes);
        assert!(scene.drain_events().is_empty());
    }

    #[test]
    fn district_focus_snaps_camera_and_locks_meshes() {
        let mut scene = scene();
        focus_city(&mut scene, "Hangzhou", hangzhou());
        assert_eq!(scene.focus_district_now("Ningbo", "Xihu"), Ok(false));
        assert_eq!(scene.focus_district_now("Hangzhou", "Nowhere"), Ok(false));
        assert_eq!(scene.focus_district_now("Hangzhou", "Xihu"), Ok(true));
        assert_eq!(scene.level(), Level::District);
        assert_eq!(scene.district(), Some("Xihu"));
        assert_eq!(scene.district_labels().len(), 1);

        let config = scene.config().clone();
        let target = config.district_view.view.target(config.layer.offset_z);
        assert_eq!(scene.camera().target, target);
        assert_eq!(scene.camera().limits, config.district_view.view.limits);

        for mesh in &scene.active_meshes().meshes {
            let tag = scene.graph().get(*mesh).and_then(|n| n.region());
            assert_eq!(tag.map(|t| t.is_clickable), Some(false));
        }
        assert_eq!(scene.focus_district_now("Hangzhou", "Xihu"), Ok(false));
        assert_eq!(
            scene.escape_target(),
            Some(FocusRequest::City("Hangzhou".into()))
        );
    }

    #[test]
    fn hover_lifts_region_and_leaves_once() {
        let mut scene = scene();
        scene.frame(1.0 / 60.0, 0.0);
        let over = screen_point(&scene, [120.15, 29.25]);
        scene.hover_at(over, 0.0);
        assert_eq!(scene.hovered_region(), Some("Hangzhou"));
        assert_eq!(scene.surface().cursor, Cursor::Pointer);

        // Let the lift finish.
        for i in 1..=60 {
            scene.frame(1.0 / 60.0, i as f64 * 16.0);
        }
        let mesh = scene.province_meshes().region("Hangzhou")[0];
        let lifted = scene.graph().get(mesh).map(|n| n.transform.position.y);
        assert_eq!(lifted, Some(8.0));

        scene.hover_at([1.0, 1.0], 2000.0);
        assert_eq!(scene.hovered_region(), None);
        assert_eq!(scene.surface().cursor, Cursor::Default);
        scene.surface_mut().cursor = Cursor::Pointer;
        scene.hover_at([1.0, 1.0], 2200.0);
        // The second miss found nothing to leave.
        assert_eq!(scene.surface().cursor, Cursor::Pointer);
    }

    #[test]
    fn leaving_the_container_ends_hover() {
        let mut scene = scene();
        scene.frame(1.0 / 60.0, 0.0);
        let over = screen_point(&scene, [120.15, 29.25]);
        scene.hover_at(over, 0.0);
        assert_eq!(scene.hovered_region(), Some("Hangzhou"));

        scene.hover_at([-40.0, over[1]], 500.0);
        assert_eq!(scene.hovered_region(), None);
        assert_eq!(scene.surface().cursor, Cursor::Default);

        // A release outside the map is never a click.
        scene.pointer_down(over, 0, 600.0);
        let (w, h) = scene.surface().size;
        assert_eq!(scene.pointer_up([w + 1.0, h + 1.0], 0, 620.0), None);
    }

    #[test]
    fn clicks_focus_but_drags_do_not() {
        let mut scene = scene();
        scene.frame(1.0 / 60.0, 0.0);
        let over = screen_point(&scene, [120.65, 29.25]);

        scene.pointer_down(over, 0, 0.0);
        let dragged = [over[0] + 20.0, over[1]];
        assert_eq!(scene.pointer_up(dragged, 0, 50.0), None);

        scene.pointer_down(over, 0, 100.0);
        assert_eq!(scene.pointer_up(over, 2, 150.0), None);

        scene.pointer_down(over, 0, 200.0);
        let nudged = [over[0] + 2.0, over[1]];
        assert_eq!(
            scene.pointer_up(nudged, 0, 250.0),
            Some(FocusRequest::City("Ningbo".into()))
        );
    }

    #[test]
    fn renderer_errors_surface_after_the_switch() {
        let renderers = LabelRenderers {
            city: None,
            district: Some(Box::new(|name: &str, _| {
                LabelRender::Invalid(format!("no markup for {name}"))
            })),
        };
        let mut scene = scene_with(renderers);
        let plan = scene
            .begin_city_focus("Hangzhou")
            .expect("mounted")
            .expect("idle");
        let result = scene.finish_city_focus(plan, Some(hangzhou()));
        assert!(matches!(result, Err(SceneError::LabelRenderer { .. })));
        assert_eq!(scene.level(), Level::City);
        assert_eq!(scene.transition_state(), TransitionState::Idle);
    }

    #[test]
    fn custom_labels_follow_their_regions() {
        let mut scene = scene();
        let labels = vec![
            CustomLabel::new("poi", [120.1, 29.2], || Some("poi".to_string()))
                .with_region("Hangzhou,Ningbo"),
            CustomLabel::new("stray", [120.6, 29.2], || Some("stray".to_string())),
        ];
        scene.update_custom_labels(labels).expect("custom labels");
        let node_of = |scene: &TestScene, id: &str| {
            let element = scene.surface().element_id(id).expect("attached");
            scene
                .custom_labels()
                .by_element(element)
                .map(|l| l.node)
                .expect("placed")
        };
        let poi = node_of(&scene, "poi");
        let stray = node_of(&scene, "stray");
        assert!(scene.graph().is_visible_in_tree(poi));
        assert!(!scene.graph().is_visible_in_tree(stray));

        focus_city(&mut scene, "Hangzhou", hangzhou());
        assert!(scene.graph().is_visible_in_tree(poi));
        assert_eq!(scene.focus_district_now("Hangzhou", "Xihu"), Ok(true));
        assert!(!scene.graph().is_visible_in_tree(poi));

        scene.label_clicked(scene.surface().element_id("poi").expect("attached"));
        assert!(
            scene
                .drain_events()
                .contains(&SceneEvent::CustomLabelClicked { id: "poi".into() })
        );

        let broken = vec![CustomLabel::new("void", [120.0, 29.0], || None::<String>)];
        assert!(matches!(
            scene.update_custom_labels(broken),
            Err(SceneError::CustomLabelRenderer { .. })
        ));
    }

    #[test]
    fn city_label_click_reports_display_datum() {
        let mut scene = scene();
        scene.frame(1.0 / 60.0, 0.0);
        let label = scene
            .markers()
            .labels
            .iter()
            .next()
            .map(|l| l.element)
            .expect("city label");
        scene.drain_events();
        scene.label_clicked(label);
        let events = scene.drain_events();
        assert!(matches!(
            events.as_slice(),
            [SceneEvent::CityLabelClicked(datum)] if datum.rank >= 1
        ));
    }

    #[test]
    fn dispose_detaches_every_label() {
        let mut scene = scene();
        focus_city(&mut scene, "Hangzhou", hangzhou());
        scene.frame(1.0 / 60.0, 0.0);
        assert!(!scene.surface().attached.is_empty());
        scene.dispose();
        assert!(!scene.is_mounted());
        assert!(scene.surface().attached.is_empty());
        assert_eq!(scene.graph().len(), 1);
        assert_eq!(scene.level(), Level::Province);
        assert_eq!(
            scene.begin_city_focus("Hangzhou").map(|p| p.is_some()),
            Err(SceneError::NotMounted)
        );
    }
}

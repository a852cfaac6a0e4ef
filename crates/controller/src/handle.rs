use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use formats::CityBoardDatum;
use scene::LabelElementId;
use streaming::GeoLoader;

use crate::events::{SceneError, SceneEvent};
use crate::level::Level;
use crate::options::{CustomLabel, SceneCallbacks};
use crate::scene::{FocusRequest, MapScene};
use crate::surface::SceneSurface;

struct Dispatch {
    callbacks: RefCell<SceneCallbacks>,
    pending: RefCell<VecDeque<SceneEvent>>,
    flushing: Cell<bool>,
}

/// Shared, cloneable entry point to a mounted scene.
///
/// Scene borrows never span an await, and events are dispatched only after
/// the borrow that produced them is released, so callbacks may call back
/// into the handle.
pub struct SceneHandle<S: SceneSurface> {
    scene: Rc<RefCell<MapScene<S>>>,
    loader: Rc<dyn GeoLoader>,
    dispatch: Rc<Dispatch>,
}

impl<S: SceneSurface> Clone for SceneHandle<S> {
    fn clone(&self) -> Self {
        Self {
            scene: Rc::clone(&self.scene),
            loader: Rc::clone(&self.loader),
            dispatch: Rc::clone(&self.dispatch),
        }
    }
}

impl<S: SceneSurface> SceneHandle<S> {
    pub fn new(scene: MapScene<S>, loader: Rc<dyn GeoLoader>, callbacks: SceneCallbacks) -> Self {
        Self {
            scene: Rc::new(RefCell::new(scene)),
            loader,
            dispatch: Rc::new(Dispatch {
                callbacks: RefCell::new(callbacks),
                pending: RefCell::new(VecDeque::new()),
                flushing: Cell::new(false),
            }),
        }
    }

    pub fn with_scene<R>(&self, f: impl FnOnce(&MapScene<S>) -> R) -> R {
        f(&self.scene.borrow())
    }

    /// Mutate the scene, then deliver whatever events it queued.
    pub fn with_scene_mut<R>(&self, f: impl FnOnce(&mut MapScene<S>) -> R) -> R {
        let out = {
            let mut scene = self.scene.borrow_mut();
            f(&mut scene)
        };
        self.flush_events();
        out
    }

    pub fn set_callbacks(&self, callbacks: SceneCallbacks) {
        *self.dispatch.callbacks.borrow_mut() = callbacks;
    }

    pub fn mount(&self, city_data: Option<&[CityBoardDatum]>) -> Result<(), SceneError> {
        self.with_scene_mut(|scene| scene.mount(city_data))
    }

    pub fn dispose(&self) {
        self.with_scene_mut(|scene| scene.dispose());
    }

    pub fn update_city_data(&self, data: Option<&[CityBoardDatum]>) -> Result<(), SceneError> {
        self.with_scene_mut(|scene| scene.update_city_data(data))
    }

    pub fn update_custom_labels(&self, labels: Vec<CustomLabel<S::Element>>) -> Result<(), SceneError> {
        self.with_scene_mut(|scene| scene.update_custom_labels(labels))
    }

    pub fn level(&self) -> Level {
        self.with_scene(|scene| scene.level())
    }

    pub fn frame(&self, dt_s: f64, now_ms: f64) {
        self.with_scene_mut(|scene| scene.frame(dt_s, now_ms));
    }

    pub fn resize(&self, width: f64, height: f64) {
        self.with_scene_mut(|scene| scene.resize(width, height));
    }

    pub fn pointer_down(&self, client: [f64; 2], button: i16, now_ms: f64) {
        self.with_scene_mut(|scene| scene.pointer_down(client, button, now_ms));
    }

    pub fn pointer_move(&self, client: [f64; 2], now_ms: f64) {
        self.with_scene_mut(|scene| scene.pointer_move(client, now_ms));
    }

    /// The navigation a completed click asks for; the caller drives it
    /// with `navigate`.
    pub fn pointer_up(&self, client: [f64; 2], button: i16, now_ms: f64) -> Option<FocusRequest> {
        self.with_scene_mut(|scene| scene.pointer_up(client, button, now_ms))
    }

    pub fn wheel(&self, delta_y: f64) {
        self.with_scene_mut(|scene| scene.wheel(delta_y));
    }

    pub fn label_clicked(&self, element: LabelElementId) {
        self.with_scene_mut(|scene| scene.label_clicked(element));
    }

    pub fn label_hovered(&self, element: LabelElementId, entered: bool) {
        self.with_scene_mut(|scene| scene.label_hovered(element, entered));
    }

    /// Load (or reuse) a city's geography and show it.
    ///
    /// `Ok(false)` when the request was ignored: busy, unknown city, or
    /// superseded while loading.
    pub async fn focus_city(&self, city: &str) -> Result<bool, SceneError> {
        let Some(plan) = self.with_scene_mut(|scene| scene.begin_city_focus(city))? else {
            return Ok(false);
        };
        let loaded = if plan.needs_load() {
            self.loader.load(&plan.city).await
        } else {
            None
        };
        self.with_scene_mut(|scene| scene.finish_city_focus(plan, loaded))
    }

    /// Show a district, first focusing its city when another level or city
    /// is displayed.
    pub async fn focus_district(&self, city: &str, district: &str) -> Result<bool, SceneError> {
        let (idle, level, current) = self.with_scene(|scene| {
            (
                scene.transition_state().is_idle(),
                scene.level(),
                scene.city().map(str::to_string),
            )
        });
        if !idle {
            return Ok(false);
        }
        if level == Level::Province || current.as_deref() != Some(city) {
            self.focus_city(city).await?;
        }
        self.with_scene_mut(|scene| scene.focus_district_now(city, district))
    }

    pub async fn focus_province(&self) -> Result<bool, SceneError> {
        self.with_scene_mut(|scene| scene.focus_province())
    }

    pub async fn navigate(&self, request: FocusRequest) -> Result<bool, SceneError> {
        match request {
            FocusRequest::Province => self.focus_province().await,
            FocusRequest::City(city) => self.focus_city(&city).await,
            FocusRequest::District { city, district } => {
                self.focus_district(&city, &district).await
            }
        }
    }

    /// Escape: one level up, ignored while a transition runs.
    pub async fn navigate_up(&self) -> Result<bool, SceneError> {
        let Some(request) = self.with_scene(|scene| scene.escape_target()) else {
            return Ok(false);
        };
        self.navigate(request).await
    }

    fn flush_events(&self) {
        let drained = self.scene.borrow_mut().drain_events();
        self.dispatch.pending.borrow_mut().extend(drained);
        // A callback re-entering the handle only queues; the outer loop
        // delivers in order.
        if self.dispatch.flushing.replace(true) {
            return;
        }
        loop {
            let next = self.dispatch.pending.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            self.deliver(&event);
        }
        self.dispatch.flushing.set(false);
    }

    fn deliver(&self, event: &SceneEvent) {
        match event {
            SceneEvent::CustomLabelClicked { id } => {
                let handler = self
                    .scene
                    .borrow()
                    .custom_label(id)
                    .and_then(|l| l.on_click.clone());
                if let Some(handler) = handler {
                    handler(id);
                }
            }
            SceneEvent::CustomLabelHovered { id, hovering } => {
                let handler = self
                    .scene
                    .borrow()
                    .custom_label(id)
                    .and_then(|l| l.on_hover.clone());
                if let Some(handler) = handler {
                    handler(id, *hovering);
                }
            }
            _ => {
                let Ok(mut callbacks) = self.dispatch.callbacks.try_borrow_mut() else {
                    tracing::warn!(?event, "callbacks busy; dropping event");
                    return;
                };
                callbacks.dispatch(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;
    use streaming::StaticGeoLoader;

    use super::SceneHandle;
    use crate::config::SceneConfig;
    use crate::fixtures::{boards, hangzhou, province};
    use crate::level::Level;
    use crate::options::{CustomLabel, LabelRenderers, SceneCallbacks};
    use crate::scene::{FocusRequest, MapScene};
    use crate::surface::testing::RecordingSurface;

    type Log = Rc<RefCell<Vec<String>>>;

    fn handle(loader: Rc<StaticGeoLoader>) -> (SceneHandle<RecordingSurface>, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut callbacks = SceneCallbacks::default();
        let sink = Rc::clone(&log);
        callbacks.on_level_change = Some(Box::new(
            move |level: Level, city: Option<&str>, district: Option<&str>| {
                sink.borrow_mut().push(format!(
                    "{level}:{}:{}",
                    city.unwrap_or("-"),
                    district.unwrap_or("-")
                ));
            },
        ));
        let sink = Rc::clone(&log);
        callbacks.on_complete = Some(Box::new(move || sink.borrow_mut().push("complete".into())));
        let scene = MapScene::new(
            SceneConfig::default(),
            RecordingSurface::default(),
            province(),
            LabelRenderers::default(),
        );
        let handle = SceneHandle::new(scene, loader, callbacks);
        handle.mount(Some(&boards())).expect("mount");
        (handle, log)
    }

    fn loader() -> Rc<StaticGeoLoader> {
        Rc::new(StaticGeoLoader::new().with_region("Hangzhou", hangzhou()))
    }

    #[test]
    fn district_focus_from_province_goes_through_city() {
        let (handle, log) = handle(loader());
        let focused = pollster::block_on(handle.focus_district("Hangzhou", "Binjiang"));
        assert_eq!(focused, Ok(true));
        assert_eq!(
            *log.borrow(),
            vec![
                "province:-:-".to_string(),
                "city:Hangzhou:-".to_string(),
                "district:Hangzhou:Binjiang".to_string(),
            ]
        );
    }

    #[test]
    fn unknown_city_aborts_district_step() {
        let (handle, log) = handle(loader());
        let focused = pollster::block_on(handle.focus_district("Ningbo", "Beilun"));
        assert_eq!(focused, Ok(false));
        assert_eq!(handle.level(), Level::Province);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn geography_is_fetched_once_per_city() {
        let loader = loader();
        let (handle, _) = handle(Rc::clone(&loader));
        assert_eq!(pollster::block_on(handle.focus_city("Hangzhou")), Ok(true));
        assert_eq!(pollster::block_on(handle.navigate_up()), Ok(true));
        assert_eq!(handle.level(), Level::Province);
        assert_eq!(pollster::block_on(handle.focus_city("Hangzhou")), Ok(true));
        assert_eq!(loader.calls(), 1);

        assert_eq!(
            pollster::block_on(handle.navigate(FocusRequest::District {
                city: "Hangzhou".into(),
                district: "Xihu".into(),
            })),
            Ok(true)
        );
        assert_eq!(pollster::block_on(handle.navigate_up()), Ok(true));
        assert_eq!(handle.level(), Level::City);
    }

    #[test]
    fn callbacks_fire_after_loading_completes() {
        let (handle, log) = handle(loader());
        handle.frame(1.0 / 60.0, 0.0);
        handle.with_scene_mut(|scene| scene.surface_mut().finish_textures());
        handle.frame(1.0 / 60.0, 16.0);
        handle.frame(1.0 / 60.0, 32.0);
        let completes = log.borrow().iter().filter(|e| *e == "complete").count();
        assert_eq!(completes, 1);
    }

    #[test]
    fn custom_label_handlers_can_reenter_the_handle() {
        let (handle, _) = handle(loader());
        let clicks: Log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&clicks);
        let inner = handle.clone();
        let label = CustomLabel::new("poi", [120.1, 29.2], || Some("poi".to_string()))
            .with_region("Hangzhou")
            .on_click(move |id| {
                sink.borrow_mut().push(format!("{id}@{}", inner.level()));
            });
        handle.update_custom_labels(vec![label]).expect("custom labels");

        let element = handle.with_scene(|scene| scene.surface().element_id("poi"));
        handle.label_clicked(element.expect("attached"));
        assert_eq!(*clicks.borrow(), vec!["poi@province".to_string()]);
    }
}

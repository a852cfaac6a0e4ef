use std::cell::{Cell, RefCell};
use std::rc::Rc;

use console_error_panic_hook::set_once;
use controller::{CustomLabel, MapScene, SceneError, SceneHandle};
use formats::CityBoardDatum;
use js_sys::Promise;
use streaming::{AssetResolver, RegionAssets};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::{Event, EventTarget, HtmlCanvasElement, HtmlElement, KeyboardEvent, MouseEvent, WheelEvent};

mod bake;
mod js;
mod loader;
mod overlay;
mod surface;
mod wgpu;

use js::error_value;
use loader::FetchGeoLoader;
use overlay::{DomOverlay, OverlayEvent, OverlayQueue};
use surface::WebSurface;
use wgpu::init_wgpu_from_canvas;

type RafClosure = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;
type Listener = (EventTarget, &'static str, Closure<dyn FnMut(Event)>);

/// Longest step fed to animations after a stalled tab.
const MAX_FRAME_STEP_S: f64 = 0.1;

struct FrameLoop {
    closure: RafClosure,
    request: Rc<Cell<i32>>,
    running: Rc<Cell<bool>>,
}

struct Mounted {
    handle: SceneHandle<WebSurface>,
    listeners: Vec<Listener>,
    frames: FrameLoop,
}

/// Exclusive right to run one mount for the current generation.
struct MountClaim {
    slot: Rc<Cell<Option<u64>>>,
    generation: u64,
}

impl MountClaim {
    /// `None` while another mount of the same generation is in flight.
    fn take(slot: &Rc<Cell<Option<u64>>>, generation: u64) -> Option<Self> {
        if slot.get() == Some(generation) {
            return None;
        }
        slot.set(Some(generation));
        Some(Self {
            slot: Rc::clone(slot),
            generation,
        })
    }
}

impl Drop for MountClaim {
    fn drop(&mut self) {
        // A dispose and remount may have claimed the slot since.
        if self.slot.get() == Some(self.generation) {
            self.slot.set(None);
        }
    }
}

#[derive(Default)]
struct Pending {
    city_data: Option<Vec<CityBoardDatum>>,
    labels: Option<Vec<CustomLabel<HtmlElement>>>,
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    set_once();
    let _ = console_log::init_with_level(log::Level::Info);
    Ok(())
}

/// Drill-down map bound to one container element.
#[wasm_bindgen]
pub struct MapViewer {
    container: HtmlElement,
    options: JsValue,
    mounted: Rc<RefCell<Option<Mounted>>>,
    pending: Rc<RefCell<Pending>>,
    /// Bumped by `dispose` so a mount still awaiting its assets gives up.
    generation: Rc<Cell<u64>>,
    mounting: Rc<Cell<Option<u64>>>,
}

#[wasm_bindgen]
impl MapViewer {
    #[wasm_bindgen(constructor)]
    pub fn new(container_id: &str, options: JsValue) -> Result<MapViewer, JsValue> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("document missing"))?;
        let container: HtmlElement = document
            .get_element_by_id(container_id)
            .ok_or_else(|| JsValue::from_str("map container missing"))?
            .dyn_into()?;
        if container.style().get_property_value("position")?.is_empty() {
            container.style().set_property("position", "relative")?;
        }
        Ok(MapViewer {
            container,
            options,
            mounted: Rc::new(RefCell::new(None)),
            pending: Rc::new(RefCell::new(Pending::default())),
            generation: Rc::new(Cell::new(0)),
            mounting: Rc::new(Cell::new(None)),
        })
    }

    /// Fetch the province geography, build the scene and start rendering.
    ///
    /// Resolves immediately while the viewer is mounted or another mount is
    /// still in flight.
    pub fn mount(&self, city_data: JsValue) -> Promise {
        let started = self.generation.get();
        let claim = if self.mounted.borrow().is_some() {
            None
        } else {
            MountClaim::take(&self.mounting, started)
        };
        let Some(claim) = claim else {
            return Promise::resolve(&JsValue::UNDEFINED);
        };
        let container = self.container.clone();
        let options = self.options.clone();
        let mounted = Rc::clone(&self.mounted);
        let pending = Rc::clone(&self.pending);
        let generation = Rc::clone(&self.generation);
        future_to_promise(async move {
            let _claim = claim;
            let config = js::config_from(&options)?;
            let boards = if city_data.is_null() || city_data.is_undefined() {
                pending.borrow().city_data.clone()
            } else {
                Some(js::from_js::<Vec<CityBoardDatum>>(&city_data)?)
            };

            let document = web_sys::window()
                .and_then(|w| w.document())
                .ok_or_else(|| JsValue::from_str("document missing"))?;
            let canvas: HtmlCanvasElement = document.create_element("canvas")?.dyn_into()?;
            let style = canvas.style();
            style.set_property("display", "block")?;
            style.set_property("width", "100%")?;
            style.set_property("height", "100%")?;
            container.append_child(&canvas)?;
            let mut overlay = match DomOverlay::new(document, &container) {
                Ok(overlay) => overlay,
                Err(err) => {
                    canvas.remove();
                    return Err(err);
                }
            };

            let mut resolver = AssetResolver::new();
            if let Some(base) = config.asset_base_path.as_deref() {
                resolver.set_base_path(base);
            }
            let loader = FetchGeoLoader::new(RegionAssets::new(resolver));
            let renderer = init_wgpu_from_canvas(canvas.clone()).await;
            let province = loader.province().await;

            if generation.get() != started {
                overlay.teardown();
                canvas.remove();
                return Ok(JsValue::UNDEFINED);
            }
            let renderer = match renderer {
                Ok(renderer) => renderer,
                Err(err) => {
                    overlay.teardown();
                    canvas.remove();
                    return Err(err);
                }
            };
            let Some(province) = province else {
                overlay.teardown();
                canvas.remove();
                return Err(error_value("province geography unavailable"));
            };

            let surface = WebSurface::new(container.clone(), canvas.clone(), overlay, renderer);
            let overlay_events = surface.overlay_events();
            let (width, height) = surface.measure();
            let scene = MapScene::new(config, surface, province, js::renderers_from(&options));
            let handle = SceneHandle::new(scene, Rc::new(loader), js::callbacks_from(&options));
            let labels = pending.borrow_mut().labels.take();
            let started_up = start_mounted(
                &handle,
                &canvas,
                labels,
                boards.as_deref(),
                overlay_events,
                (width, height),
            );
            let fresh = match started_up {
                Ok(fresh) => fresh,
                Err(err) => {
                    handle.dispose();
                    handle.with_scene_mut(|scene| scene.surface_mut().teardown());
                    return Err(err);
                }
            };
            pending.borrow_mut().city_data = None;
            let previous = mounted.borrow_mut().replace(fresh);
            if let Some(previous) = previous {
                tear_down(previous);
            }
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Stop rendering and remove everything the viewer added to the page.
    pub fn dispose(&self) {
        self.generation.set(self.generation.get() + 1);
        let taken = self.mounted.borrow_mut().take();
        if let Some(mounted) = taken {
            tear_down(mounted);
        }
    }

    pub fn update_city_data(&self, data: JsValue) -> Result<(), JsValue> {
        let boards = if data.is_null() || data.is_undefined() {
            None
        } else {
            Some(js::from_js::<Vec<CityBoardDatum>>(&data)?)
        };
        match self.handle() {
            Some(handle) => handle.update_city_data(boards.as_deref()).map_err(error_value),
            None => {
                self.pending.borrow_mut().city_data = boards;
                Ok(())
            }
        }
    }

    pub fn update_custom_labels(&self, labels: JsValue) -> Result<(), JsValue> {
        let labels = js::custom_labels_from(&labels)?;
        match self.handle() {
            Some(handle) => handle.update_custom_labels(labels).map_err(error_value),
            None => {
                self.pending.borrow_mut().labels = Some(labels);
                Ok(())
            }
        }
    }

    /// Resolves `true` when the view moved to the city.
    pub fn focus_city(&self, city: String) -> Promise {
        let handle = self.handle();
        future_to_promise(async move {
            let handle = handle.ok_or_else(|| error_value(SceneError::NotMounted))?;
            let moved = handle.focus_city(&city).await.map_err(error_value)?;
            Ok(JsValue::from_bool(moved))
        })
    }

    pub fn focus_district(&self, city: String, district: String) -> Promise {
        let handle = self.handle();
        future_to_promise(async move {
            let handle = handle.ok_or_else(|| error_value(SceneError::NotMounted))?;
            let moved = handle
                .focus_district(&city, &district)
                .await
                .map_err(error_value)?;
            Ok(JsValue::from_bool(moved))
        })
    }

    pub fn focus_province(&self) -> Promise {
        let handle = self.handle();
        future_to_promise(async move {
            let handle = handle.ok_or_else(|| error_value(SceneError::NotMounted))?;
            let moved = handle.focus_province().await.map_err(error_value)?;
            Ok(JsValue::from_bool(moved))
        })
    }

    /// `"province"`, `"city"` or `"district"`.
    pub fn level(&self) -> Option<String> {
        self.handle().map(|h| h.level().as_str().to_string())
    }
}

impl MapViewer {
    fn handle(&self) -> Option<SceneHandle<WebSurface>> {
        self.mounted.borrow().as_ref().map(|m| m.handle.clone())
    }
}

/// Scene wiring that must be undone as a whole when any step fails.
fn start_mounted(
    handle: &SceneHandle<WebSurface>,
    canvas: &HtmlCanvasElement,
    labels: Option<Vec<CustomLabel<HtmlElement>>>,
    boards: Option<&[CityBoardDatum]>,
    overlay_events: OverlayQueue,
    (width, height): (f64, f64),
) -> Result<Mounted, JsValue> {
    if let Some(labels) = labels {
        handle.update_custom_labels(labels).map_err(error_value)?;
    }
    handle.resize(width, height);
    handle.mount(boards).map_err(error_value)?;

    let listeners = attach_listeners(handle, canvas)?;
    let frames = match start_frame_loop(handle.clone(), overlay_events) {
        Ok(frames) => frames,
        Err(err) => {
            detach_listeners(&listeners);
            return Err(err);
        }
    };
    Ok(Mounted {
        handle: handle.clone(),
        listeners,
        frames,
    })
}

fn tear_down(mounted: Mounted) {
    detach_listeners(&mounted.listeners);
    mounted.frames.running.set(false);
    if let Some(window) = web_sys::window() {
        let _ = window.cancel_animation_frame(mounted.frames.request.get());
    }
    mounted.handle.dispose();
    mounted.handle.with_scene_mut(|scene| scene.surface_mut().teardown());
    // A listener or frame callback may be what called us; free the
    // closures once it has returned.
    spawn_local(async move {
        drop(mounted);
    });
}

fn detach_listeners(listeners: &[Listener]) {
    for (target, kind, closure) in listeners {
        let _ = target.remove_event_listener_with_callback(kind, closure.as_ref().unchecked_ref());
    }
}

fn client_pos(e: &MouseEvent) -> [f64; 2] {
    [f64::from(e.client_x()), f64::from(e.client_y())]
}

fn listen(
    target: &EventTarget,
    kind: &'static str,
    handler: impl FnMut(Event) + 'static,
) -> Result<Listener, JsValue> {
    let closure = Closure::<dyn FnMut(Event)>::new(handler);
    target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())?;
    Ok((target.clone(), kind, closure))
}

fn spawn_navigation<F>(label: &'static str, navigation: F)
where
    F: std::future::Future<Output = Result<bool, SceneError>> + 'static,
{
    spawn_local(async move {
        if let Err(err) = navigation.await {
            tracing::warn!(action = label, error = %err, "navigation failed");
        }
    });
}

fn attach_listeners(
    handle: &SceneHandle<WebSurface>,
    canvas: &HtmlCanvasElement,
) -> Result<Vec<Listener>, JsValue> {
    let mut listeners = Vec::new();
    if let Err(err) = register_listeners(handle, canvas, &mut listeners) {
        detach_listeners(&listeners);
        return Err(err);
    }
    Ok(listeners)
}

/// Presses start on the canvas. Moves and releases are tracked on the
/// window so hovering a label or leaving the map still reaches the scene.
fn register_listeners(
    handle: &SceneHandle<WebSurface>,
    canvas: &HtmlCanvasElement,
    listeners: &mut Vec<Listener>,
) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("window missing"))?;
    let canvas: &EventTarget = canvas.as_ref();
    let window_target: &EventTarget = window.as_ref();

    let h = handle.clone();
    listeners.push(listen(canvas, "pointerdown", move |e: Event| {
        if let Some(m) = e.dyn_ref::<MouseEvent>() {
            h.pointer_down(client_pos(m), m.button(), e.time_stamp());
        }
    })?);

    let h = handle.clone();
    listeners.push(listen(window_target, "pointermove", move |e: Event| {
        if let Some(m) = e.dyn_ref::<MouseEvent>() {
            h.pointer_move(client_pos(m), e.time_stamp());
        }
    })?);

    let h = handle.clone();
    listeners.push(listen(window_target, "pointerup", move |e: Event| {
        let Some(m) = e.dyn_ref::<MouseEvent>() else {
            return;
        };
        if let Some(request) = h.pointer_up(client_pos(m), m.button(), e.time_stamp()) {
            let nav = h.clone();
            spawn_navigation("click", async move { nav.navigate(request).await });
        }
    })?);

    let h = handle.clone();
    listeners.push(listen(canvas, "wheel", move |e: Event| {
        if let Some(w) = e.dyn_ref::<WheelEvent>() {
            e.prevent_default();
            h.wheel(w.delta_y());
        }
    })?);

    let h = handle.clone();
    listeners.push(listen(window_target, "resize", move |_e: Event| {
        let (width, height) = h.with_scene(|scene| scene.surface().measure());
        h.resize(width, height);
    })?);

    let h = handle.clone();
    listeners.push(listen(window_target, "keydown", move |e: Event| {
        // Dialogs veto by calling preventDefault first.
        if let Some(k) = e.dyn_ref::<KeyboardEvent>()
            && k.key() == "Escape"
            && !e.default_prevented()
        {
            let nav = h.clone();
            spawn_navigation("escape", async move { nav.navigate_up().await });
        }
    })?);

    Ok(())
}

fn start_frame_loop(
    handle: SceneHandle<WebSurface>,
    events: OverlayQueue,
) -> Result<FrameLoop, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("window missing"))?;
    let closure: RafClosure = Rc::new(RefCell::new(None));
    let request = Rc::new(Cell::new(0));
    let running = Rc::new(Cell::new(true));

    let next = Rc::clone(&closure);
    let next_request = Rc::clone(&request);
    let alive = Rc::clone(&running);
    let win = window.clone();
    let mut last_ms: Option<f64> = None;
    *closure.borrow_mut() = Some(Closure::wrap(Box::new(move |now_ms: f64| {
        if !alive.get() {
            return;
        }
        let dt_s = last_ms
            .map(|t| ((now_ms - t) / 1000.0).clamp(0.0, MAX_FRAME_STEP_S))
            .unwrap_or(0.0);
        last_ms = Some(now_ms);

        let drained: Vec<OverlayEvent> = events.borrow_mut().drain(..).collect();
        for event in drained {
            match event {
                OverlayEvent::Clicked(id) => handle.label_clicked(id),
                OverlayEvent::Hovered(id, entered) => handle.label_hovered(id, entered),
            }
        }
        handle.frame(dt_s, now_ms);

        if !alive.get() {
            return;
        }
        if let Some(cb) = next.borrow().as_ref() {
            match win.request_animation_frame(cb.as_ref().unchecked_ref()) {
                Ok(id) => next_request.set(id),
                Err(err) => tracing::error!(error = ?err, "animation frame not scheduled"),
            }
        }
    }) as Box<dyn FnMut(f64)>));

    if let Some(cb) = closure.borrow().as_ref() {
        request.set(window.request_animation_frame(cb.as_ref().unchecked_ref())?);
    }
    Ok(FrameLoop {
        closure,
        request,
        running,
    })
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        // The closure holds a handle to its own slot.
        self.closure.borrow_mut().take();
    }
}

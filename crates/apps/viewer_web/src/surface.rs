use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use controller::{ContainerRect, Cursor, Level, RenderFrame, SceneSurface, TextureStatus};
use layers::{LabelPlacement, LabelTemplate, OverlaySurface};
use scene::{LabelElementId, NodeId, TextureId, TextureLoader, TextureRegistry};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{HtmlCanvasElement, HtmlElement, HtmlImageElement};

use crate::bake::{PrimitiveCache, bake_frame};
use crate::overlay::{DomOverlay, OverlayQueue};
use crate::wgpu::{WgpuContext, render_batches, resize_wgpu};

/// Keeps an in-flight image and its callbacks alive together.
struct ImageRequest {
    _element: HtmlImageElement,
    _onload: Closure<dyn FnMut()>,
    _onerror: Closure<dyn FnMut()>,
}

/// Browser host: canvas, DOM label layer and image loading.
pub struct WebSurface {
    container: HtmlElement,
    canvas: HtmlCanvasElement,
    overlay: DomOverlay,
    textures: Rc<RefCell<TextureRegistry>>,
    images: HashMap<TextureId, ImageRequest>,
    renderer: WgpuContext,
    primitives: PrimitiveCache,
    size: (f64, f64),
    render_failed: bool,
}

impl WebSurface {
    pub fn new(
        container: HtmlElement,
        canvas: HtmlCanvasElement,
        overlay: DomOverlay,
        renderer: WgpuContext,
    ) -> Self {
        let size = (
            f64::from(container.client_width().max(1)),
            f64::from(container.client_height().max(1)),
        );
        Self {
            container,
            canvas,
            overlay,
            textures: Rc::new(RefCell::new(TextureRegistry::new())),
            images: HashMap::new(),
            renderer,
            primitives: PrimitiveCache::default(),
            size,
            render_failed: false,
        }
    }

    pub fn container(&self) -> &HtmlElement {
        &self.container
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    pub fn overlay_events(&self) -> OverlayQueue {
        self.overlay.events()
    }

    /// Current CSS size of the container.
    pub fn measure(&self) -> (f64, f64) {
        (
            f64::from(self.container.client_width().max(1)),
            f64::from(self.container.client_height().max(1)),
        )
    }

    /// Remove everything this surface added to the page.
    pub fn teardown(&mut self) {
        self.overlay.teardown();
        self.images.clear();
        self.primitives.clear();
        self.canvas.remove();
    }

    fn start_image(&mut self, id: TextureId, url: &str) -> Result<(), JsValue> {
        let element = HtmlImageElement::new()?;
        element.set_cross_origin(Some("anonymous"));

        let registry = Rc::clone(&self.textures);
        let onload = Closure::<dyn FnMut()>::new(move || {
            registry.borrow_mut().mark_loaded(id);
        });
        let registry = Rc::clone(&self.textures);
        let failed_url = url.to_string();
        let onerror = Closure::<dyn FnMut()>::new(move || {
            tracing::warn!(url = %failed_url, "texture failed to load");
            registry.borrow_mut().mark_failed(id);
        });
        element.set_onload(Some(onload.as_ref().unchecked_ref()));
        element.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        element.set_src(url);

        self.images.insert(
            id,
            ImageRequest {
                _element: element,
                _onload: onload,
                _onerror: onerror,
            },
        );
        Ok(())
    }
}

impl OverlaySurface for WebSurface {
    type Element = HtmlElement;

    fn create_label(&mut self, template: &LabelTemplate) -> Option<HtmlElement> {
        self.overlay.create_label(template)
    }

    fn attach_label(&mut self, element: HtmlElement) -> LabelElementId {
        self.overlay.attach_label(element)
    }

    fn detach_label(&mut self, id: LabelElementId) {
        self.overlay.detach_label(id);
    }

    fn place_label(&mut self, id: LabelElementId, placement: Option<LabelPlacement>) {
        self.overlay.place_label(id, placement);
    }
}

impl TextureLoader for WebSurface {
    fn load_texture(&mut self, url: &str) -> Option<TextureId> {
        let id = self.textures.borrow_mut().request(url)?;
        if !self.images.contains_key(&id)
            && let Err(err) = self.start_image(id, url)
        {
            tracing::warn!(%url, error = ?err, "texture request not started");
            self.textures.borrow_mut().mark_failed(id);
        }
        Some(id)
    }
}

impl SceneSurface for WebSurface {
    fn viewport(&self) -> (f64, f64) {
        self.size
    }

    fn container_rect(&self) -> ContainerRect {
        let rect = self.container.get_bounding_client_rect();
        ContainerRect::new(rect.left(), rect.top(), rect.width(), rect.height())
    }

    fn resize(&mut self, width: f64, height: f64) {
        self.size = (width, height);
        let ratio = web_sys::window()
            .map(|w| w.device_pixel_ratio())
            .unwrap_or(1.0)
            .min(2.0);
        let (px_w, px_h) = ((width * ratio).round() as u32, (height * ratio).round() as u32);
        self.canvas.set_width(px_w.max(1));
        self.canvas.set_height(px_h.max(1));
        resize_wgpu(&mut self.renderer, px_w, px_h);
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        let value = match cursor {
            Cursor::Default => "default",
            Cursor::Pointer => "pointer",
        };
        if let Err(err) = self.canvas.style().set_property("cursor", value) {
            tracing::debug!(error = ?err, "cursor not applied");
        }
    }

    fn set_level_marker(&mut self, level: Level) {
        let _ = self.container.set_attribute("data-map-level", &level.to_string());
    }

    fn texture_status(&self) -> TextureStatus {
        let textures = self.textures.borrow();
        TextureStatus {
            settled: textures.settled(),
            total: textures.total(),
        }
    }

    fn render(&mut self, frame: RenderFrame<'_>) {
        let batches = bake_frame(frame, &mut self.primitives);
        let view_proj = frame.camera.view_proj().to_f32_cols();
        match render_batches(&self.renderer, view_proj, &batches) {
            Ok(()) => self.render_failed = false,
            Err(err) => {
                // Log the first failure of a streak only.
                if !self.render_failed {
                    tracing::error!(error = ?err, "frame not rendered");
                }
                self.render_failed = true;
            }
        }
    }

    fn release_nodes(&mut self, nodes: &[NodeId]) {
        self.primitives.release(nodes);
    }
}

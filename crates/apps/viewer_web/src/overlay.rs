use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use layers::{LabelPlacement, LabelTemplate, OverlaySurface};
use scene::LabelElementId;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Event, HtmlElement};

/// Label interaction reported by the DOM, drained once per animation frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OverlayEvent {
    Clicked(LabelElementId),
    Hovered(LabelElementId, bool),
}

pub type OverlayQueue = Rc<RefCell<VecDeque<OverlayEvent>>>;

type Listener = (&'static str, Closure<dyn FnMut(Event)>);

struct AttachedLabel {
    element: HtmlElement,
    listeners: Vec<Listener>,
}

/// Absolutely positioned layer over the canvas hosting label elements.
pub struct DomOverlay {
    document: Document,
    root: HtmlElement,
    labels: HashMap<u64, AttachedLabel>,
    next_id: u64,
    events: OverlayQueue,
}

impl DomOverlay {
    pub fn new(document: Document, container: &HtmlElement) -> Result<Self, JsValue> {
        let root: HtmlElement = document.create_element("div")?.dyn_into()?;
        root.set_class_name("map-label-layer");
        let style = root.style();
        style.set_property("position", "absolute")?;
        style.set_property("inset", "0")?;
        style.set_property("overflow", "hidden")?;
        style.set_property("pointer-events", "none")?;
        container.append_child(&root)?;
        Ok(Self {
            document,
            root,
            labels: HashMap::new(),
            next_id: 0,
            events: Rc::new(RefCell::new(VecDeque::new())),
        })
    }

    pub fn events(&self) -> OverlayQueue {
        Rc::clone(&self.events)
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// Detach every label and remove the layer itself.
    pub fn teardown(&mut self) {
        let ids: Vec<u64> = self.labels.keys().copied().collect();
        for id in ids {
            self.detach_label(LabelElementId(id));
        }
        self.root.remove();
        self.events.borrow_mut().clear();
    }

    fn listen(
        &self,
        element: &HtmlElement,
        kind: &'static str,
        event: OverlayEvent,
        stop: bool,
    ) -> Option<Listener> {
        let queue = Rc::clone(&self.events);
        let closure = Closure::<dyn FnMut(Event)>::new(move |e: Event| {
            if stop {
                e.stop_propagation();
            }
            queue.borrow_mut().push_back(event);
        });
        match element.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref()) {
            Ok(()) => Some((kind, closure)),
            Err(err) => {
                tracing::warn!(kind, error = ?err, "label listener not attached");
                None
            }
        }
    }
}

fn set_style(element: &HtmlElement, name: &str, value: &str) {
    if let Err(err) = element.style().set_property(name, value) {
        tracing::debug!(name, error = ?err, "label style rejected");
    }
}

impl OverlaySurface for DomOverlay {
    type Element = HtmlElement;

    fn create_label(&mut self, template: &LabelTemplate) -> Option<HtmlElement> {
        let element: HtmlElement = match self.document.create_element("div") {
            Ok(el) => el.unchecked_into(),
            Err(err) => {
                tracing::error!(error = ?err, "label element not created");
                return None;
            }
        };
        element.set_class_name(&template.class_name());
        let (key, value) = &template.data;
        let _ = element.set_attribute(&format!("data-{key}"), value);
        let _ = element.set_attribute("data-strength", &template.strength);
        element.set_text_content(Some(&template.text));
        Some(element)
    }

    fn attach_label(&mut self, element: HtmlElement) -> LabelElementId {
        self.next_id += 1;
        let id = LabelElementId(self.next_id);
        set_style(&element, "position", "absolute");
        set_style(&element, "left", "0");
        set_style(&element, "top", "0");
        set_style(&element, "pointer-events", "auto");
        set_style(&element, "display", "none");
        if let Err(err) = self.root.append_child(&element) {
            tracing::warn!(error = ?err, "label not appended to overlay");
        }
        let listeners = [
            self.listen(&element, "click", OverlayEvent::Clicked(id), true),
            self.listen(&element, "mouseenter", OverlayEvent::Hovered(id, true), false),
            self.listen(&element, "mouseleave", OverlayEvent::Hovered(id, false), false),
        ]
        .into_iter()
        .flatten()
        .collect();
        self.labels.insert(id.0, AttachedLabel { element, listeners });
        id
    }

    fn detach_label(&mut self, id: LabelElementId) {
        let Some(label) = self.labels.remove(&id.0) else {
            return;
        };
        for (kind, closure) in &label.listeners {
            let _ = label
                .element
                .remove_event_listener_with_callback(kind, closure.as_ref().unchecked_ref());
        }
        label.element.remove();
    }

    fn place_label(&mut self, id: LabelElementId, placement: Option<LabelPlacement>) {
        let Some(label) = self.labels.get(&id.0) else {
            return;
        };
        let element = &label.element;
        match placement {
            Some(p) => {
                set_style(element, "display", "");
                set_style(
                    element,
                    "transform",
                    &format!(
                        "translate({:.2}px, {:.2}px) translate(-50%, -100%) scale({:.4})",
                        p.x, p.y, p.scale
                    ),
                );
                set_style(element, "z-index", &p.z_order.to_string());
            }
            None => set_style(element, "display", "none"),
        }
    }
}

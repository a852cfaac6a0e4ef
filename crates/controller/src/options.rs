use std::fmt;
use std::rc::Rc;

use formats::{CityDisplayDatum, DistrictDatum};
use layers::{DistrictLabelInput, LabelRender};

use crate::events::SceneEvent;
use crate::level::Level;

pub type CityLabelRenderer<E> = Box<dyn Fn(&CityDisplayDatum, f64) -> LabelRender<E>>;
pub type DistrictLabelRenderer<E> = Box<dyn Fn(&str, DistrictLabelInput) -> LabelRender<E>>;

/// Caller-supplied label renderers; `None` uses the built-in template.
pub struct LabelRenderers<E> {
    pub city: Option<CityLabelRenderer<E>>,
    pub district: Option<DistrictLabelRenderer<E>>,
}

impl<E> Default for LabelRenderers<E> {
    fn default() -> Self {
        Self {
            city: None,
            district: None,
        }
    }
}

impl<E> fmt::Debug for LabelRenderers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelRenderers")
            .field("city", &self.city.is_some())
            .field("district", &self.district.is_some())
            .finish()
    }
}

/// A caller-positioned label anchored at a lon/lat.
///
/// `region_name` is a comma-separated list of the cities or districts the
/// label belongs to; untagged labels are never shown.
pub struct CustomLabel<E> {
    pub id: String,
    pub position: [f64; 2],
    pub region_name: Option<String>,
    pub height: Option<f64>,
    pub scale: Option<f64>,
    /// Must produce an element; `None` is a contract violation.
    pub renderer: Rc<dyn Fn() -> Option<E>>,
    pub on_click: Option<Rc<dyn Fn(&str)>>,
    pub on_hover: Option<Rc<dyn Fn(&str, bool)>>,
}

impl<E> CustomLabel<E> {
    pub fn new(
        id: impl Into<String>,
        position: [f64; 2],
        renderer: impl Fn() -> Option<E> + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            position,
            region_name: None,
            height: None,
            scale: None,
            renderer: Rc::new(renderer),
            on_click: None,
            on_hover: None,
        }
    }

    pub fn with_region(mut self, region_name: impl Into<String>) -> Self {
        self.region_name = Some(region_name.into());
        self
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn on_click(mut self, handler: impl Fn(&str) + 'static) -> Self {
        self.on_click = Some(Rc::new(handler));
        self
    }

    pub fn on_hover(mut self, handler: impl Fn(&str, bool) + 'static) -> Self {
        self.on_hover = Some(Rc::new(handler));
        self
    }
}

impl<E> Clone for CustomLabel<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            position: self.position,
            region_name: self.region_name.clone(),
            height: self.height,
            scale: self.scale,
            renderer: Rc::clone(&self.renderer),
            on_click: self.on_click.clone(),
            on_hover: self.on_hover.clone(),
        }
    }
}

impl<E> fmt::Debug for CustomLabel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomLabel")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("region_name", &self.region_name)
            .field("height", &self.height)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

/// Payload of a district label click.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictLabelClick<'a> {
    pub city: &'a str,
    pub district: &'a str,
    pub datum: Option<&'a DistrictDatum>,
}

/// Listener hooks; every field is optional.
#[derive(Default)]
pub struct SceneCallbacks {
    pub on_progress: Option<Box<dyn FnMut(u8)>>,
    pub on_complete: Option<Box<dyn FnMut()>>,
    pub on_level_change: Option<Box<dyn FnMut(Level, Option<&str>, Option<&str>)>>,
    pub on_city_label_click: Option<Box<dyn FnMut(&CityDisplayDatum)>>,
    pub on_district_label_click: Option<Box<dyn FnMut(DistrictLabelClick<'_>)>>,
}

impl fmt::Debug for SceneCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneCallbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_level_change", &self.on_level_change.is_some())
            .field("on_city_label_click", &self.on_city_label_click.is_some())
            .field("on_district_label_click", &self.on_district_label_click.is_some())
            .finish()
    }
}

impl SceneCallbacks {
    /// Route one event to its listener. Custom label events are routed by
    /// the label's own handlers instead.
    pub fn dispatch(&mut self, event: &SceneEvent) {
        match event {
            SceneEvent::Progress(value) => {
                if let Some(cb) = self.on_progress.as_mut() {
                    cb(*value);
                }
            }
            SceneEvent::Complete => {
                if let Some(cb) = self.on_complete.as_mut() {
                    cb();
                }
            }
            SceneEvent::LevelChanged {
                level,
                city,
                district,
            } => {
                if let Some(cb) = self.on_level_change.as_mut() {
                    cb(*level, city.as_deref(), district.as_deref());
                }
            }
            SceneEvent::CityLabelClicked(city) => {
                if let Some(cb) = self.on_city_label_click.as_mut() {
                    cb(city);
                }
            }
            SceneEvent::DistrictLabelClicked {
                city,
                district,
                datum,
            } => {
                if let Some(cb) = self.on_district_label_click.as_mut() {
                    cb(DistrictLabelClick {
                        city: city.as_str(),
                        district: district.as_str(),
                        datum: datum.as_ref(),
                    });
                }
            }
            SceneEvent::CustomLabelClicked { .. } | SceneEvent::CustomLabelHovered { .. } => {}
        }
    }
}

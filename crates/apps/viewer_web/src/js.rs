//! Conversions between JavaScript option objects and the controller's
//! typed callbacks, renderers and labels.

use controller::{
    CustomLabel, DistrictLabelClick, LabelRenderers, Level, SceneCallbacks, SceneConfig,
};
use formats::CityDisplayDatum;
use js_sys::{Function, JSON, Reflect};
use layers::{DistrictLabelInput, LabelRender};
use serde::Serialize;
use serde::de::DeserializeOwned;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::HtmlElement;

/// A property that is present and neither `null` nor `undefined`.
pub fn field(obj: &JsValue, key: &str) -> Option<JsValue> {
    if !obj.is_object() {
        return None;
    }
    Reflect::get(obj, &JsValue::from_str(key))
        .ok()
        .filter(|v| !v.is_null() && !v.is_undefined())
}

pub fn function(obj: &JsValue, key: &str) -> Option<Function> {
    field(obj, key).and_then(|v| v.dyn_into::<Function>().ok())
}

fn number(obj: &JsValue, key: &str) -> Option<f64> {
    field(obj, key).and_then(|v| v.as_f64())
}

fn string(obj: &JsValue, key: &str) -> Option<String> {
    field(obj, key).and_then(|v| v.as_string())
}

pub fn to_js<T: Serialize>(value: &T) -> JsValue {
    serde_json::to_string(value)
        .ok()
        .and_then(|json| JSON::parse(&json).ok())
        .unwrap_or(JsValue::NULL)
}

pub fn from_js<T: DeserializeOwned>(value: &JsValue) -> Result<T, JsValue> {
    let json: String = JSON::stringify(value)?.into();
    serde_json::from_str(&json).map_err(|e| JsValue::from_str(&e.to_string()))
}

pub fn error_value(err: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

fn report(name: &str, result: Result<JsValue, JsValue>) -> Option<JsValue> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(callback = name, error = ?err, "callback threw");
            None
        }
    }
}

/// `null`, `undefined` and `false` suppress the label; anything else that is
/// not an element breaks the renderer contract.
fn classify(name: &str, result: Result<JsValue, JsValue>) -> LabelRender<HtmlElement> {
    let value = match result {
        Ok(value) => value,
        Err(err) => return LabelRender::Invalid(format!("{name} threw {err:?}")),
    };
    if value.is_null() || value.is_undefined() || value.as_bool() == Some(false) {
        return LabelRender::Suppress;
    }
    match value.dyn_into::<HtmlElement>() {
        Ok(element) => LabelRender::Render(element),
        Err(other) => LabelRender::Invalid(format!("{name} returned {other:?}")),
    }
}

/// Scene settings from `options.config`, defaults when absent.
pub fn config_from(options: &JsValue) -> Result<SceneConfig, JsValue> {
    let mut config = match field(options, "config") {
        Some(raw) => {
            let json: String = JSON::stringify(&raw)?.into();
            SceneConfig::from_json_str(&json).map_err(error_value)?
        }
        None => SceneConfig::default(),
    };
    if let Some(base) = string(options, "assetBasePath") {
        config.asset_base_path = Some(base);
    }
    Ok(config)
}

pub fn callbacks_from(options: &JsValue) -> SceneCallbacks {
    let mut callbacks = SceneCallbacks::default();
    if let Some(f) = function(options, "onProgress") {
        callbacks.on_progress = Some(Box::new(move |value: u8| {
            report("onProgress", f.call1(&JsValue::NULL, &JsValue::from(value)));
        }));
    }
    if let Some(f) = function(options, "onComplete") {
        callbacks.on_complete = Some(Box::new(move || {
            report("onComplete", f.call0(&JsValue::NULL));
        }));
    }
    if let Some(f) = function(options, "onLevelChange") {
        callbacks.on_level_change = Some(Box::new(
            move |level: Level, city: Option<&str>, district: Option<&str>| {
                let opt = |s: Option<&str>| s.map(JsValue::from_str).unwrap_or(JsValue::NULL);
                report(
                    "onLevelChange",
                    f.call3(
                        &JsValue::NULL,
                        &JsValue::from_str(level.as_str()),
                        &opt(city),
                        &opt(district),
                    ),
                );
            },
        ));
    }
    if let Some(f) = function(options, "onCityLabelClick") {
        callbacks.on_city_label_click = Some(Box::new(move |city: &CityDisplayDatum| {
            report("onCityLabelClick", f.call1(&JsValue::NULL, &to_js(city)));
        }));
    }
    if let Some(f) = function(options, "onDistrictLabelClick") {
        callbacks.on_district_label_click = Some(Box::new(move |click: DistrictLabelClick<'_>| {
            let payload = serde_json::json!({
                "cityName": click.city,
                "districtName": click.district,
                "data": click.datum,
            });
            report("onDistrictLabelClick", f.call1(&JsValue::NULL, &to_js(&payload)));
        }));
    }
    callbacks
}

pub fn renderers_from(options: &JsValue) -> LabelRenderers<HtmlElement> {
    let mut renderers = LabelRenderers::default();
    if let Some(f) = function(options, "cityLabelRenderer") {
        renderers.city = Some(Box::new(move |city: &CityDisplayDatum, normalized: f64| {
            classify(
                "cityLabelRenderer",
                f.call2(&JsValue::NULL, &to_js(city), &JsValue::from_f64(normalized)),
            )
        }));
    }
    if let Some(f) = function(options, "districtLabelRenderer") {
        renderers.district = Some(Box::new(move |name: &str, input: DistrictLabelInput| {
            let payload = serde_json::json!({
                "value": input.value,
                "strength": input.strength,
            });
            classify(
                "districtLabelRenderer",
                f.call2(&JsValue::NULL, &JsValue::from_str(name), &to_js(&payload)),
            )
        }));
    }
    renderers
}

/// Custom labels from an array of
/// `{ id, position: [lon, lat], regionName?, height?, scale?, renderer, onClick?, onHover? }`.
pub fn custom_labels_from(value: &JsValue) -> Result<Vec<CustomLabel<HtmlElement>>, JsValue> {
    if value.is_null() || value.is_undefined() {
        return Ok(Vec::new());
    }
    let items: js_sys::Array = value
        .clone()
        .dyn_into()
        .map_err(|_| error_value("custom labels must be an array"))?;
    let mut labels = Vec::with_capacity(items.length() as usize);
    for item in items.iter() {
        let id = string(&item, "id").ok_or_else(|| error_value("custom label without an id"))?;
        let position: [f64; 2] = field(&item, "position")
            .ok_or_else(|| error_value(format!("custom label {id} has no position")))
            .and_then(|p| from_js(&p))?;
        let render = function(&item, "renderer")
            .ok_or_else(|| error_value(format!("custom label {id} has no renderer")))?;
        let label_id = id.clone();
        let mut label = CustomLabel::new(id, position, move || {
            report(&label_id, render.call0(&JsValue::NULL))
                .and_then(|v| v.dyn_into::<HtmlElement>().ok())
        });
        label.region_name = string(&item, "regionName");
        label.height = number(&item, "height");
        label.scale = number(&item, "scale");
        if let Some(f) = function(&item, "onClick") {
            label = label.on_click(move |id| {
                report("onClick", f.call1(&JsValue::NULL, &JsValue::from_str(id)));
            });
        }
        if let Some(f) = function(&item, "onHover") {
            label = label.on_hover(move |id, hovering| {
                report(
                    "onHover",
                    f.call2(&JsValue::NULL, &JsValue::from_str(id), &JsValue::from_bool(hovering)),
                );
            });
        }
        labels.push(label);
    }
    Ok(labels)
}

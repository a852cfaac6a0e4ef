use std::f64::consts::PI;
use std::fmt;

use foundation::math::{MercatorProjection, Vec3};
use scene::ControlLimits;
use serde::{Deserialize, Serialize};

/// Placement of the map layer in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapLayerConfig {
    /// Projection center, `[lon, lat]` in degrees.
    pub center: [f64; 2],
    pub scale: f64,
    pub extrusion_depth: f64,
    pub float_height: f64,
    pub offset_z: f64,
    pub default_camera_position: [f64; 3],
    pub default_camera_target: [f64; 3],
    pub city_marker_scale: f64,
    pub background_brightness: f32,
}

impl Default for MapLayerConfig {
    fn default() -> Self {
        Self {
            center: [120.153576, 29.287459],
            scale: 850.0,
            extrusion_depth: 5.0,
            float_height: -13.6,
            offset_z: 100.0,
            default_camera_position: [0.0, 100.0, 170.0],
            default_camera_target: [0.0, -35.0, 110.0],
            city_marker_scale: 0.17,
            background_brightness: 1.32,
        }
    }
}

impl MapLayerConfig {
    pub fn projection(&self) -> MercatorProjection {
        MercatorProjection::new(self.center, self.scale)
    }
}

/// Camera pose and limits for one drill-down level.
///
/// The target is `target_offset` shifted by the layer's `offset_z`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewFraming {
    pub position: [f64; 3],
    pub target_offset: [f64; 3],
    pub limits: ControlLimits,
}

impl ViewFraming {
    pub fn target(&self, offset_z: f64) -> Vec3 {
        let [x, y, z] = self.target_offset;
        Vec3::new(x, y, offset_z + z)
    }
}

fn city_view() -> ViewFraming {
    ViewFraming {
        position: [0.0, 98.0, 116.0],
        target_offset: [0.0, -28.0, 4.0],
        limits: ControlLimits::new(32.0, 150.0, PI / 5.0, PI / 1.8),
    }
}

/// District framing: the pose is divided by the clamped geometry scale so
/// small and large districts read at a similar size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DistrictFraming {
    pub view: ViewFraming,
    pub scale_clamp: [f64; 2],
    pub y_clamp: [f64; 2],
    pub z_clamp: [f64; 2],
}

impl Default for DistrictFraming {
    fn default() -> Self {
        Self {
            view: ViewFraming {
                position: [0.0, 158.0, 320.0],
                target_offset: [0.0, -26.0, 6.0],
                limits: ControlLimits::new(42.0, 320.0, PI / 6.0, PI / 1.82),
            },
            scale_clamp: [0.65, 2.8],
            y_clamp: [96.0, 176.0],
            z_clamp: [152.0, 320.0],
        }
    }
}

impl DistrictFraming {
    pub fn position(&self, normalized_scale: Option<f64>) -> Vec3 {
        let [x, y, z] = self.view.position;
        let Some(scale) = normalized_scale else {
            return Vec3::new(x, y, z);
        };
        let k = 1.0 / scale.clamp(self.scale_clamp[0], self.scale_clamp[1]);
        Vec3::new(
            x * k,
            (y * k).clamp(self.y_clamp[0], self.y_clamp[1]),
            (z * k).clamp(self.z_clamp[0], self.z_clamp[1]),
        )
    }
}

/// Pointer thresholds, hover lifts and animation timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InteractionConfig {
    pub click_distance_px: f64,
    pub click_time_ms: f64,
    pub hover_throttle_ms: f64,
    pub rect_cache_ms: f64,
    pub mesh_hover_lift: f64,
    pub mesh_hover_duration_s: f64,
    pub city_label_hover_offset: f64,
    pub district_label_hover_offset: f64,
    pub custom_label_hover_offset: f64,
    pub label_hover_duration_s: f64,
    pub camera_transition_s: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            click_distance_px: 5.0,
            click_time_ms: 300.0,
            hover_throttle_ms: 100.0,
            rect_cache_ms: 100.0,
            mesh_hover_lift: 8.0,
            mesh_hover_duration_s: 0.5,
            city_label_hover_offset: 50.0,
            district_label_hover_offset: 8.0,
            custom_label_hover_offset: 8.0,
            label_hover_duration_s: 0.45,
            camera_transition_s: 1.2,
        }
    }
}

/// Asset paths, resolved against the asset base at mount. Empty disables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextureConfig {
    pub base_color: String,
    pub normal: String,
    pub detail: String,
    pub emissive: String,
    pub roughness: String,
    pub background: String,
    pub water_ripple: String,
    pub blur: String,
    pub rotation_border1: String,
    pub rotation_border2: String,
    pub halo_primary: String,
    pub halo_secondary: String,
    pub top_glow: String,
    pub ambient_mask: String,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            base_color: "textures/zhejiang/baseColor.png".into(),
            normal: "textures/zhejiang/normal.jpg".into(),
            detail: String::new(),
            emissive: String::new(),
            roughness: String::new(),
            background: "images/bg.jpg".into(),
            water_ripple: "images/ocean-bg.png".into(),
            blur: String::new(),
            rotation_border1: String::new(),
            rotation_border2: "images/ring1.png".into(),
            halo_primary: "images/ring2.png".into(),
            halo_secondary: "images/ring2.png".into(),
            top_glow: String::new(),
            ambient_mask: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SceneConfig {
    pub layer: MapLayerConfig,
    pub limits: ControlLimits,
    pub city_view: ViewFraming,
    pub district_view: DistrictFraming,
    pub interaction: InteractionConfig,
    pub textures: TextureConfig,
    /// Overrides the CDN base for every asset path.
    pub asset_base_path: Option<String>,
    /// Seed for the marker bobbing phases.
    pub marker_seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            layer: MapLayerConfig::default(),
            limits: ControlLimits::default(),
            city_view: city_view(),
            district_view: DistrictFraming::default(),
            interaction: InteractionConfig::default(),
            textures: TextureConfig::default(),
            asset_base_path: None,
            marker_seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Json(String),
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Json(msg) => write!(f, "scene config is not valid JSON: {msg}"),
            ConfigError::Invalid { field, reason } => write!(f, "invalid {field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl SceneConfig {
    pub fn from_json_str(payload: &str) -> Result<Self, ConfigError> {
        let config: SceneConfig =
            serde_json::from_str(payload).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let layer = &self.layer;
        if !layer.scale.is_finite() || layer.scale <= 0.0 {
            return Err(invalid("layer.scale", format!("{} is not a positive number", layer.scale)));
        }
        if !layer.extrusion_depth.is_finite() || layer.extrusion_depth <= 0.0 {
            return Err(invalid(
                "layer.extrusionDepth",
                format!("{} is not a positive number", layer.extrusion_depth),
            ));
        }
        if !layer.center.iter().all(|v| v.is_finite()) {
            return Err(invalid("layer.center", "must be finite"));
        }

        for (field, limits) in [
            ("limits", &self.limits),
            ("cityView.limits", &self.city_view.limits),
            ("districtView.view.limits", &self.district_view.view.limits),
        ] {
            if !limits.is_valid() {
                return Err(invalid(field, "distance or polar range is inverted or non-finite"));
            }
        }

        let d = &self.district_view;
        for (field, [lo, hi]) in [
            ("districtView.scaleClamp", d.scale_clamp),
            ("districtView.yClamp", d.y_clamp),
            ("districtView.zClamp", d.z_clamp),
        ] {
            if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
                return Err(invalid(field, format!("[{lo}, {hi}] is not a range")));
            }
        }
        if d.scale_clamp[0] <= 0.0 {
            return Err(invalid("districtView.scaleClamp", "lower bound must be positive"));
        }

        let i = &self.interaction;
        for (field, v) in [
            ("interaction.clickDistancePx", i.click_distance_px),
            ("interaction.clickTimeMs", i.click_time_ms),
            ("interaction.hoverThrottleMs", i.hover_throttle_ms),
            ("interaction.rectCacheMs", i.rect_cache_ms),
            ("interaction.meshHoverDurationS", i.mesh_hover_duration_s),
            ("interaction.labelHoverDurationS", i.label_hover_duration_s),
            ("interaction.cameraTransitionS", i.camera_transition_s),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(invalid(field, format!("{v} must be a non-negative duration")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SceneConfig};
    use foundation::math::Vec3;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_yields_defaults() {
        let config = SceneConfig::from_json_str("{}").expect("defaults");
        assert_eq!(config, SceneConfig::default());
        assert_eq!(config.layer.scale, 850.0);
        assert_eq!(config.interaction.click_distance_px, 5.0);
        assert_eq!(config.textures.blur, "");
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = SceneConfig::from_json_str(
            r#"{ "layer": { "extrusionDepth": 7 }, "textures": { "topGlow": "images/glow.png" } }"#,
        )
        .expect("config");
        assert_eq!(config.layer.extrusion_depth, 7.0);
        assert_eq!(config.layer.offset_z, 100.0);
        assert_eq!(config.textures.top_glow, "images/glow.png");
        assert_eq!(config.textures.background, "images/bg.jpg");
    }

    #[test]
    fn rejects_bad_values() {
        let err = SceneConfig::from_json_str(r#"{ "layer": { "scale": 0 } }"#).expect_err("scale");
        assert!(matches!(err, ConfigError::Invalid { field: "layer.scale", .. }));

        let err = SceneConfig::from_json_str(r#"{ "limits": { "minDistance": 300 } }"#)
            .expect_err("limits");
        assert!(matches!(err, ConfigError::Invalid { field: "limits", .. }));

        let err = SceneConfig::from_json_str(r#"{ "interaction": { "cameraTransitionS": -1 } }"#)
            .expect_err("duration");
        assert!(matches!(
            err,
            ConfigError::Invalid { field: "interaction.cameraTransitionS", .. }
        ));

        assert!(matches!(
            SceneConfig::from_json_str("[1, 2"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn district_pose_scales_inversely_and_clamps() {
        let d = SceneConfig::default().district_view;
        assert_eq!(d.position(None), Vec3::new(0.0, 158.0, 320.0));
        // Scale 2 halves the pose; y hits its floor.
        assert_eq!(d.position(Some(2.0)), Vec3::new(0.0, 96.0, 160.0));
        // Tiny scales clamp to 0.65 and then to the ceilings.
        assert_eq!(d.position(Some(0.1)), Vec3::new(0.0, 176.0, 320.0));
    }
}

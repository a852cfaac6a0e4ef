use foundation::color::Rgb;
use foundation::math::smoothstep;

/// Opaque texture handle issued by a `TextureLoader`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Wrap {
    Clamp,
    Repeat,
}

/// A texture bound to a material slot with its UV transform.
///
/// Sampled UV = `rotate(uv, rotation) * repeat + offset`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TextureSlot {
    pub texture: TextureId,
    pub offset: [f64; 2],
    pub repeat: [f64; 2],
    pub rotation: f64,
    pub wrap: Wrap,
}

impl TextureSlot {
    pub fn new(texture: TextureId) -> Self {
        Self {
            texture,
            offset: [0.0, 0.0],
            repeat: [1.0, 1.0],
            rotation: 0.0,
            wrap: Wrap::Clamp,
        }
    }

    pub fn tiled(texture: TextureId, repeat: f64) -> Self {
        Self {
            repeat: [repeat, repeat],
            wrap: Wrap::Repeat,
            ..Self::new(texture)
        }
    }

    pub fn with_transform(mut self, offset: [f64; 2], repeat: [f64; 2]) -> Self {
        self.offset = offset;
        self.repeat = repeat;
        self
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn apply(&self, uv: [f64; 2]) -> [f64; 2] {
        let (s, c) = self.rotation.sin_cos();
        let u = uv[0] * c - uv[1] * s;
        let v = uv[0] * s + uv[1] * c;
        [
            u * self.repeat[0] + self.offset[0],
            v * self.repeat[1] + self.offset[1],
        ]
    }
}

/// Height-ramped tint for extrusion walls.
///
/// With `ratio = clamp(z / height)`: bottom→middle over `[0, 0.45]`,
/// middle→top over `[0.55, 1]`, mixed into the base color at `strength`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EdgeGradient {
    pub bottom: Rgb,
    pub middle: Rgb,
    pub top: Rgb,
    pub height: f64,
    pub strength: f32,
}

impl EdgeGradient {
    pub fn new(bottom: Rgb, middle: Rgb, top: Rgb, height: f64) -> Self {
        Self {
            bottom,
            middle,
            top,
            height,
            strength: 0.85,
        }
    }

    pub fn tint(&self, base: Rgb, z: f64) -> Rgb {
        let ratio = (z / self.height.max(1e-4)).clamp(0.0, 1.0);
        let lower = smoothstep(0.0, 0.45, ratio) as f32;
        let upper = smoothstep(0.55, 1.0, ratio) as f32;
        let gradient = self.bottom.lerp(self.middle, lower).lerp(self.top, upper);
        base.lerp(gradient, self.strength)
    }
}

/// Physically based surface with optional maps.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMaterial {
    pub color: Rgb,
    pub emissive: Rgb,
    pub emissive_intensity: f32,
    pub roughness: f32,
    pub metalness: f32,
    pub opacity: f32,
    pub transparent: bool,
    pub map: Option<TextureSlot>,
    pub normal_map: Option<TextureSlot>,
    pub normal_scale: f32,
    pub metalness_map: Option<TextureSlot>,
    pub emissive_map: Option<TextureSlot>,
    pub roughness_map: Option<TextureSlot>,
    pub edge_gradient: Option<EdgeGradient>,
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self {
            color: Rgb::WHITE,
            emissive: Rgb::BLACK,
            emissive_intensity: 1.0,
            roughness: 1.0,
            metalness: 0.0,
            opacity: 1.0,
            transparent: false,
            map: None,
            normal_map: None,
            normal_scale: 1.0,
            metalness_map: None,
            emissive_map: None,
            roughness_map: None,
            edge_gradient: None,
        }
    }
}

impl SurfaceMaterial {
    pub fn textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        [
            self.map,
            self.normal_map,
            self.metalness_map,
            self.emissive_map,
            self.roughness_map,
        ]
        .into_iter()
        .flatten()
        .map(|slot| slot.texture)
    }
}

/// Top (caps) and side (walls) materials of one extruded region.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MeshMaterials {
    pub top: SurfaceMaterial,
    pub side: SurfaceMaterial,
}

impl MeshMaterials {
    /// Material for a geometry group's `material_index`.
    pub fn slot(&self, material_index: u32) -> &SurfaceMaterial {
        if material_index == 0 {
            &self.top
        } else {
            &self.side
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Blending {
    Normal,
    Additive,
}

/// Unlit material for decorative primitives.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicMaterial {
    pub color: Rgb,
    pub opacity: f32,
    pub map: Option<TextureSlot>,
    pub blending: Blending,
    pub depth_write: bool,
    pub double_sided: bool,
    /// Multiplier on the sampled color (1.0 = unchanged).
    pub brightness: f32,
}

impl BasicMaterial {
    pub fn new(color: Rgb, opacity: f32) -> Self {
        Self {
            color,
            opacity,
            map: None,
            blending: Blending::Normal,
            depth_write: false,
            double_sided: true,
            brightness: 1.0,
        }
    }

    pub fn with_map(mut self, map: TextureSlot) -> Self {
        self.map = Some(map);
        self
    }

    pub fn additive(mut self) -> Self {
        self.blending = Blending::Additive;
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LineMaterial {
    pub color: Rgb,
    pub opacity: f32,
    pub width: f32,
    pub depth_write: bool,
}

impl LineMaterial {
    pub fn new(color: Rgb, opacity: f32, width: f32) -> Self {
        Self {
            color,
            opacity,
            width,
            depth_write: false,
        }
    }
}

/// Radial sweep driven by a time uniform.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RippleUniforms {
    pub time: f64,
    pub speed: f64,
    pub width: f64,
    pub opacity: f64,
    pub max_radius: f64,
    pub color: Rgb,
}

impl RippleUniforms {
    /// Sweep intensity at `radius` from the center, in `[0, 1]`.
    pub fn intensity_at(&self, radius: f64) -> f64 {
        if self.max_radius <= 0.0 || self.width <= 0.0 {
            return 0.0;
        }
        let front = (self.time * self.speed).rem_euclid(self.max_radius);
        let d = (radius - front).abs();
        if d > self.width {
            return 0.0;
        }
        let falloff = 1.0 - radius / self.max_radius;
        (1.0 - d / self.width) * falloff.clamp(0.0, 1.0) * self.opacity
    }
}

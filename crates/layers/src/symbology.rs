use foundation::bounds::MapBounds;
use foundation::color::Rgb;
use scene::{EdgeGradient, MeshMaterials, SurfaceMaterial, TextureId, TextureSlot};

use crate::transformer::PlacementMode;

pub const EDGE_GRADIENT_BOTTOM: Rgb = Rgb::from_hex(0x001428);
pub const EDGE_GRADIENT_MIDDLE: Rgb = Rgb::from_hex(0x045F92);
pub const EDGE_GRADIENT_TOP: Rgb = Rgb::from_hex(0x11D6FF);

/// Outline passes drawn over region top edges.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OutlineStyle {
    pub color: Rgb,
    pub opacity: f32,
    pub lift: f64,
    pub render_order: i32,
    pub width: f32,
}

pub const OUTLINE_GLOW: OutlineStyle = OutlineStyle {
    color: Rgb::from_hex(0xD6EFFF),
    opacity: 0.95,
    lift: 0.02,
    render_order: 10,
    width: 2.0,
};

pub const OUTLINE_INNER: OutlineStyle = OutlineStyle {
    color: Rgb::from_hex(0x0DA6FF),
    opacity: 0.8,
    lift: 0.05,
    render_order: 9,
    width: 1.0,
};

/// Textures resolved for one region build; absent maps stay `None`.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct RegionTextures {
    pub color: Option<TextureId>,
    pub normal: Option<TextureId>,
    pub detail: Option<TextureId>,
    pub emissive: Option<TextureId>,
    pub roughness: Option<TextureId>,
}

/// Top and side materials for a placement mode.
///
/// Color and normal maps are stretched so `texture_bounds` covers the unit square.
pub fn region_materials(
    mode: PlacementMode,
    textures: RegionTextures,
    texture_bounds: &MapBounds,
    depth: f64,
) -> MeshMaterials {
    let absolute = mode.is_absolute();
    let pick = |a: f32, c: f32| if absolute { a } else { c };

    let side = SurfaceMaterial {
        color: Rgb::from_hex(if absolute { 0x1A1F24 } else { 0x081320 }),
        emissive: Rgb::from_hex(if absolute { 0x052941 } else { 0x112C52 }),
        emissive_intensity: pick(0.18, 0.32),
        roughness: pick(0.68, 0.42),
        metalness: pick(0.16, 0.34),
        opacity: pick(0.95, 0.9),
        transparent: true,
        edge_gradient: Some(EdgeGradient::new(
            EDGE_GRADIENT_BOTTOM,
            EDGE_GRADIENT_MIDDLE,
            EDGE_GRADIENT_TOP,
            depth,
        )),
        ..SurfaceMaterial::default()
    };

    let span_x = texture_bounds.width.max(1e-6);
    let span_y = texture_bounds.height.max(1e-6);
    let safe_x = texture_bounds.width.max(1.0);
    let safe_y = texture_bounds.height.max(1.0);

    let top = SurfaceMaterial {
        color: Rgb::WHITE,
        emissive: Rgb::from_hex(if absolute { 0x000000 } else { 0x06182E }),
        emissive_intensity: pick(0.08, 0.22),
        roughness: pick(0.42, 0.3),
        metalness: pick(0.5, 0.38),
        opacity: pick(0.92, 0.96),
        transparent: true,
        map: textures.color.map(|t| {
            TextureSlot::new(t).with_transform(
                [-texture_bounds.min_x / span_x, -texture_bounds.min_y / span_y],
                [1.0 / span_x, 1.0 / span_y],
            )
        }),
        normal_map: textures.normal.map(|t| {
            TextureSlot::new(t).with_transform(
                [-texture_bounds.min_x / safe_x, -texture_bounds.min_y / safe_y],
                [1.0 / safe_x, 1.0 / safe_y],
            )
        }),
        normal_scale: 0.9,
        metalness_map: textures.detail.map(|t| TextureSlot::tiled(t, 0.02)),
        emissive_map: textures
            .emissive
            .map(|t| TextureSlot::tiled(t, 0.01).with_rotation(33f64.to_radians())),
        roughness_map: textures.roughness.map(|t| TextureSlot::tiled(t, 0.02)),
        ..SurfaceMaterial::default()
    };

    MeshMaterials { top, side }
}

#[cfg(test)]
mod tests {
    use super::{RegionTextures, region_materials};
    use crate::transformer::PlacementMode;
    use foundation::bounds::MapBounds;
    use scene::{TextureId, Wrap};

    fn bounds() -> MapBounds {
        MapBounds {
            min_x: -64.0,
            max_x: 192.0,
            min_y: 32.0,
            max_y: 160.0,
            width: 256.0,
            height: 128.0,
        }
    }

    #[test]
    fn absolute_and_centered_palettes_differ() {
        let a = region_materials(PlacementMode::Absolute, RegionTextures::default(), &bounds(), 5.0);
        let c = region_materials(
            PlacementMode::Centered {
                width: 1.0,
                height: 1.0,
            },
            RegionTextures::default(),
            &bounds(),
            5.0,
        );
        assert_eq!(a.side.color.to_hex(), 0x1A1F24);
        assert_eq!(c.side.color.to_hex(), 0x081320);
        assert_eq!(a.top.opacity, 0.92);
        assert_eq!(c.top.opacity, 0.96);
        assert!(a.side.edge_gradient.is_some());
        assert!(a.top.map.is_none());
    }

    #[test]
    fn color_map_covers_texture_bounds() {
        let textures = RegionTextures {
            color: Some(TextureId(1)),
            detail: Some(TextureId(2)),
            ..RegionTextures::default()
        };
        let m = region_materials(PlacementMode::Absolute, textures, &bounds(), 5.0);
        let map = m.top.map.expect("map");
        assert_eq!(map.apply([-64.0, 32.0]), [0.0, 0.0]);
        assert_eq!(map.apply([192.0, 160.0]), [1.0, 1.0]);
        let detail = m.top.metalness_map.expect("detail");
        assert_eq!(detail.wrap, Wrap::Repeat);
    }
}

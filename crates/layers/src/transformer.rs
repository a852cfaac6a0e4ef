use foundation::bounds::MapBounds;
use foundation::math::MercatorProjection;
use formats::FeatureCollection;

/// Placement mode of a level's geometry.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PlacementMode {
    /// Raw projected coordinates; the province frame.
    Absolute,
    /// Recentered on the collection's own bounds and uniformly rescaled to
    /// fit `width` x `height`.
    Centered { width: f64, height: f64 },
}

impl PlacementMode {
    pub fn is_absolute(&self) -> bool {
        matches!(self, PlacementMode::Absolute)
    }
}

/// Project a lon/lat pair to scene XY (Y flipped); unprojectable input maps to the origin.
pub fn project_mapped(projection: &MercatorProjection, lon_lat: [f64; 2]) -> [f64; 2] {
    match projection.project(lon_lat) {
        Some(p) => [p.x, -p.y],
        None => [0.0, 0.0],
    }
}

/// Scene-space bounds of every ring vertex in `collection`.
pub fn compute_bounds(collection: &FeatureCollection, projection: &MercatorProjection) -> MapBounds {
    MapBounds::from_points(
        collection
            .features
            .iter()
            .flat_map(|f| f.rings())
            .flat_map(|ring| ring.iter())
            .map(|p| project_mapped(projection, p.to_array())),
    )
}

/// Per-level placement: projection plus recentering and rescaling.
///
/// Every consumer within one level (extrusions, labels, outlines) projects
/// through the same transformer so they stay aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneTransformer {
    pub projection: MercatorProjection,
    pub mode: PlacementMode,
    pub bounds: MapBounds,
    pub scaled_bounds: MapBounds,
    pub center: [f64; 2],
    pub normalized_scale: f64,
}

impl SceneTransformer {
    pub fn new(
        collection: &FeatureCollection,
        projection: MercatorProjection,
        mode: PlacementMode,
    ) -> Self {
        let bounds = compute_bounds(collection, &projection);
        let center = bounds.center();

        let normalized_scale = match mode {
            PlacementMode::Absolute => 1.0,
            PlacementMode::Centered { width, height } => {
                let sx = width / bounds.width;
                let sy = height / bounds.height;
                let finite_or_one = |s: f64| if s.is_finite() { s } else { 1.0 };
                finite_or_one(sx).min(finite_or_one(sy))
            }
        };

        let scaled_bounds = match mode {
            PlacementMode::Absolute => MapBounds {
                width: (bounds.max_x - bounds.min_x).max(1e-6),
                height: (bounds.max_y - bounds.min_y).max(1e-6),
                ..bounds
            },
            PlacementMode::Centered { .. } => {
                let min_x = (bounds.min_x - center[0]) * normalized_scale;
                let max_x = (bounds.max_x - center[0]) * normalized_scale;
                let min_y = (bounds.min_y - center[1]) * normalized_scale;
                let max_y = (bounds.max_y - center[1]) * normalized_scale;
                MapBounds {
                    min_x,
                    max_x,
                    min_y,
                    max_y,
                    width: (max_x - min_x).max(1e-6),
                    height: (max_y - min_y).max(1e-6),
                }
            }
        };

        Self {
            projection,
            mode,
            bounds,
            scaled_bounds,
            center,
            normalized_scale,
        }
    }

    /// Lon/lat to level-local scene XY.
    pub fn project(&self, lon_lat: [f64; 2]) -> [f64; 2] {
        let [x, y] = project_mapped(&self.projection, lon_lat);
        match self.mode {
            PlacementMode::Absolute => [x, y],
            PlacementMode::Centered { .. } => [
                (x - self.center[0]) * self.normalized_scale,
                (y - self.center[1]) * self.normalized_scale,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PlacementMode, SceneTransformer, compute_bounds};
    use foundation::math::MercatorProjection;
    use formats::{Feature, FeatureCollection, GeoPoint, Geometry};
    use serde_json::Map;

    fn assert_close(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() <= eps, "{a} != {b}");
    }

    fn polygon(name: &str, ring: &[[f64; 2]]) -> Feature {
        let mut properties = Map::new();
        properties.insert("name".to_string(), name.into());
        Feature {
            id: None,
            properties,
            geometry: Geometry::Polygon(vec![
                ring.iter().map(|p| GeoPoint::new(p[0], p[1])).collect(),
            ]),
        }
    }

    fn projection() -> MercatorProjection {
        MercatorProjection::new([120.153576, 29.287459], 850.0)
    }

    #[test]
    fn vertex_at_projection_center_maps_to_origin_in_absolute_mode() {
        let fc = FeatureCollection::new(vec![polygon("c", &[[120.153576, 29.287459]])]);
        let t = SceneTransformer::new(&fc, projection(), PlacementMode::Absolute);
        let [x, y] = t.project([120.153576, 29.287459]);
        assert_close(x, 0.0, 1e-9);
        assert_close(y, 0.0, 1e-9);
        assert_eq!(t.normalized_scale, 1.0);
        // Single vertex: spans floor at 1.
        assert_eq!(t.bounds.width, 1.0);
        assert_eq!(t.bounds.height, 1.0);
    }

    #[test]
    fn north_maps_to_larger_scene_y() {
        let fc = FeatureCollection::new(vec![polygon(
            "box",
            &[[120.0, 29.0], [121.0, 29.0], [121.0, 30.0], [120.0, 30.0], [120.0, 29.0]],
        )]);
        let b = compute_bounds(&fc, &projection());
        let t = SceneTransformer::new(&fc, projection(), PlacementMode::Absolute);
        assert!(t.project([120.5, 30.0])[1] > t.project([120.5, 29.0])[1]);
        assert_close(t.project([120.0, 29.0])[0], b.min_x, 1e-9);
        assert_close(t.project([120.0, 30.0])[1], b.max_y, 1e-9);
    }

    #[test]
    fn centered_mode_fits_target_preserving_aspect() {
        let fc = FeatureCollection::new(vec![polygon(
            "box",
            &[[120.0, 29.0], [121.0, 29.0], [121.0, 29.5], [120.0, 29.5], [120.0, 29.0]],
        )]);
        let raw = compute_bounds(&fc, &projection());
        let t = SceneTransformer::new(
            &fc,
            projection(),
            PlacementMode::Centered {
                width: 100.0,
                height: 100.0,
            },
        );
        let expected = (100.0 / raw.width).min(100.0 / raw.height);
        assert_close(t.normalized_scale, expected, 1e-12);
        // The wider axis fills the target.
        assert_close(t.scaled_bounds.width, 100.0, 1e-9);
        assert!(t.scaled_bounds.height < 100.0);
        assert_close(t.scaled_bounds.min_x, -50.0, 1e-9);
        let mid = t.project([120.5, 29.25]);
        assert!(mid[0].abs() < 1e-9);
    }
}

use serde_json::{Map, Value};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoPoint {
    pub lon_deg: f64,
    pub lat_deg: f64,
}

impl GeoPoint {
    pub fn new(lon_deg: f64, lat_deg: f64) -> Self {
        Self { lon_deg, lat_deg }
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.lon_deg, self.lat_deg]
    }
}

pub type Ring = Vec<GeoPoint>;

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(GeoPoint),
    MultiPoint(Vec<GeoPoint>),
    LineString(Vec<GeoPoint>),
    MultiLineString(Vec<Vec<GeoPoint>>),
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

/// One named region. Only areal geometries contribute rings.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Option<String>,
    pub properties: Map<String, Value>,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeoJsonError {
    Json(String),
    NotAFeatureCollection,
    InvalidFeature { index: usize, reason: String },
}

impl std::fmt::Display for GeoJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoJsonError::Json(reason) => write!(f, "JSON parse error: {reason}"),
            GeoJsonError::NotAFeatureCollection => {
                write!(f, "expected GeoJSON FeatureCollection")
            }
            GeoJsonError::InvalidFeature { index, reason } => {
                write!(f, "invalid feature at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for GeoJsonError {}

impl Feature {
    pub fn name(&self) -> Option<&str> {
        self.properties
            .get("name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Polygons of this feature, each as `[outer, holes...]`.
    pub fn polygons(&self) -> Vec<&[Ring]> {
        match &self.geometry {
            Geometry::Polygon(rings) => vec![rings.as_slice()],
            Geometry::MultiPolygon(polys) => polys.iter().map(|p| p.as_slice()).collect(),
            _ => Vec::new(),
        }
    }

    /// Every ring of every polygon, outer rings and holes alike.
    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        self.polygons().into_iter().flat_map(|p| p.iter())
    }

    /// `[lon, lat]` stored under `key` as a two-number array.
    pub fn property_lon_lat(&self, key: &str) -> Option<[f64; 2]> {
        let arr = self.properties.get(key)?.as_array()?;
        if arr.len() < 2 {
            return None;
        }
        let lon = arr[0].as_f64()?;
        let lat = arr[1].as_f64()?;
        (lon.is_finite() && lat.is_finite()).then_some([lon, lat])
    }

    /// Area-weighted planar centroid in degrees, rounded to 6 decimals.
    ///
    /// Holes subtract from their polygon. Degenerate (zero-area) features fall
    /// back to the mean of their vertices.
    pub fn centroid(&self) -> Option<[f64; 2]> {
        let mut area_sum = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        let mut vertex_sum = [0.0, 0.0];
        let mut vertex_count = 0usize;

        for polygon in self.polygons() {
            for (ring_index, ring) in polygon.iter().enumerate() {
                for p in ring {
                    vertex_sum[0] += p.lon_deg;
                    vertex_sum[1] += p.lat_deg;
                    vertex_count += 1;
                }
                let Some((area, c)) = ring_area_centroid(ring) else {
                    continue;
                };
                let weight = if ring_index == 0 { area } else { -area };
                area_sum += weight;
                cx += c[0] * weight;
                cy += c[1] * weight;
            }
        }

        if vertex_count == 0 {
            return None;
        }
        let raw = if area_sum.abs() > 1e-12 {
            [cx / area_sum, cy / area_sum]
        } else {
            let n = vertex_count as f64;
            [vertex_sum[0] / n, vertex_sum[1] / n]
        };
        Some([round6(raw[0]), round6(raw[1])])
    }

    /// Label anchor: explicit `centroid`, then `center`, then the computed
    /// centroid.
    pub fn label_lon_lat(&self) -> Option<[f64; 2]> {
        self.property_lon_lat("centroid")
            .or_else(|| self.property_lon_lat("center"))
            .or_else(|| self.centroid())
    }
}

/// Absolute shoelace area and centroid of one ring.
fn ring_area_centroid(ring: &[GeoPoint]) -> Option<(f64, [f64; 2])> {
    if ring.len() < 3 {
        return None;
    }
    let mut a2 = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..ring.len() {
        let p = ring[i];
        let q = ring[(i + 1) % ring.len()];
        let cross = p.lon_deg * q.lat_deg - q.lon_deg * p.lat_deg;
        a2 += cross;
        cx += (p.lon_deg + q.lon_deg) * cross;
        cy += (p.lat_deg + q.lat_deg) * cross;
    }
    if a2.abs() < 1e-15 {
        return None;
    }
    let c = [cx / (3.0 * a2), cy / (3.0 * a2)];
    Some(((a2 / 2.0).abs(), c))
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// A collection holding a clone of exactly one feature.
    pub fn singleton(feature: &Feature) -> Self {
        Self {
            features: vec![feature.clone()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name() == Some(name))
    }

    pub fn from_geojson_str(payload: &str) -> Result<Self, GeoJsonError> {
        let value: Value =
            serde_json::from_str(payload).map_err(|e| GeoJsonError::Json(e.to_string()))?;
        Self::from_geojson_value(value)
    }

    pub fn from_geojson_value(value: Value) -> Result<Self, GeoJsonError> {
        let obj = value
            .as_object()
            .ok_or(GeoJsonError::NotAFeatureCollection)?;
        let ty = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(GeoJsonError::NotAFeatureCollection)?;
        if ty != "FeatureCollection" {
            return Err(GeoJsonError::NotAFeatureCollection);
        }

        let features_val = obj
            .get("features")
            .and_then(|v| v.as_array())
            .ok_or(GeoJsonError::NotAFeatureCollection)?;

        let mut features = Vec::with_capacity(features_val.len());
        for (index, feat_val) in features_val.iter().enumerate() {
            let invalid = |reason: String| GeoJsonError::InvalidFeature { index, reason };
            let feat_obj = feat_val
                .as_object()
                .ok_or_else(|| invalid("feature must be an object".to_string()))?;

            let id = match feat_obj.get("id") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };

            let properties = feat_obj
                .get("properties")
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_default();

            // Null geometries show up in real boundary datasets; skip them.
            let Some(geometry_val) = feat_obj.get("geometry").filter(|v| !v.is_null()) else {
                tracing::debug!(index, "skipping feature without geometry");
                continue;
            };
            let geometry = parse_geometry(geometry_val).map_err(invalid)?;

            features.push(Feature {
                id,
                properties,
                geometry,
            });
        }

        Ok(Self { features })
    }
}

fn parse_geometry(value: &Value) -> Result<Geometry, String> {
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geometry missing type".to_string())?;

    let coords = obj
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;

    match ty {
        "Point" => Ok(Geometry::Point(parse_point(coords)?)),
        "MultiPoint" => Ok(Geometry::MultiPoint(parse_points(coords)?)),
        "LineString" => Ok(Geometry::LineString(parse_points(coords)?)),
        "MultiLineString" => Ok(Geometry::MultiLineString(parse_nested(coords)?)),
        "Polygon" => Ok(Geometry::Polygon(parse_nested(coords)?)),
        "MultiPolygon" => {
            let polys = coords
                .as_array()
                .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
            let mut out = Vec::with_capacity(polys.len());
            for poly in polys {
                out.push(parse_nested(poly)?);
            }
            Ok(Geometry::MultiPolygon(out))
        }
        other => Err(format!("unsupported geometry type: {other}")),
    }
}

fn parse_point(coords: &Value) -> Result<GeoPoint, String> {
    let arr = coords
        .as_array()
        .ok_or("position must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("position must have [lon, lat]".to_string());
    }
    let lon = arr[0].as_f64().ok_or("lon must be a number".to_string())?;
    let lat = arr[1].as_f64().ok_or("lat must be a number".to_string())?;
    Ok(GeoPoint::new(lon, lat))
}

fn parse_points(coords: &Value) -> Result<Vec<GeoPoint>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array".to_string())?;
    arr.iter().map(parse_point).collect()
}

fn parse_nested(coords: &Value) -> Result<Vec<Vec<GeoPoint>>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array of rings".to_string())?;
    arr.iter().map(parse_points).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{FeatureCollection, GeoJsonError, Geometry};

    pub(crate) fn square_collection() -> FeatureCollection {
        FeatureCollection::from_geojson_str(
            r#"{
              "type": "FeatureCollection",
              "features": [
                {
                  "type": "Feature",
                  "id": 7,
                  "properties": { "name": "Alpha" },
                  "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                      [[120, 29], [122, 29], [122, 31], [120, 31], [120, 29]],
                      [[120.5, 29.5], [120.5, 30.0], [121.0, 30.0], [121.0, 29.5], [120.5, 29.5]]
                    ]
                  }
                },
                {
                  "type": "Feature",
                  "properties": { "name": "Beta", "center": [119.5, 28.5] },
                  "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                      [[[119, 28], [120, 28], [120, 29], [119, 28]]],
                      [[[118, 27], [118.5, 27], [118.5, 27.5], [118, 27]]]
                    ]
                  }
                },
                { "type": "Feature", "properties": { "name": "Ghost" }, "geometry": null }
              ]
            }"#,
        )
        .expect("parse collection")
    }

    #[test]
    fn parses_polygons_and_multipolygons() {
        let fc = square_collection();
        assert_eq!(fc.len(), 2);
        assert_eq!(fc.features[0].id.as_deref(), Some("7"));
        assert_eq!(fc.features[0].rings().count(), 2);
        assert!(matches!(fc.features[1].geometry, Geometry::MultiPolygon(_)));
        assert_eq!(fc.features[1].polygons().len(), 2);
        assert_eq!(fc.features[1].rings().count(), 2);
    }

    #[test]
    fn centroid_accounts_for_holes() {
        let fc = square_collection();
        let c = fc.features[0].centroid().expect("centroid");
        // 2x2 square minus a 0.5x0.5 hole near the south-west corner.
        let outer = 4.0;
        let hole = 0.25;
        let expect_x = (121.0 * outer - 120.75 * hole) / (outer - hole);
        assert!((c[0] - expect_x).abs() < 1e-6);
        assert!(c[0] > 121.0 && c[1] > 30.0);
    }

    #[test]
    fn label_anchor_prefers_explicit_properties() {
        let fc = square_collection();
        assert_eq!(fc.features[1].label_lon_lat(), Some([119.5, 28.5]));
        assert_eq!(
            fc.features[0].label_lon_lat(),
            fc.features[0].centroid()
        );
    }

    #[test]
    fn find_by_name_and_singleton() {
        let fc = square_collection();
        let beta = fc.find_by_name("Beta").expect("beta");
        let single = FeatureCollection::singleton(beta);
        assert_eq!(single.len(), 1);
        assert_eq!(single.features[0].name(), Some("Beta"));
        assert!(fc.find_by_name("Gamma").is_none());
    }

    #[test]
    fn rejects_non_collections() {
        assert_eq!(
            FeatureCollection::from_geojson_str(r#"{"type":"Feature"}"#),
            Err(GeoJsonError::NotAFeatureCollection)
        );
        assert!(matches!(
            FeatureCollection::from_geojson_str("{"),
            Err(GeoJsonError::Json(_))
        ));
        let bad = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,"x"]]]}}
        ]}"#;
        assert!(matches!(
            FeatureCollection::from_geojson_str(bad),
            Err(GeoJsonError::InvalidFeature { index: 0, .. })
        ));
    }
}

use formats::FeatureCollection;

/// Two regions: "Alpha" (polygon with a hole) and "Beta" (two islands).
pub(crate) fn square_collection() -> FeatureCollection {
    FeatureCollection::from_geojson_str(
        r#"{
          "type": "FeatureCollection",
          "features": [
            {
              "type": "Feature",
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
            }
          ]
        }"#,
    )
    .expect("parse fixture")
}

use formats::{CityBoardDatum, DistrictDatum, FeatureCollection};

/// Two side-by-side cities around the default projection center.
pub(crate) fn province() -> FeatureCollection {
    FeatureCollection::from_geojson_str(
        r#"{
          "type": "FeatureCollection",
          "features": [
            {
              "type": "Feature",
              "properties": { "name": "Hangzhou", "center": [120.15, 29.25] },
              "geometry": {
                "type": "Polygon",
                "coordinates": [[[119.9, 29.0], [120.4, 29.0], [120.4, 29.5], [119.9, 29.5], [119.9, 29.0]]]
              }
            },
            {
              "type": "Feature",
              "properties": { "name": "Ningbo", "center": [120.65, 29.25] },
              "geometry": {
                "type": "Polygon",
                "coordinates": [[[120.4, 29.0], [120.9, 29.0], [120.9, 29.5], [120.4, 29.5], [120.4, 29.0]]]
              }
            }
          ]
        }"#,
    )
    .expect("parse province fixture")
}

/// Hangzhou split into two districts.
pub(crate) fn hangzhou() -> FeatureCollection {
    FeatureCollection::from_geojson_str(
        r#"{
          "type": "FeatureCollection",
          "features": [
            {
              "type": "Feature",
              "properties": { "name": "Xihu", "center": [120.02, 29.25] },
              "geometry": {
                "type": "Polygon",
                "coordinates": [[[119.9, 29.0], [120.15, 29.0], [120.15, 29.5], [119.9, 29.5], [119.9, 29.0]]]
              }
            },
            {
              "type": "Feature",
              "properties": { "name": "Binjiang", "center": [120.27, 29.25] },
              "geometry": {
                "type": "Polygon",
                "coordinates": [[[120.15, 29.0], [120.4, 29.0], [120.4, 29.5], [120.15, 29.5], [120.15, 29.0]]]
              }
            }
          ]
        }"#,
    )
    .expect("parse city fixture")
}

pub(crate) fn boards() -> Vec<CityBoardDatum> {
    vec![
        CityBoardDatum {
            id: "330100".into(),
            name: "Hangzhou".into(),
            value: 80.0,
            districts: Some(vec![
                DistrictDatum {
                    name: "Xihu".into(),
                    value: Some(10.0),
                },
                DistrictDatum {
                    name: "Binjiang".into(),
                    value: Some(30.0),
                },
            ]),
            center: None,
        },
        CityBoardDatum {
            id: "330200".into(),
            name: "Ningbo".into(),
            value: 40.0,
            districts: None,
            center: None,
        },
    ]
}

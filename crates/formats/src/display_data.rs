use std::collections::BTreeMap;

use foundation::math::stable_total_cmp_f64;
use serde::{Deserialize, Serialize};

use crate::geojson::FeatureCollection;

/// Per-district value carried by a city datum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictDatum {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// Caller-supplied per-city record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityBoardDatum {
    pub id: String,
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub districts: Option<Vec<DistrictDatum>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<[f64; 2]>,
}

/// A city datum with its resolved anchor and 1-based rank by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityDisplayDatum {
    pub id: String,
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub districts: Option<Vec<DistrictDatum>>,
    pub center: [f64; 2],
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayDataError {
    Json(String),
}

impl std::fmt::Display for DisplayDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayDataError::Json(reason) => write!(f, "invalid city data: {reason}"),
        }
    }
}

impl std::error::Error for DisplayDataError {}

pub fn parse_city_boards(payload: &str) -> Result<Vec<CityBoardDatum>, DisplayDataError> {
    serde_json::from_str(payload).map_err(|e| DisplayDataError::Json(e.to_string()))
}

/// Resolve anchors, sort by value (descending) and assign ranks.
///
/// Anchor order: the datum's own `center`, then the centroid of the
/// same-named province feature. Data with neither is dropped.
///
/// Ordering contract: the sort is stable, so equal values keep input order.
pub fn build_city_display_data(
    source: &[CityBoardDatum],
    province: &FeatureCollection,
) -> Vec<CityDisplayDatum> {
    let mut resolved: Vec<(CityBoardDatum, [f64; 2])> = source
        .iter()
        .filter_map(|city| {
            let center = city.center.or_else(|| {
                province
                    .find_by_name(&city.name)
                    .and_then(|feature| feature.centroid())
            });
            if center.is_none() {
                tracing::debug!(city = %city.name, "dropping city datum without anchor");
            }
            center.map(|c| (city.clone(), c))
        })
        .collect();

    resolved.sort_by(|a, b| stable_total_cmp_f64(b.0.value, a.0.value));

    resolved
        .into_iter()
        .enumerate()
        .map(|(index, (board, center))| CityDisplayDatum {
            id: board.id,
            name: board.name,
            value: board.value,
            districts: board.districts,
            center,
            rank: index + 1,
        })
        .collect()
}

/// District lists keyed by city name; cities without districts are absent.
pub fn district_data_by_city(data: &[CityDisplayDatum]) -> BTreeMap<String, Vec<DistrictDatum>> {
    data.iter()
        .filter_map(|city| {
            let districts = city.districts.as_ref()?;
            (!districts.is_empty()).then(|| (city.name.clone(), districts.clone()))
        })
        .collect()
}

/// Min/max over a value set, used for marker normalization.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut out: Option<ValueRange> = None;
        for v in values.into_iter().filter(|v| v.is_finite()) {
            out = Some(match out {
                None => ValueRange { min: v, max: v },
                Some(r) => ValueRange {
                    min: r.min.min(v),
                    max: r.max.max(v),
                },
            });
        }
        out
    }

    /// `(v - min) / (max - min)` clamped to `[0, 1]`; a flat range is
    /// saturated (1.0).
    pub fn normalize(&self, v: f64) -> f64 {
        let span = self.max - self.min;
        if span == 0.0 {
            return 1.0;
        }
        ((v - self.min) / span).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DistrictStat {
    pub value: f64,
    pub normalized: f64,
}

/// Normalized district values for one city.
///
/// Only finite values count. The divisor is `max(max - min, 1)`; when every
/// value is equal the normalized value is 0.8.
pub fn district_stats(districts: &[DistrictDatum]) -> BTreeMap<String, DistrictStat> {
    let mut out = BTreeMap::new();
    let finite = || districts.iter().filter_map(|d| d.value.filter(|v| v.is_finite()));
    let Some(range) = ValueRange::from_values(finite()) else {
        return out;
    };
    let divisor = (range.max - range.min).max(1.0);

    for d in districts {
        let Some(value) = d.value.filter(|v| v.is_finite()) else {
            continue;
        };
        let normalized = if range.max == range.min {
            0.8
        } else {
            ((value - range.min) / divisor).clamp(0.0, 1.0)
        };
        out.insert(d.name.clone(), DistrictStat { value, normalized });
    }
    out
}

type DistrictRow = (&'static str, f64);
type CityRow = (&'static str, &'static str, f64, &'static [DistrictRow]);

const DEFAULT_CITY_BOARDS: &[CityRow] = &[
    (
        "hangzhou",
        "杭州市",
        96.0,
        &[
            ("上城区", 88.0),
            ("拱墅区", 81.0),
            ("西湖区", 92.0),
            ("滨江区", 76.0),
            ("萧山区", 84.0),
            ("余杭区", 79.0),
            ("临平区", 62.0),
            ("钱塘区", 58.0),
            ("富阳区", 55.0),
            ("临安区", 49.0),
            ("桐庐县", 41.0),
            ("淳安县", 36.0),
            ("建德市", 38.0),
        ],
    ),
    (
        "ningbo",
        "宁波市",
        91.0,
        &[
            ("海曙区", 74.0),
            ("江北区", 63.0),
            ("北仑区", 69.0),
            ("镇海区", 57.0),
            ("鄞州区", 86.0),
            ("奉化区", 44.0),
            ("余姚市", 52.0),
            ("慈溪市", 61.0),
            ("象山县", 39.0),
            ("宁海县", 42.0),
        ],
    ),
    (
        "wenzhou",
        "温州市",
        87.0,
        &[
            ("鹿城区", 71.0),
            ("龙湾区", 54.0),
            ("瓯海区", 58.0),
            ("洞头区", 27.0),
            ("瑞安市", 63.0),
            ("乐清市", 66.0),
            ("龙港市", 37.0),
            ("永嘉县", 43.0),
            ("平阳县", 40.0),
            ("苍南县", 35.0),
            ("文成县", 22.0),
            ("泰顺县", 19.0),
        ],
    ),
    (
        "shaoxing",
        "绍兴市",
        78.0,
        &[
            ("越城区", 67.0),
            ("柯桥区", 72.0),
            ("上虞区", 56.0),
            ("诸暨市", 61.0),
            ("嵊州市", 38.0),
            ("新昌县", 33.0),
        ],
    ),
    (
        "huzhou",
        "湖州市",
        64.0,
        &[
            ("吴兴区", 58.0),
            ("南浔区", 41.0),
            ("德清县", 47.0),
            ("长兴县", 50.0),
            ("安吉县", 44.0),
        ],
    ),
    (
        "jiaxing",
        "嘉兴市",
        73.0,
        &[
            ("南湖区", 59.0),
            ("秀洲区", 48.0),
            ("海宁市", 52.0),
            ("平湖市", 46.0),
            ("桐乡市", 50.0),
            ("嘉善县", 43.0),
            ("海盐县", 35.0),
        ],
    ),
    (
        "jinhua",
        "金华市",
        82.0,
        &[
            ("婺城区", 57.0),
            ("金东区", 45.0),
            ("兰溪市", 36.0),
            ("义乌市", 79.0),
            ("东阳市", 51.0),
            ("永康市", 48.0),
            ("武义县", 31.0),
            ("浦江县", 29.0),
            ("磐安县", 18.0),
        ],
    ),
    (
        "quzhou",
        "衢州市",
        52.0,
        &[
            ("柯城区", 46.0),
            ("衢江区", 34.0),
            ("江山市", 37.0),
            ("常山县", 24.0),
            ("开化县", 21.0),
            ("龙游县", 28.0),
        ],
    ),
    (
        "zhoushan",
        "舟山市",
        47.0,
        &[
            ("定海区", 42.0),
            ("普陀区", 39.0),
            ("岱山县", 21.0),
            ("嵊泗县", 14.0),
        ],
    ),
    (
        "taizhou",
        "台州市",
        76.0,
        &[
            ("椒江区", 55.0),
            ("黄岩区", 47.0),
            ("路桥区", 49.0),
            ("临海市", 52.0),
            ("温岭市", 61.0),
            ("玉环市", 40.0),
            ("三门县", 26.0),
            ("天台县", 29.0),
            ("仙居县", 25.0),
        ],
    ),
    (
        "lishui",
        "丽水市",
        58.0,
        &[
            ("莲都区", 44.0),
            ("龙泉市", 27.0),
            ("青田县", 33.0),
            ("缙云县", 30.0),
            ("遂昌县", 22.0),
            ("松阳县", 20.0),
            ("云和县", 16.0),
            ("庆元县", 15.0),
            ("景宁畲族自治县", 12.0),
        ],
    ),
];

/// Built-in dataset used when the caller supplies no city data.
pub fn default_city_boards() -> Vec<CityBoardDatum> {
    DEFAULT_CITY_BOARDS
        .iter()
        .map(|(id, name, value, districts)| CityBoardDatum {
            id: (*id).to_string(),
            name: (*name).to_string(),
            value: *value,
            districts: Some(
                districts
                    .iter()
                    .map(|(d, v)| DistrictDatum {
                        name: (*d).to_string(),
                        value: Some(*v),
                    })
                    .collect(),
            ),
            center: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        CityBoardDatum, DistrictDatum, ValueRange, build_city_display_data, default_city_boards,
        district_data_by_city, district_stats, parse_city_boards,
    };
    use crate::geojson::tests::square_collection;
    use pretty_assertions::assert_eq;

    fn board(name: &str, value: f64, center: Option<[f64; 2]>) -> CityBoardDatum {
        CityBoardDatum {
            id: name.to_lowercase(),
            name: name.to_string(),
            value,
            districts: None,
            center,
        }
    }

    #[test]
    fn ranks_by_value_and_resolves_centroids() {
        let province = square_collection();
        let source = vec![
            board("Alpha", 10.0, None),
            board("Nowhere", 99.0, None),
            board("Beta", 50.0, Some([1.0, 2.0])),
        ];
        let out = build_city_display_data(&source, &province);
        let names: Vec<(&str, usize)> = out.iter().map(|c| (c.name.as_str(), c.rank)).collect();
        assert_eq!(names, vec![("Beta", 1), ("Alpha", 2)]);
        assert_eq!(out[0].center, [1.0, 2.0]);
        assert_eq!(Some(out[1].center), province.features[0].centroid());
    }

    #[test]
    fn normalization_spans_unit_interval() {
        let range = ValueRange::from_values([10.0, 50.0, 90.0]).expect("range");
        let n: Vec<f64> = [10.0, 50.0, 90.0].iter().map(|v| range.normalize(*v)).collect();
        assert_eq!(n, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn flat_values_normalize_to_a_constant() {
        let range = ValueRange::from_values([5.0, 5.0, 5.0]).expect("range");
        assert_eq!(range.normalize(5.0), 1.0);
        assert!(ValueRange::from_values([f64::NAN]).is_none());
    }

    #[test]
    fn district_stats_follow_floor_and_flat_rules() {
        let d = |name: &str, value: Option<f64>| DistrictDatum {
            name: name.to_string(),
            value,
        };
        let stats = district_stats(&[d("a", Some(0.5)), d("b", Some(1.0)), d("c", None)]);
        // Range 0.5 is floored to 1.
        assert_eq!(stats["a"].normalized, 0.0);
        assert_eq!(stats["b"].normalized, 0.5);
        assert!(!stats.contains_key("c"));

        let flat = district_stats(&[d("a", Some(3.0)), d("b", Some(3.0))]);
        assert_eq!(flat["a"].normalized, 0.8);
        assert!(district_stats(&[d("a", None)]).is_empty());
    }

    #[test]
    fn default_dataset_covers_every_city_with_districts() {
        let boards = default_city_boards();
        assert_eq!(boards.len(), 11);
        let with_centers: Vec<_> = boards
            .iter()
            .map(|b| CityBoardDatum {
                center: Some([0.0, 0.0]),
                ..b.clone()
            })
            .collect();
        let display = build_city_display_data(&with_centers, &Default::default());
        assert_eq!(display[0].name, "杭州市");
        assert_eq!(district_data_by_city(&display).len(), 11);
    }

    #[test]
    fn parses_camel_case_json() {
        let parsed = parse_city_boards(
            r#"[{"id":"x","name":"X","value":3,"center":[120,30],"districts":[{"name":"d"}]}]"#,
        )
        .expect("parse");
        assert_eq!(parsed[0].center, Some([120.0, 30.0]));
        assert_eq!(parsed[0].districts.as_ref().map(|d| d[0].value), Some(None));
        assert!(parse_city_boards("{}").is_err());
    }
}

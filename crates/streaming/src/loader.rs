use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use formats::{FeatureCollection, GeoJsonError};

pub type GeoFuture = Pin<Box<dyn Future<Output = Option<FeatureCollection>>>>;

/// Asynchronous per-region geography source.
///
/// `None` means "nothing to show" (unknown region, failed fetch, bad payload);
/// callers abort the transition rather than surface an error.
pub trait GeoLoader {
    fn load(&self, region: &str) -> GeoFuture;
}

/// Decode a fetched payload into a feature collection.
pub fn decode_feature_collection(bytes: &[u8]) -> Result<FeatureCollection, GeoJsonError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| GeoJsonError::Json(e.to_string()))?;
    FeatureCollection::from_geojson_value(value)
}

/// In-memory loader; resolves immediately.
#[derive(Debug, Default)]
pub struct StaticGeoLoader {
    regions: RefCell<BTreeMap<String, FeatureCollection>>,
    calls: Cell<usize>,
}

impl StaticGeoLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(self, name: impl Into<String>, collection: FeatureCollection) -> Self {
        self.insert(name, collection);
        self
    }

    pub fn insert(&self, name: impl Into<String>, collection: FeatureCollection) {
        self.regions.borrow_mut().insert(name.into(), collection);
    }

    pub fn remove(&self, name: &str) -> Option<FeatureCollection> {
        self.regions.borrow_mut().remove(name)
    }

    /// Number of `load` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl GeoLoader for StaticGeoLoader {
    fn load(&self, region: &str) -> GeoFuture {
        self.calls.set(self.calls.get() + 1);
        let found = self.regions.borrow().get(region).cloned();
        if found.is_none() {
            tracing::debug!(region = %region, "no static geography for region");
        }
        Box::pin(std::future::ready(found))
    }
}

#[cfg(test)]
mod tests {
    use super::{GeoLoader, StaticGeoLoader, decode_feature_collection};
    use formats::FeatureCollection;

    #[test]
    fn static_loader_resolves_known_regions_only() {
        let loader = StaticGeoLoader::new().with_region("a", FeatureCollection::default());
        assert_eq!(
            pollster::block_on(loader.load("a")),
            Some(FeatureCollection::default())
        );
        assert_eq!(pollster::block_on(loader.load("b")), None);
        assert_eq!(loader.calls(), 2);
    }

    #[test]
    fn decode_rejects_non_collections() {
        let ok = decode_feature_collection(br#"{"type":"FeatureCollection","features":[]}"#)
            .expect("collection");
        assert!(ok.is_empty());
        assert!(decode_feature_collection(br#"{"type":"Feature"}"#).is_err());
        assert!(decode_feature_collection(b"not json").is_err());
    }
}

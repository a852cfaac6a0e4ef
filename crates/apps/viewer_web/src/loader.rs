use formats::FeatureCollection;
use gloo_net::http::Request;
use streaming::{GeoFuture, GeoLoader, RegionAssets, decode_feature_collection};

/// Fetches region geography over HTTP from the asset host.
#[derive(Debug, Clone)]
pub struct FetchGeoLoader {
    assets: RegionAssets,
}

impl FetchGeoLoader {
    pub fn new(assets: RegionAssets) -> Self {
        Self { assets }
    }

    pub async fn province(&self) -> Option<FeatureCollection> {
        fetch_collection(self.assets.province_geo_url()).await
    }
}

impl GeoLoader for FetchGeoLoader {
    fn load(&self, region: &str) -> GeoFuture {
        let url = self.assets.city_geo_url(region);
        let region = region.to_string();
        Box::pin(async move {
            let Some(url) = url else {
                tracing::warn!(%region, "no geography published for region");
                return None;
            };
            fetch_collection(url).await
        })
    }
}

async fn fetch_collection(url: String) -> Option<FeatureCollection> {
    let response = match Request::get(&url).send().await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(%url, error = %err, "geography request failed");
            return None;
        }
    };
    if !response.ok() {
        tracing::warn!(%url, status = response.status(), "geography request rejected");
        return None;
    }
    let bytes = match response.binary().await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(%url, error = %err, "geography body unreadable");
            return None;
        }
    };
    match decode_feature_collection(&bytes) {
        Ok(collection) => Some(collection),
        Err(err) => {
            tracing::warn!(%url, error = %err, "geography payload invalid");
            None
        }
    }
}

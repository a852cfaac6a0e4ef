use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CDN_BASE_URL: &str = "https://dowload.20001220.com";

const PROVINCE_TEXTURE_PREFIX: &str = "textures/zhejiang/";

/// Maps asset paths (relative to the asset root) to fetchable URLs.
///
/// Without a custom base every path resolves against the CDN, with province
/// textures living under `/zhejiang/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetResolver {
    base_path: Option<String>,
    debug: bool,
}

impl AssetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_path(mut self, base: &str) -> Self {
        self.set_base_path(base);
        self
    }

    pub fn set_base_path(&mut self, base: &str) {
        let trimmed = base.trim_end_matches('/');
        self.base_path = Some(trimmed.to_string());
        if self.debug {
            tracing::info!(base = %trimmed, "asset base path set");
        }
    }

    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    pub fn reset(&mut self) {
        self.base_path = None;
        if self.debug {
            tracing::info!("asset base path reset to default");
        }
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
        if enabled {
            tracing::info!("asset debug logging enabled");
        }
    }

    pub fn resolve(&self, path: &str) -> String {
        let url = match &self.base_path {
            Some(base) => format!("{base}/{path}"),
            None => match path.strip_prefix(PROVINCE_TEXTURE_PREFIX) {
                Some(file) => format!("{DEFAULT_CDN_BASE_URL}/zhejiang/{file}"),
                None => format!("{DEFAULT_CDN_BASE_URL}/{path}"),
            },
        };
        if self.debug {
            tracing::info!(path = %path, url = %url, "resolved asset");
        }
        url
    }
}

/// City name and asset stem for every city of the province.
pub const CITY_ASSET_STEMS: [(&str, &str); 11] = [
    ("杭州市", "hangzhou"),
    ("宁波市", "ningbo"),
    ("温州市", "wenzhou"),
    ("绍兴市", "shaoxing"),
    ("湖州市", "huzhou"),
    ("嘉兴市", "jiaxing"),
    ("金华市", "jinhua"),
    ("衢州市", "quzhou"),
    ("舟山市", "zhoushan"),
    ("台州市", "taizhou"),
    ("丽水市", "lishui"),
];

pub const PROVINCE_GEO_PATH: &str = "geo/zhejiang.json";

/// Per-region asset lookup: geography datasets and textures.
#[derive(Debug, Clone, Default)]
pub struct RegionAssets {
    resolver: AssetResolver,
    district_textures: BTreeMap<String, String>,
}

impl RegionAssets {
    pub fn new(resolver: AssetResolver) -> Self {
        Self {
            resolver,
            district_textures: BTreeMap::new(),
        }
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }

    /// Changing the resolver drops memoized district URLs.
    pub fn resolver_mut(&mut self) -> &mut AssetResolver {
        self.district_textures.clear();
        &mut self.resolver
    }

    fn stem(city: &str) -> Option<&'static str> {
        CITY_ASSET_STEMS
            .iter()
            .find(|(name, _)| *name == city)
            .map(|(_, stem)| *stem)
    }

    pub fn is_known_city(city: &str) -> bool {
        Self::stem(city).is_some()
    }

    pub fn province_geo_url(&self) -> String {
        self.resolver.resolve(PROVINCE_GEO_PATH)
    }

    pub fn city_geo_url(&self, city: &str) -> Option<String> {
        let stem = Self::stem(city)?;
        Some(self.resolver.resolve(&format!("geo/{stem}district.json")))
    }

    pub fn city_texture(&self, city: &str) -> Option<String> {
        let stem = Self::stem(city)?;
        Some(self.resolver.resolve(&format!("images/city/{stem}.jpg")))
    }

    pub fn city_normal_texture(&self, city: &str) -> Option<String> {
        let stem = Self::stem(city)?;
        Some(self.resolver.resolve(&format!("images/city/{stem}_normal.png")))
    }

    pub fn district_texture(&mut self, district: &str) -> Option<String> {
        let name = district.trim();
        if name.is_empty() {
            return None;
        }
        if let Some(url) = self.district_textures.get(name) {
            return Some(url.clone());
        }
        let url = self.resolver.resolve(&format!("images/district/{name}.jpg"));
        self.district_textures.insert(name.to_string(), url.clone());
        Some(url)
    }
}

//! Geo-IP lookup for location enrichment.

use async_trait::async_trait;
use footprint_core::{Error, GeoLocation, Result};
use moka::future::Cache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use tracing::{debug, warn};

use crate::config::CollectorConfig;

/// Maximum cache entries.
const GEO_CACHE_MAX_CAPACITY: u64 = 50_000;

/// Resolves a network address to a location.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: Option<&str>) -> Result<GeoLocation>;
}

/// Geo-IP service client.
///
/// Calls `{base_url}/{ip}` and caches answers per address. Private,
/// loopback and missing addresses resolve to [`GeoLocation::unknown`]
/// without a request.
#[derive(Clone)]
pub struct HttpGeoLookup {
    /// Service URL (e.g., "http://geo-service:8080/json")
    base_url: String,
    http_client: reqwest::Client,
    /// Address -> location
    cache: Cache<String, GeoLocation>,
    /// Answer locally instead of calling the service
    mock_mode: bool,
}

impl HttpGeoLookup {
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        let base_url = config.geo_lookup_url.trim_end_matches('/').to_string();
        let mock_mode = base_url.is_empty() || base_url == "mock";

        let http_client = reqwest::Client::builder()
            .timeout(config.geo_timeout())
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http_client,
            cache: Cache::builder()
                .max_capacity(GEO_CACHE_MAX_CAPACITY)
                .time_to_live(config.geo_cache_ttl())
                .build(),
            mock_mode,
        })
    }

    /// Mock-mode lookup with the default cache settings.
    pub fn mock() -> Self {
        Self {
            base_url: String::new(),
            http_client: reqwest::Client::new(),
            cache: Cache::builder()
                .max_capacity(GEO_CACHE_MAX_CAPACITY)
                .time_to_live(CollectorConfig::default().geo_cache_ttl())
                .build(),
            mock_mode: true,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.mock_mode
    }

    async fn remote_lookup(&self, ip: &str) -> Result<GeoLocation> {
        let url = format!("{}/{}", self.base_url, ip);
        debug!(url = %url, "Calling geo service");

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            warn!(error = %e, "Geo service request failed");
            Error::lookup(format!("Geo service unavailable: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(status = %status, "Geo service returned error");
            return Err(Error::lookup(format!("Geo service returned {}", status)));
        }

        response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse geo response");
            Error::lookup(format!("Invalid geo response: {}", e))
        })
    }
}

#[async_trait]
impl GeoLookup for HttpGeoLookup {
    async fn lookup(&self, ip: Option<&str>) -> Result<GeoLocation> {
        let Some(addr) = ip.and_then(|ip| ip.trim().parse::<IpAddr>().ok()) else {
            return Ok(GeoLocation::unknown());
        };
        if !is_public(&addr) {
            return Ok(GeoLocation::unknown());
        }

        let key = addr.to_string();
        if let Some(cached) = self.cache.get(&key).await {
            debug!("Geo cache hit");
            return Ok(cached);
        }

        let location = if self.mock_mode {
            mock_location(&addr)
        } else {
            self.remote_lookup(&key).await?
        };
        self.cache.insert(key, location.clone()).await;
        Ok(location)
    }
}

fn is_public(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation())
        }
        IpAddr::V6(v6) => {
            // fc00::/7 unique local, fe80::/10 link local
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}

/// Deterministic answer per address, for development and tests.
fn mock_location(addr: &IpAddr) -> GeoLocation {
    const PLACES: &[(&str, &str, &str, &str, f64, f64, &str)] = &[
        ("US", "United States", "California", "San Francisco", 37.7749, -122.4194, "America/Los_Angeles"),
        ("DE", "Germany", "Berlin", "Berlin", 52.52, 13.405, "Europe/Berlin"),
        ("JP", "Japan", "Tokyo", "Tokyo", 35.6762, 139.6503, "Asia/Tokyo"),
        ("BR", "Brazil", "Sao Paulo", "Sao Paulo", -23.5505, -46.6333, "America/Sao_Paulo"),
    ];

    let mut hasher = DefaultHasher::new();
    addr.hash(&mut hasher);
    let hash = hasher.finish();
    let (code, country, region, city, lat, lon, tz) = PLACES[(hash % PLACES.len() as u64) as usize];

    GeoLocation {
        country_code: code.to_string(),
        country_name: country.to_string(),
        region: region.to_string(),
        city: city.to_string(),
        latitude: lat,
        longitude: lon,
        timezone: tz.to_string(),
        isp: "Mock ISP".to_string(),
        organization: "Mock Org".to_string(),
        is_vpn: false,
        is_mobile: hash % 5 == 0,
    }
}

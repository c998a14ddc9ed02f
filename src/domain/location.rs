//! Location table and the spatial index used for L3 cache borrowing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub prefecture: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        prefecture: impl Into<String>,
        region: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            prefecture: prefecture.into(),
            region: region.into(),
            latitude,
            longitude,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Static coordinate table loaded once at startup. Real deployments would
/// read this from a packaged data file; persistence beyond the cache and
/// history store is a non-goal, so it is embedded here.
pub fn static_locations() -> &'static [Location] {
    use std::sync::OnceLock;
    static TABLE: OnceLock<Vec<Location>> = OnceLock::new();
    TABLE.get_or_init(|| {
        vec![
            Location::new("tokyo", "Tokyo", "Tokyo", "Kanto", 35.6812, 139.7671),
            Location::new("shinagawa", "Shinagawa", "Tokyo", "Kanto", 35.6284, 139.7387),
            Location::new("osaka", "Osaka", "Osaka", "Kinki", 34.6937, 135.5023),
            Location::new("sapporo", "Sapporo", "Hokkaido", "Hokkaido", 43.0618, 141.3545),
            Location::new("naha", "Naha", "Okinawa", "Okinawa", 26.2124, 127.6809),
            Location::new("fukuoka", "Fukuoka", "Fukuoka", "Kyushu", 33.5904, 130.4017),
            Location::new("sendai", "Sendai", "Miyagi", "Tohoku", 38.2682, 140.8694),
            Location::new("nagoya", "Nagoya", "Aichi", "Chubu", 35.1815, 136.9066),
        ]
    })
}

#[must_use]
pub fn find_by_name(name: &str) -> Option<&'static Location> {
    static_locations()
        .iter()
        .find(|loc| loc.name.eq_ignore_ascii_case(name))
}

#[must_use]
pub fn find_by_id(id: &str) -> Option<&'static Location> {
    static_locations().iter().find(|loc| loc.id == id)
}

/// Haversine great-circle distance in kilometers.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let (lat1r, lat2r) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1r.cos() * lat2r.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Registry of `(location_id, lat, lon)` supporting "nearest K within R km".
/// Built once at startup and read-only thereafter (spec §5 shared-resource
/// policy); acceptable for O(10^3) locations per spec §3.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    entries: Vec<(String, f64, f64)>,
}

impl SpatialIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_locations(locations: &[Location]) -> Self {
        let mut index = Self::new();
        for loc in locations {
            index.insert(loc.id.clone(), loc.latitude, loc.longitude);
        }
        index
    }

    pub fn insert(&mut self, location_id: String, lat: f64, lon: f64) {
        self.entries.push((location_id, lat, lon));
    }

    /// Up to `k` nearest locations within `radius_km`, nearest first,
    /// excluding `from_location_id` itself.
    #[must_use]
    pub fn nearest(
        &self,
        from_location_id: &str,
        lat: f64,
        lon: f64,
        radius_km: f64,
        k: usize,
    ) -> Vec<(String, f64)> {
        let mut candidates: Vec<(String, f64)> = self
            .entries
            .iter()
            .filter(|(id, _, _)| id != from_location_id)
            .map(|(id, elat, elon)| (id.clone(), haversine_km(lat, lon, *elat, *elon)))
            .filter(|(_, dist)| *dist <= radius_km)
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        candidates.truncate(k);
        candidates
    }
}

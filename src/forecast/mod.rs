//! Forecast Service (C5): three-tier cache in front of the weather
//! provider adapter, with single-flight misses, spatial borrowing, and
//! best-effort cache warming.

pub mod adapter;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use tokio::sync::Mutex;

use crate::cache::{FileCache, MemoryCache};
use crate::config::{CacheConfig, SpatialCacheConfig};
use crate::domain::location::SpatialIndex;
use crate::domain::weather::ForecastCollection;
use crate::error::{WeatherFetchError, WeatherFetchErrorKind};
use crate::retry::{retry_with_backoff, BackoffPolicy};

pub use adapter::{condition_from_provider_code, HttpWeatherAdapter, WeatherAdapter};

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct ForecastKey {
    location_id: String,
    target_hour: i64,
}

fn floor_to_hour(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_minute(0)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

#[derive(Debug, Default)]
pub struct ForecastServiceStats {
    pub l1_hits: AtomicU64,
    pub l2_hits: AtomicU64,
    pub l3_borrows: AtomicU64,
    pub api_calls: AtomicU64,
    pub misses: AtomicU64,
}

impl ForecastServiceStats {
    #[must_use]
    pub fn snapshot(&self) -> ForecastServiceStatsSnapshot {
        ForecastServiceStatsSnapshot {
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            l3_borrows: self.l3_borrows.load(Ordering::Relaxed),
            api_calls: self.api_calls.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForecastServiceStatsSnapshot {
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub l3_borrows: u64,
    pub api_calls: u64,
    pub misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    MemoryCache,
    FileCache,
    SpatialBorrow,
    ExternalFetch,
}

pub struct FetchOutcome {
    pub collection: ForecastCollection,
    pub served_from: ServedFrom,
    /// Set when the result was adopted from a nearby location's cache
    /// (spec §4.5 L3, §3 "Spatial borrow").
    pub spatial_borrow_from: Option<String>,
}

pub struct ForecastService {
    l1: MemoryCache<ForecastKey, ForecastCollection>,
    l2: FileCache,
    spatial_index: SpatialIndex,
    spatial_config: SpatialCacheConfig,
    adapter: Arc<dyn WeatherAdapter>,
    stats: ForecastServiceStats,
}

impl ForecastService {
    #[must_use]
    pub fn new(
        cache_config: &CacheConfig,
        l2_dir: impl Into<std::path::PathBuf>,
        spatial_index: SpatialIndex,
        adapter: Arc<dyn WeatherAdapter>,
    ) -> Self {
        Self {
            l1: MemoryCache::new(cache_config.memory_cache_size, cache_config.memory_cache_ttl_secs),
            l2: FileCache::new(l2_dir, cache_config.file_cache_ttl_secs),
            spatial_index,
            spatial_config: cache_config.spatial.clone(),
            adapter,
            stats: ForecastServiceStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> ForecastServiceStatsSnapshot {
        self.stats.snapshot()
    }

    /// Get a forecast for `location_id` at `(lat, lon)` covering
    /// `target`, trying L1, then L2, then L3 spatial borrow, then
    /// falling back to the external adapter (spec §4.5).
    ///
    /// The L2/L3/adapter path runs inside [`MemoryCache::get_or_fetch`]
    /// so concurrent misses for the same `(location_id, target_hour)`
    /// key join a single in-flight resolution rather than each issuing
    /// their own external call (spec §5 single-flight contract).
    pub async fn get_forecast(
        &self,
        location_id: &str,
        lat: f64,
        lon: f64,
        target: DateTime<Utc>,
    ) -> Result<FetchOutcome, WeatherFetchError> {
        let key = ForecastKey {
            location_id: location_id.to_string(),
            target_hour: floor_to_hour(target).timestamp(),
        };

        if let Some(collection) = self.l1.get(&key).await {
            self.stats.l1_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(FetchOutcome {
                collection,
                served_from: ServedFrom::MemoryCache,
                spatial_borrow_from: None,
            });
        }

        let served: Mutex<(ServedFrom, Option<String>)> = Mutex::new((ServedFrom::ExternalFetch, None));

        let collection = self
            .l1
            .get_or_fetch(key, || async {
                if let Some(collection) = self
                    .l2
                    .read_fresh::<ForecastCollection>(location_id, Utc::now())
                    .await
                    .unwrap_or(None)
                {
                    *served.lock().await = (ServedFrom::FileCache, None);
                    return Ok(collection);
                }

                if self.spatial_config.enabled {
                    if let Some(outcome) = self.try_spatial_borrow(location_id, lat, lon, target).await {
                        *served.lock().await = (ServedFrom::SpatialBorrow, outcome.spatial_borrow_from.clone());
                        return Ok(outcome.collection);
                    }
                }

                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                let collection = self.fetch_from_adapter(location_id, lat, lon, target).await?;
                let _ = self.l2.append(location_id, target, &collection).await;
                Ok(collection)
            })
            .await?;

        let (served_from, spatial_borrow_from) = served.into_inner();
        match served_from {
            ServedFrom::FileCache => {
                self.stats.l2_hits.fetch_add(1, Ordering::Relaxed);
            }
            ServedFrom::SpatialBorrow => {
                self.stats.l3_borrows.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        Ok(FetchOutcome {
            collection,
            served_from,
            spatial_borrow_from,
        })
    }

    async fn try_spatial_borrow(
        &self,
        location_id: &str,
        lat: f64,
        lon: f64,
        target: DateTime<Utc>,
    ) -> Option<FetchOutcome> {
        let neighbors = self.spatial_index.nearest(
            location_id,
            lat,
            lon,
            self.spatial_config.radius_km,
            self.spatial_config.k_nearest,
        );
        for (neighbor_id, _distance) in neighbors {
            let key = ForecastKey {
                location_id: neighbor_id.clone(),
                target_hour: floor_to_hour(target).timestamp(),
            };
            if let Some(collection) = self.l1.get(&key).await {
                return Some(rewrite_location(collection, location_id, &neighbor_id));
            }
            if let Some(collection) = self
                .l2
                .read_fresh::<ForecastCollection>(&neighbor_id, Utc::now())
                .await
                .unwrap_or(None)
            {
                return Some(rewrite_location(collection, location_id, &neighbor_id));
            }
        }
        None
    }

    async fn fetch_from_adapter(
        &self,
        location_id: &str,
        lat: f64,
        lon: f64,
        target: DateTime<Utc>,
    ) -> Result<ForecastCollection, WeatherFetchError> {
        let policy = BackoffPolicy::default();
        let adapter = Arc::clone(&self.adapter);
        let result = retry_with_backoff(
            policy,
            |_attempt| {
                let adapter = Arc::clone(&adapter);
                async move { adapter.fetch(location_id, lat, lon, target).await }
            },
            |err| {
                matches!(
                    err.kind,
                    WeatherFetchErrorKind::Timeout | WeatherFetchErrorKind::Network
                )
            },
        )
        .await;
        if result.is_ok() {
            self.stats.api_calls.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Best-effort cache warming: preload forecasts for popular
    /// locations. Failures are logged, never surfaced (spec §4.5).
    pub async fn warm_popular(&self, popular: &[(String, f64, f64)], target: DateTime<Utc>) {
        for (location_id, lat, lon) in popular {
            if let Err(err) = self.get_forecast(location_id, *lat, *lon, target).await {
                tracing::warn!(location_id, error = %err, "cache warming fetch failed");
            }
        }
    }
}

fn rewrite_location(
    mut collection: ForecastCollection,
    to_location_id: &str,
    from_location_id: &str,
) -> FetchOutcome {
    collection.location_id = to_location_id.to_string();
    for sample in &mut collection.samples {
        sample.location_id = to_location_id.to_string();
    }
    FetchOutcome {
        collection,
        served_from: ServedFrom::SpatialBorrow,
        spatial_borrow_from: Some(from_location_id.to_string()),
    }
}

//! Cached reverse-geocoding orchestration.
//!
//! [`AddressResolver`] turns raw WGS-84 coordinates into display addresses:
//! transform to GCJ-02, consult the shared cache, and only then go to the
//! network, singly or in parallel batches of up to [`BATCH_LIMIT`]. Every
//! failure mode degrades to the "unknown location" sentinel for the affected
//! slots only; nothing here ever returns an error to the caller.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::cache::{cache_key, AddressCache};
use crate::error::GeocodeError;
use crate::provider::{AmapProvider, RegeoRecord, ReverseGeocoder};
use crate::simplify::{join_components, simplify_formatted_address};
use crate::transform::wgs84_to_gcj02;
use crate::{GpsPoint, UNKNOWN_LOCATION};

/// Amap's documented per-request limit for batch reverse geocoding.
pub const BATCH_LIMIT: usize = 20;

/// Environment variable holding the Amap API key.
pub const API_KEY_ENV: &str = "AMAP_KEY";

/// An uncached coordinate awaiting network resolution, tied back to its
/// input slot.
struct Pending {
    index: usize,
    gcj_lng: f64,
    gcj_lat: f64,
    key: String,
}

/// Resolves coordinates to display addresses through a shared cache and a
/// reverse-geocoding provider.
pub struct AddressResolver {
    provider: Option<Arc<dyn ReverseGeocoder>>,
    cache: Arc<AddressCache>,
}

impl AddressResolver {
    /// Create a resolver backed by the Amap provider and the process-wide
    /// cache. An empty API key permanently disables network resolution:
    /// every lookup returns the sentinel without touching the network.
    pub fn new(api_key: &str) -> Self {
        let provider = match AmapProvider::new(api_key) {
            Ok(p) => Some(Arc::new(p) as Arc<dyn ReverseGeocoder>),
            Err(e) => {
                warn!("[AddressResolver] network resolution disabled: {}", e);
                None
            }
        };

        Self {
            provider,
            cache: AddressCache::shared(),
        }
    }

    /// Create a resolver reading the API key from the `AMAP_KEY` environment
    /// variable.
    pub fn from_env() -> Self {
        Self::new(&std::env::var(API_KEY_ENV).unwrap_or_default())
    }

    /// Create a resolver with an explicit provider and cache. This is the
    /// seam used by tests and by callers that manage their own cache
    /// lifecycle.
    pub fn with_provider(provider: Arc<dyn ReverseGeocoder>, cache: Arc<AddressCache>) -> Self {
        Self {
            provider: Some(provider),
            cache,
        }
    }

    /// Resolve one WGS-84 coordinate to a display address.
    ///
    /// Returns the cached value when the transformed coordinate has been
    /// seen before; otherwise issues a single reverse-geocoding request.
    /// Missing API key, invalid coordinates, provider errors, and transport
    /// failures all return the "unknown location" sentinel.
    pub async fn resolve_one(&self, longitude: f64, latitude: f64) -> String {
        let Some(provider) = &self.provider else {
            return UNKNOWN_LOCATION.to_string();
        };
        if !GpsPoint::new(latitude, longitude).is_valid() {
            warn!(
                "[AddressResolver] {}",
                GeocodeError::InvalidCoordinate {
                    longitude,
                    latitude
                }
            );
            return UNKNOWN_LOCATION.to_string();
        }

        let (gcj_lng, gcj_lat) = wgs84_to_gcj02(latitude, longitude);
        let key = cache_key(gcj_lng, gcj_lat);

        if let Some(address) = self.cache.get(&key) {
            return address;
        }

        match provider.regeo_single(gcj_lng, gcj_lat).await {
            Ok(record) => {
                let address = display_address(&record);
                self.cache.insert(key, address.clone());
                address
            }
            Err(e) => {
                warn!(
                    "[AddressResolver] reverse geocode failed for ({}, {}): {}",
                    longitude, latitude, e
                );
                UNKNOWN_LOCATION.to_string()
            }
        }
    }

    /// Resolve a slice of WGS-84 coordinates to display addresses.
    ///
    /// The output is order-preserving and always has exactly one entry per
    /// input. Invalid coordinates get the sentinel without a network call;
    /// cached coordinates are filled immediately; the rest are fetched in
    /// parallel batches of [`BATCH_LIMIT`]. A failed batch falls back to
    /// individual requests for its points, so partial success never
    /// disturbs other slots.
    pub async fn resolve_batch(&self, coordinates: &[GpsPoint]) -> Vec<String> {
        let mut results = vec![UNKNOWN_LOCATION.to_string(); coordinates.len()];
        if coordinates.is_empty() {
            return results;
        }
        let Some(provider) = &self.provider else {
            return results;
        };

        let mut pending: Vec<Pending> = Vec::new();
        for (index, point) in coordinates.iter().enumerate() {
            if !point.is_valid() {
                debug!(
                    "[AddressResolver] {}",
                    GeocodeError::InvalidCoordinate {
                        longitude: point.longitude,
                        latitude: point.latitude
                    }
                );
                continue;
            }

            let (gcj_lng, gcj_lat) = wgs84_to_gcj02(point.latitude, point.longitude);
            let key = cache_key(gcj_lng, gcj_lat);

            if let Some(address) = self.cache.get(&key) {
                results[index] = address;
            } else {
                pending.push(Pending {
                    index,
                    gcj_lng,
                    gcj_lat,
                    key,
                });
            }
        }

        if pending.is_empty() {
            return results;
        }

        debug!(
            "[AddressResolver] resolving {} uncached of {} coordinates",
            pending.len(),
            coordinates.len()
        );

        // Fan out one task per batch, fan in positionally.
        let mut batches: Vec<Vec<Pending>> = Vec::new();
        while !pending.is_empty() {
            let take = pending.len().min(BATCH_LIMIT);
            batches.push(pending.drain(..take).collect());
        }

        let tasks: Vec<_> = batches
            .into_iter()
            .map(|batch| {
                let provider = Arc::clone(provider);
                let cache = Arc::clone(&self.cache);
                tokio::spawn(async move { resolve_pending_batch(provider, cache, batch).await })
            })
            .collect();

        for task in tasks {
            match task.await {
                Ok(resolved) => {
                    for (index, address) in resolved {
                        results[index] = address;
                    }
                }
                Err(e) => {
                    // Slots of a crashed task keep the sentinel placeholder
                    warn!("[AddressResolver] batch task join error: {}", e);
                }
            }
        }

        results
    }
}

/// Resolve one batch of uncached coordinates, falling back to individual
/// requests when the batch call itself fails.
async fn resolve_pending_batch(
    provider: Arc<dyn ReverseGeocoder>,
    cache: Arc<AddressCache>,
    batch: Vec<Pending>,
) -> Vec<(usize, String)> {
    let locations: Vec<(f64, f64)> = batch.iter().map(|p| (p.gcj_lng, p.gcj_lat)).collect();

    match provider.regeo_batch(&locations).await {
        Ok(records) => {
            // Records map back to coordinates by position. Slots beyond the
            // returned records get the sentinel but stay out of the cache,
            // so a later lookup can retry them.
            let mut resolved = Vec::with_capacity(batch.len());
            for (i, p) in batch.into_iter().enumerate() {
                match records.get(i) {
                    Some(record) => {
                        let address = display_address(record);
                        cache.insert(p.key, address.clone());
                        resolved.push((p.index, address));
                    }
                    None => {
                        warn!(
                            "[AddressResolver] batch response missing record for {}",
                            p.key
                        );
                        resolved.push((p.index, UNKNOWN_LOCATION.to_string()));
                    }
                }
            }
            resolved
        }
        Err(e) => {
            info!(
                "[AddressResolver] batch of {} failed ({}), falling back to single requests",
                batch.len(),
                e
            );

            let mut resolved = Vec::with_capacity(batch.len());
            for p in batch {
                match provider.regeo_single(p.gcj_lng, p.gcj_lat).await {
                    Ok(record) => {
                        let address = display_address(&record);
                        cache.insert(p.key, address.clone());
                        resolved.push((p.index, address));
                    }
                    Err(e) => {
                        warn!(
                            "[AddressResolver] single fallback failed for {}: {}",
                            p.key, e
                        );
                        resolved.push((p.index, UNKNOWN_LOCATION.to_string()));
                    }
                }
            }
            resolved
        }
    }
}

/// Derive the display address for one record: first POI name, then the
/// simplified formatted address, then the joined administrative components.
fn display_address(record: &RegeoRecord) -> String {
    if let Some(poi) = record.pois.first() {
        if !poi.name.is_empty() {
            return poi.name.clone();
        }
    }

    if let Some(formatted) = &record.formatted_address {
        return simplify_formatted_address(formatted, record.address_component.as_ref());
    }

    if let Some(component) = &record.address_component {
        let joined = join_components(&[
            &component.city,
            &component.district,
            &component.township,
            &component.street,
        ]);
        if !joined.is_empty() {
            return joined;
        }
    }

    UNKNOWN_LOCATION.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeocodeError;
    use crate::provider::{AddressComponent, Poi};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-process provider double. Labels each coordinate with a POI name
    /// derived from its longitude so positional mapping is observable.
    struct MockProvider {
        single_calls: AtomicUsize,
        batch_calls: AtomicUsize,
        /// Fail any batch containing a longitude at or above this value
        fail_batch_above_lng: Option<f64>,
        fail_single: bool,
        /// Drop this many records from the tail of every batch response
        truncate_batch_by: usize,
    }

    impl MockProvider {
        fn new() -> Self {
            Self {
                single_calls: AtomicUsize::new(0),
                batch_calls: AtomicUsize::new(0),
                fail_batch_above_lng: None,
                fail_single: false,
                truncate_batch_by: 0,
            }
        }

        fn record_for(lng: f64) -> RegeoRecord {
            RegeoRecord {
                pois: vec![Poi {
                    name: format!("POI@{:.6}", lng),
                }],
                ..RegeoRecord::default()
            }
        }
    }

    #[async_trait]
    impl ReverseGeocoder for MockProvider {
        async fn regeo_single(&self, gcj_lng: f64, _gcj_lat: f64) -> crate::Result<RegeoRecord> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_single {
                return Err(GeocodeError::Provider {
                    info: "ENGINE_RESPONSE_DATA_ERROR".to_string(),
                });
            }
            Ok(Self::record_for(gcj_lng))
        }

        async fn regeo_batch(
            &self,
            locations: &[(f64, f64)],
        ) -> crate::Result<Vec<RegeoRecord>> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(threshold) = self.fail_batch_above_lng {
                if locations.iter().any(|(lng, _)| *lng >= threshold) {
                    return Err(GeocodeError::Provider {
                        info: "CUQPS_HAS_EXCEEDED_THE_LIMIT".to_string(),
                    });
                }
            }
            let mut records: Vec<RegeoRecord> = locations
                .iter()
                .map(|(lng, _)| Self::record_for(*lng))
                .collect();
            records.truncate(locations.len().saturating_sub(self.truncate_batch_by));
            Ok(records)
        }
    }

    fn resolver_with(mock: MockProvider) -> (AddressResolver, Arc<MockProvider>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let provider = Arc::new(mock);
        let resolver = AddressResolver::with_provider(
            Arc::clone(&provider) as Arc<dyn ReverseGeocoder>,
            Arc::new(AddressCache::new()),
        );
        (resolver, provider)
    }

    /// Out-of-China points so the transform is the identity and cache keys
    /// are predictable.
    fn west_points(n: usize) -> Vec<GpsPoint> {
        (0..n)
            .map(|i| GpsPoint::new(51.5, -10.0 - i as f64 * 0.01))
            .collect()
    }

    #[tokio::test]
    async fn test_missing_key_resolves_to_sentinel() {
        let resolver = AddressResolver::new("");
        assert_eq!(resolver.resolve_one(-0.1278, 51.5074).await, UNKNOWN_LOCATION);

        let results = resolver.resolve_batch(&west_points(3)).await;
        assert_eq!(results, vec![UNKNOWN_LOCATION; 3]);
    }

    #[tokio::test]
    async fn test_invalid_coordinate_skips_network() {
        let (resolver, provider) = resolver_with(MockProvider::new());

        assert_eq!(resolver.resolve_one(f64::NAN, 51.5).await, UNKNOWN_LOCATION);
        assert_eq!(
            resolver.resolve_one(-10.0, f64::INFINITY).await,
            UNKNOWN_LOCATION
        );
        // Out of range fails GpsPoint validation too
        assert_eq!(resolver.resolve_one(181.0, 51.5).await, UNKNOWN_LOCATION);
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_idempotence() {
        let (resolver, provider) = resolver_with(MockProvider::new());

        let first = resolver.resolve_one(-10.0, 51.5).await;
        let second = resolver.resolve_one(-10.0, 51.5).await;

        assert_eq!(first, "POI@-10.000000");
        assert_eq!(first, second);
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_failure_degrades() {
        let mock = MockProvider {
            fail_single: true,
            ..MockProvider::new()
        };
        let (resolver, provider) = resolver_with(mock);

        assert_eq!(resolver.resolve_one(-10.0, 51.5).await, UNKNOWN_LOCATION);
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_slot_invariant() {
        let (resolver, _provider) = resolver_with(MockProvider::new());

        let mut points = west_points(5);
        points.insert(2, GpsPoint::new(f64::NAN, -10.0)); // invalid slot
        points.push(points[0]); // duplicate of slot 0

        let results = resolver.resolve_batch(&points).await;
        assert_eq!(results.len(), points.len());
        assert!(results.iter().all(|r| !r.is_empty()));
        assert_eq!(results[2], UNKNOWN_LOCATION);
        assert_eq!(results[0], "POI@-10.000000");
        assert_eq!(results[results.len() - 1], results[0]);
    }

    #[tokio::test]
    async fn test_batch_order_preserved() {
        let (resolver, provider) = resolver_with(MockProvider::new());

        let points = west_points(25); // spans two batches
        let results = resolver.resolve_batch(&points).await;

        assert_eq!(results.len(), 25);
        for (i, point) in points.iter().enumerate() {
            assert_eq!(results[i], format!("POI@{:.6}", point.longitude));
        }
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 2);
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_uses_cache() {
        let (resolver, provider) = resolver_with(MockProvider::new());

        let points = west_points(10);
        resolver.resolve_batch(&points).await;
        let results = resolver.resolve_batch(&points).await;

        assert_eq!(results.len(), 10);
        assert_eq!(results[3], format!("POI@{:.6}", points[3].longitude));
        // Second pass is fully cached
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_batch_falls_back_to_singles() {
        // 40 points in two sub-batches; the first sub-batch (longitudes at
        // or above -10.1) fails at the batch endpoint.
        let mock = MockProvider {
            fail_batch_above_lng: Some(-10.1),
            ..MockProvider::new()
        };
        let (resolver, provider) = resolver_with(mock);

        let points = west_points(40);
        let results = resolver.resolve_batch(&points).await;

        assert_eq!(results.len(), 40);
        assert!(results.iter().all(|r| !r.is_empty()));
        // Every slot resolved: the failed sub-batch went through the
        // single-request fallback
        for (i, point) in points.iter().enumerate() {
            assert_eq!(results[i], format!("POI@{:.6}", point.longitude));
        }
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 2);
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn test_short_batch_response_leaves_slot_retryable() {
        // Provider answers only N-1 of N coordinates. The unanswered slot
        // gets the sentinel but must not be cached, so a later single
        // lookup still goes to the network and resolves it.
        let mock = MockProvider {
            truncate_batch_by: 1,
            ..MockProvider::new()
        };
        let (resolver, provider) = resolver_with(mock);

        let points = west_points(5);
        let results = resolver.resolve_batch(&points).await;

        assert_eq!(results.len(), 5);
        assert_eq!(results[3], format!("POI@{:.6}", points[3].longitude));
        assert_eq!(results[4], UNKNOWN_LOCATION);

        let last = points[4];
        let retried = resolver.resolve_one(last.longitude, last.latitude).await;
        assert_eq!(retried, format!("POI@{:.6}", last.longitude));
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_batch_and_singles_degrade_to_sentinel() {
        let mock = MockProvider {
            fail_batch_above_lng: Some(-1000.0), // every batch fails
            fail_single: true,
            ..MockProvider::new()
        };
        let (resolver, _provider) = resolver_with(mock);

        let results = resolver.resolve_batch(&west_points(7)).await;
        assert_eq!(results, vec![UNKNOWN_LOCATION; 7]);
    }

    #[test]
    fn test_display_address_preference() {
        // POI wins
        let record = RegeoRecord {
            formatted_address: Some("广东省深圳市南山区科技园路10号".to_string()),
            pois: vec![Poi {
                name: "腾讯大厦".to_string(),
            }],
            ..RegeoRecord::default()
        };
        assert_eq!(display_address(&record), "腾讯大厦");

        // Formatted address next
        let record = RegeoRecord {
            formatted_address: Some("广东省深圳市南山区科技园路10号腾讯大厦".to_string()),
            ..RegeoRecord::default()
        };
        assert_eq!(display_address(&record), "腾讯大厦");

        // Components last
        let record = RegeoRecord {
            address_component: Some(AddressComponent {
                city: "深圳市".to_string(),
                district: "南山区".to_string(),
                township: "粤海街道".to_string(),
                street: "[]".to_string(),
                ..AddressComponent::default()
            }),
            ..RegeoRecord::default()
        };
        assert_eq!(display_address(&record), "深圳市南山区粤海街道");

        // Nothing at all
        assert_eq!(display_address(&RegeoRecord::default()), UNKNOWN_LOCATION);
    }
}

//! Trip title generation.
//!
//! A trip title is `"{start} → {end}"` built from the two endpoint
//! addresses. The async variant enhances both endpoints through the address
//! resolver (network + cache); the sync variant only simplifies the
//! plain-text addresses the database already holds. When neither endpoint
//! resolves, the whole title collapses to the "unknown trip" sentinel.

use log::debug;

use crate::geocoder::AddressResolver;
use crate::simplify::simplify_plain_address;
use crate::{UNKNOWN_LOCATION, UNKNOWN_TRIP};

/// Resolve the best display address for one trip endpoint.
///
/// Prefers coordinate-based resolution when both coordinates are present;
/// falls back to simplifying the database address when coordinates are
/// absent or resolution comes back with the sentinel.
pub async fn enhanced_address(
    resolver: &AddressResolver,
    db_address: Option<&str>,
    longitude: Option<f64>,
    latitude: Option<f64>,
) -> String {
    if let (Some(lng), Some(lat)) = (longitude, latitude) {
        let resolved = resolver.resolve_one(lng, lat).await;
        if resolved != UNKNOWN_LOCATION {
            return resolved;
        }
        debug!(
            "[title] coordinate resolution fell through for ({}, {}), using database address",
            lng, lat
        );
    }

    simplify_plain_address(db_address)
}

/// Generate a trip title with network-enhanced endpoint addresses.
///
/// Both endpoints are resolved concurrently. Returns the "unknown trip"
/// sentinel only when both ends resolve to "unknown location".
#[allow(clippy::too_many_arguments)]
pub async fn generate_trip_title(
    resolver: &AddressResolver,
    start_address: Option<&str>,
    end_address: Option<&str>,
    start_lng: Option<f64>,
    start_lat: Option<f64>,
    end_lng: Option<f64>,
    end_lat: Option<f64>,
) -> String {
    let (start, end) = futures::join!(
        enhanced_address(resolver, start_address, start_lng, start_lat),
        enhanced_address(resolver, end_address, end_lng, end_lat),
    );

    if start == UNKNOWN_LOCATION && end == UNKNOWN_LOCATION {
        return UNKNOWN_TRIP.to_string();
    }

    format!("{} → {}", start, end)
}

/// Generate a trip title from plain-text addresses only, for contexts where
/// network enhancement is unavailable. Side-effect free.
pub fn generate_trip_title_sync(
    start_address: Option<&str>,
    end_address: Option<&str>,
) -> String {
    let start = simplify_plain_address(start_address);
    let end = simplify_plain_address(end_address);

    if start == UNKNOWN_LOCATION && end == UNKNOWN_LOCATION {
        return UNKNOWN_TRIP.to_string();
    }

    format!("{} → {}", start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::AddressCache;
    use crate::provider::{Poi, RegeoRecord, ReverseGeocoder};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NamedProvider;

    #[async_trait]
    impl ReverseGeocoder for NamedProvider {
        async fn regeo_single(&self, gcj_lng: f64, _gcj_lat: f64) -> crate::Result<RegeoRecord> {
            Ok(RegeoRecord {
                pois: vec![Poi {
                    name: format!("地点{:.2}", gcj_lng),
                }],
                ..RegeoRecord::default()
            })
        }

        async fn regeo_batch(
            &self,
            locations: &[(f64, f64)],
        ) -> crate::Result<Vec<RegeoRecord>> {
            let mut records = Vec::with_capacity(locations.len());
            for (lng, lat) in locations {
                records.push(self.regeo_single(*lng, *lat).await?);
            }
            Ok(records)
        }
    }

    fn named_resolver() -> AddressResolver {
        AddressResolver::with_provider(Arc::new(NamedProvider), Arc::new(AddressCache::new()))
    }

    #[test]
    fn test_sync_sentinel() {
        assert_eq!(generate_trip_title_sync(None, None), UNKNOWN_TRIP);
        assert_eq!(generate_trip_title_sync(Some(""), Some("")), UNKNOWN_TRIP);
    }

    #[test]
    fn test_sync_title() {
        let title = generate_trip_title_sync(
            Some("上海市浦东新区世纪大道1号"),
            Some("上海市徐汇区漕溪路100号"),
        );
        assert!(title.contains(" → "));
        assert_ne!(title, UNKNOWN_TRIP);
        let (start, end) = title.split_once(" → ").unwrap();
        assert!(!start.is_empty());
        assert!(!end.is_empty());
    }

    #[test]
    fn test_sync_one_side_known() {
        let title = generate_trip_title_sync(Some("上海市浦东新区"), None);
        assert_eq!(title, format!("浦东新 → {}", UNKNOWN_LOCATION));
    }

    #[tokio::test]
    async fn test_async_title_uses_resolver() {
        let resolver = named_resolver();
        let title = generate_trip_title(
            &resolver,
            Some("上海市浦东新区"),
            Some("上海市徐汇区"),
            Some(-10.0),
            Some(51.5),
            Some(-20.0),
            Some(51.5),
        )
        .await;
        assert_eq!(title, "地点-10.00 → 地点-20.00");
    }

    #[tokio::test]
    async fn test_async_falls_back_to_database_address() {
        // No coordinates: only the plain-text path is available
        let resolver = named_resolver();
        let title = generate_trip_title(
            &resolver,
            Some("上海市浦东新区"),
            Some("北京市朝阳区"),
            None,
            None,
            None,
            None,
        )
        .await;
        assert_eq!(title, "浦东新 → 朝阳");
    }

    #[tokio::test]
    async fn test_async_sentinel_when_everything_unknown() {
        let resolver = AddressResolver::new(""); // no provider
        let title =
            generate_trip_title(&resolver, None, None, Some(-10.0), Some(51.5), None, None)
                .await;
        assert_eq!(title, UNKNOWN_TRIP);
    }

    #[tokio::test]
    async fn test_enhanced_address_prefers_resolution() {
        let resolver = named_resolver();
        let address =
            enhanced_address(&resolver, Some("上海市浦东新区"), Some(-10.0), Some(51.5)).await;
        assert_eq!(address, "地点-10.00");

        // Missing longitude forces the database fallback
        let address = enhanced_address(&resolver, Some("上海市浦东新区"), None, Some(51.5)).await;
        assert_eq!(address, "浦东新");
    }
}

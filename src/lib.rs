//! # Trip Geocoder
//!
//! Reverse-geocoding core for a vehicle-trip dashboard. The surrounding
//! application hands this library raw WGS-84 coordinates and plain-text
//! addresses from the trip database; it hands back short display addresses
//! and trip titles.
//!
//! This library provides:
//! - WGS-84 → GCJ-02 coordinate transform (China datum offset correction)
//! - Address simplification with POI extraction for Chinese formatted addresses
//! - Cached single/batch reverse geocoding against the Amap API with
//!   per-slot graceful degradation
//! - Trip title generation (`"{start} → {end}"`), network-enhanced or plain
//!
//! Failures never surface to callers as errors: geocoding is an enrichment,
//! so every failure path yields the "unknown location" sentinel and the
//! caller renders it like any other label.
//!
//! ## Quick Start
//!
//! ```rust
//! use trip_geocoder::{generate_trip_title_sync, wgs84_to_gcj02};
//!
//! // Transform a coordinate for a GCJ-02 map widget
//! let (lng, lat) = wgs84_to_gcj02(31.2304, 121.4737); // Shanghai
//! assert_ne!((lng, lat), (121.4737, 31.2304));
//!
//! // Build a trip title without network access
//! let title = generate_trip_title_sync(
//!     Some("上海市浦东新区世纪大道1号"),
//!     Some("上海市徐汇区漕溪路100号"),
//! );
//! assert!(title.contains(" → "));
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{GeocodeError, Result};

// WGS-84 -> GCJ-02 datum transform
pub mod transform;
pub use transform::{batch_wgs84_to_gcj02, is_in_china, wgs84_to_gcj02};

// Address simplification and POI extraction
pub mod simplify;
pub use simplify::{simplify_formatted_address, simplify_plain_address};

// Process-wide display-address cache
pub mod cache;
pub use cache::{cache_key, AddressCache};

// Reverse-geocoding provider interface (Amap implementation)
pub mod provider;
pub use provider::{AddressComponent, AmapProvider, Poi, RegeoRecord, ReverseGeocoder};

// Cached single/batch resolution orchestration
pub mod geocoder;
pub use geocoder::{AddressResolver, BATCH_LIMIT};

// Trip title generation
pub mod title;
pub use title::{enhanced_address, generate_trip_title, generate_trip_title_sync};

/// Sentinel display address for coordinates that could not be resolved.
/// Rendered as a normal label, never treated as an error.
pub const UNKNOWN_LOCATION: &str = "未知位置";

/// Sentinel trip title used when both endpoints are unknown.
pub const UNKNOWN_TRIP: &str = "未知行程";

/// A GPS coordinate with latitude and longitude in decimal degrees.
///
/// The datum is contextual: coordinates from the trip database are WGS-84;
/// coordinates produced by [`wgs84_to_gcj02`] are GCJ-02. Immutable value
/// type, only ever transformed into a new pair.
///
/// # Example
/// ```
/// use trip_geocoder::GpsPoint;
/// let point = GpsPoint::new(31.2304, 121.4737); // Shanghai
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

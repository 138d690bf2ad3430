//! WGS-84 to GCJ-02 coordinate transform.
//!
//! GCJ-02 ("Mars coordinates") is the obfuscated datum required by Chinese
//! mapping providers. The offset is a fixed empirical formula, non-zero only
//! within mainland China's bounding envelope; outside it the transform is the
//! identity.
//!
//! The arithmetic here intentionally mirrors the published offset formula
//! term by term. Do not reorder operations: consumers compare cache keys
//! derived from these outputs, so the exact IEEE-754 rounding matters.

use crate::GpsPoint;

const PI: f64 = 3.14159265358979324;
/// Semi-major axis of the GCJ-02 reference ellipsoid (meters).
const A: f64 = 6378245.0;
/// First eccentricity squared.
const EE: f64 = 0.00669342162296594323;

/// Check whether a WGS-84 point falls inside mainland China's bounding
/// envelope, the region where the GCJ-02 offset applies.
pub fn is_in_china(lat: f64, lon: f64) -> bool {
    lat >= 0.8293 && lat <= 55.8271 && lon >= 72.004 && lon <= 137.8347
}

fn transform_lat(x: f64, y: f64) -> f64 {
    let mut ret =
        -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn transform_lon(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}

/// Convert a WGS-84 coordinate to GCJ-02.
///
/// Takes `(latitude, longitude)` and returns `(longitude, latitude)`, the
/// element order expected by map widgets. Points outside mainland China are
/// returned unchanged.
///
/// Pure and deterministic; never fails. Non-finite inputs propagate NaN.
///
/// # Example
/// ```
/// use trip_geocoder::wgs84_to_gcj02;
///
/// // London is outside the envelope: identity
/// let (lng, lat) = wgs84_to_gcj02(51.5074, -0.1278);
/// assert_eq!((lng, lat), (-0.1278, 51.5074));
/// ```
pub fn wgs84_to_gcj02(lat: f64, lon: f64) -> (f64, f64) {
    if !is_in_china(lat, lon) {
        return (lon, lat);
    }

    let mut d_lat = transform_lat(lon - 105.0, lat - 35.0);
    let mut d_lon = transform_lon(lon - 105.0, lat - 35.0);
    let rad_lat = lat / 180.0 * PI;
    let mut magic = rad_lat.sin();
    magic = 1.0 - EE * magic * magic;
    let sqrt_magic = magic.sqrt();
    d_lat = (d_lat * 180.0) / ((A * (1.0 - EE)) / (magic * sqrt_magic) * PI);
    d_lon = (d_lon * 180.0) / (A / sqrt_magic * rad_lat.cos() * PI);

    (lon + d_lon, lat + d_lat)
}

/// Convert a slice of WGS-84 points to GCJ-02, preserving order.
///
/// Used for plotting whole tracks (e.g. the footprint map) in one pass.
pub fn batch_wgs84_to_gcj02(points: &[GpsPoint]) -> Vec<GpsPoint> {
    points
        .iter()
        .map(|p| {
            let (lng, lat) = wgs84_to_gcj02(p.latitude, p.longitude);
            GpsPoint::new(lat, lng)
        })
        .collect()
}

//! Unified error handling for the trip-geocoder library.
//!
//! Errors only flow through the internal provider plumbing. The public
//! resolver surface absorbs every failure into the "unknown location"
//! sentinel, because an address label is an enrichment, not a correctness
//! requirement.

use thiserror::Error;

/// Unified error type for geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// No API key configured; network resolution is permanently disabled
    #[error("geocoding API key is missing")]
    MissingApiKey,

    /// Coordinate is not a finite number pair
    #[error("invalid coordinate ({longitude}, {latitude})")]
    InvalidCoordinate { longitude: f64, latitude: f64 },

    /// Provider replied with a non-success status code
    #[error("provider returned error: {info}")]
    Provider { info: String },

    /// HTTP transport or body-decoding failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response arrived but its shape did not match expectations
    #[error("failed to decode provider response: {message}")]
    Decode { message: String },
}

/// Result type alias for geocoding operations.
pub type Result<T> = std::result::Result<T, GeocodeError>;

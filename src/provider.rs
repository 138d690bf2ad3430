//! Reverse-geocoding provider interface and the Amap (高德) implementation.
//!
//! The provider speaks GCJ-02 only; callers transform coordinates before
//! handing them over. Responses are decoded defensively: Amap emits the
//! literal JSON array `[]` for absent string fields, so every address field
//! goes through a tolerant deserializer instead of trusting the shape.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Deserializer};

use crate::error::{GeocodeError, Result};

const AMAP_REGEO_URL: &str = "https://restapi.amap.com/v3/geocode/regeo";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "trip-geocoder/0.1";

/// Decode a field that is either a string or Amap's `[]` placeholder.
fn de_amap_field<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        _ => String::new(),
    })
}

/// Like [`de_amap_field`], but absent/placeholder values become `None`.
fn de_opt_amap_field<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

/// Structured administrative components of a reverse-geocoded address.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressComponent {
    #[serde(default, deserialize_with = "de_amap_field")]
    pub country: String,
    #[serde(default, deserialize_with = "de_amap_field")]
    pub province: String,
    #[serde(default, deserialize_with = "de_amap_field")]
    pub city: String,
    #[serde(default, deserialize_with = "de_amap_field")]
    pub district: String,
    #[serde(default, deserialize_with = "de_amap_field")]
    pub township: String,
    #[serde(default, deserialize_with = "de_amap_field")]
    pub street: String,
    #[serde(
        default,
        rename = "streetNumber",
        deserialize_with = "de_amap_field"
    )]
    pub street_number: String,
}

/// A named point of interest near the queried coordinate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Poi {
    #[serde(default, deserialize_with = "de_amap_field")]
    pub name: String,
}

/// One reverse-geocoding record: the provider's best description of a single
/// coordinate. POIs are ordered by relevance, most relevant first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegeoRecord {
    #[serde(default, deserialize_with = "de_opt_amap_field")]
    pub formatted_address: Option<String>,
    #[serde(default, rename = "addressComponent")]
    pub address_component: Option<AddressComponent>,
    #[serde(default)]
    pub pois: Vec<Poi>,
}

/// Raw Amap response envelope. `regeocode` is set for single queries,
/// `regeocodes` for batch queries.
#[derive(Debug, Deserialize)]
struct AmapResponse {
    status: String,
    #[serde(default)]
    info: String,
    #[serde(default)]
    regeocode: Option<RegeoRecord>,
    #[serde(default)]
    regeocodes: Option<Vec<RegeoRecord>>,
}

/// Reverse-geocoding backend. Implemented by [`AmapProvider`] for production
/// and by in-process doubles in tests.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Resolve one GCJ-02 coordinate to a record.
    async fn regeo_single(&self, gcj_lng: f64, gcj_lat: f64) -> Result<RegeoRecord>;

    /// Resolve a batch of GCJ-02 coordinates. The response order must equal
    /// the request order.
    async fn regeo_batch(&self, locations: &[(f64, f64)]) -> Result<Vec<RegeoRecord>>;
}

/// Amap HTTP client with a pooled connection and request timeout.
pub struct AmapProvider {
    client: Client,
    api_key: String,
}

impl AmapProvider {
    /// Create a provider with the given API key.
    ///
    /// An empty key is a configuration absence, reported as
    /// [`GeocodeError::MissingApiKey`] so callers can disable network
    /// resolution up front.
    pub fn new(api_key: &str) -> Result<Self> {
        if api_key.is_empty() {
            return Err(GeocodeError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
        })
    }

    async fn request(&self, location: &str, batch: bool) -> Result<AmapResponse> {
        debug!(
            "[AmapProvider] regeo request (batch={}): {}",
            batch, location
        );

        let response = self
            .client
            .get(AMAP_REGEO_URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("location", location),
                ("radius", "1000"),
                ("extensions", "all"),
                ("batch", if batch { "true" } else { "false" }),
                ("roadlevel", "1"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let data: AmapResponse = response.json().await?;

        // Amap signals success with the string "1"
        if data.status != "1" {
            return Err(GeocodeError::Provider { info: data.info });
        }

        Ok(data)
    }
}

#[async_trait]
impl ReverseGeocoder for AmapProvider {
    async fn regeo_single(&self, gcj_lng: f64, gcj_lat: f64) -> Result<RegeoRecord> {
        let location = format!("{},{}", gcj_lng, gcj_lat);
        let data = self.request(&location, false).await?;

        data.regeocode.ok_or_else(|| GeocodeError::Decode {
            message: "missing regeocode in single response".to_string(),
        })
    }

    async fn regeo_batch(&self, locations: &[(f64, f64)]) -> Result<Vec<RegeoRecord>> {
        let location = locations
            .iter()
            .map(|(lng, lat)| format!("{},{}", lng, lat))
            .collect::<Vec<_>>()
            .join("|");
        let data = self.request(&location, true).await?;

        let records = data.regeocodes.ok_or_else(|| GeocodeError::Decode {
            message: "missing regeocodes in batch response".to_string(),
        })?;

        debug!(
            "[AmapProvider] batch response: {} records for {} locations",
            records.len(),
            locations.len()
        );

        Ok(records)
    }
}

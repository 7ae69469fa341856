use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Flattened latest water-temperature reading for one USGS station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StationReading {
    pub site_code: String,
    pub site_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Observation timestamp exactly as USGS reported it.
    pub date_time: String,
    pub stream_name: String,
}

// NWIS instantaneous-values payload. Every nested field is optional so a
// single malformed station never fails the batch.

#[derive(Debug, Clone, Deserialize)]
pub struct NwisTimeSeries {
    #[serde(rename = "sourceInfo", default)]
    pub source_info: Option<NwisSourceInfo>,
    #[serde(default)]
    pub values: Option<Vec<NwisValueBlock>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NwisSourceInfo {
    #[serde(rename = "siteName", default)]
    pub site_name: Option<String>,
    #[serde(rename = "siteCode", default)]
    pub site_code: Option<Vec<NwisSiteCode>>,
    #[serde(rename = "geoLocation", default)]
    pub geo_location: Option<NwisGeoLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NwisSiteCode {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NwisGeoLocation {
    #[serde(rename = "geogLocation", default)]
    pub geog_location: Option<NwisGeogLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NwisGeogLocation {
    #[serde(default)]
    pub latitude: Option<Numeric>,
    #[serde(default)]
    pub longitude: Option<Numeric>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NwisValueBlock {
    #[serde(default)]
    pub value: Option<Vec<NwisObservation>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NwisObservation {
    #[serde(default)]
    pub value: Option<Numeric>,
    #[serde(rename = "dateTime", default)]
    pub date_time: Option<String>,
}

/// NWIS sends numbers as strings; some mirrors send bare numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Numeric::Number(n) => Some(*n).filter(|n| n.is_finite()),
            Numeric::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    pub fn raw(&self) -> String {
        match self {
            Numeric::Number(n) => n.to_string(),
            Numeric::Text(s) => s.clone(),
        }
    }
}

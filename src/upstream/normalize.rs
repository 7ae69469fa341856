//! Flattens the nested USGS NWIS payload into [`StationReading`]s.
//!
//! Best effort: a station that can't be read is skipped and the reason is
//! recorded in [`Normalized::skipped`] instead of failing the whole list.

use super::types::{NwisTimeSeries, StationReading};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoObservations,
    NonNumericValue(String),
    MissingField(&'static str),
    Malformed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoObservations => write!(f, "no observations"),
            SkipReason::NonNumericValue(raw) => write!(f, "non-numeric value {:?}", raw),
            SkipReason::MissingField(field) => write!(f, "missing {}", field),
            SkipReason::Malformed(err) => write!(f, "malformed time series: {}", err),
        }
    }
}

#[derive(Debug, Default)]
pub struct Normalized {
    pub readings: Vec<StationReading>,
    /// (index in `value.timeSeries`, reason) for every dropped station.
    pub skipped: Vec<(usize, SkipReason)>,
}

pub fn normalize_stations(payload: &Value) -> Normalized {
    let series = payload
        .get("value")
        .and_then(|v| v.get("timeSeries"))
        .and_then(Value::as_array);

    let mut normalized = Normalized::default();
    let Some(series) = series else {
        return normalized;
    };

    for (index, element) in series.iter().enumerate() {
        match normalize_one(element) {
            Ok(reading) => normalized.readings.push(reading),
            Err(reason) => {
                tracing::debug!("Skipping USGS time series {}: {}", index, reason);
                normalized.skipped.push((index, reason));
            }
        }
    }

    normalized
}

fn normalize_one(element: &Value) -> Result<StationReading, SkipReason> {
    let series = NwisTimeSeries::deserialize_lenient(element)?;

    let observations = series
        .values
        .as_ref()
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.value.as_ref())
        .filter(|obs| !obs.is_empty())
        .ok_or(SkipReason::NoObservations)?;

    // USGS returns observations oldest first; the last one is the latest
    let latest = observations.last().ok_or(SkipReason::NoObservations)?;

    let raw_value = latest
        .value
        .as_ref()
        .ok_or(SkipReason::MissingField("value"))?;
    let temperature = raw_value
        .as_f64()
        .ok_or_else(|| SkipReason::NonNumericValue(raw_value.raw()))?;

    let site = series
        .source_info
        .as_ref()
        .ok_or(SkipReason::MissingField("sourceInfo"))?;

    let site_code = site
        .site_code
        .as_ref()
        .and_then(|codes| codes.first())
        .and_then(|code| code.value.clone())
        .ok_or(SkipReason::MissingField("siteCode"))?;

    let site_name = site
        .site_name
        .clone()
        .ok_or(SkipReason::MissingField("siteName"))?;

    let geo = site
        .geo_location
        .as_ref()
        .and_then(|g| g.geog_location.as_ref())
        .ok_or(SkipReason::MissingField("geoLocation"))?;

    let latitude = geo
        .latitude
        .as_ref()
        .and_then(|n| n.as_f64())
        .ok_or(SkipReason::MissingField("latitude"))?;
    let longitude = geo
        .longitude
        .as_ref()
        .and_then(|n| n.as_f64())
        .ok_or(SkipReason::MissingField("longitude"))?;

    let date_time = latest
        .date_time
        .clone()
        .ok_or(SkipReason::MissingField("dateTime"))?;

    Ok(StationReading {
        site_code,
        stream_name: site_name.clone(),
        site_name,
        latitude,
        longitude,
        temperature,
        date_time,
    })
}

impl NwisTimeSeries {
    fn deserialize_lenient(element: &Value) -> Result<Self, SkipReason> {
        NwisTimeSeries::deserialize(element).map_err(|e| SkipReason::Malformed(e.to_string()))
    }
}

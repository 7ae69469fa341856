use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub cache_ttl_secs: u64,
    pub http_timeout_secs: u64,
    pub wdfw_base_url: String,
    pub usgs_base_url: String,
    pub wsdot_base_url: String,
    pub noaa_base_url: String,
    pub resend_base_url: String,
    pub returns_snapshot_path: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3010".to_string()),
            cache_ttl_secs: parse_secs("CACHE_TTL_SECS", 900)?,
            http_timeout_secs: parse_secs("HTTP_TIMEOUT_SECS", 30)?,
            wdfw_base_url: env::var("WDFW_BASE_URL")
                .unwrap_or_else(|_| "https://data.wa.gov".to_string()),
            usgs_base_url: env::var("USGS_BASE_URL")
                .unwrap_or_else(|_| "https://waterservices.usgs.gov".to_string()),
            wsdot_base_url: env::var("WSDOT_BASE_URL")
                .unwrap_or_else(|_| "https://data.wsdot.wa.gov".to_string()),
            noaa_base_url: env::var("NOAA_BASE_URL")
                .unwrap_or_else(|_| "https://www.fisheries.noaa.gov".to_string()),
            resend_base_url: env::var("RESEND_BASE_URL")
                .unwrap_or_else(|_| "https://api.resend.com".to_string()),
            returns_snapshot_path: env::var("RETURNS_SNAPSHOT_PATH")
                .unwrap_or_else(|_| "data/salmon-returns.json".to_string()),
        })
    }

    /// Every upstream pointed at one base URL. Used by tests that stand up a single mock server.
    #[cfg(test)]
    pub fn for_base_url(base: &str) -> Self {
        Config {
            bind_addr: "127.0.0.1:0".to_string(),
            cache_ttl_secs: 900,
            http_timeout_secs: 5,
            wdfw_base_url: base.to_string(),
            usgs_base_url: base.to_string(),
            wsdot_base_url: base.to_string(),
            noaa_base_url: base.to_string(),
            resend_base_url: base.to_string(),
            returns_snapshot_path: "data/salmon-returns.json".to_string(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_secs(var: &str, default: u64) -> anyhow::Result<u64> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds, got {:?}", var, raw)),
        Err(_) => Ok(default),
    }
}

pub mod refresh;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot JSON invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Escapement page at offset {offset} was not a JSON array")]
    UnexpectedPage { offset: usize },
    #[error(transparent)]
    Upstream(#[from] crate::upstream::UpstreamError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn for_year(year: i32) -> Self {
        if year >= 2020 {
            Confidence::High
        } else if year >= 2015 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// One population's estimated return for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalmonReturn {
    pub id: String,
    pub watershed_id: String,
    pub species_id: String,
    pub year: i32,
    pub count_estimate: u64,
    pub method: String,
    pub source: String,
    pub confidence: Confidence,
}

/// Pre-processed escapement records written by `refresh-returns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnsSnapshot {
    pub fetched_at: chrono::DateTime<chrono::Utc>,
    pub source: String,
    pub record_count: usize,
    pub returns: Vec<SalmonReturn>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReturnsQuery {
    /// Watershed id, or `all`.
    pub watershed_id: Option<String>,
    /// Species id, or `all`.
    pub species_id: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

impl ReturnsSnapshot {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let raw = std::fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn filter(&self, query: &ReturnsQuery) -> Vec<SalmonReturn> {
        fn selected(filter: &Option<String>, value: &str) -> bool {
            match filter.as_deref() {
                None | Some("all") => true,
                Some(wanted) => wanted == value,
            }
        }

        self.returns
            .iter()
            .filter(|r| selected(&query.watershed_id, &r.watershed_id))
            .filter(|r| selected(&query.species_id, &r.species_id))
            .filter(|r| query.start_year.map_or(true, |y| r.year >= y))
            .filter(|r| query.end_year.map_or(true, |y| r.year <= y))
            .cloned()
            .collect()
    }
}

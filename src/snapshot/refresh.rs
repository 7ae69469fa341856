//! Offline rebuild of the salmon-returns snapshot from the WDFW escapement
//! dataset. Run through `salmon-health-server refresh-returns`.

use super::{Confidence, ReturnsSnapshot, SalmonReturn, SnapshotError};
use crate::catalog::{species_by_common_name, watershed_by_slug};
use crate::upstream::UpstreamClient;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

pub const PAGE_SIZE: usize = 5000;

const DATASET_PATH: &str = "/resource/fgyz-n3uk.json";
const SNAPSHOT_SOURCE: &str = "WDFW SPI Escapement - data.wa.gov/resource/fgyz-n3uk";
const RECORD_SOURCE: &str = "WDFW SPI (data.wa.gov/resource/fgyz-n3uk)";

/// Accepted data types, best first. The first match wins per population and year.
const TYPE_PRIORITY: &[&str] = &["TSAEJ", "Spawner Fish", "NOSAEJ", "Escapement Fish"];

/// WDFW population name to watershed slug.
const POPULATION_WATERSHED: &[(&str, &str)] = &[
    ("Lower Skagit Chinook", "skagit"),
    ("Upper Skagit Chinook", "skagit"),
    ("Skagit Coho", "skagit"),
    ("Skagit Pink", "skagit"),
    ("Mainstem Skagit Fall Chum", "skagit"),
    ("Skagit River Summer and Winter Steelhead", "skagit"),
    ("Lower Sauk Chinook", "skagit"),
    ("Upper Sauk Chinook", "skagit"),
    ("Sauk River Summer and Winter Steelhead", "skagit"),
    ("Suiattle Chinook", "skagit"),
    ("Skykomish Chinook", "snohomish"),
    ("Snoqualmie Chinook", "snohomish"),
    ("Snohomish Coho", "snohomish"),
    ("Snohomish Even-Year Pink", "snohomish"),
    ("Snohomish Odd-Year Pink", "snohomish"),
    ("South Fork Skykomish Coho", "snohomish"),
    ("North Fork Skykomish Summer Steelhead", "snohomish"),
    ("Snohomish-Skykomish Winter Steelhead", "snohomish"),
    ("Snoqualmie Winter Steelhead", "snohomish"),
    ("Cedar Chinook", "lake-washington"),
    ("Cedar Sockeye", "lake-washington"),
    ("Cedar River Winter Steelhead", "lake-washington"),
    ("Lake Washington Beach Spawning Sockeye", "lake-washington"),
    ("Lake Washington-Sammamish Tribs Sockeye", "lake-washington"),
    ("North Lake Washington and Lake Sammamish Winter Steelhead", "lake-washington"),
    ("Sammamish Chinook", "lake-washington"),
    ("Green River (Duwamish) Chinook", "green-duwamish"),
    ("Green River-Soos Creek Coho", "green-duwamish"),
    ("Green River (Duwamish) Winter Steelhead", "green-duwamish"),
    ("Puyallup Chinook", "puyallup-white"),
    ("Puyallup Pink", "puyallup-white"),
    ("Puyallup-Carbon Fall Chum", "puyallup-white"),
    ("Puyallup/Carbon Winter Steelhead", "puyallup-white"),
    ("White River (Puyallup) Coho", "puyallup-white"),
    ("White River (Puyallup) Winter Steelhead", "puyallup-white"),
    ("Nisqually Chinook", "nisqually"),
    ("Nisqually Coho", "nisqually"),
    ("Nisqually Pink", "nisqually"),
    ("Nisqually Winter Chum", "nisqually"),
    ("Nisqually Winter Steelhead", "nisqually"),
    ("Skokomish Chinook", "skokomish"),
    ("Skokomish Winter Steelhead", "skokomish"),
    ("Upper Skokomish Late Fall Chum", "skokomish"),
    ("North Fork Stillaguamish Chinook", "stillaguamish"),
    ("South Fork Stillaguamish Chinook", "stillaguamish"),
    ("Stillaguamish Coho", "stillaguamish"),
    ("Stillaguamish Fall Chum", "stillaguamish"),
    ("Stillaguamish Pink", "stillaguamish"),
    ("Stillaguamish Winter Steelhead", "stillaguamish"),
    ("Canyon Creek (Stillaguamish) Summer Steelhead", "stillaguamish"),
    ("North Fork Nooksack Chinook (including Middle Fork Nooksack River)", "nooksack"),
    ("South Fork Nooksack Chinook", "nooksack"),
    ("Nooksack Coho", "nooksack"),
    ("Nooksack Fall Chum", "nooksack"),
    ("Nooksack Pink", "nooksack"),
    ("Nooksack Winter Steelhead", "nooksack"),
    ("South Fork Nooksack Summer Steelhead", "nooksack"),
];

/// One Socrata row. Socrata serialises every column as a string.
#[derive(Debug, Clone, Deserialize)]
struct EscapementRow {
    population_name: Option<String>,
    species: Option<String>,
    year: Option<String>,
    abundance_qty: Option<String>,
    data_type: Option<String>,
    escapement_methodology: Option<String>,
}

fn watershed_slug(population: &str) -> Option<&'static str> {
    POPULATION_WATERSHED
        .iter()
        .find(|(name, _)| *name == population)
        .map(|(_, slug)| *slug)
}

/// Page through the escapement dataset until a short page comes back.
pub async fn fetch_rows(
    client: &UpstreamClient,
    page_size: usize,
) -> Result<Vec<Value>, SnapshotError> {
    let url = format!(
        "{}{}",
        client.config().wdfw_base_url.trim_end_matches('/'),
        DATASET_PATH
    );
    let where_clause = [
        "abundance_qty IS NOT NULL",
        "year >= '2010'",
        "data_type IN ('TSAEJ','Spawner Fish','NOSAEJ','Escapement Fish')",
    ]
    .join(" AND ");
    let select = "population_name,species,year,abundance_qty,data_type,escapement_methodology,last_update";
    let limit = page_size.to_string();

    let mut rows = Vec::new();
    let mut offset = 0usize;
    loop {
        let offset_param = offset.to_string();
        let page = client
            .get_json(
                "WDFW",
                &url,
                &[
                    ("$where", where_clause.as_str()),
                    ("$select", select),
                    ("$limit", limit.as_str()),
                    ("$offset", offset_param.as_str()),
                    ("$order", "population_name,year"),
                ],
                false,
            )
            .await?;

        // Socrata reports query failures as a 200 with an error object
        let page = match page {
            Value::Array(items) => items,
            other => {
                tracing::error!("Escapement page at offset {} was not an array: {}", offset, other);
                return Err(SnapshotError::UnexpectedPage { offset });
            }
        };

        let fetched = page.len();
        tracing::info!("Fetched escapement rows {}..{}: {}", offset, offset + page_size, fetched);
        rows.extend(page);

        if fetched < page_size {
            break;
        }
        offset += page_size;
    }

    Ok(rows)
}

/// Reduce raw escapement rows to one Puget Sound [`SalmonReturn`] per population and year.
pub fn parse_rows(rows: &[Value]) -> Vec<SalmonReturn> {
    let mut grouped: BTreeMap<(String, String), Vec<EscapementRow>> = BTreeMap::new();
    for raw in rows {
        let Ok(row) = EscapementRow::deserialize(raw) else {
            continue;
        };
        let (Some(population), Some(year)) = (row.population_name.clone(), row.year.clone()) else {
            continue;
        };
        if watershed_slug(&population).is_none() {
            continue;
        }
        grouped.entry((population, year)).or_default().push(row);
    }

    let mut results: Vec<SalmonReturn> = grouped
        .into_iter()
        .filter_map(|((population, year), candidates)| {
            let best = TYPE_PRIORITY.iter().find_map(|dtype| {
                candidates
                    .iter()
                    .find(|r| r.data_type.as_deref() == Some(*dtype))
            })?;

            let slug = watershed_slug(&population)?;
            let watershed = watershed_by_slug(slug)?;
            // Bull trout and other non-salmon species fall out here
            let species = species_by_common_name(best.species.as_deref()?)?;

            let year: i32 = year.trim().parse().ok()?;
            let count: f64 = best.abundance_qty.as_deref()?.trim().parse().ok()?;
            if !count.is_finite() || count < 0.0 {
                return None;
            }

            Some(SalmonReturn {
                id: format!("{}-{}", population, year),
                watershed_id: watershed.id.to_string(),
                species_id: species.id.to_string(),
                year,
                count_estimate: count.round() as u64,
                method: best
                    .escapement_methodology
                    .clone()
                    .or_else(|| best.data_type.clone())
                    .unwrap_or_default(),
                source: RECORD_SOURCE.to_string(),
                confidence: Confidence::for_year(year),
            })
        })
        .collect();

    results.sort_by(|a, b| {
        a.watershed_id
            .cmp(&b.watershed_id)
            .then(a.year.cmp(&b.year))
    });
    results
}

pub async fn refresh(
    client: &UpstreamClient,
    path: impl AsRef<Path>,
) -> Result<ReturnsSnapshot, SnapshotError> {
    let rows = fetch_rows(client, PAGE_SIZE).await?;
    tracing::info!("Total escapement rows fetched: {}", rows.len());

    let returns = parse_rows(&rows);
    let snapshot = ReturnsSnapshot {
        fetched_at: chrono::Utc::now(),
        source: SNAPSHOT_SOURCE.to_string(),
        record_count: returns.len(),
        returns,
    };

    snapshot.write(&path)?;
    tracing::info!(
        "Wrote {} Puget Sound return records to {}",
        snapshot.record_count,
        path.as_ref().display()
    );
    Ok(snapshot)
}

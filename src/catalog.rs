use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Watershed {
    pub id: &'static str,
    pub name: &'static str,
    pub slug: &'static str,
    pub region: &'static str,
    pub area_sq_km: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Species {
    pub id: &'static str,
    pub common_name: &'static str,
    pub scientific_name: &'static str,
    pub slug: &'static str,
}

// Ids are referenced by the returns snapshot; keep them stable.
pub const WATERSHEDS: &[Watershed] = &[
    Watershed { id: "1", name: "Skagit River", slug: "skagit", region: "North Sound", area_sq_km: 8134 },
    Watershed { id: "2", name: "Snohomish River", slug: "snohomish", region: "Central Sound", area_sq_km: 4851 },
    Watershed { id: "3", name: "Lake Washington/Cedar/Sammamish", slug: "lake-washington", region: "Central Sound", area_sq_km: 1265 },
    Watershed { id: "4", name: "Green/Duwamish River", slug: "green-duwamish", region: "Central Sound", area_sq_km: 1945 },
    Watershed { id: "5", name: "Puyallup/White River", slug: "puyallup-white", region: "South Sound", area_sq_km: 2406 },
    Watershed { id: "6", name: "Nisqually River", slug: "nisqually", region: "South Sound", area_sq_km: 1979 },
    Watershed { id: "7", name: "Skokomish River", slug: "skokomish", region: "Hood Canal", area_sq_km: 623 },
    Watershed { id: "8", name: "Stillaguamish River", slug: "stillaguamish", region: "North Sound", area_sq_km: 1791 },
    Watershed { id: "9", name: "Nooksack River", slug: "nooksack", region: "North Sound", area_sq_km: 2145 },
];

pub const SPECIES: &[Species] = &[
    Species { id: "1", common_name: "Chinook", scientific_name: "Oncorhynchus tshawytscha", slug: "chinook" },
    Species { id: "2", common_name: "Coho", scientific_name: "Oncorhynchus kisutch", slug: "coho" },
    Species { id: "3", common_name: "Chum", scientific_name: "Oncorhynchus keta", slug: "chum" },
    Species { id: "4", common_name: "Pink", scientific_name: "Oncorhynchus gorbuscha", slug: "pink" },
    Species { id: "5", common_name: "Sockeye", scientific_name: "Oncorhynchus nerka", slug: "sockeye" },
    Species { id: "6", common_name: "Steelhead", scientific_name: "Oncorhynchus mykiss", slug: "steelhead" },
];

pub fn watershed_by_slug(slug: &str) -> Option<&'static Watershed> {
    WATERSHEDS.iter().find(|w| w.slug == slug)
}

/// Species id for a WDFW common name ("Chinook", "Coho", ...).
pub fn species_by_common_name(name: &str) -> Option<&'static Species> {
    SPECIES.iter().find(|s| s.common_name == name)
}

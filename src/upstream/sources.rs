use crate::config::Config;

/// Every public feed the dashboard reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// WDFW salmonid population indicators (Socrata rows.json).
    PopulationIndicators,
    /// USGS NWIS instantaneous water temperature, Puget Sound bounding box.
    WaterTemperature,
    /// WSDOT fish passage barrier layer (ArcGIS REST).
    FishPassageBarriers,
    /// WDFW spawner escapement estimates.
    Escapement,
    /// WDFW salmonid population list.
    Populations,
    /// WDFW recovery goals per population.
    RecoveryGoals,
    /// NOAA Fisheries content search.
    NoaaContent,
    /// Puget Sound Partnership vital signs.
    PugetSoundPartnership,
}

const BARRIER_FIELDS: &str =
    "Stream_Name,Road_Name,Barrier_Status_Desc,Source_Name,LinealGain_Meas,Species,FUCriteria_Desc";

// Puget Sound: lon -123.2..-121.5, lat 46.8..48.5
const PUGET_SOUND_BBOX: &str = "-123.2,46.8,-121.5,48.5";

impl Source {
    /// Short provider label used in error messages ("WSDOT API error: ...").
    pub fn provider(&self) -> &'static str {
        match self {
            Source::PopulationIndicators
            | Source::Escapement
            | Source::Populations
            | Source::RecoveryGoals => "WDFW",
            Source::WaterTemperature => "USGS",
            Source::FishPassageBarriers => "WSDOT",
            Source::NoaaContent => "NOAA",
            Source::PugetSoundPartnership => "PSP",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Source::PopulationIndicators => "/api/views/x25s-cxg8/rows.json",
            Source::WaterTemperature => "/nwis/iv/",
            Source::FishPassageBarriers => {
                "/arcgis/rest/services/Shared/FishPassageData/MapServer/8/query"
            }
            Source::Escapement => "/api/views/fgyz-n3uk/rows.json",
            Source::Populations => "/api/views/ncqh-ypvf/rows.json",
            Source::RecoveryGoals => "/api/views/d8mu-pcf6/rows.json",
            Source::NoaaContent => "/api/v1/content",
            Source::PugetSoundPartnership => "/api/views/rqgb-pnqn/rows.json",
        }
    }

    pub fn query(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Source::PopulationIndicators
            | Source::Escapement
            | Source::Populations
            | Source::RecoveryGoals => &[("$limit", "50000")],
            Source::WaterTemperature => &[
                ("format", "json"),
                ("stateCd", "WA"),
                ("parameterCd", "00010"),
                ("siteStatus", "active"),
                ("bBox", PUGET_SOUND_BBOX),
            ],
            Source::FishPassageBarriers => &[
                ("where", "1=1"),
                ("outFields", BARRIER_FIELDS),
                ("outSR", "4326"),
                ("f", "json"),
                ("returnGeometry", "true"),
            ],
            Source::NoaaContent => &[
                ("api_key", "anonymous"),
                ("q", "chinook puget sound"),
                ("type", "data"),
                ("size", "10"),
            ],
            Source::PugetSoundPartnership => &[("$limit", "1000")],
        }
    }

    /// NOAA negotiates content type and serves HTML without an explicit Accept header.
    pub fn wants_accept_json(&self) -> bool {
        matches!(self, Source::NoaaContent)
    }

    pub fn url(&self, config: &Config) -> String {
        // Puget Sound Partnership publishes through the same Socrata host as WDFW
        let base = match self {
            Source::PopulationIndicators
            | Source::Escapement
            | Source::Populations
            | Source::RecoveryGoals
            | Source::PugetSoundPartnership => &config.wdfw_base_url,
            Source::WaterTemperature => &config.usgs_base_url,
            Source::FishPassageBarriers => &config.wsdot_base_url,
            Source::NoaaContent => &config.noaa_base_url,
        };
        format!("{}{}", base.trim_end_matches('/'), self.path())
    }
}

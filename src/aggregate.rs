use crate::upstream::{Source, UpstreamClient};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Feeds merged by `/api/scrape`, in the order errors are reported.
pub const SCRAPE_SOURCES: &[(&str, Source)] = &[
    ("wdfw.escapement", Source::Escapement),
    ("wdfw.populations", Source::Populations),
    ("wdfw.recoveryGoals", Source::RecoveryGoals),
    ("noaa", Source::NoaaContent),
    ("pugetsoundPartnership", Source::PugetSoundPartnership),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    /// Source key to payload; `null` when that source failed.
    #[schema(value_type = Object)]
    pub by_source: Map<String, Value>,
    /// `"<source-key>: <reason>"`, one per failed source.
    pub errors: Vec<String>,
}

pub struct Aggregator {
    sources: Vec<(String, Source)>,
}

impl Aggregator {
    pub fn new(sources: &[(&str, Source)]) -> Self {
        Self {
            sources: sources
                .iter()
                .map(|(key, source)| (key.to_string(), *source))
                .collect(),
        }
    }

    pub fn scrape() -> Self {
        Self::new(SCRAPE_SOURCES)
    }

    /// Fetch every source concurrently and wait for all of them. A failing
    /// source only empties its own slot.
    pub async fn run(&self, client: &UpstreamClient) -> AggregateResult {
        let outcomes = join_all(
            self.sources
                .iter()
                .map(|(key, source)| async move { (key, client.fetch(*source).await) }),
        )
        .await;

        let mut result = AggregateResult::default();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(payload) => {
                    result.by_source.insert(key.clone(), payload);
                }
                Err(e) => {
                    tracing::warn!("Aggregate source {} failed: {}", key, e);
                    result.by_source.insert(key.clone(), Value::Null);
                    result.errors.push(format!("{}: {}", key, e));
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use std::time::{Duration, Instant};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn populated(result: &AggregateResult) -> usize {
        result.by_source.values().filter(|v| !v.is_null()).count()
    }

    async fn mount_ok(server: &MockServer, source: Source, body: Value) {
        Mock::given(method("GET"))
            .and(path(source.path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_all_sources_succeed() {
        let mock_server = MockServer::start().await;
        for (key, source) in SCRAPE_SOURCES {
            mount_ok(&mock_server, *source, json!({"from": key})).await;
        }

        let client = UpstreamClient::new(Config::for_base_url(&mock_server.uri())).unwrap();
        let result = Aggregator::scrape().run(&client).await;

        assert!(result.errors.is_empty());
        assert_eq!(populated(&result), SCRAPE_SOURCES.len());
        assert_eq!(result.by_source["noaa"], json!({"from": "noaa"}));
    }

    #[tokio::test]
    async fn test_one_failing_source_leaves_the_rest() {
        let mock_server = MockServer::start().await;
        for (key, source) in SCRAPE_SOURCES {
            if *source == Source::Populations {
                Mock::given(method("GET"))
                    .and(path(source.path()))
                    .respond_with(ResponseTemplate::new(500))
                    .mount(&mock_server)
                    .await;
            } else {
                mount_ok(&mock_server, *source, json!({"from": key})).await;
            }
        }

        let client = UpstreamClient::new(Config::for_base_url(&mock_server.uri())).unwrap();
        let result = Aggregator::scrape().run(&client).await;

        assert_eq!(populated(&result), SCRAPE_SOURCES.len() - 1);
        assert_eq!(
            result.errors,
            vec!["wdfw.populations: WDFW API error: 500 Internal Server Error".to_string()]
        );
        assert_eq!(result.by_source["wdfw.populations"], Value::Null);
        assert_eq!(result.by_source["wdfw.escapement"], json!({"from": "wdfw.escapement"}));
    }

    #[tokio::test]
    async fn test_every_source_failing_still_returns_result() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        let client = UpstreamClient::new(Config::for_base_url(&mock_server.uri())).unwrap();
        let result = Aggregator::scrape().run(&client).await;

        assert_eq!(populated(&result), 0);
        assert_eq!(result.errors.len(), SCRAPE_SOURCES.len());
        assert!(result.errors[3].starts_with("noaa: NOAA API error: 502"));
    }

    #[tokio::test]
    async fn test_sources_are_fetched_concurrently() {
        let mock_server = MockServer::start().await;
        for (key, source) in SCRAPE_SOURCES {
            Mock::given(method("GET"))
                .and(path(source.path()))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"from": key}))
                        .set_delay(Duration::from_millis(500)),
                )
                .expect(1)
                .mount(&mock_server)
                .await;
        }

        let client = UpstreamClient::new(Config::for_base_url(&mock_server.uri())).unwrap();
        let started = Instant::now();
        let result = Aggregator::scrape().run(&client).await;
        let elapsed = started.elapsed();

        assert_eq!(populated(&result), SCRAPE_SOURCES.len());
        // Sequential fetches would take at least 5 x 500ms
        assert!(elapsed < Duration::from_millis(1500), "took {:?}", elapsed);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let mut result = AggregateResult::default();
        result.by_source.insert("noaa".to_string(), Value::Null);
        result.errors.push("noaa: NOAA API error: 500 Internal Server Error".to_string());

        let rendered = serde_json::to_value(&result).unwrap();
        assert_eq!(rendered["bySource"], json!({"noaa": null}));
        assert_eq!(rendered["errors"].as_array().unwrap().len(), 1);
    }
}

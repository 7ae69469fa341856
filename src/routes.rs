use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    aggregate::{AggregateResult, Aggregator},
    cache::{get_or_fetch, CacheKey, ResponseCache},
    catalog::{Species, Watershed, SPECIES, WATERSHEDS},
    contact::{ContactError, ContactRelay, ContactRequest, ContactSettings},
    snapshot::{Confidence, ReturnsQuery, ReturnsSnapshot, SalmonReturn},
    upstream::{
        normalize::normalize_stations, types::StationReading, Source, UpstreamClient,
        UpstreamError,
    },
};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<dyn ResponseCache>,
    pub upstream: Arc<UpstreamClient>,
    pub aggregator: Arc<Aggregator>,
    pub contact: Arc<ContactRelay>,
    /// Where relay credentials come from. `ContactSettings::from_env` outside tests.
    pub contact_settings: fn() -> Result<ContactSettings, ContactError>,
    pub snapshot: Option<Arc<ReturnsSnapshot>>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Contact(#[from] ContactError),
    #[error("{0}")]
    BadRequest(String),
    #[error("Salmon return snapshot is not available.")]
    SnapshotUnavailable,
    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Upstream(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            ApiError::Contact(ContactError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, msg.to_string())
            }
            ApiError::Contact(ContactError::Configuration(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Contact form is not configured.".to_string(),
            ),
            ApiError::Contact(ContactError::Relay(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send message. Please try again.".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::SnapshotUnavailable => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ApiError::Encode(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContactResponse {
    pub success: bool,
}

// Route handlers
#[utoipa::path(get, path = "/health", responses((status = 200, body = HealthResponse)))]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// WDFW salmonid population indicators, passed through unchanged.
#[utoipa::path(
    get,
    path = "/api/wdfw",
    responses(
        (status = 200, description = "Socrata rows.json payload (meta + data)"),
        (status = 502, body = ErrorBody)
    )
)]
pub async fn get_population_indicators(
    State(state): State<AppState>,
) -> Result<Json<Arc<Value>>, ApiError> {
    let payload = get_or_fetch(state.cache.as_ref(), CacheKey::Returns, || {
        state.upstream.fetch(Source::PopulationIndicators)
    })
    .await
    .map_err(|e| {
        tracing::error!("[/api/wdfw] {}", e);
        e
    })?;

    Ok(Json(payload))
}

/// Latest water temperature per USGS station in the Puget Sound box.
#[utoipa::path(
    get,
    path = "/api/usgs",
    responses(
        (status = 200, body = [StationReading]),
        (status = 502, body = ErrorBody)
    )
)]
pub async fn get_water_temperature(
    State(state): State<AppState>,
) -> Result<Json<Arc<Value>>, ApiError> {
    let payload = get_or_fetch(state.cache.as_ref(), CacheKey::Stations, || async {
        let raw = state.upstream.fetch(Source::WaterTemperature).await?;
        let normalized = normalize_stations(&raw);
        if !normalized.skipped.is_empty() {
            tracing::warn!(
                "Dropped {} of {} USGS stations while normalizing",
                normalized.skipped.len(),
                normalized.skipped.len() + normalized.readings.len()
            );
        }
        Ok::<_, ApiError>(serde_json::to_value(normalized.readings)?)
    })
    .await
    .map_err(|e| {
        tracing::error!("[/api/usgs] {}", e);
        e
    })?;

    Ok(Json(payload))
}

/// WSDOT fish passage barriers, passed through unchanged.
#[utoipa::path(
    get,
    path = "/api/barriers",
    responses(
        (status = 200, description = "ArcGIS feature set"),
        (status = 502, body = ErrorBody)
    )
)]
pub async fn get_barriers(State(state): State<AppState>) -> Result<Json<Arc<Value>>, ApiError> {
    let payload = get_or_fetch(state.cache.as_ref(), CacheKey::Barriers, || {
        state.upstream.fetch(Source::FishPassageBarriers)
    })
    .await
    .map_err(|e| {
        tracing::error!("[/api/barriers] {}", e);
        e
    })?;

    Ok(Json(payload))
}

/// Supplemental open-data feeds merged into one response. Source failures
/// are reported in `errors`; the request itself still succeeds.
#[utoipa::path(get, path = "/api/scrape", responses((status = 200, body = AggregateResult)))]
pub async fn get_scrape(State(state): State<AppState>) -> Result<Json<Arc<Value>>, ApiError> {
    let payload = get_or_fetch(state.cache.as_ref(), CacheKey::Scrape, || async {
        let result = state.aggregator.run(&state.upstream).await;
        serde_json::to_value(result)
    })
    .await?;

    Ok(Json(payload))
}

#[utoipa::path(
    post,
    path = "/api/contact",
    request_body = ContactRequest,
    responses(
        (status = 200, body = ContactResponse),
        (status = 400, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
pub async fn submit_contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<Json<ContactResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!("Rejected contact body: {}", e);
        ApiError::BadRequest("Request body must be a JSON object.".to_string())
    })?;

    let message = request.validate()?;

    let settings = (state.contact_settings)().map_err(|e| {
        tracing::error!("[/api/contact] {}", e);
        e
    })?;

    state.contact.send(&settings, &message).await.map_err(|e| {
        tracing::error!("[/api/contact] {}", e);
        e
    })?;

    Ok(Json(ContactResponse { success: true }))
}

#[utoipa::path(get, path = "/api/watersheds", responses((status = 200, body = [Watershed])))]
pub async fn list_watersheds() -> Json<&'static [Watershed]> {
    Json(WATERSHEDS)
}

#[utoipa::path(get, path = "/api/species", responses((status = 200, body = [Species])))]
pub async fn list_species() -> Json<&'static [Species]> {
    Json(SPECIES)
}

/// Escapement records from the offline snapshot.
#[utoipa::path(
    get,
    path = "/api/salmon-returns",
    params(ReturnsQuery),
    responses(
        (status = 200, body = [SalmonReturn]),
        (status = 400, body = ErrorBody),
        (status = 503, body = ErrorBody)
    )
)]
pub async fn get_salmon_returns(
    State(state): State<AppState>,
    query: Result<Query<ReturnsQuery>, QueryRejection>,
) -> Result<Json<Vec<SalmonReturn>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let snapshot = state.snapshot.as_ref().ok_or(ApiError::SnapshotUnavailable)?;
    Ok(Json(snapshot.filter(&query)))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        get_population_indicators,
        get_water_temperature,
        get_barriers,
        get_scrape,
        submit_contact,
        list_watersheds,
        list_species,
        get_salmon_returns
    ),
    components(schemas(
        HealthResponse,
        ErrorBody,
        StationReading,
        AggregateResult,
        ContactRequest,
        ContactResponse,
        Watershed,
        Species,
        SalmonReturn,
        Confidence
    ))
)]
pub struct ApiDoc;

// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/wdfw", get(get_population_indicators))
        .route("/api/usgs", get(get_water_temperature))
        .route("/api/barriers", get(get_barriers))
        .route("/api/scrape", get(get_scrape))
        .route("/api/contact", post(submit_contact))
        .route("/api/watersheds", get(list_watersheds))
        .route("/api/species", get(list_species))
        .route("/api/salmon-returns", get(get_salmon_returns))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_state(base_url: &str) -> AppState {
        let config = Config::for_base_url(base_url);
        let upstream = UpstreamClient::new(config.clone()).unwrap();
        let contact = ContactRelay::new(upstream.http().clone(), &config.resend_base_url);

        AppState {
            cache: Arc::new(MemoryCache::new(config.cache_ttl())),
            upstream: Arc::new(upstream),
            aggregator: Arc::new(Aggregator::scrape()),
            contact: Arc::new(contact),
            contact_settings: || {
                Ok(ContactSettings {
                    api_key: "re_test".to_string(),
                    to: "team@example.org".to_string(),
                })
            },
            snapshot: None,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body) = send(app, request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(test_state("http://127.0.0.1:9"));
        let (status, body) = get_json(&app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_usgs_returns_normalized_stations() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nwis/iv/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": {"timeSeries": [{
                    "sourceInfo": {
                        "siteName": "CEDAR RIVER AT RENTON, WA",
                        "siteCode": [{"value": "12119000"}],
                        "geoLocation": {"geogLocation": {"latitude": "47.6", "longitude": "-122.3"}}
                    },
                    "values": [{"value": [{"value": "12.5", "dateTime": "2024-08-01T12:00:00Z"}]}]
                }]}
            })))
            .mount(&mock_server)
            .await;

        let app = create_router(test_state(&mock_server.uri()));
        let (status, body) = get_json(&app, "/api/usgs").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([{
                "siteCode": "12119000",
                "siteName": "CEDAR RIVER AT RENTON, WA",
                "latitude": 47.6,
                "longitude": -122.3,
                "temperature": 12.5,
                "dateTime": "2024-08-01T12:00:00Z",
                "streamName": "CEDAR RIVER AT RENTON, WA"
            }])
        );
    }

    #[tokio::test]
    async fn test_barriers_upstream_failure_is_bad_gateway() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let app = create_router(test_state(&mock_server.uri()));
        let (status, body) = get_json(&app, "/api/barriers").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, json!({"error": "WSDOT API error: 503 Service Unavailable"}));
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(Source::PopulationIndicators.path()))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path(Source::PopulationIndicators.path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"meta": {}, "data": []})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let app = create_router(test_state(&mock_server.uri()));

        let (status, body) = get_json(&app, "/api/wdfw").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "WDFW API error: 500 Internal Server Error");

        let (status, body) = get_json(&app, "/api/wdfw").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"meta": {}, "data": []}));

        // Third call is served from cache; the 200 mock expects exactly one hit
        let (status, _) = get_json(&app, "/api/wdfw").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_scrape_partial_failure_then_cache_hit() {
        let mock_server = MockServer::start().await;
        for (key, source) in crate::aggregate::SCRAPE_SOURCES {
            let template = if *source == Source::NoaaContent {
                ResponseTemplate::new(500)
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"source": key}))
            };
            Mock::given(method("GET"))
                .and(path(source.path()))
                .respond_with(template)
                .expect(1)
                .mount(&mock_server)
                .await;
        }

        let app = create_router(test_state(&mock_server.uri()));
        let request = || Request::builder().uri("/api/scrape").body(Body::empty()).unwrap();

        let (status, first) = send(&app, request()).await;
        assert_eq!(status, StatusCode::OK);

        let parsed: Value = serde_json::from_slice(&first).unwrap();
        assert_eq!(parsed["errors"], json!(["noaa: NOAA API error: 500 Internal Server Error"]));
        assert_eq!(parsed["bySource"]["noaa"], Value::Null);
        let populated = parsed["bySource"]
            .as_object()
            .unwrap()
            .values()
            .filter(|v| !v.is_null())
            .count();
        assert_eq!(populated, crate::aggregate::SCRAPE_SOURCES.len() - 1);

        let (status, second) = send(&app, request()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_contact_rejects_bad_email_without_sending() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let app = create_router(test_state(&mock_server.uri()));
        let request = post_json(
            "/api/contact",
            json!({"name": "Ana", "email": "not-an-email", "message": "hello"}),
        );
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Please enter a valid email address.");
    }

    #[tokio::test]
    async fn test_contact_unconfigured_is_server_error() {
        let mut state = test_state("http://127.0.0.1:9");
        state.contact_settings = || Err(ContactError::Configuration("CONTACT_EMAIL"));
        let app = create_router(state);

        let request = post_json(
            "/api/contact",
            json!({"name": "Ana", "email": "ana@example.org", "message": "hello"}),
        );
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Contact form is not configured.");
    }

    #[tokio::test]
    async fn test_contact_relays_valid_message() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "e-1"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let app = create_router(test_state(&mock_server.uri()));
        let request = post_json(
            "/api/contact",
            json!({"name": "Ana", "email": "ana@example.org", "subject": "Hi", "message": "hello"}),
        );
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"success": true}));
    }

    #[tokio::test]
    async fn test_contact_malformed_body_is_bad_request() {
        let app = create_router(test_state("http://127.0.0.1:9"));
        let request = Request::builder()
            .method("POST")
            .uri("/api/contact")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_catalog_endpoints() {
        let app = create_router(test_state("http://127.0.0.1:9"));

        let (status, watersheds) = get_json(&app, "/api/watersheds").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(watersheds.as_array().unwrap().len(), 9);
        assert_eq!(watersheds[0]["areaSqKm"], 8134);

        let (_, species) = get_json(&app, "/api/species").await;
        assert_eq!(species[5]["commonName"], "Steelhead");
    }

    #[tokio::test]
    async fn test_salmon_returns_without_snapshot() {
        let app = create_router(test_state("http://127.0.0.1:9"));
        let (status, body) = get_json(&app, "/api/salmon-returns").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_salmon_returns_filters_snapshot() {
        let returns: Vec<SalmonReturn> = [("1", 2019), ("1", 2022), ("6", 2022)]
            .iter()
            .map(|(watershed, year)| SalmonReturn {
                id: format!("{}-{}", watershed, year),
                watershed_id: watershed.to_string(),
                species_id: "1".to_string(),
                year: *year,
                count_estimate: 100,
                method: "TSAEJ".to_string(),
                source: "test".to_string(),
                confidence: Confidence::for_year(*year),
            })
            .collect();
        let mut state = test_state("http://127.0.0.1:9");
        state.snapshot = Some(Arc::new(ReturnsSnapshot {
            fetched_at: chrono::Utc::now(),
            source: "test".to_string(),
            record_count: returns.len(),
            returns,
        }));
        let app = create_router(state);

        let (status, body) =
            get_json(&app, "/api/salmon-returns?watershedId=1&startYear=2020").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{
            "id": "1-2022",
            "watershedId": "1",
            "speciesId": "1",
            "year": 2022,
            "countEstimate": 100,
            "method": "TSAEJ",
            "source": "test",
            "confidence": "high"
        }]));
    }

    #[tokio::test]
    async fn test_salmon_returns_bad_query_is_json_error() {
        let mut state = test_state("http://127.0.0.1:9");
        state.snapshot = Some(Arc::new(ReturnsSnapshot {
            fetched_at: chrono::Utc::now(),
            source: "test".to_string(),
            record_count: 0,
            returns: Vec::new(),
        }));
        let app = create_router(state);

        let request = Request::builder()
            .uri("/api/salmon-returns?startYear=abc")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to deserialize query string"));
    }

    #[tokio::test]
    async fn test_encode_failure_is_server_error() {
        let err = serde_json::from_str::<Value>("{").unwrap_err();
        let response = ApiError::from(err).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to encode response"));
    }

    #[tokio::test]
    async fn test_openapi_document_served() {
        let app = create_router(test_state("http://127.0.0.1:9"));
        let (status, doc) = get_json(&app, "/api-docs/openapi.json").await;

        assert_eq!(status, StatusCode::OK);
        assert!(doc["paths"]["/api/usgs"].is_object());
    }
}

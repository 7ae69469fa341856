use super::sources::Source;
use crate::config::Config;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("{provider} API error: {status}")]
    Status {
        provider: &'static str,
        status: StatusCode,
    },
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} returned invalid JSON: {source}")]
    Decode {
        provider: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Stateless GET client shared by every upstream feed.
///
/// One request per call, no retries. Failures come back as [`UpstreamError`]
/// values for the endpoint layer to map onto a status code.
pub struct UpstreamClient {
    client: Client,
    config: Config,
}

impl UpstreamClient {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("PugetSoundSalmonHealth/1.0")
            .timeout(config.http_timeout())
            .build()?;

        Ok(Self { client, config })
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn fetch(&self, source: Source) -> Result<Value, UpstreamError> {
        let url = source.url(&self.config);
        self.get_json(source.provider(), &url, source.query(), source.wants_accept_json())
            .await
    }

    pub(crate) async fn get_json(
        &self,
        provider: &'static str,
        url: &str,
        params: &[(&str, &str)],
        accept_json: bool,
    ) -> Result<Value, UpstreamError> {
        let mut request = self.client.get(url).query(params);
        if accept_json {
            request = request.header(ACCEPT, "application/json");
        }

        let response = request
            .send()
            .await
            .map_err(|source| UpstreamError::Transport { provider, source })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("{} responded {} for {}", provider, status, url);
            return Err(UpstreamError::Status { provider, status });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| UpstreamError::Transport { provider, source })?;

        serde_json::from_slice(&body).map_err(|source| UpstreamError::Decode { provider, source })
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use shared::protocol::{FeaturesInfo, HealthStatus, PredictRequest, PredictionResponse};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub mod controller;

pub use controller::{
    events::{ControllerEvent, ErrorCategory, FormError, FormState, SubmitOutcome},
    view::{BarFill, FormView, ProbabilityRow, SummaryItem},
    ControllerTimings, FormController,
};

const PREDICT_PATH: &str = "predict";
const FEATURES_PATH: &str = "api/features";
const HEALTH_PATH: &str = "api/health";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        source: reqwest::Error,
    },
    #[error("invalid response body from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },
    #[error("{endpoint} returned {status}")]
    Status { endpoint: String, status: StatusCode },
    #[error("prediction service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PredictionService: Send + Sync {
    async fn predict(&self, request: &PredictRequest) -> Result<PredictionResponse, ClientError>;
}

pub struct MissingPredictionService;

#[async_trait]
impl PredictionService for MissingPredictionService {
    async fn predict(&self, _request: &PredictRequest) -> Result<PredictionResponse, ClientError> {
        Err(ClientError::Unavailable(
            "no prediction backend configured".into(),
        ))
    }
}

pub struct HttpPredictionClient {
    http: Client,
    base_url: Url,
}

impl HttpPredictionClient {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        Self::with_timeout(server_url, None)
    }

    pub fn with_timeout(server_url: &str, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let base_url = parse_base_url(server_url)?;
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ClientError::Build)?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|source| ClientError::InvalidUrl {
                url: format!("{}{path}", self.base_url),
                source,
            })
    }

    pub async fn features(&self) -> Result<FeaturesInfo, ClientError> {
        self.get_json(FEATURES_PATH).await
    }

    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        self.get_json(HEALTH_PATH).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let endpoint = self.endpoint(path)?;
        let res = self
            .http
            .get(endpoint.clone())
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;
        if !res.status().is_success() {
            return Err(ClientError::Status {
                endpoint: endpoint.to_string(),
                status: res.status(),
            });
        }
        read_json(&endpoint, res).await
    }
}

#[async_trait]
impl PredictionService for HttpPredictionClient {
    async fn predict(&self, request: &PredictRequest) -> Result<PredictionResponse, ClientError> {
        let endpoint = self.endpoint(PREDICT_PATH)?;
        debug!(%endpoint, "posting prediction request");
        let res = self
            .http
            .post(endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        // Failures arrive as 400 with a JSON body, so the status is not checked here.
        let status = res.status();
        let body: PredictionResponse = read_json(&endpoint, res).await?;
        debug!(%status, success = body.success, "prediction response received");
        Ok(body)
    }
}

async fn read_json<T: DeserializeOwned>(
    endpoint: &Url,
    res: reqwest::Response,
) -> Result<T, ClientError> {
    let text = res.text().await.map_err(|source| ClientError::Transport {
        endpoint: endpoint.to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ClientError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

/// Parses the server url so that relative joins keep any path prefix.
fn parse_base_url(server_url: &str) -> Result<Url, ClientError> {
    let raw = server_url.trim();
    let mut url = Url::parse(raw).map_err(|source| ClientError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidUrl {
            url: raw.to_string(),
            source: url::ParseError::RelativeUrlWithoutBase,
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

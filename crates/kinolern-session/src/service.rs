//! The seam between the session and the remote recommendation service.

use crate::ServiceError;
use async_trait::async_trait;
use kinolern_core::{RecommendRequest, RecommendResponse};
use std::env;
use std::time::Duration;
use url::Url;

/// Environment variable holding the service base URL.
pub const API_URL_ENV: &str = "KINOLERN_API_URL";

/// Client-side timeout for one recommendation call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Stateless function from (feedback history, exclusions) to new candidates.
#[async_trait]
pub trait RecommendationService: Send + Sync {
    async fn recommend(&self, request: &RecommendRequest) -> Result<RecommendResponse, ServiceError>;
}

/// [`RecommendationService`] over HTTP: `POST <base>/api` with a JSON body.
#[derive(Debug, Clone)]
pub struct HttpRecommender {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpRecommender {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let endpoint = build_api_url(base_url)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint })
    }

    /// Reads the base URL from `KINOLERN_API_URL`.
    pub fn from_env(timeout: Duration) -> Result<Self, ServiceError> {
        let base = env::var(API_URL_ENV).map_err(|_| {
            ServiceError::InvalidEndpoint(format!("--api-url or {API_URL_ENV} env var is required"))
        })?;
        Self::new(&base, timeout)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl RecommendationService for HttpRecommender {
    async fn recommend(&self, request: &RecommendRequest) -> Result<RecommendResponse, ServiceError> {
        debug_event!(
            "POST {} with {} rounds, {} exclusions",
            self.endpoint,
            request.rounds.len(),
            request.exclude.len()
        );

        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // The service answers some bad requests with 200 and a plain-text
        // error, so decode explicitly instead of trusting the content type.
        let bytes = resp.bytes().await?;
        let parsed: RecommendResponse = serde_json::from_slice(&bytes)?;
        Ok(parsed)
    }
}

/// Normalizes a base URL so that it points at the `/api` endpoint.
///
/// `http://host`, `http://host/` and `http://host/api` all become
/// `http://host/api`; a path prefix is kept (`http://host/x` → `http://host/x/api`).
pub fn build_api_url(base: &str) -> Result<Url, ServiceError> {
    let mut target = Url::parse(base.trim())
        .map_err(|e| ServiceError::InvalidEndpoint(format!("{base}: {e}")))?;

    let mut segments: Vec<String> = target
        .path_segments()
        .map(|iter| iter.map(String::from).collect())
        .unwrap_or_default();

    if let Some(last) = segments.last() {
        if last.is_empty() {
            segments.pop();
        }
    }
    if segments.last().is_some_and(|s| s == "api") {
        segments.pop();
    }

    target
        .path_segments_mut()
        .map_err(|()| {
            ServiceError::InvalidEndpoint(format!("{base} cannot be used as a base URL"))
        })?
        .clear()
        .extend(segments)
        .push("api");

    Ok(target)
}

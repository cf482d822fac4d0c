//! Jira REST client
//!
//! Every public call is one [`RetryEngine::execute`] whose attempts each
//! take a token from the shared [`RateLimiter`] before touching the network.
//! Status classification and `Retry-After` parsing happen here; backoff and
//! give-up decisions belong to the retry engine.

use super::jira_parser::JiraParser;
use super::{IssueSource, Page, PageCursor};
use crate::ingest::config::IngestConfig;
use crate::ingest::failure::{parse_retry_after, FetchFailure, TerminalError};
use crate::ingest::rate_limit::RateLimiter;
use crate::ingest::retry::{AttemptObserver, RetryEngine, RetryPolicy};
use crate::shutdown::SharedShutdown;
use crate::IssueRecord;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER};
use reqwest::{Client, Url};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Operation label for page fetches
pub const FETCH_PAGE: &str = "fetch_page";
/// Operation label for detail fetches
pub const FETCH_DETAIL: &str = "fetch_detail";
/// Operation label for the connectivity check
pub const CHECK_CONNECTION: &str = "check_connection";

/// HTTP client for the Jira REST API
pub struct JiraHttpClient {
    client: Client,
    base_url: Url,
    page_size: u32,
    fields: String,
    rate_limiter: Arc<RateLimiter>,
    retry: RetryEngine,
}

impl JiraHttpClient {
    /// Create a client from its parts.
    ///
    /// # Arguments
    /// * `config` - Validated configuration (base URL, page size, fields, timeouts)
    /// * `rate_limiter` - Shared limiter gating every attempt
    /// * `retry` - Retry engine wrapping every call
    pub fn new(
        config: &IngestConfig,
        rate_limiter: Arc<RateLimiter>,
        retry: RetryEngine,
    ) -> Result<Self, ClientBuildError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientBuildError::BaseUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientBuildError::BaseUrl(config.base_url.clone()));
        }

        Ok(Self {
            client: build_http_client(config)?,
            base_url,
            page_size: config.page_size,
            fields: config.fields_param(),
            rate_limiter,
            retry,
        })
    }

    /// Create a client with its own limiter and retry engine, both wired to
    /// `shutdown` and reporting attempts to `observer`.
    pub fn from_config(
        config: &IngestConfig,
        shutdown: SharedShutdown,
        observer: Arc<dyn AttemptObserver>,
    ) -> Result<Self, ClientBuildError> {
        let rate_limiter = Arc::new(
            RateLimiter::per_second(config.requests_per_second).with_shutdown(shutdown.clone()),
        );
        let retry = RetryEngine::new(RetryPolicy::from_config(config))
            .with_observer(observer)
            .with_shutdown(shutdown);
        Self::new(config, rate_limiter, retry)
    }

    /// Shared rate limiter
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// One attempt: take a token, send, classify, decode.
    async fn get_json(&self, url: &Url, params: &[(&str, String)]) -> Result<Value, FetchFailure> {
        self.rate_limiter
            .acquire()
            .await
            .map_err(|_| FetchFailure::interrupted())?;

        debug!(url = %url, params = params.len(), "GET");

        let response = self
            .client
            .get(url.clone())
            .query(params)
            .send()
            .await
            .map_err(|e| FetchFailure::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();
            return Err(FetchFailure::from_status(status.as_u16(), retry_after, &body));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchFailure::from_transport(&e))?;

        serde_json::from_slice(&body)
            .map_err(|e| FetchFailure::malformed(format!("response is not valid JSON: {e}")))
    }
}

#[async_trait]
impl IssueSource for JiraHttpClient {
    async fn check_connection(&self) -> Result<(), TerminalError> {
        let url = self.endpoint(&["serverInfo"]);
        let url = &url;
        let version = self
            .retry
            .execute(CHECK_CONNECTION, self.base_url.as_str(), || async move {
                let payload = self.get_json(url, &[]).await?;
                if !payload.is_object() {
                    return Err(FetchFailure::malformed("serverInfo response is not an object"));
                }
                Ok(payload
                    .get("version")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string())
            })
            .await?;

        info!(base_url = %self.base_url, version = %version, "Connected to Jira");
        Ok(())
    }

    async fn fetch_page(&self, project: &str, cursor: PageCursor) -> Result<Page, TerminalError> {
        let url = self.endpoint(&["search"]);
        let params = [
            ("jql", format!("project={project} ORDER BY created ASC")),
            ("startAt", cursor.offset.to_string()),
            ("maxResults", self.page_size.to_string()),
            ("fields", self.fields.clone()),
        ];

        let (url, params) = (&url, &params);
        self.retry
            .execute(FETCH_PAGE, project, || async move {
                let payload = self.get_json(url, params).await?;
                JiraParser::parse_search_page(payload)
            })
            .await
    }

    async fn fetch_detail(&self, key: &str) -> Result<IssueRecord, TerminalError> {
        let url = self.endpoint(&["issue", key]);
        let params = [
            ("fields", self.fields.clone()),
            ("expand", "comments".to_string()),
        ];

        let (url, params) = (&url, &params);
        self.retry
            .execute(FETCH_DETAIL, key, || async move {
                let payload = self.get_json(url, params).await?;
                JiraParser::parse_issue(payload)
            })
            .await
    }
}

fn build_http_client(config: &IngestConfig) -> Result<Client, ClientBuildError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .connect_timeout(config.connect_timeout())
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| ClientBuildError::Http(e.to_string()))
}

/// Errors building the HTTP client
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    /// Base URL could not be used
    #[error("invalid base URL: {0}")]
    BaseUrl(String),

    /// reqwest client could not be built (TLS backend, headers)
    #[error("failed to build HTTP client: {0}")]
    Http(String),
}

//! Typed client for the digest backend REST API.
//!
//! One method per endpoint. Requests are sent once: there is no retry, no
//! timeout and no caching. Any non-2xx status fails the call with
//! [`ApiError::Status`].

use reqwest::{header, Client, Method, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    Article, ArticleQuery, AvailableDates, CategoryArticles, DailyDigest, FetchLog,
    FetchTriggered, Newsletter, NewsletterTriggered, Source, Stats,
};

/// Where API calls are issued from, which decides the base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// A browser talking to the dashboard origin.
    Browser,
    /// The dashboard server talking to the backend directly.
    Server,
}

/// Base URL for API calls made from `context`.
///
/// Browsers use the public override, or relative paths (an empty base) that go
/// through the `/api` proxy. The server uses the internal override or
/// `http://localhost:8000`.
pub fn resolve_base_url(context: ExecutionContext, config: &Config) -> String {
    match context {
        ExecutionContext::Browser => config.public_api_url.clone().unwrap_or_default(),
        ExecutionContext::Server => config.internal_api_url().to_string(),
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Creates a client for an absolute backend base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidBaseUrl`] if `base_url` is not an absolute
    /// URL, or [`ApiError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/');
        Url::parse(base_url).map_err(|e| ApiError::InvalidBaseUrl(format!("{base_url}: {e}")))?;

        let client = Client::builder()
            .user_agent("NewsDigest/1.0 (Dashboard)")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Creates the server-side client described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&resolve_base_url(ExecutionContext::Server, config))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_api<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let result = self.send(method, endpoint, query).await;
        if let Err(e) = &result {
            error!("Failed to fetch {}: {}", endpoint, e);
        }
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("{} {}", method, url);

        let response = self
            .client
            .request(method, &url)
            .header(header::CONTENT_TYPE, "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.fetch_api(Method::GET, endpoint, &[]).await
    }

    /// `GET /api/digest`, for `date` (`YYYY-MM-DD`) or the backend's today.
    pub async fn daily_digest(&self, date: Option<&str>) -> Result<DailyDigest, ApiError> {
        let query: Vec<(&str, String)> = date
            .filter(|d| !d.is_empty())
            .map(|d| ("target_date", d.to_string()))
            .into_iter()
            .collect();
        self.fetch_api(Method::GET, "/api/digest", &query).await
    }

    /// `GET /api/digest/dates`
    pub async fn available_dates(&self) -> Result<AvailableDates, ApiError> {
        self.get("/api/digest/dates").await
    }

    /// `GET /api/articles` with the filters set in `query`.
    pub async fn articles(&self, query: &ArticleQuery) -> Result<Vec<Article>, ApiError> {
        self.fetch_api(Method::GET, "/api/articles", &query.to_pairs())
            .await
    }

    /// `GET /api/articles/{id}`
    pub async fn article(&self, id: i64) -> Result<Article, ApiError> {
        self.get(&format!("/api/articles/{id}")).await
    }

    /// `GET /api/categories/{category}`, optionally limited to one featured date.
    pub async fn category_articles(
        &self,
        category: &str,
        featured_date: Option<&str>,
    ) -> Result<CategoryArticles, ApiError> {
        let query: Vec<(&str, String)> = featured_date
            .filter(|d| !d.is_empty())
            .map(|d| ("featured_date", d.to_string()))
            .into_iter()
            .collect();
        self.fetch_api(Method::GET, &format!("/api/categories/{category}"), &query)
            .await
    }

    /// `GET /api/stats`
    pub async fn stats(&self) -> Result<Stats, ApiError> {
        self.get("/api/stats").await
    }

    /// `POST /api/fetch/trigger`: start a backend ingestion run.
    pub async fn trigger_fetch(&self) -> Result<FetchTriggered, ApiError> {
        self.fetch_api(Method::POST, "/api/fetch/trigger", &[]).await
    }

    /// `GET /api/fetch/logs?limit=N`
    pub async fn fetch_logs(&self, limit: u32) -> Result<Vec<FetchLog>, ApiError> {
        self.fetch_api(
            Method::GET,
            "/api/fetch/logs",
            &[("limit", limit.to_string())],
        )
        .await
    }

    /// `GET /api/fetch/logs/{id}`
    pub async fn fetch_log(&self, id: i64) -> Result<FetchLog, ApiError> {
        self.get(&format!("/api/fetch/logs/{id}")).await
    }

    /// `GET /api/newsletter/latest`
    pub async fn latest_newsletter(&self) -> Result<Newsletter, ApiError> {
        self.get("/api/newsletter/latest").await
    }

    /// `POST /api/newsletter/trigger`: fetch the latest newsletter issue.
    pub async fn trigger_newsletter_fetch(&self) -> Result<NewsletterTriggered, ApiError> {
        self.fetch_api(Method::POST, "/api/newsletter/trigger", &[])
            .await
    }

    /// `GET /api/sources`
    pub async fn sources(&self) -> Result<Vec<Source>, ApiError> {
        self.get("/api/sources").await
    }
}

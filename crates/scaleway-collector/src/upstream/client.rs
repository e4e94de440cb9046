//! HTTP client for the Scaleway REST APIs.

use std::fmt;

use reqwest::{RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use super::{ScrapeContext, UpstreamError};

/// Header carrying the API secret key.
const AUTH_HEADER: &str = "X-Auth-Token";
/// Page size used for list endpoints.
const PAGE_SIZE: usize = 100;

/// Paginated response of a Scaleway list endpoint.
pub trait Paginated: DeserializeOwned + Send {
    /// Listed item.
    type Item: Send;

    /// Total number of items across all pages.
    fn total_count(&self) -> u64;
    /// Extracts items on this page.
    fn into_items(self) -> Vec<Self::Item>;
}

/// Client for the Scaleway REST APIs authenticating with a secret key.
#[derive(Clone)]
pub struct ScalewayClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl fmt::Debug for ScalewayClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ScalewayClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ScalewayClient {
    /// Default API endpoint.
    pub const DEFAULT_API_URL: &'static str = "https://api.scaleway.com";

    /// Creates a client for the default API endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be initialized (e.g., TLS backend
    /// is unavailable).
    pub fn new(secret_key: impl Into<String>) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("scaleway-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: Self::DEFAULT_API_URL.to_owned(),
            secret_key: secret_key.into(),
        })
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }

    /// Returns the API endpoint.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends a `GET` request and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failures, non-successful statuses, decoding failures
    /// and when the scrape deadline is reached.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        cx: &ScrapeContext,
    ) -> Result<T, UpstreamError> {
        let request = self.http.get(self.url(path)).query(query);
        self.send(request, cx).await
    }

    /// Sends a `POST` request with a JSON body and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// Same as for [`Self::get()`].
    pub async fn post<B, T>(&self, path: &str, body: &B, cx: &ScrapeContext) -> Result<T, UpstreamError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.post(self.url(path)).json(body);
        self.send(request, cx).await
    }

    /// Fetches all pages of a list endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if fetching any of the pages fails; partial results are never returned.
    pub async fn list_all<P: Paginated>(
        &self,
        path: &str,
        query: &[(&str, String)],
        cx: &ScrapeContext,
    ) -> Result<Vec<P::Item>, UpstreamError> {
        let mut items = Vec::new();
        for page in 1_usize.. {
            let mut page_query = query.to_vec();
            page_query.push(("page", page.to_string()));
            page_query.push(("page_size", PAGE_SIZE.to_string()));

            let response: P = self.get(path, &page_query, cx).await?;
            let total_count = response.total_count();
            let page_items = response.into_items();
            if page_items.is_empty() {
                break;
            }
            items.extend(page_items);
            if items.len() as u64 >= total_count {
                break;
            }
        }
        Ok(items)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        cx: &ScrapeContext,
    ) -> Result<T, UpstreamError> {
        cx.bounded(async {
            let response = request
                .header(AUTH_HEADER, &self.secret_key)
                .send()
                .await?;
            let status = response.status();
            if status == StatusCode::NOT_IMPLEMENTED {
                return Err(UpstreamError::NotImplemented);
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(UpstreamError::Status { status, body });
            }
            let body = response.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        })
        .await
    }
}

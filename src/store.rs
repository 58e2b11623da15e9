//! The remote content store.
//!
//! The CMS is the system of record; this crate only reads from it. A store
//! takes a GROQ query plus a parameter map and returns the parsed `result`.
//!
//! [`ContentStore`] is the seam between the cache layer and the transport:
//! [`HttpStore`] talks to the Sanity HTTP query API, tests use an in-memory
//! stub that counts calls.
//!
//! ## Request format
//!
//! ```text
//! GET https://<project>.apicdn.sanity.io/v2024-01-01/data/query/<dataset>
//!     ?query=*[_type == "property" && slug.current == $slug][0]{...}
//!     &$slug="riverside-lofts"
//! Authorization: Bearer <token>        (only when a token is configured)
//! ```
//!
//! Parameters are sent JSON-encoded, as the query API expects. The response
//! body is `{"result": ..., "ms": ..., "query": ...}`; only `result` is kept.

use crate::config::StoreConfig;
use reqwest::Url;
use reqwest::blocking::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Content store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Content store response has no 'result' field")]
    MissingResult,
    #[error("Content store is not configured: {0}")]
    NotConfigured(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Query parameters, keyed by name without the `$` prefix.
///
/// Ordered so that identical parameter sets serialize identically, which the
/// cache key relies on.
pub type Params = BTreeMap<String, Value>;

/// A query and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub query: String,
    pub params: Params,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: Params::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

/// Read-only access to the CMS.
///
/// Implementations must be safe to call from several threads at once; page
/// prefetching issues queries in parallel.
pub trait ContentStore: Send + Sync {
    fn query(&self, request: &QueryRequest) -> Result<Value, StoreError>;
}

impl<S: ContentStore + ?Sized> ContentStore for &S {
    fn query(&self, request: &QueryRequest) -> Result<Value, StoreError> {
        (**self).query(request)
    }
}

impl<S: ContentStore + ?Sized> ContentStore for Box<S> {
    fn query(&self, request: &QueryRequest) -> Result<Value, StoreError> {
        (**self).query(request)
    }
}

/// A store that was never set up. Every query fails with the reason, so page
/// loaders serve their fallback copy instead of the CLI refusing to run.
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ContentStore for UnavailableStore {
    fn query(&self, _request: &QueryRequest) -> Result<Value, StoreError> {
        Err(StoreError::NotConfigured(self.reason.clone()))
    }
}

/// The store described by `config`, or an [`UnavailableStore`] when no
/// project is configured. Other setup failures are returned.
pub fn store_from_config(config: &StoreConfig) -> Result<Box<dyn ContentStore>, StoreError> {
    match HttpStore::from_config(config) {
        Ok(store) => Ok(Box::new(store)),
        Err(StoreError::NotConfigured(reason)) => Ok(Box::new(UnavailableStore::new(reason))),
        Err(e) => Err(e),
    }
}

/// Sanity HTTP query API client.
pub struct HttpStore {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpStore {
    /// Build a client from config. The API token is read from the
    /// environment variable named by `token_env`, if set.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::new(
            query_endpoint(config)?,
            token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(
        endpoint: Url,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    fn request_url(&self, request: &QueryRequest) -> Result<Url, StoreError> {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", &request.query);
            for (name, value) in &request.params {
                pairs.append_pair(&format!("${name}"), &serde_json::to_string(value)?);
            }
        }
        Ok(url)
    }
}

impl ContentStore for HttpStore {
    fn query(&self, request: &QueryRequest) -> Result<Value, StoreError> {
        let mut builder = self.client.get(self.request_url(request)?);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().map_err(transport_error)?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        extract_result(&body)
    }
}

/// Connection failures and timeouts become [`StoreError::Transport`]; anything
/// else stays an HTTP error.
fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_connect() || e.is_timeout() {
        StoreError::Transport(e.to_string())
    } else {
        StoreError::Http(e)
    }
}

/// Base query endpoint for a project and dataset.
///
/// Tokens and the CDN do not mix: authenticated requests always go to the
/// live API host.
pub fn query_endpoint(config: &StoreConfig) -> Result<Url, StoreError> {
    if config.project_id.trim().is_empty() {
        return Err(StoreError::NotConfigured("store.project_id is empty".into()));
    }
    let has_token = std::env::var(&config.token_env).is_ok_and(|t| !t.trim().is_empty());
    let host = if config.use_cdn && !has_token {
        "apicdn"
    } else {
        "api"
    };
    let raw = format!(
        "https://{}.{}.sanity.io/v{}/data/query/{}",
        config.project_id, host, config.api_version, config.dataset
    );
    Url::parse(&raw).map_err(|e| StoreError::NotConfigured(format!("{raw}: {e}")))
}

/// Pull `result` out of a query API response body.
///
/// A `null` result is a valid answer (no matching document).
pub fn extract_result(body: &str) -> Result<Value, StoreError> {
    let mut parsed: Value = serde_json::from_str(body)?;
    match parsed.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(StoreError::MissingResult),
    }
}

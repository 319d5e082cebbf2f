//! Pokedex API Client
//!
//! # Creating new api client
//!
//! - [new](PokedexClient::new) - create new client for the public catalog
//! - [with_config](PokedexClient::with_config) - create client with custom configuration
//! - [with_client](PokedexClient::with_client) - create client with configuration and custom reqwest client
//!
//! # Requests
//!
//! - [pokemon_list](PokedexClient::pokemon_list) - list one page of summary references
//! - [pokemon](PokedexClient::pokemon) - get one record by id
//! - [pokemon_by_name](PokedexClient::pokemon_by_name) - get one record by name
//!
//! # Record source
//!
//! [`RecordSource`] is the narrow contract `ListController` depends on.
//! `PokedexClient` implements it over http; tests substitute their own.
//!

use std::{future::Future, sync::Arc, time::Duration};

use tracing::debug;

use crate::{
    DEFAULT_PAGE_SIZE, POKEAPI_URL, Result,
    config::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BACKOFF_MS, MAX_PAGE_SIZE, POKEDEX_URL_ENV},
    http_client::HttpClient,
    prelude::*,
};

/// Whether a refresh may publish when some detail requests failed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum HydrationPolicy {
    /// Publish whatever hydrated; failures are reported in the `RefreshReport`.
    #[default]
    PublishPartial,
    /// Publish only if every detail request succeeded.
    RequireAll,
}

/// Configuration for the client and the list controller.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use pokedex::prelude::*;
/// # fn create_client() -> Result<PokedexClient, PokedexError> {
/// let config = ClientConfig::default()
///     .base_url("http://127.0.0.1:31080")
///     .max_retries(2)
///     .retry_backoff(Duration::from_millis(200));
/// let client = PokedexClient::with_config(config)?;
/// # Ok(client)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base url for catalog requests, without trailing slash.
    /// Defaults to `pokedex::POKEAPI_URL`. See [`ClientConfig::from_env`]
    /// to take it from the environment.
    pub base_url: String,

    /// Number of summaries requested per refresh.
    pub page_size: usize,

    /// Retries for 408/429/504 responses and connect/timeout errors.
    /// The default (0) issues each request exactly once.
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries.
    pub retry_backoff: Duration,

    /// What a refresh does when some detail requests fail.
    pub hydration_policy: HydrationPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: POKEAPI_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            hydration_policy: HydrationPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Default configuration, with `base_url` taken from `POKEDEX_URL` if it is set.
    pub fn from_env() -> Self {
        match std::env::var(POKEDEX_URL_ENV) {
            Ok(url) if !url.is_empty() => Self::default().base_url(&url),
            _ => Self::default(),
        }
    }

    /// Sets the base url.
    pub fn base_url(self, base_url: &str) -> Self {
        ClientConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..self
        }
    }

    pub fn page_size(self, page_size: usize) -> Self {
        ClientConfig { page_size, ..self }
    }

    pub fn max_retries(self, max_retries: u32) -> Self {
        ClientConfig {
            max_retries,
            ..self
        }
    }

    pub fn retry_backoff(self, retry_backoff: Duration) -> Self {
        ClientConfig {
            retry_backoff,
            ..self
        }
    }

    pub fn hydration_policy(self, hydration_policy: HydrationPolicy) -> Self {
        ClientConfig {
            hydration_policy,
            ..self
        }
    }
}

/// Client for the catalog list and detail endpoints.
#[derive(Debug)]
pub struct PokedexClient {
    pub(crate) client: Arc<HttpClient>,
    pub(crate) config: ClientConfig,
}

impl PokedexClient {
    /// Creates a new client for the public catalog with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with the provided configuration.
    ///
    /// # Example
    /// ```rust,no_run
    /// use pokedex::prelude::*;
    /// # fn create_client() -> Result<PokedexClient, PokedexError> {
    /// let client = PokedexClient::with_config(ClientConfig::from_env())?;
    /// # Ok(client)
    /// # }
    /// ```
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_client(reqwest::Client::builder(), config)
    }

    /// Creates a client from a `reqwest::ClientBuilder` and configuration.
    /// ClientBuilder can be customized with timeouts, proxies, dns servers, user_agent, etc.
    ///
    /// # Example
    /// ```rust,no_run
    /// use pokedex::prelude::*;
    /// # fn create_client() -> Result<PokedexClient, PokedexError> {
    /// let builder = reqwest::Client::builder().timeout(std::time::Duration::from_secs(10));
    /// let client = PokedexClient::with_client(builder, ClientConfig::default())?;
    /// # Ok(client)
    /// # }
    /// ```
    pub fn with_client(client: reqwest::ClientBuilder, config: ClientConfig) -> Result<Self> {
        debug!(url=?config.base_url, "new client");
        let client = HttpClient::new(
            client,
            config.base_url.clone(),
            config.max_retries,
            config.retry_backoff,
        )?;
        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    /// Returns the configuration.
    pub fn get_config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns a snapshot of current HTTP metrics.
    pub fn http_metrics(&self) -> HttpMetricsSnapshot {
        self.client.metrics_snapshot()
    }

    /// Decodes the response of a GET to `path` (relative to the base url).
    /// Each call yields exactly one outcome: the decoded value or an error.
    pub async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.client.get_request(path, Vec::new()).await
    }

    /// Creates a request builder for one page of summary references.
    pub fn pokemon_list(&self) -> ListRecordsRequest {
        ListRecordsRequest::new(self.client.clone())
    }

    /// Creates a request builder for a single record.
    pub fn pokemon(&self, id: u32) -> RecordRequest {
        RecordRequest::new(self.client.clone(), id.to_string())
    }

    /// Creates a request builder for a single record, looked up by name.
    pub fn pokemon_by_name(&self, name: impl Into<String>) -> RecordRequest {
        RecordRequest::new(self.client.clone(), name.into())
    }
}

/// Request builder for listing summary references.
///
/// Obtained via [`PokedexClient::pokemon_list`].
#[derive(Debug)]
pub struct ListRecordsRequest {
    client: Arc<HttpClient>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl ListRecordsRequest {
    pub(crate) fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            limit: None,
            offset: None,
        }
    }

    /// Sets the page size.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the page offset.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Executes the list request.
    pub async fn list(self) -> Result<RecordList> {
        let mut query = Vec::new();
        if let Some(limit) = self.limit {
            if limit == 0 || limit > MAX_PAGE_SIZE {
                return Err(PokedexError::Validation {
                    message: format!("limit {limit} outside 1..={MAX_PAGE_SIZE}"),
                });
            }
            query.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            query.push(("offset".to_string(), offset.to_string()));
        }
        self.client.get_request("/pokemon", query).await
    }
}

/// Request builder for a single record.
///
/// Obtained via [`PokedexClient::pokemon`] or [`PokedexClient::pokemon_by_name`].
#[derive(Debug)]
pub struct RecordRequest {
    client: Arc<HttpClient>,
    key: String,
}

impl RecordRequest {
    pub(crate) fn new(client: Arc<HttpClient>, key: String) -> Self {
        Self { client, key }
    }

    /// Retrieves the record.
    pub async fn get(self) -> Result<Record> {
        let key = self.key.trim().to_lowercase();
        if key.is_empty() || key.contains('/') {
            return Err(PokedexError::Validation {
                message: format!("invalid record key {:?}", self.key),
            });
        }
        self.client
            .get_request(&format!("/pokemon/{key}/"), Vec::new())
            .await
    }
}

/// Source of summary pages and hydrated records.
///
/// `ListController` depends only on this contract, so it can be driven by
/// [`PokedexClient`] or by a test double.
pub trait RecordSource: Send + Sync {
    /// Fetches one page of `limit` summary references.
    fn fetch_list(&self, limit: usize) -> impl Future<Output = Result<RecordList>> + Send;

    /// Fetches the full record behind a summary reference.
    fn fetch_detail(&self, reference: &RecordRef) -> impl Future<Output = Result<Record>> + Send;
}

impl RecordSource for PokedexClient {
    async fn fetch_list(&self, limit: usize) -> Result<RecordList> {
        self.pokemon_list().limit(limit).list().await
    }

    async fn fetch_detail(&self, reference: &RecordRef) -> Result<Record> {
        let id = reference.id()?;
        self.pokemon(id).get().await
    }
}

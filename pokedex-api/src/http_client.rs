//! HttpClient middleware used by PokedexClient
//!
//! Responsible for
//!  - handing all HTTP api requests
//!  - logging/tracing
//!  - optional retries and backoff (for timeouts and connection errors)
//!  - request metrics

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use reqwest::{ClientBuilder, Method, StatusCode};
use serde::de::DeserializeOwned;
use snafu::prelude::*;
use tracing::{debug, error, trace, warn};

use crate::{Result, prelude::*};

/// HTTP metrics tracked using atomic counters for thread-safe access.
/// These counters are cumulative and never reset during the client's lifetime.
#[derive(Debug, Default)]
pub struct HttpMetrics {
    /// Total number of HTTP requests sent to the server
    total_requests: AtomicU64,
    /// Total number of successful responses (2xx status codes)
    successful_responses: AtomicU64,
    /// Total number of error responses and transport failures
    errors: AtomicU64,
    /// Total number of retry attempts
    retries: AtomicU64,
    /// Total bytes received in response bodies
    bytes_received: AtomicU64,
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of current metrics as plain u64 values
    pub fn snapshot(&self) -> HttpMetricsSnapshot {
        HttpMetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_responses: self.successful_responses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }

    fn increment_requests(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_success(&self) {
        self.successful_responses.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_retries(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn add_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of HTTP metrics with plain u64 values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpMetricsSnapshot {
    /// Total number of HTTP requests sent to the server
    pub total_requests: u64,
    /// Total number of successful responses (2xx status codes)
    pub successful_responses: u64,
    /// Total number of error responses and transport failures
    pub errors: u64,
    /// Total number of retry attempts
    pub retries: u64,
    /// Total bytes received in response bodies
    pub bytes_received: u64,
}

impl std::fmt::Display for HttpMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requests={} success={} errors={} retries={} recv={}",
            self.total_requests,
            self.successful_responses,
            self.errors,
            self.retries,
            format_bytes(self.bytes_received),
        )
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// status codes where it's ok to retry and backoff
fn retry_for_status(code: StatusCode) -> bool {
    match code {
      StatusCode::TOO_MANY_REQUESTS /* 429 */ |
      StatusCode::GATEWAY_TIMEOUT /* 504 */ |
      StatusCode::REQUEST_TIMEOUT /* 408 */ => true,
      _ => false,
    }
}

#[derive(Clone, Default)]
pub(crate) struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    pub client: reqwest::Client,

    /// Base URL for API requests (e.g., "https://pokeapi.co/api/v2")
    pub base_url: String,

    // Retries for transient failures; 0 disables retry.
    max_retries: u32,

    // Base delay for exponential backoff
    retry_backoff: Duration,

    /// HTTP request/response metrics
    pub metrics: Arc<HttpMetrics>,
}

impl HttpClient {
    pub fn new(
        builder: ClientBuilder,
        base_url: String,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Result<Self> {
        let client = builder.build().context(HttpSnafu {
            method: "client-init",
            url: "",
        })?;
        Ok(HttpClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            retry_backoff,
            metrics: Arc::new(HttpMetrics::new()),
        })
    }

    /// Returns a snapshot of current HTTP metrics
    pub fn metrics_snapshot(&self) -> HttpMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) async fn get_request<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T> {
        let req = HttpRequest {
            method: Method::GET,
            path: path.into(),
            query,
        };
        self.send(req).await
    }

    /// This function handles all catalog requests
    /// - retries up to `max_retries` times for connection failures or server timeout
    /// - maps http error codes into PokedexErrors
    /// - deserializes json response body into return type T
    pub(crate) async fn send<T: DeserializeOwned>(&self, req: HttpRequest) -> Result<T> {
        let mut attempt = 0u32;

        let full_url = format!("{}{}", self.base_url, req.path);
        let req_builder = self
            .client
            .request(req.method.clone(), &full_url)
            .query(&req.query);

        // debug log (if tracing enabled)
        debug!(method=%req.method, path=%req.path, "request");
        log_request(&req_builder);

        loop {
            let request = req_builder.try_clone().ok_or_else(|| {
                // try_clone with no body should never return None
                PokedexError::Other {
                    message: "reqwest::RequestBuilder internal error".into(),
                }
            })?;

            self.metrics.increment_requests();

            match request.send().await {
                Ok(response) => {
                    let code = response.status();
                    match code {
                        ok if ok.is_success() => {
                            let body = response.bytes().await.context(HttpSnafu {
                                method: req.method.to_string(),
                                url: req.path.clone(),
                            })?;
                            self.metrics.increment_success();
                            self.metrics.add_bytes_received(body.len() as u64);

                            log_response(&req.path, &body);

                            // deserialization failure should not be retried
                            return deserialize_json(&body);
                        }
                        StatusCode::NOT_FOUND /* 404 */ |
                        StatusCode::GONE /* 410 */ => {
                            self.metrics.increment_errors();
                            let message = response.text().await.unwrap_or("NotFound".into());
                            error!(?code, ?message, ?req, "http");
                            return Err(PokedexError::NotFound {
                                obj_type: "Record".into(),
                                key: req.path,
                            });
                        }
                        _ => {
                            let message = response.text().await.unwrap_or_default();
                            error!(?code, ?req, message, attempt, "http");
                            self.metrics.increment_errors();
                            if attempt < self.max_retries && retry_for_status(code) {
                                log_and_backoff(attempt, self.retry_backoff, code.to_string())
                                    .await;
                                self.metrics.increment_retries();
                                attempt += 1;
                                continue;
                            }
                            return Err(PokedexError::ApiError {
                                code: code.as_u16(),
                                method: req.method.to_string(),
                                url: req.path,
                                message,
                            });
                        }
                    }
                }
                Err(e) => {
                    error!(source=?e, ?req, "http");
                    self.metrics.increment_errors();
                    if (e.is_connect() || e.is_timeout()) && attempt < self.max_retries {
                        log_and_backoff(attempt, self.retry_backoff, e.to_string()).await;
                        self.metrics.increment_retries();
                        attempt += 1;
                        continue;
                    }
                    return Err(PokedexError::Http {
                        method: req.method.to_string(),
                        url: req.path,
                        source: e,
                    });
                }
            }
        }
    }
}

// dump request
// requires RUST_LOG=pokedex::http_json=trace
fn log_request(builder: &reqwest::RequestBuilder) {
    if tracing::enabled!(target: "pokedex::http_json", tracing::Level::TRACE)
        && let Some(req) = builder.try_clone().and_then(|b| b.build().ok())
    {
        let method = req.method().as_str();
        let url = req.url();
        trace!(target: "pokedex::http_json", "{method} url={url}");
    }
}

// dump json response, for debugging
fn log_response(path: &str, body: &Bytes) {
    if tracing::enabled!(target: "pokedex::http_json", tracing::Level::TRACE) {
        trace!(target: "pokedex::http_json", "Response path={path} body={}",
            String::from_utf8_lossy(body)
        );
    }
}

// deserialize, reporting errors with 'serde_path_to_error', which provides
// detailed json path to the error
fn deserialize_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    match serde_path_to_error::deserialize(&mut deserializer) {
        Ok(value) => Ok(value),
        Err(err) => {
            error!("Deserialization failed at {}: {}", err.path(), err);
            Err(PokedexError::Deserialization {
                source: err.into_inner(),
            })
        }
    }
}

/// Delay before retry number `attempt`: base * 2^attempt, scaled by a jitter in [0.5, 1.5).
fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let jitter = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as f64
        / 1_000_000_000.0;
    base.saturating_mul(2u32.saturating_pow(attempt))
        .mul_f64(0.5 + jitter)
}

// log attempt and sleep for exponential backoff
async fn log_and_backoff(attempt: u32, base: Duration, err: String) {
    let delay = backoff_delay(attempt, base);
    warn!(
        "Recoverable error {err}. Attempt {attempt}. Waiting {}ms before retry",
        delay.as_millis()
    );
    tokio::time::sleep(delay).await;
}

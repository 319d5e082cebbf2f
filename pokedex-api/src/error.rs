//! Errors returned by `PokedexClient` and `ListController`
//!
use snafu::prelude::*;

use crate::controller::DetailFailure;

/// Errors returned by pokedex crate
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PokedexError {
    // Http connection or timeout error
    #[snafu(display("HTTP error {method} url:{url}"))]
    Http {
        method: String,
        url: String,
        source: reqwest::Error,
    },

    /// Server responded with a non-success status.
    #[snafu(display("Api Server reported error ({code}) {method} {url}: {message}"))]
    ApiError {
        code: u16,
        method: String,
        url: String,
        message: String,
    },

    /// Requested record does not exist (404/410).
    #[snafu(display("{obj_type} {key} not found"))]
    NotFound { obj_type: String, key: String },

    /// Response body could not be decoded into the expected type.
    #[snafu(display("Deserialization: {source}"))]
    Deserialization { source: serde_json::Error },

    /// Request parameters failed a local check before sending.
    #[snafu(display("Validation error: {message}"))]
    Validation { message: String },

    /// The listing request of a refresh cycle failed. Nothing was published.
    #[snafu(display("list fetch failed: {source}"))]
    ListFetchFailed { source: Box<PokedexError> },

    /// One or more detail requests failed and the hydration policy requires all of them.
    #[snafu(display("{} detail fetch(es) failed", failures.len()))]
    DetailFetchFailed { failures: Vec<DetailFailure> },

    /// A summary reference has no usable id.
    #[snafu(display("reference has no numeric id: {url}"))]
    InvalidRef { url: String },

    /// Selected row is outside the visible projection.
    #[snafu(display("index {index} out of range (visible: {len})"))]
    IndexOutOfRange { index: usize, len: usize },

    /// Some other error occurred
    #[snafu(display("{message}"))]
    Other { message: String },
}

impl PokedexError {
    /// True for failures where the same request may succeed later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => source.is_connect() || source.is_timeout(),
            Self::ApiError { code, .. } => matches!(code, 408 | 429 | 500..=599),
            _ => false,
        }
    }
}

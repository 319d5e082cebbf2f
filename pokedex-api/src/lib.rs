/*
 * Pokedex list client
 *
 * SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
 * SPDX-License-Identifier: Apache-2.0
 */
//! # Pokedex List Client
//!
//! Fetches one page of catalog summaries, hydrates each summary with a
//! detail request, and keeps a searchable, id-ordered projection of the
//! hydrated records for a list screen.
//!
//! ## Features
//!
//! - fluent request builders for the list and detail endpoints
//! - refresh pipeline with an explicit state machine
//! - concurrent hydration joined before publishing
//! - typed list/detail failures, with caller-chosen partial policy
//! - case-insensitive substring search, ordered by id
//! - http pipeline with logging, optional retries, and metrics
//! - in-process mock catalog server for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pokedex::prelude::*;
//! # async fn example() -> Result<(), PokedexError> {
//!
//! let client = Arc::new(PokedexClient::new()?);
//! let controller = ListController::new(client);
//!
//! // fetch the page and hydrate every entry
//! let report = controller.refresh().await?;
//! println!("loaded {} ({} failed)", report.loaded, report.failures.len());
//!
//! // search
//! controller.on_query_changed("char");
//! for index in 0..controller.item_count() {
//!     if let Some(record) = controller.item_at(index) {
//!         println!("#{} {}", record.id, record.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Direct API access
//!
//! ```rust,no_run
//! use pokedex::prelude::*;
//! # async fn example(client: &PokedexClient) -> Result<(), PokedexError> {
//! let page = client.pokemon_list().limit(30).list().await?;
//! let first = client.pokemon(1).get().await?;
//! println!("{} refs, first is {}", page.len(), first.name);
//! # Ok(())
//! # }
//! ```
//!
#![allow(clippy::missing_errors_doc)] // pedantic
#![allow(clippy::missing_const_for_fn)] //  nursery function
#![allow(clippy::must_use_candidate)] // pedantic
#![warn(clippy::default_trait_access)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::implicit_clone)]
#![warn(clippy::match_same_arms)]
#![warn(clippy::needless_raw_strings)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::redundant_closure)]
#![warn(clippy::uninlined_format_args)]
#![warn(clippy::unused_async)]

pub mod client;
pub mod controller;
pub mod error;
pub mod filter;
mod http_client;
#[cfg(feature = "mock")]
#[doc(hidden)]
pub mod mock;
pub mod records;

#[cfg(feature = "mock")]
pub mod test_util;

/// Result type alias using `PokedexError` as the default error.
pub type Result<T, E = crate::error::PokedexError> = std::result::Result<T, E>;

/// Prelude module - import the common types with `use pokedex::prelude::*;`
pub mod prelude {
    pub use super::{DEFAULT_PAGE_SIZE, POKEAPI_URL};
    // Error types
    pub use crate::error::*;
    pub use crate::{
        client::{ClientConfig, HydrationPolicy, PokedexClient, RecordSource},
        controller::{DetailFailure, ListController, RefreshReport, RefreshState, Transition},
        filter::filter,
        // HTTP metrics
        http_client::HttpMetricsSnapshot,
        records::{Record, RecordList, RecordRef, Sprites, TypeSlot},
    };
}

// ============================================================================
// CONSTANTS
// ============================================================================

/// Public catalog endpoint
pub const POKEAPI_URL: &str = "https://pokeapi.co/api/v2";

/// Number of summaries requested per refresh
pub const DEFAULT_PAGE_SIZE: usize = 30;

pub(crate) mod config {
    /// Environment variable for the endpoint url, read by `ClientConfig::from_env`
    pub const POKEDEX_URL_ENV: &str = "POKEDEX_URL";

    /// Largest page the list builder accepts
    pub const MAX_PAGE_SIZE: usize = 1000;

    /// Retries for transient failures. Zero keeps the one-call-one-outcome contract.
    pub const DEFAULT_MAX_RETRIES: u32 = 0;

    /// Base delay for exponential backoff between retries (milliseconds).
    pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;
}

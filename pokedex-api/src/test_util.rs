//! Test utilities
//!
//! Helper functions used to test the `pokedex` library.
//! These are not part of the supported api and are subject to change.
//!
#![doc(hidden)]

use std::{
    collections::{HashMap, HashSet, VecDeque},
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::FutureExt;
use parking_lot::Mutex;
use snafu::prelude::*;
use tokio::sync::Notify;

use crate::{
    client::{ClientConfig, PokedexClient, RecordSource},
    error::PokedexError,
    mock::{MockCatalogHandle, MockCatalogServer},
    records::{Record, RecordList, RecordRef, Sprites},
};

// =============================================================================
// TestError
// =============================================================================

#[doc(hidden)]
pub type TestResult<T> = std::result::Result<T, TestError>;

#[doc(hidden)]
#[derive(Debug, Snafu)]
pub enum TestError {
    #[snafu(display("API error: {source}"))]
    Api { source: PokedexError },

    #[snafu(display("Mock server error: {source}"))]
    Server { source: std::io::Error },

    #[snafu(display("Test assertion failed: {message}"))]
    Assertion { message: String },
}

impl From<PokedexError> for TestError {
    fn from(source: PokedexError) -> Self {
        TestError::Api { source }
    }
}

// =============================================================================
// MockContext
// =============================================================================

/// A running mock catalog server and a client pointed at it.
#[doc(hidden)]
pub struct MockContext {
    pub server: MockCatalogHandle,
    pub client: Arc<PokedexClient>,
}

impl MockContext {
    /// Starts the seeded mock server on a free port.
    pub async fn new() -> TestResult<Self> {
        Self::with_server(MockCatalogServer::new(), test_config()).await
    }

    pub async fn with_server(server: MockCatalogServer, config: ClientConfig) -> TestResult<Self> {
        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        let server = server.start(addr).await.context(ServerSnafu)?;
        let client = PokedexClient::with_config(config.base_url(&server.base_url()))?;
        Ok(Self {
            server,
            client: Arc::new(client),
        })
    }
}

/// Client configuration for tests: short backoff, no retries.
pub fn test_config() -> ClientConfig {
    ClientConfig::default().retry_backoff(Duration::from_millis(10))
}

/// Runs `f` with a fresh seeded mock server, shutting it down afterwards,
/// even if `f` panics.
#[doc(hidden)]
pub async fn with_mock_context<F, Fut, T>(f: F) -> TestResult<T>
where
    F: FnOnce(Arc<MockContext>) -> Fut,
    Fut: std::future::Future<Output = TestResult<T>>,
{
    let ctx = Arc::new(MockContext::new().await?);
    let result = std::panic::AssertUnwindSafe(f(Arc::clone(&ctx)))
        .catch_unwind()
        .await;
    if let Ok(ctx) = Arc::try_unwrap(ctx) {
        ctx.server.shutdown().await;
    }
    match result {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

// =============================================================================
// StubSource
// =============================================================================

struct StubPage {
    ids: Result<Vec<u32>, String>,
    gate: Option<Arc<Notify>>,
}

/// Scripted in-memory `RecordSource`.
///
/// Each `fetch_list` consumes the next scripted page. Detail requests can be
/// made to fail, or held until their gate is released with `Notify::notify_one`.
#[doc(hidden)]
#[derive(Default)]
pub struct StubSource {
    records: Mutex<HashMap<u32, Record>>,
    pages: Mutex<VecDeque<StubPage>>,
    failing: Mutex<HashSet<u32>>,
    gates: Mutex<HashMap<u32, Arc<Notify>>>,
    list_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    details_settled: AtomicUsize,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record to the detail table.
    pub fn with_record(self, id: u32, name: &str) -> Self {
        self.records.lock().insert(id, record(id, name));
        self
    }

    /// Scripts the next page.
    pub fn push_page(&self, ids: &[u32]) {
        self.pages.lock().push_back(StubPage {
            ids: Ok(ids.to_vec()),
            gate: None,
        });
    }

    /// Scripts a page that is only returned after the returned gate is notified.
    pub fn push_gated_page(&self, ids: &[u32]) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.pages.lock().push_back(StubPage {
            ids: Ok(ids.to_vec()),
            gate: Some(gate.clone()),
        });
        gate
    }

    /// Scripts a failed list request.
    pub fn push_failed_page(&self, message: &str) {
        self.pages.lock().push_back(StubPage {
            ids: Err(message.to_string()),
            gate: None,
        });
    }

    pub fn fail_detail(&self, id: u32) {
        self.failing.lock().insert(id);
    }

    pub fn heal_detail(&self, id: u32) {
        self.failing.lock().remove(&id);
    }

    /// Holds detail requests for `id` until the returned gate is notified.
    pub fn gate_detail(&self, id: u32) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(id, gate.clone());
        gate
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    /// Detail requests that have returned, successfully or not.
    pub fn details_settled(&self) -> usize {
        self.details_settled.load(Ordering::SeqCst)
    }

    async fn resolve_detail(&self, reference: &RecordRef) -> crate::Result<Record> {
        let id = reference.id()?;
        let gate = self.gates.lock().get(&id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing.lock().contains(&id) {
            return Err(PokedexError::ApiError {
                code: 500,
                method: "GET".into(),
                url: format!("/pokemon/{id}/"),
                message: "stub failure".into(),
            });
        }
        let found = self.records.lock().get(&id).cloned();
        found.ok_or_else(|| PokedexError::NotFound {
            obj_type: "Record".into(),
            key: id.to_string(),
        })
    }
}

impl RecordSource for StubSource {
    async fn fetch_list(&self, _limit: usize) -> crate::Result<RecordList> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let page = self.pages.lock().pop_front();
        let Some(page) = page else {
            return Err(PokedexError::Other {
                message: "no page scripted".into(),
            });
        };
        if let Some(gate) = page.gate {
            gate.notified().await;
        }
        let ids = page
            .ids
            .map_err(|message| PokedexError::Other { message })?;
        Ok(RecordList {
            count: ids.len(),
            next: None,
            previous: None,
            results: ids
                .iter()
                .map(|id| RecordRef::new(format!("record-{id}"), format!("stub://pokemon/{id}/")))
                .collect(),
        })
    }

    async fn fetch_detail(&self, reference: &RecordRef) -> crate::Result<Record> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.resolve_detail(reference).await;
        self.details_settled.fetch_add(1, Ordering::SeqCst);
        result
    }
}

/// Builds a record with only `id` and `name` set.
pub fn record(id: u32, name: &str) -> Record {
    Record {
        id,
        name: name.to_string(),
        height: 0,
        weight: 0,
        base_experience: None,
        types: Vec::new(),
        sprites: Sprites::default(),
    }
}

/// Ids of `records`, in order.
pub fn ids(records: &[Record]) -> Vec<u32> {
    records.iter().map(|r| r.id).collect()
}

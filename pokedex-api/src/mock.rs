//! Mock catalog HTTP server for the list and detail endpoints.
//!
//! Serves `GET /pokemon?limit=&offset=` and `GET /pokemon/{id-or-name}/`
//! from an in-memory table, with per-record failure injection for tests.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    net::SocketAddr,
    sync::Arc,
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;
use tracing::debug;

/// First catalog entries, (name, primary type), ids starting at 1.
const SEED_RECORDS: &[(&str, &str)] = &[
    ("bulbasaur", "grass"),
    ("ivysaur", "grass"),
    ("venusaur", "grass"),
    ("charmander", "fire"),
    ("charmeleon", "fire"),
    ("charizard", "fire"),
    ("squirtle", "water"),
    ("wartortle", "water"),
    ("blastoise", "water"),
    ("caterpie", "bug"),
    ("metapod", "bug"),
    ("butterfree", "bug"),
    ("weedle", "bug"),
    ("kakuna", "bug"),
    ("beedrill", "bug"),
    ("pidgey", "normal"),
    ("pidgeotto", "normal"),
    ("pidgeot", "normal"),
    ("rattata", "normal"),
    ("raticate", "normal"),
    ("spearow", "normal"),
    ("fearow", "normal"),
    ("ekans", "poison"),
    ("arbok", "poison"),
    ("pikachu", "electric"),
    ("raichu", "electric"),
    ("sandshrew", "ground"),
    ("sandslash", "ground"),
    ("nidoran-f", "poison"),
    ("nidorina", "poison"),
    ("nidoqueen", "poison"),
    ("nidoran-m", "poison"),
];

/// Page size when the request has no `limit`.
const DEFAULT_LIST_LIMIT: usize = 20;

type SharedState = Arc<Mutex<MockState>>;

/// Handle to a running mock server.
pub struct MockCatalogHandle {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
    state: SharedState,
}

impl MockCatalogHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base url to configure a client with, e.g. `http://127.0.0.1:40123`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Detail requests for `id` answer 500.
    pub fn fail_detail(&self, id: u32) {
        self.state.lock().failing.insert(id);
    }

    /// Detail requests for `id` answer 504 `times` times, then succeed.
    pub fn flaky_detail(&self, id: u32, times: u32) {
        self.state.lock().flaky.insert(id, times);
    }

    /// Detail requests for `id` answer 200 with a body that is not a record.
    pub fn malformed_detail(&self, id: u32) {
        self.state.lock().malformed.insert(id);
    }

    /// Clears all injected detail failures.
    pub fn heal_details(&self) {
        let mut state = self.state.lock();
        state.failing.clear();
        state.flaky.clear();
        state.malformed.clear();
    }

    /// List requests answer 200 with a body that has no `results`.
    pub fn malformed_list(&self, malformed: bool) {
        self.state.lock().malformed_list = malformed;
    }

    /// List requests answer with `status` until cleared with `None`.
    pub fn fail_list(&self, status: Option<u16>) {
        self.state.lock().list_status = status;
    }

    pub fn list_hits(&self) -> u64 {
        self.state.lock().list_hits
    }

    pub fn detail_hits(&self) -> u64 {
        self.state.lock().detail_hits
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}

#[derive(Clone)]
pub struct MockCatalogServer {
    state: SharedState,
}

impl MockCatalogServer {
    /// Server seeded with the first catalog entries.
    pub fn new() -> Self {
        Self::with_records(
            SEED_RECORDS
                .iter()
                .zip(1u32..)
                .map(|((name, kind), id)| (id, name.to_string(), kind.to_string())),
        )
    }

    /// Server with a custom table of (id, name, type).
    pub fn with_records(records: impl IntoIterator<Item = (u32, String, String)>) -> Self {
        let state = MockState {
            records: records
                .into_iter()
                .map(|(id, name, kind)| (id, MockRecord { name, kind }))
                .collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/pokemon", get(list_handler))
            .route("/pokemon/", get(list_handler))
            .route("/pokemon/{key}", get(detail_handler))
            .route("/pokemon/{key}/", get(detail_handler))
            .with_state(self.state.clone())
    }

    /// Binds `addr` (port 0 picks a free port) and serves until the handle is shut down.
    pub async fn start(self, addr: SocketAddr) -> std::io::Result<MockCatalogHandle> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        self.state.lock().base_url = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = self.router();
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });
        debug!(%addr, "mock catalog server started");
        Ok(MockCatalogHandle {
            addr,
            shutdown: shutdown_tx,
            task,
            state: self.state,
        })
    }
}

impl Default for MockCatalogServer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct MockRecord {
    name: String,
    kind: String,
}

#[derive(Debug, Default)]
struct MockState {
    base_url: String,
    records: BTreeMap<u32, MockRecord>,
    failing: HashSet<u32>,
    flaky: HashMap<u32, u32>,
    malformed: HashSet<u32>,
    list_status: Option<u16>,
    malformed_list: bool,
    list_hits: u64,
    detail_hits: u64,
}

impl MockState {
    fn find(&self, key: &str) -> Option<(u32, &MockRecord)> {
        match key.parse::<u32>() {
            Ok(id) => self.records.get(&id).map(|record| (id, record)),
            Err(_) => self
                .records
                .iter()
                .find(|(_, record)| record.name == key)
                .map(|(id, record)| (*id, record)),
        }
    }

    fn record_json(&self, id: u32, record: &MockRecord) -> serde_json::Value {
        json!({
            "id": id,
            "name": record.name,
            "height": 3 + id % 17,
            "weight": 10 * id,
            "base_experience": 50 + id,
            "order": id,
            "types": [
                {"slot": 1, "type": {"name": record.kind, "url": format!("{}/type/{}/", self.base_url, record.kind)}}
            ],
            "sprites": {
                "front_default": format!("{}/sprites/{id}.png", self.base_url),
                "back_default": null,
                "front_shiny": null
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_handler(
    State(shared): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Response {
    let mut state = shared.lock();
    state.list_hits += 1;
    if let Some(code) = state.list_status {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "list unavailable").into_response();
    }
    if state.malformed_list {
        return Json(json!({ "detail": "Not found." })).into_response();
    }

    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let offset = params.offset.unwrap_or(0);
    let count = state.records.len();
    let results: Vec<serde_json::Value> = state
        .records
        .iter()
        .skip(offset)
        .take(limit)
        .map(|(id, record)| {
            json!({
                "name": record.name,
                "url": format!("{}/pokemon/{id}/", state.base_url),
            })
        })
        .collect();
    let end = offset.saturating_add(limit);
    let next = (end < count)
        .then(|| format!("{}/pokemon?offset={end}&limit={limit}", state.base_url));
    Json(json!({
        "count": count,
        "next": next,
        "previous": null,
        "results": results,
    }))
    .into_response()
}

async fn detail_handler(State(shared): State<SharedState>, Path(key): Path<String>) -> Response {
    let mut state = shared.lock();
    state.detail_hits += 1;
    let Some((id, _)) = state.find(&key) else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };
    if state.failing.contains(&id) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "detail unavailable").into_response();
    }
    if let Some(remaining) = state.flaky.get_mut(&id)
        && *remaining > 0
    {
        *remaining -= 1;
        return (StatusCode::GATEWAY_TIMEOUT, "try again").into_response();
    }
    if state.malformed.contains(&id) {
        return Json(json!({ "id": "not-a-number" })).into_response();
    }
    match state.find(&key) {
        Some((id, record)) => Json(state.record_json(id, record)).into_response(),
        None => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

//! # List controller
//!
//! Owns the hydrated record set behind a list screen and the filtered,
//! id-ordered projection the screen renders.
//!
//! A refresh cycle runs `Idle -> Listing -> Hydrating -> Ready` (or `Failed`):
//!
//! 1. `refresh()` starts a new cycle and requests one page of summaries.
//! 2. Every summary is hydrated with its own detail request; all of them are
//!    in flight at once.
//! 3. Each detail settles into its own slot. Under `PublishPartial` a hydrated
//!    record is added to the set, and the projection recomputed, as soon as its
//!    request finishes. Under `RequireAll` the set is only replaced at the end.
//! 4. The cycle reaches `Ready` (or `Failed`) once every slot has settled,
//!    successfully or not; the loading state ends only then.
//!
//! Refreshes may overlap. Each one gets a cycle number, and only the newest
//! cycle may publish or move the state machine; an older cycle finishes with
//! `applied == false`. The previous set stays visible until the new cycle's
//! page arrives.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pokedex::prelude::*;
//! # async fn example() -> Result<(), PokedexError> {
//! let controller = ListController::new(Arc::new(PokedexClient::new()?));
//! let report = controller.refresh().await?;
//! if !report.failures.is_empty() {
//!     let refs = report.failures.iter().map(|f| f.reference.clone()).collect();
//!     controller.retry_details(refs).await?;
//! }
//! controller.on_query_changed("saur");
//! let first = controller.on_select(0)?;
//! # Ok(())
//! # }
//! ```

use std::{collections::BTreeMap, sync::Arc};

use futures::{StreamExt, stream::FuturesUnordered};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    Result,
    client::{ClientConfig, HydrationPolicy, RecordSource},
    error::PokedexError,
    filter::filter,
    records::{Record, RecordRef},
};

/// Where the controller is in its refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RefreshState {
    /// No refresh has started yet.
    #[default]
    Idle,
    /// Waiting for the page of summaries.
    Listing { cycle: u64 },
    /// Detail requests in flight; `settled` of `total` have finished.
    Hydrating {
        cycle: u64,
        settled: usize,
        total: usize,
    },
    /// The cycle published its records.
    Ready {
        cycle: u64,
        loaded: usize,
        failed: usize,
    },
    /// The cycle ended without publishing.
    Failed { cycle: u64, reason: String },
}

/// Events that move a [`RefreshState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Begin { cycle: u64 },
    ListFetched { cycle: u64, total: usize },
    ListFailed { cycle: u64, reason: String },
    DetailSettled { cycle: u64 },
    Completed { cycle: u64, loaded: usize, failed: usize },
    Rejected { cycle: u64, reason: String },
    Merged { cycle: u64, loaded: usize, failed: usize },
}

impl Transition {
    pub fn cycle(&self) -> u64 {
        match self {
            Self::Begin { cycle }
            | Self::ListFetched { cycle, .. }
            | Self::ListFailed { cycle, .. }
            | Self::DetailSettled { cycle }
            | Self::Completed { cycle, .. }
            | Self::Rejected { cycle, .. }
            | Self::Merged { cycle, .. } => *cycle,
        }
    }
}

impl RefreshState {
    /// Cycle this state belongs to (`None` while idle).
    pub fn cycle(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Listing { cycle }
            | Self::Hydrating { cycle, .. }
            | Self::Ready { cycle, .. }
            | Self::Failed { cycle, .. } => Some(*cycle),
        }
    }

    /// True while a refresh is waiting on the network.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Listing { .. } | Self::Hydrating { .. })
    }

    /// Returns the state after `transition`, or `None` if the transition does
    /// not apply: it belongs to another cycle, or is invalid from this state.
    /// `Begin` applies from any state as long as its cycle is newer.
    pub fn apply(&self, transition: &Transition) -> Option<RefreshState> {
        if let Transition::Begin { cycle } = transition {
            return (Some(*cycle) > self.cycle()).then_some(RefreshState::Listing { cycle: *cycle });
        }
        if self.cycle() != Some(transition.cycle()) {
            return None;
        }
        match (self, transition) {
            (Self::Listing { cycle }, Transition::ListFetched { total, .. }) => {
                Some(Self::Hydrating {
                    cycle: *cycle,
                    settled: 0,
                    total: *total,
                })
            }
            (Self::Listing { cycle }, Transition::ListFailed { reason, .. }) => Some(Self::Failed {
                cycle: *cycle,
                reason: reason.clone(),
            }),
            (
                Self::Hydrating {
                    cycle,
                    settled,
                    total,
                },
                Transition::DetailSettled { .. },
            ) if settled < total => Some(Self::Hydrating {
                cycle: *cycle,
                settled: settled + 1,
                total: *total,
            }),
            (
                Self::Hydrating {
                    cycle,
                    settled,
                    total,
                },
                Transition::Completed { loaded, failed, .. },
            ) if settled == total => Some(Self::Ready {
                cycle: *cycle,
                loaded: *loaded,
                failed: *failed,
            }),
            (
                Self::Hydrating {
                    cycle,
                    settled,
                    total,
                },
                Transition::Rejected { reason, .. },
            ) if settled == total => Some(Self::Failed {
                cycle: *cycle,
                reason: reason.clone(),
            }),
            (Self::Ready { cycle, .. }, Transition::Merged { loaded, failed, .. }) => {
                Some(Self::Ready {
                    cycle: *cycle,
                    loaded: *loaded,
                    failed: *failed,
                })
            }
            _ => None,
        }
    }
}

/// A summary that could not be hydrated.
#[derive(Debug)]
pub struct DetailFailure {
    pub reference: RecordRef,
    pub error: PokedexError,
}

/// Outcome of a refresh (or retry) cycle.
#[derive(Debug)]
pub struct RefreshReport {
    pub cycle: u64,
    /// Records hydrated by this cycle
    pub loaded: usize,
    /// Summaries whose detail request failed
    pub failures: Vec<DetailFailure>,
    /// False if a newer cycle started first; nothing from this cycle was published.
    pub applied: bool,
}

impl RefreshReport {
    /// True if every summary of the page was hydrated.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
struct ListState {
    state: RefreshState,
    // most recently started cycle
    latest_cycle: u64,
    all_records: BTreeMap<u32, Record>,
    visible: Vec<Record>,
    query: String,
}

impl ListState {
    fn advance(&mut self, transition: &Transition) -> bool {
        match self.state.apply(transition) {
            Some(next) => {
                self.state = next;
                true
            }
            None => false,
        }
    }

    fn recompute_visible(&mut self) {
        self.visible = filter(self.all_records.values(), &self.query);
    }
}

/// Orchestrates refresh, hydration, and search for a list screen.
pub struct ListController<S> {
    source: Arc<S>,
    page_size: usize,
    policy: HydrationPolicy,
    inner: Mutex<ListState>,
}

impl<S> std::fmt::Debug for ListController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListController")
            .field("page_size", &self.page_size)
            .field("policy", &self.policy)
            .field("state", &self.inner.lock().state)
            .finish()
    }
}

impl<S: RecordSource> ListController<S> {
    /// Creates a controller with the default page size and hydration policy.
    pub fn new(source: Arc<S>) -> Self {
        Self::with_config(source, &ClientConfig::default())
    }

    /// Creates a controller using `page_size` and `hydration_policy` from `config`.
    pub fn with_config(source: Arc<S>, config: &ClientConfig) -> Self {
        Self {
            source,
            page_size: config.page_size,
            policy: config.hydration_policy,
            inner: Mutex::new(ListState::default()),
        }
    }

    /// Runs one refresh cycle: list, then hydrate every summary.
    ///
    /// Under `PublishPartial` the page replaces the published set as soon as it
    /// arrives, and each record becomes visible when its detail request finishes.
    /// The future resolves once every detail request has settled.
    ///
    /// Returns `ListFetchFailed` if the page could not be fetched, and
    /// `DetailFetchFailed` if the policy is `RequireAll` and any detail failed.
    /// In both cases the previously published records stay in place.
    pub async fn refresh(&self) -> Result<RefreshReport> {
        let cycle = {
            let mut inner = self.inner.lock();
            inner.latest_cycle += 1;
            let cycle = inner.latest_cycle;
            inner.advance(&Transition::Begin { cycle });
            cycle
        };
        info!(cycle, page_size = self.page_size, "refresh started");

        let page = match self.source.fetch_list(self.page_size).await {
            Ok(page) => page,
            Err(e) => {
                warn!(cycle, error = %e, "list fetch failed");
                self.inner.lock().advance(&Transition::ListFailed {
                    cycle,
                    reason: e.to_string(),
                });
                return Err(PokedexError::ListFetchFailed {
                    source: Box::new(e),
                });
            }
        };
        let total = page.len();
        debug!(cycle, total, "list fetched");
        let incremental = self.policy == HydrationPolicy::PublishPartial;
        {
            let mut inner = self.inner.lock();
            if inner.advance(&Transition::ListFetched { cycle, total }) && incremental {
                inner.all_records.clear();
                inner.recompute_visible();
            }
        }

        let results = hydrate(self.source.as_ref(), &page.results, |result| {
            let mut inner = self.inner.lock();
            if !inner.advance(&Transition::DetailSettled { cycle }) {
                return;
            }
            if incremental && let Ok(record) = result {
                inner.all_records.insert(record.id, record.clone());
                inner.recompute_visible();
            }
        })
        .await;
        let (records, failures) = partition(page.results, results);
        let loaded = records.len();

        let mut inner = self.inner.lock();
        if inner.latest_cycle != cycle {
            debug!(cycle, latest = inner.latest_cycle, "refresh superseded");
            return Ok(RefreshReport {
                cycle,
                loaded,
                failures,
                applied: false,
            });
        }
        if self.policy == HydrationPolicy::RequireAll && !failures.is_empty() {
            warn!(cycle, failed = failures.len(), "refresh rejected");
            inner.advance(&Transition::Rejected {
                cycle,
                reason: format!("{} of {total} details failed", failures.len()),
            });
            return Err(PokedexError::DetailFetchFailed { failures });
        }
        inner.all_records = records.into_iter().map(|r| (r.id, r)).collect();
        inner.recompute_visible();
        inner.advance(&Transition::Completed {
            cycle,
            loaded,
            failed: failures.len(),
        });
        info!(cycle, loaded, failed = failures.len(), "refresh complete");
        Ok(RefreshReport {
            cycle,
            loaded,
            failures,
            applied: true,
        })
    }

    /// Pull-to-refresh entry point for the presentation layer.
    pub async fn trigger_refresh(&self) -> Result<RefreshReport> {
        self.refresh().await
    }

    /// Hydrates `refs` again and merges successes into the published set.
    ///
    /// Only valid once the latest cycle is `Ready`. If another refresh starts
    /// while the retry is in flight, nothing is merged.
    pub async fn retry_details(&self, refs: Vec<RecordRef>) -> Result<RefreshReport> {
        let cycle = {
            let inner = self.inner.lock();
            match inner.state {
                RefreshState::Ready { cycle, .. } => cycle,
                ref other => {
                    return Err(PokedexError::Validation {
                        message: format!("retry requires a completed refresh (state: {other:?})"),
                    });
                }
            }
        };
        debug!(cycle, count = refs.len(), "retrying details");

        let results = hydrate(self.source.as_ref(), &refs, |_| {}).await;
        let (records, failures) = partition(refs, results);
        let loaded = records.len();

        let mut inner = self.inner.lock();
        if inner.latest_cycle != cycle {
            return Ok(RefreshReport {
                cycle,
                loaded,
                failures,
                applied: false,
            });
        }
        for record in records {
            inner.all_records.insert(record.id, record);
        }
        inner.recompute_visible();
        let loaded_total = inner.all_records.len();
        inner.advance(&Transition::Merged {
            cycle,
            loaded: loaded_total,
            failed: failures.len(),
        });
        Ok(RefreshReport {
            cycle,
            loaded,
            failures,
            applied: true,
        })
    }
}

impl<S> ListController<S> {
    /// Updates the search query and recomputes the visible projection.
    pub fn on_query_changed(&self, text: &str) {
        let mut inner = self.inner.lock();
        inner.query = text.to_string();
        inner.recompute_visible();
    }

    /// Current search query.
    pub fn query(&self) -> String {
        self.inner.lock().query.clone()
    }

    /// Number of rows in the visible projection.
    pub fn item_count(&self) -> usize {
        self.inner.lock().visible.len()
    }

    /// Row `index` of the visible projection.
    pub fn item_at(&self, index: usize) -> Option<Record> {
        self.inner.lock().visible.get(index).cloned()
    }

    /// Resolves a selected row against the visible projection, for hand-off to a detail view.
    pub fn on_select(&self, index: usize) -> Result<Record> {
        let inner = self.inner.lock();
        inner
            .visible
            .get(index)
            .cloned()
            .ok_or(PokedexError::IndexOutOfRange {
                index,
                len: inner.visible.len(),
            })
    }

    /// The visible projection: records matching the query, ordered by id.
    pub fn visible_records(&self) -> Vec<Record> {
        self.inner.lock().visible.clone()
    }

    /// Every published record, ordered by id.
    pub fn all_records(&self) -> Vec<Record> {
        self.inner.lock().all_records.values().cloned().collect()
    }

    pub fn state(&self) -> RefreshState {
        self.inner.lock().state.clone()
    }

    /// True while the latest refresh is in flight. Drives the loading indicator.
    pub fn is_loading(&self) -> bool {
        self.inner.lock().state.is_loading()
    }
}

/// Issues one detail request per reference, all at once, and returns the
/// results in reference order. `on_settled` sees each result as its request finishes.
async fn hydrate<S: RecordSource>(
    source: &S,
    refs: &[RecordRef],
    mut on_settled: impl FnMut(&Result<Record>),
) -> Vec<Result<Record>> {
    let mut slots: Vec<Option<Result<Record>>> = refs.iter().map(|_| None).collect();
    let mut pending: FuturesUnordered<_> = refs
        .iter()
        .enumerate()
        .map(|(index, reference)| async move { (index, source.fetch_detail(reference).await) })
        .collect();

    while let Some((index, result)) = pending.next().await {
        if let Err(e) = &result {
            debug!(index, error = %e, "detail fetch failed");
        }
        on_settled(&result);
        slots[index] = Some(result);
    }

    slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(PokedexError::Other {
                    message: "detail request never settled".into(),
                })
            })
        })
        .collect()
}

fn partition(
    refs: Vec<RecordRef>,
    results: Vec<Result<Record>>,
) -> (Vec<Record>, Vec<DetailFailure>) {
    let mut records = Vec::new();
    let mut failures = Vec::new();
    for (reference, result) in refs.into_iter().zip(results) {
        match result {
            Ok(record) => records.push(record),
            Err(error) => failures.push(DetailFailure { reference, error }),
        }
    }
    (records, failures)
}

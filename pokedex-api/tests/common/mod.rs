//! Shared helpers for pokedex integration tests
#![allow(dead_code)]

use std::sync::Arc;

use pokedex::{
    mock::MockCatalogServer,
    prelude::*,
    test_util::{MockContext, TestResult, test_config},
};

pub use pokedex::test_util::{StubSource, ids};

/// Yields until `cond` holds.
/// Panics if it never does, so a broken test fails instead of hanging.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never reached: {what}");
}

/// Yields until the controller state satisfies `pred`.
pub async fn wait_for<S>(controller: &ListController<S>, pred: impl Fn(&RefreshState) -> bool) {
    wait_until("controller state", || pred(&controller.state())).await;
}

/// Mock server holding exactly `records` (id, name).
pub async fn context_with(records: &[(u32, &str)], config: ClientConfig) -> TestResult<MockContext> {
    let server = MockCatalogServer::with_records(
        records
            .iter()
            .map(|(id, name)| (*id, name.to_string(), "normal".to_string())),
    );
    MockContext::with_server(server, config).await
}

/// Controller over the client of `ctx`, using `config` for page size and policy.
pub fn controller_for(ctx: &MockContext, config: &ClientConfig) -> ListController<PokedexClient> {
    ListController::with_config(Arc::clone(&ctx.client), config)
}

pub fn default_config() -> ClientConfig {
    test_config()
}

pub fn names(records: &[Record]) -> Vec<&str> {
    records.iter().map(|r| r.name.as_str()).collect()
}

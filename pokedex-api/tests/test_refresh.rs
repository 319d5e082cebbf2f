//! End-to-end refresh against the mock catalog server.

mod common;

use common::{context_with, controller_for, default_config, ids, names};
use pokedex::{
    prelude::*,
    test_util::{TestResult, with_mock_context},
};

#[tokio::test]
#[test_log::test]
async fn test_refresh_hydrates_one_page() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        let controller = controller_for(&ctx, &default_config());
        assert_eq!(controller.state(), RefreshState::Idle);

        let report = controller.refresh().await?;
        assert!(report.applied);
        assert!(report.is_complete());
        assert_eq!(report.loaded, DEFAULT_PAGE_SIZE);

        // the 31st and 32nd records are beyond the page
        assert_eq!(controller.item_count(), 30);
        assert_eq!(ids(&controller.visible_records()), (1..=30).collect::<Vec<u32>>());
        assert_eq!(ctx.server.list_hits(), 1);
        assert_eq!(ctx.server.detail_hits(), 30);
        assert_eq!(ctx.client.http_metrics().total_requests, 31);
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_search_over_hydrated_page() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        let controller = controller_for(&ctx, &default_config());
        controller.refresh().await?;

        controller.on_query_changed("char");
        assert_eq!(
            names(&controller.visible_records()),
            vec!["charmander", "charmeleon", "charizard"]
        );

        controller.on_query_changed("PIDGEO");
        assert_eq!(ids(&controller.visible_records()), vec![17, 18]);

        controller.on_query_changed("nidoqueen");
        assert_eq!(controller.item_count(), 0);

        controller.on_query_changed("");
        assert_eq!(controller.item_count(), 30);
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_failed_details_are_dropped() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        for id in [3, 10, 25] {
            ctx.server.fail_detail(id);
        }
        let controller = controller_for(&ctx, &default_config());

        let report = controller.refresh().await?;
        assert_eq!(report.loaded, 27);
        let mut failed: Vec<u32> = report
            .failures
            .iter()
            .map(|f| f.reference.id())
            .collect::<Result<_, _>>()?;
        failed.sort_unstable();
        assert_eq!(failed, vec![3, 10, 25]);
        assert!(report
            .failures
            .iter()
            .all(|f| matches!(f.error, PokedexError::ApiError { code: 500, .. })));

        let visible = controller.visible_records();
        assert_eq!(visible.len(), 27);
        assert!(!ids(&visible).contains(&25));
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_retry_after_server_recovers() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        ctx.server.fail_detail(4);
        ctx.server.malformed_detail(5);
        let controller = controller_for(&ctx, &default_config());

        let report = controller.refresh().await?;
        assert_eq!(report.failures.len(), 2);
        assert!(report
            .failures
            .iter()
            .any(|f| matches!(f.error, PokedexError::Deserialization { .. })));

        ctx.server.heal_details();
        let refs = report.failures.iter().map(|f| f.reference.clone()).collect();
        let retry = controller.retry_details(refs).await?;
        assert!(retry.is_complete());
        assert_eq!(controller.item_count(), 30);
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_list_failure_surfaces() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        ctx.server.fail_list(Some(500));
        let controller = controller_for(&ctx, &default_config());

        let err = controller.refresh().await.unwrap_err();
        match &err {
            PokedexError::ListFetchFailed { source } => {
                assert!(matches!(**source, PokedexError::ApiError { code: 500, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!controller.is_loading());
        assert_eq!(ctx.server.detail_hits(), 0);

        ctx.server.fail_list(None);
        controller.trigger_refresh().await?;
        assert_eq!(controller.item_count(), 30);
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_list_without_results_keeps_previous_set() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        let controller = controller_for(&ctx, &default_config());
        controller.refresh().await?;

        ctx.server.malformed_list(true);
        let err = controller.refresh().await.unwrap_err();
        match &err {
            PokedexError::ListFetchFailed { source } => {
                assert!(matches!(**source, PokedexError::Deserialization { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(controller.item_count(), 30);
        assert!(matches!(controller.state(), RefreshState::Failed { cycle: 2, .. }));
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_custom_page_size() -> TestResult<()> {
    let ctx = context_with(
        &[(1, "bulbasaur"), (2, "charmander"), (3, "squirtle")],
        default_config(),
    )
    .await?;
    let config = default_config().page_size(2);
    let controller = controller_for(&ctx, &config);

    controller.refresh().await?;
    assert_eq!(names(&controller.visible_records()), vec!["bulbasaur", "charmander"]);
    controller.on_query_changed("char");
    assert_eq!(ids(&controller.visible_records()), vec![2]);

    ctx.server.shutdown().await;
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_require_all_over_http() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        let config = default_config().hydration_policy(HydrationPolicy::RequireAll);
        let controller = controller_for(&ctx, &config);
        controller.refresh().await?;

        ctx.server.fail_detail(12);
        let err = controller.refresh().await.unwrap_err();
        assert!(matches!(err, PokedexError::DetailFetchFailed { ref failures } if failures.len() == 1));
        // previous page still shown
        assert_eq!(controller.item_count(), 30);
        Ok(())
    })
    .await
}

//! Integration tests for the http client against the mock catalog server.

use pokedex::{
    mock::MockCatalogServer,
    prelude::*,
    test_util::{MockContext, TestResult, test_config, with_mock_context},
};

#[tokio::test]
#[test_log::test]
async fn test_list_page_of_thirty() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        let page = ctx.client.pokemon_list().limit(30).list().await?;
        assert_eq!(page.len(), 30);
        assert_eq!(page.count, 32);
        assert!(page.next.is_some(), "more records beyond the first page");

        let ids: Vec<u32> = page.iter().map(|r| r.id()).collect::<Result<_, _>>()?;
        assert_eq!(ids, (1..=30).collect::<Vec<u32>>());
        assert_eq!(page.results[0].name, "bulbasaur");
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_list_offset() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        let page = ctx.client.pokemon_list().limit(30).offset(30).list().await?;
        let names: Vec<&str> = page.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["nidoqueen", "nidoran-m"]);
        assert!(page.next.is_none());
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_list_huge_offset_is_empty() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        let path = format!("/pokemon?limit={}&offset={}", usize::MAX, usize::MAX);
        let page: RecordList = ctx.client.get(&path).await?;
        assert!(page.is_empty());
        assert!(page.next.is_none());
        assert_eq!(page.count, 32);
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_list_without_results_fails_to_decode() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        ctx.server.malformed_list(true);
        let err = ctx.client.pokemon_list().limit(30).list().await.unwrap_err();
        assert!(
            matches!(err, PokedexError::Deserialization { .. }),
            "unexpected {err:?}"
        );
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_get_detail_by_id_and_name() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        let pikachu = ctx.client.pokemon(25).get().await?;
        assert_eq!(pikachu.id, 25);
        assert_eq!(pikachu.name, "pikachu");
        assert_eq!(pikachu.type_names(), vec!["electric"]);
        assert!(pikachu.image_url().is_some());

        let by_name = ctx.client.pokemon_by_name("Pikachu").get().await?;
        assert_eq!(by_name, pikachu);
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_generic_get() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        let record: Record = ctx.client.get("/pokemon/4/").await?;
        assert_eq!(record.name, "charmander");
        let page: RecordList = ctx.client.get("/pokemon?limit=2").await?;
        assert_eq!(page.len(), 2);
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_missing_record_is_not_found() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        let err = ctx.client.pokemon(9999).get().await.unwrap_err();
        assert!(
            matches!(err, PokedexError::NotFound { .. }),
            "unexpected {err:?}"
        );
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_server_error_maps_to_api_error() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        ctx.server.fail_detail(7);
        let err = ctx.client.pokemon(7).get().await.unwrap_err();
        match &err {
            PokedexError::ApiError { code, url, .. } => {
                assert_eq!(*code, 500);
                assert_eq!(url, "/pokemon/7/");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.is_transient());
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_malformed_body_is_deserialization_error() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        ctx.server.malformed_detail(1);
        let err = ctx.client.pokemon(1).get().await.unwrap_err();
        assert!(
            matches!(err, PokedexError::Deserialization { .. }),
            "unexpected {err:?}"
        );
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_list_failure_status() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        ctx.server.fail_list(Some(503));
        let err = ctx.client.pokemon_list().limit(30).list().await.unwrap_err();
        assert!(matches!(err, PokedexError::ApiError { code: 503, .. }));

        ctx.server.fail_list(None);
        let page = ctx.client.pokemon_list().limit(30).list().await?;
        assert_eq!(page.len(), 30);
        assert_eq!(ctx.server.list_hits(), 2);
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_no_retry_by_default() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        ctx.server.flaky_detail(7, 1);
        let err = ctx.client.pokemon(7).get().await.unwrap_err();
        assert!(matches!(err, PokedexError::ApiError { code: 504, .. }));
        assert_eq!(ctx.client.http_metrics().retries, 0);

        // the flaky budget is spent, so the next call succeeds
        let record = ctx.client.pokemon(7).get().await?;
        assert_eq!(record.name, "squirtle");
        Ok(())
    })
    .await
}

#[tokio::test]
#[test_log::test]
async fn test_retry_on_gateway_timeout() -> TestResult<()> {
    let ctx = MockContext::with_server(MockCatalogServer::new(), test_config().max_retries(2)).await?;
    ctx.server.flaky_detail(7, 2);

    let record = ctx.client.pokemon(7).get().await?;
    assert_eq!(record.name, "squirtle");

    let metrics = ctx.client.http_metrics();
    assert_eq!(metrics.total_requests, 3);
    assert_eq!(metrics.retries, 2);
    assert_eq!(metrics.successful_responses, 1);
    assert_eq!(ctx.server.detail_hits(), 3);

    ctx.server.shutdown().await;
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_retries_exhausted() -> TestResult<()> {
    let ctx = MockContext::with_server(MockCatalogServer::new(), test_config().max_retries(1)).await?;
    ctx.server.flaky_detail(7, 5);

    let err = ctx.client.pokemon(7).get().await.unwrap_err();
    assert!(matches!(err, PokedexError::ApiError { code: 504, .. }));
    assert_eq!(ctx.client.http_metrics().total_requests, 2);

    ctx.server.shutdown().await;
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_server_errors_are_not_retried() -> TestResult<()> {
    let ctx = MockContext::with_server(MockCatalogServer::new(), test_config().max_retries(3)).await?;
    ctx.server.fail_detail(2);

    let err = ctx.client.pokemon(2).get().await.unwrap_err();
    assert!(matches!(err, PokedexError::ApiError { code: 500, .. }));
    assert_eq!(ctx.server.detail_hits(), 1);

    ctx.server.shutdown().await;
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_connection_refused_is_http_error() -> TestResult<()> {
    // bind then drop, so nothing listens on the port
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("free port");
    let client = PokedexClient::with_config(test_config().base_url(&format!("http://{addr}")))?;
    let err = client.pokemon(1).get().await.unwrap_err();
    assert!(matches!(err, PokedexError::Http { .. }), "unexpected {err:?}");
    assert!(err.is_transient());
    assert_eq!(client.http_metrics().errors, 1);
    Ok(())
}

#[tokio::test]
#[test_log::test]
async fn test_metrics_count_requests() -> TestResult<()> {
    with_mock_context(|ctx| async move {
        ctx.client.pokemon_list().limit(3).list().await?;
        ctx.client.pokemon(1).get().await?;
        let _ = ctx.client.pokemon(9999).get().await;

        let metrics = ctx.client.http_metrics();
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.successful_responses, 2);
        assert_eq!(metrics.errors, 1);
        assert!(metrics.bytes_received > 0);
        Ok(())
    })
    .await
}

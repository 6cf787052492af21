//! Integration tests for graceful shutdown and interrupted runs

use std::sync::Arc;
use std::time::Duration;

use aircraft_enricher::enricher::{EnrichConfig, EnrichError, EnrichPipeline, RunState, RunStatus};
use aircraft_enricher::events::{CollectingSink, PipelineEvent};
use aircraft_enricher::shutdown::ShutdownCoordinator;
use tempfile::TempDir;

use crate::support::{column, identifiers_csv, small_schema, FakeFetcher};

#[tokio::test]
async fn shutdown_notifies_waiters() {
    let shutdown = ShutdownCoordinator::shared();
    let waiter = {
        let handle = shutdown.clone();
        tokio::spawn(async move {
            handle.wait_for_shutdown().await;
            true
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.request_shutdown();

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok());
}

/// A request made before anyone waits must still be observed.
#[tokio::test]
async fn shutdown_requested_before_wait_does_not_deadlock() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let handle = shutdown.clone();
    let waiter = tokio::spawn(async move {
        handle.wait_for_shutdown().await;
        true
    });

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
    assert!(result.is_ok(), "wait_for_shutdown() hung after shutdown was already requested");
}

#[tokio::test]
async fn shutdown_concurrent_waiters_all_notified() {
    let shutdown = ShutdownCoordinator::shared();

    let mut waiters = Vec::new();
    for _ in 0..10 {
        let handle = shutdown.clone();
        waiters.push(tokio::spawn(async move {
            handle.wait_for_shutdown().await;
        }));
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    shutdown.request_shutdown();

    for waiter in waiters {
        let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(result.is_ok(), "A waiter was not notified of shutdown");
    }
}

#[tokio::test]
async fn shutdown_before_run_starts_no_batch() {
    let dir = TempDir::new().unwrap();
    let input = identifiers_csv(dir.path(), "aircraft.csv", &["A", "B"]);
    let original = std::fs::read_to_string(&input).unwrap();
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();
    let fetcher = Arc::new(FakeFetcher::registered());

    let result = EnrichPipeline::new(
        EnrichConfig::new(&input).with_schema(small_schema()),
        fetcher.clone(),
    )
    .with_shutdown(shutdown)
    .run()
    .await;

    match result {
        Err(EnrichError::Interrupted(summary)) => {
            assert_eq!(summary.status, RunStatus::Interrupted);
            assert_eq!(summary.next_index, 0);
            assert_eq!(summary.batches_flushed, 0);
        }
        other => panic!("expected interruption, got {other:?}"),
    }
    assert!(fetcher.calls().is_empty());
    assert_eq!(std::fs::read_to_string(&input).unwrap(), original);
}

/// The batch in flight finishes and is flushed; no further batch starts.
#[tokio::test]
async fn shutdown_mid_batch_flushes_then_stops() {
    let dir = TempDir::new().unwrap();
    let input = identifiers_csv(dir.path(), "aircraft.csv", &["A", "B", "C", "D"]);
    let config = EnrichConfig::new(&input)
        .with_batch_size(2)
        .with_schema(small_schema());
    let shutdown = ShutdownCoordinator::shared();
    let fetcher = Arc::new(FakeFetcher::registered().with_shutdown_after(1, shutdown.clone()));
    let events = Arc::new(CollectingSink::new());

    let result = EnrichPipeline::new(config.clone(), fetcher.clone())
        .with_shutdown(shutdown)
        .with_events(events.clone())
        .run()
        .await;

    let summary = match result {
        Err(EnrichError::Interrupted(summary)) => summary,
        other => panic!("expected interruption, got {other:?}"),
    };
    assert_eq!(fetcher.calls(), vec!["A", "B"]);
    assert_eq!(summary.batches_flushed, 1);
    assert_eq!(summary.next_index, 2);
    assert_eq!(column(&input, "STATUS"), vec!["Valid", "Valid", "", ""]);

    let transitions: Vec<(RunState, RunState)> = events
        .events()
        .into_iter()
        .filter_map(|event| match event {
            PipelineEvent::StateChanged { from, to } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (RunState::Init, RunState::LocateCheckpoint),
            (RunState::LocateCheckpoint, RunState::ProcessingBatch),
            (RunState::ProcessingBatch, RunState::Flushing),
            (RunState::Flushing, RunState::ProcessingBatch),
            (RunState::ProcessingBatch, RunState::Interrupted),
            (RunState::Interrupted, RunState::Done),
        ]
    );

    let resumed = Arc::new(FakeFetcher::registered());
    let summary = EnrichPipeline::new(config, resumed.clone())
        .with_shutdown(ShutdownCoordinator::shared())
        .run()
        .await
        .unwrap();
    assert_eq!(resumed.calls(), vec!["C", "D"]);
    assert_eq!(summary.start_index, 2);
    assert_eq!(summary.next_index, 4);
    assert_eq!(column(&input, "STATUS"), vec!["Valid"; 4]);
}

/// A second request abandons a batch stuck on one fetch; the rows that did
/// finish are flushed before the run returns.
#[tokio::test]
async fn second_shutdown_abandons_hung_batch_and_flushes() {
    let dir = TempDir::new().unwrap();
    let input = identifiers_csv(dir.path(), "aircraft.csv", &["A", "HANG", "C"]);
    let config = EnrichConfig::new(&input)
        .with_batch_size(3)
        .with_schema(small_schema());
    let shutdown = ShutdownCoordinator::shared();
    let fetcher = Arc::new(FakeFetcher::registered().with_hang("HANG"));
    let events = Arc::new(CollectingSink::new());

    let operator = {
        let fetcher = fetcher.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            while fetcher.calls().len() < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            shutdown.request_shutdown();
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.request_shutdown();
        })
    };

    let pipeline = EnrichPipeline::new(config.clone(), fetcher.clone())
        .with_shutdown(shutdown)
        .with_events(events.clone());
    let run = pipeline.run();
    let result = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run returns after the second shutdown request");
    operator.await.unwrap();

    let summary = match result {
        Err(EnrichError::Interrupted(summary)) => summary,
        other => panic!("expected interruption, got {other:?}"),
    };
    assert_eq!(summary.status, RunStatus::Interrupted);
    assert_eq!(summary.enriched, 2);
    assert_eq!(summary.batches_flushed, 0);
    assert_eq!(summary.next_index, 1);
    assert_eq!(column(&input, "STATUS"), vec!["Valid", "", "Valid"]);

    let transitions: Vec<(RunState, RunState)> = events
        .events()
        .into_iter()
        .filter_map(|event| match event {
            PipelineEvent::StateChanged { from, to } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (RunState::Init, RunState::LocateCheckpoint),
            (RunState::LocateCheckpoint, RunState::ProcessingBatch),
            (RunState::ProcessingBatch, RunState::Interrupted),
            (RunState::Interrupted, RunState::Flushing),
            (RunState::Flushing, RunState::Done),
        ]
    );

    let resumed = Arc::new(FakeFetcher::registered());
    EnrichPipeline::new(config, resumed.clone())
        .with_shutdown(ShutdownCoordinator::shared())
        .run()
        .await
        .unwrap();
    assert_eq!(resumed.calls(), vec!["HANG"]);
    assert_eq!(column(&input, "STATUS"), vec!["Valid"; 3]);
}

// ABOUTME: Integration tests for the bulk batch processor
// ABOUTME: Windowing, partial failure, cancellation, selection validation, and item ops
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use stratus_integrations::bulk::{
    generate_confirmation_token, validate_selection, BulkBatchProcessor, BulkOperations,
};
use stratus_integrations::cancellation::CancellationToken;
use stratus_integrations::errors::EngineError;
use stratus_integrations::external::TokenRefresh;
use stratus_integrations::models::IntegrationStatus;
use stratus_integrations::refresh::TokenRefreshScheduler;
use stratus_integrations::store::IntegrationStore;

mod common;
use common::{active_integration, seeded_store, test_integration, MockTokenRefresh};

fn ids(n: usize) -> Vec<Uuid> {
    (0..n).map(|_| Uuid::new_v4()).collect()
}

#[tokio::test]
async fn test_windows_execute_in_input_order() {
    common::init_test_logging();
    let ids = ids(10);
    let processor = BulkBatchProcessor::new(3);
    let cancel = CancellationToken::new();

    let progress = processor
        .run(&ids, |_| async { Ok(()) }, &cancel)
        .await;

    assert_eq!(progress.total, 10);
    assert_eq!(progress.completed, 10);
    assert_eq!(progress.failed, 0);
    assert_eq!(progress.results.len(), 10);

    // Windows of [3,3,3,1]: each result block draws only from its window
    for (index, result) in progress.results.iter().enumerate() {
        let window = index / 3;
        let window_ids: HashSet<Uuid> =
            ids[window * 3..((window + 1) * 3).min(ids.len())].iter().copied().collect();
        assert!(
            window_ids.contains(&result.integration_id),
            "result {index} came from outside window {window}"
        );
    }
}

#[tokio::test]
async fn test_failures_never_abort_the_batch() {
    common::init_test_logging();
    let ids = ids(10);
    let failing: HashSet<Uuid> = [ids[1], ids[4], ids[9]].into_iter().collect();
    let processor = BulkBatchProcessor::new(3);
    let cancel = CancellationToken::new();

    let progress = processor
        .run(
            &ids,
            |id| {
                let fail = failing.contains(&id);
                async move {
                    if fail {
                        Err(EngineError::external("downstream rejected"))
                    } else {
                        Ok(())
                    }
                }
            },
            &cancel,
        )
        .await;

    assert_eq!(progress.completed, progress.total);
    assert_eq!(progress.failed, 3);
    assert_eq!(progress.succeeded() + progress.failed, progress.total);
    for result in &progress.results {
        if failing.contains(&result.integration_id) {
            assert!(!result.success);
            assert!(result.error.as_deref().unwrap().contains("downstream rejected"));
        } else {
            assert!(result.success);
            assert!(result.error.is_none());
        }
    }
}

#[tokio::test]
async fn test_cancellation_stops_new_windows() {
    common::init_test_logging();
    let ids = ids(10);
    let second_window: HashSet<Uuid> = ids[3..6].iter().copied().collect();
    let processor = BulkBatchProcessor::new(3);
    let cancel = CancellationToken::new();

    let progress = processor
        .run(
            &ids,
            |id| {
                // Signal while window 2 is in flight; window 3 must not start
                if second_window.contains(&id) {
                    cancel.cancel();
                }
                async { Ok(()) }
            },
            &cancel,
        )
        .await;

    assert_eq!(progress.results.len(), 6);
    assert_eq!(progress.completed, 6);
    assert_eq!(progress.total, 10);
    assert!(progress.current.is_none());
}

#[tokio::test]
async fn test_cancellation_before_start_runs_nothing() {
    common::init_test_logging();
    let ids = ids(4);
    let processor = BulkBatchProcessor::new(3);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let progress = processor.run(&ids, |_| async { Ok(()) }, &cancel).await;
    assert_eq!(progress.completed, 0);
    assert!(progress.results.is_empty());
    assert_eq!(progress.total, 4);
}

#[tokio::test]
async fn test_items_within_a_window_run_concurrently() {
    common::init_test_logging();
    let ids = ids(3);
    let processor = BulkBatchProcessor::new(3);
    let cancel = CancellationToken::new();

    let started = std::time::Instant::now();
    let progress = processor
        .run(
            &ids,
            |_| async {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                Ok(())
            },
            &cancel,
        )
        .await;
    let elapsed = started.elapsed();

    assert_eq!(progress.completed, 3);
    assert!(
        elapsed < std::time::Duration::from_millis(280),
        "window of 3 took {elapsed:?}, items appear serialized"
    );
}

#[tokio::test]
async fn test_progress_snapshots_stream_monotonically() {
    common::init_test_logging();
    let ids = ids(7);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let processor = BulkBatchProcessor::new(3).with_progress(tx);
    let cancel = CancellationToken::new();

    let final_progress = processor.run(&ids, |_| async { Ok(()) }, &cancel).await;
    assert_eq!(final_progress.completed, 7);

    let mut last_completed = 0;
    let mut snapshots = 0;
    while let Ok(snapshot) = rx.try_recv() {
        assert!(snapshot.completed >= last_completed);
        last_completed = snapshot.completed;
        snapshots += 1;
    }
    // One snapshot per dispatch and one per settlement
    assert_eq!(snapshots, 14);
    assert_eq!(last_completed, 7);
}

#[tokio::test]
async fn test_selection_validation_accumulates_all_violations() {
    common::init_test_logging();
    let known = vec![
        active_integration(),
        test_integration(IntegrationStatus::Expired, Some(-100)),
    ];
    let stranger = Uuid::new_v4();
    let selection = vec![known[0].id, known[1].id, stranger];

    let report = validate_selection(&selection, &known, 2);
    assert!(!report.is_valid());
    // Over the cap, plus one unknown id
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors.iter().any(|e| e.contains("exceeds")));
    assert!(report.errors.iter().any(|e| e.contains(&stranger.to_string())));
    // The expired integration draws a warning, not an error
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains(&known[1].id.to_string()));
}

#[tokio::test]
async fn test_empty_selection_is_invalid() {
    common::init_test_logging();
    let report = validate_selection(&[], &[], 50);
    assert!(!report.is_valid());
    assert_eq!(report.errors.len(), 1);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn test_valid_selection_passes() {
    common::init_test_logging();
    let known = vec![active_integration(), active_integration()];
    let selection: Vec<Uuid> = known.iter().map(|i| i.id).collect();
    let report = validate_selection(&selection, &known, 50);
    assert!(report.is_valid());
    assert!(report.warnings.is_empty());
}

#[test]
fn test_confirmation_tokens_are_opaque_and_distinct() {
    let a = generate_confirmation_token();
    let b = generate_confirmation_token();
    assert_eq!(a.len(), 16);
    assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_bulk_operations_update_and_delete_records() {
    let records = vec![active_integration(), active_integration()];
    let first = records[0].id;
    let second = records[1].id;
    let store = seeded_store(records).await;
    let scheduler = Arc::new(TokenRefreshScheduler::new(
        store.clone(),
        Arc::new(MockTokenRefresh::succeeding()),
    ));
    let ops = BulkOperations::new(store.clone(), scheduler);

    ops.set_status(first, IntegrationStatus::Revoked).await.unwrap();
    assert_eq!(
        store.get(first).await.unwrap().unwrap().status,
        IntegrationStatus::Revoked
    );

    ops.delete(second).await.unwrap();
    assert!(store.get(second).await.unwrap().is_none());
}

#[tokio::test]
async fn test_bulk_refresh_runs_through_processor() {
    let records: Vec<_> = (0..5)
        .map(|_| test_integration(IntegrationStatus::Active, Some(-10)))
        .collect();
    let selection: Vec<Uuid> = records.iter().map(|i| i.id).collect();
    let store = seeded_store(records).await;
    let refresher = Arc::new(MockTokenRefresh::succeeding());
    let scheduler = Arc::new(TokenRefreshScheduler::new(store.clone(), Arc::clone(&refresher) as Arc<dyn TokenRefresh>));
    let ops = Arc::new(BulkOperations::new(store.clone(), scheduler));

    let processor = BulkBatchProcessor::new(3);
    let cancel = CancellationToken::new();
    let progress = processor
        .run(&selection, |id| ops.refresh(id), &cancel)
        .await;

    assert_eq!(progress.completed, 5);
    assert_eq!(progress.failed, 0);
    assert_eq!(refresher.call_count(), 5);
    for id in selection {
        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.access_token.as_deref(), Some("refreshed-token"));
    }
}

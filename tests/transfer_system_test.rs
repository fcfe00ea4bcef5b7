//! End-to-end runs through the task queue and worker pool.

mod common;

use std::sync::Arc;

use common::*;
use tokio_test::{assert_err, assert_ok};
use transfer_core::database::InMemoryStore;
use transfer_core::messaging::TaskState;
use transfer_core::{
    TransferError, TransferItemState, TransferJobRequest, TransferSystem,
};
use uuid::Uuid;

fn request(company_ids: impl IntoIterator<Item = i64>, target: Uuid) -> TransferJobRequest {
    TransferJobRequest {
        company_ids: company_ids.into_iter().collect(),
        source_collection_id: None,
        target_collection_id: target,
    }
}

#[tokio::test]
async fn test_job_of_150_companies_completes() {
    let store = InMemoryStore::new();
    let system = assert_ok!(TransferSystem::start(
        Arc::new(store.clone()),
        test_config(100, 4)
    ));
    let target = Uuid::new_v4();

    let created = assert_ok!(system.create_job(request(1..=150, target)).await);
    assert_eq!(created.total_items, 150);
    assert_eq!(created.pending_count, 150);
    let task_id = created.task_id.unwrap();

    let status = wait_for_settled_job(&system, created.job_id).await;
    assert_eq!(status.total_items, 150);
    assert_eq!(status.success_count, 150);
    assert_eq!(status.pending_count, 0);
    assert_eq!(status.error_count, 0);
    assert_eq!(status.cancelled_count, 0);
    assert_eq!(status.task_id, Some(task_id));

    match wait_for_task(&system, task_id).await {
        TaskState::Success { result } => {
            assert_eq!(result["batches_created"], 2);
            assert_eq!(result["total_items"], 150);
        }
        other => panic!("unexpected task state: {other:?}"),
    }
    assert_eq!(store.memberships().len(), 150);

    system.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_ids_in_one_request_collapse() {
    let store = InMemoryStore::new();
    let system = assert_ok!(TransferSystem::start(
        Arc::new(store.clone()),
        test_config(10, 2)
    ));

    let created = assert_ok!(
        system
            .create_job(request([5, 3, 5, 1, 3], Uuid::new_v4()))
            .await
    );

    let company_ids: Vec<i64> = created.items.iter().map(|i| i.company_id).collect();
    assert_eq!(company_ids, vec![5, 3, 1]);
    wait_for_settled_job(&system, created.job_id).await;
    system.shutdown().await;
}

#[tokio::test]
async fn test_empty_request_is_rejected() {
    let system = assert_ok!(TransferSystem::start(
        Arc::new(InMemoryStore::new()),
        test_config(10, 1)
    ));

    let err = assert_err!(system.create_job(request([], Uuid::new_v4())).await);
    assert!(matches!(err, TransferError::ValidationError(_)));
    system.shutdown().await;
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let system = assert_ok!(TransferSystem::start(
        Arc::new(InMemoryStore::new()),
        test_config(10, 1)
    ));

    let err = assert_err!(system.job_status(Uuid::new_v4()).await);
    assert!(matches!(err, TransferError::NotFound(_)));
    assert_err!(system.job_items(Uuid::new_v4()).await);
    system.shutdown().await;
}

#[tokio::test]
async fn test_overlapping_jobs_both_succeed_with_one_membership() {
    let store = InMemoryStore::new();
    let system = assert_ok!(TransferSystem::start(
        Arc::new(store.clone()),
        test_config(5, 1)
    ));
    let target = Uuid::new_v4();

    let first = assert_ok!(system.create_job(request(1..=10, target)).await);
    let first_status = wait_for_settled_job(&system, first.job_id).await;
    let second = assert_ok!(system.create_job(request(6..=15, target)).await);
    let second_status = wait_for_settled_job(&system, second.job_id).await;

    assert_ne!(first.job_id, second.job_id);
    assert_eq!(first_status.success_count, 10);
    assert_eq!(second_status.success_count, 10);
    for company_id in 1..=15 {
        assert_eq!(store.membership_count(company_id, target), 1);
    }

    let history = assert_ok!(system.company_transfer_history(8).await);
    assert_eq!(history.len(), 2);
    assert!(history[0].created_at >= history[1].created_at);
    system.shutdown().await;
}

#[tokio::test]
async fn test_retry_redrives_failed_items() {
    let store = InMemoryStore::new();
    let target = Uuid::new_v4();
    // Memberships the bulk lookup cannot see make inserts collide
    assert_ok!(store.add_membership(2, target));
    assert_ok!(store.add_membership(4, target));
    let stale = RacingStore::stale_membership(store.clone());
    let system = assert_ok!(TransferSystem::start(Arc::new(stale), test_config(3, 2)));

    let created = assert_ok!(system.create_job(request(1..=5, target)).await);
    let status = wait_for_settled_job(&system, created.job_id).await;
    assert_eq!(status.success_count, 3);
    assert_eq!(status.error_count, 2);

    // Clear the conflicting rows, then retry
    let removed = assert_ok!(system.remove_companies(target, &[2, 4, 99]).await);
    assert_eq!(removed.len(), 2);

    let retry_task = assert_ok!(system.retry_job(created.job_id).await);
    match wait_for_task(&system, retry_task).await {
        TaskState::Success { result } => assert_eq!(result["retried_count"], 2),
        other => panic!("unexpected task state: {other:?}"),
    }

    let status = wait_for_settled_job(&system, created.job_id).await;
    assert_eq!(status.success_count, 5);
    assert_eq!(status.error_count, 0);
    let retried: Vec<_> = status
        .items
        .iter()
        .filter(|item| item.company_id == 2 || item.company_id == 4)
        .collect();
    assert!(retried.iter().all(|item| item.attempt_count == 2));
    system.shutdown().await;
}

#[tokio::test]
async fn test_collection_job_and_status_lookup() {
    let store = InMemoryStore::new();
    let source = Uuid::new_v4();
    let target = Uuid::new_v4();
    for company_id in [10, 20, 30] {
        assert_ok!(store.add_membership(company_id, source));
    }
    let system = assert_ok!(TransferSystem::start(
        Arc::new(store.clone()),
        test_config(2, 2)
    ));

    let created = assert_ok!(system.create_job_for_collection(source, target).await);
    assert_eq!(created.total_items, 3);
    assert!(created
        .items
        .iter()
        .all(|item| item.source_collection_id == Some(source)));
    wait_for_settled_job(&system, created.job_id).await;

    let by_company = assert_ok!(system.companies_transfer_status(&[10, 30, 40]).await);
    assert_eq!(by_company.len(), 3);
    assert_eq!(by_company[&10].len(), 1);
    assert_eq!(by_company[&10][0].status, TransferItemState::Success);
    assert!(by_company[&40].is_empty());

    let err = assert_err!(
        system
            .create_job_for_collection(Uuid::new_v4(), target)
            .await
    );
    assert!(matches!(err, TransferError::ValidationError(_)));
    system.shutdown().await;
}

#[tokio::test]
async fn test_fan_out_beyond_queue_capacity_with_a_single_worker() {
    let store = InMemoryStore::new();
    let mut config = test_config(1, 1);
    config.queue.buffer_size = 2;
    let system = assert_ok!(TransferSystem::start(Arc::new(store.clone()), config));

    let created = assert_ok!(system.create_job(request(1..=5, Uuid::new_v4())).await);
    let task_id = created.task_id.unwrap();

    let status = wait_for_settled_job(&system, created.job_id).await;
    assert_eq!(status.success_count, 5);
    match wait_for_task(&system, task_id).await {
        TaskState::Success { result } => assert_eq!(result["batches_created"], 5),
        other => panic!("unexpected task state: {other:?}"),
    }
    assert_eq!(store.memberships().len(), 5);

    assert_ok!(
        tokio::time::timeout(std::time::Duration::from_secs(5), system.shutdown()).await
    );
}

#[tokio::test]
async fn test_finished_task_states_are_pruned_without_retention_schedule() {
    let mut config = test_config(2, 2);
    config.queue.result_ttl_seconds = 0;
    config.queue.prune_interval_ms = 10;
    let system = assert_ok!(TransferSystem::start(
        Arc::new(InMemoryStore::new()),
        config
    ));

    let created = assert_ok!(system.create_job(request(1..=6, Uuid::new_v4())).await);
    wait_for_settled_job(&system, created.job_id).await;
    assert!(!system.status().retention_schedule_running);

    let mut tracked = system.status().tracked_tasks;
    for _ in 0..500 {
        if tracked == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        tracked = system.status().tracked_tasks;
    }
    assert_eq!(tracked, 0);
    assert_eq!(system.queue().registry().tracked_jobs(), 0);
    system.shutdown().await;
}

#[tokio::test]
async fn test_cleanup_task_reports_deleted_count() {
    let system = assert_ok!(TransferSystem::start(
        Arc::new(InMemoryStore::new()),
        test_config(10, 1)
    ));

    let task_id = assert_ok!(system.cleanup_expired().await);
    match wait_for_task(&system, task_id).await {
        TaskState::Success { result } => {
            assert_eq!(result["deleted_count"], 0);
            assert_eq!(result["message"], "Cleaned up 0 old transfer records");
        }
        other => panic!("unexpected task state: {other:?}"),
    }
    assert!(!system.status().retention_schedule_running);
    system.shutdown().await;
}

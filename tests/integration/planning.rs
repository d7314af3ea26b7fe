//! Integration test: the planning pipeline.
//!
//! Wires a scripted repair state through the cache into a repair job and
//! verifies the planned tasks end to end: unit sizing from storage
//! statistics, partitioning, status and progress reporting.

use cadence_ring::{TokenRange, full_range};
use cadence_sched::{RepairLockType, RepairStatus};
use cadence_types::{ONE_DAY_MS, RepairConfig};
use cadence_integration_tests::{DenyAll, PlanningFixture, snapshot_of, vnode};
use num_bigint::BigInt;
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn config(target_repair_size_bytes: Option<i64>) -> RepairConfig {
    RepairConfig::new(
        2 * ONE_DAY_MS,
        3 * ONE_DAY_MS,
        4 * ONE_DAY_MS,
        target_repair_size_bytes,
    )
    .unwrap()
}

#[tokio::test]
async fn test_uniform_vnodes_combined_into_units() {
    let vnodes = vec![
        vnode(1, 4, &[1, 2], 0),
        vnode(4, 7, &[1, 2], 0),
        vnode(7, 10, &[1, 2], 0),
        vnode(10, 13, &[1, 2], 0),
        vnode(13, 16, &[1, 2], 0),
    ];
    let f = PlanningFixture::new(snapshot_of(vnodes), config(Some(1_000))).await;
    // 2000 bytes at 1000 per unit: two target repairs over 15 tokens,
    // 7 tokens per unit.
    f.storage.set(2_000);

    let tasks = f.job.tasks(ONE_DAY_MS).unwrap();
    assert_eq!(tasks.len(), 1, "uniform replicas form a single group");
    assert_eq!(*tasks[0].tokens_per_task(), BigInt::from(7));

    let units = tasks[0].repair_units().unwrap();
    assert_eq!(units, vec![
        vec![TokenRange::new(1, 4), TokenRange::new(4, 7)],
        vec![TokenRange::new(7, 10), TokenRange::new(10, 13)],
        vec![TokenRange::new(13, 16)],
    ]);
    f.close().await;
}

#[tokio::test]
async fn test_wide_vnode_split_into_units() {
    let f = PlanningFixture::new(
        snapshot_of(vec![vnode(0, 100, &[1, 2], 0)]),
        config(Some(1_000)),
    )
    .await;
    // 10000 bytes at 1000 per unit: ten units over 100 tokens.
    f.storage.set(10_000);

    let tasks = f.job.tasks(ONE_DAY_MS).unwrap();
    let units = tasks[0].repair_units().unwrap();

    assert_eq!(units.len(), 10);
    for (i, unit) in units.iter().enumerate() {
        assert_eq!(unit, &vec![TokenRange::new(i as i64 * 10, (i as i64 + 1) * 10)]);
    }
    f.close().await;
}

#[tokio::test]
async fn test_full_repair_plans_one_unit_per_group() {
    let vnodes = vec![
        vnode(0, 50, &[1, 2], 0),
        vnode(50, 100, &[2, 3], 0),
        vnode(100, 150, &[1, 2], 0),
    ];
    let f = PlanningFixture::new(snapshot_of(vnodes), config(None)).await;
    f.storage.set(1 << 40);

    let tasks = f.job.tasks(ONE_DAY_MS).unwrap();
    assert_eq!(tasks.len(), 2);
    for task in &tasks {
        assert_eq!(*task.tokens_per_task(), full_range());
        assert_eq!(
            task.repair_units().unwrap().len(),
            1,
            "full repair never splits a group"
        );
    }
    f.close().await;
}

#[tokio::test]
async fn test_unknown_table_size_falls_back_to_full_range() {
    let f = PlanningFixture::new(
        snapshot_of(vec![vnode(0, 100, &[1], 0)]),
        config(Some(1_000)),
    )
    .await;
    f.storage.set(0);

    let tasks = f.job.tasks(ONE_DAY_MS).unwrap();
    assert_eq!(*tasks[0].tokens_per_task(), full_range());
    f.close().await;
}

#[tokio::test]
async fn test_status_and_progress_follow_repair_age() {
    let now = 100 * ONE_DAY_MS;
    let f = PlanningFixture::new(
        snapshot_of(vec![
            vnode(0, 10, &[1], now - ONE_DAY_MS),
            vnode(10, 20, &[1], now - ONE_DAY_MS),
        ]),
        config(None),
    )
    .await;

    assert_eq!(f.job.status(now).unwrap(), RepairStatus::Completed);
    assert_eq!(f.job.progress(now).unwrap(), 1.0);

    // Five days later everything is stale.
    let later = now + 5 * ONE_DAY_MS;
    assert_eq!(f.job.status(later).unwrap(), RepairStatus::Overdue);
    assert_eq!(f.job.progress(later).unwrap(), 0.0);
    f.close().await;
}

#[tokio::test]
async fn test_denied_policy_blocks_when_due() {
    let f = PlanningFixture::with_policies(
        snapshot_of(vec![vnode(0, 10, &[1], 0)]),
        config(None),
        vec![Arc::new(DenyAll)],
    )
    .await;

    assert_eq!(
        f.job.status(10 * ONE_DAY_MS).unwrap(),
        RepairStatus::Blocked
    );
    assert!(!f.job.runnable().unwrap());
    f.close().await;
}

#[tokio::test]
async fn test_tasks_carry_job_identity_and_collaborators() {
    let f = PlanningFixture::new(
        snapshot_of(vec![vnode(0, 10, &[1, 2, 3], 0)]),
        config(None),
    )
    .await;

    let tasks = f.job.tasks(10 * ONE_DAY_MS).unwrap();
    let task = &tasks[0];
    assert_eq!(task.job_id(), f.job.id());
    assert_eq!(task.table(), &f.table);
    assert_eq!(task.repair_config(), f.job.repair_config());
    assert_eq!(task.lock_factory().lock_type(), RepairLockType::Vnode);
    assert_eq!(task.group().replicas.len(), 3);
    assert!(task.priority() > 0, "long overdue group must be prioritized");
    f.close().await;
}

#[tokio::test]
async fn test_post_execute_refreshes_the_cache() {
    let f = PlanningFixture::new(snapshot_of(vec![vnode(0, 10, &[1], 0)]), config(None)).await;
    let updates_before = f.factory.updates().load(Ordering::SeqCst);

    let tasks = f.job.tasks(10 * ONE_DAY_MS).unwrap();
    f.job.post_execute(true, &tasks[0]).await;

    assert_eq!(
        f.factory.updates().load(Ordering::SeqCst),
        updates_before + 1
    );
    f.close().await;
}

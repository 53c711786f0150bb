//! Monitor loop reconciliation: PR state, liveness, stall detection and
//! per-task crash isolation.

mod common;

use common::{active_task, branch, test_config, Harness};
use mill::application::StopSignal;
use mill::domain::models::{Candidate, IssueState, Outcome, PrState, TaskStatus};
use mill::domain::ports::TaskStore;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn test_panicking_check_does_not_block_other_tasks() {
    let h = Harness::new(vec![]);
    h.seed(&active_task("a", &[]), false).await;
    h.seed(&active_task("b", &[]), false).await;
    h.code_host.panic_for(&branch("a"));
    h.code_host.set_pr(&branch("b"), PrState::Merged);

    let orchestrator = h.orchestrator(&test_config()).await;
    let report = orchestrator.monitor().run_cycle().await;

    assert_eq!(report.checked, 2);
    assert_eq!(report.failed, vec!["a".to_string()]);
    assert_eq!(report.retired, vec![("b".to_string(), Outcome::Completed)]);
    {
        let registry = orchestrator.registry();
        let registry = registry.lock().await;
        assert!(registry.get("a").is_some(), "failed task stays tracked");
        assert!(registry.get("b").is_none());
    }

    // retried on the next cycle
    h.code_host.heal(&branch("a"));
    h.code_host.set_pr(&branch("a"), PrState::Merged);
    let report = orchestrator.monitor().run_cycle().await;
    assert_eq!(h.code_host.calls_for(&branch("a")), 2);
    assert_eq!(report.retired, vec![("a".to_string(), Outcome::Completed)]);
    assert!(orchestrator.registry().lock().await.is_empty());
}

#[tokio::test]
async fn test_hanging_query_counts_as_no_information() {
    let h = Harness::new(vec![]);
    h.seed(&active_task("slow", &[]), true).await;
    h.seed(&active_task("fast", &[]), false).await;
    h.code_host.hang_for(&branch("slow"));
    h.code_host.set_pr(&branch("fast"), PrState::Closed);

    let orchestrator = h.orchestrator(&test_config()).await;
    let report = orchestrator.monitor().run_cycle().await;

    assert!(report.failed.is_empty());
    assert_eq!(report.retired, vec![("fast".to_string(), Outcome::Abandoned)]);
    let registry = orchestrator.registry();
    let registry = registry.lock().await;
    assert_eq!(registry.get("slow").unwrap().status, TaskStatus::Active);
}

#[tokio::test]
async fn test_merged_completes_exactly_once() {
    let h = Harness::new(vec![mill::domain::models::Candidate::new("M", "Merged work")]);
    h.seed(&active_task("m", &[]), true).await;
    h.code_host.set_pr(&branch("m"), PrState::Merged);

    let orchestrator = h.orchestrator(&test_config()).await;
    orchestrator.monitor().run_cycle().await;
    let second = orchestrator.monitor().run_cycle().await;

    assert_eq!(second.checked, 0);
    assert_eq!(h.hook.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.workspace.removed_branches(), vec![(branch("m"), true)]);
    assert_eq!(h.executor.stopped.lock().unwrap().clone(), vec!["mill-m".to_string()]);
    assert_eq!(h.tracker.updates_for("M"), vec![IssueState::Done]);

    let record = h.store.load_task("m").await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(record.outcome, Some(Outcome::Completed));
    assert!(h.store.load_active_index().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_closed_is_abandoned_and_keeps_branch() {
    let h = Harness::new(vec![]);
    h.seed(&active_task("c", &[]), true).await;
    h.code_host.set_pr(&branch("c"), PrState::Closed);

    let orchestrator = h.orchestrator(&test_config()).await;
    let report = orchestrator.monitor().run_cycle().await;

    assert_eq!(report.retired, vec![("c".to_string(), Outcome::Abandoned)]);
    assert_eq!(h.workspace.removed_branches(), vec![(branch("c"), false)]);
    assert!(h.tracker.updates.lock().unwrap().is_empty());
    let record = h.store.load_task("c").await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Abandoned);
}

#[tokio::test]
async fn test_open_pr_promotes_to_active() {
    let h = Harness::new(vec![]);
    let mut task = active_task("o", &[]);
    task.set_status(TaskStatus::Stalled);
    h.seed(&task, true).await;
    h.executor.kill("mill-o");
    h.code_host.set_pr(&branch("o"), PrState::Open);

    let orchestrator = h.orchestrator(&test_config()).await;
    let report = orchestrator.monitor().run_cycle().await;

    assert_eq!(report.revived, vec!["o".to_string()]);
    assert_eq!(
        orchestrator.registry().lock().await.get("o").unwrap().status,
        TaskStatus::Active
    );
    assert_eq!(h.store.load_task("o").await.unwrap().unwrap().status, TaskStatus::Active);
}

#[tokio::test]
async fn test_unapproved_plan_stays_active_even_if_dead() {
    let h = Harness::new(vec![]);
    h.seed(&active_task("p", &[]), false).await;
    h.executor.kill("mill-p");

    let orchestrator = h.orchestrator(&test_config()).await;
    let report = orchestrator.monitor().run_cycle().await;

    assert!(report.stalled.is_empty());
    assert_eq!(
        orchestrator.registry().lock().await.get("p").unwrap().status,
        TaskStatus::Active
    );
}

#[tokio::test]
async fn test_dead_context_after_plan_is_stalled() {
    let h = Harness::new(vec![]);
    h.seed(&active_task("s", &[]), true).await;
    h.executor.kill("mill-s");

    let orchestrator = h.orchestrator(&test_config()).await;
    let report = orchestrator.monitor().run_cycle().await;
    assert_eq!(report.stalled, vec!["s".to_string()]);

    // stalled tasks stay tracked and keep being reconciled
    let report = orchestrator.monitor().run_cycle().await;
    assert!(report.stalled.is_empty());
    assert_eq!(
        orchestrator.registry().lock().await.get("s").unwrap().status,
        TaskStatus::Stalled
    );

    h.code_host.set_pr(&branch("s"), PrState::Merged);
    let report = orchestrator.monitor().run_cycle().await;
    assert_eq!(report.retired, vec![("s".to_string(), Outcome::Completed)]);
}

#[tokio::test]
async fn test_dead_context_within_grace_is_not_stalled() {
    let h = Harness::new(vec![]);
    h.seed(&active_task("g", &[]), true).await;
    h.executor.kill("mill-g");

    let mut config = test_config();
    config.monitor.stall_grace_secs = 3600;
    let orchestrator = h.orchestrator(&config).await;

    let report = orchestrator.monitor().run_cycle().await;
    assert!(report.stalled.is_empty());

    // agent comes back before the grace period runs out
    h.executor.set_alive("mill-g", true);
    let report = orchestrator.monitor().run_cycle().await;
    assert!(report.stalled.is_empty());
    assert_eq!(
        orchestrator.registry().lock().await.get("g").unwrap().status,
        TaskStatus::Active
    );
}

#[tokio::test]
async fn test_unknown_pr_state_changes_nothing() {
    let h = Harness::new(vec![]);
    h.seed(&active_task("u", &[]), true).await;
    h.executor.kill("mill-u");
    h.code_host.set_pr(&branch("u"), PrState::Unknown);

    let orchestrator = h.orchestrator(&test_config()).await;
    let report = orchestrator.monitor().run_cycle().await;

    assert!(report.retired.is_empty());
    assert!(report.stalled.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(
        orchestrator.registry().lock().await.get("u").unwrap().status,
        TaskStatus::Active
    );
}

#[tokio::test]
async fn test_admitted_task_is_promoted_when_alive() {
    let h = Harness::new(vec![]);
    let mut task = active_task("n", &[]);
    task.set_status(TaskStatus::Admitted);
    h.seed(&task, true).await;

    let orchestrator = h.orchestrator(&test_config()).await;
    let report = orchestrator.monitor().run_cycle().await;

    assert_eq!(report.revived, vec!["n".to_string()]);
}

#[tokio::test]
async fn test_admitted_task_without_agent_is_retired_as_failed() {
    let h = Harness::new(vec![]);
    let mut task = active_task("orphan", &[]);
    task.set_status(TaskStatus::Admitted);
    h.seed(&task, false).await;
    h.executor.kill("mill-orphan");

    let orchestrator = h.orchestrator(&test_config()).await;
    let report = orchestrator.monitor().run_cycle().await;

    assert_eq!(report.retired, vec![("orphan".to_string(), Outcome::Failed)]);
    assert!(report.revived.is_empty());
    assert!(orchestrator.registry().lock().await.is_empty());
    let record = h.store.load_task("orphan").await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    // the branch is kept for inspection
    assert_eq!(h.workspace.removed_branches(), vec![(branch("orphan"), false)]);
}

#[tokio::test]
async fn test_admitted_task_without_agent_waits_out_grace() {
    let h = Harness::new(vec![]);
    let mut task = active_task("slow", &[]);
    task.set_status(TaskStatus::Admitted);
    h.seed(&task, false).await;
    h.executor.kill("mill-slow");

    let mut config = test_config();
    config.monitor.stall_grace_secs = 3600;
    let orchestrator = h.orchestrator(&config).await;
    let report = orchestrator.monitor().run_cycle().await;

    assert!(report.retired.is_empty());
    assert!(report.revived.is_empty());
    assert_eq!(
        orchestrator.registry().lock().await.get("slow").unwrap().status,
        TaskStatus::Admitted
    );
}

#[tokio::test]
async fn test_requeued_item_is_not_retired_by_earlier_pr() {
    let h = Harness::new(vec![Candidate::new("R-1", "Retry thing")]);
    h.code_host.set_pr("task/r-1-retry-thing", PrState::Closed);
    let orchestrator = h.orchestrator(&test_config()).await;

    let admitted = orchestrator.admission().fill().await.unwrap();
    assert_eq!(admitted.launched, vec!["r-1-retry-thing-2"]);

    let report = orchestrator.monitor().run_cycle().await;
    assert!(report.retired.is_empty());
    let task = orchestrator.registry().lock().await.get("r-1-retry-thing-2").cloned().unwrap();
    assert_eq!(task.branch, "task/r-1-retry-thing-2");
    assert_eq!(task.status, TaskStatus::Active);

    // only the new attempt's own PR decides its outcome
    h.code_host.set_pr("task/r-1-retry-thing-2", PrState::Merged);
    let report = orchestrator.monitor().run_cycle().await;
    assert_eq!(
        report.retired,
        vec![("r-1-retry-thing-2".to_string(), Outcome::Completed)]
    );
}

#[tokio::test]
async fn test_stop_before_start_runs_no_cycles() {
    let h = Harness::new(vec![]);
    h.seed(&active_task("x", &[]), false).await;
    let orchestrator = h.orchestrator(&test_config()).await;

    let stop = StopSignal::new();
    stop.cancel();
    assert_eq!(orchestrator.monitor_only(&stop).await, 0);
    assert_eq!(h.code_host.calls_for(&branch("x")), 0);
}

#[tokio::test]
async fn test_stop_during_sleep_exits_after_cycle() {
    let h = Harness::new(vec![]);
    h.seed(&active_task("y", &[]), false).await;
    let mut config = test_config();
    config.monitor.poll_interval_secs = 3600;
    let orchestrator = h.orchestrator(&config).await;

    let stop = StopSignal::new();
    let remote = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        remote.cancel();
    });

    let cycles = tokio::time::timeout(Duration::from_secs(10), orchestrator.monitor_only(&stop))
        .await
        .expect("loop should stop promptly");
    assert_eq!(cycles, 1);
    assert_eq!(h.code_host.calls_for(&branch("y")), 1);
}

#[tokio::test]
async fn test_stop_marker_file_stops_loop() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("stop");
    let h = Harness::new(vec![]);
    let orchestrator = h.orchestrator(&test_config()).await;

    StopSignal::request(&marker).unwrap();
    let stop = StopSignal::with_marker(&marker);
    assert_eq!(orchestrator.run(&stop).await, 0);
    assert_eq!(h.tracker.list_calls.load(Ordering::SeqCst), 0);
}

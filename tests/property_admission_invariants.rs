//! Property tests for admission: whatever the backlog looks like, one fill
//! pass never exceeds the global or per-tier limits and never admits two
//! conflicting tasks side by side.

mod common;

use common::{test_config, Harness};
use mill::domain::models::{Candidate, PriorityTier, RiskTier, Task};
use mill::services::ConflictDetector;
use proptest::prelude::*;

fn label_strategy() -> impl Strategy<Value = Vec<String>> {
    (
        prop::option::of(prop_oneof![Just("low"), Just("medium"), Just("high")]),
        prop::option::of(prop_oneof![Just("src/a.rs"), Just("src/b.rs"), Just("src/c.rs")]),
        prop::option::of(prop_oneof![Just("auth"), Just("billing")]),
        prop::option::of(prop_oneof![Just("parser"), Just("cli")]),
        any::<bool>(),
    )
        .prop_map(|(risk, file, area, component, e2e)| {
            let mut labels = Vec::new();
            if let Some(risk) = risk {
                labels.push(format!("risk: {risk}"));
            }
            if let Some(file) = file {
                labels.push(format!("files: {file}"));
            }
            if let Some(area) = area {
                labels.push(format!("area: {area}"));
            }
            if let Some(component) = component {
                labels.push(format!("component: {component}"));
            }
            if e2e {
                labels.push("tests: e2e".to_string());
            }
            labels
        })
}

fn priority_strategy() -> impl Strategy<Value = PriorityTier> {
    prop_oneof![
        Just(PriorityTier::Urgent),
        Just(PriorityTier::High),
        Just(PriorityTier::Medium),
        Just(PriorityTier::Low),
        Just(PriorityTier::None),
    ]
}

fn backlog_strategy() -> impl Strategy<Value = Vec<Candidate>> {
    prop::collection::vec((label_strategy(), priority_strategy()), 0..12).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (labels, priority))| {
                Candidate::new(format!("MIL-{i}"), format!("Item {i}"))
                    .with_labels(labels)
                    .with_priority(priority)
            })
            .collect()
    })
}

fn admitted(backlog: Vec<Candidate>, max_parallel: usize) -> Vec<Task> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async move {
        let h = Harness::new(backlog);
        let mut config = test_config();
        config.max_parallel = max_parallel;
        let orchestrator = h.orchestrator(&config).await;
        orchestrator.admission().fill().await.unwrap();
        let registry = orchestrator.registry();
        let snapshot = registry.lock().await.snapshot();
        snapshot
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: the active set never grows past max_parallel
    #[test]
    fn prop_never_exceeds_max_parallel(
        backlog in backlog_strategy(),
        max_parallel in 1usize..6,
    ) {
        let tasks = admitted(backlog, max_parallel);
        prop_assert!(tasks.len() <= max_parallel);
    }

    /// Property: per-tier limits hold (medium 2, high 1 by default)
    #[test]
    fn prop_tier_limits_hold(
        backlog in backlog_strategy(),
        max_parallel in 1usize..6,
    ) {
        let tasks = admitted(backlog, max_parallel);
        let count = |tier| tasks.iter().filter(|t| t.conflict_key.risk_tier == tier).count();

        prop_assert!(count(RiskTier::High) <= 1);
        prop_assert!(count(RiskTier::Medium) <= 2);
    }

    /// Property: no two admitted tasks conflict with each other
    #[test]
    fn prop_no_conflicting_pair(
        backlog in backlog_strategy(),
        max_parallel in 1usize..6,
    ) {
        let tasks = admitted(backlog, max_parallel);
        let detector = ConflictDetector::new();

        for (i, task) in tasks.iter().enumerate() {
            let others = tasks.iter().enumerate().filter(|(j, _)| *j != i).map(|(_, t)| t);
            let conflict = detector.would_conflict(&task.conflict_key, others);
            prop_assert!(conflict.is_none(), "{} conflicts: {:?}", task.id, conflict);
        }
    }

    /// Property: something is admitted whenever the backlog is non-empty,
    /// since the first-ranked candidate always fits an empty set
    #[test]
    fn prop_empty_set_admits_top_candidate(
        backlog in backlog_strategy().prop_filter("non-empty", |b| !b.is_empty()),
    ) {
        let tasks = admitted(backlog, 3);
        prop_assert!(!tasks.is_empty());
    }
}

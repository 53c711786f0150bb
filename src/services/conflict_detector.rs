//! Conflict detection between a candidate and the active set.
//!
//! Two tasks conflict when they share a touched file, the same area, the
//! same component, or both need the serialized end-to-end test environment.

use serde::Serialize;
use std::fmt;

use crate::domain::models::{ConflictKey, Task};

/// Why a candidate may not run alongside an active task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictReason {
    SharedFiles { task_id: String, files: Vec<String> },
    SameArea { task_id: String, area: String },
    SameComponent { task_id: String, component: String },
    BothE2E { task_id: String },
}

impl ConflictReason {
    /// The active task the candidate collides with.
    pub fn task_id(&self) -> &str {
        match self {
            Self::SharedFiles { task_id, .. }
            | Self::SameArea { task_id, .. }
            | Self::SameComponent { task_id, .. }
            | Self::BothE2E { task_id } => task_id,
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedFiles { task_id, files } => {
                write!(f, "shares files with {task_id}: {}", files.join(", "))
            }
            Self::SameArea { task_id, area } => write!(f, "same area '{area}' as {task_id}"),
            Self::SameComponent { task_id, component } => {
                write!(f, "same component '{component}' as {task_id}")
            }
            Self::BothE2E { task_id } => write!(f, "e2e tests already running in {task_id}"),
        }
    }
}

/// Stateless conflict checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn new() -> Self {
        Self
    }

    /// Compare `key` against every task in `active`. Returns the first
    /// conflict found, or `None` when the candidate may run in parallel.
    pub fn would_conflict<'a, I>(&self, key: &ConflictKey, active: I) -> Option<ConflictReason>
    where
        I: IntoIterator<Item = &'a Task>,
    {
        active
            .into_iter()
            .find_map(|task| Self::compare(key, &task.conflict_key, &task.id))
    }

    fn compare(candidate: &ConflictKey, active: &ConflictKey, task_id: &str) -> Option<ConflictReason> {
        let shared: Vec<String> = candidate.files.intersection(&active.files).cloned().collect();
        if !shared.is_empty() {
            return Some(ConflictReason::SharedFiles {
                task_id: task_id.to_string(),
                files: shared,
            });
        }

        if let (Some(a), Some(b)) = (&candidate.area, &active.area) {
            if a == b {
                return Some(ConflictReason::SameArea {
                    task_id: task_id.to_string(),
                    area: a.clone(),
                });
            }
        }

        if let (Some(a), Some(b)) = (&candidate.component, &active.component) {
            if a == b {
                return Some(ConflictReason::SameComponent {
                    task_id: task_id.to_string(),
                    component: a.clone(),
                });
            }
        }

        if candidate.is_e2e() && active.is_e2e() {
            return Some(ConflictReason::BothE2E {
                task_id: task_id.to_string(),
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ExecutionHandle, PhaseState};

    fn task_with(id: &str, labels: &[&str]) -> Task {
        Task::admitted(
            id,
            id.to_uppercase(),
            id,
            format!("feature/{id}"),
            format!("/tmp/{id}"),
            ExecutionHandle(format!("mill-{id}")),
            ConflictKey::from_labels(labels),
            PhaseState::default(),
        )
    }

    #[test]
    fn test_shared_files_conflict() {
        let active = [task_with("a", &["files: src/auth.rs, src/db.rs"])];
        let key = ConflictKey::from_labels(&["files: src/db.rs"]);

        let reason = ConflictDetector::new().would_conflict(&key, &active).unwrap();
        assert_eq!(
            reason,
            ConflictReason::SharedFiles {
                task_id: "a".into(),
                files: vec!["src/db.rs".into()]
            }
        );
    }

    #[test]
    fn test_same_area_and_component_conflict() {
        let detector = ConflictDetector::new();
        let active = [task_with("a", &["area: billing"]), task_with("b", &["component: Navbar"])];

        let area = detector.would_conflict(&ConflictKey::from_labels(&["area: Billing"]), &active);
        assert!(matches!(area, Some(ConflictReason::SameArea { .. })));

        let comp = detector.would_conflict(&ConflictKey::from_labels(&["component: navbar"]), &active);
        assert_eq!(comp.map(|r| r.task_id().to_string()), Some("b".to_string()));
    }

    #[test]
    fn test_e2e_serialized() {
        let active = [task_with("a", &["tests: e2e"])];
        let detector = ConflictDetector::new();

        let both = detector.would_conflict(&ConflictKey::from_labels(&["tests: e2e"]), &active);
        assert!(matches!(both, Some(ConflictReason::BothE2E { .. })));

        let unit = detector.would_conflict(&ConflictKey::from_labels(&["tests: unit"]), &active);
        assert!(unit.is_none());
    }

    #[test]
    fn test_disjoint_keys_do_not_conflict() {
        let active = [task_with("a", &["files: a.rs", "area: auth", "layer: api"])];
        let key = ConflictKey::from_labels(&["files: b.rs", "area: search", "layer: api"]);
        assert!(ConflictDetector::new().would_conflict(&key, &active).is_none());
    }

    #[test]
    fn test_empty_active_set() {
        let key = ConflictKey::from_labels(&["tests: e2e"]);
        assert!(ConflictDetector::new().would_conflict(&key, &[]).is_none());
    }

    #[test]
    fn test_unclassified_labels_never_conflict() {
        let active = [task_with("a", &["tests: smoke"])];
        let key = ConflictKey::from_labels(&["tests: smoke"]);
        assert!(ConflictDetector::new().would_conflict(&key, &active).is_none());
    }
}

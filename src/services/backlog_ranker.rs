//! Backlog ranking.
//!
//! Orders actionable candidates by a weighted score:
//!
//! ```text
//! score = w_priority  * priority_normalized
//!       + w_estimate  * 1 / (1 + estimate)
//!       + w_readiness * (1 if every dependency is resolved, else -penalty)
//!       + w_age       * min(age_days / horizon_days, 1)
//! ```
//!
//! Ties are broken by candidate id so repeated rankings of the same input
//! are identical.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::RankingError;
use crate::domain::models::{Candidate, RankingConfig};
use crate::domain::ports::IssueTracker;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// A candidate together with its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub score: f64,
    /// Every dependency resolved
    pub ready: bool,
}

/// Service that scores and orders backlog candidates.
#[derive(Debug, Clone)]
pub struct BacklogRanker {
    config: RankingConfig,
}

impl Default for BacklogRanker {
    fn default() -> Self {
        Self::new(RankingConfig::default())
    }
}

impl BacklogRanker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Whether a candidate is eligible for ranking at all.
    pub fn is_actionable(&self, candidate: &Candidate) -> bool {
        if candidate.is_sub_issue() && !self.config.include_sub_issues {
            return false;
        }
        self.config
            .actionable_states
            .iter()
            .any(|name| candidate.state.matches_name(name))
    }

    /// Score a single candidate at `now`.
    pub fn score(&self, candidate: &Candidate, ready: bool, now: DateTime<Utc>) -> f64 {
        let cfg = &self.config;

        let priority = candidate.priority.normalized();

        let estimate = candidate.estimate.unwrap_or(cfg.default_estimate).max(0.0);
        let inverse_estimate = 1.0 / (1.0 + estimate);

        let readiness = if ready { 1.0 } else { -cfg.dependency_penalty };

        let age_days = ((now - candidate.created_at).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0);
        let age = if cfg.age_horizon_days > 0.0 {
            (age_days / cfg.age_horizon_days).min(1.0)
        } else {
            1.0
        };

        cfg.priority_weight * priority
            + cfg.estimate_weight * inverse_estimate
            + cfg.dependency_weight * readiness
            + cfg.age_weight * age
    }

    /// Rank candidates against the current time.
    ///
    /// `resolved` holds the ids of dependencies known to be done.
    pub fn rank(&self, candidates: &[Candidate], resolved: &HashSet<String>) -> Vec<RankedCandidate> {
        self.rank_at(candidates, resolved, Utc::now())
    }

    /// Rank candidates as of `now`. Pure: the same inputs always produce
    /// the same order.
    pub fn rank_at(
        &self,
        candidates: &[Candidate],
        resolved: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> Vec<RankedCandidate> {
        let mut ranked: Vec<RankedCandidate> = candidates
            .iter()
            .filter(|c| self.is_actionable(c))
            .map(|c| {
                let ready = c.dependencies.iter().all(|dep| resolved.contains(dep));
                RankedCandidate {
                    score: self.score(c, ready, now),
                    ready,
                    candidate: c.clone(),
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.candidate.id.cmp(&b.candidate.id))
        });

        ranked
    }

    /// Fetch the backlog from the tracker, resolve dependency states, and rank.
    ///
    /// Dependencies listed in the backlog itself are resolved from their
    /// reported state. Anything else is looked up individually; a failed
    /// lookup counts as unresolved.
    #[instrument(skip(self, tracker))]
    pub async fn fetch_and_rank(
        &self,
        tracker: &dyn IssueTracker,
        project: &str,
    ) -> Result<Vec<RankedCandidate>, RankingError> {
        let backlog = tracker.list_backlog(project).await?;

        let known: HashMap<&str, &Candidate> =
            backlog.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut resolved = HashSet::new();
        let mut unknown: HashSet<&str> = HashSet::new();

        for candidate in backlog.iter().filter(|c| self.is_actionable(c)) {
            for dep in &candidate.dependencies {
                match known.get(dep.as_str()) {
                    Some(c) if c.state.is_resolved() => {
                        resolved.insert(dep.clone());
                    }
                    Some(_) => {}
                    None => {
                        unknown.insert(dep.as_str());
                    }
                }
            }
        }

        for dep in unknown {
            match tracker.get_issue_state(dep).await {
                Ok(state) if state.is_resolved() => {
                    resolved.insert(dep.to_string());
                }
                Ok(state) => debug!(dependency = dep, state = %state, "Dependency unresolved"),
                Err(e) => {
                    warn!(dependency = dep, error = %e, "Dependency state lookup failed, treating as unresolved");
                }
            }
        }

        let ranked = self.rank(&backlog, &resolved);
        info!(
            backlog = backlog.len(),
            actionable = ranked.len(),
            "Ranked backlog"
        );
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{IssueState, PriorityTier};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn candidate(id: &str) -> Candidate {
        let mut c = Candidate::new(id, format!("Item {id}"));
        c.created_at = now();
        c
    }

    #[test]
    fn test_score_components() {
        let ranker = BacklogRanker::default();
        let c = candidate("A").with_priority(PriorityTier::Urgent).with_estimate(1.0);

        // 0.4 * 1.0 + 0.2 * 0.5 + 0.3 * 1.0 + 0.1 * 0.0
        let score = ranker.score(&c, true, now());
        assert!((score - 0.8).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn test_unresolved_dependency_penalized() {
        let ranker = BacklogRanker::default();
        let c = candidate("A");
        let ready = ranker.score(&c, true, now());
        let blocked = ranker.score(&c, false, now());
        // readiness swings from +1 to -1 at weight 0.3
        assert!((ready - blocked - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_age_saturates_at_horizon() {
        let ranker = BacklogRanker::default();
        let mut old = candidate("A");
        old.created_at = now() - Duration::days(30);
        let mut ancient = candidate("B");
        ancient.created_at = now() - Duration::days(300);

        assert_eq!(ranker.score(&old, true, now()), ranker.score(&ancient, true, now()));
    }

    #[test]
    fn test_future_created_at_has_no_age_bonus() {
        let ranker = BacklogRanker::default();
        let mut c = candidate("A");
        c.created_at = now() + Duration::days(2);
        assert_eq!(ranker.score(&c, true, now()), ranker.score(&candidate("A"), true, now()));
    }

    #[test]
    fn test_rank_orders_by_score_then_id() {
        let ranker = BacklogRanker::default();
        let candidates = vec![
            candidate("C"),
            candidate("B").with_priority(PriorityTier::High),
            candidate("A"),
        ];

        let ranked = ranker.rank_at(&candidates, &HashSet::new(), now());
        let ids: Vec<_> = ranked.iter().map(|r| r.candidate.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_rank_is_deterministic() {
        let ranker = BacklogRanker::default();
        let candidates: Vec<_> = (0..20).map(|i| candidate(&format!("X-{i:02}"))).collect();
        let first = ranker.rank_at(&candidates, &HashSet::new(), now());
        let second = ranker.rank_at(&candidates, &HashSet::new(), now());
        assert_eq!(first, second);
    }

    #[test]
    fn test_rank_filters_non_actionable() {
        let ranker = BacklogRanker::default();
        let mut done = candidate("DONE");
        done.state = IssueState::Done;
        let mut child = candidate("CHILD");
        child.parent_id = Some("EPIC".into());

        let ranked = ranker.rank_at(&[done, child, candidate("OK")], &HashSet::new(), now());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].candidate.id, "OK");
    }

    #[test]
    fn test_sub_issues_included_when_configured() {
        let ranker = BacklogRanker::new(RankingConfig {
            include_sub_issues: true,
            ..Default::default()
        });
        let mut child = candidate("CHILD");
        child.parent_id = Some("EPIC".into());
        assert_eq!(ranker.rank_at(&[child], &HashSet::new(), now()).len(), 1);
    }

    #[test]
    fn test_readiness_uses_resolved_set() {
        let ranker = BacklogRanker::default();
        let c = candidate("A").with_dependencies(["B", "C"]);

        let partial: HashSet<String> = ["B".to_string()].into();
        assert!(!ranker.rank_at(std::slice::from_ref(&c), &partial, now())[0].ready);

        let full: HashSet<String> = ["B".to_string(), "C".to_string()].into();
        assert!(ranker.rank_at(&[c], &full, now())[0].ready);
    }

    #[test]
    fn test_rank_does_not_mutate_input() {
        let ranker = BacklogRanker::default();
        let candidates = vec![candidate("B"), candidate("A")];
        let before = candidates.clone();
        let _ = ranker.rank_at(&candidates, &HashSet::new(), now());
        assert_eq!(candidates, before);
    }
}

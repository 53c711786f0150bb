//! Concurrency limits.
//!
//! Every non-terminal task occupies a slot, stalled ones included, both in
//! the global `max_parallel` budget and in its risk tier's budget.

use serde::Serialize;
use std::fmt;

use crate::domain::models::{Config, ConflictKey, RiskTier, Task};

/// Why a candidate was refused a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapacityDenial {
    AtMaxParallel { active: usize, max: usize },
    TierFull { tier: RiskTier, active: usize, limit: usize },
}

impl fmt::Display for CapacityDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtMaxParallel { active, max } => {
                write!(f, "at max parallelism ({active}/{max})")
            }
            Self::TierFull { tier, active, limit } => {
                write!(f, "{tier}-risk tier full ({active}/{limit})")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapacityManager {
    max_parallel: usize,
    tier_limits: [(RiskTier, usize); 3],
}

impl CapacityManager {
    pub fn new(config: &Config) -> Self {
        Self {
            max_parallel: config.max_parallel,
            tier_limits: RiskTier::ALL.map(|tier| (tier, config.limit_for(tier))),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    pub fn limit_for(&self, tier: RiskTier) -> usize {
        self.tier_limits
            .iter()
            .find(|(t, _)| *t == tier)
            .map_or(self.max_parallel, |(_, limit)| *limit)
    }

    pub fn has_free_slot(&self, occupied: usize) -> bool {
        occupied < self.max_parallel
    }

    /// Check whether a task with `key` fits beside `active`.
    pub fn can_admit<'a, I>(&self, key: &ConflictKey, active: I) -> Result<(), CapacityDenial>
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let mut total = 0;
        let mut same_tier = 0;
        for task in active.into_iter().filter(|t| !t.is_terminal()) {
            total += 1;
            if task.conflict_key.risk_tier == key.risk_tier {
                same_tier += 1;
            }
        }

        if total >= self.max_parallel {
            return Err(CapacityDenial::AtMaxParallel {
                active: total,
                max: self.max_parallel,
            });
        }

        let limit = self.limit_for(key.risk_tier);
        if same_tier >= limit {
            return Err(CapacityDenial::TierFull {
                tier: key.risk_tier,
                active: same_tier,
                limit,
            });
        }

        Ok(())
    }
}

//! Conflict key domain model.
//!
//! Conflict keys are parsed once, at admission time, from a candidate's
//! labels. Labels use a `key: value` form:
//!
//! | key                        | value                                        |
//! |----------------------------|----------------------------------------------|
//! | `risk`                     | `low`, `medium`, `high`                      |
//! | `files` / `file`           | comma-separated paths                        |
//! | `layer`                    | `ui`, `api`, `service`, `database`, `infra`  |
//! | `area`                     | free text                                    |
//! | `component`                | free text                                    |
//! | `tests` / `test`           | `e2e`, `integration`, `unit`, `none`         |
//!
//! Labels without a recognized key (plain `bug`, `frontend`, ...) are not
//! conflict labels and are ignored. A recognized key with an unrecognized
//! value is kept in `unclassified` and contributes nothing to conflict
//! detection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// Concurrency class of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Architectural layer a task touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Ui,
    Api,
    Service,
    Database,
    Infra,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ui => "ui",
            Self::Api => "api",
            Self::Service => "service",
            Self::Database => "database",
            Self::Infra => "infra",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ui" | "frontend" => Some(Self::Ui),
            "api" => Some(Self::Api),
            "service" | "backend" => Some(Self::Service),
            "database" | "db" => Some(Self::Database),
            "infra" | "infrastructure" => Some(Self::Infra),
            _ => None,
        }
    }
}

/// Heaviest test tier a task needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TestTier {
    E2E,
    Integration,
    Unit,
    #[default]
    None,
}

impl TestTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E2E => "e2e",
            Self::Integration => "integration",
            Self::Unit => "unit",
            Self::None => "none",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "e2e" | "end-to-end" | "end to end" => Some(Self::E2E),
            "integration" => Some(Self::Integration),
            "unit" => Some(Self::Unit),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// Attributes used to prevent unsafe parallelism. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConflictKey {
    pub risk_tier: RiskTier,
    #[serde(default)]
    pub files: BTreeSet<String>,
    #[serde(default)]
    pub layer: Option<Layer>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub test_tier: TestTier,
    /// Conflict labels whose value was not recognized
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unclassified: Vec<String>,
}

impl ConflictKey {
    /// Parse a conflict key from raw label strings.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut key = Self::default();

        for raw in labels {
            let raw = raw.as_ref();
            let Some((name, value)) = raw.split_once(':') else {
                continue;
            };
            let value = value.trim();

            let recognized = match name.trim().to_lowercase().as_str() {
                "risk" => RiskTier::parse(value).map(|tier| key.risk_tier = tier),
                "files" | "file" => {
                    let paths: Vec<String> = value
                        .split(',')
                        .map(normalize_path)
                        .filter(|p| !p.is_empty())
                        .collect();
                    (!paths.is_empty()).then(|| key.files.extend(paths))
                }
                "layer" => Layer::parse(value).map(|layer| key.layer = Some(layer)),
                "area" => non_empty(value).map(|area| key.area = Some(area)),
                "component" => non_empty(value).map(|c| key.component = Some(c)),
                "tests" | "test" | "test-tier" => {
                    TestTier::parse(value).map(|tier| key.test_tier = tier)
                }
                _ => continue,
            };

            if recognized.is_none() {
                warn!(label = %raw, "Unrecognized conflict label value, ignoring for conflict detection");
                key.unclassified.push(raw.to_string());
            }
        }

        key
    }

    pub fn is_e2e(&self) -> bool {
        self.test_tier == TestTier::E2E
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    trimmed.strip_prefix("./").unwrap_or(trimmed).to_string()
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim().to_lowercase();
    (!value.is_empty()).then_some(value)
}

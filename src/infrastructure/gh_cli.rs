//! GitHub CLI code-host adapter.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::domain::models::{PrLookup, PrState};
use crate::domain::ports::CodeHost;
use crate::infrastructure::process;

#[derive(Debug, Deserialize)]
struct GhPullRequest {
    number: u64,
    state: String,
    url: String,
}

/// Queries pull requests with `gh pr list`.
pub struct GhCli {
    repo_root: PathBuf,
}

impl GhCli {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    pub async fn preflight(&self) -> bool {
        process::tool_available("gh", &["--version"]).await
    }

    /// Collapse `gh pr list --json number,state,url` output to one lookup.
    /// Unparsable output is `Unknown`.
    pub fn parse_pr_list(json: &str) -> PrLookup {
        match serde_json::from_str::<Vec<GhPullRequest>>(json) {
            Ok(prs) => PrLookup::most_significant(
                prs.into_iter()
                    .map(|pr| PrLookup::new(PrState::from_host(&pr.state), Some(pr.url), Some(pr.number))),
            ),
            Err(e) => {
                warn!(error = %e, "Unparsable gh output");
                PrLookup::unknown()
            }
        }
    }
}

#[async_trait]
impl CodeHost for GhCli {
    async fn find_pr(&self, branch: &str) -> PrLookup {
        let args = [
            "pr", "list", "--head", branch, "--state", "all", "--json", "number,state,url",
        ];
        match process::run("gh", args, Some(&self.repo_root)).await {
            Ok(out) if out.success => {
                let lookup = Self::parse_pr_list(&out.stdout);
                debug!(branch, state = %lookup.state, "PR lookup");
                lookup
            }
            Ok(out) => {
                warn!(branch, stderr = %out.stderr, "gh pr list failed");
                PrLookup::unknown()
            }
            Err(e) => {
                warn!(branch, error = %e, "Could not run gh");
                PrLookup::unknown()
            }
        }
    }
}

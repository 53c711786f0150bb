//! Code host port.

use async_trait::async_trait;

use crate::domain::models::PrLookup;

/// Pull-request queries against the code host.
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// Look up the PR for `branch` across every PR state (open, merged,
    /// closed).
    ///
    /// Never fails: transport, API and parse errors all produce
    /// [`PrLookup::unknown`].
    async fn find_pr(&self, branch: &str) -> PrLookup;
}

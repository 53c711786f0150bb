//! Cooperative stop.
//!
//! Modeled as a cancellation token. An optional marker file (written by
//! `mill stop`) is polled once per cycle and folded into the token, so the
//! loop logic only ever looks at the token.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
    marker: Option<PathBuf>,
}

impl StopSignal {
    /// A signal that only fires when cancelled in-process.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also fire when `marker` exists.
    pub fn with_marker(marker: impl Into<PathBuf>) -> Self {
        Self {
            token: CancellationToken::new(),
            marker: Some(marker.into()),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check the token and the marker file. Called once per cycle.
    pub fn is_requested(&self) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        if let Some(marker) = &self.marker {
            if marker.exists() {
                info!(marker = %marker.display(), "Stop marker found");
                self.token.cancel();
                return true;
            }
        }
        false
    }

    /// Sleep for `duration` unless cancelled first. Returns `true` when the
    /// sleep was cut short by cancellation.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.token.cancelled() => true,
            () = tokio::time::sleep(duration) => false,
        }
    }

    /// Remove the marker after a clean exit so the next run starts normally.
    pub fn clear_marker(&self) {
        let Some(marker) = &self.marker else { return };
        match std::fs::remove_file(marker) {
            Ok(()) => info!(marker = %marker.display(), "Removed stop marker"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(marker = %marker.display(), error = %e, "Could not remove stop marker"),
        }
    }

    /// Write the marker file for a running loop to pick up.
    pub fn request(marker: &Path) -> std::io::Result<()> {
        if let Some(parent) = marker.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(marker, chrono::Utc::now().to_rfc3339())
    }
}

// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shutdown coordination.
//!
//! A SIGINT or SIGTERM cancels a [`CancellationToken`]; teardown then runs
//! under a grace period so one stuck session cannot hold the process open.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Waits for the first termination signal and returns its name.
pub async fn wait_for_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
                return "SIGINT";
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        "Ctrl+C"
    }
}

/// Returns a child of `parent` that is also cancelled on SIGINT or SIGTERM.
pub fn install_signal_handler(parent: &CancellationToken) -> CancellationToken {
    let token = parent.child_token();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            signal = wait_for_signal() => {
                info!(signal, "termination signal received, shutting down");
                trigger.cancel();
            }
            _ = trigger.cancelled() => {}
        }
    });
    token
}

/// Runs `teardown`, giving up after `grace`.
///
/// Returns `false` when the grace period ran out first.
pub async fn with_grace<F>(grace: Duration, teardown: F) -> bool
where
    F: Future<Output = ()>,
{
    match tokio::time::timeout(grace, teardown).await {
        Ok(()) => {
            info!("shutdown completed");
            true
        }
        Err(_) => {
            warn!(
                grace_secs = grace.as_secs(),
                "grace period elapsed, abandoning remaining work"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_token_follows_its_parent() {
        let parent = CancellationToken::new();
        let token = install_signal_handler(&parent);
        assert!(!token.is_cancelled());
        parent.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn fast_teardown_completes() {
        assert!(with_grace(Duration::from_secs(5), async {}).await);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_teardown_is_abandoned() {
        let stuck = tokio::time::sleep(Duration::from_secs(60));
        assert!(!with_grace(Duration::from_secs(5), stuck).await);
    }
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lens_logging::lens_debug;
use tokio_util::sync::CancellationToken;

use repolens_core::StatusSnapshot;

use crate::types::{ApiError, EngineEvent, EventSink};

/// Point-in-time job status, mockable for tests.
#[async_trait]
pub trait StatusApi: Send + Sync {
    async fn fetch_snapshot(&self, repo_id: &str) -> Result<StatusSnapshot, ApiError>;
}

/// Poll Fallback Client: low-frequency snapshot corrections.
///
/// The first fetch happens immediately so a watch that starts against an
/// already-finished job resolves without waiting a full interval. A
/// failed poll is logged and retried on the next tick; it is never
/// escalated to a user-visible error.
pub async fn run_status_poll(
    api: Arc<dyn StatusApi>,
    repo_id: String,
    interval: Duration,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
) {
    loop {
        match api.fetch_snapshot(&repo_id).await {
            Ok(snapshot) => {
                if cancel.is_cancelled() {
                    // The subscription ended while the fetch was in
                    // flight; its result must not be applied.
                    return;
                }
                sink.emit(EngineEvent::Snapshot(snapshot));
            }
            Err(err) => {
                lens_debug!("status poll for {repo_id} failed, retrying next tick: {err}");
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

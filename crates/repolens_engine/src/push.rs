use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use lens_logging::{lens_debug, lens_info, lens_trace};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use repolens_core::ProgressEvent;

use crate::config::ReconnectSettings;
use crate::types::{parse_frame, EngineEvent, EventSink};

/// Delay before reconnect attempt `attempt` (zero-based), capped.
pub fn backoff_delay(settings: &ReconnectSettings, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    settings
        .base_delay
        .saturating_mul(factor)
        .min(settings.max_delay)
}

/// Push Channel Client: one live subscription for one repo id.
///
/// Lifecycle guards: a successful open resets the attempt counter; a
/// terminal frame marks the subscription finished so the following close
/// is intentional; cancellation stops the task immediately, including any
/// pending backoff timer, and a cancelled task never emits again.
pub async fn run_push_channel(
    url: String,
    repo_id: String,
    settings: ReconnectSettings,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            result = connect_async(url.as_str()) => result,
        };
        match connected {
            Ok((mut stream, _response)) => {
                attempt = 0;
                lens_info!("push channel open for repo {repo_id}");
                sink.emit(EngineEvent::ChannelOpened {
                    repo_id: repo_id.clone(),
                });
                let mut finished = false;
                loop {
                    let message = tokio::select! {
                        _ = cancel.cancelled() => {
                            let _ = stream.close(None).await;
                            return;
                        }
                        message = stream.next() => message,
                    };
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let Some(event) = parse_frame(&text) else {
                                // Malformed frames are dropped without
                                // counting against the reconnect budget.
                                lens_trace!("dropped frame: {text}");
                                continue;
                            };
                            if matches!(
                                event,
                                ProgressEvent::JobComplete | ProgressEvent::JobError { .. }
                            ) {
                                finished = true;
                            }
                            sink.emit(EngineEvent::Progress {
                                repo_id: repo_id.clone(),
                                event,
                            });
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            lens_debug!("push channel read error: {err}");
                            break;
                        }
                    }
                }
                if finished {
                    // The job reached a terminal state; this close is
                    // intentional and must not trigger a reconnect.
                    return;
                }
            }
            Err(err) => {
                lens_debug!("push channel connect failed: {err}");
            }
        }

        if attempt >= settings.max_attempts {
            lens_info!("push channel giving up after {attempt} reconnects, polling continues");
            sink.emit(EngineEvent::ChannelGaveUp {
                repo_id: repo_id.clone(),
            });
            return;
        }
        let delay = backoff_delay(&settings, attempt);
        attempt += 1;
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use lens_logging::{lens_debug, lens_error, lens_warn};
use tokio_util::sync::CancellationToken;

use repolens_core::ContextMap;

use crate::config::EngineConfig;
use crate::persist::ContextStore;
use crate::poll::run_status_poll;
use crate::push::run_push_channel;
use crate::query::{HttpApi, QueryApi};
use crate::types::{ApiError, ChannelEventSink, EngineEvent, EventSink};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    OpenChannel { repo_id: String },
    CloseChannel,
    StartPolling { repo_id: String },
    StopPolling,
    Ask {
        repo_id: String,
        conversation_id: Option<String>,
        question: String,
    },
    FetchContexts { conversation_id: String, seq: u64 },
    LoadLocalContexts { conversation_id: String },
    PersistContexts {
        conversation_id: String,
        map: ContextMap,
    },
}

/// Owns a tokio runtime on a background thread and a pair of std mpsc
/// channels toward the app loop. One push channel and one poll loop run
/// per watched repo; switching repos cancels the previous subscription's
/// token before the new tasks start, so stale timers cannot fire into the
/// new subscription. Double-cancel is a no-op.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Result<Self, ApiError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<EngineCommand>();
        let (event_tx, event_rx) = mpsc::channel::<EngineEvent>();
        let api = Arc::new(HttpApi::new(config.clone())?);
        let store = Arc::new(ContextStore::new(config.cache_dir.clone()));

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            let sink: Arc<dyn EventSink> = Arc::new(ChannelEventSink::new(event_tx.clone()));
            let mut channel_cancel: Option<CancellationToken> = None;
            let mut poll_cancel: Option<CancellationToken> = None;

            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::OpenChannel { repo_id } => {
                        if let Some(token) = channel_cancel.take() {
                            token.cancel();
                        }
                        let url = match config.ws_progress_url(&repo_id) {
                            Ok(url) => url,
                            Err(err) => {
                                lens_error!("cannot build push url for {repo_id}: {err}");
                                continue;
                            }
                        };
                        let token = CancellationToken::new();
                        channel_cancel = Some(token.clone());
                        runtime.spawn(run_push_channel(
                            url,
                            repo_id,
                            config.reconnect.clone(),
                            sink.clone(),
                            token,
                        ));
                    }
                    EngineCommand::CloseChannel => {
                        if let Some(token) = channel_cancel.take() {
                            token.cancel();
                        }
                    }
                    EngineCommand::StartPolling { repo_id } => {
                        if let Some(token) = poll_cancel.take() {
                            token.cancel();
                        }
                        let token = CancellationToken::new();
                        poll_cancel = Some(token.clone());
                        runtime.spawn(run_status_poll(
                            api.clone(),
                            repo_id,
                            config.poll_interval,
                            sink.clone(),
                            token,
                        ));
                    }
                    EngineCommand::StopPolling => {
                        if let Some(token) = poll_cancel.take() {
                            token.cancel();
                        }
                    }
                    EngineCommand::Ask {
                        repo_id,
                        conversation_id,
                        question,
                    } => {
                        let api = api.clone();
                        let sink = sink.clone();
                        runtime.spawn(async move {
                            let event = match api
                                .submit_question(&repo_id, conversation_id.as_deref(), &question)
                                .await
                            {
                                Ok(response) => EngineEvent::AnswerOk {
                                    repo_id,
                                    conversation_id: conversation_id.unwrap_or_default(),
                                    message_id: response.message_id,
                                    answer: response.answer,
                                    contexts: response.contexts,
                                },
                                Err(ApiError::NotReady) => EngineEvent::AnswerNotReady { repo_id },
                                Err(err) => EngineEvent::AnswerFailed {
                                    repo_id,
                                    message: err.to_string(),
                                },
                            };
                            sink.emit(event);
                        });
                    }
                    EngineCommand::FetchContexts {
                        conversation_id,
                        seq,
                    } => {
                        let api = api.clone();
                        let sink = sink.clone();
                        runtime.spawn(async move {
                            match api.fetch_context_rows(&conversation_id).await {
                                Ok(rows) => sink.emit(EngineEvent::ContextRows {
                                    conversation_id,
                                    seq,
                                    rows,
                                }),
                                Err(err) => {
                                    // Best-effort fetch; the local cache
                                    // already covers the display.
                                    lens_debug!(
                                        "context fetch for {conversation_id} failed: {err}"
                                    );
                                }
                            }
                        });
                    }
                    EngineCommand::LoadLocalContexts { conversation_id } => {
                        let map = match store.load(&conversation_id) {
                            Ok(map) => map,
                            Err(err) => {
                                lens_warn!("context cache for {conversation_id} unreadable: {err}");
                                ContextMap::new()
                            }
                        };
                        sink.emit(EngineEvent::LocalContexts {
                            conversation_id,
                            map,
                        });
                    }
                    EngineCommand::PersistContexts {
                        conversation_id,
                        map,
                    } => {
                        if let Err(err) = store.merge_write(&conversation_id, &map) {
                            lens_error!("context cache write for {conversation_id} failed: {err}");
                        }
                    }
                }
            }
        });

        Ok(Self {
            cmd_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        })
    }

    pub fn send(&self, command: EngineCommand) {
        let _ = self.cmd_tx.send(command);
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.lock().ok()?.try_recv().ok()
    }
}

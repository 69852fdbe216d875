use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use lens_logging::lens_info;
use repolens_core::{Effect, Msg};
use repolens_engine::{EngineCommand, EngineConfig, EngineEvent, EngineHandle};

use crate::persistence;

/// Bridges the pure update loop and the async engine: effects become
/// engine commands, engine events come back as messages.
pub struct EffectRunner {
    engine: EngineHandle,
    cache_dir: PathBuf,
}

impl EffectRunner {
    pub fn new(config: EngineConfig, msg_tx: mpsc::Sender<Msg>) -> anyhow::Result<Self> {
        let cache_dir = config.cache_dir.clone();
        let engine = EngineHandle::new(config)?;
        let runner = Self { engine, cache_dir };
        runner.spawn_event_loop(msg_tx);
        Ok(runner)
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::OpenChannel { repo_id } => {
                    lens_info!("OpenChannel repo_id={repo_id}");
                    self.engine.send(EngineCommand::OpenChannel { repo_id });
                }
                Effect::CloseChannel => {
                    self.engine.send(EngineCommand::CloseChannel);
                }
                Effect::StartPolling { repo_id } => {
                    self.engine.send(EngineCommand::StartPolling { repo_id });
                }
                Effect::StopPolling => {
                    self.engine.send(EngineCommand::StopPolling);
                }
                Effect::SubmitQuestion {
                    repo_id,
                    conversation_id,
                    question,
                } => {
                    lens_info!("SubmitQuestion repo_id={repo_id} len={}", question.len());
                    self.engine.send(EngineCommand::Ask {
                        repo_id,
                        conversation_id,
                        question,
                    });
                }
                Effect::LoadLocalContexts { conversation_id } => {
                    self.engine
                        .send(EngineCommand::LoadLocalContexts { conversation_id });
                }
                Effect::FetchContexts {
                    conversation_id,
                    seq,
                } => {
                    self.engine.send(EngineCommand::FetchContexts {
                        conversation_id,
                        seq,
                    });
                }
                Effect::PersistContexts {
                    conversation_id,
                    map,
                } => {
                    self.engine.send(EngineCommand::PersistContexts {
                        conversation_id,
                        map,
                    });
                }
                // Watch history is app-owned state, not engine state.
                Effect::PersistWatchHistory(history) => {
                    persistence::save_watch_history(&self.cache_dir, &history);
                }
            }
        }
    }

    fn spawn_event_loop(&self, msg_tx: mpsc::Sender<Msg>) {
        let engine = self.engine.clone();
        thread::spawn(move || {
            // Fallback ids for producers that never name the answering
            // message; stable within one session is all the cache needs.
            let mut fabricated = 0u64;
            loop {
                if let Some(event) = engine.try_recv() {
                    let msg = match event {
                        EngineEvent::ChannelOpened { repo_id } => Msg::ChannelOpened { repo_id },
                        EngineEvent::ChannelGaveUp { repo_id } => Msg::ChannelGaveUp { repo_id },
                        EngineEvent::Progress { repo_id, event } => {
                            Msg::PhaseEvent { repo_id, event }
                        }
                        EngineEvent::Snapshot(snapshot) => Msg::Snapshot(snapshot),
                        EngineEvent::AnswerOk {
                            repo_id,
                            conversation_id,
                            message_id,
                            answer,
                            contexts,
                        } => {
                            let message_id = message_id.unwrap_or_else(|| {
                                fabricated += 1;
                                format!("answer-{fabricated}")
                            });
                            Msg::AnswerReceived {
                                repo_id,
                                conversation_id,
                                message_id,
                                answer,
                                contexts,
                            }
                        }
                        EngineEvent::AnswerNotReady { repo_id } => Msg::AnswerNotReady { repo_id },
                        EngineEvent::AnswerFailed { repo_id, message } => {
                            Msg::AnswerFailed { repo_id, message }
                        }
                        EngineEvent::ContextRows {
                            conversation_id,
                            seq,
                            rows,
                        } => Msg::ContextRowsFetched {
                            conversation_id,
                            seq,
                            rows,
                        },
                        EngineEvent::LocalContexts {
                            conversation_id,
                            map,
                        } => Msg::LocalContextsLoaded {
                            conversation_id,
                            map,
                        },
                    };
                    if msg_tx.send(msg).is_err() {
                        return;
                    }
                } else {
                    thread::sleep(Duration::from_millis(20));
                }
            }
        });
    }
}

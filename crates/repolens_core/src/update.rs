use crate::{AppState, Effect, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::WatchRepo { repo_id } => {
            let was_watching = state.repo_id().is_some();
            if !state.begin_watch(repo_id.clone()) {
                return (state, Vec::new());
            }
            let mut effects = Vec::with_capacity(4);
            if state.latched() {
                // Restored history already marks this repo ready; there is
                // no running job to observe, but any previous repo's
                // subscription still has to come down.
                if was_watching {
                    effects.push(Effect::CloseChannel);
                    effects.push(Effect::StopPolling);
                }
            } else {
                if was_watching {
                    effects.push(Effect::CloseChannel);
                }
                effects.push(Effect::OpenChannel {
                    repo_id: repo_id.clone(),
                });
                effects.push(Effect::StartPolling { repo_id });
            }
            effects
        }
        Msg::Detach => {
            state.detach();
            vec![Effect::CloseChannel, Effect::StopPolling]
        }
        Msg::RestoreWatchHistory(history) => {
            state.restore_watch_history(history);
            Vec::new()
        }
        Msg::ChannelOpened { repo_id } => {
            if !state.is_watching(&repo_id) {
                return (state, Vec::new());
            }
            Vec::new()
        }
        Msg::ChannelGaveUp { repo_id } => {
            if !state.is_watching(&repo_id) {
                return (state, Vec::new());
            }
            state.note_push_exhausted();
            Vec::new()
        }
        Msg::PhaseEvent { repo_id, event } => {
            if !state.is_watching(&repo_id) {
                return (state, Vec::new());
            }
            let was_latched = state.latched();
            state.apply_progress(event);
            latch_effects(&mut state, was_latched, None)
        }
        Msg::Snapshot(snapshot) => {
            if !state.is_watching(&snapshot.repo_id) {
                return (state, Vec::new());
            }
            let was_latched = state.latched();
            let documents = snapshot.document_count;
            state.apply_snapshot(&snapshot);
            latch_effects(&mut state, was_latched, documents)
        }
        Msg::AskQuestion { question } => match state.repo_id() {
            Some(repo_id) => vec![Effect::SubmitQuestion {
                repo_id: repo_id.to_string(),
                conversation_id: state.conversation().map(ToOwned::to_owned),
                question,
            }],
            None => Vec::new(),
        },
        Msg::AnswerReceived {
            repo_id,
            conversation_id,
            message_id,
            answer,
            contexts,
        } => {
            if !state.is_watching(&repo_id) {
                return (state, Vec::new());
            }
            let was_latched = state.latched();
            let map = state.record_answer(&conversation_id, message_id, answer, contexts);
            let mut effects = vec![Effect::PersistContexts {
                conversation_id,
                map,
            }];
            effects.extend(latch_effects(&mut state, was_latched, None));
            effects
        }
        Msg::AnswerNotReady { repo_id } => {
            if !state.is_watching(&repo_id) {
                return (state, Vec::new());
            }
            state.record_answer_not_ready();
            Vec::new()
        }
        Msg::AnswerFailed { repo_id, message } => {
            if !state.is_watching(&repo_id) {
                return (state, Vec::new());
            }
            state.record_answer_failed(message);
            Vec::new()
        }
        Msg::OpenConversation {
            conversation_id,
            recent_assistant_ids,
        } => {
            let seq = state.open_conversation(conversation_id.clone(), recent_assistant_ids);
            vec![
                Effect::LoadLocalContexts {
                    conversation_id: conversation_id.clone(),
                },
                Effect::FetchContexts {
                    conversation_id,
                    seq,
                },
            ]
        }
        Msg::LocalContextsLoaded {
            conversation_id,
            map,
        } => {
            state.merge_local_contexts(&conversation_id, map);
            Vec::new()
        }
        Msg::ContextRowsFetched {
            conversation_id,
            seq,
            rows,
        } => match state.apply_server_rows(&conversation_id, seq, &rows) {
            Some(map) => vec![Effect::PersistContexts {
                conversation_id,
                map,
            }],
            None => Vec::new(),
        },
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

/// When an observation latched readiness (or a terminal error), the
/// channels are torn down and the outcome is remembered.
fn latch_effects(
    state: &mut AppState,
    was_latched: bool,
    document_count: Option<u64>,
) -> Vec<Effect> {
    if was_latched || !state.latched() {
        return Vec::new();
    }
    let history = state.remember_outcome(document_count);
    vec![
        Effect::StopPolling,
        Effect::CloseChannel,
        Effect::PersistWatchHistory(history),
    ]
}

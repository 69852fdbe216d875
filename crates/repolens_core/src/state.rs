use std::collections::BTreeMap;

use crate::contexts::{merge_context_rows, ContextItem, ContextMap, ServerContextRow};
use crate::phase::{PhaseBoard, PhaseName, ProgressEvent, StatusSnapshot};
use crate::readiness::Readiness;
use crate::view_model::{PhaseRowView, WatchViewModel};

/// Outcome of a finished watch, kept in persisted history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Ready,
    Failed,
}

/// One persisted history entry; restoring a `Ready` entry for the watched
/// repo short-circuits readiness (the producer skips re-indexing an
/// already-indexed repository).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSnapshot {
    pub repo_id: String,
    pub outcome: WatchOutcome,
    pub document_count: Option<u64>,
}

/// The most recent answer round trip, for rendering. `NotReady` is the
/// waiting state, deliberately distinct from `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Answered { message_id: String, answer: String },
    NotReady,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    repo_id: Option<String>,
    board: PhaseBoard,
    readiness: Readiness,
    indexed_files: Vec<String>,
    push_exhausted: bool,
    conversation: Option<String>,
    contexts: BTreeMap<String, ContextMap>,
    context_fetch_seq: u64,
    recent_assistant_ids: Vec<String>,
    last_answer: Option<AnswerOutcome>,
    watch_history: Vec<WatchSnapshot>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> WatchViewModel {
        let signal = self.readiness.signal(&self.board);
        let phases = PhaseName::ALL
            .iter()
            .map(|name| {
                let state = self.board.phase(*name);
                PhaseRowView {
                    phase: *name,
                    status: state.status,
                    percent: state.percent,
                    message: state.message.clone(),
                }
            })
            .collect();
        WatchViewModel {
            repo_id: self.repo_id.clone(),
            ready: signal.ready,
            has_error: signal.has_error,
            error: self.readiness.error().map(ToOwned::to_owned),
            active_label: signal.active_label,
            overall_percent: signal.overall_percent,
            phases,
            indexed_file_count: self.indexed_files.len(),
            push_exhausted: self.push_exhausted,
            conversation: self.conversation.clone(),
            last_answer: self.last_answer.clone(),
            dirty: self.dirty,
        }
    }

    /// Reads and clears the dirty flag (render coalescing).
    pub fn consume_dirty(&mut self) -> bool {
        let was = self.dirty;
        self.dirty = false;
        was
    }

    pub fn latched(&self) -> bool {
        self.readiness.is_latched()
    }

    pub fn watch_history(&self) -> &[WatchSnapshot] {
        &self.watch_history
    }

    pub fn contexts_for(&self, conversation_id: &str) -> Option<&ContextMap> {
        self.contexts.get(conversation_id)
    }

    pub(crate) fn repo_id(&self) -> Option<&str> {
        self.repo_id.as_deref()
    }

    pub(crate) fn conversation(&self) -> Option<&str> {
        self.conversation.as_deref()
    }

    pub(crate) fn is_watching(&self, repo_id: &str) -> bool {
        self.repo_id.as_deref() == Some(repo_id)
    }

    /// Switch to a new repo id, discarding every channel-derived fact from
    /// the previous one. Returns false when already watching that repo.
    pub(crate) fn begin_watch(&mut self, repo_id: String) -> bool {
        if self.is_watching(&repo_id) {
            return false;
        }
        self.board = PhaseBoard::new();
        self.readiness = Readiness::new();
        self.indexed_files.clear();
        self.push_exhausted = false;
        self.last_answer = None;
        if self.history_marks_ready(&repo_id) {
            self.readiness.note_override();
        }
        self.repo_id = Some(repo_id);
        self.dirty = true;
        true
    }

    pub(crate) fn detach(&mut self) {
        self.repo_id = None;
        self.board = PhaseBoard::new();
        self.readiness = Readiness::new();
        self.indexed_files.clear();
        self.push_exhausted = false;
        self.last_answer = None;
        self.dirty = true;
    }

    fn history_marks_ready(&self, repo_id: &str) -> bool {
        self.watch_history
            .iter()
            .any(|entry| entry.repo_id == repo_id && entry.outcome == WatchOutcome::Ready)
    }

    pub(crate) fn restore_watch_history(&mut self, history: Vec<WatchSnapshot>) {
        self.watch_history = history;
        if let Some(repo_id) = self.repo_id.clone() {
            if self.history_marks_ready(&repo_id) {
                self.readiness.note_override();
            }
        }
        self.dirty = true;
    }

    pub(crate) fn apply_progress(&mut self, event: ProgressEvent) {
        if let ProgressEvent::FileIndexed { path } = &event {
            self.indexed_files.push(path.clone());
            self.dirty = true;
            return;
        }
        self.board.apply(&event);
        self.readiness.observe_board(&self.board);
        self.dirty = true;
    }

    pub(crate) fn apply_snapshot(&mut self, snapshot: &StatusSnapshot) {
        self.board.apply_snapshot(snapshot);
        // The board has folded the snapshot's phase rows, so its error
        // detail must latch before the snapshot's bare overall status
        // falls back to a generic message.
        self.readiness.observe_board(&self.board);
        self.readiness.observe_snapshot(snapshot);
        self.dirty = true;
    }

    pub(crate) fn note_push_exhausted(&mut self) {
        self.push_exhausted = true;
        self.dirty = true;
    }

    /// Record the terminal outcome of the current watch in history,
    /// replacing any previous entry for the same repo id. Returns the
    /// updated history for the persistence effect.
    pub(crate) fn remember_outcome(&mut self, document_count: Option<u64>) -> Vec<WatchSnapshot> {
        if let Some(repo_id) = self.repo_id.clone() {
            let outcome = if self.readiness.ready() {
                WatchOutcome::Ready
            } else {
                WatchOutcome::Failed
            };
            self.watch_history.retain(|entry| entry.repo_id != repo_id);
            self.watch_history.push(WatchSnapshot {
                repo_id,
                outcome,
                document_count,
            });
        }
        self.watch_history.clone()
    }

    /// A successful answer round trip: readiness evidence plus a cache
    /// write for the answering message. Returns the conversation map for
    /// the persistence effect.
    pub(crate) fn record_answer(
        &mut self,
        conversation_id: &str,
        message_id: String,
        answer: String,
        contexts: Vec<ContextItem>,
    ) -> ContextMap {
        self.readiness.note_answer_success();
        self.last_answer = Some(AnswerOutcome::Answered {
            message_id: message_id.clone(),
            answer,
        });
        let map = self.contexts.entry(conversation_id.to_string()).or_default();
        map.insert(message_id, contexts);
        self.dirty = true;
        map.clone()
    }

    pub(crate) fn record_answer_not_ready(&mut self) {
        self.last_answer = Some(AnswerOutcome::NotReady);
        self.dirty = true;
    }

    pub(crate) fn record_answer_failed(&mut self, message: String) {
        self.last_answer = Some(AnswerOutcome::Failed { message });
        self.dirty = true;
    }

    /// Open a conversation and hand out the fetch sequence number that any
    /// in-flight response must still match to be applied.
    pub(crate) fn open_conversation(
        &mut self,
        conversation_id: String,
        recent_assistant_ids: Vec<String>,
    ) -> u64 {
        self.conversation = Some(conversation_id);
        self.recent_assistant_ids = recent_assistant_ids;
        self.context_fetch_seq += 1;
        self.dirty = true;
        self.context_fetch_seq
    }

    /// Publish the locally persisted cache without clobbering entries that
    /// arrived in memory since.
    pub(crate) fn merge_local_contexts(&mut self, conversation_id: &str, map: ContextMap) {
        let entry = self.contexts.entry(conversation_id.to_string()).or_default();
        for (message_id, items) in map {
            entry.entry(message_id).or_insert(items);
        }
        self.dirty = true;
    }

    /// Apply a server fetch, unless it belongs to a stale sequence.
    /// Returns the merged map for the persistence effect.
    pub(crate) fn apply_server_rows(
        &mut self,
        conversation_id: &str,
        seq: u64,
        rows: &[ServerContextRow],
    ) -> Option<ContextMap> {
        if seq != self.context_fetch_seq {
            return None;
        }
        let local = self.contexts.get(conversation_id).cloned().unwrap_or_default();
        let merged = merge_context_rows(&local, rows, &self.recent_assistant_ids);
        self.contexts
            .insert(conversation_id.to_string(), merged.clone());
        self.dirty = true;
        Some(merged)
    }
}

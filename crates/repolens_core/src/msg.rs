use crate::contexts::{ContextItem, ContextMap, ServerContextRow};
use crate::phase::{ProgressEvent, StatusSnapshot};
use crate::state::WatchSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Start observing a repository's ingestion job. Fully resets every
    /// channel-derived fact from any previous repo id.
    WatchRepo { repo_id: String },
    /// Caller teardown; closes the channel and stops polling.
    Detach,
    /// Restore previously completed watches from persisted state.
    RestoreWatchHistory(Vec<WatchSnapshot>),
    /// The push channel (re)connected for this repo.
    ChannelOpened { repo_id: String },
    /// The push channel exhausted its reconnect budget; polling carries on.
    ChannelGaveUp { repo_id: String },
    /// A progress event, from the push channel or mapped from a poll row.
    PhaseEvent {
        repo_id: String,
        event: ProgressEvent,
    },
    /// A point-in-time snapshot from the poll fallback.
    Snapshot(StatusSnapshot),
    /// User submitted a question against the watched repo.
    AskQuestion { question: String },
    /// A successful end-to-end answer round trip.
    AnswerReceived {
        repo_id: String,
        conversation_id: String,
        message_id: String,
        answer: String,
        contexts: Vec<ContextItem>,
    },
    /// The answer endpoint said the job is not ready yet; this maps to the
    /// waiting state, not to a failure.
    AnswerNotReady { repo_id: String },
    AnswerFailed { repo_id: String, message: String },
    /// User opened a conversation; triggers local load plus server fetch.
    OpenConversation {
        conversation_id: String,
        /// Assistant message ids, newest-first, for orphan-row assignment.
        recent_assistant_ids: Vec<String>,
    },
    /// Locally persisted cache for a conversation, published immediately.
    LocalContextsLoaded {
        conversation_id: String,
        map: ContextMap,
    },
    /// Server context rows; `seq` guards against racing a stale fetch
    /// over a newer one.
    ContextRowsFetched {
        conversation_id: String,
        seq: u64,
        rows: Vec<ServerContextRow>,
    },
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}

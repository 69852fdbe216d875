use crate::contexts::ContextMap;
use crate::state::WatchSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    OpenChannel { repo_id: String },
    CloseChannel,
    StartPolling { repo_id: String },
    StopPolling,
    SubmitQuestion {
        repo_id: String,
        conversation_id: Option<String>,
        question: String,
    },
    LoadLocalContexts { conversation_id: String },
    FetchContexts { conversation_id: String, seq: u64 },
    PersistContexts {
        conversation_id: String,
        map: ContextMap,
    },
    PersistWatchHistory(Vec<WatchSnapshot>),
}

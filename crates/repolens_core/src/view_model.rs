use crate::phase::{PhaseName, PhaseStatus};
use crate::state::AnswerOutcome;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WatchViewModel {
    pub repo_id: Option<String>,
    pub ready: bool,
    pub has_error: bool,
    pub error: Option<String>,
    pub active_label: String,
    /// `None` renders as an indeterminate indicator.
    pub overall_percent: Option<u8>,
    pub phases: Vec<PhaseRowView>,
    pub indexed_file_count: usize,
    pub push_exhausted: bool,
    pub conversation: Option<String>,
    pub last_answer: Option<AnswerOutcome>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRowView {
    pub phase: PhaseName,
    pub status: PhaseStatus,
    pub percent: Option<u8>,
    pub message: Option<String>,
}

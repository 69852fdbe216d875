//! Repolens core: pure state machine for ingestion-progress reconciliation.
mod contexts;
mod effect;
mod msg;
mod phase;
mod readiness;
mod state;
mod update;
mod view_model;

pub use contexts::{merge_context_rows, ContextItem, ContextMap, ServerContextRow};
pub use effect::Effect;
pub use msg::Msg;
pub use phase::{
    OverallStatus, PhaseBoard, PhaseName, PhaseState, PhaseStatus, PhaseUpdate, ProgressEvent,
    StatusSnapshot, Terminal,
};
pub use readiness::{Readiness, ReadinessSignal};
pub use state::{AnswerOutcome, AppState, WatchOutcome, WatchSnapshot};
pub use update::update;
pub use view_model::{PhaseRowView, WatchViewModel};

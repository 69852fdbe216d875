use crate::phase::{OverallStatus, PhaseBoard, StatusSnapshot, Terminal};

/// The single UI-facing readiness decision, derived on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessSignal {
    pub ready: bool,
    pub has_error: bool,
    pub active_label: String,
    pub overall_percent: Option<u8>,
}

/// Readiness Arbiter: merges board aggregates, snapshot evidence and
/// out-of-band evidence into one non-regressing decision.
///
/// Every observation only tightens toward ready/error; the first terminal
/// latch wins and is only cleared by switching to a new repo id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Readiness {
    ready: bool,
    error: Option<String>,
    answered_once: bool,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready(&self) -> bool {
        self.ready
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Ready or terminally failed; once latched the poll loop may stop.
    pub fn is_latched(&self) -> bool {
        self.ready || self.error.is_some()
    }

    /// Caller evidence: one successful end-to-end answer for this repo id.
    pub fn note_answer_success(&mut self) {
        self.answered_once = true;
        self.tighten_ready();
    }

    /// Caller-supplied override (e.g. restored watch history).
    pub fn note_override(&mut self) {
        self.tighten_ready();
    }

    pub fn observe_board(&mut self, board: &PhaseBoard) {
        match board.terminal() {
            Some(Terminal::Complete) => self.tighten_ready(),
            Some(Terminal::Error) => {
                self.tighten_error(board.first_error().unwrap_or("ingestion failed"))
            }
            None => {
                if board.all_complete() {
                    self.tighten_ready();
                } else if board.any_error() {
                    self.tighten_error(board.first_error().unwrap_or("ingestion failed"));
                }
            }
        }
    }

    pub fn observe_snapshot(&mut self, snapshot: &StatusSnapshot) {
        match snapshot.overall {
            OverallStatus::Indexed => self.tighten_ready(),
            OverallStatus::Error => self.tighten_error("ingestion failed"),
            _ => {}
        }
        // A populated index is readiness evidence on its own, even before
        // a terminal status is declared.
        if snapshot.document_count.unwrap_or(0) > 0 {
            self.tighten_ready();
        }
    }

    fn tighten_ready(&mut self) {
        if self.error.is_none() {
            self.ready = true;
        }
    }

    fn tighten_error(&mut self, message: &str) {
        if !self.ready && self.error.is_none() {
            self.error = Some(message.to_string());
        }
    }

    pub fn signal(&self, board: &PhaseBoard) -> ReadinessSignal {
        let active_label = if self.error.is_some() {
            "Ingestion failed".to_string()
        } else if self.ready {
            "Ready".to_string()
        } else {
            match board.active_phase() {
                Some(phase) => phase.active_label().to_string(),
                None => "Ready".to_string(),
            }
        };
        ReadinessSignal {
            ready: self.ready,
            has_error: self.error.is_some(),
            active_label,
            overall_percent: board.overall_percent(),
        }
    }
}

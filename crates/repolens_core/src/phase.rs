use std::collections::BTreeMap;

/// The fixed set of pipeline phases reported by the ingestion producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PhaseName {
    Transfer,
    Embedding,
    Indexing,
}

impl PhaseName {
    /// Pipeline order, also the order phases are rendered in.
    pub const ALL: [PhaseName; 3] = [PhaseName::Transfer, PhaseName::Embedding, PhaseName::Indexing];

    /// Maps a wire phase name to a known phase. The producer historically
    /// calls the transfer phase "upload"; both spellings are accepted.
    /// Unknown names return `None` and are ignored by the board.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "transfer" | "upload" => Some(PhaseName::Transfer),
            "embedding" => Some(PhaseName::Embedding),
            "indexing" => Some(PhaseName::Indexing),
            _ => None,
        }
    }

    /// Human-readable label shown while this phase is the active one.
    pub fn active_label(&self) -> &'static str {
        match self {
            PhaseName::Transfer => "Transferring repository",
            PhaseName::Embedding => "Generating embeddings",
            PhaseName::Indexing => "Building index",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseStatus {
    #[default]
    Queued,
    Running,
    Complete,
    Error,
}

/// Current knowledge about one phase.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhaseState {
    pub status: PhaseStatus,
    /// `None` means indeterminate: the phase is visible but has no numeric
    /// progress yet. Consumers must not substitute a fabricated zero.
    pub percent: Option<u8>,
    pub processed: Option<u64>,
    pub total: Option<u64>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Payload of a phase-scoped progress report (push frame or poll row).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhaseUpdate {
    pub status: PhaseStatus,
    pub percent: Option<u8>,
    pub processed: Option<u64>,
    pub total: Option<u64>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl PhaseUpdate {
    /// Explicit percent wins, clamped to 0..=100; otherwise derived from
    /// processed/total when the total is positive.
    fn effective_percent(&self) -> Option<u8> {
        if let Some(pct) = self.percent {
            return Some(pct.min(100));
        }
        match (self.processed, self.total) {
            (Some(p), Some(t)) if t > 0 => Some(((p.min(t) * 100) / t) as u8),
            _ => None,
        }
    }
}

/// One unit of inbound progress information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Phase { phase: PhaseName, update: PhaseUpdate },
    /// Job-wide terminal success (the producer's synthetic "indexed" event).
    JobComplete,
    /// Job-wide terminal failure.
    JobError { message: Option<String> },
    /// An incremental per-file event; additive only, never a phase update.
    FileIndexed { path: String },
}

/// Overall status as declared by the point-in-time snapshot endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverallStatus {
    Transfer,
    Indexing,
    Indexed,
    Error,
    #[default]
    Unknown,
}

/// The pull channel's point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub repo_id: String,
    pub overall: OverallStatus,
    pub phases: BTreeMap<PhaseName, PhaseUpdate>,
    /// From the statistics endpoint, when it answered. A positive count is
    /// treated as readiness evidence.
    pub document_count: Option<u64>,
}

/// Job-wide terminal outcome, latched for the lifetime of the job id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Complete,
    Error,
}

/// Phase State Store: per-phase status plus derived aggregates.
///
/// Pure data and transition rules; deterministic for a given event
/// sequence, which the replay tests rely on. Events from the push channel
/// and poll snapshots carrying consistent information commute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseBoard {
    phases: BTreeMap<PhaseName, PhaseState>,
    terminal: Option<Terminal>,
    job_error: Option<String>,
}

impl Default for PhaseBoard {
    fn default() -> Self {
        let phases = PhaseName::ALL
            .iter()
            .map(|name| (*name, PhaseState::default()))
            .collect();
        Self {
            phases,
            terminal: None,
            job_error: None,
        }
    }
}

impl PhaseBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Phase { phase, update } => self.apply_phase(*phase, update),
            ProgressEvent::JobComplete => self.apply_job_complete(),
            ProgressEvent::JobError { message } => self.apply_job_error(message.clone()),
            // Additive file events are tracked by the caller, not the board.
            ProgressEvent::FileIndexed { .. } => {}
        }
    }

    /// Fold a poll snapshot into the board as a low-frequency correction.
    pub fn apply_snapshot(&mut self, snapshot: &StatusSnapshot) {
        for (phase, update) in &snapshot.phases {
            self.apply_phase(*phase, update);
        }
        match snapshot.overall {
            OverallStatus::Indexed => self.apply_job_complete(),
            OverallStatus::Error => self.apply_job_error(None),
            _ => {}
        }
    }

    fn apply_phase(&mut self, phase: PhaseName, update: &PhaseUpdate) {
        // After a job-wide terminal no phase may regress to queued/running.
        if self.terminal.is_some()
            && matches!(update.status, PhaseStatus::Queued | PhaseStatus::Running)
        {
            return;
        }
        let Some(entry) = self.phases.get_mut(&phase) else {
            return;
        };
        // A completed phase never downgrades, not even on a later error.
        if entry.status == PhaseStatus::Complete && update.status != PhaseStatus::Complete {
            return;
        }
        entry.status = update.status;
        if let Some(pct) = update.effective_percent() {
            entry.percent = Some(pct);
        }
        if update.status == PhaseStatus::Complete {
            entry.percent = Some(100);
        }
        if update.processed.is_some() {
            entry.processed = update.processed;
        }
        if update.total.is_some() {
            entry.total = update.total;
        }
        if update.message.is_some() {
            entry.message = update.message.clone();
        }
        if update.error.is_some() {
            entry.error = update.error.clone();
        }
    }

    /// Job-wide complete is a fast-forward, not a contradiction: every
    /// phase that is neither complete nor errored jumps to 100%.
    fn apply_job_complete(&mut self) {
        if self.terminal == Some(Terminal::Error) {
            // A latched failure is never overwritten for the same job id.
            return;
        }
        for state in self.phases.values_mut() {
            if !matches!(state.status, PhaseStatus::Complete | PhaseStatus::Error) {
                state.status = PhaseStatus::Complete;
                state.percent = Some(100);
            }
        }
        self.terminal = Some(Terminal::Complete);
    }

    fn apply_job_error(&mut self, message: Option<String>) {
        if self.terminal.is_some() {
            return;
        }
        for state in self.phases.values_mut() {
            if state.status != PhaseStatus::Complete {
                state.status = PhaseStatus::Error;
            }
        }
        self.terminal = Some(Terminal::Error);
        self.job_error = message;
    }

    pub fn phase(&self, name: PhaseName) -> &PhaseState {
        // All three phases are seeded at construction.
        &self.phases[&name]
    }

    pub fn terminal(&self) -> Option<Terminal> {
        self.terminal
    }

    pub fn job_error(&self) -> Option<&str> {
        self.job_error.as_deref()
    }

    pub fn all_complete(&self) -> bool {
        self.phases
            .values()
            .all(|state| state.status == PhaseStatus::Complete)
    }

    pub fn any_error(&self) -> bool {
        self.terminal == Some(Terminal::Error)
            || self
                .phases
                .values()
                .any(|state| state.status == PhaseStatus::Error)
    }

    /// First error detail found, preferring the job-wide message.
    pub fn first_error(&self) -> Option<&str> {
        if let Some(message) = self.job_error.as_deref() {
            return Some(message);
        }
        PhaseName::ALL.iter().find_map(|name| {
            let state = &self.phases[name];
            if state.status == PhaseStatus::Error {
                state.error.as_deref().or(state.message.as_deref())
            } else {
                None
            }
        })
    }

    /// Arithmetic mean of the known percents; `None` while nothing numeric
    /// has been reported (indeterminate indicator, not a fabricated zero).
    pub fn overall_percent(&self) -> Option<u8> {
        let known: Vec<u64> = self
            .phases
            .values()
            .filter_map(|state| state.percent.map(u64::from))
            .collect();
        if known.is_empty() {
            return None;
        }
        Some((known.iter().sum::<u64>() / known.len() as u64) as u8)
    }

    /// The earliest pipeline phase that has not completed yet.
    pub fn active_phase(&self) -> Option<PhaseName> {
        PhaseName::ALL
            .iter()
            .copied()
            .find(|name| self.phases[name].status != PhaseStatus::Complete)
    }
}

use std::collections::BTreeMap;
use std::sync::mpsc;

use serde::Deserialize;
use thiserror::Error;

use repolens_core::{
    ContextItem, ContextMap, OverallStatus, PhaseName, PhaseStatus, PhaseUpdate, ProgressEvent,
    ServerContextRow, StatusSnapshot,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("endpoint returned http status {0}")]
    HttpStatus(u16),
    /// The answer endpoint's designated "job not ready yet" response.
    /// Maps to the waiting state, never to a generic failure.
    #[error("job is not ready for questions yet")]
    NotReady,
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

/// Everything the engine reports back to the app loop.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ChannelOpened { repo_id: String },
    /// Reconnect budget exhausted; polling continues independently.
    ChannelGaveUp { repo_id: String },
    Progress {
        repo_id: String,
        event: ProgressEvent,
    },
    Snapshot(StatusSnapshot),
    AnswerOk {
        repo_id: String,
        conversation_id: String,
        message_id: Option<String>,
        answer: String,
        contexts: Vec<ContextItem>,
    },
    AnswerNotReady { repo_id: String },
    AnswerFailed { repo_id: String, message: String },
    ContextRows {
        conversation_id: String,
        seq: u64,
        rows: Vec<ServerContextRow>,
    },
    LocalContexts {
        conversation_id: String,
        map: ContextMap,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelEventSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

/// Superset of every frame shape the producer emits: broker task updates,
/// bare phase reports, heartbeat events and incremental file events.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawFrame {
    event: Option<String>,
    phase: Option<String>,
    status: Option<String>,
    progress: Option<f64>,
    processed: Option<u64>,
    total: Option<u64>,
    message: Option<String>,
    error: Option<String>,
    path: Option<String>,
}

fn parse_status(status: &str) -> Option<PhaseStatus> {
    match status {
        "queued" => Some(PhaseStatus::Queued),
        "running" => Some(PhaseStatus::Running),
        "complete" => Some(PhaseStatus::Complete),
        "error" => Some(PhaseStatus::Error),
        _ => None,
    }
}

fn clamp_percent(progress: f64) -> u8 {
    progress.clamp(0.0, 100.0) as u8
}

/// Parses one inbound text frame. Malformed or unrecognized frames return
/// `None` and are dropped without affecting the channel.
pub fn parse_frame(text: &str) -> Option<ProgressEvent> {
    let raw: RawFrame = serde_json::from_str(text).ok()?;

    if let Some(event) = raw.event.as_deref() {
        match event {
            // Incremental per-file signal: additive, never a phase update.
            "file_indexed" => {
                return raw.path.map(|path| ProgressEvent::FileIndexed { path });
            }
            "connected" | "keepalive" => return None,
            _ => {}
        }
    }

    let phase = raw.phase.as_deref()?;
    match phase {
        // Synthetic job-wide terminals use the phase slot on the wire.
        "indexed" => return Some(ProgressEvent::JobComplete),
        "error" => {
            return Some(ProgressEvent::JobError {
                message: raw.message.or(raw.error),
            })
        }
        _ => {}
    }
    let phase = PhaseName::parse(phase)?;

    let percent = raw.progress.map(clamp_percent);
    let status = match raw.status.as_deref() {
        Some(status) => parse_status(status)?,
        // Older producers omit status on pure progress frames; a full bar
        // is the completion they meant to report.
        None if percent == Some(100) => PhaseStatus::Complete,
        None => PhaseStatus::Running,
    };

    Some(ProgressEvent::Phase {
        phase,
        update: PhaseUpdate {
            status,
            percent,
            processed: raw.processed,
            total: raw.total,
            message: raw.message,
            error: raw.error,
        },
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawStatusResponse {
    #[serde(alias = "repoId")]
    pub(crate) repo_id: Option<String>,
    pub(crate) status: Option<String>,
    pub(crate) phases: BTreeMap<String, RawPhase>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawPhase {
    status: Option<String>,
    progress: Option<f64>,
    processed: Option<u64>,
    total: Option<u64>,
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawStatistics {
    pub(crate) index_status: Option<String>,
    pub(crate) document_count: Option<u64>,
}

fn parse_overall(status: Option<&str>) -> OverallStatus {
    match status {
        Some("indexed") => OverallStatus::Indexed,
        Some("indexing") => OverallStatus::Indexing,
        Some("upload") | Some("transfer") => OverallStatus::Transfer,
        Some("error") => OverallStatus::Error,
        _ => OverallStatus::Unknown,
    }
}

pub(crate) fn snapshot_from_wire(
    repo_id: &str,
    raw: RawStatusResponse,
    stats: Option<RawStatistics>,
) -> StatusSnapshot {
    let mut phases = BTreeMap::new();
    for (name, row) in raw.phases {
        let Some(phase) = PhaseName::parse(&name) else {
            continue;
        };
        let Some(status) = row.status.as_deref().and_then(parse_status) else {
            continue;
        };
        phases.insert(
            phase,
            PhaseUpdate {
                status,
                percent: row.progress.map(clamp_percent),
                processed: row.processed,
                total: row.total,
                message: row.message,
                error: row.error,
            },
        );
    }

    let mut overall = parse_overall(raw.status.as_deref());
    let document_count = stats.as_ref().and_then(|s| s.document_count);
    if overall == OverallStatus::Unknown {
        if let Some(stats) = &stats {
            overall = parse_overall(stats.index_status.as_deref());
        }
    }

    StatusSnapshot {
        repo_id: raw.repo_id.unwrap_or_else(|| repo_id.to_string()),
        overall,
        phases,
        document_count,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawContextItem {
    pub(crate) id: Option<String>,
    pub(crate) filename: Option<String>,
    pub(crate) content: Option<String>,
    pub(crate) score: Option<f64>,
}

impl RawContextItem {
    pub(crate) fn into_item(self) -> ContextItem {
        ContextItem {
            id: self.id,
            filename: self.filename.unwrap_or_else(|| "snippet.txt".to_string()),
            content: self.content.unwrap_or_default(),
            score: self.score,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawContextRow {
    #[serde(alias = "messageId")]
    pub(crate) message_id: Option<String>,
    #[serde(alias = "queryId")]
    pub(crate) query_id: Option<String>,
    pub(crate) contexts: Vec<RawContextItem>,
}

impl RawContextRow {
    pub(crate) fn into_row(self) -> ServerContextRow {
        ServerContextRow {
            message_id: self.message_id,
            query_id: self.query_id.unwrap_or_default(),
            contexts: self.contexts.into_iter().map(RawContextItem::into_item).collect(),
        }
    }
}

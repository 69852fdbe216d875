use std::fs;
use std::path::Path;

use lens_logging::{lens_error, lens_info, lens_warn};
use repolens_core::{WatchOutcome, WatchSnapshot};
use repolens_engine::AtomicFileWriter;
use serde::{Deserialize, Serialize};

const HISTORY_FILENAME: &str = ".repolens_watches.ron";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum PersistedOutcome {
    Ready,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedWatch {
    repo_id: String,
    outcome: PersistedOutcome,
    document_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedHistory {
    watches: Vec<PersistedWatch>,
}

pub(crate) fn load_watch_history(cache_dir: &Path) -> Vec<WatchSnapshot> {
    let path = cache_dir.join(HISTORY_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Vec::new();
        }
        Err(err) => {
            lens_warn!("Failed to read watch history from {:?}: {}", path, err);
            return Vec::new();
        }
    };

    let history: PersistedHistory = match ron::from_str(&content) {
        Ok(history) => history,
        Err(err) => {
            lens_warn!("Failed to parse watch history from {:?}: {}", path, err);
            return Vec::new();
        }
    };

    let watches = history
        .watches
        .into_iter()
        .map(|watch| WatchSnapshot {
            repo_id: watch.repo_id,
            outcome: match watch.outcome {
                PersistedOutcome::Ready => WatchOutcome::Ready,
                PersistedOutcome::Failed => WatchOutcome::Failed,
            },
            document_count: watch.document_count,
        })
        .collect();

    lens_info!("Loaded watch history from {:?}", path);
    watches
}

pub(crate) fn save_watch_history(cache_dir: &Path, history: &[WatchSnapshot]) {
    let state = PersistedHistory {
        watches: history
            .iter()
            .map(|watch| PersistedWatch {
                repo_id: watch.repo_id.clone(),
                outcome: match watch.outcome {
                    WatchOutcome::Ready => PersistedOutcome::Ready,
                    WatchOutcome::Failed => PersistedOutcome::Failed,
                },
                document_count: watch.document_count,
            })
            .collect(),
    };

    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(&state, pretty) {
        Ok(text) => text,
        Err(err) => {
            lens_error!("Failed to serialize watch history: {}", err);
            return;
        }
    };

    let writer = AtomicFileWriter::new(cache_dir.to_path_buf());
    if let Err(err) = writer.write(HISTORY_FILENAME, &content) {
        lens_error!("Failed to write watch history to {:?}: {}", cache_dir, err);
    }
}

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::logging::LogDestination;

/// Watches a repository ingestion job and asks questions once it is ready.
#[derive(Debug, Parser)]
#[command(name = "repolens", version, about)]
pub struct Args {
    /// Repository id to watch.
    pub repo_id: String,

    /// HTTP base of the ingestion service.
    #[arg(long, default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Bearer token, also passed to the push channel.
    #[arg(long)]
    pub token: Option<String>,

    /// Question to submit once the repository is ready.
    #[arg(long)]
    pub question: Option<String>,

    /// Existing conversation to attach the question (and its cached
    /// context attributions) to.
    #[arg(long)]
    pub conversation: Option<String>,

    /// Fallback poll interval in milliseconds.
    #[arg(long, default_value_t = 2000)]
    pub poll_interval_ms: u64,

    /// Give up on the whole watch after this many seconds.
    #[arg(long, default_value_t = 600)]
    pub timeout_secs: u64,

    /// Directory for cached context attributions and watch history.
    /// Defaults to `.repolens` under the current directory.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogChoice::File)]
    pub log_destination: LogChoice,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogChoice {
    File,
    Terminal,
    Both,
}

impl From<LogChoice> for LogDestination {
    fn from(choice: LogChoice) -> Self {
        match choice {
            LogChoice::File => LogDestination::File,
            LogChoice::Terminal => LogDestination::Terminal,
            LogChoice::Both => LogDestination::Both,
        }
    }
}

impl Args {
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".repolens"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

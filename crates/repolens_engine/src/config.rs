use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::types::ApiError;

/// Bounded exponential backoff for the push channel.
#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Reconnect attempts after the initial connect; once exceeded the
    /// channel gives up and polling carries on alone.
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// HTTP base of the ingestion service, e.g. `http://localhost:8000`.
    pub base_url: String,
    pub auth_token: Option<String>,
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub reconnect: ReconnectSettings,
    /// Directory for the per-conversation context cache files.
    pub cache_dir: PathBuf,
}

impl EngineConfig {
    pub fn new(base_url: impl Into<String>, cache_dir: PathBuf) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            poll_interval: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            reconnect: ReconnectSettings::default(),
            cache_dir,
        }
    }

    /// The push-channel endpoint for one repo: same host as `base_url`
    /// with a ws/wss scheme and the job id (plus token) in the query.
    pub fn ws_progress_url(&self, repo_id: &str) -> Result<String, ApiError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| ApiError::Malformed(err.to_string()))?
            .join("/ws/progress")
            .map_err(|err| ApiError::Malformed(err.to_string()))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|()| ApiError::Malformed(format!("cannot derive ws url from {}", self.base_url)))?;
        url.query_pairs_mut().append_pair("repo_id", repo_id);
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url.to_string())
    }

    pub(crate) fn http_url(&self, path: &str) -> Result<Url, ApiError> {
        Url::parse(&self.base_url)
            .and_then(|base| base.join(path))
            .map_err(|err| ApiError::Malformed(err.to_string()))
    }
}

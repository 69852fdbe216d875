use async_trait::async_trait;
use lens_logging::lens_debug;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use repolens_core::{ContextItem, ServerContextRow, StatusSnapshot};

use crate::config::EngineConfig;
use crate::poll::StatusApi;
use crate::types::{
    snapshot_from_wire, ApiError, RawContextItem, RawContextRow, RawStatistics, RawStatusResponse,
};

/// Answer endpoint result: the generated answer plus the context items the
/// producer used for it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerResponse {
    pub answer: String,
    pub message_id: Option<String>,
    pub contexts: Vec<ContextItem>,
}

#[async_trait]
pub trait QueryApi: Send + Sync {
    async fn submit_question(
        &self,
        repo_id: &str,
        conversation_id: Option<&str>,
        question: &str,
    ) -> Result<AnswerResponse, ApiError>;

    async fn fetch_context_rows(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ServerContextRow>, ApiError>;
}

/// The real HTTP client against the ingestion service.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    config: EngineConfig,
}

impl HttpApi {
    pub fn new(config: EngineConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(ApiError::from_reqwest)?;
        Ok(Self { client, config })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawAnswer {
    answer: String,
    #[serde(alias = "messageId")]
    message_id: Option<String>,
    contexts: Vec<RawContextItem>,
}

#[async_trait]
impl StatusApi for HttpApi {
    async fn fetch_snapshot(&self, repo_id: &str) -> Result<StatusSnapshot, ApiError> {
        let url = self.config.http_url(&format!("/repos/{repo_id}/status"))?;
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status().as_u16()));
        }
        let raw: RawStatusResponse = response
            .json()
            .await
            .map_err(|err| ApiError::Malformed(err.to_string()))?;

        // Statistics are a best-effort enrichment; the snapshot stands
        // without them.
        let stats = self.fetch_statistics(repo_id).await;
        Ok(snapshot_from_wire(repo_id, raw, stats))
    }
}

impl HttpApi {
    async fn fetch_statistics(&self, repo_id: &str) -> Option<RawStatistics> {
        let mut url = self.config.http_url("/repos/v1/statistics").ok()?;
        url.query_pairs_mut().append_pair("repoId", repo_id);
        let response = self.authorized(self.client.get(url)).send().await;
        match response {
            Ok(response) if response.status().is_success() => response.json().await.ok(),
            Ok(response) => {
                lens_debug!(
                    "statistics for {repo_id} unavailable: http {}",
                    response.status().as_u16()
                );
                None
            }
            Err(err) => {
                lens_debug!("statistics for {repo_id} unavailable: {err}");
                None
            }
        }
    }
}

#[async_trait]
impl QueryApi for HttpApi {
    async fn submit_question(
        &self,
        repo_id: &str,
        conversation_id: Option<&str>,
        question: &str,
    ) -> Result<AnswerResponse, ApiError> {
        let url = self.config.http_url("/repos/v2/answer")?;
        let body = json!({
            "repoId": repo_id,
            "query": question,
            "conversationId": conversation_id,
        });
        let response = self
            .authorized(self.client.post(url).json(&body))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        match response.status() {
            StatusCode::CONFLICT => return Err(ApiError::NotReady),
            status if !status.is_success() => return Err(ApiError::HttpStatus(status.as_u16())),
            _ => {}
        }
        let raw: RawAnswer = response
            .json()
            .await
            .map_err(|err| ApiError::Malformed(err.to_string()))?;
        Ok(AnswerResponse {
            answer: raw.answer,
            message_id: raw.message_id,
            contexts: raw
                .contexts
                .into_iter()
                .map(RawContextItem::into_item)
                .collect(),
        })
    }

    async fn fetch_context_rows(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ServerContextRow>, ApiError> {
        let url = self
            .config
            .http_url(&format!("/conversations/{conversation_id}/contexts"))?;
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(ApiError::HttpStatus(response.status().as_u16()));
        }
        let rows: Vec<RawContextRow> = response
            .json()
            .await
            .map_err(|err| ApiError::Malformed(err.to_string()))?;
        Ok(rows.into_iter().map(RawContextRow::into_row).collect())
    }
}

use std::sync::Once;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use repolens_core::{OverallStatus, PhaseName, PhaseStatus};
use repolens_engine::{ApiError, EngineConfig, HttpApi, QueryApi, StatusApi};

static INIT: Once = Once::new();

fn setup() {
    INIT.call_once(lens_logging::initialize_for_tests);
}

fn api_for(server: &MockServer) -> HttpApi {
    let config = EngineConfig::new(server.uri(), std::env::temp_dir());
    HttpApi::new(config).expect("client builds")
}

#[tokio::test]
async fn snapshot_combines_status_and_statistics() {
    setup();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/r1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "repoId": "r1",
            "status": "indexing",
            "phases": {
                "upload": { "status": "complete", "progress": 100 },
                "embedding": { "status": "running", "processed": 5, "total": 10 }
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/v1/statistics"))
        .and(query_param("repoId", "r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "index_status": "indexing",
            "document_count": 7
        })))
        .mount(&server)
        .await;

    let snapshot = api_for(&server).fetch_snapshot("r1").await.expect("snapshot");

    assert_eq!(snapshot.repo_id, "r1");
    assert_eq!(snapshot.overall, OverallStatus::Indexing);
    assert_eq!(snapshot.document_count, Some(7));

    let transfer = &snapshot.phases[&PhaseName::Transfer];
    assert_eq!(transfer.status, PhaseStatus::Complete);
    assert_eq!(transfer.percent, Some(100));

    let embedding = &snapshot.phases[&PhaseName::Embedding];
    assert_eq!(embedding.status, PhaseStatus::Running);
    assert_eq!((embedding.processed, embedding.total), (Some(5), Some(10)));
}

#[tokio::test]
async fn missing_statistics_do_not_sink_the_snapshot() {
    setup();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/r2/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "repoId": "r2",
            "status": "indexed",
            "phases": {}
        })))
        .mount(&server)
        .await;
    // No statistics mock mounted: that endpoint 404s.

    let snapshot = api_for(&server).fetch_snapshot("r2").await.expect("snapshot");
    assert_eq!(snapshot.overall, OverallStatus::Indexed);
    assert_eq!(snapshot.document_count, None);
}

#[tokio::test]
async fn unknown_wire_phases_are_skipped() {
    setup();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/r3/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "indexing",
            "phases": {
                "indexing": { "status": "running" },
                "linting": { "status": "running" }
            }
        })))
        .mount(&server)
        .await;

    let snapshot = api_for(&server).fetch_snapshot("r3").await.expect("snapshot");
    assert_eq!(snapshot.phases.len(), 1);
    assert!(snapshot.phases.contains_key(&PhaseName::Indexing));
    // repoId fell back to the requested id.
    assert_eq!(snapshot.repo_id, "r3");
}

#[tokio::test]
async fn status_http_failure_is_surfaced() {
    setup();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/missing/status"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .fetch_snapshot("missing")
        .await
        .expect_err("404 must fail");
    assert!(matches!(err, ApiError::HttpStatus(404)));
}

#[tokio::test]
async fn answer_round_trip_carries_contexts() {
    setup();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/v2/answer"))
        .and(body_partial_json(json!({
            "repoId": "r1",
            "query": "how does the parser work?"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "It is a recursive descent parser.",
            "messageId": "m-9",
            "contexts": [
                { "id": "c-1", "filename": "src/parse.rs", "content": "fn parse()" },
                { "content": "stray snippet" }
            ]
        })))
        .mount(&server)
        .await;

    let answer = api_for(&server)
        .submit_question("r1", Some("conv-1"), "how does the parser work?")
        .await
        .expect("answer");

    assert_eq!(answer.answer, "It is a recursive descent parser.");
    assert_eq!(answer.message_id.as_deref(), Some("m-9"));
    assert_eq!(answer.contexts.len(), 2);
    assert_eq!(answer.contexts[0].filename, "src/parse.rs");
    // Items without a filename get the placeholder name.
    assert_eq!(answer.contexts[1].filename, "snippet.txt");
}

#[tokio::test]
async fn conflict_means_not_ready_not_failure() {
    setup();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/v2/answer"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .submit_question("r1", None, "too early")
        .await
        .expect_err("409 must map");
    assert!(matches!(err, ApiError::NotReady));
}

#[tokio::test]
async fn context_rows_tolerate_null_message_ids() {
    setup();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations/conv-1/contexts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "messageId": "m-1",
                "queryId": "q-1",
                "contexts": [{ "filename": "a.rs", "content": "alpha" }]
            },
            {
                "messageId": null,
                "queryId": "q-2",
                "contexts": [{ "filename": "b.rs", "content": "beta" }]
            }
        ])))
        .mount(&server)
        .await;

    let rows = api_for(&server)
        .fetch_context_rows("conv-1")
        .await
        .expect("rows");

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].message_id.as_deref(), Some("m-1"));
    assert_eq!(rows[0].query_id, "q-1");
    assert_eq!(rows[1].message_id, None);
    assert_eq!(rows[1].contexts[0].content, "beta");
}

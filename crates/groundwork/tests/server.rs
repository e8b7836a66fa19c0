//! HTTP server tests over a real socket, backed by the in-memory store.

use std::sync::Arc;

use anyhow::{anyhow, Result as AnyResult};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use groundwork::load::{load_records, DocumentRecord, LoadRecord, SourceRecord};
use groundwork::server::{serve, AppState};
use groundwork_core::answer::{GenerationOptions, Generator};
use groundwork_core::embedding::EmbeddingProvider;
use groundwork_core::models::{Grant, PrincipalType};
use groundwork_core::pipeline::NO_RESULTS_ANSWER;
use groundwork_core::store::memory::InMemoryStore;
use groundwork_core::{Pipeline, PipelineSettings};

struct UnitEmbedder {
    fail: bool,
}

#[async_trait]
impl EmbeddingProvider for UnitEmbedder {
    fn model_name(&self) -> &str {
        "unit"
    }

    fn dims(&self) -> usize {
        2
    }

    async fn embed(&self, _text: &str) -> AnyResult<Vec<f32>> {
        if self.fail {
            return Err(anyhow!("embedding service unavailable"));
        }
        Ok(vec![1.0, 0.0])
    }
}

struct CitingGenerator;

#[async_trait]
impl Generator for CitingGenerator {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _options: &GenerationOptions,
    ) -> AnyResult<String> {
        Ok("Commission reconciliation is manual today [1].".to_string())
    }
}

fn record(external_id: &str, title: &str, body: &str, team: &str) -> LoadRecord {
    LoadRecord {
        source: SourceRecord {
            kind: "slack".to_string(),
            external_id: "C-sales".to_string(),
            name: "#sales".to_string(),
        },
        document: DocumentRecord {
            external_id: external_id.to_string(),
            title: title.to_string(),
            url: format!("https://example.com/{}", external_id),
            author: None,
            created_at: None,
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            body: body.to_string(),
            searchable: None,
        },
        permissions: vec![Grant {
            principal_type: PrincipalType::Team,
            principal_id: team.to_string(),
        }],
    }
}

struct TestServer {
    base: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn start_server(failing_embedder: bool) -> TestServer {
    let store = Arc::new(InMemoryStore::new());
    let records = vec![
        record(
            "d1",
            "Commission sync",
            "Commission reconciliation is manual today. Finance exports a sheet weekly.",
            "T1",
        ),
        record(
            "d2",
            "Other team notes",
            "Commission reconciliation for the other team is automated.",
            "T2",
        ),
    ];
    load_records(store.as_ref(), &UnitEmbedder { fail: false }, &records)
        .await
        .unwrap();

    let pipeline = Pipeline::new(
        store.clone(),
        store,
        Arc::new(UnitEmbedder {
            fail: failing_embedder,
        }),
        Arc::new(CitingGenerator),
        PipelineSettings::default(),
    )
    .unwrap();
    let state = AppState {
        pipeline: Arc::new(pipeline),
        default_limit: 12,
        default_self_check: false,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        serve(listener, state, async {
            let _ = rx.await;
        })
        .await
        .unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        shutdown: Some(tx),
    }
}

async fn post(server: &TestServer, path: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}{}", server.base, path))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_health() {
    let server = start_server(false).await;
    let resp = reqwest::get(format!("{}/health", server.base)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_retrieve_returns_only_permitted_chunks() {
    let server = start_server(false).await;
    let (status, body) = post(
        &server,
        "/retrieve",
        json!({"team_id": "T1", "user_id": "U1", "question": "commission reconciliation"}),
    )
    .await;
    assert_eq!(status, 200, "{}", body);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["title"], "Commission sync");
    assert!(results[0].get("embedding").is_none());
    assert!(results[0]["final_score"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_query_alias_accepted() {
    let server = start_server(false).await;
    let (status, body) = post(
        &server,
        "/retrieve",
        json!({"team_id": "T2", "user_id": "U9", "query": "commission reconciliation"}),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["results"][0]["title"], "Other team notes");
}

#[tokio::test]
async fn test_missing_team_is_bad_request() {
    let server = start_server(false).await;
    let (status, body) = post(
        &server,
        "/retrieve",
        json!({"user_id": "U1", "question": "commission"}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["message"], "team_id is required");
}

#[tokio::test]
async fn test_zero_limit_is_bad_request() {
    let server = start_server(false).await;
    let (status, body) = post(
        &server,
        "/retrieve",
        json!({"team_id": "T1", "user_id": "U1", "question": "commission", "limit": 0}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_embedding_failure_is_upstream() {
    let server = start_server(true).await;
    let (status, body) = post(
        &server,
        "/retrieve",
        json!({"team_id": "T1", "user_id": "U1", "question": "commission reconciliation"}),
    )
    .await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "upstream");
}

#[tokio::test]
async fn test_ask_cites_sources() {
    let server = start_server(false).await;
    let (status, body) = post(
        &server,
        "/ask",
        json!({
            "team_id": "T1",
            "user_id": "U1",
            "question": "How do teams reconcile commissions today?",
            "self_check": false
        }),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert!(body["answer"].as_str().unwrap().contains("[1]"));

    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["title"], "Commission sync");
    assert_eq!(sources[0]["url"], "https://example.com/d1");
    assert_eq!(sources[0]["citation"], 1);
}

#[tokio::test]
async fn test_ask_without_visible_documents() {
    let server = start_server(false).await;
    let (status, body) = post(
        &server,
        "/ask",
        json!({"team_id": "T3", "user_id": "U1", "question": "commission reconciliation"}),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["answer"], NO_RESULTS_ANSWER);
    assert!(body["sources"].as_array().unwrap().is_empty());
}

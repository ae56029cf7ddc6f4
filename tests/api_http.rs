// tests/api_http.rs
//
// HTTP-level tests for the router without opening sockets, via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /status before and after a run
// - POST /run (report body) and GET /run (method not allowed)

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use page_sentinel::api::{self, AppState};
use page_sentinel::classify::{Classifier, ScriptedGenerator};
use page_sentinel::fetch::{FetchError, PageSource};
use page_sentinel::model::MonitoredSource;
use page_sentinel::notify::RecordingNotifier;
use page_sentinel::pipeline::Pipeline;
use page_sentinel::scheduler::Runner;
use page_sentinel::store::MemoryStore;

const BODY_LIMIT: usize = 1024 * 1024;

struct FixedPage;

#[async_trait::async_trait]
impl PageSource for FixedPage {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        Ok("PRIMARY_CONTENT:\nOpen day on 12 March".into())
    }
}

fn test_state() -> AppState {
    let store = MemoryStore::new(
        vec![MonitoredSource::new("s1", "Open Day", "https://uni.example/open-day")],
        vec![],
    );
    let pipeline = Pipeline::new(
        Arc::new(FixedPage),
        Classifier::with_generator(Arc::new(ScriptedGenerator::reply(
            r#"{"is_meaningful": false, "summary": [], "confidence": 0.2}"#,
        ))),
        Arc::new(store),
        Arc::new(RecordingNotifier::new()),
    );
    AppState {
        runner: Arc::new(Runner::new(pipeline)),
    }
}

async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

#[tokio::test]
async fn health_returns_200_and_ok_body() {
    let (status, body) = call(api::router(test_state()), "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "ok");
}

#[tokio::test]
async fn status_is_null_before_first_run() {
    let (status, body) = call(api::router(test_state()), "GET", "/status").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).expect("json");
    assert!(v.is_null());
}

#[tokio::test]
async fn run_returns_report_and_status_remembers_it() {
    let app = api::router(test_state());

    let (status, body) = call(app.clone(), "POST", "/run").await;
    assert_eq!(status, StatusCode::OK);
    let report: Json = serde_json::from_slice(&body).expect("report json");
    assert_eq!(report["sources_total"], 1);
    assert_eq!(report["checked"], serde_json::json!(["Open Day"]));
    assert_eq!(report["changed_not_meaningful"], 1);
    assert_eq!(report["digest_sent"], true);

    let (status, body) = call(app, "GET", "/status").await;
    assert_eq!(status, StatusCode::OK);
    let last: Json = serde_json::from_slice(&body).expect("status json");
    assert_eq!(last["sources_total"], 1);
    assert_eq!(last["started_at"], report["started_at"]);
}

#[tokio::test]
async fn run_requires_post() {
    let (status, _) = call(api::router(test_state()), "GET", "/run").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

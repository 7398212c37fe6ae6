// tests/api_http.rs
//
// HTTP-level tests for the admin/public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot, with a
// mock delivery API and an in-memory settings store behind the engine.

use std::path::PathBuf;
use std::sync::Arc;

use http::header::CONTENT_TYPE;
use serde_json::{json, Value as Json};
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use mdirector_newsletter::api;
use mdirector_newsletter::config::{MemorySettingsStore, Settings};
use mdirector_newsletter::content::{InMemoryContentRepository, RawContent};
use mdirector_newsletter::remote::MockDeliveryApi;
use mdirector_newsletter::render::{SiteInfo, TemplateCatalog, TemplateRenderer};
use mdirector_newsletter::scheduler::FailurePolicy;
use mdirector_newsletter::NewsletterEngine;

const BODY_LIMIT: usize = 1024 * 1024;
const NOW: &str = "2024-03-15%2010:00";

struct Fixture {
    app: Router,
    api: MockDeliveryApi,
    store: MemorySettingsStore,
}

fn fixture(with_content: bool) -> Fixture {
    let settings = Settings::from_json(json!({
        "mdirector_api": "key",
        "mdirector_secret": "secret",
        "mdirector_frequency_daily": "yes",
        "mdirector_hour_daily": "08:00",
        "mdirector_daily_list_es": [5],
        "mdirector_scheduler_posts": "yes",
    }))
    .expect("settings");
    let items: Vec<RawContent> = if with_content {
        vec![serde_json::from_value(json!({
            "id": 7,
            "title": "Router post",
            "body": "<p>Body text</p>",
            "published_at": "2024-03-15T07:00:00",
            "permalink": "https://blog.test/7",
            "language": "es",
            "overrides": { "scheduler_active": true }
        }))
        .expect("item")]
    } else {
        vec![]
    };

    let store = MemorySettingsStore::new(settings);
    let api = MockDeliveryApi::new();
    let engine = NewsletterEngine::new(
        Arc::new(store.clone()),
        Arc::new(InMemoryContentRepository::new(vec!["es".into()], items)),
        TemplateRenderer::new(
            TemplateCatalog::new(vec![PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates")]),
            SiteInfo {
                name: "Test Blog".into(),
                url: "https://blog.test".into(),
                templates_url: "/templates".into(),
            },
        ),
        Arc::new(api.clone()),
        FailurePolicy::default(),
    );
    Fixture {
        app: api::router(Arc::new(engine)),
        api,
        store,
    }
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

fn post_json(uri: &str, payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).expect("serialize")))
        .expect("build request")
}

fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

#[tokio::test]
async fn health_returns_ok() {
    let f = fixture(false);
    let (status, body) = call(f.app, empty("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).expect("utf8").trim(), "OK");
}

#[tokio::test]
async fn send_runs_cycle_and_reports_notices() {
    let f = fixture(true);
    let uri = format!("/deliveries/daily/send?now={NOW}");
    let (status, body) = call(f.app.clone(), empty("POST", &uri)).await;
    assert_eq!(status, StatusCode::OK);

    let v: Json = serde_json::from_slice(&body).expect("json");
    assert_eq!(v["report"]["frequency"], "daily");
    assert_eq!(v["report"]["languages"][0]["outcome"]["state"], "sent");
    assert_eq!(v["notices"][0]["kind"], "sending");
    assert_eq!(f.api.envelope_count(), 1);
    assert_eq!(
        f.store.snapshot().text("mdirector_daily_sent_es").as_deref(),
        Some("2024-03-15 10:00")
    );

    // Second scheduled run the same day is refused; reset then clears the stamp.
    let (_, body) = call(f.app.clone(), empty("POST", &uri)).await;
    let v: Json = serde_json::from_slice(&body).expect("json");
    assert_eq!(v["notices"][0]["kind"], "already_sent");

    let (status, body) = call(f.app, empty("POST", "/deliveries/reset")).await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).expect("json");
    assert_eq!(v["cleared"], 1);
    assert!(f.store.snapshot().raw_str("mdirector_daily_sent_es").is_none());
}

#[tokio::test]
async fn unknown_frequency_and_bad_clock_are_rejected() {
    let f = fixture(false);
    let (status, _) = call(f.app.clone(), empty("POST", "/deliveries/monthly/send")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(f.app, empty("POST", "/deliveries/daily/send?now=soon")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let v: Json = serde_json::from_slice(&body).expect("json");
    assert_eq!(v["error"], "bad_request");
}

#[tokio::test]
async fn preview_serves_html_or_404() {
    let f = fixture(true);
    let uri = format!("/deliveries/daily/preview?now={NOW}");
    let (status, body) = call(f.app, empty("GET", &uri)).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).expect("utf8");
    assert!(html.contains("Router post"));
    assert_eq!(f.api.envelope_count(), 0);

    let f = fixture(false);
    let (status, body) = call(f.app, empty("GET", &uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let v: Json = serde_json::from_slice(&body).expect("json");
    assert_eq!(v["error"], "nothing_to_preview");
}

#[tokio::test]
async fn subscribe_maps_errors_to_status() {
    let f = fixture(false);
    let (status, body) = call(
        f.app.clone(),
        post_json(
            "/subscribe",
            json!({ "email": "nope", "list": "daily", "userLang": "es" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let v: Json = serde_json::from_slice(&body).expect("json");
    assert_eq!(v["error"], "invalid_email");

    let (status, body) = call(
        f.app,
        post_json(
            "/subscribe",
            json!({ "email": "ana@example.com", "frequency": "daily", "language": "es" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).expect("json");
    assert_eq!(v, json!({ "response": "ok", "listId": "5" }));
}

#[tokio::test]
async fn post_routes_deliver_and_handle_transitions() {
    let f = fixture(true);
    let (status, body) = call(
        f.app.clone(),
        post_json(
            "/posts/transition",
            json!({ "post_id": 7, "old": "draft", "new": "publish", "now": "2024-03-15 10:00" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).expect("json");
    assert_eq!(v["result"], "delivered");
    assert_eq!(f.api.envelope_count(), 1);

    let (status, body) = call(
        f.app,
        empty("POST", &format!("/posts/404/deliver?now={NOW}")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let v: Json = serde_json::from_slice(&body).expect("json");
    assert_eq!(v["error"], "content_not_found");
}

#[tokio::test]
async fn provisioning_creates_lists() {
    let f = fixture(false);
    let (status, body) = call(
        f.app,
        empty("POST", &format!("/provision/lists?now={NOW}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).expect("json");
    assert_eq!(v["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(
        f.store.snapshot().text("mdirector_weekly_list_es").as_deref(),
        Some("102")
    );
}

#[tokio::test]
async fn templates_lists_bundled_names() {
    let f = fixture(false);
    let (status, body) = call(f.app, empty("GET", "/templates")).await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).expect("json");
    assert_eq!(v, json!({ "templates": ["default", "digest"] }));
}

#[tokio::test]
async fn metrics_endpoint_is_mounted() {
    let f = fixture(false);
    let (status, _) = call(f.app, empty("GET", "/metrics")).await;
    assert_eq!(status, StatusCode::OK);
}

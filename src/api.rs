use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shuttle_axum::axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::config::schedule::parse_stamp;
use crate::content::ContentStatus;
use crate::engine::NewsletterEngine;
use crate::error::DispatchError;
use crate::metrics::Metrics;
use crate::notice::{notices_for, Notice};
use crate::scheduler::{CycleReport, RunOptions, TriggerMode};
use crate::subscribe::SubscribeError;
use crate::window::Frequency;

#[derive(Clone)]
pub struct AppState {
    engine: Arc<NewsletterEngine>,
}

impl AppState {
    pub fn new(engine: Arc<NewsletterEngine>) -> Self {
        Self { engine }
    }
}

/// Admin and public routes plus `/metrics` when the recorder is available.
pub fn router(engine: Arc<NewsletterEngine>) -> Router {
    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/cron/run", post(cron_run))
        .route("/deliveries/{frequency}/send", post(send_frequency))
        .route("/deliveries/{frequency}/preview", get(preview_frequency))
        .route("/deliveries/reset", post(reset_deliveries))
        .route("/templates", get(list_templates))
        .route("/posts/{id}/deliver", post(deliver_post))
        .route("/posts/transition", post(post_transition))
        .route("/subscribe", post(subscribe))
        .route("/provision/lists", post(provision_lists))
        .route("/provision/campaigns", post(provision_campaigns))
        .layer(CorsLayer::very_permissive())
        .with_state(AppState::new(engine));

    match Metrics::init() {
        Ok(m) => app.merge(m.router()),
        Err(e) => {
            warn!(error = %e, "metrics recorder unavailable; /metrics disabled");
            app
        }
    }
}

struct ApiError(StatusCode, serde_json::Value);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        let status = match &e {
            DispatchError::ConfigurationIncomplete => StatusCode::PRECONDITION_FAILED,
            DispatchError::EmptyAudience => StatusCode::UNPROCESSABLE_ENTITY,
            DispatchError::ContentNotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::RemoteRejected { .. } | DispatchError::TransportUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
            DispatchError::Rendering(_) | DispatchError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError(status, json!({ "error": e.kind(), "message": e.to_string() }))
    }
}

impl From<SubscribeError> for ApiError {
    fn from(e: SubscribeError) -> Self {
        let status = match e {
            SubscribeError::InvalidEmail => StatusCode::BAD_REQUEST,
            SubscribeError::AlreadyRegistered => StatusCode::CONFLICT,
            SubscribeError::Failed => StatusCode::BAD_GATEWAY,
        };
        ApiError(status, json!({ "error": e, "message": e.to_string() }))
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError(
        StatusCode::BAD_REQUEST,
        json!({ "error": "bad_request", "message": message.into() }),
    )
}

fn parse_frequency(raw: &str) -> Result<Frequency, ApiError> {
    raw.parse()
        .map_err(|_| bad_request(format!("unknown frequency '{raw}'")))
}

/// `now` from the request when given (`YYYY-mm-dd HH:MM`), else local time.
fn clock(raw: Option<&str>) -> Result<NaiveDateTime, ApiError> {
    match raw {
        Some(s) => parse_stamp(s).ok_or_else(|| bad_request(format!("bad timestamp '{s}'"))),
        None => Ok(chrono::Local::now().naive_local()),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ClockQuery {
    now: Option<String>,
}

async fn cron_run(
    State(state): State<AppState>,
    Query(q): Query<ClockQuery>,
) -> Result<Response, ApiError> {
    let now = clock(q.now.as_deref())?;
    match state.engine.run_cron(now).await {
        Ok(outcome) => Ok(Json(outcome).into_response()),
        Err(e) => Err(DispatchError::from(e).into()),
    }
}

#[derive(Debug, Default, Deserialize)]
struct RunQuery {
    now: Option<String>,
    language: Option<String>,
    template: Option<String>,
    /// Operator-initiated: skip the eligibility gates.
    #[serde(default)]
    manual: bool,
}

#[derive(Serialize)]
struct RunResp {
    report: CycleReport,
    notices: Vec<Notice>,
}

async fn send_frequency(
    State(state): State<AppState>,
    Path(frequency): Path<String>,
    Query(q): Query<RunQuery>,
) -> Result<Json<RunResp>, ApiError> {
    let frequency = parse_frequency(&frequency)?;
    let now = clock(q.now.as_deref())?;
    let opts = RunOptions {
        mode: if q.manual {
            TriggerMode::Manual
        } else {
            TriggerMode::Scheduled
        },
        preview: false,
        template: q.template,
        language: q.language,
    };
    let report = state.engine.run_frequency(frequency, now, &opts).await;
    let notices = notices_for(&report);
    Ok(Json(RunResp { report, notices }))
}

async fn preview_frequency(
    State(state): State<AppState>,
    Path(frequency): Path<String>,
    Query(q): Query<RunQuery>,
) -> Result<Response, ApiError> {
    let frequency = parse_frequency(&frequency)?;
    let now = clock(q.now.as_deref())?;
    let report = state
        .engine
        .preview(frequency, now, q.template, q.language)
        .await;
    match report.preview() {
        Some(html) => Ok(Html(html.to_string()).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "nothing_to_preview", "notices": notices_for(&report) })),
        )
            .into_response()),
    }
}

async fn reset_deliveries(State(state): State<AppState>) -> Result<Response, ApiError> {
    let cleared = state.engine.reset_deliveries().await?;
    Ok(Json(json!({ "cleared": cleared })).into_response())
}

async fn list_templates(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "templates": state.engine.templates() }))
}

#[derive(Debug, Default, Deserialize)]
struct DeliverQuery {
    now: Option<String>,
    #[serde(default)]
    preview: bool,
}

async fn deliver_post(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(q): Query<DeliverQuery>,
) -> Result<Response, ApiError> {
    let today = clock(q.now.as_deref())?.date();
    let delivered = state.engine.deliver_post(id, today, q.preview).await?;
    Ok(Json(delivered).into_response())
}

#[derive(Debug, Deserialize)]
struct TransitionReq {
    post_id: u64,
    old: ContentStatus,
    new: ContentStatus,
    #[serde(default)]
    now: Option<String>,
}

async fn post_transition(
    State(state): State<AppState>,
    Json(body): Json<TransitionReq>,
) -> Result<Response, ApiError> {
    let today = clock(body.now.as_deref())?.date();
    let outcome = state
        .engine
        .on_status_transition(body.post_id, body.old, body.new, today)
        .await?;
    Ok(Json(outcome).into_response())
}

#[derive(Debug, Deserialize)]
struct SubscribeReq {
    email: String,
    /// Which cadence's list to join.
    #[serde(alias = "list")]
    frequency: Frequency,
    #[serde(alias = "userLang")]
    language: String,
}

async fn subscribe(
    State(state): State<AppState>,
    Json(body): Json<SubscribeReq>,
) -> Result<Response, ApiError> {
    let list_id = state
        .engine
        .subscribe(&body.email, body.frequency, &body.language)
        .await?;
    Ok(Json(json!({ "response": "ok", "listId": list_id })).into_response())
}

async fn provision_lists(
    State(state): State<AppState>,
    Query(q): Query<ClockQuery>,
) -> Result<Response, ApiError> {
    let now_unix = clock(q.now.as_deref())?.and_utc().timestamp();
    let report = state.engine.provision_lists(now_unix).await?;
    Ok(Json(report).into_response())
}

async fn provision_campaigns(
    State(state): State<AppState>,
    Query(q): Query<ClockQuery>,
) -> Result<Response, ApiError> {
    let now_unix = clock(q.now.as_deref())?.and_utc().timestamp();
    let report = state.engine.provision_campaigns(now_unix).await?;
    Ok(Json(report).into_response())
}

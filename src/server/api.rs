use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::WorkflowEngine;
use crate::errors::WorkflowError;
use crate::model::{MediaKind, Run, RunInput, RunStatus};
use crate::storage::MediaStore;
use crate::store::RunStore;

/// Prompt length bounds, enforced after trimming.
const PROMPT_MIN_CHARS: usize = 10;
const PROMPT_MAX_CHARS: usize = 1000;

/// Rough wall-clock estimate returned on submission, in seconds.
const ESTIMATE_IMAGE_SECS: u32 = 120;
const ESTIMATE_VIDEO_SECS: u32 = 300;

/// Asset types accepted by the upload endpoint.
const ASSET_TYPES: &[&str] = &["logo", "product"];

/// File extensions accepted for uploaded brand assets.
const ASSET_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "svg"];

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub store: Arc<RunStore>,
    pub media: Arc<MediaStore>,
    pub engine: WorkflowEngine,
}

pub type SharedState = Arc<AppState>;

// ── Request / response payload types ──────────────────────────────────

#[derive(Deserialize)]
pub struct CreateRunRequest {
    pub prompt: String,
    pub media_kind: Option<String>,
    pub brand_website_url: Option<String>,
    pub logo_ref: Option<String>,
    pub product_ref: Option<String>,
}

#[derive(Serialize)]
pub struct CreateRunResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub message: String,
    pub estimated_time: u32,
}

#[derive(Deserialize)]
pub struct ListRunsQuery {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct UploadQuery {
    pub name: String,
}

/// Compact run view for listings.
#[derive(Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub progress: f32,
    pub media_kind: MediaKind,
    pub current_stage: Option<String>,
    pub error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Run> for RunSummary {
    fn from(run: &Run) -> Self {
        Self {
            run_id: run.id,
            status: run.status,
            progress: run.progress,
            media_kind: run.input.media_kind,
            current_stage: run.current_stage.clone(),
            error: run.error.clone(),
            created_at: run.created_at,
            updated_at: run.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct ResultResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub success: bool,
    pub final_artifact: Option<String>,
    pub media_url: Option<String>,
    pub artifacts: Vec<String>,
    pub brand_kit: Option<serde_json::Value>,
    pub critique: Option<serde_json::Value>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::RunNotFound(_) => ApiError::NotFound(err.to_string()),
            WorkflowError::Validation(_) => ApiError::BadRequest(err.to_string()),
            WorkflowError::NotCompleted(_) => ApiError::Conflict(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/api/runs", get(list_runs).post(create_run))
        .route("/api/runs/{id}/status", get(run_status))
        .route("/api/runs/{id}/result", get(run_result))
        .route("/api/runs/{id}", axum::routing::delete(delete_run))
        .route("/api/assets/{asset_type}", post(upload_asset))
        .route("/api/media/{*reference}", get(serve_media))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn service_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "atelier",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "submit": "POST /api/runs",
            "list": "GET /api/runs",
            "status": "GET /api/runs/{id}/status",
            "result": "GET /api/runs/{id}/result",
            "delete": "DELETE /api/runs/{id}",
            "upload_asset": "POST /api/assets/{asset_type}?name=",
            "media": "GET /api/media/{reference}",
        },
    }))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Validate, persist, and launch a run. Returns 202 immediately; callers
/// poll the status endpoint for progress.
async fn create_run(
    State(state): State<SharedState>,
    Json(req): Json<CreateRunRequest>,
) -> Result<(StatusCode, Json<CreateRunResponse>), ApiError> {
    let prompt = req.prompt.trim().to_string();
    if prompt.chars().count() < PROMPT_MIN_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Prompt must be at least {} characters",
            PROMPT_MIN_CHARS
        )));
    }
    if prompt.chars().count() > PROMPT_MAX_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Prompt must be at most {} characters",
            PROMPT_MAX_CHARS
        )));
    }

    let media_kind = match req.media_kind.as_deref() {
        None => MediaKind::Image,
        Some(raw) => MediaKind::from_str(raw).map_err(ApiError::BadRequest)?,
    };

    let run = state.store.create(RunInput {
        prompt,
        media_kind,
        brand_website_url: none_if_blank(req.brand_website_url),
        logo_ref: none_if_blank(req.logo_ref),
        product_ref: none_if_blank(req.product_ref),
    })?;

    state.engine.spawn(run.id);
    tracing::info!(run_id = %run.id, media_kind = %media_kind, "run accepted");

    let estimated_time = match media_kind {
        MediaKind::Image => ESTIMATE_IMAGE_SECS,
        MediaKind::Video => ESTIMATE_VIDEO_SECS,
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(CreateRunResponse {
            run_id: run.id,
            status: run.status,
            message: "Run accepted; poll the status endpoint for progress".to_string(),
            estimated_time,
        }),
    ))
}

async fn list_runs(
    State(state): State<SharedState>,
    Query(query): Query<ListRunsQuery>,
) -> Result<Json<Vec<RunSummary>>, ApiError> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(RunStatus::from_str(raw).map_err(ApiError::BadRequest)?),
    };
    let runs = state.store.list(status)?;
    Ok(Json(runs.iter().map(RunSummary::from).collect()))
}

/// Full run snapshot, including the stage history.
async fn run_status(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Run>, ApiError> {
    Ok(Json(state.store.get(id)?))
}

/// Results are available for any terminal run; a failed run reports
/// `success: false` with its error. Non-terminal runs get 409.
async fn run_result(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResultResponse>, ApiError> {
    let run = state.store.get(id)?;
    if !run.status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Run {} is not completed (status: {})",
            id, run.status
        )));
    }
    Ok(Json(ResultResponse {
        run_id: run.id,
        status: run.status,
        success: run.status == RunStatus::Completed,
        media_url: run
            .final_artifact
            .as_ref()
            .map(|r| format!("/api/media/{}", r)),
        final_artifact: run.final_artifact,
        artifacts: run.artifacts,
        brand_kit: run.brand_kit,
        critique: run.critique,
        error: run.error,
        retry_count: run.retry_count,
        completed_at: run.completed_at,
    }))
}

async fn delete_run(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(id)?;
    tracing::info!(run_id = %id, "run deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Upload a brand asset (logo or product shot) as a raw request body.
/// Returns the storage reference to pass back when creating a run.
async fn upload_asset(
    State(state): State<SharedState>,
    Path(asset_type): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if !ASSET_TYPES.contains(&asset_type.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Unknown asset type '{}' (expected one of: {})",
            asset_type,
            ASSET_TYPES.join(", ")
        )));
    }
    if body.is_empty() {
        return Err(ApiError::BadRequest("Empty upload body".to_string()));
    }
    let extension = query
        .name
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !ASSET_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported asset file type '{}' (expected one of: {})",
            extension,
            ASSET_EXTENSIONS.join(", ")
        )));
    }

    let reference = state
        .media
        .save_brand_asset(&body, &asset_type, &query.name)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"reference": reference})),
    ))
}

/// Serve stored media by reference. Traversal attempts are rejected by the
/// media store's resolver before any file is touched.
async fn serve_media(
    State(state): State<SharedState>,
    Path(reference): Path<String>,
) -> Result<Response, ApiError> {
    if !state.media.exists(&reference) {
        return Err(ApiError::NotFound(format!(
            "No media at reference '{}'",
            reference
        )));
    }
    let bytes = state
        .media
        .read(&reference)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let mime = mime_guess::from_path(&reference).first_or_octet_stream();
    Ok((
        [(header::CONTENT_TYPE, mime.to_string())],
        bytes,
    )
        .into_response())
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AdapterSet, StageAdapter, StageOutcome, StageOutput, WorkflowContext};
    use crate::model::stage;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// Critique stub that always approves; generation and refinement hand
    /// back fixed references without touching disk.
    struct FixedAdapter {
        stage: &'static str,
        payload: serde_json::Value,
        artifacts: Vec<String>,
    }

    #[async_trait]
    impl StageAdapter for FixedAdapter {
        fn name(&self) -> &'static str {
            self.stage
        }
        async fn execute(&self, _ctx: &WorkflowContext) -> StageOutcome {
            StageOutcome::Success(StageOutput {
                payload: self.payload.clone(),
                artifacts: self.artifacts.clone(),
            })
        }
    }

    fn approving_adapters() -> Arc<AdapterSet> {
        Arc::new(AdapterSet {
            brand_kit: Arc::new(FixedAdapter {
                stage: stage::BRAND_KIT,
                payload: serde_json::json!({}),
                artifacts: vec![],
            }),
            generation: Arc::new(FixedAdapter {
                stage: stage::GENERATION,
                payload: serde_json::json!({}),
                artifacts: vec!["artifacts/test/variation_0.png".to_string()],
            }),
            critique: Arc::new(FixedAdapter {
                stage: stage::CRITIQUE,
                payload: serde_json::json!({"score": 9, "strategy": "approve"}),
                artifacts: vec![],
            }),
            refinement: Arc::new(FixedAdapter {
                stage: stage::REFINEMENT,
                payload: serde_json::json!({}),
                artifacts: vec![],
            }),
        })
    }

    fn test_state(dir: &std::path::Path) -> SharedState {
        let store = Arc::new(RunStore::new());
        let media = Arc::new(MediaStore::new(dir).unwrap());
        let engine = WorkflowEngine::new(Arc::clone(&store), approving_adapters(), 3);
        Arc::new(AppState {
            store,
            media,
            engine,
        })
    }

    fn test_app(dir: &std::path::Path) -> Router {
        api_router().with_state(test_state(dir))
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_app(dir.path())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_service_info_lists_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_app(dir.path())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let info = body_json(resp).await;
        assert_eq!(info["service"], "atelier");
        assert!(info["endpoints"]["submit"].is_string());
    }

    #[tokio::test]
    async fn test_create_run_returns_accepted_with_estimate() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_app(dir.path())
            .oneshot(post_json(
                "/api/runs",
                serde_json::json!({"prompt": "A summer ad for a lemonade brand"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "pending");
        assert_eq!(body["estimated_time"], 120);
        assert!(Uuid::parse_str(body["run_id"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_video_runs_get_longer_estimate() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_app(dir.path())
            .oneshot(post_json(
                "/api/runs",
                serde_json::json!({
                    "prompt": "A 15-second teaser for a sneaker drop",
                    "media_kind": "video",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(resp).await["estimated_time"], 300);
    }

    #[tokio::test]
    async fn test_short_prompt_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_app(dir.path())
            .oneshot(post_json(
                "/api/runs",
                serde_json::json!({"prompt": "   short   "}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("at least 10"));
    }

    #[tokio::test]
    async fn test_invalid_media_kind_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_app(dir.path())
            .oneshot(post_json(
                "/api/runs",
                serde_json::json!({
                    "prompt": "A poster for the autumn collection",
                    "media_kind": "hologram",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_unknown_run_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_app(dir.path())
            .oneshot(
                Request::builder()
                    .uri(format!("/api/runs/{}/status", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_result_before_completion_is_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let run = state
            .store
            .create(RunInput {
                prompt: "A banner for the spring sale".to_string(),
                media_kind: MediaKind::Image,
                brand_website_url: None,
                logo_ref: None,
                product_ref: None,
            })
            .unwrap();
        let app = api_router().with_state(state);
        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/runs/{}/result", run.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body = body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("not completed"));
    }

    #[tokio::test]
    async fn test_list_runs_filters_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let run = state
            .store
            .create(RunInput {
                prompt: "A hero image for the landing page".to_string(),
                media_kind: MediaKind::Image,
                brand_website_url: None,
                logo_ref: None,
                product_ref: None,
            })
            .unwrap();
        state.store.fail_run(run.id, "backend down").unwrap();
        let app = api_router().with_state(Arc::clone(&state));

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/runs?status=failed")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let listed = body_json(resp).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["status"], "failed");

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/runs?status=completed")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(resp).await.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_list_runs_rejects_bogus_status() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_app(dir.path())
            .oneshot(
                Request::builder()
                    .uri("/api/runs?status=melting")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_run() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let run = state
            .store
            .create(RunInput {
                prompt: "A story frame for the product reveal".to_string(),
                media_kind: MediaKind::Image,
                brand_website_url: None,
                logo_ref: None,
                product_ref: None,
            })
            .unwrap();
        let app = api_router().with_state(Arc::clone(&state));

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/runs/{}", run.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/runs/{}", run.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_asset_then_serve_it_back() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/assets/logo?name=acme.png")
                    .body(Body::from(vec![0x89u8, 0x50, 0x4e, 0x47]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let reference = body_json(resp).await["reference"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(reference.starts_with("brand_assets/logo/acme_"));

        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/media/{}", reference))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE].to_str().unwrap(),
            "image/png"
        );
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), &[0x89u8, 0x50, 0x4e, 0x47]);
    }

    #[tokio::test]
    async fn test_upload_non_image_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_app(dir.path())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/assets/logo?name=logo.exe")
                    .body(Body::from("data"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_unknown_asset_type_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_app(dir.path())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/assets/banner?name=x.png")
                    .body(Body::from("data"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_media_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let resp = test_app(dir.path())
            .oneshot(
                Request::builder()
                    .uri("/api/media/uploads/../../etc/passwd")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_submitted_run_completes_via_polling() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());

        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/runs",
                serde_json::json!({"prompt": "A clean product shot on a pastel background"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let run_id = body_json(resp).await["run_id"]
            .as_str()
            .unwrap()
            .to_string();

        // Stub adapters resolve immediately; a few polls are plenty.
        let mut completed = false;
        for _ in 0..50 {
            let resp = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(format!("/api/runs/{}/status", run_id))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            let snap = body_json(resp).await;
            if snap["status"] == "completed" {
                completed = true;
                break;
            }
            assert_ne!(snap["status"], "failed", "run failed: {:?}", snap["error"]);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(completed);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/runs/{}/result", run_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let result = body_json(resp).await;
        assert_eq!(result["success"], true);
        assert_eq!(result["final_artifact"], "artifacts/test/variation_0.png");
        assert_eq!(
            result["media_url"],
            "/api/media/artifacts/test/variation_0.png"
        );
    }
}

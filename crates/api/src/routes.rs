use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use ingest::Document;
use pipeline::{package_archive, FailureCategory, KnowledgeGraphPipeline, OutputMetadata};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use uuid::Uuid;

use crate::jobs::{Job, JobStatus, JobStore};
use crate::metrics::{Metrics, MetricsSnapshot};

/// Uploaded batches can be far larger than axum's 2 MB default
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobStore>,
    pub pipeline: Arc<KnowledgeGraphPipeline>,
    pub metrics: Arc<Metrics>,
}

#[derive(Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub use_case: String,
    pub files: Vec<Document>,
}

#[derive(Serialize, Deserialize)]
pub struct GenerateResponse {
    pub job_id: Uuid,
    pub message: String,
}

#[derive(Serialize)]
pub struct JobView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub use_case: String,
    pub file_count: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result_url: Option<String>,
    pub metadata: Option<OutputMetadata>,
    pub error: Option<String>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            result_url: (job.status == JobStatus::Complete).then(|| download_url(&job.id)),
            status: job.status,
            use_case: job.use_case,
            file_count: job.file_count,
            created_at: job.created_at,
            completed_at: job.completed_at,
            metadata: job.metadata,
            error: job.error,
        }
    }
}

#[derive(Serialize)]
struct StatsResponse {
    jobs: usize,
    runs: MetricsSnapshot,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn download_url(id: &Uuid) -> String {
    format!("/api/download/{}", id)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/generate", post(generate))
        .route("/api/status/:job_id", get(job_status))
        .route("/api/download/:job_id", get(download))
        .route("/api/stats", get(get_stats))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    if req.files.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No files provided"));
    }

    let job_id = state.jobs.create(&req.use_case, req.files.len());
    tracing::info!(job_id = %job_id, files = req.files.len(), use_case = %req.use_case, "Job queued");

    tokio::spawn(run_job(state, job_id, req.use_case, req.files));

    Ok(Json(GenerateResponse {
        job_id,
        message: "Job queued successfully".to_string(),
    }))
}

/// Run a job, marking it failed if the run panics
pub async fn run_job(state: AppState, job_id: Uuid, use_case: String, files: Vec<Document>) {
    let run = process_job(state.clone(), job_id, use_case, files);
    if AssertUnwindSafe(run).catch_unwind().await.is_err() {
        tracing::error!(job_id = %job_id, "Job panicked");
        state.metrics.record_failure();
        state.jobs.fail(&job_id, FailureCategory::Internal.user_message());
    }
}

/// Run the pipeline for one job and record the outcome in the store
pub async fn process_job(state: AppState, job_id: Uuid, use_case: String, files: Vec<Document>) {
    if !state.jobs.start(&job_id) {
        return;
    }
    state.metrics.record_start();

    let output = match state.pipeline.process(&use_case, &files).await {
        Ok(output) => output,
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, cause = ?e, "Job failed");
            state.metrics.record_failure();
            state.jobs.fail(&job_id, e.category().user_message());
            return;
        }
    };

    match package_archive(&output.files, &output.metadata) {
        Ok(archive) => {
            state.metrics.record_success(&output.metadata);
            state.jobs.complete(&job_id, output.metadata, archive);
            tracing::info!(
                job_id = %job_id,
                concepts = output.metadata.total_concepts,
                links = output.metadata.total_links,
                "Job complete"
            );
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = ?e, "Failed to package archive");
            state.metrics.record_failure();
            state.jobs.fail(&job_id, FailureCategory::Internal.user_message());
        }
    }
}

fn find_job(state: &AppState, job_id: &str) -> Result<Job, ApiError> {
    Uuid::parse_str(job_id)
        .ok()
        .and_then(|id| state.jobs.get(&id))
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Job not found"))
}

async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    let job = find_job(&state, &job_id)?;
    Ok(Json(JobView::from(job)))
}

async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let job = find_job(&state, &job_id)?;

    if job.status != JobStatus::Complete {
        return Err(api_error(StatusCode::BAD_REQUEST, "Job not complete"));
    }

    let archive = job
        .archive
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Result file not found"))?;

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"knowledge-graph-{}.zip\"", job.id),
        ),
    ];

    Ok((headers, archive.as_ref().clone()).into_response())
}

async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        jobs: state.jobs.len(),
        runs: state.metrics.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use extract::{Generation, TextGenerator};
    use std::time::Duration;
    use tower::ServiceExt;

    /// Extraction finds one concept per document; linking wraps the content
    struct StubLlm;

    #[async_trait]
    impl TextGenerator for StubLlm {
        async fn generate(&self, _system: &str, prompt: &str, _max_tokens: u32) -> Result<Generation> {
            if prompt.contains("UNREACHABLE") {
                anyhow::bail!("connection refused");
            }
            if prompt.contains("CRASH") {
                panic!("model client crashed");
            }
            if prompt.contains("ORIGINAL CONTENT:") {
                Ok(Generation::Text("See [[Topic]].".to_string()))
            } else {
                Ok(Generation::Text(r#"[{"name":"Topic","description":"A topic."}]"#.to_string()))
            }
        }
    }

    fn state() -> AppState {
        AppState {
            jobs: Arc::new(JobStore::new(Duration::from_secs(60))),
            pipeline: Arc::new(KnowledgeGraphPipeline::new(Arc::new(StubLlm))),
            metrics: Metrics::new(),
        }
    }

    fn generate_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn wait_until_finished(state: &AppState, id: &Uuid) -> Job {
        for _ in 0..100 {
            let job = state.jobs.get(id).unwrap();
            if job.status.is_finished() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job did not finish");
    }

    #[tokio::test]
    async fn test_generate_status_download() {
        let state = state();
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(generate_request(serde_json::json!({
                "use_case": "course-material",
                "files": [{"name": "a.md", "content": "Topic one"}, {"name": "b.md", "content": "Topic two"}]
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let job_id: Uuid = serde_json::from_value(body["job_id"].clone()).unwrap();

        let job = wait_until_finished(&state, &job_id).await;
        assert_eq!(job.status, JobStatus::Complete);

        let response = app
            .clone()
            .oneshot(get_request(&format!("/api/status/{}", job_id)))
            .await
            .unwrap();
        let status = body_json(response).await;
        assert_eq!(status["status"], "complete");
        assert_eq!(status["use_case"], "course-material");
        assert_eq!(status["file_count"], 2);
        assert_eq!(status["metadata"]["total_concepts"], 1);
        assert_eq!(status["metadata"]["total_links"], 2);
        assert_eq!(status["result_url"], format!("/api/download/{}", job_id));

        let response = app
            .clone()
            .oneshot(get_request(&format!("/api/download/{}", job_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"PK"));

        let stats = body_json(app.oneshot(get_request("/api/stats")).await.unwrap()).await;
        assert_eq!(stats["runs"]["runs_succeeded"], 1);
    }

    #[tokio::test]
    async fn test_generate_without_files_is_bad_request() {
        let response = router(state())
            .oneshot(generate_request(serde_json::json!({"use_case": "x", "files": []})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No files provided");
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let app = router(state());

        let uris = vec![
            "/api/status/not-a-uuid".to_string(),
            format!("/api/status/{}", Uuid::new_v4()),
        ];
        for uri in uris {
            let response = app.clone().oneshot(get_request(&uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }

        let response = app
            .oneshot(get_request(&format!("/api/download/{}", Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_download_before_completion_is_bad_request() {
        let state = state();
        let job_id = state.jobs.create("research-library", 1);

        let response = router(state)
            .oneshot(get_request(&format!("/api/download/{}", job_id)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failed_run_reports_category_message() {
        let state = state();
        let job_id = state.jobs.create("research-library", 1);

        process_job(
            state.clone(),
            job_id,
            "research-library".to_string(),
            vec![Document::new("a.md", "UNREACHABLE")],
        )
        .await;

        let job = state.jobs.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(
            job.error.as_deref(),
            Some(FailureCategory::ModelUnavailable.user_message())
        );
        assert_eq!(state.metrics.snapshot().runs_failed, 1);
    }

    #[tokio::test]
    async fn test_panicking_run_marks_job_failed() {
        let state = state();
        let job_id = state.jobs.create("research-library", 1);

        run_job(
            state.clone(),
            job_id,
            "research-library".to_string(),
            vec![Document::new("a.md", "CRASH")],
        )
        .await;

        let job = state.jobs.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.as_deref(), Some(FailureCategory::Internal.user_message()));
        assert_eq!(state.metrics.snapshot().runs_failed, 1);
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(state()).oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

use anyhow::Context;
use api::{jobs, router, AppState, JobStore, Metrics};
use pipeline::{logging, AppConfig, KnowledgeGraphPipeline, PipelineSettings};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(None)?;
    logging::init_tracing(config.logging.format);

    // Missing credentials stop startup before any job is accepted
    let llm = config.build_generator()?;

    let pipeline = KnowledgeGraphPipeline::new(llm).with_settings(PipelineSettings::from(&config));

    let job_store = Arc::new(JobStore::new(Duration::from_secs(config.jobs.ttl_secs)));
    jobs::spawn_sweeper(job_store.clone(), Duration::from_secs(config.jobs.sweep_interval_secs));

    let state = AppState {
        jobs: job_store,
        pipeline: Arc::new(pipeline),
        metrics: Metrics::new(),
    };

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .context(format!("Failed to bind {}", config.server.bind))?;

    tracing::info!("Server listening on http://{}", config.server.bind);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

use crate::cli::ServeArgs;
use crate::infra::{AppState, TracingActivityPublisher};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use talent_pipeline::config::{parse_grace_multiplier, AppConfig};
use talent_pipeline::error::AppError;
use talent_pipeline::telemetry;
use talent_pipeline::workflows::pipeline::{InMemoryPipelineStore, PipelineService, SlaPolicy};
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(level) = args.log_level.take() {
        config.telemetry.log_level = level;
    }
    if let Some(raw) = args.grace_multiplier.take() {
        config.pipeline.sla = SlaPolicy::with_grace_multiplier(parse_grace_multiplier(&raw)?);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let pipeline_service = Arc::new(PipelineService::new(
        Arc::new(InMemoryPipelineStore::new()),
        Arc::new(TracingActivityPublisher),
        config.pipeline.clone(),
    ));

    let app = with_operational_routes(pipeline_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        grace_multiplier = config.pipeline.sla.grace_multiplier(),
        "talent pipeline service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

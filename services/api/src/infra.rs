use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use talent_pipeline::workflows::pipeline::{ActivityError, ActivityLogEntry, ActivityPublisher};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Forwards activity entries to the log stream until a notification transport is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingActivityPublisher;

impl ActivityPublisher for TracingActivityPublisher {
    fn publish(&self, entry: &ActivityLogEntry) -> Result<(), ActivityError> {
        info!(
            target: "talent_pipeline::activity",
            sequence = entry.sequence,
            application_id = %entry.application_id,
            job_id = %entry.job_id,
            candidate_id = %entry.candidate_id,
            actor = entry.actor.as_ref().map(|actor| actor.0.as_str()).unwrap_or("system"),
            event = %entry.kind.describe(),
            "pipeline activity"
        );
        Ok(())
    }
}

//! Bulk transitions with per-item failure isolation.
//!
//! Each application is moved through [`PipelineService::move_to_stage`] on its own; a failure is
//! recorded in the report and the loop carries on. Items already applied stay applied.

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{ActorId, ApplicationId, StageId};
use super::error::ErrorKind;
use super::repository::{ActivityPublisher, PipelineStore};
use super::service::PipelineService;

/// Per-application failure captured during a bulk move.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkMoveFailure {
    pub application_id: ApplicationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_name: Option<String>,
    pub kind: ErrorKind,
    pub error: String,
}

/// Accumulated result of a bulk move.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkMoveReport {
    /// Successful items, including ones that were already in the target stage.
    pub moved_count: usize,
    /// Subset of `moved_count` that required no change.
    pub unchanged_count: usize,
    pub failed_count: usize,
    pub failures: Vec<BulkMoveFailure>,
}

impl BulkMoveReport {
    pub fn success(&self) -> bool {
        self.failed_count == 0
    }

    fn record_success(&mut self, changed: bool) {
        self.moved_count += 1;
        if !changed {
            self.unchanged_count += 1;
        }
    }

    fn record_failure(&mut self, failure: BulkMoveFailure) {
        self.failed_count += 1;
        self.failures.push(failure);
    }
}

impl<S, P> PipelineService<S, P>
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    /// Move every listed application to `target_stage_id`, isolating failures per item.
    pub fn bulk_move(
        &self,
        application_ids: &[ApplicationId],
        target_stage_id: &StageId,
        comment: Option<&str>,
        actor: Option<&ActorId>,
    ) -> BulkMoveReport {
        let mut report = BulkMoveReport::default();

        for application_id in application_ids {
            match self.move_to_stage(application_id, target_stage_id, comment, actor) {
                Ok(outcome) => report.record_success(outcome.changed),
                Err(err) => {
                    warn!(%application_id, %target_stage_id, error = %err, "bulk move item failed");
                    report.record_failure(BulkMoveFailure {
                        application_id: application_id.clone(),
                        candidate_name: self.candidate_name(application_id),
                        kind: err.kind(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            %target_stage_id,
            requested = application_ids.len(),
            moved = report.moved_count,
            failed = report.failed_count,
            "bulk move finished"
        );
        report
    }

    /// Best-effort display name lookup; failures here never mask the original error.
    fn candidate_name(&self, application_id: &ApplicationId) -> Option<String> {
        self.store()
            .candidate_for_application(application_id)
            .ok()
            .flatten()
            .map(|candidate| candidate.display_name)
    }
}


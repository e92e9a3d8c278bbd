use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;

use super::blueprint::PipelineBlueprint;
use super::clock::{Clock, SystemClock};
use super::domain::{
    ActivityLogEntry, ActorId, ApplicationId, Candidate, CandidateApplication, CompanyId, JobId,
    JobRecord, NewStage, Stage, StageHistoryEntry, StageId, StageUpdate,
};
use super::error::PipelineError;
use super::ledger::duration_hours;
use super::repository::{ActivityPublisher, ApplicationSeed, PipelineStore, TransitionPlan};
use super::sla::{SlaConfig, SlaEvaluation};

/// Service composing the stage store, the transition ledger and the activity hook.
pub struct PipelineService<S, P> {
    store: Arc<S>,
    publisher: Arc<P>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

static STAGE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_stage_id() -> StageId {
    let id = STAGE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    StageId(format!("stg-{id:06}"))
}

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

/// Outcome of a single move. `changed` is false when the application was already in the target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionOutcome {
    pub application: CandidateApplication,
    pub stage: Stage,
    pub changed: bool,
}

impl<S, P> PipelineService<S, P>
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    pub fn new(store: Arc<S>, publisher: Arc<P>, config: PipelineConfig) -> Self {
        Self::with_clock(store, publisher, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<S>,
        publisher: Arc<P>,
        config: PipelineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Record a job and seed its default stages at positions `0..n`.
    pub fn register_job(
        &self,
        job_id: JobId,
        company_id: CompanyId,
        blueprint: &PipelineBlueprint,
    ) -> Result<Vec<Stage>, PipelineError> {
        if blueprint.stage_names().is_empty() {
            return Err(PipelineError::validation(
                "a job needs at least one stage",
            ));
        }

        let mut stages = Vec::with_capacity(blueprint.stage_names().len());
        for (position, raw) in blueprint.stage_names().iter().enumerate() {
            let name = raw.trim();
            if name.is_empty() {
                return Err(PipelineError::validation("stage name must not be empty"));
            }
            stages.push(Stage {
                id: next_stage_id(),
                job_id: job_id.clone(),
                name: name.to_string(),
                position: u32::try_from(position)
                    .map_err(|_| PipelineError::validation("too many stages"))?,
                is_default: true,
                parent_id: None,
                requires_comment: self.config.rejection_vocabulary.matches(name),
                comment_policy_explicit: false,
            });
        }

        self.store.insert_job(
            JobRecord {
                job_id: job_id.clone(),
                company_id: company_id.clone(),
            },
            stages.clone(),
        )?;
        info!(%job_id, %company_id, stages = stages.len(), "job pipeline registered");
        Ok(stages)
    }

    pub fn get_stages(&self, job_id: &JobId) -> Result<Vec<Stage>, PipelineError> {
        self.store
            .stages(job_id)?
            .ok_or_else(|| PipelineError::not_found(format!("job {job_id}")))
    }

    pub fn insert_stage(
        &self,
        job_id: &JobId,
        new_stage: NewStage,
    ) -> Result<Stage, PipelineError> {
        let stage_id = next_stage_id();
        let vocabulary = &self.config.rejection_vocabulary;
        let stage = self
            .store
            .edit_stages(job_id, |list| list.insert(stage_id, new_stage, vocabulary))?;
        info!(
            %job_id,
            stage_id = %stage.id,
            position = stage.position,
            requires_comment = stage.requires_comment,
            "stage inserted"
        );
        Ok(stage)
    }

    /// Move a stage to `new_position` and return the job's resulting ordering.
    pub fn reorder_stage(
        &self,
        stage_id: &StageId,
        new_position: u32,
    ) -> Result<Vec<Stage>, PipelineError> {
        let stage = self.require_stage(stage_id)?;
        let ordering = self.store.edit_stages(&stage.job_id, |list| {
            list.reorder(stage_id, new_position)?;
            Ok(list.stages().to_vec())
        })?;
        info!(
            job_id = %stage.job_id,
            %stage_id,
            from = stage.position,
            to = new_position,
            "stage reordered"
        );
        Ok(ordering)
    }

    pub fn update_stage(
        &self,
        stage_id: &StageId,
        update: StageUpdate,
    ) -> Result<Stage, PipelineError> {
        let stage = self.require_stage(stage_id)?;
        let vocabulary = &self.config.rejection_vocabulary;
        let updated = self
            .store
            .edit_stages(&stage.job_id, |list| list.update(stage_id, update, vocabulary))?;
        info!(
            job_id = %stage.job_id,
            %stage_id,
            name = %updated.name,
            requires_comment = updated.requires_comment,
            "stage updated"
        );
        Ok(updated)
    }

    pub fn rename_stage(&self, stage_id: &StageId, name: &str) -> Result<Stage, PipelineError> {
        self.update_stage(
            stage_id,
            StageUpdate {
                name: Some(name.to_string()),
                ..StageUpdate::default()
            },
        )
    }

    pub fn set_stage_comment_policy(
        &self,
        stage_id: &StageId,
        requires_comment: bool,
    ) -> Result<Stage, PipelineError> {
        self.update_stage(
            stage_id,
            StageUpdate {
                requires_comment: Some(requires_comment),
                ..StageUpdate::default()
            },
        )
    }

    /// Delete a non-default, unoccupied stage and return the remaining ordering.
    pub fn delete_stage(&self, stage_id: &StageId) -> Result<Vec<Stage>, PipelineError> {
        let stage = self.require_stage(stage_id)?;
        let ordering = self.store.edit_stages(&stage.job_id, |list| {
            list.remove(stage_id)?;
            Ok(list.stages().to_vec())
        })?;
        info!(job_id = %stage.job_id, %stage_id, name = %stage.name, "stage deleted");
        Ok(ordering)
    }

    /// Create an application in the job's first stage.
    pub fn add_application(
        &self,
        job_id: &JobId,
        candidate: Candidate,
        actor: Option<&ActorId>,
    ) -> Result<CandidateApplication, PipelineError> {
        if candidate.display_name.trim().is_empty() {
            return Err(PipelineError::validation(
                "candidate display name must not be empty",
            ));
        }

        let commit = self.store.insert_application(ApplicationSeed {
            application_id: next_application_id(),
            job_id: job_id.clone(),
            candidate,
            at: self.clock.now(),
            actor: actor.cloned(),
        })?;
        info!(
            application_id = %commit.application.id,
            %job_id,
            stage = %commit.stage.name,
            "application added"
        );
        self.publish(&commit.activity);
        Ok(commit.application)
    }

    /// Retire an application. History and activity remain readable.
    pub fn remove_application(
        &self,
        application_id: &ApplicationId,
        actor: Option<&ActorId>,
    ) -> Result<(), PipelineError> {
        let activity =
            self.store
                .retire_application(application_id, self.clock.now(), actor.cloned())?;
        info!(%application_id, "application removed");
        self.publish(&activity);
        Ok(())
    }

    pub fn get_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<CandidateApplication, PipelineError> {
        self.store
            .application(application_id)?
            .ok_or_else(|| PipelineError::not_found(format!("application {application_id}")))
    }

    /// Move one application to `target_stage_id`.
    ///
    /// Validation happens before any write; the store then re-checks the plan while holding the
    /// job's shared lock and the application's lock, so a failure leaves no trace.
    pub fn move_to_stage(
        &self,
        application_id: &ApplicationId,
        target_stage_id: &StageId,
        comment: Option<&str>,
        actor: Option<&ActorId>,
    ) -> Result<TransitionOutcome, PipelineError> {
        let application = self.get_application(application_id)?;
        let target = self.require_stage(target_stage_id)?;

        if target.job_id != application.job_id {
            return Err(PipelineError::validation(format!(
                "cross-job stage: stage {} belongs to job {}, application {} to job {}",
                target.id, target.job_id, application.id, application.job_id
            )));
        }

        if application.current_stage_id == target.id {
            debug!(%application_id, stage = %target.name, "move skipped; already in stage");
            return Ok(TransitionOutcome {
                application,
                stage: target,
                changed: false,
            });
        }

        let comment = comment
            .map(str::trim)
            .filter(|comment| !comment.is_empty())
            .map(str::to_string);
        if target.requires_comment && comment.is_none() {
            return Err(PipelineError::validation(format!(
                "comment required for rejection stage '{}'",
                target.name
            )));
        }

        let commit = self.store.commit_transition(TransitionPlan {
            application_id: application.id.clone(),
            job_id: application.job_id.clone(),
            expected_stage_id: application.current_stage_id.clone(),
            target_stage_id: target.id.clone(),
            comment,
            actor: actor.cloned(),
            at: self.clock.now(),
        })?;

        info!(
            %application_id,
            job_id = %commit.application.job_id,
            transition = %commit.activity.kind.describe(),
            "candidate moved"
        );
        self.publish(&commit.activity);

        Ok(TransitionOutcome {
            application: commit.application,
            stage: commit.stage,
            changed: true,
        })
    }

    pub fn stage_history(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<StageHistoryEntry>, PipelineError> {
        self.store
            .history(application_id)?
            .ok_or_else(|| PipelineError::not_found(format!("application {application_id}")))
    }

    pub fn activity(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<ActivityLogEntry>, PipelineError> {
        self.store
            .activity(application_id)?
            .ok_or_else(|| PipelineError::not_found(format!("application {application_id}")))
    }

    pub fn set_sla_config(
        &self,
        company_id: CompanyId,
        config: SlaConfig,
    ) -> Result<(), PipelineError> {
        info!(%company_id, stages = config.thresholds.len(), "sla thresholds updated");
        self.store.put_sla_config(company_id, config)?;
        Ok(())
    }

    /// Classify how long the application has been in its current stage.
    pub fn evaluate_sla(
        &self,
        application_id: &ApplicationId,
    ) -> Result<SlaEvaluation, PipelineError> {
        let application = self.get_application(application_id)?;
        let sla = self.sla_for_job(&application.job_id)?;
        self.evaluate_residence(&application, &sla, self.clock.now())
    }

    /// Evaluate every live application of a job against the owning company's thresholds.
    pub fn evaluate_job_sla(&self, job_id: &JobId) -> Result<Vec<SlaEvaluation>, PipelineError> {
        let sla = self.sla_for_job(job_id)?;
        let now = self.clock.now();
        self.store
            .applications_for_job(job_id)?
            .iter()
            .map(|application| self.evaluate_residence(application, &sla, now))
            .collect()
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    fn sla_for_job(&self, job_id: &JobId) -> Result<SlaConfig, PipelineError> {
        let job = self
            .store
            .job(job_id)?
            .ok_or_else(|| PipelineError::not_found(format!("job {job_id}")))?;
        Ok(self.store.sla_config(&job.company_id)?.unwrap_or_default())
    }

    fn evaluate_residence(
        &self,
        application: &CandidateApplication,
        sla: &SlaConfig,
        now: DateTime<Utc>,
    ) -> Result<SlaEvaluation, PipelineError> {
        let history = self.stage_history(&application.id)?;
        let open = history
            .into_iter()
            .rev()
            .find(StageHistoryEntry::is_open)
            .ok_or_else(|| {
                PipelineError::conflict(format!(
                    "application {} has no open stage residence",
                    application.id
                ))
            })?;

        let stage_name = self
            .store
            .stage(&open.stage_id)?
            .map(|stage| stage.name)
            .unwrap_or(open.stage_name);
        let hours_in_stage = duration_hours(open.entered_at, now);
        let threshold_days = sla.threshold_days(&stage_name);

        Ok(SlaEvaluation {
            application_id: application.id.clone(),
            stage_id: open.stage_id,
            stage_name,
            entered_at: open.entered_at,
            hours_in_stage,
            threshold_hours: threshold_days.map(|days| f64::from(days) * 24.0),
            status: self.config.sla.classify(hours_in_stage, threshold_days),
        })
    }

    fn require_stage(&self, stage_id: &StageId) -> Result<Stage, PipelineError> {
        self.store
            .stage(stage_id)?
            .ok_or_else(|| PipelineError::not_found(format!("stage {stage_id}")))
    }

    fn publish(&self, entry: &ActivityLogEntry) {
        if let Err(err) = self.publisher.publish(entry) {
            warn!(
                application_id = %entry.application_id,
                sequence = entry.sequence,
                error = %err,
                "activity subscriber failed; entry kept in log"
            );
        }
    }
}

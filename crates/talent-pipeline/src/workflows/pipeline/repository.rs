use chrono::{DateTime, Utc};

use super::domain::{
    ActivityLogEntry, ActorId, ApplicationId, Candidate, CandidateApplication, CandidateId,
    CompanyId, JobId, JobRecord, Stage, StageHistoryEntry, StageId,
};
use super::error::PipelineError;
use super::sla::SlaConfig;
use super::stages::StageList;

/// Storage abstraction over jobs, stage lists, applications and their ledgers.
///
/// Mutating calls are the transaction boundaries of the engine: each one either commits in full
/// or leaves the store untouched.
pub trait PipelineStore: Send + Sync {
    /// Record a job together with its seeded stage list.
    fn insert_job(&self, job: JobRecord, stages: Vec<Stage>) -> Result<(), RepositoryError>;
    fn job(&self, job_id: &JobId) -> Result<Option<JobRecord>, RepositoryError>;
    /// Stages of a job ordered by position. `None` when the job is unknown.
    fn stages(&self, job_id: &JobId) -> Result<Option<Vec<Stage>>, RepositoryError>;
    fn stage(&self, stage_id: &StageId) -> Result<Option<Stage>, RepositoryError>;

    /// Run `edit` against a working copy of the job's stage list while holding the job's
    /// exclusive lock. The copy replaces the stored list only if `edit` succeeds.
    fn edit_stages<T, F>(&self, job_id: &JobId, edit: F) -> Result<T, PipelineError>
    where
        F: FnOnce(&mut StageList) -> Result<T, PipelineError>;

    fn insert_application(
        &self,
        seed: ApplicationSeed,
    ) -> Result<ApplicationCommit, PipelineError>;
    /// Live applications only; retired applications resolve to `None`.
    fn application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<CandidateApplication>, RepositoryError>;
    fn applications_for_job(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<CandidateApplication>, RepositoryError>;
    fn candidate(&self, candidate_id: &CandidateId) -> Result<Option<Candidate>, RepositoryError>;
    /// Candidate behind an application, retired or not. `None` when the id was never issued.
    fn candidate_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<Candidate>, RepositoryError>;

    /// Full history, including retired applications. `None` when the id was never issued.
    fn history(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<Vec<StageHistoryEntry>>, RepositoryError>;
    fn activity(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<Vec<ActivityLogEntry>>, RepositoryError>;

    /// Apply a planned transition. The plan is re-validated inside the critical section.
    fn commit_transition(&self, plan: TransitionPlan) -> Result<TransitionCommit, PipelineError>;
    fn retire_application(
        &self,
        application_id: &ApplicationId,
        at: DateTime<Utc>,
        actor: Option<ActorId>,
    ) -> Result<ActivityLogEntry, PipelineError>;

    fn sla_config(&self, company_id: &CompanyId) -> Result<Option<SlaConfig>, RepositoryError>;
    fn put_sla_config(
        &self,
        company_id: CompanyId,
        config: SlaConfig,
    ) -> Result<(), RepositoryError>;
}

/// Everything needed to create an application and its first residence.
#[derive(Debug, Clone)]
pub struct ApplicationSeed {
    pub application_id: ApplicationId,
    pub job_id: JobId,
    pub candidate: Candidate,
    pub at: DateTime<Utc>,
    pub actor: Option<ActorId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationCommit {
    pub application: CandidateApplication,
    pub stage: Stage,
    pub opened: StageHistoryEntry,
    pub activity: ActivityLogEntry,
}

/// A validated transition computed outside the critical section.
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub application_id: ApplicationId,
    pub job_id: JobId,
    /// Stage the application was in when the plan was made.
    pub expected_stage_id: StageId,
    pub target_stage_id: StageId,
    pub comment: Option<String>,
    pub actor: Option<ActorId>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionCommit {
    pub application: CandidateApplication,
    pub stage: Stage,
    pub closed: Option<StageHistoryEntry>,
    pub opened: StageHistoryEntry,
    pub activity: ActivityLogEntry,
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("record conflict: {0}")]
    Conflict(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for the activity/notification collaborator.
pub trait ActivityPublisher: Send + Sync {
    fn publish(&self, entry: &ActivityLogEntry) -> Result<(), ActivityError>;
}

/// Activity dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    #[error("activity transport unavailable: {0}")]
    Transport(String),
}

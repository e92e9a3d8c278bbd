use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::workflows::pipeline::domain::{
    ActivityLogEntry, ActorId, ApplicationId, Candidate, CandidateApplication, CandidateId,
    CompanyId, JobId, JobRecord, Stage, StageHistoryEntry, StageId,
};
use crate::workflows::pipeline::repository::{
    ActivityError, ActivityPublisher, ApplicationCommit, ApplicationSeed, PipelineStore,
    RepositoryError, TransitionCommit, TransitionPlan,
};
use crate::workflows::pipeline::{
    Clock, InMemoryPipelineStore, PipelineBlueprint, PipelineError, PipelineService, SlaConfig,
    StageList,
};

pub(super) const COMPANY: &str = "acme";

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0)
        .single()
        .expect("valid start")
}

pub(super) struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub(super) fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(at),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

#[derive(Default)]
pub(super) struct MemoryActivity {
    events: Mutex<Vec<ActivityLogEntry>>,
}

impl MemoryActivity {
    pub(super) fn events(&self) -> Vec<ActivityLogEntry> {
        self.events.lock().expect("activity mutex poisoned").clone()
    }
}

impl ActivityPublisher for MemoryActivity {
    fn publish(&self, entry: &ActivityLogEntry) -> Result<(), ActivityError> {
        self.events
            .lock()
            .expect("activity mutex poisoned")
            .push(entry.clone());
        Ok(())
    }
}

pub(super) struct FailingActivity;

impl ActivityPublisher for FailingActivity {
    fn publish(&self, _entry: &ActivityLogEntry) -> Result<(), ActivityError> {
        Err(ActivityError::Transport("notification bus offline".to_string()))
    }
}

pub(super) type TestService = PipelineService<InMemoryPipelineStore, MemoryActivity>;

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) store: Arc<InMemoryPipelineStore>,
    pub(super) activity: Arc<MemoryActivity>,
    pub(super) clock: Arc<FixedClock>,
}

pub(super) fn harness() -> Harness {
    harness_with_config(PipelineConfig::default())
}

pub(super) fn harness_with_config(config: PipelineConfig) -> Harness {
    let store = Arc::new(InMemoryPipelineStore::new());
    let activity = Arc::new(MemoryActivity::default());
    let clock = Arc::new(FixedClock::new(start()));
    let service = Arc::new(PipelineService::with_clock(
        store.clone(),
        activity.clone(),
        config,
        clock.clone(),
    ));
    Harness {
        service,
        store,
        activity,
        clock,
    }
}

impl Harness {
    /// Register `job_id` with the given seeded stage names.
    pub(super) fn job(&self, job_id: &str, names: &[&str]) -> Vec<Stage> {
        self.service
            .register_job(
                JobId(job_id.to_string()),
                CompanyId(COMPANY.to_string()),
                &PipelineBlueprint::custom(names.iter().copied()),
            )
            .expect("job registers")
    }

    /// The funnel most transition tests run against.
    pub(super) fn hiring_job(&self, job_id: &str) -> Vec<Stage> {
        self.job(
            job_id,
            &["Applied", "Screening", "Interview", "Offer", "Rejected"],
        )
    }

    pub(super) fn stage(&self, job_id: &str, name: &str) -> Stage {
        self.service
            .get_stages(&JobId(job_id.to_string()))
            .expect("stages load")
            .into_iter()
            .find(|stage| stage.name == name)
            .unwrap_or_else(|| panic!("stage {name} missing from {job_id}"))
    }

    pub(super) fn apply(&self, job_id: &str, candidate: &str) -> CandidateApplication {
        self.service
            .add_application(
                &JobId(job_id.to_string()),
                Candidate {
                    candidate_id: CandidateId(format!("cand-{}", candidate.to_lowercase())),
                    display_name: candidate.to_string(),
                },
                None,
            )
            .expect("application added")
    }

    pub(super) fn positions(&self, job_id: &str) -> Vec<(String, u32)> {
        self.service
            .get_stages(&JobId(job_id.to_string()))
            .expect("stages load")
            .into_iter()
            .map(|stage| (stage.name, stage.position))
            .collect()
    }

    pub(super) fn history(&self, application: &CandidateApplication) -> Vec<StageHistoryEntry> {
        self.service
            .stage_history(&application.id)
            .expect("history loads")
    }

    pub(super) fn sla(&self, config: SlaConfig) {
        self.service
            .set_sla_config(CompanyId(COMPANY.to_string()), config)
            .expect("sla config stored")
    }
}

pub(super) fn ordering(names: &[&str]) -> Vec<(String, u32)> {
    names
        .iter()
        .enumerate()
        .map(|(index, name)| (name.to_string(), index as u32))
        .collect()
}

pub(super) fn recruiter() -> ActorId {
    ActorId("recruiter-7".to_string())
}

pub(super) struct UnavailableStore;

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

impl PipelineStore for UnavailableStore {
    fn insert_job(&self, _job: JobRecord, _stages: Vec<Stage>) -> Result<(), RepositoryError> {
        Err(offline())
    }

    fn job(&self, _job_id: &JobId) -> Result<Option<JobRecord>, RepositoryError> {
        Err(offline())
    }

    fn stages(&self, _job_id: &JobId) -> Result<Option<Vec<Stage>>, RepositoryError> {
        Err(offline())
    }

    fn stage(&self, _stage_id: &StageId) -> Result<Option<Stage>, RepositoryError> {
        Err(offline())
    }

    fn edit_stages<T, F>(&self, _job_id: &JobId, _edit: F) -> Result<T, PipelineError>
    where
        F: FnOnce(&mut StageList) -> Result<T, PipelineError>,
    {
        Err(offline().into())
    }

    fn insert_application(
        &self,
        _seed: ApplicationSeed,
    ) -> Result<ApplicationCommit, PipelineError> {
        Err(offline().into())
    }

    fn application(
        &self,
        _application_id: &ApplicationId,
    ) -> Result<Option<CandidateApplication>, RepositoryError> {
        Err(offline())
    }

    fn applications_for_job(
        &self,
        _job_id: &JobId,
    ) -> Result<Vec<CandidateApplication>, RepositoryError> {
        Err(offline())
    }

    fn candidate(&self, _candidate_id: &CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        Err(offline())
    }

    fn candidate_for_application(
        &self,
        _application_id: &ApplicationId,
    ) -> Result<Option<Candidate>, RepositoryError> {
        Err(offline())
    }

    fn history(
        &self,
        _application_id: &ApplicationId,
    ) -> Result<Option<Vec<StageHistoryEntry>>, RepositoryError> {
        Err(offline())
    }

    fn activity(
        &self,
        _application_id: &ApplicationId,
    ) -> Result<Option<Vec<ActivityLogEntry>>, RepositoryError> {
        Err(offline())
    }

    fn commit_transition(&self, _plan: TransitionPlan) -> Result<TransitionCommit, PipelineError> {
        Err(offline().into())
    }

    fn retire_application(
        &self,
        _application_id: &ApplicationId,
        _at: DateTime<Utc>,
        _actor: Option<ActorId>,
    ) -> Result<ActivityLogEntry, PipelineError> {
        Err(offline().into())
    }

    fn sla_config(&self, _company_id: &CompanyId) -> Result<Option<SlaConfig>, RepositoryError> {
        Err(offline())
    }

    fn put_sla_config(
        &self,
        _company_id: CompanyId,
        _config: SlaConfig,
    ) -> Result<(), RepositoryError> {
        Err(offline())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

//! In-process implementation of [`PipelineStore`].
//!
//! Locking model:
//! - each job owns an `RwLock` over its stage list. Stage edits take it exclusively; transitions,
//!   application inserts and retirements take it shared, so they never observe a half-applied
//!   reorder and a stage can't be deleted while someone is moving into it.
//! - each application owns a `Mutex` over its row, history and activity. Transitions on different
//!   applications of the same job only share the job's read lock.
//!
//! Lock order is job stages -> application map -> application slot; index maps are only held
//! for lookups.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    ActivityKind, ActivityLogEntry, ActorId, ApplicationId, Candidate, CandidateApplication,
    CandidateId, CompanyId, JobId, JobRecord, Stage, StageHistoryEntry, StageId,
};
use super::error::PipelineError;
use super::ledger::StageHistory;
use super::repository::{
    ApplicationCommit, ApplicationSeed, PipelineStore, RepositoryError, TransitionCommit,
    TransitionPlan,
};
use super::sla::SlaConfig;
use super::stages::StageList;

struct JobPartition {
    record: JobRecord,
    stages: RwLock<Vec<Stage>>,
}

struct ApplicationSlot {
    job_id: JobId,
    state: Mutex<ApplicationState>,
}

struct ApplicationState {
    application: CandidateApplication,
    retired: bool,
    history: StageHistory,
    activity: Vec<ActivityLogEntry>,
}

#[derive(Default)]
pub struct InMemoryPipelineStore {
    jobs: RwLock<HashMap<JobId, Arc<JobPartition>>>,
    stage_index: RwLock<HashMap<StageId, JobId>>,
    applications: RwLock<HashMap<ApplicationId, Arc<ApplicationSlot>>>,
    candidates: RwLock<HashMap<CandidateId, Candidate>>,
    sla: RwLock<HashMap<CompanyId, SlaConfig>>,
    activity_sequence: AtomicU64,
}

impl InMemoryPipelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&self, job_id: &JobId) -> Result<Option<Arc<JobPartition>>, RepositoryError> {
        Ok(read(&self.jobs)?.get(job_id).cloned())
    }

    fn slot(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<Arc<ApplicationSlot>>, RepositoryError> {
        Ok(read(&self.applications)?.get(application_id).cloned())
    }

    fn next_sequence(&self) -> u64 {
        self.activity_sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn occupancy(&self, job_id: &JobId) -> Result<BTreeMap<StageId, usize>, RepositoryError> {
        let slots: Vec<Arc<ApplicationSlot>> = read(&self.applications)?
            .values()
            .filter(|slot| &slot.job_id == job_id)
            .cloned()
            .collect();

        let mut occupancy = BTreeMap::new();
        for slot in slots {
            let state = lock(&slot.state)?;
            if !state.retired {
                *occupancy
                    .entry(state.application.current_stage_id.clone())
                    .or_insert(0) += 1;
            }
        }
        Ok(occupancy)
    }

    fn activity_entry(
        &self,
        application: &CandidateApplication,
        kind: ActivityKind,
        comment: Option<String>,
        actor: Option<ActorId>,
        at: DateTime<Utc>,
    ) -> ActivityLogEntry {
        ActivityLogEntry {
            sequence: self.next_sequence(),
            application_id: application.id.clone(),
            job_id: application.job_id.clone(),
            candidate_id: application.candidate_id.clone(),
            kind,
            comment,
            actor,
            occurred_at: at,
        }
    }
}

impl PipelineStore for InMemoryPipelineStore {
    fn insert_job(&self, job: JobRecord, stages: Vec<Stage>) -> Result<(), RepositoryError> {
        let mut jobs = write(&self.jobs)?;
        if jobs.contains_key(&job.job_id) {
            return Err(RepositoryError::Conflict(format!(
                "job {} already registered",
                job.job_id
            )));
        }

        let mut index = write(&self.stage_index)?;
        if let Some(taken) = stages.iter().find(|stage| index.contains_key(&stage.id)) {
            return Err(RepositoryError::Conflict(format!(
                "stage id {} already in use",
                taken.id
            )));
        }
        for stage in &stages {
            index.insert(stage.id.clone(), job.job_id.clone());
        }

        let mut stages = stages;
        stages.sort_by_key(|stage| stage.position);
        jobs.insert(
            job.job_id.clone(),
            Arc::new(JobPartition {
                record: job,
                stages: RwLock::new(stages),
            }),
        );
        Ok(())
    }

    fn job(&self, job_id: &JobId) -> Result<Option<JobRecord>, RepositoryError> {
        Ok(self.partition(job_id)?.map(|partition| partition.record.clone()))
    }

    fn stages(&self, job_id: &JobId) -> Result<Option<Vec<Stage>>, RepositoryError> {
        match self.partition(job_id)? {
            Some(partition) => Ok(Some(read(&partition.stages)?.clone())),
            None => Ok(None),
        }
    }

    fn stage(&self, stage_id: &StageId) -> Result<Option<Stage>, RepositoryError> {
        let Some(job_id) = read(&self.stage_index)?.get(stage_id).cloned() else {
            return Ok(None);
        };
        let Some(partition) = self.partition(&job_id)? else {
            return Ok(None);
        };
        let stages = read(&partition.stages)?;
        Ok(stages.iter().find(|stage| &stage.id == stage_id).cloned())
    }

    fn edit_stages<T, F>(&self, job_id: &JobId, edit: F) -> Result<T, PipelineError>
    where
        F: FnOnce(&mut StageList) -> Result<T, PipelineError>,
    {
        let partition = self
            .partition(job_id)?
            .ok_or_else(|| PipelineError::not_found(format!("job {job_id}")))?;
        let mut stored = write(&partition.stages)?;

        let occupancy = self.occupancy(job_id)?;
        let mut working = StageList::new(job_id.clone(), stored.clone(), occupancy);
        let value = edit(&mut working)?;

        if !working.is_contiguous() {
            return Err(PipelineError::conflict(format!(
                "stage positions for job {job_id} would not be contiguous"
            )));
        }

        let before: HashSet<StageId> = stored.iter().map(|stage| stage.id.clone()).collect();
        let after: HashSet<StageId> = working.stages().iter().map(|stage| stage.id.clone()).collect();
        {
            let mut index = write(&self.stage_index)?;
            if let Some(taken) = after
                .difference(&before)
                .find(|added| index.contains_key(*added))
            {
                return Err(PipelineError::conflict(format!(
                    "stage id {taken} already in use"
                )));
            }
            for removed in before.difference(&after) {
                index.remove(removed);
            }
            for added in after.difference(&before) {
                index.insert(added.clone(), job_id.clone());
            }
        }

        *stored = working.into_stages();
        Ok(value)
    }

    fn insert_application(
        &self,
        seed: ApplicationSeed,
    ) -> Result<ApplicationCommit, PipelineError> {
        let ApplicationSeed {
            application_id,
            job_id,
            candidate,
            at,
            actor,
        } = seed;

        let partition = self
            .partition(&job_id)?
            .ok_or_else(|| PipelineError::not_found(format!("job {job_id}")))?;
        let stages = read(&partition.stages)?;
        let stage = stages.first().cloned().ok_or_else(|| {
            PipelineError::validation(format!("job {job_id} has no stages to enter"))
        })?;

        let mut applications = write(&self.applications)?;
        if applications.contains_key(&application_id) {
            return Err(RepositoryError::Conflict(format!(
                "application {application_id} already exists"
            ))
            .into());
        }
        write(&self.candidates)?
            .entry(candidate.candidate_id.clone())
            .or_insert_with(|| candidate.clone());

        let application = CandidateApplication {
            id: application_id.clone(),
            job_id: job_id.clone(),
            candidate_id: candidate.candidate_id,
            current_stage_id: stage.id.clone(),
            applied_at: at,
            updated_at: at,
        };
        let mut history = StageHistory::default();
        let opened = history
            .enter(&application_id, &stage, at, None, actor.clone())
            .opened;
        let activity = self.activity_entry(
            &application,
            ActivityKind::ApplicationAdded {
                stage: stage.name.clone(),
            },
            None,
            actor,
            at,
        );

        applications.insert(
            application_id,
            Arc::new(ApplicationSlot {
                job_id,
                state: Mutex::new(ApplicationState {
                    application: application.clone(),
                    retired: false,
                    history,
                    activity: vec![activity.clone()],
                }),
            }),
        );

        Ok(ApplicationCommit {
            application,
            stage,
            opened,
            activity,
        })
    }

    fn application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<CandidateApplication>, RepositoryError> {
        let Some(slot) = self.slot(application_id)? else {
            return Ok(None);
        };
        let state = lock(&slot.state)?;
        Ok((!state.retired).then(|| state.application.clone()))
    }

    fn applications_for_job(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<CandidateApplication>, RepositoryError> {
        let slots: Vec<Arc<ApplicationSlot>> = read(&self.applications)?
            .values()
            .filter(|slot| &slot.job_id == job_id)
            .cloned()
            .collect();

        let mut live = Vec::with_capacity(slots.len());
        for slot in slots {
            let state = lock(&slot.state)?;
            if !state.retired {
                live.push(state.application.clone());
            }
        }
        live.sort_by(|a, b| a.applied_at.cmp(&b.applied_at).then_with(|| a.id.cmp(&b.id)));
        Ok(live)
    }

    fn candidate(&self, candidate_id: &CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        Ok(read(&self.candidates)?.get(candidate_id).cloned())
    }

    fn candidate_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<Candidate>, RepositoryError> {
        let Some(slot) = self.slot(application_id)? else {
            return Ok(None);
        };
        let candidate_id = lock(&slot.state)?.application.candidate_id.clone();
        self.candidate(&candidate_id)
    }

    fn history(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<Vec<StageHistoryEntry>>, RepositoryError> {
        let Some(slot) = self.slot(application_id)? else {
            return Ok(None);
        };
        let state = lock(&slot.state)?;
        Ok(Some(state.history.entries().to_vec()))
    }

    fn activity(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<Vec<ActivityLogEntry>>, RepositoryError> {
        let Some(slot) = self.slot(application_id)? else {
            return Ok(None);
        };
        let state = lock(&slot.state)?;
        Ok(Some(state.activity.clone()))
    }

    fn commit_transition(&self, plan: TransitionPlan) -> Result<TransitionCommit, PipelineError> {
        let TransitionPlan {
            application_id,
            job_id,
            expected_stage_id,
            target_stage_id,
            comment,
            actor,
            at,
        } = plan;

        let slot = self
            .slot(&application_id)?
            .ok_or_else(|| PipelineError::not_found(format!("application {application_id}")))?;
        if slot.job_id != job_id {
            return Err(PipelineError::validation(format!(
                "application {application_id} does not belong to job {job_id}"
            )));
        }
        let partition = self
            .partition(&job_id)?
            .ok_or_else(|| PipelineError::not_found(format!("job {job_id}")))?;

        let stages = read(&partition.stages)?;
        let target = stages
            .iter()
            .find(|stage| stage.id == target_stage_id)
            .cloned()
            .ok_or_else(|| {
                PipelineError::conflict(format!(
                    "target stage {target_stage_id} was removed before the move committed"
                ))
            })?;
        let has_comment = comment
            .as_deref()
            .is_some_and(|comment| !comment.trim().is_empty());
        if target.requires_comment && !has_comment {
            return Err(PipelineError::conflict(format!(
                "stage '{}' now requires a comment; retry with fresh data",
                target.name
            )));
        }

        let mut state = lock(&slot.state)?;
        if state.retired {
            return Err(PipelineError::not_found(format!(
                "application {application_id}"
            )));
        }
        if state.application.current_stage_id != expected_stage_id {
            return Err(PipelineError::conflict(format!(
                "application {application_id} changed stage concurrently; retry with fresh data"
            )));
        }

        let from_stage = stages
            .iter()
            .find(|stage| stage.id == expected_stage_id)
            .map(|stage| stage.name.clone())
            .or_else(|| {
                state
                    .history
                    .current()
                    .map(|entry| entry.stage_name.clone())
            })
            .unwrap_or_else(|| expected_stage_id.to_string());

        let ledger = state.history.enter(
            &application_id,
            &target,
            at,
            comment.clone(),
            actor.clone(),
        );
        state.application.current_stage_id = target.id.clone();
        state.application.updated_at = at;

        let activity = self.activity_entry(
            &state.application,
            ActivityKind::StageChanged {
                from_stage,
                to_stage: target.name.clone(),
            },
            comment,
            actor,
            at,
        );
        state.activity.push(activity.clone());

        Ok(TransitionCommit {
            application: state.application.clone(),
            stage: target,
            closed: ledger.closed,
            opened: ledger.opened,
            activity,
        })
    }

    fn retire_application(
        &self,
        application_id: &ApplicationId,
        at: DateTime<Utc>,
        actor: Option<ActorId>,
    ) -> Result<ActivityLogEntry, PipelineError> {
        let slot = self
            .slot(application_id)?
            .ok_or_else(|| PipelineError::not_found(format!("application {application_id}")))?;
        let partition = self
            .partition(&slot.job_id)?
            .ok_or_else(|| PipelineError::not_found(format!("job {}", slot.job_id)))?;
        let _stages = read(&partition.stages)?;

        let mut state = lock(&slot.state)?;
        if state.retired {
            return Err(PipelineError::not_found(format!(
                "application {application_id}"
            )));
        }

        let stage = state
            .history
            .close(at)
            .map(|entry| entry.stage_name)
            .unwrap_or_else(|| state.application.current_stage_id.to_string());
        state.retired = true;
        state.application.updated_at = at;

        let activity = self.activity_entry(
            &state.application,
            ActivityKind::ApplicationRemoved { stage },
            None,
            actor,
            at,
        );
        state.activity.push(activity.clone());
        Ok(activity)
    }

    fn sla_config(&self, company_id: &CompanyId) -> Result<Option<SlaConfig>, RepositoryError> {
        Ok(read(&self.sla)?.get(company_id).cloned())
    }

    fn put_sla_config(
        &self,
        company_id: CompanyId,
        config: SlaConfig,
    ) -> Result<(), RepositoryError> {
        write(&self.sla)?.insert(company_id, config);
        Ok(())
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Unavailable("store lock poisoned".to_string())
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, RepositoryError> {
    lock.read().map_err(|_| poisoned())
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, RepositoryError> {
    lock.write().map_err(|_| poisoned())
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex.lock().map_err(|_| poisoned())
}

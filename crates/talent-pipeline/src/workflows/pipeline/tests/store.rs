use std::sync::Arc;
use std::thread;

use super::common::*;
use crate::workflows::pipeline::domain::{
    Candidate, CandidateId, CompanyId, JobId, JobRecord, NewStage, Stage, StageId,
};
use crate::workflows::pipeline::repository::{ApplicationSeed, PipelineStore, RepositoryError};
use crate::workflows::pipeline::{ApplicationId, InMemoryPipelineStore, PipelineError};

fn stage(job: &str, id: &str, name: &str, position: u32) -> Stage {
    Stage {
        id: StageId(id.to_string()),
        job_id: JobId(job.to_string()),
        name: name.to_string(),
        position,
        is_default: true,
        parent_id: None,
        requires_comment: false,
        comment_policy_explicit: false,
    }
}

fn record(job: &str) -> JobRecord {
    JobRecord {
        job_id: JobId(job.to_string()),
        company_id: CompanyId(COMPANY.to_string()),
    }
}

#[test]
fn duplicate_jobs_and_stage_ids_are_conflicts() {
    let store = InMemoryPipelineStore::new();
    store
        .insert_job(record("job-a"), vec![stage("job-a", "s-1", "Applied", 0)])
        .expect("first insert");

    assert!(matches!(
        store.insert_job(record("job-a"), Vec::new()),
        Err(RepositoryError::Conflict(_))
    ));
    assert!(matches!(
        store.insert_job(record("job-b"), vec![stage("job-b", "s-1", "Applied", 0)]),
        Err(RepositoryError::Conflict(_))
    ));
    assert!(store.job(&JobId("job-b".into())).expect("lookup").is_none());
}

#[test]
fn failed_edits_leave_the_list_untouched() {
    let store = InMemoryPipelineStore::new();
    store
        .insert_job(
            record("job-a"),
            vec![
                stage("job-a", "s-1", "Applied", 0),
                stage("job-a", "s-2", "Offer", 1),
            ],
        )
        .expect("insert");

    let result: Result<(), PipelineError> = store.edit_stages(&JobId("job-a".into()), |list| {
        list.reorder(&StageId("s-2".into()), 0)?;
        Err(PipelineError::Validation("abandon edit".into()))
    });
    assert!(result.is_err());

    let names: Vec<String> = store
        .stages(&JobId("job-a".into()))
        .expect("load")
        .expect("job present")
        .into_iter()
        .map(|stage| stage.name)
        .collect();
    assert_eq!(names, vec!["Applied", "Offer"]);
}

#[test]
fn applications_enter_the_first_stage() {
    let store = InMemoryPipelineStore::new();
    store
        .insert_job(
            record("job-a"),
            vec![
                stage("job-a", "s-2", "Screening", 1),
                stage("job-a", "s-1", "Queue", 0),
            ],
        )
        .expect("insert");

    let commit = store
        .insert_application(ApplicationSeed {
            application_id: ApplicationId("app-1".into()),
            job_id: JobId("job-a".into()),
            candidate: Candidate {
                candidate_id: CandidateId("cand-1".into()),
                display_name: "Ada".into(),
            },
            at: start(),
            actor: None,
        })
        .expect("application stored");

    assert_eq!(commit.stage.name, "Queue");
    assert!(commit.opened.is_open());
    assert_eq!(commit.activity.sequence, 1);
    assert_eq!(
        store
            .candidate(&CandidateId("cand-1".into()))
            .expect("lookup")
            .map(|candidate| candidate.display_name),
        Some("Ada".to_string())
    );
}

#[test]
fn duplicate_application_ids_write_nothing() {
    let store = InMemoryPipelineStore::new();
    store
        .insert_job(record("job-a"), vec![stage("job-a", "s-1", "Applied", 0)])
        .expect("insert");
    let seed = |application: &str, candidate: &str, name: &str| ApplicationSeed {
        application_id: ApplicationId(application.into()),
        job_id: JobId("job-a".into()),
        candidate: Candidate {
            candidate_id: CandidateId(candidate.into()),
            display_name: name.into(),
        },
        at: start(),
        actor: None,
    };
    let display_name = |candidate: &str| {
        store
            .candidate(&CandidateId(candidate.into()))
            .expect("lookup")
            .map(|candidate| candidate.display_name)
    };

    store
        .insert_application(seed("app-1", "cand-1", "Ada"))
        .expect("first application");
    let err = store
        .insert_application(seed("app-1", "cand-2", "Bob"))
        .expect_err("duplicate id");
    assert!(matches!(
        err,
        PipelineError::Store(RepositoryError::Conflict(_))
    ));
    assert_eq!(display_name("cand-2"), None);

    store
        .insert_application(seed("app-2", "cand-1", "Ada L."))
        .expect("second application for the same candidate");
    assert_eq!(display_name("cand-1"), Some("Ada".to_string()));
    assert_eq!(
        store
            .candidate_for_application(&ApplicationId("app-2".into()))
            .expect("lookup")
            .map(|candidate| candidate.candidate_id),
        Some(CandidateId("cand-1".into()))
    );
}

#[test]
fn concurrent_stage_edits_keep_positions_contiguous() {
    let h = harness();
    h.hiring_job("job-a");
    let job = JobId("job-a".to_string());

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let service = h.service.clone();
            let job = job.clone();
            thread::spawn(move || {
                for round in 0..10u32 {
                    let name = format!("Extra {worker}-{round}");
                    let stage = service
                        .insert_stage(&job, NewStage::named(name, round % 3))
                        .expect("insert");
                    service
                        .reorder_stage(&stage.id, (round * 7 + worker) % 5)
                        .expect("reorder");
                    if round % 2 == 0 {
                        service.delete_stage(&stage.id).expect("delete");
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker finished");
    }

    let stages = h.service.get_stages(&job).expect("stages");
    assert_eq!(stages.len(), 5 + 8 * 5);
    for (index, stage) in stages.iter().enumerate() {
        assert_eq!(stage.position as usize, index);
    }
}

#[test]
fn concurrent_moves_keep_one_open_residence_each() {
    let h = harness();
    h.hiring_job("job-a");
    let applications: Vec<_> = (0..16)
        .map(|index| h.apply("job-a", &format!("Candidate{index}")))
        .collect();
    let targets: Arc<Vec<StageId>> = Arc::new(
        ["Screening", "Interview", "Offer"]
            .iter()
            .map(|name| h.stage("job-a", name).id)
            .collect(),
    );

    let workers: Vec<_> = applications
        .iter()
        .cloned()
        .map(|application| {
            let service = h.service.clone();
            let targets = targets.clone();
            thread::spawn(move || {
                for target in targets.iter() {
                    service
                        .move_to_stage(&application.id, target, None, None)
                        .expect("move");
                }
            })
        })
        .collect();

    let reorderer = {
        let service = h.service.clone();
        let stage_id = h.stage("job-a", "Applied").id;
        thread::spawn(move || {
            for position in [3, 0, 4, 1, 0] {
                service.reorder_stage(&stage_id, position).expect("reorder");
            }
        })
    };

    for worker in workers {
        worker.join().expect("worker finished");
    }
    reorderer.join().expect("reorderer finished");

    let offer = h.stage("job-a", "Offer");
    for application in &applications {
        let history = h.history(application);
        assert_eq!(history.len(), 4);
        assert_eq!(history.iter().filter(|entry| entry.is_open()).count(), 1);
        assert_eq!(
            h.service
                .get_application(&application.id)
                .expect("live")
                .current_stage_id,
            offer.id
        );
    }
    assert_eq!(h.activity.events().len(), 16 * 4);
}

#[test]
fn racing_moves_of_one_application_commit_once_per_change() {
    let h = harness();
    h.hiring_job("job-a");
    let application = h.apply("job-a", "Ada");
    let interview = h.stage("job-a", "Interview");

    let racers: Vec<_> = (0..6)
        .map(|_| {
            let service = h.service.clone();
            let application_id = application.id.clone();
            let target = interview.id.clone();
            thread::spawn(move || service.move_to_stage(&application_id, &target, None, None))
        })
        .collect();

    let mut changed = 0;
    for racer in racers {
        match racer.join().expect("racer finished") {
            Ok(outcome) if outcome.changed => changed += 1,
            Ok(_) => {}
            Err(err) => assert!(matches!(err, PipelineError::Conflict(_)), "{err:?}"),
        }
    }

    assert_eq!(changed, 1);
    assert_eq!(h.history(&application).len(), 2);
}

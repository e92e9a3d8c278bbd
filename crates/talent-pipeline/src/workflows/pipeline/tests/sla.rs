use chrono::Duration;

use super::common::*;
use crate::config::PipelineConfig;
use crate::workflows::pipeline::domain::JobId;
use crate::workflows::pipeline::{SlaConfig, SlaPolicy, SlaStatus};

fn widened_band() -> PipelineConfig {
    PipelineConfig {
        sla: SlaPolicy::with_grace_multiplier(1.5),
        ..PipelineConfig::default()
    }
}

#[test]
fn screening_residence_moves_from_at_risk_to_breached() {
    let h = harness_with_config(widened_band());
    h.hiring_job("job-a");
    h.sla(SlaConfig::new().with_threshold("Screening", 7));
    let application = h.apply("job-a", "Ada");
    let screening = h.stage("job-a", "Screening");
    h.service
        .move_to_stage(&application.id, &screening.id, None, None)
        .expect("move");

    h.clock.advance(Duration::days(9));
    let evaluation = h.service.evaluate_sla(&application.id).expect("evaluate");
    assert_eq!(evaluation.stage_name, "Screening");
    assert_eq!(evaluation.hours_in_stage, 216.0);
    assert_eq!(evaluation.threshold_hours, Some(168.0));
    assert_eq!(evaluation.status, SlaStatus::AtRisk);

    h.clock.advance(Duration::days(2));
    let evaluation = h.service.evaluate_sla(&application.id).expect("evaluate");
    assert_eq!(evaluation.hours_in_stage, 264.0);
    assert_eq!(evaluation.status, SlaStatus::Breached);
}

#[test]
fn default_band_boundaries() {
    let h = harness();
    h.hiring_job("job-a");
    h.sla(SlaConfig::new().with_threshold("Applied", 7));
    let application = h.apply("job-a", "Ada");

    let status = |h: &Harness| {
        h.service
            .evaluate_sla(&application.id)
            .expect("evaluate")
            .status
    };

    h.clock.advance(Duration::hours(167));
    assert_eq!(status(&h), SlaStatus::OnTrack);
    h.clock.advance(Duration::hours(1));
    assert_eq!(status(&h), SlaStatus::AtRisk);
    h.clock.advance(Duration::hours(41));
    assert_eq!(status(&h), SlaStatus::AtRisk);
    h.clock.advance(Duration::hours(1));
    assert_eq!(status(&h), SlaStatus::Breached);
}

#[test]
fn stages_without_thresholds_stay_on_track() {
    let h = harness();
    h.hiring_job("job-a");
    let application = h.apply("job-a", "Ada");
    h.clock.advance(Duration::days(90));

    let evaluation = h.service.evaluate_sla(&application.id).expect("evaluate");
    assert_eq!(evaluation.status, SlaStatus::OnTrack);
    assert_eq!(evaluation.threshold_hours, None);
}

#[test]
fn residence_clock_restarts_on_each_move() {
    let h = harness();
    h.hiring_job("job-a");
    h.sla(
        SlaConfig::new()
            .with_threshold("Applied", 2)
            .with_threshold("Interview", 5),
    );
    let application = h.apply("job-a", "Ada");
    h.clock.advance(Duration::days(4));
    assert_eq!(
        h.service.evaluate_sla(&application.id).expect("evaluate").status,
        SlaStatus::Breached
    );

    let interview = h.stage("job-a", "Interview");
    h.service
        .move_to_stage(&application.id, &interview.id, None, None)
        .expect("move");
    h.clock.advance(Duration::days(1));

    let evaluation = h.service.evaluate_sla(&application.id).expect("evaluate");
    assert_eq!(evaluation.stage_name, "Interview");
    assert_eq!(evaluation.hours_in_stage, 24.0);
    assert_eq!(evaluation.status, SlaStatus::OnTrack);
}

#[test]
fn renamed_stage_uses_its_current_threshold() {
    let h = harness();
    h.hiring_job("job-a");
    h.sla(SlaConfig::new().with_threshold("Phone Screen", 1));
    let application = h.apply("job-a", "Ada");
    let screening = h.stage("job-a", "Screening");
    h.service
        .move_to_stage(&application.id, &screening.id, None, None)
        .expect("move");
    h.service
        .rename_stage(&screening.id, "Phone Screen")
        .expect("rename");
    h.clock.advance(Duration::days(3));

    let evaluation = h.service.evaluate_sla(&application.id).expect("evaluate");
    assert_eq!(evaluation.stage_name, "Phone Screen");
    assert_eq!(evaluation.status, SlaStatus::Breached);
    assert_eq!(h.history(&application)[1].stage_name, "Screening");
}

#[test]
fn job_evaluation_covers_live_applications_only() {
    let h = harness();
    h.hiring_job("job-a");
    h.sla(SlaConfig::new().with_threshold("Applied", 1));
    let ada = h.apply("job-a", "Ada");
    let grace = h.apply("job-a", "Grace");
    h.service
        .remove_application(&grace.id, None)
        .expect("retire");
    h.clock.advance(Duration::days(2));

    let evaluations = h
        .service
        .evaluate_job_sla(&JobId("job-a".into()))
        .expect("job evaluation");
    assert_eq!(evaluations.len(), 1);
    assert_eq!(evaluations[0].application_id, ada.id);
    assert_eq!(evaluations[0].status, SlaStatus::Breached);

    assert!(h
        .service
        .evaluate_job_sla(&JobId("job-missing".into()))
        .is_err());
    assert!(h.service.evaluate_sla(&grace.id).is_err());
}

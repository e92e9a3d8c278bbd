use crate::infra::TracingActivityPublisher;
use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::Args;
use std::sync::{Arc, Mutex};
use talent_pipeline::config::PipelineConfig;
use talent_pipeline::error::AppError;
use talent_pipeline::workflows::pipeline::{
    ActorId, Candidate, CandidateId, Clock, CompanyId, InMemoryPipelineStore, JobId, NewStage,
    PipelineBlueprint, PipelineError, PipelineService, SlaConfig, SlaPolicy, Stage,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Days the sample candidate spends in Screening before the SLA check.
    #[arg(long, default_value_t = 9)]
    pub(crate) screening_days: i64,
    /// Screening SLA threshold in days.
    #[arg(long, default_value_t = 7)]
    pub(crate) screening_threshold: u32,
    /// Grace multiplier separating "at risk" from "breached".
    #[arg(long, default_value_t = SlaPolicy::DEFAULT_GRACE_MULTIPLIER)]
    pub(crate) grace_multiplier: f64,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            screening_days: 9,
            screening_threshold: 7,
            grace_multiplier: SlaPolicy::DEFAULT_GRACE_MULTIPLIER,
        }
    }
}

/// Manually advanced clock so the SLA portion doesn't depend on wall time.
struct DemoClock {
    now: Mutex<DateTime<Utc>>,
}

impl DemoClock {
    fn starting_at(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for DemoClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map(|now| *now)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        screening_days,
        screening_threshold,
        grace_multiplier,
    } = args;

    let start = Utc
        .with_ymd_and_hms(2025, 3, 3, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let clock = Arc::new(DemoClock::starting_at(start));
    let config = PipelineConfig {
        sla: SlaPolicy::with_grace_multiplier(grace_multiplier),
        ..PipelineConfig::default()
    };
    let service = PipelineService::with_clock(
        Arc::new(InMemoryPipelineStore::new()),
        Arc::new(TracingActivityPublisher),
        config,
        clock.clone(),
    );

    println!("Recruiting pipeline demo");
    let job = JobId("job-demo".to_string());
    let company = CompanyId("demo-co".to_string());
    let seeded = service.register_job(job.clone(), company.clone(), &PipelineBlueprint::standard())?;
    render_stages("Seeded funnel", &seeded);

    let take_home = service.insert_stage(&job, NewStage::named("Take-home", 4))?;
    render_stages("After inserting Take-home", &service.get_stages(&job)?);
    let reordered = service.reorder_stage(&take_home.id, 3)?;
    render_stages("After moving Take-home before Interview", &reordered);

    let recruiter = ActorId("demo-recruiter".to_string());
    let mut applications = Vec::new();
    for name in ["Ada Lovelace", "Grace Hopper", "Alan Turing"] {
        let candidate = Candidate {
            candidate_id: CandidateId(format!("cand-{}", name.to_lowercase().replace(' ', "-"))),
            display_name: name.to_string(),
        };
        applications.push(service.add_application(&job, candidate, Some(&recruiter))?);
    }
    println!("\nAdded {} applications to the first stage", applications.len());

    let applied = stage_named(&seeded, "Applied")?;
    let screening = stage_named(&seeded, "Screening")?;
    let rejected = stage_named(&seeded, "Rejected")?;

    let ids: Vec<_> = applications.iter().map(|app| app.id.clone()).collect();
    let report = service.bulk_move(&ids, &applied.id, None, Some(&recruiter));
    println!(
        "Bulk move to Applied: {} moved, {} failed",
        report.moved_count, report.failed_count
    );

    if let Some(last) = applications.last() {
        match service.move_to_stage(&last.id, &rejected.id, None, Some(&recruiter)) {
            Ok(_) => println!("  Unexpected: rejection accepted without a comment"),
            Err(err) => println!("  Rejection without comment refused: {err}"),
        }
        service.move_to_stage(
            &last.id,
            &rejected.id,
            Some("Position requires on-site presence"),
            Some(&recruiter),
        )?;
        println!("  Rejection with comment recorded");
    }

    service.set_sla_config(
        company,
        SlaConfig::new().with_threshold("Screening", screening_threshold),
    )?;
    if let Some(first) = applications.first() {
        service.move_to_stage(&first.id, &screening.id, None, Some(&recruiter))?;
        clock.advance(Duration::days(screening_days));
        let evaluation = service.evaluate_sla(&first.id)?;
        println!(
            "\nSLA check after {screening_days} days in Screening (threshold {screening_threshold}d, grace x{grace_multiplier}): {} ({:.0}h)",
            evaluation.status.label(),
            evaluation.hours_in_stage
        );

        println!("Stage history:");
        for entry in service.stage_history(&first.id)? {
            let duration = entry
                .duration_hours
                .map(|hours| format!("{hours:.1}h"))
                .unwrap_or_else(|| "current".to_string());
            println!("  - {} ({duration})", entry.stage_name);
        }

        println!("Activity:");
        for entry in service.activity(&first.id)? {
            println!("  #{} {}", entry.sequence, entry.kind.describe());
        }
    }

    Ok(())
}

fn stage_named<'a>(stages: &'a [Stage], name: &str) -> Result<&'a Stage, AppError> {
    stages
        .iter()
        .find(|stage| stage.name == name)
        .ok_or_else(|| AppError::Pipeline(PipelineError::NotFound(format!("stage {name}"))))
}

fn render_stages(title: &str, stages: &[Stage]) {
    println!("\n{title}");
    for stage in stages {
        let marker = if stage.requires_comment {
            " [comment required]"
        } else {
            ""
        };
        println!("  {}. {}{}", stage.position, stage.name, marker);
    }
}

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::blueprint::PipelineBlueprint;
use super::bulk::BulkMoveReport;
use super::domain::{
    ActorId, ApplicationId, Candidate, CandidateId, CompanyId, JobId, NewStage, Stage, StageId,
    StageUpdate,
};
use super::error::{ErrorKind, PipelineError};
use super::repository::{ActivityPublisher, PipelineStore};
use super::service::PipelineService;
use super::sla::SlaConfig;

type SharedService<S, P> = State<Arc<PipelineService<S, P>>>;

#[derive(Debug, Deserialize)]
pub struct RegisterJobRequest {
    pub job_id: String,
    pub company_id: String,
    /// Custom seeded stage names; the standard funnel is used when absent.
    #[serde(default)]
    pub stages: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AddApplicationRequest {
    pub candidate_id: String,
    pub display_name: String,
    #[serde(default)]
    pub actor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub target_stage_id: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub actor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkMoveRequest {
    pub application_ids: Vec<String>,
    pub target_stage_id: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub actor_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct StageListResponse {
    stages: Vec<Stage>,
}

#[derive(Debug, Serialize)]
struct StageChangeResponse {
    stage: Stage,
    stages: Vec<Stage>,
}

#[derive(Debug, Serialize)]
struct BulkMoveResponse {
    success: bool,
    #[serde(flatten)]
    report: BulkMoveReport,
}

/// Router builder exposing the stage list and transition operations.
pub fn pipeline_router<S, P>(service: Arc<PipelineService<S, P>>) -> Router
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    Router::new()
        .route("/api/v1/jobs", post(register_job_handler::<S, P>))
        .route(
            "/api/v1/jobs/:job_id/stages",
            get(list_stages_handler::<S, P>).post(insert_stage_handler::<S, P>),
        )
        .route(
            "/api/v1/jobs/:job_id/applications",
            post(add_application_handler::<S, P>),
        )
        .route("/api/v1/jobs/:job_id/sla", get(job_sla_handler::<S, P>))
        .route(
            "/api/v1/stages/:stage_id",
            patch(update_stage_handler::<S, P>).delete(delete_stage_handler::<S, P>),
        )
        .route(
            "/api/v1/applications/bulk-move",
            post(bulk_move_handler::<S, P>),
        )
        .route(
            "/api/v1/applications/:application_id/move",
            post(move_handler::<S, P>),
        )
        .route(
            "/api/v1/applications/:application_id/history",
            get(history_handler::<S, P>),
        )
        .route(
            "/api/v1/applications/:application_id/activity",
            get(activity_handler::<S, P>),
        )
        .route(
            "/api/v1/applications/:application_id/sla",
            get(sla_handler::<S, P>),
        )
        .route(
            "/api/v1/companies/:company_id/sla",
            put(put_sla_handler::<S, P>),
        )
        .with_state(service)
}

/// Map an engine error to a status code and `{"error", "kind"}` body.
pub fn error_response(err: &PipelineError) -> Response {
    let kind = err.kind();
    let status = match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    let payload = json!({
        "error": err.to_string(),
        "kind": kind.label(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, PipelineError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => error_response(&err),
    }
}

fn actor(raw: Option<String>) -> Option<ActorId> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(ActorId)
}

pub(crate) async fn register_job_handler<S, P>(
    State(service): SharedService<S, P>,
    Json(request): Json<RegisterJobRequest>,
) -> Response
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    let blueprint = match request.stages {
        Some(names) => PipelineBlueprint::custom(names),
        None => PipelineBlueprint::standard(),
    };
    let result = service
        .register_job(
            JobId(request.job_id),
            CompanyId(request.company_id),
            &blueprint,
        )
        .map(|stages| StageListResponse { stages });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn list_stages_handler<S, P>(
    State(service): SharedService<S, P>,
    Path(job_id): Path<String>,
) -> Response
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    let result = service
        .get_stages(&JobId(job_id))
        .map(|stages| StageListResponse { stages });
    respond(StatusCode::OK, result)
}

pub(crate) async fn insert_stage_handler<S, P>(
    State(service): SharedService<S, P>,
    Path(job_id): Path<String>,
    Json(new_stage): Json<NewStage>,
) -> Response
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    let job_id = JobId(job_id);
    let result = service.insert_stage(&job_id, new_stage).and_then(|stage| {
        let stages = service.get_stages(&job_id)?;
        Ok(StageChangeResponse { stage, stages })
    });
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn update_stage_handler<S, P>(
    State(service): SharedService<S, P>,
    Path(stage_id): Path<String>,
    Json(update): Json<StageUpdate>,
) -> Response
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    let result = service
        .update_stage(&StageId(stage_id), update)
        .and_then(|stage| {
            let stages = service.get_stages(&stage.job_id)?;
            Ok(StageChangeResponse { stage, stages })
        });
    respond(StatusCode::OK, result)
}

pub(crate) async fn delete_stage_handler<S, P>(
    State(service): SharedService<S, P>,
    Path(stage_id): Path<String>,
) -> Response
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    let result = service
        .delete_stage(&StageId(stage_id))
        .map(|stages| StageListResponse { stages });
    respond(StatusCode::OK, result)
}

pub(crate) async fn add_application_handler<S, P>(
    State(service): SharedService<S, P>,
    Path(job_id): Path<String>,
    Json(request): Json<AddApplicationRequest>,
) -> Response
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    let candidate = Candidate {
        candidate_id: CandidateId(request.candidate_id),
        display_name: request.display_name,
    };
    let actor = actor(request.actor_id);
    let result = service.add_application(&JobId(job_id), candidate, actor.as_ref());
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn move_handler<S, P>(
    State(service): SharedService<S, P>,
    Path(application_id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> Response
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    let actor = actor(request.actor_id);
    let result = service.move_to_stage(
        &ApplicationId(application_id),
        &StageId(request.target_stage_id),
        request.comment.as_deref(),
        actor.as_ref(),
    );
    respond(StatusCode::OK, result)
}

pub(crate) async fn bulk_move_handler<S, P>(
    State(service): SharedService<S, P>,
    Json(request): Json<BulkMoveRequest>,
) -> Response
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    let ids: Vec<ApplicationId> = request
        .application_ids
        .into_iter()
        .map(ApplicationId)
        .collect();
    let actor = actor(request.actor_id);
    let report = service.bulk_move(
        &ids,
        &StageId(request.target_stage_id),
        request.comment.as_deref(),
        actor.as_ref(),
    );
    let body = BulkMoveResponse {
        success: report.success(),
        report,
    };
    (StatusCode::OK, Json(body)).into_response()
}

pub(crate) async fn history_handler<S, P>(
    State(service): SharedService<S, P>,
    Path(application_id): Path<String>,
) -> Response
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.stage_history(&ApplicationId(application_id)),
    )
}

pub(crate) async fn activity_handler<S, P>(
    State(service): SharedService<S, P>,
    Path(application_id): Path<String>,
) -> Response
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    respond(StatusCode::OK, service.activity(&ApplicationId(application_id)))
}

pub(crate) async fn sla_handler<S, P>(
    State(service): SharedService<S, P>,
    Path(application_id): Path<String>,
) -> Response
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    respond(
        StatusCode::OK,
        service.evaluate_sla(&ApplicationId(application_id)),
    )
}

pub(crate) async fn job_sla_handler<S, P>(
    State(service): SharedService<S, P>,
    Path(job_id): Path<String>,
) -> Response
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    respond(StatusCode::OK, service.evaluate_job_sla(&JobId(job_id)))
}

pub(crate) async fn put_sla_handler<S, P>(
    State(service): SharedService<S, P>,
    Path(company_id): Path<String>,
    Json(config): Json<SlaConfig>,
) -> Response
where
    S: PipelineStore + 'static,
    P: ActivityPublisher + 'static,
{
    match service.set_sla_config(CompanyId(company_id), config) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}

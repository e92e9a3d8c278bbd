//! Pipeline stage ordering and candidate transition engine.
//!
//! - [`stages`] keeps each job's stage positions contiguous under insert/reorder/delete.
//! - [`ledger`] records stage residences per application.
//! - [`service`] validates and applies single moves; [`bulk`] fans them out with per-item
//!   failure isolation.
//! - [`sla`] classifies time spent in the current stage.
//!
//! Storage sits behind [`PipelineStore`]; [`InMemoryPipelineStore`] provides the per-job and
//! per-application locking the engine relies on.

pub mod blueprint;
pub mod bulk;
pub mod clock;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod repository;
pub mod router;
pub mod service;
pub mod sla;
pub mod stages;
pub mod store;

#[cfg(test)]
mod tests;

pub use blueprint::{PipelineBlueprint, RejectionVocabulary};
pub use bulk::{BulkMoveFailure, BulkMoveReport};
pub use clock::{Clock, SystemClock};
pub use domain::{
    ActivityKind, ActivityLogEntry, ActorId, ApplicationId, Candidate, CandidateApplication,
    CandidateId, CompanyId, JobId, JobRecord, NewStage, Stage, StageHistoryEntry, StageId,
    StageUpdate,
};
pub use error::{ErrorKind, PipelineError};
pub use ledger::StageHistory;
pub use repository::{
    ActivityError, ActivityPublisher, ApplicationCommit, ApplicationSeed, PipelineStore,
    RepositoryError, TransitionCommit, TransitionPlan,
};
pub use router::{error_response, pipeline_router};
pub use service::{PipelineService, TransitionOutcome};
pub use sla::{SlaConfig, SlaEvaluation, SlaPolicy, SlaStatus};
pub use stages::StageList;
pub use store::InMemoryPipelineStore;

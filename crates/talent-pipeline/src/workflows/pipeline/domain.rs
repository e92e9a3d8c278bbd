use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Job identifier issued by the job-management collaborator.
    JobId
);
string_id!(
    /// Owning company of a job; SLA thresholds are configured per company.
    CompanyId
);
string_id!(StageId);
string_id!(
    /// Identifier of a candidate's association with one job.
    ApplicationId
);
string_id!(CandidateId);
string_id!(
    /// Opaque user reference passed through from the authentication collaborator.
    ActorId
);

/// The job-management collaborator's view of a job: existence plus ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub company_id: CompanyId,
}

/// One step of a job's hiring funnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub job_id: JobId,
    pub name: String,
    pub position: u32,
    /// System-seeded stages cannot be deleted.
    pub is_default: bool,
    /// Set for sub-stages nested under a top-level stage. Positions stay flat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<StageId>,
    /// Entering this stage requires a comment (rejection-style stages).
    pub requires_comment: bool,
    /// Set once an operator chose the policy; otherwise renames re-derive it from the vocabulary.
    #[serde(default)]
    pub comment_policy_explicit: bool,
}

/// Caller-supplied shape of a stage to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStage {
    pub name: String,
    pub position: u32,
    /// Explicit comment policy; when absent it is derived from the rejection vocabulary.
    #[serde(default)]
    pub requires_comment: Option<bool>,
    #[serde(default)]
    pub parent_id: Option<StageId>,
}

impl NewStage {
    pub fn named(name: impl Into<String>, position: u32) -> Self {
        Self {
            name: name.into(),
            position,
            requires_comment: None,
            parent_id: None,
        }
    }
}

/// Partial update applied to an existing stage in one atomic edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageUpdate {
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub requires_comment: Option<bool>,
}

impl StageUpdate {
    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.name.is_none() && self.requires_comment.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub candidate_id: CandidateId,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateApplication {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub candidate_id: CandidateId,
    pub current_stage_id: StageId,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One residence of an application in a stage. `exited_at == None` marks the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageHistoryEntry {
    pub application_id: ApplicationId,
    pub stage_id: StageId,
    /// Captured at write time so history survives renames and deletes.
    pub stage_name: String,
    pub entered_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
    pub duration_hours: Option<f64>,
    pub comment: Option<String>,
    pub moved_by: Option<ActorId>,
}

impl StageHistoryEntry {
    pub fn is_open(&self) -> bool {
        self.exited_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityKind {
    ApplicationAdded { stage: String },
    StageChanged { from_stage: String, to_stage: String },
    ApplicationRemoved { stage: String },
}

impl ActivityKind {
    pub fn describe(&self) -> String {
        match self {
            ActivityKind::ApplicationAdded { stage } => format!("added to {stage}"),
            ActivityKind::StageChanged {
                from_stage,
                to_stage,
            } => format!("moved from {from_stage} to {to_stage}"),
            ActivityKind::ApplicationRemoved { stage } => format!("removed while in {stage}"),
        }
    }
}

/// Append-only audit record; downstream notification systems subscribe to these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub sequence: u64,
    pub application_id: ApplicationId,
    pub job_id: JobId,
    pub candidate_id: CandidateId,
    pub kind: ActivityKind,
    pub comment: Option<String>,
    pub actor: Option<ActorId>,
    pub occurred_at: DateTime<Utc>,
}

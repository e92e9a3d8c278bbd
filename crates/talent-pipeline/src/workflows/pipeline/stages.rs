//! Ordered stage list for one job.
//!
//! A [`StageList`] is the working copy the store hands to a stage edit while it holds the job's
//! exclusive lock. Every operation recomputes positions from the list it was given, so the
//! `{0, 1, ..., n-1}` position set holds after each successful call. A failed call leaves the list
//! untouched and the store discards the working copy anyway.

use std::collections::BTreeMap;

use super::blueprint::RejectionVocabulary;
use super::domain::{JobId, NewStage, Stage, StageId, StageUpdate};
use super::error::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub struct StageList {
    job_id: JobId,
    stages: Vec<Stage>,
    occupancy: BTreeMap<StageId, usize>,
}

impl StageList {
    pub fn new(job_id: JobId, mut stages: Vec<Stage>, occupancy: BTreeMap<StageId, usize>) -> Self {
        stages.sort_by_key(|stage| stage.position);
        Self {
            job_id,
            stages,
            occupancy,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<Stage> {
        self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn get(&self, stage_id: &StageId) -> Option<&Stage> {
        self.stages.iter().find(|stage| &stage.id == stage_id)
    }

    /// Number of live applications currently sitting in `stage_id`.
    pub fn occupants(&self, stage_id: &StageId) -> usize {
        self.occupancy.get(stage_id).copied().unwrap_or(0)
    }

    pub fn is_contiguous(&self) -> bool {
        self.stages
            .iter()
            .enumerate()
            .all(|(index, stage)| stage.position as usize == index)
    }

    /// Append a new stage at `position`, shifting every stage at or after it up by one.
    pub fn insert(
        &mut self,
        id: StageId,
        new_stage: NewStage,
        vocabulary: &RejectionVocabulary,
    ) -> Result<Stage, PipelineError> {
        let name = validate_name(&new_stage.name)?;
        let count = self.len_u32();
        if new_stage.position > count {
            return Err(PipelineError::validation(format!(
                "position {} is out of range (0..={count})",
                new_stage.position
            )));
        }
        if let Some(parent_id) = &new_stage.parent_id {
            let parent = self.get(parent_id).ok_or_else(|| {
                PipelineError::validation(format!(
                    "parent stage {parent_id} does not belong to job {}",
                    self.job_id
                ))
            })?;
            if parent.parent_id.is_some() {
                return Err(PipelineError::validation(format!(
                    "parent stage {parent_id} is itself a sub-stage"
                )));
            }
        }

        let requires_comment = new_stage
            .requires_comment
            .unwrap_or_else(|| vocabulary.matches(&name));

        for stage in self
            .stages
            .iter_mut()
            .filter(|stage| stage.position >= new_stage.position)
        {
            stage.position += 1;
        }

        let stage = Stage {
            id,
            job_id: self.job_id.clone(),
            name,
            position: new_stage.position,
            is_default: false,
            parent_id: new_stage.parent_id,
            requires_comment,
            comment_policy_explicit: new_stage.requires_comment.is_some(),
        };
        self.stages.push(stage.clone());
        self.resort();
        Ok(stage)
    }

    /// Move a stage to `new_position`, shifting the stages between the old and new slot.
    pub fn reorder(&mut self, stage_id: &StageId, new_position: u32) -> Result<(), PipelineError> {
        let old_position = self
            .get(stage_id)
            .map(|stage| stage.position)
            .ok_or_else(|| PipelineError::not_found(format!("stage {stage_id}")))?;

        let count = self.len_u32();
        if new_position >= count {
            return Err(PipelineError::validation(format!(
                "position {new_position} is out of range (0..{count})"
            )));
        }
        if new_position == old_position {
            return Ok(());
        }

        for stage in &mut self.stages {
            if &stage.id == stage_id {
                stage.position = new_position;
            } else if new_position > old_position
                && stage.position > old_position
                && stage.position <= new_position
            {
                stage.position -= 1;
            } else if new_position < old_position
                && stage.position >= new_position
                && stage.position < old_position
            {
                stage.position += 1;
            }
        }
        self.resort();
        Ok(())
    }

    /// Delete a non-default, unoccupied stage and close the gap it leaves.
    pub fn remove(&mut self, stage_id: &StageId) -> Result<Stage, PipelineError> {
        let stage = self
            .get(stage_id)
            .cloned()
            .ok_or_else(|| PipelineError::not_found(format!("stage {stage_id}")))?;

        if stage.is_default {
            return Err(PipelineError::validation(format!(
                "default stage '{}' cannot be deleted",
                stage.name
            )));
        }
        let occupants = self.occupants(stage_id);
        if occupants > 0 {
            return Err(PipelineError::conflict(format!(
                "stage '{}' has {occupants} active application(s)",
                stage.name
            )));
        }
        if self
            .stages
            .iter()
            .any(|candidate| candidate.parent_id.as_ref() == Some(stage_id))
        {
            return Err(PipelineError::conflict(format!(
                "stage '{}' still has sub-stages",
                stage.name
            )));
        }

        self.stages.retain(|candidate| &candidate.id != stage_id);
        for remaining in self
            .stages
            .iter_mut()
            .filter(|remaining| remaining.position > stage.position)
        {
            remaining.position -= 1;
        }
        self.occupancy.remove(stage_id);
        Ok(stage)
    }

    /// Apply a rename, comment-policy change and reorder together.
    ///
    /// A rename re-derives the comment policy from `vocabulary` unless the policy was set
    /// explicitly, either earlier or in this same update.
    pub fn update(
        &mut self,
        stage_id: &StageId,
        update: StageUpdate,
        vocabulary: &RejectionVocabulary,
    ) -> Result<Stage, PipelineError> {
        if update.is_empty() {
            return Err(PipelineError::validation("stage update has no changes"));
        }
        let index = self
            .stages
            .iter()
            .position(|stage| &stage.id == stage_id)
            .ok_or_else(|| PipelineError::not_found(format!("stage {stage_id}")))?;

        let name = update.name.as_deref().map(validate_name).transpose()?;
        if let Some(position) = update.position {
            self.reorder(stage_id, position)?;
        }

        let index = self
            .stages
            .iter()
            .position(|stage| &stage.id == stage_id)
            .unwrap_or(index);
        let stage = &mut self.stages[index];
        if let Some(name) = name {
            if !stage.comment_policy_explicit {
                stage.requires_comment = vocabulary.matches(&name);
            }
            stage.name = name;
        }
        if let Some(requires_comment) = update.requires_comment {
            stage.requires_comment = requires_comment;
            stage.comment_policy_explicit = true;
        }
        Ok(stage.clone())
    }

    fn len_u32(&self) -> u32 {
        u32::try_from(self.stages.len()).unwrap_or(u32::MAX)
    }

    fn resort(&mut self) {
        self.stages.sort_by_key(|stage| stage.position);
    }
}

fn validate_name(raw: &str) -> Result<String, PipelineError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(PipelineError::validation("stage name must not be empty"));
    }
    Ok(name.to_string())
}

//! Append-only stage residence history for a single application.
//!
//! Every application owns one [`StageHistory`]. Entering a stage appends an open entry; leaving it
//! stamps `exited_at` and `duration_hours` on that entry. At most one entry is open at a time.

use chrono::{DateTime, Utc};

use super::domain::{ActorId, ApplicationId, Stage, StageHistoryEntry};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageHistory {
    entries: Vec<StageHistoryEntry>,
}

/// The entry that was closed and the entry that was opened by one transition.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerTransition {
    pub closed: Option<StageHistoryEntry>,
    pub opened: StageHistoryEntry,
}

impl StageHistory {
    pub fn entries(&self) -> &[StageHistoryEntry] {
        &self.entries
    }

    pub fn current(&self) -> Option<&StageHistoryEntry> {
        self.entries.iter().rev().find(|entry| entry.is_open())
    }

    pub fn open_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_open()).count()
    }

    /// Close the open entry (if any) and open a new one for `stage`.
    pub fn enter(
        &mut self,
        application_id: &ApplicationId,
        stage: &Stage,
        at: DateTime<Utc>,
        comment: Option<String>,
        moved_by: Option<ActorId>,
    ) -> LedgerTransition {
        let closed = self.close(at);
        let opened = StageHistoryEntry {
            application_id: application_id.clone(),
            stage_id: stage.id.clone(),
            stage_name: stage.name.clone(),
            entered_at: at,
            exited_at: None,
            duration_hours: None,
            comment,
            moved_by,
        };
        self.entries.push(opened.clone());
        LedgerTransition { closed, opened }
    }

    /// Stamp the exit on the open entry, returning the closed entry.
    pub fn close(&mut self, at: DateTime<Utc>) -> Option<StageHistoryEntry> {
        let entry = self.entries.iter_mut().rev().find(|entry| entry.is_open())?;
        entry.exited_at = Some(at);
        entry.duration_hours = Some(duration_hours(entry.entered_at, at));
        Some(entry.clone())
    }
}

/// Hours elapsed between two instants, never negative.
pub fn duration_hours(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let seconds = (to - from).num_seconds().max(0);
    seconds as f64 / 3600.0
}

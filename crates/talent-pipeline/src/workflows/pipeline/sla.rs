use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, StageId};

/// Per-company map of stage name to residence threshold in days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaConfig {
    #[serde(default)]
    pub thresholds: BTreeMap<String, u32>,
}

impl SlaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, stage_name: impl Into<String>, days: u32) -> Self {
        self.thresholds.insert(stage_name.into(), days);
        self
    }

    /// Case-insensitive, whitespace-trimmed lookup.
    pub fn threshold_days(&self, stage_name: &str) -> Option<u32> {
        let wanted = normalize(stage_name);
        self.thresholds
            .iter()
            .find(|(name, _)| normalize(name) == wanted)
            .map(|(_, days)| *days)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Three-way residence classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    OnTrack,
    AtRisk,
    Breached,
}

impl SlaStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SlaStatus::OnTrack => "On track",
            SlaStatus::AtRisk => "At risk",
            SlaStatus::Breached => "Breached",
        }
    }
}

/// Grace band applied above the configured threshold before a residence counts as breached.
///
/// `threshold <= hours < threshold * grace_multiplier` is at risk; anything at or beyond the
/// upper bound is breached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlaPolicy {
    grace_multiplier: f64,
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            grace_multiplier: Self::DEFAULT_GRACE_MULTIPLIER,
        }
    }
}

impl SlaPolicy {
    pub const DEFAULT_GRACE_MULTIPLIER: f64 = 1.25;

    /// Multipliers below 1.0 (or non-finite) fall back to 1.0, i.e. no grace band.
    pub fn with_grace_multiplier(grace_multiplier: f64) -> Self {
        let grace_multiplier = if grace_multiplier.is_finite() && grace_multiplier >= 1.0 {
            grace_multiplier
        } else {
            1.0
        };
        Self { grace_multiplier }
    }

    pub fn grace_multiplier(&self) -> f64 {
        self.grace_multiplier
    }

    pub fn classify(&self, hours_in_stage: f64, threshold_days: Option<u32>) -> SlaStatus {
        let Some(days) = threshold_days else {
            return SlaStatus::OnTrack;
        };
        let threshold_hours = f64::from(days) * 24.0;
        if hours_in_stage < threshold_hours {
            SlaStatus::OnTrack
        } else if hours_in_stage < threshold_hours * self.grace_multiplier {
            SlaStatus::AtRisk
        } else {
            SlaStatus::Breached
        }
    }
}

/// Result of evaluating one application's current residence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlaEvaluation {
    pub application_id: ApplicationId,
    pub stage_id: StageId,
    pub stage_name: String,
    pub entered_at: DateTime<Utc>,
    pub hours_in_stage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_hours: Option<f64>,
    pub status: SlaStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_threshold_is_always_on_track() {
        let policy = SlaPolicy::default();
        assert_eq!(policy.classify(10_000.0, None), SlaStatus::OnTrack);
    }

    #[test]
    fn default_band_boundaries() {
        let policy = SlaPolicy::default();
        let threshold = Some(7);
        assert_eq!(policy.classify(167.9, threshold), SlaStatus::OnTrack);
        assert_eq!(policy.classify(168.0, threshold), SlaStatus::AtRisk);
        assert_eq!(policy.classify(192.0, threshold), SlaStatus::AtRisk);
        assert_eq!(policy.classify(209.9, threshold), SlaStatus::AtRisk);
        assert_eq!(policy.classify(210.0, threshold), SlaStatus::Breached);
        assert_eq!(policy.classify(264.0, threshold), SlaStatus::Breached);
    }

    #[test]
    fn wider_band_keeps_nine_days_at_risk() {
        let policy = SlaPolicy::with_grace_multiplier(1.5);
        assert_eq!(policy.classify(216.0, Some(7)), SlaStatus::AtRisk);
        assert_eq!(policy.classify(264.0, Some(7)), SlaStatus::Breached);
    }

    #[test]
    fn invalid_multiplier_collapses_band() {
        let policy = SlaPolicy::with_grace_multiplier(0.5);
        assert_eq!(policy.grace_multiplier(), 1.0);
        assert_eq!(policy.classify(24.0, Some(1)), SlaStatus::Breached);
    }

    #[test]
    fn threshold_lookup_ignores_case_and_padding() {
        let config = SlaConfig::new().with_threshold("Interview", 7);
        assert_eq!(config.threshold_days("  interview "), Some(7));
        assert_eq!(config.threshold_days("Offer"), None);
    }
}

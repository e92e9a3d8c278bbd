use serde::{Deserialize, Serialize};

/// Ordered list of system-seeded stage names for a newly registered job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineBlueprint {
    stage_names: Vec<String>,
}

impl PipelineBlueprint {
    pub fn standard() -> Self {
        Self::custom([
            "Queue",
            "Applied",
            "Screening",
            "Interview",
            "Offer",
            "Hired",
            "Rejected",
        ])
    }

    pub fn custom<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        Self {
            stage_names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn stage_names(&self) -> &[String] {
        &self.stage_names
    }
}

/// Keywords that mark a stage as rejection-like when it is created without an explicit
/// comment policy. Matching is a case-insensitive substring test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionVocabulary {
    keywords: Vec<String>,
}

impl Default for RejectionVocabulary {
    fn default() -> Self {
        Self::new(["reject", "declined", "not selected"])
    }
}

impl RejectionVocabulary {
    pub fn new<I, K>(keywords: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|keyword| keyword.as_ref().trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn matches(&self, stage_name: &str) -> bool {
        let name = stage_name.to_lowercase();
        self.keywords.iter().any(|keyword| name.contains(keyword))
    }
}

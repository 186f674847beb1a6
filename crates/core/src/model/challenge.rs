use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ChallengeId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChallengeDefinitionError {
    #[error("challenge title cannot be empty")]
    EmptyTitle,

    #[error("challenge must support at least one language")]
    NoLanguages,
}

/// An interactive coding challenge as served by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodingChallenge {
    id: ChallengeId,
    title: String,
    description: String,
    languages: Vec<String>,
    starter_code: BTreeMap<String, String>,
    time_limit_secs: Option<u32>,
    max_hints: u32,
}

impl CodingChallenge {
    /// # Errors
    ///
    /// Returns `ChallengeDefinitionError` for a blank title or an empty language list.
    pub fn new(
        id: ChallengeId,
        title: impl Into<String>,
        description: impl Into<String>,
        languages: Vec<String>,
    ) -> Result<Self, ChallengeDefinitionError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ChallengeDefinitionError::EmptyTitle);
        }
        let mut languages: Vec<String> = languages
            .into_iter()
            .map(|lang| lang.trim().to_ascii_lowercase())
            .filter(|lang| !lang.is_empty())
            .collect();
        let mut seen = HashSet::new();
        languages.retain(|lang| seen.insert(lang.clone()));
        if languages.is_empty() {
            return Err(ChallengeDefinitionError::NoLanguages);
        }
        Ok(Self {
            id,
            title,
            description: description.into(),
            languages,
            starter_code: BTreeMap::new(),
            time_limit_secs: None,
            max_hints: 0,
        })
    }

    #[must_use]
    pub fn with_starter_code(mut self, starter_code: BTreeMap<String, String>) -> Self {
        self.starter_code = starter_code
            .into_iter()
            .map(|(lang, code)| (lang.to_ascii_lowercase(), code))
            .collect();
        self
    }

    #[must_use]
    pub fn with_time_limit(mut self, secs: Option<u32>) -> Self {
        self.time_limit_secs = secs.filter(|s| *s > 0);
        self
    }

    #[must_use]
    pub fn with_max_hints(mut self, max_hints: u32) -> Self {
        self.max_hints = max_hints;
        self
    }

    #[must_use]
    pub fn id(&self) -> ChallengeId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    #[must_use]
    pub fn supports(&self, language: &str) -> bool {
        self.languages.iter().any(|l| l.eq_ignore_ascii_case(language))
    }

    /// Starter code for a language, empty when the backend supplied none.
    #[must_use]
    pub fn starter_code(&self, language: &str) -> &str {
        self.starter_code
            .get(&language.to_ascii_lowercase())
            .map_or("", String::as_str)
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u32> {
        self.time_limit_secs
    }

    #[must_use]
    pub fn max_hints(&self) -> u32 {
        self.max_hints
    }
}

/// Result of one test case in an execution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub time_ms: f64,
    #[serde(default)]
    pub memory_kb: u64,
}

/// Structured outcome of `execute`, rendered as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    #[serde(default)]
    pub results: Vec<TestCaseResult>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub passed_count: u32,
    #[serde(default)]
    pub total_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_error: Option<String>,
}

impl ExecutionReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.compile_error.is_none()
            && !self.results.is_empty()
            && self.results.iter().all(|r| r.passed)
    }
}

/// A hint unlocked at a point cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub id: u64,
    pub content: String,
    #[serde(default)]
    pub penalty_points: u32,
}

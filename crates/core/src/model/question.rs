use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("unknown question type: {0}")]
    UnknownKind(String),

    #[error("{kind} question cannot carry a {payload} payload")]
    PayloadMismatch {
        kind: QuestionKind,
        payload: &'static str,
    },

    #[error("{0} question needs at least one option")]
    MissingOptions(QuestionKind),

    #[error("duplicate option id: {0}")]
    DuplicateOption(String),

    #[error("ordering question needs at least two items")]
    TooFewItems,

    #[error("hotspot image must have a non-zero size")]
    InvalidHotspotImage,
}

//
// ─── KIND ──────────────────────────────────────────────────────────────────────
//

/// The ten question types an advanced quiz can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    MultipleSelect,
    TrueFalse,
    ShortAnswer,
    Essay,
    FillBlank,
    Code,
    Matching,
    Ordering,
    Hotspot,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::MultipleSelect => "multiple_select",
            Self::TrueFalse => "true_false",
            Self::ShortAnswer => "short_answer",
            Self::Essay => "essay",
            Self::FillBlank => "fill_blank",
            Self::Code => "code",
            Self::Matching => "matching",
            Self::Ordering => "ordering",
            Self::Hotspot => "hotspot",
        }
    }

    /// Kinds answered by picking option ids.
    #[must_use]
    pub fn is_choice(self) -> bool {
        matches!(
            self,
            Self::MultipleChoice | Self::MultipleSelect | Self::TrueFalse
        )
    }

    /// Kinds answered with free text.
    #[must_use]
    pub fn is_free_text(self) -> bool {
        matches!(self, Self::ShortAnswer | Self::Essay | Self::FillBlank)
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionKind {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim() {
            "multiple_choice" => Self::MultipleChoice,
            "multiple_select" => Self::MultipleSelect,
            "true_false" => Self::TrueFalse,
            "short_answer" => Self::ShortAnswer,
            "essay" => Self::Essay,
            "fill_blank" => Self::FillBlank,
            "code" => Self::Code,
            "matching" => Self::Matching,
            "ordering" => Self::Ordering,
            "hotspot" => Self::Hotspot,
            other => return Err(QuestionError::UnknownKind(other.to_owned())),
        };
        Ok(kind)
    }
}

//
// ─── PAYLOAD ───────────────────────────────────────────────────────────────────
//

/// A selectable, orderable or matchable item with a stable id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
}

impl ChoiceOption {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Maximum number of points the learner may place, if limited.
    pub max_points: Option<u32>,
}

/// Type-specific question content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionPayload {
    Choices { options: Vec<ChoiceOption> },
    FreeText { max_length: Option<u32> },
    Code { language: String, starter_code: String },
    Matching {
        left: Vec<ChoiceOption>,
        right: Vec<ChoiceOption>,
    },
    Ordering { items: Vec<ChoiceOption> },
    Hotspot { image: HotspotImage },
}

impl QuestionPayload {
    fn name(&self) -> &'static str {
        match self {
            Self::Choices { .. } => "choices",
            Self::FreeText { .. } => "free-text",
            Self::Code { .. } => "code",
            Self::Matching { .. } => "matching",
            Self::Ordering { .. } => "ordering",
            Self::Hotspot { .. } => "hotspot",
        }
    }

    fn fits(&self, kind: QuestionKind) -> bool {
        match self {
            Self::Choices { .. } => kind.is_choice(),
            Self::FreeText { .. } => kind.is_free_text(),
            Self::Code { .. } => kind == QuestionKind::Code,
            Self::Matching { .. } => kind == QuestionKind::Matching,
            Self::Ordering { .. } => kind == QuestionKind::Ordering,
            Self::Hotspot { .. } => kind == QuestionKind::Hotspot,
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A loaded quiz question. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    kind: QuestionKind,
    points: u32,
    prompt: String,
    payload: QuestionPayload,
}

impl Question {
    /// Build a validated question.
    ///
    /// A `true_false` question without options gets the canonical `true`/`false` pair.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank or the payload does not fit the kind.
    pub fn new(
        id: QuestionId,
        kind: QuestionKind,
        points: u32,
        prompt: impl Into<String>,
        payload: QuestionPayload,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if !payload.fits(kind) {
            return Err(QuestionError::PayloadMismatch {
                kind,
                payload: payload.name(),
            });
        }

        let payload = match payload {
            QuestionPayload::Choices { options }
                if options.is_empty() && kind == QuestionKind::TrueFalse =>
            {
                QuestionPayload::Choices {
                    options: vec![
                        ChoiceOption::new("true", "True"),
                        ChoiceOption::new("false", "False"),
                    ],
                }
            }
            QuestionPayload::Choices { options } => {
                if options.is_empty() {
                    return Err(QuestionError::MissingOptions(kind));
                }
                ensure_unique(&options)?;
                QuestionPayload::Choices { options }
            }
            QuestionPayload::Matching { left, right } => {
                if left.is_empty() || right.is_empty() {
                    return Err(QuestionError::MissingOptions(kind));
                }
                ensure_unique(&left)?;
                ensure_unique(&right)?;
                QuestionPayload::Matching { left, right }
            }
            QuestionPayload::Ordering { items } => {
                if items.len() < 2 {
                    return Err(QuestionError::TooFewItems);
                }
                ensure_unique(&items)?;
                QuestionPayload::Ordering { items }
            }
            QuestionPayload::Hotspot { image } => {
                if image.width == 0 || image.height == 0 {
                    return Err(QuestionError::InvalidHotspotImage);
                }
                QuestionPayload::Hotspot { image }
            }
            other => other,
        };

        Ok(Self {
            id,
            kind,
            points,
            prompt,
            payload,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn payload(&self) -> &QuestionPayload {
        &self.payload
    }
}

fn ensure_unique(options: &[ChoiceOption]) -> Result<(), QuestionError> {
    let mut seen = HashSet::with_capacity(options.len());
    for option in options {
        if !seen.insert(option.id.as_str()) {
            return Err(QuestionError::DuplicateOption(option.id.clone()));
        }
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

//! JSON bodies exchanged with the Codelab Educare backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use educare_core::model::{
    Answer, Assessment, AssessmentError, AttemptId, AttemptStatus, ChallengeDefinitionError,
    ChallengeId, ChoiceOption, CodingChallenge, ExecutionReport, HotspotImage, Question,
    QuestionError, QuestionId, QuestionKind, QuestionPayload, QuizId,
};
use educare_core::session::{ChallengeOutcome, SubmitOutcome};

//
// ─── ASSESSMENT ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDto {
    pub id: QuizId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub time_limit_seconds: Option<u32>,
    #[serde(default)]
    pub proctored: bool,
    #[serde(default)]
    pub passing_score: Option<u32>,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub shuffle_options: bool,
}

impl AssessmentDto {
    /// A zero time limit is read as untimed.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` for an empty title or bad passing score.
    pub fn into_domain(self) -> Result<Assessment, AssessmentError> {
        Assessment::new(self.id, self.title)?
            .with_time_limit(self.time_limit_seconds.filter(|secs| *secs > 0))?
            .with_passing_score(self.passing_score)
            .map(|a| {
                a.with_description(self.description)
                    .with_proctoring(self.proctored)
                    .with_shuffle(self.shuffle_questions, self.shuffle_options)
            })
    }
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDto {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub points: u32,
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub starter_code: Option<String>,
    #[serde(default)]
    pub left: Vec<ChoiceOption>,
    #[serde(default)]
    pub right: Vec<ChoiceOption>,
    #[serde(default)]
    pub items: Vec<ChoiceOption>,
    #[serde(default)]
    pub image: Option<HotspotImage>,
}

impl QuestionDto {
    /// # Errors
    ///
    /// Returns `QuestionError` for an unknown type or a payload that does not
    /// fit it.
    pub fn into_domain(self) -> Result<Question, QuestionError> {
        let kind: QuestionKind = self.kind.parse()?;
        let payload = match kind {
            QuestionKind::MultipleChoice
            | QuestionKind::MultipleSelect
            | QuestionKind::TrueFalse => QuestionPayload::Choices {
                options: self.options,
            },
            QuestionKind::ShortAnswer | QuestionKind::Essay | QuestionKind::FillBlank => {
                QuestionPayload::FreeText {
                    max_length: self.max_length,
                }
            }
            QuestionKind::Code => QuestionPayload::Code {
                language: self.language.unwrap_or_else(|| "plaintext".to_owned()),
                starter_code: self.starter_code.unwrap_or_default(),
            },
            QuestionKind::Matching => QuestionPayload::Matching {
                left: self.left,
                right: self.right,
            },
            QuestionKind::Ordering => QuestionPayload::Ordering { items: self.items },
            QuestionKind::Hotspot => QuestionPayload::Hotspot {
                image: self.image.ok_or(QuestionError::InvalidHotspotImage)?,
            },
        };
        Question::new(self.id, kind, self.points, self.prompt, payload)
    }
}

/// The questions endpoint answers with a bare list or `{ "questions": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum QuestionsEnvelope {
    List(Vec<QuestionDto>),
    Wrapped { questions: Vec<QuestionDto> },
}

impl QuestionsEnvelope {
    #[must_use]
    pub fn into_inner(self) -> Vec<QuestionDto> {
        match self {
            Self::List(questions) | Self::Wrapped { questions } => questions,
        }
    }
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// Server copy of the learner's attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSnapshot {
    pub id: AttemptId,
    #[serde(default)]
    pub status: AttemptStatus,
    #[serde(default)]
    pub answers: BTreeMap<QuestionId, Answer>,
    #[serde(default)]
    pub time_spent: u32,
    #[serde(default)]
    pub tab_switches: u32,
    #[serde(default)]
    pub flagged_questions: Vec<QuestionId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProgressBody<'a> {
    pub answers: &'a BTreeMap<QuestionId, Answer>,
    pub time_spent: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptBody<'a> {
    pub answers: &'a BTreeMap<QuestionId, Answer>,
    pub time_spent: u32,
    pub tab_switches: u32,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAttemptResponse {
    pub percentage: f64,
    #[serde(default)]
    pub passed: Option<bool>,
}

impl From<SubmitAttemptResponse> for SubmitOutcome {
    fn from(res: SubmitAttemptResponse) -> Self {
        Self {
            percentage: res.percentage,
            passed: res.passed,
        }
    }
}

//
// ─── CODING CHALLENGE ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDto {
    pub id: ChallengeId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub languages: Vec<String>,
    #[serde(default)]
    pub starter_code: BTreeMap<String, String>,
    #[serde(default)]
    pub time_limit_seconds: Option<u32>,
    #[serde(default)]
    pub max_hints: u32,
}

impl ChallengeDto {
    /// # Errors
    ///
    /// Returns `ChallengeDefinitionError` for an empty title or language list.
    pub fn into_domain(self) -> Result<CodingChallenge, ChallengeDefinitionError> {
        Ok(
            CodingChallenge::new(self.id, self.title, self.description, self.languages)?
                .with_starter_code(self.starter_code)
                .with_time_limit(self.time_limit_seconds)
                .with_max_hints(self.max_hints),
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteBody<'a> {
    pub code: &'a str,
    pub language: &'a str,
    pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HintBody {
    pub session_id: Uuid,
    pub hints_used: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSubmitBody<'a> {
    pub code: &'a str,
    pub language: &'a str,
    pub session_id: Uuid,
    pub time_spent: u32,
    pub hints_used: u32,
}

#[derive(Debug, Deserialize)]
pub struct ChallengeSubmitResponse {
    pub score: f64,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub report: Option<ExecutionReport>,
}

impl From<ChallengeSubmitResponse> for ChallengeOutcome {
    fn from(res: ChallengeSubmitResponse) -> Self {
        Self {
            score: res.score,
            passed: res.passed,
            report: res.report,
        }
    }
}

//
// ─── CODE COMPANION ────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
pub struct TipBody<'a> {
    pub code: &'a str,
    pub language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct TipResponse {
    #[serde(default)]
    pub tip: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_choice_and_hotspot_questions() {
        let list: QuestionsEnvelope = serde_json::from_value(json!({
            "questions": [
                {"id": 1, "type": "multiple_choice", "points": 2, "prompt": "Pick",
                 "options": [{"id": "A", "text": "a"}, {"id": "B", "text": "b"}]},
                {"id": 2, "type": "hotspot", "prompt": "Click the bug",
                 "image": {"url": "/img.png", "width": 640, "height": 480, "maxPoints": 1}},
                {"id": 3, "type": "true_false", "prompt": "Rust has a GC"}
            ]
        }))
        .unwrap();
        let questions: Vec<_> = list
            .into_inner()
            .into_iter()
            .map(|q| q.into_domain().unwrap())
            .collect();
        assert_eq!(questions[0].kind(), QuestionKind::MultipleChoice);
        assert!(matches!(
            questions[1].payload(),
            QuestionPayload::Hotspot { image } if image.max_points == Some(1)
        ));
        assert!(matches!(
            questions[2].payload(),
            QuestionPayload::Choices { options } if options.len() == 2
        ));
    }

    #[test]
    fn rejects_unknown_question_type() {
        let dto: QuestionDto =
            serde_json::from_value(json!({"id": 9, "type": "drawing", "prompt": "?"})).unwrap();
        assert_eq!(
            dto.into_domain().unwrap_err(),
            QuestionError::UnknownKind("drawing".into())
        );
    }

    #[test]
    fn zero_time_limit_means_untimed() {
        let dto: AssessmentDto = serde_json::from_value(
            json!({"id": 4, "title": "Traits", "timeLimitSeconds": 0, "proctored": true}),
        )
        .unwrap();
        let assessment = dto.into_domain().unwrap();
        assert_eq!(assessment.time_limit_secs(), None);
        assert!(assessment.proctored());
    }

    #[test]
    fn submit_body_is_camel_case_with_string_keys() {
        let answers = BTreeMap::from([(QuestionId::new(3), Answer::selections(["B"]))]);
        let body = SubmitAttemptBody {
            answers: &answers,
            time_spent: 42,
            tab_switches: 1,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"answers": {"3": {"selectedOptions": ["B"]}}, "timeSpent": 42, "tabSwitches": 1})
        );
    }
}

mod answer;
mod assessment;
mod challenge;
mod ids;
mod question;

pub use ids::{AttemptId, ChallengeId, ParseIdError, QuestionId, QuizId};

pub use answer::{Answer, Point};
pub use assessment::{Assessment, AssessmentError, AttemptStatus};
pub use challenge::{
    ChallengeDefinitionError, CodingChallenge, ExecutionReport, Hint, TestCaseResult,
};
pub use question::{
    ChoiceOption, HotspotImage, Question, QuestionError, QuestionKind, QuestionPayload,
};

use std::sync::Arc;

use tracing::{info, warn};

use educare_core::model::{Assessment, Question, QuizId};
use educare_core::session::{AttemptSession, AttemptSetup, DEFAULT_AUTOSAVE_PERIOD};
use storage::repository::{AttemptDraft, DraftRepository, StorageError};

use crate::api::{AssessmentApi, AttemptSnapshot};
use crate::error::{ApiError, AttemptLoadError};

/// A session ready to run, plus where its state came from.
#[derive(Debug)]
pub struct LoadedAttempt {
    pub session: AttemptSession,
    pub resumed_from_draft: bool,
}

/// Fetches quiz, questions and attempt, and folds in the local draft.
#[derive(Clone)]
pub struct AttemptLoader {
    api: Arc<dyn AssessmentApi>,
    drafts: Arc<dyn DraftRepository>,
    autosave_period: u32,
}

impl AttemptLoader {
    #[must_use]
    pub fn new(api: Arc<dyn AssessmentApi>, drafts: Arc<dyn DraftRepository>) -> Self {
        Self {
            api,
            drafts,
            autosave_period: DEFAULT_AUTOSAVE_PERIOD,
        }
    }

    #[must_use]
    pub fn with_autosave_period(mut self, period: u32) -> Self {
        self.autosave_period = period;
        self
    }

    /// Load the learner's attempt for a quiz.
    ///
    /// # Errors
    ///
    /// Returns `AttemptLoadError::NotFound` for a missing quiz or empty
    /// question list, `AttemptLoadError::Closed` for an attempt that no longer
    /// accepts answers, and `AttemptLoadError::Api` for other backend failures.
    pub async fn load(&self, quiz_id: QuizId) -> Result<LoadedAttempt, AttemptLoadError> {
        let not_found = |err: ApiError| match err {
            ApiError::NotFound => AttemptLoadError::NotFound(quiz_id),
            other => AttemptLoadError::Api(other),
        };

        let assessment = self.api.fetch_assessment(quiz_id).await.map_err(not_found)?;
        let questions = self.api.fetch_questions(quiz_id).await.map_err(not_found)?;
        if questions.is_empty() {
            return Err(AttemptLoadError::NotFound(quiz_id));
        }
        let attempt = self.api.fetch_attempt(quiz_id).await.map_err(not_found)?;
        if !attempt.status.is_open() {
            return Err(AttemptLoadError::Closed(attempt.status));
        }

        let draft = self.newer_draft(quiz_id, &attempt).await;
        let resumed_from_draft = draft.is_some();
        let setup = merge(attempt, draft, assessment, questions);

        info!(
            %quiz_id,
            attempt = %setup.attempt_id,
            time_spent = setup.time_spent_secs,
            resumed_from_draft,
            "attempt loaded"
        );

        let session = AttemptSession::resume(setup)?.with_autosave_period(self.autosave_period);
        Ok(LoadedAttempt {
            session,
            resumed_from_draft,
        })
    }

    /// The local draft, if it belongs to this attempt and is not behind the server.
    async fn newer_draft(
        &self,
        quiz_id: QuizId,
        attempt: &AttemptSnapshot,
    ) -> Option<AttemptDraft> {
        match self.drafts.load_draft(attempt.id).await {
            Ok(draft) if draft.quiz_id == quiz_id && draft.is_at_least(attempt.time_spent) => {
                Some(draft)
            }
            Ok(_) | Err(StorageError::NotFound) => None,
            Err(err) => {
                warn!(error = %err, attempt = %attempt.id, "could not read local draft");
                None
            }
        }
    }
}

fn merge(
    attempt: AttemptSnapshot,
    draft: Option<AttemptDraft>,
    assessment: Assessment,
    questions: Vec<Question>,
) -> AttemptSetup {
    let AttemptSnapshot {
        id,
        mut answers,
        time_spent,
        tab_switches,
        flagged_questions,
        ..
    } = attempt;

    let (time_spent, tab_switches, flags) = match draft {
        Some(draft) => {
            // The draft is at least as recent: its copy of a question wins.
            answers.extend(draft.answers);
            (
                draft.time_spent,
                tab_switches.max(draft.tab_switches),
                draft.flags,
            )
        }
        None => (time_spent, tab_switches, flagged_questions),
    };

    AttemptSetup {
        attempt_id: id,
        assessment,
        questions,
        time_spent_secs: time_spent,
        answers,
        flags,
        tab_switches,
    }
}

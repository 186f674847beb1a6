use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use educare_core::model::{
    Answer, Assessment, AttemptId, ChoiceOption, Question, QuestionId, QuestionKind,
    QuestionPayload, QuizId,
};
use educare_core::session::{
    AttemptSession, AttemptSetup, SubmissionState, SubmissionTrigger, SubmitOutcome, Visibility,
};
use educare_core::time::fixed_now;
use services::api::AttemptSnapshot;
use services::{ApiError, AssessmentApi, AttemptEvent, AttemptRuntime, Clock, RuntimeConfig};
use storage::repository::{DraftRepository, InMemoryRepository};

/// Backend double: the first `failing_saves` saves and `failing_submits`
/// submits fail, submits take `submit_delay`.
#[derive(Default)]
struct ScriptedApi {
    failing_saves: usize,
    failing_submits: usize,
    submit_delay: Duration,
    saves: AtomicUsize,
    submits: AtomicUsize,
}

#[async_trait]
impl AssessmentApi for ScriptedApi {
    async fn fetch_assessment(&self, _quiz_id: QuizId) -> Result<Assessment, ApiError> {
        Err(ApiError::NotFound)
    }

    async fn fetch_questions(&self, _quiz_id: QuizId) -> Result<Vec<Question>, ApiError> {
        Err(ApiError::NotFound)
    }

    async fn fetch_attempt(&self, _quiz_id: QuizId) -> Result<AttemptSnapshot, ApiError> {
        Err(ApiError::NotFound)
    }

    async fn save_progress(
        &self,
        _attempt_id: AttemptId,
        _answers: &BTreeMap<QuestionId, Answer>,
        _time_spent: u32,
    ) -> Result<(), ApiError> {
        let call = self.saves.fetch_add(1, Ordering::SeqCst);
        if call < self.failing_saves {
            return Err(ApiError::HttpStatus(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        }
        Ok(())
    }

    async fn submit_attempt(
        &self,
        _attempt_id: AttemptId,
        answers: &BTreeMap<QuestionId, Answer>,
        _time_spent: u32,
        _tab_switches: u32,
    ) -> Result<SubmitOutcome, ApiError> {
        let call = self.submits.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.submit_delay).await;
        if call < self.failing_submits {
            return Err(ApiError::HttpStatus(reqwest::StatusCode::BAD_GATEWAY));
        }
        Ok(SubmitOutcome {
            percentage: if answers.is_empty() { 0.0 } else { 50.0 },
            passed: Some(false),
        })
    }
}

fn question(id: u64) -> Question {
    Question::new(
        QuestionId::new(id),
        QuestionKind::MultipleChoice,
        1,
        format!("Question {id}"),
        QuestionPayload::Choices {
            options: vec![ChoiceOption::new("A", "Borrow"), ChoiceOption::new("B", "Move")],
        },
    )
    .unwrap()
}

fn setup(assessment: Assessment) -> AttemptSetup {
    AttemptSetup {
        attempt_id: AttemptId::new(11),
        assessment,
        questions: vec![question(1), question(2)],
        time_spent_secs: 0,
        answers: BTreeMap::new(),
        flags: Vec::new(),
        tab_switches: 0,
    }
}

fn session(assessment: Assessment) -> AttemptSession {
    AttemptSession::resume(setup(assessment)).unwrap()
}

fn quiz() -> Assessment {
    Assessment::new(QuizId::new(3), "Ownership").unwrap()
}

fn runtime(api: &Arc<ScriptedApi>, drafts: &InMemoryRepository) -> AttemptRuntime {
    AttemptRuntime::new(api.clone(), Arc::new(drafts.clone()))
        .with_clock(Clock::fixed(fixed_now()))
        .with_config(RuntimeConfig::default())
}

#[tokio::test(start_paused = true)]
async fn failed_autosave_is_retried_next_period() {
    let api = Arc::new(ScriptedApi {
        failing_saves: 1,
        ..ScriptedApi::default()
    });
    let drafts = InMemoryRepository::new();
    let mut handle = runtime(&api, &drafts).spawn(session(quiz()));
    let commands = handle.commands();
    commands
        .answer(QuestionId::new(1), Answer::selections(["A"]))
        .await
        .unwrap();

    let mut started = Vec::new();
    let mut finished = Vec::new();
    while finished.len() < 2 {
        match handle.next_event().await.unwrap() {
            AttemptEvent::AutosaveStarted { time_spent } => started.push(time_spent),
            AttemptEvent::AutosaveFinished { ok } => finished.push(ok),
            _ => {}
        }
    }

    assert_eq!(started, vec![30, 60]);
    assert_eq!(finished, vec![false, true]);
    assert_eq!(api.saves.load(Ordering::SeqCst), 2);

    let view = commands.snapshot().await.unwrap();
    assert!(!view.autosaving);
    drop(commands);
    handle.join().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn expiry_during_manual_submit_sends_one_request() {
    let api = Arc::new(ScriptedApi {
        submit_delay: Duration::from_secs(2),
        ..ScriptedApi::default()
    });
    let drafts = InMemoryRepository::new();
    let timed = quiz().with_time_limit(Some(3)).unwrap();
    let mut handle = runtime(&api, &drafts).spawn(session(timed));
    let commands = handle.commands();
    commands
        .answer(QuestionId::new(2), Answer::selections(["B"]))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    commands.submit().await.unwrap();
    drop(commands);

    let mut submitting = Vec::new();
    let mut expired = false;
    let mut outcome = None;
    while let Some(event) = handle.next_event().await {
        match event {
            AttemptEvent::Submitting { trigger } => submitting.push(trigger),
            AttemptEvent::Expired => expired = true,
            AttemptEvent::Submitted(result) => outcome = Some(result),
            _ => {}
        }
    }

    assert_eq!(submitting, vec![SubmissionTrigger::Manual]);
    assert!(expired);
    assert_eq!(outcome.map(|o| o.percentage), Some(50.0));
    assert_eq!(api.submits.load(Ordering::SeqCst), 1);

    let report = handle.join().await.unwrap();
    assert_eq!(report.state, SubmissionState::Submitted);
    assert_eq!(report.time_spent, 3);
    assert!(drafts.list_drafts().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn focus_loss_warnings_clear_after_ttl() {
    let api = Arc::new(ScriptedApi::default());
    let drafts = InMemoryRepository::new();
    let mut handle = runtime(&api, &drafts).spawn(session(quiz().with_proctoring(true)));
    let commands = handle.commands();
    for _ in 0..3 {
        commands.visibility(Visibility::Hidden).await.unwrap();
        commands.visibility(Visibility::Visible).await.unwrap();
    }

    let mut raised = Vec::new();
    let mut cleared = Vec::new();
    while cleared.len() < 3 {
        match handle.next_event().await.unwrap() {
            AttemptEvent::WarningRaised(warning) => raised.push(warning.occurrence),
            AttemptEvent::WarningCleared(id) => cleared.push(id),
            _ => {}
        }
    }
    assert_eq!(raised, vec![1, 2, 3]);

    let view = commands.snapshot().await.unwrap();
    assert_eq!(view.tab_switches, 3);
    assert!(view.warnings.is_empty());
    drop(commands);

    let report = handle.join().await.unwrap();
    assert_eq!(report.tab_switches, 3);
}

#[tokio::test(start_paused = true)]
async fn join_writes_local_draft() {
    let api = Arc::new(ScriptedApi::default());
    let drafts = InMemoryRepository::new();
    let handle = runtime(&api, &drafts).spawn(session(quiz()));
    let commands = handle.commands();
    commands
        .answer(QuestionId::new(1), Answer::selections(["A"]))
        .await
        .unwrap();
    commands.toggle_flag(QuestionId::new(2)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5500)).await;
    drop(commands);

    let report = handle.join().await.unwrap();
    assert_eq!(report.state, SubmissionState::InProgress);
    assert_eq!(report.answered, 1);

    let draft = drafts.load_draft(AttemptId::new(11)).await.unwrap();
    assert_eq!(draft.quiz_id, QuizId::new(3));
    assert_eq!(draft.time_spent, 5);
    assert_eq!(draft.flags, vec![QuestionId::new(2)]);
    assert_eq!(
        draft.answers.get(&QuestionId::new(1)),
        Some(&Answer::selections(["A"]))
    );
    assert_eq!(draft.saved_at, fixed_now());
    assert_eq!(api.submits.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_forced_submit_keeps_draft_and_allows_manual_retry() {
    let api = Arc::new(ScriptedApi {
        failing_submits: 1,
        submit_delay: Duration::from_millis(200),
        ..ScriptedApi::default()
    });
    let drafts = InMemoryRepository::new();
    let timed = quiz().with_time_limit(Some(60)).unwrap();
    let resumed = AttemptSession::resume(AttemptSetup {
        time_spent_secs: 90,
        answers: BTreeMap::from([(QuestionId::new(1), Answer::selections(["B"]))]),
        tab_switches: 2,
        ..setup(timed)
    })
    .unwrap();
    let mut handle = runtime(&api, &drafts).spawn(resumed);
    let commands = handle.commands();

    let mut events = Vec::new();
    loop {
        let event = handle.next_event().await.unwrap();
        let failed = matches!(event, AttemptEvent::SubmissionFailed { .. });
        events.push(event);
        if failed {
            break;
        }
    }
    assert!(matches!(
        events.as_slice(),
        [
            AttemptEvent::Expired,
            AttemptEvent::Submitting {
                trigger: SubmissionTrigger::TimeExpired
            },
            AttemptEvent::SubmissionFailed { .. },
        ]
    ));

    let draft = drafts.load_draft(AttemptId::new(11)).await.unwrap();
    assert_eq!(draft.time_spent, 60);
    assert_eq!(draft.tab_switches, 2);
    assert_eq!(
        draft.answers.get(&QuestionId::new(1)),
        Some(&Answer::selections(["B"]))
    );

    let view = commands.snapshot().await.unwrap();
    assert_eq!(view.submission, SubmissionState::InProgress);
    assert!(view.expired);

    commands.submit().await.unwrap();
    let mut retried = Vec::new();
    while let Some(event) = handle.next_event().await {
        match event {
            AttemptEvent::Submitting { trigger } => retried.push(trigger),
            AttemptEvent::Submitted(outcome) => {
                assert_eq!(outcome.percentage, 50.0);
                break;
            }
            AttemptEvent::SubmissionFailed { message } => panic!("retry failed: {message}"),
            _ => {}
        }
    }
    assert_eq!(retried, vec![SubmissionTrigger::Manual]);
    assert_eq!(api.submits.load(Ordering::SeqCst), 2);
    drop(commands);

    let report = handle.join().await.unwrap();
    assert_eq!(report.state, SubmissionState::Submitted);
    assert_eq!(report.time_spent, 60);
    assert!(drafts.list_drafts().await.unwrap().is_empty());
}

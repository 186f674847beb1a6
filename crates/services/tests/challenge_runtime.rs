use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use educare_core::model::{ChallengeId, CodingChallenge, ExecutionReport, Hint, TestCaseResult};
use educare_core::session::{ChallengeOutcome, ChallengeSession, SubmissionState, SubmissionTrigger};
use services::api::ChallengeSubmission;
use services::{ApiError, ChallengeApi, ChallengeEvent, ChallengeHandle, ChallengeService};
use uuid::Uuid;

const STARTER: &str = "fn reverse(s: &str) -> String { todo!() }";

/// Backend double: runs take `execute_delay`, submits take `submit_delay`
/// and the first `failing_submits` of them fail.
#[derive(Default)]
struct ScriptedApi {
    execute_delay: Duration,
    submit_delay: Duration,
    failing_submits: usize,
    executes: AtomicUsize,
    /// `(code, time_spent, hints_used)` per submit call.
    submissions: Mutex<Vec<(String, u32, u32)>>,
}

#[async_trait]
impl ChallengeApi for ScriptedApi {
    async fn fetch_challenge(&self, _id: ChallengeId) -> Result<CodingChallenge, ApiError> {
        Err(ApiError::NotFound)
    }

    async fn execute(
        &self,
        _id: ChallengeId,
        code: &str,
        _language: &str,
        _session_id: Uuid,
    ) -> Result<ExecutionReport, ApiError> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.execute_delay).await;
        let passed = !code.contains("todo!");
        Ok(ExecutionReport {
            results: vec![TestCaseResult {
                name: "reverses".into(),
                passed,
                input: Some("abc".into()),
                expected: Some("cba".into()),
                actual: None,
                error: None,
                time_ms: 1.5,
                memory_kb: 128,
            }],
            score: if passed { 100.0 } else { 0.0 },
            passed_count: u32::from(passed),
            total_count: 1,
            compile_error: None,
        })
    }

    async fn request_hint(
        &self,
        _id: ChallengeId,
        _session_id: Uuid,
        hints_used: u32,
    ) -> Result<Hint, ApiError> {
        Ok(Hint {
            id: u64::from(hints_used) + 1,
            content: "Iterate chars in reverse".into(),
            penalty_points: 10,
        })
    }

    async fn submit_challenge(
        &self,
        _id: ChallengeId,
        submission: ChallengeSubmission<'_>,
    ) -> Result<ChallengeOutcome, ApiError> {
        let call = {
            let mut submissions = self.submissions.lock().unwrap();
            submissions.push((
                submission.code.to_owned(),
                submission.time_spent,
                submission.hints_used,
            ));
            submissions.len() - 1
        };
        tokio::time::sleep(self.submit_delay).await;
        if call < self.failing_submits {
            return Err(ApiError::HttpStatus(reqwest::StatusCode::BAD_GATEWAY));
        }
        Ok(ChallengeOutcome {
            score: 90.0,
            passed: true,
            report: None,
        })
    }
}

fn challenge(limit: Option<u32>) -> CodingChallenge {
    CodingChallenge::new(
        ChallengeId::new(5),
        "Reverse",
        "Reverse a string",
        vec!["rust".into()],
    )
    .unwrap()
    .with_starter_code(BTreeMap::from([("rust".to_owned(), STARTER.to_owned())]))
    .with_time_limit(limit)
    .with_max_hints(1)
}

fn spawn(api: &Arc<ScriptedApi>, limit: Option<u32>) -> ChallengeHandle {
    ChallengeService::new(api.clone()).spawn(ChallengeSession::start(challenge(limit)))
}

/// Events up to and including the first one matching `stop`, without ticks.
async fn events_until(
    handle: &mut ChallengeHandle,
    stop: impl Fn(&ChallengeEvent) -> bool,
) -> Vec<ChallengeEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        if matches!(event, ChallengeEvent::Tick { .. }) {
            continue;
        }
        let done = stop(&event);
        events.push(event);
        if done {
            break;
        }
    }
    events
}

#[tokio::test(start_paused = true)]
async fn code_sent_after_expiry_is_rejected() {
    let api = Arc::new(ScriptedApi {
        submit_delay: Duration::from_secs(10),
        ..ScriptedApi::default()
    });
    let mut handle = spawn(&api, Some(2));
    let commands = handle.commands();

    // The learner is still typing when the limit passes.
    tokio::time::sleep(Duration::from_secs(5)).await;
    commands
        .edit_code("fn reverse(s: &str) -> String { s.chars().rev().collect() }")
        .await
        .unwrap();

    let events = events_until(&mut handle, |e| matches!(e, ChallengeEvent::Submitted(_))).await;
    assert_eq!(
        events,
        vec![
            ChallengeEvent::Expired,
            ChallengeEvent::Submitting {
                trigger: SubmissionTrigger::TimeExpired
            },
            ChallengeEvent::Rejected {
                reason: "challenge is closed".into()
            },
            ChallengeEvent::Submitted(ChallengeOutcome {
                score: 90.0,
                passed: true,
                report: None,
            }),
        ]
    );
    assert_eq!(
        *api.submissions.lock().unwrap(),
        vec![(STARTER.to_owned(), 2, 0)]
    );

    let report = handle.join().await.unwrap();
    assert_eq!(report.state, SubmissionState::Submitted);
    assert_eq!(report.time_spent, 2);
}

#[tokio::test(start_paused = true)]
async fn clock_keeps_ticking_while_code_runs() {
    let api = Arc::new(ScriptedApi {
        execute_delay: Duration::from_millis(3500),
        ..ScriptedApi::default()
    });
    let mut handle = spawn(&api, Some(60));
    let commands = handle.commands();
    commands.run().await.unwrap();
    commands.run().await.unwrap();

    let mut ticks = Vec::new();
    let mut others = Vec::new();
    while let Some(event) = handle.next_event().await {
        match event {
            ChallengeEvent::Tick { remaining, .. } => ticks.push(remaining),
            ChallengeEvent::RunFinished(report) => {
                assert!(!report.all_passed());
                break;
            }
            other => others.push(other),
        }
    }
    assert_eq!(ticks, vec![Some(59), Some(58), Some(57)]);
    assert_eq!(
        others,
        vec![
            ChallengeEvent::Running,
            ChallengeEvent::Rejected {
                reason: "a code run is already in flight".into()
            },
        ]
    );
    assert_eq!(api.executes.load(Ordering::SeqCst), 1);

    let session = commands.snapshot().await.unwrap();
    assert!(!session.is_running());
    assert_eq!(session.last_report().map(|r| r.passed_count), Some(0));
    drop(commands);
    let report = handle.join().await.unwrap();
    assert_eq!(report.state, SubmissionState::InProgress);
}

#[tokio::test(start_paused = true)]
async fn failed_submit_reopens_for_manual_retry() {
    let api = Arc::new(ScriptedApi {
        failing_submits: 1,
        submit_delay: Duration::from_millis(100),
        ..ScriptedApi::default()
    });
    let mut handle = spawn(&api, None);
    let commands = handle.commands();

    commands
        .edit_code("fn reverse(s: &str) -> String { s.chars().rev().collect() }")
        .await
        .unwrap();
    commands.hint().await.unwrap();
    let events = events_until(&mut handle, |e| {
        matches!(e, ChallengeEvent::HintUnlocked { .. })
    })
    .await;
    assert!(matches!(
        events.as_slice(),
        [
            ChallengeEvent::CodeUpdated,
            ChallengeEvent::HintUnlocked { used: 1, max: 1, .. },
        ]
    ));
    commands.hint().await.unwrap();
    commands.submit().await.unwrap();

    let events = events_until(&mut handle, |e| {
        matches!(e, ChallengeEvent::SubmissionFailed { .. })
    })
    .await;
    assert_eq!(
        events,
        vec![
            ChallengeEvent::Rejected {
                reason: "all 1 hints have been used".into()
            },
            ChallengeEvent::Submitting {
                trigger: SubmissionTrigger::Manual
            },
            ChallengeEvent::SubmissionFailed {
                message: "request failed with status 502 Bad Gateway".into()
            },
        ]
    );
    let session = commands.snapshot().await.unwrap();
    assert_eq!(session.submission_state(), SubmissionState::InProgress);

    commands.submit().await.unwrap();
    let events = events_until(&mut handle, |e| matches!(e, ChallengeEvent::Submitted(_))).await;
    assert_eq!(
        events.first(),
        Some(&ChallengeEvent::Submitting {
            trigger: SubmissionTrigger::Manual
        })
    );

    let submissions = api.submissions.lock().unwrap().clone();
    assert_eq!(submissions.len(), 2);
    assert!(
        submissions
            .iter()
            .all(|(code, _, hints)| code.contains("rev()") && *hints == 1)
    );

    drop(commands);
    let report = handle.join().await.unwrap();
    assert_eq!(report.state, SubmissionState::Submitted);
    assert_eq!(report.hints_used, 1);
    assert_eq!(report.outcome.map(|o| o.score), Some(90.0));
}

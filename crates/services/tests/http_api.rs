use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use url::Url;
use uuid::Uuid;

use educare_core::model::{Answer, AttemptId, ChallengeId, QuestionId, QuestionKind, QuizId};
use services::api::ChallengeSubmission;
use services::{ApiError, AssessmentApi, ChallengeApi, CodeCompanionService, HttpApi};

const TOKEN: &str = "test-token";

/// What the fake backend saw: path, bearer header, JSON body.
type Seen = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

async fn quiz(Path(id): Path<u64>) -> Result<Json<Value>, StatusCode> {
    if id != 1 {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({
        "id": 1,
        "title": "Borrowing",
        "timeLimitSeconds": 600,
        "proctored": true,
        "passingScore": 70
    })))
}

async fn questions(Path(_id): Path<u64>) -> Json<Value> {
    Json(json!({
        "questions": [
            {"id": 10, "type": "multiple_choice", "points": 1, "prompt": "Who owns it?",
             "options": [{"id": "A", "text": "caller"}, {"id": "B", "text": "callee"}]},
            {"id": 11, "type": "essay", "points": 5, "prompt": "Explain lifetimes"}
        ]
    }))
}

async fn attempt(Path(_id): Path<u64>) -> Json<Value> {
    Json(json!({
        "id": 77,
        "status": "in_progress",
        "answers": {"10": {"selectedOptions": ["A"]}},
        "timeSpent": 42,
        "tabSwitches": 1
    }))
}

async fn submit(
    State(seen): State<Seen>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    seen.lock()
        .unwrap()
        .push((format!("submit/{id}"), bearer(&headers), body));
    Json(json!({"percentage": 80.0, "passed": true}))
}

async fn save(
    State(seen): State<Seen>,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> StatusCode {
    seen.lock().unwrap().push((format!("save/{id}"), None, body));
    StatusCode::NO_CONTENT
}

async fn execute(
    State(seen): State<Seen>,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Json<Value> {
    seen.lock().unwrap().push((format!("execute/{id}"), None, body));
    Json(json!({
        "results": [{"name": "empty input", "passed": true, "timeMs": 0.4, "memoryKb": 512}],
        "score": 100.0,
        "passedCount": 1,
        "totalCount": 1
    }))
}

async fn challenge_submit(
    State(seen): State<Seen>,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Json<Value> {
    seen.lock().unwrap().push((format!("challenge-submit/{id}"), None, body));
    Json(json!({"score": 95.0, "passed": true}))
}

async fn tip(Json(body): Json<Value>) -> Json<Value> {
    let language = body["language"].as_str().unwrap_or_default().to_owned();
    Json(json!({"tip": format!("In {language}, prefer iterators. ")}))
}

async fn serve() -> (HttpApi, Seen) {
    let seen: Seen = Arc::default();
    let router = Router::new()
        .route("/api/advanced-quizzes/{id}", get(quiz))
        .route("/api/advanced-quizzes/{id}/questions", get(questions))
        .route("/api/advanced-quizzes/{id}/attempt", get(attempt))
        .route("/api/advanced-quiz-attempts/{id}/save", post(save))
        .route("/api/advanced-quiz-attempts/{id}/submit", post(submit))
        .route("/api/coding-challenges/{id}/execute", post(execute))
        .route("/api/coding-challenges/{id}/submit", post(challenge_submit))
        .route("/api/code-companion/tip", post(tip))
        .with_state(Arc::clone(&seen));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let base = Url::parse(&format!("http://{addr}")).unwrap();
    let api = HttpApi::new(base, Some(TOKEN.to_owned()), Duration::from_secs(5)).unwrap();
    (api, seen)
}

#[tokio::test]
async fn loads_quiz_questions_and_attempt() {
    let (api, _) = serve().await;

    let assessment = api.fetch_assessment(QuizId::new(1)).await.unwrap();
    assert_eq!(assessment.title(), "Borrowing");
    assert_eq!(assessment.time_limit_secs(), Some(600));
    assert!(assessment.proctored());

    let questions = api.fetch_questions(QuizId::new(1)).await.unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[1].kind(), QuestionKind::Essay);

    let snapshot = api.fetch_attempt(QuizId::new(1)).await.unwrap();
    assert_eq!(snapshot.id, AttemptId::new(77));
    assert_eq!(snapshot.time_spent, 42);
    assert_eq!(
        snapshot.answers.get(&QuestionId::new(10)),
        Some(&Answer::selections(["A"]))
    );
}

#[tokio::test]
async fn missing_quiz_maps_to_not_found() {
    let (api, _) = serve().await;
    assert!(matches!(
        api.fetch_assessment(QuizId::new(404)).await,
        Err(ApiError::NotFound)
    ));
}

#[tokio::test]
async fn save_and_submit_send_camel_case_bodies_with_bearer() {
    let (api, seen) = serve().await;
    let answers = BTreeMap::from([(QuestionId::new(10), Answer::selections(["B"]))]);

    api.save_progress(AttemptId::new(77), &answers, 30).await.unwrap();
    let outcome = api
        .submit_attempt(AttemptId::new(77), &answers, 31, 2)
        .await
        .unwrap();
    assert_eq!(outcome.percentage, 80.0);
    assert_eq!(outcome.passed, Some(true));

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0, "save/77");
    assert_eq!(
        seen[0].2,
        json!({"answers": {"10": {"selectedOptions": ["B"]}}, "timeSpent": 30})
    );
    assert_eq!(seen[1].0, "submit/77");
    assert_eq!(seen[1].1.as_deref(), Some("Bearer test-token"));
    assert_eq!(seen[1].2["tabSwitches"], 2);
}

#[tokio::test]
async fn challenge_execute_and_submit() {
    let (api, seen) = serve().await;
    let session_id = Uuid::new_v4();

    let report = api
        .execute(ChallengeId::new(5), "fn main() {}", "rust", session_id)
        .await
        .unwrap();
    assert!(report.all_passed());

    let outcome = api
        .submit_challenge(
            ChallengeId::new(5),
            ChallengeSubmission {
                code: "fn main() {}",
                language: "rust",
                session_id,
                time_spent: 120,
                hints_used: 1,
            },
        )
        .await
        .unwrap();
    assert!(outcome.passed);
    assert!(outcome.report.is_none());

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].2["sessionId"], session_id.to_string());
    assert_eq!(
        seen[1].2,
        json!({
            "code": "fn main() {}",
            "language": "rust",
            "sessionId": session_id.to_string(),
            "timeSpent": 120,
            "hintsUsed": 1
        })
    );
}

#[tokio::test]
async fn companion_returns_trimmed_tip() {
    let (api, _) = serve().await;
    let companion = CodeCompanionService::new(Some(Arc::new(api)));
    let tip = companion
        .tip("for i in 0..v.len() {}", "rust", Some("loop over a vec"))
        .await
        .unwrap();
    assert_eq!(tip, "In rust, prefer iterators.");
}

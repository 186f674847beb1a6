//! Async driver for one `ChallengeSession`.
//!
//! Built like the attempt runtime: the clock ticks on the session's own task
//! and execute, hint and submit requests are spawned, so neither code entry
//! nor a slow backend can hold the clock back.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use educare_core::model::{ChallengeId, ExecutionReport, Hint};
use educare_core::session::{
    ChallengeError, ChallengeOutcome, ChallengeSession, ChallengeSubmitRequest, SubmissionState,
    SubmissionTicket, SubmissionTrigger, TickOutcome,
};

use crate::api::{ChallengeApi, ChallengeSubmission};
use crate::error::{ApiError, RuntimeError};

const COMMAND_BUFFER: usize = 32;

/// Learner input accepted by the challenge runtime.
#[derive(Debug)]
pub enum ChallengeCommand {
    SelectLanguage(String),
    EditCode(String),
    ResetCode,
    Run,
    Hint,
    Submit,
    Snapshot(oneshot::Sender<ChallengeSession>),
    Shutdown,
}

/// Notifications emitted by the challenge runtime, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum ChallengeEvent {
    Tick {
        elapsed: u32,
        remaining: Option<u32>,
    },
    LanguageSelected {
        language: String,
        code: String,
    },
    CodeUpdated,
    Rejected {
        reason: String,
    },
    Running,
    RunFinished(ExecutionReport),
    RunFailed {
        message: String,
    },
    HintUnlocked {
        hint: Hint,
        used: u32,
        max: u32,
    },
    HintFailed {
        message: String,
    },
    Submitting {
        trigger: SubmissionTrigger,
    },
    Submitted(ChallengeOutcome),
    SubmissionFailed {
        message: String,
    },
    Expired,
}

/// Final state returned when the loop exits.
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeReport {
    pub challenge_id: ChallengeId,
    pub session_id: Uuid,
    pub state: SubmissionState,
    pub outcome: Option<ChallengeOutcome>,
    pub time_spent: u32,
    pub hints_used: u32,
}

pub(super) fn spawn_driver(
    session: ChallengeSession,
    api: Arc<dyn ChallengeApi>,
    tick: Duration,
) -> ChallengeHandle {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let driver = Driver {
        session,
        api,
        tick,
        events: event_tx,
        submission: None,
        runs: JoinSet::new(),
        hints: JoinSet::new(),
        submits: JoinSet::new(),
    };
    let task = tokio::spawn(driver.run(command_rx));
    ChallengeHandle {
        commands: ChallengeCommands { tx: command_tx },
        events: event_rx,
        task,
    }
}

/// Cloneable sender side of a running challenge.
#[derive(Clone, Debug)]
pub struct ChallengeCommands {
    tx: mpsc::Sender<ChallengeCommand>,
}

impl ChallengeCommands {
    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the loop has exited.
    pub async fn send(&self, command: ChallengeCommand) -> Result<(), RuntimeError> {
        self.tx.send(command).await.map_err(|_| RuntimeError::Closed)
    }

    /// Replace the code for the selected language.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the loop has exited.
    pub async fn edit_code(&self, code: impl Into<String>) -> Result<(), RuntimeError> {
        self.send(ChallengeCommand::EditCode(code.into())).await
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the loop has exited.
    pub async fn select_language(&self, language: impl Into<String>) -> Result<(), RuntimeError> {
        self.send(ChallengeCommand::SelectLanguage(language.into())).await
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the loop has exited.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        self.send(ChallengeCommand::Run).await
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the loop has exited.
    pub async fn hint(&self) -> Result<(), RuntimeError> {
        self.send(ChallengeCommand::Hint).await
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the loop has exited.
    pub async fn submit(&self) -> Result<(), RuntimeError> {
        self.send(ChallengeCommand::Submit).await
    }

    /// Copy of the session as it is now.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the loop has exited.
    pub async fn snapshot(&self) -> Result<ChallengeSession, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(ChallengeCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }
}

/// Owner handle for a running challenge. The loop exits once the submission
/// is accepted or every command sender is dropped.
#[derive(Debug)]
pub struct ChallengeHandle {
    commands: ChallengeCommands,
    events: mpsc::UnboundedReceiver<ChallengeEvent>,
    task: JoinHandle<ChallengeReport>,
}

impl ChallengeHandle {
    #[must_use]
    pub fn commands(&self) -> ChallengeCommands {
        self.commands.clone()
    }

    /// Next event, or `None` once the loop has exited and all events are drained.
    pub async fn next_event(&mut self) -> Option<ChallengeEvent> {
        self.events.recv().await
    }

    /// Close this handle's sender and wait for the loop to exit.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Join` if the loop task panicked or was cancelled.
    pub async fn join(self) -> Result<ChallengeReport, RuntimeError> {
        let Self {
            commands,
            events,
            task,
        } = self;
        drop(commands);
        drop(events);
        task.await.map_err(|err| RuntimeError::Join(err.to_string()))
    }
}

struct Driver {
    session: ChallengeSession,
    api: Arc<dyn ChallengeApi>,
    tick: Duration,
    events: mpsc::UnboundedSender<ChallengeEvent>,
    submission: Option<SubmissionTicket>,
    runs: JoinSet<Result<ExecutionReport, ApiError>>,
    hints: JoinSet<Result<Hint, ApiError>>,
    submits: JoinSet<Result<ChallengeOutcome, ApiError>>,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::Receiver<ChallengeCommand>) -> ChallengeReport {
        info!(
            challenge = %self.session.challenge_id(),
            session = %self.session.session_id(),
            "challenge runtime started"
        );

        let mut ticker = time::interval_at(Instant::now() + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.session.submission_state() != SubmissionState::Submitted {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ChallengeCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                _ = ticker.tick(), if self.session.clock().is_running() => self.on_tick(),
                Some(joined) = self.runs.join_next() => self.on_run_done(joined),
                Some(joined) = self.hints.join_next() => self.on_hint_done(joined),
                Some(joined) = self.submits.join_next() => self.on_submit_done(joined),
            }
        }

        self.shutdown()
    }

    fn emit(&self, event: ChallengeEvent) {
        // The receiver may be gone while a submission is still settling.
        let _ = self.events.send(event);
    }

    fn reject(&self, err: &ChallengeError) {
        debug!(error = %err, "command rejected");
        self.emit(ChallengeEvent::Rejected {
            reason: err.to_string(),
        });
    }

    fn handle(&mut self, command: ChallengeCommand) {
        match command {
            ChallengeCommand::SelectLanguage(language) => {
                match self.session.select_language(&language) {
                    Ok(()) => self.emit(ChallengeEvent::LanguageSelected {
                        language: self.session.language().to_owned(),
                        code: self.session.code().to_owned(),
                    }),
                    Err(err) => self.reject(&err),
                }
            }
            ChallengeCommand::EditCode(code) => match self.session.edit_code(code) {
                Ok(()) => self.emit(ChallengeEvent::CodeUpdated),
                Err(err) => self.reject(&err),
            },
            ChallengeCommand::ResetCode => match self.session.reset_code() {
                Ok(()) => self.emit(ChallengeEvent::CodeUpdated),
                Err(err) => self.reject(&err),
            },
            ChallengeCommand::Run => self.dispatch_run(),
            ChallengeCommand::Hint => self.dispatch_hint(),
            ChallengeCommand::Submit => match self.session.begin_submit(SubmissionTrigger::Manual) {
                Ok(request) => self.dispatch_submit(request),
                Err(err) => self.reject(&err),
            },
            ChallengeCommand::Snapshot(reply) => {
                let _ = reply.send(self.session.clone());
            }
            ChallengeCommand::Shutdown => {}
        }
    }

    fn on_tick(&mut self) {
        let (outcome, forced) = self.session.tick();
        match outcome {
            TickOutcome::Advanced { elapsed, remaining } => {
                self.emit(ChallengeEvent::Tick { elapsed, remaining });
            }
            TickOutcome::Expired { elapsed } => {
                info!(elapsed, "challenge time limit reached");
                self.emit(ChallengeEvent::Tick {
                    elapsed,
                    remaining: Some(0),
                });
                self.emit(ChallengeEvent::Expired);
            }
            TickOutcome::Idle => {}
        }
        if let Some(request) = forced {
            self.dispatch_submit(request);
        }
    }

    fn dispatch_run(&mut self) {
        let request = match self.session.begin_run() {
            Ok(request) => request,
            Err(err) => return self.reject(&err),
        };
        self.emit(ChallengeEvent::Running);
        let api = Arc::clone(&self.api);
        let id = self.session.challenge_id();
        self.runs.spawn(async move {
            api.execute(id, &request.code, &request.language, request.session_id)
                .await
        });
    }

    fn on_run_done(&mut self, joined: Result<Result<ExecutionReport, ApiError>, JoinError>) {
        match flatten(joined) {
            Ok(report) => {
                info!(
                    passed = report.passed_count,
                    total = report.total_count,
                    "code executed"
                );
                self.session.finish_run(Some(report.clone()));
                self.emit(ChallengeEvent::RunFinished(report));
            }
            Err(message) => {
                warn!(%message, "code execution failed");
                self.session.finish_run(None);
                self.emit(ChallengeEvent::RunFailed { message });
            }
        }
    }

    fn dispatch_hint(&mut self) {
        let request = match self.session.begin_hint() {
            Ok(request) => request,
            Err(err) => return self.reject(&err),
        };
        let api = Arc::clone(&self.api);
        let id = self.session.challenge_id();
        self.hints.spawn(async move {
            api.request_hint(id, request.session_id, request.hints_used)
                .await
        });
    }

    fn on_hint_done(&mut self, joined: Result<Result<Hint, ApiError>, JoinError>) {
        match flatten(joined) {
            Ok(hint) => {
                info!(penalty = hint.penalty_points, "hint unlocked");
                self.session.finish_hint(Some(hint.clone()));
                let ledger = self.session.hints();
                self.emit(ChallengeEvent::HintUnlocked {
                    hint,
                    used: ledger.used(),
                    max: ledger.max(),
                });
            }
            Err(message) => {
                self.session.finish_hint(None);
                self.emit(ChallengeEvent::HintFailed { message });
            }
        }
    }

    fn dispatch_submit(&mut self, request: ChallengeSubmitRequest) {
        let ChallengeSubmitRequest {
            ticket,
            code,
            language,
            session_id,
            time_spent,
            hints_used,
        } = request;
        let trigger = ticket.trigger();
        info!(?trigger, time_spent, hints_used, "submitting challenge");
        self.submission = Some(ticket);
        self.emit(ChallengeEvent::Submitting { trigger });

        let api = Arc::clone(&self.api);
        let id = self.session.challenge_id();
        self.submits.spawn(async move {
            let submission = ChallengeSubmission {
                code: &code,
                language: &language,
                session_id,
                time_spent,
                hints_used,
            };
            api.submit_challenge(id, submission).await
        });
    }

    fn on_submit_done(&mut self, joined: Result<Result<ChallengeOutcome, ApiError>, JoinError>) {
        let result = flatten(joined);
        let Some(ticket) = self.submission.take() else {
            return;
        };
        match self.session.finish_submit(ticket, result.clone()) {
            Ok(SubmissionState::Submitted) => {
                if let Ok(outcome) = result {
                    info!(score = outcome.score, passed = outcome.passed, "challenge submitted");
                    self.emit(ChallengeEvent::Submitted(outcome));
                }
            }
            Ok(_) => {
                let message = result.err().unwrap_or_default();
                warn!(%message, "challenge submission failed");
                self.emit(ChallengeEvent::SubmissionFailed { message });
            }
            Err(err) => warn!(error = %err, "submission result ignored"),
        }
    }

    fn shutdown(mut self) -> ChallengeReport {
        self.runs.abort_all();
        self.hints.abort_all();
        self.submits.abort_all();

        let report = ChallengeReport {
            challenge_id: self.session.challenge_id(),
            session_id: self.session.session_id(),
            state: self.session.submission_state(),
            outcome: self.session.outcome().cloned(),
            time_spent: self.session.clock().elapsed(),
            hints_used: self.session.hints().used(),
        };
        info!(challenge = %report.challenge_id, state = ?report.state, "challenge runtime stopped");
        report
    }
}

fn flatten<T>(joined: Result<Result<T, ApiError>, JoinError>) -> Result<T, String> {
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_string()),
        Err(err) => Err(err.to_string()),
    }
}

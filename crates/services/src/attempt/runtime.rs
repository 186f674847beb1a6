//! Async driver for one `AttemptSession`.
//!
//! The session lives on a single task. Learner input arrives over a command
//! channel, the clock ticks on an interval, and network calls run as spawned
//! tasks whose results are fed back into the same loop. Nothing else touches
//! the session, so no locking is needed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use educare_core::Clock;
use educare_core::model::{Answer, AttemptId, QuestionId};
use educare_core::session::{
    AttemptSession, AttemptView, AutosaveRequest, AutosaveTicket, IntegrityWarning, SessionError,
    SubmissionState, SubmissionTicket, SubmissionTrigger, SubmitOutcome, SubmitRequest,
    TickOutcome, Visibility, WarningId,
};
use storage::repository::{AttemptDraft, DraftRepository};

use crate::api::AssessmentApi;
use crate::config::ServiceConfig;
use crate::error::{ApiError, RuntimeError};

const COMMAND_BUFFER: usize = 64;

/// Timing knobs for the runtime loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Wall time per clock unit.
    pub tick: Duration,
    /// How long an integrity warning stays visible.
    pub warning_ttl: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            warning_ttl: Duration::from_secs(3),
        }
    }
}

impl From<&ServiceConfig> for RuntimeConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            tick: config.tick,
            warning_ttl: config.warning_ttl,
        }
    }
}

/// Learner input accepted by the runtime.
#[derive(Debug)]
pub enum AttemptCommand {
    Answer {
        question_id: QuestionId,
        patch: Answer,
    },
    ToggleFlag(QuestionId),
    Next,
    Previous,
    Select(usize),
    Visibility(Visibility),
    SaveNow,
    Submit,
    Snapshot(oneshot::Sender<AttemptView>),
    Shutdown,
}

/// Notifications emitted by the runtime, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptEvent {
    Tick {
        elapsed: u32,
        remaining: Option<u32>,
    },
    AnswerRecorded {
        question_id: QuestionId,
    },
    FlagToggled {
        question_id: QuestionId,
        flagged: bool,
    },
    Moved {
        index: usize,
    },
    Rejected {
        reason: String,
    },
    AutosaveStarted {
        time_spent: u32,
    },
    AutosaveFinished {
        ok: bool,
    },
    WarningRaised(IntegrityWarning),
    WarningCleared(WarningId),
    Submitting {
        trigger: SubmissionTrigger,
    },
    Submitted(SubmitOutcome),
    SubmissionFailed {
        message: String,
    },
    Expired,
}

/// Final state returned when the loop exits.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptReport {
    pub attempt_id: AttemptId,
    pub state: SubmissionState,
    pub outcome: Option<SubmitOutcome>,
    pub time_spent: u32,
    pub tab_switches: u32,
    pub answered: usize,
}

/// Spawns attempt loops wired to the backend and the local draft store.
#[derive(Clone)]
pub struct AttemptRuntime {
    api: Arc<dyn AssessmentApi>,
    drafts: Arc<dyn DraftRepository>,
    clock: Clock,
    config: RuntimeConfig,
}

impl AttemptRuntime {
    #[must_use]
    pub fn new(api: Arc<dyn AssessmentApi>, drafts: Arc<dyn DraftRepository>) -> Self {
        Self {
            api,
            drafts,
            clock: Clock::default(),
            config: RuntimeConfig::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Start driving `session` on a new task. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn spawn(&self, session: AttemptSession) -> AttemptHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let driver = Driver {
            session,
            api: Arc::clone(&self.api),
            drafts: Arc::clone(&self.drafts),
            clock: self.clock,
            config: self.config,
            events: event_tx,
            autosave: None,
            submission: None,
            saves: JoinSet::new(),
            submits: JoinSet::new(),
            warnings: JoinSet::new(),
        };
        let task = tokio::spawn(driver.run(command_rx));
        AttemptHandle {
            commands: AttemptCommands { tx: command_tx },
            events: event_rx,
            task,
        }
    }
}

/// Cloneable sender side of a running attempt.
#[derive(Clone, Debug)]
pub struct AttemptCommands {
    tx: mpsc::Sender<AttemptCommand>,
}

impl AttemptCommands {
    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the loop has exited.
    pub async fn send(&self, command: AttemptCommand) -> Result<(), RuntimeError> {
        self.tx.send(command).await.map_err(|_| RuntimeError::Closed)
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the loop has exited.
    pub async fn answer(&self, question_id: QuestionId, patch: Answer) -> Result<(), RuntimeError> {
        self.send(AttemptCommand::Answer { question_id, patch }).await
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the loop has exited.
    pub async fn toggle_flag(&self, question_id: QuestionId) -> Result<(), RuntimeError> {
        self.send(AttemptCommand::ToggleFlag(question_id)).await
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the loop has exited.
    pub async fn visibility(&self, visibility: Visibility) -> Result<(), RuntimeError> {
        self.send(AttemptCommand::Visibility(visibility)).await
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the loop has exited.
    pub async fn submit(&self) -> Result<(), RuntimeError> {
        self.send(AttemptCommand::Submit).await
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the loop has exited.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.send(AttemptCommand::Shutdown).await
    }

    /// Current view of the session.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the loop has exited.
    pub async fn snapshot(&self) -> Result<AttemptView, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(AttemptCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }
}

/// Owner handle for a running attempt.
///
/// Dropping every command sender stops the loop; pending requests and timers
/// are aborted and the draft is written one last time.
#[derive(Debug)]
pub struct AttemptHandle {
    commands: AttemptCommands,
    events: mpsc::UnboundedReceiver<AttemptEvent>,
    task: JoinHandle<AttemptReport>,
}

impl AttemptHandle {
    #[must_use]
    pub fn commands(&self) -> AttemptCommands {
        self.commands.clone()
    }

    /// Next event, or `None` once the loop has exited and all events are drained.
    pub async fn next_event(&mut self) -> Option<AttemptEvent> {
        self.events.recv().await
    }

    /// Close this handle's sender and wait for the loop to exit.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Join` if the loop task panicked or was cancelled.
    pub async fn join(self) -> Result<AttemptReport, RuntimeError> {
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
    session: AttemptSession,
    api: Arc<dyn AssessmentApi>,
    drafts: Arc<dyn DraftRepository>,
    clock: Clock,
    config: RuntimeConfig,
    events: mpsc::UnboundedSender<AttemptEvent>,
    autosave: Option<AutosaveTicket>,
    submission: Option<SubmissionTicket>,
    saves: JoinSet<Result<(), ApiError>>,
    submits: JoinSet<Result<SubmitOutcome, ApiError>>,
    warnings: JoinSet<WarningId>,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::Receiver<AttemptCommand>) -> AttemptReport {
        info!(attempt = %self.session.attempt_id(), "attempt runtime started");

        let period = self.config.tick;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if let Some(request) = self.session.start() {
            info!("attempt resumed with no time left");
            self.emit(AttemptEvent::Expired);
            self.dispatch_submit(request);
        }

        while !self.session.is_finished() {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle(command) {
                            break;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick(), if self.session.clock().is_running() => self.on_tick(),
                Some(joined) = self.saves.join_next() => self.on_autosave_done(joined).await,
                Some(joined) = self.submits.join_next() => self.on_submit_done(joined).await,
                Some(joined) = self.warnings.join_next() => {
                    if let Ok(id) = joined {
                        self.on_warning_elapsed(id);
                    }
                }
            }
        }

        self.shutdown().await
    }

    fn emit(&self, event: AttemptEvent) {
        // The receiver may be gone; the loop keeps running for its draft writes.
        let _ = self.events.send(event);
    }

    fn reject(&self, err: &SessionError) {
        debug!(error = %err, "command rejected");
        self.emit(AttemptEvent::Rejected {
            reason: err.to_string(),
        });
    }

    /// Returns `false` when the loop should stop.
    fn handle(&mut self, command: AttemptCommand) -> bool {
        match command {
            AttemptCommand::Answer { question_id, patch } => {
                match self.session.record_answer(question_id, patch) {
                    Ok(_) => self.emit(AttemptEvent::AnswerRecorded { question_id }),
                    Err(err) => self.reject(&err),
                }
            }
            AttemptCommand::ToggleFlag(question_id) => match self.session.toggle_flag(question_id)
            {
                Ok(flagged) => self.emit(AttemptEvent::FlagToggled {
                    question_id,
                    flagged,
                }),
                Err(err) => self.reject(&err),
            },
            AttemptCommand::Next => {
                let index = self.session.next();
                self.emit(AttemptEvent::Moved { index });
            }
            AttemptCommand::Previous => {
                let index = self.session.previous();
                self.emit(AttemptEvent::Moved { index });
            }
            AttemptCommand::Select(index) => match self.session.select(index) {
                Ok(index) => self.emit(AttemptEvent::Moved { index }),
                Err(err) => self.reject(&err),
            },
            AttemptCommand::Visibility(visibility) => self.on_visibility(visibility),
            AttemptCommand::SaveNow => match self.session.begin_autosave() {
                Some(request) => self.dispatch_autosave(request),
                None => debug!("manual save skipped"),
            },
            AttemptCommand::Submit => match self.session.begin_submit(SubmissionTrigger::Manual) {
                Ok(request) => self.dispatch_submit(request),
                Err(err) => self.reject(&err),
            },
            AttemptCommand::Snapshot(reply) => {
                let _ = reply.send(self.session.view());
            }
            AttemptCommand::Shutdown => return false,
        }
        true
    }

    fn on_tick(&mut self) {
        let effects = self.session.tick();
        match effects.outcome {
            TickOutcome::Advanced { elapsed, remaining } => {
                debug!(elapsed, ?remaining, "tick");
                self.emit(AttemptEvent::Tick { elapsed, remaining });
            }
            TickOutcome::Expired { elapsed } => {
                info!(elapsed, "time limit reached");
                self.emit(AttemptEvent::Tick {
                    elapsed,
                    remaining: Some(0),
                });
                self.emit(AttemptEvent::Expired);
            }
            TickOutcome::Idle => {}
        }
        if let Some(request) = effects.autosave {
            self.dispatch_autosave(request);
        }
        if let Some(request) = effects.submit {
            self.dispatch_submit(request);
        }
    }

    fn on_visibility(&mut self, visibility: Visibility) {
        let Some(warning) = self.session.visibility_changed(visibility) else {
            return;
        };
        warn!(occurrence = warning.occurrence, "learner left the attempt window");
        let id = warning.id;
        let ttl = self.config.warning_ttl;
        self.emit(AttemptEvent::WarningRaised(warning));
        self.warnings.spawn(async move {
            time::sleep(ttl).await;
            id
        });
    }

    fn on_warning_elapsed(&mut self, id: WarningId) {
        if self.session.dismiss_warning(id) {
            self.emit(AttemptEvent::WarningCleared(id));
        }
    }

    fn dispatch_autosave(&mut self, request: AutosaveRequest) {
        let AutosaveRequest {
            ticket,
            answers,
            time_spent,
        } = request;
        self.autosave = Some(ticket);
        debug!(time_spent, answers = answers.len(), "autosave started");
        self.emit(AttemptEvent::AutosaveStarted { time_spent });

        let api = Arc::clone(&self.api);
        let attempt_id = self.session.attempt_id();
        self.saves.spawn(async move {
            api.save_progress(attempt_id, &answers, time_spent).await
        });
    }

    async fn on_autosave_done(&mut self, joined: Result<Result<(), ApiError>, JoinError>) {
        let ok = match joined {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(error = %err, "autosave failed");
                false
            }
            Err(err) => {
                warn!(error = %err, "autosave task did not finish");
                false
            }
        };
        if let Some(ticket) = self.autosave.take() {
            self.session.finish_autosave(ticket, ok);
        }
        self.emit(AttemptEvent::AutosaveFinished { ok });
        self.write_draft().await;
    }

    fn dispatch_submit(&mut self, request: SubmitRequest) {
        let SubmitRequest {
            ticket,
            answers,
            time_spent,
            tab_switches,
        } = request;
        let trigger = ticket.trigger();
        self.submission = Some(ticket);
        info!(?trigger, time_spent, tab_switches, "submitting attempt");
        self.emit(AttemptEvent::Submitting { trigger });

        let api = Arc::clone(&self.api);
        let attempt_id = self.session.attempt_id();
        self.submits.spawn(async move {
            api.submit_attempt(attempt_id, &answers, time_spent, tab_switches)
                .await
        });
    }

    async fn on_submit_done(&mut self, joined: Result<Result<SubmitOutcome, ApiError>, JoinError>) {
        let result = match joined {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(err)) => Err(err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        let Some(ticket) = self.submission.take() else {
            return;
        };
        let active: Vec<WarningId> = self.session.view().warnings.iter().map(|w| w.id).collect();

        match self.session.finish_submit(ticket, result.clone()) {
            Ok(SubmissionState::Submitted) => {
                if let Ok(outcome) = result {
                    info!(
                        percentage = outcome.percentage,
                        passed = ?outcome.passed,
                        "attempt submitted"
                    );
                    for id in active {
                        self.emit(AttemptEvent::WarningCleared(id));
                    }
                    self.emit(AttemptEvent::Submitted(outcome));
                }
                if let Err(err) = self.drafts.delete_draft(self.session.attempt_id()).await {
                    warn!(error = %err, "could not remove local draft");
                }
            }
            Ok(_) => {
                let message = result.err().unwrap_or_default();
                warn!(%message, "submission failed");
                self.write_draft().await;
                self.emit(AttemptEvent::SubmissionFailed { message });
            }
            Err(err) => warn!(error = %err, "submission result ignored"),
        }
    }

    async fn write_draft(&self) {
        let session = &self.session;
        let draft = AttemptDraft {
            attempt_id: session.attempt_id(),
            quiz_id: session.assessment().id(),
            answers: session.answers().snapshot(),
            flags: session.flags().iter().collect(),
            time_spent: session.clock().elapsed(),
            tab_switches: session.tab_switches(),
            saved_at: self.clock.now(),
        };
        if let Err(err) = self.drafts.save_draft(&draft).await {
            warn!(error = %err, "could not write local draft");
        }
    }

    async fn shutdown(mut self) -> AttemptReport {
        self.saves.abort_all();
        self.submits.abort_all();
        self.warnings.abort_all();
        if !self.session.is_finished() {
            self.write_draft().await;
        }

        let report = AttemptReport {
            attempt_id: self.session.attempt_id(),
            state: self.session.submission_state(),
            outcome: self.session.outcome(),
            time_spent: self.session.clock().elapsed(),
            tab_switches: self.session.tab_switches(),
            answered: self.session.answers().len(),
        };
        info!(attempt = %report.attempt_id, state = ?report.state, "attempt runtime stopped");
        report
    }
}

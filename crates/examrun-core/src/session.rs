//! The exam session actor.
//!
//! One task owns the state machine, the answer store and the countdown.
//! Everything that can change them arrives as a message: user intents on a
//! bounded channel, and ticks, save results, login results and review
//! results on an internal channel. After each message the actor publishes a
//! fresh [`SessionView`] through a `watch` channel.
//!
//! Closing the handle (or dropping it) ends the task. Work still in flight
//! at that point finishes on its own and its result is dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::answers::Answers;
use crate::error::{ReviewError, SessionClosed, ValidationError};
use crate::gate::{PersistOutcome, PersistenceGate};
use crate::machine::{Command, Event, Notice, SessionState, SubmissionMachine, SubmitTrigger};
use crate::model::{ExamDefinition, OptionIndex, QuestionNumber};
use crate::review::{ReviewLoader, ReviewedSession};
use crate::scoring::CorrectAnswers;
use crate::timer::{spawn_ticker, CountdownTimer, TickOutcome, TickerHandle};
use crate::traits::LoginOutcome;

const INTENT_BUFFER: usize = 32;

/// Per-session knobs.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Seconds allowed, replacing the level/skill lookup. Zero or negative
    /// runs the attempt untimed.
    pub duration_override: Option<i64>,
    /// Interval between countdown ticks. One second outside of tests.
    pub tick_period: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            duration_override: None,
            tick_period: Duration::from_secs(1),
        }
    }
}

/// What the user can ask of a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SelectAnswer {
        question: QuestionNumber,
        option: OptionIndex,
    },
    Submit,
    ScrollToQuestion(QuestionNumber),
    /// Give up on saving the submitted result.
    Decline,
    /// Try a failed save again.
    Retry,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Waiting for a stored attempt to arrive.
    Loading,
    Attempt,
    /// Read-only replay of a stored attempt.
    Review,
}

/// Read-only projection of a session for presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub exam_id: String,
    pub mode: ViewMode,
    pub state: SessionState,
    pub remaining_seconds: u32,
    pub clock: String,
    pub warning: bool,
    pub untimed: bool,
    pub answers: Answers,
    /// Revealed once the attempt is submitted or under review.
    pub correct_answers: Option<CorrectAnswers>,
    pub is_submitted: bool,
    pub score: Option<usize>,
    pub total_questions: usize,
    pub focused_question: Option<QuestionNumber>,
    /// Id of the stored attempt once saved, or the one under review.
    pub session_id: Option<String>,
    pub notices: Vec<Notice>,
}

/// Client side of a running session.
#[derive(Debug)]
pub struct SessionHandle {
    intents: mpsc::Sender<Intent>,
    view: watch::Receiver<SessionView>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub async fn send(&self, intent: Intent) -> Result<(), SessionClosed> {
        self.intents.send(intent).await.map_err(|_| SessionClosed)
    }

    /// The latest published view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Wait until the view satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<SessionView, SessionClosed>
    where
        F: FnMut(&SessionView) -> bool,
    {
        let mut rx = self.view.clone();
        let view = rx
            .wait_for(|view| predicate(view))
            .await
            .map_err(|_| SessionClosed)?;
        Ok((*view).clone())
    }

    /// Stop the session and wait for its task to end.
    pub async fn close(self) {
        let _ = self.intents.send(Intent::Close).await;
        if let Err(e) = self.task.await {
            warn!("session task ended abnormally: {e}");
        }
    }
}

/// Messages the actor sends itself.
#[derive(Debug)]
enum Internal {
    Tick { generation: u64 },
    Persisted(PersistOutcome),
    Login(LoginOutcome),
    Reviewed(Result<ReviewedSession, ReviewError>),
}

/// Entry points for starting a session task.
pub struct ExamSession;

impl ExamSession {
    /// Start a timed attempt at `exam`. Must be called inside a tokio
    /// runtime.
    pub fn start(
        exam: &ExamDefinition,
        gate: Arc<PersistenceGate>,
        options: SessionOptions,
    ) -> Result<SessionHandle, ValidationError> {
        let (actor, internal_rx, view_rx) = SessionActor::new(exam, gate, &options)?;
        Ok(actor.spawn(internal_rx, view_rx, |actor| actor.begin_attempt()))
    }

    /// Open the stored attempt `session_id` for review against `exam`.
    ///
    /// If it cannot be shown, the session falls back to a fresh attempt and
    /// the reason is reported as a notice.
    pub fn start_review(
        exam: &ExamDefinition,
        session_id: &str,
        gate: Arc<PersistenceGate>,
        options: SessionOptions,
    ) -> Result<SessionHandle, ValidationError> {
        let (actor, internal_rx, view_rx) = SessionActor::new(exam, gate, &options)?;
        let session_id = session_id.to_string();
        Ok(actor.spawn(internal_rx, view_rx, move |actor| {
            actor.begin_review(session_id)
        }))
    }
}

struct SessionActor {
    machine: SubmissionMachine,
    timer: CountdownTimer,
    ticker: Option<TickerHandle>,
    tick_period: Duration,
    gate: Arc<PersistenceGate>,
    mode: ViewMode,
    focused: Option<QuestionNumber>,
    reviewed: Option<ReviewedSession>,
    review_id: Option<String>,
    notices: Vec<Notice>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    view_tx: watch::Sender<SessionView>,
}

impl SessionActor {
    fn new(
        exam: &ExamDefinition,
        gate: Arc<PersistenceGate>,
        options: &SessionOptions,
    ) -> Result<
        (
            Self,
            mpsc::UnboundedReceiver<Internal>,
            watch::Receiver<SessionView>,
        ),
        ValidationError,
    > {
        let duration = options
            .duration_override
            .unwrap_or_else(|| i64::from(exam.initial_duration()));
        let initial_duration = duration.clamp(0, i64::from(u32::MAX)) as u32;
        let machine = SubmissionMachine::new(exam, initial_duration)?;

        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let timer = CountdownTimer::new(duration);
        let placeholder = SessionView {
            exam_id: exam.id.clone(),
            mode: ViewMode::Loading,
            state: SessionState::Draft,
            remaining_seconds: timer.remaining(),
            clock: timer.clock(),
            warning: false,
            untimed: timer.is_untimed(),
            answers: Answers::new(),
            correct_answers: None,
            is_submitted: false,
            score: None,
            total_questions: machine.total_questions(),
            focused_question: None,
            session_id: None,
            notices: Vec::new(),
        };
        let (view_tx, view_rx) = watch::channel(placeholder);

        let actor = Self {
            machine,
            timer,
            ticker: None,
            tick_period: options.tick_period,
            gate,
            mode: ViewMode::Loading,
            focused: None,
            reviewed: None,
            review_id: None,
            notices: Vec::new(),
            internal_tx,
            view_tx,
        };
        Ok((actor, internal_rx, view_rx))
    }

    fn spawn<F>(
        mut self,
        internal_rx: mpsc::UnboundedReceiver<Internal>,
        view_rx: watch::Receiver<SessionView>,
        init: F,
    ) -> SessionHandle
    where
        F: FnOnce(&mut Self) + Send + 'static,
    {
        let (intents, intent_rx) = mpsc::channel(INTENT_BUFFER);
        let task = tokio::spawn(async move {
            init(&mut self);
            self.publish();
            self.run(intent_rx, internal_rx).await;
        });
        SessionHandle {
            intents,
            view: view_rx,
            task,
        }
    }

    async fn run(
        mut self,
        mut intents: mpsc::Receiver<Intent>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(Intent::Close) | None => break,
                    Some(intent) => self.on_intent(intent),
                },
                Some(message) = internal.recv() => self.on_internal(message),
            }
            self.publish();
        }
        self.ticker = None;
        debug!(exam_id = %self.machine.exam_id(), state = %self.machine.state(), "session closed");
    }

    fn begin_attempt(&mut self) {
        self.mode = ViewMode::Attempt;
        self.start_timer();
        info!(
            exam_id = %self.machine.exam_id(),
            duration = self.timer.remaining(),
            untimed = self.timer.is_untimed(),
            "attempt started"
        );
    }

    fn begin_review(&mut self, session_id: String) {
        self.mode = ViewMode::Loading;
        let loader = ReviewLoader::new(Arc::clone(&self.gate));
        let exam_id = self.machine.exam_id().to_string();
        let tx = self.internal_tx.clone();
        self.review_id = Some(session_id.clone());
        tokio::spawn(async move {
            let loaded = loader.load(&session_id, &exam_id).await;
            let _ = tx.send(Internal::Reviewed(loaded));
        });
    }

    fn start_timer(&mut self) {
        let Some(generation) = self.timer.start() else {
            return;
        };
        let tx = self.internal_tx.clone();
        self.ticker = Some(spawn_ticker(self.tick_period, move || {
            tx.send(Internal::Tick { generation }).is_ok()
        }));
    }

    fn on_intent(&mut self, intent: Intent) {
        match intent {
            Intent::SelectAnswer { question, option } if self.mode == ViewMode::Attempt => {
                self.machine.record_answer(question, option);
            }
            Intent::Submit if self.mode == ViewMode::Attempt => {
                self.submit(SubmitTrigger::Manual);
            }
            Intent::ScrollToQuestion(question) => {
                if self.machine.correct_answers().get(question).is_some() {
                    self.focused = Some(question);
                } else {
                    debug!(question, "no such question");
                }
            }
            Intent::Decline => self.dispatch(Event::Decline),
            Intent::Retry => {
                let identity_available = self.gate.has_identity();
                self.dispatch(Event::Retry { identity_available });
            }
            other => debug!(?other, mode = ?self.mode, "intent ignored"),
        }
    }

    fn on_internal(&mut self, message: Internal) {
        match message {
            Internal::Tick { generation } => match self.timer.tick(generation) {
                TickOutcome::Expired => {
                    self.ticker = None;
                    self.submit(SubmitTrigger::Timeout);
                }
                TickOutcome::Running(_) | TickOutcome::Stale => {}
            },
            Internal::Persisted(outcome) => {
                let event = match outcome {
                    PersistOutcome::Persisted(stored) => Event::PersistSucceeded(stored),
                    PersistOutcome::NeedsIdentity => Event::IdentityMissing,
                    PersistOutcome::Rejected => Event::PersistRejected,
                    PersistOutcome::Failed(e) => Event::PersistFailed(e.to_string()),
                };
                self.dispatch(event);
            }
            Internal::Login(LoginOutcome::Authenticated(identity)) => {
                debug!(user_id = %identity.user_id, "login completed");
                self.dispatch(Event::IdentityObtained);
            }
            Internal::Login(LoginOutcome::Cancelled) => self.dispatch(Event::LoginCancelled),
            Internal::Reviewed(Ok(reviewed)) => {
                self.mode = ViewMode::Review;
                self.timer.force_stop();
                self.reviewed = Some(reviewed);
            }
            Internal::Reviewed(Err(e)) => {
                warn!("review unavailable: {e}");
                let notice = match e {
                    ReviewError::AuthRequired => Notice::LoginRequired,
                    ReviewError::NotFound(id) => Notice::ReviewNotFound(id),
                    ReviewError::ExamMismatch { expected, found } => {
                        Notice::ReviewMismatch { expected, found }
                    }
                    ReviewError::Network(msg) => Notice::ReviewFailed(msg),
                };
                self.notices.push(notice);
                self.review_id = None;
                self.begin_attempt();
            }
        }
    }

    fn submit(&mut self, trigger: SubmitTrigger) {
        let identity_available = self.gate.has_identity();
        self.dispatch(Event::Submit {
            trigger,
            identity_available,
            at: Utc::now(),
        });
    }

    fn dispatch(&mut self, event: Event) {
        for command in self.machine.dispatch(event) {
            self.execute(command);
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::StopTimer => {
                self.timer.force_stop();
                self.ticker = None;
            }
            Command::Persist(result) => {
                let gate = Arc::clone(&self.gate);
                let tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    let outcome = gate.attempt_persist(&result).await;
                    let _ = tx.send(Internal::Persisted(outcome));
                });
            }
            Command::RequestLogin => {
                let gate = Arc::clone(&self.gate);
                let tx = self.internal_tx.clone();
                tokio::spawn(async move {
                    let outcome = gate.request_login().await;
                    let _ = tx.send(Internal::Login(outcome));
                });
            }
            Command::Notify(notice) => {
                if notice.is_error() {
                    warn!("{notice}");
                } else {
                    info!("{notice}");
                }
                self.notices.push(notice);
            }
        }
    }

    fn publish(&self) {
        let view = match &self.reviewed {
            Some(reviewed) => SessionView {
                exam_id: self.machine.exam_id().to_string(),
                mode: self.mode,
                state: self.machine.state(),
                remaining_seconds: 0,
                clock: self.timer.clock(),
                warning: false,
                untimed: self.timer.is_untimed(),
                answers: reviewed.answers.clone(),
                correct_answers: Some(self.machine.correct_answers().clone()),
                is_submitted: true,
                score: Some(reviewed.score),
                total_questions: reviewed.total_questions,
                focused_question: self.focused,
                session_id: self.review_id.clone(),
                notices: self.notices.clone(),
            },
            None => {
                let submitted = self.machine.state().is_submitted();
                SessionView {
                    exam_id: self.machine.exam_id().to_string(),
                    mode: self.mode,
                    state: self.machine.state(),
                    remaining_seconds: self.timer.remaining(),
                    clock: self.timer.clock(),
                    warning: self.timer.is_warning(),
                    untimed: self.timer.is_untimed(),
                    answers: self.machine.answers().clone(),
                    correct_answers: submitted.then(|| self.machine.correct_answers().clone()),
                    is_submitted: submitted,
                    score: self.machine.score(),
                    total_questions: self.machine.total_questions(),
                    focused_question: self.focused,
                    session_id: self.machine.stored().map(|s| s.id.clone()),
                    notices: self.notices.clone(),
                }
            }
        };
        self.view_tx.send_replace(view);
    }
}

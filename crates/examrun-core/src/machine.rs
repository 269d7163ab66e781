//! Submission state machine.
//!
//! The machine is pure: [`SubmissionMachine::dispatch`] applies one event
//! and returns the commands the caller must carry out (stop the clock,
//! start a save, ask for a login, show a notice). It never performs I/O and
//! never talks to the authenticator; the session actor feeds it whether an
//! identity was available at the moment an event was raised.
//!
//! ```text
//! Draft ──submit──▶ Submitted ──identity──▶ Persisting ──ok──▶ Persisted
//!                       │                    ▲    │
//!                       └──no identity──▶ AwaitingIdentity ──decline──▶ Declined
//!                                            ▲    │
//!                                   401/403 ─┘    └─ other failure ─▶ PersistFailed
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::answers::{AnswerStore, Answers};
use crate::error::ValidationError;
use crate::model::{ExamDefinition, ExamMeta, OptionIndex, QuestionNumber};
use crate::result::{SessionResult, StoredSession};
use crate::scoring::{score, CorrectAnswers};

/// Lifecycle of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Draft,
    Submitted,
    AwaitingIdentity,
    Persisting,
    Persisted,
    Declined,
    PersistFailed,
}

impl SessionState {
    /// `Persisted` and `Declined` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Persisted | SessionState::Declined)
    }

    /// Every state after `Draft` has frozen answers and a score.
    pub fn is_submitted(self) -> bool {
        self != SessionState::Draft
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Draft => "draft",
            SessionState::Submitted => "submitted",
            SessionState::AwaitingIdentity => "awaiting-identity",
            SessionState::Persisting => "persisting",
            SessionState::Persisted => "persisted",
            SessionState::Declined => "declined",
            SessionState::PersistFailed => "persist-failed",
        };
        write!(f, "{name}")
    }
}

/// What caused the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    Timeout,
}

/// Inputs to the machine.
#[derive(Debug, Clone)]
pub enum Event {
    Submit {
        trigger: SubmitTrigger,
        identity_available: bool,
        at: DateTime<Utc>,
    },
    /// The interactive login produced an identity.
    IdentityObtained,
    /// The interactive login was dismissed.
    LoginCancelled,
    /// The user chose not to save the result.
    Decline,
    /// A save was about to start but no identity was present.
    IdentityMissing,
    PersistSucceeded(StoredSession),
    /// The backend answered 401/403; the identity has been discarded.
    PersistRejected,
    /// Any other save failure.
    PersistFailed(String),
    /// The user asked to try the save again after a failure.
    Retry { identity_available: bool },
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StopTimer,
    Persist(Arc<SessionResult>),
    RequestLogin,
    Notify(Notice),
}

/// A message the user must see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    TimeUp,
    LoginRequired,
    SessionExpired,
    NotSaved,
    Saved { session_id: String },
    SaveFailed(String),
    ReviewNotFound(String),
    ReviewMismatch { expected: String, found: String },
    ReviewFailed(String),
}

impl Notice {
    /// Notices reporting a failure, as opposed to plain information.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notice::SessionExpired
                | Notice::SaveFailed(_)
                | Notice::ReviewNotFound(_)
                | Notice::ReviewMismatch { .. }
                | Notice::ReviewFailed(_)
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::TimeUp => write!(f, "Time is up! Your answers were submitted."),
            Notice::LoginRequired => write!(f, "Log in to save your result."),
            Notice::SessionExpired => {
                write!(f, "Your login is invalid or has expired. Please log in again.")
            }
            Notice::NotSaved => write!(f, "Your result will not be saved."),
            Notice::Saved { session_id } => write!(f, "Result saved (session {session_id})."),
            Notice::SaveFailed(msg) => write!(f, "Failed to save your result: {msg}. Retry?"),
            Notice::ReviewNotFound(id) => write!(f, "Stored attempt {id} was not found."),
            Notice::ReviewMismatch { expected, found } => write!(
                f,
                "This attempt belongs to exam {found}, not to the current exam {expected}."
            ),
            Notice::ReviewFailed(msg) => write!(f, "Failed to load the stored attempt: {msg}"),
        }
    }
}

/// Drives one attempt from `Draft` to a terminal save outcome.
#[derive(Debug)]
pub struct SubmissionMachine {
    exam_id: String,
    meta: ExamMeta,
    total_questions: usize,
    initial_duration: u32,
    correct: CorrectAnswers,
    answers: AnswerStore,
    state: SessionState,
    result: Option<Arc<SessionResult>>,
    pending: Option<Arc<SessionResult>>,
    stored: Option<StoredSession>,
    last_error: Option<String>,
    history: Vec<SessionState>,
}

impl SubmissionMachine {
    /// Validate the exam and open a `Draft` attempt.
    pub fn new(exam: &ExamDefinition, initial_duration: u32) -> Result<Self, ValidationError> {
        let correct = CorrectAnswers::from_exam(exam)?;
        Ok(Self {
            exam_id: exam.id.clone(),
            meta: exam.meta(),
            total_questions: exam.question_count(),
            initial_duration,
            correct,
            answers: AnswerStore::new(),
            state: SessionState::Draft,
            result: None,
            pending: None,
            stored: None,
            last_error: None,
            history: vec![SessionState::Draft],
        })
    }

    /// Select an option. Ignored unless the attempt is still a draft.
    pub fn record_answer(&mut self, question: QuestionNumber, option: OptionIndex) -> bool {
        if self.state != SessionState::Draft {
            debug!(question, option, state = %self.state, "answer ignored after submission");
            return false;
        }
        self.answers.record(question, option)
    }

    /// Apply one event and return the commands it triggers.
    pub fn dispatch(&mut self, event: Event) -> Vec<Command> {
        use SessionState::*;

        match (self.state, event) {
            (
                Draft,
                Event::Submit {
                    trigger,
                    identity_available,
                    at,
                },
            ) => {
                let result = Arc::new(self.submit(at));
                info!(
                    exam_id = %self.exam_id,
                    score = result.score,
                    total = result.total_questions,
                    ?trigger,
                    "attempt submitted"
                );
                self.result = Some(Arc::clone(&result));
                self.pending = Some(Arc::clone(&result));

                let mut commands = vec![Command::StopTimer];
                if trigger == SubmitTrigger::Timeout {
                    commands.push(Command::Notify(Notice::TimeUp));
                }
                commands.extend(self.route_pending(identity_available));
                commands
            }
            (_, Event::Submit { trigger, .. }) => {
                debug!(?trigger, state = %self.state, "duplicate submission ignored");
                Vec::new()
            }

            (AwaitingIdentity, Event::IdentityObtained) => self.begin_persist(),

            (AwaitingIdentity | PersistFailed, Event::LoginCancelled | Event::Decline) => {
                self.pending = None;
                self.enter(Declined);
                vec![Command::Notify(Notice::NotSaved)]
            }

            (Persisting, Event::IdentityMissing) => {
                self.enter(AwaitingIdentity);
                vec![
                    Command::Notify(Notice::LoginRequired),
                    Command::RequestLogin,
                ]
            }

            (Persisting, Event::PersistSucceeded(stored)) => {
                info!(session_id = %stored.id, "result persisted");
                let session_id = stored.id.clone();
                self.pending = None;
                self.last_error = None;
                self.stored = Some(stored);
                self.enter(Persisted);
                vec![Command::Notify(Notice::Saved { session_id })]
            }

            (Persisting, Event::PersistRejected) => {
                self.last_error = Some("unauthorized".to_string());
                self.enter(PersistFailed);
                self.enter(AwaitingIdentity);
                vec![
                    Command::Notify(Notice::SessionExpired),
                    Command::RequestLogin,
                ]
            }

            (Persisting, Event::PersistFailed(message)) => {
                self.last_error = Some(message.clone());
                self.enter(PersistFailed);
                vec![Command::Notify(Notice::SaveFailed(message))]
            }

            (PersistFailed, Event::Retry { identity_available }) => {
                self.route_pending(identity_available)
            }

            (state, event) => {
                debug!(%state, ?event, "event ignored in current state");
                Vec::new()
            }
        }
    }

    fn submit(&mut self, at: DateTime<Utc>) -> SessionResult {
        let answers = self.answers.freeze();
        let score = score(&answers, &self.correct, self.total_questions);
        self.enter(SessionState::Submitted);
        SessionResult {
            exam_id: self.exam_id.clone(),
            exam_meta: self.meta.clone(),
            answers,
            score,
            total_questions: self.total_questions,
            submitted_at: at,
            initial_duration: self.initial_duration,
        }
    }

    fn route_pending(&mut self, identity_available: bool) -> Vec<Command> {
        if identity_available {
            self.begin_persist()
        } else {
            self.enter(SessionState::AwaitingIdentity);
            vec![
                Command::Notify(Notice::LoginRequired),
                Command::RequestLogin,
            ]
        }
    }

    fn begin_persist(&mut self) -> Vec<Command> {
        match &self.pending {
            Some(result) => {
                let result = Arc::clone(result);
                self.enter(SessionState::Persisting);
                vec![Command::Persist(result)]
            }
            None => Vec::new(),
        }
    }

    fn enter(&mut self, next: SessionState) {
        debug!(exam_id = %self.exam_id, from = %self.state, to = %next, "session transition");
        self.state = next;
        self.history.push(next);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state entered so far, starting with `Draft`.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn answers(&self) -> &Answers {
        self.answers.answers()
    }

    pub fn correct_answers(&self) -> &CorrectAnswers {
        &self.correct
    }

    pub fn total_questions(&self) -> usize {
        self.total_questions
    }

    pub fn exam_id(&self) -> &str {
        &self.exam_id
    }

    /// The submitted snapshot, kept for display even after a decline.
    pub fn result(&self) -> Option<&Arc<SessionResult>> {
        self.result.as_ref()
    }

    /// The snapshot still waiting to be saved.
    pub fn pending(&self) -> Option<&Arc<SessionResult>> {
        self.pending.as_ref()
    }

    pub fn stored(&self) -> Option<&StoredSession> {
        self.stored.as_ref()
    }

    pub fn score(&self) -> Option<usize> {
        self.result.as_ref().map(|r| r.score)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

//! Error types for the session runtime.
//!
//! Store errors are typed so the persistence gate and the review loader can
//! tell an expired identity apart from a transport failure without string
//! matching.

use thiserror::Error;

/// A malformed exam definition. Fatal at session initialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The exam has no questions at all.
    #[error("exam {exam_id} has no questions")]
    EmptyExam { exam_id: String },

    /// A question has an empty option list.
    #[error("question {question} has no options")]
    NoOptions { question: u32 },

    /// No option of the question is marked correct.
    #[error("question {question} has no correct option")]
    NoCorrectOption { question: u32 },

    /// More than one option of the question is marked correct.
    #[error("question {question} has {count} correct options, expected exactly one")]
    MultipleCorrectOptions { question: u32, count: usize },

    /// Two questions share the same number.
    #[error("question number {question} appears more than once")]
    DuplicateQuestion { question: u32 },
}

/// Errors returned by a [`SessionStore`](crate::traits::SessionStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend answered 401 or 403.
    #[error("unauthorized (HTTP {status})")]
    Unauthorized { status: u16 },

    /// The requested session record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The request never reached the backend.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Returns `true` for 401/403 responses, which invalidate the identity.
    pub fn is_auth(&self) -> bool {
        matches!(self, StoreError::Unauthorized { .. })
    }
}

/// Failures of the review loader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    /// No identity could be obtained; the user cancelled the login.
    #[error("login required to review a stored attempt")]
    AuthRequired,

    #[error("stored attempt {0} was not found")]
    NotFound(String),

    /// The stored attempt belongs to another exam than the one displayed.
    #[error("stored attempt is for exam {found}, not exam {expected}")]
    ExamMismatch { expected: String, found: String },

    #[error("failed to load stored attempt: {0}")]
    Network(String),
}

/// Failures of an [`ExamCatalog`](crate::traits::ExamCatalog).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("exam {0} not found")]
    NotFound(String),

    #[error("failed to load exam catalogue: {0}")]
    Load(String),
}

/// The session actor has shut down and no longer accepts intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("exam session is closed")]
pub struct SessionClosed;

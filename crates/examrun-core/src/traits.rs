//! Collaborator traits consumed by the runtime.
//!
//! `examrun-client` implements these against the backend REST API and the
//! exam data files; [`crate::mock`] has in-memory versions for tests.

use async_trait::async_trait;

use crate::error::{CatalogError, StoreError};
use crate::model::{ExamDefinition, ExamSummary};
use crate::result::{HistoryPage, HistoryQuery, Identity, SessionResult, StoredSession};

// ---------------------------------------------------------------------------
// Session store
// ---------------------------------------------------------------------------

/// Backend storage for submitted attempts.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a result on behalf of `identity`.
    async fn create(
        &self,
        result: &SessionResult,
        identity: &Identity,
    ) -> Result<StoredSession, StoreError>;

    /// Fetch one stored attempt by id.
    async fn fetch(&self, session_id: &str, identity: &Identity)
        -> Result<StoredSession, StoreError>;

    /// List the identity's attempts, newest first.
    async fn list(
        &self,
        identity: &Identity,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, StoreError>;

    /// The identity's most recent attempt.
    async fn latest(&self, identity: &Identity) -> Result<StoredSession, StoreError>;

    /// Delete one stored attempt.
    async fn delete(&self, session_id: &str, identity: &Identity) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// How an interactive login ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated(Identity),
    Cancelled,
}

/// Source of user identities.
///
/// The runtime never constructs an [`Identity`]; it only asks whether one
/// is present, asks for a login when it is not, and discards one the
/// backend has rejected.
#[async_trait]
pub trait Authenticator: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;

    /// Run the interactive login flow. On success the new identity is also
    /// what [`current_identity`](Self::current_identity) returns afterwards.
    async fn request_interactive_login(&self) -> LoginOutcome;

    /// Forget the current identity.
    fn invalidate(&self);
}

// ---------------------------------------------------------------------------
// Exam catalogue
// ---------------------------------------------------------------------------

/// Read-only source of exam definitions.
pub trait ExamCatalog: Send + Sync {
    fn get(&self, exam_id: &str) -> Result<ExamDefinition, CatalogError>;

    fn list(&self) -> Vec<ExamSummary>;
}

//! Deferred persistence gate.
//!
//! The only component that talks to the session store on behalf of a
//! submitted attempt, and the only caller of the authenticator. It performs
//! a single step per call and reports back; deciding what happens next is
//! the state machine's job. The gate does not deduplicate concurrent calls.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::error::StoreError;
use crate::result::{Identity, SessionResult, StoredSession};
use crate::traits::{Authenticator, LoginOutcome, SessionStore};

/// Outcome of one save attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    Persisted(StoredSession),
    /// No identity was present; nothing was sent.
    NeedsIdentity,
    /// The backend refused the identity (401/403); it has been invalidated.
    Rejected,
    /// Any other failure. The result is still pending and may be retried.
    Failed(StoreError),
}

pub struct PersistenceGate {
    store: Arc<dyn SessionStore>,
    auth: Arc<dyn Authenticator>,
}

impl PersistenceGate {
    pub fn new(store: Arc<dyn SessionStore>, auth: Arc<dyn Authenticator>) -> Self {
        Self { store, auth }
    }

    pub fn has_identity(&self) -> bool {
        self.auth.current_identity().is_some()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.auth.current_identity()
    }

    /// Save `result` under the current identity.
    #[instrument(skip_all, fields(exam_id = %result.exam_id))]
    pub async fn attempt_persist(&self, result: &SessionResult) -> PersistOutcome {
        let Some(identity) = self.auth.current_identity() else {
            return PersistOutcome::NeedsIdentity;
        };

        match self.store.create(result, &identity).await {
            Ok(stored) => PersistOutcome::Persisted(stored),
            Err(e) if e.is_auth() => {
                warn!("save rejected, discarding identity: {e}");
                self.auth.invalidate();
                PersistOutcome::Rejected
            }
            Err(e) => {
                warn!("save failed: {e}");
                PersistOutcome::Failed(e)
            }
        }
    }

    /// Fetch a stored attempt under the current identity.
    ///
    /// A 401/403 invalidates the identity before the error is returned.
    #[instrument(skip(self))]
    pub async fn fetch(&self, session_id: &str) -> Result<StoredSession, StoreError> {
        let Some(identity) = self.auth.current_identity() else {
            return Err(StoreError::Unauthorized { status: 401 });
        };

        let fetched = self.store.fetch(session_id, &identity).await;
        if let Err(e) = &fetched {
            if e.is_auth() {
                warn!("fetch rejected, discarding identity: {e}");
                self.auth.invalidate();
            }
        }
        fetched
    }

    /// Run the interactive login flow.
    pub async fn request_login(&self) -> LoginOutcome {
        self.auth.request_interactive_login().await
    }

    pub fn invalidate_identity(&self) {
        self.auth.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::mock::{MockAuthenticator, MockSessionStore};

    fn result() -> SessionResult {
        SessionResult {
            exam_id: "exam-1".into(),
            exam_meta: Default::default(),
            answers: [(1, 0)].into_iter().collect(),
            score: 1,
            total_questions: 2,
            submitted_at: Utc::now(),
            initial_duration: 3600,
        }
    }

    #[tokio::test]
    async fn no_identity_means_no_network_call() {
        let store = Arc::new(MockSessionStore::new());
        let auth = Arc::new(MockAuthenticator::anonymous());
        let gate = PersistenceGate::new(store.clone(), auth.clone());

        assert_eq!(
            gate.attempt_persist(&result()).await,
            PersistOutcome::NeedsIdentity
        );
        assert_eq!(store.create_calls(), 0);
    }

    #[tokio::test]
    async fn persists_with_current_identity() {
        let store = Arc::new(MockSessionStore::new());
        let auth = Arc::new(MockAuthenticator::signed_in("u1"));
        let gate = PersistenceGate::new(store.clone(), auth.clone());
        let submitted = result();

        let outcome = gate.attempt_persist(&submitted).await;
        assert!(matches!(outcome, PersistOutcome::Persisted(_)));
        let (saved, identity) = store.last_created().unwrap();
        assert_eq!(saved, submitted);
        assert_eq!(identity.user_id, "u1");
    }

    #[tokio::test]
    async fn unauthorized_invalidates_identity() {
        let store = Arc::new(MockSessionStore::new());
        store.push_create(Err(StoreError::Unauthorized { status: 403 }));
        let auth = Arc::new(MockAuthenticator::signed_in("u1"));
        let gate = PersistenceGate::new(store.clone(), auth.clone());

        assert_eq!(gate.attempt_persist(&result()).await, PersistOutcome::Rejected);
        assert!(!gate.has_identity());
        assert_eq!(auth.invalidations(), 1);
    }

    #[tokio::test]
    async fn other_failures_keep_identity() {
        let store = Arc::new(MockSessionStore::new());
        store.push_create(Err(StoreError::Api {
            status: 500,
            message: "database down".into(),
        }));
        let auth = Arc::new(MockAuthenticator::signed_in("u1"));
        let gate = PersistenceGate::new(store.clone(), auth.clone());

        let outcome = gate.attempt_persist(&result()).await;
        assert!(matches!(outcome, PersistOutcome::Failed(StoreError::Api { status: 500, .. })));
        assert!(gate.has_identity());
        assert_eq!(auth.invalidations(), 0);
    }

    #[tokio::test]
    async fn fetch_without_identity_is_unauthorized() {
        let store = Arc::new(MockSessionStore::new());
        let gate = PersistenceGate::new(store.clone(), Arc::new(MockAuthenticator::anonymous()));
        let err = gate.fetch("s1").await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(store.fetch_calls(), 0);
    }
}

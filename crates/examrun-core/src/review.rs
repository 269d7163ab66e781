//! Review loader: replays a stored attempt without touching the state
//! machine.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::answers::Answers;
use crate::error::{ReviewError, StoreError};
use crate::gate::PersistenceGate;
use crate::result::StoredSession;
use crate::traits::LoginOutcome;

/// Logins attempted for one load before giving up on a backend that keeps
/// refusing fresh identities.
const MAX_AUTH_ROUNDS: u32 = 3;

/// A stored attempt ready for read-only display.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewedSession {
    pub stored: StoredSession,
    pub answers: Answers,
    /// Score as recorded at submission time, never recomputed.
    pub score: usize,
    pub total_questions: usize,
}

pub struct ReviewLoader {
    gate: Arc<PersistenceGate>,
}

impl ReviewLoader {
    pub fn new(gate: Arc<PersistenceGate>) -> Self {
        Self { gate }
    }

    /// Fetch `session_id` and check it belongs to `expected_exam_id`.
    ///
    /// Logs in first when no identity is present. A 401/403 discards the
    /// identity, asks for a new login and retries the same load.
    #[instrument(skip(self))]
    pub async fn load(
        &self,
        session_id: &str,
        expected_exam_id: &str,
    ) -> Result<ReviewedSession, ReviewError> {
        let mut auth_rounds = 0;
        let stored = loop {
            if !self.gate.has_identity() {
                if auth_rounds >= MAX_AUTH_ROUNDS {
                    return Err(ReviewError::AuthRequired);
                }
                auth_rounds += 1;
                if self.gate.request_login().await == LoginOutcome::Cancelled {
                    return Err(ReviewError::AuthRequired);
                }
            }

            match self.gate.fetch(session_id).await {
                Ok(stored) => break stored,
                Err(e) if e.is_auth() => {
                    warn!("review fetch rejected, logging in again");
                }
                Err(StoreError::NotFound(_)) => {
                    return Err(ReviewError::NotFound(session_id.to_string()));
                }
                Err(e) => return Err(ReviewError::Network(e.to_string())),
            }
        };

        if stored.result.exam_id != expected_exam_id {
            return Err(ReviewError::ExamMismatch {
                expected: expected_exam_id.to_string(),
                found: stored.result.exam_id,
            });
        }

        info!(
            session_id,
            score = stored.result.score,
            total = stored.result.total_questions,
            "stored attempt loaded"
        );
        Ok(ReviewedSession {
            answers: stored.result.answers.clone(),
            score: stored.result.score,
            total_questions: stored.result.total_questions,
            stored,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::mock::{MockAuthenticator, MockSessionStore};
    use crate::result::SessionResult;

    fn stored(id: &str, exam_id: &str) -> StoredSession {
        StoredSession {
            id: id.into(),
            user: Some(serde_json::Value::String("u1".into())),
            result: SessionResult {
                exam_id: exam_id.into(),
                exam_meta: Default::default(),
                answers: [(1, 0), (2, 0)].into_iter().collect(),
                score: 1,
                total_questions: 2,
                submitted_at: Utc::now(),
                initial_duration: 3600,
            },
        }
    }

    fn loader(store: &Arc<MockSessionStore>, auth: &Arc<MockAuthenticator>) -> ReviewLoader {
        ReviewLoader::new(Arc::new(PersistenceGate::new(store.clone(), auth.clone())))
    }

    #[tokio::test]
    async fn loads_recorded_answers_and_score() {
        let store = Arc::new(MockSessionStore::new());
        store.insert(stored("s1", "exam-1"));
        let auth = Arc::new(MockAuthenticator::signed_in("u1"));

        let reviewed = loader(&store, &auth).load("s1", "exam-1").await.unwrap();
        assert_eq!(reviewed.score, 1);
        assert_eq!(reviewed.answers.get(&2), Some(&0));
        assert_eq!(auth.login_calls(), 0);
    }

    #[tokio::test]
    async fn exam_mismatch_is_reported() {
        let store = Arc::new(MockSessionStore::new());
        store.insert(stored("s1", "exam-2"));
        let auth = Arc::new(MockAuthenticator::signed_in("u1"));

        let err = loader(&store, &auth).load("s1", "exam-1").await.unwrap_err();
        assert_eq!(
            err,
            ReviewError::ExamMismatch {
                expected: "exam-1".into(),
                found: "exam-2".into()
            }
        );
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let store = Arc::new(MockSessionStore::new());
        let auth = Arc::new(MockAuthenticator::signed_in("u1"));
        let err = loader(&store, &auth).load("nope", "exam-1").await.unwrap_err();
        assert_eq!(err, ReviewError::NotFound("nope".into()));
    }

    #[tokio::test]
    async fn unauthorized_logs_in_again_and_retries() {
        let store = Arc::new(MockSessionStore::new());
        store.insert(stored("s1", "exam-1"));
        store.push_fetch(Err(StoreError::Unauthorized { status: 401 }));
        let auth = Arc::new(MockAuthenticator::signed_in("stale"));
        auth.push_login("u1");

        let reviewed = loader(&store, &auth).load("s1", "exam-1").await.unwrap();
        assert_eq!(reviewed.stored.id, "s1");
        assert_eq!(auth.invalidations(), 1);
        assert_eq!(auth.login_calls(), 1);
        assert_eq!(store.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn cancelled_login_requires_auth() {
        let store = Arc::new(MockSessionStore::new());
        let auth = Arc::new(MockAuthenticator::anonymous());
        auth.push_cancel();

        let err = loader(&store, &auth).load("s1", "exam-1").await.unwrap_err();
        assert_eq!(err, ReviewError::AuthRequired);
        assert_eq!(store.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn gives_up_when_every_identity_is_refused() {
        let store = Arc::new(MockSessionStore::new());
        for _ in 0..5 {
            store.push_fetch(Err(StoreError::Unauthorized { status: 403 }));
        }
        let auth = Arc::new(MockAuthenticator::anonymous());
        for _ in 0..5 {
            auth.push_login("u1");
        }

        let err = loader(&store, &auth).load("s1", "exam-1").await.unwrap_err();
        assert_eq!(err, ReviewError::AuthRequired);
        assert_eq!(auth.login_calls(), MAX_AUTH_ROUNDS);
    }

    #[tokio::test]
    async fn other_failures_are_network_errors() {
        let store = Arc::new(MockSessionStore::new());
        store.push_fetch(Err(StoreError::Timeout(30)));
        let auth = Arc::new(MockAuthenticator::signed_in("u1"));

        let err = loader(&store, &auth).load("s1", "exam-1").await.unwrap_err();
        assert!(matches!(err, ReviewError::Network(msg) if msg.contains("timed out")));
    }
}

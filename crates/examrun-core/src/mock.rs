//! In-memory collaborators for testing the runtime without a backend.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::StoreError;
use crate::result::{HistoryPage, HistoryQuery, Identity, SessionResult, StoredSession};
use crate::traits::{Authenticator, LoginOutcome, SessionStore};

/// Build the identity the mocks hand out for `user_id`.
pub fn identity(user_id: &str) -> Identity {
    Identity {
        user_id: user_id.to_string(),
        email: Some(format!("{user_id}@example.com")),
        token: format!("token-{user_id}"),
    }
}

/// A session store backed by a map, with scriptable failures.
///
/// Scripted responses are consumed first; once a script is empty, calls
/// succeed against the in-memory map.
#[derive(Default)]
pub struct MockSessionStore {
    sessions: Mutex<HashMap<String, StoredSession>>,
    create_script: Mutex<VecDeque<Result<(), StoreError>>>,
    fetch_script: Mutex<VecDeque<Result<StoredSession, StoreError>>>,
    created: Mutex<Vec<(SessionResult, Identity)>>,
    create_calls: AtomicU32,
    fetch_calls: AtomicU32,
    next_id: AtomicU32,
    delay: Mutex<Option<Duration>>,
}

impl MockSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next `create` call.
    pub fn push_create(&self, outcome: Result<(), StoreError>) {
        self.create_script.lock().unwrap().push_back(outcome);
    }

    /// Queue the outcome of the next `fetch` call.
    pub fn push_fetch(&self, outcome: Result<StoredSession, StoreError>) {
        self.fetch_script.lock().unwrap().push_back(outcome);
    }

    /// Make every `create` and `fetch` take this long.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Store a session directly, e.g. to review it later.
    pub fn insert(&self, stored: StoredSession) {
        self.sessions
            .lock()
            .unwrap()
            .insert(stored.id.clone(), stored);
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Every result passed to `create`, with the identity it was sent under.
    pub fn created(&self) -> Vec<(SessionResult, Identity)> {
        self.created.lock().unwrap().clone()
    }

    pub fn last_created(&self) -> Option<(SessionResult, Identity)> {
        self.created.lock().unwrap().last().cloned()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn owned_by(stored: &StoredSession, identity: &Identity) -> bool {
        stored.user.as_ref().and_then(|u| u.as_str()) == Some(identity.user_id.as_str())
    }
}

#[async_trait]
impl SessionStore for MockSessionStore {
    async fn create(
        &self,
        result: &SessionResult,
        identity: &Identity,
    ) -> Result<StoredSession, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.created
            .lock()
            .unwrap()
            .push((result.clone(), identity.clone()));
        self.pause().await;

        let scripted = self.create_script.lock().unwrap().pop_front();
        if let Some(Err(e)) = scripted {
            return Err(e);
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = StoredSession {
            id: format!("session-{n}"),
            user: Some(serde_json::Value::String(identity.user_id.clone())),
            result: result.clone(),
        };
        self.insert(stored.clone());
        Ok(stored)
    }

    async fn fetch(
        &self,
        session_id: &str,
        _identity: &Identity,
    ) -> Result<StoredSession, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if let Some(scripted) = self.fetch_script.lock().unwrap().pop_front() {
            return scripted;
        }
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))
    }

    async fn list(
        &self,
        identity: &Identity,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, StoreError> {
        let mut matching: Vec<StoredSession> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| Self::owned_by(s, identity))
            .filter(|s| {
                query
                    .exam_id
                    .as_ref()
                    .map_or(true, |exam_id| &s.result.exam_id == exam_id)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.result.submitted_at.cmp(&a.result.submitted_at));

        let limit = query.limit.max(1);
        let page = query.page.max(1);
        let total = matching.len() as u64;
        let sessions = matching
            .into_iter()
            .skip(((page - 1) * limit) as usize)
            .take(limit as usize)
            .collect();
        Ok(HistoryPage {
            sessions,
            current_page: page,
            total_pages: total.div_ceil(u64::from(limit)) as u32,
            total_sessions: total,
        })
    }

    async fn latest(&self, identity: &Identity) -> Result<StoredSession, StoreError> {
        let query = HistoryQuery {
            limit: 1,
            ..HistoryQuery::default()
        };
        self.list(identity, &query)
            .await?
            .sessions
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound("no sessions".to_string()))
    }

    async fn delete(&self, session_id: &str, identity: &Identity) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get(session_id) {
            Some(stored) if Self::owned_by(stored, identity) => {
                sessions.remove(session_id);
                Ok(())
            }
            Some(_) => Err(StoreError::Unauthorized { status: 403 }),
            None => Err(StoreError::NotFound(session_id.to_string())),
        }
    }
}

/// An authenticator whose logins resolve to scripted outcomes.
///
/// With no outcome queued, a login is cancelled. While held, logins wait
/// until [`release_logins`](Self::release_logins) is called.
#[derive(Default)]
pub struct MockAuthenticator {
    identity: Mutex<Option<Identity>>,
    logins: Mutex<VecDeque<LoginOutcome>>,
    login_calls: AtomicU32,
    invalidations: AtomicU32,
    held: AtomicBool,
    release: Notify,
}

impl MockAuthenticator {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: &str) -> Self {
        let auth = Self::default();
        *auth.identity.lock().unwrap() = Some(identity(user_id));
        auth
    }

    /// Queue a successful login as `user_id`.
    pub fn push_login(&self, user_id: &str) {
        self.logins
            .lock()
            .unwrap()
            .push_back(LoginOutcome::Authenticated(identity(user_id)));
    }

    pub fn push_cancel(&self) {
        self.logins.lock().unwrap().push_back(LoginOutcome::Cancelled);
    }

    pub fn hold_logins(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release_logins(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    pub fn login_calls(&self) -> u32 {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> u32 {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    fn current_identity(&self) -> Option<Identity> {
        self.identity.lock().unwrap().clone()
    }

    async fn request_interactive_login(&self) -> LoginOutcome {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        while self.held.load(Ordering::SeqCst) {
            let notified = self.release.notified();
            if !self.held.load(Ordering::SeqCst) {
                break;
            }
            notified.await;
        }

        let outcome = self
            .logins
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(LoginOutcome::Cancelled);
        if let LoginOutcome::Authenticated(identity) = &outcome {
            *self.identity.lock().unwrap() = Some(identity.clone());
        }
        outcome
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        *self.identity.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;

    fn result(exam_id: &str, minutes_ago: i64) -> SessionResult {
        SessionResult {
            exam_id: exam_id.into(),
            exam_meta: Default::default(),
            answers: Default::default(),
            score: 0,
            total_questions: 1,
            submitted_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
            initial_duration: 60,
        }
    }

    #[tokio::test]
    async fn history_is_newest_first_and_filtered() {
        let store = MockSessionStore::new();
        let me = identity("me");
        let other = identity("other");
        store.create(&result("a", 30), &me).await.unwrap();
        store.create(&result("b", 10), &me).await.unwrap();
        store.create(&result("a", 5), &other).await.unwrap();

        let page = store.list(&me, &HistoryQuery::default()).await.unwrap();
        assert_eq!(page.total_sessions, 2);
        assert_eq!(page.sessions[0].result.exam_id, "b");

        let filtered = HistoryQuery {
            exam_id: Some("a".into()),
            ..HistoryQuery::default()
        };
        let page = store.list(&me, &filtered).await.unwrap();
        assert_eq!(page.total_sessions, 1);

        let latest = store.latest(&me).await.unwrap();
        assert_eq!(latest.result.exam_id, "b");
    }

    #[tokio::test]
    async fn delete_checks_owner() {
        let store = MockSessionStore::new();
        let me = identity("me");
        let stored = store.create(&result("a", 1), &me).await.unwrap();

        let err = store.delete(&stored.id, &identity("other")).await.unwrap_err();
        assert!(err.is_auth());
        store.delete(&stored.id, &me).await.unwrap();
        assert!(matches!(
            store.fetch(&stored.id, &me).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn login_script_updates_identity() {
        let auth = MockAuthenticator::anonymous();
        auth.push_login("u1");
        assert!(matches!(
            auth.request_interactive_login().await,
            LoginOutcome::Authenticated(_)
        ));
        assert_eq!(auth.current_identity().unwrap().user_id, "u1");
        assert_eq!(
            auth.request_interactive_login().await,
            LoginOutcome::Cancelled
        );
        auth.invalidate();
        assert!(auth.current_identity().is_none());
    }
}

//! Backend REST implementation of [`SessionStore`].

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use examrun_core::error::StoreError;
use examrun_core::result::{HistoryPage, HistoryQuery, Identity, SessionResult, StoredSession};
use examrun_core::traits::SessionStore;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Session store talking to the `/exam-sessions` endpoints.
pub struct HttpSessionStore {
    base_url: Url,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpSessionStore {
    pub fn new(base_url: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let base_url = parse_base_url(base_url)?;
        let client = build_client(timeout_secs)?;
        Ok(Self {
            base_url,
            timeout_secs,
            client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        endpoint(&self.base_url, segments)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        identity: &Identity,
        what: &str,
    ) -> Result<Response, StoreError> {
        let response = request
            .bearer_auth(&identity.token)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout_secs))?;
        check_status(response, what).await
    }
}

#[derive(Deserialize)]
struct CreatedSession {
    session: StoredSession,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    #[instrument(skip_all, fields(exam_id = %result.exam_id, user_id = %identity.user_id))]
    async fn create(
        &self,
        result: &SessionResult,
        identity: &Identity,
    ) -> Result<StoredSession, StoreError> {
        let mut body = serde_json::to_value(result).map_err(|e| StoreError::Decode(e.to_string()))?;
        if let Some(fields) = body.as_object_mut() {
            fields.insert("isSubmitted".into(), true.into());
            fields.insert("userId".into(), identity.user_id.clone().into());
        }

        let url = self.endpoint(&["exam-sessions"])?;
        let response = self
            .send(self.client.post(url).json(&body), identity, "exam session")
            .await?;
        let created: CreatedSession = decode(response).await?;
        debug!(session_id = %created.session.id, "session created");
        Ok(created.session)
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    async fn fetch(
        &self,
        session_id: &str,
        identity: &Identity,
    ) -> Result<StoredSession, StoreError> {
        let url = self.endpoint(&["exam-sessions", session_id])?;
        let response = self.send(self.client.get(url), identity, session_id).await?;
        decode(response).await
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    async fn list(
        &self,
        identity: &Identity,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, StoreError> {
        let mut url = self.endpoint(&["exam-sessions"])?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(exam_id) = &query.exam_id {
                pairs.append_pair("examId", exam_id);
            }
            pairs.append_pair("page", &query.page.to_string());
            pairs.append_pair("limit", &query.limit.to_string());
        }
        let response = self
            .send(self.client.get(url), identity, "exam sessions")
            .await?;
        decode(response).await
    }

    #[instrument(skip_all, fields(user_id = %identity.user_id))]
    async fn latest(&self, identity: &Identity) -> Result<StoredSession, StoreError> {
        let url = self.endpoint(&["exam-sessions", "latest"])?;
        let response = self
            .send(self.client.get(url), identity, "latest session")
            .await?;
        decode(response).await
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    async fn delete(&self, session_id: &str, identity: &Identity) -> Result<(), StoreError> {
        let url = self.endpoint(&["exam-sessions", session_id])?;
        self.send(self.client.delete(url), identity, session_id)
            .await?;
        Ok(())
    }
}

pub(crate) fn parse_base_url(base_url: &str) -> anyhow::Result<Url> {
    let url = Url::parse(base_url).with_context(|| format!("invalid API base URL: {base_url}"))?;
    anyhow::ensure!(
        !url.cannot_be_a_base(),
        "API base URL cannot carry a path: {base_url}"
    );
    Ok(url)
}

pub(crate) fn build_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build HTTP client")
}

/// `base` with `segments` appended as percent-encoded path segments.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, StoreError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| StoreError::Network(format!("invalid API base URL: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) fn transport_error(e: reqwest::Error, timeout_secs: u64) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout(timeout_secs)
    } else {
        StoreError::Network(e.to_string())
    }
}

/// Pull a human-readable message out of an error body.
///
/// The backend answers with `{"message": ..}` or `{"error": ..}`; anything
/// else is returned as-is.
pub(crate) fn error_message(body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .message
        .or(parsed.error)
        .unwrap_or_else(|| body.trim().to_string())
}

async fn check_status(response: Response, what: &str) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            debug!(status = code, message = %error_message(&body), "request unauthorized");
            Err(StoreError::Unauthorized { status: code })
        }
        StatusCode::NOT_FOUND => Err(StoreError::NotFound(what.to_string())),
        _ => Err(StoreError::Api {
            status: code,
            message: error_message(&body),
        }),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    response
        .json::<T>()
        .await
        .map_err(|e| StoreError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn identity() -> Identity {
        Identity {
            user_id: "u1".into(),
            email: Some("a@b.c".into()),
            token: "tok".into(),
        }
    }

    fn result() -> SessionResult {
        SessionResult {
            exam_id: "35".into(),
            exam_meta: Default::default(),
            answers: [(1, 0), (2, 3)].into_iter().collect(),
            score: 1,
            total_questions: 2,
            submitted_at: Utc::now(),
            initial_duration: 3600,
        }
    }

    fn stored_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "_id": id,
            "userId": "u1",
            "examId": "35",
            "examMeta": {},
            "selectedAnswers": {"1": 0, "2": 3},
            "score": 1,
            "totalQuestions": 2,
            "isSubmitted": true,
            "submittedAt": "2024-05-01T10:00:00.000Z",
            "initialDuration": 3600
        })
    }

    #[tokio::test]
    async fn create_posts_result_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exam-sessions"))
            .and(header("Authorization", "Bearer tok"))
            .and(body_partial_json(serde_json::json!({
                "examId": "35",
                "selectedAnswers": {"1": 0, "2": 3},
                "score": 1,
                "totalQuestions": 2,
                "initialDuration": 3600,
                "isSubmitted": true,
                "userId": "u1"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "message": "saved",
                "session": stored_json("s1")
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpSessionStore::new(&server.uri(), 5).unwrap();
        let stored = store.create(&result(), &identity()).await.unwrap();
        assert_eq!(stored.id, "s1");
        assert_eq!(stored.result.answers.get(&2), Some(&3));
    }

    #[tokio::test]
    async fn unauthorized_and_forbidden_are_auth_errors() {
        for status in [401, 403] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(
                    ResponseTemplate::new(status)
                        .set_body_json(serde_json::json!({"message": "Token has expired."})),
                )
                .mount(&server)
                .await;

            let store = HttpSessionStore::new(&server.uri(), 5).unwrap();
            let err = store.create(&result(), &identity()).await.unwrap_err();
            assert_eq!(err, StoreError::Unauthorized { status });
        }
    }

    #[tokio::test]
    async fn server_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"message": "database down"})),
            )
            .mount(&server)
            .await;

        let store = HttpSessionStore::new(&server.uri(), 5).unwrap();
        let err = store.create(&result(), &identity()).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Api {
                status: 500,
                message: "database down".into()
            }
        );
    }

    #[tokio::test]
    async fn fetch_decodes_stored_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exam-sessions/s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored_json("s1")))
            .mount(&server)
            .await;

        let store = HttpSessionStore::new(&server.uri(), 5).unwrap();
        let stored = store.fetch("s1", &identity()).await.unwrap();
        assert_eq!(stored.result.exam_id, "35");
        assert_eq!(stored.result.score, 1);
    }

    #[tokio::test]
    async fn fetch_missing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({"message": "missing"})),
            )
            .mount(&server)
            .await;

        let store = HttpSessionStore::new(&server.uri(), 5).unwrap();
        let err = store.fetch("nope", &identity()).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound("nope".into()));
    }

    #[tokio::test]
    async fn list_sends_paging_and_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exam-sessions"))
            .and(query_param("examId", "35"))
            .and(query_param("page", "2"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sessions": [stored_json("s6")],
                "currentPage": 2,
                "totalPages": 2,
                "totalSessions": 6
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpSessionStore::new(&server.uri(), 5).unwrap();
        let query = HistoryQuery {
            exam_id: Some("35".into()),
            page: 2,
            limit: 5,
        };
        let page = store.list(&identity(), &query).await.unwrap();
        assert_eq!(page.sessions.len(), 1);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.total_sessions, 6);
    }

    #[tokio::test]
    async fn latest_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/exam-sessions/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored_json("s9")))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/exam-sessions/s9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "deleted"})))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpSessionStore::new(&server.uri(), 5).unwrap();
        let latest = store.latest(&identity()).await.unwrap();
        assert_eq!(latest.id, "s9");
        store.delete(&latest.id, &identity()).await.unwrap();
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(stored_json("s1"))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let store = HttpSessionStore::new(&server.uri(), 1).unwrap();
        let err = store.fetch("s1", &identity()).await.unwrap_err();
        assert_eq!(err, StoreError::Timeout(1));
    }

    #[tokio::test]
    async fn undecodable_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let store = HttpSessionStore::new(&server.uri(), 5).unwrap();
        let err = store.fetch("s1", &identity()).await.unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[test]
    fn endpoint_encodes_segments() {
        let base = parse_base_url("http://localhost:5000/api/").unwrap();
        let url = endpoint(&base, &["exam-sessions", "a b"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/exam-sessions/a%20b");
    }

    #[test]
    fn error_message_prefers_json_fields() {
        assert_eq!(error_message(r#"{"message": "m"}"#), "m");
        assert_eq!(error_message(r#"{"error": "e"}"#), "e");
        assert_eq!(error_message(" plain text \n"), "plain text");
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(HttpSessionStore::new("not a url", 5).is_err());
        assert!(HttpSessionStore::new("mailto:someone@example.com", 5).is_err());
    }
}

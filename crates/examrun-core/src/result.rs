//! Session results and the records the backend keeps for them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::answers::Answers;
use crate::model::{id_from_any, ExamMeta, OptionIndex, QuestionNumber};

/// Snapshot of a submitted attempt.
///
/// Created once at submission and never mutated; every save attempt sends
/// the same snapshot and only the attached identity may differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    #[serde(deserialize_with = "id_from_any")]
    pub exam_id: String,
    #[serde(default)]
    pub exam_meta: ExamMeta,
    #[serde(
        rename = "selectedAnswers",
        alias = "answers",
        default,
        deserialize_with = "answers_from_wire"
    )]
    pub answers: Answers,
    pub score: usize,
    pub total_questions: usize,
    pub submitted_at: DateTime<Utc>,
    pub initial_duration: u32,
}

/// Stored answers may carry `null` for questions left blank.
fn answers_from_wire<'de, D>(deserializer: D) -> Result<Answers, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<QuestionNumber, Option<OptionIndex>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(q, answer)| answer.map(|a| (q, a)))
        .collect())
}

/// A session result as persisted by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredSessionRecord", into = "StoredSessionRecord")]
pub struct StoredSession {
    pub id: String,
    /// Owner as returned by the backend: either an id or a user object.
    pub user: Option<serde_json::Value>,
    pub result: SessionResult,
}

/// Flat wire shape of [`StoredSession`]. Spelled out instead of using
/// `#[serde(flatten)]`, which cannot read the numeric answer keys.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSessionRecord {
    #[serde(rename = "_id", alias = "id", deserialize_with = "id_from_any")]
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<serde_json::Value>,
    #[serde(deserialize_with = "id_from_any")]
    exam_id: String,
    #[serde(default)]
    exam_meta: ExamMeta,
    #[serde(
        rename = "selectedAnswers",
        alias = "answers",
        default,
        deserialize_with = "answers_from_wire"
    )]
    answers: Answers,
    score: usize,
    total_questions: usize,
    submitted_at: DateTime<Utc>,
    initial_duration: u32,
}

impl From<StoredSessionRecord> for StoredSession {
    fn from(record: StoredSessionRecord) -> Self {
        Self {
            id: record.id,
            user: record.user_id,
            result: SessionResult {
                exam_id: record.exam_id,
                exam_meta: record.exam_meta,
                answers: record.answers,
                score: record.score,
                total_questions: record.total_questions,
                submitted_at: record.submitted_at,
                initial_duration: record.initial_duration,
            },
        }
    }
}

impl From<StoredSession> for StoredSessionRecord {
    fn from(stored: StoredSession) -> Self {
        let result = stored.result;
        Self {
            id: stored.id,
            user_id: stored.user,
            exam_id: result.exam_id,
            exam_meta: result.exam_meta,
            answers: result.answers,
            score: result.score,
            total_questions: result.total_questions,
            submitted_at: result.submitted_at,
            initial_duration: result.initial_duration,
        }
    }
}

/// An authenticated user, supplied by the authenticator.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
    pub token: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("token", &"***")
            .finish()
    }
}

/// Filter and paging for the attempt history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub exam_id: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            exam_id: None,
            page: 1,
            limit: 10,
        }
    }
}

/// One page of the attempt history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    #[serde(default)]
    pub sessions: Vec<StoredSession>,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_sessions: u64,
}

//! The `examrun history` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use comfy_table::{Cell, Table};

use examrun_client::load_config_from;
use examrun_core::result::{HistoryQuery, StoredSession};
use examrun_core::timer::format_clock;
use examrun_core::traits::SessionStore;

use super::{api_authenticator, session_store, with_login};
use crate::prompt::StdinPrompt;

pub async fn execute(
    exam_id: Option<String>,
    page: u32,
    limit: u32,
    latest: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = session_store(&config)?;
    let auth = api_authenticator(&config, Arc::new(StdinPrompt::new()))?;

    if latest {
        let session = with_login(&auth, |identity| {
            let store = &store;
            async move { store.latest(&identity).await }
        })
        .await?;
        println!("{}", session_table(std::slice::from_ref(&session)));
        return Ok(());
    }

    let query = HistoryQuery {
        exam_id,
        page: page.max(1),
        limit: limit.max(1),
    };
    let history = with_login(&auth, |identity| {
        let (store, query) = (&store, &query);
        async move { store.list(&identity, query).await }
    })
    .await?;

    if history.sessions.is_empty() {
        println!("No stored attempts.");
        return Ok(());
    }
    println!("{}", session_table(&history.sessions));
    println!(
        "Page {} of {} ({} attempt(s))",
        history.current_page, history.total_pages, history.total_sessions
    );
    Ok(())
}

fn session_table(sessions: &[StoredSession]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Session", "Exam", "Level", "Skill", "Score", "Submitted", "Time",
    ]);
    for session in sessions {
        let result = &session.result;
        let meta = &result.exam_meta;
        table.add_row(vec![
            Cell::new(&session.id),
            Cell::new(match &meta.description {
                Some(description) => format!("{} {description}", result.exam_id),
                None => result.exam_id.clone(),
            }),
            Cell::new(meta.level.as_ref().map(ToString::to_string).unwrap_or_default()),
            Cell::new(meta.skill.as_ref().map(ToString::to_string).unwrap_or_default()),
            Cell::new(format!("{}/{}", result.score, result.total_questions)),
            Cell::new(result.submitted_at.format("%Y-%m-%d %H:%M")),
            Cell::new(format_clock(i64::from(result.initial_duration))),
        ]);
    }
    table
}

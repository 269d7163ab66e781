//! The `examrun review` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use examrun_client::load_config_from;
use examrun_core::gate::PersistenceGate;
use examrun_core::review::ReviewLoader;
use examrun_core::scoring::CorrectAnswers;
use examrun_core::traits::ExamCatalog;

use super::{api_authenticator, load_catalog, session_store};
use crate::display::{answer_table, exam_title, print_exam};
use crate::prompt::StdinPrompt;

pub async fn execute(
    session_id: String,
    exam_id: String,
    exams: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let catalog = load_catalog(exams, &config)?;
    let exam = catalog.get(&exam_id)?;
    let correct = CorrectAnswers::from_exam(&exam)?;

    let auth = api_authenticator(&config, Arc::new(StdinPrompt::new()))?;
    let gate = Arc::new(PersistenceGate::new(
        Arc::new(session_store(&config)?),
        Arc::new(auth),
    ));

    let reviewed = ReviewLoader::new(gate)
        .load(&session_id, &exam.id)
        .await
        .with_context(|| format!("cannot review attempt {session_id}"))?;

    println!("{}", exam_title(&exam));
    print_exam(&exam);
    println!(
        "Attempt {} submitted {}",
        reviewed.stored.id,
        reviewed
            .stored
            .result
            .submitted_at
            .format("%Y-%m-%d %H:%M UTC")
    );
    println!("Score: {}/{}", reviewed.score, reviewed.total_questions);
    println!("{}", answer_table(&exam, &reviewed.answers, &correct));
    Ok(())
}

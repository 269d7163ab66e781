//! The `examrun validate` command.

use std::path::PathBuf;

use anyhow::{bail, Result};

use examrun_core::parser::{lint_exam, load_exams, validate_exam};

pub fn execute(exams_path: PathBuf) -> Result<()> {
    let exams = load_exams(&exams_path)?;

    let mut total_warnings = 0;
    let mut invalid = 0;

    for exam in &exams {
        println!(
            "Exam {}: {} {} ({} questions)",
            exam.id,
            exam.level,
            exam.skill,
            exam.question_count()
        );

        if let Err(e) = validate_exam(exam) {
            println!("  ERROR: {e}");
            invalid += 1;
        }

        let warnings = lint_exam(exam);
        for w in &warnings {
            let prefix = w
                .question
                .map(|n| format!("  [Q{n}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if invalid > 0 {
        bail!("{invalid} of {} exam(s) cannot be run", exams.len());
    }
    if total_warnings == 0 {
        println!("All exams valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}

//! The `examrun list` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use examrun_client::JsonCatalog;
use examrun_core::timer::format_clock;
use examrun_core::traits::ExamCatalog;

pub fn execute(exams_path: PathBuf) -> Result<()> {
    let catalog = JsonCatalog::load(&exams_path)?;
    if catalog.is_empty() {
        println!("No exams in {}.", catalog.source().display());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID",
        "Exam",
        "Year",
        "Level",
        "Skill",
        "Questions",
        "Time",
    ]);

    for exam in catalog.list() {
        table.add_row(vec![
            Cell::new(&exam.id),
            Cell::new(&exam.description),
            Cell::new(&exam.year),
            Cell::new(&exam.level),
            Cell::new(&exam.skill),
            Cell::new(exam.question_count),
            Cell::new(format_clock(i64::from(exam.duration_secs))),
        ]);
    }

    println!("{table}");
    println!("{} exam(s)", catalog.len());
    Ok(())
}

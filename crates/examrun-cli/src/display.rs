//! Plain-text rendering of exams and session views.

use comfy_table::{Cell, Table};
use serde_json::Value;

use examrun_core::answers::Answers;
use examrun_core::machine::SessionState;
use examrun_core::model::{AnswerOption, ExamDefinition, Question};
use examrun_core::scoring::CorrectAnswers;
use examrun_core::session::{SessionView, ViewMode};

/// Best-effort text of a question body.
///
/// Bodies are free-form JSON: a string, an object with a `text` or `value`
/// field, or a list of such parts.
pub fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => map
            .get("text")
            .or_else(|| map.get("value"))
            .and_then(content_text),
        Value::Array(parts) => {
            let texts: Vec<String> = parts.iter().filter_map(content_text).collect();
            (!texts.is_empty()).then(|| texts.join(" "))
        }
        _ => None,
    }
}

pub fn option_label(option: &AnswerOption) -> String {
    option
        .text
        .clone()
        .or_else(|| option.alt.clone().map(|alt| format!("[image] {alt}")))
        .or_else(|| option.image_src.clone().map(|src| format!("[image] {src}")))
        .unwrap_or_else(|| "(no text)".to_string())
}

/// Options are shown to the user numbered from 1.
pub fn option_number(index: usize) -> String {
    format!("{}", index + 1)
}

pub fn exam_title(exam: &ExamDefinition) -> String {
    let meta = exam.meta();
    let mut title = format!("Exam {}", exam.id);
    if let Some(description) = meta.description.filter(|d| !d.is_empty()) {
        title.push_str(&format!(" {description}"));
    }
    format!("{title} · {} {}", exam.level, exam.skill)
}

/// Print every instruction group with its questions.
pub fn print_exam(exam: &ExamDefinition) {
    for group in &exam.instruction_groups {
        if !group.instruction.is_empty() {
            println!("\n{}", group.instruction);
        }
        if let Some(shared) = group.shared_content.as_ref().and_then(content_text) {
            println!("{shared}");
        }
        for question in &group.questions {
            print_question(question);
        }
    }
    println!();
}

pub fn print_question(question: &Question) {
    match content_text(&question.content) {
        Some(text) => println!("Q{}. {text}", question.number),
        None => println!("Q{}.", question.number),
    }
    for (index, option) in question.options.iter().enumerate() {
        println!("  {}) {}", option_number(index), option_label(option));
    }
}

/// Per-question table of chosen and correct options.
pub fn answer_table(exam: &ExamDefinition, answers: &Answers, correct: &CorrectAnswers) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Question", "Your answer", "Correct", ""]);
    for question in exam.questions() {
        let chosen = answers.get(&question.number).copied();
        let key = correct.get(question.number);
        let mark = match (chosen, key) {
            (Some(c), Some(k)) if c == k => "✓",
            (None, _) => "-",
            _ => "✗",
        };
        table.add_row(vec![
            Cell::new(question.number),
            Cell::new(chosen.map(option_number).unwrap_or_else(|| "-".into())),
            Cell::new(key.map(option_number).unwrap_or_else(|| "?".into())),
            Cell::new(mark),
        ]);
    }
    table
}

/// Prints what changed between successive views of a running session.
#[derive(Debug, Default)]
pub struct ViewPrinter {
    notices_shown: usize,
    last_state: Option<SessionState>,
    last_mode: Option<ViewMode>,
    warned: bool,
}

impl ViewPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: &SessionView) {
        if self.last_mode != Some(view.mode) {
            if view.mode == ViewMode::Attempt {
                if view.untimed {
                    println!("Untimed attempt. {} questions.", view.total_questions);
                } else {
                    println!(
                        "{} questions, {} on the clock.",
                        view.total_questions, view.clock
                    );
                }
            }
            self.last_mode = Some(view.mode);
        }

        if view.warning && !self.warned {
            println!("{} remaining.", view.clock);
            self.warned = true;
        }

        for notice in view.notices.iter().skip(self.notices_shown) {
            if notice.is_error() {
                println!("! {notice}");
            } else {
                println!("{notice}");
            }
        }
        self.notices_shown = view.notices.len();

        if self.last_state != Some(view.state) {
            if view.is_submitted && !self.last_state.is_some_and(SessionState::is_submitted) {
                if let Some(score) = view.score {
                    println!("Score: {score}/{}", view.total_questions);
                }
            }
            if view.state == SessionState::PersistFailed {
                println!("Type `retry` to save again or `decline` to skip saving.");
            }
            self.last_state = Some(view.state);
        }
    }
}

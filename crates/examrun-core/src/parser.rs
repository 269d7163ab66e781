//! Exam data file loader and validator.
//!
//! Data files hold a JSON array of exam definitions.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::ValidationError;
use crate::model::{ExamDefinition, QuestionNumber};

/// Parse a single data file into its exam definitions.
pub fn load_exams(path: &Path) -> Result<Vec<ExamDefinition>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read exam data file: {}", path.display()))?;

    parse_exams_str(&content, path)
}

/// Parse a JSON string into exam definitions (useful for testing).
pub fn parse_exams_str(content: &str, source_path: &Path) -> Result<Vec<ExamDefinition>> {
    let value: serde_json::Value = serde_json::from_str(content)
        .with_context(|| format!("failed to parse JSON: {}", source_path.display()))?;

    anyhow::ensure!(
        value.is_array(),
        "exam data file must contain a JSON array: {}",
        source_path.display()
    );

    serde_json::from_value(value)
        .with_context(|| format!("invalid exam definition in {}", source_path.display()))
}

/// Check the invariants the runtime relies on.
///
/// Every question must have at least one option and exactly one correct
/// option, and question numbers must be unique within the exam.
pub fn validate_exam(exam: &ExamDefinition) -> Result<(), ValidationError> {
    if exam.question_count() == 0 {
        return Err(ValidationError::EmptyExam {
            exam_id: exam.id.clone(),
        });
    }

    let mut seen: HashSet<QuestionNumber> = HashSet::new();
    for question in exam.questions() {
        if !seen.insert(question.number) {
            return Err(ValidationError::DuplicateQuestion {
                question: question.number,
            });
        }
        if question.options.is_empty() {
            return Err(ValidationError::NoOptions {
                question: question.number,
            });
        }
        let correct = question.options.iter().filter(|o| o.is_correct).count();
        match correct {
            1 => {}
            0 => {
                return Err(ValidationError::NoCorrectOption {
                    question: question.number,
                })
            }
            count => {
                return Err(ValidationError::MultipleCorrectOptions {
                    question: question.number,
                    count,
                })
            }
        }
    }

    Ok(())
}

/// A non-fatal issue found in an exam definition.
#[derive(Debug, Clone)]
pub struct LintWarning {
    pub question: Option<QuestionNumber>,
    pub message: String,
}

/// Report issues that do not stop a session from running.
pub fn lint_exam(exam: &ExamDefinition) -> Vec<LintWarning> {
    let mut warnings = Vec::new();

    if exam.exam_number_description.trim().is_empty() {
        warnings.push(LintWarning {
            question: None,
            message: "exam has no description".to_string(),
        });
    }

    for question in exam.questions() {
        for (index, option) in question.options.iter().enumerate() {
            if option.text.is_none() && option.image_src.is_none() {
                warnings.push(LintWarning {
                    question: Some(question.number),
                    message: format!("option {} has neither text nor image", index + 1),
                });
            }
        }
    }

    let mut numbers: Vec<QuestionNumber> = exam.questions().map(|q| q.number).collect();
    numbers.sort_unstable();
    for pair in numbers.windows(2) {
        if pair[1] > pair[0] + 1 {
            warnings.push(LintWarning {
                question: Some(pair[1]),
                message: format!("questions {}..{} are missing", pair[0] + 1, pair[1] - 1),
            });
        }
    }

    warnings
}

//! The answer store: one selected option per question.

use std::collections::BTreeMap;

use crate::model::{OptionIndex, QuestionNumber};

/// Question number → selected option. Absent keys are unanswered questions.
pub type Answers = BTreeMap<QuestionNumber, OptionIndex>;

/// Answers of the active session. Writable until frozen at submission.
#[derive(Debug, Clone, Default)]
pub struct AnswerStore {
    answers: Answers,
    frozen: bool,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a selection. Last write wins; returns `false` once frozen.
    pub fn record(&mut self, question: QuestionNumber, option: OptionIndex) -> bool {
        if self.frozen {
            return false;
        }
        self.answers.insert(question, option);
        true
    }

    /// Freeze the store and return the final answers.
    pub fn freeze(&mut self) -> Answers {
        self.frozen = true;
        self.answers.clone()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn get(&self, question: QuestionNumber) -> Option<OptionIndex> {
        self.answers.get(&question).copied()
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    pub fn answered(&self) -> usize {
        self.answers.len()
    }
}

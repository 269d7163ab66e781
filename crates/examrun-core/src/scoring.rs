//! Correct-answer derivation and scoring.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::answers::Answers;
use crate::error::ValidationError;
use crate::model::{ExamDefinition, OptionIndex, QuestionNumber};
use crate::parser::validate_exam;

/// Question number → index of its correct option.
///
/// Derived once per session from a validated exam definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrectAnswers(BTreeMap<QuestionNumber, OptionIndex>);

impl CorrectAnswers {
    /// Validate the exam and extract the correct option of every question.
    pub fn from_exam(exam: &ExamDefinition) -> Result<Self, ValidationError> {
        validate_exam(exam)?;

        let map = exam
            .questions()
            .filter_map(|q| {
                q.options
                    .iter()
                    .position(|o| o.is_correct)
                    .map(|index| (q.number, index))
            })
            .collect();
        Ok(Self(map))
    }

    pub fn get(&self, question: QuestionNumber) -> Option<OptionIndex> {
        self.0.get(&question).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionNumber, OptionIndex)> + '_ {
        self.0.iter().map(|(q, o)| (*q, *o))
    }
}

impl FromIterator<(QuestionNumber, OptionIndex)> for CorrectAnswers {
    fn from_iter<I: IntoIterator<Item = (QuestionNumber, OptionIndex)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Count the questions answered with their correct option.
///
/// Unset answers and answers to unknown questions never count. The result
/// is always within `0..=total_questions`.
pub fn score(answers: &Answers, correct: &CorrectAnswers, total_questions: usize) -> usize {
    let hits = correct
        .iter()
        .filter(|(question, index)| answers.get(question) == Some(index))
        .count();
    hits.min(total_questions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correct_map() -> CorrectAnswers {
        [(1, 0), (2, 1)].into_iter().collect()
    }

    #[test]
    fn one_of_two_correct() {
        let answers: Answers = [(1, 0), (2, 0)].into_iter().collect();
        assert_eq!(score(&answers, &correct_map(), 2), 1);
    }

    #[test]
    fn unset_and_out_of_range_never_count() {
        let answers: Answers = [(2, 7), (9, 0)].into_iter().collect();
        assert_eq!(score(&answers, &correct_map(), 2), 0);
        assert_eq!(score(&Answers::new(), &correct_map(), 2), 0);
    }

    #[test]
    fn score_is_deterministic_and_bounded() {
        let answers: Answers = [(1, 0), (2, 1)].into_iter().collect();
        let first = score(&answers, &correct_map(), 2);
        for _ in 0..10 {
            assert_eq!(score(&answers, &correct_map(), 2), first);
        }
        assert_eq!(first, 2);
        // A total smaller than the key count still bounds the score.
        assert_eq!(score(&answers, &correct_map(), 1), 1);
    }

    #[test]
    fn derive_from_exam() {
        let exam: ExamDefinition = serde_json::from_value(serde_json::json!({
            "id": "x",
            "level": "TOPIK I",
            "skill": "듣기",
            "instruction_groups": [{"questions": [
                {"number": 1, "options": [{"is_correct": false}, {"is_correct": false}, {"is_correct": true}]},
                {"number": 2, "options": [{"is_correct": true}]}
            ]}]
        }))
        .unwrap();
        let correct = CorrectAnswers::from_exam(&exam).unwrap();
        assert_eq!(correct.get(1), Some(2));
        assert_eq!(correct.get(2), Some(0));
        assert_eq!(correct.get(3), None);
        assert_eq!(correct.len(), 2);
    }
}

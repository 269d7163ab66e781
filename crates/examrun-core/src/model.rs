//! Exam definition types.
//!
//! Exam definitions are owned by the catalogue and read-only to the runtime.
//! Question content and markup are carried as opaque JSON; the runtime only
//! looks at question numbers and which option is marked correct.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::duration::duration_for;

/// Question numbers as printed on the exam paper (1-based).
pub type QuestionNumber = u32;

/// Zero-based position of an option within its question.
pub type OptionIndex = usize;

/// A complete exam paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamDefinition {
    /// Catalogue identifier. Numeric ids in the data file are read as strings.
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(default)]
    pub year_description: String,
    #[serde(default)]
    pub exam_number_description: String,
    #[serde(default)]
    pub source: String,
    pub level: Level,
    pub skill: Skill,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub instruction_groups: Vec<InstructionGroup>,
}

/// A block of questions sharing one instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionGroup {
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_content: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_audio_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(default, deserialize_with = "id_from_any")]
    pub id: String,
    pub number: QuestionNumber,
    #[serde(default)]
    pub points: Option<u32>,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_audio_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    #[serde(default, deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image_src: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub is_correct: bool,
}

impl ExamDefinition {
    /// All questions in paper order.
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.instruction_groups
            .iter()
            .flat_map(|group| group.questions.iter())
    }

    pub fn question(&self, number: QuestionNumber) -> Option<&Question> {
        self.questions().find(|q| q.number == number)
    }

    pub fn question_count(&self) -> usize {
        self.instruction_groups.iter().map(|g| g.questions.len()).sum()
    }

    /// Time allowed for this exam, looked up by level and skill.
    pub fn initial_duration(&self) -> u32 {
        duration_for(&self.level, &self.skill)
    }

    /// Descriptive metadata copied into every session result.
    pub fn meta(&self) -> ExamMeta {
        ExamMeta {
            description: non_empty(&self.exam_number_description),
            level: Some(self.level.clone()),
            skill: Some(self.skill.clone()),
            year: non_empty(&self.year_description),
        }
    }

    pub fn summary(&self) -> ExamSummary {
        ExamSummary {
            id: self.id.clone(),
            description: self.exam_number_description.clone(),
            year: self.year_description.clone(),
            level: self.level.clone(),
            skill: self.skill.clone(),
            question_count: self.question_count(),
            duration_secs: self.initial_duration(),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Exam metadata stored alongside a result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<Skill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
}

/// One row of the exam catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamSummary {
    pub id: String,
    pub description: String,
    pub year: String,
    pub level: Level,
    pub skill: Skill,
    pub question_count: usize,
    pub duration_secs: u32,
}

/// TOPIK level.
///
/// The data files spell levels with either Roman-numeral glyphs
/// ("TOPIK Ⅱ") or ASCII ("TOPIK II"); both parse to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Level {
    TopikI,
    TopikII,
    Other(String),
}

impl FromStr for Level {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('Ⅰ', "I").replace('Ⅱ', "II").to_uppercase();
        let suffix = normalized
            .strip_prefix("TOPIK")
            .unwrap_or(&normalized)
            .trim();
        Ok(match suffix {
            "I" | "1" => Level::TopikI,
            "II" | "2" => Level::TopikII,
            _ => Level::Other(s.to_string()),
        })
    }
}

impl From<String> for Level {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(level) => level,
            Err(never) => match never {},
        }
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.to_string()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::TopikI => write!(f, "TOPIK I"),
            Level::TopikII => write!(f, "TOPIK II"),
            Level::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Exam skill. Serialized with the Korean names used by the data files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Skill {
    Listening,
    Reading,
    Writing,
    Other(String),
}

impl FromStr for Skill {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "듣기" | "listening" | "Listening" | "Nghe" => Skill::Listening,
            "읽기" | "reading" | "Reading" | "Đọc" => Skill::Reading,
            "쓰기" | "writing" | "Writing" | "Viết" => Skill::Writing,
            other => Skill::Other(other.to_string()),
        })
    }
}

impl From<String> for Skill {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(skill) => skill,
            Err(never) => match never {},
        }
    }
}

impl From<Skill> for String {
    fn from(skill: Skill) -> Self {
        skill.to_string()
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skill::Listening => write!(f, "듣기"),
            Skill::Reading => write!(f, "읽기"),
            Skill::Writing => write!(f, "쓰기"),
            Skill::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Float(f64),
}

/// Accept identifiers written either as JSON strings or numbers.
pub(crate) fn id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Float(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parses_glyphs_and_ascii() {
        assert_eq!("TOPIK Ⅰ".parse::<Level>().unwrap(), Level::TopikI);
        assert_eq!("TOPIK I".parse::<Level>().unwrap(), Level::TopikI);
        assert_eq!("TOPIK Ⅱ".parse::<Level>().unwrap(), Level::TopikII);
        assert_eq!("topik ii".parse::<Level>().unwrap(), Level::TopikII);
        assert_eq!(
            "TOPIK III".parse::<Level>().unwrap(),
            Level::Other("TOPIK III".into())
        );
    }

    #[test]
    fn skill_parses_korean_names() {
        assert_eq!("듣기".parse::<Skill>().unwrap(), Skill::Listening);
        assert_eq!("읽기".parse::<Skill>().unwrap(), Skill::Reading);
        assert_eq!("Viết".parse::<Skill>().unwrap(), Skill::Writing);
        assert_eq!(Skill::Reading.to_string(), "읽기");
    }

    #[test]
    fn exam_with_numeric_id_deserializes() {
        let json = serde_json::json!({
            "id": 91,
            "level": "TOPIK Ⅱ",
            "skill": "읽기",
            "exam_number_description": "제91회",
            "year_description": "2023년도",
            "instruction_groups": [{
                "type": "instruction_group",
                "instruction": "Choose the best answer.",
                "questions": [{
                    "id": "q1",
                    "number": 1,
                    "content": {"type": "text", "value": "..."},
                    "options": [
                        {"id": "a", "text": "A", "is_correct": false},
                        {"id": "b", "text": "B", "is_correct": true}
                    ]
                }]
            }]
        });
        let exam: ExamDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(exam.id, "91");
        assert_eq!(exam.level, Level::TopikII);
        assert_eq!(exam.question_count(), 1);
        assert_eq!(exam.initial_duration(), 4200);
        assert_eq!(exam.meta().description.as_deref(), Some("제91회"));
    }
}

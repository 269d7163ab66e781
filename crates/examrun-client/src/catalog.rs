//! Exam catalogue backed by a JSON data file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use examrun_core::error::CatalogError;
use examrun_core::model::{ExamDefinition, ExamSummary};
use examrun_core::parser::load_exams;
use examrun_core::traits::ExamCatalog;

/// All exams of one data file, held in memory.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    source: PathBuf,
    exams: Vec<ExamDefinition>,
}

impl JsonCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let exams = load_exams(path).map_err(|e| CatalogError::Load(format!("{e:#}")))?;
        debug!(path = %path.display(), count = exams.len(), "exam catalogue loaded");
        Ok(Self::from_exams(path, exams))
    }

    pub fn from_exams(source: &Path, exams: Vec<ExamDefinition>) -> Self {
        let mut seen = HashSet::new();
        for exam in &exams {
            if !seen.insert(exam.id.as_str()) {
                warn!(exam_id = %exam.id, "duplicate exam id, the first definition wins");
            }
        }
        Self {
            source: source.to_path_buf(),
            exams,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn exams(&self) -> &[ExamDefinition] {
        &self.exams
    }

    pub fn len(&self) -> usize {
        self.exams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exams.is_empty()
    }
}

impl ExamCatalog for JsonCatalog {
    fn get(&self, exam_id: &str) -> Result<ExamDefinition, CatalogError> {
        self.exams
            .iter()
            .find(|exam| exam.id == exam_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(exam_id.to_string()))
    }

    fn list(&self) -> Vec<ExamSummary> {
        self.exams.iter().map(ExamDefinition::summary).collect()
    }
}

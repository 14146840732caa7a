//! Data model shared by the gateway, the matching engine and the scorer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Mode;
use crate::text::language::Language;

/// Which document an extraction call reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionKind {
    JobRequirements,
    CandidateProfile,
}

impl ExtractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionKind::JobRequirements => "job_extraction",
            ExtractionKind::CandidateProfile => "cv_extraction",
        }
    }
}

/// Structured lists extracted from free text. Missing keys decode as empty
/// lists, so a partially shaped payload still yields a usable profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedProfile {
    pub technical_skills: Vec<String>,
    pub soft_skills: Vec<String>,
    pub methodologies: Vec<String>,
    pub education: Vec<String>,
    pub experience: Vec<String>,
}

impl ExtractedProfile {
    pub fn is_empty(&self) -> bool {
        self.technical_skills.is_empty()
            && self.soft_skills.is_empty()
            && self.methodologies.is_empty()
            && self.education.is_empty()
            && self.experience.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.technical_skills.len()
            + self.soft_skills.len()
            + self.methodologies.len()
            + self.education.len()
            + self.experience.len()
    }
}

/// The four scored categories. Education and experience are scored together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    TechnicalSkills,
    SoftSkills,
    Methodologies,
    ExperienceEducation,
}

impl ScoreCategory {
    pub const ALL: [ScoreCategory; 4] = [
        ScoreCategory::TechnicalSkills,
        ScoreCategory::SoftSkills,
        ScoreCategory::Methodologies,
        ScoreCategory::ExperienceEducation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreCategory::TechnicalSkills => "technical_skills",
            ScoreCategory::SoftSkills => "soft_skills",
            ScoreCategory::Methodologies => "methodologies",
            ScoreCategory::ExperienceEducation => "experience_education",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Semantic,
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    ResumeSentence,
}

/// One accepted pairing between a job-side item and a candidate-side item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub job_item: String,
    pub candidate_item: String,
    pub similarity: f64,
    pub match_type: MatchType,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_type: Option<EvidenceType>,
}

/// Outcome of matching one job-side list against one candidate-side list.
/// Every job item lands in exactly one of `matches` or `unmatched_job`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub matches: Vec<SkillMatch>,
    pub unmatched_job: Vec<String>,
    pub unmatched_candidate: Vec<String>,
}

impl ComparisonResult {
    /// Result used when no comparison could be made: nothing matches.
    pub fn all_unmatched(job_items: &[String], candidate_items: &[String]) -> Self {
        Self {
            matches: Vec::new(),
            unmatched_job: job_items.to_vec(),
            unmatched_candidate: candidate_items.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintRequirement {
    Years { years: u32, comparator: String },
    Level { level: String },
}

/// An explicit experience demand found in the job text, e.g. "5+ years in Rust".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceConstraint {
    #[serde(flatten)]
    pub requirement: ConstraintRequirement,
    pub field: String,
    pub raw_text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FitScores {
    pub technical_skills: f64,
    pub soft_skills: f64,
    pub methodologies: f64,
    pub experience_education: f64,
    pub overall: f64,
}

impl FitScores {
    pub fn category(&self, category: ScoreCategory) -> f64 {
        match category {
            ScoreCategory::TechnicalSkills => self.technical_skills,
            ScoreCategory::SoftSkills => self.soft_skills,
            ScoreCategory::Methodologies => self.methodologies,
            ScoreCategory::ExperienceEducation => self.experience_education,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl FitLevel {
    pub fn color(&self) -> &'static str {
        match self {
            FitLevel::Excellent => "green",
            FitLevel::Good => "orange",
            FitLevel::Fair => "yellow",
            FitLevel::Poor => "red",
        }
    }
}

/// A match as presented after concept-level dedup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedItem {
    pub job_keyword: String,
    pub resume_keyword: String,
    pub match_type: MatchType,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_type: Option<EvidenceType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub matched: Vec<MatchedItem>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recommendations {
    pub learn_skills: Vec<String>,
    pub highlight_skills: Vec<String>,
    pub add_experience: Vec<String>,
    pub specific_examples: Vec<String>,
}

/// Job-side extraction plus the constraints mined from the raw job text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRequirements {
    #[serde(flatten)]
    pub profile: ExtractedProfile,
    pub experience_constraints: Vec<ExperienceConstraint>,
}

/// Everything one analysis run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub run_id: Uuid,
    pub mode: Mode,
    pub detected_language: Language,
    pub overall_score: f64,
    pub fit_level: FitLevel,
    pub fit_color: String,
    pub scores: FitScores,
    pub categories: BTreeMap<ScoreCategory, CategoryReport>,
    pub detailed_results: BTreeMap<ScoreCategory, ComparisonResult>,
    pub job_requirements: JobRequirements,
    pub candidate_profile: ExtractedProfile,
    pub experience_constraints: Vec<ExperienceConstraint>,
    pub recommendations: Recommendations,
    pub degraded: bool,
    pub stages: Vec<String>,
}

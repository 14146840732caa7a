use serde::{Deserialize, Serialize};

use crate::models::ScoreCategory;

/// Per-category weights of the overall fit score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub technical_skills: f64,
    pub soft_skills: f64,
    pub methodologies: f64,
    pub experience_education: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            technical_skills: 0.40,
            soft_skills: 0.25,
            methodologies: 0.20,
            experience_education: 0.15,
        }
    }
}

impl ScoringWeights {
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.technical_skills,
            self.soft_skills,
            self.methodologies,
            self.experience_education,
        ]
    }

    pub fn weight(&self, category: ScoreCategory) -> f64 {
        match category {
            ScoreCategory::TechnicalSkills => self.technical_skills,
            ScoreCategory::SoftSkills => self.soft_skills,
            ScoreCategory::Methodologies => self.methodologies,
            ScoreCategory::ExperienceEducation => self.experience_education,
        }
    }

    /// Clamps negative or non-finite entries to zero and rescales to sum to 1.
    /// `None` when nothing positive remains.
    pub fn normalized(&self) -> Option<ScoringWeights> {
        let clean = self.as_array().map(|w| if w.is_finite() && w > 0.0 { w } else { 0.0 });
        let total: f64 = clean.iter().sum();
        if total <= 0.0 {
            return None;
        }
        Some(ScoringWeights {
            technical_skills: clean[0] / total,
            soft_skills: clean[1] / total,
            methodologies: clean[2] / total,
            experience_education: clean[3] / total,
        })
    }

    /// Normalised weights, else the normalised `fallback`, else the defaults.
    pub fn normalized_or(&self, fallback: &ScoringWeights) -> ScoringWeights {
        self.normalized()
            .or_else(|| fallback.normalized())
            .unwrap_or_default()
    }
}

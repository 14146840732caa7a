//! Scoring engine: per-category percentages, the internship-discounted
//! experience score, the weighted overall score and its fit band.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::FitLevelBands;
use crate::models::{ComparisonResult, FitLevel, FitScores, ScoreCategory};
use crate::text::normalize::normalize_for_classification;

pub mod constraints;
pub mod dedup;
pub mod weights;

use weights::ScoringWeights;

static INTERNSHIP_OR_PROJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:stagiaire|stage|intern|internship|apprentice|apprenticeship|apprentissage|alternance|projet|project|pfe|capstone)s?\b",
    )
    .expect("valid internship regex")
});

/// `matched / total * 100`; 100 when nothing is required.
pub fn category_score(result: &ComparisonResult, total_requirements: usize) -> f64 {
    if total_requirements == 0 {
        return 100.0;
    }
    result.matches.len() as f64 / total_requirements as f64 * 100.0
}

/// True when an experience/education entry describes an internship or a
/// project rather than a full position.
pub fn is_internship_or_project(text: &str) -> bool {
    INTERNSHIP_OR_PROJECT.is_match(&normalize_for_classification(text))
}

/// Like [`category_score`], but a match whose candidate item is an
/// internship or project only counts for `internship_discount`.
pub fn experience_score(
    result: &ComparisonResult,
    total_requirements: usize,
    internship_discount: f64,
) -> f64 {
    if total_requirements == 0 {
        return 100.0;
    }
    let credit: f64 = result
        .matches
        .iter()
        .map(|m| {
            if is_internship_or_project(&m.candidate_item) {
                internship_discount
            } else {
                1.0
            }
        })
        .sum();
    credit / total_requirements as f64 * 100.0
}

/// Weighted sum of the four category scores. Weights are renormalised
/// first; a vector with nothing positive falls back to `fallback`.
pub fn overall_fit(scores: &FitScores, weights: &ScoringWeights, fallback: &ScoringWeights) -> f64 {
    let weights = weights.normalized_or(fallback);
    ScoreCategory::ALL
        .iter()
        .map(|c| scores.category(*c) * weights.weight(*c))
        .sum()
}

pub fn fit_level(score: f64, bands: &FitLevelBands) -> FitLevel {
    if score >= bands.excellent {
        FitLevel::Excellent
    } else if score >= bands.good {
        FitLevel::Good
    } else if score >= bands.fair {
        FitLevel::Fair
    } else {
        FitLevel::Poor
    }
}

/// One decimal place, as scores are reported.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchType, SkillMatch};

    fn matched(job: &str, candidate: &str) -> SkillMatch {
        SkillMatch {
            job_item: job.to_string(),
            candidate_item: candidate.to_string(),
            similarity: 0.9,
            match_type: MatchType::Exact,
            confidence: 0.9,
            evidence_snippet: None,
            evidence_type: None,
        }
    }

    fn result_with(matches: Vec<SkillMatch>, unmatched: &[&str]) -> ComparisonResult {
        ComparisonResult {
            matches,
            unmatched_job: unmatched.iter().map(|s| s.to_string()).collect(),
            unmatched_candidate: Vec::new(),
        }
    }

    #[test]
    fn test_static_patterns_compile() {
        LazyLock::force(&INTERNSHIP_OR_PROJECT);
    }

    #[test]
    fn test_no_requirements_scores_full() {
        assert_eq!(category_score(&ComparisonResult::default(), 0), 100.0);
        assert_eq!(experience_score(&ComparisonResult::default(), 0, 0.5), 100.0);
    }

    #[test]
    fn test_scenario_b_unmatched_requirement_scores_zero() {
        let result = result_with(Vec::new(), &["kubernetes"]);
        assert_eq!(category_score(&result, 1), 0.0);
    }

    #[test]
    fn test_category_score_ratio() {
        let result = result_with(
            vec![matched("python", "python"), matched("docker", "docker")],
            &["go", "rust"],
        );
        assert_eq!(category_score(&result, 4), 50.0);
    }

    #[test]
    fn test_scenario_d_internship_counts_half() {
        let result = result_with(
            vec![matched("Backend experience", "Internship — built REST API")],
            &[],
        );
        assert_eq!(experience_score(&result, 1, 0.5), 50.0);
    }

    #[test]
    fn test_full_position_counts_fully() {
        let result = result_with(
            vec![
                matched("Backend experience", "Senior Backend Engineer"),
                matched("Robotics", "Capstone project on SLAM"),
            ],
            &[],
        );
        assert_eq!(experience_score(&result, 2, 0.5), 75.0);
    }

    #[test]
    fn test_internship_keywords_match_whole_words() {
        assert!(is_internship_or_project("Stage de fin d'études chez Thales"));
        assert!(is_internship_or_project("Software Engineering Intern"));
        assert!(is_internship_or_project("Side projects in Rust"));
        assert!(!is_internship_or_project("International sales manager"));
        assert!(!is_internship_or_project("Backstage platform lead"));
    }

    #[test]
    fn test_overall_fit_is_weighted_sum() {
        let scores = FitScores {
            technical_skills: 80.0,
            soft_skills: 60.0,
            methodologies: 50.0,
            experience_education: 100.0,
            overall: 0.0,
        };
        let expected = 0.40 * 80.0 + 0.25 * 60.0 + 0.20 * 50.0 + 0.15 * 100.0;
        assert!((overall_fit(&scores, &ScoringWeights::default(), &ScoringWeights::default()) - expected).abs() < 1e-9);

        let custom = ScoringWeights {
            technical_skills: 0.1,
            soft_skills: 0.2,
            methodologies: 0.3,
            experience_education: 0.4,
        };
        let expected = 0.1 * 80.0 + 0.2 * 60.0 + 0.3 * 50.0 + 0.4 * 100.0;
        assert!((overall_fit(&scores, &custom, &ScoringWeights::default()) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_overall_fit_zero_weights_use_fallback() {
        let scores = FitScores {
            technical_skills: 100.0,
            ..FitScores::default()
        };
        let zero = ScoringWeights {
            technical_skills: 0.0,
            soft_skills: 0.0,
            methodologies: 0.0,
            experience_education: 0.0,
        };
        let overall = overall_fit(&scores, &zero, &ScoringWeights::default());
        assert!(overall.is_finite());
        assert!((overall - 40.0).abs() < 1e-9);

        let technical_only = ScoringWeights {
            technical_skills: 1.0,
            ..zero
        };
        assert!((overall_fit(&scores, &zero, &technical_only) - 100.0).abs() < 1e-9);
        assert!((overall_fit(&scores, &zero, &zero) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_level_bands() {
        let bands = FitLevelBands::default();
        assert_eq!(fit_level(80.0, &bands), FitLevel::Excellent);
        assert_eq!(fit_level(79.9, &bands), FitLevel::Good);
        assert_eq!(fit_level(60.0, &bands), FitLevel::Good);
        assert_eq!(fit_level(40.0, &bands), FitLevel::Fair);
        assert_eq!(fit_level(39.99, &bands), FitLevel::Poor);
        assert_eq!(fit_level(0.0, &bands), FitLevel::Poor);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(66.666), 66.7);
        assert_eq!(round1(50.0), 50.0);
    }
}

//! Analysis pipeline: sequences one run from raw texts to an
//! [`AnalysisResult`].
//!
//! Flow: detect language → extract both profiles (plus job-specific
//! weights) → clean up extractions → match per category → score →
//! recommendations → concept-level dedup for the report.
//!
//! Gateway failures never abort a run. A run whose job extraction could not
//! be obtained ends with a neutral, all-zero result flagged `degraded`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::postprocess::{
    fix_sentence_splitting, merge_enrichment, reclassify_education_fields,
    reclassify_tech_from_edu_exp, tidy_profile, without_duration_phrases,
};
use crate::analysis::recommendations::merge_missing_skills;
use crate::config::{EngineSettings, Mode};
use crate::errors::AppError;
use crate::gateway::{CallContext, CancellationToken, Gateway};
use crate::matching::{ContextMatcher, MatchingEngine};
use crate::models::{
    AnalysisResult, CategoryReport, ComparisonResult, ExperienceConstraint, ExtractedProfile,
    ExtractionKind, FitLevel, FitScores, JobRequirements, Recommendations, ScoreCategory,
};
use crate::scoring::constraints::extract_experience_constraints;
use crate::scoring::dedup::dedup_category;
use crate::scoring::weights::ScoringWeights;
use crate::scoring::{category_score, experience_score, fit_level, overall_fit, round1};
use crate::text::canonical::AliasTable;
use crate::text::language::{detect_language, Language};

// ────────────────────────────────────────────────────────────────────────────
// Run states
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Init,
    LanguageDetected,
    Extracted,
    Matched,
    Scored,
    Recommended,
    Done,
    Degraded,
}

impl AnalysisState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisState::Init => "init",
            AnalysisState::LanguageDetected => "language_detected",
            AnalysisState::Extracted => "extracted",
            AnalysisState::Matched => "matched",
            AnalysisState::Scored => "scored",
            AnalysisState::Recommended => "recommended",
            AnalysisState::Done => "done",
            AnalysisState::Degraded => "degraded",
        }
    }
}

/// Ordered trace of the states one run visits.
#[derive(Debug)]
struct StageTrace {
    run_id: Uuid,
    stages: Vec<AnalysisState>,
}

impl StageTrace {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            stages: vec![AnalysisState::Init],
        }
    }

    fn enter(&mut self, state: AnalysisState) {
        info!(run_id = %self.run_id, stage = state.as_str(), "analysis stage");
        self.stages.push(state);
    }

    fn into_names(self) -> Vec<String> {
        self.stages.iter().map(|s| s.as_str().to_string()).collect()
    }
}

/// Cleaned extractions of both sides plus what was mined from the job text.
struct Profiles {
    job: ExtractedProfile,
    candidate: ExtractedProfile,
    constraints: Vec<ExperienceConstraint>,
    weights: ScoringWeights,
}

// ────────────────────────────────────────────────────────────────────────────
// Analyzer
// ────────────────────────────────────────────────────────────────────────────

pub struct JobFitAnalyzer {
    gateway: Arc<dyn Gateway>,
    settings: EngineSettings,
    aliases: AliasTable,
}

impl JobFitAnalyzer {
    /// Fails only on settings that cannot be used, see
    /// [`EngineSettings::validate`].
    pub fn new(gateway: Arc<dyn Gateway>, settings: EngineSettings) -> Result<Self, AppError> {
        settings.validate()?;
        Ok(Self {
            gateway,
            settings,
            aliases: AliasTable::default(),
        })
    }

    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Scores `cv_text` against `job_text`. Never fails: gateway problems
    /// surface as `degraded` on the result.
    pub async fn analyze(
        &self,
        job_text: &str,
        cv_text: &str,
        mode: Mode,
        cancel: CancellationToken,
    ) -> AnalysisResult {
        let run_id = Uuid::new_v4();
        let mut trace = StageTrace::new(run_id);

        let language = detect_language(cv_text);
        trace.enter(AnalysisState::LanguageDetected);
        let ctx = CallContext::new(mode, language, cancel);
        info!(
            run_id = %run_id,
            mode = mode.as_str(),
            language = language.code(),
            "starting analysis"
        );

        if !self.gateway.is_available() {
            warn!(run_id = %run_id, "extraction capability unavailable; returning neutral result");
            return self.neutral_result(run_id, mode, language, job_text, trace);
        }

        let Some(profiles) = self.extract_profiles(job_text, cv_text, &ctx).await else {
            warn!(run_id = %run_id, "job extraction failed; returning neutral result");
            return self.neutral_result(run_id, mode, language, job_text, trace);
        };
        trace.enter(AnalysisState::Extracted);
        info!(
            run_id = %run_id,
            job_items = profiles.job.item_count(),
            candidate_items = profiles.candidate.item_count(),
            constraints = profiles.constraints.len(),
            "profiles extracted"
        );

        let job_ee = experience_education_items(&profiles.job);
        let candidate_ee = experience_education_items(&profiles.candidate);
        let detailed = self
            .match_categories(&profiles, &job_ee, &candidate_ee, cv_text, &ctx)
            .await;
        trace.enter(AnalysisState::Matched);

        let scores = self.score(&profiles, &detailed, job_ee.len());
        let level = fit_level(scores.overall, &self.settings.fit_levels);
        trace.enter(AnalysisState::Scored);
        info!(
            run_id = %run_id,
            overall = scores.overall,
            fit_level = ?level,
            "scores computed"
        );

        let recommendations = self
            .recommend(&profiles.job, &profiles.candidate, &scores, &ctx)
            .await;
        trace.enter(AnalysisState::Recommended);

        let categories: BTreeMap<ScoreCategory, CategoryReport> = detailed
            .iter()
            .map(|(category, result)| (*category, dedup_category(result, &self.aliases)))
            .collect();

        let degraded = ctx.is_degraded();
        if degraded {
            for event in ctx.degradations() {
                warn!(run_id = %run_id, operation = event.operation, reason = ?event.reason, "degraded call");
            }
            trace.enter(AnalysisState::Degraded);
        }
        trace.enter(AnalysisState::Done);

        let Profiles {
            job,
            candidate,
            constraints,
            ..
        } = profiles;

        AnalysisResult {
            run_id,
            mode,
            detected_language: language,
            overall_score: scores.overall,
            fit_level: level,
            fit_color: level.color().to_string(),
            scores,
            categories,
            detailed_results: detailed,
            job_requirements: JobRequirements {
                profile: job,
                experience_constraints: constraints.clone(),
            },
            candidate_profile: candidate,
            experience_constraints: constraints,
            recommendations,
            degraded,
            stages: trace.into_names(),
        }
    }

    /// Extracts and cleans both profiles. `None` when the job side could
    /// not be extracted at all.
    async fn extract_profiles(
        &self,
        job_text: &str,
        cv_text: &str,
        ctx: &CallContext,
    ) -> Option<Profiles> {
        let (job, candidate, weights) = futures::join!(
            self.gateway
                .extract(job_text, ExtractionKind::JobRequirements, ctx),
            self.gateway
                .extract(cv_text, ExtractionKind::CandidateProfile, ctx),
            self.gateway.infer_category_weights(job_text, ctx),
        );
        if job.is_degraded() && job.value.is_empty() {
            return None;
        }

        let mut job = tidy_profile(job.into_value());
        let mut candidate = tidy_profile(candidate.into_value());

        if ctx.mode == Mode::Deep {
            let (job_enrichment, candidate_enrichment) = futures::join!(
                self.enrichment_for(&job, ctx),
                self.enrichment_for(&candidate, ctx),
            );
            apply_enrichment(&mut job, &job_enrichment);
            apply_enrichment(&mut candidate, &candidate_enrichment);
        }

        let constraints = extract_experience_constraints(job_text);

        reclassify_education_fields(&mut job, job_text);
        reclassify_tech_from_edu_exp(&mut job);
        fix_sentence_splitting(&mut job);
        reclassify_tech_from_edu_exp(&mut candidate);

        let weights = match weights.into_value() {
            Some(inferred) => inferred.normalized().unwrap_or_else(|| {
                warn!(?inferred, "inferred category weights unusable; using defaults");
                self.settings.scoring_weights
            }),
            None => self.settings.scoring_weights,
        };

        Some(Profiles {
            job,
            candidate,
            constraints,
            weights,
        })
    }

    /// Related terms for the profile's technical skills and methodologies.
    async fn enrichment_for(
        &self,
        profile: &ExtractedProfile,
        ctx: &CallContext,
    ) -> HashMap<String, Vec<String>> {
        let terms: Vec<String> = profile
            .technical_skills
            .iter()
            .chain(&profile.methodologies)
            .cloned()
            .collect();
        if terms.is_empty() {
            return HashMap::new();
        }
        self.gateway.enrich_terms(&terms, ctx).await.into_value()
    }

    async fn match_categories(
        &self,
        profiles: &Profiles,
        job_ee: &[String],
        candidate_ee: &[String],
        cv_text: &str,
        ctx: &CallContext,
    ) -> BTreeMap<ScoreCategory, ComparisonResult> {
        let engine = MatchingEngine::new(self.gateway.as_ref(), &self.settings);
        let context = ContextMatcher::with_aliases(&engine, self.aliases.clone());
        let thresholds = self.settings.thresholds(ctx.mode);
        let deep = ctx.mode == Mode::Deep;
        let (job, candidate) = (&profiles.job, &profiles.candidate);

        let technical = async {
            match context
                .match_with_context(
                    &job.technical_skills,
                    &candidate.technical_skills,
                    cv_text,
                    thresholds.technical,
                    ctx,
                )
                .await
            {
                Ok(result) => result,
                Err(err) => {
                    warn!(error = %err, "context matching unavailable; using explicit matching");
                    engine
                        .compare(
                            &job.technical_skills,
                            &candidate.technical_skills,
                            thresholds.technical,
                            deep,
                            deep,
                            ctx,
                        )
                        .await
                }
            }
        };

        let (technical, soft, methodologies, experience) = futures::join!(
            technical,
            engine.compare(
                &job.soft_skills,
                &candidate.soft_skills,
                thresholds.soft,
                deep,
                deep,
                ctx,
            ),
            engine.compare(
                &job.methodologies,
                &candidate.methodologies,
                thresholds.methodologies,
                deep,
                deep,
                ctx,
            ),
            engine.compare_domain_filtered(
                job_ee,
                candidate_ee,
                thresholds.experience_education,
                deep,
                deep,
                ctx,
            ),
        );

        BTreeMap::from([
            (ScoreCategory::TechnicalSkills, technical),
            (ScoreCategory::SoftSkills, soft),
            (ScoreCategory::Methodologies, methodologies),
            (ScoreCategory::ExperienceEducation, experience),
        ])
    }

    fn score(
        &self,
        profiles: &Profiles,
        detailed: &BTreeMap<ScoreCategory, ComparisonResult>,
        experience_total: usize,
    ) -> FitScores {
        let job = &profiles.job;

        let mut scores = FitScores {
            technical_skills: round1(category_score(
                result_for(detailed, ScoreCategory::TechnicalSkills),
                job.technical_skills.len(),
            )),
            soft_skills: round1(category_score(
                result_for(detailed, ScoreCategory::SoftSkills),
                job.soft_skills.len(),
            )),
            methodologies: round1(category_score(
                result_for(detailed, ScoreCategory::Methodologies),
                job.methodologies.len(),
            )),
            experience_education: round1(experience_score(
                result_for(detailed, ScoreCategory::ExperienceEducation),
                experience_total,
                self.settings.internship_discount,
            )),
            overall: 0.0,
        };
        scores.overall = round1(overall_fit(
            &scores,
            &profiles.weights,
            &self.settings.scoring_weights,
        ));
        scores
    }

    async fn recommend(
        &self,
        job: &ExtractedProfile,
        candidate: &ExtractedProfile,
        scores: &FitScores,
        ctx: &CallContext,
    ) -> Recommendations {
        let (recommendations, missing) = futures::join!(
            self.gateway
                .generate_recommendations(job, candidate, scores, ctx),
            self.gateway.identify_missing_skills(
                &job.technical_skills,
                &candidate.technical_skills,
                ctx
            ),
        );
        merge_missing_skills(recommendations.into_value(), &missing.into_value())
    }

    /// All-zero Poor result for a run with nothing to score against. The
    /// regex-mined constraints are still reported.
    fn neutral_result(
        &self,
        run_id: Uuid,
        mode: Mode,
        language: Language,
        job_text: &str,
        mut trace: StageTrace,
    ) -> AnalysisResult {
        trace.enter(AnalysisState::Degraded);
        trace.enter(AnalysisState::Done);
        let constraints = extract_experience_constraints(job_text);
        let level = FitLevel::Poor;
        AnalysisResult {
            run_id,
            mode,
            detected_language: language,
            overall_score: 0.0,
            fit_level: level,
            fit_color: level.color().to_string(),
            scores: FitScores::default(),
            categories: ScoreCategory::ALL
                .iter()
                .map(|c| (*c, CategoryReport::default()))
                .collect(),
            detailed_results: ScoreCategory::ALL
                .iter()
                .map(|c| (*c, ComparisonResult::default()))
                .collect(),
            job_requirements: JobRequirements {
                profile: ExtractedProfile::default(),
                experience_constraints: constraints.clone(),
            },
            candidate_profile: ExtractedProfile::default(),
            experience_constraints: constraints,
            recommendations: Recommendations::default(),
            degraded: true,
            stages: trace.into_names(),
        }
    }
}

fn result_for(
    detailed: &BTreeMap<ScoreCategory, ComparisonResult>,
    category: ScoreCategory,
) -> &ComparisonResult {
    static EMPTY: ComparisonResult = ComparisonResult {
        matches: Vec::new(),
        unmatched_job: Vec::new(),
        unmatched_candidate: Vec::new(),
    };
    detailed.get(&category).unwrap_or(&EMPTY)
}

fn apply_enrichment(profile: &mut ExtractedProfile, enrichment: &HashMap<String, Vec<String>>) {
    if enrichment.is_empty() {
        return;
    }
    profile.technical_skills = merge_enrichment(&profile.technical_skills, enrichment);
    profile.methodologies = merge_enrichment(&profile.methodologies, enrichment);
}

/// Education plus experience items that describe more than a duration.
fn experience_education_items(profile: &ExtractedProfile) -> Vec<String> {
    profile
        .education
        .iter()
        .cloned()
        .chain(without_duration_phrases(&profile.experience))
        .collect()
}

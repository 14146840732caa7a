//! Hybrid item-to-item matching.
//!
//! Each item becomes an [`EmbeddingBundle`] (the item plus its variants,
//! each with an optional vector). Job items are then visited in input order
//! and greedily paired with the best remaining candidate item.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use tracing::{debug, warn};

use crate::config::{EngineSettings, MatchTypeBands};
use crate::gateway::{CallContext, Gateway};
use crate::matching::lexical::bm25_similarity;
use crate::matching::semantic::best_cross_similarity;
use crate::models::{ComparisonResult, MatchType, SkillMatch};
use crate::text::normalize::{normalize, preprocess_for_embedding};

/// An item, its distinct phrasings (the item first) and one optional vector
/// per phrasing.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingBundle {
    pub item: String,
    pub variants: Vec<String>,
    pub vectors: Vec<Option<Vec<f32>>>,
}

impl EmbeddingBundle {
    pub fn has_vectors(&self) -> bool {
        self.vectors.iter().any(Option::is_some)
    }
}

/// Labels a combined score with its confidence band.
pub fn classify_match(score: f64, bands: &MatchTypeBands) -> MatchType {
    if score >= bands.exact {
        MatchType::Exact
    } else if score >= bands.semantic {
        MatchType::Semantic
    } else {
        MatchType::Partial
    }
}

/// Distinct phrasings of `item`: the item, then `extra` in order, dedup by
/// matching normal form, capped at `limit`.
pub fn variants_for(item: &str, extra: &[String], limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    std::iter::once(item)
        .chain(extra.iter().map(String::as_str))
        .filter(|v| {
            let key = normalize(v);
            !key.is_empty() && seen.insert(key)
        })
        .take(limit.max(1))
        .map(str::to_string)
        .collect()
}

pub struct MatchingEngine<'a> {
    gateway: &'a dyn Gateway,
    settings: &'a EngineSettings,
}

impl<'a> MatchingEngine<'a> {
    pub fn new(gateway: &'a dyn Gateway, settings: &'a EngineSettings) -> Self {
        Self { gateway, settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        self.settings
    }

    /// Embeds one text as the engine always does: preprocessed for the
    /// run's language. Failure yields `None`.
    pub async fn embed_text(&self, text: &str, ctx: &CallContext) -> Option<Vec<f32>> {
        let prepared = preprocess_for_embedding(text, ctx.language);
        if prepared.is_empty() {
            return None;
        }
        let vector = self.gateway.embed(&prepared, ctx).await.into_value();
        (!vector.is_empty()).then_some(vector)
    }

    /// Embeds many texts concurrently; results follow input order.
    pub async fn embed_all(&self, texts: &[String], ctx: &CallContext) -> Vec<Option<Vec<f32>>> {
        join_all(texts.iter().map(|t| self.embed_text(t, ctx))).await
    }

    /// Builds one bundle per item. `extra` supplies additional phrasings
    /// keyed by the item's exact text.
    pub async fn build_bundles(
        &self,
        items: &[String],
        extra: &HashMap<String, Vec<String>>,
        ctx: &CallContext,
    ) -> Vec<EmbeddingBundle> {
        let limit = self.settings.max_enrich_variants;
        let variant_lists: Vec<Vec<String>> = items
            .iter()
            .map(|item| {
                let more = extra.get(item).map(Vec::as_slice).unwrap_or(&[]);
                variants_for(item, more, limit)
            })
            .collect();

        let flat: Vec<String> = variant_lists.iter().flatten().cloned().collect();
        let mut vectors = self.embed_all(&flat, ctx).await.into_iter();

        items
            .iter()
            .zip(variant_lists)
            .map(|(item, variants)| {
                let vectors = vectors.by_ref().take(variants.len()).collect();
                EmbeddingBundle {
                    item: item.clone(),
                    variants,
                    vectors,
                }
            })
            .collect()
    }

    /// Matches job-side items against candidate-side items.
    ///
    /// With `enrich`, related phrasings from the gateway join each bundle.
    /// With `hybrid`, the semantic score is blended with lexical similarity
    /// of the two items' normal forms.
    pub async fn compare(
        &self,
        job_items: &[String],
        candidate_items: &[String],
        threshold: f64,
        enrich: bool,
        hybrid: bool,
        ctx: &CallContext,
    ) -> ComparisonResult {
        if job_items.is_empty() || candidate_items.is_empty() {
            return ComparisonResult::all_unmatched(job_items, candidate_items);
        }

        let (job_extra, candidate_extra) = if enrich {
            let (job, candidate) = futures::join!(
                self.gateway.enrich_terms(job_items, ctx),
                self.gateway.enrich_terms(candidate_items, ctx)
            );
            (job.into_value(), candidate.into_value())
        } else {
            (HashMap::new(), HashMap::new())
        };

        self.compare_with_variants(
            job_items,
            candidate_items,
            &job_extra,
            &candidate_extra,
            threshold,
            hybrid,
            ctx,
        )
        .await
    }

    /// Experience/education entry point. Currently the same semantics as
    /// [`compare`](Self::compare); a domain pre-filter would slot in here.
    pub async fn compare_domain_filtered(
        &self,
        job_items: &[String],
        candidate_items: &[String],
        threshold: f64,
        enrich: bool,
        hybrid: bool,
        ctx: &CallContext,
    ) -> ComparisonResult {
        self.compare(job_items, candidate_items, threshold, enrich, hybrid, ctx)
            .await
    }

    /// [`compare`](Self::compare) with caller-supplied extra phrasings.
    #[allow(clippy::too_many_arguments)]
    pub async fn compare_with_variants(
        &self,
        job_items: &[String],
        candidate_items: &[String],
        job_extra: &HashMap<String, Vec<String>>,
        candidate_extra: &HashMap<String, Vec<String>>,
        threshold: f64,
        hybrid: bool,
        ctx: &CallContext,
    ) -> ComparisonResult {
        if job_items.is_empty() || candidate_items.is_empty() {
            return ComparisonResult::all_unmatched(job_items, candidate_items);
        }

        let (job_bundles, candidate_bundles) = futures::join!(
            self.build_bundles(job_items, job_extra, ctx),
            self.build_bundles(candidate_items, candidate_extra, ctx)
        );

        if !job_bundles.iter().any(EmbeddingBundle::has_vectors)
            || !candidate_bundles.iter().any(EmbeddingBundle::has_vectors)
        {
            warn!(
                job_items = job_items.len(),
                candidate_items = candidate_items.len(),
                "no usable embeddings; leaving every item unmatched"
            );
            return ComparisonResult::all_unmatched(job_items, candidate_items);
        }

        self.assign(&job_bundles, &candidate_bundles, threshold, hybrid)
    }

    /// Greedy assignment. Job items are visited in input order; each takes
    /// the highest-scoring remaining candidate at or above `threshold`. On a
    /// tie the lower candidate index wins.
    fn assign(
        &self,
        job_bundles: &[EmbeddingBundle],
        candidate_bundles: &[EmbeddingBundle],
        threshold: f64,
        hybrid: bool,
    ) -> ComparisonResult {
        let job_norms: Vec<String> = job_bundles.iter().map(|b| normalize(&b.item)).collect();
        let candidate_norms: Vec<String> = candidate_bundles
            .iter()
            .map(|b| normalize(&b.item))
            .collect();

        let mut taken = vec![false; candidate_bundles.len()];
        let mut job_matched = vec![false; job_bundles.len()];
        let mut matches = Vec::new();

        for (i, job) in job_bundles.iter().enumerate() {
            let mut best: Option<usize> = None;
            let mut best_score = 0.0f64;

            for (j, candidate) in candidate_bundles.iter().enumerate() {
                if taken[j] {
                    continue;
                }
                let semantic = best_cross_similarity(&job.vectors, &candidate.vectors);
                let combined = if hybrid {
                    let lexical =
                        bm25_similarity(&job_norms[i], &candidate_norms[j], &self.settings.bm25);
                    self.settings.hybrid.combine(semantic, lexical)
                } else {
                    semantic
                };
                if combined >= threshold && combined > best_score {
                    best = Some(j);
                    best_score = combined;
                }
            }

            if let Some(j) = best {
                taken[j] = true;
                job_matched[i] = true;
                debug!(
                    job = %job.item,
                    candidate = %candidate_bundles[j].item,
                    score = best_score,
                    "matched"
                );
                matches.push(SkillMatch {
                    job_item: job.item.clone(),
                    candidate_item: candidate_bundles[j].item.clone(),
                    similarity: best_score,
                    match_type: classify_match(best_score, &self.settings.match_bands),
                    confidence: best_score,
                    evidence_snippet: None,
                    evidence_type: None,
                });
            }
        }

        ComparisonResult {
            matches,
            unmatched_job: job_bundles
                .iter()
                .zip(&job_matched)
                .filter(|(_, matched)| !**matched)
                .map(|(b, _)| b.item.clone())
                .collect(),
            unmatched_candidate: candidate_bundles
                .iter()
                .zip(&taken)
                .filter(|(_, taken)| !**taken)
                .map(|(b, _)| b.item.clone())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::{at_similarity, planar, FakeGateway};

    fn items(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn scenario_a_gateway(docker_similarity: f64) -> FakeGateway {
        FakeGateway::new()
            .with_embedding("python", planar(90.0))
            .with_embedding("docker", planar(0.0))
            .with_embedding("containerization", at_similarity(docker_similarity))
    }

    fn assert_partition(result: &ComparisonResult, job: &[String], candidate: &[String]) {
        for item in job {
            let matched = result.matches.iter().filter(|m| &m.job_item == item).count();
            let unmatched = result.unmatched_job.iter().filter(|u| *u == item).count();
            let expected = job.iter().filter(|j| *j == item).count();
            assert_eq!(matched + unmatched, expected, "job item {item:?}");
        }
        for item in candidate {
            let matched = result
                .matches
                .iter()
                .filter(|m| &m.candidate_item == item)
                .count();
            let unmatched = result.unmatched_candidate.iter().filter(|u| *u == item).count();
            let expected = candidate.iter().filter(|c| *c == item).count();
            assert_eq!(matched + unmatched, expected, "candidate item {item:?}");
        }
    }

    #[tokio::test]
    async fn test_scenario_a_exact_and_semantic() {
        let gateway = scenario_a_gateway(0.78);
        let settings = EngineSettings::default();
        let engine = MatchingEngine::new(&gateway, &settings);
        let ctx = CallContext::default();

        let job = items(&["python", "docker"]);
        let candidate = items(&["python", "containerization"]);
        let result = engine.compare(&job, &candidate, 0.5, false, false, &ctx).await;

        assert_eq!(result.matches.len(), 2);
        assert!(result.unmatched_job.is_empty());
        assert!(result.unmatched_candidate.is_empty());

        let python = &result.matches[0];
        assert_eq!(python.candidate_item, "python");
        assert_eq!(python.match_type, MatchType::Exact);
        assert!((python.confidence - 1.0).abs() < 1e-6);

        let docker = &result.matches[1];
        assert_eq!(docker.candidate_item, "containerization");
        assert_eq!(docker.match_type, MatchType::Semantic);
    }

    #[tokio::test]
    async fn test_scenario_a_at_point_nine_cosine() {
        let gateway = scenario_a_gateway(0.9);
        let settings = EngineSettings::default();
        let engine = MatchingEngine::new(&gateway, &settings);
        let ctx = CallContext::default();

        let job = items(&["python", "docker"]);
        let candidate = items(&["python", "containerization"]);
        let result = engine.compare(&job, &candidate, 0.5, false, false, &ctx).await;

        assert_eq!(result.matches.len(), 2);
        assert!(result.unmatched_job.is_empty());
        assert!(result.unmatched_candidate.is_empty());
        assert_partition(&result, &job, &candidate);
        assert_eq!(result.matches[0].match_type, MatchType::Exact);

        // 0.9 clears the exact band (0.85); semantic needs a score in [0.70, 0.85)
        let docker = &result.matches[1];
        assert_eq!(docker.job_item, "docker");
        assert_eq!(docker.candidate_item, "containerization");
        assert!((docker.similarity - 0.9).abs() < 1e-4);
        assert_eq!(docker.match_type, MatchType::Exact);
        assert_eq!(
            classify_match(docker.similarity, &settings.match_bands),
            MatchType::Exact
        );
    }

    #[tokio::test]
    async fn test_hybrid_discounts_pure_semantic_agreement() {
        // 0.9 cosine with no shared tokens: 0.7 * 0.9 + 0.3 * 0 = 0.63
        let gateway = scenario_a_gateway(0.9);
        let settings = EngineSettings::default();
        let engine = MatchingEngine::new(&gateway, &settings);
        let ctx = CallContext::default();

        let result = engine
            .compare(&items(&["docker"]), &items(&["containerization"]), 0.5, false, true, &ctx)
            .await;
        assert_eq!(result.matches.len(), 1);
        assert!((result.matches[0].similarity - 0.63).abs() < 1e-4);
        assert_eq!(result.matches[0].match_type, MatchType::Partial);
    }

    #[tokio::test]
    async fn test_scenario_b_no_candidates() {
        let gateway = FakeGateway::new();
        let settings = EngineSettings::default();
        let engine = MatchingEngine::new(&gateway, &settings);
        let ctx = CallContext::default();

        let result = engine
            .compare(&items(&["kubernetes"]), &[], 0.5, true, true, &ctx)
            .await;
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_job, vec!["kubernetes"]);
        assert_eq!(gateway.embed_calls(), 0);
    }

    #[tokio::test]
    async fn test_candidate_is_never_assigned_twice() {
        let gateway = FakeGateway::new()
            .with_embedding("python", planar(0.0))
            .with_embedding("python3", planar(5.0))
            .with_embedding("python scripting", planar(10.0));
        let settings = EngineSettings::default();
        let engine = MatchingEngine::new(&gateway, &settings);
        let ctx = CallContext::default();

        let job = items(&["python", "python3", "python scripting"]);
        let candidate = items(&["python"]);
        let result = engine.compare(&job, &candidate, 0.5, false, false, &ctx).await;

        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].job_item, "python");
        assert_eq!(result.unmatched_job, vec!["python3", "python scripting"]);
        assert_partition(&result, &job, &candidate);
    }

    #[tokio::test]
    async fn test_tie_goes_to_lowest_candidate_index() {
        let gateway = FakeGateway::new()
            .with_embedding("rust", planar(0.0))
            .with_embedding("rust lang", planar(20.0))
            .with_embedding("rustlang", planar(-20.0));
        let settings = EngineSettings::default();
        let engine = MatchingEngine::new(&gateway, &settings);
        let ctx = CallContext::default();

        let result = engine
            .compare(
                &items(&["rust"]),
                &items(&["rust lang", "rustlang"]),
                0.5,
                false,
                false,
                &ctx,
            )
            .await;
        assert_eq!(result.matches[0].candidate_item, "rust lang");
        assert_eq!(result.unmatched_candidate, vec!["rustlang"]);
    }

    #[tokio::test]
    async fn test_greedy_order_decides_contested_candidate() {
        // "ml" comes first and takes "pytorch", although pairing it with
        // "statistics" would let "deep learning" match too.
        let gateway = FakeGateway::new()
            .with_embedding("ml", planar(0.0))
            .with_embedding("deep learning", planar(35.0))
            .with_embedding("pytorch", planar(30.0))
            .with_embedding("statistics", planar(-50.0));
        let settings = EngineSettings::default();
        let engine = MatchingEngine::new(&gateway, &settings);
        let ctx = CallContext::default();

        let job = items(&["ml", "deep learning"]);
        let candidate = items(&["pytorch", "statistics"]);
        let result = engine.compare(&job, &candidate, 0.5, false, false, &ctx).await;

        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].job_item, "ml");
        assert_eq!(result.matches[0].candidate_item, "pytorch");
        assert_eq!(result.unmatched_job, vec!["deep learning"]);
        assert_eq!(result.unmatched_candidate, vec!["statistics"]);
        assert_partition(&result, &job, &candidate);
    }

    #[tokio::test]
    async fn test_below_threshold_stays_unmatched() {
        let gateway = FakeGateway::new()
            .with_embedding("rust", planar(0.0))
            .with_embedding("cooking", planar(80.0));
        let settings = EngineSettings::default();
        let engine = MatchingEngine::new(&gateway, &settings);
        let ctx = CallContext::default();

        let result = engine
            .compare(&items(&["rust"]), &items(&["cooking"]), 0.5, false, true, &ctx)
            .await;
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_job, vec!["rust"]);
        assert_eq!(result.unmatched_candidate, vec!["cooking"]);
    }

    #[tokio::test]
    async fn test_fails_closed_without_vectors() {
        let gateway = FakeGateway::new()
            .with_embedding("python", planar(0.0))
            .failing_embeddings();
        let settings = EngineSettings::default();
        let engine = MatchingEngine::new(&gateway, &settings);
        let ctx = CallContext::default();

        let job = items(&["python"]);
        let candidate = items(&["python"]);
        let result = engine.compare(&job, &candidate, 0.5, false, true, &ctx).await;
        assert_eq!(result, ComparisonResult::all_unmatched(&job, &candidate));
        assert!(ctx.is_degraded());
    }

    #[tokio::test]
    async fn test_item_without_vector_uses_lexical_only() {
        let gateway = FakeGateway::new()
            .with_embedding("python", planar(0.0))
            .with_embedding("go", planar(60.0));
        let settings = EngineSettings::default();
        let engine = MatchingEngine::new(&gateway, &settings);
        let ctx = CallContext::default();

        let job = items(&["rest api", "python"]);
        let candidate = items(&["rest api design", "python"]);
        let result = engine.compare(&job, &candidate, 0.5, false, true, &ctx).await;

        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].job_item, "python");
        assert_eq!(result.unmatched_job, vec!["rest api"]);
        assert_partition(&result, &job, &candidate);
    }

    #[tokio::test]
    async fn test_enrichment_variants_enable_match() {
        let gateway = FakeGateway::new()
            .with_embedding("kubernetes", planar(0.0))
            .with_embedding("k8s", planar(1.0))
            .with_enrichment("container orchestration", &["Kubernetes", "kubernetes "]);
        let settings = EngineSettings::default();
        let engine = MatchingEngine::new(&gateway, &settings);
        let ctx = CallContext::default();

        let job = items(&["container orchestration"]);
        let candidate = items(&["k8s"]);

        let plain = engine.compare(&job, &candidate, 0.5, false, false, &ctx).await;
        assert!(plain.matches.is_empty());

        let enriched = engine.compare(&job, &candidate, 0.5, true, false, &ctx).await;
        assert_eq!(enriched.matches.len(), 1);
        assert_eq!(enriched.matches[0].job_item, "container orchestration");
        assert_eq!(enriched.matches[0].candidate_item, "k8s");
    }

    #[tokio::test]
    async fn test_bundles_follow_input_order() {
        let gateway = FakeGateway::new()
            .with_embedding("a1", planar(0.0))
            .with_embedding("b1", planar(90.0));
        let settings = EngineSettings::default();
        let engine = MatchingEngine::new(&gateway, &settings);
        let ctx = CallContext::default();

        let mut extra = HashMap::new();
        extra.insert("a".to_string(), vec!["a1".to_string()]);
        extra.insert("b".to_string(), vec!["b1".to_string(), "B1".to_string()]);
        let bundles = engine.build_bundles(&items(&["a", "b"]), &extra, &ctx).await;

        assert_eq!(bundles[0].variants, vec!["a", "a1"]);
        assert_eq!(bundles[1].variants, vec!["b", "b1"]);
        assert_eq!(bundles[0].vectors[1], Some(planar(0.0)));
        assert_eq!(bundles[1].vectors[1], Some(planar(90.0)));
        assert_eq!(bundles[0].vectors[0], None);
    }

    #[test]
    fn test_variants_are_deduped_and_capped() {
        let extra = items(&["Node.js", "nodejs", "deno", "bun", "npm", "yarn", "pnpm"]);
        let variants = variants_for("node", &extra, 5);
        assert_eq!(variants, vec!["node", "deno", "bun", "npm", "yarn"]);
        assert_eq!(variants_for("x", &[], 0), vec!["x"]);
        assert!(variants_for("   ", &[], 5).is_empty());
    }

    #[test]
    fn test_classify_match_bands() {
        let bands = MatchTypeBands::default();
        assert_eq!(classify_match(0.85, &bands), MatchType::Exact);
        assert_eq!(classify_match(0.849, &bands), MatchType::Semantic);
        assert_eq!(classify_match(0.70, &bands), MatchType::Semantic);
        assert_eq!(classify_match(0.55, &bands), MatchType::Partial);
    }
}

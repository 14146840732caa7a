//! Context-aware fallback: requirements missing from the candidate's item
//! list are searched for in the full profile text, sentence by sentence.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::gateway::CallContext;
use crate::matching::engine::{classify_match, MatchingEngine};
use crate::matching::lexical::bm25_similarity;
use crate::matching::semantic::cosine;
use crate::models::{ComparisonResult, EvidenceType, SkillMatch};
use crate::text::canonical::{expand_with_aliases, AliasTable};
use crate::text::normalize::{normalize, split_sentences};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("no source document to search")]
    EmptyDocument,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedSentence {
    pub text: String,
    pub vector: Option<Vec<f32>>,
}

/// Embedded sentences of one document, built once per document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentenceIndex {
    sentences: Vec<IndexedSentence>,
}

impl SentenceIndex {
    /// Splits, drops short fragments, caps the count and embeds the rest.
    pub async fn build(document: &str, engine: &MatchingEngine<'_>, ctx: &CallContext) -> Self {
        let settings = &engine.settings().context;
        let texts: Vec<String> = split_sentences(document)
            .into_iter()
            .filter(|s| s.chars().count() > settings.min_sentence_chars)
            .take(settings.max_sentences)
            .collect();
        let vectors = engine.embed_all(&texts, ctx).await;
        let sentences = texts
            .into_iter()
            .zip(vectors)
            .map(|(text, vector)| IndexedSentence { text, vector })
            .collect();
        Self { sentences }
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn sentences(&self) -> &[IndexedSentence] {
        &self.sentences
    }

    /// Most similar sentence with a positive score; the earliest wins ties.
    pub fn best_match(&self, query: &[f32]) -> Option<(&IndexedSentence, f64)> {
        let mut best: Option<(&IndexedSentence, f64)> = None;
        for sentence in &self.sentences {
            let Some(vector) = &sentence.vector else {
                continue;
            };
            let similarity = cosine(query, vector);
            if similarity > best.map_or(0.0, |(_, s)| s) {
                best = Some((sentence, similarity));
            }
        }
        best
    }
}

pub struct ContextMatcher<'a> {
    engine: &'a MatchingEngine<'a>,
    aliases: AliasTable,
}

impl<'a> ContextMatcher<'a> {
    pub fn new(engine: &'a MatchingEngine<'a>) -> Self {
        Self::with_aliases(engine, AliasTable::default())
    }

    pub fn with_aliases(engine: &'a MatchingEngine<'a>, aliases: AliasTable) -> Self {
        Self { engine, aliases }
    }

    /// Alias phrasings of each item, keyed by the item.
    fn alias_variants(&self, items: &[String]) -> HashMap<String, Vec<String>> {
        items
            .iter()
            .map(|item| {
                let expanded = expand_with_aliases(std::slice::from_ref(item), &self.aliases);
                (item.clone(), expanded.into_iter().skip(1).collect())
            })
            .collect()
    }

    /// Explicit hybrid matching on alias-expanded items, then a sentence
    /// search of `document` for every requirement still unmatched.
    ///
    /// A sentence match must clear `threshold * relaxation`. Its displayed
    /// candidate item is the first still-unmatched candidate item whose
    /// embedding is close enough to the requirement, else the requirement
    /// itself.
    pub async fn match_with_context(
        &self,
        job_skills: &[String],
        candidate_skills: &[String],
        document: &str,
        threshold: f64,
        ctx: &CallContext,
    ) -> Result<ComparisonResult, ContextError> {
        if document.trim().is_empty() {
            return Err(ContextError::EmptyDocument);
        }
        if job_skills.is_empty() {
            return Ok(ComparisonResult::all_unmatched(job_skills, candidate_skills));
        }

        let settings = self.engine.settings();
        let mut result = self
            .engine
            .compare_with_variants(
                job_skills,
                candidate_skills,
                &self.alias_variants(job_skills),
                &self.alias_variants(candidate_skills),
                threshold,
                true,
                ctx,
            )
            .await;
        if result.unmatched_job.is_empty() {
            return Ok(result);
        }

        let index = SentenceIndex::build(document, self.engine, ctx).await;
        debug!(sentences = index.len(), "built sentence index");
        if index.is_empty() {
            return Ok(result);
        }

        let bar = threshold * settings.context.relaxation;
        let mut anchor_vectors: Option<Vec<Option<Vec<f32>>>> = None;
        let mut still_unmatched = Vec::new();

        for job_skill in std::mem::take(&mut result.unmatched_job) {
            let Some(query) = self.engine.embed_text(&job_skill, ctx).await else {
                still_unmatched.push(job_skill);
                continue;
            };
            let Some((sentence, semantic)) = index.best_match(&query) else {
                still_unmatched.push(job_skill);
                continue;
            };
            let lexical = bm25_similarity(
                &normalize(&job_skill),
                &normalize(&sentence.text),
                &settings.bm25,
            );
            let combined = settings.hybrid.combine(semantic, lexical);
            if combined < bar {
                still_unmatched.push(job_skill);
                continue;
            }

            if anchor_vectors.is_none() {
                anchor_vectors = Some(self.engine.embed_all(&result.unmatched_candidate, ctx).await);
            }
            let anchor = anchor_vectors.as_mut().and_then(|vectors| {
                let position = vectors.iter().position(|v| {
                    v.as_ref()
                        .is_some_and(|v| cosine(&query, v) > settings.context.anchor_similarity)
                })?;
                vectors.remove(position);
                Some(result.unmatched_candidate.remove(position))
            });

            info!(
                requirement = %job_skill,
                score = combined,
                anchored = anchor.is_some(),
                "requirement matched from profile context"
            );
            result.matches.push(SkillMatch {
                candidate_item: anchor.unwrap_or_else(|| job_skill.clone()),
                job_item: job_skill,
                similarity: combined,
                match_type: classify_match(combined, &settings.match_bands),
                confidence: combined,
                evidence_snippet: Some(truncate_chars(&sentence.text, settings.context.evidence_chars)),
                evidence_type: Some(EvidenceType::ResumeSentence),
            });
        }

        result.unmatched_job = still_unmatched;
        Ok(result)
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

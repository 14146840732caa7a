//! Concept-level dedup of a comparison for presentation. Scores are computed
//! on the raw comparison; this only shapes what the report lists.

use std::collections::{HashMap, HashSet};

use crate::models::{CategoryReport, ComparisonResult, MatchedItem, SkillMatch};
use crate::text::canonical::{canonicalize, AliasTable};

fn to_matched_item(m: &SkillMatch) -> MatchedItem {
    MatchedItem {
        job_keyword: m.job_item.clone(),
        resume_keyword: m.candidate_item.clone(),
        match_type: m.match_type,
        confidence: m.confidence,
        evidence_snippet: m.evidence_snippet.clone(),
        evidence_type: m.evidence_type,
    }
}

/// Keeps the highest-confidence match per job concept, in order of first
/// appearance, and lists each missing concept once unless it was matched.
pub fn dedup_category(result: &ComparisonResult, aliases: &AliasTable) -> CategoryReport {
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, &SkillMatch> = HashMap::new();

    for m in &result.matches {
        let concept = canonicalize(&m.job_item, aliases);
        match best.get(&concept).map(|prev| m.confidence > prev.confidence) {
            Some(false) => {}
            Some(true) => {
                best.insert(concept, m);
            }
            None => {
                order.push(concept.clone());
                best.insert(concept, m);
            }
        }
    }

    let matched: Vec<MatchedItem> = order
        .iter()
        .filter_map(|concept| best.get(concept))
        .map(|m| to_matched_item(m))
        .collect();

    let mut seen: HashSet<String> = best.into_keys().collect();
    let missing = result
        .unmatched_job
        .iter()
        .filter(|item| seen.insert(canonicalize(item, aliases)))
        .cloned()
        .collect();

    CategoryReport { matched, missing }
}

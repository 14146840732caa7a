//! Clean-up of extracted profiles before matching: education/experience
//! entries are reduced to a core title, misfiled technical terms are moved
//! back to technical skills, and every list is deduplicated.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::models::ExtractedProfile;
use crate::scoring::constraints::is_duration_phrase;
use crate::text::normalize::{normalize, normalize_for_classification, split_sentences};

/// Words kept when an entry has no recognisable degree or role.
const SUMMARY_WORDS: usize = 8;
/// Longest education/experience entry still treated as a bare skill.
const MAX_TECH_ENTRY_WORDS: usize = 4;
const MAX_SPLIT_SKILL_WORDS: usize = 3;

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\s*[\(\[][^\)\]]*[\)\]]\s*"));

static DATE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)\b\d{1,2}[./-]\d{1,2}[./-]\d{2,4}\s*(?:-|–|—|to|au)\s*\d{1,2}[./-]\d{1,2}[./-]\d{2,4}\b|\b\d{4}\s*(?:-|–|—|to|au)\s*\d{4}\b",
    )
});

static CONNECTOR: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\s[-—@]\s|–|\s(?:at|chez|à)\s"));

static DEGREE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:diplome|licence|license|master|mastere|bachelor|ingenieur|phd|doctorat|maitrise|msc|bsc|bac|m1|m2)\b",
    )
});

static ROLE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:engineer|ingenieur|developpeur|developer|data scientist|analyst|analyste|manager|lead|intern|stagiaire|chef de projet|responsable|architect|consultant|technicien|technician|researcher|chercheur)\b",
    )
});

static EDUCATION_CONTEXT: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:diplome|diplomee?|ecole|grande ecole|universite|university|formation|specialite|bac(?:\s?\+\s?[1-5])?|master|masters|licence|ingenieur|msc|bsc|phd|degree|bachelor|diploma|major in|specialization|speciality)\b",
    )
});

static TECH_WORD: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:ros2|ros|python|tensorflow|pytorch|keras|sql|react|node|node\.js|docker|kubernetes|linux|git|matlab|simulink|arduino|raspberry pi|opencv|scikit-learn|sklearn|pandas|numpy|aws|azure|gcp|bash|shell|ansible|terraform|jenkins|ci/cd|graphql|rest|fastapi|django|flask|spring|java|typescript|javascript|html|css)\b",
    )
});

// "c++" and "c#" end in non-word characters, so \b cannot bound them.
static TECH_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?:^|[^a-z0-9])(?:c\+\+|c#)(?:$|[^a-z0-9+#])"));

static SKILL_LIST: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)\b(?:experience in|experience with|proficiency with|proficiency in|knowledge of|familiarity with|expertise in|working with|using)\s+([^:.]+)",
    )
});

static LIST_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)[,;/]|\s+or\s+|\s+and\s+|\s+et\s+|\s+ou\s+"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid postprocess regex")
}

/// Keeps the first occurrence of each item by classification form and
/// drops blank entries.
pub fn dedup_items(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| {
            let key = normalize_for_classification(item);
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

pub fn is_technical_term(text: &str) -> bool {
    let norm = normalize_for_classification(text);
    TECH_WORD.is_match(&norm) || TECH_SYMBOL.is_match(&norm)
}

fn carries_degree_or_role(clause: &str) -> bool {
    let norm = normalize_for_classification(clause);
    DEGREE.is_match(&norm) || ROLE.is_match(&norm)
}

/// Reduces an education or experience entry to its core title, e.g.
/// "Software Engineer at Acme (2019-2021), backend team" → "Software Engineer.".
pub fn summarize_entry(entry: &str) -> Option<String> {
    let text = BRACKETED.replace_all(entry, " ");
    let text = DATE_RANGE.replace_all(&text, " ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let text = match CONNECTOR.find(&text) {
        Some(m) if m.start() > 0 => &text[..m.start()],
        _ => text.as_str(),
    };

    let core = text
        .split(',')
        .map(str::trim)
        .find(|clause| carries_degree_or_role(clause))
        .map(str::to_string)
        .unwrap_or_else(|| {
            text.split_whitespace()
                .take(SUMMARY_WORDS)
                .collect::<Vec<_>>()
                .join(" ")
        });

    let core = core.trim_end_matches([' ', '.', ',', ';']).trim();
    if core.is_empty() {
        None
    } else {
        Some(format!("{core}."))
    }
}

pub fn summarize_entries(entries: &[String]) -> Vec<String> {
    dedup_items(entries.iter().filter_map(|e| summarize_entry(e)).collect())
}

/// Moves short technical terms misfiled under education or experience to
/// technical skills.
pub fn reclassify_tech_from_edu_exp(profile: &mut ExtractedProfile) {
    let mut moved = Vec::new();
    for list in [&mut profile.education, &mut profile.experience] {
        let (tech, keep): (Vec<String>, Vec<String>) = std::mem::take(list)
            .into_iter()
            .partition(|item| {
                is_technical_term(item)
                    && item.split_whitespace().count() <= MAX_TECH_ENTRY_WORDS
            });
        *list = keep;
        moved.extend(tech.into_iter().map(|t| t.trim_end_matches('.').to_string()));
    }
    if !moved.is_empty() {
        let mut tech = std::mem::take(&mut profile.technical_skills);
        tech.extend(moved);
        profile.technical_skills = dedup_items(tech);
    }
}

/// Job side only: technical and methodology items named inside an
/// education sentence ("Master's in Robotics or Computer Vision") are
/// fields of study, not skills.
pub fn reclassify_education_fields(profile: &mut ExtractedProfile, job_text: &str) {
    let education_sentences: Vec<String> = split_sentences(job_text)
        .iter()
        .map(|s| normalize_for_classification(s))
        .filter(|s| EDUCATION_CONTEXT.is_match(s))
        .collect();
    if education_sentences.is_empty() {
        return;
    }

    let mut moved = Vec::new();
    for list in [&mut profile.technical_skills, &mut profile.methodologies] {
        let (fields, keep): (Vec<String>, Vec<String>) =
            std::mem::take(list).into_iter().partition(|item| {
                let key = normalize_for_classification(item);
                !key.is_empty() && education_sentences.iter().any(|s| s.contains(&key))
            });
        *list = keep;
        moved.extend(fields);
    }
    if !moved.is_empty() {
        let mut education = std::mem::take(&mut profile.education);
        education.extend(moved);
        profile.education = dedup_items(education);
    }
}

fn split_skill_list(item: &str) -> Vec<String> {
    let Some(caps) = SKILL_LIST.captures(item) else {
        return Vec::new();
    };
    LIST_SEPARATOR
        .split(&caps[1])
        .map(|s| s.trim().trim_end_matches('.').trim())
        .filter(|s| s.chars().count() > 2)
        .filter(|s| {
            let lower = s.to_lowercase();
            !lower.starts_with(|c: char| c.is_ascii_digit())
                && !["years", "year", "plus"].iter().any(|w| lower.starts_with(w))
        })
        .filter(|s| is_technical_term(s) || s.split_whitespace().count() <= MAX_SPLIT_SKILL_WORDS)
        .map(str::to_string)
        .collect()
}

/// Job side only: an experience item such as "Experience with Docker,
/// Kubernetes and AWS" is a skill list that was filed as one requirement.
/// Its parts move to technical skills and the item itself is dropped.
pub fn fix_sentence_splitting(profile: &mut ExtractedProfile) {
    let mut experience = Vec::new();
    let mut tech = std::mem::take(&mut profile.technical_skills);
    for item in std::mem::take(&mut profile.experience) {
        let skills = split_skill_list(&item);
        if skills.is_empty() {
            experience.push(item);
        } else {
            tech.extend(skills);
        }
    }
    profile.experience = experience;
    profile.technical_skills = dedup_items(tech);
}

/// Appends enrichment variants after their source item, deduplicated by
/// matching normal form.
pub fn merge_enrichment(items: &[String], enrichment: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let extra = enrichment.get(item).map(Vec::as_slice).unwrap_or_default();
        for term in std::iter::once(item).chain(extra) {
            let key = normalize(term);
            if !key.is_empty() && seen.insert(key) {
                out.push(term.trim().to_string());
            }
        }
    }
    out
}

/// Drops items that only state a duration, such as "3+ years".
pub fn without_duration_phrases(items: &[String]) -> Vec<String> {
    items
        .iter()
        .filter(|item| !is_duration_phrase(item))
        .cloned()
        .collect()
}

/// Summarises education and experience and dedups every list.
pub fn tidy_profile(profile: ExtractedProfile) -> ExtractedProfile {
    ExtractedProfile {
        technical_skills: dedup_items(profile.technical_skills),
        soft_skills: dedup_items(profile.soft_skills),
        methodologies: dedup_items(profile.methodologies),
        education: summarize_entries(&profile.education),
        experience: summarize_entries(&profile.experience),
    }
}

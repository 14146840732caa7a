//! Explicit experience demands mined from raw job text with regular
//! expressions, e.g. "5+ years of experience in Rust" or "senior in Go".

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ConstraintRequirement, ExperienceConstraint};

const YEARS: &str = r"(?:years|year|yrs|ans|an|années|annees|année|annee)";
const LINK: &str = r"(?:in|en|dans|with|avec|using|utilisant)";
/// Field body, ended by punctuation or end of text.
const FIELD: &str = r"([\p{L}0-9\-&./ ]+?)(?:[.,;)\n]|$)";

static YEARS_OF_EXPERIENCE_IN: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?i)\b(\d+)\s*\+?\s*{YEARS}\s*(?:of|de|d')?\s*(?:experience|expérience)?\s*{LINK}\s+{FIELD}"
    ))
});

static AT_LEAST_YEARS_IN: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?i)\b(?:minimum(?:\s+of|\s+de)?|min\.?|at\s+least|au\s+moins)\s+(\d+)\s*\+?\s*{YEARS}\s*(?:of|de|d')?\s*(?:experience|expérience)?\s*{LINK}\s+{FIELD}"
    ))
});

static EXPERIENCE_OF_YEARS_IN: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?i)\b(?:experience|expérience)\s+(?:of|de|d')?\s*(\d+)\s*\+?\s*{YEARS}\s*{LINK}\s+{FIELD}"
    ))
});

static LEVEL_IN: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?i)\b(expert|senior|proficient|strong|advanced|confirmé|confirme|avancé|avance)\s+(?:in|en|dans)\s+{FIELD}"
    ))
});

static DURATION_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?i)\b\d+\s*\+?\s*{YEARS}\b|\b(?:au\s+moins|min(?:imum)?\s+(?:de|of)|at\s+least)\s+\d+\s*{YEARS}\b"
    ))
});

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid constraint regex")
}

fn clean_field(raw: &str) -> String {
    let field = raw.trim();
    let lowered = field.to_lowercase();
    let field = ["with ", "en ", "avec ", "utilisant "]
        .iter()
        .find(|prefix| lowered.starts_with(*prefix))
        .map_or(field, |prefix| &field[prefix.len()..]);
    field
        .trim_end_matches(['.', ';', ',', ')', ':', '('])
        .trim()
        .to_string()
}

fn raw_text(full: &str) -> String {
    full.trim()
        .trim_end_matches(['.', ',', ';', ')'])
        .trim_end()
        .to_string()
}

/// Years demands from the three phrasings plus level demands, deduplicated
/// by kind, value and lower-cased field. The comparator is always ">=".
pub fn extract_experience_constraints(job_text: &str) -> Vec<ExperienceConstraint> {
    let text = job_text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    let mut push = |requirement: ConstraintRequirement, field: String, raw: &str| {
        if field.is_empty() {
            return;
        }
        let value = match &requirement {
            ConstraintRequirement::Years { years, .. } => format!("years:{years}"),
            ConstraintRequirement::Level { level } => format!("level:{level}"),
        };
        if seen.insert((value, field.to_lowercase())) {
            out.push(ExperienceConstraint {
                requirement,
                field,
                raw_text: raw_text(raw),
            });
        }
    };

    for pattern in [
        &*YEARS_OF_EXPERIENCE_IN,
        &*AT_LEAST_YEARS_IN,
        &*EXPERIENCE_OF_YEARS_IN,
    ] {
        for caps in pattern.captures_iter(&text) {
            let Ok(years) = caps[1].parse::<u32>() else {
                continue;
            };
            push(
                ConstraintRequirement::Years {
                    years,
                    comparator: ">=".to_string(),
                },
                clean_field(&caps[2]),
                &caps[0],
            );
        }
    }

    for caps in LEVEL_IN.captures_iter(&text) {
        push(
            ConstraintRequirement::Level {
                level: caps[1].to_lowercase(),
            },
            clean_field(&caps[2]),
            &caps[0],
        );
    }

    out
}

/// True for items such as "3+ years" or "au moins 2 ans" that state a
/// duration rather than a comparable experience.
pub fn is_duration_phrase(text: &str) -> bool {
    DURATION_PHRASE.is_match(text)
}

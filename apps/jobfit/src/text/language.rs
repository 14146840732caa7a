//! Lightweight language detection for the two languages the prompts support.

use serde::{Deserialize, Serialize};

use crate::text::normalize::strip_accents;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
        }
    }
}

/// Shorter cleaned texts carry too little signal and default to English.
const MIN_DETECTABLE_CHARS: usize = 10;

const EN_MARKERS: &[&str] = &[
    "the", "and", "with", "for", "of", "to", "in", "experience", "skills", "years", "team",
    "our", "you", "will", "is", "are", "developed", "worked",
];

const FR_MARKERS: &[&str] = &[
    "le", "la", "les", "des", "et", "avec", "pour", "dans", "une", "un", "du", "experience",
    "competences", "ans", "equipe", "nous", "vous", "est", "sont", "developpe", "stage",
    "poste", "au", "aux",
];

/// Votes English vs French by marker-word frequency over accent-stripped
/// tokens. Ties go to English.
pub fn detect_language(text: &str) -> Language {
    let cleaned: String = strip_accents(&text.to_lowercase())
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if tokens.join(" ").chars().count() < MIN_DETECTABLE_CHARS {
        return Language::En;
    }

    let mut en = 0usize;
    let mut fr = 0usize;
    for token in &tokens {
        // "experience" is shared; count it for neither side
        let in_en = EN_MARKERS.contains(token);
        let in_fr = FR_MARKERS.contains(token);
        match (in_en, in_fr) {
            (true, false) => en += 1,
            (false, true) => fr += 1,
            _ => {}
        }
    }

    if fr > en {
        Language::Fr
    } else {
        Language::En
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_english() {
        let text = "Senior engineer with 5 years of experience in Rust and the cloud team.";
        assert_eq!(detect_language(text), Language::En);
    }

    #[test]
    fn test_detects_french() {
        let text = "Ingénieur avec 5 ans d'expérience dans le développement et la robotique pour une équipe.";
        assert_eq!(detect_language(text), Language::Fr);
    }

    #[test]
    fn test_short_text_defaults_to_english() {
        assert_eq!(detect_language("le la"), Language::En);
        assert_eq!(detect_language(""), Language::En);
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::En.code(), "en");
        assert_eq!(Language::Fr.code(), "fr");
    }
}

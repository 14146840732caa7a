// Prompt templates for every generative gateway call, English and French.
// Placeholders are `{name}` tokens substituted by `render`.

use crate::models::ExtractionKind;
use crate::text::language::Language;

/// System instruction sent with every generative call.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    Respond with valid JSON only. \
    Do not add any text outside the JSON object. \
    Do not add explanations or apologies.";

const EXTRACTION_SCHEMA: &str = r#"{
  "technical_skills": ["..."],
  "soft_skills": ["..."],
  "methodologies": ["..."],
  "education": ["..."],
  "experience": ["..."]
}"#;

const JOB_EXTRACTION_EN: &str = r#"Read the job description below and list what it asks of a candidate.

Keep each requirement whole: "experience in navigation, SLAM and perception" yields the three technical skills "navigation", "SLAM" and "perception", not a sentence fragment.
Phrases such as "experience in", "proficiency with" or "knowledge of" introduce technical skills, not experience requirements.

- technical_skills: languages, tools, frameworks, platforms, technical domains
- soft_skills: communication, leadership and other interpersonal abilities
- methodologies: processes and practices (Agile, Scrum, DevOps, TDD...)
- education: degrees, certifications, fields of study
- experience: years of experience, seniority, industry or domain background

Return exactly this JSON shape:
{schema}

Job description:
{text}"#;

const JOB_EXTRACTION_FR: &str = r#"Lisez l'offre d'emploi ci-dessous et listez ce qu'elle demande au candidat.

Gardez chaque exigence entière : "expérience en navigation, SLAM et perception" donne les trois compétences techniques "navigation", "SLAM" et "perception".
Les tournures "expérience en", "maîtrise de" ou "connaissance de" introduisent des compétences techniques, pas des exigences d'expérience.

- technical_skills : langages, outils, frameworks, plateformes, domaines techniques
- soft_skills : communication, leadership et autres qualités relationnelles
- methodologies : processus et pratiques (Agile, Scrum, DevOps, TDD...)
- education : diplômes, certifications, domaines d'études
- experience : années d'expérience, séniorité, secteur ou domaine

Renvoyez exactement cette structure JSON (clés en anglais) :
{schema}

Offre d'emploi :
{text}"#;

const CV_EXTRACTION_EN: &str = r#"Read the candidate profile below and list what the candidate offers.

Include skills stated explicitly and skills clearly implied by projects or roles: "built a computer vision pipeline" implies the technical skill "computer vision".
Keep multi-word skill names whole ("motion planning and controls").

- technical_skills: from skill lists and from project or job descriptions
- soft_skills: interpersonal abilities shown in the descriptions
- methodologies: processes and practices actually used
- education: degrees, certifications, courses
- experience: job titles and roles with enough context to see the work done

Return exactly this JSON shape:
{schema}

Candidate profile:
{text}"#;

const CV_EXTRACTION_FR: &str = r#"Lisez le profil du candidat ci-dessous et listez ce qu'il apporte.

Incluez les compétences explicites et celles clairement impliquées par les projets ou postes : "développement d'une chaîne de vision par ordinateur" implique la compétence technique "vision par ordinateur".
Gardez les noms de compétences entiers.

- technical_skills : listes de compétences et descriptions de projets ou de postes
- soft_skills : qualités relationnelles visibles dans les descriptions
- methodologies : processus et pratiques réellement utilisés
- education : diplômes, certifications, formations
- experience : intitulés de postes avec assez de contexte pour comprendre le travail réalisé

Renvoyez exactement cette structure JSON (clés en anglais) :
{schema}

Profil du candidat :
{text}"#;

const ENRICHMENT_EN: &str = r#"For each item below, give close synonyms and directly related terms.
Return one compact JSON object mapping every original item, spelled exactly as given, to an array of strings.

Items: {items}"#;

const ENRICHMENT_FR: &str = r#"Pour chaque élément ci-dessous, donnez des synonymes proches et des termes directement liés.
Renvoyez un objet JSON compact associant chaque élément d'origine, écrit exactement comme fourni, à un tableau de chaînes.

Éléments : {items}"#;

const RECOMMENDATIONS_EN: &str = r#"Given the fit analysis below, suggest concrete actions that would improve the candidate's fit for this role:
missing skills to learn, existing skills to highlight better, experience gaps to close, and specific examples or projects to add.

Return exactly this JSON shape:
{"learn_skills": ["..."], "highlight_skills": ["..."], "add_experience": ["..."], "specific_examples": ["..."]}

Job requirements: {job_skills}
Candidate skills: {candidate_skills}
Fit scores: {fit_scores}"#;

const RECOMMENDATIONS_FR: &str = r#"À partir de l'analyse d'adéquation ci-dessous, proposez des actions concrètes pour améliorer l'adéquation du candidat au poste :
compétences manquantes à acquérir, compétences existantes à mieux mettre en avant, expériences à compléter, exemples ou projets précis à ajouter.

Renvoyez exactement cette structure JSON (clés en anglais) :
{"learn_skills": ["..."], "highlight_skills": ["..."], "add_experience": ["..."], "specific_examples": ["..."]}

Exigences du poste : {job_skills}
Compétences du candidat : {candidate_skills}
Scores : {fit_scores}"#;

const DYNAMIC_WEIGHTS_EN: &str = r#"Estimate how much this job description values each category, as percentages summing to 100.
Return only JSON such as {"technical_skills": 40, "soft_skills": 25, "methodologies": 20, "experience_education": 15}.

Job description:
{job_text}"#;

const DYNAMIC_WEIGHTS_FR: &str = r#"Estimez l'importance de chaque catégorie pour cette offre, en pourcentages dont la somme fait 100.
Renvoyez uniquement du JSON comme {"technical_skills": 40, "soft_skills": 25, "methodologies": 20, "experience_education": 15}.

Offre d'emploi :
{job_text}"#;

const MISSING_SKILLS_EN: &str = r#"Compare the job's required skills with the candidate's skills and list the critical skills the candidate lacks.
Return only JSON of the form {"missing": ["..."]}.

Job skills: {job_skills}
Candidate skills: {candidate_skills}"#;

const MISSING_SKILLS_FR: &str = r#"Comparez les compétences demandées par le poste avec celles du candidat et listez les compétences critiques qui lui manquent.
Renvoyez uniquement du JSON de la forme {"missing": ["..."]}.

Compétences du poste : {job_skills}
Compétences du candidat : {candidate_skills}"#;

/// Builds the extraction prompt for one document.
pub fn extraction_prompt(kind: ExtractionKind, language: Language, text: &str) -> String {
    let template = match (kind, language) {
        (ExtractionKind::JobRequirements, Language::En) => JOB_EXTRACTION_EN,
        (ExtractionKind::JobRequirements, Language::Fr) => JOB_EXTRACTION_FR,
        (ExtractionKind::CandidateProfile, Language::En) => CV_EXTRACTION_EN,
        (ExtractionKind::CandidateProfile, Language::Fr) => CV_EXTRACTION_FR,
    };
    render(template, &[("schema", EXTRACTION_SCHEMA), ("text", text)])
}

/// `items_json` is a JSON array of the terms to enrich.
pub fn enrichment_prompt(language: Language, items_json: &str) -> String {
    let template = match language {
        Language::En => ENRICHMENT_EN,
        Language::Fr => ENRICHMENT_FR,
    };
    render(template, &[("items", items_json)])
}

pub fn recommendations_prompt(
    language: Language,
    job_skills_json: &str,
    candidate_skills_json: &str,
    fit_scores_json: &str,
) -> String {
    let template = match language {
        Language::En => RECOMMENDATIONS_EN,
        Language::Fr => RECOMMENDATIONS_FR,
    };
    render(
        template,
        &[
            ("job_skills", job_skills_json),
            ("candidate_skills", candidate_skills_json),
            ("fit_scores", fit_scores_json),
        ],
    )
}

pub fn dynamic_weights_prompt(language: Language, job_text: &str) -> String {
    let template = match language {
        Language::En => DYNAMIC_WEIGHTS_EN,
        Language::Fr => DYNAMIC_WEIGHTS_FR,
    };
    render(template, &[("job_text", job_text)])
}

pub fn missing_skills_prompt(
    language: Language,
    job_skills_json: &str,
    candidate_skills_json: &str,
) -> String {
    let template = match language {
        Language::En => MISSING_SKILLS_EN,
        Language::Fr => MISSING_SKILLS_FR,
    };
    render(
        template,
        &[
            ("job_skills", job_skills_json),
            ("candidate_skills", candidate_skills_json),
        ],
    )
}

/// Substitutes `{name}` placeholders in a single left-to-right pass, so
/// braces inside substituted values (JSON, user text) are never re-expanded.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substituted = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match substituted {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_prompt_embeds_text_and_schema() {
        let prompt = extraction_prompt(ExtractionKind::JobRequirements, Language::En, "Rust dev");
        assert!(prompt.ends_with("Rust dev"));
        assert!(prompt.contains("\"technical_skills\": [\"...\"]"));
        assert!(!prompt.contains("{text}"));
        assert!(!prompt.contains("{schema}"));
    }

    #[test]
    fn test_french_templates_are_used() {
        let prompt = extraction_prompt(ExtractionKind::CandidateProfile, Language::Fr, "x");
        assert!(prompt.contains("Profil du candidat"));
        let prompt = missing_skills_prompt(Language::Fr, "[]", "[]");
        assert!(prompt.contains("Compétences du poste"));
    }

    #[test]
    fn test_render_keeps_literal_json_braces() {
        let prompt = dynamic_weights_prompt(Language::En, "Backend role");
        assert!(prompt.contains(r#"{"technical_skills": 40"#));
        assert!(prompt.ends_with("Backend role"));
    }

    #[test]
    fn test_render_does_not_expand_substituted_values() {
        let out = render("a {x} b {y}", &[("x", "{y}"), ("y", "Y")]);
        assert_eq!(out, "a {y} b Y");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        assert_eq!(render("{unknown} {", &[]), "{unknown} {");
    }
}

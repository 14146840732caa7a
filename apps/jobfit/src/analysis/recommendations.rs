use std::collections::HashSet;

use crate::models::Recommendations;
use crate::text::normalize::normalize;

/// Appends skills the gateway reported as missing to `learn_skills`,
/// skipping any already listed under the same normal form.
pub fn merge_missing_skills(mut recommendations: Recommendations, missing: &[String]) -> Recommendations {
    let mut seen: HashSet<String> = recommendations
        .learn_skills
        .iter()
        .map(|s| normalize(s))
        .collect();
    for skill in missing {
        let key = normalize(skill);
        if !key.is_empty() && seen.insert(key) {
            recommendations.learn_skills.push(skill.trim().to_string());
        }
    }
    recommendations
}

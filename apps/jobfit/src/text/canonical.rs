//! Canonical concept keys: two differently worded items that resolve to the
//! same key refer to the same underlying skill.

use std::collections::HashSet;

use crate::text::normalize::{normalize, normalize_for_classification};

/// Domain synonym clusters, canonical term first. Extend as new domains show
/// up in job descriptions.
const TECH_ALIASES: &[(&str, &[&str])] = &[
    (
        "slam",
        &[
            "simultaneous localization and mapping",
            "simultaneous localisation and mapping",
            "vslam",
            "visual slam",
            "lidar slam",
            "graph slam",
        ],
    ),
    (
        "lidar",
        &["li dar", "li-dar", "laser scanning", "laser radar", "velodyne"],
    ),
    ("ros2", &["ros 2", "robot operating system 2"]),
    ("ros", &["robot operating system", "ros1", "ros 1"]),
    (
        "navigation",
        &[
            "robot navigation",
            "autonomous navigation",
            "localization and navigation",
        ],
    ),
    (
        "motion planning",
        &[
            "path planning",
            "trajectory planning",
            "planning and controls",
            "planning & controls",
        ],
    ),
    (
        "perception",
        &["computer vision", "cv", "visual perception", "scene perception"],
    ),
    (
        "sensor fusion",
        &["multi-sensor fusion", "sensor data fusion", "sensor integration"],
    ),
    (
        "kalman filter",
        &[
            "ekf",
            "ukf",
            "extended kalman filter",
            "unscented kalman filter",
        ],
    ),
    (
        "point cloud",
        &["pointcloud", "point clouds", "pcl", "pcl library"],
    ),
    ("opencv", &["open cv"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasCluster {
    /// Canonical term as written in the table.
    pub canonical: String,
    pub aliases: Vec<String>,
    canonical_key: String,
    alias_keys: Vec<String>,
}

impl AliasCluster {
    pub fn new(canonical: &str, aliases: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            canonical_key: normalize(canonical),
            alias_keys: aliases.iter().map(|a| normalize(a)).collect(),
        }
    }

    fn contains_key(&self, key: &str) -> bool {
        self.canonical_key == key || self.alias_keys.iter().any(|k| k == key)
    }
}

/// Ordered synonym clusters. The first cluster containing a term wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    clusters: Vec<AliasCluster>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::new(
            TECH_ALIASES
                .iter()
                .map(|(canonical, aliases)| AliasCluster::new(canonical, aliases))
                .collect(),
        )
    }
}

impl AliasTable {
    pub fn new(clusters: Vec<AliasCluster>) -> Self {
        Self { clusters }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn clusters(&self) -> &[AliasCluster] {
        &self.clusters
    }
}

/// Maps a term to its concept key: the cluster's canonical key when the
/// normalised term equals the canonical term or any alias, else the
/// normalised term itself.
pub fn canonicalize(term: &str, table: &AliasTable) -> String {
    let key = normalize(term);
    table
        .clusters
        .iter()
        .find(|cluster| cluster.contains_key(&key))
        .map(|cluster| cluster.canonical_key.clone())
        .unwrap_or(key)
}

/// Keeps every original item and appends the aliases of any cluster whose
/// canonical term appears in it. Dedup is by classification form, first
/// occurrence wins.
pub fn expand_with_aliases(items: &[String], table: &AliasTable) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let norm = normalize_for_classification(item);
        if norm.is_empty() {
            continue;
        }
        if seen.insert(norm.clone()) {
            out.push(item.clone());
        }
        for cluster in &table.clusters {
            let canonical = normalize_for_classification(&cluster.canonical);
            if !contains_word(&norm, &canonical) {
                continue;
            }
            for alias in &cluster.aliases {
                if seen.insert(normalize_for_classification(alias)) {
                    out.push(alias.clone());
                }
            }
        }
    }
    out
}

/// Whole-word containment so "ros" does not fire inside "microservices".
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

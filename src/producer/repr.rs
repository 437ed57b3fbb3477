//! Representative subset selection

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Stopping rule of [`representatives`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepConfig {
    /// Minimum proportion of candidates to select
    pub prop: f64,
    /// Ratings above this keep being selected
    pub thres: f64,
    /// Selected candidates each item must be touched by, where possible
    pub cover: usize,
}

impl RepConfig {
    /// Defaults for representative documents
    pub fn docs() -> Self {
        RepConfig { prop: 0.125, thres: 0.75, cover: 1 }
    }

    /// Defaults for representative tags
    pub fn tags() -> Self {
        RepConfig { prop: 0.125, thres: 0.5, cover: 1 }
    }
}

impl Default for RepConfig {
    fn default() -> Self {
        Self::docs()
    }
}

/// What a selection achieved
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RepInfo {
    /// Rating of the last selected candidate
    pub threshold: f64,
    /// Selected share of the candidates
    pub proportion: f64,
    /// Fewest selected candidates touching any one item
    pub min_coverage: usize,
}

/// Greedy representative selection.
///
/// Candidates are visited by descending rating, ties by ascending key. Once
/// at least `prop` of them are selected and the next rating is no more than
/// `thres`, only candidates touching an item that still lacks coverage are
/// taken, until every item is touched by `min(cover, touching candidates)`
/// selected ones. Each candidate is `(key, rating, touched items)`; items are
/// indices below `items`.
pub fn representatives<K: Ord>(candidates: Vec<(K, f64, Vec<usize>)>, items: usize, cfg: &RepConfig) -> (Vec<K>, RepInfo) {
    let total = candidates.len();
    let mut touching = vec![0usize; items];
    for (_, _, its) in &candidates {
        for &i in its {
            touching[i] += 1;
        }
    }
    let mut need: Vec<usize> = touching.iter().map(|&t| t.min(cfg.cover)).collect();
    let mut unmet = need.iter().filter(|&&n| n > 0).count();
    let mut got = vec![0usize; items];

    let mut sorted = candidates;
    sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0)));

    let mut selected = Vec::new();
    let mut threshold = 0.0f64;
    for (key, rating, its) in sorted {
        let enough = selected.len() as f64 >= cfg.prop * total as f64 && rating <= cfg.thres;
        if enough {
            if unmet == 0 {
                break;
            }
            if !its.iter().any(|&i| need[i] > 0) {
                continue;
            }
        }
        for &i in &its {
            got[i] += 1;
            if need[i] > 0 {
                need[i] -= 1;
                if need[i] == 0 {
                    unmet -= 1;
                }
            }
        }
        threshold = rating;
        selected.push(key);
    }

    let info = RepInfo {
        threshold,
        proportion: if total == 0 { 0.0 } else { selected.len() as f64 / total as f64 },
        min_coverage: got.iter().copied().min().unwrap_or(0),
    };
    (selected, info)
}

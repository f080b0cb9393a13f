use std::path::Path;

use bio::alignment::distance::levenshtein;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Similarity needed by the ratio matcher to accept a candidate
pub const DEFAULT_RATIO_CUTOFF: f64 = 0.70;

/// Pick the candidate a declared name most plausibly refers to.
/// Must be deterministic for a fixed candidate list
pub trait FuzzyMatcher: Send + Sync {
    fn find_match<'a>(&self, query: &str, candidates: &'a [String]) -> Option<&'a str>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FuzzyStrategy {
    /// Case-insensitive equality, then containment, then containment ignoring '_' and '-'
    #[default]
    Substring,
    /// Normalised edit-distance similarity above a cutoff
    Ratio,
}

impl FuzzyStrategy {
    pub fn matcher(&self) -> Box<dyn FuzzyMatcher> {
        match self {
            FuzzyStrategy::Substring => Box::new(SubstringMatcher),
            FuzzyStrategy::Ratio => Box::new(RatioMatcher::default()),
        }
    }
}

fn basename_of(candidate: &str) -> Option<String> {
    Path::new(candidate)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
}

fn strip_separators(s: &str) -> String {
    s.chars().filter(|c| *c != '_' && *c != '-').collect()
}

fn contains_either_way(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

///////////////////////////////
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl FuzzyMatcher for SubstringMatcher {
    fn find_match<'a>(&self, query: &str, candidates: &'a [String]) -> Option<&'a str> {
        let query = query.to_lowercase();
        if query.is_empty() {
            return None;
        }
        let lowered: Vec<String> = candidates.iter().map(|c| c.to_lowercase()).collect();

        if let Some(i) = lowered.iter().position(|c| *c == query) {
            return Some(&candidates[i]);
        }

        // most specific containing candidate; min_by_key keeps the first on ties
        let contained = lowered
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                contains_either_way(&query, c)
                    || basename_of(c).map_or(false, |b| contains_either_way(&query, &b))
            })
            .min_by_key(|(i, _)| candidates[*i].len());
        if let Some((i, _)) = contained {
            return Some(&candidates[i]);
        }

        let query = strip_separators(&query);
        if query.is_empty() {
            return None;
        }
        lowered
            .iter()
            .position(|c| {
                let c = strip_separators(c);
                !c.is_empty() && contains_either_way(&query, &c)
            })
            .map(|i| candidates[i].as_str())
    }
}

///////////////////////////////
#[derive(Debug, Clone, Copy)]
pub struct RatioMatcher {
    pub cutoff: f64,
}

impl Default for RatioMatcher {
    fn default() -> Self {
        RatioMatcher {
            cutoff: DEFAULT_RATIO_CUTOFF,
        }
    }
}

/// 1 - distance / longer length, in [0, 1]
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let dist = levenshtein(a.as_bytes(), b.as_bytes()) as f64;
    1.0 - dist / longest as f64
}

impl FuzzyMatcher for RatioMatcher {
    fn find_match<'a>(&self, query: &str, candidates: &'a [String]) -> Option<&'a str> {
        let query = query.to_lowercase();
        let mut best: Option<(usize, f64)> = None;
        for (i, candidate) in candidates.iter().enumerate() {
            let score = similarity_ratio(&query, &candidate.to_lowercase());
            if score >= self.cutoff && best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        best.map(|(i, _)| candidates[i].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_substring_passes() {
        let candidates = keys(&["SampleA_extra", "SampleA_extra_long", "liver-1", "Other"]);
        let m = SubstringMatcher;
        assert_eq!(m.find_match("other", &candidates), Some("Other"));
        assert_eq!(m.find_match("SampleA", &candidates), Some("SampleA_extra"));
        assert_eq!(m.find_match("LIVER_1", &candidates), Some("liver-1"));
        assert_eq!(m.find_match("kidney", &candidates), None);
        assert_eq!(m.find_match("", &candidates), None);
    }

    #[test]
    fn test_substring_matches_basename_of_path_keys() {
        let candidates = keys(&["/data/run2/Lung_R1.fq"]);
        assert_eq!(
            SubstringMatcher.find_match("lung_r1.fq.bak", &candidates),
            Some("/data/run2/Lung_R1.fq")
        );
    }

    #[test]
    fn test_ratio_matcher() {
        let candidates = keys(&["Sample01", "Sample10", "Control"]);
        let m = RatioMatcher::default();
        assert_eq!(m.find_match("sampel01", &candidates), Some("Sample01"));
        assert_eq!(m.find_match("xyz", &candidates), None);
        assert!((similarity_ratio("abcd", "abce") - 0.75).abs() < 1e-9);
    }
}

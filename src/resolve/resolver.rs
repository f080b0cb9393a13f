use log::{debug, info, warn};
use serde::Serialize;

use super::fuzzy::{FuzzyMatcher, FuzzyStrategy};
use crate::discover::{SampleKey, SampleTable};
use crate::fileformat::SampleMapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Exact,
    Fuzzy,
}

/// A declared source and the sample it was resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSource {
    pub declared: String,
    pub key: SampleKey,
    pub provenance: Provenance,
}

/// Target with the samples to combine, in mapping order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTarget {
    pub target: String,
    pub sources: Vec<ResolvedSource>,
}

impl ResolvedTarget {
    pub fn keys(&self) -> impl Iterator<Item = &SampleKey> {
        self.sources.iter().map(|s| &s.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedSource {
    pub target: String,
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FuzzySubstitution {
    pub target: String,
    pub declared: String,
    pub resolved: SampleKey,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolution {
    pub targets: Vec<ResolvedTarget>,
    pub unresolved: Vec<UnresolvedSource>,
    pub fuzzy_substitutions: Vec<FuzzySubstitution>,
    /// Targets none of whose sources resolved
    pub dropped_targets: Vec<String>,
}

///////////////////////////////
/// Resolves declared source names against discovered sample keys: exact first, then fuzzy
pub struct MappingResolver<'a> {
    table: &'a SampleTable,
    candidates: Vec<String>,
    matcher: Box<dyn FuzzyMatcher>,
}

impl<'a> MappingResolver<'a> {
    pub fn new(table: &'a SampleTable, strategy: FuzzyStrategy) -> MappingResolver<'a> {
        MappingResolver::with_matcher(table, strategy.matcher())
    }

    pub fn with_matcher(
        table: &'a SampleTable,
        matcher: Box<dyn FuzzyMatcher>,
    ) -> MappingResolver<'a> {
        MappingResolver {
            table,
            candidates: table.keys().cloned().collect(),
            matcher,
        }
    }

    pub fn resolve_source(&self, source: &str) -> Option<(SampleKey, Provenance)> {
        if self.table.contains_key(source) {
            return Some((source.to_string(), Provenance::Exact));
        }
        self.matcher
            .find_match(source, &self.candidates)
            .map(|key| (key.to_string(), Provenance::Fuzzy))
    }

    pub fn resolve(&self, mapping: &SampleMapping) -> Resolution {
        let mut resolution = Resolution::default();

        for entry in mapping.entries() {
            let mut sources: Vec<ResolvedSource> = Vec::new();
            for declared in &entry.sources {
                let (key, provenance) = match self.resolve_source(declared) {
                    Some(found) => found,
                    None => {
                        warn!(
                            "Could not find files for sample '{}' (target '{}')",
                            declared, entry.target
                        );
                        resolution.unresolved.push(UnresolvedSource {
                            target: entry.target.clone(),
                            source: declared.clone(),
                            reason: "no matching sample found".to_string(),
                        });
                        continue;
                    }
                };

                if sources.iter().any(|s| s.key == key) {
                    warn!(
                        "Source '{}' of target '{}' resolves to sample '{}' which is already included",
                        declared, entry.target, key
                    );
                    resolution.unresolved.push(UnresolvedSource {
                        target: entry.target.clone(),
                        source: declared.clone(),
                        reason: format!("duplicate of sample '{}'", key),
                    });
                    continue;
                }

                if provenance == Provenance::Fuzzy {
                    info!("Fuzzy matched '{}' -> '{}'", declared, key);
                    resolution.fuzzy_substitutions.push(FuzzySubstitution {
                        target: entry.target.clone(),
                        declared: declared.clone(),
                        resolved: key.clone(),
                    });
                } else {
                    debug!("Exact match for '{}'", declared);
                }
                sources.push(ResolvedSource {
                    declared: declared.clone(),
                    key,
                    provenance,
                });
            }

            if sources.is_empty() {
                warn!("No files found for target '{}'; it is dropped", entry.target);
                resolution.dropped_targets.push(entry.target.clone());
            } else {
                resolution.targets.push(ResolvedTarget {
                    target: entry.target.clone(),
                    sources,
                });
            }
        }

        info!(
            "Resolved {} targets ({} dropped, {} unresolved sources, {} fuzzy matches)",
            resolution.targets.len(),
            resolution.dropped_targets.len(),
            resolution.unresolved.len(),
            resolution.fuzzy_substitutions.len()
        );
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::FilePair;
    use crate::fileformat::MappingEntry;
    use std::path::PathBuf;

    fn table(keys: &[&str]) -> SampleTable {
        let mut table = SampleTable::new();
        for key in keys {
            table.insert(
                key.to_string(),
                FilePair {
                    r1: PathBuf::from(format!("/d/{}_R1.fq", key)),
                    r2: PathBuf::from(format!("/d/{}_R2.fq", key)),
                },
            );
        }
        table
    }

    fn mapping(rows: &[(&str, &[&str])]) -> SampleMapping {
        rows.iter()
            .map(|(t, s)| MappingEntry {
                target: t.to_string(),
                sources: s.iter().map(|x| x.to_string()).collect(),
            })
            .collect()
    }

    #[test]
    fn test_exact_and_fuzzy_provenance() {
        let table = table(&["SampleA_extra", "SampleB"]);
        let resolver = MappingResolver::new(&table, FuzzyStrategy::Substring);
        let resolution = resolver.resolve(&mapping(&[("pool", &["SampleA", "SampleB"])]));

        let sources = &resolution.targets[0].sources;
        assert_eq!(sources[0].key, "SampleA_extra");
        assert_eq!(sources[0].provenance, Provenance::Fuzzy);
        assert_eq!(sources[1].key, "SampleB");
        assert_eq!(sources[1].provenance, Provenance::Exact);
        assert_eq!(
            resolution.fuzzy_substitutions,
            vec![FuzzySubstitution {
                target: "pool".into(),
                declared: "SampleA".into(),
                resolved: "SampleA_extra".into(),
            }]
        );
    }

    #[test]
    fn test_unresolved_and_dropped_targets() {
        let table = table(&["Liver"]);
        let resolver = MappingResolver::new(&table, FuzzyStrategy::Substring);
        let resolution = resolver.resolve(&mapping(&[
            ("t1", &["Liver", "Kidney", "liver"]),
            ("t2", &["Heart"]),
        ]));

        assert_eq!(resolution.targets.len(), 1);
        assert_eq!(resolution.targets[0].keys().count(), 1);
        assert_eq!(resolution.dropped_targets, vec!["t2".to_string()]);
        let reasons: Vec<&str> = resolution
            .unresolved
            .iter()
            .map(|u| u.source.as_str())
            .collect();
        assert_eq!(reasons, vec!["Kidney", "liver", "Heart"]);
    }
}

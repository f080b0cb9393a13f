mod fuzzy;
mod resolver;

pub use fuzzy::{
    similarity_ratio, FuzzyMatcher, FuzzyStrategy, RatioMatcher, SubstringMatcher,
    DEFAULT_RATIO_CUTOFF,
};
pub use resolver::{
    FuzzySubstitution, MappingResolver, Provenance, Resolution, ResolvedSource, ResolvedTarget,
    UnresolvedSource,
};

mod sample_key;
mod scan;

pub use sample_key::{extract_sample_key, find_mate2, mate2_candidates, SampleKey, MATE_MARKERS};
pub use scan::{default_r1_patterns, Discovery, FileDiscovery, FilePair, Insertion, SampleTable};

use log::warn;
use rustc_hash::FxHashSet;

pub const DEFAULT_DEDUP_LIMIT: usize = 10_000_000;

///////////////////////////////
/// Set of sequences seen so far, with a hard cap on its size.
/// Once the cap is hit the set is released and every later record passes
#[derive(Debug)]
pub struct DedupSet {
    seen: FxHashSet<Vec<u8>>,
    limit: usize,
    exhausted: bool,
    num_duplicates: u64,
    label: String,
}

impl DedupSet {
    pub fn new(limit: usize, label: &str) -> DedupSet {
        DedupSet {
            seen: FxHashSet::default(),
            limit,
            exhausted: false,
            num_duplicates: 0,
            label: label.to_string(),
        }
    }

    /// False if this sequence was seen before
    pub fn is_new(&mut self, seq: &[u8]) -> bool {
        if self.exhausted {
            return true;
        }
        if self.seen.contains(seq) {
            self.num_duplicates += 1;
            return false;
        }
        if self.seen.len() >= self.limit {
            warn!(
                "Deduplication limit of {} sequences reached for {}; passing the remaining records through",
                self.limit, self.label
            );
            self.exhausted = true;
            self.seen = FxHashSet::default();
            return true;
        }
        self.seen.insert(seq.to_vec());
        true
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn num_duplicates(&self) -> u64 {
        self.num_duplicates
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_repeats() {
        let mut set = DedupSet::new(10, "test");
        assert!(set.is_new(b"ACGT"));
        assert!(set.is_new(b"ACGA"));
        assert!(!set.is_new(b"ACGT"));
        assert_eq!(set.num_duplicates(), 1);
    }

    #[test]
    fn test_ceiling_degrades_to_pass_through() {
        let mut set = DedupSet::new(2, "test");
        assert!(set.is_new(b"A"));
        assert!(set.is_new(b"C"));
        assert!(set.is_new(b"G"));
        assert!(set.is_exhausted());
        assert!(set.is_empty());
        // repeats now pass too
        assert!(set.is_new(b"A"));
        assert!(set.is_new(b"A"));
        assert_eq!(set.num_duplicates(), 0);
    }
}

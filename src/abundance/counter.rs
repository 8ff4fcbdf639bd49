use fxhash::FxHashMap;

use super::types::{FrequencyDistribution, SequenceId};

/// Counts reads per unique sequence, keyed by content hash
#[derive(Debug, Default)]
pub struct ReadCounter {
    ids: Vec<SequenceId>,
    counts: Vec<u64>,
    index: FxHashMap<SequenceId, usize>,
}

impl ReadCounter {
    pub fn new() -> Self {
        ReadCounter::default()
    }

    /// Count one read and return the identifier it was keyed to
    pub fn count_sequence(&mut self, sequence: &[u8]) -> SequenceId {
        let id = SequenceId::from_sequence(sequence);
        self.add(id.clone(), 1);
        id
    }

    /// Add `count` observations of an identifier
    pub fn add(&mut self, id: SequenceId, count: u64) {
        match self.index.get(&id) {
            Some(&i) => self.counts[i] += count,
            None => {
                self.index.insert(id.clone(), self.ids.len());
                self.ids.push(id);
                self.counts.push(count);
            }
        }
    }

    /// Number of distinct sequences seen
    pub fn unique_sequences(&self) -> usize {
        self.ids.len()
    }

    /// Total number of reads counted
    pub fn total_reads(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn into_distribution(self) -> FrequencyDistribution {
        FrequencyDistribution::from_parts(self.ids, self.index, self.counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_counting() {
        let mut counter = ReadCounter::new();
        counter.count_sequence(b"ACGT");
        counter.count_sequence(b"TTTT");
        counter.count_sequence(b"ACGT");

        assert_eq!(counter.unique_sequences(), 2);
        assert_eq!(counter.total_reads(), 3);

        let dist = counter.into_distribution();
        assert_eq!(dist.get(&SequenceId::from_sequence(b"ACGT")), 2);
        assert_eq!(dist.get(&SequenceId::from_sequence(b"TTTT")), 1);
    }

    #[test]
    fn test_first_seen_order() {
        let mut counter = ReadCounter::new();
        counter.count_sequence(b"GG");
        counter.count_sequence(b"AA");
        counter.count_sequence(b"GG");

        let dist = counter.into_distribution();
        assert_eq!(dist.ids()[0], SequenceId::from_sequence(b"GG"));
        assert_eq!(dist.counts(), &[2, 1]);
    }

    #[test]
    fn test_empty_counter() {
        let counter = ReadCounter::new();
        assert_eq!(counter.unique_sequences(), 0);
        assert_eq!(counter.total_reads(), 0);
        assert!(counter.into_distribution().is_empty());
    }
}

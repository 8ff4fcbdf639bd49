use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::{FilterError, Result};

/// Canonical identifier of a unique sequence.
///
/// Reads are keyed by the hex SHA-1 of their sequence bytes; identifiers taken
/// from an already dereplicated table are used as they are.
#[derive(Debug, Clone, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(String);

impl SequenceId {
    pub fn new(id: impl Into<String>) -> Self {
        SequenceId(id.into())
    }

    /// Content hash of a read sequence
    pub fn from_sequence(sequence: &[u8]) -> Self {
        let digest = Sha1::digest(sequence);
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest.iter() {
            let _ = write!(hex, "{:02x}", byte);
        }
        SequenceId(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Hash for SequenceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl PartialEq for SequenceId {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered set of identifiers shared by a distribution and its resamples
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Support {
    ids: Vec<SequenceId>,
    index: FxHashMap<SequenceId, usize>,
}

/// Counts per unique sequence for one sample, in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrequencyDistribution {
    support: Arc<Support>,
    counts: Vec<u64>,
}

impl FrequencyDistribution {
    /// Build a distribution from `(id, count)` pairs; identifiers must be unique
    pub fn from_counts<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (SequenceId, u64)>,
    {
        let mut ids = Vec::new();
        let mut counts = Vec::new();
        let mut index = FxHashMap::default();

        for (id, count) in entries {
            if index.contains_key(&id) {
                return Err(FilterError::InvalidInput(format!(
                    "duplicate sequence identifier '{}'",
                    id
                )));
            }
            index.insert(id.clone(), ids.len());
            ids.push(id);
            counts.push(count);
        }

        Ok(FrequencyDistribution {
            support: Arc::new(Support { ids, index }),
            counts,
        })
    }

    pub(crate) fn from_parts(
        ids: Vec<SequenceId>,
        index: FxHashMap<SequenceId, usize>,
        counts: Vec<u64>,
    ) -> Self {
        FrequencyDistribution {
            support: Arc::new(Support { ids, index }),
            counts,
        }
    }

    /// A distribution over the same support with the given counts
    pub(crate) fn with_counts(&self, counts: Vec<u64>) -> Self {
        debug_assert_eq!(counts.len(), self.counts.len());
        FrequencyDistribution {
            support: Arc::clone(&self.support),
            counts,
        }
    }

    /// Same support, every count zero
    pub fn zeroed(&self) -> Self {
        self.with_counts(vec![0; self.counts.len()])
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total number of observations
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Count for an identifier; identifiers outside the support count as 0
    pub fn get(&self, id: &SequenceId) -> u64 {
        self.support
            .index
            .get(id)
            .map(|&i| self.counts[i])
            .unwrap_or(0)
    }

    pub fn contains(&self, id: &SequenceId) -> bool {
        self.support.index.contains_key(id)
    }

    pub fn ids(&self) -> &[SequenceId] {
        &self.support.ids
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SequenceId, u64)> + '_ {
        self.support.ids.iter().zip(self.counts.iter().copied())
    }

    /// True when both distributions are indexed by the same identifiers in the same order
    pub fn same_support(&self, other: &FrequencyDistribution) -> bool {
        Arc::ptr_eq(&self.support, &other.support) || self.support.ids == other.support.ids
    }

    /// Largest observed count, if any
    pub fn max_count(&self) -> Option<u64> {
        self.counts.iter().copied().max()
    }
}

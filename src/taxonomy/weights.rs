use std::collections::BTreeMap;

use log::debug;

use super::{Lineage, Rank, UNKNOWN};

/// Default count below which a class is collapsed into `"unknown"`
pub const DEFAULT_UNKNOWN_THRESHOLD: usize = 10_000;

/// Class counts and weights for a single rank
#[derive(Debug, Clone, PartialEq)]
pub struct RankWeights {
    /// The rank these classes belong to
    pub rank: Rank,

    /// Number of entries per kept class, `"unknown"` included
    pub classes: BTreeMap<String, usize>,

    /// Inverse-frequency weight per kept class, `"unknown"` included
    pub weights: BTreeMap<String, f64>,
}

impl RankWeights {
    /// Tally one rank's class names and collapse rare classes.
    ///
    /// `num_entries` is the total number of entries counted, which every weight is relative to.
    pub fn from_counts(
        rank: Rank,
        counts: BTreeMap<String, usize>,
        num_entries: usize,
        unknown_thr: usize,
    ) -> Self {
        let mut classes = counts.clone();
        let mut weights = BTreeMap::new();
        let mut unknown = 0;

        for (name, count) in counts {
            if count < unknown_thr {
                unknown += count;
                classes.remove(&name);
            } else {
                weights.insert(name, num_entries as f64 / count as f64);
            }
        }

        // A frequent "unknown" class survives the cut and absorbs the collapsed counts
        unknown += classes.get(UNKNOWN).copied().unwrap_or(0);
        classes.insert(UNKNOWN.to_string(), unknown);

        let weight = if unknown != 0 {
            num_entries as f64 / unknown as f64
        } else {
            1.0
        };
        weights.insert(UNKNOWN.to_string(), weight);

        debug!(
            "{}: {} classes kept, {} entries collapsed into {}",
            rank,
            classes.len() - 1,
            unknown,
            UNKNOWN
        );

        Self {
            rank,
            classes,
            weights,
        }
    }

    /// Class labels in head order: kept names sorted, then `"unknown"` last
    pub fn labels(&self) -> Vec<String> {
        self.classes
            .keys()
            .filter(|name| name.as_str() != UNKNOWN)
            .cloned()
            .chain(std::iter::once(UNKNOWN.to_string()))
            .collect()
    }

    /// Weights aligned with the given labels, using 1 for labels without a weight
    pub fn weight_vector(&self, labels: &[String]) -> Vec<f32> {
        labels
            .iter()
            .map(|label| self.weights.get(label).copied().unwrap_or(1.0) as f32)
            .collect()
    }
}

/// Class counts and weights across several ranks
#[derive(Debug, Clone, PartialEq)]
pub struct ClassWeights {
    /// Number of entries counted
    pub num_entries: usize,

    /// One entry per rank, in the order requested
    pub ranks: Vec<RankWeights>,
}

impl ClassWeights {
    /// Resolve each taxid through the lineage and weight its classes at each rank
    pub fn from_taxids<L: Lineage + ?Sized>(
        taxids: &[u32],
        lineage: &L,
        ranks: &[Rank],
        unknown_thr: usize,
    ) -> Self {
        let names = taxids.iter().map(|taxid| {
            lineage
                .ranks(*taxid, ranks)
                .into_iter()
                .map(|taxon| taxon.name)
                .collect::<Vec<_>>()
        });

        Self::from_labels(names, ranks, unknown_thr)
    }

    /// Weight classes from already-resolved names, one name per rank for each entry
    pub fn from_labels<I, S>(entries: I, ranks: &[Rank], unknown_thr: usize) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<[S]>,
        S: AsRef<str>,
    {
        let mut counts: Vec<BTreeMap<String, usize>> = vec![BTreeMap::new(); ranks.len()];
        let mut num_entries = 0;

        for entry in entries {
            num_entries += 1;

            for (rank_counts, name) in counts.iter_mut().zip(entry.as_ref()) {
                *rank_counts.entry(name.as_ref().to_string()).or_insert(0) += 1;
            }
        }

        let ranks = ranks
            .iter()
            .zip(counts)
            .map(|(rank, counts)| RankWeights::from_counts(*rank, counts, num_entries, unknown_thr))
            .collect();

        Self { num_entries, ranks }
    }

    /// The classes and weights of a particular rank
    pub fn get(&self, rank: Rank) -> Option<&RankWeights> {
        self.ranks.iter().find(|weights| weights.rank == rank)
    }
}

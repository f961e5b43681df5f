//! Distribution of gene pairs by stringency.

use std::collections::HashSet;

use crate::error::Result;
use crate::qc;
use crate::support::SupportMatrix;
use crate::types::{GeneId, GeneRecord, Sign};

pub const DEFAULT_MAX_BUCKET: usize = 50;

/// `counts[k]` is the number of pairs supported by exactly `k` experiments,
/// except the last bucket, which also holds every pair above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationHistogram {
    counts: Vec<u64>,
}

impl ConfirmationHistogram {
    /// Tallies every supported pair `(i, j)`, `i < j`, of one sign.
    ///
    /// Pairs with either gene missing from `gene_filter` are skipped.
    /// Stringencies above `max_bucket` are clamped into bucket `max_bucket`.
    pub fn build(
        matrix: &SupportMatrix,
        sign: Sign,
        gene_filter: Option<&HashSet<GeneId>>,
        max_bucket: usize,
    ) -> Result<Self> {
        qc::check_bucket_ceiling(max_bucket, "max_bucket")?;
        let mut counts = vec![0u64; max_bucket + 1];
        for (gene_a, gene_b, bits) in matrix.supported_pairs(sign) {
            if let Some(filter) = gene_filter
                && (!filter.contains(&gene_a) || !filter.contains(&gene_b))
            {
                continue;
            }
            let stringency = bitmatrix::mask::count_bits(bits) as usize;
            if stringency == 0 {
                continue;
            }
            counts[stringency.min(max_bucket)] += 1;
        }
        Ok(Self { counts })
    }

    pub fn from_counts(counts: Vec<u64>) -> Self {
        Self { counts }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn max_bucket(&self) -> usize {
        self.counts.len().saturating_sub(1)
    }

    /// Pairs in bucket `k`; zero beyond the ceiling.
    pub fn count(&self, k: usize) -> u64 {
        self.counts.get(k).copied().unwrap_or(0)
    }

    /// Pairs supported by at least `k` experiments.
    pub fn cumulative(&self, k: usize) -> u64 {
        self.counts.iter().skip(k).sum()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Highest non-empty bucket, or 0 for an empty histogram.
    pub fn max_support(&self) -> usize {
        self.counts.iter().rposition(|&c| c > 0).unwrap_or(0)
    }
}

/// Genes of the primary category, for restricting a histogram to known genes.
pub fn known_gene_filter(genes: &[GeneRecord]) -> HashSet<GeneId> {
    genes
        .iter()
        .filter(|g| g.category.is_primary())
        .map(|g| g.id)
        .collect()
}

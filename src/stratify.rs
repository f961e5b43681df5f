//! GO overlap of linked gene pairs, broken down by how many experiments
//! support each link, plus the random-pair baseline it is read against.

use std::collections::{BTreeSet, HashSet};
use std::io::Write;

use ndarray::{Array2, Axis};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::cache::GoCache;
use crate::error::Result;
use crate::overlap::{OverlapMetric, ScoringConfig, score};
use crate::qc;
use crate::support::SupportMatrix;
use crate::types::{GeneId, GenePair, Sign};

pub const DEFAULT_SUPPORT_BUCKETS: usize = 20;
pub const DEFAULT_OVERLAP_BUCKETS: usize = 50;

#[derive(Debug, Clone)]
pub struct GoStatsConfig {
    /// Rows of the table; support at or above `support_buckets - 1` shares the last row.
    pub support_buckets: usize,
    /// Columns of the table; overlap at or above `overlap_buckets - 1` shares the last column.
    pub overlap_buckets: usize,
    pub sign: Sign,
    pub gene_filter: Option<HashSet<GeneId>>,
}

impl Default for GoStatsConfig {
    fn default() -> Self {
        Self {
            support_buckets: DEFAULT_SUPPORT_BUCKETS,
            overlap_buckets: DEFAULT_OVERLAP_BUCKETS,
            sign: Sign::Positive,
            gene_filter: None,
        }
    }
}

/// Pair counts by (support, simple overlap).
#[derive(Debug, Clone)]
pub struct GoOverlapBySupport {
    table: Array2<u64>,
    covered: BTreeSet<GeneId>,
    unscored: usize,
}

impl GoOverlapBySupport {
    pub fn new(support_buckets: usize, overlap_buckets: usize) -> Result<Self> {
        qc::check_bucket_ceiling(support_buckets, "support_buckets")?;
        qc::check_bucket_ceiling(overlap_buckets, "overlap_buckets")?;
        Ok(Self {
            table: Array2::zeros((support_buckets, overlap_buckets)),
            covered: BTreeSet::new(),
            unscored: 0,
        })
    }

    /// Tallies every supported pair of one sign in `matrix`.
    pub fn from_matrix(matrix: &SupportMatrix, cache: &GoCache, config: &GoStatsConfig) -> Result<Self> {
        let mut stats = Self::new(config.support_buckets, config.overlap_buckets)?;
        let mut seen = 0usize;
        for (gene_a, gene_b, bits) in matrix.supported_pairs(config.sign) {
            if let Some(filter) = &config.gene_filter
                && (!filter.contains(&gene_a) || !filter.contains(&gene_b))
            {
                continue;
            }
            stats.add_link(gene_a, gene_b, bitmatrix::mask::count_bits(bits), cache);
            seen += 1;
            if seen % 50_000 == 0 {
                info!("Counted GO overlap for {seen} links");
            }
        }
        info!(
            "Counted GO overlap for {seen} links ({} unscored)",
            stats.unscored
        );
        Ok(stats)
    }

    /// Tallies links given with their support directly, e.g. read from a file.
    pub fn from_links(links: &[(GenePair, u32)], cache: &GoCache, config: &GoStatsConfig) -> Result<Self> {
        let mut stats = Self::new(config.support_buckets, config.overlap_buckets)?;
        for (pair, support) in links {
            if *support == 0 || pair.first == pair.second {
                continue;
            }
            stats.add_link(pair.first, pair.second, *support, cache);
        }
        Ok(stats)
    }

    /// Scores one link with the simple metric and counts it. Unscored links
    /// are counted separately and left out of the table.
    pub fn add_link(&mut self, gene_a: GeneId, gene_b: GeneId, support: u32, cache: &GoCache) {
        let config = ScoringConfig::new(OverlapMetric::Simple);
        match score(gene_a, gene_b, cache, &config).value() {
            Some(overlap) => {
                self.record(support as usize, overlap as usize);
                self.covered.insert(gene_a);
                self.covered.insert(gene_b);
            }
            None => self.unscored += 1,
        }
    }

    /// Counts one pair, clamping both axes into their last bucket.
    pub fn record(&mut self, support: usize, overlap: usize) {
        let (rows, cols) = self.table.dim();
        self.table[[support.min(rows - 1), overlap.min(cols - 1)]] += 1;
    }

    pub fn table(&self) -> &Array2<u64> {
        &self.table
    }

    pub fn count(&self, support: usize, overlap: usize) -> u64 {
        self.table.get((support, overlap)).copied().unwrap_or(0)
    }

    /// Pairs in support bucket `support`.
    pub fn pairs_at(&self, support: usize) -> u64 {
        if support >= self.table.nrows() {
            return 0;
        }
        self.table.row(support).sum()
    }

    /// Mean (clamped) overlap of the pairs in one support bucket.
    pub fn mean_overlap(&self, support: usize) -> Option<f64> {
        let total = self.pairs_at(support);
        if total == 0 {
            return None;
        }
        let weighted: u64 = self
            .table
            .row(support)
            .iter()
            .enumerate()
            .map(|(overlap, n)| overlap as u64 * n)
            .sum();
        Some(weighted as f64 / total as f64)
    }

    /// Pair totals for each overlap bucket across all support levels.
    pub fn overlap_totals(&self) -> Vec<u64> {
        self.table.sum_axis(Axis(0)).to_vec()
    }

    pub fn covered_genes(&self) -> &BTreeSet<GeneId> {
        &self.covered
    }

    pub fn unscored(&self) -> usize {
        self.unscored
    }

    /// Tab-delimited table: an `Overlap` header, then one `Support=i` row
    /// per support bucket from 1.
    pub fn write_table<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        write!(out, "Overlap")?;
        for j in 0..self.table.ncols() {
            write!(out, "\t{j}")?;
        }
        writeln!(out)?;
        for (i, row) in self.table.axis_iter(Axis(0)).enumerate().skip(1) {
            write!(out, "Support={i}")?;
            for n in row.iter() {
                write!(out, "\t{n}")?;
            }
            writeln!(out)?;
        }
        out.flush()
    }

    pub fn write_means<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        writeln!(out, "support\tpairs\tmean_overlap")?;
        for i in 1..self.table.nrows() {
            let mean = self
                .mean_overlap(i)
                .map_or_else(|| "NA".to_string(), |m| format!("{m:.3}"));
            writeln!(out, "{i}\t{}\t{mean}", self.pairs_at(i))?;
        }
        out.flush()
    }
}

/// Simple-overlap distribution of random pairs: each gene is paired with the
/// gene at the same position in a shuffled copy of `genes`. Pairs of a gene
/// with itself and unscored pairs are skipped.
pub fn random_pair_baseline<R: Rng + ?Sized>(
    genes: &[GeneId],
    cache: &GoCache,
    overlap_buckets: usize,
    rng: &mut R,
) -> Result<Vec<u64>> {
    qc::check_bucket_ceiling(overlap_buckets, "overlap_buckets")?;
    let mut partners = genes.to_vec();
    partners.shuffle(rng);
    let config = ScoringConfig::new(OverlapMetric::Simple);
    let mut counts = vec![0u64; overlap_buckets];
    for (gene, partner) in genes.iter().zip(&partners) {
        if gene == partner {
            continue;
        }
        if let Some(overlap) = score(*gene, *partner, cache, &config).value() {
            counts[(overlap as usize).min(overlap_buckets - 1)] += 1;
        }
    }
    debug!("random baseline over {} genes", genes.len());
    Ok(counts)
}

/// How many genes carry `n` informative terms, clamped into the last bucket.
/// Genes without annotations count as zero.
pub fn term_count_distribution<'a, I>(genes: I, cache: &GoCache, buckets: usize) -> Result<Vec<u64>>
where
    I: IntoIterator<Item = &'a GeneId>,
{
    qc::check_bucket_ceiling(buckets, "buckets")?;
    let mut counts = vec![0u64; buckets];
    for gene in genes {
        let n = cache.terms(*gene).map_or(0, |t| t.informative_len());
        counts[n.min(buckets - 1)] += 1;
    }
    Ok(counts)
}

/// Writes a distribution as cumulative fractions on one labelled line.
pub fn write_cumulative<W: Write>(mut out: W, label: &str, counts: &[u64]) -> std::io::Result<()> {
    let total: u64 = counts.iter().sum();
    write!(out, "{label}")?;
    let mut running = 0u64;
    for n in counts {
        running += n;
        let fraction = if total == 0 {
            0.0
        } else {
            running as f64 / total as f64
        };
        write!(out, "\t{fraction:.4}")?;
    }
    writeln!(out)
}

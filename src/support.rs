//! Bit-packed gene x gene support matrices, one per correlation sign.
//!
//! Bit `e` of cell `(i, j)` is set once experiment `e` reported the pair.
//! Pairs are stored at `(min(i, j), max(i, j))` of the genes' matrix indices,
//! so only the upper triangle is ever written. Every read canonicalizes the
//! same way; asking for `(b, a)` returns what was stored for `(a, b)`.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bitmatrix::{CompressedBitMatrix, format, mask};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{CoexError, Result};
use crate::qc;
use crate::resolver::{GeneResolver, ResolutionStats};
use crate::types::{
    ExperimentIndex, ExperimentLinks, ExperimentRef, GeneId, GenePairObservation, Sign,
    SignFilter, Taxon,
};

#[derive(Debug, Clone)]
pub struct SupportMatrix {
    taxon: Taxon,
    experiments: Vec<ExperimentRef>,
    positive: CompressedBitMatrix<GeneId, GeneId>,
    negative: CompressedBitMatrix<GeneId, GeneId>,
}

impl SupportMatrix {
    /// An empty matrix over `genes` (duplicates collapse, order is ascending)
    /// with one bit per experiment.
    pub fn new<I>(taxon: Taxon, genes: I, experiments: Vec<ExperimentRef>) -> Result<Self>
    where
        I: IntoIterator<Item = GeneId>,
    {
        Self::with_sign_filter(taxon, genes, experiments, SignFilter::Both)
    }

    /// Like [`SupportMatrix::new`], but a sign the filter rejects gets no
    /// bits at all. Reads of that sign see empty support and writes fail.
    pub fn with_sign_filter<I>(
        taxon: Taxon,
        genes: I,
        experiments: Vec<ExperimentRef>,
        sign_filter: SignFilter,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = GeneId>,
    {
        let genes: BTreeSet<GeneId> = genes.into_iter().collect();
        let n = genes.len();
        let bits = experiments.len();
        let bits_for = |sign| if sign_filter.accepts(sign) { bits } else { 0 };
        let mut positive = CompressedBitMatrix::new(n, n, bits_for(Sign::Positive));
        let mut negative = CompressedBitMatrix::new(n, n, bits_for(Sign::Negative));
        for gene in genes {
            positive.add_row_name(gene)?;
            positive.add_column_name(gene)?;
            negative.add_row_name(gene)?;
            negative.add_column_name(gene)?;
        }
        debug!("support matrix: {n} genes x {bits} experiments ({sign_filter:?})");
        Ok(Self {
            taxon,
            experiments,
            positive,
            negative,
        })
    }

    pub fn taxon(&self) -> &Taxon {
        &self.taxon
    }

    pub fn genes(&self) -> &[GeneId] {
        self.positive.row_names()
    }

    pub fn gene_count(&self) -> usize {
        self.positive.rows()
    }

    pub fn experiments(&self) -> &[ExperimentRef] {
        &self.experiments
    }

    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    pub fn contains(&self, gene: GeneId) -> bool {
        self.positive.row_index(&gene).is_some()
    }

    pub fn index_of(&self, gene: GeneId) -> Result<usize> {
        self.positive
            .row_index(&gene)
            .ok_or(CoexError::UnknownKey { id: gene })
    }

    fn matrix(&self, sign: Sign) -> &CompressedBitMatrix<GeneId, GeneId> {
        match sign {
            Sign::Positive => &self.positive,
            Sign::Negative => &self.negative,
        }
    }

    fn matrix_mut(&mut self, sign: Sign) -> &mut CompressedBitMatrix<GeneId, GeneId> {
        match sign {
            Sign::Positive => &mut self.positive,
            Sign::Negative => &mut self.negative,
        }
    }

    fn canonical(&self, gene_a: GeneId, gene_b: GeneId) -> Result<(usize, usize)> {
        let i = self.index_of(gene_a)?;
        let j = self.index_of(gene_b)?;
        Ok(if i <= j { (i, j) } else { (j, i) })
    }

    /// Records that `experiment` supports the pair. Self pairs are ignored.
    ///
    /// Returns `true` when the bit was not already set.
    pub fn add_observation(
        &mut self,
        gene_a: GeneId,
        gene_b: GeneId,
        experiment: ExperimentIndex,
        sign: Sign,
    ) -> Result<bool> {
        let (i, j) = self.canonical(gene_a, gene_b)?;
        if i == j {
            return Ok(false);
        }
        Ok(self.matrix_mut(sign).set(i, j, experiment)?)
    }

    pub fn support_bits(&self, gene_a: GeneId, gene_b: GeneId, sign: Sign) -> Result<&[u64]> {
        let (i, j) = self.canonical(gene_a, gene_b)?;
        Ok(self.matrix(sign).cell(i, j)?)
    }

    /// Number of experiments supporting the pair.
    pub fn stringency(&self, gene_a: GeneId, gene_b: GeneId, sign: Sign) -> Result<u32> {
        Ok(mask::count_bits(self.support_bits(gene_a, gene_b, sign)?))
    }

    /// Every pair with at least one supporting experiment, as
    /// `(first, second, bits)` with `first` stored before `second`.
    pub fn supported_pairs(&self, sign: Sign) -> impl Iterator<Item = (GeneId, GeneId, &[u64])> {
        let genes = self.genes();
        self.matrix(sign)
            .non_empty_cells()
            .filter(|(i, j, _)| i < j)
            .map(move |(i, j, bits)| (genes[i], genes[j], bits))
    }

    /// ORs `other` into `self`. Both must cover the same genes and experiments.
    pub fn merge(&mut self, other: &SupportMatrix) -> Result<()> {
        if self.experiments != other.experiments {
            return Err(CoexError::Configuration(
                "cannot merge support matrices over different experiments".to_string(),
            ));
        }
        self.positive.merge_or(&other.positive)?;
        self.negative.merge_or(&other.negative)?;
        Ok(())
    }

    /// Short names of the experiments whose bits are set in `bits`.
    pub fn experiment_names(&self, bits: &[u64]) -> Vec<&str> {
        mask::set_indices(bits)
            .into_iter()
            .filter_map(|e| self.experiments.get(e))
            .map(|e| e.short_name.as_str())
            .collect()
    }

    /// Folds observations in, skipping signs the filter rejects and genes
    /// outside the matrix.
    pub fn accumulate(
        &mut self,
        observations: &[GenePairObservation],
        sign_filter: SignFilter,
    ) -> Result<AccumulationStats> {
        let mut stats = AccumulationStats::default();
        for obs in observations {
            if !sign_filter.accepts(obs.sign) {
                stats.sign_filtered += 1;
                continue;
            }
            if !self.contains(obs.gene_a) || !self.contains(obs.gene_b) {
                stats.outside_universe += 1;
                continue;
            }
            if self.add_observation(obs.gene_a, obs.gene_b, obs.experiment, obs.sign)? {
                stats.bits_set += 1;
            }
        }
        Ok(stats)
    }

    /// Writes `<prefix>.positive.txt`, `<prefix>.negative.txt` and
    /// `<prefix>.experiments.tsv`.
    pub fn save(&self, prefix: &Path) -> Result<()> {
        for sign in [Sign::Positive, Sign::Negative] {
            let path = sign_path(prefix, sign);
            let mut out = BufWriter::new(File::create(&path)?);
            format::write_to(self.matrix(sign), &mut out)?;
            out.flush()?;
        }
        let mut out = BufWriter::new(File::create(experiments_path(prefix))?);
        writeln!(out, "#taxon\t{}", self.taxon)?;
        for (index, exp) in self.experiments.iter().enumerate() {
            writeln!(out, "{index}\t{}\t{}", exp.id, exp.short_name)?;
        }
        out.flush()?;
        info!("Saved support matrix to {}.*", prefix.display());
        Ok(())
    }

    pub fn load(prefix: &Path) -> Result<Self> {
        let (taxon, experiments) = read_experiments(&experiments_path(prefix))?;
        let positive: CompressedBitMatrix<GeneId, GeneId> = format::read_from(BufReader::new(
            File::open(sign_path(prefix, Sign::Positive))?,
        ))?;
        let negative: CompressedBitMatrix<GeneId, GeneId> = format::read_from(BufReader::new(
            File::open(sign_path(prefix, Sign::Negative))?,
        ))?;
        if positive.row_names() != negative.row_names()
            || positive.row_names() != positive.column_names()
        {
            return Err(CoexError::Parse(
                "positive and negative matrices disagree on genes".to_string(),
            ));
        }
        // a sign left out by a filter is stored without bits
        let fits = |bits: usize| bits == experiments.len() || bits == 0;
        if !fits(positive.bits()) || !fits(negative.bits()) {
            return Err(CoexError::Parse(format!(
                "matrices carry {} bits but {} experiments are listed",
                positive.bits(),
                experiments.len()
            )));
        }
        Ok(Self {
            taxon,
            experiments,
            positive,
            negative,
        })
    }
}

fn sign_path(prefix: &Path, sign: Sign) -> PathBuf {
    PathBuf::from(format!("{}.{sign}.txt", prefix.display()))
}

fn experiments_path(prefix: &Path) -> PathBuf {
    PathBuf::from(format!("{}.experiments.tsv", prefix.display()))
}

fn read_experiments(path: &Path) -> Result<(Taxon, Vec<ExperimentRef>)> {
    let reader = BufReader::new(File::open(path)?);
    let mut taxon = None;
    let mut experiments = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("#taxon\t") {
            taxon = Some(Taxon(rest.trim().to_string()));
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let [index, id, short_name] = fields.as_slice() else {
            return Err(CoexError::Parse(format!("bad experiment row '{line}'")));
        };
        let index: usize = index
            .parse()
            .map_err(|_| CoexError::Parse(format!("bad experiment index '{index}'")))?;
        if index != experiments.len() {
            return Err(CoexError::Parse(format!(
                "experiment rows out of order at index {index}"
            )));
        }
        let id: u64 = id
            .parse()
            .map_err(|_| CoexError::Parse(format!("bad experiment id '{id}'")))?;
        experiments.push(ExperimentRef {
            id,
            short_name: short_name.to_string(),
        });
    }
    let taxon = taxon.ok_or_else(|| CoexError::Parse("missing #taxon line".to_string()))?;
    Ok((taxon, experiments))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulationStats {
    pub bits_set: usize,
    pub sign_filtered: usize,
    /// Observations naming a gene the matrix does not cover.
    pub outside_universe: usize,
}

impl AccumulationStats {
    pub fn add(&mut self, other: AccumulationStats) {
        self.bits_set += other.bits_set;
        self.sign_filtered += other.sign_filtered;
        self.outside_universe += other.outside_universe;
    }
}

#[derive(Debug, Clone, Default)]
pub struct SupportConfig {
    pub sign_filter: SignFilter,
    /// Genes the matrix covers. `None` takes every gene seen in a resolved link.
    pub universe: Option<Vec<GeneId>>,
    /// Resolve experiments on the rayon pool. Accumulation stays sequential.
    pub parallel: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupportSummary {
    pub resolution: ResolutionStats,
    pub accumulation: AccumulationStats,
}

/// Resolves every experiment's links and folds them into a fresh matrix.
///
/// Bit indices are the experiments' `index` fields, which must cover
/// `0..experiments.len()` exactly once in any order.
pub fn compute_support_matrix(
    taxon: &Taxon,
    experiments: &[ExperimentLinks],
    resolver: &GeneResolver,
    config: &SupportConfig,
) -> Result<(SupportMatrix, SupportSummary)> {
    let refs = experiment_refs(experiments)?;

    let resolve_one = |exp: &ExperimentLinks| resolver.resolve_links(&exp.links);
    let resolved: Vec<(Vec<GenePairObservation>, ResolutionStats)> = if config.parallel {
        experiments.par_iter().map(resolve_one).collect()
    } else {
        experiments.iter().map(resolve_one).collect()
    };

    let mut resolution = ResolutionStats::default();
    let mut observations = Vec::with_capacity(resolved.len());
    for (obs, stats) in resolved {
        resolution.add(stats);
        observations.push(obs);
    }
    let (matrix, accumulation) = support_from_observations(taxon, refs, &observations, config)?;
    let summary = SupportSummary {
        resolution,
        accumulation,
    };
    debug!(
        "{} links, {} gaps, {} bits set, {} outside the gene universe",
        summary.resolution.links,
        summary.resolution.gaps,
        summary.accumulation.bits_set,
        summary.accumulation.outside_universe
    );
    Ok((matrix, summary))
}

/// Experiment references in bit order.
///
/// Every link must carry its experiment's index, and no two experiments may
/// share one.
pub fn experiment_refs(experiments: &[ExperimentLinks]) -> Result<Vec<ExperimentRef>> {
    let n = experiments.len();
    let mut slots: Vec<Option<&ExperimentRef>> = vec![None; n];
    for exp in experiments {
        qc::check_experiment_index(exp.index, n)?;
        if let Some(link) = exp.links.iter().find(|l| l.experiment != exp.index) {
            return Err(CoexError::Configuration(format!(
                "Link in experiment {} (index {}) is tagged with experiment index {}",
                exp.experiment.short_name, exp.index, link.experiment
            )));
        }
        if let Some(prev) = slots[exp.index] {
            return Err(CoexError::Configuration(format!(
                "Experiments {} and {} share index {}",
                prev.short_name, exp.experiment.short_name, exp.index
            )));
        }
        slots[exp.index] = Some(&exp.experiment);
    }
    // n distinct indices below n fill every slot
    Ok(slots.into_iter().flatten().cloned().collect())
}

/// Builds a matrix from observations already resolved per experiment.
pub fn support_from_observations(
    taxon: &Taxon,
    experiments: Vec<ExperimentRef>,
    observations: &[Vec<GenePairObservation>],
    config: &SupportConfig,
) -> Result<(SupportMatrix, AccumulationStats)> {
    let genes: Vec<GeneId> = match &config.universe {
        Some(universe) => universe.clone(),
        None => observations
            .iter()
            .flat_map(|obs| obs.iter().flat_map(|o| [o.gene_a, o.gene_b]))
            .collect(),
    };
    let mut matrix =
        SupportMatrix::with_sign_filter(taxon.clone(), genes, experiments, config.sign_filter)?;
    let mut stats = AccumulationStats::default();
    for batch in observations {
        stats.add(matrix.accumulate(batch, config.sign_filter)?);
    }
    Ok((matrix, stats))
}

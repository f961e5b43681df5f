//! Coexpression link confirmation statistics and GO functional overlap.
//!
//! Probe-level links from many experiments are resolved to gene pairs and
//! folded into bit-packed support matrices. Confirmation histograms count
//! pairs by how many experiments support them, and shuffle trials give the
//! null those counts are compared against. Linked pairs can be scored for
//! shared Gene Ontology annotation.

pub mod error;
pub mod logging;
pub mod types;

pub mod io;
pub mod parallel;
pub mod qc;
pub mod sources;

pub mod cache;
pub mod comparison;
pub mod histogram;
pub mod ontology;
pub mod overlap;
pub mod resolver;
pub mod shuffle;
pub mod stratify;
pub mod support;

pub use error::{CoexError, Result};
pub use histogram::ConfirmationHistogram;
pub use overlap::{OverlapMetric, OverlapScore};
pub use support::SupportMatrix;

use std::collections::{HashMap, HashSet};

use crate::cache::GoCache;
use crate::overlap::ScoringConfig;
use crate::resolver::GeneResolver;
use crate::shuffle::ShuffleTrialConfig;
use crate::support::SupportConfig;
use crate::types::{ExperimentLinks, GeneId, GenePair, Sign, SignFilter, Taxon};

/// Builds the support matrix for every experiment's links, keeping the signs
/// `sign_filter` accepts.
pub fn compute_support_matrix(
    taxon: &Taxon,
    experiments: &[ExperimentLinks],
    resolver: &GeneResolver,
    sign_filter: SignFilter,
) -> Result<SupportMatrix> {
    let config = SupportConfig {
        sign_filter,
        ..Default::default()
    };
    Ok(support::compute_support_matrix(taxon, experiments, resolver, &config)?.0)
}

pub fn build_confirmation_histogram(
    matrix: &SupportMatrix,
    sign: Sign,
    gene_filter: Option<&HashSet<GeneId>>,
) -> Result<ConfirmationHistogram> {
    ConfirmationHistogram::build(matrix, sign, gene_filter, histogram::DEFAULT_MAX_BUCKET)
}

/// `iterations` seeded-or-random shuffle trials with default settings.
pub fn run_shuffle_trials(
    taxon: &Taxon,
    experiments: &[ExperimentLinks],
    resolver: &GeneResolver,
    iterations: usize,
) -> Result<Vec<ConfirmationHistogram>> {
    let config = ShuffleTrialConfig {
        iterations,
        ..Default::default()
    };
    shuffle::run_shuffle_trials(taxon, experiments, resolver, &config)
}

pub fn score_gene_pairs(
    pairs: &[GenePair],
    cache: &GoCache,
    metric: OverlapMetric,
) -> HashMap<GenePair, OverlapScore> {
    overlap::score_gene_pairs(pairs, cache, &ScoringConfig::new(metric))
}

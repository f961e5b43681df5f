//! Null distributions for confirmation histograms.
//!
//! Each trial shuffles every experiment's links on its own, builds a fresh
//! support matrix from them and keeps only the resulting histogram.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::info;

use crate::error::{CoexError, Result};
use crate::histogram::{ConfirmationHistogram, DEFAULT_MAX_BUCKET};
use crate::logging::Progress;
use crate::parallel::{collect_results, resolve_threads, run_in_pool};
use crate::qc;
use crate::resolver::GeneResolver;
use crate::support::{
    SupportConfig, compute_support_matrix, experiment_refs, support_from_observations,
};
use crate::types::{ExperimentLinks, GeneId, GenePairObservation, Link, Sign, Taxon};

/// Fisher-Yates permutation of the second probe across `links`.
///
/// First probes, signs and experiments stay where they are, so every probe
/// keeps the number of links it takes part in.
pub fn shuffle_links<R: Rng + ?Sized>(links: &[Link], rng: &mut R) -> Vec<Link> {
    let mut out = links.to_vec();
    let mut i = out.len();
    while i > 1 {
        i -= 1;
        let k = rng.random_range(0..=i);
        let tmp = out[i].probe_b;
        out[i].probe_b = out[k].probe_b;
        out[k].probe_b = tmp;
    }
    out
}

/// Relabels both ends of every observation through one random permutation
/// of `universe`, or of the genes the observations use when there is none.
///
/// Genes outside the universe keep their label.
pub fn relabel_genes<R: Rng + ?Sized>(
    observations: &[GenePairObservation],
    universe: Option<&[GeneId]>,
    rng: &mut R,
) -> Vec<GenePairObservation> {
    let genes: Vec<GeneId> = match universe {
        Some(universe) => universe.iter().copied().collect::<BTreeSet<_>>(),
        None => observations
            .iter()
            .flat_map(|o| [o.gene_a, o.gene_b])
            .collect::<BTreeSet<_>>(),
    }
    .into_iter()
    .collect();
    let mut shuffled = genes.clone();
    shuffled.shuffle(rng);
    let relabel: HashMap<GeneId, GeneId> = genes.into_iter().zip(shuffled).collect();
    let map = |g: GeneId| relabel.get(&g).copied().unwrap_or(g);
    observations
        .iter()
        .map(|o| GenePairObservation {
            gene_a: map(o.gene_a),
            gene_b: map(o.gene_b),
            ..*o
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShuffleMethod {
    /// Permute second probes within each experiment.
    #[default]
    SecondEndpoint,
    /// Permute gene labels of each experiment's resolved links over the
    /// trial universe.
    GeneRelabel,
}

impl FromStr for ShuffleMethod {
    type Err = CoexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "probe" | "second-endpoint" | "second_endpoint" => Ok(ShuffleMethod::SecondEndpoint),
            "gene" | "gene-relabel" | "gene_relabel" => Ok(ShuffleMethod::GeneRelabel),
            other => Err(CoexError::Configuration(format!(
                "unknown shuffle method '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShuffleTrialConfig {
    pub iterations: usize,
    pub max_bucket: usize,
    /// Trial `i` is seeded with `seed + i`; without a seed each trial uses OS entropy.
    pub seed: Option<u64>,
    pub method: ShuffleMethod,
    pub sign: Sign,
    pub gene_filter: Option<HashSet<GeneId>>,
    /// Genes every trial matrix covers. Pass the real matrix's genes so that
    /// real and null histograms are filtered the same way.
    pub universe: Option<Vec<GeneId>>,
    pub parallel: bool,
    pub cores: Option<usize>,
}

impl Default for ShuffleTrialConfig {
    fn default() -> Self {
        Self {
            iterations: 0,
            max_bucket: DEFAULT_MAX_BUCKET,
            seed: None,
            method: ShuffleMethod::default(),
            sign: Sign::Positive,
            gene_filter: None,
            universe: None,
            parallel: false,
            cores: None,
        }
    }
}

/// Runs `config.iterations` independent shuffle trials.
///
/// Zero iterations yield an empty list.
pub fn run_shuffle_trials(
    taxon: &Taxon,
    experiments: &[ExperimentLinks],
    resolver: &GeneResolver,
    config: &ShuffleTrialConfig,
) -> Result<Vec<ConfirmationHistogram>> {
    qc::check_bucket_ceiling(config.max_bucket, "max_bucket")?;
    if config.iterations == 0 {
        return Ok(Vec::new());
    }
    info!(
        "Running {} shuffle trials over {} experiments",
        config.iterations,
        experiments.len()
    );

    let progress = Progress::new("shuffle trials", config.iterations);
    let trial = |i: usize| -> Result<ConfirmationHistogram> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(i as u64)),
            None => StdRng::from_os_rng(),
        };
        let histogram = run_trial(taxon, experiments, resolver, config, &mut rng)?;
        progress.tick();
        Ok(histogram)
    };

    if config.parallel {
        let threads = resolve_threads(config.cores, config.iterations);
        let run = || {
            (0..config.iterations)
                .into_par_iter()
                .map(trial)
                .collect::<Vec<Result<ConfirmationHistogram>>>()
        };
        let results = run_in_pool(threads, "build shuffle thread pool", run)?;
        collect_results(results)
    } else {
        (0..config.iterations).map(trial).collect()
    }
}

/// One trial: shuffle, accumulate into a matrix owned by this trial, reduce.
///
/// The trial matrix only stores `config.sign`.
pub fn run_trial<R: Rng + ?Sized>(
    taxon: &Taxon,
    experiments: &[ExperimentLinks],
    resolver: &GeneResolver,
    config: &ShuffleTrialConfig,
    rng: &mut R,
) -> Result<ConfirmationHistogram> {
    let support = SupportConfig {
        sign_filter: config.sign.into(),
        universe: config.universe.clone(),
        parallel: false,
    };
    let matrix = match config.method {
        ShuffleMethod::SecondEndpoint => {
            let shuffled: Vec<ExperimentLinks> = experiments
                .iter()
                .map(|e| ExperimentLinks {
                    index: e.index,
                    experiment: e.experiment.clone(),
                    taxon: e.taxon.clone(),
                    links: shuffle_links(&e.links, rng),
                })
                .collect();
            compute_support_matrix(taxon, &shuffled, resolver, &support)?.0
        }
        ShuffleMethod::GeneRelabel => {
            let observations: Vec<Vec<GenePairObservation>> = experiments
                .iter()
                .map(|e| {
                    let observed = resolver.resolve_links(&e.links).0;
                    relabel_genes(&observed, config.universe.as_deref(), rng)
                })
                .collect();
            let refs = experiment_refs(experiments)?;
            support_from_observations(taxon, refs, &observations, &support)?.0
        }
    };
    ConfirmationHistogram::build(
        &matrix,
        config.sign,
        config.gene_filter.as_ref(),
        config.max_bucket,
    )
}

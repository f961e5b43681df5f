//! GO functional overlap between genes.
//!
//! A pair is unscored when either gene has no informative term (nothing left
//! after dropping the three aspect roots). Unscored pairs carry
//! [`OverlapScore::Unscored`] and must stay out of any aggregate.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use statrs::statistics::{Data, Median};
use tracing::debug;

use crate::cache::GoCache;
use crate::error::CoexError;
use crate::ontology::GoTermSet;
use crate::types::{GeneId, GenePair, GeneRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapMetric {
    /// Number of shared informative terms.
    #[default]
    Simple,
    /// Shared terms over the smaller informative set.
    Percent,
    /// `-log10` of the smallest corpus probability among shared terms.
    MaxProbability,
    Cosine,
    Kappa,
}

impl OverlapMetric {
    /// Metrics that score a merged term set for genes sharing a symbol.
    pub fn merges_duplicates(self) -> bool {
        matches!(self, OverlapMetric::Simple | OverlapMetric::Percent)
    }
}

impl FromStr for OverlapMetric {
    type Err = CoexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(OverlapMetric::Simple),
            "percent" => Ok(OverlapMetric::Percent),
            "resnik" | "max-probability" | "maxprob" | "max_probability" => {
                Ok(OverlapMetric::MaxProbability)
            }
            "cosine" => Ok(OverlapMetric::Cosine),
            "kappa" => Ok(OverlapMetric::Kappa),
            other => Err(CoexError::Configuration(format!(
                "unknown overlap metric '{other}' (expected simple, percent, resnik, cosine or kappa)"
            ))),
        }
    }
}

impl fmt::Display for OverlapMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OverlapMetric::Simple => "simple",
            OverlapMetric::Percent => "percent",
            OverlapMetric::MaxProbability => "resnik",
            OverlapMetric::Cosine => "cosine",
            OverlapMetric::Kappa => "kappa",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlapScore {
    Scored(f64),
    Unscored,
}

impl OverlapScore {
    pub fn value(self) -> Option<f64> {
        match self {
            OverlapScore::Scored(v) => Some(v),
            OverlapScore::Unscored => None,
        }
    }

    pub fn is_scored(self) -> bool {
        matches!(self, OverlapScore::Scored(_))
    }
}

impl fmt::Display for OverlapScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlapScore::Scored(v) => write!(f, "{v}"),
            OverlapScore::Unscored => f.write_str("NA"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringConfig {
    pub metric: OverlapMetric,
    /// Weight vector entries by `log10(N / freq)` for the cosine metric.
    pub weighted: bool,
}

impl ScoringConfig {
    pub fn new(metric: OverlapMetric) -> Self {
        Self {
            metric,
            weighted: false,
        }
    }
}

pub fn score(gene_a: GeneId, gene_b: GeneId, cache: &GoCache, config: &ScoringConfig) -> OverlapScore {
    score_term_sets(cache.terms(gene_a), cache.terms(gene_b), cache, config)
}

/// Scores two term sets directly; `None` is a gene without annotations.
pub fn score_term_sets(
    terms_a: Option<&GoTermSet>,
    terms_b: Option<&GoTermSet>,
    cache: &GoCache,
    config: &ScoringConfig,
) -> OverlapScore {
    let (Some(a), Some(b)) = (terms_a, terms_b) else {
        return OverlapScore::Unscored;
    };
    let len_a = a.informative_len();
    let len_b = b.informative_len();
    if len_a == 0 || len_b == 0 {
        return OverlapScore::Unscored;
    }

    let value = match config.metric {
        OverlapMetric::Simple => shared(a, b).count() as f64,
        OverlapMetric::Percent => shared(a, b).count() as f64 / len_a.min(len_b) as f64,
        OverlapMetric::MaxProbability => shared(a, b)
            .filter_map(|t| cache.get(t))
            .filter(|p| *p > 0.0)
            .reduce(f64::min)
            .map_or(0.0, |pmin| -pmin.log10()),
        OverlapMetric::Cosine => cosine(a, b, cache, config.weighted),
        OverlapMetric::Kappa => kappa(a, b, len_a, len_b, cache.universe_size()),
    };
    OverlapScore::Scored(value)
}

fn shared<'a>(a: &'a GoTermSet, b: &'a GoTermSet) -> impl Iterator<Item = &'a str> {
    a.informative().filter(move |t| b.contains(t))
}

/// Terms both genes carry, roots excluded.
pub fn overlapping_terms(gene_a: GeneId, gene_b: GeneId, cache: &GoCache) -> Vec<String> {
    match (cache.terms(gene_a), cache.terms(gene_b)) {
        (Some(a), Some(b)) => shared(a, b).map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn cosine(a: &GoTermSet, b: &GoTermSet, cache: &GoCache, weighted: bool) -> f64 {
    let w = |t: &str| if weighted { cache.weight(t) } else { 1.0 };
    let dot: f64 = shared(a, b).map(|t| w(t) * w(t)).sum();
    let norm_a = a.informative().map(|t| w(t) * w(t)).sum::<f64>().sqrt();
    let norm_b = b.informative().map(|t| w(t) * w(t)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Cohen's kappa on the 2x2 presence table over the term universe.
fn kappa(a: &GoTermSet, b: &GoTermSet, len_a: usize, len_b: usize, universe: usize) -> f64 {
    let both = shared(a, b).count();
    let only_a = len_a - both;
    let only_b = len_b - both;
    let used = both + only_a + only_b;
    let total = universe.max(used) as f64;
    let neither = total - used as f64;
    let (a, b, c, d) = (both as f64, only_a as f64, only_b as f64, neither);

    let observed = (a + d) / total;
    let r1 = a + b;
    let r0 = c + d;
    let c1 = a + c;
    let c0 = b + d;
    let chance = (c1 * r1 + c0 * r0) / (total * total);
    if chance >= 1.0 {
        return 0.0;
    }
    (observed - chance) / (1.0 - chance)
}

/// Scores every pair. The result has one entry per distinct pair.
pub fn score_gene_pairs(
    pairs: &[GenePair],
    cache: &GoCache,
    config: &ScoringConfig,
) -> HashMap<GenePair, OverlapScore> {
    let scores: HashMap<GenePair, OverlapScore> = pairs
        .par_iter()
        .map(|pair| (*pair, score(pair.first, pair.second, cache, config)))
        .collect();
    debug!(
        "{} of {} pairs scored with {}",
        scores.values().filter(|s| s.is_scored()).count(),
        scores.len(),
        config.metric
    );
    scores
}

/// Genes sharing a symbol, with their term sets united.
fn merge_by_symbol(genes: &[GeneRecord], cache: &GoCache) -> Vec<(Vec<GeneId>, Option<GoTermSet>)> {
    let mut groups: BTreeMap<&str, (Vec<GeneId>, Option<GoTermSet>)> = BTreeMap::new();
    for gene in genes {
        let entry = groups.entry(gene.symbol.as_str()).or_default();
        entry.0.push(gene.id);
        if let Some(terms) = cache.terms(gene.id) {
            entry.1.get_or_insert_with(GoTermSet::new).union_with(terms);
        }
    }
    groups.into_values().collect()
}

/// One score for a probe-level pair whose probes map to several genes.
///
/// Every gene-level combination is scored, same-gene combinations skipped,
/// and the median of the scored ones reported. For metrics that merge
/// duplicates, genes sharing a symbol on one side count once with the union
/// of their terms.
pub fn score_expanded(
    genes_a: &[GeneRecord],
    genes_b: &[GeneRecord],
    cache: &GoCache,
    config: &ScoringConfig,
) -> OverlapScore {
    let groups = |genes: &[GeneRecord]| -> Vec<(Vec<GeneId>, Option<GoTermSet>)> {
        if config.metric.merges_duplicates() {
            merge_by_symbol(genes, cache)
        } else {
            genes
                .iter()
                .map(|g| (vec![g.id], cache.terms(g.id).cloned()))
                .collect()
        }
    };
    let side_a = groups(genes_a);
    let side_b = groups(genes_b);

    let mut values = Vec::with_capacity(side_a.len() * side_b.len());
    for (ids_a, terms_a) in &side_a {
        for (ids_b, terms_b) in &side_b {
            if ids_a.iter().any(|id| ids_b.contains(id)) {
                continue;
            }
            if let Some(v) = score_term_sets(terms_a.as_ref(), terms_b.as_ref(), cache, config).value() {
                values.push(v);
            }
        }
    }
    match values.len() {
        0 => OverlapScore::Unscored,
        1 => OverlapScore::Scored(values[0]),
        _ => OverlapScore::Scored(Data::new(values).median()),
    }
}

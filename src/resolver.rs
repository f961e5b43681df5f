//! Probe-pair links to gene-pair observations.
//!
//! A probe may hit zero, one or many genes. A link expands to the cross
//! product of both sides' genes, minus self pairs. Probes without any gene
//! mapping are resolution gaps: the link is dropped and counted, never
//! reported as an error.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::error::Result;
use crate::sources::ProbeGeneLookup;
use crate::types::{ExperimentLinks, GenePairObservation, GeneRecord, Link, ProbeId};

#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// Drop predicted genes and probe-aligned regions before expansion.
    pub exclude_non_primary: bool,
    /// Drop links whose probes map to more than one gene.
    pub filter_non_specific: bool,
}

/// Expands one link given the gene mappings of its two probes.
pub fn resolve(
    link: &Link,
    genes_a: &[GeneRecord],
    genes_b: &[GeneRecord],
    config: &ResolverConfig,
) -> Vec<GenePairObservation> {
    if genes_a.is_empty() || genes_b.is_empty() {
        return Vec::new();
    }
    if config.filter_non_specific && (genes_a.len() > 1 || genes_b.len() > 1) {
        return Vec::new();
    }

    let keep = |g: &&GeneRecord| !config.exclude_non_primary || g.category.is_primary();
    let mut out = Vec::with_capacity(genes_a.len() * genes_b.len());
    for a in genes_a.iter().filter(keep) {
        for b in genes_b.iter().filter(keep) {
            if a.id == b.id {
                continue;
            }
            out.push(GenePairObservation {
                gene_a: a.id,
                gene_b: b.id,
                experiment: link.experiment,
                sign: link.sign,
            });
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub links: usize,
    /// Links with at least one unmapped probe.
    pub gaps: usize,
    pub observations: usize,
}

impl ResolutionStats {
    pub fn add(&mut self, other: ResolutionStats) {
        self.links += other.links;
        self.gaps += other.gaps;
        self.observations += other.observations;
    }
}

/// A probe-to-gene mapping fetched once for a batch of probes, plus the
/// expansion policy applied to every link.
#[derive(Debug, Clone)]
pub struct GeneResolver {
    probe_genes: HashMap<ProbeId, Vec<GeneRecord>>,
    config: ResolverConfig,
}

impl GeneResolver {
    pub fn new(probe_genes: HashMap<ProbeId, Vec<GeneRecord>>, config: ResolverConfig) -> Self {
        Self {
            probe_genes,
            config,
        }
    }

    /// Looks up every probe used by `experiments` in a single batch.
    pub fn from_lookup<L>(
        lookup: &L,
        experiments: &[ExperimentLinks],
        config: ResolverConfig,
    ) -> Result<Self>
    where
        L: ProbeGeneLookup + ?Sized,
    {
        let probes: BTreeSet<ProbeId> = experiments
            .iter()
            .flat_map(|e| e.links.iter())
            .flat_map(|l| [l.probe_a, l.probe_b])
            .collect();
        let probes: Vec<ProbeId> = probes.into_iter().collect();
        let probe_genes = lookup.genes_for_probes(&probes)?;
        info!(
            "{} of {} probes map to at least one gene",
            probe_genes.values().filter(|g| !g.is_empty()).count(),
            probes.len()
        );
        Ok(Self::new(probe_genes, config))
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn genes_for(&self, probe: ProbeId) -> &[GeneRecord] {
        self.probe_genes
            .get(&probe)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn resolve_link(&self, link: &Link) -> Vec<GenePairObservation> {
        resolve(
            link,
            self.genes_for(link.probe_a),
            self.genes_for(link.probe_b),
            &self.config,
        )
    }

    /// Expands every link of one experiment.
    pub fn resolve_links(&self, links: &[Link]) -> (Vec<GenePairObservation>, ResolutionStats) {
        let mut stats = ResolutionStats {
            links: links.len(),
            ..Default::default()
        };
        let mut out = Vec::with_capacity(links.len());
        for link in links {
            let genes_a = self.genes_for(link.probe_a);
            let genes_b = self.genes_for(link.probe_b);
            if genes_a.is_empty() || genes_b.is_empty() {
                stats.gaps += 1;
                continue;
            }
            out.extend(resolve(link, genes_a, genes_b, &self.config));
        }
        stats.observations = out.len();
        if stats.gaps > 0 {
            debug!("{} of {} links had probes with no genes", stats.gaps, stats.links);
        }
        (out, stats)
    }
}

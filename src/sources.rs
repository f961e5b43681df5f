//! Collaborator interfaces: where links, probe mappings and GO annotations
//! come from. The core only talks to these traits; the table-backed
//! implementations here are what the command-line tool feeds them with.

use std::collections::HashMap;

use crate::error::Result;
use crate::ontology::{GoAspect, GoTermSet, normalize_term_id};
use crate::types::{ExperimentLinks, GeneId, GeneRecord, ProbeId, Taxon};

pub trait LinkSource {
    /// Every experiment's links for `taxon`, indexed from zero.
    fn links_by_experiment(&self, taxon: &Taxon) -> Result<Vec<ExperimentLinks>>;
}

pub trait ProbeGeneLookup {
    /// Gene mappings for a batch of probes. Unmapped probes may be absent.
    fn genes_for_probes(&self, probes: &[ProbeId]) -> Result<HashMap<ProbeId, Vec<GeneRecord>>>;
}

pub trait GoAnnotationSource {
    /// Term sets per gene, already closed over ancestors.
    fn gene_terms(&self, taxon: &Taxon) -> Result<HashMap<GeneId, GoTermSet>>;

    /// The root aspect a term falls under, if the ontology knows it.
    fn term_aspect(&self, term: &str) -> Option<GoAspect>;
}

impl ProbeGeneLookup for HashMap<ProbeId, Vec<GeneRecord>> {
    fn genes_for_probes(&self, probes: &[ProbeId]) -> Result<HashMap<ProbeId, Vec<GeneRecord>>> {
        Ok(probes
            .iter()
            .filter_map(|p| self.get(p).map(|genes| (*p, genes.clone())))
            .collect())
    }
}

/// Links already held in memory, e.g. parsed from a table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLinks {
    pub experiments: Vec<ExperimentLinks>,
}

impl LinkSource for InMemoryLinks {
    fn links_by_experiment(&self, taxon: &Taxon) -> Result<Vec<ExperimentLinks>> {
        let mut out: Vec<ExperimentLinks> = self
            .experiments
            .iter()
            .filter(|e| &e.taxon == taxon)
            .cloned()
            .collect();
        for (index, exp) in out.iter_mut().enumerate() {
            exp.index = index;
            for link in &mut exp.links {
                link.experiment = index;
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GoAnnotationTable {
    pub gene_terms: HashMap<GeneId, GoTermSet>,
    pub aspects: HashMap<String, GoAspect>,
}

impl GoAnnotationSource for GoAnnotationTable {
    fn gene_terms(&self, _taxon: &Taxon) -> Result<HashMap<GeneId, GoTermSet>> {
        Ok(self.gene_terms.clone())
    }

    fn term_aspect(&self, term: &str) -> Option<GoAspect> {
        let id = normalize_term_id(term);
        GoAspect::from_root_term(&id).or_else(|| self.aspects.get(&id).copied())
    }
}

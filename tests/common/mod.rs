#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Write};

use coexstats::cache::GoCache;
use coexstats::ontology::{GoAspect, GoTermSet};
use coexstats::resolver::{GeneResolver, ResolverConfig};
use coexstats::types::{
    ExperimentLinks, ExperimentRef, GeneCategory, GeneId, GeneRecord, Link, ProbeId, Sign, Taxon,
};

pub fn mouse() -> Taxon {
    Taxon("mouse".to_string())
}

pub fn experiment(index: usize, links: &[(ProbeId, ProbeId, Sign)]) -> ExperimentLinks {
    ExperimentLinks {
        index,
        experiment: ExperimentRef {
            id: 1000 + index as u64,
            short_name: format!("GSE{index}"),
        },
        taxon: mouse(),
        links: links
            .iter()
            .map(|&(probe_a, probe_b, sign)| Link {
                experiment: index,
                probe_a,
                probe_b,
                sign,
            })
            .collect(),
    }
}

/// Probe `p` maps to every gene listed with it.
pub fn probe_map(entries: &[(ProbeId, &[GeneId])]) -> HashMap<ProbeId, Vec<GeneRecord>> {
    entries
        .iter()
        .map(|(probe, genes)| {
            let records = genes
                .iter()
                .map(|g| GeneRecord::known(*g, format!("G{g}")))
                .collect();
            (*probe, records)
        })
        .collect()
}

pub fn record(id: GeneId, symbol: &str, category: GeneCategory) -> GeneRecord {
    GeneRecord {
        id,
        symbol: symbol.to_string(),
        category,
    }
}

pub fn resolver(entries: &[(ProbeId, &[GeneId])]) -> GeneResolver {
    GeneResolver::new(probe_map(entries), ResolverConfig::default())
}

/// Term sets per gene, every term placed under biological process.
pub fn go_cache(entries: &[(GeneId, &[&str])]) -> GoCache {
    let gene_terms: HashMap<GeneId, GoTermSet> = entries
        .iter()
        .map(|(gene, terms)| (*gene, terms.iter().collect::<GoTermSet>()))
        .collect();
    GoCache::build(mouse(), gene_terms, |_| Some(GoAspect::BiologicalProcess))
}

/// Accepts every write but fails to flush, like a full disk under a buffer.
#[derive(Default)]
pub struct FlushFails {
    pub written: Vec<u8>,
}

impl Write for FlushFails {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::other("device full"))
    }
}

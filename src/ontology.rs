//! Gene Ontology term sets and the corpus-wide term statistics derived from them.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CoexError;
use crate::types::GeneId;

pub const BIOLOGICAL_PROCESS: &str = "GO:0008150";
pub const MOLECULAR_FUNCTION: &str = "GO:0003674";
pub const CELLULAR_COMPONENT: &str = "GO:0005575";

pub const ROOT_TERMS: [&str; 3] = [BIOLOGICAL_PROCESS, MOLECULAR_FUNCTION, CELLULAR_COMPONENT];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoAspect {
    BiologicalProcess,
    MolecularFunction,
    CellularComponent,
}

impl GoAspect {
    pub fn root_term(self) -> &'static str {
        match self {
            GoAspect::BiologicalProcess => BIOLOGICAL_PROCESS,
            GoAspect::MolecularFunction => MOLECULAR_FUNCTION,
            GoAspect::CellularComponent => CELLULAR_COMPONENT,
        }
    }

    pub fn from_root_term(term: &str) -> Option<Self> {
        match term {
            BIOLOGICAL_PROCESS => Some(GoAspect::BiologicalProcess),
            MOLECULAR_FUNCTION => Some(GoAspect::MolecularFunction),
            CELLULAR_COMPONENT => Some(GoAspect::CellularComponent),
            _ => None,
        }
    }
}

impl FromStr for GoAspect {
    type Err = CoexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match key.as_str() {
            "p" | "bp" | "process" | "biological_process" => Ok(GoAspect::BiologicalProcess),
            "f" | "mf" | "function" | "molecular_function" => Ok(GoAspect::MolecularFunction),
            "c" | "cc" | "component" | "cellular_component" => Ok(GoAspect::CellularComponent),
            _ => GoAspect::from_root_term(&normalize_term_id(s))
                .ok_or_else(|| CoexError::Parse(format!("unknown GO aspect '{s}'"))),
        }
    }
}

impl fmt::Display for GoAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoAspect::BiologicalProcess => write!(f, "biological_process"),
            GoAspect::MolecularFunction => write!(f, "molecular_function"),
            GoAspect::CellularComponent => write!(f, "cellular_component"),
        }
    }
}

/// Canonical `GO:NNNNNNN` form of a term id, URI or `GO_NNNNNNN` token.
pub fn normalize_term_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let tail = trimmed
        .rsplit(['#', '/'])
        .next()
        .unwrap_or(trimmed);
    let upper = tail.to_ascii_uppercase();
    match upper.strip_prefix("GO_") {
        Some(digits) => format!("GO:{digits}"),
        None => upper,
    }
}

pub fn is_root(term: &str) -> bool {
    ROOT_TERMS.contains(&term)
}

/// The GO terms annotated to one gene, including ancestors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoTermSet(BTreeSet<String>);

impl GoTermSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, term: &str) -> bool {
        self.0.insert(normalize_term_id(term))
    }

    pub fn contains(&self, term: &str) -> bool {
        self.0.contains(term)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Terms other than the three aspect roots.
    pub fn informative(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|t| !is_root(t))
    }

    pub fn informative_len(&self) -> usize {
        self.informative().count()
    }

    pub fn union_with(&mut self, other: &GoTermSet) {
        self.0.extend(other.0.iter().cloned());
    }
}

impl<S: AsRef<str>> FromIterator<S> for GoTermSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = GoTermSet::new();
        for term in iter {
            set.insert(term.as_ref());
        }
        set
    }
}

/// How many genes carry each informative term.
pub fn term_occurrence(gene_terms: &HashMap<GeneId, GoTermSet>) -> HashMap<String, u64> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for terms in gene_terms.values() {
        for term in terms.informative() {
            *counts.entry(term.to_string()).or_default() += 1;
        }
    }
    counts
}

/// Probability of each term within its aspect:
/// `occurrences(t) / sum of occurrences of all terms under the same root`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermProbabilities {
    probabilities: HashMap<String, f64>,
}

impl TermProbabilities {
    /// Terms whose aspect `aspect_of` cannot tell are dropped with a warning.
    pub fn compute<F>(gene_terms: &HashMap<GeneId, GoTermSet>, aspect_of: F) -> Self
    where
        F: Fn(&str) -> Option<GoAspect>,
    {
        let counts = term_occurrence(gene_terms);
        let mut aspect_totals: HashMap<GoAspect, u64> = HashMap::new();
        let mut located: Vec<(String, u64, GoAspect)> = Vec::with_capacity(counts.len());
        let mut dropped = 0usize;
        for (term, count) in counts {
            match aspect_of(&term) {
                Some(aspect) => {
                    *aspect_totals.entry(aspect).or_default() += count;
                    located.push((term, count, aspect));
                }
                None => {
                    warn!("Couldn't get root for term: {term}");
                    dropped += 1;
                }
            }
        }

        let probabilities = located
            .into_iter()
            .map(|(term, count, aspect)| {
                let total = aspect_totals[&aspect] as f64;
                (term, count as f64 / total)
            })
            .collect::<HashMap<_, _>>();
        debug!(
            "term probabilities for {} terms ({dropped} without a root)",
            probabilities.len()
        );
        Self { probabilities }
    }

    pub fn get(&self, term: &str) -> Option<f64> {
        self.probabilities.get(term).copied()
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }
}

/// Inverse-frequency weights `log10(N / freq)` over the annotated genes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermWeights {
    weights: HashMap<String, f64>,
}

impl TermWeights {
    pub fn compute(gene_terms: &HashMap<GeneId, GoTermSet>) -> Self {
        let n = gene_terms.len() as f64;
        let weights = term_occurrence(gene_terms)
            .into_iter()
            .map(|(term, freq)| (term, (n / freq as f64).log10()))
            .collect();
        Self { weights }
    }

    /// Weight of `term`; terms never seen in the corpus weigh nothing.
    pub fn get(&self, term: &str) -> f64 {
        self.weights.get(term).copied().unwrap_or(0.0)
    }

    /// Number of informative terms in the corpus; the vector-space dimension.
    pub fn universe_size(&self) -> usize {
        self.weights.len()
    }
}

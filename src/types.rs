use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoexError;

pub type GeneId = u64;
pub type ProbeId = u64;
/// Position of an experiment in the analysed set; doubles as its bit index.
pub type ExperimentIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    /// Direction of a correlation score; zero counts as positive.
    pub fn from_score(score: f64) -> Self {
        if score < 0.0 {
            Sign::Negative
        } else {
            Sign::Positive
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sign::Positive => write!(f, "positive"),
            Sign::Negative => write!(f, "negative"),
        }
    }
}

impl FromStr for Sign {
    type Err = CoexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" | "+" => Ok(Sign::Positive),
            "negative" | "neg" | "-" => Ok(Sign::Negative),
            other => Err(CoexError::Configuration(format!(
                "unknown sign '{other}' (expected positive or negative)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignFilter {
    Positive,
    Negative,
    #[default]
    Both,
}

impl SignFilter {
    pub fn accepts(self, sign: Sign) -> bool {
        match self {
            SignFilter::Both => true,
            SignFilter::Positive => sign == Sign::Positive,
            SignFilter::Negative => sign == Sign::Negative,
        }
    }
}

impl From<Sign> for SignFilter {
    fn from(sign: Sign) -> Self {
        match sign {
            Sign::Positive => SignFilter::Positive,
            Sign::Negative => SignFilter::Negative,
        }
    }
}

impl FromStr for SignFilter {
    type Err = CoexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" | "+" => Ok(SignFilter::Positive),
            "negative" | "neg" | "-" => Ok(SignFilter::Negative),
            "both" | "all" => Ok(SignFilter::Both),
            other => Err(CoexError::Configuration(format!(
                "unknown sign filter '{other}' (expected positive, negative or both)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Taxon(pub String);

impl fmt::Display for Taxon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GeneCategory {
    #[default]
    Known,
    Predicted,
    ProbeAlignedRegion,
}

impl GeneCategory {
    pub fn is_primary(self) -> bool {
        self == GeneCategory::Known
    }
}

impl FromStr for GeneCategory {
    type Err = CoexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "known" | "gene" => Ok(GeneCategory::Known),
            "predicted" | "predicted_gene" => Ok(GeneCategory::Predicted),
            "par" | "probe_aligned_region" | "probealignedregion" => {
                Ok(GeneCategory::ProbeAlignedRegion)
            }
            other => Err(CoexError::Parse(format!("unknown gene category '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeneRecord {
    pub id: GeneId,
    pub symbol: String,
    pub category: GeneCategory,
}

impl GeneRecord {
    pub fn known(id: GeneId, symbol: impl Into<String>) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            category: GeneCategory::Known,
        }
    }
}

/// One significant probe-pair correlation reported by one experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub experiment: ExperimentIndex,
    pub probe_a: ProbeId,
    pub probe_b: ProbeId,
    pub sign: Sign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenePairObservation {
    pub gene_a: GeneId,
    pub gene_b: GeneId,
    pub experiment: ExperimentIndex,
    pub sign: Sign,
}

/// Unordered gene pair; `first <= second` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenePair {
    pub first: GeneId,
    pub second: GeneId,
}

impl GenePair {
    pub fn new(a: GeneId, b: GeneId) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExperimentRef {
    pub id: u64,
    pub short_name: String,
}

/// All links of one experiment, tagged with the taxon they were measured in.
#[derive(Debug, Clone)]
pub struct ExperimentLinks {
    pub index: ExperimentIndex,
    pub experiment: ExperimentRef,
    pub taxon: Taxon,
    pub links: Vec<Link>,
}

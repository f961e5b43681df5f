//! Real confirmation counts against the shuffled null.

use std::io::Write;

use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;

use crate::histogram::ConfirmationHistogram;

/// One stringency level of a [`ConfirmationComparison`].
#[derive(Debug, Clone, PartialEq)]
pub struct StringencyRow {
    pub support: usize,
    pub real: u64,
    pub null_mean: f64,
    pub null_sd: f64,
    /// Mean over trials of `null_k / real_k`; `None` when `real_k` is zero.
    pub fdr: Option<f64>,
    /// Upper-tail probability of `real` under a normal fit to the null counts.
    pub p_value: Option<f64>,
    pub real_cumulative: u64,
    pub null_mean_cumulative: f64,
    pub fdr_cumulative: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ConfirmationComparison {
    real: ConfirmationHistogram,
    null: Vec<ConfirmationHistogram>,
}

impl ConfirmationComparison {
    pub fn new(real: ConfirmationHistogram, null: Vec<ConfirmationHistogram>) -> Self {
        Self { real, null }
    }

    pub fn real(&self) -> &ConfirmationHistogram {
        &self.real
    }

    pub fn null(&self) -> &[ConfirmationHistogram] {
        &self.null
    }

    /// Largest stringency any real pair reached, or the null's when the real
    /// histogram is empty.
    pub fn max_support(&self) -> usize {
        let real = self.real.max_support();
        if real > 0 {
            return real;
        }
        self.null.iter().map(|h| h.max_support()).max().unwrap_or(0)
    }

    /// Rows for `k = 1..=max_support()`.
    pub fn rows(&self) -> Vec<StringencyRow> {
        (1..=self.max_support()).map(|k| self.row(k)).collect()
    }

    pub fn row(&self, k: usize) -> StringencyRow {
        let real = self.real.count(k);
        let real_cumulative = self.real.cumulative(k);
        let null: Vec<f64> = self.null.iter().map(|h| h.count(k) as f64).collect();
        let null_cumulative: Vec<f64> = self.null.iter().map(|h| h.cumulative(k) as f64).collect();
        let (null_mean, null_sd) = mean_sd(&null);
        StringencyRow {
            support: k,
            real,
            null_mean,
            null_sd,
            fdr: average_ratio(&null, real),
            p_value: upper_tail(real as f64, null_mean, null_sd),
            real_cumulative,
            null_mean_cumulative: mean_sd(&null_cumulative).0,
            fdr_cumulative: average_ratio(&null_cumulative, real_cumulative),
        }
    }

    /// Tab-delimited table with a `Support` header, then `RealLinks`,
    /// `ShuffleMean` (the average null/real ratio) and one `ShuffleRun_i`
    /// row per trial.
    pub fn write_stats<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        let max = self.max_support();
        write!(out, "Support")?;
        for k in 1..=max {
            write!(out, "\t{k}")?;
        }
        writeln!(out)?;

        write!(out, "RealLinks")?;
        for k in 1..=max {
            write!(out, "\t{}", self.real.count(k))?;
        }
        writeln!(out)?;

        if !self.null.is_empty() {
            write!(out, "ShuffleMean")?;
            for row in self.rows() {
                // zero-count buckets contribute nothing to the average
                write!(out, "\t{:.3}", row.fdr.unwrap_or(0.0))?;
            }
            writeln!(out)?;
            for (i, run) in self.null.iter().enumerate() {
                write!(out, "ShuffleRun_{}", i + 1)?;
                for k in 1..=max {
                    write!(out, "\t{}", run.count(k))?;
                }
                writeln!(out)?;
            }
        }
        out.flush()
    }

    /// Per-stringency summary with the null mean, spread and cumulative FDR.
    pub fn write_summary<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        writeln!(
            out,
            "support\treal\tnull_mean\tnull_sd\tfdr\tp_value\treal_cumulative\tnull_mean_cumulative\tfdr_cumulative"
        )?;
        let fmt = |v: Option<f64>| v.map_or_else(|| "NA".to_string(), |x| format!("{x:.4}"));
        for row in self.rows() {
            writeln!(
                out,
                "{}\t{}\t{:.3}\t{:.3}\t{}\t{}\t{}\t{:.3}\t{}",
                row.support,
                row.real,
                row.null_mean,
                row.null_sd,
                fmt(row.fdr),
                fmt(row.p_value),
                row.real_cumulative,
                row.null_mean_cumulative,
                fmt(row.fdr_cumulative)
            )?;
        }
        out.flush()
    }
}

fn mean_sd(values: &[f64]) -> (f64, f64) {
    match values.len() {
        0 => (0.0, 0.0),
        1 => (values[0], 0.0),
        _ => (values.mean(), values.std_dev()),
    }
}

fn average_ratio(null: &[f64], real: u64) -> Option<f64> {
    if real == 0 || null.is_empty() {
        return None;
    }
    Some(null.iter().map(|n| n / real as f64).sum::<f64>() / null.len() as f64)
}

fn upper_tail(x: f64, mean: f64, sd: f64) -> Option<f64> {
    if sd <= 0.0 || !sd.is_finite() {
        return None;
    }
    let normal = Normal::new(mean, sd).ok()?;
    Some(1.0 - normal.cdf(x))
}

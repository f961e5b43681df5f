use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use bzip2::read::BzDecoder;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use polars::prelude::*;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::ontology::{GoAspect, GoTermSet};
use crate::overlap::OverlapScore;
use crate::types::{
    ExperimentLinks, ExperimentRef, GeneCategory, GeneId, GenePair, GeneRecord, Link, ProbeId,
    Sign, Taxon,
};

pub fn read_table(path: &Path) -> Result<DataFrame> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    if ext == "gz" || ext == "bz2" {
        let tmp = decompress_to_temp(path, &ext)?;
        return read_table_plain(tmp.path());
    }

    read_table_plain(path)
}

fn read_table_plain(path: &Path) -> Result<DataFrame> {
    let delimiter = detect_delimiter(path)?;
    if delimiter == b' ' {
        let tmp = whitespace_to_tabs(path)?;
        return read_delimited(tmp.path(), b'\t');
    }
    read_delimited(path, delimiter)
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(delimiter)
                .with_null_values(Some(NullValues::AllColumns(vec![
                    "".into(),
                    "NA".into(),
                    "NaN".into(),
                    ".".into(),
                ])))
                .with_missing_is_null(true),
        )
        .with_ignore_errors(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("read {}", path.display()))
}

/// Rewrites a whitespace-separated file as tab-separated, so one CSV path
/// handles every input.
fn whitespace_to_tabs(path: &Path) -> Result<NamedTempFile> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut tmp = NamedTempFile::new()?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        writeln!(tmp, "{}", fields.join("\t"))?;
    }
    tmp.flush()?;
    Ok(tmp)
}

fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut first = String::new();
    reader.read_line(&mut first)?;
    if first.contains('\t') {
        return Ok(b'\t');
    }
    if first.contains(',') {
        return Ok(b',');
    }
    Ok(b' ')
}

fn decompress_to_temp(path: &Path, ext: &str) -> Result<NamedTempFile> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut decoder: Box<dyn Read> = match ext {
        "gz" => Box::new(GzDecoder::new(file)),
        "bz2" => Box::new(BzDecoder::new(file)),
        _ => Box::new(file),
    };
    let mut tmp = NamedTempFile::new()?;
    std::io::copy(&mut decoder, &mut tmp)?;
    Ok(tmp)
}

/// Name of the first column matching one of `aliases`, ignoring case.
fn find_column(df: &DataFrame, aliases: &[&str]) -> Option<String> {
    df.get_column_names()
        .iter()
        .find(|name| aliases.iter().any(|a| name.eq_ignore_ascii_case(a)))
        .map(|name| name.to_string())
}

fn require_column(df: &DataFrame, aliases: &[&str], path: &Path) -> Result<String> {
    find_column(df, aliases).ok_or_else(|| {
        anyhow!(
            "{} has no {} column (found: {:?})",
            path.display(),
            aliases[0],
            df.get_column_names()
        )
    })
}

fn u64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<u64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::UInt64)
        .with_context(|| format!("{name} as integer"))?;
    Ok(series.u64()?.into_iter().collect())
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)
        .with_context(|| format!("{name} as float"))?;
    Ok(series.f64()?.into_iter().collect())
}

fn str_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)
        .with_context(|| format!("{name} as text"))?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect())
}

fn optional_str_column(df: &DataFrame, aliases: &[&str]) -> Result<Option<Vec<Option<String>>>> {
    match find_column(df, aliases) {
        Some(name) => Ok(Some(str_column(df, &name)?)),
        None => Ok(None),
    }
}

/// Reads a link table: `experiment`, `probe_a`, `probe_b`, and either a
/// `score` (its sign gives the link's direction) or a `sign` column.
/// Optional `short_name` and `taxon` columns; rows for other taxa are
/// skipped when a taxon column is present.
///
/// Experiments are indexed in ascending id order.
pub fn read_links(path: &Path, taxon: &Taxon) -> Result<Vec<ExperimentLinks>> {
    let df = read_table(path)?;
    let exp_col = require_column(&df, &["experiment", "ee", "ee_id", "dataset"], path)?;
    let a_col = require_column(&df, &["probe_a", "first_probe", "probe1"], path)?;
    let b_col = require_column(&df, &["probe_b", "second_probe", "probe2"], path)?;

    let experiments = u64_column(&df, &exp_col)?;
    let probes_a = u64_column(&df, &a_col)?;
    let probes_b = u64_column(&df, &b_col)?;
    let signs: Vec<Option<Sign>> = if let Some(score_col) = find_column(&df, &["score", "correlation", "r"]) {
        f64_column(&df, &score_col)?
            .into_iter()
            .map(|s| s.filter(|v| v.is_finite()).map(Sign::from_score))
            .collect()
    } else {
        let sign_col = require_column(&df, &["sign", "direction"], path)?;
        str_column(&df, &sign_col)?
            .into_iter()
            .map(|s| s.and_then(|v| v.parse::<Sign>().ok()))
            .collect()
    };
    let short_names = optional_str_column(&df, &["short_name", "ee_name", "name"])?;
    let taxa = optional_str_column(&df, &["taxon", "species"])?;

    let mut grouped: BTreeMap<u64, (String, Vec<(ProbeId, ProbeId, Sign)>)> = BTreeMap::new();
    let mut skipped = 0usize;
    for row in 0..df.height() {
        if let Some(taxa) = &taxa
            && taxa[row].as_deref() != Some(taxon.0.as_str())
        {
            continue;
        }
        let (Some(exp), Some(a), Some(b), Some(sign)) =
            (experiments[row], probes_a[row], probes_b[row], signs[row])
        else {
            skipped += 1;
            continue;
        };
        let entry = grouped.entry(exp).or_insert_with(|| {
            let name = short_names
                .as_ref()
                .and_then(|names| names[row].clone())
                .unwrap_or_else(|| format!("EE{exp}"));
            (name, Vec::new())
        });
        entry.1.push((a, b, sign));
    }
    if skipped > 0 {
        warn!("Skipped {skipped} incomplete link rows in {}", path.display());
    }

    let out: Vec<ExperimentLinks> = grouped
        .into_iter()
        .enumerate()
        .map(|(index, (id, (short_name, links)))| ExperimentLinks {
            index,
            experiment: ExperimentRef { id, short_name },
            taxon: taxon.clone(),
            links: links
                .into_iter()
                .map(|(probe_a, probe_b, sign)| Link {
                    experiment: index,
                    probe_a,
                    probe_b,
                    sign,
                })
                .collect(),
        })
        .collect();
    info!(
        "Read {} links from {} experiments in {}",
        out.iter().map(|e| e.links.len()).sum::<usize>(),
        out.len(),
        path.display()
    );
    Ok(out)
}

/// Reads `probe`, `gene` and optional `symbol` and `category` columns.
pub fn read_probe_genes(path: &Path) -> Result<HashMap<ProbeId, Vec<GeneRecord>>> {
    let df = read_table(path)?;
    let probe_col = require_column(&df, &["probe", "probe_id", "design_element"], path)?;
    let gene_col = require_column(&df, &["gene", "gene_id"], path)?;
    let probes = u64_column(&df, &probe_col)?;
    let genes = u64_column(&df, &gene_col)?;
    let symbols = optional_str_column(&df, &["symbol", "gene_symbol"])?;
    let categories = optional_str_column(&df, &["category", "gene_type", "type"])?;

    let mut out: HashMap<ProbeId, Vec<GeneRecord>> = HashMap::new();
    for row in 0..df.height() {
        let (Some(probe), Some(gene)) = (probes[row], genes[row]) else {
            continue;
        };
        let symbol = symbols
            .as_ref()
            .and_then(|s| s[row].clone())
            .unwrap_or_else(|| gene.to_string());
        let category = match categories.as_ref().and_then(|c| c[row].as_deref()) {
            Some(raw) => raw.parse::<GeneCategory>()?,
            None => GeneCategory::Known,
        };
        let records = out.entry(probe).or_default();
        if !records.iter().any(|r| r.id == gene) {
            records.push(GeneRecord {
                id: gene,
                symbol,
                category,
            });
        }
    }
    Ok(out)
}

/// Every gene mentioned by a probe mapping, once.
pub fn genes_of(probe_genes: &HashMap<ProbeId, Vec<GeneRecord>>) -> Vec<GeneRecord> {
    let mut by_id: BTreeMap<GeneId, GeneRecord> = BTreeMap::new();
    for record in probe_genes.values().flatten() {
        by_id.entry(record.id).or_insert_with(|| record.clone());
    }
    by_id.into_values().collect()
}

/// Reads `gene` and `term` columns, one annotation per row.
pub fn read_gene_terms(path: &Path) -> Result<HashMap<GeneId, GoTermSet>> {
    let df = read_table(path)?;
    let gene_col = require_column(&df, &["gene", "gene_id"], path)?;
    let term_col = require_column(&df, &["term", "go_id", "go"], path)?;
    let genes = u64_column(&df, &gene_col)?;
    let terms = str_column(&df, &term_col)?;

    let mut out: HashMap<GeneId, GoTermSet> = HashMap::new();
    for (gene, term) in genes.into_iter().zip(terms) {
        if let (Some(gene), Some(term)) = (gene, term) {
            out.entry(gene).or_default().insert(&term);
        }
    }
    Ok(out)
}

/// Reads `term` and `aspect` columns.
pub fn read_term_aspects(path: &Path) -> Result<HashMap<String, GoAspect>> {
    let df = read_table(path)?;
    let term_col = require_column(&df, &["term", "go_id", "go"], path)?;
    let aspect_col = require_column(&df, &["aspect", "namespace", "root"], path)?;
    let terms = str_column(&df, &term_col)?;
    let aspects = str_column(&df, &aspect_col)?;

    let mut out = HashMap::new();
    for (term, aspect) in terms.into_iter().zip(aspects) {
        let (Some(term), Some(aspect)) = (term, aspect) else {
            continue;
        };
        out.insert(crate::ontology::normalize_term_id(&term), aspect.parse()?);
    }
    Ok(out)
}

/// Reads gene pairs from `gene_a` and `gene_b` columns, with the link's
/// support from an optional `support` column.
pub fn read_gene_pairs(path: &Path) -> Result<Vec<(GenePair, Option<u32>)>> {
    let df = read_table(path)?;
    let a_col = require_column(&df, &["gene_a", "first_gene", "gene1"], path)?;
    let b_col = require_column(&df, &["gene_b", "second_gene", "gene2"], path)?;
    let genes_a = u64_column(&df, &a_col)?;
    let genes_b = u64_column(&df, &b_col)?;
    let support = match find_column(&df, &["support", "stringency", "score"]) {
        Some(name) => u64_column(&df, &name)?,
        None => vec![None; df.height()],
    };

    Ok(genes_a
        .into_iter()
        .zip(genes_b)
        .zip(support)
        .filter_map(|((a, b), s)| {
            let pair = GenePair::new(a?, b?);
            Some((pair, s.and_then(|v| u32::try_from(v).ok())))
        })
        .collect())
}

/// A buffered writer, gzip-compressed when `path` ends in `.gz`.
pub fn create_output(path: &Path) -> Result<Box<dyn Write>> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let gz = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"));
    if gz {
        Ok(Box::new(BufWriter::new(GzEncoder::new(
            file,
            Compression::default(),
        ))))
    } else {
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// One line per pair: both genes, the score (`NA` when unscored) and the
/// shared terms.
pub fn write_scores<W: Write>(
    mut out: W,
    rows: &[(GenePair, OverlapScore, Vec<String>)],
) -> Result<()> {
    writeln!(out, "gene_a\tgene_b\tscore\tshared_terms")?;
    for (pair, score, terms) in rows {
        writeln!(
            out,
            "{}\t{}\t{score}\t{}",
            pair.first,
            pair.second,
            terms.join("|")
        )?;
    }
    out.flush()?;
    Ok(())
}

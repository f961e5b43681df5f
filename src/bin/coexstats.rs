use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;

use coexstats::cache::{CacheStore, DiskCacheStore, GoCache};
use coexstats::comparison::ConfirmationComparison;
use coexstats::histogram::{ConfirmationHistogram, known_gene_filter};
use coexstats::io::{
    create_output, genes_of, read_gene_pairs, read_gene_terms, read_links, read_probe_genes,
    read_term_aspects, write_scores,
};
use coexstats::logging::{RunLog, init_tracing};
use coexstats::ontology::GoAspect;
use coexstats::overlap::{
    OverlapMetric, OverlapScore, ScoringConfig, overlapping_terms, score_expanded,
    score_gene_pairs,
};
use coexstats::qc::{check_bucket_ceiling, check_file_exists, check_iterations};
use coexstats::resolver::{GeneResolver, ResolverConfig};
use coexstats::shuffle::{ShuffleMethod, ShuffleTrialConfig, run_shuffle_trials};
use coexstats::sources::GoAnnotationTable;
use coexstats::stratify::{
    GoOverlapBySupport, GoStatsConfig, random_pair_baseline, term_count_distribution,
    write_cumulative,
};
use coexstats::support::{SupportConfig, SupportMatrix, compute_support_matrix};
use coexstats::types::{GenePair, Sign, SignFilter, Taxon};

#[derive(Parser)]
#[command(name = "coexstats")]
#[command(about = "Coexpression link confirmation and GO overlap statistics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Count link confirmation across experiments and compare with shuffled links.
    Confirm {
        #[arg(long, required = true)]
        links: PathBuf,
        #[arg(long, required = true)]
        probe_genes: PathBuf,
        #[arg(long, required = true)]
        taxon: String,
        #[arg(long, default_value = "positive")]
        sign: String,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        iterations: i64,
        #[arg(long, default_value_t = coexstats::histogram::DEFAULT_MAX_BUCKET)]
        max_bucket: usize,
        #[arg(long, default_value = "probe")]
        shuffle_method: String,
        #[arg(long)]
        seed: Option<u64>,
        /// Only count pairs between known genes.
        #[arg(long)]
        known_only: bool,
        #[arg(long)]
        exclude_non_primary: bool,
        #[arg(long)]
        filter_non_specific: bool,
        #[arg(long)]
        parallel: bool,
        #[arg(long)]
        cores: Option<usize>,
        /// Also write the real support matrix under this prefix.
        #[arg(long)]
        save_matrix: Option<PathBuf>,
        #[arg(long, default_value = "confirmation")]
        out: String,
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Score gene pairs by shared GO annotation.
    GoOverlap {
        #[arg(long, required = true)]
        pairs: PathBuf,
        #[command(flatten)]
        go: GoArgs,
        #[arg(long, default_value = "simple")]
        metric: String,
        #[arg(long)]
        weighted: bool,
        #[arg(long, default_value = "go_overlap.tsv")]
        out: PathBuf,
    },
    /// Score probe pairs, reducing ambiguous probe-to-gene mappings to one score.
    ProbeOverlap {
        #[arg(long, required = true)]
        links: PathBuf,
        #[arg(long, required = true)]
        probe_genes: PathBuf,
        #[command(flatten)]
        go: GoArgs,
        #[arg(long, default_value = "simple")]
        metric: String,
        #[arg(long)]
        weighted: bool,
        #[arg(long, default_value = "probe_overlap.tsv")]
        out: PathBuf,
    },
    /// GO overlap of linked pairs broken down by link support.
    GoStats {
        /// Prefix of a saved support matrix.
        #[arg(long, conflicts_with = "pairs")]
        matrix: Option<PathBuf>,
        /// Gene pairs with a support column.
        #[arg(long)]
        pairs: Option<PathBuf>,
        #[command(flatten)]
        go: GoArgs,
        #[arg(long, default_value = "positive")]
        sign: String,
        #[arg(long, default_value_t = coexstats::stratify::DEFAULT_SUPPORT_BUCKETS)]
        support_buckets: usize,
        #[arg(long, default_value_t = coexstats::stratify::DEFAULT_OVERLAP_BUCKETS)]
        overlap_buckets: usize,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "go_stats")]
        out: String,
    },
}

#[derive(clap::Args)]
struct GoArgs {
    #[arg(long, required = true)]
    gene_terms: PathBuf,
    #[arg(long)]
    term_aspects: Option<PathBuf>,
    #[arg(long, required = true)]
    taxon: String,
    /// Directory for cached GO artifacts, reused across runs.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Confirm {
            links,
            probe_genes,
            taxon,
            sign,
            iterations,
            max_bucket,
            shuffle_method,
            seed,
            known_only,
            exclude_non_primary,
            filter_non_specific,
            parallel,
            cores,
            save_matrix,
            out,
            log,
        } => {
            let iterations = check_iterations(iterations, "iterations")?;
            check_bucket_ceiling(max_bucket, "max_bucket")?;
            let sign: Sign = sign.parse()?;
            let method: ShuffleMethod = shuffle_method.parse()?;
            check_file_exists(&links, "links")?;
            check_file_exists(&probe_genes, "probe_genes")?;
            let mut run_log = RunLog::open(log.as_deref())?;

            let taxon = Taxon(taxon);
            let experiments = read_links(&links, &taxon)?;
            let probe_map = read_probe_genes(&probe_genes)?;
            let gene_filter = known_only.then(|| known_gene_filter(&genes_of(&probe_map)));
            let resolver_config = ResolverConfig {
                exclude_non_primary,
                filter_non_specific,
            };
            let resolver = GeneResolver::from_lookup(&probe_map, &experiments, resolver_config)?;

            let support_config = SupportConfig {
                sign_filter: SignFilter::from(sign),
                universe: None,
                parallel,
            };
            let (matrix, summary) =
                compute_support_matrix(&taxon, &experiments, &resolver, &support_config)?;
            run_log.line(&format!(
                "{} experiments, {} links, {} without gene mapping, {} genes",
                experiments.len(),
                summary.resolution.links,
                summary.resolution.gaps,
                matrix.gene_count()
            ))?;
            if matrix.gene_count() == 0 {
                run_log.warn("No link resolved to a gene pair; every histogram will be empty")?;
            }
            if let Some(prefix) = &save_matrix {
                matrix.save(prefix)?;
            }

            let real = ConfirmationHistogram::build(&matrix, sign, gene_filter.as_ref(), max_bucket)?;
            run_log.line(&format!(
                "{} {sign} pairs with support, max support {}",
                real.total(),
                real.max_support()
            ))?;

            let trial_config = ShuffleTrialConfig {
                iterations,
                max_bucket,
                seed,
                method,
                sign,
                gene_filter,
                universe: Some(matrix.genes().to_vec()),
                parallel,
                cores,
            };
            let null = run_shuffle_trials(&taxon, &experiments, &resolver, &trial_config)?;
            let comparison = ConfirmationComparison::new(real, null);

            let stats_path = format!("{out}.stats.txt");
            comparison
                .write_stats(create_output(Path::new(&stats_path))?)
                .with_context(|| format!("write {stats_path}"))?;
            let summary_path = format!("{out}.summary.tsv");
            comparison
                .write_summary(create_output(Path::new(&summary_path))?)
                .with_context(|| format!("write {summary_path}"))?;
            run_log.line(&format!("Wrote {stats_path} and {summary_path}"))?;
        }
        Command::GoOverlap {
            pairs,
            go,
            metric,
            weighted,
            out,
        } => {
            let metric: OverlapMetric = metric.parse()?;
            let cache = load_go_cache(&go, metric)?;
            let pairs: Vec<GenePair> = read_gene_pairs(&pairs)?
                .into_iter()
                .map(|(pair, _)| pair)
                .filter(|pair| pair.first != pair.second)
                .collect();
            let config = ScoringConfig { metric, weighted };
            let scores = score_gene_pairs(&pairs, &cache, &config);

            let mut rows: Vec<(GenePair, OverlapScore, Vec<String>)> = scores
                .into_iter()
                .map(|(pair, score)| {
                    let terms = overlapping_terms(pair.first, pair.second, &cache);
                    (pair, score, terms)
                })
                .collect();
            rows.sort_by_key(|(pair, _, _)| *pair);
            report_scores(&rows.iter().map(|(_, s, _)| *s).collect::<Vec<_>>(), metric);
            write_scores(create_output(&out)?, &rows)?;
        }
        Command::ProbeOverlap {
            links,
            probe_genes,
            go,
            metric,
            weighted,
            out,
        } => {
            let metric: OverlapMetric = metric.parse()?;
            let cache = load_go_cache(&go, metric)?;
            let taxon = Taxon(go.taxon.clone());
            let experiments = read_links(&links, &taxon)?;
            let probe_map = read_probe_genes(&probe_genes)?;
            let config = ScoringConfig { metric, weighted };

            let mut probe_pairs: BTreeMap<(u64, u64), OverlapScore> = BTreeMap::new();
            for link in experiments.iter().flat_map(|e| e.links.iter()) {
                let key = if link.probe_a <= link.probe_b {
                    (link.probe_a, link.probe_b)
                } else {
                    (link.probe_b, link.probe_a)
                };
                if probe_pairs.contains_key(&key) {
                    continue;
                }
                let genes_a = probe_map.get(&key.0).map(Vec::as_slice).unwrap_or(&[]);
                let genes_b = probe_map.get(&key.1).map(Vec::as_slice).unwrap_or(&[]);
                probe_pairs.insert(key, score_expanded(genes_a, genes_b, &cache, &config));
            }
            report_scores(&probe_pairs.values().copied().collect::<Vec<_>>(), metric);

            let mut w = create_output(&out)?;
            writeln!(w, "probe_a\tprobe_b\tscore")?;
            for ((a, b), score) in &probe_pairs {
                writeln!(w, "{a}\t{b}\t{score}")?;
            }
            w.flush()?;
        }
        Command::GoStats {
            matrix,
            pairs,
            go,
            sign,
            support_buckets,
            overlap_buckets,
            seed,
            out,
        } => {
            let sign: Sign = sign.parse()?;
            let cache = load_go_cache(&go, OverlapMetric::Simple)?;
            let config = GoStatsConfig {
                support_buckets,
                overlap_buckets,
                sign,
                gene_filter: None,
            };
            let stats = match (matrix, pairs) {
                (Some(prefix), _) => {
                    let matrix = SupportMatrix::load(&prefix)?;
                    GoOverlapBySupport::from_matrix(&matrix, &cache, &config)?
                }
                (None, Some(path)) => {
                    let links: Vec<(GenePair, u32)> = read_gene_pairs(&path)?
                        .into_iter()
                        .filter_map(|(pair, support)| Some((pair, support?)))
                        .collect();
                    if links.is_empty() {
                        bail!("{} has no pairs with a support value", path.display());
                    }
                    GoOverlapBySupport::from_links(&links, &cache, &config)?
                }
                (None, None) => bail!("either --matrix or --pairs is required"),
            };

            let table_path = format!("{out}.table.txt");
            stats.write_table(create_output(Path::new(&table_path))?)?;
            let means_path = format!("{out}.means.tsv");
            stats.write_means(create_output(Path::new(&means_path))?)?;

            let genes: Vec<_> = stats.covered_genes().iter().copied().collect();
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let baseline = random_pair_baseline(&genes, &cache, overlap_buckets, &mut rng)?;
            let term_counts = term_count_distribution(&genes, &cache, overlap_buckets)?;
            let dist_path = format!("{out}.distributions.txt");
            let mut w = create_output(Path::new(&dist_path))?;
            write_cumulative(&mut w, "RandomPairs", &baseline)?;
            write_cumulative(&mut w, &format!("TermCounts_{}_genes", genes.len()), &term_counts)?;
            w.flush()?;
            tracing::info!("Wrote {table_path}, {means_path} and {dist_path}");
        }
    }

    Ok(())
}

fn load_go_cache(args: &GoArgs, metric: OverlapMetric) -> anyhow::Result<GoCache> {
    check_file_exists(&args.gene_terms, "gene_terms")?;
    let aspects: HashMap<String, GoAspect> = match &args.term_aspects {
        Some(path) => read_term_aspects(path)?,
        None => {
            if metric == OverlapMetric::MaxProbability {
                tracing::warn!("No --term-aspects given; only root terms have a known aspect");
            }
            HashMap::new()
        }
    };
    let source = GoAnnotationTable {
        gene_terms: read_gene_terms(&args.gene_terms)?,
        aspects,
    };
    let store = args
        .cache_dir
        .as_ref()
        .map(|dir| DiskCacheStore::new(dir.clone()))
        .transpose()?;
    let taxon = Taxon(args.taxon.clone());
    let cache = GoCache::load(
        &taxon,
        &source,
        store.as_ref().map(|s| s as &dyn CacheStore),
    )?;
    Ok(cache)
}

fn report_scores(scores: &[OverlapScore], metric: OverlapMetric) {
    let values: Vec<f64> = scores.iter().filter_map(|s| s.value()).collect();
    let unscored = scores.len() - values.len();
    if values.is_empty() {
        tracing::info!("No pairs could be scored with {metric} ({unscored} unscored)");
        return;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    tracing::info!(
        "{} pairs scored with {metric}, mean {mean:.4}, {unscored} unscored",
        values.len()
    );
}

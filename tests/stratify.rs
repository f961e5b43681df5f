mod common;

use rand::SeedableRng;
use rand::rngs::StdRng;

use coexstats::SupportMatrix;
use coexstats::ontology::BIOLOGICAL_PROCESS;
use coexstats::stratify::{
    GoOverlapBySupport, GoStatsConfig, random_pair_baseline, term_count_distribution,
    write_cumulative,
};
use coexstats::types::{ExperimentRef, GenePair, Sign};

use common::{FlushFails, go_cache, mouse};

const T1: &str = "GO:0000001";
const T2: &str = "GO:0000002";
const T3: &str = "GO:0000003";

fn small_config() -> GoStatsConfig {
    GoStatsConfig {
        support_buckets: 4,
        overlap_buckets: 3,
        ..Default::default()
    }
}

#[test]
fn support_and_overlap_are_clamped_into_the_last_bucket() {
    let mut stats = GoOverlapBySupport::new(4, 3).expect("table");
    stats.record(9, 7);
    stats.record(2, 1);
    assert_eq!(stats.count(3, 2), 1);
    assert_eq!(stats.count(2, 1), 1);
    assert_eq!(stats.pairs_at(3), 1);
    assert_eq!(stats.overlap_totals(), vec![0, 1, 1]);
}

#[test]
fn zero_sized_tables_are_rejected() {
    assert!(GoOverlapBySupport::new(0, 3).is_err());
    assert!(GoOverlapBySupport::new(3, 0).is_err());
}

#[test]
fn links_are_binned_by_support_and_simple_overlap() {
    let cache = go_cache(&[
        (1, &[T1, T2]),
        (2, &[T1, T2, T3]),
        (3, &[T3]),
        (4, &[BIOLOGICAL_PROCESS]),
    ]);
    let links = vec![
        (GenePair::new(1, 2), 2),
        (GenePair::new(2, 3), 2),
        (GenePair::new(1, 3), 1),
        (GenePair::new(1, 4), 3),
        (GenePair::new(2, 2), 3),
    ];
    let stats = GoOverlapBySupport::from_links(&links, &cache, &small_config()).expect("stats");

    assert_eq!(stats.count(2, 2), 1);
    assert_eq!(stats.count(2, 1), 1);
    assert_eq!(stats.count(1, 0), 1);
    assert_eq!(stats.unscored(), 1);
    assert_eq!(stats.pairs_at(3), 0);
    assert_eq!(stats.mean_overlap(2), Some(1.5));
    assert_eq!(stats.mean_overlap(3), None);
    assert_eq!(
        stats.covered_genes().iter().copied().collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn matrix_pairs_use_their_stringency_as_support() {
    let experiments = (0..3)
        .map(|i| ExperimentRef {
            id: i,
            short_name: format!("EE{i}"),
        })
        .collect();
    let mut matrix = SupportMatrix::new(mouse(), [1, 2, 3], experiments).expect("matrix");
    for e in 0..3 {
        matrix.add_observation(1, 2, e, Sign::Positive).expect("1-2");
    }
    matrix.add_observation(2, 3, 0, Sign::Positive).expect("2-3");
    matrix.add_observation(1, 3, 0, Sign::Negative).expect("negative");

    let cache = go_cache(&[(1, &[T1, T2]), (2, &[T1, T2, T3]), (3, &[T3])]);
    let stats = GoOverlapBySupport::from_matrix(&matrix, &cache, &small_config()).expect("stats");
    assert_eq!(stats.count(3, 2), 1);
    assert_eq!(stats.count(1, 1), 1);
    assert_eq!(stats.table().sum(), 2);
}

#[test]
fn table_output_starts_at_support_one() {
    let mut stats = GoOverlapBySupport::new(3, 2).expect("table");
    stats.record(1, 0);
    stats.record(2, 1);
    stats.record(2, 1);
    let mut out = Vec::new();
    stats.write_table(&mut out).expect("write table");
    assert_eq!(
        String::from_utf8(out).expect("utf8"),
        "Overlap\t0\t1\nSupport=1\t1\t0\nSupport=2\t0\t2\n"
    );

    let mut means = Vec::new();
    stats.write_means(&mut means).expect("write means");
    let text = String::from_utf8(means).expect("utf8");
    assert!(text.contains("2\t2\t1.000"));
}

#[test]
fn seeded_baseline_is_reproducible_and_skips_unscored_genes() {
    let cache = go_cache(&[
        (1, &[T1]),
        (2, &[T1, T2]),
        (3, &[T2, T3]),
        (4, &[T3]),
        (5, &[BIOLOGICAL_PROCESS]),
    ]);
    let genes = vec![1, 2, 3, 4, 5];
    let a = random_pair_baseline(&genes, &cache, 3, &mut StdRng::seed_from_u64(3)).expect("first");
    let b = random_pair_baseline(&genes, &cache, 3, &mut StdRng::seed_from_u64(3)).expect("second");
    assert_eq!(a, b);
    assert_eq!(a.len(), 3);
    assert!(a.iter().sum::<u64>() <= 4);
}

#[test]
fn term_counts_include_unannotated_genes() {
    let cache = go_cache(&[(1, &[T1, T2, T3, BIOLOGICAL_PROCESS]), (2, &[T1])]);
    let genes = [1, 2, 3];
    let counts = term_count_distribution(&genes, &cache, 3).expect("counts");
    assert_eq!(counts, vec![1, 1, 1]);
}

#[test]
fn cumulative_line_ends_at_one() {
    let mut out = Vec::new();
    write_cumulative(&mut out, "TermCounts", &[1, 1, 2]).expect("write");
    assert_eq!(
        String::from_utf8(out).expect("utf8"),
        "TermCounts\t0.2500\t0.5000\t1.0000\n"
    );
}

#[test]
fn table_writers_surface_flush_failures() {
    let mut stats = GoOverlapBySupport::new(3, 2).expect("table");
    stats.record(1, 1);
    let mut table = FlushFails::default();
    assert!(stats.write_table(&mut table).is_err());
    assert!(String::from_utf8(table.written).expect("utf8").starts_with("Overlap"));

    let mut means = FlushFails::default();
    assert!(stats.write_means(&mut means).is_err());
}

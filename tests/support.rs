mod common;

use std::collections::HashSet;

use coexstats::CoexError;
use coexstats::resolver::{GeneResolver, ResolverConfig, resolve};
use coexstats::sources::{InMemoryLinks, LinkSource};
use coexstats::support::{SupportConfig, SupportMatrix, compute_support_matrix};
use coexstats::types::{ExperimentRef, GeneCategory, Link, Sign, SignFilter, Taxon};

use common::{experiment, mouse, probe_map, record, resolver};

fn refs(n: usize) -> Vec<ExperimentRef> {
    (0..n)
        .map(|i| ExperimentRef {
            id: i as u64,
            short_name: format!("EE{i}"),
        })
        .collect()
}

#[test]
fn two_experiments_confirm_a_positive_link() {
    let experiments = vec![
        experiment(0, &[(100, 200, Sign::Positive)]),
        experiment(1, &[(100, 200, Sign::Positive)]),
    ];
    let resolver = resolver(&[(100, &[10]), (200, &[20])]);
    let matrix = coexstats::compute_support_matrix(&mouse(), &experiments, &resolver, SignFilter::Both)
        .expect("support matrix");

    assert_eq!(matrix.stringency(10, 20, Sign::Positive).expect("stringency"), 2);
    assert_eq!(matrix.stringency(10, 20, Sign::Negative).expect("stringency"), 0);
    assert_eq!(matrix.stringency(20, 10, Sign::Positive).expect("reversed"), 2);
}

#[test]
fn ambiguous_probe_expands_to_every_gene() {
    let resolver = resolver(&[(1, &[1, 2]), (2, &[3])]);
    let link = Link {
        experiment: 0,
        probe_a: 1,
        probe_b: 2,
        sign: Sign::Positive,
    };
    let pairs: HashSet<(u64, u64)> = resolver
        .resolve_link(&link)
        .iter()
        .map(|o| (o.gene_a, o.gene_b))
        .collect();
    assert_eq!(pairs, HashSet::from([(1, 3), (2, 3)]));

    let experiments = vec![experiment(0, &[(1, 2, Sign::Positive)])];
    let (matrix, summary) = compute_support_matrix(
        &mouse(),
        &experiments,
        &resolver,
        &SupportConfig::default(),
    )
    .expect("support matrix");
    assert_eq!(summary.resolution.observations, 2);
    assert_eq!(matrix.stringency(1, 3, Sign::Positive).expect("1-3"), 1);
    assert_eq!(matrix.stringency(2, 3, Sign::Positive).expect("2-3"), 1);
    assert_eq!(matrix.stringency(1, 2, Sign::Positive).expect("1-2"), 0);
}

#[test]
fn resolution_never_pairs_a_gene_with_itself() {
    let map = probe_map(&[(1, &[5, 6]), (2, &[5])]);
    let link = Link {
        experiment: 0,
        probe_a: 1,
        probe_b: 2,
        sign: Sign::Negative,
    };
    let obs = resolve(&link, &map[&1], &map[&2], &ResolverConfig::default());
    assert_eq!(obs.len(), 1);
    assert_eq!((obs[0].gene_a, obs[0].gene_b), (6, 5));
}

#[test]
fn unmapped_probes_are_counted_as_gaps() {
    let resolver = resolver(&[(1, &[10])]);
    let links = vec![
        Link {
            experiment: 0,
            probe_a: 1,
            probe_b: 99,
            sign: Sign::Positive,
        },
        Link {
            experiment: 0,
            probe_a: 98,
            probe_b: 99,
            sign: Sign::Positive,
        },
    ];
    let (obs, stats) = resolver.resolve_links(&links);
    assert!(obs.is_empty());
    assert_eq!(stats.links, 2);
    assert_eq!(stats.gaps, 2);
}

#[test]
fn resolver_filters_by_category_and_specificity() {
    let mut map = probe_map(&[(2, &[3])]);
    map.insert(
        1,
        vec![
            record(1, "Known1", GeneCategory::Known),
            record(2, "par-2", GeneCategory::ProbeAlignedRegion),
        ],
    );
    let link = Link {
        experiment: 0,
        probe_a: 1,
        probe_b: 2,
        sign: Sign::Positive,
    };

    let primary_only = GeneResolver::new(
        map.clone(),
        ResolverConfig {
            exclude_non_primary: true,
            filter_non_specific: false,
        },
    );
    let obs = primary_only.resolve_link(&link);
    assert_eq!(obs.len(), 1);
    assert_eq!(obs[0].gene_a, 1);

    let specific_only = GeneResolver::new(
        map,
        ResolverConfig {
            exclude_non_primary: false,
            filter_non_specific: true,
        },
    );
    assert!(specific_only.resolve_link(&link).is_empty());
}

#[test]
fn adding_an_observation_twice_changes_nothing() {
    let mut matrix = SupportMatrix::new(mouse(), [1, 2, 3], refs(70)).expect("matrix");
    assert!(matrix.add_observation(1, 3, 65, Sign::Positive).expect("first"));
    let once = matrix.support_bits(1, 3, Sign::Positive).expect("bits").to_vec();
    assert!(!matrix.add_observation(3, 1, 65, Sign::Positive).expect("second"));
    let twice = matrix.support_bits(1, 3, Sign::Positive).expect("bits").to_vec();
    assert_eq!(once, twice);
    assert_eq!(once.len(), 2);
    assert_eq!(matrix.stringency(1, 3, Sign::Positive).expect("stringency"), 1);
}

#[test]
fn unknown_genes_are_errors() {
    let mut matrix = SupportMatrix::new(mouse(), [1, 2], refs(1)).expect("matrix");
    assert!(matches!(
        matrix.stringency(1, 99, Sign::Positive),
        Err(CoexError::UnknownKey { id: 99 })
    ));
    assert!(matches!(
        matrix.add_observation(42, 2, 0, Sign::Negative),
        Err(CoexError::UnknownKey { id: 42 })
    ));
}

#[test]
fn self_pairs_are_ignored() {
    let mut matrix = SupportMatrix::new(mouse(), [7, 8], refs(2)).expect("matrix");
    assert!(!matrix.add_observation(7, 7, 1, Sign::Positive).expect("self pair"));
    assert_eq!(matrix.stringency(7, 7, Sign::Positive).expect("stringency"), 0);
    assert_eq!(matrix.supported_pairs(Sign::Positive).count(), 0);
}

#[test]
fn out_of_range_experiment_is_an_error() {
    let mut matrix = SupportMatrix::new(mouse(), [1, 2], refs(2)).expect("matrix");
    assert!(matches!(
        matrix.add_observation(1, 2, 5, Sign::Positive),
        Err(CoexError::BitMatrix(_))
    ));
}

#[test]
fn genes_outside_the_universe_are_dropped_and_counted() {
    let experiments = vec![experiment(
        0,
        &[(1, 2, Sign::Positive), (1, 3, Sign::Positive)],
    )];
    let resolver = resolver(&[(1, &[10]), (2, &[20]), (3, &[30])]);
    let config = SupportConfig {
        universe: Some(vec![10, 20]),
        ..Default::default()
    };
    let (matrix, summary) =
        compute_support_matrix(&mouse(), &experiments, &resolver, &config).expect("matrix");
    assert_eq!(matrix.gene_count(), 2);
    assert_eq!(summary.accumulation.outside_universe, 1);
    assert_eq!(summary.accumulation.bits_set, 1);
}

#[test]
fn sign_filter_keeps_one_direction() {
    let experiments = vec![experiment(
        0,
        &[(1, 2, Sign::Positive), (1, 3, Sign::Negative)],
    )];
    let resolver = resolver(&[(1, &[10]), (2, &[20]), (3, &[30])]);
    let config = SupportConfig {
        sign_filter: SignFilter::Negative,
        ..Default::default()
    };
    let (matrix, summary) =
        compute_support_matrix(&mouse(), &experiments, &resolver, &config).expect("matrix");
    assert_eq!(summary.accumulation.sign_filtered, 1);
    assert_eq!(matrix.stringency(10, 20, Sign::Positive).expect("pos"), 0);
    assert_eq!(matrix.stringency(10, 30, Sign::Negative).expect("neg"), 1);
}

#[test]
fn parallel_resolution_matches_sequential() {
    let experiments: Vec<_> = (0..6)
        .map(|e| experiment(e, &[(1, 2, Sign::Positive), (2, 3, Sign::Positive)]))
        .collect();
    let resolver = resolver(&[(1, &[10]), (2, &[20, 21]), (3, &[30])]);
    let sequential = SupportConfig::default();
    let parallel = SupportConfig {
        parallel: true,
        ..Default::default()
    };
    let (a, _) = compute_support_matrix(&mouse(), &experiments, &resolver, &sequential).expect("seq");
    let (b, _) = compute_support_matrix(&mouse(), &experiments, &resolver, &parallel).expect("par");
    let pairs_a: Vec<_> = a.supported_pairs(Sign::Positive).map(|(x, y, m)| (x, y, m.to_vec())).collect();
    let pairs_b: Vec<_> = b.supported_pairs(Sign::Positive).map(|(x, y, m)| (x, y, m.to_vec())).collect();
    assert_eq!(pairs_a, pairs_b);
    assert_eq!(a.stringency(20, 30, Sign::Positive).expect("stringency"), 6);
}

#[test]
fn experiment_index_beyond_the_set_is_rejected() {
    let experiments = vec![experiment(3, &[(1, 2, Sign::Positive)])];
    let resolver = resolver(&[(1, &[10]), (2, &[20])]);
    let err = compute_support_matrix(&mouse(), &experiments, &resolver, &SupportConfig::default())
        .expect_err("index 3 with one experiment");
    assert!(matches!(err, CoexError::Configuration(_)));
}

#[test]
fn merge_unions_support_and_names_experiments() {
    let mut left = SupportMatrix::new(mouse(), [1, 2, 3], refs(3)).expect("left");
    let mut right = SupportMatrix::new(mouse(), [1, 2, 3], refs(3)).expect("right");
    left.add_observation(1, 2, 0, Sign::Positive).expect("left obs");
    right.add_observation(2, 1, 2, Sign::Positive).expect("right obs");
    right.add_observation(2, 3, 1, Sign::Negative).expect("right neg");
    left.merge(&right).expect("merge");

    assert_eq!(left.stringency(1, 2, Sign::Positive).expect("pos"), 2);
    assert_eq!(left.stringency(2, 3, Sign::Negative).expect("neg"), 1);
    let bits = left.support_bits(1, 2, Sign::Positive).expect("bits");
    assert_eq!(left.experiment_names(bits), vec!["EE0", "EE2"]);

    let other = SupportMatrix::new(mouse(), [1, 2, 3], refs(4)).expect("other");
    assert!(left.merge(&other).is_err());
}

#[test]
fn saved_matrix_loads_with_the_same_support() {
    let dir = tempfile::tempdir().expect("tempdir");
    let prefix = dir.path().join("mouse");
    let mut matrix = SupportMatrix::new(mouse(), [5, 9, 11], refs(3)).expect("matrix");
    matrix.add_observation(9, 5, 0, Sign::Positive).expect("obs");
    matrix.add_observation(5, 9, 2, Sign::Positive).expect("obs");
    matrix.add_observation(11, 9, 1, Sign::Negative).expect("obs");
    matrix.save(&prefix).expect("save");

    let loaded = SupportMatrix::load(&prefix).expect("load");
    assert_eq!(loaded.taxon(), &mouse());
    assert_eq!(loaded.genes(), matrix.genes());
    assert_eq!(loaded.experiments(), matrix.experiments());
    assert_eq!(loaded.stringency(5, 9, Sign::Positive).expect("pos"), 2);
    assert_eq!(loaded.stringency(9, 11, Sign::Negative).expect("neg"), 1);
    assert_eq!(loaded.stringency(5, 11, Sign::Negative).expect("none"), 0);
}

#[test]
fn link_source_keeps_one_taxon_and_reindexes_from_zero() {
    let mut human = experiment(0, &[(1, 2, Sign::Positive)]);
    human.taxon = Taxon("human".to_string());
    let source = InMemoryLinks {
        experiments: vec![
            human,
            experiment(4, &[(1, 2, Sign::Positive)]),
            experiment(7, &[(2, 3, Sign::Negative)]),
        ],
    };
    let links = source.links_by_experiment(&mouse()).expect("links");
    assert_eq!(links.len(), 2);
    assert_eq!(links[1].index, 1);
    assert_eq!(links[1].experiment.short_name, "GSE7");
    assert!(links[1].links.iter().all(|l| l.experiment == 1));
}

#[test]
fn resolver_fetches_only_probes_the_links_use() {
    let lookup = probe_map(&[(1, &[10]), (2, &[20]), (3, &[30])]);
    let experiments = vec![experiment(0, &[(1, 2, Sign::Positive), (2, 9, Sign::Positive)])];
    let resolver =
        GeneResolver::from_lookup(&lookup, &experiments, ResolverConfig::default()).expect("lookup");
    assert_eq!(resolver.genes_for(2)[0].id, 20);
    assert!(resolver.genes_for(3).is_empty());
    assert!(resolver.genes_for(9).is_empty());
}

#[test]
fn experiment_names_follow_bit_indices_not_input_order() {
    let experiments = vec![
        experiment(1, &[(100, 200, Sign::Positive)]),
        experiment(0, &[(100, 300, Sign::Positive)]),
    ];
    let resolver = resolver(&[(100, &[10]), (200, &[20]), (300, &[30])]);
    let (matrix, _) =
        compute_support_matrix(&mouse(), &experiments, &resolver, &SupportConfig::default())
            .expect("matrix");
    let names: Vec<&str> = matrix.experiments().iter().map(|e| e.short_name.as_str()).collect();
    assert_eq!(names, vec!["GSE0", "GSE1"]);
    let bits = matrix.support_bits(10, 20, Sign::Positive).expect("bits");
    assert_eq!(matrix.experiment_names(bits), vec!["GSE1"]);
    let bits = matrix.support_bits(10, 30, Sign::Positive).expect("bits");
    assert_eq!(matrix.experiment_names(bits), vec!["GSE0"]);
}

#[test]
fn duplicate_or_mistagged_experiment_indices_are_rejected() {
    let resolver = resolver(&[(100, &[10]), (200, &[20])]);
    let duplicate = vec![
        experiment(0, &[(100, 200, Sign::Positive)]),
        experiment(0, &[(100, 200, Sign::Positive)]),
    ];
    let err = compute_support_matrix(&mouse(), &duplicate, &resolver, &SupportConfig::default())
        .expect_err("shared index");
    assert!(matches!(err, CoexError::Configuration(_)));

    let mut mistagged = experiment(0, &[(100, 200, Sign::Positive)]);
    mistagged.links[0].experiment = 1;
    let experiments = vec![mistagged, experiment(1, &[])];
    let err = compute_support_matrix(&mouse(), &experiments, &resolver, &SupportConfig::default())
        .expect_err("link tagged with another experiment");
    assert!(matches!(err, CoexError::Configuration(_)));
}

#[test]
fn filtered_sign_is_stored_without_bits() {
    let experiments = vec![experiment(
        0,
        &[(1, 2, Sign::Positive), (1, 3, Sign::Negative)],
    )];
    let resolver = resolver(&[(1, &[10]), (2, &[20]), (3, &[30])]);
    let config = SupportConfig {
        sign_filter: SignFilter::Positive,
        ..Default::default()
    };
    let (mut matrix, _) =
        compute_support_matrix(&mouse(), &experiments, &resolver, &config).expect("matrix");
    assert_eq!(matrix.support_bits(10, 20, Sign::Positive).expect("pos").len(), 1);
    assert!(matrix.support_bits(10, 30, Sign::Negative).expect("neg").is_empty());
    assert!(matrix.add_observation(10, 30, 0, Sign::Negative).is_err());

    let dir = tempfile::tempdir().expect("tempdir");
    let prefix = dir.path().join("filtered");
    matrix.save(&prefix).expect("save");
    let loaded = SupportMatrix::load(&prefix).expect("load");
    assert_eq!(loaded.stringency(10, 20, Sign::Positive).expect("pos"), 1);
    assert_eq!(loaded.stringency(10, 30, Sign::Negative).expect("neg"), 0);
}

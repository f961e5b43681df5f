mod common;

use std::collections::{HashMap, HashSet};

use rand::SeedableRng;
use rand::rngs::StdRng;

use coexstats::resolver::GeneResolver;
use coexstats::shuffle::{
    ShuffleMethod, ShuffleTrialConfig, relabel_genes, run_shuffle_trials, shuffle_links,
};
use coexstats::types::{ExperimentLinks, GenePairObservation, Link, Sign};

use common::{experiment, mouse, resolver};

fn links(n: u64) -> Vec<Link> {
    (0..n)
        .map(|i| Link {
            experiment: 0,
            probe_a: i,
            probe_b: 100 + i,
            sign: if i % 3 == 0 { Sign::Negative } else { Sign::Positive },
        })
        .collect()
}

fn fixture() -> (Vec<ExperimentLinks>, GeneResolver) {
    let experiments: Vec<ExperimentLinks> = (0..5)
        .map(|e| {
            experiment(
                e,
                &[
                    (1, 2, Sign::Positive),
                    (2, 3, Sign::Positive),
                    (3, 4, Sign::Positive),
                    (4, 5, Sign::Positive),
                    (5, 6, Sign::Positive),
                ],
            )
        })
        .collect();
    let resolver = resolver(&[
        (1, &[10]),
        (2, &[20]),
        (3, &[30]),
        (4, &[40]),
        (5, &[50]),
        (6, &[60]),
    ]);
    (experiments, resolver)
}

#[test]
fn zero_iterations_yield_no_histograms() {
    let (experiments, resolver) = fixture();
    let trials =
        coexstats::run_shuffle_trials(&mouse(), &experiments, &resolver, 0).expect("no trials");
    assert!(trials.is_empty());
}

#[test]
fn shuffle_moves_only_second_endpoints() {
    let original = links(40);
    let mut rng = StdRng::seed_from_u64(7);
    let shuffled = shuffle_links(&original, &mut rng);
    assert_eq!(shuffled.len(), original.len());

    for (before, after) in original.iter().zip(&shuffled) {
        assert_eq!(before.probe_a, after.probe_a);
        assert_eq!(before.sign, after.sign);
        assert_eq!(before.experiment, after.experiment);
    }
    let mut before: Vec<u64> = original.iter().map(|l| l.probe_b).collect();
    let mut after: Vec<u64> = shuffled.iter().map(|l| l.probe_b).collect();
    before.sort_unstable();
    after.sort_unstable();
    assert_eq!(before, after);
}

#[test]
fn shuffling_an_empty_or_single_link_list_is_a_no_op() {
    let mut rng = StdRng::seed_from_u64(1);
    assert!(shuffle_links(&[], &mut rng).is_empty());
    let one = links(1);
    assert_eq!(shuffle_links(&one, &mut rng), one);
}

#[test]
fn relabelled_observations_keep_count_and_never_pair_a_gene_with_itself() {
    let observations: Vec<GenePairObservation> = (0..30u64)
        .map(|i| GenePairObservation {
            gene_a: i % 7,
            gene_b: 7 + i % 5,
            experiment: 0,
            sign: Sign::Positive,
        })
        .collect();
    let mut rng = StdRng::seed_from_u64(99);
    let relabelled = relabel_genes(&observations, None, &mut rng);
    assert_eq!(relabelled.len(), observations.len());
    assert!(relabelled.iter().all(|o| o.gene_a != o.gene_b));

    let degree = |obs: &[GenePairObservation]| {
        let mut counts: Vec<usize> = obs
            .iter()
            .flat_map(|o| [o.gene_a, o.gene_b])
            .fold(HashMap::<u64, usize>::new(), |mut acc, g| {
                *acc.entry(g).or_default() += 1;
                acc
            })
            .into_values()
            .collect();
        counts.sort_unstable();
        counts
    };
    assert_eq!(degree(&observations), degree(&relabelled));
}

#[test]
fn seeded_trials_are_reproducible() {
    let (experiments, resolver) = fixture();
    let config = ShuffleTrialConfig {
        iterations: 4,
        seed: Some(2024),
        max_bucket: 10,
        ..Default::default()
    };
    let first = run_shuffle_trials(&mouse(), &experiments, &resolver, &config).expect("first");
    let second = run_shuffle_trials(&mouse(), &experiments, &resolver, &config).expect("second");
    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
}

#[test]
fn parallel_trials_match_sequential_trials() {
    let (experiments, resolver) = fixture();
    let sequential = ShuffleTrialConfig {
        iterations: 6,
        seed: Some(11),
        ..Default::default()
    };
    let parallel = ShuffleTrialConfig {
        parallel: true,
        cores: Some(2),
        ..sequential.clone()
    };
    let a = run_shuffle_trials(&mouse(), &experiments, &resolver, &sequential).expect("seq");
    let b = run_shuffle_trials(&mouse(), &experiments, &resolver, &parallel).expect("par");
    assert_eq!(a, b);
}

#[test]
fn trial_histograms_never_exceed_the_link_count() {
    let (experiments, resolver) = fixture();
    for method in [ShuffleMethod::SecondEndpoint, ShuffleMethod::GeneRelabel] {
        let config = ShuffleTrialConfig {
            iterations: 3,
            seed: Some(5),
            method,
            ..Default::default()
        };
        let trials = run_shuffle_trials(&mouse(), &experiments, &resolver, &config).expect("trials");
        for h in &trials {
            assert_eq!(h.count(0), 0);
            assert!(h.total() <= 25);
            assert!(h.max_support() <= 5);
        }
    }
}

#[test]
fn zero_bucket_ceiling_is_rejected_before_any_trial() {
    let (experiments, resolver) = fixture();
    let config = ShuffleTrialConfig {
        iterations: 2,
        max_bucket: 0,
        ..Default::default()
    };
    assert!(run_shuffle_trials(&mouse(), &experiments, &resolver, &config).is_err());
}

#[test]
fn shuffle_method_names_parse() {
    assert_eq!(
        "probe".parse::<ShuffleMethod>().expect("probe"),
        ShuffleMethod::SecondEndpoint
    );
    assert_eq!(
        "Gene-Relabel".parse::<ShuffleMethod>().expect("gene"),
        ShuffleMethod::GeneRelabel
    );
    assert!("columns".parse::<ShuffleMethod>().is_err());
}

#[test]
fn relabelling_draws_from_the_whole_universe() {
    let pair = |gene_a, gene_b| GenePairObservation {
        gene_a,
        gene_b,
        experiment: 0,
        sign: Sign::Positive,
    };
    let observations = vec![pair(1, 2)];
    let universe: Vec<u64> = (1..=50).collect();
    let mut seen = HashSet::new();
    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        for o in relabel_genes(&observations, Some(&universe), &mut rng) {
            assert!(universe.contains(&o.gene_a) && universe.contains(&o.gene_b));
            assert_ne!(o.gene_a, o.gene_b);
            seen.extend([o.gene_a, o.gene_b]);
        }
    }
    assert!(seen.iter().any(|g| *g > 2));

    let mut rng = StdRng::seed_from_u64(1);
    let outside = relabel_genes(&[pair(1, 99)], Some(&universe), &mut rng);
    assert_eq!(outside[0].gene_b, 99);
}

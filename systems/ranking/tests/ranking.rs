use std::fs;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rank_pressure_core::{ConfigError, Tier};
use rank_pressure_system_ranking::RankSystem;

const WEIGHTED_DOCUMENT: &str = r#"{
    "enabled": true,
    "order": [
        { "name": "F" }, { "name": "E" }, { "name": "D" }, { "name": "C" }, { "name": "B" }
    ],
    "globalWeights": { "F": 60, "E": 25, "D": 10, "C": 4, "B": 1, "Phantom": 50 }
}"#;

#[test]
fn sampled_frequencies_converge_to_weights() {
    let mut ranks = RankSystem::default();
    ranks
        .load_from_str(WEIGHTED_DOCUMENT)
        .expect("document loads");

    const DRAWS: usize = 200_000;
    let mut counts = [0_usize; 5];
    let mut rng = ChaCha8Rng::seed_from_u64(0x0dd5_eed5);
    for _ in 0..DRAWS {
        let tier = ranks.sample_base_tier("skeleton", &mut rng);
        counts[tier.index()] += 1;
    }

    let tolerance = 5.0 / (DRAWS as f64).sqrt();
    let table = ranks.weight_table();
    assert_eq!(table.total(), 100.0, "unknown names must not add mass");
    for (index, count) in counts.iter().enumerate() {
        let tier = Tier::from_index(index).expect("tier");
        let expected = table.probability(tier);
        let observed = *count as f64 / DRAWS as f64;
        assert!(
            (observed - expected).abs() < tolerance,
            "tier {index}: observed {observed:.4}, expected {expected:.4}"
        );
    }
}

#[test]
fn same_seed_replays_same_draws() {
    let mut ranks = RankSystem::default();
    ranks
        .load_from_str(WEIGHTED_DOCUMENT)
        .expect("document loads");

    let draw = |seed: u64| {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..64)
            .map(|_| ranks.sample_base_tier("wolf", &mut rng))
            .collect::<Vec<_>>()
    };
    assert_eq!(draw(99), draw(99));
}

#[test]
fn loads_configuration_from_disk() {
    let directory = tempfile::tempdir().expect("tempdir");
    let path = directory.path().join("ranks.json");
    fs::write(&path, WEIGHTED_DOCUMENT).expect("write config");

    let mut ranks = RankSystem::default();
    ranks.load(&path).expect("config loads");

    assert!(ranks.is_enabled());
    assert_eq!(ranks.catalog_len(), 5);
    assert_eq!(ranks.weight_table().entries().len(), 5);
}

#[test]
fn unreadable_file_keeps_previous_configuration() {
    let directory = tempfile::tempdir().expect("tempdir");
    let mut ranks = RankSystem::default();
    ranks
        .load_from_str(WEIGHTED_DOCUMENT)
        .expect("document loads");

    let error = ranks
        .load(&directory.path().join("missing.json"))
        .expect_err("missing file fails");
    assert!(matches!(error, ConfigError::Read { .. }));
    assert!(ranks.is_enabled());
    assert_eq!(ranks.catalog_len(), 5);
}

#[test]
fn malformed_file_keeps_previous_configuration() {
    let directory = tempfile::tempdir().expect("tempdir");
    let path = directory.path().join("ranks.json");
    fs::write(&path, "{ \"order\": [").expect("write config");

    let mut ranks = RankSystem::default();
    ranks
        .load_from_str(WEIGHTED_DOCUMENT)
        .expect("document loads");

    let error = ranks.load(&path).expect_err("malformed file fails");
    assert!(matches!(error, ConfigError::Parse(_)));
    assert_eq!(ranks.catalog_len(), 5);
}

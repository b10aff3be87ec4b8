use std::path::PathBuf;

use crate::assert_err;
use crate::train::{Config, TrainError};

#[test]
fn test_default_config_is_valid() {
    let config = Config::default();
    config.validate().unwrap();
    assert_eq!(config.seed, 42);
    assert_eq!(config.max_seq_len, 20);
    assert_eq!(config.adversarial.d_steps, 3);
    assert_eq!(config.adversarial.g_steps, 1);
    assert_eq!(config.adversarial.discriminator_batch_size, 22);
    assert_eq!(config.generator_pretrain.scheduled_sampling_k, 3500.0);
    assert!(!config.any_training());
}

#[test]
fn test_derived_directories() {
    let config = Config {
        results_dir: PathBuf::from("/tmp/results"),
        run_id: "run_7".to_string(),
        ..Config::default()
    };
    assert_eq!(config.run_dir(), PathBuf::from("/tmp/results/run_7"));
    assert_eq!(config.checkpoints_dir(), PathBuf::from("/tmp/results/run_7/checkpoints"));
    assert_eq!(config.log_dir(), PathBuf::from("/tmp/results/run_7/logs"));
    assert_eq!(
        config.vocabulary_path(),
        PathBuf::from("/tmp/results/run_7/vocabulary.json")
    );
}

#[test]
fn test_partial_json_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"run_id": "small", "generator": {"lstm_units": 32}, "adversarial": {"rollout_n": 2}}"#,
    )
    .unwrap();
    let config = Config::from_json_file(&path).unwrap();
    assert_eq!(config.run_id, "small");
    assert_eq!(config.generator.lstm_units, 32);
    assert_eq!(config.generator.z_units, 256);
    assert_eq!(config.adversarial.rollout_n, 2);
    assert_eq!(config.adversarial.rounds, 10000);
}

#[test]
fn test_invalid_values_are_rejected() {
    let mut config = Config::default();
    config.adversarial.rollout_update_rate = 1.5;
    assert_err!(config.validate(), TrainError::Config(msg) if msg.contains("rollout_update_rate"));

    let mut config = Config::default();
    config.adversarial.rollout_n = 0;
    assert_err!(config.validate(), TrainError::Config(msg) if msg.contains("rollout_n"));

    let mut config = Config::default();
    config.vocab_size = 4;
    assert_err!(config.validate(), TrainError::Config(_));

    let mut config = Config::default();
    config.generator_pretrain.scheduled_sampling_k = 0.0;
    assert_err!(config.validate(), TrainError::Config(_));
}

#[test]
fn test_unparsable_json_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ seed: ").unwrap();
    assert_err!(Config::from_json_file(&path), TrainError::Config(_));
}

#[test]
fn test_model_dims_follow_feature_grid() {
    let config = Config {
        feature_grid: 3,
        ..Config::default()
    };
    let dims = config.model_dims(100, 7);
    assert_eq!(dims.num_regions, 9);
    assert_eq!(dims.feature_dim, 6);
    assert_eq!(dims.end_id(), 98);
    assert_eq!(dims.start_id(), 99);
    assert_eq!(dims.max_seq_len, 20);
}

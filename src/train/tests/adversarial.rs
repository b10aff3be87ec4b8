use super::{discriminator, extractor, generator, toy_stream};
use crate::assert_err;
use crate::data::BatchStream;
use crate::train::{
    ADVERSARIAL_GENERATOR, ADVERSARIAL_ROLLOUT, AdversarialConfig, AdversarialTrainer,
    CheckpointStore, Phase, TrainError,
};

fn config() -> AdversarialConfig {
    AdversarialConfig {
        generator_batch_size: 2,
        discriminator_batch_size: 2,
        rounds: 2,
        validate_rounds: 1,
        checkpoint_rounds: 1,
        d_steps: 2,
        g_steps: 1,
        rollout_n: 2,
        ..AdversarialConfig::default()
    }
}

fn trainer(config: &AdversarialConfig) -> AdversarialTrainer {
    AdversarialTrainer::new(generator(1), discriminator(2), extractor(), config, 3).unwrap()
}

#[test]
fn test_phase_transitions() {
    let mut phase = Phase::start(2, 1);
    let mut visited = vec![phase];
    while phase != Phase::RoundComplete {
        phase = phase.next(2, 1);
        visited.push(phase);
    }
    assert_eq!(
        visited,
        [
            Phase::DiscriminatorStep(0),
            Phase::DiscriminatorStep(1),
            Phase::GeneratorStep(0),
            Phase::RoundComplete,
        ]
    );

    assert_eq!(Phase::start(0, 2), Phase::GeneratorStep(0));
    assert_eq!(Phase::GeneratorStep(0).next(0, 2), Phase::GeneratorStep(1));
    assert_eq!(Phase::DiscriminatorStep(0).next(1, 0), Phase::RoundComplete);
    assert_eq!(Phase::start(0, 0), Phase::RoundComplete);
}

#[test]
fn test_round_runs_configured_steps() {
    let config = config();
    let mut trainer = trainer(&config);
    let mut d_batches = toy_stream(2);
    let mut g_batches = toy_stream(2);

    let summary = trainer.run_round(&mut d_batches, &mut g_batches).unwrap();
    assert_eq!(summary.round, 1);
    assert_eq!(summary.discriminator_losses.len(), 2);
    assert_eq!(summary.generator_steps.len(), 1);
    assert!(summary.discriminator_losses.iter().all(|l| l.is_finite()));
    assert!(summary.generator_steps[0].loss.is_finite());
    assert!(summary.rollout_refreshed);
    assert_eq!(trainer.round(), 1);
    assert_eq!(trainer.phase(), Phase::RoundComplete);
}

#[test]
fn test_rollout_tracks_generator_at_full_rate() {
    let config = config();
    let mut trainer = trainer(&config);
    let before = trainer.rollout().state_dict();
    trainer
        .run_round(&mut toy_stream(2), &mut toy_stream(2))
        .unwrap();

    let live = trainer.generator().graph().state_dict();
    assert_ne!(before, live);
    assert_eq!(trainer.rollout().state_dict(), live);
}

#[test]
fn test_rollout_lags_between_refreshes() {
    let config = AdversarialConfig {
        rollout_update_rounds: 2,
        ..config()
    };
    let mut trainer = trainer(&config);
    let initial = trainer.rollout().state_dict();
    let (mut d, mut g) = (toy_stream(2), toy_stream(2));

    let first = trainer.run_round(&mut d, &mut g).unwrap();
    assert!(!first.rollout_refreshed);
    assert_eq!(trainer.rollout().state_dict(), initial);

    let second = trainer.run_round(&mut d, &mut g).unwrap();
    assert!(second.rollout_refreshed);
    assert_eq!(
        trainer.rollout().state_dict(),
        trainer.generator().graph().state_dict()
    );
}

#[test]
fn test_empty_stream_is_an_error() {
    let config = config();
    let mut trainer = trainer(&config);
    let mut empty_d = BatchStream::from_examples(Vec::new(), 2);
    let mut empty_g = BatchStream::from_examples(Vec::new(), 2);
    assert_err!(
        trainer.run_round(&mut empty_d, &mut empty_g),
        TrainError::EmptyDataset(_)
    );
    assert_eq!(trainer.round(), 0);
}

#[test]
fn test_train_writes_checkpoints_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path());
    let config = config();

    let mut first = trainer(&config)
        .with_checkpoints(store.clone())
        .with_metrics(&dir.path().join("logs"));
    first
        .train(&mut toy_stream(2), &mut toy_stream(2), &mut toy_stream(2))
        .unwrap();
    assert_eq!(first.round(), 2);
    assert_eq!(store.steps(ADVERSARIAL_GENERATOR).unwrap(), [1, 2]);
    assert_eq!(store.steps(ADVERSARIAL_ROLLOUT).unwrap(), [1, 2]);
    assert!(dir.path().join("logs/adversarial_validation.csv").exists());

    let mut resumed = AdversarialTrainer::new(generator(8), discriminator(9), extractor(), &config, 3)
        .unwrap()
        .with_checkpoints(store);
    assert_eq!(resumed.resume().unwrap(), Some(2));
    assert_eq!(resumed.round(), 2);
    assert_eq!(
        resumed.generator().graph().state_dict(),
        first.generator().graph().state_dict()
    );
    assert_eq!(
        resumed.discriminator().graph().state_dict(),
        first.discriminator().graph().state_dict()
    );
    assert_eq!(resumed.rollout().state_dict(), first.rollout().state_dict());
}

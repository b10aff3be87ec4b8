use super::{discriminator, extractor, generator, toy_batch, toy_stream};
use crate::model::NoRegularizer;
use crate::train::{
    DISCRIMINATOR_PRETRAIN, DiscriminatorPretrainConfig, DiscriminatorPretrainer,
    CheckpointStore, GENERATOR_PRETRAIN, GeneratorPretrainConfig, GeneratorPretrainer,
    SamplingSchedule,
};

fn generator_config() -> GeneratorPretrainConfig {
    GeneratorPretrainConfig {
        batch_size: 2,
        epochs: 2,
        logging_steps: 1,
        validate_steps: 1,
        checkpoint_steps: 100,
        ..GeneratorPretrainConfig::default()
    }
}

fn discriminator_config() -> DiscriminatorPretrainConfig {
    DiscriminatorPretrainConfig {
        batch_size: 2,
        epochs: 1,
        logging_steps: 1,
        validate_steps: 1,
        checkpoint_steps: 100,
        ..DiscriminatorPretrainConfig::default()
    }
}

fn generator_trainer(seed: u64) -> GeneratorPretrainer {
    GeneratorPretrainer::new(generator(seed), extractor(), &generator_config(), 11)
        .unwrap()
        .with_schedule(SamplingSchedule::Constant(1.0))
}

#[test]
fn test_generator_step_is_deterministic() {
    let batch = toy_batch(&[&[2, 3, 4], &[3, 4]]);
    let mut a = generator_trainer(7);
    let mut b = generator_trainer(7);
    let loss_a = a.train_step(&batch).unwrap().unwrap();
    let loss_b = b.train_step(&batch).unwrap().unwrap();
    assert_eq!(loss_a, loss_b);
    assert!(loss_a.is_finite() && loss_a > 0.0);
    assert_eq!(a.step(), 1);
    assert_eq!(
        a.generator().graph().state_dict(),
        b.generator().graph().state_dict()
    );
}

#[test]
fn test_generator_steps_reduce_loss_on_fixed_batch() {
    let batch = toy_batch(&[&[2, 3, 4], &[3, 4]]);
    let config = GeneratorPretrainConfig {
        learning_rate: 0.05,
        ..generator_config()
    };
    let mut trainer = GeneratorPretrainer::new(generator(3), extractor(), &config, 1)
        .unwrap()
        .with_schedule(SamplingSchedule::Constant(1.0))
        .with_regularizer(Box::new(NoRegularizer));
    let first = trainer.train_step(&batch).unwrap().unwrap();
    let mut last = first;
    for _ in 0..30 {
        last = trainer.train_step(&batch).unwrap().unwrap();
    }
    assert!(last < first, "loss 未下降：{first} -> {last}");
}

#[test]
fn test_malformed_batch_is_skipped() {
    let mut trainer = generator_trainer(1);
    let before = trainer.generator().graph().state_dict();
    let batch = toy_batch(&[&[2, 4], &[]]);
    assert_eq!(trainer.train_step(&batch).unwrap(), None);
    assert_eq!(trainer.validate(&batch).unwrap(), None);
    assert_eq!(trainer.step(), 0);
    assert_eq!(trainer.generator().graph().state_dict(), before);
}

#[test]
fn test_validation_leaves_parameters_untouched() {
    let mut trainer = generator_trainer(2);
    let before = trainer.generator().graph().state_dict();
    let nodes = trainer.generator().graph().nodes_count();
    let loss = trainer
        .validate(&toy_batch(&[&[2, 3, 4]]))
        .unwrap()
        .unwrap();
    assert!(loss.is_finite());
    assert_eq!(trainer.generator().graph().state_dict(), before);
    assert_eq!(trainer.generator().graph().nodes_count(), nodes);
}

#[test]
fn test_generator_train_runs_epochs_and_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("checkpoints"));
    let mut trainer = generator_trainer(4)
        .with_checkpoints(store.clone())
        .with_metrics(&dir.path().join("logs"));
    trainer
        .train(&mut toy_stream(2), &mut toy_stream(2))
        .unwrap();

    // 4 个样本、批大小 2、2 个 epoch
    assert_eq!(trainer.step(), 4);
    assert_eq!(trainer.epoch(), 2);
    assert_eq!(store.steps(GENERATOR_PRETRAIN).unwrap(), [4]);
    let log = std::fs::read_to_string(dir.path().join("logs/generator_pretrain.csv")).unwrap();
    assert_eq!(log.lines().count(), 1 + 4);
    assert!(dir.path().join("logs/generator_pretrain_validation.csv").exists());
}

#[test]
fn test_generator_resume_restores_progress() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path());
    let batch = toy_batch(&[&[2, 3, 4], &[3, 4]]);

    let mut first = generator_trainer(5).with_checkpoints(store.clone());
    first.train_step(&batch).unwrap();
    first.train_step(&batch).unwrap();
    first.save_checkpoint().unwrap();

    let mut resumed = generator_trainer(6).with_checkpoints(store.clone());
    assert!(resumed.resume().unwrap());
    assert_eq!(resumed.step(), 2);
    assert_eq!(
        resumed.generator().graph().state_dict(),
        first.generator().graph().state_dict()
    );

    // 恢复后的同一步不重复写检查点
    resumed.save_checkpoint().unwrap();
    assert_eq!(store.steps(GENERATOR_PRETRAIN).unwrap(), [2]);
}

#[test]
fn test_resume_without_checkpoint_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let mut trainer = generator_trainer(1).with_checkpoints(CheckpointStore::new(dir.path()));
    assert!(!trainer.resume().unwrap());
    assert_eq!(trainer.step(), 0);
}

fn discriminator_trainer() -> DiscriminatorPretrainer {
    DiscriminatorPretrainer::new(
        generator(1),
        discriminator(2),
        extractor(),
        &discriminator_config(),
        5,
    )
    .unwrap()
}

#[test]
fn test_discriminator_step_updates_parameters() {
    let mut trainer = discriminator_trainer();
    let before = trainer.discriminator().graph().state_dict();

    let loss = trainer
        .train_step(&toy_batch(&[&[2, 3, 4], &[3, 4], &[2, 4]]))
        .unwrap()
        .unwrap();
    assert!(loss.is_finite() && loss > 0.0);
    assert_eq!(trainer.step(), 1);
    assert_ne!(trainer.discriminator().graph().state_dict(), before);
}

#[test]
fn test_discriminator_validation_scores_in_unit_interval() {
    let mut trainer = discriminator_trainer();
    let v = trainer
        .validate(&toy_batch(&[&[2, 3, 4], &[3, 4]]))
        .unwrap()
        .unwrap();
    assert!(v.loss.is_finite());
    assert!(v.real_score > 0.0 && v.real_score < 1.0);
    assert!(v.fake_score > 0.0 && v.fake_score < 1.0);
}

#[test]
fn test_discriminator_train_saves_final_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path());
    let mut trainer = discriminator_trainer().with_checkpoints(store.clone());
    trainer
        .train(&mut toy_stream(2), &mut toy_stream(2))
        .unwrap();
    assert_eq!(trainer.step(), 2);
    assert_eq!(store.steps(DISCRIMINATOR_PRETRAIN).unwrap(), [2]);
}

#[test]
fn test_generator_resume_after_finished_run_does_not_retrain() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path());
    let config = GeneratorPretrainConfig {
        checkpoint_steps: 2,
        ..generator_config()
    };
    let trainer = |seed| {
        GeneratorPretrainer::new(generator(seed), extractor(), &config, 11)
            .unwrap()
            .with_checkpoints(store.clone())
    };

    // 最后一步恰好落在检查点间隔上
    let mut finished = trainer(4);
    finished
        .train(&mut toy_stream(2), &mut toy_stream(2))
        .unwrap();
    assert_eq!(finished.step(), 4);
    assert_eq!(store.steps(GENERATOR_PRETRAIN).unwrap(), [2, 4]);
    assert_eq!(store.latest(GENERATOR_PRETRAIN).unwrap().unwrap().epoch, 2);

    let mut resumed = trainer(9);
    assert!(resumed.resume().unwrap());
    assert_eq!(resumed.epoch(), 2);
    resumed
        .train(&mut toy_stream(2), &mut toy_stream(2))
        .unwrap();
    assert_eq!(resumed.step(), 4);
    assert_eq!(
        resumed.generator().graph().state_dict(),
        finished.generator().graph().state_dict()
    );
    assert_eq!(store.steps(GENERATOR_PRETRAIN).unwrap(), [2, 4]);
}

#[test]
fn test_discriminator_resume_after_finished_run_does_not_retrain() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path());
    let config = DiscriminatorPretrainConfig {
        checkpoint_steps: 2,
        ..discriminator_config()
    };
    let trainer = || {
        DiscriminatorPretrainer::new(generator(1), discriminator(2), extractor(), &config, 5)
            .unwrap()
            .with_checkpoints(store.clone())
    };

    let mut finished = trainer();
    finished
        .train(&mut toy_stream(2), &mut toy_stream(2))
        .unwrap();
    assert_eq!(finished.step(), 2);

    let mut resumed = trainer();
    assert!(resumed.resume().unwrap());
    assert_eq!(resumed.epoch(), 1);
    resumed
        .train(&mut toy_stream(2), &mut toy_stream(2))
        .unwrap();
    assert_eq!(resumed.step(), 2);
    assert_eq!(store.steps(DISCRIMINATOR_PRETRAIN).unwrap(), [2]);
}

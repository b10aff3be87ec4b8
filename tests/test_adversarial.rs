/*
 * @Date         : 2026-02-12
 * @Description  : 对抗训练集成测试：两个网络的更新互不干扰，以及奖励的边界性质
 */

use approx::assert_abs_diff_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;

use caption_gan::data::{Batch, Example};
use caption_gan::model::{
    Discriminator, DiscriminatorHyper, FeatureExtractor, Generator, GeneratorHyper, ModelDims,
    PatchPoolExtractor,
};
use caption_gan::nn::Graph;
use caption_gan::train::{AdversarialConfig, AdversarialTrainer, MonteCarloReward, RolloutPolicy};

/// 词表 {<pad>, <unk>, a, b, <end>, <start>}
const DIMS: ModelDims = ModelDims {
    vocab_size: 6,
    num_styles: 2,
    feature_dim: 6,
    num_regions: 4,
    max_seq_len: 6,
};

fn models(seed: u64) -> (Generator, Discriminator) {
    let generator = Generator::new(
        &Graph::new_with_seed(seed),
        DIMS,
        GeneratorHyper {
            embedding_units: 6,
            attention_units: 4,
            lstm_units: 8,
            z_units: 2,
            dropout: 0.0,
        },
    )
    .unwrap();
    let discriminator = Discriminator::new(
        &Graph::new_with_seed(seed + 1),
        DIMS,
        DiscriminatorHyper {
            embedding_units: 4,
            lstm_units: 5,
        },
    )
    .unwrap();
    (generator, discriminator)
}

fn batch() -> Batch {
    let examples: Vec<Example> = [&[2usize, 3, 4][..], &[3, 4], &[2, 2, 3, 3, 4]]
        .iter()
        .enumerate()
        .map(|(i, tokens)| Example {
            pixels: (0..4 * 4 * 3).map(|p| (p * 13 + i * 71) as u8).collect(),
            image_size: 4,
            style: i % 2,
            tokens: tokens.to_vec(),
        })
        .collect();
    Batch::collate(&examples).unwrap()
}

#[test]
fn test_each_step_updates_only_its_own_network() {
    let (generator, discriminator) = models(3);
    let config = AdversarialConfig {
        rollout_n: 2,
        ..AdversarialConfig::default()
    };
    let mut trainer = AdversarialTrainer::new(
        generator,
        discriminator,
        Box::new(PatchPoolExtractor::new(2)),
        &config,
        5,
    )
    .unwrap();
    let batch = batch();

    let g_before = trainer.generator().graph().state_dict();
    let d_before = trainer.discriminator().graph().state_dict();
    trainer.discriminator_step(&batch).unwrap().unwrap();
    assert_eq!(trainer.generator().graph().state_dict(), g_before);
    assert_ne!(trainer.discriminator().graph().state_dict(), d_before);

    let d_after = trainer.discriminator().graph().state_dict();
    let stats = trainer.generator_step(&batch).unwrap().unwrap();
    assert!(stats.loss.is_finite());
    assert!(stats.mean_reward > 0.0 && stats.mean_reward < 1.0);
    assert_ne!(trainer.generator().graph().state_dict(), g_before);
    assert_eq!(trainer.discriminator().graph().state_dict(), d_after);
    // rollout 策略只在一轮结束时刷新
    assert_eq!(trainer.rollout().state_dict(), g_before);
}

#[test]
fn test_final_token_reward_is_direct_score() {
    let (generator, discriminator) = models(11);
    let rollout = RolloutPolicy::new(&generator, 1.0, 1).unwrap();
    let batch = batch();
    let features = PatchPoolExtractor::new(2).extract(&batch.images);
    let mut rng = StdRng::seed_from_u64(0);
    let z = generator.sample_noise(batch.len(), &mut rng);

    let rewards = MonteCarloReward::new(3, 0.9)
        .rewards(&rollout, &discriminator, &features, &batch, &z, &mut rng)
        .unwrap();
    let direct = discriminator.score(&features, &batch).unwrap();
    for (b, &len) in batch.lengths.iter().enumerate() {
        assert_abs_diff_eq!(rewards[[b, len - 1]], direct[b], epsilon = 1e-6);
        for t in len..batch.max_len() {
            assert_eq!(rewards[[b, t]], 0.0);
        }
    }
}

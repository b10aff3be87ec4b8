use approx::assert_abs_diff_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{DIMS, GEN_HYPER, toy_batch, toy_features};
use crate::model::generator::sample_categorical;
use crate::model::{DoublyStochastic, Generator, NoRegularizer};
use crate::nn::{Graph, Module};
use crate::tensor::Tensor;

fn build(seed: u64) -> Generator {
    Generator::new(&Graph::new_with_seed(seed), DIMS, GEN_HYPER).unwrap()
}

fn pretrain_loss(generator: &Generator, sequences: &[&[usize]]) -> f32 {
    let batch = toy_batch(sequences, &[0, 2]);
    let mut rng = StdRng::seed_from_u64(5);
    let z = generator.sample_noise(batch.len(), &mut rng);
    let output = generator
        .teacher_forced(&toy_features(batch.len()), &batch, &z, 1.0, &mut rng)
        .unwrap();
    let loss = generator
        .sequence_loss(&output, &batch, &DoublyStochastic, 0.9)
        .unwrap();
    loss.item().unwrap()
}

#[test]
fn test_teacher_forced_loss_is_deterministic_and_data_dependent() {
    let first = pretrain_loss(&build(1), &[&[2, 3, 4], &[3, 4]]);
    let again = pretrain_loss(&build(1), &[&[2, 3, 4], &[3, 4]]);
    let changed = pretrain_loss(&build(1), &[&[3, 3, 4], &[2, 4]]);
    assert_eq!(first, again);
    assert_ne!(first, changed);
    assert!(first.is_finite() && first > 0.0);
}

#[test]
fn test_teacher_forced_shapes() {
    let generator = build(2);
    let batch = toy_batch(&[&[2, 3, 4], &[4]], &[1, 1]);
    let mut rng = StdRng::seed_from_u64(0);
    let z = generator.sample_noise(2, &mut rng);
    let output = generator
        .teacher_forced(&toy_features(2), &batch, &z, 0.3, &mut rng)
        .unwrap();
    assert_eq!(output.logits.len(), 3);
    assert_eq!(output.alphas.len(), 3);
    assert_eq!(output.logits[2].value().unwrap().shape(), &[2, DIMS.vocab_size]);
    assert_eq!(output.alphas[0].value().unwrap().shape(), &[2, DIMS.num_regions]);
}

#[test]
fn test_pretrain_loss_reaches_every_parameter() {
    let generator = build(3);
    let batch = toy_batch(&[&[2, 3, 4], &[3, 4]], &[0, 2]);
    let mut rng = StdRng::seed_from_u64(1);
    let z = generator.sample_noise(2, &mut rng);
    let output = generator
        .teacher_forced(&toy_features(2), &batch, &z, 1.0, &mut rng)
        .unwrap();
    let loss = generator
        .sequence_loss(&output, &batch, &DoublyStochastic, 0.9)
        .unwrap();
    loss.backward().unwrap();
    for param in generator.parameters() {
        assert!(param.grad().unwrap().is_some(), "参数 {param:?} 没有梯度");
    }
}

#[test]
fn test_regularizer_weight_changes_loss() {
    let generator = build(4);
    let batch = toy_batch(&[&[2, 4], &[3, 4]], &[0, 1]);
    let mut rng = StdRng::seed_from_u64(2);
    let z = generator.sample_noise(2, &mut rng);
    let features = toy_features(2);
    let output = generator.teacher_forced(&features, &batch, &z, 1.0, &mut rng).unwrap();
    let plain = generator.sequence_loss(&output, &batch, &NoRegularizer, 0.9).unwrap();
    let zero_lambda = generator.sequence_loss(&output, &batch, &DoublyStochastic, 0.0).unwrap();
    let regularized = generator.sequence_loss(&output, &batch, &DoublyStochastic, 0.9).unwrap();
    assert_abs_diff_eq!(plain.item().unwrap(), zero_lambda.item().unwrap(), epsilon = 1e-6);
    assert!(regularized.item().unwrap() > plain.item().unwrap());
}

#[test]
fn test_generate_stops_at_end_or_max_len() {
    let generator = build(5);
    let mut rng = StdRng::seed_from_u64(3);
    let z = generator.sample_noise(4, &mut rng);
    let nodes_before = generator.graph().nodes_count();
    let sequences = generator
        .generate(&toy_features(4), &[0, 1, 2, 0], &z, DIMS.max_seq_len, &mut rng)
        .unwrap();
    assert_eq!(generator.graph().nodes_count(), nodes_before);
    assert_eq!(sequences.len(), 4);
    for seq in &sequences {
        assert!(!seq.is_empty() && seq.len() <= DIMS.max_seq_len);
        let end_at = seq.iter().position(|&t| t == DIMS.end_id());
        match end_at {
            Some(i) => assert_eq!(i, seq.len() - 1),
            None => assert_eq!(seq.len(), DIMS.max_seq_len),
        }
    }
}

#[test]
fn test_generate_from_prefix_keeps_prefix_and_finished_sequences() {
    let generator = build(6);
    let mut rng = StdRng::seed_from_u64(4);
    let z = generator.sample_noise(3, &mut rng);
    let prefixes = vec![vec![2, 3], vec![3, 4], vec![2, 2, 2, 2, 2]];
    let completed = generator
        .generate_from_prefix(&toy_features(3), &[0, 1, 2], &z, &prefixes, DIMS.max_seq_len, &mut rng)
        .unwrap();
    assert_eq!(&completed[0][..2], &[2, 3]);
    assert!(completed[0].len() > 2);
    assert_eq!(completed[1], vec![3, 4]);
    assert_eq!(completed[2], vec![2, 2, 2, 2, 2]);
}

#[test]
fn test_same_seed_same_samples() {
    let sample = |seed: u64| {
        let generator = build(7);
        let mut rng = StdRng::seed_from_u64(seed);
        let z = generator.sample_noise(2, &mut rng);
        generator
            .generate(&toy_features(2), &[0, 1], &z, DIMS.max_seq_len, &mut rng)
            .unwrap()
    };
    assert_eq!(sample(9), sample(9));
}

#[test]
fn test_policy_loss_weights_log_probs_by_reward() {
    let generator = build(8);
    let generated = toy_batch(&[&[2, 3, 4], &[3, 4]], &[0, 1]);
    let features = toy_features(2);
    let mut rng = StdRng::seed_from_u64(6);
    let z = generator.sample_noise(2, &mut rng);

    let zero = Tensor::zeros(&[2, 3]);
    let loss = generator
        .policy_loss(&features, &generated, &z, &zero, &NoRegularizer, 0.0)
        .unwrap();
    assert_abs_diff_eq!(loss.item().unwrap(), 0.0, epsilon = 1e-7);

    // 奖励为1且无填充的位置上，损失即 -Σ log p / batch
    let ones = Tensor::new(&[1.0, 1.0, 1.0, 1.0, 1.0, 0.0], &[2, 3]);
    let loss = generator
        .policy_loss(&features, &generated, &z, &ones, &NoRegularizer, 0.0)
        .unwrap();
    let output = generator.teacher_forced(&features, &generated, &z, 1.0, &mut rng).unwrap();
    let mut expected = 0.0;
    for (t, logits) in output.logits.iter().enumerate() {
        let log_probs = logits.value().unwrap().log_softmax_rows();
        for b in 0..2 {
            if t < generated.lengths[b] {
                expected -= log_probs[[b, generated.tokens[b][t]]];
            }
        }
    }
    assert_abs_diff_eq!(loss.item().unwrap(), expected / 2.0, epsilon = 1e-4);

    let wrong = Tensor::zeros(&[2, 2]);
    assert!(generator.policy_loss(&features, &generated, &z, &wrong, &NoRegularizer, 0.0).is_err());
}

#[test]
fn test_sampling_skips_excluded_tokens() {
    let mut rng = StdRng::seed_from_u64(12);
    // 几乎全部概率落在被排除的 0 与 5 上
    let probs = [0.6, 0.01, 0.02, 0.01, 0.01, 0.35];
    let excluded = DIMS.unsampled_ids();
    for _ in 0..500 {
        let token = sample_categorical(&probs, &excluded, &mut rng);
        assert!((1..=4).contains(&token), "采样到 {token}");
    }
}

#[test]
fn test_generated_tokens_never_pad_or_start() {
    let generator = build(13);
    let mut rng = StdRng::seed_from_u64(8);
    for _ in 0..20 {
        let z = generator.sample_noise(4, &mut rng);
        let sequences = generator
            .generate(&toy_features(4), &[0, 1, 2, 0], &z, DIMS.max_seq_len, &mut rng)
            .unwrap();
        for seq in &sequences {
            assert!(seq.iter().all(|&t| t != 0 && t != DIMS.start_id()), "{seq:?}");
        }
    }
}

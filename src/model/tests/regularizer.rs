use approx::assert_abs_diff_eq;

use crate::model::{AttentionRegularizer, DoublyStochastic, NoRegularizer};
use crate::nn::Graph;
use crate::tensor::Tensor;

#[test]
fn test_doubly_stochastic_penalty_by_hand() {
    let graph = Graph::new();
    let half = Tensor::full(&[1, 2], 0.5);
    let alphas = vec![graph.input(&half), graph.input(&half)];

    // 两步都有效：每个区域累计注意力恰为1
    let full = Tensor::new(&[1.0, 1.0], &[1, 2]);
    let penalty = DoublyStochastic.penalty(&alphas, &full).unwrap().unwrap();
    assert_abs_diff_eq!(penalty.item().unwrap(), 0.0, epsilon = 1e-6);

    // 只有第一步有效：每个区域 (1 - 0.5)² = 0.25，两区域求和
    let first_only = Tensor::new(&[1.0, 0.0], &[1, 2]);
    let penalty = DoublyStochastic.penalty(&alphas, &first_only).unwrap().unwrap();
    assert_abs_diff_eq!(penalty.item().unwrap(), 0.5, epsilon = 1e-6);
}

#[test]
fn test_penalty_is_averaged_over_batch() {
    let graph = Graph::new();
    let alpha = graph.input(&Tensor::new(&[1.0, 0.0, 0.5, 0.5], &[2, 2]));
    let mask = Tensor::new(&[1.0, 1.0], &[2, 1]);
    // 样本0：(0)² + (1)² = 1；样本1：0.25 + 0.25 = 0.5
    let penalty = DoublyStochastic.penalty(&[alpha], &mask).unwrap().unwrap();
    assert_abs_diff_eq!(penalty.item().unwrap(), 0.75, epsilon = 1e-6);
}

#[test]
fn test_no_regularizer_and_empty_sequence() {
    let graph = Graph::new();
    let alpha = graph.input(&Tensor::full(&[1, 2], 0.5));
    assert!(NoRegularizer.penalty(&[alpha], &Tensor::ones(&[1, 1])).unwrap().is_none());
    assert!(DoublyStochastic.penalty(&[], &Tensor::ones(&[1, 0])).unwrap().is_none());
}

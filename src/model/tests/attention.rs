use approx::assert_abs_diff_eq;

use super::{DIMS, toy_features};
use crate::model::Attention;
use crate::nn::{Graph, Module};
use crate::tensor::Tensor;

#[test]
fn test_attention_weights_are_distributions_over_regions() {
    let graph = Graph::new_with_seed(11);
    let attention = Attention::new(&graph, DIMS.feature_dim, 4, 5, "att").unwrap();
    assert_eq!(attention.parameters().len(), 4);

    let features = graph.input(&toy_features(3));
    let keys = attention.prepare(&features, DIMS.num_regions).unwrap();
    assert_eq!(keys.batch(), 3);

    let hidden = graph.input(&Tensor::new(&(0..12).map(|i| i as f32 * 0.1).collect::<Vec<_>>(), &[3, 4]));
    let (context, alpha) = attention.forward(&keys, &hidden).unwrap();
    let alpha = alpha.value().unwrap();
    assert_eq!(alpha.shape(), &[3, 4]);
    for b in 0..3 {
        assert_abs_diff_eq!(alpha.row(b).iter().sum::<f32>(), 1.0, epsilon = 1e-5);
    }
    assert_eq!(context.value().unwrap().shape(), &[3, DIMS.feature_dim]);
}

#[test]
fn test_zero_scores_give_mean_context() {
    let graph = Graph::new_with_seed(12);
    let attention = Attention::new(&graph, DIMS.feature_dim, 4, 5, "att").unwrap();
    // 打分向量为0时注意力均匀，上下文即区域特征的均值
    let score = attention.parameters()[3].clone();
    score.set_value(&Tensor::zeros(&[5, 1])).unwrap();

    let raw = toy_features(2);
    let keys = attention.prepare(&graph.input(&raw), DIMS.num_regions).unwrap();
    let (context, _) = attention.forward(&keys, &graph.zeros(&[2, 4])).unwrap();
    let expected = raw.mean_row_groups(DIMS.num_regions);
    for (a, e) in context.value().unwrap().to_vec().iter().zip(expected.to_vec()) {
        assert_abs_diff_eq!(*a, e, epsilon = 1e-5);
    }
}

#[test]
fn test_regions_must_divide_rows() {
    let graph = Graph::new_with_seed(13);
    let attention = Attention::new(&graph, DIMS.feature_dim, 4, 5, "att").unwrap();
    let features = graph.input(&Tensor::zeros(&[5, DIMS.feature_dim]));
    assert!(attention.prepare(&features, 4).is_err());
}

use crate::nn::nodes::{NodeType, SigmoidCrossEntropy, SoftmaxCrossEntropy};
use crate::nn::{GraphError, Var};

/// 损失函数扩展 trait。两种损失都接受逐样本权重和归一化系数：
/// loss = Σ_b w_b · ℓ_b / normalizer
pub trait VarLossOps {
    /// Softmax 交叉熵，`self`为 [batch, classes] 的 logits，`targets`为类别 id
    fn softmax_cross_entropy(
        &self,
        targets: &[usize],
        weights: &[f32],
        normalizer: f32,
    ) -> Result<Var, GraphError>;

    /// Sigmoid 二元交叉熵，`self`为 [batch, 1] 的 logits，`labels`取 0 或 1
    fn sigmoid_cross_entropy(
        &self,
        labels: &[f32],
        weights: &[f32],
        normalizer: f32,
    ) -> Result<Var, GraphError>;
}

impl VarLossOps for Var {
    fn softmax_cross_entropy(
        &self,
        targets: &[usize],
        weights: &[f32],
        normalizer: f32,
    ) -> Result<Var, GraphError> {
        let node = SoftmaxCrossEntropy::new(targets.to_vec(), weights.to_vec(), normalizer);
        self.derive(NodeType::from(node), &[self])
    }

    fn sigmoid_cross_entropy(
        &self,
        labels: &[f32],
        weights: &[f32],
        normalizer: f32,
    ) -> Result<Var, GraphError> {
        let node = SigmoidCrossEntropy::new(labels.to_vec(), weights.to_vec(), normalizer);
        self.derive(NodeType::from(node), &[self])
    }
}

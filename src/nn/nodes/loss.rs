/*
 * @Date         : 2026-02-04
 * @Description  : 带逐样本权重的损失节点。输出为 [1, 1]：
 *                 loss = Σ_b w_b · ℓ_b / normalizer
 *                 权重为0的样本（如填充位置）不贡献损失也不贡献梯度。
 */

use super::{ForwardCtx, TraitNode, check_parent_count};
use crate::nn::GraphError;
use crate::tensor::Tensor;

fn check_weights(
    type_name: &str,
    batch: usize,
    weights: &[f32],
    normalizer: f32,
) -> Result<(), GraphError> {
    if weights.len() != batch {
        return Err(GraphError::ShapeMismatch {
            expected: vec![batch, 1],
            got: vec![weights.len(), 1],
            message: format!("{type_name}节点的权重个数须等于批大小"),
        });
    }
    if normalizer <= 0.0 || !normalizer.is_finite() {
        return Err(GraphError::InvalidOperation(format!(
            "{type_name}节点的归一化系数须为正数，实际为{normalizer}"
        )));
    }
    Ok(())
}

/// Softmax 交叉熵（logits 输入，类别 id 目标）
///
/// ℓ_b = -log softmax(x_b)[t_b]；对 logits 的梯度为 (softmax(x_b) - onehot(t_b)) · w_b / normalizer
pub(in crate::nn) struct SoftmaxCrossEntropy {
    targets: Vec<usize>,
    weights: Vec<f32>,
    normalizer: f32,
    probs: Option<Tensor>,
}

impl SoftmaxCrossEntropy {
    pub const fn new(targets: Vec<usize>, weights: Vec<f32>, normalizer: f32) -> Self {
        Self {
            targets,
            weights,
            normalizer,
            probs: None,
        }
    }
}

impl TraitNode for SoftmaxCrossEntropy {
    fn type_name(&self) -> &'static str {
        "SoftmaxCrossEntropy"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 1)?;
        let logits = parents[0];
        if self.targets.len() != logits.rows() {
            return Err(GraphError::ShapeMismatch {
                expected: vec![logits.rows(), 1],
                got: vec![self.targets.len(), 1],
                message: "SoftmaxCrossEntropy节点的目标个数须等于批大小".to_string(),
            });
        }
        check_weights(self.type_name(), logits.rows(), &self.weights, self.normalizer)?;
        if let Some(&bad) = self.targets.iter().find(|&&t| t >= logits.cols()) {
            return Err(GraphError::InvalidOperation(format!(
                "目标类别 {bad} 超出类别数 {}",
                logits.cols()
            )));
        }

        let log_probs = logits.log_softmax_rows();
        let total: f32 = self
            .targets
            .iter()
            .zip(&self.weights)
            .enumerate()
            .filter(|(_, (_, w))| **w != 0.0)
            .map(|(b, (&t, &w))| -w * log_probs[[b, t]])
            .sum();
        self.probs = Some(log_probs.map(f32::exp));
        Ok(Tensor::scalar(total / self.normalizer))
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let probs = self.probs.as_ref().ok_or_else(|| {
            GraphError::ComputationError("SoftmaxCrossEntropy节点尚未前向计算".to_string())
        })?;
        let scale = upstream.get_data_number().unwrap_or(1.0) / self.normalizer;
        let mut grad = Tensor::zeros(parents[0].shape());
        for (b, (&t, &w)) in self.targets.iter().zip(&self.weights).enumerate() {
            if w == 0.0 {
                continue;
            }
            for c in 0..grad.cols() {
                let onehot = if c == t { 1.0 } else { 0.0 };
                grad[[b, c]] = (probs[[b, c]] - onehot) * w * scale;
            }
        }
        Ok(grad)
    }
}

/// Sigmoid 二元交叉熵（logits 输入，[B, 1]），数值稳定形式：
/// ℓ_b = max(x, 0) - x·y + ln(1 + e^(-|x|))
pub(in crate::nn) struct SigmoidCrossEntropy {
    labels: Vec<f32>,
    weights: Vec<f32>,
    normalizer: f32,
}

impl SigmoidCrossEntropy {
    pub const fn new(labels: Vec<f32>, weights: Vec<f32>, normalizer: f32) -> Self {
        Self {
            labels,
            weights,
            normalizer,
        }
    }

    /// 单个样本的损失
    pub fn elementwise(logit: f32, label: f32) -> f32 {
        logit.max(0.0) - logit * label + (-logit.abs()).exp().ln_1p()
    }
}

impl TraitNode for SigmoidCrossEntropy {
    fn type_name(&self) -> &'static str {
        "SigmoidCrossEntropy"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 1)?;
        let logits = parents[0];
        if logits.cols() != 1 || self.labels.len() != logits.rows() {
            return Err(GraphError::ShapeMismatch {
                expected: vec![self.labels.len(), 1],
                got: logits.shape().to_vec(),
                message: "SigmoidCrossEntropy节点的输入须为[批大小, 1]".to_string(),
            });
        }
        check_weights(self.type_name(), logits.rows(), &self.weights, self.normalizer)?;

        let total: f32 = (0..logits.rows())
            .map(|b| self.weights[b] * Self::elementwise(logits[[b, 0]], self.labels[b]))
            .sum();
        Ok(Tensor::scalar(total / self.normalizer))
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let scale = upstream.get_data_number().unwrap_or(1.0) / self.normalizer;
        let probs = parents[0].sigmoid();
        let mut grad = Tensor::zeros(parents[0].shape());
        for b in 0..grad.rows() {
            grad[[b, 0]] = (probs[[b, 0]] - self.labels[b]) * self.weights[b] * scale;
        }
        Ok(grad)
    }
}

//! 注意力正则项（可插拔）

use crate::nn::{GraphError, Var, VarShapeOps};
use crate::tensor::Tensor;

/// 注意力正则：由逐步的注意力权重与 token 掩码给出一个标量惩罚
pub trait AttentionRegularizer {
    /// `alphas[t]`为第 t 步的注意力权重 [batch, R]，`mask`为 [batch, steps]。
    /// 返回`None`表示不加正则
    fn penalty(&self, alphas: &[Var], mask: &Tensor) -> Result<Option<Var>, GraphError>;
}

/// 双随机注意力正则：希望每个区域在整条序列上获得的注意力总量接近1
///
/// penalty = mean_b Σ_r (1 - Σ_t m_bt α_btr)²
#[derive(Debug, Clone, Copy, Default)]
pub struct DoublyStochastic;

impl AttentionRegularizer for DoublyStochastic {
    fn penalty(&self, alphas: &[Var], mask: &Tensor) -> Result<Option<Var>, GraphError> {
        let Some(first) = alphas.first() else {
            return Ok(None);
        };
        let graph = first.get_graph();
        let batch = mask.rows();

        let mut total: Option<Var> = None;
        for (t, alpha) in alphas.iter().enumerate() {
            let step_mask = graph.input(&Tensor::new(&mask.column(t), &[batch, 1]));
            let weighted = alpha.try_mul(&step_mask)?;
            total = Some(match total {
                Some(acc) => acc.try_add(&weighted)?,
                None => weighted,
            });
        }
        let Some(total) = total else {
            return Ok(None);
        };
        let deficit = total.affine(-1.0, 1.0)?;
        let penalty = deficit.try_mul(&deficit)?.sum()?.scale(1.0 / batch.max(1) as f32)?;
        Ok(Some(penalty))
    }
}

/// 不加正则
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRegularizer;

impl AttentionRegularizer for NoRegularizer {
    fn penalty(&self, _alphas: &[Var], _mask: &Tensor) -> Result<Option<Var>, GraphError> {
        Ok(None)
    }
}

/*
 * @Date         : 2026-02-08
 * @Description  : 加性（Bahdanau）注意力
 *
 *   e_br = vᵀ tanh(W_f f_br + W_h h_b + b)
 *   α_b  = softmax_r(e_b)
 *   c_b  = Σ_r α_br f_br
 *
 * 区域特征按样本分组逐行排列为 [batch * R, F]；W_f f 在一个批次内只需计算一次（见`prepare`）。
 */

use crate::nn::{Graph, GraphError, Linear, Module, Var, VarActivationOps, VarShapeOps};

pub struct Attention {
    feature_proj: Linear,
    hidden_proj: Linear,
    score: Linear,
}

/// 一个批次内不变的注意力输入
pub struct AttentionKeys {
    /// [batch * R, F]
    features: Var,
    /// W_f f，[batch * R, units]
    keys: Var,
    batch: usize,
    regions: usize,
}

impl AttentionKeys {
    pub const fn batch(&self) -> usize {
        self.batch
    }

    pub const fn regions(&self) -> usize {
        self.regions
    }
}

impl Attention {
    pub fn new(
        graph: &Graph,
        feature_dim: usize,
        hidden_size: usize,
        units: usize,
        name: &str,
    ) -> Result<Self, GraphError> {
        Ok(Self {
            feature_proj: Linear::new(graph, feature_dim, units, false, &format!("{name}_feature"))?,
            hidden_proj: Linear::new(graph, hidden_size, units, true, &format!("{name}_hidden"))?,
            score: Linear::new(graph, units, 1, false, &format!("{name}_score"))?,
        })
    }

    pub fn prepare(&self, features: &Var, regions: usize) -> Result<AttentionKeys, GraphError> {
        let rows = features.shape()?[0];
        if regions == 0 || rows % regions != 0 {
            return Err(GraphError::InvalidOperation(format!(
                "特征行数{rows}不能按每张图{regions}个区域分组"
            )));
        }
        Ok(AttentionKeys {
            features: features.clone(),
            keys: self.feature_proj.forward(features)?,
            batch: rows / regions,
            regions,
        })
    }

    /// 返回 (上下文 [batch, F], 注意力权重 [batch, R])
    pub fn forward(&self, keys: &AttentionKeys, hidden: &Var) -> Result<(Var, Var), GraphError> {
        let query = self.hidden_proj.forward(hidden)?.repeat_rows(keys.regions)?;
        let energy = keys.keys.try_add(&query)?.tanh()?;
        let alpha = self
            .score
            .forward(&energy)?
            .reshape(keys.batch, keys.regions)?
            .softmax()?;
        let context = alpha
            .reshape(keys.batch * keys.regions, 1)?
            .try_mul(&keys.features)?
            .sum_row_groups(keys.regions)?;
        Ok((context, alpha))
    }
}

impl Module for Attention {
    fn parameters(&self) -> Vec<Var> {
        [&self.feature_proj, &self.hidden_proj, &self.score]
            .iter()
            .flat_map(|layer| layer.parameters())
            .collect()
    }
}

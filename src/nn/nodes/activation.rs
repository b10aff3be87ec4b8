use rand::Rng;

use super::{ForwardCtx, TraitNode, check_parent_count};
use crate::nn::GraphError;
use crate::tensor::Tensor;

/// Sigmoid 激活函数节点
///
/// forward: sigmoid(x) = 1 / (1 + e^(-x))
/// backward: d(sigmoid)/dx = sigmoid(x) * (1 - sigmoid(x))
pub(in crate::nn) struct Sigmoid;

impl TraitNode for Sigmoid {
    fn type_name(&self) -> &'static str {
        "Sigmoid"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 1)?;
        Ok(parents[0].sigmoid())
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&Tensor],
        value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(upstream * &(value * &(1.0 - value)))
    }
}

/// Tanh 激活函数节点，backward: 1 - tanh(x)^2
pub(in crate::nn) struct Tanh;

impl TraitNode for Tanh {
    fn type_name(&self) -> &'static str {
        "Tanh"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 1)?;
        Ok(parents[0].tanh())
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&Tensor],
        value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(upstream * &(1.0 - &value.square()))
    }
}

/// 按行 Softmax
///
/// backward: dx = y ⊙ (g - Σ_j g_j·y_j)
pub(in crate::nn) struct Softmax;

impl TraitNode for Softmax {
    fn type_name(&self) -> &'static str {
        "Softmax"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 1)?;
        Ok(parents[0].softmax_rows())
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&Tensor],
        value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let dot = (upstream * value).sum_rows();
        Ok(value * &(upstream - &dot))
    }
}

/// Dropout（inverted）：训练模式下以概率`p`置零并把保留值放大 1/(1-p)；评估模式下为恒等映射
pub(in crate::nn) struct Dropout {
    p: f32,
    mask: Option<Tensor>,
}

impl Dropout {
    pub fn new(p: f32) -> Result<Self, GraphError> {
        if !(0.0..1.0).contains(&p) {
            return Err(GraphError::InvalidOperation(format!(
                "Dropout概率须在[0, 1)内，实际为{p}"
            )));
        }
        Ok(Self { p, mask: None })
    }
}

impl TraitNode for Dropout {
    fn type_name(&self) -> &'static str {
        "Dropout"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 1)?;
        if !ctx.is_train || self.p == 0.0 {
            self.mask = None;
            return Ok(parents[0].clone());
        }
        let keep = 1.0 - self.p;
        let mut mask = Tensor::zeros(parents[0].shape());
        for r in 0..mask.rows() {
            for c in 0..mask.cols() {
                if ctx.rng.gen_bool(f64::from(keep)) {
                    mask[[r, c]] = 1.0 / keep;
                }
            }
        }
        let value = parents[0] * &mask;
        self.mask = Some(mask);
        Ok(value)
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(match &self.mask {
            Some(mask) => upstream * mask,
            None => upstream.clone(),
        })
    }
}

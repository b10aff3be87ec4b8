use super::{ForwardCtx, TraitNode, check_broadcastable, check_parent_count};
use crate::nn::GraphError;
use crate::tensor::Tensor;

/// 带广播的加法：a + b
pub(in crate::nn) struct Add;

impl TraitNode for Add {
    fn type_name(&self) -> &'static str {
        "Add"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 2)?;
        check_broadcastable(self.type_name(), parents[0], parents[1])?;
        Ok(parents[0] + parents[1])
    }

    fn calc_grad_to_parent(
        &self,
        index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(upstream.sum_to_shape(parents[index].shape()))
    }
}

/// 带广播的减法：a - b
pub(in crate::nn) struct Sub;

impl TraitNode for Sub {
    fn type_name(&self) -> &'static str {
        "Sub"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 2)?;
        check_broadcastable(self.type_name(), parents[0], parents[1])?;
        Ok(parents[0] - parents[1])
    }

    fn calc_grad_to_parent(
        &self,
        index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let grad = upstream.sum_to_shape(parents[index].shape());
        Ok(if index == 0 { grad } else { -&grad })
    }
}

/// 带广播的逐元素乘法：a ⊙ b
pub(in crate::nn) struct Multiply;

impl TraitNode for Multiply {
    fn type_name(&self) -> &'static str {
        "Multiply"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 2)?;
        check_broadcastable(self.type_name(), parents[0], parents[1])?;
        Ok(parents[0] * parents[1])
    }

    fn calc_grad_to_parent(
        &self,
        index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let other = parents[1 - index];
        Ok((upstream * other).sum_to_shape(parents[index].shape()))
    }
}

/// 仿射变换：scale * x + shift（标量系数）
pub(in crate::nn) struct Affine {
    scale: f32,
    shift: f32,
}

impl Affine {
    pub const fn new(scale: f32, shift: f32) -> Self {
        Self { scale, shift }
    }
}

impl TraitNode for Affine {
    fn type_name(&self) -> &'static str {
        "Affine"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 1)?;
        Ok(parents[0] * self.scale + self.shift)
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(upstream * self.scale)
    }
}

/// 矩阵乘法：[m, k] @ [k, n]
///
/// 反向：dA = G @ Bᵀ，dB = Aᵀ @ G
pub(in crate::nn) struct MatMul;

impl TraitNode for MatMul {
    fn type_name(&self) -> &'static str {
        "MatMul"
    }

    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        check_parent_count(self.type_name(), parents, 2)?;
        let (a, b) = (parents[0], parents[1]);
        if a.cols() != b.rows() {
            return Err(GraphError::ShapeMismatch {
                expected: vec![a.cols(), b.cols()],
                got: b.shape().to_vec(),
                message: format!(
                    "MatMul节点：左矩阵{:?}的列数须等于右矩阵的行数",
                    a.shape()
                ),
            });
        }
        Ok(a.mat_mul(b))
    }

    fn calc_grad_to_parent(
        &self,
        index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(if index == 0 {
            upstream.mat_mul(&parents[1].transpose())
        } else {
            parents[0].transpose().mat_mul(upstream)
        })
    }
}

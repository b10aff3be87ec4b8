use super::{ForwardCtx, TraitNode, no_parent_grad};
use crate::nn::GraphError;
use crate::tensor::Tensor;

/// 输入节点：值由外部设置，不需要梯度
pub(in crate::nn) struct Input;

impl TraitNode for Input {
    fn type_name(&self) -> &'static str {
        "Input"
    }

    fn calc_value_by_parents(
        &mut self,
        _parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        Err(GraphError::InvalidOperation(
            "Input节点的值只能被直接设置".to_string(),
        ))
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&Tensor],
        _value: &Tensor,
        _upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Err(no_parent_grad(self.type_name()))
    }
}

/// 参数节点：可训练，梯度在节点上累积
pub(in crate::nn) struct Parameter;

impl TraitNode for Parameter {
    fn type_name(&self) -> &'static str {
        "Parameter"
    }

    fn calc_value_by_parents(
        &mut self,
        _parents: &[&Tensor],
        _ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError> {
        Err(GraphError::InvalidOperation(
            "Parameter节点的值只能由初始化或优化器设置".to_string(),
        ))
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&Tensor],
        _value: &Tensor,
        _upstream: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Err(no_parent_grad(self.type_name()))
    }

    fn is_parameter(&self) -> bool {
        true
    }
}

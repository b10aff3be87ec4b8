/*
 * @Date         : 2026-02-04
 * @Description  : 计算图节点。节点在创建时立即由父节点的值算出自身的值（即时求值），
 *                 反向传播时各节点只需给出“上游梯度 -> 某个父节点梯度”的向量-雅可比积。
 */

mod activation;
mod arithmetic;
mod leaf;
mod loss;
mod shape;

pub(in crate::nn) use activation::{Dropout, Sigmoid, Softmax, Tanh};
pub(in crate::nn) use arithmetic::{Add, Affine, MatMul, Multiply, Sub};
pub(in crate::nn) use leaf::{Input, Parameter};
pub(in crate::nn) use loss::{SigmoidCrossEntropy, SoftmaxCrossEntropy};
pub(in crate::nn) use shape::{
    ConcatCols, EmbeddingLookup, RepeatRows, Reshape, SliceCols, SumAll, SumRowGroups, SumRows,
};

use enum_dispatch::enum_dispatch;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::GraphError;
use crate::tensor::Tensor;

/// 节点 ID。按创建顺序单调递增，因此 ID 顺序即拓扑顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 前向计算时节点可访问的图级状态
pub(in crate::nn) struct ForwardCtx<'a> {
    pub is_train: bool,
    pub rng: &'a mut StdRng,
}

#[enum_dispatch]
pub(in crate::nn) enum NodeType {
    Input(Input),
    Parameter(Parameter),
    Add(Add),
    Sub(Sub),
    Multiply(Multiply),
    Affine(Affine),
    MatMul(MatMul),
    Sigmoid(Sigmoid),
    Tanh(Tanh),
    Softmax(Softmax),
    Dropout(Dropout),
    ConcatCols(ConcatCols),
    SliceCols(SliceCols),
    SumAll(SumAll),
    SumRows(SumRows),
    RepeatRows(RepeatRows),
    SumRowGroups(SumRowGroups),
    Reshape(Reshape),
    EmbeddingLookup(EmbeddingLookup),
    SoftmaxCrossEntropy(SoftmaxCrossEntropy),
    SigmoidCrossEntropy(SigmoidCrossEntropy),
}

#[enum_dispatch(NodeType)]
pub(in crate::nn) trait TraitNode {
    /// 节点类型名（用于生成默认节点名和错误提示）
    fn type_name(&self) -> &'static str;

    /// 根据父节点的值计算本节点的值
    fn calc_value_by_parents(
        &mut self,
        parents: &[&Tensor],
        ctx: &mut ForwardCtx<'_>,
    ) -> Result<Tensor, GraphError>;

    /// 给定本节点的上游梯度`upstream`（与本节点值同形），求第`index`个父节点的梯度
    fn calc_grad_to_parent(
        &self,
        index: usize,
        parents: &[&Tensor],
        value: &Tensor,
        upstream: &Tensor,
    ) -> Result<Tensor, GraphError>;

    /// 是否为可训练参数（梯度在节点上累积，直到被清零）
    fn is_parameter(&self) -> bool {
        false
    }
}

/// 图中存放的节点：值、累积梯度、父节点及具体运算
pub(in crate::nn) struct NodeHandle {
    pub name: String,
    pub parents: Vec<NodeId>,
    pub value: Tensor,
    pub grad: Option<Tensor>,
    pub node: NodeType,
}

impl NodeHandle {
    pub fn is_parameter(&self) -> bool {
        self.node.is_parameter()
    }
}

// ==================== 节点实现共用的校验 ====================

pub(super) fn check_parent_count(
    type_name: &str,
    parents: &[&Tensor],
    expected: usize,
) -> Result<(), GraphError> {
    if parents.len() == expected {
        Ok(())
    } else {
        Err(GraphError::InvalidOperation(format!(
            "{type_name}节点需要{expected}个父节点，实际为{}个",
            parents.len()
        )))
    }
}

pub(super) fn check_same_shape(
    type_name: &str,
    expected: &Tensor,
    got: &Tensor,
) -> Result<(), GraphError> {
    if expected.shape() == got.shape() {
        Ok(())
    } else {
        Err(GraphError::ShapeMismatch {
            expected: expected.shape().to_vec(),
            got: got.shape().to_vec(),
            message: format!("{type_name}节点的输入形状不一致"),
        })
    }
}

pub(super) fn check_broadcastable(
    type_name: &str,
    a: &Tensor,
    b: &Tensor,
) -> Result<(), GraphError> {
    if a.is_broadcastable_with(b) {
        Ok(())
    } else {
        Err(GraphError::ShapeMismatch {
            expected: a.shape().to_vec(),
            got: b.shape().to_vec(),
            message: format!("{type_name}节点的两个输入无法广播"),
        })
    }
}

/// 叶子节点不参与梯度传递给父节点（它们没有父节点）
pub(super) fn no_parent_grad(type_name: &str) -> GraphError {
    GraphError::InvalidOperation(format!("{type_name}节点没有父节点，不应向父节点传递梯度"))
}

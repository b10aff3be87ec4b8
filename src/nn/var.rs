/*
 * @Date         : 2026-02-04
 * @Description  : Var：携带图引用的变量句柄，支持算子重载和链式调用
 */

use rand::rngs::StdRng;
use std::cell::RefCell;
use std::ops::{Add, Mul, Neg, Sub};
use std::rc::Rc;

use super::graph::{Graph, GraphInner};
use super::nodes::{self, NodeType};
use super::{GraphError, NodeId};
use crate::tensor::Tensor;

// ==================== Init 枚举 ====================

/// 参数初始化策略
#[derive(Debug, Clone)]
pub enum Init {
    /// 常数初始化
    Constant(f32),
    /// 全零
    Zeros,
    /// 正态分布
    Normal { mean: f32, std: f32 },
    /// 均匀分布 U(-bound, bound)
    Uniform(f32),
    /// Xavier/Glorot 初始化（适用于 Sigmoid/Tanh）
    Xavier,
}

impl Init {
    /// 生成初始化后的 Tensor（使用指定的 RNG）
    pub fn generate_with_rng(&self, shape: &[usize], rng: &mut StdRng) -> Tensor {
        match self {
            Self::Constant(v) => Tensor::full(shape, *v),
            Self::Zeros => Tensor::zeros(shape),
            Self::Normal { mean, std } => Tensor::normal_with_rng(*mean, *std, shape, rng),
            Self::Uniform(bound) => Tensor::uniform_with_rng(-bound, *bound, shape, rng),
            Self::Xavier => {
                let (fan_in, fan_out) = (shape[0], shape.get(1).copied().unwrap_or(1));
                let std = (2.0 / (fan_in + fan_out) as f32).sqrt();
                Tensor::normal_with_rng(0.0, std, shape, rng)
            }
        }
    }
}

// ==================== Var 结构 ====================

/// 智能变量句柄 - 携带图引用，支持算子重载和链式调用
///
/// ```ignore
/// let graph = Graph::new();
/// let x = graph.input(&features);
/// let h = x.matmul(&w)?.tanh()?;
/// let z = &h + &b;
/// let loss = z.softmax_cross_entropy(&targets, &weights, n)?;
/// loss.backward()?;
/// ```
#[derive(Clone)]
pub struct Var {
    id: NodeId,
    graph: Rc<RefCell<GraphInner>>,
}

impl std::fmt::Debug for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Var").field("id", &self.id).finish()
    }
}

impl Var {
    pub(crate) const fn new(id: NodeId, graph: Rc<RefCell<GraphInner>>) -> Self {
        Self { id, graph }
    }

    pub const fn node_id(&self) -> NodeId {
        self.id
    }

    pub(crate) const fn graph(&self) -> &Rc<RefCell<GraphInner>> {
        &self.graph
    }

    /// 获取 Var 所属的 Graph handle
    pub fn get_graph(&self) -> Graph {
        Graph::from_rc(Rc::clone(&self.graph))
    }

    pub fn same_graph(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.graph, &other.graph)
    }

    /// 以`node`为运算、`parents`为父节点创建新 Var（内部使用）
    pub(in crate::nn) fn derive(&self, node: NodeType, parents: &[&Self]) -> Result<Self, GraphError> {
        if let Some(other) = parents.iter().find(|p| !self.same_graph(p)) {
            return Err(GraphError::InvalidOperation(format!(
                "Var {} 与 {} 不在同一个计算图中",
                self.id, other.id
            )));
        }
        let ids: Vec<NodeId> = parents.iter().map(|p| p.id).collect();
        let id = self.graph.borrow_mut().new_op_node(node, &ids)?;
        Ok(Self::new(id, Rc::clone(&self.graph)))
    }

    // ==================== 值与梯度 ====================

    pub fn value(&self) -> Result<Tensor, GraphError> {
        Ok(self.graph.borrow().get_node_value(self.id)?.clone())
    }

    pub fn shape(&self) -> Result<Vec<usize>, GraphError> {
        Ok(self.graph.borrow().get_node_value(self.id)?.shape().to_vec())
    }

    /// 设置叶子节点的值
    pub fn set_value(&self, value: &Tensor) -> Result<(), GraphError> {
        self.graph.borrow_mut().set_node_value(self.id, value)
    }

    /// 取标量值
    pub fn item(&self) -> Result<f32, GraphError> {
        self.graph
            .borrow()
            .get_node_value(self.id)?
            .get_data_number()
            .ok_or_else(|| GraphError::InvalidOperation(format!("{}不是标量", self.id)))
    }

    pub fn grad(&self) -> Result<Option<Tensor>, GraphError> {
        Ok(self.graph.borrow().get_node_grad(self.id)?.cloned())
    }

    /// 反向传播（本节点须为标量），返回其值
    pub fn backward(&self) -> Result<f32, GraphError> {
        self.graph.borrow_mut().backward(self.id)
    }

    // ==================== 算术 ====================

    pub fn try_add(&self, other: &Self) -> Result<Self, GraphError> {
        self.derive(NodeType::from(nodes::Add), &[self, other])
    }

    pub fn try_sub(&self, other: &Self) -> Result<Self, GraphError> {
        self.derive(NodeType::from(nodes::Sub), &[self, other])
    }

    pub fn try_mul(&self, other: &Self) -> Result<Self, GraphError> {
        self.derive(NodeType::from(nodes::Multiply), &[self, other])
    }

    /// scale * x + shift
    pub fn affine(&self, scale: f32, shift: f32) -> Result<Self, GraphError> {
        self.derive(NodeType::from(nodes::Affine::new(scale, shift)), &[self])
    }

    pub fn scale(&self, factor: f32) -> Result<Self, GraphError> {
        self.affine(factor, 0.0)
    }
}

// ==================== 算子重载 ====================

impl Add for &Var {
    type Output = Var;

    fn add(self, other: &Var) -> Var {
        self.try_add(other).expect("Var 加法失败")
    }
}

impl Sub for &Var {
    type Output = Var;

    fn sub(self, other: &Var) -> Var {
        self.try_sub(other).expect("Var 减法失败")
    }
}

impl Mul for &Var {
    type Output = Var;

    fn mul(self, other: &Var) -> Var {
        self.try_mul(other).expect("Var 乘法失败")
    }
}

impl Neg for &Var {
    type Output = Var;

    fn neg(self) -> Var {
        self.scale(-1.0).expect("Var 取负失败")
    }
}

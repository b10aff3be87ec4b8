use crate::nn::nodes::{Dropout, NodeType, Sigmoid, Softmax, Tanh};
use crate::nn::{GraphError, Var};

/// 激活函数扩展 trait
///
/// ```ignore
/// let gates = x.matmul(&w)?.sigmoid()?;
/// let probs = logits.softmax()?;
/// ```
pub trait VarActivationOps {
    /// Sigmoid 激活：1 / (1 + exp(-x))
    fn sigmoid(&self) -> Result<Var, GraphError>;

    /// Tanh 激活
    fn tanh(&self) -> Result<Var, GraphError>;

    /// 按行 Softmax，输入 [batch, classes]
    fn softmax(&self) -> Result<Var, GraphError>;

    /// Dropout：仅训练模式下生效
    fn dropout(&self, p: f32) -> Result<Var, GraphError>;
}

impl VarActivationOps for Var {
    fn sigmoid(&self) -> Result<Var, GraphError> {
        self.derive(NodeType::from(Sigmoid), &[self])
    }

    fn tanh(&self) -> Result<Var, GraphError> {
        self.derive(NodeType::from(Tanh), &[self])
    }

    fn softmax(&self) -> Result<Var, GraphError> {
        self.derive(NodeType::from(Softmax), &[self])
    }

    fn dropout(&self, p: f32) -> Result<Var, GraphError> {
        self.derive(NodeType::from(Dropout::new(p)?), &[self])
    }
}

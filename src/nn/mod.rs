/*
 * @Date         : 2026-02-04
 * @Description  : 神经网络模块：即时求值的计算图、Var、层与优化器
 */

mod graph;
pub mod layer;
mod module;
mod nodes;
pub mod optimizer;
mod var;
mod var_ops;

pub use graph::{Graph, GraphError, GraphInner, StateDict};
pub use layer::{Embedding, Linear, LstmCell, LstmState};
pub use module::Module;
pub use nodes::NodeId;
pub use optimizer::{Adam, AdamState, Optimizer};
pub use var::{Init, Var};
pub use var_ops::{VarActivationOps, VarLossOps, VarMatrixOps, VarShapeOps};

#[cfg(test)]
mod tests;

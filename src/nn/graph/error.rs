/*
 * @Date         : 2026-02-04
 * @Description  : Graph 模块的错误类型
 */

use thiserror::Error;

use crate::nn::NodeId;

/// Graph 操作错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("节点{0}不存在（可能已在 no_grad_scope 或 release_transients 中被回收）")]
    NodeNotFound(NodeId),
    #[error("无效操作：{0}")]
    InvalidOperation(String),
    #[error("形状不匹配：期望{expected:?}，实际{got:?}。{message}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
        message: String,
    },
    #[error("计算错误：{0}")]
    ComputationError(String),
    #[error("参数名{0}重复")]
    DuplicateNodeName(String),
    #[error("状态字典缺少参数{0}")]
    MissingParameter(String),
}

//! 训练相关错误类型定义

use std::path::PathBuf;
use thiserror::Error;

use crate::data::DataError;
use crate::nn::GraphError;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 配置不合法（字段名 + 原因）
    #[error("配置错误: {0}")]
    Config(String),

    /// 数据流在一整轮中没有产出任何批次
    #[error("数据集为空: {0}")]
    EmptyDataset(String),

    /// 检查点读写失败：训练状态与磁盘不一致，必须停止
    #[error("检查点 {path:?} 读写失败: {reason}")]
    Checkpoint { path: PathBuf, reason: String },
}

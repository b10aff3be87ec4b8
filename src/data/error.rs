//! 数据加载错误类型定义

use std::path::PathBuf;
use thiserror::Error;

/// 数据加载相关错误
#[derive(Debug, Error)]
pub enum DataError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON 解析错误
    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    /// 图像解码错误
    #[error("图像解码失败 {path:?}: {reason}")]
    ImageError { path: PathBuf, reason: String },

    /// 下载错误
    #[error("下载错误: {0}")]
    DownloadError(String),

    /// 解压错误
    #[error("解压错误: {0}")]
    DecompressionError(String),

    /// 分词器尚未拟合
    #[error("分词器尚未拟合（请先调用 fit）")]
    NotFitted,

    /// 样本引用的图像文件不存在
    #[error("图像文件不存在: {0:?}")]
    MissingImage(PathBuf),

    /// 保存的词表不符合 <pad>, <unk>, ..., <end>, <start> 的布局
    #[error("词表无效 {path:?}: {reason}")]
    InvalidVocabulary { path: PathBuf, reason: String },

    /// 未知的数据集划分
    #[error("未知的数据集划分: {0}（可选 train/val/test）")]
    UnknownSplit(String),

    /// 缓存目录已存在且不允许覆盖
    #[error("缓存目录已存在: {0:?}（如需覆盖请开启 overwrite_cached_dataset）")]
    CacheCollision(PathBuf),

    /// 缓存分片损坏或无法读取
    #[error("缓存分片损坏 {path:?}: {reason}")]
    CorruptShard { path: PathBuf, reason: String },

    /// 样本内容与批次不一致（如图像尺寸不同）
    #[error("样本格式错误: {0}")]
    MalformedExample(String),

    /// 预取线程异常退出
    #[error("数据预取线程异常退出")]
    WorkerPanicked,
}

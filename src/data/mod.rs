//! 数据模块
//!
//! 提供 Personality-Captions 数据集的下载、分词、编码、批处理与磁盘缓存。
//!
//! # 主要组件
//!
//! - [`Tokenizer`] / [`Vocabulary`]: 描述文本 <-> token id
//! - [`StyleVocabulary`]: 风格名 <-> 类别 id
//! - [`PersonalityCaptions`]: 原始数据集（描述 JSON + 按哈希寻址的图像）
//! - [`DatasetManager`]: 产出批次流、物化缓存分片
//! - [`BatchStream`]: 有界 shuffle + 后台预取，可按 epoch 重启
//! - [`DataError`]: 数据相关错误类型
//!
//! # 使用示例
//!
//! ```ignore
//! use caption_gan::data::{DatasetManager, Split};
//!
//! let manager = DatasetManager::new(data_dir, cache_dir, settings)?;
//! let mut stream = manager.load(Split::Train, 64)?;
//! while let Some(batch) = stream.next_batch()? {
//!     // batch.images / batch.tokens / batch.mask()
//! }
//! stream.restart();
//! ```

mod batch;
pub mod cache;
pub mod download;
pub mod error;
pub mod image;
mod manager;
mod personality_captions;
mod stream;
mod styles;
mod tokenizer;

#[cfg(test)]
mod tests;

pub use batch::{Batch, Example};
pub use error::DataError;
pub use manager::{DataSettings, DatasetManager, ExampleEncoder, remove_dir_if_exists};
pub use personality_captions::{CaptionRecord, DownloadSummary, PersonalityCaptions, Split};
pub use stream::BatchStream;
pub use styles::{StyleVocabulary, UNK_STYLE};
pub use tokenizer::{
    END_TOKEN, PAD_ID, PAD_TOKEN, START_TOKEN, Tokenizer, UNK_ID, UNK_TOKEN, Vocabulary, tokenize,
};


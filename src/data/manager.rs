/*
 * @Date         : 2026-02-07
 * @Description  : DatasetManager：拟合词表、按划分产出批次流、把划分物化为磁盘分片
 */

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::batch::Example;
use super::cache::{create_cache_dir, list_shards, shard_path, write_shard};
use super::error::DataError;
use super::image::load_rgb_resized;
use super::personality_captions::{CaptionRecord, PersonalityCaptions, Split};
use super::stream::BatchStream;
use super::styles::StyleVocabulary;
use super::tokenizer::Tokenizer;

/// 数据管线的设置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSettings {
    pub vocab_size: usize,
    pub max_seq_len: usize,
    pub image_size: u32,
    pub shuffle_buffer: usize,
    pub prefetch: usize,
    pub seed: u64,
}

/// 把一条记录编码为样本：解码图像、编码描述、查风格 id
#[derive(Debug, Clone)]
pub struct ExampleEncoder {
    tokenizer: Tokenizer,
    styles: StyleVocabulary,
    image_size: u32,
    max_seq_len: usize,
}

impl ExampleEncoder {
    pub fn new(
        tokenizer: Tokenizer,
        styles: StyleVocabulary,
        image_size: u32,
        max_seq_len: usize,
    ) -> Result<Self, DataError> {
        tokenizer.vocabulary()?;
        Ok(Self {
            tokenizer,
            styles,
            image_size,
            max_seq_len,
        })
    }

    pub const fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub const fn styles(&self) -> &StyleVocabulary {
        &self.styles
    }

    /// 描述 -> token id：截断到`max_seq_len - 1`个词后追加`<end>`
    pub fn encode_caption(&self, caption: &str) -> Result<Vec<usize>, DataError> {
        let end_id = self.tokenizer.vocabulary()?.end_id();
        let mut tokens = self.tokenizer.encode(caption)?;
        tokens.truncate(self.max_seq_len.saturating_sub(1));
        tokens.push(end_id);
        Ok(tokens)
    }

    pub fn encode(&self, record: &CaptionRecord) -> Result<Example, DataError> {
        Ok(Example {
            pixels: load_rgb_resized(&record.image_path, self.image_size)?,
            image_size: self.image_size,
            style: self.styles.id(&record.style),
            tokens: self.encode_caption(&record.caption)?,
        })
    }
}

pub struct DatasetManager {
    dataset: PersonalityCaptions,
    cache_dir: PathBuf,
    encoder: ExampleEncoder,
    settings: DataSettings,
}

impl DatasetManager {
    /// 用训练集描述拟合分词器，并准备风格词表
    pub fn new(
        data_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
        settings: DataSettings,
    ) -> Result<Self, DataError> {
        let dataset = PersonalityCaptions::new(data_dir);
        let train = dataset.load(Split::Train)?;
        let mut tokenizer = Tokenizer::new(settings.vocab_size);
        tokenizer.fit(train.iter().map(|r| r.caption.as_str()));
        let styles = dataset.style_vocabulary()?;
        info!(
            "词表大小 {}，风格数 {}（训练记录 {} 条）",
            tokenizer.vocabulary()?.len(),
            styles.len(),
            train.len()
        );
        Self::with_encoder(dataset, cache_dir, tokenizer, styles, settings)
    }

    /// 使用已拟合的分词器与风格词表
    pub fn with_encoder(
        dataset: PersonalityCaptions,
        cache_dir: impl Into<PathBuf>,
        tokenizer: Tokenizer,
        styles: StyleVocabulary,
        settings: DataSettings,
    ) -> Result<Self, DataError> {
        let encoder =
            ExampleEncoder::new(tokenizer, styles, settings.image_size, settings.max_seq_len)?;
        Ok(Self {
            dataset,
            cache_dir: cache_dir.into(),
            encoder,
            settings,
        })
    }

    pub const fn encoder(&self) -> &ExampleEncoder {
        &self.encoder
    }

    pub const fn tokenizer(&self) -> &Tokenizer {
        self.encoder.tokenizer()
    }

    pub const fn styles(&self) -> &StyleVocabulary {
        self.encoder.styles()
    }

    pub const fn settings(&self) -> &DataSettings {
        &self.settings
    }

    pub fn split_cache_dir(&self, split: Split) -> PathBuf {
        self.cache_dir.join(split.name())
    }

    /// 某个划分的批次流：存在缓存分片时读缓存，否则从原始记录解码
    pub fn load(&self, split: Split, batch_size: usize) -> Result<BatchStream, DataError> {
        let cached = self.split_cache_dir(split);
        let stream = if cached.is_dir() {
            let shards = list_shards(&cached)?;
            debug!("{split} 使用缓存（{} 个分片）", shards.len());
            BatchStream::from_shards(shards, batch_size)
        } else {
            let records = self.dataset.load(split)?;
            debug!("{split} 从原始数据读取（{} 条记录）", records.len());
            BatchStream::from_records(records, self.encoder.clone(), batch_size)
        };
        Ok(stream
            .shuffle_buffer(self.settings.shuffle_buffer)
            .prefetch(self.settings.prefetch)
            .seed(self.settings.seed))
    }

    /// 把划分编码后写成分片，每片`batch_size * batches_per_shard`个样本。
    /// 缓存目录已存在时报`CacheCollision`；图像缺失或无法解码的记录被跳过。返回写入的样本数
    pub fn cache(
        &self,
        split: Split,
        batch_size: usize,
        batches_per_shard: usize,
    ) -> Result<usize, DataError> {
        let dir = self.split_cache_dir(split);
        create_cache_dir(&dir)?;
        let records = self.dataset.load(split)?;
        let shard_size = (batch_size * batches_per_shard).max(1);

        let mut written = 0;
        let mut skipped = Skipped::default();
        for (index, chunk) in records.chunks(shard_size).enumerate() {
            let (examples, chunk_skipped) = encode_chunk(&self.encoder, chunk);
            write_shard(&shard_path(&dir, index), &examples)?;
            written += examples.len();
            skipped.missing += chunk_skipped.missing;
            skipped.failed += chunk_skipped.failed;
        }
        info!(
            "{split} 已缓存 {written} 个样本到 {dir:?}，跳过 {} 条（图像缺失 {}，编码失败 {}）",
            skipped.missing + skipped.failed,
            skipped.missing,
            skipped.failed
        );
        Ok(written)
    }

    /// 删除整个缓存目录（由调用方按覆盖策略决定是否调用）
    pub fn clear_cache(&self) -> Result<(), DataError> {
        remove_dir_if_exists(&self.cache_dir)
    }
}

/// 编码时跳过的记录数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct Skipped {
    pub missing: usize,
    pub failed: usize,
}

pub(super) fn encode_chunk(
    encoder: &ExampleEncoder,
    records: &[CaptionRecord],
) -> (Vec<Example>, Skipped) {
    let encoded: Vec<_> = records.par_iter().map(|r| encoder.encode(r)).collect();
    let mut examples = Vec::with_capacity(records.len());
    let mut skipped = Skipped::default();
    for (record, result) in records.iter().zip(encoded) {
        match result {
            Ok(example) => examples.push(example),
            Err(DataError::MissingImage(path)) => {
                debug!("缓存时跳过缺失的图像 {path:?}");
                skipped.missing += 1;
            }
            Err(e) => {
                warn!("缓存时跳过无法编码的样本 {:?}: {e}", record.image_path);
                skipped.failed += 1;
            }
        }
    }
    (examples, skipped)
}

pub fn remove_dir_if_exists(dir: &Path) -> Result<(), DataError> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    Ok(())
}

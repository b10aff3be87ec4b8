/*
 * @Date         : 2026-02-07
 * @Description  : BatchStream：有界 shuffle 缓冲 + 后台预取线程的批次流
 *
 * - 数据源可以是原始记录（后台线程用 rayon 并行解码图像、编码描述）、磁盘缓存分片或内存中的样本
 * - shuffle 为近似打乱：维护容量为`shuffle_buffer`的缓冲区，满了之后随机弹出一个
 * - 后台线程通过容量为`prefetch`的同步通道把批次送给训练线程
 * - 一个 epoch 结束后`next_batch()`返回`None`；调用`restart()`开始下一个 epoch（打乱种子为 seed + epoch）
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread::JoinHandle;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, warn};

use super::batch::{Batch, Example};
use super::cache::read_shard;
use super::error::DataError;
use super::manager::ExampleEncoder;
use super::personality_captions::CaptionRecord;

/// 每次并行解码的记录数
const DECODE_CHUNK: usize = 64;

#[derive(Clone)]
enum Source {
    Records {
        records: Arc<Vec<CaptionRecord>>,
        encoder: Arc<ExampleEncoder>,
    },
    Shards(Arc<Vec<PathBuf>>),
    Examples(Arc<Vec<Example>>),
}

type Message = Result<Batch, DataError>;

pub struct BatchStream {
    source: Source,
    batch_size: usize,
    shuffle_buffer: usize,
    prefetch: usize,
    seed: u64,
    epoch: u64,
    receiver: Option<Receiver<Message>>,
    worker: Option<JoinHandle<()>>,
}

impl BatchStream {
    fn new(source: Source, batch_size: usize) -> Self {
        Self {
            source,
            batch_size: batch_size.max(1),
            shuffle_buffer: 1,
            prefetch: 2,
            seed: 0,
            epoch: 0,
            receiver: None,
            worker: None,
        }
    }

    /// 从原始记录构造：图像解码与描述编码在后台线程中完成
    pub fn from_records(
        records: Vec<CaptionRecord>,
        encoder: ExampleEncoder,
        batch_size: usize,
    ) -> Self {
        Self::new(
            Source::Records {
                records: Arc::new(records),
                encoder: Arc::new(encoder),
            },
            batch_size,
        )
    }

    /// 从磁盘缓存分片构造
    pub fn from_shards(shards: Vec<PathBuf>, batch_size: usize) -> Self {
        Self::new(Source::Shards(Arc::new(shards)), batch_size)
    }

    /// 从内存中的样本构造
    pub fn from_examples(examples: Vec<Example>, batch_size: usize) -> Self {
        Self::new(Source::Examples(Arc::new(examples)), batch_size)
    }

    /// shuffle 缓冲区容量（<=1 表示不打乱）
    #[must_use]
    pub const fn shuffle_buffer(mut self, size: usize) -> Self {
        self.shuffle_buffer = size;
        self
    }

    /// 预取深度（通道中最多缓存的批次数）
    #[must_use]
    pub const fn prefetch(mut self, depth: usize) -> Self {
        self.prefetch = depth;
        self
    }

    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 取下一个批次；本 epoch 结束时返回`Ok(None)`
    pub fn next_batch(&mut self) -> Result<Option<Batch>, DataError> {
        if self.receiver.is_none() {
            self.start();
        }
        let Some(receiver) = self.receiver.as_ref() else {
            return Ok(None);
        };
        match receiver.recv() {
            Ok(Ok(batch)) => Ok(Some(batch)),
            Ok(Err(e)) => {
                self.stop();
                Err(e)
            }
            Err(_) => {
                // 通道关闭：本 epoch 的数据已全部送出，或后台线程异常退出
                let panicked = self.worker.take().is_some_and(|w| w.join().is_err());
                if panicked {
                    return Err(DataError::WorkerPanicked);
                }
                Ok(None)
            }
        }
    }

    /// 结束当前 epoch（若未读完则丢弃剩余批次），下次`next_batch()`从新 epoch 开始
    pub fn restart(&mut self) {
        self.stop();
        self.epoch += 1;
    }

    fn start(&mut self) {
        let (sender, receiver) = sync_channel(self.prefetch.max(1));
        let source = self.source.clone();
        let batch_size = self.batch_size;
        let shuffle_buffer = self.shuffle_buffer;
        let seed = self.seed.wrapping_add(self.epoch);
        let epoch = self.epoch;

        let worker = std::thread::spawn(move || {
            debug!("批次流 epoch {epoch} 开始");
            let mut producer = Producer::new(sender, batch_size, shuffle_buffer, seed);
            if producer.run(&source).is_ok() {
                producer.finish();
            }
        });
        self.receiver = Some(receiver);
        self.worker = Some(worker);
    }

    fn stop(&mut self) {
        // 先关闭接收端，阻塞在发送上的后台线程会随之退出
        self.receiver = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for BatchStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Iterator for BatchStream {
    type Item = Result<Batch, DataError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

/// 接收端已关闭
struct Disconnected;

/// 后台线程：样本 -> shuffle 缓冲 -> 批次 -> 通道
struct Producer {
    sender: SyncSender<Message>,
    batch_size: usize,
    capacity: usize,
    rng: StdRng,
    buffer: Vec<Example>,
    pending: Vec<Example>,
}

impl Producer {
    fn new(sender: SyncSender<Message>, batch_size: usize, capacity: usize, seed: u64) -> Self {
        Self {
            sender,
            batch_size,
            capacity: capacity.max(1),
            rng: StdRng::seed_from_u64(seed),
            buffer: Vec::new(),
            pending: Vec::with_capacity(batch_size),
        }
    }

    fn run(&mut self, source: &Source) -> Result<(), Disconnected> {
        match source {
            Source::Examples(examples) => {
                for example in examples.iter() {
                    self.push(example.clone())?;
                }
            }
            Source::Shards(shards) => {
                for path in shards.iter() {
                    match read_shard(path) {
                        Ok(examples) => {
                            for example in examples {
                                self.push(example)?;
                            }
                        }
                        Err(e) => return self.send(Err(e)).and(Err(Disconnected)),
                    }
                }
            }
            Source::Records { records, encoder } => {
                for chunk in records.chunks(DECODE_CHUNK) {
                    let encoded: Vec<_> = chunk.par_iter().map(|r| encoder.encode(r)).collect();
                    for (record, result) in chunk.iter().zip(encoded) {
                        match result {
                            Ok(example) => self.push(example)?,
                            Err(DataError::MissingImage(path)) => {
                                debug!("跳过缺失的图像 {path:?}");
                            }
                            Err(e) => warn!("跳过无法编码的样本 {:?}: {e}", record.image_path),
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn push(&mut self, example: Example) -> Result<(), Disconnected> {
        self.buffer.push(example);
        if self.buffer.len() >= self.capacity {
            let i = self.rng.gen_range(0..self.buffer.len());
            let picked = self.buffer.swap_remove(i);
            self.emit(picked)?;
        }
        Ok(())
    }

    fn emit(&mut self, example: Example) -> Result<(), Disconnected> {
        self.pending.push(example);
        if self.pending.len() == self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Disconnected> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let examples = std::mem::take(&mut self.pending);
        self.send(Batch::collate(&examples))
    }

    fn send(&self, message: Message) -> Result<(), Disconnected> {
        self.sender.send(message).map_err(|_| Disconnected)
    }

    /// 清空 shuffle 缓冲并送出最后一个（可能不满的）批次
    fn finish(&mut self) {
        while !self.buffer.is_empty() {
            let i = self.rng.gen_range(0..self.buffer.len());
            let picked = self.buffer.swap_remove(i);
            if self.emit(picked).is_err() {
                return;
            }
        }
        let _ = self.flush();
    }
}

/*
 * @Date         : 2026-02-09
 * @Description  : 判别器预训练：真实描述为正样本，（冻结的）生成器在同一批图像与风格上
 *                 自由生成的描述为负样本，负样本损失乘以 neg_sample_weight
 */

use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use super::checkpoint::{Checkpoint, CheckpointStore};
use super::config::DiscriminatorPretrainConfig;
use super::error::TrainError;
use super::metrics::MetricsLogger;
use super::{DISCRIMINATOR_PRETRAIN, clipped_adam, next_cycled};
use crate::data::{Batch, BatchStream};
use crate::model::{Discriminator, FeatureExtractor, Generator};
use crate::nn::{Adam, GraphError, Module, Optimizer};
use crate::tensor::Tensor;

/// 验证批次上的判别器指标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscriminatorValidation {
    pub loss: f32,
    /// 真实描述的平均得分
    pub real_score: f32,
    /// 生成描述的平均得分
    pub fake_score: f32,
}

fn mean(values: &[f32]) -> f32 {
    values.iter().sum::<f32>() / values.len().max(1) as f32
}

pub struct DiscriminatorPretrainer {
    config: DiscriminatorPretrainConfig,
    generator: Generator,
    discriminator: Discriminator,
    optimizer: Adam,
    extractor: Box<dyn FeatureExtractor>,
    rng: StdRng,
    step: usize,
    epoch: usize,
    /// 最近一次写入检查点时的 (步数, epoch)
    saved_at: Option<(usize, usize)>,
    checkpoints: Option<CheckpointStore>,
    metrics: Option<(MetricsLogger, MetricsLogger)>,
}

impl DiscriminatorPretrainer {
    /// `generator`只用于产生负样本，不会被更新
    pub fn new(
        generator: Generator,
        discriminator: Discriminator,
        extractor: Box<dyn FeatureExtractor>,
        config: &DiscriminatorPretrainConfig,
        seed: u64,
    ) -> Result<Self, TrainError> {
        let optimizer = clipped_adam(
            discriminator.graph(),
            &discriminator.parameters(),
            config.learning_rate,
            config.grad_clipvalue,
        )?;
        Ok(Self {
            config: config.clone(),
            generator,
            discriminator,
            optimizer,
            extractor,
            rng: StdRng::seed_from_u64(seed),
            step: 0,
            epoch: 0,
            saved_at: None,
            checkpoints: None,
            metrics: None,
        })
    }

    #[must_use]
    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, log_dir: &Path) -> Self {
        self.metrics = Some((
            MetricsLogger::new(log_dir, DISCRIMINATOR_PRETRAIN, &["loss"]),
            MetricsLogger::new(
                log_dir,
                &format!("{DISCRIMINATOR_PRETRAIN}_validation"),
                &["loss", "real_score", "fake_score"],
            ),
        ));
        self
    }

    pub const fn step(&self) -> usize {
        self.step
    }

    pub const fn epoch(&self) -> usize {
        self.epoch
    }

    pub const fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }

    pub fn resume(&mut self) -> Result<bool, TrainError> {
        let Some(store) = &self.checkpoints else {
            return Ok(false);
        };
        let Some(checkpoint) = store.latest(DISCRIMINATOR_PRETRAIN)? else {
            return Ok(false);
        };
        self.discriminator
            .graph()
            .load_state_dict(&checkpoint.params)?;
        self.optimizer.load_state(&checkpoint.optimizer);
        self.step = checkpoint.step;
        self.epoch = checkpoint.epoch;
        self.saved_at = Some((self.step, self.epoch));
        info!("判别器预训练从第{}步（epoch {}）恢复", self.step, self.epoch);
        Ok(true)
    }

    pub fn save_checkpoint(&mut self) -> Result<(), TrainError> {
        let Some(store) = &self.checkpoints else {
            return Ok(());
        };
        if self.saved_at == Some((self.step, self.epoch)) {
            return Ok(());
        }
        let path = store.save(
            DISCRIMINATOR_PRETRAIN,
            &Checkpoint {
                step: self.step,
                epoch: self.epoch,
                params: self.discriminator.graph().state_dict(),
                optimizer: self.optimizer.state(),
            },
        )?;
        info!("第{}步：检查点已写入 {path:?}", self.step);
        self.saved_at = Some((self.step, self.epoch));
        Ok(())
    }

    /// 用生成器为`batch`的每个 (图像, 风格) 生成一条负样本
    fn negatives(&mut self, features: &Tensor, batch: &Batch) -> Result<Batch, GraphError> {
        let z = self.generator.sample_noise(batch.len(), &mut self.rng);
        let max_len = self.generator.dims().max_seq_len;
        let fake = self
            .generator
            .generate(features, &batch.styles, &z, max_len, &mut self.rng)?;
        Ok(batch.with_tokens(fake))
    }

    /// 正负样本上的一次更新；畸形批次跳过并返回`None`
    pub fn train_step(&mut self, batch: &Batch) -> Result<Option<f32>, TrainError> {
        if batch.is_malformed() {
            warn!("第{}步：跳过畸形批次（空批次或含空序列）", self.step);
            return Ok(None);
        }
        let features = self.extractor.extract(&batch.images);
        let fake = self.negatives(&features, batch)?;
        let loss =
            self.discriminator
                .loss(&features, batch, &fake, self.config.neg_sample_weight)?;
        let value = self.optimizer.minimize(&loss)?;
        self.discriminator.graph().release_transients();
        self.step += 1;
        Ok(Some(value))
    }

    pub fn validate(&mut self, batch: &Batch) -> Result<Option<DiscriminatorValidation>, TrainError> {
        if batch.is_malformed() {
            return Ok(None);
        }
        let features = self.extractor.extract(&batch.images);
        let fake = self.negatives(&features, batch)?;
        let discriminator = &self.discriminator;
        let weight = self.config.neg_sample_weight;
        let loss = discriminator
            .graph()
            .no_grad_scope(|_| -> Result<f32, GraphError> {
                discriminator.loss(&features, batch, &fake, weight)?.item()
            })?;
        Ok(Some(DiscriminatorValidation {
            loss,
            real_score: mean(&discriminator.score(&features, batch)?),
            fake_score: mean(&discriminator.score(&features, &fake)?),
        }))
    }

    pub fn train(
        &mut self,
        train: &mut BatchStream,
        validation: &mut BatchStream,
    ) -> Result<(), TrainError> {
        info!(
            "判别器预训练：{} 个 epoch，参数量 {}",
            self.config.epochs,
            self.discriminator.num_params()
        );
        while self.epoch < self.config.epochs {
            while let Some(batch) = train.next_batch()? {
                let Some(loss) = self.train_step(&batch)? else {
                    continue;
                };
                if self.step % self.config.logging_steps == 0 {
                    info!(
                        "[判别器预训练] epoch {} 第{}步 loss = {loss:.4}",
                        self.epoch, self.step
                    );
                    if let Some((logger, _)) = &self.metrics {
                        logger.log(self.step, &[loss]);
                    }
                }
                if self.step % self.config.validate_steps == 0 {
                    self.run_validation(validation)?;
                }
                if self.step % self.config.checkpoint_steps == 0 {
                    self.save_checkpoint()?;
                }
            }
            train.restart();
            self.epoch += 1;
        }
        self.save_checkpoint()
    }

    fn run_validation(&mut self, validation: &mut BatchStream) -> Result<(), TrainError> {
        let Some(batch) = next_cycled(validation)? else {
            warn!("验证集为空，跳过验证");
            return Ok(());
        };
        if let Some(v) = self.validate(&batch)? {
            info!(
                "[判别器预训练] 第{}步 验证 loss = {:.4} 真实得分 = {:.3} 生成得分 = {:.3}",
                self.step, v.loss, v.real_score, v.fake_score
            );
            if let Some((_, logger)) = &self.metrics {
                logger.log(self.step, &[v.loss, v.real_score, v.fake_score]);
            }
        }
        Ok(())
    }
}

/*
 * @Date         : 2026-02-09
 * @Description  : 生成器预训练：计划采样下的逐 token 交叉熵 + λ·注意力正则
 *
 * 每个批次：提取图像特征 -> 采样 z -> 按当前步数的计划采样概率展开 -> 损失 -> Adam（梯度截断）。
 * 按步数周期记录日志、在验证集的一个批次上求损失（真值输入，不更新参数）、写检查点。
 */

use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use super::checkpoint::{Checkpoint, CheckpointStore};
use super::config::GeneratorPretrainConfig;
use super::error::TrainError;
use super::metrics::MetricsLogger;
use super::schedule::SamplingSchedule;
use super::{GENERATOR_PRETRAIN, clipped_adam, next_cycled};
use crate::data::{Batch, BatchStream};
use crate::model::{AttentionRegularizer, DoublyStochastic, FeatureExtractor, Generator};
use crate::nn::{Adam, GraphError, Module, Optimizer};

pub struct GeneratorPretrainer {
    config: GeneratorPretrainConfig,
    generator: Generator,
    optimizer: Adam,
    extractor: Box<dyn FeatureExtractor>,
    regularizer: Box<dyn AttentionRegularizer>,
    schedule: SamplingSchedule,
    rng: StdRng,
    step: usize,
    epoch: usize,
    /// 最近一次写入（或恢复自）的检查点步数
    /// 最近一次写入检查点时的 (步数, epoch)
    saved_at: Option<(usize, usize)>,
    checkpoints: Option<CheckpointStore>,
    metrics: Option<(MetricsLogger, MetricsLogger)>,
}

impl GeneratorPretrainer {
    pub fn new(
        generator: Generator,
        extractor: Box<dyn FeatureExtractor>,
        config: &GeneratorPretrainConfig,
        seed: u64,
    ) -> Result<Self, TrainError> {
        let optimizer = clipped_adam(
            generator.graph(),
            &generator.parameters(),
            config.learning_rate,
            config.grad_clipvalue,
        )?;
        Ok(Self {
            config: config.clone(),
            generator,
            optimizer,
            extractor,
            regularizer: Box::new(DoublyStochastic),
            schedule: config.schedule(),
            rng: StdRng::seed_from_u64(seed),
            step: 0,
            epoch: 0,
            saved_at: None,
            checkpoints: None,
            metrics: None,
        })
    }

    #[must_use]
    pub fn with_schedule(mut self, schedule: SamplingSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    #[must_use]
    pub fn with_regularizer(mut self, regularizer: Box<dyn AttentionRegularizer>) -> Self {
        self.regularizer = regularizer;
        self
    }

    #[must_use]
    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// 写`{log_dir}/generator_pretrain.csv`与`generator_pretrain_validation.csv`
    #[must_use]
    pub fn with_metrics(mut self, log_dir: &Path) -> Self {
        self.metrics = Some((
            MetricsLogger::new(log_dir, GENERATOR_PRETRAIN, &["loss", "sampling_rate"]),
            MetricsLogger::new(
                log_dir,
                &format!("{GENERATOR_PRETRAIN}_validation"),
                &["loss"],
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

    pub const fn generator(&self) -> &Generator {
        &self.generator
    }

    /// 从最新检查点恢复参数、优化器状态与步数；没有检查点时返回`false`
    pub fn resume(&mut self) -> Result<bool, TrainError> {
        let Some(store) = &self.checkpoints else {
            return Ok(false);
        };
        let Some(checkpoint) = store.latest(GENERATOR_PRETRAIN)? else {
            return Ok(false);
        };
        self.generator.graph().load_state_dict(&checkpoint.params)?;
        self.optimizer.load_state(&checkpoint.optimizer);
        self.step = checkpoint.step;
        self.epoch = checkpoint.epoch;
        self.saved_at = Some((self.step, self.epoch));
        info!("生成器预训练从第{}步（epoch {}）恢复", self.step, self.epoch);
        Ok(true)
    }

    /// 同一 (步数, epoch) 只写一次；epoch 结束时同一步以新的 epoch 覆盖
    pub fn save_checkpoint(&mut self) -> Result<(), TrainError> {
        let Some(store) = &self.checkpoints else {
            return Ok(());
        };
        if self.saved_at == Some((self.step, self.epoch)) {
            return Ok(());
        }
        let path = store.save(
            GENERATOR_PRETRAIN,
            &Checkpoint {
                step: self.step,
                epoch: self.epoch,
                params: self.generator.graph().state_dict(),
                optimizer: self.optimizer.state(),
            },
        )?;
        info!("第{}步：检查点已写入 {path:?}", self.step);
        self.saved_at = Some((self.step, self.epoch));
        Ok(())
    }

    /// 一次参数更新，返回更新前的损失；畸形批次跳过并返回`None`
    pub fn train_step(&mut self, batch: &Batch) -> Result<Option<f32>, TrainError> {
        if batch.is_malformed() {
            warn!("第{}步：跳过畸形批次（空批次或含空序列）", self.step);
            return Ok(None);
        }
        let features = self.extractor.extract(&batch.images);
        let z = self.generator.sample_noise(batch.len(), &mut self.rng);
        let rate = self.schedule.rate(self.step);

        let output = self
            .generator
            .teacher_forced(&features, batch, &z, rate, &mut self.rng)?;
        let loss = self.generator.sequence_loss(
            &output,
            batch,
            self.regularizer.as_ref(),
            self.config.dsa_lambda,
        )?;
        let value = self.optimizer.minimize(&loss)?;
        self.generator.graph().release_transients();
        self.step += 1;
        Ok(Some(value))
    }

    /// 真值输入下的损失，不更新参数
    pub fn validate(&mut self, batch: &Batch) -> Result<Option<f32>, TrainError> {
        if batch.is_malformed() {
            return Ok(None);
        }
        let features = self.extractor.extract(&batch.images);
        let z = self.generator.sample_noise(batch.len(), &mut self.rng);
        let generator = &self.generator;
        let regularizer = self.regularizer.as_ref();
        let lambda = self.config.dsa_lambda;
        let rng = &mut self.rng;
        let loss = generator
            .graph()
            .no_grad_scope(|_| -> Result<f32, GraphError> {
                let output = generator.teacher_forced(&features, batch, &z, 1.0, rng)?;
                generator.sequence_loss(&output, batch, regularizer, lambda)?.item()
            })?;
        Ok(Some(loss))
    }

    /// 训练到配置的 epoch 数；每个 epoch 结束后重启训练流
    pub fn train(
        &mut self,
        train: &mut BatchStream,
        validation: &mut BatchStream,
    ) -> Result<(), TrainError> {
        info!(
            "生成器预训练：{} 个 epoch，参数量 {}",
            self.config.epochs,
            self.generator.num_params()
        );
        while self.epoch < self.config.epochs {
            while let Some(batch) = train.next_batch()? {
                let Some(loss) = self.train_step(&batch)? else {
                    continue;
                };
                if self.step % self.config.logging_steps == 0 {
                    let rate = self.schedule.rate(self.step);
                    info!(
                        "[生成器预训练] epoch {} 第{}步 loss = {loss:.4} 采样率 = {rate:.4}",
                        self.epoch, self.step
                    );
                    if let Some((logger, _)) = &self.metrics {
                        logger.log(self.step, &[loss, rate]);
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
        if let Some(loss) = self.validate(&batch)? {
            info!("[生成器预训练] 第{}步 验证 loss = {loss:.4}", self.step);
            if let Some((_, logger)) = &self.metrics {
                logger.log(self.step, &[loss]);
            }
        }
        Ok(())
    }
}

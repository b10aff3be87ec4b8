/*
 * @Date         : 2026-02-10
 * @Description  : 对抗训练：判别器步与生成器步交替的状态机
 *
 * 每一轮：
 *   DiscriminatorStep(0..d_steps) -> GeneratorStep(0..g_steps) -> RoundComplete
 * - 判别器步：真实批次 + 在线生成器在同一批图像/风格上自由生成的等量描述，加权 BCE
 * - 生成器步：自由生成 -> 蒙特卡洛 rollout 估计逐 token 奖励 -> 策略梯度损失
 * - 一轮结束后按周期刷新 rollout 策略、验证、写检查点
 *
 * 判别器与生成器各有独立的计算图与优化器，二者之间只传递得分（f32）。
 */

use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use super::checkpoint::{Checkpoint, CheckpointStore, load_latest_params};
use super::config::AdversarialConfig;
use super::error::TrainError;
use super::metrics::MetricsLogger;
use super::reward::MonteCarloReward;
use super::rollout::RolloutPolicy;
use super::{
    ADVERSARIAL_DISCRIMINATOR, ADVERSARIAL_GENERATOR, ADVERSARIAL_ROLLOUT,
    DISCRIMINATOR_PRETRAIN, GENERATOR_PRETRAIN, clipped_adam, next_cycled,
};
use crate::data::{Batch, BatchStream};
use crate::model::{
    AttentionRegularizer, Discriminator, DoublyStochastic, FeatureExtractor, Generator,
};
use crate::nn::{Adam, AdamState, GraphError, Module, Optimizer};
use crate::tensor::Tensor;

/// 一轮之内的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// 本轮第 i 次判别器更新
    DiscriminatorStep(usize),
    /// 本轮第 i 次生成器更新
    GeneratorStep(usize),
    RoundComplete,
}

impl Phase {
    pub const fn start(d_steps: usize, g_steps: usize) -> Self {
        if d_steps > 0 {
            Self::DiscriminatorStep(0)
        } else if g_steps > 0 {
            Self::GeneratorStep(0)
        } else {
            Self::RoundComplete
        }
    }

    pub const fn next(self, d_steps: usize, g_steps: usize) -> Self {
        match self {
            Self::DiscriminatorStep(i) if i + 1 < d_steps => Self::DiscriminatorStep(i + 1),
            Self::DiscriminatorStep(_) if g_steps > 0 => Self::GeneratorStep(0),
            Self::GeneratorStep(i) if i + 1 < g_steps => Self::GeneratorStep(i + 1),
            _ => Self::RoundComplete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorStepStats {
    pub loss: f32,
    /// 有效 token 上的平均奖励
    pub mean_reward: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundSummary {
    pub round: usize,
    pub discriminator_losses: Vec<f32>,
    pub generator_steps: Vec<GeneratorStepStats>,
    pub rollout_refreshed: bool,
}

impl RoundSummary {
    fn mean_d_loss(&self) -> Option<f32> {
        mean(&self.discriminator_losses)
    }

    fn mean_g_loss(&self) -> Option<f32> {
        mean(&self.generator_steps.iter().map(|s| s.loss).collect::<Vec<_>>())
    }

    fn mean_reward(&self) -> Option<f32> {
        mean(&self.generator_steps.iter().map(|s| s.mean_reward).collect::<Vec<_>>())
    }
}

fn mean(values: &[f32]) -> Option<f32> {
    (!values.is_empty()).then(|| values.iter().sum::<f32>() / values.len() as f32)
}

struct AdversarialMetrics {
    discriminator: MetricsLogger,
    generator: MetricsLogger,
    validation: MetricsLogger,
}

pub struct AdversarialTrainer {
    config: AdversarialConfig,
    generator: Generator,
    discriminator: Discriminator,
    rollout: RolloutPolicy,
    reward: MonteCarloReward,
    g_optimizer: Adam,
    d_optimizer: Adam,
    extractor: Box<dyn FeatureExtractor>,
    regularizer: Box<dyn AttentionRegularizer>,
    rng: StdRng,
    round: usize,
    phase: Phase,
    d_updates: usize,
    g_updates: usize,
    saved_round: Option<usize>,
    checkpoints: Option<CheckpointStore>,
    metrics: Option<AdversarialMetrics>,
}

impl AdversarialTrainer {
    pub fn new(
        generator: Generator,
        discriminator: Discriminator,
        extractor: Box<dyn FeatureExtractor>,
        config: &AdversarialConfig,
        seed: u64,
    ) -> Result<Self, TrainError> {
        let g_optimizer = clipped_adam(
            generator.graph(),
            &generator.parameters(),
            config.generator_learning_rate,
            config.generator_grad_clipvalue,
        )?;
        let d_optimizer = clipped_adam(
            discriminator.graph(),
            &discriminator.parameters(),
            config.discriminator_learning_rate,
            config.discriminator_grad_clipvalue,
        )?;
        let rollout = RolloutPolicy::new(
            &generator,
            config.rollout_update_rate,
            config.rollout_update_rounds,
        )?;
        Ok(Self {
            config: config.clone(),
            generator,
            discriminator,
            rollout,
            reward: MonteCarloReward::new(config.rollout_n, config.reward_gamma),
            g_optimizer,
            d_optimizer,
            extractor,
            regularizer: Box::new(DoublyStochastic),
            rng: StdRng::seed_from_u64(seed),
            round: 0,
            phase: Phase::start(config.d_steps, config.g_steps),
            d_updates: 0,
            g_updates: 0,
            saved_round: None,
            checkpoints: None,
            metrics: None,
        })
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

    #[must_use]
    pub fn with_metrics(mut self, log_dir: &Path) -> Self {
        self.metrics = Some(AdversarialMetrics {
            discriminator: MetricsLogger::new(log_dir, ADVERSARIAL_DISCRIMINATOR, &["loss"]),
            generator: MetricsLogger::new(
                log_dir,
                ADVERSARIAL_GENERATOR,
                &["loss", "mean_reward"],
            ),
            validation: MetricsLogger::new(
                log_dir,
                "adversarial_validation",
                &["generator_loss", "discriminator_loss", "real_score", "fake_score"],
            ),
        });
        self
    }

    pub const fn round(&self) -> usize {
        self.round
    }

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    pub const fn generator(&self) -> &Generator {
        &self.generator
    }

    pub const fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }

    pub const fn rollout(&self) -> &RolloutPolicy {
        &self.rollout
    }

    /// 优先从对抗训练检查点恢复；没有时用两个预训练阶段的最新参数初始化。
    /// 返回恢复到的轮数（从预训练初始化或从头开始时为`None`）
    pub fn resume(&mut self) -> Result<Option<usize>, TrainError> {
        let Some(store) = &self.checkpoints else {
            return Ok(None);
        };

        if let Some(g) = store.latest(ADVERSARIAL_GENERATOR)? {
            self.generator.graph().load_state_dict(&g.params)?;
            self.g_optimizer.load_state(&g.optimizer);
            if let Some(d) = store.latest(ADVERSARIAL_DISCRIMINATOR)? {
                self.discriminator.graph().load_state_dict(&d.params)?;
                self.d_optimizer.load_state(&d.optimizer);
            }
            match store.latest(ADVERSARIAL_ROLLOUT)? {
                Some(r) => self.rollout.load_state_dict(&r.params)?,
                None => self
                    .rollout
                    .load_state_dict(&self.generator.graph().state_dict())?,
            }
            self.round = g.step;
            self.saved_round = Some(g.step);
            info!("对抗训练从第{}轮恢复", self.round);
            return Ok(Some(self.round));
        }

        match load_latest_params(store, GENERATOR_PRETRAIN, self.generator.graph())? {
            Some(step) => info!("生成器以预训练第{step}步的参数初始化"),
            None => warn!("没有生成器预训练检查点，生成器从随机参数开始对抗训练"),
        }
        match load_latest_params(store, DISCRIMINATOR_PRETRAIN, self.discriminator.graph())? {
            Some(step) => info!("判别器以预训练第{step}步的参数初始化"),
            None => warn!("没有判别器预训练检查点，判别器从随机参数开始对抗训练"),
        }
        self.rollout
            .load_state_dict(&self.generator.graph().state_dict())?;
        Ok(None)
    }

    pub fn save_checkpoint(&mut self) -> Result<(), TrainError> {
        let Some(store) = &self.checkpoints else {
            return Ok(());
        };
        if self.saved_round == Some(self.round) {
            return Ok(());
        }
        let snapshot = |params, optimizer| Checkpoint {
            step: self.round,
            epoch: 0,
            params,
            optimizer,
        };
        store.save(
            ADVERSARIAL_GENERATOR,
            &snapshot(self.generator.graph().state_dict(), self.g_optimizer.state()),
        )?;
        store.save(
            ADVERSARIAL_DISCRIMINATOR,
            &snapshot(
                self.discriminator.graph().state_dict(),
                self.d_optimizer.state(),
            ),
        )?;
        store.save(
            ADVERSARIAL_ROLLOUT,
            &snapshot(self.rollout.state_dict(), AdamState::default()),
        )?;
        info!("第{}轮：检查点已写入 {:?}", self.round, store.dir());
        self.saved_round = Some(self.round);
        Ok(())
    }

    /// 在线生成器为批次中每个 (图像, 风格) 自由生成一条描述
    fn sample_fakes(&mut self, features: &Tensor, batch: &Batch) -> Result<(Batch, Tensor), GraphError> {
        let z = self.generator.sample_noise(batch.len(), &mut self.rng);
        let max_len = self.generator.dims().max_seq_len;
        let fake = self
            .generator
            .generate(features, &batch.styles, &z, max_len, &mut self.rng)?;
        Ok((batch.with_tokens(fake), z))
    }

    /// 一次判别器更新；畸形批次跳过并返回`None`
    pub fn discriminator_step(&mut self, batch: &Batch) -> Result<Option<f32>, TrainError> {
        if batch.is_malformed() {
            warn!("第{}轮：判别器步跳过畸形批次", self.round);
            return Ok(None);
        }
        let features = self.extractor.extract(&batch.images);
        let (fake, _) = self.sample_fakes(&features, batch)?;
        let loss = self.discriminator.loss(
            &features,
            batch,
            &fake,
            self.config.discriminator_neg_sample_weight,
        )?;
        let value = self.d_optimizer.minimize(&loss)?;
        self.discriminator.graph().release_transients();
        self.d_updates += 1;
        if self.d_updates % self.config.discriminator_logging_steps == 0 {
            info!("[对抗-判别器] 第{}次更新 loss = {value:.4}", self.d_updates);
            if let Some(metrics) = &self.metrics {
                metrics.discriminator.log(self.d_updates, &[value]);
            }
        }
        Ok(Some(value))
    }

    /// 一次生成器策略梯度更新；畸形批次跳过并返回`None`
    pub fn generator_step(&mut self, batch: &Batch) -> Result<Option<GeneratorStepStats>, TrainError> {
        if batch.is_malformed() {
            warn!("第{}轮：生成器步跳过畸形批次", self.round);
            return Ok(None);
        }
        let features = self.extractor.extract(&batch.images);
        let (generated, z) = self.sample_fakes(&features, batch)?;
        if generated.is_malformed() {
            warn!("第{}轮：生成结果含空序列，跳过本次生成器更新", self.round);
            return Ok(None);
        }
        let rewards = self.reward.rewards(
            &self.rollout,
            &self.discriminator,
            &features,
            &generated,
            &z,
            &mut self.rng,
        )?;
        let loss = self.generator.policy_loss(
            &features,
            &generated,
            &z,
            &rewards,
            self.regularizer.as_ref(),
            self.config.generator_dsa_lambda,
        )?;
        let value = self.g_optimizer.minimize(&loss)?;
        self.generator.graph().release_transients();
        self.g_updates += 1;

        let stats = GeneratorStepStats {
            loss: value,
            mean_reward: rewards.to_vec().iter().sum::<f32>()
                / generated.num_tokens().max(1) as f32,
        };
        if self.g_updates % self.config.generator_logging_steps == 0 {
            info!(
                "[对抗-生成器] 第{}次更新 loss = {:.4} 平均奖励 = {:.4}",
                self.g_updates, stats.loss, stats.mean_reward
            );
            if let Some(metrics) = &self.metrics {
                metrics
                    .generator
                    .log(self.g_updates, &[stats.loss, stats.mean_reward]);
            }
        }
        Ok(Some(stats))
    }

    /// 跑完一整轮状态机：d_steps 次判别器步、g_steps 次生成器步，然后按周期刷新 rollout 策略
    pub fn run_round(
        &mut self,
        d_batches: &mut BatchStream,
        g_batches: &mut BatchStream,
    ) -> Result<RoundSummary, TrainError> {
        let (d_steps, g_steps) = (self.config.d_steps, self.config.g_steps);
        let mut summary = RoundSummary::default();
        let mut fetched = 0;

        self.phase = Phase::start(d_steps, g_steps);
        while self.phase != Phase::RoundComplete {
            match self.phase {
                Phase::DiscriminatorStep(_) => {
                    if let Some(batch) = next_cycled(d_batches)? {
                        fetched += 1;
                        if let Some(loss) = self.discriminator_step(&batch)? {
                            summary.discriminator_losses.push(loss);
                        }
                    }
                }
                Phase::GeneratorStep(_) => {
                    if let Some(batch) = next_cycled(g_batches)? {
                        fetched += 1;
                        if let Some(stats) = self.generator_step(&batch)? {
                            summary.generator_steps.push(stats);
                        }
                    }
                }
                Phase::RoundComplete => {}
            }
            self.phase = self.phase.next(d_steps, g_steps);
        }
        if fetched == 0 && d_steps + g_steps > 0 {
            return Err(TrainError::EmptyDataset(
                "对抗训练的一整轮中没有取到任何批次".to_string(),
            ));
        }

        self.round += 1;
        summary.round = self.round;
        summary.rollout_refreshed = self.rollout.maybe_refresh(&self.generator, self.round)?;
        Ok(summary)
    }

    /// 验证批次上的 (生成器真值输入损失, 判别器损失, 真实平均得分, 生成平均得分)
    pub fn validate(&mut self, batch: &Batch) -> Result<Option<[f32; 4]>, TrainError> {
        if batch.is_malformed() {
            return Ok(None);
        }
        let features = self.extractor.extract(&batch.images);
        let (fake, z) = self.sample_fakes(&features, batch)?;

        let generator = &self.generator;
        let regularizer = self.regularizer.as_ref();
        let lambda = self.config.generator_dsa_lambda;
        let rng = &mut self.rng;
        let g_loss = generator
            .graph()
            .no_grad_scope(|_| -> Result<f32, GraphError> {
                let output = generator.teacher_forced(&features, batch, &z, 1.0, rng)?;
                generator.sequence_loss(&output, batch, regularizer, lambda)?.item()
            })?;

        let discriminator = &self.discriminator;
        let weight = self.config.discriminator_neg_sample_weight;
        let d_loss = discriminator
            .graph()
            .no_grad_scope(|_| -> Result<f32, GraphError> {
                discriminator.loss(&features, batch, &fake, weight)?.item()
            })?;
        let real = discriminator.score(&features, batch)?;
        let fake_scores = discriminator.score(&features, &fake)?;
        let avg = |v: &[f32]| v.iter().sum::<f32>() / v.len().max(1) as f32;
        Ok(Some([g_loss, d_loss, avg(&real), avg(&fake_scores)]))
    }

    /// 训练到配置的轮数
    pub fn train(
        &mut self,
        d_batches: &mut BatchStream,
        g_batches: &mut BatchStream,
        validation: &mut BatchStream,
    ) -> Result<(), TrainError> {
        info!(
            "对抗训练：{} 轮，每轮 {} 次判别器步 + {} 次生成器步，rollout_n = {}",
            self.config.rounds,
            self.config.d_steps,
            self.config.g_steps,
            self.reward.rollout_n()
        );
        while self.round < self.config.rounds {
            let summary = self.run_round(d_batches, g_batches)?;
            info!(
                "[对抗训练] 第{}轮 D loss = {:?} G loss = {:?} 平均奖励 = {:?}{}",
                summary.round,
                summary.mean_d_loss(),
                summary.mean_g_loss(),
                summary.mean_reward(),
                if summary.rollout_refreshed { "（已刷新 rollout 策略）" } else { "" }
            );
            if self.round % self.config.validate_rounds == 0 {
                self.run_validation(validation)?;
            }
            if self.round % self.config.checkpoint_rounds == 0 {
                self.save_checkpoint()?;
            }
        }
        self.save_checkpoint()
    }

    fn run_validation(&mut self, validation: &mut BatchStream) -> Result<(), TrainError> {
        let Some(batch) = next_cycled(validation)? else {
            warn!("验证集为空，跳过验证");
            return Ok(());
        };
        if let Some(values) = self.validate(&batch)? {
            let [g_loss, d_loss, real, fake] = values;
            info!(
                "[对抗训练] 第{}轮 验证 G loss = {g_loss:.4} D loss = {d_loss:.4} 真实得分 = {real:.3} 生成得分 = {fake:.3}",
                self.round
            );
            if let Some(metrics) = &self.metrics {
                metrics.validation.log(self.round, &values);
            }
        }
        Ok(())
    }
}

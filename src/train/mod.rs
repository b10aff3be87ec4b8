//! 训练模块
//!
//! 三个阶段依次为：生成器预训练、判别器预训练、对抗训练。
//!
//! # 主要组件
//!
//! - [`Config`]: 不可变的运行配置（JSON，可只给出部分字段）
//! - [`GeneratorPretrainer`]: 计划采样 + 交叉熵（+ 注意力正则）
//! - [`DiscriminatorPretrainer`]: 真实描述 vs 生成器产出的负样本
//! - [`AdversarialTrainer`]: 判别器步 / 生成器步交替的状态机，生成器以策略梯度更新
//! - [`RolloutPolicy`] / [`MonteCarloReward`]: 蒙特卡洛补全与逐 token 奖励
//! - [`CheckpointStore`] / [`MetricsLogger`]: 检查点与 CSV 指标
//! - [`pipeline::run`]: 按配置执行下载、缓存与各训练阶段

mod adversarial;
pub mod checkpoint;
mod config;
mod error;
pub mod logging;
mod metrics;
pub mod pipeline;
mod pretrain_discriminator;
mod pretrain_generator;
mod reward;
mod rollout;
mod schedule;

#[cfg(test)]
mod tests;

pub use adversarial::{AdversarialTrainer, GeneratorStepStats, Phase, RoundSummary};
pub use checkpoint::{Checkpoint, CheckpointStore, load_latest_params};
pub use config::{AdversarialConfig, Config, DiscriminatorPretrainConfig, GeneratorPretrainConfig};
pub use error::TrainError;
pub use metrics::MetricsLogger;
pub use pretrain_discriminator::{DiscriminatorPretrainer, DiscriminatorValidation};
pub use pretrain_generator::GeneratorPretrainer;
pub use reward::MonteCarloReward;
pub use rollout::RolloutPolicy;
pub use schedule::SamplingSchedule;

use crate::data::{Batch, BatchStream, DataError};
use crate::nn::{Adam, Graph, GraphError, Var};

/// 检查点中的网络名
pub const GENERATOR_PRETRAIN: &str = "generator_pretrain";
pub const DISCRIMINATOR_PRETRAIN: &str = "discriminator_pretrain";
pub const ADVERSARIAL_GENERATOR: &str = "adversarial_generator";
pub const ADVERSARIAL_DISCRIMINATOR: &str = "adversarial_discriminator";
pub const ADVERSARIAL_ROLLOUT: &str = "adversarial_rollout";

fn clipped_adam(graph: &Graph, params: &[Var], lr: f32, clip: f32) -> Result<Adam, GraphError> {
    Ok(Adam::new(graph, params, lr)?.with_clip_value(clip))
}

/// 取下一个批次；本 epoch 已读完时自动开始下一个 epoch。数据集为空时返回`None`
fn next_cycled(stream: &mut BatchStream) -> Result<Option<Batch>, DataError> {
    if let Some(batch) = stream.next_batch()? {
        return Ok(Some(batch));
    }
    stream.restart();
    stream.next_batch()
}

/*
 * @Date         : 2026-02-09
 * @Description  : 运行配置：路径、阶段开关、网络结构与各阶段超参数
 *
 * 全部字段都有默认值（`#[serde(default)]`），JSON 中只需给出要改动的字段。
 * 配置在构造后不可变，以引用传给各个训练器；`from_json_file`总会先做校验。
 */

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::TrainError;
use super::schedule::SamplingSchedule;
use crate::data::DataSettings;
use crate::model::{
    DiscriminatorHyper, FeatureExtractor, GeneratorHyper, ModelDims, PatchPoolExtractor,
};

/// 生成器预训练（计划采样 + 交叉熵）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorPretrainConfig {
    pub scheduled_sampling_initial_rate: f32,
    pub scheduled_sampling_k: f32,
    pub learning_rate: f32,
    pub grad_clipvalue: f32,
    pub dsa_lambda: f32,
    pub batch_size: usize,
    pub epochs: usize,
    pub logging_steps: usize,
    pub validate_steps: usize,
    pub checkpoint_steps: usize,
}

impl Default for GeneratorPretrainConfig {
    fn default() -> Self {
        Self {
            scheduled_sampling_initial_rate: 1.0,
            scheduled_sampling_k: 3500.0,
            learning_rate: 1e-4,
            grad_clipvalue: 5.0,
            dsa_lambda: 0.9,
            batch_size: 64,
            epochs: 20,
            logging_steps: 1,
            validate_steps: 1000,
            checkpoint_steps: 50,
        }
    }
}

impl GeneratorPretrainConfig {
    pub const fn schedule(&self) -> SamplingSchedule {
        SamplingSchedule::InverseSigmoid {
            initial_rate: self.scheduled_sampling_initial_rate,
            k: self.scheduled_sampling_k,
        }
    }
}

/// 判别器预训练（真实描述 vs 生成器产出的负样本）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscriminatorPretrainConfig {
    pub learning_rate: f32,
    pub grad_clipvalue: f32,
    pub batch_size: usize,
    pub neg_sample_weight: f32,
    pub epochs: usize,
    pub logging_steps: usize,
    pub validate_steps: usize,
    pub checkpoint_steps: usize,
}

impl Default for DiscriminatorPretrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-4,
            grad_clipvalue: 5.0,
            batch_size: 64,
            neg_sample_weight: 0.5,
            epochs: 10,
            logging_steps: 1,
            validate_steps: 1000,
            checkpoint_steps: 50,
        }
    }
}

/// 对抗训练
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdversarialConfig {
    pub generator_learning_rate: f32,
    pub generator_grad_clipvalue: f32,
    pub generator_logging_steps: usize,
    pub generator_batch_size: usize,
    pub generator_dsa_lambda: f32,
    pub discriminator_learning_rate: f32,
    pub discriminator_grad_clipvalue: f32,
    pub discriminator_logging_steps: usize,
    pub discriminator_batch_size: usize,
    pub discriminator_neg_sample_weight: f32,
    pub rounds: usize,
    pub validate_rounds: usize,
    pub checkpoint_rounds: usize,
    pub g_steps: usize,
    pub d_steps: usize,
    /// 每个前缀的蒙特卡洛补全次数
    pub rollout_n: usize,
    /// θ_r ← (1 - rate)·θ_r + rate·θ_g
    pub rollout_update_rate: f32,
    /// 每隔多少轮刷新一次 rollout 策略
    pub rollout_update_rounds: usize,
    /// 奖励折扣：第 t 个 token 的奖励乘以 γ^(len - 1 - t)
    pub reward_gamma: f32,
}

impl Default for AdversarialConfig {
    fn default() -> Self {
        Self {
            generator_learning_rate: 1e-4,
            generator_grad_clipvalue: 5.0,
            generator_logging_steps: 1,
            generator_batch_size: 64,
            generator_dsa_lambda: 0.9,
            discriminator_learning_rate: 1e-4,
            discriminator_grad_clipvalue: 5.0,
            discriminator_logging_steps: 1,
            discriminator_batch_size: 22,
            discriminator_neg_sample_weight: 0.5,
            rounds: 10000,
            validate_rounds: 50,
            checkpoint_rounds: 5,
            g_steps: 1,
            d_steps: 3,
            rollout_n: 10,
            rollout_update_rate: 1.0,
            rollout_update_rounds: 1,
            reward_gamma: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run_id: String,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub results_dir: PathBuf,
    pub overwrite_run_results: bool,
    pub overwrite_cached_dataset: bool,

    pub run_download_dataset: bool,
    pub run_cache_dataset: bool,
    pub run_generator_pretraining: bool,
    pub run_discriminator_pretraining: bool,
    pub run_adversarial_training: bool,

    pub seed: u64,
    /// 描述的最大 token 数（含`<end>`）
    pub max_seq_len: usize,
    /// 词表上限（含4个特殊符号）
    pub vocab_size: usize,
    /// 图像缩放后的边长
    pub image_size: u32,
    /// 图像划分为 feature_grid × feature_grid 个区域
    pub feature_grid: usize,
    pub shuffle_buffer: usize,
    pub prefetch: usize,
    pub cache_batch_size: usize,
    pub cache_batches_per_shard: usize,

    pub generator: GeneratorHyper,
    pub discriminator: DiscriminatorHyper,
    pub generator_pretrain: GeneratorPretrainConfig,
    pub discriminator_pretrain: DiscriminatorPretrainConfig,
    pub adversarial: AdversarialConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_id: "run_1".to_string(),
            data_dir: PathBuf::from("data").join("personality_captions"),
            cache_dir: PathBuf::from("cache").join("personality_captions"),
            results_dir: PathBuf::from("results"),
            overwrite_run_results: false,
            overwrite_cached_dataset: false,
            run_download_dataset: false,
            run_cache_dataset: false,
            run_generator_pretraining: false,
            run_discriminator_pretraining: false,
            run_adversarial_training: false,
            seed: 42,
            max_seq_len: 20,
            vocab_size: 10_000,
            image_size: 299,
            feature_grid: 8,
            shuffle_buffer: 1000,
            prefetch: 2,
            cache_batch_size: 32,
            cache_batches_per_shard: 80,
            generator: GeneratorHyper::default(),
            discriminator: DiscriminatorHyper::default(),
            generator_pretrain: GeneratorPretrainConfig::default(),
            discriminator_pretrain: DiscriminatorPretrainConfig::default(),
            adversarial: AdversarialConfig::default(),
        }
    }
}

fn positive(name: &str, value: usize) -> Result<(), TrainError> {
    if value == 0 {
        return Err(TrainError::Config(format!("{name}须大于0")));
    }
    Ok(())
}

fn positive_f32(name: &str, value: f32) -> Result<(), TrainError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(TrainError::Config(format!("{name}须为正数，实际为{value}")));
    }
    Ok(())
}

fn in_unit_interval(name: &str, value: f32) -> Result<(), TrainError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(TrainError::Config(format!("{name}须在[0, 1]内，实际为{value}")));
    }
    Ok(())
}

fn non_negative(name: &str, value: f32) -> Result<(), TrainError> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(TrainError::Config(format!("{name}须为非负数，实际为{value}")));
    }
    Ok(())
}

impl Config {
    /// 读取 JSON 配置并校验
    pub fn from_json_file(path: &Path) -> Result<Self, TrainError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| TrainError::Config(format!("无法解析{path:?}: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, TrainError> {
        serde_json::to_string_pretty(self).map_err(|e| TrainError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), TrainError> {
        if self.run_id.trim().is_empty() {
            return Err(TrainError::Config("run_id不能为空".to_string()));
        }
        // <pad>、<unk>、<end>、<start> 之外至少还要有一个普通词
        if self.vocab_size < 5 {
            return Err(TrainError::Config(format!(
                "vocab_size须至少为5，实际为{}",
                self.vocab_size
            )));
        }
        positive("max_seq_len", self.max_seq_len)?;
        positive("image_size", self.image_size as usize)?;
        positive("feature_grid", self.feature_grid)?;
        positive("cache_batch_size", self.cache_batch_size)?;
        positive("cache_batches_per_shard", self.cache_batches_per_shard)?;

        let g = &self.generator;
        positive("generator.embedding_units", g.embedding_units)?;
        positive("generator.attention_units", g.attention_units)?;
        positive("generator.lstm_units", g.lstm_units)?;
        positive("generator.z_units", g.z_units)?;
        if !(0.0..1.0).contains(&g.dropout) {
            return Err(TrainError::Config(format!(
                "generator.dropout须在[0, 1)内，实际为{}",
                g.dropout
            )));
        }
        positive("discriminator.embedding_units", self.discriminator.embedding_units)?;
        positive("discriminator.lstm_units", self.discriminator.lstm_units)?;

        let gp = &self.generator_pretrain;
        in_unit_interval(
            "generator_pretrain.scheduled_sampling_initial_rate",
            gp.scheduled_sampling_initial_rate,
        )?;
        positive_f32("generator_pretrain.scheduled_sampling_k", gp.scheduled_sampling_k)?;
        positive_f32("generator_pretrain.learning_rate", gp.learning_rate)?;
        positive_f32("generator_pretrain.grad_clipvalue", gp.grad_clipvalue)?;
        non_negative("generator_pretrain.dsa_lambda", gp.dsa_lambda)?;
        positive("generator_pretrain.batch_size", gp.batch_size)?;
        positive("generator_pretrain.logging_steps", gp.logging_steps)?;
        positive("generator_pretrain.validate_steps", gp.validate_steps)?;
        positive("generator_pretrain.checkpoint_steps", gp.checkpoint_steps)?;

        let dp = &self.discriminator_pretrain;
        positive_f32("discriminator_pretrain.learning_rate", dp.learning_rate)?;
        positive_f32("discriminator_pretrain.grad_clipvalue", dp.grad_clipvalue)?;
        positive("discriminator_pretrain.batch_size", dp.batch_size)?;
        non_negative("discriminator_pretrain.neg_sample_weight", dp.neg_sample_weight)?;
        positive("discriminator_pretrain.logging_steps", dp.logging_steps)?;
        positive("discriminator_pretrain.validate_steps", dp.validate_steps)?;
        positive("discriminator_pretrain.checkpoint_steps", dp.checkpoint_steps)?;

        let a = &self.adversarial;
        positive_f32("adversarial.generator_learning_rate", a.generator_learning_rate)?;
        positive_f32("adversarial.generator_grad_clipvalue", a.generator_grad_clipvalue)?;
        positive("adversarial.generator_logging_steps", a.generator_logging_steps)?;
        positive("adversarial.generator_batch_size", a.generator_batch_size)?;
        non_negative("adversarial.generator_dsa_lambda", a.generator_dsa_lambda)?;
        positive_f32("adversarial.discriminator_learning_rate", a.discriminator_learning_rate)?;
        positive_f32(
            "adversarial.discriminator_grad_clipvalue",
            a.discriminator_grad_clipvalue,
        )?;
        positive("adversarial.discriminator_logging_steps", a.discriminator_logging_steps)?;
        positive("adversarial.discriminator_batch_size", a.discriminator_batch_size)?;
        non_negative(
            "adversarial.discriminator_neg_sample_weight",
            a.discriminator_neg_sample_weight,
        )?;
        positive("adversarial.validate_rounds", a.validate_rounds)?;
        positive("adversarial.checkpoint_rounds", a.checkpoint_rounds)?;
        positive("adversarial.g_steps", a.g_steps)?;
        positive("adversarial.d_steps", a.d_steps)?;
        positive("adversarial.rollout_n", a.rollout_n)?;
        positive("adversarial.rollout_update_rounds", a.rollout_update_rounds)?;
        in_unit_interval("adversarial.rollout_update_rate", a.rollout_update_rate)?;
        if !(a.reward_gamma > 0.0 && a.reward_gamma <= 1.0) {
            return Err(TrainError::Config(format!(
                "adversarial.reward_gamma须在(0, 1]内，实际为{}",
                a.reward_gamma
            )));
        }
        Ok(())
    }

    /// `{results_dir}/{run_id}`
    pub fn run_dir(&self) -> PathBuf {
        self.results_dir.join(&self.run_id)
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.run_dir().join("checkpoints")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.run_dir().join("logs")
    }

    /// 拟合好的词表的保存位置
    pub fn vocabulary_path(&self) -> PathBuf {
        self.run_dir().join("vocabulary.json")
    }

    pub const fn any_training(&self) -> bool {
        self.run_generator_pretraining
            || self.run_discriminator_pretraining
            || self.run_adversarial_training
    }

    pub fn data_settings(&self) -> DataSettings {
        DataSettings {
            vocab_size: self.vocab_size,
            max_seq_len: self.max_seq_len,
            image_size: self.image_size,
            shuffle_buffer: self.shuffle_buffer,
            prefetch: self.prefetch,
            seed: self.seed,
        }
    }

    pub fn feature_extractor(&self) -> PatchPoolExtractor {
        PatchPoolExtractor::new(self.feature_grid)
    }

    /// 由拟合后的词表大小与风格数得到模型维度
    pub fn model_dims(&self, vocab_size: usize, num_styles: usize) -> ModelDims {
        let extractor = self.feature_extractor();
        ModelDims {
            vocab_size,
            num_styles,
            feature_dim: extractor.feature_dim(),
            num_regions: extractor.num_regions(),
            max_seq_len: self.max_seq_len,
        }
    }
}

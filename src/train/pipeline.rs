/*
 * @Date         : 2026-02-10
 * @Description  : 按配置依次执行：下载 -> 缓存 -> 生成器预训练 -> 判别器预训练 -> 对抗训练
 *
 * - `overwrite_run_results`：在第一个训练阶段开始前删除整个运行目录
 * - `overwrite_cached_dataset`：缓存前删除缓存目录；否则缓存目录已存在即报错
 * - 词表写入`{run_dir}/vocabulary.json`；之后的运行直接读取，保证续训时 token id 不变
 */

use tracing::{info, warn};

use super::checkpoint::{CheckpointStore, load_latest_params};
use super::config::Config;
use super::error::TrainError;
use super::logging::init_logging;
use super::{AdversarialTrainer, DiscriminatorPretrainer, GENERATOR_PRETRAIN, GeneratorPretrainer};
use crate::data::{
    DataError, DatasetManager, PersonalityCaptions, Split, Tokenizer, remove_dir_if_exists,
};
use crate::model::{Discriminator, Generator, ModelDims};
use crate::nn::Graph;

pub fn run(config: &Config) -> Result<(), TrainError> {
    config.validate()?;
    if config.overwrite_run_results && config.any_training() {
        remove_dir_if_exists(&config.run_dir())?;
    }
    init_logging(&config.log_dir())?;
    info!("运行配置：\n{}", config.to_json_pretty()?);

    let dataset = PersonalityCaptions::new(&config.data_dir);
    if config.run_download_dataset {
        info!("***** 下载数据集 *****");
        let summary = dataset.download()?;
        info!(
            "图像下载完成：新下载 {}，已存在 {}，失败 {}",
            summary.downloaded, summary.already_present, summary.failed
        );
    }
    if !(config.run_cache_dataset || config.any_training()) {
        return Ok(());
    }

    let manager = dataset_manager(config, dataset)?;
    if config.run_cache_dataset {
        info!("***** 缓存数据集 *****");
        cache_dataset(config, &manager)?;
    }

    let dims = config.model_dims(manager.tokenizer().vocabulary()?.len(), manager.styles().len());
    let store = CheckpointStore::new(config.checkpoints_dir());
    if config.run_generator_pretraining {
        info!("***** 生成器预训练 *****");
        pretrain_generator(config, &manager, dims, &store)?;
    }
    if config.run_discriminator_pretraining {
        info!("***** 判别器预训练 *****");
        pretrain_discriminator(config, &manager, dims, &store)?;
    }
    if config.run_adversarial_training {
        info!("***** 对抗训练 *****");
        train_adversarially(config, &manager, dims, &store)?;
    }
    Ok(())
}

/// 运行目录中已有词表时直接使用，否则在训练集上拟合并保存
fn dataset_manager(
    config: &Config,
    dataset: PersonalityCaptions,
) -> Result<DatasetManager, TrainError> {
    let path = config.vocabulary_path();
    let manager = if path.exists() {
        let tokenizer = Tokenizer::load(&path)?;
        info!("使用已保存的词表 {path:?}");
        let styles = dataset.style_vocabulary()?;
        DatasetManager::with_encoder(
            dataset,
            &config.cache_dir,
            tokenizer,
            styles,
            config.data_settings(),
        )?
    } else {
        let manager = DatasetManager::new(
            dataset.data_dir(),
            &config.cache_dir,
            config.data_settings(),
        )?;
        manager.tokenizer().save(&path)?;
        info!("词表已保存到 {path:?}");
        manager
    };
    Ok(manager)
}

fn cache_dataset(config: &Config, manager: &DatasetManager) -> Result<(), TrainError> {
    if config.overwrite_cached_dataset {
        manager.clear_cache()?;
    }
    if config.cache_dir.exists() {
        return Err(DataError::CacheCollision(config.cache_dir.clone()).into());
    }
    std::fs::create_dir_all(&config.cache_dir)?;
    for split in [Split::Val, Split::Test, Split::Train] {
        let written = manager.cache(split, config.cache_batch_size, config.cache_batches_per_shard)?;
        if written == 0 {
            warn!("{split} 没有可缓存的样本");
        }
    }
    Ok(())
}

fn pretrain_generator(
    config: &Config,
    manager: &DatasetManager,
    dims: ModelDims,
    store: &CheckpointStore,
) -> Result<(), TrainError> {
    let phase = &config.generator_pretrain;
    let graph = Graph::new_with_seed(config.seed);
    let generator = Generator::new(&graph, dims, config.generator)?;
    let mut trainer = GeneratorPretrainer::new(
        generator,
        Box::new(config.feature_extractor()),
        phase,
        config.seed,
    )?
    .with_checkpoints(store.clone())
    .with_metrics(&config.log_dir());
    trainer.resume()?;

    let mut train = manager.load(Split::Train, phase.batch_size)?;
    let mut validation = manager.load(Split::Val, phase.batch_size)?;
    trainer.train(&mut train, &mut validation)
}

/// 以生成器预训练的最新参数构造生成器
fn pretrained_generator(
    config: &Config,
    dims: ModelDims,
    store: &CheckpointStore,
) -> Result<Generator, TrainError> {
    let graph = Graph::new_with_seed(config.seed);
    let generator = Generator::new(&graph, dims, config.generator)?;
    match load_latest_params(store, GENERATOR_PRETRAIN, &graph)? {
        Some(step) => info!("生成器载入预训练第{step}步的参数"),
        None => warn!("没有生成器预训练检查点，使用随机初始化的生成器"),
    }
    Ok(generator)
}

fn pretrain_discriminator(
    config: &Config,
    manager: &DatasetManager,
    dims: ModelDims,
    store: &CheckpointStore,
) -> Result<(), TrainError> {
    let phase = &config.discriminator_pretrain;
    let generator = pretrained_generator(config, dims, store)?;
    let graph = Graph::new_with_seed(config.seed.wrapping_add(1));
    let discriminator = Discriminator::new(&graph, dims, config.discriminator)?;
    let mut trainer = DiscriminatorPretrainer::new(
        generator,
        discriminator,
        Box::new(config.feature_extractor()),
        phase,
        config.seed,
    )?
    .with_checkpoints(store.clone())
    .with_metrics(&config.log_dir());
    trainer.resume()?;

    let mut train = manager.load(Split::Train, phase.batch_size)?;
    let mut validation = manager.load(Split::Val, phase.batch_size)?;
    trainer.train(&mut train, &mut validation)
}

fn train_adversarially(
    config: &Config,
    manager: &DatasetManager,
    dims: ModelDims,
    store: &CheckpointStore,
) -> Result<(), TrainError> {
    let phase = &config.adversarial;
    let generator = Generator::new(&Graph::new_with_seed(config.seed), dims, config.generator)?;
    let discriminator = Discriminator::new(
        &Graph::new_with_seed(config.seed.wrapping_add(1)),
        dims,
        config.discriminator,
    )?;
    let mut trainer = AdversarialTrainer::new(
        generator,
        discriminator,
        Box::new(config.feature_extractor()),
        phase,
        config.seed,
    )?
    .with_checkpoints(store.clone())
    .with_metrics(&config.log_dir());
    trainer.resume()?;

    let mut d_batches = manager.load(Split::Train, phase.discriminator_batch_size)?;
    // 与判别器的批次流错开打乱顺序
    let mut g_batches = manager
        .load(Split::Train, phase.generator_batch_size)?
        .seed(config.seed.wrapping_add(1));
    let mut validation = manager.load(Split::Val, phase.generator_batch_size)?;
    trainer.train(&mut d_batches, &mut g_batches, &mut validation)
}

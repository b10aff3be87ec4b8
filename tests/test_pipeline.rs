/*
 * @Date         : 2026-02-12
 * @Description  : 端到端集成测试：迷你数据集上依次跑缓存、两个预训练阶段与对抗训练，
 *                 验证相同种子下结果可复现，以及各阶段的产物落盘
 */

use std::path::Path;

use caption_gan::data::{Split, Tokenizer};
use caption_gan::model::{DiscriminatorHyper, GeneratorHyper};
use caption_gan::train::{
    ADVERSARIAL_GENERATOR, AdversarialConfig, CheckpointStore, Config,
    DiscriminatorPretrainConfig, GENERATOR_PRETRAIN, GeneratorPretrainConfig, TrainError,
    pipeline,
};

/// 词表只含 {a, b}（加上特殊符号共 6 个），两种风格，4 张纯色图
fn write_dataset(dir: &Path) {
    let train = serde_json::json!([
        {"personality": "Happy", "comment": "a b", "image_hash": "img0"},
        {"personality": "Gloomy", "comment": "b a", "image_hash": "img1"},
        {"personality": "Happy", "comment": "a", "image_hash": "img2"},
        {"personality": "Gloomy", "comment": "b b a", "image_hash": "img3"}
    ]);
    let val = serde_json::json!([
        {"personality": "Happy", "comment": "a b", "image_hash": "img1"},
        {"personality": "Gloomy", "comment": "b", "image_hash": "img2"}
    ]);
    let test = serde_json::json!([
        {"personality": "Happy", "comment": "b a", "image_hash": "img3"}
    ]);
    for (split, content) in [(Split::Train, train), (Split::Val, val), (Split::Test, test)] {
        std::fs::write(dir.join(split.file_name()), content.to_string()).unwrap();
    }
    std::fs::write(dir.join("personalities.txt"), "Happy\nGloomy\n").unwrap();

    let images = dir.join("images");
    std::fs::create_dir_all(&images).unwrap();
    for (i, color) in [[250u8, 20, 20], [20, 250, 20], [20, 20, 250], [128, 128, 128]]
        .into_iter()
        .enumerate()
    {
        image::RgbImage::from_fn(8, 8, |x, y| {
            image::Rgb([color[0], color[1].wrapping_add((x * 9) as u8), color[2].wrapping_add((y * 5) as u8)])
        })
        .save(images.join(format!("img{i}.jpg")))
        .unwrap();
    }
}

fn tiny_config(root: &Path, data_dir: &Path) -> Config {
    Config {
        run_id: "tiny".to_string(),
        data_dir: data_dir.to_path_buf(),
        cache_dir: root.join("cache"),
        results_dir: root.join("results"),
        run_cache_dataset: true,
        run_generator_pretraining: true,
        run_discriminator_pretraining: true,
        run_adversarial_training: true,
        seed: 7,
        max_seq_len: 5,
        vocab_size: 6,
        image_size: 4,
        feature_grid: 2,
        shuffle_buffer: 4,
        cache_batch_size: 2,
        cache_batches_per_shard: 1,
        generator: GeneratorHyper {
            embedding_units: 6,
            attention_units: 5,
            lstm_units: 8,
            z_units: 3,
            dropout: 0.0,
        },
        discriminator: DiscriminatorHyper {
            embedding_units: 5,
            lstm_units: 6,
        },
        generator_pretrain: GeneratorPretrainConfig {
            batch_size: 2,
            epochs: 2,
            validate_steps: 2,
            checkpoint_steps: 2,
            ..GeneratorPretrainConfig::default()
        },
        discriminator_pretrain: DiscriminatorPretrainConfig {
            batch_size: 2,
            epochs: 1,
            ..DiscriminatorPretrainConfig::default()
        },
        adversarial: AdversarialConfig {
            generator_batch_size: 2,
            discriminator_batch_size: 2,
            rounds: 2,
            validate_rounds: 1,
            checkpoint_rounds: 1,
            d_steps: 1,
            g_steps: 1,
            rollout_n: 2,
            ..AdversarialConfig::default()
        },
        ..Config::default()
    }
}

#[test]
fn test_full_run_is_reproducible() {
    let data = tempfile::tempdir().unwrap();
    write_dataset(data.path());

    let mut finals = Vec::new();
    for _ in 0..2 {
        let root = tempfile::tempdir().unwrap();
        let config = tiny_config(root.path(), data.path());
        pipeline::run(&config).unwrap();

        let vocabulary = Tokenizer::load(&config.vocabulary_path()).unwrap();
        assert_eq!(vocabulary.vocabulary().unwrap().len(), 6);
        for split in ["train", "val", "test"] {
            assert!(config.cache_dir.join(split).is_dir(), "{split} 未缓存");
        }
        for csv in [
            "generator_pretrain.csv",
            "discriminator_pretrain.csv",
            "adversarial_generator.csv",
            "adversarial_validation.csv",
        ] {
            assert!(config.log_dir().join(csv).exists(), "缺少 {csv}");
        }

        let store = CheckpointStore::new(config.checkpoints_dir());
        // 4 个训练样本、批大小 2、2 个 epoch，每 2 步一个检查点
        assert_eq!(store.steps(GENERATOR_PRETRAIN).unwrap(), [2, 4]);
        assert_eq!(store.steps(ADVERSARIAL_GENERATOR).unwrap(), [1, 2]);
        finals.push(store.latest(ADVERSARIAL_GENERATOR).unwrap().unwrap());
    }
    assert_eq!(finals[0].params, finals[1].params);
    assert_eq!(finals[0].optimizer, finals[1].optimizer);
}

#[test]
fn test_existing_cache_is_a_collision() {
    let data = tempfile::tempdir().unwrap();
    write_dataset(data.path());
    let root = tempfile::tempdir().unwrap();
    let config = Config {
        run_generator_pretraining: false,
        run_discriminator_pretraining: false,
        run_adversarial_training: false,
        ..tiny_config(root.path(), data.path())
    };
    std::fs::create_dir_all(&config.cache_dir).unwrap();

    let result = pipeline::run(&config);
    assert!(
        matches!(result, Err(TrainError::Data(_))),
        "预期缓存冲突，实际得到 {result:?}"
    );

    let overwrite = Config {
        overwrite_cached_dataset: true,
        ..config
    };
    pipeline::run(&overwrite).unwrap();
    assert!(overwrite.cache_dir.join("train").is_dir());
}

#[test]
fn test_invalid_config_is_rejected_before_any_work() {
    let root = tempfile::tempdir().unwrap();
    let config = Config {
        vocab_size: 3,
        ..tiny_config(root.path(), root.path())
    };
    let result = pipeline::run(&config);
    assert!(matches!(result, Err(TrainError::Config(_))));
    assert!(!config.run_dir().exists());
}

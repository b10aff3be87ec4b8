mod attention;
mod features;
mod generator;
mod regularizer;

use crate::data::{Batch, Example};
use crate::model::{DiscriminatorHyper, GeneratorHyper, ModelDims};
use crate::tensor::Tensor;

/// 词表 {<pad>=0, <unk>=1, a=2, b=3, <end>=4, <start>=5}，3 种风格，每图 4 个区域
pub(super) const DIMS: ModelDims = ModelDims {
    vocab_size: 6,
    num_styles: 3,
    feature_dim: 6,
    num_regions: 4,
    max_seq_len: 5,
};

pub(super) const GEN_HYPER: GeneratorHyper = GeneratorHyper {
    embedding_units: 8,
    attention_units: 6,
    lstm_units: 10,
    z_units: 3,
    dropout: 0.0,
};

pub(super) const DISC_HYPER: DiscriminatorHyper = DiscriminatorHyper {
    embedding_units: 5,
    lstm_units: 7,
};

/// 每条序列对应的区域特征（确定性的伪随机值）
pub(super) fn toy_features(batch: usize) -> Tensor {
    let rows = batch * DIMS.num_regions;
    let data: Vec<f32> = (0..rows * DIMS.feature_dim)
        .map(|i| ((i * 7 % 11) as f32 / 11.0) - 0.5)
        .collect();
    Tensor::new(&data, &[rows, DIMS.feature_dim])
}

pub(super) fn toy_batch(sequences: &[&[usize]], styles: &[usize]) -> Batch {
    let examples: Vec<Example> = sequences
        .iter()
        .zip(styles)
        .map(|(tokens, &style)| Example {
            pixels: vec![0; 3],
            image_size: 1,
            style,
            tokens: tokens.to_vec(),
        })
        .collect();
    Batch::collate(&examples).unwrap()
}

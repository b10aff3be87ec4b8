mod adversarial;
mod config;
mod pretrain;

use crate::data::{Batch, BatchStream, Example};
use crate::model::{
    Discriminator, DiscriminatorHyper, FeatureExtractor, Generator, GeneratorHyper, ModelDims,
    PatchPoolExtractor,
};
use crate::nn::Graph;

/// 词表 {<pad>=0, <unk>=1, a=2, b=3, <end>=4, <start>=5}，3 种风格，2×2 网格的区域特征
pub(super) const DIMS: ModelDims = ModelDims {
    vocab_size: 6,
    num_styles: 3,
    feature_dim: 6,
    num_regions: 4,
    max_seq_len: 5,
};

pub(super) const GEN_HYPER: GeneratorHyper = GeneratorHyper {
    embedding_units: 6,
    attention_units: 5,
    lstm_units: 8,
    z_units: 3,
    dropout: 0.0,
};

pub(super) const DISC_HYPER: DiscriminatorHyper = DiscriminatorHyper {
    embedding_units: 5,
    lstm_units: 6,
};

pub(super) fn extractor() -> Box<dyn FeatureExtractor> {
    Box::new(PatchPoolExtractor::new(2))
}

pub(super) fn generator(seed: u64) -> Generator {
    Generator::new(&Graph::new_with_seed(seed), DIMS, GEN_HYPER).unwrap()
}

pub(super) fn discriminator(seed: u64) -> Discriminator {
    Discriminator::new(&Graph::new_with_seed(seed), DIMS, DISC_HYPER).unwrap()
}

/// 2×2 的图像，像素由`seed`决定
pub(super) fn example(seed: u8, style: usize, tokens: &[usize]) -> Example {
    Example {
        pixels: (0..12u8).map(|i| i.wrapping_mul(17).wrapping_add(seed.wrapping_mul(41))).collect(),
        image_size: 2,
        style,
        tokens: tokens.to_vec(),
    }
}

pub(super) fn toy_batch(sequences: &[&[usize]]) -> Batch {
    let examples: Vec<Example> = sequences
        .iter()
        .enumerate()
        .map(|(i, tokens)| example(i as u8, i % DIMS.num_styles, tokens))
        .collect();
    Batch::collate(&examples).unwrap()
}

pub(super) fn toy_stream(batch_size: usize) -> BatchStream {
    let examples = vec![
        example(1, 0, &[2, 3, 4]),
        example(2, 1, &[3, 4]),
        example(3, 2, &[2, 2, 3, 4]),
        example(4, 0, &[3, 3, 4]),
    ];
    BatchStream::from_examples(examples, batch_size)
}

/*
 * @Date         : 2026-02-08
 * @Description  : 模型：图像特征、注意力、生成器、判别器、注意力正则
 *
 * 生成器与判别器各自持有独立的计算图（Graph），二者之间只通过标量奖励交流，
 * 判别器的计算图中不存在通往生成器参数的路径。
 */

mod attention;
mod discriminator;
mod features;
mod generator;
mod regularizer;

#[cfg(test)]
mod tests;

pub use attention::{Attention, AttentionKeys};
pub use discriminator::{Discriminator, DiscriminatorHyper};
pub use features::{FeatureExtractor, PatchPoolExtractor};
pub use generator::{Generator, GeneratorHyper, TeacherForcedOutput};
pub use regularizer::{AttentionRegularizer, DoublyStochastic, NoRegularizer};

use serde::{Deserialize, Serialize};

use crate::data::PAD_ID;

/// 两个网络共享的数据相关维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDims {
    /// 词表大小（含`<pad>`、`<unk>`、`<end>`、`<start>`，后两者位于末尾）
    pub vocab_size: usize,
    pub num_styles: usize,
    /// 每个图像区域的原始特征维度
    pub feature_dim: usize,
    /// 每张图像的区域数
    pub num_regions: usize,
    /// 生成序列的最大长度（含`<end>`）
    pub max_seq_len: usize,
}

impl ModelDims {
    pub const fn end_id(&self) -> usize {
        self.vocab_size - 2
    }

    pub const fn start_id(&self) -> usize {
        self.vocab_size - 1
    }

    /// 不会出现在生成序列中的 token：`<pad>`与`<start>`
    pub const fn unsampled_ids(&self) -> [usize; 2] {
        [PAD_ID, self.start_id()]
    }
}

//! 图像特征：把 [batch, H, W, 3] 的像素变为每张图 R 个区域、每区域 F 维的特征。
//!
//! 特征按样本分组逐行排列为 [batch * R, F]：第 b 张图的区域 r 位于第 b*R + r 行。

use ndarray::{Array4, ArrayView3, s};
use rayon::prelude::*;

use crate::tensor::Tensor;

pub trait FeatureExtractor {
    /// [batch, H, W, 3] -> [batch * num_regions, feature_dim]
    fn extract(&self, images: &Array4<f32>) -> Tensor;

    fn num_regions(&self) -> usize;

    fn feature_dim(&self) -> usize;
}

/// 把图像均分为 grid×grid 个区域，每个区域取各通道的均值与标准差
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchPoolExtractor {
    grid: usize,
}

impl PatchPoolExtractor {
    const CHANNELS: usize = 3;

    pub fn new(grid: usize) -> Self {
        Self { grid: grid.max(1) }
    }

    pub const fn grid(&self) -> usize {
        self.grid
    }

    /// 第`i`个区间 [start, end)，保证非空
    fn bounds(&self, i: usize, extent: usize) -> (usize, usize) {
        let start = (i * extent / self.grid).min(extent.saturating_sub(1));
        let end = ((i + 1) * extent / self.grid).clamp(start + 1, extent.max(start + 1));
        (start, end)
    }

    fn pool(&self, image: ArrayView3<'_, f32>) -> Vec<f32> {
        let (height, width) = (image.shape()[0], image.shape()[1]);
        let mut out = Vec::with_capacity(self.num_regions() * self.feature_dim());
        for gy in 0..self.grid {
            let (y0, y1) = self.bounds(gy, height);
            for gx in 0..self.grid {
                let (x0, x1) = self.bounds(gx, width);
                let patch = image.slice(s![y0..y1.min(height), x0..x1.min(width), ..]);
                let count = (patch.shape()[0] * patch.shape()[1]).max(1) as f32;
                let mut stats = [0.0f32; 2 * Self::CHANNELS];
                for c in 0..Self::CHANNELS {
                    let channel = patch.slice(s![.., .., c]);
                    let mean = channel.sum() / count;
                    let var = channel.iter().map(|&v| (v - mean).powi(2)).sum::<f32>() / count;
                    stats[c] = mean;
                    stats[Self::CHANNELS + c] = var.sqrt();
                }
                out.extend_from_slice(&stats);
            }
        }
        out
    }
}

impl FeatureExtractor for PatchPoolExtractor {
    fn extract(&self, images: &Array4<f32>) -> Tensor {
        let batch = images.shape()[0];
        let per_image: Vec<Vec<f32>> = (0..batch)
            .into_par_iter()
            .map(|b| self.pool(images.slice(s![b, .., .., ..])))
            .collect();
        let flat: Vec<f32> = per_image.into_iter().flatten().collect();
        Tensor::new(&flat, &[batch * self.num_regions(), self.feature_dim()])
    }

    fn num_regions(&self) -> usize {
        self.grid * self.grid
    }

    fn feature_dim(&self) -> usize {
        2 * Self::CHANNELS
    }
}
